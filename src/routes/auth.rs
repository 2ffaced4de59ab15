use axum::{Json, extract::State, http::StatusCode};
use bcrypt::{hash, verify};
use chrono::Utc;
use mongodb::bson::{self, Bson, doc, oid::ObjectId};
use serde_json::{Value, json};
use validator::Validate;

use crate::{
    db::users,
    models::user::{LoginRequest, RefreshRequest, SignupRequest, User, UserResponse},
    state::AppState,
    utils::{errorhandler::AppError, jwt::{generate_tokens, verify_refresh_token}},
};

pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {

    payload.validate().map_err(AppError::from)?;
    if payload.date_of_birth > Utc::now() {
        return Err(AppError::validation("Date of birth cannot be in the future"));
    }

    let collection = users(&state.db);
    let email = payload.email.to_lowercase();

    if collection.find_one(doc! { "email": &email }).await?.is_some() {
        return Err(AppError::bad_request("User with this email already exists"));
    }

    let hashed = hash(&payload.password, 12)?;
    let now = bson::DateTime::now();

    let user = User {
        id: ObjectId::new(),
        first_name: payload.first_name,
        last_name: payload.last_name,
        email,
        password: hashed,
        phone: payload.phone,
        date_of_birth: bson::DateTime::from_chrono(payload.date_of_birth),
        gender: payload.gender,
        address: payload.address,
        is_active: true,
        is_email_verified: false,
        refresh_token: None,
        created_at: now,
        updated_at: now,
    };

    collection.insert_one(&user).await?;

    let tokens = generate_tokens(&user.id, &user.email)?;
    collection
        .update_one(
            doc! { "_id": user.id },
            doc! { "$set": { "refreshToken": &tokens.refresh_token } },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(json!({
        "status": "success",
        "message": "User registered successfully",
        "data": {
            "user": UserResponse::from(&user),
            "tokens": tokens
        }
    }))))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<Value>, AppError> {

    payload.validate().map_err(AppError::from)?;

    let collection = users(&state.db);
    let user = collection
        .find_one(doc! { "email": payload.email.to_lowercase() })
        .await?
        .ok_or_else(|| AppError::unauthorized("Invalid email or password"))?;

    if !user.is_active {
        return Err(AppError::unauthorized("Account is deactivated. Please contact support."));
    }

    let valid = verify(&payload.password, &user.password)?;
    if !valid {
        return Err(AppError::unauthorized("Invalid email or password"));
    }

    let tokens = generate_tokens(&user.id, &user.email)?;
    collection
        .update_one(
            doc! { "_id": user.id },
            doc! { "$set": { "refreshToken": &tokens.refresh_token } },
        )
        .await?;

    Ok(Json(json!({
        "status": "success",
        "message": "Login successful",
        "data": {
            "user": UserResponse::from(&user),
            "tokens": tokens
        }
    })))
}

/// Loads the user for a presented refresh token, requiring it to match the
/// one stored on the document (rotation invalidates older tokens).
async fn user_for_refresh_token(state: &AppState, token: &str) -> Result<User, AppError> {
    let claims = verify_refresh_token(token)?;
    let user_id = claims.user_id()?;

    let user = users(&state.db)
        .find_one(doc! { "_id": user_id })
        .await?
        .ok_or_else(|| AppError::unauthorized("Invalid refresh token"))?;

    if user.refresh_token.as_deref() != Some(token) {
        return Err(AppError::unauthorized("Invalid refresh token"));
    }
    if !user.is_active {
        return Err(AppError::unauthorized("Account is deactivated"));
    }

    Ok(user)
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<Value>, AppError> {

    let user = user_for_refresh_token(&state, &payload.refresh_token).await?;

    let tokens = generate_tokens(&user.id, &user.email)?;
    users(&state.db)
        .update_one(
            doc! { "_id": user.id },
            doc! { "$set": { "refreshToken": &tokens.refresh_token } },
        )
        .await?;

    Ok(Json(json!({
        "status": "success",
        "message": "Tokens refreshed successfully",
        "data": {
            "tokens": tokens
        }
    })))
}

pub async fn logout(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<Value>, AppError> {

    let user = user_for_refresh_token(&state, &payload.refresh_token).await?;

    users(&state.db)
        .update_one(
            doc! { "_id": user.id },
            doc! { "$set": { "refreshToken": Bson::Null } },
        )
        .await?;

    Ok(Json(json!({
        "status": "success",
        "message": "Logged out successfully"
    })))
}
