use axum::{Json, extract::State};
use axum_extra::{TypedHeader, headers::{Authorization, authorization::Bearer}};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{self, Document, doc};
use mongodb::options::ReturnDocument;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use validator::Validate;

use crate::{
    db::{orders, users},
    models::booking::{Place, start_of_today},
    models::user::{UpdateProfileRequest, User, UserResponse},
    state::AppState,
    utils::{errorhandler::AppError, jwt::verify_auth_token},
};

async fn authenticated_user(
    state: &AppState,
    auth: TypedHeader<Authorization<Bearer>>,
) -> Result<User, AppError> {
    let claims = verify_auth_token(auth).await?;
    let user_id = claims.user_id()?;

    let user = users(&state.db)
        .find_one(doc! { "_id": user_id })
        .await?
        .ok_or_else(|| AppError::unauthorized("Invalid token - user not found"))?;

    if !user.is_active {
        return Err(AppError::unauthorized("Account is deactivated"));
    }

    Ok(user)
}

pub async fn get_profile(
    State(state): State<AppState>,
    auth: TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {

    let user = authenticated_user(&state, auth).await?;

    Ok(Json(json!({
        "status": "success",
        "message": "Profile retrieved successfully",
        "data": {
            "user": UserResponse::from(&user)
        }
    })))
}

pub async fn update_profile(
    State(state): State<AppState>,
    auth: TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<Value>, AppError> {

    let user = authenticated_user(&state, auth).await?;

    payload.validate().map_err(AppError::from)?;
    if let Some(dob) = payload.date_of_birth {
        if dob > Utc::now() {
            return Err(AppError::validation("Date of birth cannot be in the future"));
        }
    }

    // allow-listed fields only
    let mut set = Document::new();
    if let Some(v) = payload.first_name {
        set.insert("firstName", v);
    }
    if let Some(v) = payload.last_name {
        set.insert("lastName", v);
    }
    if let Some(v) = payload.phone {
        set.insert("phone", v);
    }
    if let Some(v) = payload.date_of_birth {
        set.insert("dateOfBirth", bson::DateTime::from_chrono(v));
    }
    if let Some(v) = payload.gender {
        set.insert("gender", bson::to_bson(&v).map_err(|_| AppError::Unexpected)?);
    }
    if let Some(v) = payload.address {
        set.insert("address", bson::to_bson(&v).map_err(|_| AppError::Unexpected)?);
    }

    if set.is_empty() {
        return Err(AppError::bad_request("No valid fields provided for update"));
    }
    set.insert("updatedAt", bson::DateTime::now());

    let updated = users(&state.db)
        .find_one_and_update(doc! { "_id": user.id }, doc! { "$set": set })
        .return_document(ReturnDocument::After)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(Json(json!({
        "status": "success",
        "message": "Profile updated successfully",
        "data": {
            "user": UserResponse::from(&updated)
        }
    })))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecentBooking {
    booking_reference: String,
    destination: Place,
}

pub async fn get_stats(
    State(state): State<AppState>,
    auth: TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {

    let user = authenticated_user(&state, auth).await?;
    let collection = orders(&state.db);
    let (_, today) = start_of_today();

    let total_bookings = collection
        .count_documents(doc! { "userId": user.id })
        .await?;
    let upcoming_bookings = collection
        .count_documents(doc! { "userId": user.id, "lastTravelDate": { "$gte": today } })
        .await?;
    let completed_bookings = collection
        .count_documents(doc! { "userId": user.id, "lastTravelDate": { "$lt": today } })
        .await?;

    let mut cursor = collection
        .aggregate(vec![
            doc! { "$match": { "userId": user.id } },
            doc! { "$group": { "_id": null, "totalAmount": { "$sum": "$totalAmount" } } },
        ])
        .await?;
    let total_spent = match cursor.try_next().await? {
        Some(group) => group.get_f64("totalAmount").unwrap_or(0.0),
        None => 0.0,
    };

    let recent_booking = collection
        .clone_with_type::<RecentBooking>()
        .find_one(doc! { "userId": user.id })
        .sort(doc! { "createdAt": -1 })
        .projection(doc! { "_id": 0, "bookingReference": 1, "destination": 1 })
        .await?;

    Ok(Json(json!({
        "status": "success",
        "message": "User statistics retrieved successfully",
        "data": {
            "stats": {
                "totalBookings": total_bookings,
                "upcomingBookings": upcoming_bookings,
                "completedBookings": completed_bookings,
                "totalSpent": total_spent,
                "recentBooking": recent_booking
            }
        }
    })))
}
