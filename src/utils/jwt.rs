use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer}};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::utils::errorhandler::AppError;

const ACCESS_TOKEN_TTL_MINUTES: i64 = 15;
const REFRESH_TOKEN_TTL_DAYS: i64 = 7;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub id: String,
    pub sub: String,
    pub exp: usize,
}

impl Claims {
    pub fn user_id(&self) -> Result<ObjectId, AppError> {
        ObjectId::parse_str(&self.id)
            .map_err(|_| AppError::unauthorized("Invalid token - user not found"))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: String,
}

fn access_secret() -> String {
    std::env::var("JWT_ACCESS_SECRET").unwrap_or_else(|_| "mysecret".into())
}

fn refresh_secret() -> String {
    std::env::var("JWT_REFRESH_SECRET").unwrap_or_else(|_| "myrefreshsecret".into())
}

fn issue(user_id: &ObjectId, email: &str, ttl: Duration, secret: &str) -> Result<String, AppError> {
    let exp = Utc::now() + ttl;

    let claims = Claims {
        id: user_id.to_hex(),
        sub: email.to_string(),
        exp: exp.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

/// Issues the access/refresh token pair for a user. The refresh token is
/// expected to be persisted on the user document by the caller.
pub fn generate_tokens(user_id: &ObjectId, email: &str) -> Result<TokenPair, AppError> {
    let access_token = issue(
        user_id,
        email,
        Duration::minutes(ACCESS_TOKEN_TTL_MINUTES),
        &access_secret(),
    )?;
    let refresh_token = issue(
        user_id,
        email,
        Duration::days(REFRESH_TOKEN_TTL_DAYS),
        &refresh_secret(),
    )?;

    Ok(TokenPair {
        access_token,
        refresh_token,
        expires_in: format!("{ACCESS_TOKEN_TTL_MINUTES}m"),
    })
}

pub async fn verify_auth_token(
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>
) -> Result<Claims, AppError> {

    let token = auth.token();

    let token_data = decode(
        token,
        &DecodingKey::from_secret(access_secret().as_bytes()),
        &Validation::default(),
    )
    .map_err(|err| match err.kind() {
        ErrorKind::ExpiredSignature => AppError::unauthorized("Access token has expired"),
        _ => AppError::unauthorized("Invalid access token"),
    })?;

    Ok(token_data.claims)
}

pub fn verify_refresh_token(token: &str) -> Result<Claims, AppError> {
    let token_data = decode(
        token,
        &DecodingKey::from_secret(refresh_secret().as_bytes()),
        &Validation::default(),
    )
    .map_err(|err| match err.kind() {
        ErrorKind::ExpiredSignature => AppError::unauthorized("Refresh token has expired"),
        _ => AppError::unauthorized("Invalid refresh token"),
    })?;

    Ok(token_data.claims)
}
