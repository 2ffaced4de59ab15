use chrono::{DateTime, Utc};
use mongodb::bson::{self, oid::ObjectId};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::booking::Gender;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[validate(length(min = 1, message = "Street address is required"))]
    pub street: String,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "State is required"))]
    pub state: String,
    #[validate(length(min = 1, message = "Country is required"))]
    pub country: String,
    #[validate(length(min = 1, message = "Zip code is required"))]
    pub zip_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    // bcrypt hash, never exposed through UserResponse
    pub password: String,
    pub phone: String,
    pub date_of_birth: bson::DateTime,
    pub gender: Gender,
    pub address: Address,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_email_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "bson::DateTime::now")]
    pub created_at: bson::DateTime,
    #[serde(default = "bson::DateTime::now")]
    pub updated_at: bson::DateTime,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: DateTime<Utc>,
    pub gender: Gender,
    pub address: Address,
    pub is_active: bool,
    pub is_email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        UserResponse {
            id: user.id.to_hex(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            date_of_birth: user.date_of_birth.to_chrono(),
            gender: user.gender,
            address: user.address.clone(),
            is_active: user.is_active,
            is_email_verified: user.is_email_verified,
            created_at: user.created_at.to_chrono(),
            updated_at: user.updated_at.to_chrono(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[validate(length(min = 2, max = 50, message = "First name must be at least 2 characters long"))]
    pub first_name: String,
    #[validate(length(min = 2, max = 50, message = "Last name must be at least 2 characters long"))]
    pub last_name: String,
    #[validate(email(message = "Please provide a valid email address"))]
    pub email: String,
    #[validate(length(min = 6, max = 128, message = "Password must be at least 6 characters long"))]
    pub password: String,
    #[validate(length(min = 1, message = "Phone number is required"))]
    pub phone: String,
    pub date_of_birth: DateTime<Utc>,
    pub gender: Gender,
    #[validate(nested)]
    pub address: Address,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Please provide a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[validate(length(min = 2, max = 50, message = "First name must be at least 2 characters long"))]
    pub first_name: Option<String>,
    #[validate(length(min = 2, max = 50, message = "Last name must be at least 2 characters long"))]
    pub last_name: Option<String>,
    #[validate(length(min = 1, message = "Please provide a valid phone number"))]
    pub phone: Option<String>,
    pub date_of_birth: Option<DateTime<Utc>>,
    pub gender: Option<Gender>,
    pub address: Option<Address>,
}
