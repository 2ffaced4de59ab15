use std::collections::HashMap;
use std::collections::hash_map::Entry;

use axum::{Json, extract::{Path, State}, http::StatusCode};
use axum_extra::{TypedHeader, headers::{Authorization, authorization::Bearer}};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::doc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use validator::Validate;

use crate::{
    db::with_booking,
    models::booking::{
        DedupKey, DeleteTravellerRequest, Traveller, TravellerPayload, TravellerView,
    },
    routes::bookings::parse_object_id,
    state::AppState,
    utils::{errorhandler::AppError, jwt::verify_auth_token},
};

/// Lean slice of a booking document, all the directory projection reads.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TravellerSlice {
    #[serde(default)]
    pub travellers: Vec<Traveller>,
    pub booking_reference: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TravellerDirectoryEntry {
    #[serde(flatten)]
    pub traveller: TravellerView,
    pub booking_references: Vec<String>,
}

/// Flattens travellers across bookings into one entry per unique person,
/// keeping first-seen order and recording which bookings each appears in.
pub fn build_directory(bookings: &[TravellerSlice]) -> Vec<TravellerDirectoryEntry> {
    let mut order: Vec<DedupKey> = Vec::new();
    let mut entries: HashMap<DedupKey, TravellerDirectoryEntry> = HashMap::new();

    for booking in bookings {
        for traveller in &booking.travellers {
            let key = traveller.dedup_key();
            match entries.entry(key.clone()) {
                Entry::Vacant(slot) => {
                    order.push(key);
                    slot.insert(TravellerDirectoryEntry {
                        traveller: TravellerView::from(traveller),
                        booking_references: vec![booking.booking_reference.clone()],
                    });
                }
                Entry::Occupied(mut slot) => {
                    let entry = slot.get_mut();
                    if !entry.booking_references.contains(&booking.booking_reference) {
                        entry.booking_references.push(booking.booking_reference.clone());
                    }
                }
            }
        }
    }

    order.into_iter().filter_map(|key| entries.remove(&key)).collect()
}

pub async fn get_travellers(
    State(state): State<AppState>,
    auth: TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {

    let claims = verify_auth_token(auth).await?;
    let user_id = claims.user_id()?;

    let cursor = state
        .db
        .collection::<TravellerSlice>("orders")
        .find(doc! { "userId": user_id })
        .projection(doc! { "travellers": 1, "bookingReference": 1, "destination": 1 })
        .await?;
    let bookings: Vec<TravellerSlice> = cursor.try_collect().await?;

    let travellers = build_directory(&bookings);
    let total = travellers.len();

    Ok(Json(json!({
        "status": "success",
        "message": "Travellers retrieved successfully",
        "data": {
            "travellers": travellers,
            "totalTravellers": total
        }
    })))
}

pub async fn add_traveller(
    State(state): State<AppState>,
    auth: TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<TravellerPayload>,
) -> Result<(StatusCode, Json<Value>), AppError> {

    let claims = verify_auth_token(auth).await?;
    let user_id = claims.user_id()?;

    payload.validate().map_err(AppError::from)?;
    if payload.date_of_birth > Utc::now() {
        return Err(AppError::validation("Date of birth cannot be in the future"));
    }
    let booking_id = parse_object_id(&payload.booking_id, "Invalid booking ID format")?;

    let (booking, traveller) = with_booking(&state.db, booking_id, user_id, |b| {
        b.add_traveller(Traveller::new(payload.draft()))
    })
    .await?;

    Ok((StatusCode::CREATED, Json(json!({
        "status": "success",
        "message": "Traveller added to booking successfully",
        "data": {
            "traveller": TravellerView::from(&traveller),
            "bookingReference": booking.booking_reference
        }
    }))))
}

pub async fn update_traveller(
    State(state): State<AppState>,
    Path(traveller_id): Path<String>,
    auth: TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<TravellerPayload>,
) -> Result<Json<Value>, AppError> {

    let claims = verify_auth_token(auth).await?;
    let user_id = claims.user_id()?;

    let traveller_id = parse_object_id(&traveller_id, "Invalid traveller ID format")?;
    payload.validate().map_err(AppError::from)?;
    if payload.date_of_birth > Utc::now() {
        return Err(AppError::validation("Date of birth cannot be in the future"));
    }
    let booking_id = parse_object_id(&payload.booking_id, "Invalid booking ID format")?;

    let (booking, traveller) = with_booking(&state.db, booking_id, user_id, |b| {
        b.update_traveller(traveller_id, payload.draft())
    })
    .await?;

    Ok(Json(json!({
        "status": "success",
        "message": "Traveller updated successfully",
        "data": {
            "traveller": TravellerView::from(&traveller),
            "bookingReference": booking.booking_reference
        }
    })))
}

// The delete path only checks the two id formats; the full traveller schema
// is enforced on add/update.
pub async fn delete_traveller(
    State(state): State<AppState>,
    Path(traveller_id): Path<String>,
    auth: TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<DeleteTravellerRequest>,
) -> Result<Json<Value>, AppError> {

    let claims = verify_auth_token(auth).await?;
    let user_id = claims.user_id()?;

    let traveller_id = parse_object_id(&traveller_id, "Invalid traveller ID format")?;
    let booking_id = parse_object_id(&payload.booking_id, "Invalid booking ID format")?;

    let (booking, removed) = with_booking(&state.db, booking_id, user_id, |b| {
        b.remove_traveller(traveller_id)
    })
    .await?;

    Ok(Json(json!({
        "status": "success",
        "message": "Traveller deleted successfully",
        "data": {
            "deletedTraveller": {
                "_id": removed.id.to_hex(),
                "firstName": removed.first_name,
                "lastName": removed.last_name
            },
            "bookingReference": booking.booking_reference,
            "remainingTravellers": booking.travellers.len()
        }
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mongodb::bson;

    use crate::models::booking::{Gender, TravellerDraft};

    fn traveller(first: &str, last: &str, y: i32, m: u32, d: u32, h: u32) -> Traveller {
        Traveller::new(TravellerDraft {
            first_name: first.to_string(),
            last_name: last.to_string(),
            date_of_birth: bson::DateTime::from_chrono(
                chrono::Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap(),
            ),
            gender: Gender::Other,
            passport_number: None,
            nationality: "USA".to_string(),
        })
    }

    fn slice(reference: &str, travellers: Vec<Traveller>) -> TravellerSlice {
        TravellerSlice {
            travellers,
            booking_reference: reference.to_string(),
        }
    }

    #[test]
    fn equivalent_travellers_collapse_into_one_entry_with_provenance() {
        let bookings = vec![
            slice("TRV-001", vec![traveller("Ann", "Lee", 1990, 1, 1, 0)]),
            slice("TRV-002", vec![traveller("Ann", "Lee", 1990, 1, 1, 0)]),
        ];

        let directory = build_directory(&bookings);
        assert_eq!(directory.len(), 1);
        assert_eq!(directory[0].booking_references, vec!["TRV-001", "TRV-002"]);
    }

    #[test]
    fn dedup_is_case_insensitive_and_day_granular() {
        let bookings = vec![
            slice("TRV-001", vec![traveller("Ann", "Lee", 1990, 1, 1, 2)]),
            slice("TRV-002", vec![traveller("ANN", "lee", 1990, 1, 1, 22)]),
        ];

        let directory = build_directory(&bookings);
        assert_eq!(directory.len(), 1);
        assert_eq!(directory[0].booking_references.len(), 2);
    }

    #[test]
    fn entries_keep_first_seen_order() {
        let bookings = vec![
            slice("TRV-001", vec![
                traveller("Ann", "Lee", 1990, 1, 1, 0),
                traveller("Bob", "Ray", 1985, 5, 5, 0),
            ]),
            slice("TRV-002", vec![
                traveller("Cara", "Day", 1992, 7, 4, 0),
                traveller("Ann", "Lee", 1990, 1, 1, 0),
            ]),
        ];

        let directory = build_directory(&bookings);
        let names: Vec<&str> = directory.iter().map(|e| e.traveller.first_name.as_str()).collect();
        assert_eq!(names, vec!["Ann", "Bob", "Cara"]);
        assert_eq!(directory[0].booking_references, vec!["TRV-001", "TRV-002"]);
    }

    #[test]
    fn same_booking_reference_is_not_repeated() {
        let bookings = vec![slice("TRV-001", vec![
            traveller("Ann", "Lee", 1990, 1, 1, 0),
            // distinct person, same booking
            traveller("Ann", "Lee", 1991, 2, 2, 0),
        ])];

        let directory = build_directory(&bookings);
        assert_eq!(directory.len(), 2);
        for entry in &directory {
            assert_eq!(entry.booking_references, vec!["TRV-001"]);
        }
    }

    #[test]
    fn empty_bookings_yield_empty_directory() {
        let bookings = vec![slice("TRV-001", vec![])];
        assert!(build_directory(&bookings).is_empty());
    }
}
