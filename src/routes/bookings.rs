use axum::{Json, extract::{Path, Query, State}};
use axum_extra::{TypedHeader, headers::{Authorization, authorization::Bearer}};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use serde::Serialize;
use serde_json::{Value, json};
use validator::Validate;

use crate::{
    db::{fetch_booking, orders},
    models::booking::{BookingListQuery, BookingView, StatusFilter, start_of_today},
    state::AppState,
    summary::{BookingHighlights, summarize},
    utils::{errorhandler::AppError, jwt::verify_auth_token},
};

pub fn parse_object_id(raw: &str, message: &str) -> Result<ObjectId, AppError> {
    ObjectId::parse_str(raw).map_err(|_| AppError::validation(message))
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u64,
    pub total_pages: u64,
    pub total_bookings: u64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl Pagination {
    pub fn build(page: u64, limit: u64, total: u64) -> Self {
        let total_pages = total.div_ceil(limit);
        Pagination {
            current_page: page,
            total_pages,
            total_bookings: total,
            has_next_page: page < total_pages,
            has_prev_page: page > 1,
        }
    }
}

pub async fn get_bookings(
    State(state): State<AppState>,
    auth: TypedHeader<Authorization<Bearer>>,
    Query(query): Query<BookingListQuery>,
) -> Result<Json<Value>, AppError> {

    let claims = verify_auth_token(auth).await?;
    let user_id = claims.user_id()?;

    query.validate().map_err(AppError::from)?;
    let page = u64::from(query.page.unwrap_or(1));
    let limit = u64::from(query.limit.unwrap_or(10));

    let (today, midnight) = start_of_today();

    let mut filter = doc! { "userId": user_id };
    // upcoming: earliest trip first; completed or unfiltered: latest first
    let sort_direction = match query.status {
        Some(StatusFilter::Upcoming) => {
            filter.insert("lastTravelDate", doc! { "$gte": midnight });
            1
        }
        Some(StatusFilter::Completed) => {
            filter.insert("lastTravelDate", doc! { "$lt": midnight });
            -1
        }
        None => -1,
    };

    let cursor = orders(&state.db)
        .find(filter.clone())
        .sort(doc! { "lastTravelDate": sort_direction })
        .skip((page - 1) * limit)
        .limit(limit as i64)
        .await?;
    let bookings: Vec<_> = cursor.try_collect().await?;

    let total = orders(&state.db).count_documents(filter).await?;
    let pagination = Pagination::build(page, limit, total);

    let views: Vec<BookingView> = bookings
        .iter()
        .map(|b| BookingView::from_booking(b, today))
        .collect();

    let label = match query.status {
        Some(StatusFilter::Upcoming) => "Upcoming",
        Some(StatusFilter::Completed) => "Completed",
        None => "All",
    };

    Ok(Json(json!({
        "status": "success",
        "message": format!("{label} bookings retrieved successfully"),
        "data": {
            "bookings": views,
            "pagination": pagination
        }
    })))
}

pub async fn get_booking_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
    auth: TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {

    let claims = verify_auth_token(auth).await?;
    let user_id = claims.user_id()?;
    let booking_id = parse_object_id(&id, "Invalid ID format")?;

    let booking = fetch_booking(&state.db, booking_id, user_id).await?;
    let (today, _) = start_of_today();

    Ok(Json(json!({
        "status": "success",
        "message": "Booking retrieved successfully",
        "data": {
            "booking": BookingView::from_booking(&booking, today)
        }
    })))
}

pub async fn generate_booking_summary(
    State(state): State<AppState>,
    Path(id): Path<String>,
    auth: TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {

    let claims = verify_auth_token(auth).await?;
    let user_id = claims.user_id()?;
    let booking_id = parse_object_id(&id, "Invalid ID format")?;

    let booking = fetch_booking(&state.db, booking_id, user_id).await?;

    let highlights = BookingHighlights::from(&booking);
    let outcome = summarize(state.generator.as_ref(), &highlights).await;

    let mut data = json!({
        "bookingId": booking.id.to_hex(),
        "bookingReference": booking.booking_reference,
        "summary": outcome.summary,
        "generatedAt": Utc::now().to_rfc3339(),
    });
    let message = if outcome.fallback {
        if let Some(map) = data.as_object_mut() {
            map.insert(
                "note".to_string(),
                json!("AI service temporarily unavailable, fallback summary provided"),
            );
        }
        "Booking summary generated successfully (fallback)"
    } else {
        "Booking summary generated successfully"
    };

    Ok(Json(json!({
        "status": "success",
        "message": message,
        "data": data
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twenty_five_rows_at_limit_ten_paginate_into_three_pages() {
        let page = Pagination::build(3, 10, 25);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.total_bookings, 25);
        assert!(!page.has_next_page);
        assert!(page.has_prev_page);
    }

    #[test]
    fn first_page_has_no_previous() {
        let page = Pagination::build(1, 10, 25);
        assert!(page.has_next_page);
        assert!(!page.has_prev_page);
    }

    #[test]
    fn empty_result_set_has_zero_pages() {
        let page = Pagination::build(1, 10, 0);
        assert_eq!(page.total_pages, 0);
        assert!(!page.has_next_page);
        assert!(!page.has_prev_page);
    }

    #[test]
    fn exact_multiple_does_not_add_a_page() {
        let page = Pagination::build(2, 10, 20);
        assert_eq!(page.total_pages, 2);
        assert!(!page.has_next_page);
        assert!(page.has_prev_page);
    }
}
