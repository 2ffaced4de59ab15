use mongodb::{Client, Collection, Database, bson::{self, doc, oid::ObjectId}};

use crate::models::{booking::Booking, user::User};
use crate::utils::errorhandler::AppError;

const PERSIST_RETRIES: usize = 3;

pub async fn init_db(uri: &str, db_name: &str) -> Database {
    Client::with_uri_str(uri)
        .await
        .expect("database not connected")
        .database(db_name)
}

pub fn users(db: &Database) -> Collection<User> {
    db.collection::<User>("users")
}

pub fn orders(db: &Database) -> Collection<Booking> {
    db.collection::<Booking>("orders")
}

/// Fetches a booking scoped to its owner. A booking owned by someone else is
/// indistinguishable from a missing one.
pub async fn fetch_booking(
    db: &Database,
    booking_id: ObjectId,
    user_id: ObjectId,
) -> Result<Booking, AppError> {
    orders(db)
        .find_one(doc! { "_id": booking_id, "userId": user_id })
        .await?
        .ok_or_else(|| AppError::not_found("Booking not found"))
}

/// Read-modify-write over the whole aggregate. The persist filter includes
/// the version token; a mismatch means a concurrent writer won, so the whole
/// round is retried from a fresh fetch, a bounded number of times.
pub async fn with_booking<T, F>(
    db: &Database,
    booking_id: ObjectId,
    user_id: ObjectId,
    mut apply: F,
) -> Result<(Booking, T), AppError>
where
    F: FnMut(&mut Booking) -> Result<T, AppError>,
{
    let collection = orders(db);

    for _ in 0..PERSIST_RETRIES {
        let mut booking = fetch_booking(db, booking_id, user_id).await?;
        let out = apply(&mut booking)?;

        let expected = booking.version;
        booking.version += 1;
        booking.updated_at = bson::DateTime::now();

        let result = collection
            .replace_one(doc! { "_id": booking_id, "version": expected }, &booking)
            .await?;
        if result.matched_count == 1 {
            return Ok((booking, out));
        }
    }

    Err(AppError::database("booking was modified concurrently, retries exhausted"))
}
