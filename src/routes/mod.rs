pub mod auth;
pub mod bookings;
pub mod travellers;
pub mod user;
