use axum::{
    Router,
    routing::{delete, get, post, put},
};

use crate::{routes::{auth::{login, logout, refresh, signup}, bookings::{generate_booking_summary, get_booking_by_id, get_bookings}, travellers::{add_traveller, delete_traveller, get_travellers, update_traveller}, user::{get_profile, get_stats, update_profile}}, state::AppState};

pub fn create_router(state: AppState) -> Router {
    Router::new()
    //auth
    .route("/api/auth/signup", post(signup))                                //register a new user
    .route("/api/auth/login", post(login))                                  //authenticate and return token pair
    .route("/api/auth/refresh", post(refresh))                              //rotate tokens using the refresh token
    .route("/api/auth/logout", post(logout))                                //invalidate the stored refresh token
    //user
    .route("/api/user/profile", get(get_profile))                           //current user's profile
    .route("/api/user/profile", put(update_profile))                        //update allow-listed profile fields
    .route("/api/user/stats", get(get_stats))                               //booking counts and total spent
    //bookings
    .route("/api/bookings", get(get_bookings))                              //paginated list, upcoming/completed filter
    .route("/api/bookings/{id}", get(get_booking_by_id))                    //single booking scoped to owner
    .route("/api/bookings/{id}/summary", post(generate_booking_summary))    //AI summary with deterministic fallback
    //travellers
    .route("/api/travellers", get(get_travellers))                          //de-duplicated cross-booking directory
    .route("/api/travellers", post(add_traveller))                          //add traveller to a booking
    .route("/api/travellers/{traveller_id}", put(update_traveller))         //update traveller within a booking
    .route("/api/travellers/{traveller_id}", delete(delete_traveller))      //delete traveller (never the last one)
    .with_state(state)
}
