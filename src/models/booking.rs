use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use mongodb::bson::{self, oid::ObjectId};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::utils::errorhandler::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BookingType {
    Flight,
    Hotel,
    Package,
    CarRental,
}

impl BookingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingType::Flight => "flight",
            BookingType::Hotel => "hotel",
            BookingType::Package => "package",
            BookingType::CarRental => "car-rental",
        }
    }
}

/// Administrative status, distinct from the derived temporal status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    #[default]
    Confirmed,
    Pending,
    Cancelled,
    Completed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Paid,
    Pending,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    Paypal,
    BankTransfer,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingSource {
    #[default]
    Web,
    Mobile,
    Agent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CabinClass {
    #[default]
    Economy,
    PremiumEconomy,
    Business,
    First,
}

impl CabinClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            CabinClass::Economy => "economy",
            CabinClass::PremiumEconomy => "premium-economy",
            CabinClass::Business => "business",
            CabinClass::First => "first",
        }
    }
}

/// Temporal classification derived from lastTravelDate, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TemporalStatus {
    Upcoming,
    Completed,
}

impl TemporalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemporalStatus::Upcoming => "upcoming",
            TemporalStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Place {
    pub city: String,
    pub country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightLeg {
    pub airport: String,
    pub city: String,
    pub date: bson::DateTime,
    pub time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightDetails {
    pub airline: String,
    pub flight_number: String,
    pub departure: FlightLeg,
    pub arrival: FlightLeg,
    #[serde(default)]
    pub class: CabinClass,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotelDetails {
    pub name: String,
    pub address: String,
    pub city: String,
    pub check_in: bson::DateTime,
    pub check_out: bson::DateTime,
    pub room_type: String,
    pub number_of_rooms: u32,
}

/// Identity tuple used to decide whether two travellers denote the same
/// person: lowercased names plus date of birth at day granularity (UTC).
pub type DedupKey = (String, String, NaiveDate);

/// Embedded value object. Its id is only meaningful within the parent
/// booking; travellers are never persisted on their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Traveller {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: bson::DateTime,
    pub gender: Gender,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passport_number: Option<String>,
    pub nationality: String,
}

/// Field set for creating or overwriting a traveller, without an identity.
#[derive(Debug, Clone)]
pub struct TravellerDraft {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: bson::DateTime,
    pub gender: Gender,
    pub passport_number: Option<String>,
    pub nationality: String,
}

impl TravellerDraft {
    pub fn dedup_key(&self) -> DedupKey {
        (
            self.first_name.to_lowercase(),
            self.last_name.to_lowercase(),
            self.date_of_birth.to_chrono().date_naive(),
        )
    }
}

impl Traveller {
    pub fn new(draft: TravellerDraft) -> Self {
        Traveller {
            id: ObjectId::new(),
            first_name: draft.first_name,
            last_name: draft.last_name,
            date_of_birth: draft.date_of_birth,
            gender: draft.gender,
            passport_number: draft.passport_number,
            nationality: draft.nationality,
        }
    }

    pub fn dedup_key(&self) -> DedupKey {
        (
            self.first_name.to_lowercase(),
            self.last_name.to_lowercase(),
            self.date_of_birth.to_chrono().date_naive(),
        )
    }

    fn apply(&mut self, draft: TravellerDraft) {
        self.first_name = draft.first_name;
        self.last_name = draft.last_name;
        self.date_of_birth = draft.date_of_birth;
        self.gender = draft.gender;
        self.passport_number = draft.passport_number;
        self.nationality = draft.nationality;
    }
}

fn default_currency() -> String {
    "USD".to_string()
}

/// Aggregate root. Travellers are mutated only through the methods below and
/// the whole document is persisted in one write afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub user_id: ObjectId,
    pub booking_reference: String,
    pub destination: Place,
    pub origin: Place,
    pub start_date: bson::DateTime,
    pub end_date: bson::DateTime,
    pub last_travel_date: bson::DateTime,
    pub booking_type: BookingType,
    #[serde(default)]
    pub status: BookingStatus,
    pub travellers: Vec<Traveller>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flight_details: Option<FlightDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hotel_details: Option<HotelDetails>,
    pub total_amount: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_requests: Option<String>,
    #[serde(default)]
    pub booking_source: BookingSource,
    #[serde(default = "bson::DateTime::now")]
    pub created_at: bson::DateTime,
    #[serde(default = "bson::DateTime::now")]
    pub updated_at: bson::DateTime,
    // optimistic-concurrency token, bumped on every persist
    #[serde(default)]
    pub version: i64,
}

impl Booking {
    /// Appends a traveller unless an equivalent one already exists.
    pub fn add_traveller(&mut self, traveller: Traveller) -> Result<Traveller, AppError> {
        let key = traveller.dedup_key();
        if self.travellers.iter().any(|t| t.dedup_key() == key) {
            return Err(AppError::conflict("Traveller already exists in this booking"));
        }

        self.travellers.push(traveller.clone());
        Ok(traveller)
    }

    /// Overwrites a traveller in place after checking the updated identity
    /// against every other traveller in the booking.
    pub fn update_traveller(
        &mut self,
        traveller_id: ObjectId,
        draft: TravellerDraft,
    ) -> Result<Traveller, AppError> {
        let idx = self
            .travellers
            .iter()
            .position(|t| t.id == traveller_id)
            .ok_or_else(|| AppError::not_found("Traveller not found in this booking"))?;

        let key = draft.dedup_key();
        let collision = self
            .travellers
            .iter()
            .enumerate()
            .any(|(i, t)| i != idx && t.dedup_key() == key);
        if collision {
            return Err(AppError::conflict(
                "A traveller with these details already exists in this booking",
            ));
        }

        self.travellers[idx].apply(draft);
        Ok(self.travellers[idx].clone())
    }

    /// Removes a traveller. Refused when it would leave the booking empty;
    /// the count check comes first, matching the wire behaviour.
    pub fn remove_traveller(&mut self, traveller_id: ObjectId) -> Result<Traveller, AppError> {
        if self.travellers.len() <= 1 {
            return Err(AppError::precondition(
                "Cannot delete the last traveller from a booking",
            ));
        }

        let idx = self
            .travellers
            .iter()
            .position(|t| t.id == traveller_id)
            .ok_or_else(|| AppError::not_found("Traveller not found in this booking"))?;

        Ok(self.travellers.remove(idx))
    }

    /// upcoming iff lastTravelDate (day granularity, UTC) >= today.
    pub fn temporal_status(&self, today: NaiveDate) -> TemporalStatus {
        if self.last_travel_date.to_chrono().date_naive() >= today {
            TemporalStatus::Upcoming
        } else {
            TemporalStatus::Completed
        }
    }

    /// ceil((endDate - startDate) / 1 day)
    pub fn duration_days(&self) -> i64 {
        let secs = (self.end_date.to_chrono() - self.start_date.to_chrono())
            .num_seconds()
            .abs();
        (secs + 86_399) / 86_400
    }
}

/// Today's date paired with midnight UTC as a bson value, for filters.
pub fn start_of_today() -> (NaiveDate, bson::DateTime) {
    let today = Utc::now().date_naive();
    let midnight = Utc.from_utc_datetime(&today.and_time(NaiveTime::MIN));
    (today, bson::DateTime::from_chrono(midnight))
}

// ---- request DTOs ----

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TravellerPayload {
    pub booking_id: String,
    #[validate(length(min = 2, max = 50, message = "First name must be at least 2 characters long"))]
    pub first_name: String,
    #[validate(length(min = 2, max = 50, message = "Last name must be at least 2 characters long"))]
    pub last_name: String,
    pub date_of_birth: DateTime<Utc>,
    pub gender: Gender,
    pub passport_number: Option<String>,
    #[validate(length(min = 1, message = "Nationality is required"))]
    pub nationality: String,
}

impl TravellerPayload {
    pub fn draft(&self) -> TravellerDraft {
        TravellerDraft {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            date_of_birth: bson::DateTime::from_chrono(self.date_of_birth),
            gender: self.gender,
            passport_number: self.passport_number.clone(),
            nationality: self.nationality.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteTravellerRequest {
    pub booking_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    Upcoming,
    Completed,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BookingListQuery {
    pub status: Option<StatusFilter>,
    #[validate(range(min = 1, message = "Page must be at least 1"))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<u32>,
}

// ---- response views (ids as hex, dates as RFC 3339) ----

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TravellerView {
    #[serde(rename = "_id")]
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: DateTime<Utc>,
    pub gender: Gender,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passport_number: Option<String>,
    pub nationality: String,
}

impl From<&Traveller> for TravellerView {
    fn from(t: &Traveller) -> Self {
        TravellerView {
            id: t.id.to_hex(),
            first_name: t.first_name.clone(),
            last_name: t.last_name.clone(),
            date_of_birth: t.date_of_birth.to_chrono(),
            gender: t.gender,
            passport_number: t.passport_number.clone(),
            nationality: t.nationality.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FlightLegView {
    pub airport: String,
    pub city: String,
    pub date: DateTime<Utc>,
    pub time: String,
}

impl From<&FlightLeg> for FlightLegView {
    fn from(leg: &FlightLeg) -> Self {
        FlightLegView {
            airport: leg.airport.clone(),
            city: leg.city.clone(),
            date: leg.date.to_chrono(),
            time: leg.time.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightDetailsView {
    pub airline: String,
    pub flight_number: String,
    pub departure: FlightLegView,
    pub arrival: FlightLegView,
    pub class: CabinClass,
}

impl From<&FlightDetails> for FlightDetailsView {
    fn from(f: &FlightDetails) -> Self {
        FlightDetailsView {
            airline: f.airline.clone(),
            flight_number: f.flight_number.clone(),
            departure: FlightLegView::from(&f.departure),
            arrival: FlightLegView::from(&f.arrival),
            class: f.class,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HotelDetailsView {
    pub name: String,
    pub address: String,
    pub city: String,
    pub check_in: DateTime<Utc>,
    pub check_out: DateTime<Utc>,
    pub room_type: String,
    pub number_of_rooms: u32,
}

impl From<&HotelDetails> for HotelDetailsView {
    fn from(h: &HotelDetails) -> Self {
        HotelDetailsView {
            name: h.name.clone(),
            address: h.address.clone(),
            city: h.city.clone(),
            check_in: h.check_in.to_chrono(),
            check_out: h.check_out.to_chrono(),
            room_type: h.room_type.clone(),
            number_of_rooms: h.number_of_rooms,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingView {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub booking_reference: String,
    pub destination: Place,
    pub origin: Place,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub last_travel_date: DateTime<Utc>,
    pub booking_type: BookingType,
    pub status: BookingStatus,
    pub travellers: Vec<TravellerView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flight_details: Option<FlightDetailsView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hotel_details: Option<HotelDetailsView>,
    pub total_amount: f64,
    pub currency: String,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_requests: Option<String>,
    pub booking_source: BookingSource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub booking_status: TemporalStatus,
    pub duration_days: i64,
}

impl BookingView {
    pub fn from_booking(b: &Booking, today: NaiveDate) -> Self {
        BookingView {
            id: b.id.to_hex(),
            user_id: b.user_id.to_hex(),
            booking_reference: b.booking_reference.clone(),
            destination: b.destination.clone(),
            origin: b.origin.clone(),
            start_date: b.start_date.to_chrono(),
            end_date: b.end_date.to_chrono(),
            last_travel_date: b.last_travel_date.to_chrono(),
            booking_type: b.booking_type,
            status: b.status,
            travellers: b.travellers.iter().map(TravellerView::from).collect(),
            flight_details: b.flight_details.as_ref().map(FlightDetailsView::from),
            hotel_details: b.hotel_details.as_ref().map(HotelDetailsView::from),
            total_amount: b.total_amount,
            currency: b.currency.clone(),
            payment_status: b.payment_status,
            payment_method: b.payment_method,
            special_requests: b.special_requests.clone(),
            booking_source: b.booking_source,
            created_at: b.created_at.to_chrono(),
            updated_at: b.updated_at.to_chrono(),
            booking_status: b.temporal_status(today),
            duration_days: b.duration_days(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn dt(y: i32, m: u32, d: u32, h: u32) -> bson::DateTime {
        bson::DateTime::from_chrono(Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap())
    }

    fn traveller(first: &str, last: &str, dob: bson::DateTime) -> Traveller {
        Traveller::new(TravellerDraft {
            first_name: first.to_string(),
            last_name: last.to_string(),
            date_of_birth: dob,
            gender: Gender::Other,
            passport_number: None,
            nationality: "USA".to_string(),
        })
    }

    fn draft(first: &str, last: &str, dob: bson::DateTime) -> TravellerDraft {
        TravellerDraft {
            first_name: first.to_string(),
            last_name: last.to_string(),
            date_of_birth: dob,
            gender: Gender::Other,
            passport_number: None,
            nationality: "USA".to_string(),
        }
    }

    fn booking(travellers: Vec<Traveller>) -> Booking {
        Booking {
            id: ObjectId::new(),
            user_id: ObjectId::new(),
            booking_reference: "TRV-2025-001".to_string(),
            destination: Place { city: "Dubai".into(), country: "UAE".into() },
            origin: Place { city: "Delhi".into(), country: "India".into() },
            start_date: dt(2025, 6, 1, 0),
            end_date: dt(2025, 6, 8, 0),
            last_travel_date: dt(2025, 6, 8, 0),
            booking_type: BookingType::Package,
            status: BookingStatus::Confirmed,
            travellers,
            flight_details: None,
            hotel_details: None,
            total_amount: 1500.0,
            currency: "USD".to_string(),
            payment_status: PaymentStatus::Paid,
            payment_method: PaymentMethod::CreditCard,
            special_requests: None,
            booking_source: BookingSource::Web,
            created_at: bson::DateTime::now(),
            updated_at: bson::DateTime::now(),
            version: 0,
        }
    }

    #[test]
    fn add_rejects_duplicate_key_case_insensitively() {
        let dob = dt(1990, 1, 1, 0);
        let mut b = booking(vec![traveller("Ann", "Lee", dob)]);
        let before: Vec<ObjectId> = b.travellers.iter().map(|t| t.id).collect();

        let err = b.add_traveller(traveller("ANN", "lee", dob)).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // list unchanged, length and contents
        let after: Vec<ObjectId> = b.travellers.iter().map(|t| t.id).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn add_dedup_key_compares_birth_date_at_day_granularity() {
        let mut b = booking(vec![traveller("Ann", "Lee", dt(1990, 1, 1, 3))]);
        let err = b.add_traveller(traveller("Ann", "Lee", dt(1990, 1, 1, 20))).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn add_appends_distinct_traveller() {
        let mut b = booking(vec![traveller("Ann", "Lee", dt(1990, 1, 1, 0))]);
        let added = b.add_traveller(traveller("Bob", "Lee", dt(1988, 3, 2, 0))).unwrap();
        assert_eq!(b.travellers.len(), 2);
        assert_eq!(b.travellers[1].id, added.id);
    }

    #[test]
    fn update_rejects_collision_with_other_traveller() {
        let dob = dt(1990, 1, 1, 0);
        let ann = traveller("Ann", "Lee", dob);
        let bob = traveller("Bob", "Lee", dt(1988, 3, 2, 0));
        let bob_id = bob.id;
        let mut b = booking(vec![ann, bob]);

        let err = b.update_traveller(bob_id, draft("ann", "LEE", dob)).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn update_colliding_only_with_itself_succeeds() {
        let dob = dt(1990, 1, 1, 0);
        let ann = traveller("Ann", "Lee", dob);
        let ann_id = ann.id;
        let mut b = booking(vec![ann, traveller("Bob", "Lee", dt(1988, 3, 2, 0))]);

        let mut updated = draft("Ann", "Lee", dob);
        updated.nationality = "Canada".to_string();
        let t = b.update_traveller(ann_id, updated).unwrap();
        assert_eq!(t.nationality, "Canada");
        assert_eq!(t.id, ann_id);
    }

    #[test]
    fn update_unknown_id_is_not_found() {
        let mut b = booking(vec![traveller("Ann", "Lee", dt(1990, 1, 1, 0))]);
        let err = b
            .update_traveller(ObjectId::new(), draft("Cara", "Day", dt(1992, 7, 4, 0)))
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn remove_refuses_last_traveller() {
        let ann = traveller("Ann", "Lee", dt(1990, 1, 1, 0));
        let ann_id = ann.id;
        let mut b = booking(vec![ann]);

        let err = b.remove_traveller(ann_id).unwrap_err();
        assert!(matches!(err, AppError::PreconditionFailed(_)));
        assert_eq!(b.travellers.len(), 1);
    }

    #[test]
    fn remove_returns_removed_traveller() {
        let ann = traveller("Ann", "Lee", dt(1990, 1, 1, 0));
        let bob = traveller("Bob", "Lee", dt(1988, 3, 2, 0));
        let bob_id = bob.id;
        let mut b = booking(vec![ann, bob]);

        let removed = b.remove_traveller(bob_id).unwrap();
        assert_eq!(removed.id, bob_id);
        assert_eq!(b.travellers.len(), 1);
    }

    #[test]
    fn remove_unknown_id_is_not_found() {
        let mut b = booking(vec![
            traveller("Ann", "Lee", dt(1990, 1, 1, 0)),
            traveller("Bob", "Lee", dt(1988, 3, 2, 0)),
        ]);
        let err = b.remove_traveller(ObjectId::new()).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn last_travel_date_today_classifies_as_upcoming() {
        let mut b = booking(vec![traveller("Ann", "Lee", dt(1990, 1, 1, 0))]);
        let today = NaiveDate::from_ymd_opt(2025, 6, 8).unwrap();

        // boundary: equal to start of today
        b.last_travel_date = dt(2025, 6, 8, 0);
        assert_eq!(b.temporal_status(today), TemporalStatus::Upcoming);

        b.last_travel_date = dt(2025, 6, 7, 23);
        assert_eq!(b.temporal_status(today), TemporalStatus::Completed);
    }

    #[test]
    fn duration_is_ceiling_of_day_difference() {
        let mut b = booking(vec![traveller("Ann", "Lee", dt(1990, 1, 1, 0))]);
        b.start_date = dt(2025, 6, 1, 0);
        b.end_date = dt(2025, 6, 8, 0);
        assert_eq!(b.duration_days(), 7);

        // partial day rounds up
        b.end_date = dt(2025, 6, 8, 12);
        assert_eq!(b.duration_days(), 8);
    }
}
