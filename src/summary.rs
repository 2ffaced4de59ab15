use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::booking::Booking;

const REQUEST_TIMEOUT_SECS: u64 = 30;
const SUMMARY_MAX_TOKENS: u32 = 200;
const SUMMARY_TEMPERATURE: f32 = 0.7;

const SYSTEM_PROMPT: &str = "You are a friendly travel assistant that creates engaging and \
personalized booking summaries for travelers. Keep summaries concise, warm, and exciting.";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("completion contained no choices")]
    EmptyCompletion,
}

/// External text-generation collaborator. Kept behind a trait so the summary
/// path can be exercised without network access.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, GenerationError>;
}

/// Chat-completions client for an OpenAI-compatible endpoint.
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, base_url: String) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(OpenAiClient {
            http,
            api_key,
            base_url,
            model: "gpt-3.5-turbo".to_string(),
        })
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn generate(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, GenerationError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: prompt },
            ],
            max_tokens,
            temperature,
        };

        let response = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<ChatResponse>()
            .await?;

        response
            .choices
            .first()
            .map(|choice| choice.message.content.trim().to_string())
            .ok_or(GenerationError::EmptyCompletion)
    }
}

/// Structured fields the prompt and the fallback sentence are built from.
#[derive(Debug)]
pub struct BookingHighlights {
    pub destination: String,
    pub origin: String,
    pub start_date: String,
    pub end_date: String,
    pub duration_days: i64,
    pub booking_type: String,
    pub traveller_count: usize,
    pub total_amount: f64,
    pub currency: String,
    pub service_details: String,
}

impl From<&Booking> for BookingHighlights {
    fn from(booking: &Booking) -> Self {
        let mut service_details = String::new();
        if let Some(flight) = &booking.flight_details {
            service_details.push_str(&format!(
                "Flight: {} {}, {} class. ",
                flight.airline,
                flight.flight_number,
                flight.class.as_str()
            ));
        }
        if let Some(hotel) = &booking.hotel_details {
            service_details.push_str(&format!(
                "Hotel: {}, {}, {} room(s). ",
                hotel.name, hotel.room_type, hotel.number_of_rooms
            ));
        }

        BookingHighlights {
            destination: format!("{}, {}", booking.destination.city, booking.destination.country),
            origin: format!("{}, {}", booking.origin.city, booking.origin.country),
            start_date: booking.start_date.to_chrono().format("%B %-d, %Y").to_string(),
            end_date: booking.end_date.to_chrono().format("%B %-d, %Y").to_string(),
            duration_days: booking.duration_days(),
            booking_type: booking.booking_type.as_str().to_string(),
            traveller_count: booking.travellers.len(),
            total_amount: booking.total_amount,
            currency: booking.currency.clone(),
            service_details,
        }
    }
}

fn build_prompt(h: &BookingHighlights) -> String {
    format!(
        "Generate a friendly and engaging booking summary for a travel booking with the \
following details:\n\n\
Destination: {}\n\
Origin: {}\n\
Travel Dates: {} to {}\n\
Duration: {} days\n\
Booking Type: {}\n\
Number of Travellers: {}\n\
Total Amount: {} {}\n\
{}\n\n\
Please create a warm, personalized summary that highlights the key aspects of this trip. \
Keep it concise but engaging, similar to: \"You're traveling to Dubai from Delhi on 15th \
June 2025. Your booking includes round-trip flights and hotel stay for 5 days.\"\n\n\
Make it sound exciting and personal, focusing on the destination and key highlights.",
        h.destination,
        h.origin,
        h.start_date,
        h.end_date,
        h.duration_days,
        h.booking_type,
        h.traveller_count,
        h.currency,
        h.total_amount,
        h.service_details,
    )
}

/// Deterministic sentence built purely from the structured fields.
pub fn fallback_summary(h: &BookingHighlights) -> String {
    format!(
        "You're traveling to {} from {} on {}. Your {}-day {} booking for {} traveller(s) \
includes all the essentials for a great trip!",
        h.destination, h.origin, h.start_date, h.duration_days, h.booking_type, h.traveller_count
    )
}

#[derive(Debug)]
pub struct SummaryOutcome {
    pub summary: String,
    pub fallback: bool,
}

/// Runs the generator and absorbs any failure into the fallback sentence.
/// This path never fails; callers always get a usable summary.
pub async fn summarize(generator: &dyn TextGenerator, highlights: &BookingHighlights) -> SummaryOutcome {
    let prompt = build_prompt(highlights);

    match generator
        .generate(SYSTEM_PROMPT, &prompt, SUMMARY_MAX_TOKENS, SUMMARY_TEMPERATURE)
        .await
    {
        Ok(text) => SummaryOutcome { summary: text.trim().to_string(), fallback: false },
        Err(err) => {
            tracing::warn!(error = %err, "text generation failed, using fallback summary");
            SummaryOutcome { summary: fallback_summary(highlights), fallback: true }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn highlights() -> BookingHighlights {
        BookingHighlights {
            destination: "Dubai, UAE".to_string(),
            origin: "Delhi, India".to_string(),
            start_date: "June 1, 2025".to_string(),
            end_date: "June 8, 2025".to_string(),
            duration_days: 7,
            booking_type: "package".to_string(),
            traveller_count: 2,
            total_amount: 1500.0,
            currency: "USD".to_string(),
            service_details: String::new(),
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl TextGenerator for FailingGenerator {
        async fn generate(&self, _: &str, _: &str, _: u32, _: f32) -> Result<String, GenerationError> {
            Err(GenerationError::EmptyCompletion)
        }
    }

    struct EchoGenerator;

    #[async_trait]
    impl TextGenerator for EchoGenerator {
        async fn generate(&self, _: &str, _: &str, _: u32, _: f32) -> Result<String, GenerationError> {
            Ok("  A wonderful trip awaits!  ".to_string())
        }
    }

    #[test]
    fn fallback_is_built_from_structured_fields_only() {
        let summary = fallback_summary(&highlights());
        assert_eq!(
            summary,
            "You're traveling to Dubai, UAE from Delhi, India on June 1, 2025. Your 7-day \
package booking for 2 traveller(s) includes all the essentials for a great trip!"
        );
    }

    #[test]
    fn prompt_carries_every_structured_field() {
        let prompt = build_prompt(&highlights());
        assert!(prompt.contains("Destination: Dubai, UAE"));
        assert!(prompt.contains("Origin: Delhi, India"));
        assert!(prompt.contains("Travel Dates: June 1, 2025 to June 8, 2025"));
        assert!(prompt.contains("Duration: 7 days"));
        assert!(prompt.contains("Number of Travellers: 2"));
        assert!(prompt.contains("Total Amount: USD 1500"));
    }

    #[tokio::test]
    async fn generator_failure_is_absorbed_into_fallback() {
        let outcome = summarize(&FailingGenerator, &highlights()).await;
        assert!(outcome.fallback);
        assert!(!outcome.summary.is_empty());
        assert!(outcome.summary.contains("Dubai, UAE"));
    }

    #[tokio::test]
    async fn successful_generation_is_returned_trimmed() {
        let outcome = summarize(&EchoGenerator, &highlights()).await;
        assert!(!outcome.fallback);
        assert_eq!(outcome.summary, "A wonderful trip awaits!");
    }
}
