mod db;
mod models;
mod routemount;
mod routes;
mod state;
mod summary;
mod utils;

use std::sync::Arc;

use db::init_db;
use state::AppState;
use summary::OpenAiClient;
use tracing_subscriber::EnvFilter;

use crate::routemount::route::create_router;

#[tokio::main]
async fn main() {

    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mongodb_uri = std::env::var("MONGODB_URI").expect("MONGODB_URI is missing in env");
    let db_name = std::env::var("MONGODB_DB").unwrap_or("travel_booking".to_string());
    let server_address = std::env::var("SERVER_ADDRESS").unwrap_or("127.0.0.1:7870".to_string());
    let openai_api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
    let openai_base_url =
        std::env::var("OPENAI_BASE_URL").unwrap_or("https://api.openai.com".to_string());

    //connect to db
    let db = init_db(&mongodb_uri, &db_name).await;

    let generator = OpenAiClient::new(openai_api_key, openai_base_url)
        .expect("failed to build http client");

    let app = create_router(AppState { db, generator: Arc::new(generator) });

    let listener = tokio::net::TcpListener::bind(&server_address).await.unwrap();
    tracing::info!("server running on {server_address}");
    axum::serve(listener, app).await.unwrap();
}
