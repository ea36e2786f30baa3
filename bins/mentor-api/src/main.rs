mod driver;
mod evaluator;
mod handlers;
mod judge;
mod llm;
mod parser;
mod pipeline;
mod piston;
mod routes;
mod tutor;

use axum::Router;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::llm::LlmClient;
use crate::piston::PistonClient;

const DEFAULT_PISTON_URL: &str = "https://emkc.org/api/v2/piston";
const DEFAULT_LLM_API_BASE: &str = "https://api.together.xyz/v1";
const DEFAULT_LLM_MODEL: &str = "meta-llama/Llama-4-Maverick-17B-128E-Instruct-FP8";

#[derive(Clone)]
pub struct AppState {
    pub redis: ConnectionManager,
    pub piston: PistonClient,
    pub llm: LlmClient,
}

#[tokio::main]
async fn main() {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Mentor API booting...");

    // Connect to Redis
    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());

    let client = redis::Client::open(redis_url.as_str()).expect("Failed to create Redis client");

    let redis_conn = ConnectionManager::new(client)
        .await
        .expect("Failed to connect to Redis");

    info!("Connected to Redis: {}", redis_url);

    let piston_url =
        std::env::var("PISTON_URL").unwrap_or_else(|_| DEFAULT_PISTON_URL.to_string());
    let piston = PistonClient::new(piston_url.clone());
    info!("Sandbox execution via {}", piston_url);

    let llm_api_base =
        std::env::var("LLM_API_BASE").unwrap_or_else(|_| DEFAULT_LLM_API_BASE.to_string());
    let llm_model = std::env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_LLM_MODEL.to_string());
    let llm_api_key = std::env::var("LLM_API_KEY").ok();
    if llm_api_key.is_none() {
        warn!("LLM_API_KEY not set; AI feedback and tutoring are disabled");
    }
    let llm = LlmClient::new(llm_api_base, llm_api_key, llm_model);

    let state = Arc::new(AppState {
        redis: redis_conn,
        piston,
        llm,
    });

    // Build router
    let app = Router::new().merge(routes::routes()).with_state(state);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    info!("HTTP server listening on {}", addr);
    info!("Ready to evaluate submissions");

    axum::serve(listener, app).await.expect("Server error");
}
