// Route table for the Mentor API

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

use crate::{handlers, tutor, AppState};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status", get(handlers::health_check))
        .route("/v1/execute/code/run", post(handlers::evaluate_code))
        .route("/v1/tutor/interact", post(tutor::interact))
        .route("/v1/tutor/explain_test_case", post(tutor::explain_test_case))
        .route("/v1/tutor/evaluate", post(handlers::tutor_evaluate))
        .route("/v1/chat/general", post(tutor::general_chat))
}
