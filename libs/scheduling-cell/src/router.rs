use std::sync::Arc;

use axum::{middleware, routing::post, Router};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, ReportState};

pub fn report_routes(config: Arc<AppConfig>, state: Arc<ReportState>) -> Router {
    Router::new()
        .route("/report", post(handlers::generate_report))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(state)
}
