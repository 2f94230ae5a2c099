use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::calculate::calculate;
use crate::config::Config;
use crate::error::CalculateError;
use crate::invoker::ModelInvoker;
use crate::models::{CalculateRequest, CalculateResponse, SUCCESS_MESSAGE};

#[derive(Clone)]
pub struct AppState {
    pub invoker: Arc<dyn ModelInvoker>,
}

pub fn router(state: AppState, config: &Config) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(config.allowed_origins.clone()))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(root))
        .route("/calculate", post(calculate_endpoint))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(cors)
        .with_state(state)
}

async fn root() -> impl IntoResponse {
    Json(json!({"message": "Server is running"}))
}

async fn calculate_endpoint(
    State(state): State<AppState>,
    payload: Result<Json<CalculateRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return CalculateError::InvalidBody(rejection.body_text()).into_response(),
    };

    match calculate(state.invoker.as_ref(), request).await {
        Ok(value) => {
            let response = CalculateResponse {
                message: SUCCESS_MESSAGE,
                value,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => e.into_response(),
    }
}
