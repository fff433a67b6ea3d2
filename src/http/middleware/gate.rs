//! Gate middleware.
//! Runs the request gate ahead of every handler.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::request::RequestIdExt;
use crate::http::response::ApiError;
use crate::observability::metrics;
use crate::security::gate::{GateOutcome, RequestGate};

pub async fn gate_middleware(
    State(gate): State<Arc<RequestGate>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let outcome = gate.evaluate(req.uri().path(), req.headers()).await;

    match outcome {
        GateOutcome::Pass(caller) => {
            metrics::record_gate_decision("pass");
            tracing::debug!(
                request_id = %req.headers().request_id(),
                user_id = caller.identity().map(|i| i.user_id()).unwrap_or("-"),
                "Gate passed"
            );
            req.extensions_mut().insert(caller);
            next.run(req).await
        }
        GateOutcome::Redirect(location) => {
            metrics::record_gate_decision("redirect");
            (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
        }
        GateOutcome::RateLimited { retry_after_secs } => {
            metrics::record_gate_decision("rate_limited");
            metrics::record_rate_limited();
            ApiError::RateLimited { retry_after_secs }.into_response()
        }
    }
}
