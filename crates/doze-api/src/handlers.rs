//! Route handlers.
//!
//! Each handler calls one control-plane operation and renders the reply.
//! The HTTP status derives from the reply: accepted is 200, a state
//! conflict is 409, an unreachable game server is 503 where reachability
//! was the question.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use doze_control::{ControlError, ControlResult, OpReply, codes};

use crate::ApiState;

/// Reply codes minted by the transport itself.
const PROVIDER_ERROR: &str = "PROVIDER_ERROR";
const CLEANUP_FAILED: &str = "CLEANUP_FAILED";

fn op_response(reply: OpReply) -> Response {
    let status = if reply.success {
        StatusCode::OK
    } else if reply.code == codes::SERVER_OFFLINE {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::CONFLICT
    };
    (status, Json(reply)).into_response()
}

fn render(result: ControlResult<OpReply>) -> Response {
    match result {
        Ok(reply) => op_response(reply),
        Err(err) => {
            error!(%err, "operation failed");
            let (status, code) = match &err {
                ControlError::Api(_) => (StatusCode::BAD_GATEWAY, PROVIDER_ERROR),
                ControlError::Cleanup(_) => (StatusCode::INTERNAL_SERVER_ERROR, CLEANUP_FAILED),
            };
            (
                status,
                Json(OpReply {
                    success: false,
                    code,
                    message: err.to_string(),
                }),
            )
                .into_response()
        }
    }
}

// ── Instance ───────────────────────────────────────────────────

/// POST /instance/start
pub async fn start_instance(State(state): State<ApiState>) -> Response {
    render(state.plane.start().await)
}

/// POST /instance/stop
pub async fn stop_instance(State(state): State<ApiState>) -> Response {
    render(state.plane.stop().await)
}

/// GET /instance/status
pub async fn instance_status(State(state): State<ApiState>) -> Response {
    render(state.plane.status().await)
}

// ── Game server ────────────────────────────────────────────────

/// GET /minecraft/status
pub async fn server_status(State(state): State<ApiState>) -> Response {
    op_response(state.plane.server_status().await)
}

/// GET /minecraft/players
pub async fn online_players(State(state): State<ApiState>) -> Response {
    op_response(state.plane.players().await)
}

// ── Public ─────────────────────────────────────────────────────

/// GET /public/ping
pub async fn public_ping(State(state): State<ApiState>) -> Response {
    op_response(state.plane.ping())
}
