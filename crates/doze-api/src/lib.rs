//! doze-api — HTTP surface for the doze daemon.
//!
//! Routes map one-to-one onto [`ControlPlane`] operations and reply with
//! the serialized [`doze_control::OpReply`].
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/instance/start` | Wake the instance, arm the idle watch |
//! | POST | `/instance/stop` | Clean up and shelve the instance |
//! | GET | `/instance/status` | Raw provider status |
//! | GET | `/minecraft/status` | Whether the game server answers |
//! | GET | `/minecraft/players` | Online player count |
//! | GET | `/public/ping` | Liveness, never behind auth |
//!
//! When a bearer token is configured, everything except `/public/ping`
//! requires `Authorization: Bearer <token>` and answers 403 without it.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use doze_control::ControlPlane;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub plane: Arc<ControlPlane>,
}

/// Build the complete router, optionally fronted by bearer auth.
pub fn build_router(plane: Arc<ControlPlane>, auth_token: Option<String>) -> Router {
    let state = ApiState { plane };

    let mut protected = Router::new()
        .route("/instance/start", post(handlers::start_instance))
        .route("/instance/stop", post(handlers::stop_instance))
        .route("/instance/status", get(handlers::instance_status))
        .route("/minecraft/status", get(handlers::server_status))
        .route("/minecraft/players", get(handlers::online_players))
        .with_state(state.clone());

    if let Some(token) = auth_token {
        protected = protected.layer(middleware::from_fn_with_state(
            auth::AuthState::new(token),
            auth::require_bearer,
        ));
    }

    Router::new()
        .merge(protected)
        .route("/public/ping", get(handlers::public_ping).with_state(state))
}
