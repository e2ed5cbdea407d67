//! HTTP endpoint handlers

use std::{convert::Infallible, sync::Arc};
use axum::{
    extract::State,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use futures::stream::{self, Stream};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::state::{AppState, TimerEvent};
use super::responses::{ApiResponse, DurationRequest, HealthResponse, StatusResponse};

fn record(state: &AppState, action: &str) {
    if let Err(e) = state.record_action(action) {
        warn!("Failed to record action {}: {}", action, e);
    }
}

/// Handle POST /duration - Clamp and apply the entered duration
pub async fn duration_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DurationRequest>,
) -> Json<ApiResponse> {
    let applied = state.timer.set_duration_raw(&request.hours, &request.minutes, &request.seconds);
    record(&state, "duration");

    Json(ApiResponse::new(
        format!("Duration set to {}", applied),
        state.timer.snapshot(),
    ))
}

/// Handle POST /start - Begin or resume the countdown
pub async fn start_handler(State(state): State<Arc<AppState>>) -> Json<ApiResponse> {
    let timer = state.timer.start();
    record(&state, "start");

    let message = if timer.state.is_running() {
        info!("Start endpoint called - countdown running");
        format!("Countdown running with {}s remaining", timer.remaining_seconds)
    } else {
        "Nothing to count down".to_string()
    };
    Json(ApiResponse::new(message, timer))
}

/// Handle POST /pause - Pause a running countdown
pub async fn pause_handler(State(state): State<Arc<AppState>>) -> Json<ApiResponse> {
    let timer = state.timer.pause();
    record(&state, "pause");

    info!("Pause endpoint called - timer is {}", timer.state);
    Json(ApiResponse::new(format!("Timer is {}", timer.state), timer))
}

/// Handle POST /reset - Clear the timer back to idle
pub async fn reset_handler(State(state): State<Arc<AppState>>) -> Json<ApiResponse> {
    let timer = state.timer.reset();
    record(&state, "reset");

    info!("Reset endpoint called - timer cleared");
    Json(ApiResponse::new("Timer reset".to_string(), timer))
}

/// Handle GET /status - Return the timer snapshot and server information
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let (last_action, last_action_time) = state.get_last_action();

    Json(StatusResponse {
        timer: state.timer.snapshot(),
        edit_policy: state.timer.edit_policy(),
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_action,
        last_action_time,
    })
}

/// Handle GET /events - Stream timer notifications as server-sent events
pub async fn events_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.subscribe();

    let events = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => return Some((Ok(to_sse(&event)), rx)),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event stream lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

fn to_sse(event: &TimerEvent) -> Event {
    Event::default()
        .event(event.kind())
        .json_data(event)
        .unwrap_or_else(|e| {
            warn!("Failed to encode timer event: {}", e);
            Event::default().comment("encoding error")
        })
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
