//! HTTP endpoint handlers

use std::{convert::Infallible, sync::Arc};
use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use futures::stream::{self, Stream};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, warn};

use crate::{panel::UserIntent, state::AppState};
use super::responses::{AddTimeRequest, HealthResponse, IntentResponse, StatusResponse};

async fn submit_intent(
    state: &AppState,
    intent: UserIntent,
) -> Result<Json<IntentResponse>, StatusCode> {
    let outcome = state.panel.submit(intent).await.map_err(|e| {
        error!("Failed to submit {:?}: {}", intent, e);
        StatusCode::SERVICE_UNAVAILABLE
    })?;

    info!("{:?} -> {:?}", intent, outcome);
    Ok(Json(IntentResponse::new(outcome, state.panel.view())))
}

/// Handle POST /start - Start the appliance with the dialed time
pub async fn start_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<IntentResponse>, StatusCode> {
    submit_intent(&state, UserIntent::Start).await
}

/// Handle POST /pause
pub async fn pause_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<IntentResponse>, StatusCode> {
    submit_intent(&state, UserIntent::Pause).await
}

/// Handle POST /stop - Stop the appliance and the local session
pub async fn stop_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<IntentResponse>, StatusCode> {
    submit_intent(&state, UserIntent::Stop).await
}

/// Handle POST /time - Dial time up or down
pub async fn add_time_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AddTimeRequest>,
) -> Result<Json<IntentResponse>, StatusCode> {
    submit_intent(&state, UserIntent::AddTime { delta: request.delta }).await
}

/// Handle GET /status - Return panel and session status
pub async fn status_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusResponse>, StatusCode> {
    let panel = match state.panel.refresh().await {
        Ok(view) => view,
        Err(e) => {
            error!("Failed to read panel view: {}", e);
            return Err(StatusCode::SERVICE_UNAVAILABLE);
        }
    };

    Ok(Json(StatusResponse {
        panel,
        session: state.session.snapshot(),
        hosting: state.session.is_hosting(),
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
    }))
}

/// Handle GET /events - Server-sent stream of panel and session events
pub async fn events_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("Event stream attached");

    let panel = event_stream(state.panel.subscribe(), "panel");
    let session = event_stream(state.session.subscribe(), "session");

    Sse::new(stream::select(panel, session)).keep_alive(KeepAlive::default())
}

/// Turn a broadcast receiver into an SSE stream, skipping over lag
fn event_stream<T>(
    rx: broadcast::Receiver<T>,
    name: &'static str,
) -> impl Stream<Item = Result<Event, Infallible>>
where
    T: Clone + Serialize + Send + 'static,
{
    stream::unfold(rx, move |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(item) => match Event::default().event(name).json_data(&item) {
                    Ok(event) => return Some((Ok(event), rx)),
                    Err(e) => warn!("Failed to encode {} event: {}", name, e),
                },
                Err(RecvError::Lagged(missed)) => {
                    warn!("Event stream skipped {} {} events", missed, name);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
