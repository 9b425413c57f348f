//! `ParlorServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use parlor_core::{RoomId, SessionToken};
use parlor_rooms::CoordinatorHandle;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::config::ServerConfig;
use crate::health;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::session::run_ws_session;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Front door to the room coordinator.
    pub coordinator: CoordinatorHandle,
    /// Gateway configuration.
    pub config: Arc<ServerConfig>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
}

/// Query string of a WebSocket join request.
#[derive(Debug, Default, Deserialize)]
pub struct JoinQuery {
    /// Room to join. Required.
    pub room: Option<String>,
    /// Reconnection token from an earlier `session` event.
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// Why a join request was refused before upgrading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomParamError {
    /// No `room` parameter, or only whitespace.
    Missing,
    /// Longer than the configured limit.
    TooLong,
}

/// Validate the `room` parameter.
pub fn parse_room(raw: Option<&str>, max_chars: usize) -> Result<RoomId, RoomParamError> {
    let room = raw.map(str::trim).unwrap_or_default();
    if room.is_empty() {
        return Err(RoomParamError::Missing);
    }
    if room.chars().count() > max_chars {
        return Err(RoomParamError::TooLong);
    }
    Ok(RoomId::from(room))
}

/// The Parlor server.
pub struct ParlorServer {
    config: Arc<ServerConfig>,
    coordinator: CoordinatorHandle,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl ParlorServer {
    /// Create a new server around a running coordinator.
    pub fn new(
        config: ServerConfig,
        coordinator: CoordinatorHandle,
        shutdown: Arc<ShutdownCoordinator>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            coordinator,
            shutdown,
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            coordinator: self.coordinator.clone(),
            config: Arc::clone(&self.config),
            shutdown: Arc::clone(&self.shutdown),
            start_time: self.start_time,
        };

        Router::new()
            .route("/", get(ws_handler))
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/keep-alive", get(keep_alive_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind the listener and serve until the shutdown token fires.
    ///
    /// Returns the bound address (useful with port `0`) and the server task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();

        let handle = tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = served {
                error!(error = %e, "server error");
            }
        });

        info!(%local_addr, "parlor server listening");
        Ok((local_addr, handle))
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /ws?room=<id>&sessionId=<token>
async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<JoinQuery>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let room_id = match parse_room(query.room.as_deref(), state.config.max_room_id_chars) {
        Ok(room_id) => room_id,
        Err(RoomParamError::Missing) => {
            debug!("join without room parameter");
            return (StatusCode::BAD_REQUEST, "missing room parameter").into_response();
        }
        Err(RoomParamError::TooLong) => {
            debug!("join with overlong room parameter");
            return (StatusCode::BAD_REQUEST, "room parameter too long").into_response();
        }
    };
    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => return rejection.into_response(),
    };
    let token = query.session_id.as_deref().and_then(SessionToken::from_client);

    upgrade.on_upgrade(move |socket| {
        run_ws_session(
            socket,
            room_id,
            token,
            state.coordinator,
            state.config,
            state.shutdown.token(),
        )
    })
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Response {
    match state.coordinator.stats().await {
        Ok(stats) => Json(health::health_check(state.start_time, stats)).into_response(),
        Err(_) => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

/// GET /keep-alive
async fn keep_alive_handler() -> StatusCode {
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use parlor_rooms::spawn_coordinator;
    use parlor_settings::RoomSettings;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    fn make_server() -> ParlorServer {
        let (coordinator, _task) =
            spawn_coordinator(RoomSettings::default(), CancellationToken::new());
        ParlorServer::new(
            ServerConfig::default(),
            coordinator,
            Arc::new(ShutdownCoordinator::new()),
        )
    }

    async fn get(app: Router, uri: &str) -> Response {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        app.oneshot(req).await.unwrap()
    }

    #[test]
    fn parse_room_rules() {
        assert_eq!(parse_room(Some(" r1 "), 64), Ok(RoomId::from("r1")));
        assert_eq!(parse_room(None, 64), Err(RoomParamError::Missing));
        assert_eq!(parse_room(Some("   "), 64), Err(RoomParamError::Missing));
        assert_eq!(parse_room(Some("abcdef"), 5), Err(RoomParamError::TooLong));
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let server = make_server();
        let resp = get(server.router(), "/health").await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["connections"], 0);
        assert_eq!(parsed["rooms"], 0);
        assert_eq!(parsed["sessions"], 0);
    }

    #[tokio::test]
    async fn keep_alive_is_no_content() {
        let server = make_server();
        let resp = get(server.router(), "/keep-alive").await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn ws_without_room_is_bad_request() {
        let server = make_server();
        assert_eq!(get(server.router(), "/ws").await.status(), StatusCode::BAD_REQUEST);
        assert_eq!(get(server.router(), "/ws?room=").await.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            get(server.router(), "/?sessionId=abc").await.status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn ws_with_overlong_room_is_bad_request() {
        let server = make_server();
        let uri = format!("/ws?room={}", "r".repeat(65));
        assert_eq!(get(server.router(), &uri).await.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn plain_get_with_room_is_not_upgraded() {
        let server = make_server();
        let status = get(server.router(), "/ws?room=r1").await.status();
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let server = make_server();
        let resp = get(server.router(), "/nonexistent").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_unavailable_after_coordinator_stops() {
        let cancel = CancellationToken::new();
        let (coordinator, task) = spawn_coordinator(RoomSettings::default(), cancel.clone());
        let server = ParlorServer::new(
            ServerConfig::default(),
            coordinator,
            Arc::new(ShutdownCoordinator::new()),
        );
        cancel.cancel();
        task.await.unwrap();

        let resp = get(server.router(), "/health").await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn listen_binds_ephemeral_port_and_stops_on_shutdown() {
        let server = make_server();
        let (addr, handle) = server.listen().await.unwrap();
        assert_ne!(addr.port(), 0);
        assert!(!server.shutdown().is_shutting_down());

        server.shutdown().shutdown();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
