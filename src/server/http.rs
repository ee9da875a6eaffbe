//! Gateway routes
//!
//! One router serves both protocol surfaces:
//!
//! - `POST /graphql` - query and mutation endpoint (bearer token per request)
//! - `GET /graphql` - GraphQL Playground (interactive IDE)
//! - `GET /graphql/ws` - WebSocket transport for subscriptions
//! - `GET /health` - liveness JSON
//!
//! HTTP requests resolve identity per request from the `Authorization`
//! header; WebSocket connections fix identity once at `connection_init`.
//! Both surfaces are refused once shutdown begins.

use async_graphql::http::{
    playground_source, GraphQLPlaygroundConfig, WebSocketProtocols, WsMessage,
    ALL_WEBSOCKET_PROTOCOLS,
};
use async_graphql::ErrorExtensions;
use axum::{
    extract::{ws, State, WebSocketUpgrade},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::auth::{RequestAuth, TokenManager};
use crate::error::ApiError;
use crate::graphql::InkpressSchema;
use crate::server::shutdown::ShutdownCoordinator;

/// Close code sent to subscription clients when the server goes away.
const CLOSE_GOING_AWAY: u16 = 1001;

/// Shared gateway state
#[derive(Clone)]
pub struct GatewayState {
    /// The GraphQL schema, shared by both transports
    pub schema: InkpressSchema,
    /// Token manager for WebSocket `connection_init` verification
    pub tokens: Arc<TokenManager>,
    /// Shutdown coordinator for request and connection tracking
    pub coordinator: Arc<ShutdownCoordinator>,
    /// Idle timeout after which a silent WebSocket client is dropped
    pub ws_keepalive: Duration,
}

/// Create the gateway router with all endpoints
pub fn create_gateway_router(state: GatewayState) -> Router {
    Router::new()
        .route(
            "/graphql",
            get(graphql_playground_handler).post(graphql_handler),
        )
        .route("/graphql/ws", get(graphql_ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Bind the listener and serve until `shutdown` resolves.
pub async fn start_gateway(
    addr: SocketAddr,
    state: GatewayState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> crate::error::Result<()> {
    let app = create_gateway_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::AddrInUse {
            ApiError::Server(format!(
                "port {} is already in use. Fix: pass --bind-addr with a free port, \
                 or stop the existing process.",
                addr.port()
            ))
        } else {
            ApiError::Server(format!("failed to bind gateway to {addr}: {e}"))
        }
    })?;

    info!(addr = %addr, "gateway listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Handle GraphQL queries and mutations via POST.
///
/// The request guard pins the request in the shutdown coordinator for its
/// whole execution; once shutdown begins no guard is issued and the
/// request is refused with 503.
async fn graphql_handler(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Json(request): Json<async_graphql::Request>,
) -> Response {
    let Some(_guard) = state.coordinator.request_guard() else {
        return (StatusCode::SERVICE_UNAVAILABLE, "server is shutting down").into_response();
    };

    let auth = RequestAuth::from_authorization_header(
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok()),
    );

    let response = state.schema.execute(request.data(auth)).await;
    let body = serde_json::to_string(&response).unwrap_or_default();
    (StatusCode::OK, [("content-type", "application/json")], body).into_response()
}

/// Serve the GraphQL Playground IDE via GET
async fn graphql_playground_handler() -> impl IntoResponse {
    Html(playground_source(
        GraphQLPlaygroundConfig::new("/graphql").subscription_endpoint("/graphql/ws"),
    ))
}

/// Handle WebSocket connections for GraphQL subscriptions.
///
/// Negotiates the graphql-transport-ws sub-protocol and bridges axum's
/// WebSocket to async-graphql's subscription executor. The connection's
/// identity is fixed at `connection_init`: an `accessToken` connection
/// parameter is verified once, and a bad token fails the connection.
async fn graphql_ws_handler(State(state): State<GatewayState>, ws: WebSocketUpgrade) -> Response {
    if state.coordinator.is_shutting_down() {
        return (StatusCode::SERVICE_UNAVAILABLE, "server is shutting down").into_response();
    }

    let protocol = WebSocketProtocols::GraphQLWS;
    ws.protocols(ALL_WEBSOCKET_PROTOCOLS)
        .on_upgrade(move |socket| serve_subscription_socket(state, socket, protocol))
}

async fn serve_subscription_socket(
    state: GatewayState,
    socket: ws::WebSocket,
    protocol: WebSocketProtocols,
) {
    state.coordinator.connection_opened();
    let mut shutdown_rx = state.coordinator.subscribe();

    let (mut sink, stream) = socket.split();

    // Convert axum WS frames into the format async-graphql expects
    let input = stream.filter_map(|msg| async move {
        match msg {
            Ok(ws::Message::Text(text)) => Some(text.to_string()),
            _ => None,
        }
    });

    let tokens = state.tokens.clone();
    let mut gql_stream = Box::pin(
        async_graphql::http::WebSocket::new(state.schema.clone(), input, protocol)
            .on_connection_init(move |payload| async move {
                let auth =
                    RequestAuth::from_connection_params(&payload, &tokens).map_err(|e| e.extend())?;
                let mut data = async_graphql::Data::default();
                data.insert(auth);
                Ok(data)
            })
            .keepalive_timeout(state.ws_keepalive),
    );

    loop {
        tokio::select! {
            ws_msg = gql_stream.next() => {
                let Some(ws_msg) = ws_msg else { break };
                let axum_msg = match ws_msg {
                    WsMessage::Text(text) => ws::Message::Text(text.into()),
                    WsMessage::Close(code, reason) => {
                        ws::Message::Close(Some(ws::CloseFrame {
                            code,
                            reason: reason.into(),
                        }))
                    }
                };
                if sink.send(axum_msg).await.is_err() {
                    break;
                }
            }
            _ = shutdown_rx.recv() => {
                debug!("closing subscription connection for shutdown");
                let frame = ws::CloseFrame {
                    code: CLOSE_GOING_AWAY,
                    reason: "server shutting down".into(),
                };
                let _ = sink.send(ws::Message::Close(Some(frame))).await;
                break;
            }
        }
    }

    state.coordinator.connection_closed();
}

/// Liveness payload
#[derive(Debug, Serialize)]
struct HealthStatus {
    status: &'static str,
    active_connections: u64,
    in_flight_requests: u64,
}

/// Health check endpoint handler
async fn health_handler(State(state): State<GatewayState>) -> Response {
    let stats = state.coordinator.stats();
    let status = HealthStatus {
        status: if stats.is_shutting_down {
            "shutting_down"
        } else {
            "ok"
        },
        active_connections: stats.active_connections,
        in_flight_requests: stats.in_flight_requests,
    };

    let status_code = if stats.is_shutting_down {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (status_code, Json(status)).into_response()
}
