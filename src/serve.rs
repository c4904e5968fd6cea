//! Purpose: Provide the demo HTTP function server for faaskit.
//! Exports: `ServeConfig`, `serve`.
//! Role: Axum wiring of admit → strict decode → background side task → JSON response.
//! Invariants: Every request passes `RequestValidator::admit` before its body is read.
//! Invariants: Body ceilings are enforced by `JsonCodec`, not by axum's default limit.
//! Invariants: Error responses are `StructuredError` envelopes; CORS headers already set survive.
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::{ConnectInfo, DefaultBodyLimit, Request, State};
use axum::http::{Method, StatusCode};
use axum::response::Response;
use axum::routing::any;
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use faaskit::{
    CorsOutcome, Error, ErrorKind, HandlerConfig, JsonCodec, RequestValidator, StructuredError,
    background, client_address, write_json, write_json_error,
};

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub bind: SocketAddr,
    pub handler: HandlerConfig,
}

struct AppState {
    validator: RequestValidator,
    codec: JsonCodec,
}

#[derive(Debug, Deserialize)]
struct EchoRequest {
    message: String,
    uppercase: Option<bool>,
}

pub async fn serve(config: ServeConfig) -> Result<(), Error> {
    config.handler.validate()?;

    init_tracing();

    let state = Arc::new(AppState {
        validator: config.handler.validator(),
        codec: config.handler.codec(),
    });

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to bind server")
                .with_source(err)
        })?;
    tracing::info!(
        bind = %config.bind,
        origins = config.handler.origins.len(),
        max_body_bytes = config.handler.max_body_bytes,
        "serving"
    );

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("server failed")
            .with_source(err)
    })
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", any(handle))
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    #[cfg(not(unix))]
    ctrl_c.await;
}

async fn handle(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    let (parts, body) = request.into_parts();
    let mut response = Response::default();

    match state
        .validator
        .admit(&parts.method, &parts.headers, &mut response)
    {
        Ok(CorsOutcome::Preflight) => return response,
        Ok(CorsOutcome::Continue) => {}
        Err(err) => return error_response(response, &err),
    }

    if parts.method == Method::GET {
        return json_response(response, &json!({ "ok": true }));
    }

    let payload: EchoRequest = match state.codec.read_body(body).await {
        Ok(payload) => payload,
        Err(err) => return error_response(response, &err),
    };

    let client = client_address(Some(peer), &parts.headers);
    let audit_client = client.clone();
    let length = payload.message.len();
    if let Err(err) = background(move || {
        tracing::info!(client = %audit_client, length, "echo handled");
    }) {
        tracing::warn!(error = %err, "audit task not started");
    }

    let message = if payload.uppercase.unwrap_or(false) {
        payload.message.to_uppercase()
    } else {
        payload.message
    };
    json_response(response, &json!({ "message": message, "client": client }))
}

fn json_response(mut response: Response, payload: &serde_json::Value) -> Response {
    if let Err(err) = write_json(&mut response, StatusCode::OK, payload, None) {
        return error_response(response, &err);
    }
    response
}

fn error_response(mut response: Response, err: &Error) -> Response {
    let body = StructuredError::from(err);
    if let Err(encode_err) = write_json_error(&mut response, &body) {
        tracing::error!(error = %encode_err, "failed to encode error response");
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    }
    response
}
