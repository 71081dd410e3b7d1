//! HTTP and websocket front end for the campus platform.
//!
//! REST handlers live under [`routes`], the realtime relay under [`chat`].
//! Every response body is the `{data, error}` envelope from [`error`].

pub mod auth;
pub mod chat;
pub mod error;
pub mod routes;
pub mod state;

use std::net::SocketAddr;

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    Router,
};
use campus_core::{config, CampusCore};
use tokio::{net::TcpListener, signal};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use crate::state::{AppState, State};

pub fn router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .core
        .config
        .clients_url
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION]);

    Router::new()
        .merge(routes::router())
        .merge(chat::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = config::get_or_init().await?;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let core = CampusCore::start(config).await?;
    let state = State::new(core);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "campus server listening");

    axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    state.core.clone().shutdown().await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("received Ctrl+C, shutting down"),
            Err(e) => {
                warn!(error = %e, "failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(e) => {
                warn!(error = %e, "failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        Router,
    };
    use campus_core::{config::CampusConfig, CampusCore};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::state::{AppState, State};

    pub async fn state() -> AppState {
        let core = CampusCore::start(CampusConfig::ephemeral())
            .await
            .expect("core failed to start");
        State::new(core)
    }

    pub async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value, Option<String>) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let cookie = res
            .headers()
            .get(header::SET_COOKIE)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json, cookie)
    }

    /// Signs up a chat member and returns `(user_id, token)`.
    pub async fn signup(app: &Router, name: &str, email: &str) -> (String, String) {
        let (status, body, _) = call(
            app,
            "POST",
            "/auth/signup",
            None,
            Some(json!({ "name": name, "email": email, "password": "secret123" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let data = &body["data"];
        (
            data["user"]["id"].as_str().unwrap().to_string(),
            data["token"].as_str().unwrap().to_string(),
        )
    }

    /// Registers an institute and returns `(institute_id, admin token)`.
    pub async fn register_institute(app: &Router, email: &str) -> (String, String) {
        let (status, body, _) = call(
            app,
            "POST",
            "/auth/institute/register",
            None,
            Some(json!({
                "name": "Northfield College",
                "kind": "private",
                "official_email": email,
                "official_phone": "0401234567",
                "address_line1": "1 College Road",
                "city": "Hyderabad",
                "state": "Telangana",
                "pincode": "500001",
                "admin_name": "Meera Rao",
                "admin_email": format!("admin.{email}"),
                "admin_password": "secret123",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let data = &body["data"];
        (
            data["institute"]["id"].as_str().unwrap().to_string(),
            data["token"].as_str().unwrap().to_string(),
        )
    }
}
