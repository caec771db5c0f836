//! HTTP transport: wallets redirect the browser to `GET /callback/...`

use std::sync::Arc;

use axum::{
    extract::State,
    http::{StatusCode, Uri},
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use wallet_bridge::ResponseDispatcher;

use super::TransportError;

/// Shared state for HTTP handlers
struct AppState {
    dispatcher: ResponseDispatcher,
    /// Scheme and authority the wallet used to reach us
    public_url: String,
}

pub struct HttpTransport {
    dispatcher: ResponseDispatcher,
    port: u16,
    public_url: String,
}

impl HttpTransport {
    pub fn new(dispatcher: ResponseDispatcher, port: u16, public_url: impl Into<String>) -> Self {
        Self {
            dispatcher,
            port,
            public_url: public_url.into(),
        }
    }

    pub fn router(&self) -> Router {
        let state = Arc::new(AppState {
            dispatcher: self.dispatcher.clone(),
            public_url: self.public_url.trim_end_matches('/').to_string(),
        });

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/", get(health))
            .route("/health", get(health))
            .route("/callback/*rest", get(handle_callback))
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
            .with_state(state)
    }

    pub async fn run(&self) -> Result<(), TransportError> {
        let addr = format!("0.0.0.0:{}", self.port);
        info!("Listening for wallet callbacks on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, self.router()).await?;

        Ok(())
    }
}

/// Health check endpoint
async fn health() -> &'static str {
    "OK"
}

async fn handle_callback(State(state): State<Arc<AppState>>, uri: Uri) -> (StatusCode, &'static str) {
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    let callback = format!("{}{}", state.public_url, path);
    debug!("HTTP callback: {}", callback);

    if state.dispatcher.handle_response(&callback).await {
        (StatusCode::OK, "Wallet response received. You can return to the app.")
    } else {
        (StatusCode::NOT_FOUND, "No request is waiting for this callback")
    }
}
