//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the forwarding handler
//! - Wire up middleware (tracing, request ID, timeout, response override)
//! - Bind server to listener
//! - Forward requests to the upstream
//! - Swap in new override rules on configuration reload

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{
        header,
        uri::{Authority, PathAndQuery, Scheme},
        HeaderMap, HeaderName, Request, StatusCode, Uri,
    },
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::loader::ConfigError;
use crate::config::ProxyConfig;
use crate::http::layer::ResponseOverrideLayer;
use crate::rewrite::{OverrideEngine, TracingNotifier};

/// Headers that describe a single connection and must not be forwarded.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub client: Client<HttpConnector, Body>,
    pub upstream: Authority,
}

/// HTTP server for the response override proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    engine: Arc<ArcSwap<OverrideEngine>>,
}

impl HttpServer {
    /// Create a new HTTP server from a validated configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, ConfigError> {
        let engine = Arc::new(ArcSwap::from_pointee(build_engine(&config)?));

        let upstream = Authority::from_str(&config.upstream.address).map_err(|_| {
            ConfigError::Validation(vec![crate::config::ValidationError::InvalidAddress {
                field: "upstream.address",
                value: config.upstream.address.clone(),
            }])
        })?;

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(
            config.upstream.connect_timeout_secs,
        )));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        let state = AppState { client, upstream };
        let router = Self::build_router(&config, state, engine.clone());

        Ok(Self {
            router,
            config,
            engine,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(
        config: &ProxyConfig,
        state: AppState,
        engine: Arc<ArcSwap<OverrideEngine>>,
    ) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(ResponseOverrideLayer::shared(engine))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until `shutdown` fires.
    ///
    /// Configurations received on `config_updates` replace the override rules;
    /// the listener and upstream stay as they were at startup.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.address,
            rules = self.engine.load().rule_count(),
            "HTTP server starting"
        );

        let engine = self.engine.clone();
        let current = self.config.clone();
        tokio::spawn(async move {
            while let Some(update) = config_updates.recv().await {
                apply_update(&engine, &current, &update);
            }
        });

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

fn build_engine(config: &ProxyConfig) -> Result<OverrideEngine, ConfigError> {
    let rules = &config.response_override;
    OverrideEngine::new(rules, Arc::new(TracingNotifier::new(rules.name.clone())))
}

fn apply_update(engine: &ArcSwap<OverrideEngine>, current: &ProxyConfig, update: &ProxyConfig) {
    if update.listener != current.listener || update.upstream != current.upstream {
        tracing::warn!(
            "Listener and upstream changes require a restart; only override rules are reloaded"
        );
    }

    match build_engine(update) {
        Ok(next) => {
            tracing::info!(
                instance = %next.name(),
                rules = next.rule_count(),
                "Override rules reloaded"
            );
            engine.store(Arc::new(next));
        }
        Err(e) => {
            tracing::error!(error = %e, "Rejected override rules, keeping current set");
        }
    }
}

/// Forward the request to the upstream and return its response as is.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let (mut parts, body) = request.into_parts();

    tracing::debug!(method = %parts.method, path = %parts.uri.path(), "Forwarding request");

    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(state.upstream.clone());
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    parts.uri = match Uri::from_parts(uri_parts) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::warn!(error = %e, "Cannot build upstream URI");
            return (StatusCode::BAD_REQUEST, "Invalid request URI").into_response();
        }
    };
    strip_hop_by_hop(&mut parts.headers);

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => {
            let (mut parts, body) = response.into_parts();
            strip_hop_by_hop(&mut parts.headers);
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(error = %e, upstream = %state.upstream, "Upstream error");
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}

/// Remove the fixed hop-by-hop set plus any header named in `Connection`.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .collect();
    for name in listed {
        headers.remove(name);
    }

    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}
