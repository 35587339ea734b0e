//! HTTP layer.
//!
//! ```text
//! GET  /zip      ?source=<base64 url>&filename=..&expires=..&signature=..
//! POST /zip      JSON body, x-zipfly-expires / x-zipfly-signature headers
//! GET  /healthz  liveness probe
//! ```
//!
//! Requests are authenticated (when the [`SignaturePolicy`] says so), parsed
//! into a [`ZipPayload`], validated into entries and only then answered
//! with `200` and a streamed archive.

mod handlers;
pub mod payload;

pub use payload::{DEFAULT_ARCHIVE_NAME, ZipPayload};

use axum::Router;
use axum::http::Method;
use axum::routing::get;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use url::Url;

use crate::error::FetchError;
use crate::io::HttpSource;
use crate::signature::{SignaturePolicy, SignatureValidator};

/// Number of body chunks buffered between the archive writer and the client.
const BODY_CHANNEL_CAPACITY: usize = 8;

/// Process-wide settings, fixed at construction.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Deployment environment; `production` enforces signatures.
    pub environment: String,
    /// Require signatures regardless of the environment.
    pub validate_signature: bool,
    pub signing_secret: String,
    /// Externally visible base URL, used to rebuild signed `GET` URLs.
    pub public_url: Url,
}

impl ServerOptions {
    pub fn signature_policy(&self) -> SignaturePolicy {
        SignaturePolicy::new(&self.environment, self.validate_signature)
    }

    pub fn must_validate_signature(&self) -> bool {
        self.signature_policy().is_enforced()
    }
}

/// State shared by all request handlers. Read-only after construction.
pub(crate) struct AppState {
    pub(crate) policy: SignaturePolicy,
    pub(crate) validator: SignatureValidator,
    pub(crate) source: Arc<HttpSource>,
}

/// The zip streaming server.
pub struct Server {
    state: Arc<AppState>,
}

impl Server {
    pub fn new(options: ServerOptions) -> Result<Self, FetchError> {
        Ok(Self::with_source(options, HttpSource::new()?))
    }

    /// Use an existing HTTP source for payload and content fetches.
    pub fn with_source(options: ServerOptions, source: HttpSource) -> Self {
        let state = AppState {
            policy: options.signature_policy(),
            validator: SignatureValidator::new(
                options.signing_secret.as_bytes(),
                options.public_url.clone(),
            ),
            source: Arc::new(source),
        };
        Self {
            state: Arc::new(state),
        }
    }

    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_headers(Any)
            .allow_methods([
                Method::GET,
                Method::HEAD,
                Method::POST,
                Method::PUT,
                Method::OPTIONS,
            ]);

        Router::new()
            .route("/zip", get(handlers::get_zip).post(handlers::post_zip))
            .route("/healthz", get(handlers::health))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(Arc::clone(&self.state))
    }

    /// Serve until `shutdown` resolves, then finish in-flight requests.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
    }
}
