use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::http::Request;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, info_span};

use crate::kv::KvStore;

pub mod error;
pub mod views;

pub use error::ApiError;
pub use views::{Counter, ViewsResponse};

static HEALTH_MESSAGE: &str = "up";

/// Build the HTTP router over a shared counter store
pub fn router(store: Arc<dyn KvStore>) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .route(
            "/api/view/site",
            get(views::get_site_views).post(views::increment_site_views),
        )
        .route(
            "/api/view/{page_id}",
            get(views::get_page_views).put(views::increment_page_views),
        )
        // Requests lacking the page id segment land here and are rejected
        .route(
            "/api/view",
            get(views::missing_page_id).put(views::missing_page_id),
        )
        .route(
            "/api/view/",
            get(views::missing_page_id).put(views::missing_page_id),
        );

    let counter = Arc::new(AtomicUsize::new(0));

    router
        .layer(
            TraceLayer::new_for_http().make_span_with(move |request: &Request<_>| {
                let req_id = counter.fetch_add(1, Ordering::Relaxed);
                info_span!(
                    "http_request",
                    req_id,
                    method = ?request.method(),
                    path = ?request.uri(),
                )
            }),
        )
        .with_state(store)
}

async fn health() -> &'static str {
    HEALTH_MESSAGE
}

/// HTTP server
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    store: Arc<dyn KvStore>,
}

impl Server {
    /// Bind the listener; the store is shared by every request
    pub async fn bind(addr: SocketAddr, store: Arc<dyn KvStore>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("HTTP server bound to {}", local_addr);

        Ok(Self {
            listener,
            local_addr,
            store,
        })
    }

    /// Get local listening address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve requests until `shutdown` resolves
    pub async fn run<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!("Server started, listening on {}", self.local_addr);
        axum::serve(self.listener, router(self.store))
            .with_graceful_shutdown(shutdown)
            .await?;
        info!("Server stopped");
        Ok(())
    }
}
