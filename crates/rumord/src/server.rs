//! rumord server - HTTP endpoint and broadcast loop

use crate::config::Config;
use crate::exchange::{Exchange, ExchangeError, ExchangeStats};
use crate::node::LocalNode;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use rumor_core::{NodeId, NodeRecord, SystemClock, MEDIA_TYPE};
use rumor_net::{HttpTransport, TransportError};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Server errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Seed error: {0:#}")]
    Seed(anyhow::Error),
}

/// Build the HTTP router: a single `POST /` accepting pushes
pub fn router(exchange: Arc<Exchange>) -> Router {
    Router::new()
        .route("/", post(push_handler))
        .with_state(exchange)
}

async fn push_handler(State(exchange): State<Arc<Exchange>>, body: Bytes) -> Response {
    match exchange.handle_push(&body) {
        Ok(response) => {
            let status = response.status.as_http();
            match response.body {
                Some(body) => (status, [(header::CONTENT_TYPE, MEDIA_TYPE)], body).into_response(),
                None => status.into_response(),
            }
        }
        Err(e @ ExchangeError::Malformed(_)) => {
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
        Err(e) => {
            error!("Failed to answer push: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Serve pushes on an already-bound listener until `shutdown` fires
pub async fn serve(
    listener: TcpListener,
    exchange: Arc<Exchange>,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    axum::serve(listener, router(exchange))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}

/// Server state
pub struct Server {
    config: Config,
    exchange: Arc<Exchange>,
    /// Shutdown signal
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: Config) -> Result<Self, ServerError> {
        let id = config
            .node_id
            .clone()
            .map(NodeId::from)
            .unwrap_or_else(NodeId::generate);
        let record = NodeRecord::new(id, config.advertise_address());
        let node = Arc::new(LocalNode::new(record, Arc::new(SystemClock)));

        for seed in config.load_seeds().map_err(ServerError::Seed)? {
            let peer = seed.id.clone();
            if !node.seed(seed) {
                warn!("Ignoring seed record {}", peer);
            }
        }

        let transport = HttpTransport::new(config.request_timeout())?;
        let exchange = Arc::new(Exchange::new(node, transport));
        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            config,
            exchange,
            shutdown_tx,
        })
    }

    /// Get the local node id
    pub fn node_id(&self) -> &NodeId {
        self.exchange.node().id()
    }

    /// Run the server
    pub async fn run(&self) -> Result<(), ServerError> {
        info!(
            "Starting rumord on {} (node: {}, advertised as {})",
            self.config.listen,
            self.node_id(),
            self.exchange.node().address()
        );

        let listener = TcpListener::bind(&self.config.listen).await?;
        info!("Listening on {}", self.config.listen);

        let serve_handle = tokio::spawn(serve(
            listener,
            self.exchange.clone(),
            self.shutdown_tx.subscribe(),
        ));

        for address in &self.config.bootstrap {
            match self.exchange.introduce(address).await {
                Ok(status) => info!("Introduced to {} ({:?})", address, status),
                Err(e) => warn!("Bootstrap to {} failed: {}", address, e),
            }
        }

        let broadcast_handle = self.spawn_broadcast_task();

        let result = match serve_handle.await {
            Ok(result) => result.map_err(ServerError::from),
            Err(e) => Err(ServerError::Io(std::io::Error::other(e))),
        };

        broadcast_handle.abort();
        info!("Stopped ({:?})", self.stats());
        result
    }

    /// Spawn background broadcast task
    fn spawn_broadcast_task(&self) -> tokio::task::JoinHandle<()> {
        let exchange = self.exchange.clone();
        let period = self.config.broadcast_interval();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match exchange.broadcast().await {
                            Ok(()) => debug!("Broadcast round complete"),
                            Err(e) => warn!("Broadcast round aborted: {}", e),
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        })
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get server statistics
    pub fn stats(&self) -> ExchangeStats {
        self.exchange.stats()
    }
}
