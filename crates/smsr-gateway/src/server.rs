use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use smsr_core::{telegram::TelegramChannel, NotificationChannel};
use std::sync::Arc;
use tokio::{sync::watch, task::JoinHandle};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::{self, AppState};
use crate::auth::require_auth_key;
use crate::config::GatewayConfig;

/// Build the HTTP surface. Only `/receive_data` sits behind the auth key;
/// legacy envelopes authenticate through decryption.
pub fn router(state: AppState, max_body_size: usize) -> Router {
    Router::new()
        .route("/receive_data", post(api::receive_data))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth_key))
        .route("/", post(api::legacy_ingest))
        .route("/health", get(api::get_health))
        .route("/metrics", get(api::get_metrics))
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub struct GatewayServer {
    config: GatewayConfig,
    state: AppState,
    shutdown_tx: watch::Sender<bool>,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, channel: Arc<dyn NotificationChannel>) -> anyhow::Result<Self> {
        config.validate()?;

        let state = AppState::new(&config, channel)?;
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            config,
            state,
            shutdown_tx,
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the Telegram ID responder until the server shuts down.
    pub fn spawn_id_responder(&self, telegram: Arc<TelegramChannel>) -> JoinHandle<()> {
        let shutdown_rx = self.shutdown_tx.subscribe();
        let poll_timeout = self.config.poll_timeout();
        tokio::spawn(async move { telegram.run_id_responder(poll_timeout, shutdown_rx).await })
    }

    pub async fn start(&self) -> anyhow::Result<()> {
        let app = router(self.state.clone(), self.config.max_body_size);

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        info!("smsr-gateway listening on {} (HTTP)", self.config.bind_addr);
        if self.state.legacy.is_some() {
            info!("legacy encrypted ingestion enabled on POST /");
        }

        let shutdown_rx = self.shutdown_tx.subscribe();
        axum::serve(listener, app)
            .with_graceful_shutdown(Self::shutdown_signal(shutdown_rx))
            .await?;

        // Stop background tasks once the listener is gone.
        self.shutdown();
        Ok(())
    }

    async fn shutdown_signal(mut shutdown: watch::Receiver<bool>) {
        #[cfg(unix)]
        let mut sigterm = {
            use tokio::signal::unix::{signal, SignalKind};
            signal(SignalKind::terminate()).ok()
        };

        tokio::select! {
            _ = async {
                #[cfg(unix)]
                {
                    match sigterm {
                        Some(ref mut sigterm) => { sigterm.recv().await; }
                        None => std::future::pending::<()>().await,
                    }
                }
                #[cfg(not(unix))]
                {
                    std::future::pending::<()>().await;
                }
            } => {
                info!("Received SIGTERM, starting graceful shutdown");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, starting graceful shutdown");
            }
            _ = async { let _ = shutdown.wait_for(|stop| *stop).await; } => {
                info!("Shutdown requested");
            }
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}
