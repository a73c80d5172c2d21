use pcl_crypto::{build_signer, Ed25519Signer, SignatureScheme};
use pcl_ledger::ChainService;
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::{AppState, SignerInfo};
use crate::router::build_router;

/// Ledger HTTP server.
pub struct PclServer {
    config: ServerConfig,
}

impl PclServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Open both chains and the signer described by the config.
    pub fn build_state(&self) -> ServerResult<AppState> {
        let secret = self.config.secret()?;
        let scheme = self.config.signing.scheme;
        let public_key = match scheme {
            SignatureScheme::Ed25519 => Some(Ed25519Signer::new(&secret).verifying_key_hex()),
            SignatureScheme::Keyed => None,
        };
        let signer = build_signer(scheme, secret);
        let service = match &self.config.database_path {
            Some(path) => ChainService::sqlite(path, self.config.busy_timeout(), signer)?,
            None => {
                tracing::warn!("no database_path configured; chains are kept in memory");
                ChainService::in_memory(signer)
            }
        };
        Ok(AppState::new(service, SignerInfo { scheme, public_key }))
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> ServerResult<axum::Router> {
        Ok(build_router(self.build_state()?))
    }

    /// Start serving requests until ctrl-c.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router()?;
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!(
            addr = %self.config.bind_addr,
            scheme = %self.config.signing.scheme,
            "ledger server listening"
        );
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutting down");
}
