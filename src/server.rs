//! Server assembly and lifecycle.

use std::{net::SocketAddr, sync::Arc};

use tokio::{net::TcpListener, signal};
use tracing::{error, info, warn};

use crate::{
    Error, Result,
    api::{AppState, create_router},
    auth::{Authenticator, IdentityProviderClient},
    config::{Config, StorageBackend},
    service::{CatalogService, UserService},
    storage,
    store::MemoryStore,
};

/// The course API server.
pub struct Server {
    config: Config,
    state: Arc<AppState>,
}

impl Server {
    /// Wire stores, object storage and the authentication pipeline from `config`.
    pub fn new(config: Config) -> Result<Self> {
        let store = Arc::new(MemoryStore::new());
        let objects = storage::from_config(&config.storage);

        let auth = Arc::new(Authenticator::from_config(&config, store.clone())?);
        let provider = Arc::new(IdentityProviderClient::new(&config.identity)?);

        let state = Arc::new(AppState {
            users: UserService::new(
                Arc::clone(&auth),
                provider,
                config.auth.default_role.clone(),
            ),
            catalog: CatalogService::new(store, objects),
            auth,
            max_upload_size: config.server.max_upload_size,
            download_url_ttl: config.storage.download_url_ttl,
            request_timeout: config.server.request_timeout,
        });

        Ok(Self { config, state })
    }

    /// Shared state, for embedding the router elsewhere.
    #[must_use]
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Serve until Ctrl-C or SIGTERM.
    pub async fn run(self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.server.host, self.config.server.port)
            .parse()
            .map_err(|e| Error::Config(format!("Invalid listen address: {e}")))?;

        let app = create_router(Arc::clone(&self.state));
        let listener = TcpListener::bind(addr).await?;

        let identity = &self.config.identity;
        info!(version = env!("CARGO_PKG_VERSION"), %addr, "Course API listening");
        info!(issuer = %identity.realm_url(), client_id = %identity.client_id, "Trusting identity provider");
        if self.config.auth.introspection {
            info!(endpoint = %identity.introspection_url(), "Token introspection enabled");
        } else {
            warn!("Token introspection disabled, revoked tokens stay valid until they expire");
        }
        match self.config.storage.backend {
            StorageBackend::Memory => warn!("Attachments are kept in memory and lost on restart"),
            StorageBackend::Filesystem => {
                info!(root = %self.config.storage.root.display(), "Attachments stored on disk");
            }
        }

        // Warm the key cache so the first request doesn't pay for the fetch.
        let keys = Arc::clone(self.state.auth.validator.keys());
        tokio::spawn(async move {
            match keys.refresh().await {
                Ok(kids) => info!(keys = kids.len(), "Signing keys loaded"),
                Err(e) => warn!(error = %e, "Initial JWKS fetch failed, will retry on demand"),
            }
        });

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        info!("Server stopped");
        Ok(())
    }
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
