//! Client TLS configuration.

use std::sync::{Arc, OnceLock};

use rustls::{ClientConfig, RootCertStore};

/// Configuration shared by every secure transport that does not bring its own.
static DEFAULT_CONFIG: OnceLock<Arc<ClientConfig>> = OnceLock::new();

/// TLS settings for secure transports.
///
/// Defaults to the Mozilla root store shipped with `webpki-roots`.
#[derive(Debug, Clone, Default)]
pub struct TlsSettings {
    config: Option<Arc<ClientConfig>>,
}

impl TlsSettings {
    /// Uses a caller-built client configuration (custom roots, ALPN, ...).
    #[must_use]
    pub const fn with_config(config: Arc<ClientConfig>) -> Self {
        Self {
            config: Some(config),
        }
    }

    /// Returns the client configuration to use for a new connection.
    ///
    /// The default configuration is built lazily on first use.
    #[must_use]
    pub fn client_config(&self) -> Arc<ClientConfig> {
        self.config.as_ref().map_or_else(
            || Arc::clone(DEFAULT_CONFIG.get_or_init(default_config)),
            Arc::clone,
        )
    }
}

fn default_config() -> Arc<ClientConfig> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    Arc::new(
        ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth(),
    )
}
