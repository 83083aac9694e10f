//! Service registry for arcstream.
//!
//! This crate maps protocol names to session implementations so callers can
//! pick a service by name or open one from a URL.
//!
//! # Example
//!
//! ```
//! use arcstream_registry::ServiceRegistry;
//! use arcstream_transport::TransportKind;
//!
//! let registry = ServiceRegistry::global();
//!
//! let session = registry.open("fdsnwss://service.example.org").unwrap();
//! assert_eq!(session.kind(), TransportKind::Secure);
//! assert_eq!(session.source().unwrap().host(), "service.example.org");
//! ```

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/arcstream/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::OnceLock;

use arcstream_fetch::{Session, SourceError};
use arcstream_transport::TransportKind;
use thiserror::Error;

/// Built-in services.
const SERVICES: &[Service] = &[
    Service {
        name: "fdsnws",
        kind: TransportKind::Plain,
        description: "FDSN web service dataselect over HTTP",
    },
    Service {
        name: "fdsnwss",
        kind: TransportKind::Secure,
        description: "FDSN web service dataselect over HTTPS",
    },
];

/// Global service registry instance.
static REGISTRY: OnceLock<ServiceRegistry> = OnceLock::new();

/// Errors from looking up or opening a service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// No service is registered under the name.
    #[error("unknown service '{0}'")]
    UnknownService(String),

    /// The URL is not of the form `name://address`.
    #[error("invalid service URL '{0}', expected name://host[:port][/path]")]
    InvalidUrl(String),

    /// The address part of the URL is invalid.
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// A registered service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Service {
    name: &'static str,
    kind: TransportKind,
    description: &'static str,
}

impl Service {
    /// Returns the service name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the transport kind sessions of this service use.
    #[must_use]
    pub const fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Returns a short description.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        self.description
    }

    /// Creates a fresh session for this service.
    #[must_use]
    pub fn session(&self) -> Session {
        Session::new(self.kind)
    }
}

/// Registry of the supported services.
#[derive(Debug)]
pub struct ServiceRegistry {
    services: HashMap<String, Service>,
}

impl ServiceRegistry {
    /// Returns the global service registry.
    ///
    /// The registry is initialized lazily on first access.
    #[must_use]
    pub fn global() -> &'static Self {
        REGISTRY.get_or_init(Self::load)
    }

    fn load() -> Self {
        let services = SERVICES
            .iter()
            .map(|service| (service.name.to_string(), *service))
            .collect();
        Self { services }
    }

    /// Looks up a service by name (case-insensitive).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Service> {
        self.services.get(&name.to_lowercase())
    }

    /// Creates a fresh session for the named service.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownService`] if the name is not registered.
    pub fn create(&self, name: &str) -> Result<Session, RegistryError> {
        self.get(name)
            .map(Service::session)
            .ok_or_else(|| RegistryError::UnknownService(name.to_string()))
    }

    /// Creates a session from `name://host[:port][/path]` with its source set.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidUrl`] if the URL has no `://`,
    /// [`RegistryError::UnknownService`] for an unregistered name and
    /// [`RegistryError::Source`] for an invalid address.
    pub fn open(&self, url: &str) -> Result<Session, RegistryError> {
        let (name, address) = url
            .split_once("://")
            .ok_or_else(|| RegistryError::InvalidUrl(url.to_string()))?;
        let mut session = self.create(name)?;
        session.set_source(address)?;
        Ok(session)
    }

    /// Returns all services as an iterator.
    pub fn all(&self) -> impl Iterator<Item = &Service> {
        self.services.values()
    }

    /// Returns the total number of services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Returns true if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Returns all service names sorted alphabetically.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.services.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Creates a fresh session for the named service from the global registry.
///
/// # Errors
///
/// See [`ServiceRegistry::create`].
pub fn create(name: &str) -> Result<Session, RegistryError> {
    ServiceRegistry::global().create(name)
}

/// Opens a session from a service URL using the global registry.
///
/// # Errors
///
/// See [`ServiceRegistry::open`].
pub fn open(url: &str) -> Result<Session, RegistryError> {
    ServiceRegistry::global().open(url)
}
