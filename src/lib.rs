//! Course API Library
//!
//! REST backend for authoring courses, chapters, lessons and lesson
//! attachments. Every `/api/v1` request carries a bearer token issued by an
//! external OIDC provider (Keycloak layout); the server validates it against
//! the provider's published signing keys and keeps a local user record per
//! token subject.
//!
//! # Layout
//!
//! - [`auth`]: JWKS cache, token validation, introspection, role checks,
//!   session reconciliation and the authorization middleware
//! - [`api`]: the axum router and handlers
//! - [`service`]: business operations behind the handlers
//! - [`store`]: persistence traits and the in-memory store
//! - [`storage`]: attachment object storage
//! - [`config`], [`cli`], [`server`]: process plumbing

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod server;
pub mod service;
pub mod storage;
pub mod store;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    let installed = match format {
        Some("json") => subscriber.with(fmt::layer().json()).try_init(),
        _ => subscriber.with(fmt::layer()).try_init(),
    };
    installed.map_err(|e| Error::Internal(format!("tracing already initialised: {e}")))
}
