//! Course API - course authoring REST backend
//!
//! Validates provider-issued bearer tokens and keeps a local user per subject.

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use tracing::{error, info};

use course_api::{
    auth::{IntrospectionClient, JwksFetcher, KeyCache, KeySource, RsaPublicKey, TokenValidator},
    cli::{Cli, Command},
    config::Config,
    server::Server,
    setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup tracing
    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    if let Some(Command::Completions { shell }) = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "course-api", &mut io::stdout());
        return ExitCode::SUCCESS;
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let outcome = match cli.command {
        Some(Command::Keys) => list_keys(&config).await,
        Some(Command::Validate { token, introspect }) => {
            validate_token(&config, &token, introspect).await
        }
        Some(Command::Config) => print_config(&config),
        Some(Command::Serve) | None => return run_server(config).await,
        Some(Command::Completions { .. }) => Ok(()),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Load configuration and apply CLI overrides.
fn load_config(cli: &Cli) -> course_api::Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(ref host) = cli.host {
        config.server.host = host.clone();
    }
    Ok(config)
}

async fn run_server(config: Config) -> ExitCode {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.server.port,
        realm = %config.identity.realm,
        "Starting course API"
    );

    let server = match Server::new(config) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to create server: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = server.run().await {
        error!("Server error: {e}");
        return ExitCode::FAILURE;
    }

    info!("Shutdown complete");
    ExitCode::SUCCESS
}

/// Print the provider's signing keys.
async fn list_keys(config: &Config) -> anyhow::Result<()> {
    let identity = &config.identity;
    let fetcher = JwksFetcher::new(identity.jwks_url(), identity.http_timeout)
        .context("Failed to build HTTP client")?;
    let set = fetcher
        .fetch()
        .await
        .with_context(|| format!("Failed to fetch {}", fetcher.url()))?;

    if set.keys.is_empty() {
        println!("No keys published at {}", fetcher.url());
        return Ok(());
    }

    println!("{} key(s) at {}:\n", set.keys.len(), fetcher.url());
    for jwk in &set.keys {
        let detail = match (jwk.kty.as_str(), jwk.n.as_deref(), jwk.e.as_deref()) {
            ("RSA", Some(n), Some(e)) => match RsaPublicKey::from_components(n, e) {
                Ok(key) => format!("{} bits, e={}", key.bits(), key.exponent()),
                Err(reason) => format!("unusable: {reason}"),
            },
            ("RSA", _, _) => "unusable: missing n or e".to_string(),
            _ => "not supported".to_string(),
        };
        println!(
            "  {:<44} {:<4} {:<6} {:<4} {detail}",
            jwk.kid,
            jwk.kty,
            jwk.alg.as_deref().unwrap_or("-"),
            jwk.key_use.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

/// Validate `token` the way the middleware does, then print its claims.
async fn validate_token(config: &Config, token: &str, introspect: bool) -> anyhow::Result<()> {
    let identity = &config.identity;
    let fetcher = JwksFetcher::new(identity.jwks_url(), identity.http_timeout)
        .context("Failed to build HTTP client")?;
    let keys = Arc::new(KeyCache::new(Arc::new(fetcher), identity.key_cache_ttl));
    let validator = TokenValidator::new(keys, identity.realm_url()).with_leeway(identity.leeway);

    let token = token.strip_prefix("Bearer ").unwrap_or(token).trim();
    let claims = validator
        .validate(token)
        .await
        .context("Token rejected")?;

    if introspect {
        let client = IntrospectionClient::new(
            identity.introspection_url(),
            identity.client_id.clone(),
            identity.client_secret(),
            identity.http_timeout,
        )
        .context("Failed to build HTTP client")?;
        let active = client
            .introspect(token)
            .await
            .context("Introspection failed")?;
        anyhow::ensure!(active, "Token is no longer active");
    }

    println!("{}", serde_json::to_string_pretty(&claims)?);
    Ok(())
}

fn print_config(config: &Config) -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&config.redacted())?);
    Ok(())
}
