pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::core::config::{AppConfig, Backend};
use crate::core::{
    AmountParser, CacheStore, ConversionService, ConvertError, Converter, CurrencyCode, RateCache,
};
use crate::providers::FrankfurterProvider;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    /// Convert one free-form expression, optionally overriding the quote currency
    Convert {
        expression: String,
        to: Option<String>,
    },
    /// Convert every expression in a file, `-` for stdin
    Batch { path: String },
    ClearCache,
}

/// Command line values that take precedence over the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub backend: Option<Backend>,
    pub ttl_secs: Option<u64>,
}

impl Overrides {
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(backend) = self.backend {
            config.cache.backend = backend;
        }
        if let Some(ttl) = self.ttl_secs {
            config.cache.ttl_secs = ttl;
        }
    }
}

/// Wires parser, rate cache and converter together for one run.
pub fn build_service(
    config: &AppConfig,
    store: Arc<dyn CacheStore>,
    to: Option<&str>,
) -> Result<ConversionService> {
    let default_to = match to {
        Some(code) => code.parse::<CurrencyCode>().map_err(ConvertError::from)?,
        None => config.default_quote()?,
    };

    let source = FrankfurterProvider::new(config.frankfurter_url())
        .context("Failed to set up the rate service client")?;
    let rates = RateCache::new(store, Arc::new(source), config.policy()?);

    Ok(ConversionService::new(
        AmountParser::new(default_to),
        rates,
        Converter::new(config.precision, config.allow_negative),
    ))
}

pub async fn run_command(
    command: AppCommand,
    config_path: Option<&str>,
    overrides: &Overrides,
) -> Result<()> {
    info!("curconv starting...");

    let mut config = AppConfig::load_or_default(config_path)?;
    overrides.apply(&mut config);
    debug!("Loaded config: {config:#?}");

    let store = store::build_store(&config, config.cache.backend)?;

    match command {
        AppCommand::Convert { expression, to } => {
            let service = build_service(&config, store, to.as_deref())?;
            cli::convert::run(&service, &expression).await
        }
        AppCommand::Batch { path } => {
            let service = build_service(&config, store, None)?;
            cli::batch::run(&service, &path).await
        }
        AppCommand::ClearCache => cli::cache::clear(store.as_ref()).await,
    }
}
