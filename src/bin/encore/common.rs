use miette::{Context as _, IntoDiagnostic};
use tracing::Level;
use tracing_subscriber::{filter::Targets, prelude::*};

use encore::prelude::*;

use crate::LoggingConfig;

pub fn setup_tracing(config: &LoggingConfig) -> miette::Result<()> {
    let level = config
        .max_level
        .as_deref()
        .map(|raw| raw.parse::<Level>())
        .transpose()
        .into_diagnostic()
        .context("parsing logging.max_level")?
        .unwrap_or(Level::INFO);

    let mut filter = Targets::new()
        .with_target("encore", level)
        .with_target("encore_core", level)
        .with_target("encore_store", level);

    if config.include_tower {
        filter = filter.with_target("tower_http", level);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    Ok(())
}

pub fn open_store(config: &crate::Config) -> Result<Store, Error> {
    match &config.storage.path {
        Some(path) => {
            std::fs::create_dir_all(path)?;
            Store::open(path.join("encore.redb"), config.storage.cache_size)
                .map_err(Error::StorageError)
        }
        None => Store::in_memory().map_err(Error::StorageError),
    }
}
