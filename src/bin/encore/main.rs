use clap::Parser;
use miette::{IntoDiagnostic, Result};
use serde::{Deserialize, Serialize};

mod common;
mod daemon;
mod init;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of trace, debug, info, warn, error. Defaults to info.
    pub max_level: Option<String>,
    pub include_tower: bool,
}

#[derive(Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: encore_store::StorageConfig,
    pub serve: encore::serve::Config,
    pub auth: encore::sessions::AuthConfig,
    pub reset: encore::reset::Config,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn load(explicit: Option<&str>) -> Result<Self> {
        let mut s = config::Config::builder();

        match explicit {
            Some(path) => s = s.add_source(config::File::with_name(path)),
            None => s = s.add_source(config::File::with_name("encore.toml").required(false)),
        }

        s = s.add_source(config::Environment::with_prefix("ENCORE").separator("__"));

        s.build()
            .into_diagnostic()?
            .try_deserialize()
            .into_diagnostic()
    }
}

#[derive(Parser)]
#[clap(name = "Encore")]
#[clap(bin_name = "encore")]
#[clap(author, version, about, long_about = None)]
enum Encore {
    /// Run the platform daemon: both API surfaces plus the reset loop.
    Daemon(daemon::Args),
    /// Write a starter config and bootstrap the first admin account.
    Init(init::Args),
}

fn main() -> Result<()> {
    let args = Encore::parse();

    match args {
        Encore::Daemon(x) => {
            let config = Config::load(x.config.as_deref())?;
            common::setup_tracing(&config.logging)?;
            daemon::run(config, &x).into_diagnostic()?
        }
        Encore::Init(x) => init::run(&x)?,
    };

    Ok(())
}
