use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use encore::admin::AdminOps;
use encore::engine::Engine;
use encore::injector::Injector;
use encore::prelude::*;
use encore::reset::ResetScheduler;
use encore::serve;
use encore::sessions::Sessions;

#[derive(Debug, clap::Args)]
pub struct Args {
    /// Path to the config file; defaults to ./encore.toml when present.
    #[arg(long)]
    pub config: Option<String>,
}

#[tokio::main]
pub async fn run(config: super::Config, _args: &Args) -> Result<(), Error> {
    let store = crate::common::open_store(&config)?;

    let state = Arc::new(serve::State {
        store: store.clone(),
        sessions: Sessions::new(store.clone(), &config.auth),
        engine: Engine::new(store.clone()),
        injector: Injector::new(store.clone()),
        admin: AdminOps::new(store.clone()),
        reset: ResetScheduler::new(store.clone()),
    });

    let exit = CancellationToken::new();

    let reset_loop = tokio::spawn(
        ResetScheduler::new(store.clone()).run(config.reset.clone(), exit.clone()),
    );

    {
        let exit = exit.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown requested");
                exit.cancel();
            }
        });
    }

    serve::serve(config.serve, state, exit.clone()).await?;

    exit.cancel();
    let _ = reset_loop.await;

    Ok(())
}
