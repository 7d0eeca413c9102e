use chrono::Utc;
use miette::{bail, Context as _, IntoDiagnostic, Result};

use encore::prelude::*;
use encore::sessions::Sessions;

#[derive(Debug, clap::Args)]
pub struct Args {
    /// Username for the bootstrap admin account.
    #[arg(long, default_value = "admin")]
    pub admin_username: String,

    /// Login password for the bootstrap admin account.
    #[arg(long)]
    pub admin_password: String,

    /// 4-character transactional password for the bootstrap admin.
    #[arg(long)]
    pub admin_transactional_password: String,

    /// Overwrite an existing encore.toml.
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: &Args) -> Result<()> {
    if args.admin_transactional_password.chars().count() != 4 {
        bail!("the transactional password must be exactly 4 characters long");
    }

    let config = crate::Config::default();

    let config_path = std::path::Path::new("encore.toml");
    if config_path.exists() && !args.force {
        bail!("encore.toml already exists; pass --force to overwrite");
    }

    let rendered = toml::to_string_pretty(&config).into_diagnostic()?;
    std::fs::write(config_path, rendered)
        .into_diagnostic()
        .context("writing encore.toml")?;

    let store = crate::common::open_store(&config).into_diagnostic()?;
    let now = Utc::now();

    let writer = store.start_writer().into_diagnostic()?;

    if writer
        .user_by_username(&args.admin_username)
        .into_diagnostic()?
        .is_some()
    {
        bail!("user {} already exists", args.admin_username);
    }

    writer
        .put_settings(&Settings::default())
        .into_diagnostic()?;

    let id = writer.next_id("users").into_diagnostic()?;
    let mut admin = User::new(
        id,
        args.admin_username.clone(),
        format!("{}@encore.local", args.admin_username),
        String::new(),
        hash_secret(&args.admin_password).into_diagnostic()?,
        hash_secret(&args.admin_transactional_password).into_diagnostic()?,
        format!("ADMIN{id:03}"),
        now,
    );
    admin.is_staff = true;

    writer.create_user(&admin).into_diagnostic()?;
    writer.put_wallet(&Wallet::new(id, now)).into_diagnostic()?;
    writer.commit().into_diagnostic()?;

    // a first voucher so the first worker can sign up
    let sessions = Sessions::new(store, &config.auth);
    let voucher = sessions
        .generate_invitation_code(id, now)
        .into_diagnostic()?;

    println!("wrote encore.toml");
    println!("created admin account `{}`", args.admin_username);
    println!("first invitation code: {}", voucher.code);

    Ok(())
}
