//! # Rotina — reminder daemon
//!
//! Wires the notification engine to its collaborators and starts the
//! scheduler drivers. The CRUD application owns the domain tables; this
//! process only reads them, decides, sends, and records.
//!
//! Usage:
//!   rotina                         # Start the drivers (runs until Ctrl-C)
//!   rotina --once                  # One cycle per driver, then exit
//!   rotina --config ./rotina.toml  # Explicit config file

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use rotina_channels::{Outbound, WebhookSender, WhatsAppSender};
use rotina_core::RotinaConfig;
use rotina_engine::{standard_drivers, Engine};
use rotina_store::{Ledger, SqliteDomain};

#[derive(Parser)]
#[command(name = "rotina", version, about = "🔔 Rotina — lembretes do seu dia a dia")]
struct Cli {
    /// Config file path (default: ~/.rotina/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database path (overrides config and ROTINA_DB_PATH)
    #[arg(long)]
    db: Option<String>,

    /// Run every driver's cycle once and exit (deployment smoke test)
    #[arg(long)]
    once: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "rotina=debug" } else { "rotina=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let mut config = match &cli.config {
        Some(path) => {
            let mut config = RotinaConfig::load_from(path)?;
            config.apply_env_overrides();
            config
        }
        None => RotinaConfig::load()?,
    };
    if let Some(db) = cli.db {
        config.store.db_path = db;
    }

    let db_path = shellexpand::tilde(&config.store.db_path).to_string();
    if let Some(parent) = Path::new(&db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    let domain = Arc::new(SqliteDomain::open(
        Path::new(&db_path),
        config.events.horizon_days,
    )?);
    let ledger = Arc::new(Ledger::open(
        Path::new(&db_path),
        &config.store.ledger_table,
        &config.store.ledger_fallback_table,
    )?);
    let channel: Arc<dyn Outbound> = match config.channel.kind.as_str() {
        "webhook" => Arc::new(WebhookSender::new(&config.channel)?),
        _ => Arc::new(WhatsAppSender::new(&config.channel)?),
    };

    println!("🔔 Rotina v{}", env!("CARGO_PKG_VERSION"));
    println!("   🕒 Timezone:  {}", config.timezone);
    println!("   📬 Channel:   {}", channel.name());
    println!("   🗄️  Database:  {db_path}");
    println!("   🎚️  Daily cap: {}", config.daily_cap);
    println!();

    let engine = Arc::new(Engine::new(config, domain, ledger, channel)?);
    let drivers = standard_drivers(&engine);

    if cli.once {
        for driver in &drivers {
            let stats = driver.run_once(&engine).await;
            println!(
                "   ✅ [{}] {} subjects, {} sent, {} failed",
                driver.name, stats.subjects, stats.sent, stats.failed
            );
        }
        return Ok(());
    }

    let _handles: Vec<_> = drivers
        .into_iter()
        .map(|driver| Arc::new(driver).spawn(engine.clone()))
        .collect();

    tokio::signal::ctrl_c().await?;
    tracing::info!("👋 Shutting down — triggers stop firing");
    Ok(())
}
