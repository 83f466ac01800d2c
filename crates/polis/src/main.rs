//! Thin CLI wrapper over the control plane.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;

use polis::{discovery_settings, load_env, AppContext};
use polis_discovery::{AuthedDiscovery, DiscoveryClient};
use polis_fetch::RemoteFetcher;
use polis_logging::LogConfig;
use polis_security::SiteKeys;
use polis_store::{ContentStore, InitOptions};
use polis_sync::{sync_channel, Orchestrator, TriggerSubscriber};

#[derive(Parser)]
#[command(name = "polis", about = "Polis local control plane", version)]
struct Cli {
    /// Site directory (defaults to the current directory)
    #[arg(long, global = true)]
    site: Option<PathBuf>,

    /// Mirror file-level logging to stderr
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize a new site directory
    Init {
        #[arg(long)]
        title: String,
        #[arg(long)]
        author: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        base_url: String,
        /// Overwrite an existing manifest
        #[arg(long)]
        force: bool,
    },
    /// Check the site directory layout and keys
    Validate,
    /// Run the background sync server
    Serve,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = polis_logging::init_logging(LogConfig {
        app_name: "polis",
        verbose: cli.verbose,
    })?;

    let site = cli
        .site
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));

    match cli.command {
        Command::Init {
            title,
            author,
            email,
            base_url,
            force,
        } => {
            let content = ContentStore::new(&site);
            let keys = if content.paths().private_key().exists() {
                SiteKeys::load(content.paths())?
            } else {
                SiteKeys::generate(content.paths())?
            };
            let manifest = content.init_site(
                &InitOptions {
                    site_title: title,
                    author,
                    email,
                    base_url,
                    force,
                },
                &keys,
            )?;
            println!("Initialized {} at {}", manifest.site_title, site.display());
            Ok(())
        }
        Command::Validate => {
            let content = ContentStore::new(&site);
            let report = content.validate_site()?;
            println!("status: {:?}", report.status);
            for check in &report.checks {
                println!("  [{}] {} - {}", check.code, check.path, check.suggestion);
            }
            Ok(())
        }
        Command::Serve => serve(site),
    }
}

fn serve(site: PathBuf) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;
    runtime.block_on(async move {
        let ctx = AppContext::open(&site)?;
        let env = load_env(ctx.paths())?;
        let settings = discovery_settings(&ctx.config, &env)?;

        let client = DiscoveryClient::new(&settings.url, &settings.api_key)?;
        let discovery = AuthedDiscovery::new(
            client,
            ctx.domain.clone(),
            ctx.keys.signing_key().clone(),
        );
        let fetcher = RemoteFetcher::new()?;

        let (sync_handle, trigger_rx) = sync_channel();
        ctx.bus
            .subscribe(Arc::new(TriggerSubscriber::new(sync_handle.clone())));

        let orchestrator = Arc::new(Orchestrator::new(
            ctx.content.clone(),
            ctx.keys.clone(),
            ctx.domain.clone(),
            ctx.manifest.base_url.clone(),
            ctx.checkpoints.clone(),
            ctx.follows.clone(),
            ctx.feed.clone(),
            ctx.notifications.clone(),
            ctx.bus.clone(),
            polis_sync::Broadcaster::new(),
            discovery.clone(),
            discovery.clone(),
            fetcher,
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = tokio::spawn(orchestrator.clone().run(trigger_rx, shutdown_rx));

        tracing::info!(domain = %ctx.domain, "polis server running; Ctrl-C to stop");
        tokio::signal::ctrl_c().await.context("signal handler")?;
        tracing::info!("shutting down");
        let _ = shutdown_tx.send(true);
        let _ = worker.await;
        Ok(())
    })
}
