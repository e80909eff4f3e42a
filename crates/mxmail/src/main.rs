//! `mxmail` - deliver a message straight to the recipient's mail exchanger
//!
//! # Usage
//!
//! ```bash
//! # Send one message, retrying per the defaults (4 attempts, 4 minutes apart)
//! mxmail send --hostname relay.example.com --from alice@example.com \
//!     --to bob@example.org --subject "Disk usage" --text "Backup volume is full"
//!
//! # Take settings from a JSON file
//! mxmail send --config mxmail.json --from alice@example.com --to bob@example.org
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use mxmail::{DeliveryEvent, EntryId, Mailer, MailerConfig};
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "mxmail", version)]
#[command(about = "Direct-to-MX mail delivery", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Queue one message and deliver it
    Send(SendArgs),
}

#[derive(Args)]
struct SendArgs {
    /// Local hostname announced in EHLO (overrides the config file)
    #[arg(long)]
    hostname: Option<String>,
    /// Sender address
    #[arg(long)]
    from: String,
    /// Recipient address
    #[arg(long)]
    to: String,
    /// Subject line
    #[arg(long)]
    subject: Option<String>,
    /// Plain-text body
    #[arg(long)]
    text: Option<String>,
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mxmail=info,mxmail_smtp=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Send(args) => send(args).await,
    }
}

async fn send(args: SendArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            MailerConfig::from_json(&json)?
        }
        None => MailerConfig::default(),
    };
    if let Some(hostname) = args.hostname {
        config.hostname = hostname;
    }

    let mailer = Mailer::new(config)?;
    let mut events = mailer.subscribe();
    let id = mailer.send_mail(
        args.from,
        args.to,
        args.subject.as_deref(),
        args.text.as_deref(),
    );
    info!(%id, "message queued");

    let (stop, shutdown) = watch::channel(false);
    let outcome = tokio::select! {
        () = mailer.run(shutdown) => None,
        outcome = final_event(&mut events, id) => outcome,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted");
            None
        }
    };
    drop(stop);

    match outcome {
        Some(DeliveryEvent::Delivered { host, secured, .. }) => {
            info!(%host, secured, "message delivered");
            Ok(())
        }
        Some(DeliveryEvent::Exhausted { attempts, error, .. }) => {
            bail!("delivery failed after {attempts} attempts: {error}")
        }
        _ => bail!("delivery did not complete"),
    }
}

/// Waits for the event that ends the life of entry `id`.
async fn final_event(
    events: &mut broadcast::Receiver<DeliveryEvent>,
    id: EntryId,
) -> Option<DeliveryEvent> {
    loop {
        match events.recv().await {
            Ok(event) if event.id() == id && event.is_final() => return Some(event),
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}
