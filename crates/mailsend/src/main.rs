//! `mailsend` - deliver an RFC-822 message file through an SMTP relay.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod document;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use mailsend_core::{CONFIG_FILE, Config, MailService};
use mailsend_smtp::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use document::Document;

/// Deliver an RFC-822 message file through an SMTP relay.
#[derive(Debug, Parser)]
#[command(name = "mailsend", version, about)]
struct Args {
    /// Message file to deliver, or one of `help`, `install`, `readme`, `license`.
    target: Option<String>,

    /// Relay configuration file.
    #[arg(short, long, default_value = CONFIG_FILE)]
    config: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailsend=info,mailsend_core=info,mailsend_smtp=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let Some(target) = args.target else {
        println!("mailsend: missing operand");
        println!("Try 'mailsend help' for more information.");
        return ExitCode::FAILURE;
    };

    if let Some(document) = Document::from_command(&target) {
        return match document.print_from(Path::new("."), &mut std::io::stdout().lock()) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("mailsend: {e:#}");
                ExitCode::FAILURE
            }
        };
    }

    match deliver(Path::new(&target), &args.config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            if e.is_delivery() {
                eprintln!("Error sending message. Please try again.");
            }
            ExitCode::FAILURE
        }
    }
}

/// Loads the configuration and the message, then runs one delivery.
async fn deliver(path: &Path, config_path: &Path) -> mailsend_core::Result<()> {
    let config = Config::load(config_path)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted, cancelling delivery");
            on_interrupt.cancel();
        }
    });

    let service = MailService::new(config).with_cancellation(cancel);

    println!("Opening email file {}...", path.display());
    let message = service.prepare(path)?;
    let envelope = message.envelope();

    println!("Prepare to deliver...");
    println!("MAIL FROM: <{}>", envelope.sender());
    println!("RCPT TO: <{}>", envelope.recipient());
    println!("{}", message.raw());
    println!("Processing...");

    let report = service.send(&message).await?;
    for warning in &report.warnings {
        println!("Warning: {warning}.");
    }
    println!("Your email was successfully delivered.");
    println!();

    Ok(())
}
