#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

#[cfg(not(any(target_os = "macos", unix)))]
compile_error!("Only macos and unix are currently supported");

use std::path::PathBuf;

use clap::Parser;
use courier::Courier;
use courier_common::Recipient;

/// Deliver to each recipient through the configured provider chain
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Configuration file, overriding `COURIER_CONFIG` and the default locations
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Recipients to deliver to
    #[arg(required = true, value_name = "RECIPIENT")]
    recipients: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let courier = Courier::load(args.config.as_deref())?;

    let statuses = courier
        .run(args.recipients.into_iter().map(Recipient::from).collect())
        .await?;

    for (recipient, status) in statuses {
        tracing::info!(%recipient, %status, "Final status");
        println!("Final status for {recipient}: {status}");
    }

    Ok(())
}
