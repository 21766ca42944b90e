//! Command-line entry point for the realtime voice-dialog client.
//!
//! Deliberately thin: no subcommands, no config-context management, no
//! console UI. Those are named external collaborators the session
//! controller doesn't own; this binary's only job is to read connection
//! parameters, wire a device pair, run one session to completion, and
//! report the result. Ctrl+C triggers a graceful shutdown sequence rather
//! than an abrupt exit.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use dialog_audio::device::{NullOutput, SilentInput};
use dialog_core::{Cancellation, Credentials, DialogSession, SessionConfig};

/// Connects to the realtime voice-dialog service and runs one session.
#[derive(Parser, Debug)]
#[command(name = "dialog-cli", version, about)]
struct Args {
    /// WebSocket URL of the dialog service.
    #[arg(long, env = "DIALOG_WS_URL")]
    ws_url: String,

    /// Resource id sent as the `X-Api-Resource-Id` header.
    #[arg(long, env = "DIALOG_RESOURCE_ID")]
    resource_id: String,

    /// Access key sent as the `X-Api-Access-Key` header.
    #[arg(long, env = "DIALOG_ACCESS_KEY")]
    access_key: String,

    /// App key sent as the `X-Api-App-Key` header.
    #[arg(long, env = "DIALOG_APP_KEY")]
    app_key: String,

    /// App id sent as the `X-Api-App-ID` header.
    #[arg(long, env = "DIALOG_APP_ID")]
    app_id: String,

    /// Seconds of silence before re-sending the greeting.
    #[arg(long, default_value_t = 30)]
    silence_prompt_seconds: u64,

    /// Where to dump the playback buffer's diagnostic PCM trail on
    /// shutdown. Pass an empty string to skip the dump.
    #[arg(long, default_value = "./output.pcm")]
    diagnostic_dump_path: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let credentials = Credentials {
        ws_url: args.ws_url,
        resource_id: args.resource_id,
        access_key: args.access_key,
        app_key: args.app_key,
        app_id: args.app_id,
    };

    let mut config = SessionConfig::default();
    config.silence_prompt_timeout = Duration::from_secs(args.silence_prompt_seconds);
    config.diagnostic_dump_path = if args.diagnostic_dump_path.as_os_str().is_empty() {
        None
    } else {
        Some(args.diagnostic_dump_path)
    };

    tracing::info!(ws_url = %credentials.ws_url, "connecting");
    let (session, query_signal_rx) = DialogSession::connect(&credentials, config).await?;
    tracing::info!(dialog_id = ?session.dialog_id(), "session started");

    let cancel = Cancellation::new();
    let shutdown_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl-c received, shutting down");
            shutdown_cancel.cancel();
        }
    });

    // No real audio hardware binding ships in this crate (see
    // `dialog_audio::device`); headless device stubs keep the binary
    // runnable end-to-end without one.
    session
        .run(SilentInput, NullOutput, query_signal_rx, cancel)
        .await?;

    Ok(())
}
