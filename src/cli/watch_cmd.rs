use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use colored::{control, Colorize};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::cli::output::{OutputFormat, OutputOptions};
use crate::core::config::AppConfig;
use crate::core::credential::{CredentialStore, API_KEY_ENV};
use crate::core::fetcher::{CreditFetcher, FetchError};
use crate::core::formatter::{format_last_updated, format_status_title};
use crate::core::models::credit::CreditInfo;
use crate::core::refresh::{RefreshState, Refresher};

#[derive(Serialize)]
struct StatePayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    credits: Option<&'a CreditInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    attempt: u64,
}

/// One status line: "$7.50  updated 2026-10-19 14:05", with the last error
/// appended when the shown amount is stale.
fn status_line(state: &RefreshState, use_color: bool) -> String {
    control::set_override(use_color);

    let title = format_status_title(state);
    let mut line = format!("{}", title.bold());
    if state.last_error == Some(FetchError::NoCredential) {
        return line;
    }
    if let Some(info) = &state.snapshot {
        let updated = format!("updated {}", format_last_updated(&info.last_updated));
        line.push_str(&format!("  {}", updated.dimmed()));
    }
    if let Some(e) = &state.last_error {
        line.push_str(&format!("  {}", e.to_string().red()));
    }
    line
}

fn json_line(state: &RefreshState) -> Result<String> {
    let payload = StatePayload {
        credits: state.snapshot.as_ref(),
        error: state.last_error.as_ref().map(|e| e.to_string()),
        attempt: state.completed,
    };
    Ok(serde_json::to_string(&payload)?)
}

/// Forward each line read from stdin as a manual refresh request.
fn spawn_stdin_triggers(manual_tx: mpsc::Sender<()>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(_)) = lines.next_line().await {
            match manual_tx.try_send(()) {
                Ok(()) | Err(TrySendError::Full(())) => {}
                Err(TrySendError::Closed(())) => break,
            }
        }
        debug!("stdin closed, manual refresh disabled");
    });
}

async fn render_updates(mut rx: watch::Receiver<RefreshState>, opts: OutputOptions) {
    let mut last_completed = u64::MAX;
    loop {
        let state = rx.borrow_and_update().clone();
        match opts.format {
            OutputFormat::Text => {
                print!("\r\x1b[2K{}", status_line(&state, opts.use_color));
                let _ = std::io::stdout().flush();
            }
            OutputFormat::Json => {
                if state.completed != last_completed && state.completed > 0 {
                    if let Ok(line) = json_line(&state) {
                        println!("{}", line);
                    }
                }
            }
        }
        last_completed = state.completed;
        if rx.changed().await.is_err() {
            break;
        }
    }
}

/// Run the refresh loop until Ctrl-C, redrawing on every state change.
pub async fn run(
    config: &AppConfig,
    interval_override: Option<u64>,
    opts: &OutputOptions,
) -> Result<()> {
    let interval_secs = interval_override
        .unwrap_or(config.refresh.interval_secs)
        .max(1);
    let fetcher = CreditFetcher::from_config(config)?;
    info!(endpoint = %fetcher.endpoint(), interval_secs, "starting refresh loop");
    let store = Arc::new(CredentialStore::default_location());
    let refresher = Refresher::new(fetcher, store, std::env::var(API_KEY_ENV).ok());

    let (manual_tx, manual_rx) = mpsc::channel(1);
    spawn_stdin_triggers(manual_tx);

    let renderer = tokio::spawn(render_updates(refresher.subscribe(), opts.clone()));

    if matches!(opts.format, OutputFormat::Text) {
        eprintln!("Refreshing every {}s. Press Enter to refresh now, Ctrl-C to quit.", interval_secs);
    }

    Arc::clone(&refresher)
        .run(Duration::from_secs(interval_secs), manual_rx, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;

    renderer.abort();
    if let Some(info) = refresher.latest() {
        debug!(remaining = info.remaining, "stopped with last snapshot");
    }
    if matches!(opts.format, OutputFormat::Text) {
        println!();
    }
    // The blocking stdin read cannot be cancelled and would hold runtime
    // shutdown until the next newline.
    std::process::exit(0);
}
