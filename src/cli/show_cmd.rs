use anyhow::Result;
use tracing::warn;

use crate::cli::output::{OutputFormat, OutputOptions};
use crate::cli::renderer;
use crate::core::config::AppConfig;
use crate::core::credential::{self, CredentialStore, API_KEY_ENV};
use crate::core::fetcher::{CreditFetcher, FetchError};
use crate::core::refresh::RefreshState;

/// Fetch once and print the result.
pub async fn run(config: &AppConfig, opts: &OutputOptions) -> Result<()> {
    let fetcher = CreditFetcher::from_config(config)?;
    let store = CredentialStore::default_location();
    let stored = store.get().unwrap_or_else(|e| {
        warn!(error = %e, "could not read stored API key");
        None
    });
    let api_key = credential::resolve(std::env::var(API_KEY_ENV).ok(), stored);

    let result = fetcher.fetch_credit_usage(api_key.as_deref()).await;
    let failed = matches!(&result, Err(e) if *e != FetchError::NoCredential);

    match opts.format {
        OutputFormat::Text => {
            let mut state = RefreshState::default();
            state.record(result);
            println!("{}", renderer::render_panel(&state, opts.use_color));
        }
        OutputFormat::Json => match result {
            Ok(info) => {
                let json = if opts.pretty {
                    serde_json::to_string_pretty(&info)?
                } else {
                    serde_json::to_string(&info)?
                };
                println!("{}", json);
            }
            Err(FetchError::NoCredential) => {
                eprintln!("No API key configured. Run `creditbar key set` first.");
            }
            Err(e) => eprintln!("Error fetching credits: {}", e),
        },
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}
