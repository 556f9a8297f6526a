use std::io::{BufRead, Write};

use anyhow::{Context, Result};

use crate::cli::output::OutputOptions;
use crate::core::credential::{mask, CredentialStore, API_KEY_ENV};

/// Store an API key, reading it from stdin when not given on the command line.
pub fn set(value: Option<String>, _opts: &OutputOptions) -> Result<()> {
    let raw = match value {
        Some(v) => v,
        None => {
            eprint!("Enter OpenRouter API key (sk-or-...): ");
            std::io::stderr().flush().ok();
            let mut line = String::new();
            std::io::stdin()
                .lock()
                .read_line(&mut line)
                .context("Failed to read API key from stdin")?;
            line
        }
    };

    let key = raw.trim();
    if key.is_empty() {
        eprintln!("API key is empty, nothing saved.");
        std::process::exit(1);
    }

    let store = CredentialStore::default_location();
    store
        .set(key)
        .with_context(|| format!("Failed to save API key to {}", store.path().display()))?;
    println!("Saved API key to {}", store.path().display());
    Ok(())
}

pub fn show(_opts: &OutputOptions) -> Result<()> {
    if let Ok(env_key) = std::env::var(API_KEY_ENV) {
        if !env_key.is_empty() {
            println!("{} (from {})", mask(&env_key), API_KEY_ENV);
            return Ok(());
        }
    }

    let store = CredentialStore::default_location();
    match store.get()? {
        Some(key) if !key.is_empty() => {
            println!("{} (from {})", mask(&key), store.path().display());
        }
        _ => {
            println!("No API key configured. Run `creditbar key set` to add one.");
        }
    }
    Ok(())
}

pub fn clear(_opts: &OutputOptions) -> Result<()> {
    let store = CredentialStore::default_location();
    if store.clear()? {
        println!("Removed API key from {}", store.path().display());
    } else {
        println!("No stored API key to remove.");
    }
    Ok(())
}
