use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::core::credential::{self, CredentialStore};
use crate::core::fetcher::{CreditFetcher, FetchError};
use crate::core::models::credit::CreditInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Fetching,
}

/// The single slot the refresh loop publishes into.
#[derive(Debug, Clone)]
pub struct RefreshState {
    /// Latest successful reading; survives failed attempts.
    pub snapshot: Option<CreditInfo>,
    /// Error from the most recent attempt, cleared on success.
    pub last_error: Option<FetchError>,
    pub phase: Phase,
    /// Number of attempts that have finished, successful or not.
    pub completed: u64,
}

impl Default for RefreshState {
    fn default() -> Self {
        Self {
            snapshot: None,
            last_error: None,
            phase: Phase::Idle,
            completed: 0,
        }
    }
}

impl RefreshState {
    /// Fold one finished attempt into the state.
    pub fn record(&mut self, result: Result<CreditInfo, FetchError>) {
        match result {
            Ok(info) => {
                self.snapshot = Some(info);
                self.last_error = None;
            }
            Err(e) => self.last_error = Some(e),
        }
        self.phase = Phase::Idle;
        self.completed += 1;
    }
}

/// Owns the fetcher, the credential store and the published state.
/// At most one fetch is in flight at a time.
pub struct Refresher {
    fetcher: CreditFetcher,
    store: Arc<CredentialStore>,
    env_credential: Option<String>,
    in_flight: AtomicBool,
    state: watch::Sender<RefreshState>,
}

impl Refresher {
    pub fn new(
        fetcher: CreditFetcher,
        store: Arc<CredentialStore>,
        env_credential: Option<String>,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(RefreshState::default());
        Arc::new(Self {
            fetcher,
            store,
            env_credential,
            in_flight: AtomicBool::new(false),
            state,
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<RefreshState> {
        self.state.subscribe()
    }

    pub fn latest(&self) -> Option<CreditInfo> {
        self.state.borrow().snapshot.clone()
    }

    /// Start a fetch unless one is already running.
    ///
    /// Returns `false` when the request was dropped because a fetch is in
    /// flight.
    pub fn trigger(self: &Arc<Self>) -> bool {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("fetch already in flight, dropping trigger");
            return false;
        }

        self.state.send_modify(|s| s.phase = Phase::Fetching);

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let credential = this.current_credential();
            let result = this.fetcher.fetch_credit_usage(credential.as_deref()).await;
            match &result {
                Ok(info) => info!(remaining = info.remaining, "credit refreshed"),
                Err(FetchError::NoCredential) => debug!("no API key configured"),
                Err(e) => warn!(error = %e, "credit refresh failed"),
            }
            // Clear the flag inside the publish so an observer that sees the
            // result can immediately trigger again.
            this.state.send_modify(|s| {
                s.record(result);
                this.in_flight.store(false, Ordering::Release);
            });
        });
        true
    }

    fn current_credential(&self) -> Option<String> {
        let stored = match self.store.get() {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "could not read stored API key");
                None
            }
        };
        credential::resolve(self.env_credential.clone(), stored)
    }

    /// Drive the loop: fetch immediately, then on every `interval` tick and
    /// every manual trigger, until `shutdown` resolves.
    ///
    /// A fetch still in flight at shutdown is left to finish on its own.
    pub async fn run<S>(
        self: Arc<Self>,
        interval: Duration,
        mut manual: mpsc::Receiver<()>,
        shutdown: S,
    ) where
        S: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);
        let mut manual_open = true;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    debug!("refresh loop stopping");
                    break;
                }
                _ = ticker.tick() => {
                    self.trigger();
                }
                msg = manual.recv(), if manual_open => match msg {
                    Some(()) => {
                        self.trigger();
                    }
                    None => manual_open = false,
                },
            }
        }
    }
}
