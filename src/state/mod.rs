pub mod bracket;
pub mod controller;
pub mod matchup;
pub mod participant;
pub mod snapshot;
mod tournament;

pub use tournament::{
    ActiveMatchupView, ParticipantView, TournamentView, VoteReceipt, MAX_TOURNAMENT_NAME_LEN,
};

use crate::clock::{Clock, SystemClock};
use crate::config::DEFAULT_VOTING_SECONDS;
use crate::prompts::PromptSource;
use crate::sink::ResultsSink;
use crate::store::StateStore;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

/// Shared application state.
///
/// Holds no tournament data itself: every operation loads the snapshot,
/// mutates it and saves it back while holding that tournament's lock.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn StateStore>,
    pub prompts: Arc<dyn PromptSource>,
    pub sink: Arc<dyn ResultsSink>,
    pub clock: Arc<dyn Clock>,
    pub voting_duration: chrono::Duration,
    rng: Arc<Mutex<StdRng>>,
    /// Only live for as long as some request holds or awaits the lock
    locks: Arc<Mutex<HashMap<String, Weak<tokio::sync::Mutex<()>>>>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn StateStore>,
        prompts: Arc<dyn PromptSource>,
        sink: Arc<dyn ResultsSink>,
    ) -> Self {
        Self {
            store,
            prompts,
            sink,
            clock: Arc::new(SystemClock),
            voting_duration: chrono::Duration::seconds(i64::from(DEFAULT_VOTING_SECONDS)),
            rng: Arc::new(Mutex::new(StdRng::from_os_rng())),
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_voting_duration(mut self, duration: chrono::Duration) -> Self {
        self.voting_duration = duration;
        self
    }

    /// Deterministic shuffles, tie-breaks and aliases
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = Arc::new(Mutex::new(StdRng::seed_from_u64(seed)));
        self
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut rng)
    }

    /// Serialize load -> mutate -> save for one tournament
    async fn lock_tournament(&self, name: &str) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            match locks.get(name).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    locks.retain(|_, lock| lock.strong_count() > 0);
                    let lock = Arc::new(tokio::sync::Mutex::new(()));
                    locks.insert(name.to_string(), Arc::downgrade(&lock));
                    lock
                }
            }
        };
        lock.lock_owned().await
    }
}
