//! Per-guild ordering gate for reaction-driven pins

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Mutex as AsyncMutex;

/// Runs reaction handling for a guild one event at a time, so two racing
/// events cannot both see a message as unmarked.
#[derive(Default)]
pub struct ReactionEventSerializer {
    gates: Mutex<HashMap<u64, Arc<AsyncMutex<()>>>>,
}

impl ReactionEventSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    fn gate(&self, guild_id: u64) -> Arc<AsyncMutex<()>> {
        self.gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(guild_id)
            .or_default()
            .clone()
    }

    /// Run `f` inside the guild's critical section.
    pub async fn run<F, Fut, T>(&self, guild_id: u64, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let gate = self.gate(guild_id);
        let _guard = gate.lock().await;
        f().await
    }
}
