//! Reaction event → qualification → broadcast

#[path = "pipeline_tests.rs"]
mod pipeline_tests;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use redpin_types::{Decision, EmojiRef, PinError, ReactionEvent, RelayedMessage};
use tracing::{debug, info};

use crate::broadcast::PinBroadcaster;
use crate::errors::log_failure;
use crate::platform::Platform;
use crate::qualify::{check_relayable, precheck, QualificationEngine};
use crate::serializer::ReactionEventSerializer;
use crate::store::GuildSettingsStore;

pub struct PinPipeline<P: Platform> {
    platform: Arc<P>,
    store: Arc<GuildSettingsStore>,
    engine: QualificationEngine<P>,
    broadcaster: PinBroadcaster<P>,
    serializer: ReactionEventSerializer,
    marker: EmojiRef,
    pins_relayed: Arc<AtomicU64>,
}

impl<P: Platform> PinPipeline<P> {
    pub fn new(
        platform: Arc<P>,
        store: Arc<GuildSettingsStore>,
        marker: EmojiRef,
        webhook_name: String,
    ) -> Self {
        Self {
            engine: QualificationEngine::new(platform.clone()),
            broadcaster: PinBroadcaster::new(platform.clone(), store.clone(), webhook_name),
            serializer: ReactionEventSerializer::new(),
            platform,
            store,
            marker,
            pins_relayed: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn platform(&self) -> &Arc<P> {
        &self.platform
    }

    pub fn store(&self) -> &Arc<GuildSettingsStore> {
        &self.store
    }

    /// Counter of copies created since start, shared with the health endpoint.
    pub fn pins_relayed(&self) -> Arc<AtomicU64> {
        self.pins_relayed.clone()
    }

    /// Handle a reaction-added event.
    ///
    /// Returns `None` when the event was skipped. Qualification and
    /// broadcast run as one critical section per guild.
    pub async fn handle_reaction(
        &self,
        event: &ReactionEvent,
    ) -> Option<Result<RelayedMessage, PinError>> {
        if let Some(reason) = precheck(event) {
            debug!("Ignoring reaction on {}: {}", event.message_id, reason);
            return None;
        }
        let guild_id = event.guild_id.unwrap_or_default();

        self.serializer
            .run(guild_id, move || async move {
                let settings = self.store.get(guild_id);
                let candidate = match self.engine.evaluate(event, &settings).await {
                    Ok(Decision::Qualifies(candidate)) => candidate,
                    Ok(Decision::Skip(reason)) => {
                        debug!("Ignoring reaction on {}: {}", event.message_id, reason);
                        return None;
                    }
                    Err(e) => {
                        log_failure(&e);
                        return Some(Err(e));
                    }
                };

                info!(
                    "Message {} qualified via {} in guild {}",
                    candidate.message.id, candidate.reaction, guild_id
                );
                Some(self.relay(guild_id, &candidate.message).await)
            })
            .await
    }

    /// Pin a message on request, bypassing qualification and serialization.
    pub async fn force_pin(
        &self,
        guild_id: u64,
        channel_id: u64,
        message_id: u64,
    ) -> Result<RelayedMessage, PinError> {
        let message = self
            .platform
            .fetch_message(channel_id, message_id)
            .await
            .inspect_err(log_failure)?;
        check_relayable(&*self.platform, &message)
            .await
            .inspect_err(log_failure)?;
        self.relay(guild_id, &message).await
    }

    async fn relay(
        &self,
        guild_id: u64,
        message: &redpin_types::SourceMessage,
    ) -> Result<RelayedMessage, PinError> {
        let result = self
            .broadcaster
            .broadcast(guild_id, message, &self.marker)
            .await;
        if result.is_ok() {
            self.pins_relayed.fetch_add(1, Ordering::Relaxed);
        }
        result
    }
}
