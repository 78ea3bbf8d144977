#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use redpin_types::{EmojiRef, MessageKind, PinError};

    use crate::pipeline::PinPipeline;
    use crate::testing::*;

    fn pipeline(
        self_pin: bool,
    ) -> (tempfile::TempDir, Arc<FakePlatform>, PinPipeline<FakePlatform>) {
        let (dir, store) = temp_store();
        store
            .update(GUILD, |s| {
                s.pin_channel = Some(PIN_CHANNEL);
                s.allow_self_pin = self_pin;
            })
            .unwrap();
        let platform = Arc::new(FakePlatform::new());
        let pipeline = PinPipeline::new(platform.clone(), store, marker(), "redpin".to_string());
        (dir, platform, pipeline)
    }

    #[tokio::test]
    async fn test_qualifying_reaction_is_relayed() {
        let (_dir, platform, pipeline) = pipeline(false);
        platform.insert_message(source_message(vec![reaction("⭐", 3)]));
        platform.set_reaction_users(MESSAGE, &EmojiRef::unicode("⭐"), vec![7, 8, 9]);

        let relayed = pipeline
            .handle_reaction(&reaction_event("⭐"))
            .await
            .expect("should qualify")
            .unwrap();

        assert_eq!(relayed.channel_id, PIN_CHANNEL);
        assert_eq!(pipeline.pins_relayed().load(Ordering::Relaxed), 1);
        assert!(platform.message(SOURCE_CHANNEL, MESSAGE).is_marked());
    }

    #[tokio::test]
    async fn test_skipped_reaction_returns_none() {
        let (_dir, platform, pipeline) = pipeline(false);
        platform.insert_message(source_message(vec![reaction("⭐", 1)]));

        assert!(pipeline.handle_reaction(&reaction_event("⭐")).await.is_none());

        let mut dm = reaction_event("⭐");
        dm.guild_id = None;
        assert!(pipeline.handle_reaction(&dm).await.is_none());

        assert!(platform.state().sent.is_empty());
        assert_eq!(pipeline.pins_relayed().load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_concurrent_reactions_relay_once() {
        let (_dir, platform, pipeline) = pipeline(true);
        platform.insert_message(source_message(vec![reaction("⭐", 3), reaction("🔥", 3)]));

        let first = reaction_event("⭐");
        let second = reaction_event("🔥");
        let (a, b) = tokio::join!(
            pipeline.handle_reaction(&first),
            pipeline.handle_reaction(&second)
        );

        let relayed = [a, b].into_iter().flatten().filter(|r| r.is_ok()).count();
        assert_eq!(relayed, 1);
        assert_eq!(platform.state().sent.len(), 1);
        assert_eq!(pipeline.pins_relayed().load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_repeated_reactions_after_pin_are_ignored() {
        let (_dir, platform, pipeline) = pipeline(true);
        platform.insert_message(source_message(vec![reaction("⭐", 3)]));

        assert!(pipeline.handle_reaction(&reaction_event("⭐")).await.is_some());
        for _ in 0..3 {
            assert!(pipeline.handle_reaction(&reaction_event("⭐")).await.is_none());
        }
        assert_eq!(platform.state().sent.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_error_is_reported() {
        let (_dir, _platform, pipeline) = pipeline(true);

        let result = pipeline.handle_reaction(&reaction_event("⭐")).await;
        assert!(result.expect("error is not a skip").unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_force_pin_bypasses_qualification() {
        let (_dir, platform, pipeline) = pipeline(false);
        platform.insert_message(source_message(vec![]));

        let relayed = pipeline
            .force_pin(GUILD, SOURCE_CHANNEL, MESSAGE)
            .await
            .unwrap();

        assert_eq!(relayed.channel_id, PIN_CHANNEL);
        assert_eq!(platform.state().sent.len(), 1);
        assert_eq!(pipeline.pins_relayed().load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_force_pin_refuses_system_messages() {
        let (_dir, platform, pipeline) = pipeline(false);
        let mut msg = source_message(vec![]);
        msg.kind = MessageKind::Other;
        platform.insert_message(msg);

        let err = pipeline
            .force_pin(GUILD, SOURCE_CHANNEL, MESSAGE)
            .await
            .unwrap_err();
        assert!(matches!(err, PinError::Ineligible(_)));
        assert!(platform.state().added_reactions.is_empty());
    }

    #[tokio::test]
    async fn test_force_pin_relays_webhook_message_with_unknown_owner() {
        let (_dir, platform, pipeline) = pipeline(false);
        let mut msg = source_message(vec![]);
        msg.kind = MessageKind::ChatInputCommand;
        msg.webhook_id = Some(555);
        platform.insert_message(msg);

        let relayed = pipeline
            .force_pin(GUILD, SOURCE_CHANNEL, MESSAGE)
            .await
            .unwrap();
        assert_eq!(relayed.channel_id, PIN_CHANNEL);
    }

    #[tokio::test]
    async fn test_force_pin_refuses_own_relayed_copy() {
        let (_dir, platform, pipeline) = pipeline(false);
        let mut msg = source_message(vec![]);
        msg.webhook_id = Some(555);
        platform.insert_message(msg);
        platform.state().webhook_owners.insert(555, BOT);

        let err = pipeline
            .force_pin(GUILD, SOURCE_CHANNEL, MESSAGE)
            .await
            .unwrap_err();
        assert!(matches!(err, PinError::Ineligible(_)));
        assert!(platform.state().sent.is_empty());
    }

    #[tokio::test]
    async fn test_force_pin_without_channel() {
        let (_dir, platform, pipeline) = pipeline(false);
        pipeline.store().update(GUILD, |s| s.pin_channel = None).unwrap();
        platform.insert_message(source_message(vec![]));

        let err = pipeline
            .force_pin(GUILD, SOURCE_CHANNEL, MESSAGE)
            .await
            .unwrap_err();
        assert_eq!(err, PinError::NoChannelConfigured);
    }
}
