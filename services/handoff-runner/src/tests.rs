//! Cross-module tests for handoff-runner

#[cfg(test)]
mod tests {
    use crate::agent::{BotAgent, BotProfile, SessionRole};
    use crate::config::Config;
    use crate::context::{SessionContext, SessionSettings};
    use crate::error::SessionError;
    use crate::inventory::ItemFilter;
    use crate::paper::{PaperPlatform, CRAFTED_CATEGORY};
    use crate::registry::BotRegistry;
    use crate::session::{SessionState, TradeSession};
    use crate::transport::Transport;
    use crate::types::{BotIdentity, InventoryItem, InventorySnapshot, TradeEvent, READY_MESSAGE};
    use std::sync::Arc;
    use std::time::Duration;

    const RECEIVER: BotIdentity = BotIdentity(900);

    fn paper_context(
        registry: &Arc<BotRegistry>,
        platform: &Arc<PaperPlatform>,
        auto_craft: bool,
    ) -> Arc<SessionContext> {
        Arc::new(SessionContext::new(
            Arc::clone(registry),
            platform.clone(),
            SessionSettings {
                auto_craft,
                ack_timeout: Duration::from_millis(200),
                ..Default::default()
            },
        ))
    }

    #[test]
    fn test_filter_feeds_registry() {
        let filter = ItemFilter::new(["Crate ", "key"]);
        let snapshot = InventorySnapshot::new(
            BotIdentity(1),
            vec![
                InventoryItem::new(1, "crate"),
                InventoryItem::new(2, "hat"),
                InventoryItem::new(3, "key"),
                InventoryItem::new(4, "metal"),
            ],
        );

        let registry = BotRegistry::new(1);
        assert!(registry.register(BotIdentity(1), filter.filter(&snapshot)));
        assert!(registry.mark_ready(BotIdentity(1)));

        let ids: Vec<u64> = registry
            .items_for(BotIdentity(1))
            .unwrap()
            .iter()
            .map(|item| item.id)
            .collect();
        assert_eq!(ids, vec![2, 4]);
        assert_eq!(registry.snapshot().items_held, 2);
    }

    #[tokio::test]
    async fn test_config_settings_drive_check_in() {
        let config: Config = serde_json::from_value(serde_json::json!({
            "excluded_categories": ["crate", "Paint"],
            "ack_timeout_ms": 200,
            "bots": [ { "username": "giver1" } ]
        }))
        .unwrap();
        config.validate().unwrap();

        let (platform, _events) = PaperPlatform::new(RECEIVER);
        let bot = BotIdentity(1);
        platform.seed(
            bot,
            vec![
                InventoryItem::new(1, "paint"),
                InventoryItem::new(2, "crate"),
                InventoryItem::new(3, "hat"),
            ],
        );
        platform.login(bot);

        let registry = Arc::new(BotRegistry::new(config.total_bots()).with_trusted([RECEIVER]));
        let ctx = Arc::new(SessionContext::new(
            Arc::clone(&registry),
            platform.clone(),
            config.session_settings(),
        ));
        let mut agent = BotAgent::new(ctx, bot, SessionRole::Giving, config.bots[0].profile());
        agent.handle(TradeEvent::LoginCompleted).await;

        let held = registry.items_for(bot).unwrap();
        assert_eq!(held, vec![InventoryItem::new(3, "hat")]);
        assert_eq!(registry.count(), registry.expected());
        assert!(registry.is_ready(bot));
    }

    #[tokio::test]
    async fn test_paper_session_walkthrough() {
        let (platform, mut events) = PaperPlatform::new(RECEIVER);
        let bot = BotIdentity(1);
        platform.seed(
            bot,
            vec![InventoryItem::new(1, "weapon"), InventoryItem::new(2, "weapon")],
        );
        let registry = Arc::new(BotRegistry::new(1).with_trusted([RECEIVER]));
        let ctx = paper_context(&registry, &platform, true);
        let mut agent = BotAgent::new(ctx, bot, SessionRole::Giving, BotProfile::default());

        platform.login(bot);
        let login = events.recv().await.unwrap();
        assert_eq!(login.event, TradeEvent::LoginCompleted);
        agent.handle(login.event).await;
        let held = registry.items_for(bot).unwrap();
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].category, CRAFTED_CATEGORY);

        assert!(platform.open_trade(bot));
        // Feed the platform's own events back until the hand-off closes
        while let Ok(Some(event)) =
            tokio::time::timeout(Duration::from_millis(200), events.recv()).await
        {
            agent.handle(event.event).await;
            if agent.session().map_or(false, |s| s.is_terminal()) {
                break;
            }
        }

        let session = agent.session().unwrap();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.is_success());
        assert_eq!(platform.received().len(), 1);
        assert!(!registry.is_ready(bot));
    }

    #[tokio::test]
    async fn test_cancel_is_terminal() {
        let (platform, _events) = PaperPlatform::new(RECEIVER);
        let bot = BotIdentity(1);
        platform.seed(bot, vec![InventoryItem::new(1, "hat")]);
        platform.login(bot);

        let registry = Arc::new(BotRegistry::new(1).with_trusted([RECEIVER]));
        registry.register(bot, vec![InventoryItem::new(1, "hat")]);
        registry.mark_ready(bot);

        let ctx = paper_context(&registry, &platform, false);
        let trade_seen = platform.signals(bot).trade.generation();
        let mut session = TradeSession::open(ctx, bot, trade_seen);
        assert!(platform.open_trade(bot));
        session.on_trade_init(RECEIVER).await;
        assert_eq!(session.state(), SessionState::Staged);

        session.cancel().await;
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.last_failure(), Some(&SessionError::Cancelled));

        // Nothing moves a failed session
        session.on_trade_message(READY_MESSAGE).await;
        session.on_trade_accept().await;
        session.cancel().await;
        assert_eq!(session.state(), SessionState::Failed);
        assert!(platform.received().is_empty());
    }
}
