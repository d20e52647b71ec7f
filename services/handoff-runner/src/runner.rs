//! Fleet Runner - Main orchestration loop for paper runs

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::agent::AgentReport;
use crate::config::Config;
use crate::context::SessionContext;
use crate::dispatcher::SessionDispatcher;
use crate::error::DispatchError;
use crate::paper::PaperPlatform;
use crate::registry::{BotRegistry, RegistrySnapshot};
use crate::state::{FleetState, StateManager};
use crate::types::{PlatformEvent, TradeEvent};

/// Rounds of trade requests before the runner gives up on stragglers
const MAX_TRADE_ROUNDS: u32 = 3;

/// What a finished run produced
#[derive(Debug, Clone)]
pub struct FleetOutcome {
    pub registry: RegistrySnapshot,
    pub reports: Vec<AgentReport>,
    pub items_received: usize,
}

/// Drives a fleet against the paper platform until every bot has handed off
pub struct FleetRunner {
    config: Config,
    platform: Arc<PaperPlatform>,
    events: mpsc::UnboundedReceiver<PlatformEvent>,
    registry: Arc<BotRegistry>,
    dispatcher: SessionDispatcher,
    state: StateManager,
    idle_timeout: Duration,
}

impl FleetRunner {
    /// Create new fleet runner
    pub fn new(
        config: Config,
        platform: Arc<PaperPlatform>,
        events: mpsc::UnboundedReceiver<PlatformEvent>,
    ) -> Self {
        let mut trusted = config.admins.clone();
        trusted.push(platform.receiver());

        let registry = Arc::new(BotRegistry::new(config.total_bots()).with_trusted(trusted));
        let ctx = Arc::new(SessionContext::new(
            Arc::clone(&registry),
            platform.clone(),
            config.session_settings(),
        ));
        let state = StateManager::new(&config.state_dir);
        let idle_timeout = config.ack_timeout();

        Self {
            config,
            platform,
            events,
            registry,
            dispatcher: SessionDispatcher::new(ctx),
            state,
            idle_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<BotRegistry> {
        &self.registry
    }

    /// Run until no bot is left waiting to trade
    pub async fn run(mut self) -> anyhow::Result<FleetOutcome> {
        info!("Fleet runner starting {} bots...", self.config.total_bots());
        self.state.init().await?;
        self.start_bots();

        let mut rounds = 0;
        loop {
            match tokio::time::timeout(self.idle_timeout, self.events.recv()).await {
                Ok(Some(event)) => self.deliver(event).await,
                Ok(None) => break,
                Err(_) => {
                    if self.registry.ready_count() == 0 {
                        info!("No bots waiting to trade");
                        break;
                    }
                    if rounds == MAX_TRADE_ROUNDS {
                        warn!(
                            "Giving up after {} rounds, {} bots still waiting",
                            rounds,
                            self.registry.ready_count()
                        );
                        break;
                    }
                    rounds += 1;
                    self.request_trades().await;
                }
            }
        }

        let reports = self.dispatcher.shutdown().await;
        let items_received = self.platform.received().len();
        let registry = self.registry.snapshot();

        let fleet = FleetState::new("finished", registry.clone(), reports.clone(), items_received);
        if let Err(e) = self.state.write_fleet(&fleet).await {
            warn!("Failed to write fleet state: {}", e);
        }

        info!(
            "Fleet finished: {} of {} bots checked in, {} items received",
            registry.registered, registry.expected, items_received
        );
        Ok(FleetOutcome {
            registry,
            reports,
            items_received,
        })
    }

    fn start_bots(&self) {
        let accounts = self
            .config
            .paper
            .as_ref()
            .map(|paper| paper.accounts.as_slice())
            .unwrap_or_default();

        for bot in self.config.starting_bots() {
            let Some(account) = accounts.iter().find(|a| a.username == bot.username) else {
                warn!("No paper account for bot '{}', skipping", bot.username);
                continue;
            };

            self.platform.seed(account.identity, account.items.clone());
            if let Err(e) = self
                .dispatcher
                .spawn_bot(account.identity, bot.role, bot.profile())
            {
                warn!("Bot '{}' not started: {}", bot.username, e);
                continue;
            }
            self.platform.login(account.identity);
        }
    }

    async fn deliver(&self, event: PlatformEvent) {
        match self.dispatcher.dispatch(event.bot, event.event).await {
            Ok(()) => {}
            Err(DispatchError::BotStopped(bot)) => debug!("Dropping event for stopped bot {}", bot),
            Err(e) => warn!("Undeliverable event: {}", e),
        }
    }

    /// Have the receiver ask every waiting bot for a trade
    async fn request_trades(&self) {
        let receiver = self.platform.receiver();

        for bot in self.registry.ready_bots() {
            if !self.dispatcher.is_running(bot) {
                continue;
            }
            let request = TradeEvent::TradeRequest { from: receiver };
            match self.dispatcher.request(bot, request).await {
                Ok(true) => {
                    if self.platform.open_trade(bot) {
                        debug!("Opened trade between {} and {}", bot, receiver);
                    }
                }
                Ok(false) => warn!("Bot {} refused a trade with {}", bot, receiver),
                Err(e) => debug!("Trade request not delivered: {}", e),
            }
        }
    }
}
