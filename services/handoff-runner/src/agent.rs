//! Bot agent - per-identity event handler
//!
//! An agent owns one bot identity for the lifetime of the process. It answers
//! authorization requests, performs the login check-in against the registry
//! and routes trade events to the current [`TradeSession`]. A new session is
//! opened when a trade starts after the previous negotiation ended and the
//! bot is still waiting to trade.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::context::SessionContext;
use crate::error::SessionError;
use crate::session::{SessionState, TradeSession};
use crate::types::{BotIdentity, TradeEvent};

/// What a bot does in the fleet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionRole {
    /// Hands every eligible item to an authorized counterparty
    #[default]
    Giving,
    /// Collects hand-offs; only vouches for itself as a counterparty
    Receiving,
}

/// Result of handling one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Handled,
    Ignored,
    /// Answer to a friend or trade request
    Authorization(bool),
}

/// Per-bot negotiation limits
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BotProfile {
    /// Longest silence tolerated while a trade window is open
    pub action_gap: Duration,
    /// Longest a single negotiation may run
    pub trade_deadline: Duration,
}

impl Default for BotProfile {
    fn default() -> Self {
        Self {
            action_gap: Duration::from_secs(30),
            trade_deadline: Duration::from_secs(180),
        }
    }
}

/// Summary of an agent when its actor ends
#[derive(Debug, Clone, Serialize)]
pub struct AgentReport {
    pub bot: BotIdentity,
    pub role: SessionRole,
    pub registered: bool,
    pub ready: bool,
    pub stopped: bool,
    pub negotiations: u32,
    pub handoffs: u32,
    pub last_state: Option<SessionState>,
    pub last_failure: Option<String>,
}

pub struct BotAgent {
    bot: BotIdentity,
    role: SessionRole,
    profile: BotProfile,
    ctx: Arc<SessionContext>,
    session: Option<TradeSession>,
    trade_seen: u64,
    negotiations: u32,
    handoffs: u32,
    negotiation_started: Option<Instant>,
    last_event_at: Instant,
}

impl BotAgent {
    pub fn new(
        ctx: Arc<SessionContext>,
        bot: BotIdentity,
        role: SessionRole,
        profile: BotProfile,
    ) -> Self {
        let trade_seen = ctx.transport.signals(bot).trade.generation();
        Self {
            bot,
            role,
            profile,
            ctx,
            session: None,
            trade_seen,
            negotiations: 0,
            handoffs: 0,
            negotiation_started: None,
            last_event_at: Instant::now(),
        }
    }

    pub fn bot(&self) -> BotIdentity {
        self.bot
    }

    pub fn role(&self) -> SessionRole {
        self.role
    }

    pub fn session(&self) -> Option<&TradeSession> {
        self.session.as_ref()
    }

    pub fn is_stopped(&self) -> bool {
        self.ctx.registry.is_stopped(self.bot)
    }

    /// When the open negotiation times out, if one is open
    pub fn deadline(&self) -> Option<Instant> {
        let session = self.session.as_ref()?;
        if !session.is_negotiating() {
            return None;
        }

        let quiet = self.last_event_at + self.profile.action_gap;
        let overall = self
            .negotiation_started
            .map(|started| started + self.profile.trade_deadline)
            .unwrap_or(quiet);
        Some(quiet.min(overall))
    }

    /// Handle one platform event
    pub async fn handle(&mut self, event: TradeEvent) -> Verdict {
        debug!("Bot {} event {}", self.bot, event.name());
        self.last_event_at = Instant::now();

        match event {
            TradeEvent::LoginCompleted => {
                self.on_login().await;
                Verdict::Handled
            }
            TradeEvent::FriendAddRequest { from } => Verdict::Authorization(self.authorize("friend", from)),
            TradeEvent::TradeRequest { from } => Verdict::Authorization(self.authorize("trade", from)),
            TradeEvent::TradeInitiated { with } => self.on_trade_init(with).await,
            TradeEvent::ChatMessage { from, message } => {
                debug!("Bot {} chat from {}: {}", self.bot, from, message);
                Verdict::Ignored
            }
            event => self.route(event).await,
        }
    }

    /// Cancel the open negotiation, if any
    pub async fn cancel(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.cancel().await;
        }
    }

    pub fn report(&self) -> AgentReport {
        let current_success = self.session.as_ref().map_or(false, |s| s.is_success());
        AgentReport {
            bot: self.bot,
            role: self.role,
            registered: self.ctx.registry.is_registered(self.bot),
            ready: self.ctx.registry.is_ready(self.bot),
            stopped: self.is_stopped(),
            negotiations: self.negotiations,
            handoffs: self.handoffs + u32::from(current_success),
            last_state: self.session.as_ref().map(|s| s.state()),
            last_failure: self
                .session
                .as_ref()
                .and_then(|s| s.last_failure())
                .map(|e| e.to_string()),
        }
    }

    fn authorize(&self, kind: &str, from: BotIdentity) -> bool {
        if self.ctx.registry.is_authorized(from) {
            debug!("Bot {} accepting {} request from {}", self.bot, kind, from);
            true
        } else {
            let err = SessionError::AuthorizationDenied { counterparty: from };
            info!("Bot {} rejecting {} request: {}", self.bot, kind, err);
            false
        }
    }

    async fn on_login(&mut self) {
        match self.role {
            SessionRole::Receiving => {
                self.ctx.registry.authorize(self.bot);
                info!("[Receiving] Bot {} online", self.bot);
            }
            SessionRole::Giving => self.check_in().await,
        }
    }

    async fn check_in(&mut self) {
        if self.is_stopped() {
            debug!("Bot {} already stopped, ignoring login", self.bot);
            return;
        }

        if self.ctx.settings.auto_craft {
            self.craft().await;
        }

        let eligible = match self.ctx.live_items(self.bot).await {
            Ok(items) => items,
            Err(e) => {
                error!("Bot {} inventory fetch failed at login: {}", self.bot, e);
                return;
            }
        };

        let registry = &self.ctx.registry;
        registry.register(self.bot, eligible);
        info!(
            "[Giving] Bot {} checking in. {} of {} bots.",
            self.bot,
            registry.count(),
            registry.expected()
        );

        let held = registry.items_for(self.bot).map_or(0, |items| items.len());
        if held == 0 {
            info!(
                "Bot {} did not have a trade-worthy item ({}). Stopping bot.",
                self.bot,
                SessionError::NoEligibleItems
            );
            self.ctx.stop_bot(self.bot).await;
            return;
        }

        registry.mark_ready(self.bot);
        info!(
            "Bot {} has {} items. Added to list. {} bots waiting to trade.",
            self.bot,
            held,
            registry.ready_count()
        );

        if self.session.as_ref().map_or(true, |s| s.is_terminal()) {
            self.open_session();
        }
    }

    async fn craft(&self) {
        let signal = self.ctx.transport.signals(self.bot).inventory;
        let seen = signal.generation();

        if let Err(e) = self.ctx.transport.craft_all(self.bot).await {
            warn!("Bot {} crafting failed: {}", self.bot, e);
            return;
        }
        if let Err(e) = signal.wait_past(seen, self.ctx.settings.ack_timeout).await {
            warn!(
                "Bot {} inventory refresh not acknowledged ({}), fetching anyway",
                self.bot, e
            );
        }
    }

    async fn on_trade_init(&mut self, with: BotIdentity) -> Verdict {
        if self.role == SessionRole::Receiving {
            debug!("[Receiving] Bot {} trade with {} opened", self.bot, with);
            return Verdict::Ignored;
        }

        if self.session.as_ref().map_or(true, |s| s.is_terminal()) {
            if !self.ctx.registry.is_ready(self.bot) || self.is_stopped() {
                debug!("Bot {} not waiting to trade, ignoring trade with {}", self.bot, with);
                return Verdict::Ignored;
            }
            self.open_session();
        }

        let Some(session) = self.session.as_mut() else {
            return Verdict::Ignored;
        };
        if session.state() == SessionState::Registered {
            self.negotiations += 1;
            self.negotiation_started = Some(Instant::now());
        }
        session.on_trade_init(with).await;
        Verdict::Handled
    }

    async fn route(&mut self, event: TradeEvent) -> Verdict {
        let Some(session) = self.session.as_mut() else {
            debug!("Bot {} has no session for {}", self.bot, event.name());
            return Verdict::Ignored;
        };

        match event {
            TradeEvent::TradeReady { ready } => session.on_trade_ready(ready).await,
            TradeEvent::TradeMessage { message } => session.on_trade_message(&message).await,
            TradeEvent::TradeAccepted => session.on_trade_accept().await,
            TradeEvent::TradeTimeout => session.on_trade_timeout().await,
            TradeEvent::TradeError { error } => session.on_trade_error(&error).await,
            TradeEvent::TradeClosed => session.on_trade_close().await,
            _ => return Verdict::Ignored,
        }
        Verdict::Handled
    }

    fn open_session(&mut self) {
        if let Some(previous) = self.session.take() {
            self.trade_seen = self.trade_seen.max(previous.trade_seen());
            if previous.is_success() {
                self.handoffs += 1;
            }
        }
        self.negotiation_started = None;

        let session = TradeSession::open(Arc::clone(&self.ctx), self.bot, self.trade_seen);
        debug!("Bot {} opened session {}", self.bot, session.id());
        self.session = Some(session);
    }
}
