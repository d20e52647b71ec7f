//! Trade session - one negotiation of a giving bot with its counterparty
//!
//! The session is driven by platform events and issues commands through the
//! shared [`SessionContext`]. Emptiness is always re-derived from a fresh
//! inventory fetch; the registry copy of a bot's items can go stale while
//! crafting or staging is in flight.

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::context::SessionContext;
use crate::error::SessionError;
use crate::types::{error_notice, BotIdentity, FAILED_NOTICE, READY_MESSAGE};

/// Negotiation states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Registered,
    Initiated,
    Staged,
    ReadySent,
    ReadyConfirmed,
    Accepted { ambiguous: bool },
    Closed,
    Failed,
}

impl SessionState {
    /// Closed and Failed never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }
}

/// One negotiation of a giving bot
pub struct TradeSession {
    id: Uuid,
    bot: BotIdentity,
    counterparty: Option<BotIdentity>,
    state: SessionState,
    staged: usize,
    success: bool,
    last_failure: Option<SessionError>,
    /// Last trade-signal generation this bot has consumed
    trade_seen: u64,
    started_at: Instant,
    ctx: Arc<SessionContext>,
}

impl TradeSession {
    /// Open a session for a bot that is registered and ready
    pub fn open(ctx: Arc<SessionContext>, bot: BotIdentity, trade_seen: u64) -> Self {
        let mut session = Self {
            id: Uuid::new_v4(),
            bot,
            counterparty: None,
            state: SessionState::Idle,
            staged: 0,
            success: false,
            last_failure: None,
            trade_seen,
            started_at: Instant::now(),
            ctx,
        };
        session.transition(SessionState::Registered);
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn bot(&self) -> BotIdentity {
        self.bot
    }

    pub fn counterparty(&self) -> Option<BotIdentity> {
        self.counterparty
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Items staged in this negotiation
    pub fn staged(&self) -> usize {
        self.staged
    }

    /// True once the hand-off succeeded, including ambiguous successes
    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn last_failure(&self) -> Option<&SessionError> {
        self.last_failure.as_ref()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// A trade window is open and the session expects more traffic
    pub fn is_negotiating(&self) -> bool {
        !matches!(self.state, SessionState::Idle | SessionState::Registered) && !self.is_terminal()
    }

    pub fn trade_seen(&self) -> u64 {
        self.trade_seen
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    fn transition(&mut self, next: SessionState) {
        debug!(
            "Session {} bot {}: {:?} -> {:?}",
            self.id, self.bot, self.state, next
        );
        self.state = next;
    }

    /// Trade window opened: stage everything and start the ready handshake
    pub async fn on_trade_init(&mut self, with: BotIdentity) {
        if self.state != SessionState::Registered {
            debug!("Bot {} ignoring trade init in {:?}", self.bot, self.state);
            return;
        }

        self.counterparty = Some(with);
        self.transition(SessionState::Initiated);

        let trade_signal = self.ctx.transport.signals(self.bot).trade;
        match trade_signal
            .wait_past(self.trade_seen, self.ctx.settings.ack_timeout)
            .await
        {
            Ok(generation) => self.trade_seen = generation,
            Err(e) => {
                warn!("Bot {} trade window not acknowledged: {}", self.bot, e);
                self.on_trade_timeout().await;
                return;
            }
        }

        debug!("Bot {} adding all items", self.bot);
        let items = self.ctx.registry.items_for(self.bot).unwrap_or_default();
        let staged = match self.ctx.transport.stage_items(self.bot, &items).await {
            Ok(staged) => staged,
            Err(e) => {
                warn!("Bot {} staging failed: {}", self.bot, e);
                0
            }
        };
        self.staged = staged;
        self.transition(SessionState::Staged);

        if staged > 0 {
            info!("Bot {} added {} items", self.bot, staged);
            if let Err(e) = self
                .ctx
                .transport
                .send_application_message(self.bot, READY_MESSAGE)
                .await
            {
                self.fail(SessionError::ReadyHandshakeFailure(e)).await;
            }
            return;
        }

        warn!("Bot {} staged nothing, re-checking inventory", self.bot);
        match self.ctx.live_eligible(self.bot).await {
            Ok(0) => {
                warn!("Bot {} has no items in inventory, this shouldn't be possible", self.bot);
                self.retire(SessionError::StagingFailure { remaining: 0 }).await;
            }
            Ok(remaining) => {
                debug!("Bot {} still has {} items to trade, aborting trade", self.bot, remaining);
                self.abandon(SessionError::StagingFailure { remaining }).await;
            }
            Err(e) => {
                // Unknown inventory counts as items remaining
                warn!("Bot {} inventory re-check failed, aborting trade: {}", self.bot, e);
                self.abandon(SessionError::Transport(e.to_string())).await;
            }
        }
    }

    /// Application message inside the trade
    pub async fn on_trade_message(&mut self, message: &str) {
        debug!("Bot {} message received: {}", self.bot, message);

        if message != READY_MESSAGE {
            return;
        }
        if self.state != SessionState::Staged {
            debug!("Bot {} ignoring ready message in {:?}", self.bot, self.state);
            return;
        }

        match self.ctx.transport.set_local_ready(self.bot, true).await {
            Ok(()) => self.transition(SessionState::ReadySent),
            Err(e) => self.fail(SessionError::ReadyHandshakeFailure(e)).await,
        }
    }

    /// Counterparty toggled its ready flag
    pub async fn on_trade_ready(&mut self, ready: bool) {
        debug!("Bot {} trade ready: {}", self.bot, ready);

        if !ready {
            return;
        }
        if !matches!(
            self.state,
            SessionState::ReadySent | SessionState::ReadyConfirmed
        ) {
            debug!("Bot {} ignoring ready notification in {:?}", self.bot, self.state);
            return;
        }

        let Some(counterparty) = self.counterparty else {
            return;
        };
        if !self.ctx.registry.is_authorized(counterparty) {
            let err = SessionError::AuthorizationDenied { counterparty };
            warn!("Bot {} not accepting: {}", self.bot, err);
            self.last_failure = Some(err);
            return;
        }

        if self.state == SessionState::ReadySent {
            self.transition(SessionState::ReadyConfirmed);
        }
        self.attempt_accept().await;
    }

    async fn attempt_accept(&mut self) {
        let err = match self.ctx.transport.accept_trade(self.bot).await {
            Ok(()) => {
                self.success = true;
                self.transition(SessionState::Accepted { ambiguous: false });
                info!("Bot {} trade was successful", self.bot);
                return;
            }
            Err(e) => e,
        };

        warn!("Bot {} trade might have failed: {}", self.bot, err);
        match self.ctx.live_eligible(self.bot).await {
            Ok(0) => {
                // The accept acknowledgment is unreliable: an empty inventory
                // after a failed accept is read as a completed hand-off. This
                // suppresses false negatives and can mask a real loss.
                warn!("Bot {} has no items, trade may have succeeded. Removing bot", self.bot);
                self.success = true;
                self.last_failure = Some(SessionError::AcceptFailure { ambiguous: true });
                self.transition(SessionState::Accepted { ambiguous: true });
                self.ctx.registry.unmark(self.bot);
                self.close_trade().await;
                self.ctx.stop_bot(self.bot).await;
                self.transition(SessionState::Closed);
            }
            Ok(remaining) => {
                debug!("Bot {} still holds {} items, accept can be retried", self.bot, remaining);
                self.last_failure = Some(SessionError::AcceptFailure { ambiguous: false });
            }
            Err(e) => {
                warn!("Bot {} inventory re-check failed: {}", self.bot, e);
                self.last_failure = Some(SessionError::Transport(e.to_string()));
            }
        }
    }

    /// Counterparty acknowledged the completed hand-off
    pub async fn on_trade_accept(&mut self) {
        if self.is_terminal() {
            debug!("Bot {} ignoring accept acknowledgment in {:?}", self.bot, self.state);
            return;
        }

        self.ctx.registry.unmark(self.bot);
        self.close_trade().await;
        self.transition(SessionState::Closed);
    }

    /// The platform or the session deadline gave up on the trade
    pub async fn on_trade_timeout(&mut self) {
        if self.is_terminal() {
            return;
        }
        if matches!(self.state, SessionState::Accepted { .. }) {
            // Our accept went through; only the acknowledgment is missing
            warn!("Bot {} accept never acknowledged, closing as handed off", self.bot);
            self.on_trade_accept().await;
            return;
        }

        warn!("Bot {} trade timeout", self.bot);
        match self.ctx.live_eligible(self.bot).await {
            Ok(0) => {
                debug!("Bot {} has no items in inventory, removing", self.bot);
                self.retire(SessionError::Timeout { remaining: 0 }).await;
            }
            Ok(remaining) => {
                debug!("Bot {} still has items to trade", self.bot);
                self.fail(SessionError::Timeout { remaining }).await;
            }
            Err(e) => self.fail(SessionError::Transport(e.to_string())).await,
        }
    }

    /// Platform error: tell the counterparty, leave the state alone
    pub async fn on_trade_error(&mut self, error: &str) {
        warn!("Bot {} trade error: {}", self.bot, error);
        self.notify_counterparty(&error_notice(error)).await;
    }

    /// Trade window closed
    pub async fn on_trade_close(&mut self) {
        warn!("Bot {} trade closed", self.bot);
        self.close_trade().await;
        if !self.is_terminal() {
            self.transition(SessionState::Closed);
        }
    }

    /// Cooperative cancellation; a no-op once terminal
    pub async fn cancel(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.fail(SessionError::Cancelled).await;
    }

    /// Recoverable failure: cancel, close, leave the bot running
    async fn fail(&mut self, reason: SessionError) {
        warn!("Bot {} negotiation failed: {}", self.bot, reason);
        self.cancel_trade().await;
        self.close_trade().await;
        self.last_failure = Some(reason);
        self.transition(SessionState::Failed);
    }

    /// Staging went nowhere: tell the counterparty and close, leave the bot running
    async fn abandon(&mut self, reason: SessionError) {
        self.notify_counterparty(FAILED_NOTICE).await;
        self.close_trade().await;
        self.last_failure = Some(reason);
        self.transition(SessionState::Failed);
    }

    /// Fatal failure: the bot has nothing left to give
    async fn retire(&mut self, reason: SessionError) {
        warn!("Bot {} retiring: {}", self.bot, reason);
        self.ctx.registry.unmark(self.bot);
        self.cancel_trade().await;
        self.close_trade().await;
        self.ctx.stop_bot(self.bot).await;
        self.last_failure = Some(reason);
        self.transition(SessionState::Failed);
    }

    async fn notify_counterparty(&self, message: &str) {
        let Some(counterparty) = self.counterparty else {
            return;
        };
        if let Err(e) = self
            .ctx
            .transport
            .send_chat_message(self.bot, counterparty, message)
            .await
        {
            warn!("Bot {} could not message {}: {}", self.bot, counterparty, e);
        }
    }

    async fn cancel_trade(&self) {
        if let Err(e) = self.ctx.transport.cancel_trade(self.bot).await {
            debug!("Bot {} cancel: {}", self.bot, e);
        }
    }

    async fn close_trade(&self) {
        if let Err(e) = self.ctx.transport.close_trade(self.bot).await {
            debug!("Bot {} close: {}", self.bot, e);
        }
    }
}
