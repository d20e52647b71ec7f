//! Session dispatcher - one actor per bot identity
//!
//! Each bot gets a tokio task with its own mailbox. Events for one identity
//! are handled strictly in order; different identities run in parallel and
//! only meet in the shared registry.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::agent::{AgentReport, BotAgent, BotProfile, SessionRole, Verdict};
use crate::context::SessionContext;
use crate::error::DispatchError;
use crate::types::{BotIdentity, TradeEvent};

/// Mailbox depth per bot
const MAILBOX_CAPACITY: usize = 64;

enum Envelope {
    Event {
        event: TradeEvent,
        done: Option<oneshot::Sender<Verdict>>,
    },
    Cancel,
    Shutdown,
}

struct BotHandle {
    tx: mpsc::Sender<Envelope>,
    task: JoinHandle<AgentReport>,
}

/// Routes platform events to per-bot session actors
pub struct SessionDispatcher {
    ctx: Arc<SessionContext>,
    bots: DashMap<BotIdentity, BotHandle>,
}

impl SessionDispatcher {
    pub fn new(ctx: Arc<SessionContext>) -> Self {
        Self {
            ctx,
            bots: DashMap::new(),
        }
    }

    pub fn context(&self) -> &Arc<SessionContext> {
        &self.ctx
    }

    /// Start the actor for `bot`
    pub fn spawn_bot(
        &self,
        bot: BotIdentity,
        role: SessionRole,
        profile: BotProfile,
    ) -> Result<(), DispatchError> {
        let slot = match self.bots.entry(bot) {
            Entry::Occupied(existing) if !existing.get().tx.is_closed() => {
                return Err(DispatchError::AlreadyRunning(bot));
            }
            slot => slot,
        };

        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let agent = BotAgent::new(Arc::clone(&self.ctx), bot, role, profile);
        let task = tokio::spawn(run_agent(agent, rx));
        slot.insert(BotHandle { tx, task });

        debug!("Spawned {:?} actor for bot {}", role, bot);
        Ok(())
    }

    pub fn is_running(&self, bot: BotIdentity) -> bool {
        self.bots
            .get(&bot)
            .map_or(false, |handle| !handle.tx.is_closed())
    }

    pub fn bots(&self) -> Vec<BotIdentity> {
        let mut bots: Vec<_> = self.bots.iter().map(|entry| *entry.key()).collect();
        bots.sort();
        bots
    }

    /// Queue an event without waiting for it to be handled
    pub async fn dispatch(&self, bot: BotIdentity, event: TradeEvent) -> Result<(), DispatchError> {
        let tx = self.sender(bot)?;
        tx.send(Envelope::Event { event, done: None })
            .await
            .map_err(|_| DispatchError::BotStopped(bot))
    }

    /// Queue an event and wait until the bot's actor has handled it
    pub async fn dispatch_and_wait(
        &self,
        bot: BotIdentity,
        event: TradeEvent,
    ) -> Result<Verdict, DispatchError> {
        let tx = self.sender(bot)?;
        let (done, verdict) = oneshot::channel();
        tx.send(Envelope::Event {
            event,
            done: Some(done),
        })
        .await
        .map_err(|_| DispatchError::BotStopped(bot))?;

        verdict.await.map_err(|_| DispatchError::BotStopped(bot))
    }

    /// Ask the bot to answer a friend or trade request
    pub async fn request(&self, bot: BotIdentity, event: TradeEvent) -> Result<bool, DispatchError> {
        match self.dispatch_and_wait(bot, event).await? {
            Verdict::Authorization(accepted) => Ok(accepted),
            _ => Ok(false),
        }
    }

    /// Cancel the bot's open negotiation
    pub async fn cancel(&self, bot: BotIdentity) -> Result<(), DispatchError> {
        let tx = self.sender(bot)?;
        tx.send(Envelope::Cancel)
            .await
            .map_err(|_| DispatchError::BotStopped(bot))
    }

    /// Stop every actor and collect their reports
    pub async fn shutdown(&self) -> Vec<AgentReport> {
        let mut reports = Vec::new();

        for bot in self.bots() {
            let Some((_, handle)) = self.bots.remove(&bot) else {
                continue;
            };
            // Closed mailboxes belong to actors that already ended
            let _ = handle.tx.send(Envelope::Shutdown).await;
            match handle.task.await {
                Ok(report) => reports.push(report),
                Err(e) => warn!("Bot {} actor ended abnormally: {}", bot, e),
            }
        }

        info!("Dispatcher shut down {} bots", reports.len());
        reports
    }

    fn sender(&self, bot: BotIdentity) -> Result<mpsc::Sender<Envelope>, DispatchError> {
        let handle = self.bots.get(&bot).ok_or(DispatchError::UnknownBot(bot))?;
        if handle.tx.is_closed() {
            return Err(DispatchError::BotStopped(bot));
        }
        Ok(handle.tx.clone())
    }
}

async fn run_agent(mut agent: BotAgent, mut rx: mpsc::Receiver<Envelope>) -> AgentReport {
    let bot = agent.bot();
    debug!("Bot {} actor started", bot);

    loop {
        let next = match agent.deadline() {
            Some(deadline) => {
                let deadline = tokio::time::Instant::from_std(deadline);
                match tokio::time::timeout_at(deadline, rx.recv()).await {
                    Ok(next) => next,
                    Err(_) => {
                        warn!("Bot {} negotiation went quiet", bot);
                        agent.handle(TradeEvent::TradeTimeout).await;
                        if agent.is_stopped() {
                            break;
                        }
                        continue;
                    }
                }
            }
            None => rx.recv().await,
        };

        let Some(envelope) = next else {
            break;
        };

        match envelope {
            Envelope::Event { event, done } => {
                let verdict = agent.handle(event).await;
                if let Some(done) = done {
                    let _ = done.send(verdict);
                }
            }
            Envelope::Cancel => agent.cancel().await,
            Envelope::Shutdown => break,
        }

        if agent.is_stopped() {
            info!("Bot {} stopped, ending its actor", bot);
            break;
        }
    }

    agent.report()
}
