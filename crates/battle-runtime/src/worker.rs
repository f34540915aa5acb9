//! Background task that owns the authoritative [`battle_core::BattleState`].
//!
//! Receives commands from [`crate::BattleHandle`], drives the engine, and
//! publishes [`BattleEvent`] notifications. Animation directives fan out to
//! spawned driver calls whose completions flow back through a channel, so a
//! slow driver never blocks command processing.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use battle_core::{
    AnimationToken, BattleConfig, BattleEngine, BattleEvent, BattleReport, BattleSnapshot,
    BattleState, CombatantId, CommandError, CommandKind, Directive,
};

use crate::animation::AnimationDriver;

/// Commands that can be sent to the battle worker.
pub(crate) enum Command {
    /// Order the current actor to act.
    Submit {
        actor: CombatantId,
        kind: CommandKind,
        target: Option<CombatantId>,
        reply: oneshot::Sender<Result<(), CommandError>>,
    },
    /// Queue an out-of-turn ultimate.
    RequestCutIn {
        caster: CombatantId,
        reply: oneshot::Sender<Result<(), CommandError>>,
    },
    /// Set the sticky player target.
    SelectTarget {
        target: CombatantId,
        reply: oneshot::Sender<Result<(), CommandError>>,
    },
    /// Read-only view of the battle.
    Snapshot { reply: oneshot::Sender<BattleSnapshot> },
    /// End-of-battle export, `None` while running.
    Report {
        reply: oneshot::Sender<Option<BattleReport>>,
    },
    Shutdown,
}

pub(crate) struct BattleWorker {
    state: BattleState,
    config: BattleConfig,
    driver: Arc<dyn AnimationDriver>,
    command_rx: mpsc::Receiver<Command>,
    completion_tx: mpsc::Sender<AnimationToken>,
    completion_rx: mpsc::Receiver<AnimationToken>,
    event_tx: broadcast::Sender<BattleEvent>,
    tick_interval: Duration,
}

impl BattleWorker {
    pub fn new(
        state: BattleState,
        config: BattleConfig,
        driver: Arc<dyn AnimationDriver>,
        command_rx: mpsc::Receiver<Command>,
        event_tx: broadcast::Sender<BattleEvent>,
        tick_interval: Duration,
    ) -> Self {
        let (completion_tx, completion_rx) = mpsc::channel(64);
        Self {
            state,
            config,
            driver,
            command_rx,
            completion_tx,
            completion_rx,
            event_tx,
            tick_interval,
        }
    }

    /// Main worker loop. Exits when told to shut down or when every handle
    /// is dropped.
    pub async fn run(mut self) {
        self.with_engine(|engine| engine.start());

        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last = Instant::now();

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(Command::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd),
                },
                Some(token) = self.completion_rx.recv() => {
                    self.with_engine(|engine| engine.animation_finished(token));
                }
                _ = ticker.tick() => {
                    let now = Instant::now();
                    let elapsed = now.duration_since(last);
                    last = now;
                    self.with_engine(|engine| engine.tick(elapsed));
                }
            }
        }
        debug!(target: "battle_runtime::worker", "battle worker stopped");
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Submit {
                actor,
                kind,
                target,
                reply,
            } => {
                let result =
                    self.with_engine(|engine| engine.submit_command(actor, kind, target));
                if let Err(error) = &result {
                    debug!(
                        target: "battle_runtime::worker",
                        %actor,
                        %kind,
                        %error,
                        "command rejected"
                    );
                }
                let _ = reply.send(result);
            }
            Command::RequestCutIn { caster, reply } => {
                let result = self.with_engine(|engine| engine.request_cut_in(caster));
                let _ = reply.send(result);
            }
            Command::SelectTarget { target, reply } => {
                let result = self.with_engine(|engine| engine.select_target(target));
                let _ = reply.send(result);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.state.snapshot());
            }
            Command::Report { reply } => {
                let report =
                    self.with_engine(|engine| engine.report());
                let _ = reply.send(report);
            }
            Command::Shutdown => unreachable!("handled in run loop"),
        }
    }

    /// Run one engine call, then flush its outboxes: events to subscribers,
    /// directives to the animation driver.
    fn with_engine<R>(&mut self, f: impl FnOnce(&mut BattleEngine<'_>) -> R) -> R {
        let mut engine = BattleEngine::new(&mut self.state, &self.config);
        let out = f(&mut engine);
        let events = engine.take_events();
        let directives = engine.take_directives();
        drop(engine);

        for event in events {
            match &event {
                BattleEvent::WatchdogFired { epoch } => {
                    warn!(target: "battle_runtime::worker", epoch, "watchdog force-advanced a stalled turn");
                }
                BattleEvent::InvariantViolation { detail } => {
                    warn!(target: "battle_runtime::worker", %detail, "battle ended defensively");
                }
                BattleEvent::BattleEnded { player_won } => {
                    info!(target: "battle_runtime::worker", player_won, "battle ended");
                }
                _ => {}
            }
            // Subscribers may come and go; delivery is best-effort.
            let _ = self.event_tx.send(event);
        }
        for directive in directives {
            self.dispatch(directive);
        }
        out
    }

    fn dispatch(&self, directive: Directive) {
        let Directive::PlayAnimation { token, unit, cue } = directive;
        let driver = Arc::clone(&self.driver);
        let completion_tx = self.completion_tx.clone();
        tokio::spawn(async move {
            driver.play(unit, cue).await;
            let _ = completion_tx.send(token).await;
        });
    }
}
