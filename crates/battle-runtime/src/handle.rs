//! Client-facing handle to a running battle.

use battle_core::{
    BattleEvent, BattleOutcome, BattleReport, BattleSnapshot, CombatantId, CommandKind,
};
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::error::{Result, RuntimeError};
use crate::worker::Command;

/// Cloneable facade over the battle worker. All mutation goes through the
/// worker's command channel; reads return point-in-time snapshots.
#[derive(Clone)]
pub struct BattleHandle {
    command_tx: mpsc::Sender<Command>,
    event_tx: broadcast::Sender<BattleEvent>,
}

impl BattleHandle {
    pub(crate) fn new(
        command_tx: mpsc::Sender<Command>,
        event_tx: broadcast::Sender<BattleEvent>,
    ) -> Self {
        Self {
            command_tx,
            event_tx,
        }
    }

    /// Order the current actor to use its basic attack.
    pub async fn attack(&self, actor: CombatantId, target: Option<CombatantId>) -> Result<()> {
        self.submit(actor, CommandKind::Attack, target).await
    }

    /// Order the current actor to use its ultimate.
    pub async fn ultimate(&self, actor: CombatantId, target: Option<CombatantId>) -> Result<()> {
        self.submit(actor, CommandKind::Ultimate, target).await
    }

    pub async fn submit(
        &self,
        actor: CombatantId,
        kind: CommandKind,
        target: Option<CombatantId>,
    ) -> Result<()> {
        self.request(|reply| Command::Submit {
            actor,
            kind,
            target,
            reply,
        })
        .await??;
        Ok(())
    }

    /// Queue an out-of-turn ultimate for the next between-turns window.
    pub async fn request_cut_in(&self, caster: CombatantId) -> Result<()> {
        self.request(|reply| Command::RequestCutIn { caster, reply })
            .await??;
        Ok(())
    }

    /// Set the sticky target used when a command carries none.
    pub async fn select_target(&self, target: CombatantId) -> Result<()> {
        self.request(|reply| Command::SelectTarget { target, reply })
            .await??;
        Ok(())
    }

    pub async fn snapshot(&self) -> Result<BattleSnapshot> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// End-of-battle export; `None` while the battle is still running.
    pub async fn report(&self) -> Result<Option<BattleReport>> {
        self.request(|reply| Command::Report { reply }).await
    }

    /// Subscribe to battle events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<BattleEvent> {
        self.event_tx.subscribe()
    }

    /// Wait until the battle is decided.
    pub async fn wait_for_outcome(&self) -> Result<BattleOutcome> {
        // Subscribe before checking so an end between the two is not missed.
        let mut events = self.subscribe_events();
        if let Some(outcome) = self.snapshot().await?.outcome {
            return Ok(outcome);
        }
        loop {
            match events.recv().await {
                Ok(BattleEvent::BattleEnded { player_won }) => {
                    return Ok(BattleOutcome { player_won });
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    if let Some(outcome) = self.snapshot().await?.outcome {
                        return Ok(outcome);
                    }
                }
                Err(broadcast::error::RecvError::Closed) => return Err(RuntimeError::WorkerGone),
            }
        }
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(build(reply_tx))
            .await
            .map_err(|_| RuntimeError::WorkerGone)?;
        reply_rx.await.map_err(|_| RuntimeError::WorkerGone)
    }
}
