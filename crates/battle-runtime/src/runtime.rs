//! High-level runtime orchestrator.
//!
//! The runtime owns the battle worker, wires up command/event channels, and
//! exposes a builder-based API for clients to stand up a battle.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use battle_core::{BattleConfig, BattleEvent, BattleState, Combatant};

use crate::animation::{AnimationDriver, InstantAnimations};
use crate::error::{Result, RuntimeError};
use crate::handle::BattleHandle;
use crate::worker::{BattleWorker, Command};

/// Runtime configuration shared across the orchestrator and the worker.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub battle: BattleConfig,
    pub event_buffer_size: usize,
    pub command_buffer_size: usize,
    /// Engine timer resolution. Bounds how late the watchdog and animation
    /// wait caps fire.
    pub tick_interval: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            battle: BattleConfig::default(),
            event_buffer_size: 256,
            command_buffer_size: 32,
            tick_interval: Duration::from_millis(50),
        }
    }
}

/// Owns the background worker for one battle. [`BattleHandle`] provides a
/// cloneable facade for clients.
pub struct BattleRuntime {
    handle: BattleHandle,
    command_tx: mpsc::Sender<Command>,
    worker: JoinHandle<()>,
}

impl BattleRuntime {
    pub fn builder() -> BattleRuntimeBuilder {
        BattleRuntimeBuilder::new()
    }

    /// A cloneable handle that can be shared across clients and tasks.
    pub fn handle(&self) -> BattleHandle {
        self.handle.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<BattleEvent> {
        self.handle.subscribe_events()
    }

    /// Stop the worker and wait for it to exit.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.command_tx.send(Command::Shutdown).await;
        self.worker.await.map_err(|_| RuntimeError::WorkerGone)
    }
}

/// Assembles a battle: roster, tuning, and the animation driver.
pub struct BattleRuntimeBuilder {
    roster: Vec<Combatant>,
    config: RuntimeConfig,
    driver: Arc<dyn AnimationDriver>,
}

impl BattleRuntimeBuilder {
    pub fn new() -> Self {
        Self {
            roster: Vec::new(),
            config: RuntimeConfig::default(),
            driver: Arc::new(InstantAnimations),
        }
    }

    pub fn combatant(mut self, combatant: Combatant) -> Self {
        self.roster.push(combatant);
        self
    }

    pub fn roster(mut self, roster: Vec<Combatant>) -> Self {
        self.roster = roster;
        self
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn battle_config(mut self, battle: BattleConfig) -> Self {
        self.config.battle = battle;
        self
    }

    pub fn driver(mut self, driver: impl AnimationDriver + 'static) -> Self {
        self.driver = Arc::new(driver);
        self
    }

    /// Spawn the worker and start the battle.
    pub fn spawn(self) -> BattleRuntime {
        let (command_tx, command_rx) = mpsc::channel(self.config.command_buffer_size);
        let (event_tx, _) = broadcast::channel(self.config.event_buffer_size);

        let worker = BattleWorker::new(
            BattleState::from_roster(self.roster),
            self.config.battle,
            self.driver,
            command_rx,
            event_tx.clone(),
            self.config.tick_interval,
        );
        let worker = tokio::spawn(worker.run());

        BattleRuntime {
            handle: BattleHandle::new(command_tx.clone(), event_tx),
            command_tx,
            worker,
        }
    }
}

impl Default for BattleRuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
