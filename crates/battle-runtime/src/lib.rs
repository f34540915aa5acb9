//! Async shell around the deterministic battle core.
//!
//! This crate wires the engine to the outside world: a worker task owns the
//! battle state, clients drive it through [`BattleHandle`], animation
//! playback goes through the [`AnimationDriver`] abstraction, and observers
//! subscribe to broadcast [`battle_core::BattleEvent`]s.
//!
//! Modules are organized by responsibility:
//! - [`runtime`] hosts the orchestrator and builder
//! - [`handle`] exposes the client-facing command API
//! - [`animation`] abstracts presentation pacing
//! - the worker stays internal to the crate

pub mod animation;
pub mod error;
pub mod handle;
pub mod runtime;

mod worker;

pub use animation::{AnimationDriver, FixedDelayAnimations, InstantAnimations};
pub use error::{Result, RuntimeError};
pub use handle::BattleHandle;
pub use runtime::{BattleRuntime, BattleRuntimeBuilder, RuntimeConfig};
