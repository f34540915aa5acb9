//! Animation playback abstraction.
//!
//! The engine asks for animations through directives and accepts completion
//! signals whenever they come; the driver decides what "playing" means. The
//! engine's own wait caps bound every wait, so a driver that never answers
//! only delays the battle, it cannot stall it.

use std::time::Duration;

use async_trait::async_trait;
use battle_core::{AnimationCue, CombatantId};

/// Plays one animator cue for one unit. `play` resolving is the completion
/// signal the worker forwards back into the engine.
#[async_trait]
pub trait AnimationDriver: Send + Sync {
    async fn play(&self, unit: CombatantId, cue: AnimationCue);
}

/// Completes every animation immediately. The default for headless use and
/// simulation tests.
pub struct InstantAnimations;

#[async_trait]
impl AnimationDriver for InstantAnimations {
    async fn play(&self, _unit: CombatantId, _cue: AnimationCue) {}
}

/// Completes every animation after a fixed delay, approximating real
/// presentation pacing.
pub struct FixedDelayAnimations {
    delay: Duration,
}

impl FixedDelayAnimations {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl AnimationDriver for FixedDelayAnimations {
    async fn play(&self, _unit: CombatantId, _cue: AnimationCue) {
        tokio::time::sleep(self.delay).await;
    }
}
