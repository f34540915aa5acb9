//! Error types for command validation.
//!
//! Only command submission can fail; everything else in the engine (queue
//! mutation, animation signals, watchdog recovery) degrades to a no-op so the
//! battle always keeps moving.

use crate::state::CombatantId;

/// Why a submitted command was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("battle already ended")]
    BattleEnded,

    #[error("an action is already executing")]
    Busy,

    #[error("combatant {actor} is not the current actor")]
    NotCurrentActor { actor: CombatantId },

    #[error("unknown combatant {actor}")]
    UnknownCombatant { actor: CombatantId },

    #[error("combatant {actor} is dead")]
    DeadCombatant { actor: CombatantId },

    #[error("combatant {actor} lacks the energy for an ultimate")]
    InsufficientEnergy { actor: CombatantId },

    #[error("combatant {actor} has no ultimate that allows cut-ins")]
    CutInNotAllowed { actor: CombatantId },
}
