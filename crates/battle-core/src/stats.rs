//! Combatant stats and timed modifiers.
//!
//! Derived stats are always `(base + Σflat) × (1 + Σpercent)` per stat, summed
//! independently, and recomputed whenever a modifier is added or expires.
//! Integer stats round to nearest; every stat clamps to its legal range.

/// Which stat a modifier adjusts.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum StatKind {
    MaxHp,
    Atk,
    Def,
    Spd,
    CritRate,
    CritDamage,
}

/// One combatant's stat line. Used both for the authored base values and the
/// modifier-derived effective values.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatBlock {
    pub max_hp: i32,
    pub atk: i32,
    pub def: i32,
    pub spd: i32,
    /// Crit chance in `[0, 1]`.
    pub crit_rate: f32,
    /// Crit damage multiplier, at least 1.
    pub crit_damage: f32,
}

impl StatBlock {
    pub fn new(max_hp: i32, atk: i32, def: i32, spd: i32) -> Self {
        Self {
            max_hp,
            atk,
            def,
            spd,
            crit_rate: 0.1,
            crit_damage: 1.5,
        }
    }

    pub fn with_crit(mut self, crit_rate: f32, crit_damage: f32) -> Self {
        self.crit_rate = crit_rate;
        self.crit_damage = crit_damage;
        self
    }

    /// Clamp every field into its legal range.
    fn sanitize(mut self) -> Self {
        self.max_hp = self.max_hp.max(1);
        self.atk = self.atk.max(0);
        self.def = self.def.max(0);
        self.spd = self.spd.max(1);
        self.crit_rate = self.crit_rate.clamp(0.0, 1.0);
        self.crit_damage = self.crit_damage.max(1.0);
        self
    }
}

impl Default for StatBlock {
    fn default() -> Self {
        Self::new(30, 10, 0, 10)
    }
}

/// A timed additive/percentage adjustment to one stat.
///
/// `remaining_turns` is decremented once each time the owner completes a full
/// turn; the modifier is removed at zero.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatModifier {
    pub stat: StatKind,
    pub flat: f32,
    pub percent: f32,
    pub remaining_turns: u32,
}

impl StatModifier {
    /// Build a modifier from authoring inputs.
    ///
    /// Percent magnitudes above 2 are read as whole percents (`50` means
    /// `+50%`), matching how skill data is authored; fractional inputs
    /// (`0.5`) pass through. Duration is at least one turn.
    pub fn new(stat: StatKind, flat: f32, percent: f32, turns: u32) -> Self {
        let percent = if percent.abs() > 2.0 {
            percent / 100.0
        } else {
            percent
        };
        Self {
            stat,
            flat,
            percent,
            remaining_turns: turns.max(1),
        }
    }
}

/// Fold a modifier list over a base block to produce effective stats.
pub fn derive_stats(base: &StatBlock, modifiers: &[StatModifier]) -> StatBlock {
    let int_stat = |kind: StatKind, base_value: i32| -> i32 {
        apply_sums(kind, base_value as f32, modifiers).round() as i32
    };
    let float_stat =
        |kind: StatKind, base_value: f32| -> f32 { apply_sums(kind, base_value, modifiers) };

    StatBlock {
        max_hp: int_stat(StatKind::MaxHp, base.max_hp),
        atk: int_stat(StatKind::Atk, base.atk),
        def: int_stat(StatKind::Def, base.def),
        spd: int_stat(StatKind::Spd, base.spd),
        crit_rate: float_stat(StatKind::CritRate, base.crit_rate),
        crit_damage: float_stat(StatKind::CritDamage, base.crit_damage),
    }
    .sanitize()
}

fn apply_sums(kind: StatKind, base: f32, modifiers: &[StatModifier]) -> f32 {
    let mut flat = 0.0f32;
    let mut percent = 0.0f32;
    for m in modifiers {
        if m.stat != kind {
            continue;
        }
        flat += m.flat;
        percent += m.percent;
    }
    (base + flat) * (1.0 + percent)
}

/// Decrement all modifiers by one turn and drop expired ones.
///
/// Returns true if anything expired (callers recompute derived stats then).
pub fn tick_turn_end(modifiers: &mut Vec<StatModifier>) -> bool {
    let before = modifiers.len();
    for m in modifiers.iter_mut() {
        m.remaining_turns = m.remaining_turns.saturating_sub(1);
    }
    modifiers.retain(|m| m.remaining_turns > 0);
    modifiers.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_and_percent_sum_independently_per_stat() {
        let base = StatBlock::new(100, 10, 5, 10);
        let mods = vec![
            StatModifier::new(StatKind::Atk, 5.0, 0.0, 2),
            StatModifier::new(StatKind::Atk, 0.0, 0.5, 2),
            StatModifier::new(StatKind::Def, 3.0, 0.0, 2),
        ];
        let derived = derive_stats(&base, &mods);
        // (10 + 5) * 1.5
        assert_eq!(derived.atk, 23);
        assert_eq!(derived.def, 8);
        assert_eq!(derived.spd, 10);
    }

    #[test]
    fn whole_percent_inputs_are_normalized() {
        let m = StatModifier::new(StatKind::Spd, 0.0, 50.0, 1);
        assert!((m.percent - 0.5).abs() < f32::EPSILON);

        let fractional = StatModifier::new(StatKind::Spd, 0.0, 0.5, 1);
        assert!((fractional.percent - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn derived_stats_clamp_to_legal_ranges() {
        let base = StatBlock::new(10, 2, 0, 5);
        let mods = vec![
            StatModifier::new(StatKind::Atk, -100.0, 0.0, 1),
            StatModifier::new(StatKind::Spd, -100.0, 0.0, 1),
            StatModifier::new(StatKind::CritRate, 5.0, 0.0, 1),
        ];
        let derived = derive_stats(&base, &mods);
        assert_eq!(derived.atk, 0);
        assert_eq!(derived.spd, 1);
        assert_eq!(derived.crit_rate, 1.0);
    }

    #[test]
    fn modifiers_expire_after_their_duration() {
        let mut mods = vec![
            StatModifier::new(StatKind::Atk, 5.0, 0.0, 2),
            StatModifier::new(StatKind::Def, 1.0, 0.0, 1),
        ];

        assert!(tick_turn_end(&mut mods));
        assert_eq!(mods.len(), 1);
        assert_eq!(mods[0].stat, StatKind::Atk);

        assert!(tick_turn_end(&mut mods));
        assert!(mods.is_empty());

        assert!(!tick_turn_end(&mut mods));
    }
}
