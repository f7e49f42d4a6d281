//! Per-crew health record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::training::TrainingProgress;
use crate::{ConditionId, Constants, CrewId, Effect, FactorId, PartTypeId, QuirkId};

/// Raw HP change per day for every factor.
pub type FactorResults = BTreeMap<FactorId, f64>;

/// A value computed for a particular tick generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cached<T> {
    pub value: T,
    #[serde(skip)]
    generation: Option<u64>,
}

impl<T> Cached<T> {
    /// The value if it was computed for `generation`.
    pub fn fresh(&self, generation: u64) -> Option<&T> {
        (self.generation == Some(generation)).then_some(&self.value)
    }

    pub fn store(&mut self, generation: u64, value: T) {
        self.value = value;
        self.generation = Some(generation);
    }

    pub fn invalidate(&mut self) {
        self.generation = None;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewHealthRecord {
    pub id: CrewId,
    pub hp: f64,
    /// Accumulated radiation dose.
    pub dose: f64,
    /// Radiation received per day during the last tick.
    pub last_radiation: f64,
    /// Multiset: stackable conditions may appear more than once.
    pub conditions: SmallVec<[ConditionId; 4]>,
    pub quirks: Vec<QuirkId>,
    /// Highest experience level already rolled for quirks.
    pub quirk_level: u32,
    pub on_eva: bool,
    pub training: Vec<TrainingProgress>,
    /// Part types currently being trained at the facility.
    pub training_design: Vec<PartTypeId>,
    /// Set while incapacitated: the role to give back on recovery.
    pub original_trait: Option<String>,
    pub dead: bool,
    /// Last evaluated factor values. Persisted so dormant vessels keep them.
    pub factors: Cached<FactorResults>,
    #[serde(skip)]
    pub effect: Cached<Effect>,
    /// MaxHP as of the last evaluation, used to clamp immediate HP changes.
    #[serde(skip)]
    pub(crate) last_max_hp: Option<f64>,
}

impl CrewHealthRecord {
    /// A fresh record at full health for a crew member of `level`.
    pub fn new(id: CrewId, level: u32, constants: &Constants) -> Self {
        let hp = base_max_hp(level, constants);
        Self {
            id,
            hp,
            dose: 0.0,
            last_radiation: 0.0,
            conditions: SmallVec::new(),
            quirks: Vec::new(),
            quirk_level: level,
            on_eva: false,
            training: Vec::new(),
            training_design: Vec::new(),
            original_trait: None,
            dead: false,
            factors: Cached::default(),
            effect: Cached::default(),
            last_max_hp: Some(hp),
        }
    }

    pub fn has_condition(&self, condition: &str) -> bool {
        self.conditions.iter().any(|c| c.0 == condition)
    }

    pub fn condition_count(&self, condition: &str) -> usize {
        self.conditions.iter().filter(|c| c.0 == condition).count()
    }

    pub fn has_quirk(&self, quirk: &QuirkId) -> bool {
        self.quirks.contains(quirk)
    }

    pub fn is_incapacitated(&self) -> bool {
        self.original_trait.is_some()
    }

    /// Drop cached derived values so the next read recomputes them.
    pub fn invalidate(&mut self) {
        self.effect.invalidate();
        self.factors.invalidate();
    }

    /// Apply an immediate HP change, keeping HP within `[0, MaxHP]`.
    pub(crate) fn change_hp(&mut self, delta: f64) {
        let ceiling = self.last_max_hp.unwrap_or(f64::MAX);
        self.hp = (self.hp + delta).min(ceiling).max(0.0);
    }
}

/// MaxHP from level alone, before effects and radiation.
pub fn base_max_hp(level: u32, constants: &Constants) -> f64 {
    constants.base_max_hp + constants.max_hp_per_level * f64::from(level)
}

/// Fraction of MaxHP kept after radiation damage.
pub fn dose_factor(dose: f64, constants: &Constants) -> f64 {
    if constants.reference_dose <= 0.0 {
        return 1.0;
    }
    (1.0 - constants.radiation_max_hp_loss * dose / constants.reference_dose).max(0.0)
}

/// Derived MaxHP: level curve, effect bonus and multiplier, radiation discount.
pub fn max_hp(level: u32, dose: f64, effect: &Effect, constants: &Constants) -> f64 {
    let raw = (base_max_hp(level, constants) + effect.max_hp_bonus) * effect.max_hp_multiplier;
    (raw * dose_factor(dose, constants)).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::base_content;

    #[test]
    fn new_record_starts_at_full_health() {
        let content = base_content();
        let record = CrewHealthRecord::new(CrewId("jeb".to_string()), 2, &content.constants);
        let expected = content.constants.base_max_hp + 2.0 * content.constants.max_hp_per_level;
        assert!((record.hp - expected).abs() < 1e-9);
        assert_eq!(record.quirk_level, 2);
    }

    #[test]
    fn max_hp_applies_bonus_multiplier_and_dose() {
        let content = base_content();
        let constants = &content.constants;
        let effect = Effect {
            max_hp_bonus: 20.0,
            max_hp_multiplier: 0.5,
            ..Effect::default()
        };
        let clean = max_hp(0, 0.0, &effect, constants);
        assert!((clean - (constants.base_max_hp + 20.0) * 0.5).abs() < 1e-9);

        let irradiated = max_hp(0, constants.reference_dose, &effect, constants);
        let expected = clean * (1.0 - constants.radiation_max_hp_loss);
        assert!((irradiated - expected).abs() < 1e-9);
    }

    #[test]
    fn huge_dose_floors_max_hp_at_zero() {
        let content = base_content();
        let value = max_hp(0, 1e12, &Effect::default(), &content.constants);
        assert!(value.abs() < f64::EPSILON);
    }

    #[test]
    fn cached_value_is_fresh_only_for_its_generation() {
        let mut cached: Cached<f64> = Cached::default();
        assert!(cached.fresh(0).is_none());
        cached.store(3, 1.5);
        assert_eq!(cached.fresh(3).copied(), Some(1.5));
        assert!(cached.fresh(4).is_none());
        cached.invalidate();
        assert!(cached.fresh(3).is_none());
        assert!((cached.value - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn change_hp_clamps_to_known_max() {
        let content = base_content();
        let mut record = CrewHealthRecord::new(CrewId("bill".to_string()), 0, &content.constants);
        record.change_hp(50.0);
        assert!((record.hp - content.constants.base_max_hp).abs() < 1e-9);
        record.change_hp(-1e6);
        assert!(record.hp.abs() < f64::EPSILON);
    }
}
