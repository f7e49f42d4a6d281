//! Health effects: bags of numeric modifiers and their combination algebra.
//!
//! Every field combines with an associative, commutative rule and has an
//! identity value, so effects from parts, location, quirks and conditions can
//! be folded in any order.

use serde::{Deserialize, Serialize};

use crate::logic::{Logic, LogicSubject};
use crate::multiplier::FactorMultiplierList;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Effect {
    /// Flat HP change per day. Sum.
    pub hp_change_per_day: f64,
    /// Added to base MaxHP. Sum.
    pub max_hp_bonus: f64,
    /// Product.
    pub max_hp_multiplier: f64,
    /// Scales the exhaustion thresholds. Product.
    pub critical_health_multiplier: f64,
    /// Living space, the crowding denominator. Sum.
    pub space: f64,
    /// Percent of missing HP recovered per day. Sum.
    pub recuperation: f64,
    /// Upper limit on `recuperation`; zero means no limit. Max.
    pub recuperation_cap: f64,
    /// Percent of current HP lost per day. Sum.
    pub decay: f64,
    /// Sum.
    pub shielding: f64,
    /// Radiation emitted by the sources themselves, per day. Sum.
    pub radioactivity: f64,
    /// Product.
    pub exposure_multiplier: f64,
    /// Best attainable exposure when sheltering. Min; `None` is the identity.
    pub shelter_exposure: Option<f64>,
    /// Crew seats the shielding is spread over. Sum.
    pub crew_capacity: u32,
    pub multipliers: FactorMultiplierList,
}

impl Default for Effect {
    fn default() -> Self {
        Self {
            hp_change_per_day: 0.0,
            max_hp_bonus: 0.0,
            max_hp_multiplier: 1.0,
            critical_health_multiplier: 1.0,
            space: 0.0,
            recuperation: 0.0,
            recuperation_cap: 0.0,
            decay: 0.0,
            shielding: 0.0,
            radioactivity: 0.0,
            exposure_multiplier: 1.0,
            shelter_exposure: None,
            crew_capacity: 0,
            multipliers: FactorMultiplierList::new(),
        }
    }
}

impl Effect {
    /// `combine(a, None) == a`.
    #[must_use]
    pub fn combine(&self, other: Option<&Effect>) -> Effect {
        let mut result = self.clone();
        if let Some(other) = other {
            result.combine_with(other);
        }
        result
    }

    pub fn combine_with(&mut self, other: &Effect) {
        self.hp_change_per_day += other.hp_change_per_day;
        self.max_hp_bonus += other.max_hp_bonus;
        self.max_hp_multiplier *= other.max_hp_multiplier;
        self.critical_health_multiplier *= other.critical_health_multiplier;
        self.space += other.space;
        self.recuperation += other.recuperation;
        self.recuperation_cap = self.recuperation_cap.max(other.recuperation_cap);
        self.decay += other.decay;
        self.shielding += other.shielding;
        self.radioactivity += other.radioactivity;
        self.exposure_multiplier *= other.exposure_multiplier;
        self.shelter_exposure = match (self.shelter_exposure, other.shelter_exposure) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.crew_capacity += other.crew_capacity;
        self.multipliers = self.multipliers.combine(&other.multipliers);
    }

    /// Recuperation after applying the cap.
    pub fn effective_recuperation(&self) -> f64 {
        if self.recuperation_cap > 0.0 {
            self.recuperation.min(self.recuperation_cap)
        } else {
            self.recuperation
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Effect::default()
    }

    /// One line per non-identity field, for tooltips and logs.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        let sums = [
            (self.hp_change_per_day, "HP/day"),
            (self.max_hp_bonus, "max HP"),
            (self.space, "space"),
            (self.recuperation, "% recuperation"),
            (self.decay, "% decay"),
            (self.shielding, "shielding"),
            (self.radioactivity, "radioactivity"),
        ];
        for (value, label) in sums {
            if value.abs() > f64::EPSILON {
                parts.push(format!("{value:+.2} {label}"));
            }
        }
        let products = [
            (self.max_hp_multiplier, "max HP"),
            (self.critical_health_multiplier, "critical health"),
            (self.exposure_multiplier, "exposure"),
        ];
        for (value, label) in products {
            if (value - 1.0).abs() > f64::EPSILON {
                parts.push(format!("x{value:.2} {label}"));
            }
        }
        for multiplier in self.multipliers.iter().filter(|m| !m.is_trivial()) {
            let name = multiplier.factor.map_or("all factors", |f| f.name());
            parts.push(format!("x{:.2} {name}", multiplier.free_multiplier));
        }
        parts.join(", ")
    }
}

/// An effect that only applies while its logic holds for the owner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionalEffect {
    #[serde(default)]
    pub logic: Logic,
    pub effect: Effect,
}

impl ConditionalEffect {
    pub fn applies(&self, subject: &LogicSubject<'_>) -> bool {
        self.logic.test(subject)
    }
}

/// Combine every effect whose logic holds for `subject`.
pub(crate) fn combine_applicable<'a>(
    effects: impl IntoIterator<Item = &'a ConditionalEffect>,
    subject: &LogicSubject<'_>,
) -> Effect {
    let mut result = Effect::default();
    for conditional in effects {
        if conditional.applies(subject) {
            result.combine_with(&conditional.effect);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::assigned_context;
    use crate::{FactorId, RosterStatus};

    fn approx_eq(a: &Effect, b: &Effect) -> bool {
        let close = |x: f64, y: f64| (x - y).abs() < 1e-9;
        close(a.hp_change_per_day, b.hp_change_per_day)
            && close(a.max_hp_bonus, b.max_hp_bonus)
            && close(a.max_hp_multiplier, b.max_hp_multiplier)
            && close(a.critical_health_multiplier, b.critical_health_multiplier)
            && close(a.space, b.space)
            && close(a.recuperation, b.recuperation)
            && close(a.recuperation_cap, b.recuperation_cap)
            && close(a.decay, b.decay)
            && close(a.shielding, b.shielding)
            && close(a.radioactivity, b.radioactivity)
            && close(a.exposure_multiplier, b.exposure_multiplier)
            && a.shelter_exposure.is_some() == b.shelter_exposure.is_some()
            && close(
                a.shelter_exposure.unwrap_or(0.0),
                b.shelter_exposure.unwrap_or(0.0),
            )
            && a.crew_capacity == b.crew_capacity
            && FactorId::ALL.iter().all(|f| {
                close(
                    a.multipliers.effective(*f, 3),
                    b.multipliers.effective(*f, 3),
                )
            })
    }

    fn sample(seed: f64) -> Effect {
        let mut effect = Effect {
            hp_change_per_day: seed,
            max_hp_bonus: seed * 2.0,
            max_hp_multiplier: 1.0 + seed / 10.0,
            critical_health_multiplier: 1.0 - seed / 20.0,
            space: seed * 3.0,
            recuperation: seed,
            recuperation_cap: seed * 4.0,
            decay: seed / 2.0,
            shielding: seed * 5.0,
            radioactivity: seed / 3.0,
            exposure_multiplier: 1.0 / (1.0 + seed),
            shelter_exposure: Some(0.1 * seed),
            crew_capacity: 2,
            multipliers: FactorMultiplierList::new(),
        };
        effect
            .multipliers
            .modify(Some(FactorId::Stress), 1.0 / (1.0 + seed), 0);
        effect.multipliers.modify(None, 0.5, 1);
        effect
    }

    #[test]
    fn combine_with_none_is_identity() {
        let a = sample(1.5);
        assert_eq!(a.combine(None), a);
    }

    #[test]
    fn combine_with_default_is_identity() {
        let a = sample(2.0);
        assert!(approx_eq(&a.combine(Some(&Effect::default())), &a));
    }

    #[test]
    fn combine_is_commutative() {
        let a = sample(1.0);
        let b = sample(3.0);
        assert!(approx_eq(&a.combine(Some(&b)), &b.combine(Some(&a))));
    }

    #[test]
    fn combine_is_associative() {
        let a = sample(1.0);
        let b = sample(2.5);
        let c = sample(0.3);
        let left = a.combine(Some(&b)).combine(Some(&c));
        let right = a.combine(Some(&b.combine(Some(&c))));
        assert!(approx_eq(&left, &right));
    }

    #[test]
    fn field_rules() {
        let a = sample(1.0);
        let b = sample(2.0);
        let c = a.combine(Some(&b));
        assert!((c.hp_change_per_day - 3.0).abs() < 1e-9);
        assert!((c.max_hp_multiplier - 1.1 * 1.2).abs() < 1e-9);
        assert!((c.recuperation_cap - 8.0).abs() < 1e-9);
        assert!((c.shelter_exposure.unwrap() - 0.1).abs() < 1e-9);
        assert_eq!(c.crew_capacity, 4);
    }

    #[test]
    fn clone_does_not_alias_multipliers() {
        let a = sample(1.0);
        let mut combined = a.combine(None);
        combined.multipliers.modify(Some(FactorId::Eva), 0.1, 0);
        assert!(a.multipliers.get(Some(FactorId::Eva)).is_none());
    }

    #[test]
    fn recuperation_cap_limits_only_when_set() {
        let mut effect = Effect {
            recuperation: 5.0,
            ..Effect::default()
        };
        assert!((effect.effective_recuperation() - 5.0).abs() < 1e-9);
        effect.recuperation_cap = 2.0;
        assert!((effect.effective_recuperation() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn conditional_effects_respect_logic() {
        let context = assigned_context();
        let subject = LogicSubject::alone(&context);
        let on_mission = ConditionalEffect {
            logic: Logic {
                status: Some(RosterStatus::Assigned),
                ..Logic::default()
            },
            effect: Effect {
                hp_change_per_day: 1.0,
                ..Effect::default()
            },
        };
        let at_base = ConditionalEffect {
            logic: Logic {
                status: Some(RosterStatus::Available),
                ..Logic::default()
            },
            effect: Effect {
                hp_change_per_day: 10.0,
                ..Effect::default()
            },
        };
        let combined = combine_applicable([&on_mission, &at_base], &subject);
        assert!((combined.hp_change_per_day - 1.0).abs() < 1e-9);
    }

    #[test]
    fn describe_lists_only_changed_fields() {
        let effect = Effect {
            hp_change_per_day: -2.0,
            exposure_multiplier: 0.5,
            ..Effect::default()
        };
        assert_eq!(effect.describe(), "-2.00 HP/day, x0.50 exposure");
        assert!(Effect::default().describe().is_empty());
    }
}
