//! Hazard-rate transitions.
//!
//! A transition with mean time to event `M` fires within `dt` days with
//! probability `1 - exp(-dt / M)`. The mean shrinks with the margin to the
//! threshold, so the hazard rises toward certainty as the margin closes.

use rand::Rng;

use crate::record::CrewHealthRecord;
use crate::{condition_ids, ConditionId, Constants, Event, EventLevel, EventSink};

/// Probability that an event with mean time `mean_days` happens within `dt`.
pub fn event_probability(dt: f64, mean_days: f64) -> f64 {
    if dt <= 0.0 {
        return 0.0;
    }
    if mean_days <= 0.0 {
        return 1.0;
    }
    1.0 - (-dt / mean_days).exp()
}

/// Mean days to the event for a given margin. Zero or negative margin is certain.
pub fn mean_time_to_event(margin: f64, days_per_margin: f64) -> f64 {
    (margin * days_per_margin).max(0.0)
}

/// Roll a hazard transition. Returns true when it fires. At
/// [`EventLevel::Debug`] every roll is reported.
pub(crate) fn roll(
    record: &CrewHealthRecord,
    condition: &str,
    p: f64,
    rng: &mut impl Rng,
    sink: &mut EventSink<'_>,
) -> bool {
    if p <= 0.0 {
        return false;
    }
    let rolled: f64 = rng.gen();
    if sink.level == EventLevel::Debug {
        sink.push(Event::HazardRoll {
            crew_id: record.id.clone(),
            condition: ConditionId(condition.to_string()),
            p,
            rolled,
        });
    }
    rolled < p
}

/// Exhaustion band edges as fractions of MaxHP, scaled by the critical
/// health multiplier: `(enter_below, leave_above)`.
pub fn exhaustion_thresholds(critical_multiplier: f64, constants: &Constants) -> (f64, f64) {
    (
        constants.exhaustion_start * critical_multiplier,
        constants.exhaustion_end * critical_multiplier,
    )
}

/// What exhaustion should do for this record this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum ExhaustionCheck {
    Nothing,
    /// Roll against this probability to become exhausted.
    Risk(f64),
    Recover,
}

pub(crate) fn check_exhaustion(
    record: &CrewHealthRecord,
    max_hp: f64,
    critical_multiplier: f64,
    constants: &Constants,
    dt: f64,
) -> ExhaustionCheck {
    if max_hp <= 0.0 {
        return ExhaustionCheck::Nothing;
    }
    let fraction = record.hp / max_hp;
    let (start, end) = exhaustion_thresholds(critical_multiplier, constants);
    if record.has_condition(condition_ids::EXHAUSTED) {
        return if fraction >= end {
            ExhaustionCheck::Recover
        } else {
            ExhaustionCheck::Nothing
        };
    }
    let margin = fraction - start;
    if margin >= constants.exhaustion_warning_band {
        return ExhaustionCheck::Nothing;
    }
    let mean = mean_time_to_event(margin, constants.exhaustion_mean_days_per_margin);
    ExhaustionCheck::Risk(event_probability(dt, mean))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{base_content, new_record};

    #[test]
    fn probability_is_zero_without_elapsed_time() {
        assert!(event_probability(0.0, 5.0).abs() < f64::EPSILON);
        assert!(event_probability(0.0, 0.0).abs() < f64::EPSILON);
        assert!(event_probability(-1.0, 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn probability_is_certain_at_zero_margin() {
        let mean = mean_time_to_event(0.0, 100.0);
        assert!((event_probability(0.01, mean) - 1.0).abs() < f64::EPSILON);
        let mean = mean_time_to_event(-0.2, 100.0);
        assert!((event_probability(0.01, mean) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn probability_rises_as_margin_shrinks() {
        let mut last = 0.0;
        for margin in [0.5, 0.2, 0.1, 0.05, 0.01, 0.001] {
            let p = event_probability(1.0, mean_time_to_event(margin, 50.0));
            assert!(p > last, "margin {margin}: {p} <= {last}");
            assert!(p <= 1.0);
            last = p;
        }
    }

    #[test]
    fn exhaustion_only_risks_inside_the_band() {
        let content = base_content();
        let constants = &content.constants;
        let mut record = new_record("jeb", &content);
        let max_hp = 100.0;

        record.hp = max_hp;
        assert_eq!(
            check_exhaustion(&record, max_hp, 1.0, constants, 1.0),
            ExhaustionCheck::Nothing
        );

        record.hp = max_hp * (constants.exhaustion_start + constants.exhaustion_warning_band / 2.0);
        assert!(matches!(
            check_exhaustion(&record, max_hp, 1.0, constants, 1.0),
            ExhaustionCheck::Risk(p) if p > 0.0 && p < 1.0
        ));

        record.hp = max_hp * constants.exhaustion_start * 0.5;
        assert_eq!(
            check_exhaustion(&record, max_hp, 1.0, constants, 1.0),
            ExhaustionCheck::Risk(1.0)
        );
    }

    #[test]
    fn exhausted_recover_above_end_threshold() {
        let content = base_content();
        let constants = &content.constants;
        let mut record = new_record("jeb", &content);
        record
            .conditions
            .push(ConditionId(condition_ids::EXHAUSTED.to_string()));
        record.hp = 100.0 * (constants.exhaustion_end - 0.01);
        assert_eq!(
            check_exhaustion(&record, 100.0, 1.0, constants, 1.0),
            ExhaustionCheck::Nothing
        );
        record.hp = 100.0 * constants.exhaustion_end + 1e-9;
        assert_eq!(
            check_exhaustion(&record, 100.0, 1.0, constants, 1.0),
            ExhaustionCheck::Recover
        );
    }

    #[test]
    fn critical_multiplier_scales_thresholds() {
        let content = base_content();
        let (start, end) = exhaustion_thresholds(0.5, &content.constants);
        assert!((start - content.constants.exhaustion_start * 0.5).abs() < 1e-12);
        assert!((end - content.constants.exhaustion_end * 0.5).abs() < 1e-12);
    }
}
