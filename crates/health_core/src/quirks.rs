//! Weighted quirk selection and level-up awards.

use rand::Rng;

use crate::record::CrewHealthRecord;
use crate::{CrewContext, Event, EventSink, HealthContent, QuirkDef, QuirkId};

/// Smallest trait weight used, so the weight stays finite at either extreme.
const MIN_TRAIT_WEIGHT: f64 = 1e-3;

/// Selection weight: `courage_weight^(2c-1) * stupidity_weight^(2s-1)`.
/// A weight of 1 makes its trait irrelevant. Trait weights are floored at
/// [`MIN_TRAIT_WEIGHT`].
pub fn quirk_weight(quirk: &QuirkDef, courage: f64, stupidity: f64) -> f64 {
    let courage = courage.clamp(0.0, 1.0);
    let stupidity = stupidity.clamp(0.0, 1.0);
    quirk.courage_weight.max(MIN_TRAIT_WEIGHT).powf(2.0 * courage - 1.0)
        * quirk.stupidity_weight.max(MIN_TRAIT_WEIGHT).powf(2.0 * stupidity - 1.0)
}

fn is_eligible(quirk: &QuirkDef, record: &CrewHealthRecord, level: u32, content: &HealthContent) -> bool {
    quirk.visible
        && quirk.min_level <= level
        && !record.has_quirk(&quirk.id)
        && !record.quirks.iter().any(|held| {
            quirk.is_incompatible_with(held)
                || content
                    .quirks
                    .iter()
                    .find(|q| q.id == *held)
                    .is_some_and(|q| q.is_incompatible_with(&quirk.id))
        })
}

/// Draw one quirk the crew member may receive. `None` when nothing is
/// eligible.
pub fn select_random_quirk(
    record: &CrewHealthRecord,
    context: &CrewContext,
    content: &HealthContent,
    rng: &mut impl Rng,
) -> Option<QuirkId> {
    let candidates: Vec<(&QuirkDef, f64)> = content
        .quirks
        .iter()
        .filter(|q| is_eligible(q, record, context.level, content))
        .map(|q| (q, quirk_weight(q, context.courage, context.stupidity)))
        .filter(|(_, weight)| weight.is_finite() && *weight > 0.0)
        .collect();
    let total: f64 = candidates.iter().map(|(_, weight)| weight).sum();
    if candidates.is_empty() || total <= 0.0 {
        return None;
    }
    let draw = rng.gen::<f64>() * total;
    let mut cumulative = 0.0;
    for (quirk, weight) in &candidates {
        cumulative += weight;
        if draw < cumulative {
            return Some(quirk.id.clone());
        }
    }
    candidates.last().map(|(quirk, _)| quirk.id.clone())
}

/// Roll for quirks for every level gained since the last check.
pub(crate) fn award_for_levels(
    record: &mut CrewHealthRecord,
    context: &CrewContext,
    content: &HealthContent,
    rng: &mut impl Rng,
    sink: &mut EventSink<'_>,
) {
    let constants = &content.constants;
    while record.quirk_level < context.level {
        record.quirk_level += 1;
        if record.quirks.len() >= constants.max_quirks {
            continue;
        }
        if rng.gen::<f64>() >= constants.quirk_chance_per_level {
            continue;
        }
        let Some(quirk) = select_random_quirk(record, context, content, rng) else {
            continue;
        };
        tracing::info!(crew = %record.id, quirk = %quirk, level = record.quirk_level, "quirk awarded");
        record.quirks.push(quirk.clone());
        record.invalidate();
        sink.push(Event::QuirkAwarded {
            crew_id: record.id.clone(),
            quirk,
            level: record.quirk_level,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{assigned_context, base_content, new_record};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn quirk(id: &str) -> QuirkId {
        QuirkId(id.to_string())
    }

    #[test]
    fn unit_weights_are_uniform() {
        let content = base_content();
        let def = QuirkDef {
            courage_weight: 1.0,
            stupidity_weight: 1.0,
            ..content.quirks[0].clone()
        };
        for (c, s) in [(0.0, 0.0), (0.5, 0.9), (1.0, 1.0)] {
            assert!((quirk_weight(&def, c, s) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn courage_weight_favours_brave_crew() {
        let content = base_content();
        let def = QuirkDef {
            courage_weight: 4.0,
            stupidity_weight: 1.0,
            ..content.quirks[0].clone()
        };
        assert!((quirk_weight(&def, 1.0, 0.5) - 4.0).abs() < 1e-12);
        assert!((quirk_weight(&def, 0.0, 0.5) - 0.25).abs() < 1e-12);
        assert!((quirk_weight(&def, 0.5, 0.5) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn selection_is_deterministic_for_a_seed() {
        let content = base_content();
        let record = new_record("jeb", &content);
        let mut context = assigned_context();
        context.level = 5;
        let mut a = ChaCha8Rng::seed_from_u64(42);
        let mut b = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..20 {
            assert_eq!(
                select_random_quirk(&record, &context, &content, &mut a),
                select_random_quirk(&record, &context, &content, &mut b)
            );
        }
    }

    #[test]
    fn no_candidates_yields_none() {
        let content = base_content();
        let mut record = new_record("jeb", &content);
        let mut context = assigned_context();
        context.level = 5;
        record.quirks = content.quirks.iter().map(|q| q.id.clone()).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(select_random_quirk(&record, &context, &content, &mut rng), None);
    }

    #[test]
    fn zero_trait_weight_stays_finite() {
        let mut content = base_content();
        for def in &mut content.quirks {
            def.courage_weight = 0.0;
        }
        let coward = quirk_weight(&content.quirks[0], 0.0, 0.5);
        let hero = quirk_weight(&content.quirks[0], 1.0, 0.5);
        assert!(coward.is_finite());
        assert!(hero > 0.0 && hero < coward);

        let record = new_record("jeb", &content);
        let mut context = assigned_context();
        context.level = 5;
        context.courage = 0.0;
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(select_random_quirk(&record, &context, &content, &mut rng).is_some());
    }

    #[test]
    fn incompatible_and_low_level_quirks_are_excluded() {
        let content = base_content();
        let mut record = new_record("jeb", &content);
        record.quirks.push(quirk("Claustrophobic"));
        let mut context = assigned_context();
        context.level = 0;
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..50 {
            let picked = select_random_quirk(&record, &context, &content, &mut rng);
            assert_ne!(picked, Some(quirk("Agoraphobic")), "incompatible with held quirk");
            assert_ne!(picked, Some(quirk("Veteran")), "needs level 3");
            assert_ne!(picked, Some(quirk("Claustrophobic")), "already held");
        }
    }
}
