//! Vessel effects, part exposure and shelter selection.

use crate::{Constants, Effect, HealthContent, VesselSnapshot};

/// Radiation exposure of one crew-capable part.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartExposure {
    pub index: usize,
    pub exposure: f64,
    pub crew_capacity: u32,
}

/// Fraction of ambient radiation that gets through `shielding` spread over
/// `crew_capacity` seats: every `shielding_effect` units per seat^(2/3) halve it.
pub fn shielding_exposure(shielding: f64, crew_capacity: u32, shielding_effect: f64) -> f64 {
    let seats = f64::from(crew_capacity.max(1));
    0.5_f64.powf(shielding.max(0.0) * shielding_effect / seats.powf(2.0 / 3.0))
}

/// Exposure of every part with crew capacity. A part is shielded by itself,
/// its stowed resources, its parent and its immediate children.
pub fn part_exposures(vessel: &VesselSnapshot, constants: &Constants) -> Vec<PartExposure> {
    let own = |index: usize| {
        vessel
            .parts
            .get(index)
            .map_or(0.0, |p| p.shielding + p.stowed_shielding)
    };
    vessel
        .parts
        .iter()
        .enumerate()
        .filter(|(_, part)| part.crew_capacity > 0)
        .map(|(index, part)| {
            let parent = part.parent.filter(|p| *p != index).map_or(0.0, own);
            let children: f64 = vessel
                .parts
                .iter()
                .enumerate()
                .filter(|(child, p)| *child != index && p.parent == Some(index))
                .map(|(child, _)| own(child))
                .sum();
            let shielding = own(index) + parent + children;
            PartExposure {
                index,
                exposure: shielding_exposure(
                    shielding,
                    part.crew_capacity,
                    constants.shielding_effect,
                ),
                crew_capacity: part.crew_capacity,
            }
        })
        .collect()
}

/// Best exposure a crew of `crew` can reach by packing into the least exposed
/// parts. Greedy single pass over parts sorted by exposure; the result is the
/// capacity-weighted average, never above `vessel_exposure`.
pub fn shelter_exposure(parts: &[PartExposure], crew: usize, vessel_exposure: f64) -> f64 {
    let mut sorted: Vec<&PartExposure> = parts.iter().filter(|p| p.crew_capacity > 0).collect();
    sorted.sort_by(|a, b| a.exposure.total_cmp(&b.exposure).then(a.index.cmp(&b.index)));

    let need = crew.max(1) as f64;
    let mut taken = 0.0;
    let mut weighted = 0.0;
    for part in sorted {
        if taken >= need {
            break;
        }
        let seats = f64::from(part.crew_capacity).min(need - taken);
        weighted += part.exposure * seats;
        taken += seats;
    }
    if taken <= 0.0 {
        return vessel_exposure;
    }
    (weighted / taken).min(vessel_exposure)
}

/// Fold every part of a vessel into one effect. Inactive parts still shield
/// and irradiate but grant no bonuses. The exposure multiplier is the whole
/// vessel's exposure and the shelter exposure is precomputed.
pub fn vessel_effect(vessel: &VesselSnapshot, content: &HealthContent) -> Effect {
    let constants = &content.constants;
    let mut effect = Effect::default();
    for part in &vessel.parts {
        effect.shielding += part.shielding + part.stowed_shielding;
        effect.radioactivity += part.radioactivity;
        effect.crew_capacity += part.crew_capacity;
        if !part.active {
            continue;
        }
        effect.hp_change_per_day += part.hp_change_per_day;
        effect.space += part.space;
        effect.recuperation += part.recuperation;
        effect.decay += part.decay;
        for multiplier in &part.multipliers {
            effect
                .multipliers
                .modify(multiplier.factor, multiplier.multiplier, multiplier.crew_cap);
        }
    }
    effect.multipliers.retain_nontrivial();

    let exposure = shielding_exposure(
        effect.shielding,
        effect.crew_capacity,
        constants.shielding_effect,
    );
    effect.exposure_multiplier = exposure;
    let parts = part_exposures(vessel, constants);
    effect.shelter_exposure = Some(shelter_exposure(&parts, vessel.crew_count(), exposure));
    effect
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{base_content, crewed_vessel, part};
    use crate::{FactorId, PartContribution, PartMultiplier};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn exposure(index: usize, exposure: f64, crew_capacity: u32) -> PartExposure {
        PartExposure {
            index,
            exposure,
            crew_capacity,
        }
    }

    #[test]
    fn unshielded_exposure_is_one() {
        assert!((shielding_exposure(0.0, 4, 1.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn shielding_halves_exposure_per_effect_unit() {
        let one = shielding_exposure(1.0, 1, 1.0);
        let two = shielding_exposure(2.0, 1, 1.0);
        assert!((one - 0.5).abs() < 1e-12);
        assert!((two - 0.25).abs() < 1e-12);
        // Spreading over 8 seats divides the effective shielding by 4.
        assert!((shielding_exposure(4.0, 8, 1.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn greedy_picks_least_exposed_parts_first() {
        let parts = [
            exposure(0, 0.9, 4),
            exposure(1, 0.5, 2),
            exposure(2, 0.2, 1),
        ];
        let shelter = shelter_exposure(&parts, 2, 1.0);
        assert!((shelter - 0.35).abs() < 1e-12);
        // Last part's weight is clipped to the remaining need.
        let shelter = shelter_exposure(&parts, 4, 1.0);
        assert!((shelter - (0.2 + 0.5 * 2.0 + 0.9) / 4.0).abs() < 1e-12);
    }

    #[test]
    fn shelter_is_clamped_to_vessel_exposure() {
        let parts = [exposure(0, 0.8, 2)];
        assert!((shelter_exposure(&parts, 2, 0.6) - 0.6).abs() < 1e-12);
    }

    #[test]
    fn no_crew_parts_fall_back_to_vessel_exposure() {
        assert!((shelter_exposure(&[], 3, 0.7) - 0.7).abs() < 1e-12);
    }

    #[test]
    fn neighbours_shield_a_part() {
        let content = base_content();
        let mut vessel = crewed_vessel("v1", &["jeb"]);
        vessel.parts = vec![
            PartContribution {
                crew_capacity: 1,
                shielding: 1.0,
                ..part("pod")
            },
            PartContribution {
                parent: Some(0),
                stowed_shielding: 3.0,
                ..part("tank")
            },
            PartContribution {
                crew_capacity: 1,
                shielding: 1.0,
                ..part("hab")
            },
        ];
        let exposures = part_exposures(&vessel, &content.constants);
        assert_eq!(exposures.len(), 2);
        assert_eq!(exposures[0].index, 0);
        assert!(exposures[0].exposure < exposures[1].exposure);
    }

    #[test]
    fn shelter_never_exceeds_vessel_exposure() {
        let content = base_content();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..200 {
            let count = rng.gen_range(1..8);
            let parts = (0..count)
                .map(|i| PartContribution {
                    crew_capacity: rng.gen_range(0..4),
                    parent: if i == 0 { None } else { Some(rng.gen_range(0..i)) },
                    shielding: rng.gen_range(0.0..3.0),
                    stowed_shielding: rng.gen_range(0.0..2.0),
                    ..part("p")
                })
                .collect();
            let mut vessel = crewed_vessel("v", &["a", "b", "c"]);
            vessel.parts = parts;
            let effect = vessel_effect(&vessel, &content);
            let shelter = effect.shelter_exposure.unwrap();
            assert!(shelter <= effect.exposure_multiplier + 1e-12);
        }
    }

    #[test]
    fn inactive_parts_shield_but_grant_no_bonus() {
        let content = base_content();
        let mut vessel = crewed_vessel("v1", &["jeb", "bill"]);
        vessel.parts = vec![
            PartContribution {
                crew_capacity: 2,
                space: 3.0,
                shielding: 1.0,
                multipliers: vec![PartMultiplier {
                    factor: Some(FactorId::Confinement),
                    multiplier: 0.5,
                    crew_cap: 2,
                }],
                ..part("hab")
            },
            PartContribution {
                space: 10.0,
                shielding: 2.0,
                active: false,
                ..part("inflatable")
            },
        ];
        let effect = vessel_effect(&vessel, &content);
        assert!((effect.space - 3.0).abs() < 1e-12);
        assert!((effect.shielding - 3.0).abs() < 1e-12);
        assert_eq!(effect.crew_capacity, 2);
        assert!((effect.multipliers.effective(FactorId::Confinement, 2) - 0.5).abs() < 1e-12);
    }
}
