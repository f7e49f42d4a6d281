//! Solar radiation storms: generation, travel and arrival.

use std::f64::consts::TAU;

use rand::Rng;

use crate::id::next_storm_id;
use crate::radiation::{magnetosphere_attenuation, planet_of};
use crate::{
    CrewContext, CrewId, Effect, Event, EventSink, HealthContent, RadStorm,
    RadStormTypeDef, RosterStatus, StormTarget, WorldSnapshot,
};

/// Slowest storm front, so a bad sample cannot stall a storm forever.
const MIN_VELOCITY_M_PER_DAY: f64 = 1.0;

/// Position within the solar cycle, in `[0, 1)`.
pub fn solar_cycle_phase(day: f64, cycle_days: f64) -> f64 {
    if cycle_days <= 0.0 {
        return 0.0;
    }
    (day / cycle_days).rem_euclid(1.0)
}

/// Storm chance per period, scaled between half and one and a half times
/// the base chance over the solar cycle.
pub fn storm_chance(day: f64, content: &HealthContent) -> f64 {
    let constants = &content.constants;
    let activity = 1.0 + 0.5 * (TAU * solar_cycle_phase(day, constants.solar_cycle_days)).sin();
    (constants.storm_chance_per_period * activity).clamp(0.0, 1.0)
}

fn gaussian(rng: &mut impl Rng, mean: f64, sd: f64) -> f64 {
    if sd <= 0.0 {
        return mean;
    }
    // Box-Muller
    let u1: f64 = rng.gen_range(f64::MIN_POSITIVE..1.0);
    let u2: f64 = rng.gen();
    mean + sd * (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
}

fn pick_type<'a>(types: &'a [RadStormTypeDef], rng: &mut impl Rng) -> Option<&'a RadStormTypeDef> {
    let total: f64 = types.iter().map(|t| t.weight.max(0.0)).sum();
    if total <= 0.0 {
        return None;
    }
    let draw = rng.gen::<f64>() * total;
    let mut cumulative = 0.0;
    for storm_type in types {
        cumulative += storm_type.weight.max(0.0);
        if draw < cumulative {
            return Some(storm_type);
        }
    }
    types.iter().rev().find(|t| t.weight > 0.0)
}

/// Sample a storm heading for `target` at `star_distance_m`. `None` when the
/// catalog has no usable storm types.
pub fn sample_storm(
    target: StormTarget,
    star_distance_m: f64,
    day: f64,
    content: &HealthContent,
    rng: &mut impl Rng,
) -> Option<RadStorm> {
    let storm_type = pick_type(&content.storm_types, rng)?;
    let magnitude = gaussian(rng, storm_type.magnitude, storm_type.magnitude_sd).max(0.0);
    let velocity = gaussian(rng, storm_type.velocity_m_per_day, storm_type.velocity_sd)
        .max(MIN_VELOCITY_M_PER_DAY);
    Some(RadStorm {
        id: next_storm_id(rng),
        target,
        magnitude,
        arrival_day: day + star_distance_m.max(0.0) / velocity,
        star_distance_m,
    })
}

/// Where a storm aimed at this crew member would be headed: their planet,
/// or their vessel when out in interplanetary space.
fn target_of(context: &CrewContext, content: &HealthContent) -> Option<StormTarget> {
    if context.status != RosterStatus::Assigned {
        return None;
    }
    match context.body.as_ref().and_then(|b| planet_of(b, content)) {
        Some(planet) => Some(StormTarget::Body(planet)),
        None => context.vessel.clone().map(StormTarget::Vessel),
    }
}

/// Roll for new storms against every distinct target that has crew.
pub(crate) fn generate_storms(
    storms: &mut Vec<RadStorm>,
    world: &WorldSnapshot,
    content: &HealthContent,
    rng: &mut impl Rng,
    sink: &mut EventSink<'_>,
) {
    if !content.settings.radiation_enabled || !content.settings.storms_enabled {
        return;
    }
    let mut targets: Vec<(StormTarget, f64)> = Vec::new();
    let mut crew: Vec<(&CrewId, &CrewContext)> = world.crew.iter().collect();
    crew.sort_by(|a, b| a.0.cmp(b.0));
    for (_, context) in crew {
        let Some(target) = target_of(context, content) else {
            continue;
        };
        if targets.iter().any(|(t, _)| *t == target) {
            continue;
        }
        let distance = if context.star_distance_m > 0.0 {
            context.star_distance_m
        } else {
            content.constants.home_star_distance_m
        };
        targets.push((target, distance));
    }
    let day = sink.day;
    let chance = storm_chance(day, content);
    for (target, distance) in targets {
        if storms.iter().any(|s| s.target == target) {
            continue;
        }
        if rng.gen::<f64>() >= chance {
            continue;
        }
        let Some(storm) = sample_storm(target, distance, day, content, rng) else {
            continue;
        };
        tracing::info!(
            storm = %storm.id,
            magnitude = storm.magnitude,
            arrival_day = storm.arrival_day,
            "radiation storm incoming"
        );
        sink.push(Event::RadStormIncoming {
            storm_id: storm.id.clone(),
            target: storm.target.clone(),
            magnitude: storm.magnitude,
            arrival_day: storm.arrival_day,
        });
        storms.push(storm);
    }
}

/// Dose one crew member takes from a storm: magnitude, scaled by the inverse
/// square of the storm's distance from the star relative to home, the shelter
/// exposure of their vessel and the magnetosphere chain at their altitude.
/// Crew at base are sheltered completely.
pub(crate) fn storm_dose(
    storm: &RadStorm,
    context: &CrewContext,
    effect: &Effect,
    content: &HealthContent,
) -> f64 {
    if context.status != RosterStatus::Assigned {
        return 0.0;
    }
    let constants = &content.constants;
    let in_target = match &storm.target {
        StormTarget::Vessel(vessel) => context.vessel.as_ref() == Some(vessel),
        StormTarget::Body(body) => {
            context.body.as_ref().and_then(|b| planet_of(b, content)).as_ref() == Some(body)
        }
    };
    if !in_target {
        return 0.0;
    }
    let distance_factor = if storm.star_distance_m > 0.0 {
        (constants.home_star_distance_m / storm.star_distance_m).powi(2)
    } else {
        1.0
    };
    let exposure = if context.on_eva {
        constants.eva_exposure * effect.exposure_multiplier
    } else {
        effect.shelter_exposure.unwrap_or(effect.exposure_multiplier)
    };
    let shield = context
        .body
        .as_ref()
        .map_or(1.0, |b| magnetosphere_attenuation(b, context.altitude_m, content));
    storm.magnitude * distance_factor * exposure * shield
}
