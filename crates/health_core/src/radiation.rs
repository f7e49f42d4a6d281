//! Ambient radiation: magnetosphere chain, atmosphere, occlusion, and the
//! dose a crew member receives.

use crate::record::CrewHealthRecord;
use crate::{BodyDef, BodyId, Constants, CrewContext, Effect, HealthContent, RosterStatus};

/// Guards against cyclic parent links in content.
const MAX_CHAIN_DEPTH: usize = 16;

/// Bodies from `body` outward, stopping before the star (the parentless body).
fn chain<'a>(body: &BodyId, content: &'a HealthContent) -> Vec<&'a BodyDef> {
    let mut bodies = Vec::new();
    let mut current = content.body(body);
    while let Some(def) = current {
        let Some(parent) = &def.parent else {
            break;
        };
        bodies.push(def);
        if bodies.len() >= MAX_CHAIN_DEPTH {
            tracing::warn!(body = %body, "body chain too deep, truncating");
            break;
        }
        current = content.body(parent);
    }
    bodies
}

/// The body orbiting the star that `body` ultimately belongs to. The star
/// itself has none.
pub fn planet_of(body: &BodyId, content: &HealthContent) -> Option<BodyId> {
    chain(body, content).last().map(|def| def.id.clone())
}

/// Product of `coefficient ^ magnetosphere` for every body from the local one
/// out to the star. The low coefficient applies while below a body's space
/// threshold; parents see the child's orbit as the altitude.
pub fn magnetosphere_attenuation(body: &BodyId, altitude_m: f64, content: &HealthContent) -> f64 {
    let constants = &content.constants;
    let mut altitude = altitude_m;
    let mut attenuation = 1.0;
    let bodies = chain(body, content);
    for (i, def) in bodies.iter().enumerate() {
        let coefficient = if altitude < def.space_threshold_m {
            constants.in_space_low_coefficient
        } else {
            constants.in_space_high_coefficient
        };
        attenuation *= coefficient.powf(def.magnetosphere);
        if let Some(parent) = bodies.get(i + 1) {
            altitude = def.orbit_radius_m - parent.radius_m;
        }
    }
    attenuation
}

/// Attenuation by the local atmosphere: dense below the flying threshold,
/// thin up to the atmosphere height, none above.
pub fn atmosphere_attenuation(body: &BodyDef, altitude_m: f64, constants: &Constants) -> f64 {
    if body.atmosphere_height_m <= 0.0 || altitude_m >= body.atmosphere_height_m {
        1.0
    } else if altitude_m < body.flying_threshold_m {
        constants.troposphere_coefficient
    } else {
        constants.stratosphere_coefficient
    }
}

/// Fraction of the sky not hidden by the body below.
pub fn occlusion(body: &BodyDef, altitude_m: f64) -> f64 {
    let distance = body.radius_m + altitude_m.max(0.0);
    if distance <= 0.0 {
        return 1.0;
    }
    let sin = (body.radius_m / distance).clamp(0.0, 1.0);
    let cos = (1.0 - sin * sin).sqrt();
    1.0 - (1.0 - cos) / 2.0
}

/// Radiation per day at a location, before any vessel shielding.
pub fn ambient_radiation(
    body: Option<&BodyId>,
    altitude_m: f64,
    star_distance_m: f64,
    content: &HealthContent,
) -> f64 {
    let constants = &content.constants;
    let distance = if star_distance_m > 0.0 {
        star_distance_m
    } else {
        constants.home_star_distance_m
    };
    let solar = if distance > 0.0 {
        constants.solar_radiation * (constants.home_star_distance_m / distance).powi(2)
    } else {
        constants.solar_radiation
    };
    let cosmic = solar + constants.galactic_radiation;

    let Some(def) = body.and_then(|id| content.body(id)) else {
        return cosmic;
    };
    let attenuation = magnetosphere_attenuation(&def.id, altitude_m, content)
        * atmosphere_attenuation(def, altitude_m, constants)
        * occlusion(def, altitude_m);
    let falloff = def.radius_m / (def.radius_m + altitude_m.max(0.0)).max(f64::MIN_POSITIVE);
    attenuation * cosmic + def.natural_radiation * falloff * falloff
}

/// Radiation per day this crew member actually receives. Crew at base are
/// protected; crew on EVA use the fixed EVA exposure instead of a vessel.
pub fn received_rate(context: &CrewContext, effect: &Effect, content: &HealthContent) -> f64 {
    if !content.settings.radiation_enabled || context.status != RosterStatus::Assigned {
        return 0.0;
    }
    let ambient = ambient_radiation(
        context.body.as_ref(),
        context.altitude_m,
        context.star_distance_m,
        content,
    );
    let exposure = if context.on_eva {
        content.constants.eva_exposure * effect.exposure_multiplier
    } else {
        effect.exposure_multiplier
    };
    (ambient * exposure + effect.radioactivity).max(0.0)
}

/// Lower dose at the decontamination rate. Returns true when clean.
pub(crate) fn decontaminate(record: &mut CrewHealthRecord, constants: &Constants, dt: f64) -> bool {
    record.dose = (record.dose - constants.decontamination_rate_per_day * dt.max(0.0)).max(0.0);
    record.dose <= 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{assigned_context, available_context, base_content, new_record};

    fn home() -> BodyId {
        BodyId("home".to_string())
    }

    #[test]
    fn single_body_below_threshold_uses_low_coefficient() {
        let mut content = base_content();
        for body in &mut content.bodies {
            body.magnetosphere = if body.id == home() { 1.0 } else { 0.0 };
        }
        let threshold = content.body(&home()).unwrap().space_threshold_m;
        let attenuation = magnetosphere_attenuation(&home(), threshold / 2.0, &content);
        assert!((attenuation - content.constants.in_space_low_coefficient).abs() < 1e-12);
        let high = magnetosphere_attenuation(&home(), threshold * 2.0, &content);
        assert!((high - content.constants.in_space_high_coefficient).abs() < 1e-12);
    }

    #[test]
    fn moon_is_protected_by_its_planet() {
        let content = base_content();
        let moon = BodyId("moon".to_string());
        let alone = content.constants.in_space_high_coefficient.powf(
            content.body(&moon).unwrap().magnetosphere,
        );
        let chained = magnetosphere_attenuation(&moon, 1e6, &content);
        assert!(chained < alone);
        assert_eq!(planet_of(&moon, &content), Some(home()));
    }

    #[test]
    fn star_has_no_chain() {
        let content = base_content();
        let sun = BodyId("sun".to_string());
        assert!((magnetosphere_attenuation(&sun, 0.0, &content) - 1.0).abs() < 1e-12);
        assert_eq!(planet_of(&sun, &content), None);
    }

    #[test]
    fn occlusion_halves_at_the_surface_and_vanishes_far_away() {
        let content = base_content();
        let body = content.body(&home()).unwrap();
        assert!((occlusion(body, 0.0) - 0.5).abs() < 1e-9);
        assert!(occlusion(body, body.radius_m * 1000.0) > 0.999);
    }

    #[test]
    fn atmosphere_layers() {
        let content = base_content();
        let constants = &content.constants;
        let body = content.body(&home()).unwrap();
        let dense = atmosphere_attenuation(body, 0.0, constants);
        let thin = atmosphere_attenuation(body, body.flying_threshold_m, constants);
        let space = atmosphere_attenuation(body, body.atmosphere_height_m, constants);
        assert!((dense - constants.troposphere_coefficient).abs() < 1e-12);
        assert!((thin - constants.stratosphere_coefficient).abs() < 1e-12);
        assert!((space - 1.0).abs() < 1e-12);
    }

    #[test]
    fn solar_flux_follows_inverse_square() {
        let mut content = base_content();
        content.constants.galactic_radiation = 0.0;
        let near = ambient_radiation(None, 0.0, content.constants.home_star_distance_m, &content);
        let far = ambient_radiation(
            None,
            0.0,
            content.constants.home_star_distance_m * 2.0,
            &content,
        );
        assert!((near - 4.0 * far).abs() < 1e-9);
    }

    #[test]
    fn crew_at_base_receive_nothing() {
        let content = base_content();
        let effect = Effect::default();
        assert!(received_rate(&available_context(), &effect, &content).abs() < f64::EPSILON);
        assert!(received_rate(&assigned_context(), &effect, &content) > 0.0);
    }

    #[test]
    fn disabled_radiation_receives_nothing() {
        let mut content = base_content();
        content.settings.radiation_enabled = false;
        let rate = received_rate(&assigned_context(), &Effect::default(), &content);
        assert!(rate.abs() < f64::EPSILON);
    }

    #[test]
    fn eva_uses_fixed_exposure() {
        let content = base_content();
        let mut context = assigned_context();
        let effect = Effect::default();
        let inside = received_rate(&context, &effect, &content);
        context.on_eva = true;
        let outside = received_rate(&context, &effect, &content);
        assert!((outside - inside * content.constants.eva_exposure).abs() < 1e-9);
    }

    #[test]
    fn decontamination_stops_at_zero() {
        let content = base_content();
        let mut record = new_record("jeb", &content);
        record.dose = content.constants.decontamination_rate_per_day * 1.5;
        assert!(!decontaminate(&mut record, &content.constants, 1.0));
        assert!(decontaminate(&mut record, &content.constants, 1.0));
        assert!(record.dose.abs() < f64::EPSILON);
    }
}
