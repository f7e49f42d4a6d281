//! Shared test fixtures for health_core and downstream crates.
//!
//! `base_content()` provides a full catalog (every engine condition, a few
//! quirks, a star with a planet and a moon) with round numbers so tests can
//! compute expectations by hand. `minimal_content()` is the bare minimum for
//! content-validation tests.

use std::collections::HashMap;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::effect::ConditionalEffect;
use crate::{
    condition_ids, BodyDef, BodyId, ConditionDef, ConditionId, Constants, Counters, CrewContext,
    CrewHealthRecord, CrewId, Effect, FactorDef, FactorId, Gender, HealthContent, HealthSettings,
    HealthState, MetaState, PartContribution, PartTypeId, QuirkDef, QuirkId, RadStormTypeDef,
    RosterStatus, Situation, VesselId, VesselSnapshot, WorldSnapshot,
};

/// Distance of the home planet from the star.
pub const HOME_STAR_DISTANCE_M: f64 = 13_599_840_256.0;

fn condition(id: &str, title: &str) -> ConditionDef {
    ConditionDef {
        id: ConditionId(id.to_string()),
        title: title.to_string(),
        description: String::new(),
        visible: true,
        incapacitated: false,
        stackable: false,
        hp_on_add: 0.0,
        hp_on_remove: 0.0,
        hp_change_per_day: 0.0,
        effects: vec![],
    }
}

fn quirk(id: &str) -> QuirkDef {
    QuirkDef {
        id: QuirkId(id.to_string()),
        title: id.to_string(),
        description: String::new(),
        visible: true,
        min_level: 0,
        incompatible_with: vec![],
        courage_weight: 1.0,
        stupidity_weight: 1.0,
        effects: vec![],
    }
}

fn factor_defs() -> Vec<FactorDef> {
    [
        (FactorId::Assigned, -0.5),
        (FactorId::Crowding, -0.5),
        (FactorId::Isolation, -1.0),
        (FactorId::Microgravity, -0.5),
        (FactorId::Eva, -10.0),
        (FactorId::Confinement, -0.5),
        (FactorId::Connectivity, 0.5),
        (FactorId::AtHome, 2.0),
        (FactorId::AtBase, 5.0),
        (FactorId::Stress, -2.0),
    ]
    .into_iter()
    .map(|(factor, base_change_per_day)| FactorDef {
        factor,
        base_change_per_day,
    })
    .collect()
}

fn condition_defs() -> Vec<ConditionDef> {
    vec![
        ConditionDef {
            incapacitated: true,
            ..condition(condition_ids::EXHAUSTED, "Exhausted")
        },
        ConditionDef {
            incapacitated: true,
            ..condition(condition_ids::PANICKING, "Panicking")
        },
        ConditionDef {
            hp_change_per_day: -2.0,
            ..condition(condition_ids::SICK, "Sick")
        },
        ConditionDef {
            visible: false,
            ..condition(condition_ids::INFECTED, "Infected")
        },
        ConditionDef {
            visible: false,
            ..condition(condition_ids::IMMUNE, "Immune")
        },
        ConditionDef {
            stackable: true,
            hp_on_add: -10.0,
            ..condition(condition_ids::INJURED, "Injured")
        },
        condition(condition_ids::TRAINING, "Training"),
        condition(condition_ids::DECONTAMINATING, "Decontaminating"),
    ]
}

fn quirk_defs() -> Vec<QuirkDef> {
    vec![
        QuirkDef {
            incompatible_with: vec![QuirkId("Agoraphobic".to_string())],
            courage_weight: 0.5,
            ..quirk("Claustrophobic")
        },
        quirk("Agoraphobic"),
        QuirkDef {
            min_level: 3,
            ..quirk("Veteran")
        },
        QuirkDef {
            effects: vec![ConditionalEffect {
                effect: Effect {
                    max_hp_bonus: 10.0,
                    ..Effect::default()
                },
                ..ConditionalEffect::default()
            }],
            stupidity_weight: 0.5,
            ..quirk("Fit")
        },
    ]
}

fn body_defs() -> Vec<BodyDef> {
    vec![
        BodyDef {
            id: BodyId("sun".to_string()),
            name: "Sun".to_string(),
            parent: None,
            radius_m: 261_600_000.0,
            orbit_radius_m: 0.0,
            magnetosphere: 0.0,
            space_threshold_m: 0.0,
            atmosphere_height_m: 0.0,
            flying_threshold_m: 0.0,
            natural_radiation: 0.0,
        },
        BodyDef {
            id: BodyId("home".to_string()),
            name: "Home".to_string(),
            parent: Some(BodyId("sun".to_string())),
            radius_m: 600_000.0,
            orbit_radius_m: HOME_STAR_DISTANCE_M,
            magnetosphere: 1.0,
            space_threshold_m: 250_000.0,
            atmosphere_height_m: 70_000.0,
            flying_threshold_m: 18_000.0,
            natural_radiation: 0.0,
        },
        BodyDef {
            id: BodyId("moon".to_string()),
            name: "Moon".to_string(),
            parent: Some(BodyId("home".to_string())),
            radius_m: 200_000.0,
            orbit_radius_m: 12_000_000.0,
            magnetosphere: 0.5,
            space_threshold_m: 100_000.0,
            atmosphere_height_m: 0.0,
            flying_threshold_m: 0.0,
            natural_radiation: 0.2,
        },
    ]
}

fn base_constants() -> Constants {
    Constants {
        base_max_hp: 100.0,
        max_hp_per_level: 10.0,
        exhaustion_start: 0.2,
        exhaustion_end: 0.25,
        exhaustion_warning_band: 0.1,
        exhaustion_mean_days_per_margin: 50.0,
        neutral_trait: "Tourist".to_string(),
        home_body: BodyId("home".to_string()),
        home_altitude_m: 18_000.0,

        radiation_max_hp_loss: 0.5,
        reference_dose: 1_000.0,
        in_space_low_coefficient: 0.3,
        in_space_high_coefficient: 0.6,
        troposphere_coefficient: 0.01,
        stratosphere_coefficient: 0.2,
        solar_radiation: 5.0,
        galactic_radiation: 1.0,
        home_star_distance_m: HOME_STAR_DISTANCE_M,
        shielding_effect: 1.0,
        eva_exposure: 10.0,
        decontamination_rate_per_day: 100.0,

        training_per_day: 0.025,
        training_caps: vec![0.5, 0.75, 1.0],
        in_flight_training_cap: 0.5,
        stupidity_training_penalty: 0.5,

        event_period_min_days: 1.0,
        event_period_max_days: 2.0,
        accident_chance: 0.01,
        panic_attack_chance: 0.02,
        calm_down_chance: 0.3,
        base_infection_chance: 0.001,
        infection_chance_per_crewmate: 0.05,
        incubation_chance: 0.2,
        cure_chance: 0.1,
        immunity_loss_chance: 0.05,

        quirk_chance_per_level: 0.25,
        max_quirks: 2,

        storm_chance_per_period: 0.05,
        solar_cycle_days: 2_000.0,
    }
}

/// Full-featured content: every engine condition, four quirks, sun/home/moon,
/// one storm type, no location effects.
pub fn base_content() -> HealthContent {
    HealthContent {
        content_version: "test".to_string(),
        constants: base_constants(),
        settings: HealthSettings::default(),
        factors: factor_defs(),
        conditions: condition_defs(),
        quirks: quirk_defs(),
        bodies: body_defs(),
        storm_types: vec![RadStormTypeDef {
            name: "Flare".to_string(),
            weight: 1.0,
            magnitude: 50.0,
            magnitude_sd: 10.0,
            // Two days from star to home.
            velocity_m_per_day: HOME_STAR_DISTANCE_M / 2.0,
            velocity_sd: HOME_STAR_DISTANCE_M / 20.0,
        }],
        location_effects: vec![],
    }
}

/// Bare-minimum content for validation tests: one factor, the engine's own
/// conditions, a star and a home planet.
pub fn minimal_content() -> HealthContent {
    let bodies = body_defs().into_iter().take(2).collect();
    HealthContent {
        content_version: "test".to_string(),
        constants: base_constants(),
        settings: HealthSettings::default(),
        factors: vec![FactorDef {
            factor: FactorId::Assigned,
            base_change_per_day: -1.0,
        }],
        conditions: condition_defs(),
        quirks: vec![],
        bodies,
        storm_types: vec![],
        location_effects: vec![],
    }
}

pub fn new_record(name: &str, content: &HealthContent) -> CrewHealthRecord {
    CrewHealthRecord::new(CrewId(name.to_string()), 1, &content.constants)
}

/// A level 1 pilot in low orbit of home aboard `v1`.
pub fn assigned_context() -> CrewContext {
    CrewContext {
        status: RosterStatus::Assigned,
        vessel: Some(VesselId("v1".to_string())),
        situation: Some(Situation::Orbiting),
        body: Some(BodyId("home".to_string())),
        altitude_m: 100_000.0,
        star_distance_m: HOME_STAR_DISTANCE_M,
        on_eva: false,
        mission_days: 0.0,
        gender: Gender::Male,
        trait_name: "Pilot".to_string(),
        courage: 0.5,
        stupidity: 0.5,
        level: 1,
        connected: true,
    }
}

/// A level 1 engineer at base.
pub fn available_context() -> CrewContext {
    CrewContext {
        status: RosterStatus::Available,
        vessel: None,
        situation: None,
        body: Some(BodyId("home".to_string())),
        altitude_m: 0.0,
        star_distance_m: HOME_STAR_DISTANCE_M,
        on_eva: false,
        mission_days: 0.0,
        gender: Gender::Female,
        trait_name: "Engineer".to_string(),
        courage: 0.5,
        stupidity: 0.5,
        level: 1,
        connected: true,
    }
}

pub fn part(part_type: &str) -> PartContribution {
    PartContribution {
        part_type: PartTypeId(part_type.to_string()),
        ..PartContribution::default()
    }
}

/// A loaded vessel with one pod seating the whole crew.
pub fn crewed_vessel(id: &str, crew: &[&str]) -> VesselSnapshot {
    let seats = u32::try_from(crew.len().max(1)).unwrap_or(u32::MAX);
    VesselSnapshot {
        id: VesselId(id.to_string()),
        crew: crew.iter().map(|c| CrewId((*c).to_string())).collect(),
        loaded: true,
        parts: vec![PartContribution {
            crew_capacity: seats,
            space: 2.0,
            shielding: 0.5,
            complexity: 1.0,
            ..part("pod")
        }],
    }
}

/// One assigned pilot aboard `v1`.
pub fn single_crew_world(name: &str) -> WorldSnapshot {
    WorldSnapshot {
        crew: HashMap::from([(CrewId(name.to_string()), assigned_context())]),
        vessels: HashMap::from([(
            VesselId("v1".to_string()),
            crewed_vessel("v1", &[name]),
        )]),
        facility_level: 0,
    }
}

/// State with a fresh record for every trackable crew member of `world`.
pub fn base_state(world: &WorldSnapshot, content: &HealthContent) -> HealthState {
    let records = world
        .crew
        .iter()
        .filter(|(_, context)| context.status.is_trackable())
        .map(|(id, context)| {
            (
                id.clone(),
                CrewHealthRecord::new(id.clone(), context.level, &content.constants),
            )
        })
        .collect();
    HealthState {
        meta: MetaState {
            day: 0.0,
            generation: 0,
            seed: 42,
            schema_version: 1,
            content_version: content.content_version.clone(),
            next_event_day: None,
        },
        records,
        storms: vec![],
        counters: Counters::default(),
    }
}

/// Deterministic RNG seeded with 42.
pub fn make_rng() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(42)
}
