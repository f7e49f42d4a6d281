//! Content loading, scenario loading and save files shared by the CLI and tests.

use anyhow::{ensure, Context, Result};
use health_core::persistence::{load_state, save_state, ConfigNode};
use health_core::{
    condition_ids, BodyDef, ConditionDef, ConditionalEffect, Constants, CrewHealthRecord,
    FactorDef, HealthContent, HealthSettings, HealthState, Logic, MetaState, QuirkDef,
    RadStormTypeDef, WorldSnapshot,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

#[derive(Deserialize)]
struct ConstantsFile {
    content_version: String,
    constants: Constants,
    #[serde(default)]
    settings: HealthSettings,
}

#[derive(Deserialize)]
struct FactorsFile {
    factors: Vec<FactorDef>,
}

#[derive(Deserialize)]
struct ConditionsFile {
    conditions: Vec<ConditionDef>,
}

#[derive(Deserialize)]
struct QuirksFile {
    quirks: Vec<QuirkDef>,
}

#[derive(Deserialize)]
struct BodiesFile {
    bodies: Vec<BodyDef>,
}

#[derive(Deserialize)]
struct StormTypesFile {
    storm_types: Vec<RadStormTypeDef>,
}

#[derive(Deserialize)]
struct LocationEffectsFile {
    location_effects: Vec<ConditionalEffect>,
}

fn read_json<T: DeserializeOwned>(dir: &Path, file: &str) -> Result<T> {
    let text =
        std::fs::read_to_string(dir.join(file)).with_context(|| format!("reading {file}"))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {file}"))
}

/// Known ids, gathered once for reference checks.
struct Catalog<'a> {
    conditions: HashSet<&'a str>,
    quirks: HashSet<&'a str>,
    bodies: HashSet<&'a str>,
}

impl<'a> Catalog<'a> {
    fn new(content: &'a HealthContent) -> Self {
        Self {
            conditions: content.conditions.iter().map(|c| c.id.0.as_str()).collect(),
            quirks: content.quirks.iter().map(|q| q.id.0.as_str()).collect(),
            bodies: content.bodies.iter().map(|b| b.id.0.as_str()).collect(),
        }
    }

    fn check_logic(&self, logic: &Logic, owner: &str) -> Result<()> {
        if let Some(body) = &logic.body {
            ensure!(
                self.bodies.contains(body.0.as_str()),
                "{owner}: logic references unknown body '{body}'"
            );
        }
        if let Some(condition) = &logic.crewmate_condition {
            ensure!(
                self.conditions.contains(condition.0.as_str()),
                "{owner}: logic references unknown condition '{condition}'"
            );
        }
        for child in &logic.children {
            self.check_logic(child, owner)?;
        }
        Ok(())
    }

    fn check_effects(&self, effects: &[ConditionalEffect], owner: &str) -> Result<()> {
        for effect in effects {
            self.check_logic(&effect.logic, owner)?;
        }
        Ok(())
    }
}

fn ensure_unique<'a>(ids: impl Iterator<Item = &'a str>, kind: &str) -> Result<()> {
    let mut seen = HashSet::new();
    for id in ids {
        ensure!(!id.is_empty(), "{kind} has empty id");
        ensure!(seen.insert(id), "duplicate {kind} id '{id}'");
    }
    Ok(())
}

fn validate_constants(c: &Constants) -> Result<()> {
    ensure!(c.base_max_hp > 0.0, "base_max_hp must be positive");
    ensure!(
        c.exhaustion_start < c.exhaustion_end,
        "exhaustion_start must be below exhaustion_end"
    );
    ensure!(
        c.event_period_min_days <= c.event_period_max_days,
        "event period min exceeds max"
    );
    ensure!(c.event_period_max_days > 0.0, "event period must be positive");
    ensure!(!c.training_caps.is_empty(), "training_caps is empty");
    ensure!(c.reference_dose > 0.0, "reference_dose must be positive");
    ensure!(c.home_star_distance_m > 0.0, "home_star_distance_m must be positive");
    Ok(())
}

fn validate_bodies(content: &HealthContent, catalog: &Catalog<'_>) -> Result<()> {
    let stars = content.bodies.iter().filter(|b| b.parent.is_none()).count();
    ensure!(stars == 1, "expected exactly one body without a parent, found {stars}");
    for body in &content.bodies {
        if let Some(parent) = &body.parent {
            ensure!(
                catalog.bodies.contains(parent.0.as_str()),
                "body '{}' has unknown parent '{parent}'",
                body.id
            );
            ensure!(*parent != body.id, "body '{}' orbits itself", body.id);
        }
        ensure!(body.radius_m > 0.0, "body '{}' has non-positive radius", body.id);
    }
    let home = &content.constants.home_body;
    ensure!(
        catalog.bodies.contains(home.0.as_str()),
        "home body '{home}' is not a known body"
    );
    Ok(())
}

/// Validates cross-references in loaded content.
///
/// Catches mistakes like a missing engine condition, a quirk incompatible
/// with a quirk that doesn't exist, or a logic tree naming an unknown body.
pub fn validate_content(content: &HealthContent) -> Result<()> {
    validate_constants(&content.constants)?;
    ensure_unique(content.conditions.iter().map(|c| c.id.0.as_str()), "condition")?;
    ensure_unique(content.quirks.iter().map(|q| q.id.0.as_str()), "quirk")?;
    ensure_unique(content.bodies.iter().map(|b| b.id.0.as_str()), "body")?;

    let mut factors = HashSet::new();
    for def in &content.factors {
        ensure!(factors.insert(def.factor), "factor {:?} defined twice", def.factor);
    }

    let catalog = Catalog::new(content);
    for id in condition_ids::ALL {
        ensure!(
            catalog.conditions.contains(id),
            "engine condition '{id}' is not defined"
        );
    }
    for condition in &content.conditions {
        catalog.check_effects(&condition.effects, &format!("condition '{}'", condition.id))?;
    }
    for quirk in &content.quirks {
        for other in &quirk.incompatible_with {
            ensure!(
                catalog.quirks.contains(other.0.as_str()),
                "quirk '{}' is incompatible with unknown quirk '{other}'",
                quirk.id
            );
            ensure!(*other != quirk.id, "quirk '{}' is incompatible with itself", quirk.id);
        }
        ensure!(
            quirk.courage_weight > 0.0 && quirk.stupidity_weight > 0.0,
            "quirk '{}' has a non-positive weight",
            quirk.id
        );
        catalog.check_effects(&quirk.effects, &format!("quirk '{}'", quirk.id))?;
    }
    catalog.check_effects(&content.location_effects, "location effect")?;
    validate_bodies(content, &catalog)?;

    for storm in &content.storm_types {
        ensure!(storm.weight >= 0.0, "storm type '{}' has negative weight", storm.name);
        ensure!(
            storm.velocity_m_per_day > 0.0,
            "storm type '{}' has non-positive velocity",
            storm.name
        );
    }
    Ok(())
}

pub fn load_content(content_dir: &str) -> Result<HealthContent> {
    let dir = Path::new(content_dir);
    let constants_file: ConstantsFile = read_json(dir, "constants.json")?;
    let factors_file: FactorsFile = read_json(dir, "factors.json")?;
    let conditions_file: ConditionsFile = read_json(dir, "conditions.json")?;
    let quirks_file: QuirksFile = read_json(dir, "quirks.json")?;
    let bodies_file: BodiesFile = read_json(dir, "bodies.json")?;
    let storm_types_file: StormTypesFile = read_json(dir, "storm_types.json")?;
    let location_file: LocationEffectsFile = read_json(dir, "location_effects.json")?;
    let content = HealthContent {
        content_version: constants_file.content_version,
        constants: constants_file.constants,
        settings: constants_file.settings,
        factors: factors_file.factors,
        conditions: conditions_file.conditions,
        quirks: quirks_file.quirks,
        bodies: bodies_file.bodies,
        storm_types: storm_types_file.storm_types,
        location_effects: location_file.location_effects,
    };
    validate_content(&content).context("validating content")?;
    tracing::info!(
        version = %content.content_version,
        conditions = content.conditions.len(),
        quirks = content.quirks.len(),
        bodies = content.bodies.len(),
        "content loaded"
    );
    Ok(content)
}

/// Checks that every crew member's vessel and body exist and every vessel's
/// crew is on the roster.
pub fn validate_scenario(world: &WorldSnapshot, content: &HealthContent) -> Result<()> {
    let bodies: HashSet<&str> = content.bodies.iter().map(|b| b.id.0.as_str()).collect();
    for (id, context) in &world.crew {
        if let Some(vessel) = &context.vessel {
            ensure!(
                world.vessels.contains_key(vessel),
                "crew '{id}' is aboard unknown vessel '{vessel}'"
            );
        }
        if let Some(body) = &context.body {
            ensure!(
                bodies.contains(body.0.as_str()),
                "crew '{id}' is at unknown body '{body}'"
            );
        }
    }
    for (key, vessel) in &world.vessels {
        ensure!(*key == vessel.id, "vessel '{key}' is keyed as '{}'", vessel.id);
        for member in &vessel.crew {
            ensure!(
                world.crew.contains_key(member),
                "vessel '{key}' lists unknown crew '{member}'"
            );
        }
        let parts = vessel.parts.len();
        for part in &vessel.parts {
            if let Some(parent) = part.parent {
                ensure!(
                    parent < parts,
                    "vessel '{key}' part '{}' has parent index {parent} out of range",
                    part.part_type
                );
            }
        }
    }
    Ok(())
}

pub fn load_scenario(path: &str, content: &HealthContent) -> Result<WorldSnapshot> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading scenario {path}"))?;
    let world: WorldSnapshot =
        serde_json::from_str(&text).with_context(|| format!("parsing scenario {path}"))?;
    validate_scenario(&world, content).with_context(|| format!("validating scenario {path}"))?;
    Ok(world)
}

/// Fresh state with a full-health record for every trackable crew member.
pub fn build_initial_state(world: &WorldSnapshot, content: &HealthContent, seed: u64) -> HealthState {
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
            seed,
            schema_version: health_core::persistence::SCHEMA_VERSION,
            content_version: content.content_version.clone(),
            next_event_day: None,
        },
        records,
        storms: vec![],
        counters: health_core::Counters::default(),
    }
}

/// Write the state's save node as pretty JSON.
pub fn save_state_file(path: &Path, state: &HealthState) -> Result<()> {
    let json = serde_json::to_string_pretty(&save_state(state)).context("serializing save")?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}

pub fn load_state_file(path: &Path, content: &HealthContent) -> Result<HealthState> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let node: ConfigNode =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    Ok(load_state(&node, content))
}
