//! Save and load through an opaque key-value node tree.
//!
//! The host decides how a [`ConfigNode`] is stored (the CLI writes it as
//! JSON). Values are strings; repeated keys hold lists. Malformed values fall
//! back to documented defaults with a warning so one bad entry never stops a
//! load.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::record::{self, base_max_hp, CrewHealthRecord};
use crate::training::TrainingProgress;
use crate::{
    BodyId, ConditionId, Counters, CrewId, Effect, FactorId, HealthContent, HealthState,
    MetaState, PartTypeId, QuirkId, RadStorm, StormId, StormTarget, VesselId,
};

pub const SCHEMA_VERSION: u32 = 1;

const STATE_NODE: &str = "HEALTH";
const CREW_NODE: &str = "CREW";
const TRAINING_NODE: &str = "TRAINING";
const FACTORS_NODE: &str = "FACTORS";
const STORM_NODE: &str = "STORM";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigNode {
    pub name: String,
    #[serde(default)]
    pub values: Vec<(String, String)>,
    #[serde(default)]
    pub nodes: Vec<ConfigNode>,
}

impl ConfigNode {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn add_value(&mut self, key: &str, value: impl std::fmt::Display) {
        self.values.push((key.to_string(), value.to_string()));
    }

    pub fn add_node(&mut self, node: ConfigNode) {
        self.nodes.push(node);
    }

    /// First value stored under `key`.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value stored under `key`, in order.
    pub fn values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.values
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn node(&self, name: &str) -> Option<&ConfigNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn nodes<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ConfigNode> + 'a {
        self.nodes.iter().filter(move |n| n.name == name)
    }
}

/// Parse `key`, or `default` when missing. Malformed values warn.
fn parse_or<T: FromStr>(node: &ConfigNode, key: &str, default: T) -> T {
    let Some(raw) = node.value(key) else {
        return default;
    };
    raw.parse().unwrap_or_else(|_| {
        tracing::warn!(node = %node.name, key, value = raw, "malformed value, using default");
        default
    })
}

fn parse_opt<T: FromStr>(node: &ConfigNode, key: &str) -> Option<T> {
    let raw = node.value(key)?;
    let parsed = raw.parse().ok();
    if parsed.is_none() {
        tracing::warn!(node = %node.name, key, value = raw, "malformed value, ignoring");
    }
    parsed
}

pub fn save_record(record: &CrewHealthRecord) -> ConfigNode {
    let mut node = ConfigNode::new(CREW_NODE);
    node.add_value("name", &record.id);
    node.add_value("hp", record.hp);
    node.add_value("dose", record.dose);
    if let Some(max_hp) = record.last_max_hp {
        node.add_value("max_hp", max_hp);
    }
    node.add_value("radiation", record.last_radiation);
    for condition in &record.conditions {
        node.add_value("condition", condition);
    }
    for quirk in &record.quirks {
        node.add_value("quirk", quirk);
    }
    node.add_value("quirk_level", record.quirk_level);
    node.add_value("on_eva", record.on_eva);
    if let Some(original_trait) = &record.original_trait {
        node.add_value("original_trait", original_trait);
    }
    if record.dead {
        node.add_value("dead", true);
    }
    for part_type in &record.training_design {
        node.add_value("training_design", part_type);
    }
    for progress in &record.training {
        let mut training = ConfigNode::new(TRAINING_NODE);
        training.add_value("part", &progress.part_type);
        training.add_value("complexity", progress.complexity);
        training.add_value("count", progress.count);
        training.add_value("level", progress.level);
        node.add_node(training);
    }
    let mut factors = ConfigNode::new(FACTORS_NODE);
    for (factor, value) in &record.factors.value {
        if value.abs() > f64::EPSILON {
            factors.add_value(factor.name(), value);
        }
    }
    if !factors.values.is_empty() {
        node.add_node(factors);
    }
    node
}

/// Rebuild a record. `None` when the node has no crew name.
pub fn load_record(node: &ConfigNode, content: &HealthContent) -> Option<CrewHealthRecord> {
    let Some(name) = node.value("name") else {
        tracing::warn!("crew node without a name, skipping");
        return None;
    };
    let constants = &content.constants;
    let quirk_level = parse_or(node, "quirk_level", 0);
    let mut record = CrewHealthRecord::new(CrewId(name.to_string()), quirk_level, constants);
    record.hp = parse_or(node, "hp", base_max_hp(0, constants)).max(0.0);
    record.dose = parse_or(node, "dose", 0.0_f64).max(0.0);
    // Saves without MaxHP get it from level and dose until the next tick.
    let max_hp = parse_opt::<f64>(node, "max_hp")
        .filter(|m| m.is_finite() && *m >= 0.0)
        .unwrap_or_else(|| record::max_hp(quirk_level, record.dose, &Effect::default(), constants));
    record.last_max_hp = Some(max_hp);
    record.last_radiation = parse_or(node, "radiation", 0.0);
    record.conditions = node
        .values("condition")
        .map(|c| ConditionId(c.to_string()))
        .collect();
    record.quirks = node.values("quirk").map(|q| QuirkId(q.to_string())).collect();
    record.on_eva = parse_or(node, "on_eva", false);
    record.original_trait = node.value("original_trait").map(str::to_string);
    record.dead = parse_or(node, "dead", false);
    record.training_design = node
        .values("training_design")
        .map(|p| PartTypeId(p.to_string()))
        .collect();
    record.training = node.nodes(TRAINING_NODE).filter_map(load_training).collect();
    if let Some(factors) = node.node(FACTORS_NODE) {
        for (key, _) in &factors.values {
            let Some(factor) = FactorId::from_name(key) else {
                tracing::warn!(crew = name, factor = %key, "unknown factor in save, skipping");
                continue;
            };
            if let Some(value) = parse_opt(factors, key) {
                record.factors.value.insert(factor, value);
            }
        }
    }
    Some(record)
}

fn load_training(node: &ConfigNode) -> Option<TrainingProgress> {
    let Some(part) = node.value("part") else {
        tracing::warn!("training node without a part, skipping");
        return None;
    };
    Some(TrainingProgress {
        part_type: PartTypeId(part.to_string()),
        complexity: parse_or(node, "complexity", 1.0),
        count: parse_or(node, "count", 1),
        level: parse_or(node, "level", 0.0_f64).max(0.0),
    })
}

fn save_storm(storm: &RadStorm) -> ConfigNode {
    let mut node = ConfigNode::new(STORM_NODE);
    node.add_value("id", &storm.id);
    match &storm.target {
        StormTarget::Body(body) => node.add_value("body", body),
        StormTarget::Vessel(vessel) => node.add_value("vessel", vessel),
    }
    node.add_value("magnitude", storm.magnitude);
    node.add_value("arrival_day", storm.arrival_day);
    node.add_value("star_distance", storm.star_distance_m);
    node
}

fn load_storm(node: &ConfigNode) -> Option<RadStorm> {
    let target = match (node.value("body"), node.value("vessel")) {
        (Some(body), _) => StormTarget::Body(BodyId(body.to_string())),
        (None, Some(vessel)) => StormTarget::Vessel(VesselId(vessel.to_string())),
        (None, None) => {
            tracing::warn!("storm without a target, dropping");
            return None;
        }
    };
    let Some(arrival_day) = parse_opt(node, "arrival_day") else {
        tracing::warn!("storm without an arrival day, dropping");
        return None;
    };
    Some(RadStorm {
        id: StormId(node.value("id").unwrap_or("storm_unknown").to_string()),
        target,
        magnitude: parse_or(node, "magnitude", 0.0),
        arrival_day,
        star_distance_m: parse_or(node, "star_distance", 0.0),
    })
}

/// Whole state: meta values, one node per record (sorted by crew id) and
/// one per pending storm.
pub fn save_state(state: &HealthState) -> ConfigNode {
    let mut node = ConfigNode::new(STATE_NODE);
    node.add_value("schema_version", state.meta.schema_version);
    node.add_value("content_version", &state.meta.content_version);
    node.add_value("seed", state.meta.seed);
    node.add_value("day", state.meta.day);
    if let Some(next) = state.meta.next_event_day {
        node.add_value("next_event_day", next);
    }
    node.add_value("next_event_id", state.counters.next_event_id);

    let mut ids: Vec<&CrewId> = state.records.keys().collect();
    ids.sort();
    for id in ids {
        if let Some(record) = state.records.get(id) {
            node.add_node(save_record(record));
        }
    }
    for storm in &state.storms {
        node.add_node(save_storm(storm));
    }
    node
}

pub fn load_state(node: &ConfigNode, content: &HealthContent) -> HealthState {
    if node.name != STATE_NODE {
        tracing::warn!(node = %node.name, "unexpected root node, loading anyway");
    }
    let schema_version = parse_or(node, "schema_version", SCHEMA_VERSION);
    if schema_version != SCHEMA_VERSION {
        tracing::warn!(
            found = schema_version,
            expected = SCHEMA_VERSION,
            "save schema version mismatch"
        );
    }
    let content_version = node
        .value("content_version")
        .unwrap_or(content.content_version.as_str())
        .to_string();
    if content_version != content.content_version {
        tracing::warn!(
            save = %content_version,
            content = %content.content_version,
            "save was made with different content"
        );
    }
    let records = node
        .nodes(CREW_NODE)
        .filter_map(|n| load_record(n, content))
        .map(|r| (r.id.clone(), r))
        .collect();
    HealthState {
        meta: MetaState {
            day: parse_or(node, "day", 0.0),
            generation: 0,
            seed: parse_or(node, "seed", 0),
            schema_version,
            content_version,
            next_event_day: parse_opt(node, "next_event_day"),
        },
        records,
        storms: node.nodes(STORM_NODE).filter_map(load_storm).collect(),
        counters: Counters {
            next_event_id: parse_or(node, "next_event_id", 0),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{base_content, base_state, new_record, single_crew_world};

    #[test]
    fn record_round_trip_preserves_health_and_progress() {
        let content = base_content();
        let mut record = new_record("jeb", &content);
        record.hp = 42.5;
        record.dose = 130.25;
        record.last_radiation = 0.75;
        record.conditions.push(ConditionId("Injured".to_string()));
        record.conditions.push(ConditionId("Injured".to_string()));
        record.conditions.push(ConditionId("Sick".to_string()));
        record.quirks.push(QuirkId("Fit".to_string()));
        record.quirk_level = 3;
        record.original_trait = Some("Pilot".to_string());
        record.training.push(TrainingProgress {
            part_type: PartTypeId("pod".to_string()),
            complexity: 1.5,
            count: 2,
            level: 0.4,
        });
        record.factors.value.insert(FactorId::Stress, -1.25);
        record.factors.value.insert(FactorId::AtHome, 0.0);

        let node = save_record(&record);
        assert!(node.node(FACTORS_NODE).unwrap().value("Home").is_none());
        let loaded = load_record(&node, &content).unwrap();

        assert_eq!(loaded.id, record.id);
        assert!((loaded.hp - 42.5).abs() < 1e-12);
        assert!((loaded.dose - 130.25).abs() < 1e-12);
        assert_eq!(loaded.conditions, record.conditions);
        assert_eq!(loaded.quirks, record.quirks);
        assert_eq!(loaded.quirk_level, 3);
        assert_eq!(loaded.original_trait.as_deref(), Some("Pilot"));
        assert_eq!(loaded.training, record.training);
        assert!((loaded.factors.value[&FactorId::Stress] + 1.25).abs() < 1e-12);
        assert!(!loaded.factors.value.contains_key(&FactorId::AtHome));
    }

    #[test]
    fn malformed_hp_falls_back_to_base_max_hp() {
        let content = base_content();
        let mut node = ConfigNode::new(CREW_NODE);
        node.add_value("name", "bill");
        node.add_value("hp", "lots");
        node.add_value("dose", "-5");
        let record = load_record(&node, &content).unwrap();
        assert!((record.hp - content.constants.base_max_hp).abs() < 1e-12);
        assert!(record.dose.abs() < f64::EPSILON);
    }

    #[test]
    fn max_hp_survives_a_load_and_caps_immediate_changes() {
        let content = base_content();
        let mut record = new_record("jeb", &content);
        record.last_max_hp = Some(80.0);
        record.hp = 70.0;
        let mut loaded = load_record(&save_record(&record), &content).unwrap();
        assert!((loaded.last_max_hp.unwrap() - 80.0).abs() < 1e-12);
        loaded.change_hp(25.0);
        assert!((loaded.hp - 80.0).abs() < 1e-12);
    }

    #[test]
    fn missing_max_hp_is_rebuilt_from_level() {
        let content = base_content();
        let mut node = ConfigNode::new(CREW_NODE);
        node.add_value("name", "val");
        node.add_value("hp", 50);
        node.add_value("quirk_level", 2);
        let record = load_record(&node, &content).unwrap();
        let expected = base_max_hp(2, &content.constants);
        assert!((record.last_max_hp.unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn nameless_crew_node_is_skipped() {
        let content = base_content();
        let mut node = ConfigNode::new(CREW_NODE);
        node.add_value("hp", 10);
        assert!(load_record(&node, &content).is_none());
    }

    #[test]
    fn state_round_trip_keeps_meta_records_and_storms() {
        let content = base_content();
        let world = single_crew_world("jeb");
        let mut state = base_state(&world, &content);
        state.meta.day = 12.5;
        state.meta.next_event_day = Some(14.0);
        state.counters.next_event_id = 7;
        state.storms.push(RadStorm {
            id: StormId("storm_a".to_string()),
            target: StormTarget::Vessel(VesselId("v1".to_string())),
            magnitude: 30.0,
            arrival_day: 13.0,
            star_distance_m: 1e10,
        });

        let node = save_state(&state);
        let json = serde_json::to_string(&node).unwrap();
        let node: ConfigNode = serde_json::from_str(&json).unwrap();
        let loaded = load_state(&node, &content);

        assert!((loaded.meta.day - 12.5).abs() < 1e-12);
        assert!((loaded.meta.next_event_day.unwrap() - 14.0).abs() < 1e-12);
        assert_eq!(loaded.counters.next_event_id, 7);
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.storms.len(), 1);
        assert_eq!(loaded.storms[0].target, state.storms[0].target);
    }
}
