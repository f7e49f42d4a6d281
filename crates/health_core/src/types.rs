//! Type definitions for `health_core`.
//!
//! IDs, host-facing snapshot types, state, events and content catalogs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::effect::ConditionalEffect;
use crate::record::CrewHealthRecord;

// ---------------------------------------------------------------------------
// ID newtypes
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub String);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(CrewId);
string_id!(VesselId);
string_id!(BodyId);
string_id!(PartTypeId);
string_id!(ConditionId);
string_id!(QuirkId);
string_id!(StormId);
string_id!(EventId);

/// Condition ids the engine itself adds and removes.
pub mod condition_ids {
    pub const EXHAUSTED: &str = "Exhausted";
    pub const DECONTAMINATING: &str = "Decontaminating";
    pub const TRAINING: &str = "Training";
    pub const INFECTED: &str = "Infected";
    pub const SICK: &str = "Sick";
    pub const IMMUNE: &str = "Immune";
    pub const INJURED: &str = "Injured";
    pub const PANICKING: &str = "Panicking";

    /// Every condition the engine adds by id. Content must define all of them.
    pub const ALL: [&str; 8] = [
        EXHAUSTED,
        DECONTAMINATING,
        TRAINING,
        INFECTED,
        SICK,
        IMMUNE,
        INJURED,
        PANICKING,
    ];
}

// ---------------------------------------------------------------------------
// Core enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RosterStatus {
    Available,
    Assigned,
    Dead,
    Missing,
}

impl RosterStatus {
    /// Only crew at base or on a mission have their health simulated.
    pub fn is_trackable(self) -> bool {
        matches!(self, Self::Available | Self::Assigned)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Situation {
    PreLaunch,
    Landed,
    Splashed,
    Flying,
    SubOrbital,
    Orbiting,
    Escaping,
    Docked,
}

impl Situation {
    pub fn is_weightless(self) -> bool {
        matches!(
            self,
            Self::SubOrbital | Self::Orbiting | Self::Escaping | Self::Docked
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::PreLaunch => "prelaunch",
            Self::Landed => "landed",
            Self::Splashed => "splashed down",
            Self::Flying => "flying",
            Self::SubOrbital => "suborbital",
            Self::Orbiting => "orbiting",
            Self::Escaping => "escaping",
            Self::Docked => "docked",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventLevel {
    Normal,
    Debug,
}

/// Every independent cause of HP change. Closed set; [`FactorId::from_name`]
/// is the name registry used by content and saves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FactorId {
    Assigned,
    Crowding,
    Isolation,
    Microgravity,
    Eva,
    Confinement,
    Connectivity,
    AtHome,
    AtBase,
    Stress,
    Conditions,
}

/// Probabilistic events checked once per event period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HealthEventKind {
    Accident,
    PanicAttack,
    CalmDown,
    GetInfected,
    GetSick,
    Cure,
    LoseImmunity,
}

// ---------------------------------------------------------------------------
// Host-provided snapshot types
// ---------------------------------------------------------------------------

/// Situational facts about one crew member, supplied by the host every tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewContext {
    pub status: RosterStatus,
    #[serde(default)]
    pub vessel: Option<VesselId>,
    #[serde(default)]
    pub situation: Option<Situation>,
    #[serde(default)]
    pub body: Option<BodyId>,
    #[serde(default)]
    pub altitude_m: f64,
    #[serde(default)]
    pub star_distance_m: f64,
    #[serde(default)]
    pub on_eva: bool,
    #[serde(default)]
    pub mission_days: f64,
    pub gender: Gender,
    pub trait_name: String,
    /// Normalized to [0, 1].
    #[serde(default)]
    pub courage: f64,
    /// Normalized to [0, 1].
    #[serde(default)]
    pub stupidity: f64,
    #[serde(default)]
    pub level: u32,
    /// Has a link back home.
    #[serde(default)]
    pub connected: bool,
}

impl CrewContext {
    pub fn in_vessel(&self) -> bool {
        self.vessel.is_some() && !self.on_eva
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartMultiplier {
    /// `None` applies to every factor.
    #[serde(default)]
    pub factor: Option<FactorId>,
    pub multiplier: f64,
    /// Number of crew the multiplier covers. Zero means unconstrained.
    #[serde(default)]
    pub crew_cap: u32,
}

/// What one part of a vessel contributes to the health of its crew.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PartContribution {
    pub part_type: PartTypeId,
    pub crew_capacity: u32,
    /// Index of the parent part within the vessel's part list.
    pub parent: Option<usize>,
    pub shielding: f64,
    /// Shielding from resources stowed inside the part (water, regolith).
    pub stowed_shielding: f64,
    pub radioactivity: f64,
    /// Inactive parts still shield and irradiate but grant no bonuses.
    pub active: bool,
    pub hp_change_per_day: f64,
    pub space: f64,
    pub recuperation: f64,
    pub decay: f64,
    pub multipliers: Vec<PartMultiplier>,
    /// Training complexity. Zero means the part needs no training.
    pub complexity: f64,
}

impl Default for PartContribution {
    fn default() -> Self {
        Self {
            part_type: PartTypeId::default(),
            crew_capacity: 0,
            parent: None,
            shielding: 0.0,
            stowed_shielding: 0.0,
            radioactivity: 0.0,
            active: true,
            hp_change_per_day: 0.0,
            space: 0.0,
            recuperation: 0.0,
            decay: 0.0,
            multipliers: Vec::new(),
            complexity: 0.0,
        }
    }
}

impl PartContribution {
    pub fn is_trainable(&self) -> bool {
        self.complexity > 0.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VesselSnapshot {
    pub id: VesselId,
    #[serde(default)]
    pub crew: Vec<CrewId>,
    /// Actively simulated by the host (not on rails).
    #[serde(default)]
    pub loaded: bool,
    #[serde(default)]
    pub parts: Vec<PartContribution>,
}

impl VesselSnapshot {
    pub fn crew_count(&self) -> usize {
        self.crew.len()
    }

    /// Trainable part types with their complexity and instance count,
    /// sorted by part type for determinism.
    pub fn trainable_parts(&self) -> Vec<(PartTypeId, f64, u32)> {
        let mut parts: Vec<(PartTypeId, f64, u32)> = Vec::new();
        for part in self.parts.iter().filter(|p| p.is_trainable()) {
            if let Some(entry) = parts.iter_mut().find(|(id, _, _)| *id == part.part_type) {
                entry.2 += 1;
            } else {
                parts.push((part.part_type.clone(), part.complexity, 1));
            }
        }
        parts.sort_by(|a, b| a.0.cmp(&b.0));
        parts
    }
}

/// Everything the engine needs to know about the host world for one tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub crew: HashMap<CrewId, CrewContext>,
    #[serde(default)]
    pub vessels: HashMap<VesselId, VesselSnapshot>,
    /// Upgrade level of the training facility at base.
    #[serde(default)]
    pub facility_level: usize,
}

impl WorldSnapshot {
    pub fn vessel_of(&self, context: &CrewContext) -> Option<&VesselSnapshot> {
        context.vessel.as_ref().and_then(|id| self.vessels.get(id))
    }
}

// ---------------------------------------------------------------------------
// State types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthState {
    pub meta: MetaState,
    pub records: HashMap<CrewId, CrewHealthRecord>,
    pub storms: Vec<RadStorm>,
    pub counters: Counters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaState {
    /// Simulated days since the start of the save.
    pub day: f64,
    /// Bumped every tick; cached values computed for an older generation are stale.
    pub generation: u64,
    pub seed: u64,
    pub schema_version: u32,
    pub content_version: String,
    pub next_event_day: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Counters {
    pub next_event_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StormTarget {
    Body(BodyId),
    Vessel(VesselId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadStorm {
    pub id: StormId,
    pub target: StormTarget,
    /// Dose delivered at the home star distance with no shielding.
    pub magnitude: f64,
    pub arrival_day: f64,
    pub star_distance_m: f64,
}

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: EventId,
    pub day: f64,
    pub event: Event,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    ConditionAdded {
        crew_id: CrewId,
        condition: ConditionId,
    },
    ConditionRemoved {
        crew_id: CrewId,
        condition: ConditionId,
    },
    /// The host should swap the crew member's role for the neutral one.
    Incapacitated {
        crew_id: CrewId,
        original_trait: String,
    },
    /// The host should give the crew member their original role back.
    Restored {
        crew_id: CrewId,
        original_trait: String,
    },
    CrewDied {
        crew_id: CrewId,
    },
    HealthEventFired {
        crew_id: CrewId,
        kind: HealthEventKind,
        message: String,
    },
    QuirkAwarded {
        crew_id: CrewId,
        quirk: QuirkId,
        level: u32,
    },
    TrainingComplete {
        crew_id: CrewId,
    },
    DecontaminationComplete {
        crew_id: CrewId,
    },
    RadStormIncoming {
        storm_id: StormId,
        target: StormTarget,
        magnitude: f64,
        arrival_day: f64,
    },
    RadStormHit {
        storm_id: StormId,
        crew_id: CrewId,
        dose: f64,
    },
    /// Only emitted at `EventLevel::Debug`.
    HazardRoll {
        crew_id: CrewId,
        condition: ConditionId,
        p: f64,
        rolled: f64,
    },
}

// ---------------------------------------------------------------------------
// Content types
// ---------------------------------------------------------------------------

/// Immutable catalogs and tuning, built once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthContent {
    pub content_version: String,
    pub constants: Constants,
    #[serde(default)]
    pub settings: HealthSettings,
    pub factors: Vec<FactorDef>,
    pub conditions: Vec<ConditionDef>,
    pub quirks: Vec<QuirkDef>,
    pub bodies: Vec<BodyDef>,
    #[serde(default)]
    pub storm_types: Vec<RadStormTypeDef>,
    #[serde(default)]
    pub location_effects: Vec<ConditionalEffect>,
}

impl HealthContent {
    pub fn condition(&self, id: &ConditionId) -> Option<&ConditionDef> {
        let found = self.conditions.iter().find(|c| c.id == *id);
        if found.is_none() {
            tracing::warn!(condition = %id, "unknown condition");
        }
        found
    }

    pub fn quirk(&self, id: &QuirkId) -> Option<&QuirkDef> {
        let found = self.quirks.iter().find(|q| q.id == *id);
        if found.is_none() {
            tracing::warn!(quirk = %id, "unknown quirk");
        }
        found
    }

    pub fn body(&self, id: &BodyId) -> Option<&BodyDef> {
        let found = self.bodies.iter().find(|b| b.id == *id);
        if found.is_none() {
            tracing::warn!(body = %id, "unknown body");
        }
        found
    }

    /// Base HP change per day for a factor. Missing factors contribute nothing.
    pub fn factor_rate(&self, factor: FactorId) -> f64 {
        self.factors
            .iter()
            .find(|f| f.factor == factor)
            .map_or(0.0, |f| f.base_change_per_day)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorDef {
    pub factor: FactorId,
    pub base_change_per_day: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionDef {
    pub id: ConditionId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub incapacitated: bool,
    #[serde(default)]
    pub stackable: bool,
    /// Immediate HP change when the condition is acquired.
    #[serde(default)]
    pub hp_on_add: f64,
    /// Immediate HP change when the condition is removed.
    #[serde(default)]
    pub hp_on_remove: f64,
    /// Feeds the Conditions factor while active.
    #[serde(default)]
    pub hp_change_per_day: f64,
    #[serde(default)]
    pub effects: Vec<ConditionalEffect>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuirkDef {
    pub id: QuirkId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub min_level: u32,
    #[serde(default)]
    pub incompatible_with: Vec<QuirkId>,
    #[serde(default = "default_one")]
    pub courage_weight: f64,
    #[serde(default = "default_one")]
    pub stupidity_weight: f64,
    #[serde(default)]
    pub effects: Vec<ConditionalEffect>,
}

impl QuirkDef {
    pub fn is_incompatible_with(&self, other: &QuirkId) -> bool {
        self.incompatible_with.contains(other)
    }
}

/// A celestial body. The star is the body without a parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BodyDef {
    pub id: BodyId,
    pub name: String,
    #[serde(default)]
    pub parent: Option<BodyId>,
    pub radius_m: f64,
    /// Distance from the parent's center.
    #[serde(default)]
    pub orbit_radius_m: f64,
    /// Exponent applied to the in-space attenuation coefficient.
    #[serde(default)]
    pub magnetosphere: f64,
    /// Boundary between "in space low" and "in space high".
    #[serde(default)]
    pub space_threshold_m: f64,
    /// Zero for airless bodies.
    #[serde(default)]
    pub atmosphere_height_m: f64,
    /// Boundary between dense and thin atmosphere.
    #[serde(default)]
    pub flying_threshold_m: f64,
    /// Radiation emitted by the body itself, per day at the surface.
    #[serde(default)]
    pub natural_radiation: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadStormTypeDef {
    pub name: String,
    pub weight: f64,
    pub magnitude: f64,
    #[serde(default)]
    pub magnitude_sd: f64,
    pub velocity_m_per_day: f64,
    #[serde(default)]
    pub velocity_sd: f64,
}

/// Feature toggles, the equivalent of difficulty settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct HealthSettings {
    pub death_enabled: bool,
    pub radiation_enabled: bool,
    pub training_enabled: bool,
    pub quirks_enabled: bool,
    pub sickness_enabled: bool,
    pub events_enabled: bool,
    pub storms_enabled: bool,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            death_enabled: true,
            radiation_enabled: true,
            training_enabled: true,
            quirks_enabled: true,
            sickness_enabled: true,
            events_enabled: true,
            storms_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constants {
    // Health curve
    pub base_max_hp: f64,
    pub max_hp_per_level: f64,
    /// Fractions of MaxHP.
    pub exhaustion_start: f64,
    pub exhaustion_end: f64,
    /// Width (fraction of MaxHP) above `exhaustion_start` where the hazard applies.
    pub exhaustion_warning_band: f64,
    /// Mean days to exhaustion per unit of margin inside the warning band.
    pub exhaustion_mean_days_per_margin: f64,
    pub neutral_trait: String,
    pub home_body: BodyId,
    pub home_altitude_m: f64,

    // Radiation
    /// Fraction of MaxHP lost per `reference_dose` accumulated.
    pub radiation_max_hp_loss: f64,
    pub reference_dose: f64,
    pub in_space_low_coefficient: f64,
    pub in_space_high_coefficient: f64,
    pub troposphere_coefficient: f64,
    pub stratosphere_coefficient: f64,
    /// Solar radiation per day at `home_star_distance_m`.
    pub solar_radiation: f64,
    pub galactic_radiation: f64,
    pub home_star_distance_m: f64,
    pub shielding_effect: f64,
    pub eva_exposure: f64,
    pub decontamination_rate_per_day: f64,

    // Training
    pub training_per_day: f64,
    /// Training ceiling by facility level.
    pub training_caps: Vec<f64>,
    pub in_flight_training_cap: f64,
    pub stupidity_training_penalty: f64,

    // Event generator
    pub event_period_min_days: f64,
    pub event_period_max_days: f64,
    pub accident_chance: f64,
    pub panic_attack_chance: f64,
    pub calm_down_chance: f64,
    pub base_infection_chance: f64,
    pub infection_chance_per_crewmate: f64,
    pub incubation_chance: f64,
    pub cure_chance: f64,
    pub immunity_loss_chance: f64,

    // Quirks
    pub quirk_chance_per_level: f64,
    pub max_quirks: usize,

    // Radiation storms
    pub storm_chance_per_period: f64,
    pub solar_cycle_days: f64,
}

fn default_true() -> bool {
    true
}

fn default_one() -> f64 {
    1.0
}
