//! Health factors: one strategy per independent cause of HP change.

use crate::record::{CrewHealthRecord, FactorResults};
use crate::{CrewContext, Effect, FactorId, HealthContent, RosterStatus};

/// Crowding denominator floor, so a vessel with no living space is harsh but finite.
const MIN_SPACE: f64 = 0.1;

/// Everything a factor may look at.
#[derive(Debug, Clone, Copy)]
pub struct FactorInput<'a> {
    pub record: &'a CrewHealthRecord,
    pub context: &'a CrewContext,
    /// The crew member's aggregated effect.
    pub effect: &'a Effect,
    /// Crew aboard the same vessel, including this one. 1 when not in a vessel.
    pub crew_count: usize,
    /// Trained fraction for the current vessel's parts.
    pub training_level: f64,
    pub content: &'a HealthContent,
}

impl FactorId {
    pub const ALL: [FactorId; 11] = [
        Self::Assigned,
        Self::Crowding,
        Self::Isolation,
        Self::Microgravity,
        Self::Eva,
        Self::Confinement,
        Self::Connectivity,
        Self::AtHome,
        Self::AtBase,
        Self::Stress,
        Self::Conditions,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Assigned => "Assigned",
            Self::Crowding => "Crowding",
            Self::Isolation => "Isolation",
            Self::Microgravity => "Microgravity",
            Self::Eva => "EVA",
            Self::Confinement => "Confinement",
            Self::Connectivity => "Connectivity",
            Self::AtHome => "Home",
            Self::AtBase => "Base",
            Self::Stress => "Stress",
            Self::Conditions => "Conditions",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(name))
    }

    /// Factors that only depend on vessel composition keep their cached value
    /// while the vessel is not actively simulated.
    pub fn is_constant_while_dormant(self) -> bool {
        matches!(
            self,
            Self::Assigned | Self::Crowding | Self::Isolation | Self::Confinement
        )
    }

    /// Raw HP change per day, before multipliers.
    pub fn change_per_day(self, input: &FactorInput<'_>) -> f64 {
        let context = input.context;
        let base = input.content.factor_rate(self);
        let assigned = context.status == RosterStatus::Assigned;
        let applies = match self {
            Self::Assigned => assigned,
            Self::Crowding => {
                return if context.in_vessel() {
                    base * input.crew_count as f64 / input.effect.space.max(MIN_SPACE)
                } else {
                    0.0
                };
            }
            Self::Isolation => context.in_vessel() && input.crew_count <= 1,
            Self::Microgravity => {
                assigned && context.situation.is_some_and(|s| s.is_weightless())
            }
            Self::Eva => assigned && context.on_eva,
            Self::Confinement => context.in_vessel(),
            Self::Connectivity => assigned && context.connected,
            Self::AtHome => assigned && is_at_home(context, input.content),
            Self::AtBase => context.status == RosterStatus::Available,
            Self::Stress => {
                return if context.in_vessel() {
                    let trained = if input.content.settings.training_enabled {
                        input.training_level.clamp(0.0, 1.0)
                    } else {
                        0.0
                    };
                    base * (1.0 - trained)
                } else {
                    0.0
                };
            }
            Self::Conditions => return conditions_change(input.record, input.content),
        };
        if applies {
            base
        } else {
            0.0
        }
    }
}

fn is_at_home(context: &CrewContext, content: &HealthContent) -> bool {
    context.body.as_ref() == Some(&content.constants.home_body)
        && context.altitude_m < content.constants.home_altitude_m
}

fn conditions_change(record: &CrewHealthRecord, content: &HealthContent) -> f64 {
    record
        .conditions
        .iter()
        .filter_map(|id| content.condition(id))
        .map(|def| def.hp_change_per_day)
        .sum()
}

/// Evaluate every factor. When `dormant`, factors that are constant while
/// dormant reuse their value from `previous` if one exists.
pub fn evaluate_factors(
    input: &FactorInput<'_>,
    previous: &FactorResults,
    dormant: bool,
) -> FactorResults {
    FactorId::ALL
        .into_iter()
        .map(|factor| {
            let cached = if dormant && factor.is_constant_while_dormant() {
                previous.get(&factor).copied()
            } else {
                None
            };
            let value = cached.unwrap_or_else(|| factor.change_per_day(input));
            (factor, value)
        })
        .collect()
}

/// Factor-driven HP change per day: each raw value times its resolved multiplier.
pub fn factor_net_rate(results: &FactorResults, effect: &Effect, crew_count: usize) -> f64 {
    results
        .iter()
        .map(|(factor, raw)| raw * effect.multipliers.effective(*factor, crew_count))
        .sum()
}
