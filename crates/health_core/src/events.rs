//! Random health events, tested once per event period.

use rand::Rng;

use crate::conditions::{add_to_record, remove_from_record};
use crate::record::CrewHealthRecord;
use crate::{
    condition_ids, ConditionId, CrewContext, CrewId, Event, EventSink, HealthContent,
    HealthEventKind, HealthState, RosterStatus, WorldSnapshot,
};

impl HealthEventKind {
    pub const ALL: [HealthEventKind; 7] = [
        Self::Accident,
        Self::PanicAttack,
        Self::CalmDown,
        Self::GetInfected,
        Self::GetSick,
        Self::Cure,
        Self::LoseImmunity,
    ];

    fn is_sickness(self) -> bool {
        matches!(
            self,
            Self::GetInfected | Self::GetSick | Self::Cure | Self::LoseImmunity
        )
    }
}

/// Chance that `kind` fires for this crew member this period. Zero when the
/// event does not apply. `contagious_crewmates` counts infected or sick crew
/// sharing the vessel.
pub fn event_chance(
    kind: HealthEventKind,
    record: &CrewHealthRecord,
    context: &CrewContext,
    contagious_crewmates: usize,
    content: &HealthContent,
) -> f64 {
    let settings = &content.settings;
    let constants = &content.constants;
    if !settings.events_enabled || (kind.is_sickness() && !settings.sickness_enabled) {
        return 0.0;
    }
    let assigned = context.status == RosterStatus::Assigned;
    let chance = match kind {
        HealthEventKind::Accident if assigned => {
            constants.accident_chance * (0.5 + context.stupidity.clamp(0.0, 1.0))
        }
        HealthEventKind::PanicAttack
            if assigned && !record.has_condition(condition_ids::PANICKING) =>
        {
            constants.panic_attack_chance * (1.0 - context.courage.clamp(0.0, 1.0))
        }
        HealthEventKind::CalmDown if record.has_condition(condition_ids::PANICKING) => {
            constants.calm_down_chance
        }
        HealthEventKind::GetInfected
            if !record.has_condition(condition_ids::INFECTED)
                && !record.has_condition(condition_ids::SICK)
                && !record.has_condition(condition_ids::IMMUNE) =>
        {
            let exposure = i32::try_from(contagious_crewmates).unwrap_or(i32::MAX);
            1.0 - (1.0 - constants.base_infection_chance)
                * (1.0 - constants.infection_chance_per_crewmate).powi(exposure)
        }
        HealthEventKind::GetSick if record.has_condition(condition_ids::INFECTED) => {
            constants.incubation_chance
        }
        HealthEventKind::Cure if record.has_condition(condition_ids::SICK) => {
            constants.cure_chance
        }
        HealthEventKind::LoseImmunity if record.has_condition(condition_ids::IMMUNE) => {
            constants.immunity_loss_chance
        }
        _ => 0.0,
    };
    chance.clamp(0.0, 1.0)
}

fn condition(id: &str) -> ConditionId {
    ConditionId(id.to_string())
}

/// Apply a fired event to the record.
fn fire(
    kind: HealthEventKind,
    record: &mut CrewHealthRecord,
    context: &CrewContext,
    content: &HealthContent,
    sink: &mut EventSink<'_>,
) {
    let current_trait = context.trait_name.as_str();
    let message = match kind {
        HealthEventKind::Accident => {
            add_to_record(record, content, &condition(condition_ids::INJURED), current_trait, sink);
            "had an accident"
        }
        HealthEventKind::PanicAttack => {
            add_to_record(record, content, &condition(condition_ids::PANICKING), current_trait, sink);
            "is having a panic attack"
        }
        HealthEventKind::CalmDown => {
            remove_from_record(record, content, &condition(condition_ids::PANICKING), sink);
            "has calmed down"
        }
        HealthEventKind::GetInfected => {
            add_to_record(record, content, &condition(condition_ids::INFECTED), current_trait, sink);
            "was infected"
        }
        HealthEventKind::GetSick => {
            remove_from_record(record, content, &condition(condition_ids::INFECTED), sink);
            add_to_record(record, content, &condition(condition_ids::SICK), current_trait, sink);
            "fell sick"
        }
        HealthEventKind::Cure => {
            remove_from_record(record, content, &condition(condition_ids::SICK), sink);
            add_to_record(record, content, &condition(condition_ids::IMMUNE), current_trait, sink);
            "has recovered"
        }
        HealthEventKind::LoseImmunity => {
            remove_from_record(record, content, &condition(condition_ids::IMMUNE), sink);
            "is no longer immune"
        }
    };
    tracing::debug!(crew = %record.id, kind = ?kind, "health event fired");
    // Infection and immunity are hidden from the player.
    if !matches!(
        kind,
        HealthEventKind::GetInfected | HealthEventKind::LoseImmunity
    ) {
        sink.push(Event::HealthEventFired {
            crew_id: record.id.clone(),
            kind,
            message: format!("{} {message}", record.id),
        });
    }
}

fn is_contagious(record: &CrewHealthRecord) -> bool {
    record.has_condition(condition_ids::INFECTED) || record.has_condition(condition_ids::SICK)
}

/// Contagious crewmates per crew member, taken before any event fires.
fn contagion(state: &HealthState, world: &WorldSnapshot, crew_id: &CrewId) -> usize {
    let Some(context) = world.crew.get(crew_id) else {
        return 0;
    };
    if !context.in_vessel() {
        return 0;
    }
    world.vessel_of(context).map_or(0, |vessel| {
        vessel
            .crew
            .iter()
            .filter(|mate| *mate != crew_id)
            .filter(|mate| world.crew.get(*mate).is_some_and(CrewContext::in_vessel))
            .filter_map(|mate| state.records.get(mate))
            .filter(|r| !r.dead && is_contagious(r))
            .count()
    })
}

/// Test every trackable crew member against every event once.
pub(crate) fn run_event_generator(
    state: &mut HealthState,
    world: &WorldSnapshot,
    content: &HealthContent,
    rng: &mut impl Rng,
    sink_level: crate::EventLevel,
    events: &mut Vec<crate::EventEnvelope>,
) {
    let mut crew_ids: Vec<CrewId> = state.records.keys().cloned().collect();
    crew_ids.sort();
    let exposure: Vec<usize> = crew_ids
        .iter()
        .map(|id| contagion(state, world, id))
        .collect();

    let mut sink = EventSink {
        counters: &mut state.counters,
        day: state.meta.day,
        level: sink_level,
        events,
    };
    for (crew_id, contagious) in crew_ids.iter().zip(exposure) {
        let Some(context) = world.crew.get(crew_id) else {
            continue;
        };
        let Some(record) = state.records.get_mut(crew_id) else {
            continue;
        };
        if record.dead || !context.status.is_trackable() {
            continue;
        }
        for kind in HealthEventKind::ALL {
            let chance = event_chance(kind, record, context, contagious, content);
            if chance <= 0.0 {
                continue;
            }
            if rng.gen::<f64>() < chance {
                fire(kind, record, context, content, &mut sink);
            }
        }
    }
}
