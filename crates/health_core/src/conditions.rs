//! Adding and removing conditions, and the incapacitation they drive.

use crate::record::CrewHealthRecord;
use crate::{
    ConditionId, CrewContext, CrewId, Event, EventEnvelope, EventLevel, EventSink, HealthContent,
    HealthState, WorldSnapshot,
};

/// Whether `record` may change. Dead and untracked crew are left alone.
fn accepts_changes(record: &CrewHealthRecord, context: &CrewContext, operation: &str) -> bool {
    if record.dead {
        tracing::debug!(crew = %record.id, operation, "crew member is dead, ignoring");
        return false;
    }
    if !context.status.is_trackable() {
        tracing::debug!(
            crew = %record.id,
            operation,
            status = ?context.status,
            "crew not tracked, ignoring"
        );
        return false;
    }
    true
}

/// Give `crew_id` a condition. Non-stackable conditions already held, unknown
/// conditions, dead and untracked crew are no-ops. Returns true when added.
pub fn add_condition(
    state: &mut HealthState,
    world: &WorldSnapshot,
    content: &HealthContent,
    crew_id: &CrewId,
    condition: &ConditionId,
    events: &mut Vec<EventEnvelope>,
) -> bool {
    let Some(context) = world.crew.get(crew_id) else {
        tracing::warn!(crew = %crew_id, "add_condition: crew not in world");
        return false;
    };
    let Some(record) = state.records.get_mut(crew_id) else {
        tracing::warn!(crew = %crew_id, "add_condition: no health record");
        return false;
    };
    if !accepts_changes(record, context, "add_condition") {
        return false;
    }
    let mut sink = EventSink {
        counters: &mut state.counters,
        day: state.meta.day,
        level: EventLevel::Normal,
        events,
    };
    add_to_record(record, content, condition, &context.trait_name, &mut sink)
}

/// Remove one instance of a condition. Dead and untracked crew are no-ops.
/// Returns true when one was removed.
pub fn remove_condition(
    state: &mut HealthState,
    world: &WorldSnapshot,
    content: &HealthContent,
    crew_id: &CrewId,
    condition: &ConditionId,
    events: &mut Vec<EventEnvelope>,
) -> bool {
    let Some(context) = world.crew.get(crew_id) else {
        tracing::warn!(crew = %crew_id, "remove_condition: crew not in world");
        return false;
    };
    let Some(record) = state.records.get_mut(crew_id) else {
        tracing::warn!(crew = %crew_id, "remove_condition: no health record");
        return false;
    };
    if !accepts_changes(record, context, "remove_condition") {
        return false;
    }
    let mut sink = EventSink {
        counters: &mut state.counters,
        day: state.meta.day,
        level: EventLevel::Normal,
        events,
    };
    remove_from_record(record, content, condition, &mut sink)
}

/// Remove every instance of a condition. Returns how many were removed.
pub fn remove_condition_all(
    state: &mut HealthState,
    world: &WorldSnapshot,
    content: &HealthContent,
    crew_id: &CrewId,
    condition: &ConditionId,
    events: &mut Vec<EventEnvelope>,
) -> usize {
    let mut removed = 0;
    while remove_condition(state, world, content, crew_id, condition, events) {
        removed += 1;
    }
    removed
}

pub(crate) fn add_to_record(
    record: &mut CrewHealthRecord,
    content: &HealthContent,
    condition: &ConditionId,
    current_trait: &str,
    sink: &mut EventSink<'_>,
) -> bool {
    let Some(def) = content.condition(condition) else {
        return false;
    };
    if !def.stackable && record.conditions.contains(condition) {
        tracing::debug!(crew = %record.id, condition = %condition, "condition already held");
        return false;
    }
    record.conditions.push(condition.clone());
    record.change_hp(def.hp_on_add);
    record.invalidate();
    tracing::debug!(crew = %record.id, condition = %condition, "condition added");
    if def.visible {
        sink.push(Event::ConditionAdded {
            crew_id: record.id.clone(),
            condition: condition.clone(),
        });
    }
    if def.incapacitated {
        incapacitate(record, current_trait, sink);
    }
    true
}

pub(crate) fn remove_from_record(
    record: &mut CrewHealthRecord,
    content: &HealthContent,
    condition: &ConditionId,
    sink: &mut EventSink<'_>,
) -> bool {
    let Some(index) = record.conditions.iter().position(|c| c == condition) else {
        tracing::debug!(crew = %record.id, condition = %condition, "condition not held");
        return false;
    };
    record.conditions.remove(index);
    record.invalidate();
    tracing::debug!(crew = %record.id, condition = %condition, "condition removed");
    if let Some(def) = content.condition(condition) {
        record.change_hp(def.hp_on_remove);
        if def.visible {
            sink.push(Event::ConditionRemoved {
                crew_id: record.id.clone(),
                condition: condition.clone(),
            });
        }
    }
    if !is_incapacitated_by_conditions(record, content) {
        restore(record, sink);
    }
    true
}

fn is_incapacitated_by_conditions(record: &CrewHealthRecord, content: &HealthContent) -> bool {
    record
        .conditions
        .iter()
        .filter_map(|c| content.condition(c))
        .any(|def| def.incapacitated)
}

/// Swap the crew member's role for the neutral one, remembering the original.
pub(crate) fn incapacitate(
    record: &mut CrewHealthRecord,
    current_trait: &str,
    sink: &mut EventSink<'_>,
) {
    if record.original_trait.is_some() {
        tracing::debug!(crew = %record.id, "already incapacitated");
        return;
    }
    record.original_trait = Some(current_trait.to_string());
    tracing::info!(crew = %record.id, original_trait = current_trait, "crew incapacitated");
    sink.push(Event::Incapacitated {
        crew_id: record.id.clone(),
        original_trait: current_trait.to_string(),
    });
}

/// Give the original role back.
pub(crate) fn restore(record: &mut CrewHealthRecord, sink: &mut EventSink<'_>) {
    let Some(original_trait) = record.original_trait.take() else {
        return;
    };
    tracing::info!(crew = %record.id, original_trait = %original_trait, "crew restored");
    sink.push(Event::Restored {
        crew_id: record.id.clone(),
        original_trait,
    });
}
