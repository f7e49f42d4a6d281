use std::collections::HashMap;

use ahash::AHashMap;
use rand::Rng;

use crate::conditions::{add_to_record, remove_from_record};
use crate::effect::combine_applicable;
use crate::exposure::vessel_effect;
use crate::factors::{evaluate_factors, factor_net_rate, FactorInput};
use crate::hazard::{check_exhaustion, exhaustion_thresholds, roll, ExhaustionCheck};
use crate::logic::{CrewmateView, LogicSubject};
use crate::radiation::{decontaminate, received_rate};
use crate::record::{self, CrewHealthRecord, FactorResults};
use crate::training::{self, TrainingMode};
use crate::{
    condition_ids, ConditionId, Constants, CrewContext, CrewId, Effect, Event, EventEnvelope,
    EventLevel, EventSink, FactorId, HealthContent, HealthState, RadStorm, RosterStatus,
    Situation, VesselId, VesselSnapshot, WorldSnapshot,
};

/// Vessel effects memoized for one tick. Passed into [`tick`] explicitly and
/// cleared whenever a new generation begins.
#[derive(Debug, Default)]
pub struct VesselCache {
    generation: Option<u64>,
    effects: AHashMap<VesselId, Effect>,
}

impl VesselCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_tick(&mut self, generation: u64) {
        if self.generation != Some(generation) {
            self.effects.clear();
            self.generation = Some(generation);
        }
    }

    pub fn effect(&mut self, vessel: &VesselSnapshot, content: &HealthContent) -> &Effect {
        self.effects
            .entry(vessel.id.clone())
            .or_insert_with(|| vessel_effect(vessel, content))
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}

/// Everything derived for one crew member at one moment.
#[derive(Debug, Clone)]
struct Evaluation {
    effect: Effect,
    factors: FactorResults,
    crew_count: usize,
    max_hp: f64,
    /// Factors plus the flat HP change, before recuperation and decay.
    base_rate: f64,
    net_rate: f64,
    radiation: f64,
    training_level: f64,
}

/// Shared read-only inputs for one pass over the roster.
struct Pass<'a> {
    world: &'a WorldSnapshot,
    content: &'a HealthContent,
    views: &'a HashMap<CrewId, CrewmateView>,
    generation: u64,
    dt: f64,
}

fn crewmate_views(state: &HealthState, world: &WorldSnapshot) -> HashMap<CrewId, CrewmateView> {
    world
        .crew
        .iter()
        .map(|(id, context)| {
            let conditions = state
                .records
                .get(id)
                .map(|r| r.conditions.clone())
                .unwrap_or_default();
            let view = CrewmateView {
                gender: context.gender,
                trait_name: context.trait_name.clone(),
                conditions,
            };
            (id.clone(), view)
        })
        .collect()
}

/// HP change per day: the base rate, recuperation toward MaxHP and decay of
/// current HP.
fn net_rate(base_rate: f64, effect: &Effect, hp: f64, max_hp: f64) -> f64 {
    let recuperation = effect.effective_recuperation() / 100.0 * (max_hp - hp).max(0.0);
    let decay = effect.decay / 100.0 * hp;
    base_rate + recuperation - decay
}

/// HP after `dt` days of `dHP/dt = a + r(M - HP) - d HP`, solved exactly so a
/// single long step lands where many short ones would. Linear when there is
/// neither recuperation nor decay. The trajectory is monotone, so clamping
/// the end point to `[0, M]` is enough.
fn hp_after(hp: f64, max_hp: f64, base_rate: f64, effect: &Effect, dt: f64) -> f64 {
    let hp = hp.min(max_hp);
    let r = effect.effective_recuperation() / 100.0;
    let d = effect.decay / 100.0;
    let k = r + d;
    let next = if k.abs() < 1e-12 {
        hp + base_rate * dt
    } else {
        let equilibrium = (base_rate + r * max_hp) / k;
        equilibrium + (hp - equilibrium) * (-k * dt).exp()
    };
    next.min(max_hp).max(0.0)
}

fn aggregate_effect(
    record: &CrewHealthRecord,
    context: &CrewContext,
    vessel: Option<&VesselSnapshot>,
    pass: &Pass<'_>,
    cache: &mut VesselCache,
) -> Effect {
    let content = pass.content;
    let crewmates = vessel
        .map(|v| {
            v.crew
                .iter()
                .filter(|id| **id != record.id)
                .filter_map(|id| pass.views.get(id))
                .collect()
        })
        .unwrap_or_default();
    let subject = LogicSubject { context, crewmates };

    let mut effect = vessel.map_or_else(Effect::default, |v| cache.effect(v, content).clone());
    effect.combine_with(&combine_applicable(&content.location_effects, &subject));
    for quirk in record.quirks.iter().filter_map(|q| content.quirk(q)) {
        effect.combine_with(&combine_applicable(&quirk.effects, &subject));
    }
    for condition in record.conditions.iter().filter_map(|c| content.condition(c)) {
        effect.combine_with(&combine_applicable(&condition.effects, &subject));
    }
    effect
}

/// The vessel a crew member is inside (not on EVA), its head count and the
/// crew member's training level for it.
fn placement<'w>(
    record: &CrewHealthRecord,
    context: &CrewContext,
    world: &'w WorldSnapshot,
) -> (Option<&'w VesselSnapshot>, usize, f64) {
    let vessel = if context.in_vessel() {
        world.vessel_of(context)
    } else {
        None
    };
    let crew_count = vessel.map_or(1, |v| v.crew_count().max(1));
    let parts = vessel.map(VesselSnapshot::trainable_parts).unwrap_or_default();
    (vessel, crew_count, training::training_level(record, &parts))
}

fn evaluate(
    record: &CrewHealthRecord,
    context: &CrewContext,
    pass: &Pass<'_>,
    cache: &mut VesselCache,
    allow_dormant: bool,
) -> Evaluation {
    let (vessel, crew_count, training_level) = placement(record, context, pass.world);
    let effect = aggregate_effect(record, context, vessel, pass, cache);
    let input = FactorInput {
        record,
        context,
        effect: &effect,
        crew_count,
        training_level,
        content: pass.content,
    };
    let dormant = allow_dormant && vessel.is_some_and(|v| !v.loaded);
    let factors = evaluate_factors(&input, &record.factors.value, dormant);
    assemble(record, context, effect, factors, crew_count, training_level, pass.content)
}

fn assemble(
    record: &CrewHealthRecord,
    context: &CrewContext,
    effect: Effect,
    factors: FactorResults,
    crew_count: usize,
    training_level: f64,
    content: &HealthContent,
) -> Evaluation {
    let max_hp = record::max_hp(context.level, record.dose, &effect, &content.constants);
    let base_rate = factor_net_rate(&factors, &effect, crew_count) + effect.hp_change_per_day;
    let net_rate = net_rate(base_rate, &effect, record.hp, max_hp);
    let radiation = received_rate(context, &effect, content);
    Evaluation {
        effect,
        factors,
        crew_count,
        max_hp,
        base_rate,
        net_rate,
        radiation,
        training_level,
    }
}

/// Advance the health simulation by `elapsed_days`.
///
/// Order of operations:
/// 1. Start a new cache generation and sync records with the roster.
/// 2. For every tracked crew member, in id order: refresh effect and
///    factors, accumulate dose, decontaminate, apply the net HP rate, check
///    death, roll exhaustion, progress training.
/// 3. Deliver radiation storms that arrived during the interval.
/// 4. Advance the clock.
///
/// Returns all events produced this tick.
pub fn tick(
    state: &mut HealthState,
    world: &WorldSnapshot,
    content: &HealthContent,
    cache: &mut VesselCache,
    rng: &mut impl Rng,
    elapsed_days: f64,
    event_level: EventLevel,
) -> Vec<EventEnvelope> {
    let mut events = Vec::new();
    let dt = elapsed_days.max(0.0);
    state.meta.generation += 1;
    cache.begin_tick(state.meta.generation);
    sync_roster(state, world, content);

    let views = crewmate_views(state, world);
    let pass = Pass {
        world,
        content,
        views: &views,
        generation: state.meta.generation,
        dt,
    };
    let mut crew_ids: Vec<CrewId> = state.records.keys().cloned().collect();
    crew_ids.sort();

    let mut sink = EventSink {
        counters: &mut state.counters,
        day: state.meta.day,
        level: event_level,
        events: &mut events,
    };
    for crew_id in &crew_ids {
        let (Some(context), Some(record)) = (world.crew.get(crew_id), state.records.get_mut(crew_id))
        else {
            continue;
        };
        update_record(record, context, &pass, cache, rng, &mut sink);
    }

    sink.day += dt;
    deliver_storms(&mut state.storms, &mut state.records, &pass, &mut sink);

    state.meta.day += dt;
    events
}

/// Create records for newly trackable crew, drop records of crew that left
/// the roster.
fn sync_roster(state: &mut HealthState, world: &WorldSnapshot, content: &HealthContent) {
    for (id, context) in &world.crew {
        if context.status.is_trackable() && !state.records.contains_key(id) {
            tracing::debug!(crew = %id, "tracking crew health");
            state.records.insert(
                id.clone(),
                CrewHealthRecord::new(id.clone(), context.level, &content.constants),
            );
        }
    }
    state.records.retain(|id, _| {
        let keep = world.crew.contains_key(id);
        if !keep {
            tracing::debug!(crew = %id, "crew left the roster, dropping health record");
        }
        keep
    });
}

fn update_record(
    record: &mut CrewHealthRecord,
    context: &CrewContext,
    pass: &Pass<'_>,
    cache: &mut VesselCache,
    rng: &mut impl Rng,
    sink: &mut EventSink<'_>,
) {
    if record.dead || !context.status.is_trackable() {
        return;
    }
    let content = pass.content;
    let constants = &content.constants;
    let dt = pass.dt;
    record.on_eva = context.on_eva;

    if record.has_condition(condition_ids::TRAINING) && context.status != RosterStatus::Available {
        tracing::debug!(crew = %record.id, "left base, training interrupted");
        remove_from_record(record, content, &condition(condition_ids::TRAINING), sink);
        record.training_design.clear();
    }

    let evaluation = evaluate(record, context, pass, cache, true);
    record.factors.store(pass.generation, evaluation.factors.clone());
    record.effect.store(pass.generation, evaluation.effect.clone());

    record.last_radiation = evaluation.radiation;
    record.dose += evaluation.radiation * dt;
    update_decontamination(record, context, content, dt, sink);

    let max_hp = record::max_hp(context.level, record.dose, &evaluation.effect, constants);
    record.last_max_hp = Some(max_hp);
    record.hp = hp_after(record.hp, max_hp, evaluation.base_rate, &evaluation.effect, dt);

    if record.hp <= 0.0 && content.settings.death_enabled {
        record.dead = true;
        tracing::warn!(crew = %record.id, "crew member died");
        sink.push(Event::CrewDied {
            crew_id: record.id.clone(),
        });
        return;
    }

    let critical = evaluation.effect.critical_health_multiplier;
    match check_exhaustion(record, max_hp, critical, constants, dt) {
        ExhaustionCheck::Risk(p) => {
            if roll(record, condition_ids::EXHAUSTED, p, rng, sink) {
                add_to_record(
                    record,
                    content,
                    &condition(condition_ids::EXHAUSTED),
                    &context.trait_name,
                    sink,
                );
            }
        }
        ExhaustionCheck::Recover => {
            remove_from_record(record, content, &condition(condition_ids::EXHAUSTED), sink);
        }
        ExhaustionCheck::Nothing => {}
    }

    update_training(record, context, pass, sink);
}

fn condition(id: &str) -> ConditionId {
    ConditionId(id.to_string())
}

fn update_decontamination(
    record: &mut CrewHealthRecord,
    context: &CrewContext,
    content: &HealthContent,
    dt: f64,
    sink: &mut EventSink<'_>,
) {
    if !record.has_condition(condition_ids::DECONTAMINATING) {
        return;
    }
    let eligible =
        content.settings.radiation_enabled && context.status == RosterStatus::Available;
    if !eligible {
        tracing::debug!(crew = %record.id, "decontamination interrupted");
        remove_from_record(record, content, &condition(condition_ids::DECONTAMINATING), sink);
        return;
    }
    if decontaminate(record, &content.constants, dt) {
        remove_from_record(record, content, &condition(condition_ids::DECONTAMINATING), sink);
        tracing::info!(crew = %record.id, "decontamination complete");
        sink.push(Event::DecontaminationComplete {
            crew_id: record.id.clone(),
        });
    }
}

fn update_training(
    record: &mut CrewHealthRecord,
    context: &CrewContext,
    pass: &Pass<'_>,
    sink: &mut EventSink<'_>,
) {
    let content = pass.content;
    if !content.settings.training_enabled {
        return;
    }
    let constants = &content.constants;
    let speed = training::training_speed(context.stupidity, constants);
    if context.status == RosterStatus::Available && record.has_condition(condition_ids::TRAINING) {
        let parts = record.training_design.clone();
        let mode = TrainingMode::facility(pass.world.facility_level, constants);
        if training::advance(record, &parts, mode, speed, constants, pass.dt) {
            remove_from_record(record, content, &condition(condition_ids::TRAINING), sink);
            record.training_design.clear();
            tracing::info!(crew = %record.id, "training complete");
            sink.push(Event::TrainingComplete {
                crew_id: record.id.clone(),
            });
        }
        return;
    }
    if context.status != RosterStatus::Assigned || !context.in_vessel() {
        return;
    }
    let Some(vessel) = pass.world.vessel_of(context) else {
        return;
    };
    let design = vessel.trainable_parts();
    if design.is_empty() {
        return;
    }
    training::ensure_progress(record, &design);
    let parts: Vec<_> = design.into_iter().map(|(part_type, _, _)| part_type).collect();
    training::advance(
        record,
        &parts,
        TrainingMode::in_flight(constants),
        speed,
        constants,
        pass.dt,
    );
}

fn deliver_storms(
    storms: &mut Vec<RadStorm>,
    records: &mut HashMap<CrewId, CrewHealthRecord>,
    pass: &Pass<'_>,
    sink: &mut EventSink<'_>,
) {
    let (arrived, pending): (Vec<RadStorm>, Vec<RadStorm>) = std::mem::take(storms)
        .into_iter()
        .partition(|s| s.arrival_day <= sink.day);
    *storms = pending;
    if arrived.is_empty() {
        return;
    }
    let mut crew_ids: Vec<&CrewId> = records.keys().collect();
    crew_ids.sort();
    let crew_ids: Vec<CrewId> = crew_ids.into_iter().cloned().collect();
    for storm in &arrived {
        tracing::info!(storm = %storm.id, "radiation storm arrived");
        for crew_id in &crew_ids {
            let (Some(context), Some(record)) = (pass.world.crew.get(crew_id), records.get_mut(crew_id))
            else {
                continue;
            };
            if record.dead {
                continue;
            }
            let effect = record.effect.fresh(pass.generation).cloned().unwrap_or_default();
            let dose = crate::storms::storm_dose(storm, context, &effect, pass.content);
            if dose <= 0.0 {
                continue;
            }
            record.dose += dose;
            record.invalidate();
            sink.push(Event::RadStormHit {
                storm_id: storm.id.clone(),
                crew_id: crew_id.clone(),
                dose,
            });
        }
    }
}

/// Run periodic, less frequent processing: quirk awards for levels gained
/// and, once per randomized event period, the event generator and storm
/// generation. Every period that ended since the last call gets its own
/// pass, so a long tick loses no rolls.
pub fn process_events(
    state: &mut HealthState,
    world: &WorldSnapshot,
    content: &HealthContent,
    rng: &mut impl Rng,
) -> Vec<EventEnvelope> {
    let mut events = Vec::new();
    let day = state.meta.day;

    if content.settings.quirks_enabled {
        award_quirks(state, world, content, rng, &mut events);
    }

    let mut next = match state.meta.next_event_day {
        Some(next) => next,
        None => {
            let next = day + event_period(&content.constants, rng);
            state.meta.next_event_day = Some(next);
            next
        }
    };
    let mut passes = 0u32;
    while next <= day {
        crate::events::run_event_generator(state, world, content, rng, EventLevel::Normal, &mut events);
        let mut sink = EventSink {
            counters: &mut state.counters,
            day,
            level: EventLevel::Normal,
            events: &mut events,
        };
        crate::storms::generate_storms(&mut state.storms, world, content, rng, &mut sink);
        passes += 1;
        let period = event_period(&content.constants, rng);
        if period <= 0.0 {
            next = day + period;
            break;
        }
        next += period;
    }
    if passes > 1 {
        tracing::debug!(passes, day, "caught up on missed event periods");
    }
    state.meta.next_event_day = Some(next);
    events
}

fn event_period(constants: &Constants, rng: &mut impl Rng) -> f64 {
    let low = constants.event_period_min_days.max(0.0);
    let high = constants.event_period_max_days.max(low);
    if high > low {
        rng.gen_range(low..high)
    } else {
        low
    }
}

fn award_quirks(
    state: &mut HealthState,
    world: &WorldSnapshot,
    content: &HealthContent,
    rng: &mut impl Rng,
    events: &mut Vec<EventEnvelope>,
) {
    let mut crew_ids: Vec<CrewId> = state.records.keys().cloned().collect();
    crew_ids.sort();
    let mut sink = EventSink {
        counters: &mut state.counters,
        day: state.meta.day,
        level: EventLevel::Normal,
        events,
    };
    for crew_id in &crew_ids {
        let (Some(context), Some(record)) = (world.crew.get(crew_id), state.records.get_mut(crew_id))
        else {
            continue;
        };
        if record.dead || !context.status.is_trackable() {
            continue;
        }
        crate::quirks::award_for_levels(record, context, content, rng, &mut sink);
    }
}

/// Put an available crew member into training for `design`'s parts.
/// Returns true when training is (still) in progress.
pub fn start_training(
    state: &mut HealthState,
    world: &WorldSnapshot,
    content: &HealthContent,
    crew_id: &CrewId,
    design: &VesselSnapshot,
    events: &mut Vec<EventEnvelope>,
) -> bool {
    if !content.settings.training_enabled {
        tracing::debug!(crew = %crew_id, "training disabled");
        return false;
    }
    let Some(context) = world.crew.get(crew_id) else {
        tracing::warn!(crew = %crew_id, "start_training: crew not in world");
        return false;
    };
    let Some(record) = state.records.get_mut(crew_id) else {
        tracing::warn!(crew = %crew_id, "start_training: no health record");
        return false;
    };
    if record.dead || context.status != RosterStatus::Available {
        tracing::debug!(crew = %crew_id, status = ?context.status, "only crew at base can train");
        return false;
    }
    let parts = design.trainable_parts();
    if parts.is_empty() {
        tracing::debug!(crew = %crew_id, vessel = %design.id, "nothing to train");
        return false;
    }
    training::ensure_progress(record, &parts);
    let part_types: Vec<_> = parts.into_iter().map(|(part_type, _, _)| part_type).collect();
    let cap = TrainingMode::facility(world.facility_level, &content.constants).cap();
    if training::is_complete(record, &part_types, cap) {
        tracing::debug!(crew = %crew_id, "already fully trained for this design");
        return false;
    }
    record.training_design = part_types;
    if record.has_condition(condition_ids::TRAINING) {
        return true;
    }
    let mut sink = EventSink {
        counters: &mut state.counters,
        day: state.meta.day,
        level: EventLevel::Normal,
        events,
    };
    add_to_record(
        record,
        content,
        &condition(condition_ids::TRAINING),
        &context.trait_name,
        &mut sink,
    )
}

/// Start decontaminating an available crew member. Returns true when started.
pub fn start_decontamination(
    state: &mut HealthState,
    world: &WorldSnapshot,
    content: &HealthContent,
    crew_id: &CrewId,
    events: &mut Vec<EventEnvelope>,
) -> bool {
    if !content.settings.radiation_enabled {
        return false;
    }
    let Some(context) = world.crew.get(crew_id) else {
        tracing::warn!(crew = %crew_id, "start_decontamination: crew not in world");
        return false;
    };
    let Some(record) = state.records.get_mut(crew_id) else {
        tracing::warn!(crew = %crew_id, "start_decontamination: no health record");
        return false;
    };
    if record.dead
        || context.status != RosterStatus::Available
        || record.dose <= 0.0
        || record.has_condition(condition_ids::DECONTAMINATING)
    {
        tracing::debug!(crew = %crew_id, dose = record.dose, "decontamination not applicable");
        return false;
    }
    let mut sink = EventSink {
        counters: &mut state.counters,
        day: state.meta.day,
        level: EventLevel::Normal,
        events,
    };
    add_to_record(
        record,
        content,
        &condition(condition_ids::DECONTAMINATING),
        &context.trait_name,
        &mut sink,
    )
}

/// Days until HP crosses the next threshold at the current rate: exhaustion
/// or zero when falling, recovery or MaxHP when rising.
fn days_to_next_threshold(
    record: &CrewHealthRecord,
    max_hp: f64,
    net_rate: f64,
    critical_multiplier: f64,
    constants: &Constants,
) -> Option<f64> {
    if net_rate.abs() < f64::EPSILON {
        return None;
    }
    let (start, end) = exhaustion_thresholds(critical_multiplier, constants);
    let target = if net_rate < 0.0 {
        let exhaustion_hp = start * max_hp;
        if record.hp > exhaustion_hp {
            exhaustion_hp
        } else {
            0.0
        }
    } else {
        let recovery_hp = end * max_hp;
        if record.has_condition(condition_ids::EXHAUSTED) && record.hp < recovery_hp {
            recovery_hp
        } else {
            max_hp
        }
    };
    let days = (target - record.hp) / net_rate;
    (days > 0.0).then_some(days)
}

/// Health summary for one crew member.
#[derive(Debug, Clone)]
pub struct CrewReport {
    pub crew_id: CrewId,
    pub hp: f64,
    pub max_hp: f64,
    pub net_rate: f64,
    /// Effective change per day of every non-zero factor.
    pub factors: Vec<(FactorId, f64)>,
    pub days_to_next_threshold: Option<f64>,
    /// Titles of visible conditions, stacks shown as `Title xN`.
    pub conditions: Vec<String>,
    pub quirks: Vec<String>,
    /// Training completion for the current vessel or training design.
    pub training_percent: f64,
    pub dose: f64,
    pub radiation_rate: f64,
    pub dead: bool,
    pub summary: String,
}

fn visible_conditions(record: &CrewHealthRecord, content: &HealthContent) -> Vec<String> {
    let mut seen: Vec<&ConditionId> = Vec::new();
    let mut titles = Vec::new();
    for id in &record.conditions {
        if seen.contains(&id) {
            continue;
        }
        seen.push(id);
        let Some(def) = content.condition(id) else {
            continue;
        };
        if !def.visible {
            continue;
        }
        let count = record.condition_count(&id.0);
        if count > 1 {
            titles.push(format!("{} x{count}", def.title));
        } else {
            titles.push(def.title.clone());
        }
    }
    titles
}

fn training_percent(
    record: &CrewHealthRecord,
    evaluation: &Evaluation,
    context: &CrewContext,
) -> f64 {
    if context.status == RosterStatus::Available && !record.training_design.is_empty() {
        let design: Vec<_> = record
            .training
            .iter()
            .filter(|p| record.training_design.contains(&p.part_type))
            .map(|p| (p.part_type.clone(), p.complexity, p.count))
            .collect();
        return training::training_level(record, &design) * 100.0;
    }
    evaluation.training_level * 100.0
}

fn summary_line(record: &CrewHealthRecord, evaluation: &Evaluation, conditions: &[String]) -> String {
    let id = &record.id;
    if record.dead {
        return format!("{id}: dead");
    }
    let health = format!(
        "{id}: {:.1}/{:.1} HP ({:+.2}/day)",
        record.hp, evaluation.max_hp, evaluation.net_rate
    );
    if conditions.is_empty() {
        health
    } else {
        format!("{health}, {}", conditions.join(", "))
    }
}

/// Report for `crew_id`, reusing values cached this generation and
/// recomputing (and caching) them otherwise.
pub fn crew_report(
    state: &mut HealthState,
    world: &WorldSnapshot,
    content: &HealthContent,
    crew_id: &CrewId,
) -> Option<CrewReport> {
    let Some(context) = world.crew.get(crew_id) else {
        tracing::warn!(crew = %crew_id, "crew_report: crew not in world");
        return None;
    };
    let views = crewmate_views(state, world);
    let generation = state.meta.generation;
    let Some(record) = state.records.get_mut(crew_id) else {
        tracing::warn!(crew = %crew_id, "crew_report: no health record");
        return None;
    };
    let pass = Pass {
        world,
        content,
        views: &views,
        generation,
        dt: 0.0,
    };
    let mut cache = VesselCache::new();
    let cached = match (record.effect.fresh(generation), record.factors.fresh(generation)) {
        (Some(effect), Some(factors)) => Some((effect.clone(), factors.clone())),
        _ => None,
    };
    let evaluation = match cached {
        Some((effect, factors)) => {
            let (_, crew_count, training_level) = placement(record, context, world);
            assemble(record, context, effect, factors, crew_count, training_level, content)
        }
        None => {
            let evaluation = evaluate(record, context, &pass, &mut cache, true);
            record.factors.store(generation, evaluation.factors.clone());
            record.effect.store(generation, evaluation.effect.clone());
            evaluation
        }
    };
    let record = &*record;
    let factors = evaluation
        .factors
        .iter()
        .map(|(factor, raw)| {
            let effective = raw * evaluation.effect.multipliers.effective(*factor, evaluation.crew_count);
            (*factor, effective)
        })
        .filter(|(_, value)| value.abs() > f64::EPSILON)
        .collect();
    let conditions = visible_conditions(record, content);
    let quirks = record
        .quirks
        .iter()
        .filter_map(|q| content.quirk(q))
        .filter(|q| q.visible)
        .map(|q| q.title.clone())
        .collect();
    let days = days_to_next_threshold(
        record,
        evaluation.max_hp,
        evaluation.net_rate,
        evaluation.effect.critical_health_multiplier,
        &content.constants,
    );
    let summary = summary_line(record, &evaluation, &conditions);
    Some(CrewReport {
        crew_id: crew_id.clone(),
        hp: record.hp,
        max_hp: evaluation.max_hp,
        net_rate: evaluation.net_rate,
        factors,
        days_to_next_threshold: days,
        training_percent: training_percent(record, &evaluation, context),
        conditions,
        quirks,
        dose: record.dose,
        radiation_rate: evaluation.radiation,
        dead: record.dead,
        summary,
    })
}

/// How a crew member would fare aboard a vessel design.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignEstimate {
    pub max_hp: f64,
    /// HP change per day at full health.
    pub net_rate: f64,
    pub days_to_exhaustion: Option<f64>,
    pub days_to_zero: Option<f64>,
    pub exposure: f64,
    pub shelter_exposure: f64,
    pub radiation_rate: f64,
}

/// Estimate a mission in orbit of the home body aboard `design`, crewed by
/// `design.crew` (or just `crew_id` when empty). Never mutates state; every
/// factor is recomputed.
pub fn estimate_for_design(
    state: &HealthState,
    world: &WorldSnapshot,
    content: &HealthContent,
    crew_id: &CrewId,
    design: &VesselSnapshot,
) -> Option<DesignEstimate> {
    let Some(base_context) = world.crew.get(crew_id) else {
        tracing::warn!(crew = %crew_id, "estimate_for_design: crew not in world");
        return None;
    };
    let constants = &content.constants;
    let mut vessel = design.clone();
    vessel.loaded = true;
    if vessel.crew.is_empty() {
        vessel.crew.push(crew_id.clone());
    }

    let mut preview = WorldSnapshot {
        facility_level: world.facility_level,
        ..WorldSnapshot::default()
    };
    for member in &vessel.crew {
        let Some(context) = world.crew.get(member).or((member == crew_id).then_some(base_context))
        else {
            continue;
        };
        let mut context = context.clone();
        context.status = RosterStatus::Assigned;
        context.vessel = Some(vessel.id.clone());
        context.situation = Some(Situation::Orbiting);
        context.body = Some(constants.home_body.clone());
        context.altitude_m = constants.home_altitude_m;
        context.star_distance_m = constants.home_star_distance_m;
        context.on_eva = false;
        context.connected = true;
        preview.crew.insert(member.clone(), context);
    }
    preview.vessels.insert(vessel.id.clone(), vessel);
    let context = preview.crew.get(crew_id)?;

    let mut record = state.records.get(crew_id).cloned().unwrap_or_else(|| {
        CrewHealthRecord::new(crew_id.clone(), context.level, constants)
    });
    let views = crewmate_views(state, &preview);
    let pass = Pass {
        world: &preview,
        content,
        views: &views,
        generation: state.meta.generation,
        dt: 0.0,
    };
    let mut cache = VesselCache::new();
    let first = evaluate(&record, context, &pass, &mut cache, false);
    record.hp = first.max_hp;
    let evaluation = evaluate(&record, context, &pass, &mut cache, false);

    let falling = evaluation.net_rate < 0.0;
    let (start, _) = exhaustion_thresholds(evaluation.effect.critical_health_multiplier, constants);
    let days_to_zero = falling.then(|| evaluation.max_hp / -evaluation.net_rate);
    let days_to_exhaustion =
        falling.then(|| evaluation.max_hp * (1.0 - start).max(0.0) / -evaluation.net_rate);
    Some(DesignEstimate {
        max_hp: evaluation.max_hp,
        net_rate: evaluation.net_rate,
        days_to_exhaustion,
        days_to_zero,
        exposure: evaluation.effect.exposure_multiplier,
        shelter_exposure: evaluation
            .effect
            .shelter_exposure
            .unwrap_or(evaluation.effect.exposure_multiplier),
        radiation_rate: evaluation.radiation,
    })
}
