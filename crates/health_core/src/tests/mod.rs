use super::*;
use crate::test_fixtures::{
    available_context, base_content, base_state, crewed_vessel, make_rng, single_crew_world,
};
use std::collections::HashMap;

mod reports;
mod roster;

// --- Shared test helpers ------------------------------------------------

fn crew(name: &str) -> CrewId {
    CrewId(name.to_string())
}

/// One engineer at base, no vessels.
fn base_world(name: &str) -> WorldSnapshot {
    WorldSnapshot {
        crew: HashMap::from([(crew(name), available_context())]),
        vessels: HashMap::new(),
        facility_level: 0,
    }
}

/// Advance `days` one day at a time, collecting every event.
fn run_days(
    state: &mut HealthState,
    world: &WorldSnapshot,
    content: &HealthContent,
    rng: &mut rand_chacha::ChaCha8Rng,
    days: u32,
) -> Vec<EventEnvelope> {
    let mut cache = VesselCache::new();
    let mut events = Vec::new();
    for _ in 0..days {
        events.extend(tick(state, world, content, &mut cache, rng, 1.0, EventLevel::Normal));
    }
    events
}

fn count_events(events: &[EventEnvelope], predicate: impl Fn(&Event) -> bool) -> usize {
    events.iter().filter(|e| predicate(&e.event)).count()
}
