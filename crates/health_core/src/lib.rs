//! `health_core`: deterministic crew health simulation.
//!
//! No IO, no network. All randomness via the passed-in Rng. The host feeds a
//! [`WorldSnapshot`] each tick and receives [`EventEnvelope`]s back.

mod conditions;
mod effect;
mod engine;
mod events;
mod exposure;
mod factors;
pub mod hazard;
mod id;
mod logic;
pub mod metrics;
mod multiplier;
pub mod persistence;
mod quirks;
pub mod radiation;
mod record;
mod storms;
#[cfg(any(test, feature = "test-support"))]
pub mod test_fixtures;
mod training;
mod types;

pub use conditions::{add_condition, remove_condition, remove_condition_all};
pub use effect::{ConditionalEffect, Effect};
pub use engine::{
    crew_report, estimate_for_design, process_events, start_decontamination, start_training,
    tick, CrewReport, DesignEstimate, VesselCache,
};
pub use events::event_chance;
pub use exposure::{
    part_exposures, shelter_exposure, shielding_exposure, vessel_effect, PartExposure,
};
pub use factors::{evaluate_factors, factor_net_rate, FactorInput};
pub use id::generate_uuid;
pub use logic::{CrewmateView, Logic, LogicOperator, LogicSubject};
pub use metrics::{compute_metrics, MetricsSnapshot};
pub use multiplier::{FactorMultiplier, FactorMultiplierList};
pub use quirks::{quirk_weight, select_random_quirk};
pub use record::{CrewHealthRecord, FactorResults};
pub use storms::{sample_storm, solar_cycle_phase};
pub use training::{training_level, training_speed, TrainingMode, TrainingProgress};
pub use types::*;

pub(crate) fn emit(counters: &mut Counters, day: f64, event: Event) -> EventEnvelope {
    let id = EventId(format!("evt_{:06}", counters.next_event_id));
    counters.next_event_id += 1;
    EventEnvelope { id, day, event }
}

/// Where one engine pass sends its events. Borrows the counters separately
/// from the records so both can be mutated together.
pub(crate) struct EventSink<'a> {
    pub counters: &'a mut Counters,
    pub day: f64,
    pub level: EventLevel,
    pub events: &'a mut Vec<EventEnvelope>,
}

impl EventSink<'_> {
    pub fn push(&mut self, event: Event) {
        self.events.push(emit(self.counters, self.day, event));
    }
}

#[cfg(test)]
mod tests;
