//! Part training: per part type progress toward a cap, feeding the Stress factor.
//!
//! At the facility every outstanding part shares the daily training budget in
//! proportion to its complexity, and the step is split at each part
//! completion so the remaining parts speed up. In flight the rate also falls
//! linearly with the level, which is solved in closed form.

use serde::{Deserialize, Serialize};

use crate::record::CrewHealthRecord;
use crate::{Constants, PartTypeId};

/// Levels within this distance of the cap count as complete.
const COMPLETE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingProgress {
    pub part_type: PartTypeId,
    pub complexity: f64,
    pub count: u32,
    /// In `[0, cap]`.
    pub level: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrainingMode {
    /// Dedicated training at base; parts stop at the facility cap.
    Facility { cap: f64 },
    /// Learning on the job; parts approach the cap asymptotically.
    InFlight { cap: f64 },
}

impl TrainingMode {
    pub fn cap(self) -> f64 {
        match self {
            Self::Facility { cap } | Self::InFlight { cap } => cap,
        }
    }

    pub fn facility(level: usize, constants: &Constants) -> Self {
        let cap = constants
            .training_caps
            .get(level)
            .or_else(|| constants.training_caps.last())
            .copied()
            .unwrap_or(1.0);
        Self::Facility { cap }
    }

    pub fn in_flight(constants: &Constants) -> Self {
        Self::InFlight {
            cap: constants.in_flight_training_cap,
        }
    }
}

/// Training speed multiplier: `1 / (1 + penalty * stupidity)`, never zero.
pub fn training_speed(stupidity: f64, constants: &Constants) -> f64 {
    1.0 / (1.0 + constants.stupidity_training_penalty.max(0.0) * stupidity.clamp(0.0, 1.0))
}

/// Trained fraction over `parts`, weighted by complexity and instance count.
/// Parts the crew member never trained count as zero. No trainable parts
/// means fully trained.
pub fn training_level(record: &CrewHealthRecord, parts: &[(PartTypeId, f64, u32)]) -> f64 {
    let mut weighted = 0.0;
    let mut total = 0.0;
    for (part_type, complexity, count) in parts {
        let weight = complexity * f64::from(*count);
        total += weight;
        if let Some(progress) = progress_for(record, part_type) {
            weighted += weight * progress.level;
        }
    }
    if total <= 0.0 {
        1.0
    } else {
        weighted / total
    }
}

fn progress_for<'a>(
    record: &'a CrewHealthRecord,
    part_type: &PartTypeId,
) -> Option<&'a TrainingProgress> {
    record.training.iter().find(|p| p.part_type == *part_type)
}

/// Make sure `record` has a progress entry for each of `parts`, refreshing
/// complexity and count from the current design.
pub(crate) fn ensure_progress(record: &mut CrewHealthRecord, parts: &[(PartTypeId, f64, u32)]) {
    for (part_type, complexity, count) in parts {
        if let Some(progress) = record
            .training
            .iter_mut()
            .find(|p| p.part_type == *part_type)
        {
            progress.complexity = *complexity;
            progress.count = *count;
        } else {
            record.training.push(TrainingProgress {
                part_type: part_type.clone(),
                complexity: *complexity,
                count: *count,
                level: 0.0,
            });
        }
    }
    record.training.sort_by(|a, b| a.part_type.cmp(&b.part_type));
}

/// True when every listed part has reached `cap`.
pub(crate) fn is_complete(record: &CrewHealthRecord, parts: &[PartTypeId], cap: f64) -> bool {
    parts.iter().all(|part_type| {
        progress_for(record, part_type).is_some_and(|p| p.level >= cap - COMPLETE_EPSILON)
    })
}

/// Advance training on `parts` by `dt` days. Returns true when every listed
/// part is at the cap afterwards.
pub(crate) fn advance(
    record: &mut CrewHealthRecord,
    parts: &[PartTypeId],
    mode: TrainingMode,
    speed: f64,
    constants: &Constants,
    dt: f64,
) -> bool {
    let rate = constants.training_per_day * speed;
    if dt > 0.0 && rate > 0.0 {
        match mode {
            TrainingMode::Facility { cap } => advance_facility(record, parts, cap, rate, dt),
            TrainingMode::InFlight { cap } => advance_in_flight(record, parts, cap, rate, dt),
        }
    }
    is_complete(record, parts, mode.cap())
}

fn outstanding<'a>(
    training: &'a mut [TrainingProgress],
    parts: &'a [PartTypeId],
    cap: f64,
) -> impl Iterator<Item = &'a mut TrainingProgress> {
    training
        .iter_mut()
        .filter(move |p| parts.contains(&p.part_type) && p.level < cap - COMPLETE_EPSILON)
}

fn advance_facility(
    record: &mut CrewHealthRecord,
    parts: &[PartTypeId],
    cap: f64,
    rate: f64,
    dt: f64,
) {
    let mut remaining = dt;
    while remaining > 0.0 {
        let total_complexity: f64 = outstanding(&mut record.training, parts, cap)
            .map(|p| p.complexity)
            .sum();
        if total_complexity <= 0.0 {
            break;
        }
        // Each part gains rate * t / total_complexity per day; split at the
        // first completion.
        let gain_per_day = rate / total_complexity;
        let until_first_done = outstanding(&mut record.training, parts, cap)
            .map(|p| (cap - p.level) / gain_per_day)
            .fold(f64::INFINITY, f64::min);
        let step = remaining.min(until_first_done);
        for progress in outstanding(&mut record.training, parts, cap) {
            progress.level = (progress.level + gain_per_day * step).min(cap);
            if cap - progress.level <= COMPLETE_EPSILON {
                progress.level = cap;
            }
        }
        remaining -= step;
    }
}

fn advance_in_flight(
    record: &mut CrewHealthRecord,
    parts: &[PartTypeId],
    cap: f64,
    rate: f64,
    dt: f64,
) {
    if cap <= 0.0 {
        return;
    }
    let total_complexity: f64 = outstanding(&mut record.training, parts, cap)
        .map(|p| p.complexity)
        .sum();
    if total_complexity <= 0.0 {
        return;
    }
    // dL/dt = k (cap - L) / cap  =>  L = cap - (cap - L0) exp(-k t / cap)
    let k = rate / total_complexity;
    let decay = (-k * dt / cap).exp();
    for progress in outstanding(&mut record.training, parts, cap) {
        progress.level = cap - (cap - progress.level) * decay;
    }
}
