//! Snapshot metrics computed from `HealthState`.
//!
//! A single `compute_metrics(&HealthState, &HealthContent) -> MetricsSnapshot`
//! function samples the roster for time-series analysis. No state mutation,
//! no IO apart from the CSV helpers.

use serde::Serialize;
use std::io::Write;

use crate::record::base_max_hp;
use crate::{condition_ids, HealthContent, HealthState};

/// Current schema version. Bump when fields are added/removed/reordered.
const METRICS_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub day: f64,
    pub metrics_version: u32,

    // Roster
    pub crew_tracked: u32,
    pub crew_dead: u32,

    // Health (living crew only)
    pub avg_hp: f32,
    pub min_hp: f32,
    pub avg_hp_fraction: f32,

    // Conditions
    pub crew_exhausted: u32,
    pub crew_incapacitated: u32,
    pub crew_infected: u32,
    pub crew_sick: u32,
    pub crew_injured: u32,
    pub crew_training: u32,
    pub crew_decontaminating: u32,
    pub quirks_total: u32,

    // Radiation
    pub total_dose: f32,
    pub max_dose: f32,
    pub avg_radiation_per_day: f32,
    pub storms_pending: u32,
}

fn count(flags: impl Iterator<Item = bool>) -> u32 {
    u32::try_from(flags.filter(|f| *f).count()).unwrap_or(u32::MAX)
}

#[allow(clippy::cast_possible_truncation)]
pub fn compute_metrics(state: &HealthState, content: &HealthContent) -> MetricsSnapshot {
    let records: Vec<_> = state.records.values().collect();
    let living: Vec<_> = records.iter().filter(|r| !r.dead).collect();

    let mut hp_sum = 0.0;
    let mut fraction_sum = 0.0;
    let mut min_hp = f64::INFINITY;
    let mut radiation_sum = 0.0;
    for record in &living {
        let max_hp = record
            .last_max_hp
            .unwrap_or_else(|| base_max_hp(record.quirk_level, &content.constants));
        hp_sum += record.hp;
        if max_hp > 0.0 {
            fraction_sum += record.hp / max_hp;
        }
        min_hp = min_hp.min(record.hp);
        radiation_sum += record.last_radiation;
    }
    let alive = living.len();
    let average = |sum: f64| if alive == 0 { 0.0 } else { sum / alive as f64 };

    MetricsSnapshot {
        day: state.meta.day,
        metrics_version: METRICS_VERSION,
        crew_tracked: u32::try_from(records.len()).unwrap_or(u32::MAX),
        crew_dead: count(records.iter().map(|r| r.dead)),
        avg_hp: average(hp_sum) as f32,
        min_hp: if alive == 0 { 0.0 } else { min_hp as f32 },
        avg_hp_fraction: average(fraction_sum) as f32,
        crew_exhausted: count(living.iter().map(|r| r.has_condition(condition_ids::EXHAUSTED))),
        crew_incapacitated: count(living.iter().map(|r| r.is_incapacitated())),
        crew_infected: count(living.iter().map(|r| r.has_condition(condition_ids::INFECTED))),
        crew_sick: count(living.iter().map(|r| r.has_condition(condition_ids::SICK))),
        crew_injured: count(living.iter().map(|r| r.has_condition(condition_ids::INJURED))),
        crew_training: count(living.iter().map(|r| r.has_condition(condition_ids::TRAINING))),
        crew_decontaminating: count(
            living
                .iter()
                .map(|r| r.has_condition(condition_ids::DECONTAMINATING)),
        ),
        quirks_total: u32::try_from(records.iter().map(|r| r.quirks.len()).sum::<usize>())
            .unwrap_or(u32::MAX),
        total_dose: records.iter().map(|r| r.dose).sum::<f64>() as f32,
        max_dose: records.iter().map(|r| r.dose).fold(0.0, f64::max) as f32,
        avg_radiation_per_day: average(radiation_sum) as f32,
        storms_pending: u32::try_from(state.storms.len()).unwrap_or(u32::MAX),
    }
}

/// Write the CSV header row for metrics.
pub fn write_metrics_header(writer: &mut impl std::io::Write) -> std::io::Result<()> {
    writeln!(
        writer,
        "day,metrics_version,\
         crew_tracked,crew_dead,\
         avg_hp,min_hp,avg_hp_fraction,\
         crew_exhausted,crew_incapacitated,crew_infected,crew_sick,crew_injured,\
         crew_training,crew_decontaminating,quirks_total,\
         total_dose,max_dose,avg_radiation_per_day,storms_pending"
    )
}

/// Append a single metrics snapshot as a CSV row.
pub fn append_metrics_row(
    writer: &mut impl std::io::Write,
    snapshot: &MetricsSnapshot,
) -> std::io::Result<()> {
    writeln!(
        writer,
        "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
        snapshot.day,
        snapshot.metrics_version,
        snapshot.crew_tracked,
        snapshot.crew_dead,
        snapshot.avg_hp,
        snapshot.min_hp,
        snapshot.avg_hp_fraction,
        snapshot.crew_exhausted,
        snapshot.crew_incapacitated,
        snapshot.crew_infected,
        snapshot.crew_sick,
        snapshot.crew_injured,
        snapshot.crew_training,
        snapshot.crew_decontaminating,
        snapshot.quirks_total,
        snapshot.total_dose,
        snapshot.max_dose,
        snapshot.avg_radiation_per_day,
        snapshot.storms_pending,
    )
}

/// Maximum data rows per CSV file before rotating to a new file.
const MAX_ROWS_PER_FILE: usize = 50_000;

/// Rotating metrics CSV writer. Splits into numbered files
/// (`metrics_000.csv`, `metrics_001.csv`, ...) after [`MAX_ROWS_PER_FILE`] rows each.
pub struct MetricsFileWriter {
    run_dir: std::path::PathBuf,
    file_index: u32,
    rows_in_current_file: usize,
    writer: std::io::BufWriter<std::fs::File>,
}

impl MetricsFileWriter {
    /// Create a new writer, opening the first CSV file with a header row.
    pub fn new(run_dir: std::path::PathBuf) -> std::io::Result<Self> {
        let writer = open_csv_file(&run_dir, 0)?;
        Ok(Self {
            run_dir,
            file_index: 0,
            rows_in_current_file: 0,
            writer,
        })
    }

    /// Append one snapshot row, rotating to a new file if the current one is full.
    pub fn write_row(&mut self, snapshot: &MetricsSnapshot) -> std::io::Result<()> {
        if self.rows_in_current_file >= MAX_ROWS_PER_FILE {
            self.writer.flush()?;
            self.file_index += 1;
            self.writer = open_csv_file(&self.run_dir, self.file_index)?;
            self.rows_in_current_file = 0;
        }
        append_metrics_row(&mut self.writer, snapshot)?;
        self.rows_in_current_file += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

fn open_csv_file(
    run_dir: &std::path::Path,
    index: u32,
) -> std::io::Result<std::io::BufWriter<std::fs::File>> {
    let path = run_dir.join(format!("metrics_{index:03}.csv"));
    let mut writer = std::io::BufWriter::new(std::fs::File::create(path)?);
    write_metrics_header(&mut writer)?;
    Ok(writer)
}
