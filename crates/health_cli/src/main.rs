use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use health_core::{
    compute_metrics, crew_report, estimate_for_design, process_events, tick, CrewId, Event,
    EventEnvelope, EventLevel, HealthContent, HealthState, VesselCache, VesselId, WorldSnapshot,
};
use health_core::metrics::MetricsFileWriter;
use health_world::{
    build_initial_state, load_content, load_scenario, load_state_file, save_state_file,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "health_cli", about = "Crew Health Simulation CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario for a fixed number of days.
    Run(RunArgs),
    /// Estimate how a crew member would fare aboard a vessel from the scenario.
    Estimate {
        #[arg(long)]
        crew: String,
        #[arg(long)]
        vessel: String,
        #[arg(long, default_value = "./content/scenarios/moon_mission.json")]
        scenario: String,
        #[arg(long, default_value = "./content")]
        content_dir: String,
    },
}

#[derive(Args)]
struct RunArgs {
    #[arg(long)]
    days: f64,
    /// Days advanced per tick.
    #[arg(long, default_value_t = 1.0)]
    step: f64,
    /// Seed for a fresh run. Mutually exclusive with --load.
    #[arg(long, conflicts_with = "load")]
    seed: Option<u64>,
    /// Continue from a save file written by --save. Mutually exclusive with --seed.
    #[arg(long, conflicts_with = "seed")]
    load: Option<PathBuf>,
    /// Write the final state to this file.
    #[arg(long)]
    save: Option<PathBuf>,
    #[arg(long, default_value = "./content")]
    content_dir: String,
    #[arg(long, default_value = "./content/scenarios/moon_mission.json")]
    scenario: String,
    /// Print a status line every N ticks.
    #[arg(long, default_value_t = 10)]
    print_every: u64,
    #[arg(long, default_value = "normal", value_parser = ["normal", "debug"])]
    event_level: String,
    /// Sample metrics every N ticks.
    #[arg(long, default_value_t = 1)]
    metrics_every: u64,
    /// Disable automatic metrics collection to the runs/ directory.
    #[arg(long)]
    no_metrics: bool,
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

fn generate_run_id(seed: u64) -> String {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("{secs}_seed{seed}")
}

fn create_run_dir(run_id: &str) -> Result<PathBuf> {
    let dir = PathBuf::from("runs").join(run_id);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("creating run directory: {}", dir.display()))?;
    Ok(dir)
}

fn write_run_info(dir: &Path, run_id: &str, state: &HealthState, args: &RunArgs) -> Result<()> {
    let info = serde_json::json!({
        "run_id": run_id,
        "seed": state.meta.seed,
        "content_version": state.meta.content_version,
        "scenario": args.scenario,
        "metrics_every": args.metrics_every,
        "runner": "health_cli",
        "args": {
            "days": args.days,
            "step": args.step,
            "print_every": args.print_every,
        }
    });
    let path = dir.join("run_info.json");
    let file =
        std::fs::File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(file, &info)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn open_metrics(state: &HealthState, args: &RunArgs) -> Result<Option<MetricsFileWriter>> {
    if args.no_metrics {
        return Ok(None);
    }
    let run_id = generate_run_id(state.meta.seed);
    let run_dir = create_run_dir(&run_id)?;
    write_run_info(&run_dir, &run_id, state, args)?;
    let writer = MetricsFileWriter::new(run_dir.clone())
        .with_context(|| format!("opening metrics CSV in {}", run_dir.display()))?;
    println!("Run directory: {}", run_dir.display());
    Ok(Some(writer))
}

fn run(args: &RunArgs) -> Result<()> {
    if args.step.is_nan() || args.step <= 0.0 {
        bail!("--step must be positive, got {}", args.step);
    }
    let content = load_content(&args.content_dir)?;
    let world = load_scenario(&args.scenario, &content)?;
    let event_level = match args.event_level.as_str() {
        "debug" => EventLevel::Debug,
        _ => EventLevel::Normal,
    };

    let mut state = match &args.load {
        Some(path) => {
            let state = load_state_file(path, &content)?;
            tracing::info!(path = %path.display(), day = state.meta.day, "resuming saved run");
            state
        }
        None => build_initial_state(&world, &content, args.seed.unwrap_or_else(rand::random)),
    };
    // A resumed run seeds from the elapsed day too, or it would replay the
    // rolls already made.
    let rng_seed = state.meta.seed ^ state.meta.day.to_bits();
    let mut rng = ChaCha8Rng::seed_from_u64(rng_seed);
    let mut cache = VesselCache::new();
    let mut metrics_writer = open_metrics(&state, args)?;
    tracing::info!(
        seed = state.meta.seed,
        scenario = %args.scenario,
        crew = state.records.len(),
        "run starting"
    );

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let ticks = (args.days / args.step).ceil().max(0.0) as u64;
    println!(
        "Starting simulation: days={} step={} seed={} crew={} content_version={}",
        args.days,
        args.step,
        state.meta.seed,
        state.records.len(),
        content.content_version,
    );
    println!("{}", "-".repeat(80));

    for n in 1..=ticks {
        let mut events = tick(
            &mut state,
            &world,
            &content,
            &mut cache,
            &mut rng,
            args.step,
            event_level,
        );
        events.extend(process_events(&mut state, &world, &content, &mut rng));
        print_notable(&events);

        if n % args.print_every.max(1) == 0 {
            print_status(&state, &content);
        }
        if let Some(ref mut writer) = metrics_writer {
            if n % args.metrics_every.max(1) == 0 {
                let snapshot = compute_metrics(&state, &content);
                writer.write_row(&snapshot).context("writing metrics row")?;
            }
        }
    }

    tracing::info!(day = state.meta.day, ticks, "run finished");
    println!("{}", "-".repeat(80));
    println!("Done. Final state at day {:.1}:", state.meta.day);
    print_status(&state, &content);
    print_reports(&mut state, &world, &content);

    if let Some(ref mut writer) = metrics_writer {
        writer.flush().context("final metrics flush")?;
        println!("Metrics written to runs/ directory.");
    }
    if let Some(path) = &args.save {
        save_state_file(path, &state)?;
        tracing::info!(path = %path.display(), day = state.meta.day, "state saved");
        println!("State saved to {}", path.display());
    }
    Ok(())
}

fn print_notable(events: &[EventEnvelope]) {
    for envelope in events {
        let day = envelope.day;
        match &envelope.event {
            Event::CrewDied { crew_id } => println!("*** {crew_id} DIED at day {day:.1} ***"),
            Event::HealthEventFired { message, .. } => println!("[day {day:.1}] {message}"),
            Event::Incapacitated {
                crew_id,
                original_trait,
            } => println!("[day {day:.1}] {crew_id} can't work as a {original_trait}"),
            Event::Restored { crew_id, .. } => {
                println!("[day {day:.1}] {crew_id} is back on duty");
            }
            Event::RadStormIncoming {
                target,
                magnitude,
                arrival_day,
                ..
            } => println!(
                "[day {day:.1}] radiation storm heading for {target:?}, magnitude {magnitude:.0}, arriving day {arrival_day:.1}"
            ),
            Event::RadStormHit { crew_id, dose, .. } => {
                println!("[day {day:.1}] {crew_id} took {dose:.0} dose from a storm");
            }
            Event::QuirkAwarded { crew_id, quirk, .. } => {
                println!("[day {day:.1}] {crew_id} is now {quirk}");
            }
            Event::TrainingComplete { crew_id } => {
                println!("[day {day:.1}] {crew_id} finished training");
            }
            _ => {}
        }
    }
}

fn print_status(state: &HealthState, content: &HealthContent) {
    let m = compute_metrics(state, content);
    println!(
        "[day={day:7.1}]  crew={tracked:2} dead={dead:2}  \
         avg_hp={avg:6.1} ({frac:3.0}%)  min_hp={min:6.1}  \
         exhausted={exh} sick={sick} injured={inj}  dose={dose:.0}  storms={storms}",
        day = m.day,
        tracked = m.crew_tracked,
        dead = m.crew_dead,
        avg = m.avg_hp,
        frac = m.avg_hp_fraction * 100.0,
        min = m.min_hp,
        exh = m.crew_exhausted,
        sick = m.crew_sick,
        inj = m.crew_injured,
        dose = m.total_dose,
        storms = m.storms_pending,
    );
}

fn print_reports(state: &mut HealthState, world: &WorldSnapshot, content: &HealthContent) {
    let mut ids: Vec<CrewId> = state.records.keys().cloned().collect();
    ids.sort();
    for id in &ids {
        if let Some(report) = crew_report(state, world, content, id) {
            let eta = report
                .days_to_next_threshold
                .map_or_else(|| "-".to_string(), |d| format!("{d:.1} days"));
            println!(
                "  {}  next threshold: {eta}  dose: {:.0}  training: {:.0}%",
                report.summary, report.dose, report.training_percent
            );
        }
    }
}

fn estimate(crew: &str, vessel: &str, scenario: &str, content_dir: &str) -> Result<()> {
    let content = load_content(content_dir)?;
    let world = load_scenario(scenario, &content)?;
    let state = build_initial_state(&world, &content, 0);
    let crew_id = CrewId(crew.to_string());
    let Some(design) = world.vessels.get(&VesselId(vessel.to_string())) else {
        bail!("vessel '{vessel}' is not in {scenario}");
    };
    let Some(estimate) = estimate_for_design(&state, &world, &content, &crew_id, design) else {
        bail!("crew '{crew}' is not in {scenario}");
    };
    tracing::info!(crew, vessel, net_rate = estimate.net_rate, "design estimated");
    let days = |d: Option<f64>| d.map_or_else(|| "never".to_string(), |d| format!("{d:.1} days"));
    println!("{crew} aboard {vessel}:");
    println!("  MaxHP:            {:.1}", estimate.max_hp);
    println!("  HP change:        {:+.2}/day", estimate.net_rate);
    println!("  until exhaustion: {}", days(estimate.days_to_exhaustion));
    println!("  until 0 HP:       {}", days(estimate.days_to_zero));
    println!(
        "  exposure:         {:.0}% ({:.0}% in shelter)",
        estimate.exposure * 100.0,
        estimate.shelter_exposure * 100.0
    );
    println!("  radiation:        {:.1}/day", estimate.radiation_rate);
    Ok(())
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run(&args)?,
        Commands::Estimate {
            crew,
            vessel,
            scenario,
            content_dir,
        } => estimate(&crew, &vessel, &scenario, &content_dir)?,
    }
    Ok(())
}
