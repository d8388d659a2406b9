//! PachiForge command-line simulator
//!
//! Usage:
//!   pachiforge compare            - Run every preset under the same conditions
//!   pachiforge single -m charge   - Run one machine, with per-session history
//!   pachiforge hamari             - Closed-form no-hit probabilities

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use pf_sim::{
    BatchConfig, BatchReport, BoundaryPolicy, DEFAULT_DROUGHT_ROTATIONS, DroughtTable, MachineSpec,
    PlayConditions, run_batch, session_history,
};

/// History is printed by default for batches this small
const AUTO_DETAIL_SESSIONS: usize = 10;

#[derive(Parser)]
#[command(name = "pachiforge", version, about = "Monte Carlo session simulator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Raise log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

/// Budget-exhaustion rule, as spelled on the command line
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Boundary {
    /// A final extra draw only marks a near miss
    NearMiss,
    /// A final extra draw that hits resolves a trigger
    TrailingDraw,
}

impl From<Boundary> for BoundaryPolicy {
    fn from(boundary: Boundary) -> Self {
        match boundary {
            Boundary::NearMiss => BoundaryPolicy::NearMiss,
            Boundary::TrailingDraw => BoundaryPolicy::TrailingDraw,
        }
    }
}

#[derive(Args, Clone)]
struct RunArgs {
    /// Rotations per 1,000 currency units
    #[arg(short, long, default_value_t = 18.0)]
    rotation: f64,

    /// Rotation budget per session
    #[arg(long, default_value_t = 2000)]
    spins: u32,

    /// Number of sessions
    #[arg(long, default_value_t = 50_000)]
    sims: usize,

    /// Base seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Worker threads (default: all cores)
    #[arg(long)]
    threads: Option<usize>,

    /// What happens when the rotation budget runs out
    #[arg(long, value_enum, default_value_t = Boundary::NearMiss)]
    boundary: Boundary,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

impl RunArgs {
    fn conditions(&self) -> PlayConditions {
        PlayConditions::new(self.spins, self.rotation).with_boundary(self.boundary.into())
    }

    fn batch_config(&self) -> BatchConfig {
        let mut config = BatchConfig::default().with_sessions(self.sims);
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        if let Some(threads) = self.threads {
            config = config.with_threads(threads);
        }
        config
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compare machines under the same play conditions
    Compare {
        #[command(flatten)]
        run: RunArgs,

        /// Preset names or spec files (default: every preset)
        #[arg(short, long)]
        machine: Vec<String>,
    },
    /// Simulate one machine
    Single {
        #[command(flatten)]
        run: RunArgs,

        /// Preset name or spec file
        #[arg(short, long, default_value = "classic")]
        machine: String,

        /// Always print the per-session history
        #[arg(long, conflicts_with = "no_detail")]
        detail: bool,

        /// Never print the per-session history
        #[arg(long)]
        no_detail: bool,
    },
    /// Probability of going N rotations without a hit
    Hamari {
        /// Preset names or spec files (default: every preset)
        #[arg(short, long)]
        machine: Vec<String>,

        /// Rotation counts, comma separated
        #[arg(long, value_delimiter = ',')]
        rotations: Vec<u32>,

        /// Print the table as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Compare { run, machine } => compare(&run, &machine),
        Commands::Single {
            run,
            machine,
            detail,
            no_detail,
        } => single(&run, &machine, detail, no_detail),
        Commands::Hamari {
            machine,
            rotations,
            json,
        } => hamari(&machine, &rotations, json),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// Resolve each name as a preset or spec file; empty means every preset
fn load_machines(names: &[String]) -> Result<Vec<MachineSpec>> {
    if names.is_empty() {
        return MachineSpec::preset_names()
            .iter()
            .map(|name| MachineSpec::preset(name).context("Failed to load preset"))
            .collect();
    }

    names
        .iter()
        .map(|name| {
            MachineSpec::resolve(name).with_context(|| format!("Failed to load machine '{}'", name))
        })
        .collect()
}

fn log_run(spec: &MachineSpec, conditions: &PlayConditions, config: &BatchConfig) {
    log::info!(
        "Machine '{}': {} rotations at {} per 1k, {} sessions, boundary {:?}",
        spec.name(),
        conditions.total_rotations,
        conditions.rotations_per_1k,
        config.sessions,
        conditions.boundary
    );
}

fn compare(run: &RunArgs, machines: &[String]) -> Result<()> {
    let specs = load_machines(machines)?;
    let conditions = run.conditions();

    let mut report = BatchReport::new("Machine comparison");
    for spec in &specs {
        let config = run.batch_config();
        log_run(spec, &conditions, &config);
        let batch = run_batch(spec, conditions, config)
            .with_context(|| format!("Simulation of '{}' failed", spec.name()))?;
        report.add_batch(spec, &batch);
    }

    if run.json {
        println!("{}", report.to_json());
    } else {
        print!("{}", report.to_text());
    }
    Ok(())
}

fn single(run: &RunArgs, machine: &str, detail: bool, no_detail: bool) -> Result<()> {
    let spec = MachineSpec::resolve(machine)
        .with_context(|| format!("Failed to load machine '{}'", machine))?;

    let conditions = run.conditions();
    let config = run.batch_config();
    log_run(&spec, &conditions, &config);
    let batch = run_batch(&spec, conditions, config)
        .with_context(|| format!("Simulation of '{}' failed", spec.name()))?;

    let mut report = BatchReport::new(spec.name());
    report.add_batch(&spec, &batch);

    if run.json {
        println!("{}", report.to_json());
        return Ok(());
    }

    print!("{}", report.to_text());

    let show_history = detail || (!no_detail && run.sims <= AUTO_DETAIL_SESSIONS);
    if show_history {
        println!();
        print!("{}", session_history(&batch.sessions));
    }
    Ok(())
}

fn hamari(machines: &[String], rotations: &[u32], json: bool) -> Result<()> {
    let specs = load_machines(machines)?;
    let rotations = if rotations.is_empty() {
        DEFAULT_DROUGHT_ROTATIONS.to_vec()
    } else {
        rotations.to_vec()
    };

    let table = DroughtTable::new(&specs, &rotations);
    if json {
        let out = serde_json::to_string_pretty(&table).context("Failed to serialize table")?;
        println!("{}", out);
    } else {
        print!("{}", table.to_text());
    }
    Ok(())
}
