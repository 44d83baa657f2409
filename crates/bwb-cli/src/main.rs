mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    config::ConfigSubcommand,
    contracts::{ContractsSubcommand, ValidationSubcommand},
    frontmatter::FrontmatterSubcommand,
    init::InitSubcommand,
    phase::{PhaseSubcommand, PhasesSubcommand},
    roadmap::RoadmapSubcommand,
    state::StateSubcommand,
    util::TimestampFormat,
    verify::VerifySubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "bwb",
    about = "Build, Validate, Wire: planning state for phased development, derived from the files in .planning/",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .planning/ or .git/)
    #[arg(long, global = true, env = "BWB_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read and patch the status document (.planning/STATE.md)
    State {
        #[command(subcommand)]
        subcommand: StateSubcommand,
    },

    /// Add or complete a phase
    Phase {
        #[command(subcommand)]
        subcommand: PhaseSubcommand,
    },

    /// List phase directories and their artifacts
    Phases {
        #[command(subcommand)]
        subcommand: PhasesSubcommand,
    },

    /// Query the roadmap (.planning/ROADMAP.md)
    Roadmap {
        #[command(subcommand)]
        subcommand: RoadmapSubcommand,
    },

    /// Read and edit document metadata blocks
    Frontmatter {
        #[command(subcommand)]
        subcommand: FrontmatterSubcommand,
    },

    /// Manage .planning/config.json
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Check plans and phases for structural problems
    Verify {
        #[command(subcommand)]
        subcommand: VerifySubcommand,
    },

    /// Inspect a phase's contracts document
    Contracts {
        #[command(subcommand)]
        subcommand: ContractsSubcommand,
    },

    /// Inspect a phase's validation document
    Validation {
        #[command(subcommand)]
        subcommand: ValidationSubcommand,
    },

    /// Extract the structured fields of a summary document
    SummaryExtract {
        path: String,
        /// Comma-separated fields to keep
        #[arg(long)]
        fields: Option<String>,
    },

    /// Aggregate every summary into one digest
    HistoryDigest,

    /// Resolve a phase number to its directory and evidence
    FindPhase {
        /// Phase number (3, 03, 3.1)
        phase: String,
    },

    /// Index the plans of a phase by wave
    PhasePlanIndex {
        /// Phase number (3, 03, 3.1)
        phase: String,
    },

    /// Emit the JSON context bundle for a workflow step
    Init {
        #[command(subcommand)]
        subcommand: InitSubcommand,
    },

    /// Turn text into a lowercase dash-separated slug
    GenerateSlug {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Print the current UTC time
    CurrentTimestamp {
        #[arg(value_enum, default_value_t)]
        format: TimestampFormat,
    },

    /// Report whether a path exists relative to the project root
    VerifyPathExists { path: String },

    /// Model tier for an agent role under the configured profile
    ResolveModel { agent: String },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let root_path = cli.root.as_deref();
    let root = root::resolve_root(root_path);
    tracing::debug!(root = %root.display(), "resolved project root");

    let json = cli.json;
    let result = match cli.command {
        Commands::State { subcommand } => cmd::state::run(&root, subcommand, json),
        Commands::Phase { subcommand } => cmd::phase::run(&root, subcommand, json),
        Commands::Phases { subcommand } => cmd::phase::run_list(&root, subcommand, json),
        Commands::Roadmap { subcommand } => cmd::roadmap::run(&root, subcommand, json),
        Commands::Frontmatter { subcommand } => cmd::frontmatter::run(&root, subcommand, json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, json),
        Commands::Verify { subcommand } => cmd::verify::run(&root, subcommand, json),
        Commands::Contracts { subcommand } => cmd::contracts::run(&root, subcommand, json),
        Commands::Validation { subcommand } => {
            cmd::contracts::run_validation(&root, subcommand, json)
        }
        Commands::SummaryExtract { path, fields } => {
            cmd::digest::summary_extract(&root, &path, fields.as_deref(), json)
        }
        Commands::HistoryDigest => cmd::digest::history(&root, json),
        Commands::FindPhase { phase } => cmd::phase::find(&root, &phase, json),
        Commands::PhasePlanIndex { phase } => cmd::phase::plan_index(&root, &phase, json),
        Commands::Init { subcommand } => cmd::init::run(&root, subcommand),
        Commands::GenerateSlug { text } => cmd::util::generate_slug(&text.join(" "), json),
        Commands::CurrentTimestamp { format } => cmd::util::current_timestamp(format, json),
        Commands::VerifyPathExists { path } => cmd::util::verify_path_exists(&root, &path, json),
        Commands::ResolveModel { agent } => cmd::util::resolve_model(&root, &agent, json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
