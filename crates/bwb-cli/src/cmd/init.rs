use crate::output::print_json;
use anyhow::Context;
use bwb_core::context::{self, Includes};
use clap::{Args, Subcommand};
use serde::Serialize;
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct PhaseArgs {
    /// Phase number (3, 03, 3.1)
    phase: String,

    /// Comma-separated documents to inline, e.g. `state,roadmap,context`
    #[arg(long, default_value = "")]
    include: String,
}

#[derive(Subcommand)]
pub enum InitSubcommand {
    /// Context for starting a new project
    NewProject,
    /// Context for planning a phase
    PlanPhase(PhaseArgs),
    /// Context for executing a phase's plans
    ExecutePhase(PhaseArgs),
    /// Context for writing a phase's contracts
    Contracts(PhaseArgs),
    /// Context for validating a phase against its contracts
    Validate(PhaseArgs),
    /// Context for preparing a phase for validation
    Prepare(PhaseArgs),
    /// Context for the progress overview
    Progress {
        #[arg(long, default_value = "")]
        include: String,
    },
    /// Context for resuming an interrupted session
    Resume,
    /// Context for a generic phase operation
    PhaseOp {
        /// Phase number (3, 03, 3.1)
        phase: String,
    },
    /// Context for a small task outside the roadmap
    Quick {
        /// What the task is about; words are joined with spaces
        #[arg(num_args = 0..)]
        description: Vec<String>,
    },
    /// Context for mapping an existing codebase
    Brownfield,
    /// Context for writing a baseline phase of an existing codebase
    Baseline,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Bundles are always rendered as JSON; they exist to be consumed by tools.
pub fn run(root: &Path, subcmd: InitSubcommand) -> anyhow::Result<()> {
    match subcmd {
        InitSubcommand::NewProject => emit("new-project", context::new_project(root)),
        InitSubcommand::PlanPhase(a) => emit(
            "plan-phase",
            context::plan_phase(root, &a.phase, &Includes::parse(&a.include)),
        ),
        InitSubcommand::ExecutePhase(a) => emit(
            "execute-phase",
            context::execute_phase(root, &a.phase, &Includes::parse(&a.include)),
        ),
        InitSubcommand::Contracts(a) => emit(
            "contracts",
            context::contracts(root, &a.phase, &Includes::parse(&a.include)),
        ),
        InitSubcommand::Validate(a) => emit(
            "validate",
            context::validate(root, &a.phase, &Includes::parse(&a.include)),
        ),
        InitSubcommand::Prepare(a) => emit(
            "prepare",
            context::prepare(root, &a.phase, &Includes::parse(&a.include)),
        ),
        InitSubcommand::Progress { include } => {
            emit("progress", context::progress(root, &Includes::parse(&include)))
        }
        InitSubcommand::Resume => emit("resume", context::resume(root)),
        InitSubcommand::PhaseOp { phase } => emit("phase-op", context::phase_op(root, &phase)),
        InitSubcommand::Quick { description } => {
            let description = description.join(" ");
            emit(
                "quick",
                context::quick(root, Some(description.as_str()), chrono::Utc::now()),
            )
        }
        InitSubcommand::Brownfield => emit("brownfield", context::brownfield(root)),
        InitSubcommand::Baseline => emit("baseline", context::baseline(root)),
    }
}

fn emit<T: Serialize>(workflow: &str, bundle: bwb_core::Result<T>) -> anyhow::Result<()> {
    let bundle = bundle.with_context(|| format!("failed to build {workflow} context"))?;
    print_json(&bundle)
}
