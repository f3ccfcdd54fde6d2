mod cmd;
mod engine;
mod output;
mod root;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "bmad",
    about = "Multi-agent delivery workflow: personas, role-scoped prompts, gated pipelines",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .bmad/ or .git/)
    #[arg(long, global = true, env = "BMAD_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize bmad in the current project
    Init {
        /// Project id (default: derived from the directory name)
        #[arg(long)]
        id: Option<String>,

        /// Display name (default: the directory name)
        #[arg(long)]
        name: Option<String>,
    },

    /// List agent personas and the commands they own
    Agents,

    /// Show one agent's persona, capabilities and isolation rules
    Agent { id: String },

    /// List the predefined pipelines and their stages
    Pipelines,

    /// Print the assembled prompt for a command
    Prompt {
        command: String,

        /// Wrap this text with the owning agent's persona instead of
        /// building the full stage prompt
        #[arg(long)]
        raw: Option<String>,
    },

    /// Show document shards, optionally filtered by a task query
    Shards {
        #[arg(long, short = 'q')]
        query: Option<String>,

        /// Print the rendered context block instead of the shard list
        #[arg(long, requires = "query")]
        context: bool,
    },

    /// Evaluate gates against the current project state
    Gate {
        /// Gate names (default: every gate)
        names: Vec<String>,

        /// Let this gate's failure through (repeatable)
        #[arg(long = "override", value_name = "GATE")]
        overrides: Vec<String>,
    },

    /// Drive a pipeline until it completes or a gate blocks it
    Run {
        /// default, quick or review (default: from config)
        #[arg(long, short = 'p')]
        pipeline: Option<String>,

        /// Continue the run recorded in .bmad/run.yaml
        #[arg(long)]
        resume: bool,

        /// Let this gate's failure through (repeatable)
        #[arg(long = "override", value_name = "GATE")]
        overrides: Vec<String>,

        /// Assemble prompts without invoking the engine
        #[arg(long)]
        dry_run: bool,

        /// Run a single stage, then stop
        #[arg(long)]
        step: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Run { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init { id, name } => cmd::init::run(&root, id.as_deref(), name.as_deref()),
        Commands::Agents => cmd::agents::list(cli.json),
        Commands::Agent { id } => cmd::agents::show(&id, cli.json),
        Commands::Pipelines => cmd::pipelines::run(cli.json),
        Commands::Prompt { command, raw } => {
            cmd::prompt::run(&root, &command, raw.as_deref(), cli.json)
        }
        Commands::Shards { query, context } => {
            cmd::shards::run(&root, query.as_deref(), context, cli.json)
        }
        Commands::Gate { names, overrides } => cmd::gate::run(&root, &names, &overrides, cli.json),
        Commands::Run {
            pipeline,
            resume,
            overrides,
            dry_run,
            step,
        } => cmd::run::run(
            &root,
            cmd::run::RunOptions {
                pipeline: pipeline.as_deref(),
                resume,
                overrides: &overrides,
                dry_run,
                step,
            },
            cli.json,
        ),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
