#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use output::OutputMode;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "wrench: work-order tracking with per-type workflows",
    long_about = None
)]
struct Cli {
    /// Project directory (containing .wrench/).
    #[arg(long, global = true, default_value = ".")]
    dir: PathBuf,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Acting identity recorded against mutations.
    #[arg(long, global = true, default_value = "operator")]
    actor: String,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else {
            OutputMode::Text
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Lifecycle",
        about = "Initialize a wrench project",
        after_help = "EXAMPLES:\n    # Initialize a project in the current directory\n    wr init"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Create a new work item",
        after_help = "EXAMPLES:\n    # File a hardware request\n    wr create --type hardware_request --title \"Spare klystron\" --field quantity=2\n\n    # File a child item under a parent\n    wr create --type hardware_request --title \"Cabling\" --parent wr-1a2b3c4d"
    )]
    Create(cmd::create::CreateArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Request a status transition",
        after_help = "EXAMPLES:\n    # Move an item along its workflow\n    wr move wr-1a2b3c4d --to approved\n\n    # Re-evaluate automatic rules only\n    wr move wr-1a2b3c4d"
    )]
    Move(cmd::move_cmd::MoveArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Set custom field values",
        after_help = "EXAMPLES:\n    # Set two fields, validated together\n    wr set wr-1a2b3c4d --field urgency=high --field shop_group=rf_shop"
    )]
    Set(cmd::set::SetArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show one work item",
        after_help = "EXAMPLES:\n    wr show wr-1a2b3c4d\n    wr show wr-1a2b3c4d --json"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Read",
        about = "List work items",
        after_help = "EXAMPLES:\n    wr list\n    wr list --domain accel --state in_progress"
    )]
    List(cmd::list::ListArgs),

    #[command(next_help_heading = "Read", about = "List registered work types")]
    Types(cmd::types::TypesArgs),

    #[command(next_help_heading = "Read", about = "Inspect LOV catalogs")]
    Lov(cmd::lov::LovArgs),

    #[command(
        next_help_heading = "Project Maintenance",
        about = "Generate shell completion scripts"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("WRENCH_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output = cli.output_mode();

    match &cli.command {
        Commands::Init(args) => cmd::init::run_init(args, output, &cli.dir),
        Commands::Completions(args) => cmd::completions::run_completions::<Cli>(args),
        Commands::Create(args) => {
            let ctx = cmd::Ctx::open(&cli.dir, output, cli.actor.clone())?;
            cmd::create::run_create(args, &ctx)
        }
        Commands::Move(args) => {
            let ctx = cmd::Ctx::open(&cli.dir, output, cli.actor.clone())?;
            cmd::move_cmd::run_move(args, &ctx)
        }
        Commands::Set(args) => {
            let ctx = cmd::Ctx::open(&cli.dir, output, cli.actor.clone())?;
            cmd::set::run_set(args, &ctx)
        }
        Commands::Show(args) => {
            let ctx = cmd::Ctx::open(&cli.dir, output, cli.actor.clone())?;
            cmd::show::run_show(args, &ctx)
        }
        Commands::List(args) => {
            let ctx = cmd::Ctx::open(&cli.dir, output, cli.actor.clone())?;
            cmd::list::run_list(args, &ctx)
        }
        Commands::Types(args) => {
            let ctx = cmd::Ctx::open(&cli.dir, output, cli.actor.clone())?;
            cmd::types::run_types(args, &ctx)
        }
        Commands::Lov(args) => {
            let ctx = cmd::Ctx::open(&cli.dir, output, cli.actor.clone())?;
            cmd::lov::run_lov(args, &ctx)
        }
    }
}
