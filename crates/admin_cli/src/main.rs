use std::error::Error;

use clap::{Args, Parser, Subcommand};
use engine::{Engine, EntityKind};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};

#[derive(Parser, Debug)]
#[command(name = "minreg_admin")]
#[command(about = "Admin utilities for the mineral registry (lifecycle, balances, reconciliation)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./minreg.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Lifecycle(Lifecycle),
    Balance(Balance),
    Reconcile(Reconcile),
    Tracked(Tracked),
}

#[derive(Args, Debug)]
struct Lifecycle {
    #[command(subcommand)]
    command: LifecycleCommand,
}

#[derive(Subcommand, Debug)]
enum LifecycleCommand {
    /// Soft-delete a record and cascade to its dependents.
    SoftDelete(TargetArgs),
    /// Restore a soft-deleted record and the rows its deletion took down.
    Restore(TargetArgs),
    /// Show whether a record is active or deleted.
    Status(TargetArgs),
}

#[derive(Args, Debug)]
struct TargetArgs {
    /// Entity kind (unit, mineral, vehicle_type, vehicle, company, scale,
    /// purchase, weighing, balance).
    #[arg(long)]
    kind: String,
    #[arg(long)]
    id: String,
}

#[derive(Args, Debug)]
struct Balance {
    #[command(subcommand)]
    command: BalanceCommand,
}

#[derive(Subcommand, Debug)]
enum BalanceCommand {
    Get(BalanceGetArgs),
}

#[derive(Args, Debug)]
struct BalanceGetArgs {
    #[arg(long)]
    company_id: String,
    #[arg(long)]
    mineral_id: String,
}

#[derive(Args, Debug)]
struct Reconcile {
    #[command(subcommand)]
    command: ReconcileCommand,
}

#[derive(Subcommand, Debug)]
enum ReconcileCommand {
    /// Rebuild every active balance from the event history.
    Recalculate,
    /// Collapse duplicate active balance rows.
    MergeDuplicates,
}

#[derive(Args, Debug)]
struct Tracked {
    #[command(subcommand)]
    command: TrackedCommand,
}

#[derive(Subcommand, Debug)]
enum TrackedCommand {
    /// List the links severed by an owner's deletion.
    List(TrackedListArgs),
}

#[derive(Args, Debug)]
struct TrackedListArgs {
    #[command(flatten)]
    target: TargetArgs,
    /// Only show links to this dependent kind.
    #[arg(long)]
    dependent_kind: Option<String>,
}

fn parse_kind(raw: &str) -> EntityKind {
    match EntityKind::try_from(raw) {
        Ok(kind) => kind,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    }
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "minreg_admin=info,engine=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let db = connect_db(&cli.database_url).await?;
    let engine = Engine::builder().database(db).build().await?;

    match cli.command {
        Command::Lifecycle(Lifecycle { command }) => match command {
            LifecycleCommand::SoftDelete(args) => {
                let kind = parse_kind(&args.kind);
                engine.soft_delete(kind, &args.id).await?;
                println!("soft deleted {} {}", args.kind, args.id);
            }
            LifecycleCommand::Restore(args) => {
                let kind = parse_kind(&args.kind);
                engine.restore(kind, &args.id).await?;
                println!("restored {} {}", args.kind, args.id);
            }
            LifecycleCommand::Status(args) => {
                let kind = parse_kind(&args.kind);
                let state = engine.lifecycle(kind, &args.id).await?;
                println!("{}", serde_json::to_string(&state)?);
            }
        },
        Command::Balance(Balance {
            command: BalanceCommand::Get(args),
        }) => {
            let amount = engine
                .get_balance(&args.company_id, &args.mineral_id)
                .await?;
            println!("{amount}");
        }
        Command::Reconcile(Reconcile { command }) => match command {
            ReconcileCommand::Recalculate => {
                let report = engine.recalculate_all().await?;
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            ReconcileCommand::MergeDuplicates => {
                let report = engine.merge_duplicates().await?;
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        },
        Command::Tracked(Tracked {
            command: TrackedCommand::List(args),
        }) => {
            let kind = parse_kind(&args.target.kind);
            let dependent = args.dependent_kind.as_deref().map(parse_kind);
            let links = engine.tracked_links(kind, &args.target.id, dependent).await?;
            println!("{}", serde_json::to_string_pretty(&links)?);
        }
    }

    Ok(())
}
