//! `school-ledger` maintenance binary.
//!
//! Runs one maintenance command against the configured database; `--help` lists them.

use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use school_ledger::{
    config::{self, database},
    core::{directory, fees, inventory, rollover, term},
    entities::Population,
    errors::Result,
    service::Ledger,
};
use sea_orm::DatabaseConnection;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "school-ledger")]
#[command(about = "School attendance, fee and inventory ledger maintenance")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Active term and headline totals (default)
    Status,
    /// Totals of the active term
    Snapshot {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Close the active term and open a new one
    Rollover {
        /// Name of the new term
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
    },
    /// Repair an interrupted rollover
    Resume {
        /// Name of the term to open if none exists
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
    },
}

async fn print_status(db: &DatabaseConnection, school: &config::SchoolConfig) -> Result<()> {
    let active = term::active_term(db).await?;
    let payments = fees::payments_for_term(db, active.id).await?;
    let collected: f64 = payments.iter().map(|p| p.amount).sum();

    println!("{}", school.school_name);
    println!("Active term: {} (#{})", active.name, active.id);
    println!(
        "Students: {}  Teachers: {}",
        directory::count_people(db, Population::Student).await?,
        directory::count_people(db, Population::Teacher).await?
    );
    println!(
        "Fees collected: {collected:.2} across {} payments ({} classes priced)",
        payments.len(),
        school.fee_schedule().len()
    );
    println!(
        "Open inventory holdings: {}",
        inventory::open_holdings(db).await?.len()
    );
    Ok(())
}

async fn run(command: Commands, ledger: &Ledger, school: &config::SchoolConfig) -> Result<()> {
    let db = ledger.db();
    match command {
        Commands::Status => print_status(db, school).await,
        Commands::Snapshot { json } => {
            let active = term::active_term(db).await?;
            let snapshot = rollover::compute_snapshot(db, &active).await?;
            if json {
                println!("{}", rollover::snapshot_to_json(&snapshot)?);
            } else {
                println!("{}", school.school_name);
                println!("{}", rollover::format_snapshot(&snapshot)?);
            }
            Ok(())
        }
        Commands::Rollover { name } => {
            let outcome = ledger.close_and_start_new(&name.join(" ")).await?;
            println!("{}", school.school_name);
            println!("{}", rollover::format_snapshot(&outcome.snapshot)?);
            println!();
            println!("Closed '{}'; '{}' is now active.", outcome.closed.name, outcome.opened.name);
            Ok(())
        }
        Commands::Resume { name } => {
            match ledger.resume_rollover(&name.join(" ")).await? {
                Some(resumed) => println!("Active term repointed to '{}'.", resumed.name),
                None => println!("Nothing to resume."),
            }
            Ok(())
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; variables may also come from the environment
    dotenv().ok();

    let cli = Cli::parse();

    // 3. School configuration
    let school = config::load_default_config()
        .inspect_err(|e| error!("Failed to load school configuration: {e}"))?;
    info!("Loaded configuration for {}", school.school_name);

    // 4. Database
    if std::env::var("DATABASE_URL").is_err() {
        std::fs::create_dir_all("data")?;
    }
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {e}"))?;
    database::create_tables(&db).await?;

    // 5. First run opens the default term
    term::ensure_active_term(&db, &school.default_term_name).await?;

    let ledger = Ledger::new(db);
    run(cli.command.unwrap_or(Commands::Status), &ledger, &school).await
}
