//! clinic-desk: command-line client for the clinic records service.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use clinic_desk_core::calendar;
use clinic_desk_core::models::EntityId;
use clinic_desk_core::state::ClinicState;
use clinic_desk_core::store::{EntityStore, FetchStatus};
use clinic_desk_core::Entity;
use clinic_desk_http::{connect, default_log_filter, Config};
use tracing_subscriber::EnvFilter;

/// Clinic front-desk sync and scheduling client
#[derive(Parser, Debug)]
#[command(name = "clinic-desk")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Records service root, overrides the config file
    #[arg(long, global = true, env = "CLINIC_DESK_BASE_URL")]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch every collection and print counts and statuses
    Summary {
        /// Reference date for dashboard counts (default: today)
        #[arg(long)]
        today: Option<String>,
    },
    /// Print the free booking slots on a date
    Slots {
        /// Date, YYYY-MM-DD
        date: String,
        /// Appointment id to ignore, as when editing it
        #[arg(short, long)]
        exclude: Option<String>,
    },
    /// Compute an age from a date of birth
    Age {
        /// Date of birth, YYYY-MM-DD
        date_of_birth: String,
        /// Reference date (default: today)
        #[arg(long)]
        on: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Age { date_of_birth, on } => age(&date_of_birth, on.as_deref()),
        Command::Summary { today } => {
            let state = open_state(cli.config.as_deref(), cli.base_url)?;
            summary(&state, today.as_deref()).await
        }
        Command::Slots { date, exclude } => {
            let state = open_state(cli.config.as_deref(), cli.base_url)?;
            slots(&state, &date, exclude.as_deref()).await
        }
    }
}

fn open_state(config_path: Option<&str>, base_url: Option<String>) -> anyhow::Result<ClinicState> {
    let mut config = match config_path {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    if let Some(base_url) = base_url {
        config = config.with_base_url(base_url)?;
    }
    connect(&config).context("Failed to set up the records service client")
}

fn reference_date(input: Option<&str>) -> anyhow::Result<chrono::NaiveDate> {
    match input {
        None => Ok(calendar::today()),
        Some(raw) => calendar::parse_date(raw).with_context(|| format!("Unrecognized date: {}", raw)),
    }
}

fn age(date_of_birth: &str, on: Option<&str>) -> anyhow::Result<()> {
    let reference = reference_date(on)?;
    match calendar::calculate_age_on(date_of_birth, &reference) {
        Some(age) => println!("{}", age),
        None => bail!("Unrecognized date of birth: {}", date_of_birth),
    }
    Ok(())
}

async fn summary(state: &ClinicState, today: Option<&str>) -> anyhow::Result<()> {
    let today = reference_date(today)?;
    tokio::join!(
        state.patients.fetch_all(),
        state.appointments.fetch_all(),
        state.consultations.fetch_all(),
        state.practitioners.fetch_all(),
        state.options.ensure_all_loaded(),
    );

    print_status(&state.patients);
    print_status(&state.appointments);
    print_status(&state.consultations);
    print_status(&state.practitioners);
    for kind in clinic_desk_core::OptionListKind::ALL {
        print_status(state.options.store(kind));
    }

    let counts = state.dashboard_counts(today);
    println!();
    println!("As of {}", calendar::to_iso(today));
    println!("  patients               {}", counts.patients);
    println!("  upcoming appointments  {}", counts.upcoming_appointments);
    println!("  consultations today    {}", counts.consultations_today);
    Ok(())
}

fn print_status<T: Entity>(store: &EntityStore<T>) {
    let snapshot = store.snapshot();
    match snapshot.error {
        Some(error) => println!("{:<18} {:<10} {}", store.collection(), snapshot.status.as_str(), error),
        None => println!(
            "{:<18} {:<10} {}",
            store.collection(),
            snapshot.status.as_str(),
            snapshot.items.len()
        ),
    }
}

/// Stored `YYYY-MM-DD` form of a date argument.
fn slot_date(input: &str) -> anyhow::Result<String> {
    calendar::parse_date(input)
        .map(calendar::to_iso)
        .with_context(|| format!("Unrecognized date: {}", input))
}

async fn slots(state: &ClinicState, date: &str, exclude: Option<&str>) -> anyhow::Result<()> {
    let date = slot_date(date)?;

    state.appointments.fetch_all().await;
    if state.appointments.status() == FetchStatus::Failed {
        bail!(
            "Could not load appointments: {}",
            state.appointments.error().unwrap_or_default()
        );
    }

    let exclude = exclude.map(EntityId::parse);
    for slot in state.free_slots(&date, exclude.as_ref()) {
        println!("{}", slot);
    }
    Ok(())
}
