//! Cosmo Profile command line
//!
//! Computes profiles directly and operates the order database.
//!
//! # Usage
//!
//! ```bash
//! # One-off profile, printed as JSON
//! cosmo-profile compute --name "Anna Müller" --date 15.06.1990 --time 14:30 --place Bensheim
//!
//! # Tropical vs sidereal Sun sign for a date
//! cosmo-profile check --date 22.12.1985
//!
//! # Orders
//! cosmo-profile order create --name "Anna Müller" --email anna@example.org \
//!     --date 15.06.1990 --time 14:30 --place Bensheim --tier pro
//! cosmo-profile order confirm --file checkout.json
//! cosmo-profile order list --status failed
//! cosmo-profile order stats
//! ```
//!
//! # Environment Variables
//!
//! - `COSMO_CONFIG`: Path to the TOML config file (default: ./cosmo.toml)
//! - `COSMO_MAIL_API_KEY`: Mail relay key; delivery is disabled without it
//! - `COSMO_DATA_DIR`: Order database directory
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use cosmo_profile::config::{AppConfig, StaticTables};
use cosmo_profile::ephemeris::HttpEphemeris;
use cosmo_profile::fulfillment::{mailer_from_config, FulfillmentService, JsonDocumentRenderer, PaymentConfirmation};
use cosmo_profile::geo::{GeoResolver, HttpTimezoneResolver, NominatimGeocoder};
use cosmo_profile::pipeline::export::export_result;
use cosmo_profile::storage::{ProcessLock, SledOrderStore};
use cosmo_profile::types::{OrderId, OrderRequest, OrderStatus, PaymentRef, PersonInput, ProductTier};
use cosmo_profile::{IntakeOutcome, Orchestrator};

/// Upper bound on waiting for a dispatched run from the command line.
const CLI_RUN_DEADLINE: Duration = Duration::from_secs(300);

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "cosmo-profile")]
#[command(about = "Cosmological profile computation and order fulfillment")]
#[command(version)]
struct CliArgs {
    /// Explicit config file (overrides COSMO_CONFIG and ./cosmo.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline for one person and print the result
    Compute {
        #[command(flatten)]
        birth: BirthArgs,
        #[arg(long, default_value = "normal")]
        tier: ProductTier,
        /// Also write the result into the export directory
        #[arg(long)]
        export: bool,
    },

    /// Compare tropical and sidereal Sun sign for a date (DD.MM.YYYY)
    Check {
        #[arg(long)]
        date: String,
    },

    /// Order intake, fulfillment and administration
    #[command(subcommand)]
    Order(OrderCommand),

    /// Print the effective configuration as TOML
    Config,
}

#[derive(Args, Debug)]
struct BirthArgs {
    #[arg(long)]
    name: String,
    /// DD.MM.YYYY
    #[arg(long)]
    date: String,
    /// HH:MM, 24h
    #[arg(long)]
    time: String,
    #[arg(long)]
    place: String,
}

#[derive(Subcommand, Debug)]
enum OrderCommand {
    /// Create an order and fulfill it
    Create {
        #[command(flatten)]
        birth: BirthArgs,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "normal")]
        tier: ProductTier,
        /// Payment session id used for duplicate detection
        #[arg(long)]
        session: Option<String>,
        /// Store the order without starting fulfillment
        #[arg(long)]
        no_process: bool,
    },

    /// Accept a payment confirmation (JSON file) and fulfill the order
    Confirm {
        #[arg(long, value_name = "PATH")]
        file: PathBuf,
    },

    /// Fulfill an order that is still new
    Process { id: OrderId },

    /// Show an order's status (or the whole record with --full)
    Show {
        id: OrderId,
        #[arg(long)]
        full: bool,
    },

    /// List orders, newest first
    List {
        #[arg(long)]
        status: Option<OrderStatus>,
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Delete an order and its document
    Delete { id: OrderId },

    /// Order count and revenue per month
    Stats,
}

// ============================================================================
// Wiring
// ============================================================================

fn load_config(explicit: Option<&PathBuf>) -> Result<AppConfig> {
    let mut config = match explicit {
        Some(path) => AppConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AppConfig::load(),
    };
    if explicit.is_some() {
        config.apply_env_overrides();
    }
    Ok(config)
}

fn build_orchestrator(config: &AppConfig) -> Result<Arc<Orchestrator>> {
    // Tables are checked before any collaborator is contacted.
    let tables = StaticTables::load(&config.tables).context("Failed to load static tables")?;

    let engine = HttpEphemeris::new(&config.ephemeris).context("Failed to build ephemeris client")?;
    let geocoder = NominatimGeocoder::new(&config.geocoding).context("Failed to build geocoder client")?;
    let timezones = HttpTimezoneResolver::new(&config.geocoding).context("Failed to build timezone client")?;
    let geo = GeoResolver::new(Arc::new(geocoder), Arc::new(timezones), &config.geocoding);

    Ok(Arc::new(Orchestrator::new(
        Arc::new(engine),
        Arc::new(geo),
        Arc::new(tables),
        config,
    )))
}

/// Order service over the durable store. The lock must outlive the service.
fn build_service(config: &AppConfig) -> Result<(FulfillmentService, ProcessLock)> {
    let orchestrator = build_orchestrator(config)?;

    let lock = ProcessLock::acquire(&config.storage.data_dir).context("Failed to acquire process lock")?;
    let store = SledOrderStore::open(config.storage.data_dir.join("orders.db"))
        .context("Failed to open order database")?;

    let service = FulfillmentService::new(
        Arc::new(store),
        orchestrator,
        Arc::new(JsonDocumentRenderer::new(&config.output.documents_dir)),
        mailer_from_config(&config.mail),
        config.pricing.clone(),
    );
    Ok((service, lock))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

// ============================================================================
// Commands
// ============================================================================

async fn run_order_command(command: OrderCommand, config: &AppConfig) -> Result<()> {
    let (service, _lock) = build_service(config)?;

    match command {
        OrderCommand::Create {
            birth,
            email,
            tier,
            session,
            no_process,
        } => {
            let request = OrderRequest {
                name: birth.name,
                email,
                birth_date: birth.date,
                birth_time: birth.time,
                birth_place: birth.place,
                tier,
                payment: PaymentRef {
                    session_id: session,
                    payment_id: None,
                },
            };
            let outcome = service.create_order(request)?;
            if let (IntakeOutcome::Created(id), false) = (&outcome, no_process) {
                let order = service.process(*id).await?;
                return print_json(&order);
            }
            print_json(&outcome_view(&outcome))
        }
        OrderCommand::Confirm { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let confirmation: PaymentConfirmation =
                serde_json::from_str(&raw).context("Malformed payment confirmation")?;

            let outcome = service.confirm_payment(&confirmation)?;
            if let IntakeOutcome::Created(id) = outcome {
                let order = service.await_terminal(id, CLI_RUN_DEADLINE).await?;
                if !order.status.is_terminal() {
                    warn!(order_id = %id, status = %order.status, "Fulfillment still running at exit");
                }
                return print_json(&order);
            }
            print_json(&outcome_view(&outcome))
        }
        OrderCommand::Process { id } => print_json(&service.process(id).await?),
        OrderCommand::Show { id, full } => {
            if full {
                print_json(&service.order(id)?)
            } else {
                print_json(&service.status(id)?)
            }
        }
        OrderCommand::List { status, limit } => {
            for order in service.list(status, limit)? {
                println!(
                    "{}  {:<9}  {:<6}  {:>7.2}  {}  {}",
                    order.id,
                    order.status,
                    order.tier,
                    order.price,
                    order.created_at.format("%Y-%m-%d %H:%M"),
                    order.customer_email
                );
            }
            Ok(())
        }
        OrderCommand::Delete { id } => {
            let order = service.delete_order(id)?;
            info!(order_id = %order.id, "Deleted");
            Ok(())
        }
        OrderCommand::Stats => print_json(&service.monthly_stats()?),
    }
}

#[derive(Serialize)]
struct OutcomeView {
    outcome: &'static str,
    id: Option<OrderId>,
    reason: Option<String>,
}

fn outcome_view(outcome: &IntakeOutcome) -> OutcomeView {
    match outcome {
        IntakeOutcome::Created(id) => OutcomeView {
            outcome: "created",
            id: Some(*id),
            reason: None,
        },
        IntakeOutcome::Duplicate(id) => OutcomeView {
            outcome: "duplicate",
            id: Some(*id),
            reason: None,
        },
        IntakeOutcome::Ignored(reason) => OutcomeView {
            outcome: "ignored",
            id: None,
            reason: Some(reason.clone()),
        },
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    if let Err(e) = dotenvy::dotenv() {
        // A missing .env is normal
        if !e.not_found() {
            eprintln!("warning: failed to read .env: {e}");
        }
    }
    init_logging(args.log_json);

    let config = load_config(args.config.as_ref())?;

    match args.command {
        Command::Compute { birth, tier, export } => {
            let orchestrator = build_orchestrator(&config)?;
            let person = PersonInput::new(&birth.name, &birth.date, &birth.time, &birth.place);
            let result = orchestrator.run(&person, tier).await;
            if export && !config.output.export_results {
                let path = export_result(&result, &config.output.export_dir)?;
                info!(path = %path.display(), "Exported");
            }
            print_json(&result)
        }
        Command::Check { date } => {
            let orchestrator = build_orchestrator(&config)?;
            let check = orchestrator.sign_check(&date).await?;
            print_json(&check)
        }
        Command::Order(command) => run_order_command(command, &config).await,
        Command::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}
