use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use fleetgo_common::{logging, VehicleCategory};
use fleetgo_rental::domain::{
    AccountId, AvailabilityIndex, Caller, GeoPoint, NewVehicle, RentId, RentalManager,
    RentalOperations, SearchArea, SystemClock, UnitType, VehicleFilter, VehicleId,
};
use fleetgo_rental::storage::{AccountStore, SqliteFleetStore, VehicleRegistry};
use fleetgo_rental::{RentalConfig, RentalError};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "fleetctl", version, about = "FleetGo rental engine operator CLI")]
struct Cli {
    #[arg(short, long, help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, help = "Print the default configuration as TOML")]
    gen_config: bool,

    #[arg(long, help = "Validate configuration and exit")]
    dry_run: bool,

    #[command(flatten)]
    verbosity: Verbosity<WarnLevel>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending database migrations
    Migrate,
    #[command(subcommand)]
    Account(AccountCommand),
    #[command(subcommand)]
    Vehicle(VehicleCommand),
    /// Rentable vehicles of a category inside a circle (raw degrees)
    Search {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        long: f64,
        #[arg(long)]
        radius: f64,
        #[arg(long)]
        category: String,
    },
    #[command(subcommand)]
    Rent(RentCommand),
}

#[derive(Subcommand, Debug)]
enum AccountCommand {
    Create {
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        balance: f64,
    },
    Show {
        #[arg(long)]
        id: i64,
    },
}

#[derive(Subcommand, Debug)]
enum VehicleCommand {
    Add(VehicleArgs),
    List {
        #[arg(long)]
        category: Option<String>,
        #[arg(long, default_value_t = 0)]
        offset: u32,
        #[arg(long)]
        limit: Option<u32>,
    },
    Show {
        #[arg(long)]
        id: i64,
    },
}

#[derive(Args, Debug)]
struct VehicleArgs {
    #[arg(long)]
    owner: i64,
    #[arg(long)]
    category: String,
    #[arg(long)]
    model: String,
    #[arg(long)]
    color: String,
    #[arg(long)]
    identifier: String,
    #[arg(long)]
    description: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    lat: f64,
    #[arg(long, allow_hyphen_values = true)]
    long: f64,
    #[arg(long)]
    minute_price: Option<f64>,
    #[arg(long)]
    day_price: Option<f64>,
    #[arg(long, help = "Register the vehicle as not rentable")]
    parked: bool,
}

#[derive(Subcommand, Debug)]
enum RentCommand {
    Open {
        #[arg(long)]
        vehicle: i64,
        #[arg(long)]
        account: i64,
        #[arg(long, help = "Minutes or Days")]
        unit: String,
        #[arg(long, help = "Open on behalf of --account as this administrator")]
        admin: Option<i64>,
    },
    Close {
        #[arg(long)]
        rent: RentId,
        #[arg(long)]
        account: i64,
        #[arg(long, help = "Act as an administrator")]
        admin: bool,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        long: f64,
    },
    Show {
        #[arg(long)]
        rent: RentId,
        #[arg(long)]
        account: i64,
        #[arg(long)]
        admin: bool,
    },
    History {
        #[arg(long)]
        account: Option<i64>,
        #[arg(long)]
        vehicle: Option<i64>,
        #[arg(long, help = "Caller account id, defaults to --account")]
        caller: Option<i64>,
        #[arg(long)]
        admin: bool,
    },
}

fn caller(account: i64, admin: bool) -> Caller {
    let account = AccountId::new(account);
    if admin {
        Caller::admin(account)
    } else {
        Caller::account(account)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.gen_config {
        println!("{}", toml::to_string_pretty(&RentalConfig::default())?);
        return Ok(());
    }

    let config = RentalConfig::load(cli.config)?;
    logging::init_logging(
        &cli.verbosity,
        "fleetgo_rental=info",
        config.service.log_format,
    )?;

    if cli.dry_run {
        info!(
            service = %config.service.name,
            environment = %config.service.environment,
            database = %config.database.url,
            "Configuration validated successfully (dry-run mode)"
        );
        return Ok(());
    }

    let Some(command) = cli.command else {
        bail!("no command given, see `fleetctl --help`");
    };

    debug!(service = %config.service.name, "Starting fleetctl");
    let store = Arc::new(SqliteFleetStore::connect(&config.database).await?);

    match execute(command, store, &config).await {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(e) => {
            if let Some(rejected) = e.downcast_ref::<RentalError>() {
                warn!(kind = ?rejected.public_kind(), "{rejected}");
            }
            Err(e)
        }
    }
}

async fn execute(
    command: Command,
    store: Arc<SqliteFleetStore>,
    config: &RentalConfig,
) -> Result<Value> {
    let manager = RentalManager::from_store(store.clone(), Arc::new(SystemClock));

    let output = match command {
        Command::Migrate => {
            store.run_migrations().await?;
            json!({ "migrated": true })
        }
        Command::Account(AccountCommand::Create { balance }) => {
            let id = store.create_account(balance).await?;
            json!({ "account_id": id, "balance": balance })
        }
        Command::Account(AccountCommand::Show { id }) => {
            let id = AccountId::new(id);
            json!({ "account_id": id, "balance": store.balance(id).await? })
        }
        Command::Vehicle(VehicleCommand::Add(args)) => {
            let vehicle = NewVehicle {
                owner_id: AccountId::new(args.owner),
                rentable: !args.parked,
                category: VehicleCategory::new(args.category)?,
                model: args.model,
                color: args.color,
                identifier: args.identifier,
                description: args.description,
                position: GeoPoint::new(args.lat, args.long),
                minute_price: args.minute_price,
                day_price: args.day_price,
            };
            serde_json::to_value(store.create(vehicle).await?)?
        }
        Command::Vehicle(VehicleCommand::List {
            category,
            offset,
            limit,
        }) => {
            let category = category.map(VehicleCategory::new).transpose()?;
            let filter = VehicleFilter::new(category, offset, limit, &config.search);
            serde_json::to_value(store.list(&filter).await?)?
        }
        Command::Vehicle(VehicleCommand::Show { id }) => {
            serde_json::to_value(store.get(VehicleId::new(id)).await?)?
        }
        Command::Search {
            lat,
            long,
            radius,
            category,
        } => {
            let index = AvailabilityIndex::new(store.clone());
            let area = SearchArea::new(GeoPoint::new(lat, long), radius);
            serde_json::to_value(index.find_in_range(area, &category).await?)?
        }
        Command::Rent(RentCommand::Open {
            vehicle,
            account,
            unit,
            admin,
        }) => {
            let unit_type: UnitType = unit.parse()?;
            let vehicle = VehicleId::new(vehicle);
            let renter = AccountId::new(account);
            let rent = match admin {
                Some(admin) => {
                    manager
                        .admin_open_rental(caller(admin, true), renter, vehicle, unit_type)
                        .await?
                }
                None => manager.open_rental(vehicle, renter, unit_type).await?,
            };
            serde_json::to_value(rent)?
        }
        Command::Rent(RentCommand::Close {
            rent,
            account,
            admin,
            lat,
            long,
        }) => {
            let closed = manager
                .close_rental(rent, caller(account, admin), GeoPoint::new(lat, long))
                .await?;
            serde_json::to_value(closed)?
        }
        Command::Rent(RentCommand::Show {
            rent,
            account,
            admin,
        }) => serde_json::to_value(manager.get_rent(rent, caller(account, admin)).await?)?,
        Command::Rent(RentCommand::History {
            account,
            vehicle,
            caller: caller_id,
            admin,
        }) => {
            let rents = match (account, vehicle) {
                (Some(account), None) => {
                    let who = caller(caller_id.unwrap_or(account), admin);
                    manager
                        .history_for_account(AccountId::new(account), who)
                        .await?
                }
                (None, Some(vehicle)) => {
                    let Some(caller_id) = caller_id else {
                        bail!("--caller is required with --vehicle");
                    };
                    manager
                        .history_for_vehicle(VehicleId::new(vehicle), caller(caller_id, admin))
                        .await?
                }
                _ => bail!("pass exactly one of --account or --vehicle"),
            };
            serde_json::to_value(rents)?
        }
    };

    Ok(output)
}
