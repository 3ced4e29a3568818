use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use dialoguer::Password;
use serde::Serialize;
use std::sync::Arc;

use hostel_client::api::{self, profiles::ProfileTab, users::UserTab, wallet::TransactionFilter};
use hostel_client::auth::{Session, SqliteStore};
use hostel_client::config::{CliArgs, Config, LogFormat};
use hostel_client::http_client::{SecureClient, SessionEvent};
use hostel_client::models::wallet::{BalanceAdjustment, BalanceOperation, TransactionKind};

/// Admin client for the hostel management backend
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    args: CliArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store tokens issued by the backend and show the signed-in user
    Login {
        #[arg(long, env = "ACCESS_TOKEN")]
        access_token: Option<String>,
        #[arg(long, env = "REFRESH_TOKEN")]
        refresh_token: Option<String>,
    },
    /// Forget stored tokens
    Logout,
    /// Show the signed-in user
    Whoami,
    /// List user accounts
    Users {
        #[arg(long, value_enum, default_value = "active")]
        tab: UserTabArg,
        #[arg(long, default_value = "")]
        search: String,
    },
    /// Show one user account
    User { id: String },
    /// List resident profiles
    Profiles {
        #[arg(long, value_enum, default_value = "pending")]
        tab: ProfileTabArg,
        #[arg(long, default_value = "")]
        search: String,
    },
    /// Manage buildings
    Buildings {
        #[command(subcommand)]
        action: BuildingAction,
    },
    /// Manage flats
    Flats {
        #[command(subcommand)]
        action: FlatAction,
    },
    /// List wallet balances
    Wallets {
        #[arg(long, default_value = "")]
        search: String,
    },
    /// Increase or decrease a user's wallet balance
    Adjust {
        user_id: String,
        #[arg(long)]
        amount: f64,
        #[arg(long, value_enum)]
        operation: OperationArg,
        #[arg(long)]
        reason: String,
    },
    /// List wallet transactions
    Transactions {
        #[arg(long, default_value = "completed")]
        status: String,
        #[arg(long, value_enum, default_value = "all")]
        kind: KindArg,
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, default_value = "1")]
        page: usize,
        #[arg(long, default_value = "10")]
        per_page: usize,
    },
    /// Lock expired meal orders and deduct wallets
    LockExpired,
    /// Show the locked meal report for a day (YYYY-MM-DD)
    LockedMeals {
        date: NaiveDate,
        /// Print orders as CSV instead of JSON
        #[arg(long)]
        csv: bool,
    },
}

#[derive(Subcommand, Debug)]
enum BuildingAction {
    List,
    Create { name: String },
    Update { id: String, name: String },
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
enum FlatAction {
    List {
        #[arg(long)]
        building: Option<String>,
    },
    Create { building_id: String, name: String },
    Update { id: String, building_id: String, name: String },
    Delete { id: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum UserTabArg {
    Active,
    Blocked,
    Deleted,
}

impl From<UserTabArg> for UserTab {
    fn from(arg: UserTabArg) -> Self {
        match arg {
            UserTabArg::Active => UserTab::Active,
            UserTabArg::Blocked => UserTab::Blocked,
            UserTabArg::Deleted => UserTab::Deleted,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ProfileTabArg {
    Pending,
    Process,
    Approve,
    Deleted,
}

impl From<ProfileTabArg> for ProfileTab {
    fn from(arg: ProfileTabArg) -> Self {
        match arg {
            ProfileTabArg::Pending => ProfileTab::Pending,
            ProfileTabArg::Process => ProfileTab::Process,
            ProfileTabArg::Approve => ProfileTab::Approve,
            ProfileTabArg::Deleted => ProfileTab::Deleted,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OperationArg {
    Increase,
    Decrease,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum KindArg {
    All,
    Deposit,
    Deduct,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before clap reads environment-backed flags
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::from_args(cli.args)?;
    config.validate()?;

    // Initialize logging with a configured level
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true);

    match config.log_format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Text => subscriber.init(),
    }

    tracing::debug!(
        base_url = %config.base_url,
        credentials_db = %config.credentials_db.display(),
        "Configuration loaded"
    );

    let store = Arc::new(
        SqliteStore::open(&config.credentials_db).context("Failed to open credential store")?,
    );
    let client = SecureClient::new(&config, store)?.install_global().clone();
    let mut events = client.subscribe();
    let session = Session::new(client);

    let result = run(cli.command, &session).await;

    while let Ok(event) = events.try_recv() {
        report_event(&event);
    }

    result
}

async fn run(command: Command, session: &Session) -> Result<()> {
    let client = session.client();

    match command {
        Command::Login {
            access_token,
            refresh_token,
        } => {
            let access_token = match access_token {
                Some(token) => token,
                None => prompt_secret("Access token")?,
            };
            let refresh_token = match refresh_token {
                Some(token) => token,
                None => prompt_secret("Refresh token")?,
            };

            match session.login(&access_token, &refresh_token).await? {
                Some(user) => println!("✅ Logged in as {} ({:?})", user.name, user.role),
                None => println!("⚠️  Tokens stored, but the current user could not be loaded"),
            }
        }

        Command::Logout => {
            session.logout()?;
            println!("👋 Logged out");
        }

        Command::Whoami => match session.current_user().await {
            Some(user) => print_json(&user)?,
            None => anyhow::bail!("Not logged in (run `hostel-client login`)"),
        },

        Command::Users { tab, search } => {
            let users = api::users::all_users(client).await?;
            print_json(&api::users::filter_users(&users, tab.into(), &search))?;
        }

        Command::User { id } => print_json(&api::users::user(client, &id).await?)?,

        Command::Profiles { tab, search } => {
            let profiles = api::profiles::profiles(client).await?;
            print_json(&api::profiles::filter_profiles(
                &profiles,
                tab.into(),
                &search,
            ))?;
        }

        Command::Buildings { action } => match action {
            BuildingAction::List => {
                let (buildings, profiles) = tokio::try_join!(
                    api::properties::buildings(client),
                    api::profiles::profiles(client)
                )?;
                for building in &buildings {
                    println!(
                        "{}  {}  ({} residents)",
                        building.id,
                        building.name,
                        api::properties::resident_count(&profiles, &building.id)
                    );
                }
            }
            BuildingAction::Create { name } => {
                api::properties::create_building(client, &name).await?;
                println!("✅ Building created");
            }
            BuildingAction::Update { id, name } => {
                api::properties::update_building(client, &id, &name).await?;
                println!("✅ Building updated");
            }
            BuildingAction::Delete { id } => {
                api::properties::delete_building(client, &id).await?;
                println!("🗑️  Building deleted");
            }
        },

        Command::Flats { action } => match action {
            FlatAction::List { building } => {
                let (flats, profiles) = tokio::try_join!(
                    api::properties::flats(client),
                    api::profiles::profiles(client)
                )?;
                let shown = match building {
                    Some(ref building_id) => api::properties::flats_in(&flats, building_id),
                    None => flats.iter().collect(),
                };
                for flat in shown {
                    println!(
                        "{}  {}  building={}  ({} residents)",
                        flat.id,
                        flat.name,
                        flat.building_id.id(),
                        api::properties::flat_residents(&profiles, &flat.id).len()
                    );
                }
            }
            FlatAction::Create { building_id, name } => {
                api::properties::create_flat(client, &building_id, &name).await?;
                println!("✅ Flat created");
            }
            FlatAction::Update {
                id,
                building_id,
                name,
            } => {
                api::properties::update_flat(client, &id, &building_id, &name).await?;
                println!("✅ Flat updated");
            }
            FlatAction::Delete { id } => {
                api::properties::delete_flat(client, &id).await?;
                println!("🗑️  Flat deleted");
            }
        },

        Command::Wallets { search } => {
            let wallets = api::wallet::wallet_balances(client).await?;
            print_json(&api::wallet::filter_wallets(&wallets, &search))?;
        }

        Command::Adjust {
            user_id,
            amount,
            operation,
            reason,
        } => {
            let adjustment = BalanceAdjustment {
                amount,
                operation: match operation {
                    OperationArg::Increase => BalanceOperation::Increase,
                    OperationArg::Decrease => BalanceOperation::Decrease,
                },
                reason,
            };
            api::wallet::adjust_balance(client, &user_id, &adjustment).await?;
            println!("✅ Balance updated");
        }

        Command::Transactions {
            status,
            kind,
            search,
            page,
            per_page,
        } => {
            let ledger = api::wallet::transactions(client, &status).await?;
            let filter = TransactionFilter {
                kind: match kind {
                    KindArg::All => None,
                    KindArg::Deposit => Some(TransactionKind::Deposit),
                    KindArg::Deduct => Some(TransactionKind::Deduct),
                },
                query: search,
            };
            let matching = filter.apply(&ledger.transactions);
            print_json(&api::wallet::paginate(&matching, page, per_page))?;
            eprintln!(
                "page {}/{} ({} matching)",
                page,
                api::wallet::total_pages(matching.len(), per_page),
                matching.len()
            );
        }

        Command::LockExpired => {
            let result = api::meals::lock_expired(client).await?;
            let user_ids = api::meals::deducted_user_ids(&result);
            let users = api::users::users_by_id(client, &user_ids).await;

            println!(
                "Locked {} orders, deducted {} from {} users ({} failed)",
                result.locked_count,
                result.summary.total_deducted,
                result.summary.total_users,
                result.summary.failed_count
            );
            for deduction in &result.deduction_results {
                let name = users
                    .get(&deduction.user_id)
                    .map(|u| u.name.as_str())
                    .unwrap_or(deduction.user_id.as_str());
                println!(
                    "  {:<24} {:>8.2}  {:>8.2} -> {:>8.2}  {}",
                    name,
                    deduction.total_meal_cost,
                    deduction.balance_before,
                    deduction.balance_after,
                    deduction.status
                );
            }
        }

        Command::LockedMeals { date, csv } => {
            let report = api::meals::locked_meals(client, date).await?;
            if csv {
                println!("{}", api::meals::orders_to_csv(&report.orders));
            } else {
                print_json(&report)?;
            }
        }
    }

    Ok(())
}

fn prompt_secret(prompt: &str) -> Result<String> {
    let value: String = Password::new()
        .with_prompt(prompt)
        .interact()
        .with_context(|| format!("Failed to read {}", prompt.to_lowercase()))?;

    if value.is_empty() {
        anyhow::bail!("{} cannot be empty", prompt);
    }
    Ok(value)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report_event(event: &SessionEvent) {
    match event {
        SessionEvent::Invalidated { reason, .. } => {
            tracing::error!("Session invalidated: {}", reason);
            eprintln!("❌ Session expired ({}). Run `hostel-client login` again.", reason);
        }
        SessionEvent::TokenRefreshed => tracing::info!("Access token was refreshed"),
        SessionEvent::LoggedIn => tracing::debug!("Login event"),
        SessionEvent::LoggedOut { .. } => tracing::debug!("Logout event"),
    }
}
