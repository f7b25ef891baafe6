use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use tally::{
    Config, Ledger,
    config::Args,
    db::{
        models::{
            accounts::AccountCreateDBRequest,
            categories::{CategoryCreateDBRequest, CategoryFilter, CategoryUpdateDBRequest},
            entries::{EntryCreateDBRequest, EntryFilter, EntryType, SortOrder},
        },
        pools::{ConnectionManager, PoolMetricsConfig, run_pool_metrics_sampler},
    },
    telemetry,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Embedded income/expense ledger", long_about = None)]
struct Cli {
    #[command(flatten)]
    args: Args,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending schema migrations
    Migrate,
    /// Manage accounts
    Account {
        #[command(subcommand)]
        command: AccountCommand,
    },
    /// Manage an account's categories
    Category {
        #[command(subcommand)]
        command: CategoryCommand,
    },
    /// Record and list ledger entries
    Entry {
        #[command(subcommand)]
        command: EntryCommand,
    },
}

#[derive(Subcommand, Debug)]
enum AccountCommand {
    Create { name: String },
    Show { id: Uuid },
}

#[derive(Subcommand, Debug)]
enum CategoryCommand {
    Create {
        #[arg(long)]
        account: Uuid,
        #[arg(long)]
        name: String,
        #[arg(long)]
        icon: String,
        /// Six hex digits, `#` optional
        #[arg(long)]
        color: String,
    },
    List {
        #[arg(long)]
        account: Uuid,
        #[arg(long, default_value_t = 0)]
        skip: i64,
        #[arg(long, default_value_t = 100)]
        limit: i64,
    },
    Update {
        #[arg(long)]
        account: Uuid,
        id: Uuid,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        icon: Option<String>,
        #[arg(long)]
        color: Option<String>,
    },
    Delete {
        #[arg(long)]
        account: Uuid,
        id: Uuid,
    },
}

#[derive(Subcommand, Debug)]
enum EntryCommand {
    Add {
        #[arg(long)]
        account: Uuid,
        /// expense or income
        #[arg(long = "type")]
        entry_type: EntryType,
        #[arg(long)]
        name: String,
        /// Minor units, e.g. cents
        #[arg(long)]
        amount: i64,
        /// YYYY-MM-DD
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        category: Option<Uuid>,
    },
    List {
        #[arg(long)]
        account: Uuid,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
        /// Repeat to select several; defaults to both
        #[arg(long = "type")]
        entry_types: Vec<EntryType>,
        #[arg(long, default_value_t = 50)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
        /// asc or desc
        #[arg(long, default_value = "desc")]
        order: SortOrder,
        /// Group the page by date with per-day totals
        #[arg(long)]
        grouped: bool,
    },
    Show {
        #[arg(long)]
        account: Uuid,
        id: Uuid,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli.args)?;

    if cli.args.validate {
        println!("Configuration is valid.");
        return Ok(());
    }

    telemetry::init_telemetry(config.log_format)?;
    debug!("{:?}", cli);

    let Some(command) = cli.command else {
        warn!("No command given, see --help");
        return Ok(());
    };

    let pools = ConnectionManager::open(&config.database).await?;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling");
            signal_token.cancel();
        }
    });

    let sampler = config.pool_metrics.enabled.then(|| {
        tokio::spawn(run_pool_metrics_sampler(
            pools.labeled_pools(),
            PoolMetricsConfig::from(&config.pool_metrics),
            shutdown.child_token(),
        ))
    });

    let result = run(command, Ledger::new(pools.clone()), &shutdown).await;

    shutdown.cancel();
    if let Some(sampler) = sampler {
        sampler.await??;
    }
    pools.close().await;

    result
}

async fn run(command: Command, ledger: Ledger, cancel: &CancellationToken) -> anyhow::Result<()> {
    match command {
        Command::Migrate => {
            tally::migrator().run(ledger.pools().write()).await?;
            info!("Migrations applied");
        }
        Command::Account { command } => match command {
            AccountCommand::Create { name } => {
                print_json(&ledger.create_account(&AccountCreateDBRequest::new(name), cancel).await?)?;
            }
            AccountCommand::Show { id } => print_json(&ledger.get_account(id, cancel).await?)?,
        },
        Command::Category { command } => match command {
            CategoryCommand::Create {
                account,
                name,
                icon,
                color,
            } => {
                let request = CategoryCreateDBRequest::builder().name(name).icon(icon).color_hex(color).build();
                print_json(&ledger.create_category(account, &request, cancel).await?)?;
            }
            CategoryCommand::List { account, skip, limit } => {
                print_json(&ledger.list_categories(account, &CategoryFilter::new(skip, limit), cancel).await?)?;
            }
            CategoryCommand::Update {
                account,
                id,
                name,
                icon,
                color,
            } => {
                let request = CategoryUpdateDBRequest::builder()
                    .maybe_name(name)
                    .maybe_icon(icon)
                    .maybe_color_hex(color)
                    .build();
                print_json(&ledger.update_category(account, id, &request, cancel).await?)?;
            }
            CategoryCommand::Delete { account, id } => {
                let deleted = ledger.delete_category(account, id, cancel).await?;
                print_json(&serde_json::json!({ "deleted": deleted }))?;
            }
        },
        Command::Entry { command } => match command {
            EntryCommand::Add {
                account,
                entry_type,
                name,
                amount,
                date,
                description,
                category,
            } => {
                let request = EntryCreateDBRequest::builder()
                    .account_id(account)
                    .entry_type(entry_type)
                    .name(name)
                    .amount(amount)
                    .date(date)
                    .maybe_description(description)
                    .maybe_category_id(category)
                    .build();
                print_json(&ledger.create_entry(&request, cancel).await?)?;
            }
            EntryCommand::List {
                account,
                from,
                to,
                entry_types,
                limit,
                offset,
                order,
                grouped,
            } => {
                let entry_types = if entry_types.is_empty() { EntryType::ALL.to_vec() } else { entry_types };
                let filter = EntryFilter::builder()
                    .account_id(account)
                    .start_date(from)
                    .end_date(to)
                    .entry_types(entry_types)
                    .limit(limit)
                    .offset(offset)
                    .order(order)
                    .build();
                if grouped {
                    print_json(&ledger.list_entries_grouped_by_date(&filter, cancel).await?)?;
                } else {
                    print_json(&ledger.list_entries_by_date(&filter, cancel).await?)?;
                }
            }
            EntryCommand::Show { account, id } => print_json(&ledger.get_entry(account, id, cancel).await?)?,
        },
    }
    Ok(())
}
