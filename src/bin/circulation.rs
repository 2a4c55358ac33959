//! Circulation CLI
//!
//! Runs desk operations against a directory of CSV resources and prints the
//! response envelope as JSON.

use clap::{Parser, Subcommand};
use circulation_desk::{
    AppConfig, CirculationDesk, EntityKind, ItemStatus, ItemType, MemberStatus, MemberUpdate,
    NewItem, NewMember, Response,
};
use circulation_desk::backend::CsvWorkbook;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "circulation")]
#[command(about = "Members, items and loans kept in discoverable CSV tables")]
struct Cli {
    /// Extra config file layered over the default locations
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Locate the member, item and transaction resources
    Discover,

    /// Show stored addresses and the last discovery time
    Status,

    /// Create any missing resources, locate them and write their headers
    Init,

    /// Print the effective configuration, or save it to a file
    Config {
        #[arg(long)]
        write: Option<String>,
    },

    /// Check whether an identity may edit a resource
    Access {
        identity: String,
        /// member, item or transaction
        kind: EntityKind,
    },

    /// Member records
    Member {
        #[command(subcommand)]
        command: MemberCommand,
    },

    /// Item records
    Item {
        #[command(subcommand)]
        command: ItemCommand,
    },

    /// Lend an item to a member
    Checkout {
        member: String,
        item: String,
        /// Loan period in days (defaults to the configured period)
        #[arg(short, long)]
        days: Option<u32>,
    },

    /// Close a loan
    Return { transaction: String },

    /// Push back a loan's due date
    Extend {
        transaction: String,
        #[arg(short, long)]
        days: Option<u32>,
    },

    /// Close a loan as lost
    Lost { transaction: String },

    /// Mark active loans past their due date as overdue
    Overdue,

    /// List loans
    Loans {
        /// Open loans held by this member
        #[arg(short, long)]
        member: Option<String>,
        /// Only overdue loans
        #[arg(long)]
        overdue: bool,
    },
}

#[derive(Subcommand)]
enum MemberCommand {
    List {
        #[arg(short, long)]
        status: Option<MemberStatus>,
    },
    Show {
        id: String,
    },
    Add {
        name: String,
        email: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long, default_value = "")]
        notes: String,
    },
    Search {
        query: String,
    },
    /// Change a member's standing
    SetStatus {
        id: String,
        status: MemberStatus,
    },
    Delete {
        id: String,
    },
}

#[derive(Subcommand)]
enum ItemCommand {
    List {
        #[arg(short, long)]
        status: Option<ItemStatus>,
    },
    Show {
        id: String,
    },
    Add {
        title: String,
        #[arg(long, default_value = "")]
        author: String,
        #[arg(long = "type", default_value = "book")]
        item_type: ItemType,
        #[arg(long, default_value = "")]
        code: String,
        #[arg(long, default_value = "")]
        notes: String,
    },
    Search {
        query: String,
    },
    History {
        id: String,
    },
    Delete {
        id: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

/// Print the envelope; returns whether the operation succeeded
fn emit<T: Serialize>(response: Response<T>) -> anyhow::Result<bool> {
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(response.success)
}

fn run(cli: Cli) -> anyhow::Result<bool> {
    let config = AppConfig::load_from(cli.config.as_deref())?;
    let desk = CirculationDesk::open(&config)?;

    match cli.command {
        Commands::Discover => emit(desk.discover()),
        Commands::Status => emit(desk.discovery_status()),
        Commands::Init => {
            let workbook = CsvWorkbook::new(&config.storage.root);
            for kind in EntityKind::ALL {
                let prefix = config.discovery.prefix(kind);
                if desk.locator().candidates(kind)?.is_empty() {
                    let address = workbook.create(prefix)?;
                    eprintln!("created {} resource {}", kind, address);
                }
            }
            if !emit(desk.discover())? {
                return Ok(false);
            }
            emit(desk.ensure_headers())
        }
        Commands::Config { write: Some(path) } => {
            config.save(&path)?;
            eprintln!("wrote {}", path);
            Ok(true)
        }
        Commands::Config { write: None } => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(true)
        }
        Commands::Access { identity, kind } => emit(desk.has_access(&identity, kind)),
        Commands::Member { command } => match command {
            MemberCommand::List { status: Some(status) } => emit(desk.members_by_status(status)),
            MemberCommand::List { status: None } => emit(desk.list_members()),
            MemberCommand::Show { id } => emit(desk.get_member(&id)),
            MemberCommand::Add {
                name,
                email,
                phone,
                notes,
            } => emit(desk.create_member(NewMember {
                name,
                email,
                phone,
                notes,
            })),
            MemberCommand::Search { query } => emit(desk.search_members(&query)),
            MemberCommand::SetStatus { id, status } => emit(desk.update_member(
                &id,
                &MemberUpdate {
                    status: Some(status),
                    ..Default::default()
                },
            )),
            MemberCommand::Delete { id } => emit(desk.delete_member(&id)),
        },
        Commands::Item { command } => match command {
            ItemCommand::List { status: Some(status) } => emit(desk.items_by_status(status)),
            ItemCommand::List { status: None } => emit(desk.list_items()),
            ItemCommand::Show { id } => emit(desk.get_item(&id)),
            ItemCommand::Add {
                title,
                author,
                item_type,
                code,
                notes,
            } => emit(desk.create_item(NewItem {
                title,
                author,
                item_type,
                external_code: code,
                notes,
            })),
            ItemCommand::Search { query } => emit(desk.search_items(&query)),
            ItemCommand::History { id } => emit(desk.item_history(&id)),
            ItemCommand::Delete { id } => emit(desk.delete_item(&id)),
        },
        Commands::Checkout { member, item, days } => emit(desk.checkout(&member, &item, days)),
        Commands::Return { transaction } => emit(desk.process_return(&transaction)),
        Commands::Extend { transaction, days } => emit(desk.extend(&transaction, days)),
        Commands::Lost { transaction } => emit(desk.mark_lost(&transaction)),
        Commands::Overdue => emit(desk.update_overdue_statuses()),
        Commands::Loans { member: Some(member), .. } => emit(desk.member_loans(&member)),
        Commands::Loans { member: None, overdue: true } => emit(desk.overdue_loans()),
        Commands::Loans { member: None, overdue: false } => emit(desk.list_transactions()),
    }
}
