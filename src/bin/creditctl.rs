use chrono::Utc;
use clap::{Parser, Subcommand};
use hairstyle_api_proxy::ledger::{EntryCategory, LedgerEntry, LedgerStore};
use hairstyle_api_proxy::{Config, SqliteLedger};

#[derive(Parser, Debug)]
#[command(name = "creditctl", about = "CLI for the hairstyle credit ledger", version)]
struct Cli {
    /// Override DATABASE_PATH
    #[arg(global = true, long)]
    database: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show a user's current credit balance
    Balance {
        user_id: String,
    },
    /// Grant credits to a user (appends a `grant` ledger entry)
    Grant {
        user_id: String,
        /// Number of credits to add
        amount: i64,
    },
    /// List a user's ledger entries, oldest first
    History {
        user_id: String,
        /// Print raw JSON instead of human-readable lines
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    Config::dotenv_load();
    let cli = Cli::parse();

    let database_path = cli.database.unwrap_or_else(|| {
        Config::new()
            .expect("Failed to load configuration")
            .database_path
    });
    let ledger = SqliteLedger::new(database_path);
    ledger
        .init()
        .await
        .expect("Failed to initialize the credit ledger");

    match cli.command {
        Commands::Balance { user_id } => {
            let credits = ledger
                .get_balance(&user_id)
                .await
                .expect("Failed to read balance");
            println!("{credits}");
        }
        Commands::Grant { user_id, amount } => {
            if amount <= 0 {
                eprintln!("amount must be positive");
                std::process::exit(1);
            }
            let balance = ledger
                .get_balance(&user_id)
                .await
                .expect("Failed to read balance");
            let new_balance = balance + amount;
            ledger
                .set_balance(&user_id, new_balance)
                .await
                .expect("Failed to write balance");
            ledger
                .append_entry(LedgerEntry {
                    user_id: user_id.clone(),
                    delta: amount,
                    balance_after: new_balance,
                    description: format!("manual grant of {amount}"),
                    category: EntryCategory::Grant,
                    created_at: Utc::now(),
                })
                .await
                .expect("Failed to append ledger entry");
            println!("{user_id}: {balance} -> {new_balance}");
        }
        Commands::History { user_id, json } => {
            let entries = ledger
                .entries_for(&user_id)
                .await
                .expect("Failed to read ledger entries");
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&entries).expect("Failed to serialize entries")
                );
            } else {
                for entry in entries {
                    println!(
                        "{} {:>3} -> {:>3}  {:<6}  {}",
                        entry.created_at.to_rfc3339(),
                        entry.delta,
                        entry.balance_after,
                        entry.category.as_str(),
                        entry.description
                    );
                }
            }
        }
    }
}
