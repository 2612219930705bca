//! Tasfiya CLI - migrations, admin accounts and seed data.
//!
//! # Usage
//!
//! ```bash
//! # Run the SQL migrations and create the session table
//! tasfiya-cli migrate
//!
//! # Create an administrator
//! tasfiya-cli admin create --name "Store Admin" --phone 0501234567 --password '...'
//!
//! # Default settings and demo categories
//! tasfiya-cli seed
//! ```
//!
//! Every command reads `TASFIYA_DATABASE_URL` (or `DATABASE_URL`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "tasfiya-cli")]
#[command(author, version, about = "Tasfiya CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations and create the session table
    Migrate,
    /// Manage administrator accounts
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Insert default settings and demo categories (existing rows are kept)
    Seed,
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create a new administrator
    Create {
        /// Display name
        #[arg(short, long)]
        name: String,

        /// Phone number used to log in
        #[arg(short, long)]
        phone: String,

        /// Password (at least 8 characters)
        #[arg(long, env = "TASFIYA_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    let pool = commands::connect().await?;
    match cli.command {
        Commands::Migrate => commands::migrate::run(pool).await?,
        Commands::Admin { action } => match action {
            AdminAction::Create {
                name,
                phone,
                password,
            } => {
                commands::admin::create(pool, name, phone, password).await?;
            }
        },
        Commands::Seed => commands::seed::run(pool).await?,
    }
    Ok(())
}
