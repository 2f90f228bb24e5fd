// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tandem - partner pairing and real-time sync for two-person households.
//!
//! This is the binary entry point: the server plus offline account tools.

mod admin;
mod prompt;
mod serve;
mod shutdown;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tandem_config::TandemConfig;
use tandem_core::TandemError;

/// Tandem - partner pairing and real-time sync.
#[derive(Parser, Debug)]
#[command(name = "tandem", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP and WebSocket server.
    Serve,
    /// Manage accounts.
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Manage bearer tokens.
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
    /// Inspect configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum UserAction {
    /// Create an account. The password comes from TANDEM_PASSWORD or a prompt.
    Add {
        email: String,
        #[arg(long)]
        name: String,
    },
    /// Deactivate an account and unlink its partner.
    Deactivate {
        /// User id or email.
        user: String,
    },
    /// List all accounts.
    List,
}

#[derive(Subcommand, Debug)]
enum TokenAction {
    /// Issue a bearer token for an account.
    Issue {
        /// User id or email.
        user: String,
        /// Lifetime in hours. Defaults to `auth.token_ttl_hours`.
        #[arg(long)]
        ttl_hours: Option<u64>,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Validate configuration and print the effective values.
    Check,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => tandem_config::load_and_validate_path(path),
        None => tandem_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            tandem_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::User { action }) => run_user(action, &config).await,
        Some(Commands::Token { action }) => run_token(action, &config).await,
        Some(Commands::Config {
            action: ConfigAction::Check,
        }) => run_config_check(&config),
        None => {
            println!("tandem: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("tandem: {e}");
        std::process::exit(1);
    }
}

async fn run_user(action: UserAction, config: &TandemConfig) -> Result<(), TandemError> {
    let store = admin::open_store(&config.storage).await?;
    match action {
        UserAction::Add { email, name } => {
            let password = prompt::new_password()?;
            let user = admin::add_user(&store, &email, &name, &password).await?;
            println!("created {} ({})", user.email, user.id);
        }
        UserAction::Deactivate { user } => match admin::deactivate_user(&store, &user).await? {
            Some(partner) => println!("deactivated {user}; unlinked partner {partner}"),
            None => println!("deactivated {user}"),
        },
        UserAction::List => {
            let users = admin::list_users(&store).await?;
            print!("{}", admin::format_user_table(&users));
        }
    }
    store.close().await
}

async fn run_token(action: TokenAction, config: &TandemConfig) -> Result<(), TandemError> {
    let TokenAction::Issue { user, ttl_hours } = action;
    let ttl = ttl_hours
        .map(|hours| Duration::from_secs(hours.saturating_mul(3600)))
        .unwrap_or_else(|| config.auth.token_ttl());

    let store = admin::open_store(&config.storage).await?;
    let issued = admin::issue_token(&store, &user, ttl).await?;
    println!("{}", issued.token);
    eprintln!("expires {}", issued.expires_at);
    store.close().await
}

fn run_config_check(config: &TandemConfig) -> Result<(), TandemError> {
    let rendered = toml_summary(config)?;
    println!("configuration ok\n\n{rendered}");
    Ok(())
}

fn toml_summary(config: &TandemConfig) -> Result<String, TandemError> {
    toml::to_string_pretty(config)
        .map_err(|e| TandemError::Config(format!("failed to render configuration: {e}")))
}
