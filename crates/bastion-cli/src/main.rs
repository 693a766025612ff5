// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Operator command line for bastion.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use bastion_common_secret::SecretString;
use bastion_server_audit::{AuditFilterConfig, AuditLog, AuditSink, SqliteAuditSink};
use bastion_server_auth::PasswordPolicy;
use bastion_server_config::ServerConfig;
use bastion_server_db::AccountRepository;
use bastion_server_manager::AuthManager;
use clap::{Parser, Subcommand};
use sqlx::SqlitePool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// bastion - authentication and authorization manager.
#[derive(Parser, Debug)]
#[command(name = "bastion", about = "Authentication and authorization manager", version)]
struct Args {
	/// Config file to layer over the defaults (environment still wins).
	#[arg(long, global = true, env = "BASTION_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Create the first administrator. Fails once any administrator exists.
	Bootstrap {
		#[arg(long)]
		username: String,
		/// Read from the environment so it never appears in shell history.
		#[arg(long, env = "BASTION_BOOTSTRAP_PASSWORD", hide_env_values = true)]
		password: String,
	},
	/// Hash one password read from stdin and print the PHC string.
	HashPassword,
	/// Print the resolved configuration as JSON.
	ShowConfig,
	/// Print the most recent audit entries, oldest first, one JSON object per line.
	Audit {
		#[arg(long, default_value_t = 50)]
		limit: u32,
	},
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<ServerConfig> {
	let config = match path {
		Some(path) => bastion_server_config::load_config_with_file(path)?,
		None => bastion_server_config::load_config()?,
	};
	Ok(config)
}

fn init_tracing(config: &ServerConfig) {
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| config.logging.level.clone().into());
	let registry = tracing_subscriber::registry().with(filter);

	// Logs go to stderr so command output on stdout stays parseable.
	if config.logging.json {
		registry
			.with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
			.init();
	} else {
		registry
			.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
			.init();
	}
}

async fn open_database(config: &ServerConfig) -> anyhow::Result<SqlitePool> {
	let pool = bastion_server_db::create_pool(&config.database.url, config.database.max_connections)
		.await
		.with_context(|| format!("opening {}", config.database.url))?;
	bastion_server_db::migrate(&pool).await?;
	Ok(pool)
}

/// One line of stdin without its line terminator.
fn read_secret_line(input: impl BufRead) -> anyhow::Result<SecretString> {
	let mut line = String::new();
	let mut input = input;
	input.read_line(&mut line).context("reading password from stdin")?;
	let trimmed = line.trim_end_matches(['\r', '\n']).to_string();
	Ok(SecretString::from(trimmed))
}

async fn bootstrap(config: &ServerConfig, username: &str, password: SecretString) -> anyhow::Result<()> {
	tracing::info!(database = %config.database.url, username, "bootstrapping first administrator");
	let pool = open_database(config).await?;
	let sink = Arc::new(SqliteAuditSink::new(pool.clone(), AuditFilterConfig::all()));
	let manager = AuthManager::new(
		Arc::new(AccountRepository::new(pool.clone())),
		config,
		AuditLog::from_config(&config.audit, vec![sink as Arc<dyn AuditSink>]),
	)?;

	let account = manager.bootstrap(username, &password).await?;
	println!("{}", account.id);
	pool.close().await;
	Ok(())
}

async fn audit(config: &ServerConfig, limit: u32) -> anyhow::Result<()> {
	let pool = open_database(config).await?;
	let sink = SqliteAuditSink::new(pool.clone(), AuditFilterConfig::all());
	let entries = sink.recent(limit).await?;
	tracing::debug!(limit, returned = entries.len(), "read audit trail");
	for entry in entries {
		println!("{}", serde_json::to_string(&entry)?);
	}
	pool.close().await;
	Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();
	let config = load_config(args.config)?;
	init_tracing(&config);

	match args.command {
		Command::Bootstrap { username, password } => {
			bootstrap(&config, &username, SecretString::from(password)).await?;
		}
		Command::HashPassword => {
			let password = read_secret_line(std::io::stdin().lock())?;
			let policy = PasswordPolicy::from_config(&config.password)?;
			let hashed = tokio::task::spawn_blocking(move || policy.hash(&password)).await??;
			tracing::debug!(algorithm = %hashed.algorithm, "password hashed");
			println!("{}", hashed.hash);
		}
		Command::ShowConfig => {
			println!("{}", serde_json::to_string_pretty(&config)?);
		}
		Command::Audit { limit } => {
			audit(&config, limit).await?;
		}
	}

	Ok(())
}
