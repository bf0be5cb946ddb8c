// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Admin command line for the flagstore flag and variant store.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use flagstore_config::{LogFormat, LoggingConfig, StoreConfig};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

use commands::{Command, Store};

/// flagstore - manage feature flags and their variants
#[derive(Parser, Debug)]
#[command(name = "flagstore", version, about, long_about = None)]
struct Args {
	/// Path to custom configuration file
	#[arg(short, long, env = "FLAGSTORE_CONFIG")]
	config: Option<PathBuf>,

	/// Database URL (overrides config)
	#[arg(long)]
	database_url: Option<String>,

	/// Log level (overrides config)
	#[arg(short, long)]
	log_level: Option<String>,

	/// Output logs as JSON (overrides config)
	#[arg(long)]
	json_logs: bool,

	#[command(subcommand)]
	command: Command,
}

impl Args {
	fn load_config(&self) -> Result<StoreConfig> {
		let mut config = match &self.config {
			Some(path) => flagstore_config::load_config_with_file(path)?,
			None => flagstore_config::load_config()?,
		};

		if let Some(url) = &self.database_url {
			config.database.url = url.clone();
		}
		if let Some(level) = &self.log_level {
			config.logging.level = level.clone();
		}
		if self.json_logs {
			config.logging.format = LogFormat::Json;
		}
		Ok(config)
	}
}

// Logs go to stderr; stdout carries command output.
fn init_tracing(logging: &LoggingConfig) {
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

	match logging.format {
		LogFormat::Json => {
			tracing_subscriber::registry()
				.with(filter)
				.with(fmt::layer().json().with_writer(std::io::stderr))
				.init();
		}
		LogFormat::Pretty => {
			tracing_subscriber::registry()
				.with(filter)
				.with(fmt::layer().with_writer(std::io::stderr))
				.init();
		}
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	let args = Args::parse();
	let config = args.load_config()?;
	init_tracing(&config.logging);

	tracing::debug!(database = %config.database.url, command = ?args.command, "starting flagstore");

	let store = Store::open(&config.database).await?;
	if let Some(output) = commands::run(&store, args.command).await? {
		println!("{}", serde_json::to_string_pretty(&output)?);
	}
	Ok(())
}
