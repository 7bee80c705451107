//! db-record - Main entry point.
//!
//! Connects to one MySQL database, runs a single operation and prints the
//! result as pretty JSON on stdout.

use clap::Parser;
use db_record::config::{Cli, Command, parse_value};
use db_record::{Database, DbError, SqlValue};
use serde_json::Value as JsonValue;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

async fn run(db: &Database, command: &Command) -> Result<JsonValue, DbError> {
    let output = match command {
        Command::Query { sql, values } => {
            let values: Vec<SqlValue> = values.iter().map(|v| parse_value(v)).collect();
            let result = db.query(sql, &values).await?;
            serde_json::to_value(&result).map_err(|e| DbError::internal(e.to_string()))?
        }
        Command::Get { table, id } => db
            .get(table, parse_value(id))
            .await?
            .map(JsonValue::Object)
            .unwrap_or(JsonValue::Null),
        Command::Columns { table, ignore } => {
            JsonValue::from(db.get_table_columns(table, &as_strs(ignore)).await?)
        }
        Command::Types { table, ignore } => {
            JsonValue::Object(db.get_table_column_data_types(table, &as_strs(ignore)).await?)
        }
        Command::Defaults { table, ignore } => JsonValue::Object(
            db.get_table_column_default_values(table, &as_strs(ignore))
                .await?,
        ),
        Command::TableExists { table } => JsonValue::Bool(db.table_exists(table).await?),
    };
    Ok(output)
}

fn as_strs(values: &[String]) -> Vec<&str> {
    values.iter().map(String::as_str).collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let cli = Cli::parse();

    // Initialize logging
    init_tracing(&cli);

    let config = cli.connection_config()?;
    info!(
        addr = %config.display_target(),
        "Starting db-record v{}",
        env!("CARGO_PKG_VERSION")
    );

    let db: Database = Database::open(config).await?;
    let result = run(&db, &cli.command).await;

    if let Err(e) = db.close().await {
        error!(error = %e, "Failed to close connection");
    }

    match result {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Command failed");
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            Err(e.into())
        }
    }
}
