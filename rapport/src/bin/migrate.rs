//! `rapport-migrate`: applies, reverts and lists schema migration steps.

use rapport::cli::{self, Exit};
use rapport_core::migrator::Migrator;
use rapport_pg::{PgLedger, PgSchema, PoolConfig};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let command = match cli::parse_args(std::env::args_os()) {
        Ok(command) => command,
        Err(exit) => return exit.into(),
    };

    let config = PoolConfig {
        url: command.database_url.clone(),
        max_connections: 1,
        ..Default::default()
    };
    let pool = match config.connect().await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("migration failed: cannot connect to the database: {e}");
            return Exit::Failure.into();
        }
    };

    let migrator = Migrator::new(PgSchema::new(pool.clone()), PgLedger::new(pool.clone()));
    let exit = cli::run(&command, &migrator).await;
    pool.close().await;
    exit.into()
}
