//! GYA Ledger - maintenance binary
//!
//! # Usage
//!
//! ```bash
//! gya-ledger migrate   # apply migrations and seed the banks
//! gya-ledger report    # print bank balances (default)
//! gya-ledger report --json
//! gya-ledger health
//! ```
//!
//! # Environment Variables
//!
//! * `GYA_DATABASE_URL` - PostgreSQL connection string
//! * `GYA_MAX_CONNECTIONS` / `GYA_MIN_CONNECTIONS` - pool bounds
//! * `GYA_LOCK_TIMEOUT_MS` - row lock wait bound for sessions
//! * `GYA_LOG_LEVEL` - trace, debug, info, warn, error (default: info)
//! * `GYA_LOG_JSON` - `true` for JSON log lines

use anyhow::{bail, Context};

use core_kernel::AdapterHealth;
use gya_engine::{init_tracing, postgres_engine, prepare_database, EngineConfig};
use infra_db::create_pool;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = EngineConfig::from_env().context("loading configuration")?;
    init_tracing(&config.log_level, config.log_json)?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("report");
    let json = args.iter().any(|a| a == "--json");

    match command {
        "migrate" => {
            prepare_database(&config).await.context("preparing database")?;
            tracing::info!("Migrations applied and banks seeded");
        }
        "report" => {
            let pool = create_pool(config.database()).await.context("connecting to database")?;
            let engine = postgres_engine(pool, &config);
            let report = engine.balance_report().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{report}");
            }
        }
        "health" => {
            let pool = create_pool(config.database()).await.context("connecting to database")?;
            let health = postgres_engine(pool, &config).health().await;
            println!("{}", serde_json::to_string_pretty(&health)?);
            if health.status != AdapterHealth::Healthy {
                bail!("ledger store is {:?}", health.status);
            }
        }
        other => bail!("unknown command `{other}` (expected migrate, report or health)"),
    }

    Ok(())
}
