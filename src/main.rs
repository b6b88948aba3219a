//! ledger-transfer - command line front end
//!
//! ```text
//! ledger-transfer [--env <name>] transfer <from_id> <to_id> <amount> [<currency>]
//! ledger-transfer [--env <name>] account <id>
//! ledger-transfer [--env <name>] accounts [<limit> [<offset>]]
//! ledger-transfer [--env <name>] create-account <owner> <balance> <currency>
//! ```
//!
//! Results are printed to stdout as pretty JSON; logs go to stderr and the
//! configured log file.

use std::sync::Arc;

use anyhow::{Context, bail};
use serde::Serialize;

use ledger_transfer::config::AppConfig;
use ledger_transfer::db::Database;
use ledger_transfer::logging::init_logging;
use ledger_transfer::{
    CreateAccountParams, Currency, ListParams, PgStore, TransferCoordinator, TransferParams,
    TransferRequest, validate_transfer,
};

const USAGE: &str = "usage: ledger-transfer [--env <name>] \
    (transfer <from> <to> <amount> [<currency>] | account <id> | \
    accounts [<limit> [<offset>]] | create-account <owner> <balance> <currency>)";

// ============================================================
// ARGUMENTS
// ============================================================

fn get_env(args: &[String]) -> String {
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Positional args with `--env <name>` removed
fn positional(args: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut skip = false;
    for arg in args.iter().skip(1) {
        if skip {
            skip = false;
            continue;
        }
        if arg == "--env" || arg == "-e" {
            skip = true;
            continue;
        }
        out.push(arg.clone());
    }
    out
}

fn parse<T: std::str::FromStr>(value: Option<&String>, name: &str) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    let raw = value.with_context(|| format!("missing <{name}>\n{USAGE}"))?;
    raw.parse::<T>()
        .map_err(|e| anyhow::anyhow!("invalid <{name}> {raw:?}: {e}"))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ============================================================
// MAIN
// ============================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let env = get_env(&args);
    let cmd = positional(&args);

    let config = AppConfig::load(&env)?;
    let _guard = init_logging(&config)?;
    tracing::info!(env = %env, "ledger-transfer starting");

    let db = Database::connect(&config.database)
        .await
        .context("Failed to connect to PostgreSQL")?;
    db.health_check().await.context("PostgreSQL health check failed")?;

    let store = Arc::new(PgStore::from_database(&db));
    let mut coordinator = TransferCoordinator::new(store);
    if let Some(timeout) = config.transfer.timeout() {
        coordinator = coordinator.with_timeout(timeout);
    }

    match cmd.first().map(String::as_str) {
        Some("transfer") => {
            let from: i64 = parse(cmd.get(1), "from")?;
            let to: i64 = parse(cmd.get(2), "to")?;
            let amount: i64 = parse(cmd.get(3), "amount")?;

            if let Some(raw) = cmd.get(4) {
                let currency: Currency = parse(Some(raw), "currency")?;
                let req = TransferRequest {
                    from_account_id: from,
                    to_account_id: to,
                    amount,
                    currency,
                };
                validate_transfer(&coordinator, &req).await?;
            }

            let result = coordinator
                .transfer(TransferParams::new(from, to, amount))
                .await?;
            print_json(&result)?;
        }
        Some("account") => {
            let id: i64 = parse(cmd.get(1), "id")?;
            print_json(&coordinator.get_account(id).await?)?;
        }
        Some("accounts") => {
            let mut params = ListParams::default();
            if cmd.get(1).is_some() {
                params.limit = parse(cmd.get(1), "limit")?;
            }
            if cmd.get(2).is_some() {
                params.offset = parse(cmd.get(2), "offset")?;
            }
            print_json(&coordinator.list_accounts(params).await?)?;
        }
        Some("create-account") => {
            let params = CreateAccountParams {
                owner: parse(cmd.get(1), "owner")?,
                balance: parse(cmd.get(2), "balance")?,
                currency: parse(cmd.get(3), "currency")?,
            };
            print_json(&coordinator.create_account(params).await?)?;
        }
        Some(other) => bail!("unknown command {other:?}\n{USAGE}"),
        None => bail!("{USAGE}"),
    }

    Ok(())
}
