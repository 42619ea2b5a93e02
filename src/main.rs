use std::collections::HashMap;
use std::{env, fs::File, path::Path};

use futures::StreamExt;
use tracing_subscriber::EnvFilter;

use ledger_engine::domain::{
    AccountId, AccountKind, AccountStore, Currency, Page, TransactionKind, UserId,
};
use ledger_engine::engine::{DepositRequest, Engine, TransferRequest, WithdrawRequest};
use ledger_engine::ingestion::{CsvReader, Operation, OperationStream};
use ledger_engine::memory_store::InMemoryStore;

/// Replays a CSV script of money movements through the engine against the
/// in-memory store, then prints the final balances and the ledger.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut args = env::args();
    let file_path = args
        .nth(1)
        .ok_or("usage: ledger_engine <script.csv>")?;
    let file = File::open(Path::new(&file_path))?;

    let engine = Engine::new(InMemoryStore::new());
    // Each label gets its own principal, so ownership checks hold.
    let mut labels: HashMap<String, (AccountId, UserId)> = HashMap::new();
    let mut next_user = 0u64;

    let mut ops = CsvReader::new(file).stream();
    while let Some(op) = ops.next().await {
        let outcome = match op {
            Ok(op) => apply(&engine, &mut labels, &mut next_user, op),
            Err(e) => Err(e.to_string()),
        };
        if let Err(e) = outcome {
            tracing::warn!(error = %e, "operation skipped");
        }
    }

    print_summary(&engine, &labels);
    Ok(())
}

fn apply(
    engine: &Engine<InMemoryStore>,
    labels: &mut HashMap<String, (AccountId, UserId)>,
    next_user: &mut u64,
    op: Operation,
) -> Result<(), String> {
    match op {
        Operation::Open {
            label,
            opening_balance,
        } => {
            *next_user += 1;
            let owner = UserId(*next_user);
            let account = engine
                .store()
                .open_account(
                    owner,
                    &label,
                    AccountKind::Checking,
                    Currency::PHP,
                    opening_balance,
                )
                .map_err(|e| e.to_string())?;
            labels.insert(label, (account.id, owner));
            Ok(())
        }
        Operation::Deposit {
            label,
            amount,
            description,
        } => {
            let (account_id, principal) = resolve(labels, &label)?;
            engine
                .deposit(
                    DepositRequest {
                        account_id,
                        amount,
                        description,
                        idempotency_key: None,
                    },
                    principal,
                )
                .map(drop)
                .map_err(|e| e.to_string())
        }
        Operation::Withdraw {
            label,
            amount,
            description,
        } => {
            let (account_id, principal) = resolve(labels, &label)?;
            engine
                .withdraw(
                    WithdrawRequest {
                        account_id,
                        amount,
                        description,
                        idempotency_key: None,
                    },
                    principal,
                )
                .map(drop)
                .map_err(|e| e.to_string())
        }
        Operation::Transfer {
            label,
            to,
            amount,
            description,
        } => {
            let (source_account_id, principal) = resolve(labels, &label)?;
            // "to" may be another label or a raw account number; unknown
            // numbers become external transfers.
            let destination_account_number = match labels.get(&to) {
                Some((id, _)) => engine
                    .store()
                    .account_by_id(*id)
                    .map_err(|e| e.to_string())?
                    .map(|a| a.number)
                    .unwrap_or(to),
                None => to,
            };
            engine
                .transfer(
                    TransferRequest {
                        source_account_id,
                        destination_account_number,
                        amount,
                        description,
                        recipient_name: None,
                        recipient_bank: None,
                        idempotency_key: None,
                    },
                    principal,
                )
                .map(drop)
                .map_err(|e| e.to_string())
        }
    }
}

fn resolve(
    labels: &HashMap<String, (AccountId, UserId)>,
    label: &str,
) -> Result<(AccountId, UserId), String> {
    labels
        .get(label)
        .copied()
        .ok_or_else(|| format!("unknown account label: {}", label))
}

fn print_summary(engine: &Engine<InMemoryStore>, labels: &HashMap<String, (AccountId, UserId)>) {
    let mut sorted: Vec<_> = labels.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    println!("account,balance,currency,status");
    for (label, (account_id, _)) in &sorted {
        if let Ok(Some(account)) = engine.store().account_by_id(*account_id) {
            println!(
                "{},{},{},{}",
                label, account.balance, account.currency, account.status
            );
        }
    }

    println!("kind,amount,balance_after,destination");
    for (label, (account_id, principal)) in &sorted {
        let Ok(mut views) =
            engine.transactions_for_account(*account_id, Page::of(0, usize::MAX), *principal)
        else {
            continue;
        };
        // Oldest first for readability; skip incoming transfer legs so
        // each entry prints once, under its originating account.
        views.reverse();
        for view in views
            .iter()
            .filter(|v| !(v.kind == TransactionKind::Transfer && v.is_credit))
        {
            println!(
                "{}:{},{},{},{}",
                label,
                view.kind,
                view.amount,
                view.balance_after,
                view.destination_account_number.as_deref().unwrap_or("-")
            );
        }
    }
}
