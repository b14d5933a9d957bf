use crate::error_handler;
use crate::input;
use crate::ledger::{
    balance::aggregate, expense::Expense, expense::Settlement, simplify::simplify,
    summary::Position, UserId,
};
use crate::notify::{self, Notification, Notifier};
use crate::output;

use std::sync::{mpsc, Arc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to write report: {0}")]
    Output(#[from] csv::Error),
}

/// What to write once the balances are known.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Report {
    /// Who owes whom (`from,to,amount`).
    #[default]
    Transfers,
    /// Every user's net balance (`user,balance`).
    Balances,
    /// Where one user stands (`user,owed_to_you,you_owe,net`).
    Position(UserId),
}

#[derive(Default)]
pub struct Options {
    pub report: Report,

    /// Told about every expense that gets created, if set.
    pub notifier: Option<Arc<dyn Notifier>>,
}

/// What went into the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub expenses: usize,
    pub settlements: usize,
    pub rejected: usize,
}

/// Read a group's history, and write the requested report to `output_stream`.
///
/// Rejected records are logged and left out; only failing to write the report
/// is an error.
pub fn run(
    expenses_stream: (impl std::io::Read + Send + 'static),
    settlements_stream: (impl std::io::Read + Send + 'static),
    output_stream: impl std::io::Write,
    options: &Options,
) -> Result<Stats, Error> {
    let (drafts, expense_errors) = input::expenses(expenses_stream);
    let (settlements, settlement_errors) = input::settlements(settlements_stream);
    let (validation_tx, validation_rx) = mpsc::channel();

    let sinks = error_handler::sink(vec![expense_errors, settlement_errors], validation_rx);

    let mut expenses: Vec<Expense> = Vec::new();
    let mut deliveries = Vec::new();
    for draft in drafts {
        match draft.create() {
            Ok(expense) => {
                if let Some(notifier) = &options.notifier {
                    deliveries.push(notify::dispatch(
                        Arc::clone(notifier),
                        Notification::expense_created(&expense),
                    ));
                }
                expenses.push(expense);
            }
            Err(err) => {
                // The sink outlives this loop, so the receiver is still there.
                let _ = validation_tx.send(err);
            }
        }
    }
    drop(validation_tx);

    let settlements: Vec<Settlement> = settlements.iter().collect();
    let balance = aggregate(&expenses, &settlements);

    match &options.report {
        Report::Transfers => output::write_transfers(output_stream, &simplify(&balance))?,
        Report::Balances => output::write_balances(output_stream, &balance)?,
        Report::Position(user) => {
            let position = Position::of(user, &simplify(&balance));
            output::write_position(output_stream, user, &position)?
        }
    }

    // A sink thread only panics if logging does, which doesn't lose any record.
    let rejected: usize = sinks
        .into_iter()
        .map(|handle| handle.join().unwrap_or(0))
        .sum();

    // Delivery outcomes don't matter, but we let them finish before returning.
    for delivery in deliveries {
        let _ = delivery.join();
    }

    let stats = Stats {
        expenses: expenses.len(),
        settlements: settlements.len(),
        rejected,
    };
    tracing::info!(
        expenses = stats.expenses,
        settlements = stats.settlements,
        rejected = stats.rejected,
        "processed group history"
    );

    Ok(stats)
}
