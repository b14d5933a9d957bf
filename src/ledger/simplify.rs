//! Turns net balances into a short list of direct payments.
//!
//! This is a greedy heuristic: the largest remaining debtor pays the largest
//! remaining creditor, as much as they can, until nobody is left. It usually
//! produces few transfers but doesn't guarantee the minimum.

use super::balance::NetBalance;
use super::{reported, Amount, UserId, EPSILON};

use std::cmp::Ordering;

/// A suggested payment from a debtor to a creditor.
#[derive(Debug, Clone, PartialEq)]
pub struct Transfer {
    pub from: UserId,
    pub to: UserId,
    pub amount: Amount,
}

/// Someone's remaining credit or debt, as a positive magnitude.
struct Outstanding<'a> {
    user: &'a UserId,
    remaining: Amount,
}

impl<'a> Outstanding<'a> {
    fn is_cleared(&self) -> bool {
        self.remaining < EPSILON
    }
}

// Largest magnitude first. Equal magnitudes fall back to the user id, so the
// output doesn't depend on anything but the balances.
fn largest_first(a: &Outstanding, b: &Outstanding) -> Ordering {
    b.remaining
        .cmp(&a.remaining)
        .then_with(|| a.user.cmp(b.user))
}

/// Compute the transfers that would bring every balance back to zero.
///
/// Users within epsilon of zero are left out. Transfer amounts are rounded to
/// two decimal places, but the walk itself is done on exact amounts.
pub fn simplify(balance: &NetBalance) -> Vec<Transfer> {
    let mut creditors: Vec<Outstanding> = Vec::new();
    let mut debtors: Vec<Outstanding> = Vec::new();

    for (user, amount) in balance.iter() {
        if amount > EPSILON {
            creditors.push(Outstanding {
                user,
                remaining: amount,
            });
        } else if amount < -EPSILON {
            debtors.push(Outstanding {
                user,
                remaining: -amount,
            });
        }
    }

    creditors.sort_by(largest_first);
    debtors.sort_by(largest_first);

    let mut transfers = Vec::with_capacity(creditors.len() + debtors.len());
    let (mut i, mut j) = (0, 0);

    while i < creditors.len() && j < debtors.len() {
        let amount = creditors[i].remaining.min(debtors[j].remaining);

        if amount > EPSILON {
            transfers.push(Transfer {
                from: debtors[j].user.clone(),
                to: creditors[i].user.clone(),
                amount: reported(amount),
            });
        }

        creditors[i].remaining -= amount;
        debtors[j].remaining -= amount;

        // Both can clear on the same step.
        if creditors[i].is_cleared() {
            i += 1;
        }
        if debtors[j].is_cleared() {
            j += 1;
        }
    }

    tracing::debug!(
        creditors = creditors.len(),
        debtors = debtors.len(),
        transfers = transfers.len(),
        "simplified debts"
    );

    transfers
}
