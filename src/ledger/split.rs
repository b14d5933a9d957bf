//! Apportions one expense among its participants.
//!
//! A split rule carries its own parameters; resolving it either yields the
//! amount each participant owes, or a [`ValidationError`]. We never
//! approximate: an inconsistent rule is rejected before anything is created.

use super::{is_negligible, Amount, UserId};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

const ONE_HUNDRED: Amount = dec!(100);

/// Why a split (or a settlement) was rejected.
#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(Amount),

    #[error("no participants")]
    NoParticipants,

    #[error("\"{0}\" is listed more than once")]
    DuplicateParticipant(UserId),

    #[error("negative value for \"{0}\"")]
    NegativeValue(UserId),

    /// Exact amounts don't add up to the expense amount.
    #[error("sum mismatch: splits add up to {splits}, expense is {expense}")]
    SumMismatch { splits: Amount, expense: Amount },

    #[error("percentage mismatch: percentages add up to {0}%")]
    PercentageMismatch(Amount),

    #[error("zero shares")]
    ZeroShares,

    /// The values are too large to be added or multiplied.
    #[error("amounts are too large")]
    Overflow,

    #[error("\"{0}\" cannot settle with themselves")]
    SelfSettlement(UserId),
}

/// How an expense is divided, along with the parameters of each rule.
#[derive(Debug, Clone, PartialEq)]
pub enum SplitRule {
    /// Everyone listed owes the same share.
    Equal(Vec<UserId>),
    /// Everyone owes a fixed amount.
    Exact(Vec<(UserId, Amount)>),
    /// Everyone owes a percentage (0-100) of the amount.
    Percentage(Vec<(UserId, Amount)>),
    /// Everyone owes in proportion to their share count.
    Shares(Vec<(UserId, u32)>),
}

/// The rule name, without its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitKind {
    Equal,
    Exact,
    Percentage,
    Shares,
}

impl fmt::Display for SplitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Equal => "equal",
            Self::Exact => "exact",
            Self::Percentage => "percentage",
            Self::Shares => "shares",
        };
        f.write_str(name)
    }
}

/// What a single participant owes for one expense.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSplit {
    pub user: UserId,
    pub amount: Amount,
}

impl ResolvedSplit {
    fn new(user: &str, amount: Amount) -> Self {
        Self {
            user: user.to_owned(),
            amount,
        }
    }
}

impl SplitRule {
    pub fn kind(&self) -> SplitKind {
        match self {
            Self::Equal(_) => SplitKind::Equal,
            Self::Exact(_) => SplitKind::Exact,
            Self::Percentage(_) => SplitKind::Percentage,
            Self::Shares(_) => SplitKind::Shares,
        }
    }

    fn users(&self) -> Vec<&str> {
        match self {
            Self::Equal(users) => users.iter().map(String::as_str).collect(),
            Self::Exact(entries) | Self::Percentage(entries) => {
                entries.iter().map(|(user, _)| user.as_str()).collect()
            }
            Self::Shares(entries) => entries.iter().map(|(user, _)| user.as_str()).collect(),
        }
    }

    /// Resolve the rule against an expense amount.
    ///
    /// The returned splits keep the order in which participants were given.
    pub fn resolve(&self, amount: Amount) -> Result<Vec<ResolvedSplit>, ValidationError> {
        if amount <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount(amount));
        }

        let users = self.users();
        if users.is_empty() {
            return Err(ValidationError::NoParticipants);
        }

        let mut seen = HashSet::with_capacity(users.len());
        if let Some(duplicate) = users.into_iter().find(|user| !seen.insert(*user)) {
            return Err(ValidationError::DuplicateParticipant(duplicate.to_owned()));
        }

        match self {
            Self::Equal(users) => Ok(resolve_equal(amount, users)),
            Self::Exact(entries) => resolve_exact(amount, entries),
            Self::Percentage(entries) => resolve_percentage(amount, entries),
            Self::Shares(entries) => resolve_shares(amount, entries),
        }
    }
}

// The quotient is not redistributed: 10 over 3 gives 3.333... to everyone,
// and the last participant doesn't absorb the leftover.
fn resolve_equal(amount: Amount, users: &[UserId]) -> Vec<ResolvedSplit> {
    let share = amount / Decimal::from(users.len());

    users
        .iter()
        .map(|user| ResolvedSplit::new(user, share))
        .collect()
}

fn resolve_exact(
    amount: Amount,
    entries: &[(UserId, Amount)],
) -> Result<Vec<ResolvedSplit>, ValidationError> {
    reject_negative(entries)?;

    let total = checked_total(entries)?;
    if !is_negligible(total - amount) {
        return Err(ValidationError::SumMismatch {
            splits: total,
            expense: amount,
        });
    }

    Ok(entries
        .iter()
        .map(|(user, owed)| ResolvedSplit::new(user, *owed))
        .collect())
}

fn resolve_percentage(
    amount: Amount,
    entries: &[(UserId, Amount)],
) -> Result<Vec<ResolvedSplit>, ValidationError> {
    reject_negative(entries)?;

    let total = checked_total(entries)?;
    if !is_negligible(total - ONE_HUNDRED) {
        return Err(ValidationError::PercentageMismatch(total));
    }

    entries
        .iter()
        .map(|(user, percentage)| {
            (*percentage / ONE_HUNDRED)
                .checked_mul(amount)
                .map(|owed| ResolvedSplit::new(user, owed))
                .ok_or(ValidationError::Overflow)
        })
        .collect()
}

fn resolve_shares(
    amount: Amount,
    entries: &[(UserId, u32)],
) -> Result<Vec<ResolvedSplit>, ValidationError> {
    let total: u64 = entries.iter().map(|(_, shares)| u64::from(*shares)).sum();
    if total == 0 {
        return Err(ValidationError::ZeroShares);
    }
    let total = Decimal::from(total);

    // Multiplying first keeps the quotient exact whenever it can be.
    entries
        .iter()
        .map(|(user, shares)| {
            amount
                .checked_mul(Decimal::from(*shares))
                .map(|owed| ResolvedSplit::new(user, owed / total))
                .ok_or(ValidationError::Overflow)
        })
        .collect()
}

fn checked_total(entries: &[(UserId, Amount)]) -> Result<Amount, ValidationError> {
    entries.iter().try_fold(Decimal::ZERO, |total, (_, value)| {
        total.checked_add(*value).ok_or(ValidationError::Overflow)
    })
}

fn reject_negative(entries: &[(UserId, Amount)]) -> Result<(), ValidationError> {
    match entries.iter().find(|(_, value)| value.is_sign_negative() && !value.is_zero()) {
        Some((user, _)) => Err(ValidationError::NegativeValue(user.clone())),
        None => Ok(()),
    }
}
