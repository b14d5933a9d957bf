use super::simplify::Transfer;
use super::{reported, Amount};

use rust_decimal::Decimal;

/// Where one user stands, summed over the transfers of one or more groups.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub owed_to_you: Amount,
    pub you_owe: Amount,
}

impl Position {
    pub const fn zero() -> Self {
        Self {
            owed_to_you: Decimal::ZERO,
            you_owe: Decimal::ZERO,
        }
    }

    /// The position of `user` from a group's simplified transfers.
    pub fn of(user: &str, transfers: &[Transfer]) -> Self {
        transfers.iter().fold(Self::zero(), |mut position, transfer| {
            if transfer.to == user {
                position.owed_to_you += transfer.amount;
            }
            if transfer.from == user {
                position.you_owe += transfer.amount;
            }
            position
        })
    }

    /// Accumulate positions across groups.
    pub fn merge(self, other: Self) -> Self {
        Self {
            owed_to_you: self.owed_to_you + other.owed_to_you,
            you_owe: self.you_owe + other.you_owe,
        }
    }

    /// Positive when the user is owed more than they owe.
    pub fn net(&self) -> Amount {
        reported(self.owed_to_you - self.you_owe)
    }

    /// Same position, with every figure rounded for reporting.
    pub fn reported(&self) -> Self {
        Self {
            owed_to_you: reported(self.owed_to_you),
            you_owe: reported(self.you_owe),
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::zero()
    }
}
