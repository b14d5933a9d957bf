use super::split::{ResolvedSplit, SplitKind, SplitRule, ValidationError};
use super::{Amount, ExpenseId, UserId};

use rust_decimal::Decimal;

/// A shared expense, with the amount each participant owes.
///
/// Expenses can only be created by resolving a split rule, so the splits of an
/// existing expense always add up to its amount.
#[derive(Debug, Clone, PartialEq)]
pub struct Expense {
    pub id: ExpenseId,
    pub description: String,
    pub payer: UserId,
    pub amount: Amount,
    pub kind: SplitKind,
    pub splits: Vec<ResolvedSplit>,
}

impl Expense {
    pub fn new(
        id: ExpenseId,
        description: impl Into<String>,
        payer: impl Into<UserId>,
        amount: Amount,
        rule: &SplitRule,
    ) -> Result<Self, ValidationError> {
        let splits = rule.resolve(amount)?;

        Ok(Self {
            id,
            description: description.into(),
            payer: payer.into(),
            amount,
            kind: rule.kind(),
            splits,
        })
    }

    /// Everyone who owes a part of this expense, except whoever paid for it.
    pub fn participants_besides_payer(&self) -> Vec<UserId> {
        let mut participants: Vec<UserId> = Vec::with_capacity(self.splits.len());
        for split in &self.splits {
            if split.user != self.payer && !participants.contains(&split.user) {
                participants.push(split.user.clone());
            }
        }
        participants
    }
}

/// A direct payment from `from` to `to`, which reduces what `from` owes `to`.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub from: UserId,
    pub to: UserId,
    pub amount: Amount,
}

impl Settlement {
    pub fn new(
        from: impl Into<UserId>,
        to: impl Into<UserId>,
        amount: Amount,
    ) -> Result<Self, ValidationError> {
        let (from, to) = (from.into(), to.into());

        if amount <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount(amount));
        }
        if from == to {
            return Err(ValidationError::SelfSettlement(from));
        }

        Ok(Self { from, to, amount })
    }
}

#[cfg(test)]
mod tests {
    use super::{Expense, Settlement};
    use crate::ledger::split::{SplitKind, SplitRule, ValidationError};

    use rust_decimal_macros::dec;

    #[test]
    fn test_new_expense() {
        let rule = SplitRule::Percentage(vec![
            ("alice".to_string(), dec!(60)),
            ("bob".to_string(), dec!(40)),
        ]);
        let expense =
            Expense::new(1, "groceries", "alice", dec!(100), &rule).expect("should create expense");

        assert_eq!(SplitKind::Percentage, expense.kind);
        assert_eq!("alice", expense.payer);
        assert_eq!(2, expense.splits.len());
        assert_eq!(dec!(60), expense.splits[0].amount);
        assert_eq!(dec!(40), expense.splits[1].amount);
    }

    #[test]
    // A rejected split must not produce an expense.
    fn test_new_expense_rejected() {
        let rule = SplitRule::Exact(vec![
            ("alice".to_string(), dec!(10)),
            ("bob".to_string(), dec!(10)),
        ]);
        let got = Expense::new(1, "dinner", "alice", dec!(50), &rule);

        assert_eq!(
            Err(ValidationError::SumMismatch {
                splits: dec!(20),
                expense: dec!(50)
            }),
            got
        );
    }

    #[test]
    fn test_participants_besides_payer() {
        let rule = SplitRule::Equal(vec![
            "carol".to_string(),
            "alice".to_string(),
            "bob".to_string(),
        ]);
        let expense = Expense::new(1, "taxi", "alice", dec!(30), &rule).unwrap();

        assert_eq!(
            vec!["carol".to_string(), "bob".to_string()],
            expense.participants_besides_payer()
        );
    }

    #[test]
    fn test_new_settlement() {
        let settlement = Settlement::new("bob", "alice", dec!(12.5)).unwrap();
        assert_eq!("bob", settlement.from);
        assert_eq!("alice", settlement.to);
        assert_eq!(dec!(12.5), settlement.amount);

        for (from, to, amount, want) in vec![
            ("bob", "alice", dec!(0), ValidationError::NonPositiveAmount(dec!(0))),
            ("bob", "alice", dec!(-1), ValidationError::NonPositiveAmount(dec!(-1))),
            ("bob", "bob", dec!(5), ValidationError::SelfSettlement("bob".to_string())),
        ] {
            assert_eq!(Err(want), Settlement::new(from, to, amount));
        }
    }
}
