use super::expense::{Expense, Settlement};
use super::{Amount, UserId};

use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// The signed position of every user of a group.
///
/// A positive balance means the group owes that user money, a negative one
/// means the user owes money to the group. Users we've never seen read as zero.
///
/// Balances are keyed by user in ascending order, so iterating over them is
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetBalance {
    balances: BTreeMap<UserId, Amount>,
}

impl NetBalance {
    pub fn new() -> Self {
        Self::default()
    }

    /// The balance of a user, or zero if they have none.
    pub fn get(&self, user: &str) -> Amount {
        self.balances.get(user).copied().unwrap_or(Decimal::ZERO)
    }

    /// Add money the group owes to a user.
    pub fn credit(&mut self, user: &str, amount: Amount) {
        *self.entry(user) += amount;
    }

    /// Add money a user owes to the group.
    pub fn debit(&mut self, user: &str, amount: Amount) {
        *self.entry(user) -= amount;
    }

    pub fn iter(&self) -> impl Iterator<Item = (&UserId, Amount)> {
        self.balances.iter().map(|(user, amount)| (user, *amount))
    }

    /// Sum of all balances. Always zero for a group, give or take the residue
    /// of equal splits that don't terminate.
    pub fn total(&self) -> Amount {
        self.balances.values().sum()
    }

    pub fn len(&self) -> usize {
        self.balances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }

    fn entry(&mut self, user: &str) -> &mut Amount {
        self.balances
            .entry(user.to_owned())
            .or_insert(Decimal::ZERO)
    }
}

impl FromIterator<(UserId, Amount)> for NetBalance {
    fn from_iter<I: IntoIterator<Item = (UserId, Amount)>>(iter: I) -> Self {
        let mut balance = Self::new();
        for (user, amount) in iter {
            balance.credit(&user, amount);
        }
        balance
    }
}

/// Fold a group's whole history into a balance per user.
///
/// The payer of an expense is credited the full amount, and each participant
/// is debited their share (the payer too, if they took part). A settlement
/// credits whoever paid and debits whoever received the money.
///
/// The order of expenses and settlements doesn't matter.
pub fn aggregate(expenses: &[Expense], settlements: &[Settlement]) -> NetBalance {
    let mut balance = NetBalance::new();

    for expense in expenses {
        balance.credit(&expense.payer, expense.amount);
        for split in &expense.splits {
            balance.debit(&split.user, split.amount);
        }
    }

    for settlement in settlements {
        balance.credit(&settlement.from, settlement.amount);
        balance.debit(&settlement.to, settlement.amount);
    }

    balance
}

#[cfg(test)]
mod tests {
    use super::{aggregate, NetBalance};
    use crate::ledger::expense::{Expense, Settlement};
    use crate::ledger::split::SplitRule;
    use crate::ledger::EPSILON;

    use rust_decimal_macros::dec;

    fn equal(users: &[&str]) -> SplitRule {
        SplitRule::Equal(users.iter().map(|user| user.to_string()).collect())
    }

    #[test]
    fn test_unknown_user_reads_as_zero() {
        let mut balance = NetBalance::new();
        assert_eq!(dec!(0), balance.get("nobody"));

        balance.credit("alice", dec!(5));
        balance.debit("alice", dec!(2));
        balance.debit("bob", dec!(3));

        assert_eq!(dec!(3), balance.get("alice"));
        assert_eq!(dec!(-3), balance.get("bob"));
        assert_eq!(dec!(0), balance.get("nobody"));
        assert_eq!(2, balance.len());
    }

    #[test]
    // The payer takes part in the percentage split, so only what the others
    // owe is left in their balance.
    fn test_aggregate_payer_among_participants() {
        let rule = SplitRule::Percentage(vec![
            ("alice".to_string(), dec!(60)),
            ("bob".to_string(), dec!(40)),
        ]);
        let expense = Expense::new(1, "hotel", "alice", dec!(100), &rule).unwrap();

        let balance = aggregate(&[expense], &[]);

        assert_eq!(dec!(40), balance.get("alice"));
        assert_eq!(dec!(-40), balance.get("bob"));
    }

    #[test]
    fn test_aggregate_payer_not_among_participants() {
        let expense = Expense::new(1, "gift", "alice", dec!(50), &equal(&["bob", "carol"])).unwrap();

        let balance = aggregate(&[expense], &[]);

        assert_eq!(dec!(50), balance.get("alice"));
        assert_eq!(dec!(-25), balance.get("bob"));
        assert_eq!(dec!(-25), balance.get("carol"));
    }

    #[test]
    fn test_aggregate_with_settlements() {
        let expense = Expense::new(1, "dinner", "alice", dec!(90), &equal(&["alice", "bob", "carol"])).unwrap();
        let settlements = vec![
            Settlement::new("bob", "alice", dec!(30)).unwrap(),
            Settlement::new("carol", "alice", dec!(10)).unwrap(),
        ];

        let balance = aggregate(&[expense], &settlements);

        assert_eq!(dec!(20), balance.get("alice"));
        assert_eq!(dec!(0), balance.get("bob"));
        assert_eq!(dec!(-20), balance.get("carol"));
    }

    #[test]
    fn test_aggregate_order_does_not_matter() {
        let expenses = vec![
            Expense::new(1, "a", "alice", dec!(90), &equal(&["alice", "bob", "carol"])).unwrap(),
            Expense::new(2, "b", "bob", dec!(17.35), &equal(&["alice", "bob"])).unwrap(),
            Expense::new(3, "c", "carol", dec!(42), &equal(&["bob", "dave"])).unwrap(),
        ];
        let settlements = vec![Settlement::new("dave", "carol", dec!(21)).unwrap()];

        let forward = aggregate(&expenses, &settlements);

        let mut reversed = expenses.clone();
        reversed.reverse();
        let backward = aggregate(&reversed, &settlements);

        assert_eq!(forward, backward);
    }

    #[test]
    // Every amount owed is owed by someone.
    fn test_aggregate_zero_sum() {
        let expenses = vec![
            Expense::new(1, "a", "alice", dec!(10), &equal(&["alice", "bob", "carol"])).unwrap(),
            Expense::new(2, "b", "bob", dec!(100), &equal(&["a", "b", "c", "d", "e", "f", "g"])).unwrap(),
            Expense::new(
                3,
                "c",
                "carol",
                dec!(77.77),
                &SplitRule::Shares(vec![("alice".to_string(), 3), ("dave".to_string(), 4)]),
            )
            .unwrap(),
            Expense::new(
                4,
                "d",
                "dave",
                dec!(33.3),
                &SplitRule::Percentage(vec![
                    ("bob".to_string(), dec!(33.33)),
                    ("carol".to_string(), dec!(66.67)),
                ]),
            )
            .unwrap(),
        ];
        let settlements = vec![
            Settlement::new("bob", "alice", dec!(3.33)).unwrap(),
            Settlement::new("dave", "carol", dec!(12)).unwrap(),
        ];

        let balance = aggregate(&expenses, &settlements);

        assert!(balance.total().abs() < EPSILON, "total is {}", balance.total());
    }

    #[test]
    fn test_aggregate_empty_history() {
        let balance = aggregate(&[], &[]);
        assert!(balance.is_empty());
        assert_eq!(dec!(0), balance.total());
    }

    #[test]
    fn test_from_iter_merges_duplicates() {
        let balance: NetBalance = vec![
            ("alice".to_string(), dec!(10)),
            ("bob".to_string(), dec!(-4)),
            ("alice".to_string(), dec!(-6)),
        ]
        .into_iter()
        .collect();

        assert_eq!(dec!(4), balance.get("alice"));
        assert_eq!(dec!(-4), balance.get("bob"));
    }
}
