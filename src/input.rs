use crate::ledger::{
    expense::{Expense, Settlement},
    split::{SplitRule, ValidationError},
    Amount, ExpenseId, UserId,
};

use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::mpsc::{self, Receiver, Sender};

#[derive(Debug, PartialEq)]
pub enum Error {
    Csv(String),    // CSV is malformed
    Format(String), // Data format is incorrect
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err.to_string())
    }
}

/// An expense as read from the input, before its split is resolved.
#[derive(Debug, PartialEq)]
pub struct ExpenseDraft {
    pub id: ExpenseId,
    pub description: String,
    pub payer: UserId,
    pub amount: Amount,
    pub rule: SplitRule,
}

impl ExpenseDraft {
    /// Resolve the split. This is where an expense actually gets created.
    pub fn create(&self) -> Result<Expense, ValidationError> {
        Expense::new(
            self.id,
            self.description.as_str(),
            self.payer.as_str(),
            self.amount,
            &self.rule,
        )
    }
}

fn csv_reader<R: std::io::Read>(
    input_stream: R,
    flexible: bool,
) -> csv::Reader<std::io::BufReader<R>> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(flexible)
        .from_reader(std::io::BufReader::new(input_stream))
}

// Expenses span several rows, one per participant. Rows of the same expense
// must follow each other: a drafted expense is sent as soon as the next one
// starts, so we never have to hold the whole file in memory.
//
// A bad row rejects the whole expense it belongs to, but we keep going with
// the next ones. Rows are read as plain records first, so a row that doesn't
// deserialise can still be tied to its expense by the id in its first column.
// A row without a readable id rejects the expense being read.
pub fn expenses(
    input_stream: (impl std::io::Read + Send + 'static),
) -> (Receiver<ExpenseDraft>, Receiver<Error>) {
    let (draft_tx, draft_rx): (Sender<ExpenseDraft>, Receiver<ExpenseDraft>) = mpsc::channel();
    let (error_tx, error_rx): (Sender<Error>, Receiver<Error>) = mpsc::channel();

    let mut reader = csv_reader(input_stream, true);

    // Sending only fails once the receiving end hung up, in which case
    // nobody is interested in the outcome anymore.
    std::thread::spawn(move || {
        let headers = match reader.headers() {
            Ok(headers) => headers.clone(),
            Err(err) => {
                let _ = error_tx.send(err.into());
                return;
            }
        };

        let mut pending: Option<PendingExpense> = None;
        let mut seen: HashSet<ExpenseId> = HashSet::new();

        let finish = |done: PendingExpense| {
            if done.rejected {
                return;
            }
            let _ = match ExpenseDraft::try_from(done) {
                Ok(draft) => draft_tx.send(draft).map_err(|_| ()),
                Err(err) => error_tx.send(Error::Format(err)).map_err(|_| ()),
            };
        };

        for row in reader.records() {
            let row = match row {
                Ok(row) => row,
                Err(err) => {
                    let _ = error_tx.send(err.into());
                    if let Some(current) = pending.as_mut() {
                        current.rejected = true;
                    }
                    continue;
                }
            };

            let record = match parse_expense_row(&row, &headers) {
                Ok(record) => record,
                Err(err) => {
                    let _ = error_tx.send(err);
                    match row.get(0).and_then(|id| id.parse::<ExpenseId>().ok()) {
                        Some(id) if pending.as_ref().map_or(true, |current| current.id != id) => {
                            if let Some(done) = pending.take() {
                                finish(done);
                            }
                            seen.insert(id);
                            pending = Some(PendingExpense::rejected(id));
                        }
                        _ => {
                            if let Some(current) = pending.as_mut() {
                                current.rejected = true;
                            }
                        }
                    }
                    continue;
                }
            };

            if let Some(current) = pending
                .as_mut()
                .filter(|current| current.id == record.expense_id)
            {
                if current.rejected {
                    continue;
                }
                if !current.agrees_with(&record) {
                    current.rejected = true;
                    let _ = error_tx.send(Error::Format(format!(
                        "expense {}: rows disagree on payer, amount or rule",
                        current.id
                    )));
                    continue;
                }
                current.entries.push((record.user, record.value));
                continue;
            }

            if let Some(done) = pending.take() {
                finish(done);
            }

            let mut next = PendingExpense::start(record);
            if !seen.insert(next.id) {
                next.rejected = true;
                let _ = error_tx.send(Error::Format(format!(
                    "expense {}: rows are not contiguous",
                    next.id
                )));
            }
            pending = Some(next);
        }

        if let Some(done) = pending.take() {
            finish(done);
        }
    });

    (draft_rx, error_rx)
}

pub fn settlements(
    input_stream: (impl std::io::Read + Send + 'static),
) -> (Receiver<Settlement>, Receiver<Error>) {
    let (settlement_tx, settlement_rx): (Sender<Settlement>, Receiver<Settlement>) =
        mpsc::channel();
    let (error_tx, error_rx): (Sender<Error>, Receiver<Error>) = mpsc::channel();

    let mut reader = csv_reader(input_stream, false);

    std::thread::spawn(move || {
        for record in reader.deserialize::<SettlementRecord>() {
            let _ = match convert(record) {
                Ok(settlement) => settlement_tx.send(settlement).map_err(|_| ()),
                Err(err) => error_tx.send(err).map_err(|_| ()),
            };
        }
    });

    (settlement_rx, error_rx)
}

fn parse_expense_row(
    row: &csv::StringRecord,
    headers: &csv::StringRecord,
) -> Result<ExpenseRecord, Error> {
    if row.len() != headers.len() {
        return Err(Error::Csv(format!(
            "found record with {} fields, but the header has {} fields",
            row.len(),
            headers.len()
        )));
    }
    Ok(row.deserialize(Some(headers))?)
}

// Convert from a csv deserialise result into a settlement result.
fn convert(record: Result<SettlementRecord, csv::Error>) -> Result<Settlement, Error> {
    let record = record?;
    Settlement::new(record.from, record.to, record.amount)
        .map_err(|err| Error::Format(err.to_string()))
}

// As in the transactions input, records are deserialised into their own types
// rather than into the domain types: one CSV row is only a piece of an expense.
#[derive(Debug, Deserialize)]
pub struct ExpenseRecord {
    #[serde(rename = "expense")]
    expense_id: ExpenseId,

    description: String,
    payer: UserId,
    amount: Decimal,
    rule: RuleRecord,
    user: UserId,

    // Fixed amount, percentage or share count, depending on the rule.
    value: Option<Decimal>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum RuleRecord {
    Equal,
    Exact,
    Percentage,
    Shares,
}

#[derive(Debug, Deserialize)]
pub struct SettlementRecord {
    from: UserId,
    to: UserId,
    amount: Decimal,
}

struct PendingExpense {
    id: ExpenseId,
    description: String,
    payer: UserId,
    amount: Amount,
    rule: RuleRecord,
    entries: Vec<(UserId, Option<Decimal>)>,
    rejected: bool,
}

impl PendingExpense {
    fn start(record: ExpenseRecord) -> Self {
        Self {
            id: record.expense_id,
            description: record.description,
            payer: record.payer,
            amount: record.amount,
            rule: record.rule,
            entries: vec![(record.user, record.value)],
            rejected: false,
        }
    }

    // Stands in for an expense whose rows are skipped until the next one starts.
    fn rejected(id: ExpenseId) -> Self {
        Self {
            id,
            description: String::new(),
            payer: UserId::new(),
            amount: Decimal::ZERO,
            rule: RuleRecord::Equal,
            entries: Vec::new(),
            rejected: true,
        }
    }

    fn agrees_with(&self, record: &ExpenseRecord) -> bool {
        self.payer == record.payer && self.amount == record.amount && self.rule == record.rule
    }
}

impl TryFrom<PendingExpense> for ExpenseDraft {
    type Error = String;

    fn try_from(pending: PendingExpense) -> Result<Self, Self::Error> {
        let id = pending.id;
        let fail = |reason: &str| format!("expense {}: {}", id, reason);

        if pending.payer.is_empty() {
            return Err(fail("missing payer"));
        }
        if pending.entries.iter().any(|(user, _)| user.is_empty()) {
            return Err(fail("missing user"));
        }

        let rule = match pending.rule {
            RuleRecord::Equal => {
                if pending.entries.iter().any(|(_, value)| value.is_some()) {
                    return Err(fail("unexpected value for equal split"));
                }
                SplitRule::Equal(pending.entries.into_iter().map(|(user, _)| user).collect())
            }
            RuleRecord::Exact => SplitRule::Exact(
                with_values(pending.entries).ok_or_else(|| fail("missing value for exact split"))?,
            ),
            RuleRecord::Percentage => SplitRule::Percentage(
                with_values(pending.entries)
                    .ok_or_else(|| fail("missing value for percentage split"))?,
            ),
            RuleRecord::Shares => {
                let entries = with_values(pending.entries)
                    .ok_or_else(|| fail("missing value for shares split"))?;
                let mut shares = Vec::with_capacity(entries.len());
                for (user, value) in entries {
                    let count = share_count(value)
                        .ok_or_else(|| fail("share count must be a whole, non-negative number"))?;
                    shares.push((user, count));
                }
                SplitRule::Shares(shares)
            }
        };

        Ok(Self {
            id,
            description: pending.description,
            payer: pending.payer,
            amount: pending.amount,
            rule,
        })
    }
}

fn with_values(entries: Vec<(UserId, Option<Decimal>)>) -> Option<Vec<(UserId, Decimal)>> {
    entries
        .into_iter()
        .map(|(user, value)| value.map(|value| (user, value)))
        .collect()
}

fn share_count(value: Decimal) -> Option<u32> {
    if !value.fract().is_zero() {
        return None;
    }
    value.to_u32()
}

#[cfg(test)]
fn drain<T>(rx: Receiver<T>) -> Vec<T> {
    rx.iter().collect()
}

#[test]
// Parsing well-formed data should return one draft per expense.
fn test_expenses_ok() {
    use rust_decimal_macros::dec;

    let data = r#"expense,description,payer,amount,rule,user,value
1,dinner,alice,90,equal,alice,
1,dinner,alice,90,equal,bob,
1,dinner,alice,90,equal,carol,
2,tickets,bob,20,exact,alice,12.5
2,tickets,bob,20,exact,bob,7.5
3,hotel,carol,100,percentage,alice,60
3,hotel,carol,100,percentage,bob,40
4,fuel,alice,64,shares,carol,1
4,fuel,alice,64,shares,alice,3"#;
    let (drafts, errors) = expenses(std::io::Cursor::new(data));

    let drafts = drain(drafts);
    assert_eq!(Vec::<Error>::new(), drain(errors));
    assert_eq!(4, drafts.len());

    assert_eq!(
        ExpenseDraft {
            id: 1,
            description: "dinner".to_string(),
            payer: "alice".to_string(),
            amount: dec!(90),
            rule: SplitRule::Equal(vec![
                "alice".to_string(),
                "bob".to_string(),
                "carol".to_string()
            ]),
        },
        drafts[0]
    );
    assert_eq!(
        SplitRule::Exact(vec![
            ("alice".to_string(), dec!(12.5)),
            ("bob".to_string(), dec!(7.5))
        ]),
        drafts[1].rule
    );
    assert_eq!(
        SplitRule::Percentage(vec![
            ("alice".to_string(), dec!(60)),
            ("bob".to_string(), dec!(40))
        ]),
        drafts[2].rule
    );
    assert_eq!(
        SplitRule::Shares(vec![("carol".to_string(), 1), ("alice".to_string(), 3)]),
        drafts[3].rule
    );
}

#[test]
fn test_expenses_ok_with_whitespace() {
    let data = r#"expense, description, payer, amount,  rule, user, value
  1 ,  dinner , alice , 90 , equal , alice ,
1,dinner,alice,   90,equal   ,   bob,    "#;
    let (drafts, errors) = expenses(std::io::Cursor::new(data));

    assert_eq!(1, drafts.iter().count());
    assert_eq!(0, errors.iter().count());
}

#[test]
// Malformed CSV only rejects the offending row.
fn test_expenses_invalid_csv() {
    for (data, err_contains) in vec![
        (
            r#"expense,description,payer,amount,rule,user,value
1,dinner,alice,90,thirds,alice,"#,
            "unknown variant `thirds`",
        ),
        (
            r#"expense,description,payer,amount,rule,user,value
,dinner,alice,90,equal,alice,"#, // missing expense id
            "cannot parse integer from empty string",
        ),
        (
            r#"expense,description,payer,amount,rule,user,value
1,dinner,alice,90,equal"#,
            "found record with 5 fields, but the header has 7 fields",
        ),
    ] {
        let (drafts, errors) = expenses(std::io::Cursor::new(data));

        assert_eq!(0, drafts.iter().count());

        let errs = drain(errors);
        assert_eq!(1, errs.len());
        match &errs[0] {
            Error::Csv(msg) => assert!(msg.contains(err_contains), "{:?}", msg),
            _ => panic!("unexpected error"),
        }
    }
}

#[test]
fn test_expenses_invalid_data() {
    for (data, want_err) in vec![
        (
            r#"expense,description,payer,amount,rule,user,value
1,tickets,bob,20,exact,alice,12.5
1,tickets,bob,20,exact,bob,"#,
            "expense 1: missing value for exact split",
        ),
        (
            r#"expense,description,payer,amount,rule,user,value
1,fuel,bob,20,shares,alice,1.5"#,
            "expense 1: share count must be a whole, non-negative number",
        ),
        (
            r#"expense,description,payer,amount,rule,user,value
1,fuel,bob,20,shares,alice,-2"#,
            "expense 1: share count must be a whole, non-negative number",
        ),
        (
            r#"expense,description,payer,amount,rule,user,value
1,dinner,alice,90,equal,bob,30"#,
            "expense 1: unexpected value for equal split",
        ),
        (
            r#"expense,description,payer,amount,rule,user,value
1,dinner,,90,equal,bob,"#,
            "expense 1: missing payer",
        ),
        (
            r#"expense,description,payer,amount,rule,user,value
1,dinner,alice,90,equal,alice,
1,dinner,alice,95,equal,bob,"#,
            "expense 1: rows disagree on payer, amount or rule",
        ),
        (
            r#"expense,description,payer,amount,rule,user,value
1,dinner,alice,90,equal,alice,
1,dinner,bob,90,equal,bob,"#,
            "expense 1: rows disagree on payer, amount or rule",
        ),
    ] {
        let (drafts, errors) = expenses(std::io::Cursor::new(data));

        assert_eq!(0, drafts.iter().count());
        assert_eq!(vec![Error::Format(want_err.to_string())], drain(errors));
    }
}

#[test]
// A row that can't be read takes down its whole expense, wherever it sits:
// the other rows must not make a smaller expense on their own. The expense
// after it is unaffected.
fn test_expenses_bad_row_rejects_its_expense() {
    for (bad_row, position) in vec![
        ("1,dinner,alice,9O,equal,bob,", "middle"),
        ("1,dinner,alice,90,thirds,bob,", "middle"),
        ("1,dinner,alice,90,equal", "middle"),
        ("x,dinner,alice,90,equal,bob,", "middle"),
        ("1,dinner,alice,9O,equal,bob,", "first"),
        ("1,dinner,alice,90,equal", "first"),
        ("1,dinner,alice,9O,equal,bob,", "last"),
    ] {
        let mut rows = vec!["1,dinner,alice,90,equal,alice,", "1,dinner,alice,90,equal,carol,"];
        match position {
            "first" => rows.insert(0, bad_row),
            "middle" => rows.insert(1, bad_row),
            _ => rows.push(bad_row),
        }
        rows.push("2,taxi,bob,10,equal,bob,");
        let data = format!(
            "expense,description,payer,amount,rule,user,value\n{}",
            rows.join("\n")
        );

        let (drafts, errors) = expenses(std::io::Cursor::new(data));

        let ids: Vec<ExpenseId> = drafts.iter().map(|draft| draft.id).collect();
        assert_eq!(vec![2], ids, "{} row {:?}", position, bad_row);

        let errs = drain(errors);
        assert_eq!(1, errs.len(), "{:?}", errs);
        assert!(matches!(errs[0], Error::Csv(_)), "{:?}", errs);
    }
}

#[test]
// Rows of an expense must follow each other. The earlier rows still make an
// expense of their own, the stray ones are rejected.
fn test_expenses_not_contiguous() {
    let data = r#"expense,description,payer,amount,rule,user,value
1,dinner,alice,90,equal,alice,
2,taxi,bob,10,equal,bob,
1,dinner,alice,90,equal,bob,"#;
    let (drafts, errors) = expenses(std::io::Cursor::new(data));

    let ids: Vec<ExpenseId> = drafts.iter().map(|draft| draft.id).collect();
    assert_eq!(vec![1, 2], ids);
    assert_eq!(
        vec![Error::Format("expense 1: rows are not contiguous".to_string())],
        drain(errors)
    );
}

#[test]
fn test_draft_create() {
    use rust_decimal_macros::dec;

    let draft = ExpenseDraft {
        id: 3,
        description: "hotel".to_string(),
        payer: "carol".to_string(),
        amount: dec!(100),
        rule: SplitRule::Percentage(vec![
            ("alice".to_string(), dec!(60)),
            ("bob".to_string(), dec!(41)),
        ]),
    };

    assert_eq!(
        Err(ValidationError::PercentageMismatch(dec!(101))),
        draft.create()
    );
}

#[test]
fn test_settlements() {
    use rust_decimal_macros::dec;

    let data = r#"from,to,amount
bob,alice,30
carol , alice , 12.5
dave,dave,5
erin,alice,0
frank,alice,"#;
    let (settlements, errors) = settlements(std::io::Cursor::new(data));

    assert_eq!(
        vec![
            Settlement::new("bob", "alice", dec!(30)).unwrap(),
            Settlement::new("carol", "alice", dec!(12.5)).unwrap(),
        ],
        drain(settlements)
    );

    let errs = drain(errors);
    assert_eq!(3, errs.len());
    assert_eq!(
        Error::Format("\"dave\" cannot settle with themselves".to_string()),
        errs[0]
    );
    assert_eq!(
        Error::Format("amount must be positive, got 0".to_string()),
        errs[1]
    );
    assert!(matches!(errs[2], Error::Csv(_)));
}
