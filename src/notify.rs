//! Outbound notifications, handed to whoever delivers them (email, chat...).
//!
//! Delivery is best effort: by the time we notify, the expense already exists,
//! and nothing that happens here can undo or fail it.

use crate::ledger::{expense::Expense, reported, split::SplitKind, Amount, ExpenseId, UserId};

use std::sync::Arc;
use std::thread::JoinHandle;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// An expense was created. Everyone who owes a part of it, apart from the
    /// payer, should hear about it.
    ExpenseCreated {
        expense: ExpenseId,
        description: String,
        amount: Amount,
        kind: SplitKind,
        payer: UserId,
        recipients: Vec<UserId>,
    },
}

impl Notification {
    pub fn expense_created(expense: &Expense) -> Self {
        Self::ExpenseCreated {
            expense: expense.id,
            description: expense.description.clone(),
            amount: expense.amount,
            kind: expense.kind,
            payer: expense.payer.clone(),
            recipients: expense.participants_besides_payer(),
        }
    }

    pub fn subject(&self) -> String {
        match self {
            Self::ExpenseCreated {
                description,
                amount,
                kind,
                ..
            } => format!(
                "New expense: {} ({}, split {})",
                description,
                reported(*amount),
                kind
            ),
        }
    }

    pub fn recipients(&self) -> Vec<&UserId> {
        match self {
            Self::ExpenseCreated { recipients, .. } => recipients.iter().collect(),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum NotifyError {
    #[error("notifier is not configured")]
    NotConfigured,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Delivers notifications by logging them.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        for recipient in notification.recipients() {
            tracing::info!(recipient = %recipient, subject = %notification.subject(), "notification");
        }
        Ok(())
    }
}

/// Hand a notification over to a background thread, and return immediately.
///
/// Failures are logged, never returned: the caller must not depend on the
/// outcome. The handle is only there so tests (and a graceful shutdown) can
/// wait for delivery.
pub fn dispatch(notifier: Arc<dyn Notifier>, notification: Notification) -> JoinHandle<()> {
    std::thread::spawn(move || {
        if notification.recipients().is_empty() {
            tracing::debug!(subject = %notification.subject(), "no one to notify");
            return;
        }

        if let Err(err) = notifier.notify(&notification) {
            tracing::error!("failed to send notification: {}", err);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::{dispatch, LogNotifier, Notification, Notifier, NotifyError};
    use crate::ledger::{expense::Expense, split::SplitRule};

    use rust_decimal_macros::dec;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<Notification>>,
    }

    impl Notifier for Recorder {
        fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    struct Broken;

    impl Notifier for Broken {
        fn notify(&self, _: &Notification) -> Result<(), NotifyError> {
            Err(NotifyError::NotConfigured)
        }
    }

    fn dinner() -> Expense {
        let rule = SplitRule::Equal(vec![
            "alice".to_string(),
            "bob".to_string(),
            "carol".to_string(),
        ]);
        Expense::new(7, "dinner", "alice", dec!(90), &rule).unwrap()
    }

    #[test]
    fn test_expense_created() {
        let notification = Notification::expense_created(&dinner());

        assert_eq!(
            Notification::ExpenseCreated {
                expense: 7,
                description: "dinner".to_string(),
                amount: dec!(90),
                kind: crate::ledger::split::SplitKind::Equal,
                payer: "alice".to_string(),
                recipients: vec!["bob".to_string(), "carol".to_string()],
            },
            notification
        );
        assert_eq!("New expense: dinner (90.00, split equal)", notification.subject());
        assert_eq!(vec!["bob", "carol"], notification.recipients());
    }

    #[test]
    fn test_dispatch() {
        let recorder = Arc::new(Recorder::default());

        dispatch(recorder.clone(), Notification::expense_created(&dinner()))
            .join()
            .expect("dispatch thread should not panic");

        let sent = recorder.sent.lock().unwrap();
        assert_eq!(1, sent.len());
    }

    #[test]
    // Only the payer took part: there is nobody to tell.
    fn test_dispatch_without_recipients() {
        let recorder = Arc::new(Recorder::default());
        let rule = SplitRule::Equal(vec!["alice".to_string()]);
        let expense = Expense::new(1, "coffee", "alice", dec!(3), &rule).unwrap();

        dispatch(recorder.clone(), Notification::expense_created(&expense))
            .join()
            .unwrap();

        assert!(recorder.sent.lock().unwrap().is_empty());
    }

    #[test]
    // A failing notifier must not reach the caller.
    fn test_dispatch_failure_is_swallowed() {
        let handle = dispatch(Arc::new(Broken), Notification::expense_created(&dinner()));
        assert!(handle.join().is_ok());
    }

    #[test]
    fn test_log_notifier() {
        assert_eq!(Ok(()), LogNotifier.notify(&Notification::expense_created(&dinner())));
    }
}
