use clap::{Parser, ValueEnum};
use split_engine::{
    notify::{LogNotifier, Notifier},
    run::{run, Options, Report},
};
use std::{fs::File, path::PathBuf, process::ExitCode, sync::Arc};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "split_engine")]
#[command(about = "Work out who owes whom from a group's expenses and settlements")]
struct Cli {
    /// Expenses CSV: expense,description,payer,amount,rule,user,value
    #[arg(long, env = "SPLIT_EXPENSES")]
    expenses: PathBuf,

    /// Settlements CSV: from,to,amount
    #[arg(long, env = "SPLIT_SETTLEMENTS")]
    settlements: PathBuf,

    #[arg(long, value_enum, default_value_t = ReportKind::Transfers)]
    report: ReportKind,

    /// User to summarise, for the position report.
    #[arg(long, required_if_eq("report", "position"))]
    user: Option<String>,

    /// Log a notification for every expense created.
    #[arg(long)]
    notify: bool,

    /// Log filter, e.g. `info` or `split_engine=debug`.
    #[arg(long, env = "SPLIT_LOG", default_value = "warn")]
    log: String,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
enum ReportKind {
    Transfers,
    Balances,
    Position,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Reports go to stdout, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cli.log))
        .with_writer(std::io::stderr)
        .init();

    let (expenses, settlements) = match (File::open(&cli.expenses), File::open(&cli.settlements)) {
        (Ok(expenses), Ok(settlements)) => (expenses, settlements),
        (Err(err), _) => {
            tracing::error!("failed to open {}: {}", cli.expenses.display(), err);
            return ExitCode::FAILURE;
        }
        (_, Err(err)) => {
            tracing::error!("failed to open {}: {}", cli.settlements.display(), err);
            return ExitCode::FAILURE;
        }
    };

    let report = match (cli.report, cli.user) {
        (ReportKind::Transfers, _) => Report::Transfers,
        (ReportKind::Balances, _) => Report::Balances,
        (ReportKind::Position, Some(user)) => Report::Position(user),
        (ReportKind::Position, None) => {
            tracing::error!("the position report needs a --user");
            return ExitCode::FAILURE;
        }
    };
    let options = Options {
        report,
        notifier: cli
            .notify
            .then(|| Arc::new(LogNotifier) as Arc<dyn Notifier>),
    };

    match run(expenses, settlements, std::io::stdout(), &options) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
