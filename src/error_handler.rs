use crate::{input::Error, ledger::split::ValidationError};

use std::sync::mpsc::Receiver;
use std::thread::JoinHandle;

// A rejected record never stops the run: the expense or settlement it
// describes is simply left out of the balances. We log it so that whoever
// owns the input can fix it and run again.
//
// Each handle resolves to the number of records it rejected.
pub fn sink(
    input_errors: Vec<Receiver<Error>>,
    validation_errors: Receiver<ValidationError>,
) -> Vec<JoinHandle<usize>> {
    let mut handles: Vec<JoinHandle<usize>> = input_errors
        .into_iter()
        .map(|errors| {
            std::thread::spawn(move || {
                errors
                    .iter()
                    .inspect(|err| tracing::warn!("failed to read record: {:?}", err))
                    .count()
            })
        })
        .collect();

    handles.push(std::thread::spawn(move || {
        validation_errors
            .iter()
            .inspect(|err| tracing::warn!("rejected expense: {}", err))
            .count()
    }));

    handles
}
