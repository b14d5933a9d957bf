use crate::ledger::{
    balance::NetBalance, reported, simplify::Transfer, summary::Position, Amount, UserId,
};

use serde::Serialize;

#[derive(Serialize)]
struct TransferRecord<'a> {
    from: &'a UserId,
    to: &'a UserId,
    amount: Amount,
}

#[derive(Serialize)]
struct BalanceRecord<'a> {
    user: &'a UserId,
    balance: Amount,
}

#[derive(Serialize)]
struct PositionRecord<'a> {
    user: &'a str,
    owed_to_you: Amount,
    you_owe: Amount,
    net: Amount,
}

/// Writes who owes whom to the given stream.
pub fn write_transfers(
    output_stream: impl std::io::Write,
    transfers: &[Transfer],
) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(output_stream);

    for transfer in transfers {
        writer.serialize(TransferRecord {
            from: &transfer.from,
            to: &transfer.to,
            amount: reported(transfer.amount),
        })?;
    }

    writer.flush()?;
    Ok(())
}

/// Writes every user's net balance to the given stream, in ascending user order.
pub fn write_balances(
    output_stream: impl std::io::Write,
    balance: &NetBalance,
) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(output_stream);

    for (user, amount) in balance.iter() {
        writer.serialize(BalanceRecord {
            user,
            balance: reported(amount),
        })?;
    }

    writer.flush()?;
    Ok(())
}

/// Writes where a single user stands.
pub fn write_position(
    output_stream: impl std::io::Write,
    user: &str,
    position: &Position,
) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(output_stream);
    let rounded = position.reported();

    writer.serialize(PositionRecord {
        user,
        owed_to_you: rounded.owed_to_you,
        you_owe: rounded.you_owe,
        net: position.net(),
    })?;

    writer.flush()?;
    Ok(())
}
