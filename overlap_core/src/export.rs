use crate::{Result, TradeRecord};
use csv::Writer;
use std::io::{Cursor, Write};

pub const TRADE_HEADERS: [&str; 5] = ["Wallet", "Token", "Type", "Amount", "Profit"];

/// One row per trade: `Wallet,Token,Type,Amount,Profit`
pub fn write_trades_csv<W: Write>(writer: W, trades: &[TradeRecord]) -> Result<()> {
    let mut wtr = Writer::from_writer(writer);
    wtr.write_record(TRADE_HEADERS)?;

    for trade in trades {
        wtr.write_record(&[
            trade.wallet.clone(),
            trade.token.clone(),
            trade.side.to_string(),
            trade.amount.normalize().to_string(),
            trade.profit_sol.normalize().to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn write_wallets_csv<W: Write>(writer: W, wallets: &[String]) -> Result<()> {
    let mut wtr = Writer::from_writer(writer);
    wtr.write_record(["Wallet"])?;
    for wallet in wallets {
        wtr.write_record([wallet])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn trades_csv_string(trades: &[TradeRecord]) -> Result<String> {
    let mut buffer = Cursor::new(Vec::new());
    write_trades_csv(&mut buffer, trades)?;
    Ok(String::from_utf8_lossy(&buffer.into_inner()).into_owned())
}
