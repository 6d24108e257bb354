//! Token lists uploaded as CSV: `token` or `token,start,end` per line.

use crate::timeframe::parse_time_input;
use crate::{CoreError, Result, TokenEntry};
use csv::{ReaderBuilder, Trim};
use std::io::Read;
use tracing::debug;

/// Read token entries from CSV.
///
/// Token-only lines use `default_window_ms`; a header row starting with `token`,
/// blank lines and `#` comments are ignored. Addresses are not validated here.
pub fn read_entries_csv<R: Read>(
    reader: R,
    default_window_ms: Option<(i64, i64)>,
) -> Result<Vec<TokenEntry>> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(Trim::All)
        .from_reader(reader);

    let mut entries = Vec::new();

    for record in csv_reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let fields: Vec<&str> = record.iter().collect();
        let token = match fields.first() {
            Some(t) if !t.is_empty() => *t,
            _ => continue,
        };

        if entries.is_empty() && token.eq_ignore_ascii_case("token") {
            debug!("Skipping header row on line {}", line);
            continue;
        }

        let entry = match fields.len() {
            1 => {
                let (start_ms, end_ms) =
                    default_window_ms.ok_or_else(|| CoreError::InvalidEntry {
                        line,
                        reason: format!("no time window given for {}", token),
                    })?;
                TokenEntry::from_millis(token, start_ms, end_ms)?
            }
            3 => {
                let start_ms = parse_time_input(fields[1]).map_err(|e| CoreError::InvalidEntry {
                    line,
                    reason: e.to_string(),
                })?;
                let end_ms = parse_time_input(fields[2]).map_err(|e| CoreError::InvalidEntry {
                    line,
                    reason: e.to_string(),
                })?;
                TokenEntry::from_millis(token, start_ms, end_ms)?
            }
            n => {
                return Err(CoreError::InvalidEntry {
                    line,
                    reason: format!("expected 1 or 3 columns, found {}", n),
                })
            }
        };

        entries.push(entry);
    }

    debug!("Read {} token entries", entries.len());
    Ok(entries)
}
