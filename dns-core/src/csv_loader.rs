//! C7: the tabular record-file reader.  See SPEC_FULL.md §4.7, §6.
//!
//! Parsing is synchronous and pure, deliberately separated from the
//! asynchronous file read the binary performs before calling this
//! (matching the wire library's own split between `Hosts::deserialise`
//! and its caller's `tokio::fs::read_to_string`).

use crate::error::Error;
use crate::store::{Kind, Record, RecordStore};

const HEADER: &str = "name,type,value,ttl,priority,weight,port";

/// Parse the full file text into a record store.  The first malformed
/// row is a fatal error, carrying its 1-based source line number.
pub fn deserialise(data: &str) -> Result<RecordStore, Error> {
    let mut store = RecordStore::new();

    for (i, line) in data.lines().enumerate() {
        let line_no = i + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if line_no == 1 && trimmed.eq_ignore_ascii_case(HEADER) {
            continue;
        }

        let record = parse_row(trimmed, line_no)?;
        store.insert(record);
    }

    Ok(store)
}

fn parse_row(line: &str, line_no: usize) -> Result<Record, Error> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != 7 {
        return Err(Error::CsvRow {
            line: line_no,
            reason: format!("expected 7 columns, found {}", fields.len()),
        });
    }
    let [name, rtype, value, ttl, priority, weight, port] = fields[..] else {
        unreachable!("length checked above");
    };

    if name.is_empty() {
        return Err(Error::CsvRow {
            line: line_no,
            reason: "name must not be empty".to_string(),
        });
    }
    let kind = Kind::from_str_ci(rtype).ok_or_else(|| Error::CsvRow {
        line: line_no,
        reason: format!("unsupported record type {rtype:?}"),
    })?;
    if value.is_empty() {
        return Err(Error::CsvRow {
            line: line_no,
            reason: "value must not be empty".to_string(),
        });
    }

    let ttl = parse_optional_u32(ttl, line_no, "ttl")?;
    let priority = parse_optional_u16(priority, line_no, "priority")?;
    let weight = parse_optional_u16(weight, line_no, "weight")?;
    let port = parse_optional_u16(port, line_no, "port")?;

    if kind == Kind::Srv && port == 0 {
        return Err(Error::CsvRow {
            line: line_no,
            reason: "SRV records require a non-zero port".to_string(),
        });
    }

    crate::builder::validate_value(kind, value).map_err(|reason| Error::BadValue {
        rtype: rtype.to_string(),
        reason: format!("line {line_no}: {reason}"),
    })?;

    Ok(Record {
        name: name.trim_end_matches('.').to_ascii_lowercase(),
        kind,
        value: value.to_string(),
        ttl,
        priority,
        weight,
        port,
    })
}

fn parse_optional_u32(field: &str, line_no: usize, column: &str) -> Result<u32, Error> {
    if field.is_empty() {
        return Ok(0);
    }
    field.parse().map_err(|_| Error::CsvRow {
        line: line_no,
        reason: format!("{column} must be an unsigned integer, found {field:?}"),
    })
}

fn parse_optional_u16(field: &str, line_no: usize, column: &str) -> Result<u16, Error> {
    if field.is_empty() {
        return Ok(0);
    }
    field.parse().map_err(|_| Error::CsvRow {
        line: line_no,
        reason: format!("{column} must be an unsigned 16-bit integer, found {field:?}"),
    })
}
