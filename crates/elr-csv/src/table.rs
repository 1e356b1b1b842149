//! Tokenizing CSV text into a header and records.

use std::io::Read;

use csv::{ReaderBuilder, StringRecord};

use crate::error::CsvParseFailure;

/// Header row plus data records, as read.
#[derive(Debug, Clone, Default)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub records: Vec<StringRecord>,
}

/// Why a table could not be accumulated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableFailure {
    Parse(CsvParseFailure),
    TooManyRows { rows: usize },
    TooManyColumns,
}

/// Trims a header and strips a UTF-8 byte order mark.
pub fn normalize_header(value: &str) -> String {
    value.trim_start_matches('\u{feff}').trim().to_string()
}

/// Read a whole CSV document with a mandatory header row.
///
/// Blank lines are skipped. Row accumulation stops at the first record past
/// `max_items`; the remaining records are only counted.
pub fn read_table<R: Read>(
    input: R,
    max_items: usize,
    max_columns: usize,
) -> Result<CsvTable, TableFailure> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(input);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|err| TableFailure::Parse(err.into()))?
        .iter()
        .map(normalize_header)
        .collect();
    if headers.len() > max_columns {
        return Err(TableFailure::TooManyColumns);
    }

    let mut records = Vec::new();
    let mut count = 0usize;
    for record in reader.records() {
        count += 1;
        if count > max_items {
            continue;
        }
        records.push(record.map_err(|err| TableFailure::Parse(err.into()))?);
    }
    if count > max_items {
        return Err(TableFailure::TooManyRows { rows: count });
    }
    Ok(CsvTable { headers, records })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_table_with_quotes_and_bom() {
        let input = "\u{feff}a, b \n1,\"x, y\"\n\n2,z\n";
        let table = read_table(input.as_bytes(), 10, 10).expect("table");
        assert_eq!(table.headers, vec!["a", "b"]);
        assert_eq!(table.records.len(), 2);
        assert_eq!(&table.records[0][1], "x, y");
    }

    #[test]
    fn test_ragged_row() {
        let input = "a,b\n1,2\n3\n";
        let failure = read_table(input.as_bytes(), 10, 10).unwrap_err();
        assert_eq!(
            failure,
            TableFailure::Parse(CsvParseFailure::RaggedRow { row: 3 })
        );
    }

    #[test]
    fn test_row_ceiling() {
        let input = "a\n1\n2\n3\n";
        let failure = read_table(input.as_bytes(), 2, 10).unwrap_err();
        assert_eq!(failure, TableFailure::TooManyRows { rows: 3 });
    }

    #[test]
    fn test_column_ceiling() {
        let input = "a,b,c\n1,2,3\n";
        assert_eq!(
            read_table(input.as_bytes(), 10, 2).unwrap_err(),
            TableFailure::TooManyColumns
        );
    }

    #[test]
    fn test_empty_input() {
        let table = read_table("".as_bytes(), 10, 10).expect("table");
        assert!(table.headers.is_empty());
        assert!(table.records.is_empty());
    }
}
