//! Conversion of driver results into the shapes returned to callers.

use crate::client::{DriverAck, DriverResult};
use crate::value::Record;

/// Snapshot of one write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModificationResult {
    pub affected_rows: u64,
    pub insert_id: u64,
    /// Reported only for UPDATE; `None` when the server gave no count.
    pub changed_rows: Option<u64>,
}

/// How many rows a select returns to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectMode {
    One,
    All,
}

/// Normalized select outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum Selected {
    One(Option<Record>),
    All(Vec<Record>),
}

impl Selected {
    pub fn into_one(self) -> Option<Record> {
        match self {
            Selected::One(row) => row,
            Selected::All(rows) => rows.into_iter().next(),
        }
    }

    pub fn into_all(self) -> Vec<Record> {
        match self {
            Selected::One(row) => row.into_iter().collect(),
            Selected::All(rows) => rows,
        }
    }
}

/// Rebuild a row as a plain record.
///
/// Repeated column names (e.g. `id` from both sides of a join) collapse into one
/// entry holding the last value, at the position of the first occurrence.
pub fn normalize_row(row: Record) -> Record {
    let mut out = Record::with_capacity(row.len());
    for (name, value) in row {
        out.insert(name, value);
    }
    out
}

/// Empty results are `None` / `[]`, never an error. An acknowledgement carries no rows.
pub fn normalize_select(result: DriverResult, mode: SelectMode) -> Selected {
    let rows = match result {
        DriverResult::Rows(rows) => rows,
        DriverResult::Ack(_) => Vec::new(),
    };
    match mode {
        SelectMode::One => Selected::One(rows.into_iter().next().map(normalize_row)),
        SelectMode::All => Selected::All(rows.into_iter().map(normalize_row).collect()),
    }
}

pub fn normalize_modification(result: DriverResult) -> ModificationResult {
    match result {
        DriverResult::Ack(ack) => from_ack(&ack),
        DriverResult::Rows(_) => ModificationResult::default(),
    }
}

fn from_ack(ack: &DriverAck) -> ModificationResult {
    let changed_rows = ack
        .changed_rows
        .or_else(|| ack.info.as_deref().and_then(parse_changed_rows));
    ModificationResult {
        affected_rows: ack.affected_rows,
        insert_id: ack.insert_id,
        changed_rows,
    }
}

/// Extract `M` from `Rows matched: N  Changed: M  Warnings: W`.
pub(crate) fn parse_changed_rows(info: &str) -> Option<u64> {
    let rest = &info[info.find("Changed:")? + "Changed:".len()..];
    let digits: String = rest
        .trim_start()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Value, record};

    #[test]
    fn empty_results_are_none_and_empty() {
        assert_eq!(
            normalize_select(DriverResult::Rows(vec![]), SelectMode::One),
            Selected::One(None)
        );
        assert_eq!(
            normalize_select(DriverResult::Rows(vec![]), SelectMode::All),
            Selected::All(vec![])
        );
        assert_eq!(
            normalize_select(DriverResult::Ack(DriverAck::default()), SelectMode::All).into_all(),
            Vec::<Record>::new()
        );
    }

    #[test]
    fn select_one_takes_first_row() {
        let rows = vec![record! { "id" => 1 }, record! { "id" => 2 }];
        let one = normalize_select(DriverResult::Rows(rows), SelectMode::One).into_one();
        assert_eq!(one, Some(record! { "id" => 1 }));
    }

    #[test]
    fn duplicate_columns_collapse() {
        let row = Record::from_columns(vec![
            ("id".to_string(), Value::Int(1)),
            ("name".to_string(), Value::from("a")),
            ("id".to_string(), Value::Int(9)),
        ]);
        assert_eq!(row.len(), 3);
        let row = normalize_row(row);
        assert_eq!(row.len(), 2);
        assert_eq!(row.keys().collect::<Vec<_>>(), vec!["id", "name"]);
        assert_eq!(row.get("id"), Some(&Value::Int(9)));
    }

    #[test]
    fn modification_from_ack() {
        let ack = DriverAck {
            affected_rows: 3,
            insert_id: 0,
            changed_rows: None,
            info: Some("Rows matched: 3  Changed: 2  Warnings: 0".into()),
        };
        assert_eq!(
            normalize_modification(DriverResult::Ack(ack)),
            ModificationResult {
                affected_rows: 3,
                insert_id: 0,
                changed_rows: Some(2)
            }
        );

        let ack = DriverAck {
            affected_rows: 1,
            insert_id: 42,
            changed_rows: Some(1),
            info: None,
        };
        let result = normalize_modification(DriverResult::Ack(ack));
        assert_eq!(result.insert_id, 42);
        assert_eq!(result.changed_rows, Some(1));

        let ack = DriverAck {
            affected_rows: 1,
            info: Some("Records: 1  Duplicates: 0  Warnings: 0".into()),
            ..Default::default()
        };
        assert_eq!(normalize_modification(DriverResult::Ack(ack)).changed_rows, None);
        assert_eq!(
            normalize_modification(DriverResult::Rows(vec![])),
            ModificationResult::default()
        );
    }

    #[test]
    fn parse_info_string() {
        assert_eq!(parse_changed_rows("Rows matched: 1  Changed: 0  Warnings: 0"), Some(0));
        assert_eq!(parse_changed_rows("Records: 2  Duplicates: 0  Warnings: 0"), None);
        assert_eq!(parse_changed_rows(""), None);
    }
}
