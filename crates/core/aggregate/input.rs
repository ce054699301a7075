//! Raw source records.

use crate::error::{GridlineError, Result};
use serde_json::Value;
use std::collections::BTreeMap;

/// One source row: column name to textual value.
pub type RawRecord = BTreeMap<String, String>;

/// Convert a JSON array of flat objects into raw records.
///
/// Numbers and booleans are stringified, nulls are dropped, and nested
/// values are kept as their JSON text. Array elements that are not objects
/// are skipped.
///
/// ```
/// use gridline::aggregate::raw_records_from_json;
///
/// let records = raw_records_from_json(br#"[{"name":"Hoover","capacity_mw":2080,"fuel":null}, 7]"#).unwrap();
/// assert_eq!(records.len(), 1);
/// assert_eq!(records[0]["capacity_mw"], "2080");
/// assert!(!records[0].contains_key("fuel"));
/// ```
pub fn raw_records_from_json(bytes: &[u8]) -> Result<Vec<RawRecord>> {
    let value: Value = serde_json::from_slice(bytes)?;
    let Value::Array(rows) = value else {
        return Err(GridlineError::InvalidInput(
            "expected a JSON array of records".to_string(),
        ));
    };

    let mut records = Vec::with_capacity(rows.len());
    let mut skipped = 0usize;
    for row in rows {
        let Value::Object(fields) = row else {
            skipped += 1;
            continue;
        };
        let record: RawRecord = fields
            .into_iter()
            .filter_map(|(key, value)| {
                let text = match value {
                    Value::Null => return None,
                    Value::String(s) => s,
                    Value::Bool(b) => b.to_string(),
                    Value::Number(n) => n.to_string(),
                    nested => nested.to_string(),
                };
                Some((key, text))
            })
            .collect();
        records.push(record);
    }

    if skipped > 0 {
        log::debug!("Skipped {} non-object rows in record input", skipped);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_array() {
        assert!(raw_records_from_json(br#"{"name":"x"}"#).is_err());
        assert!(raw_records_from_json(b"[").is_err());
    }

    #[test]
    fn test_value_stringification() {
        let records =
            raw_records_from_json(br#"[{"a":true,"b":1.5,"c":"text","d":[1,2],"e":null}]"#)
                .unwrap();
        let record = &records[0];
        assert_eq!(record["a"], "true");
        assert_eq!(record["b"], "1.5");
        assert_eq!(record["c"], "text");
        assert_eq!(record["d"], "[1,2]");
        assert_eq!(record.len(), 4);
    }
}
