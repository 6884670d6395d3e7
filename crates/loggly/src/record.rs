// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log records and their line encoding.
//!
//! A record is a JSON object. Records are encoded as compact JSON, one per
//! line; `serde_json` escapes every control character inside strings, so an
//! encoded record never contains a raw newline and batches can be joined with
//! `\n`.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::constants::{HOST_METADATA_KEYS, NO_TAG, PARTNER_ID_KEY};
use crate::errors::EncodeError;

/// A structured log record.
pub type Record = Map<String, Value>;

/// Encodes a record as a single newline-free JSON line.
pub fn encode(record: &Record) -> Result<Vec<u8>, EncodeError> {
    Ok(serde_json::to_vec(record)?)
}

/// Converts any serializable value into a record.
///
/// Fails if serialization fails or the value is not a JSON object.
pub fn to_record<T: Serialize + ?Sized>(value: &T) -> Result<Record, EncodeError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        Value::Null => Err(EncodeError::NotAnObject("null")),
        Value::Bool(_) => Err(EncodeError::NotAnObject("boolean")),
        Value::Number(_) => Err(EncodeError::NotAnObject("number")),
        Value::String(_) => Err(EncodeError::NotAnObject("string")),
        Value::Array(_) => Err(EncodeError::NotAnObject("array")),
    }
}

/// Returns the group a record is buffered under.
///
/// String `partnerID` values are used as-is, other non-null values use their
/// JSON text and a missing or null `partnerID` maps to [`NO_TAG`].
#[must_use]
pub fn group_key(record: &Record) -> String {
    match record.get(PARTNER_ID_KEY) {
        Some(Value::String(partner)) => partner.clone(),
        None | Some(Value::Null) => NO_TAG.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Removes caller and host metadata from a record.
pub fn strip_host_metadata(record: &mut Record) {
    for key in HOST_METADATA_KEYS {
        record.remove(key);
    }
}

/// Sets `timestamp` to `now_ms` unless the caller supplied one.
pub fn ensure_timestamp(record: &mut Record, now_ms: u64) {
    record
        .entry("timestamp")
        .or_insert_with(|| Value::from(now_ms));
}

/// Adds configured defaults for every key the record does not already have.
pub fn merge_defaults(record: &mut Record, defaults: &Record) {
    for (key, value) in defaults {
        if !record.contains_key(key) {
            record.insert(key.clone(), value.clone());
        }
    }
}

/// Copies `extra` into `record`, overwriting existing keys.
pub fn merge_properties(record: &mut Record, extra: Record) {
    for (key, value) in extra {
        record.insert(key, value);
    }
}

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("test record must be an object"),
        }
    }

    #[test]
    fn test_encode_is_single_line() {
        let rec = record(json!({
            "message": "first line\nsecond line\r\n",
            "nested": {"stack": "a\nb"},
        }));
        let line = encode(&rec).unwrap();
        assert!(!line.contains(&b'\n'));
        let decoded: Value = serde_json::from_slice(&line).unwrap();
        assert_eq!(decoded["message"], "first line\nsecond line\r\n");
        assert_eq!(decoded["nested"]["stack"], "a\nb");
    }

    #[test]
    fn test_to_record_rejects_non_objects() {
        assert!(matches!(
            to_record(&vec![1, 2, 3]),
            Err(EncodeError::NotAnObject("array"))
        ));
        assert!(matches!(
            to_record("plain"),
            Err(EncodeError::NotAnObject("string"))
        ));
    }

    #[test]
    fn test_to_record_reports_serialize_failures() {
        use std::collections::BTreeMap;

        // JSON object keys must be strings.
        let mut map = BTreeMap::new();
        map.insert(vec![1u8], "value");
        assert!(matches!(to_record(&map), Err(EncodeError::Serialize(_))));
    }

    #[test]
    fn test_to_record_accepts_structs() {
        #[derive(Serialize)]
        struct Login<'a> {
            user: &'a str,
            attempts: u32,
        }
        let rec = to_record(&Login {
            user: "tobi",
            attempts: 3,
        })
        .unwrap();
        assert_eq!(rec["user"], "tobi");
        assert_eq!(rec["attempts"], 3);
    }

    #[test]
    fn test_group_key() {
        assert_eq!(group_key(&record(json!({"msg": "x"}))), NO_TAG);
        assert_eq!(group_key(&record(json!({"partnerID": null}))), NO_TAG);
        assert_eq!(group_key(&record(json!({"partnerID": "acme"}))), "acme");
        assert_eq!(group_key(&record(json!({"partnerID": 42}))), "42");
    }

    #[test]
    fn test_strip_host_metadata() {
        let mut rec = record(json!({
            "filename": "main.rs",
            "func": "main",
            "hostname": "box",
            "line": 12,
            "message": "kept",
        }));
        strip_host_metadata(&mut rec);
        assert_eq!(rec.len(), 1);
        assert_eq!(rec["message"], "kept");
    }

    #[test]
    fn test_ensure_timestamp_keeps_caller_value() {
        let mut rec = record(json!({"timestamp": 5}));
        ensure_timestamp(&mut rec, 1_000);
        assert_eq!(rec["timestamp"], 5);

        let mut rec = Record::new();
        ensure_timestamp(&mut rec, 1_000);
        assert_eq!(rec["timestamp"], 1_000);
    }

    #[test]
    fn test_merge_defaults_caller_wins() {
        let mut rec = record(json!({"hostname": "caller"}));
        let defaults = record(json!({"hostname": "default", "env": "prod"}));
        merge_defaults(&mut rec, &defaults);
        assert_eq!(rec["hostname"], "caller");
        assert_eq!(rec["env"], "prod");
    }

    #[test]
    fn test_merge_properties_overwrites() {
        let mut rec = record(json!({"level": "info", "component": "api"}));
        merge_properties(&mut rec, record(json!({"component": "db", "rows": 3})));
        assert_eq!(rec["level"], "info");
        assert_eq!(rec["component"], "db");
        assert_eq!(rec["rows"], 3);
    }

    #[test]
    fn test_now_millis_is_after_2020() {
        assert!(now_millis() > 1_577_836_800_000);
    }

    proptest! {
        #[test]
        fn encoded_records_never_contain_newlines(
            key in "\\PC*",
            message in any::<String>(),
            number in any::<i64>(),
        ) {
            let mut rec = Record::new();
            rec.insert(key, Value::from(message));
            rec.insert("n".to_string(), Value::from(number));
            let line = encode(&rec).unwrap();
            prop_assert!(!line.contains(&b'\n'));
        }
    }
}
