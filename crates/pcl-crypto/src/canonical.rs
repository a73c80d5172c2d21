use pcl_types::{payload_from_value, Payload};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::hasher::HasherError;

/// Serialize a JSON value with object keys sorted at every nesting level.
///
/// Logically equal values always produce identical bytes, regardless of the
/// order their keys were inserted in.
pub fn canonical_json(value: &Value) -> Result<Vec<u8>, HasherError> {
    let mut out = Vec::new();
    write_value(value, &mut out)?;
    Ok(out)
}

/// Canonical bytes of a payload.
pub fn canonical_payload(payload: &Payload) -> Result<Vec<u8>, HasherError> {
    let mut out = Vec::new();
    write_object(payload, &mut out)?;
    Ok(out)
}

/// Convert a serializable record into a payload.
///
/// Fails when the record has no JSON form (e.g. a map with non-string keys)
/// or when it is not a field→value mapping.
pub fn encode_payload<T: Serialize + ?Sized>(record: &T) -> Result<Payload, HasherError> {
    let value = serde_json::to_value(record).map_err(|e| HasherError::Encoding(e.to_string()))?;
    payload_from_value(value).map_err(|e| HasherError::Encoding(e.to_string()))
}

fn write_value(value: &Value, out: &mut Vec<u8>) -> Result<(), HasherError> {
    match value {
        Value::Object(map) => write_object(map, out),
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(item, out)?;
            }
            out.push(b']');
            Ok(())
        }
        scalar => serde_json::to_writer(&mut *out, scalar)
            .map_err(|e| HasherError::Encoding(e.to_string())),
    }
}

fn write_object(map: &Map<String, Value>, out: &mut Vec<u8>) -> Result<(), HasherError> {
    let mut entries: Vec<(&String, &Value)> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    out.push(b'{');
    for (i, (key, value)) in entries.into_iter().enumerate() {
        if i > 0 {
            out.push(b',');
        }
        serde_json::to_writer(&mut *out, key).map_err(|e| HasherError::Encoding(e.to_string()))?;
        out.push(b':');
        write_value(value, out)?;
    }
    out.push(b'}');
    Ok(())
}
