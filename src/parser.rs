//! Parser module for dxfeed data frames
//!
//! A data frame is a flat list of scalar values holding N records of one event
//! type back to back. Record boundaries come only from the schema's field
//! count, so a frame whose length is not a multiple of it cannot be decoded.

use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use tracing::warn;

use crate::error::{Result, StreamerError};
use crate::events::{EventSchema, EventType, FieldSpec, FieldValue, MarketEvent, ValueKind};

/// Tokens an upstream floating point feed uses for non-finite values
const SENTINELS: [&str; 3] = ["NaN", "Infinity", "-Infinity"];

/// Records decoded from one frame
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    pub events: Vec<MarketEvent>,
    /// Records dropped because a value did not fit its field
    pub skipped: usize,
}

/// Parsed data channel message
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedMessage {
    Events {
        event_type: EventType,
        frame: DecodedFrame,
    },
    /// Event type absent from the schema table; reported, never raised
    Unknown(String),
}

/// Decode a frame into typed events, in frame order
pub fn decode(event_type: EventType, frame: &[Value]) -> Result<Vec<MarketEvent>> {
    decode_frame(event_type, frame).map(|decoded| decoded.events)
}

/// Decode a frame, also reporting how many records were dropped
pub fn decode_frame(event_type: EventType, frame: &[Value]) -> Result<DecodedFrame> {
    let schema = event_type.schema();
    let field_count = schema.field_count();

    if frame.is_empty() || frame.len() % field_count != 0 {
        return Err(StreamerError::MalformedFrame {
            event_type,
            field_count,
            actual: frame.len(),
        });
    }

    let mut events = Vec::with_capacity(frame.len() / field_count);
    let mut skipped = 0;

    for (i, record) in frame.chunks_exact(field_count).enumerate() {
        match decode_fields(schema, record)
            .and_then(|values| MarketEvent::from_fields(event_type, &values))
        {
            Ok(event) => events.push(event),
            Err(e) => {
                // one bad record does not poison the rest of the frame
                warn!(event_type = %event_type, record = i, error = %e, "Skipping record");
                skipped += 1;
            }
        }
    }

    Ok(DecodedFrame { events, skipped })
}

/// Coerce one record slice against its schema
pub fn decode_fields(schema: &EventSchema, record: &[Value]) -> Result<Vec<FieldValue>> {
    schema
        .fields
        .iter()
        .zip(record)
        .map(|(field, raw)| coerce(schema.event_type, field, raw))
        .collect()
}

/// Whether a raw value stands for "no value"
pub fn is_sentinel(raw: &Value) -> bool {
    match raw {
        Value::Null => true,
        Value::String(s) => SENTINELS.contains(&s.as_str()),
        _ => false,
    }
}

fn coerce(event_type: EventType, field: &FieldSpec, raw: &Value) -> Result<FieldValue> {
    if is_sentinel(raw) {
        if field.nullable {
            return Ok(FieldValue::Absent);
        }
        return Err(invalid(event_type, field, raw));
    }

    let value = match field.kind {
        ValueKind::Integer => to_integer(raw).map(FieldValue::Integer),
        ValueKind::Decimal => to_decimal(raw).map(FieldValue::Decimal),
        ValueKind::String => to_text(raw).map(FieldValue::Text),
        ValueKind::Boolean => to_boolean(raw).map(FieldValue::Boolean),
    };

    value.ok_or_else(|| invalid(event_type, field, raw))
}

fn invalid(event_type: EventType, field: &FieldSpec, raw: &Value) -> StreamerError {
    StreamerError::ParseError(format!(
        "{event_type}.{}: cannot read {raw} as {:?}",
        field.name, field.kind
    ))
}

fn to_integer(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(truncate)),
        Value::String(s) => s
            .parse::<i64>()
            .ok()
            .or_else(|| s.parse::<f64>().ok().and_then(truncate)),
        _ => None,
    }
}

/// Sizes arrive as floats and are rounded toward zero
fn truncate(v: f64) -> Option<i64> {
    if v.is_finite() && v.abs() < i64::MAX as f64 {
        Some(v.trunc() as i64)
    } else {
        None
    }
}

fn to_decimal(raw: &Value) -> Option<Decimal> {
    let text = match raw {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

fn to_text(raw: &Value) -> Option<String> {
    match raw {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn to_boolean(raw: &Value) -> Option<bool> {
    match raw {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Parse the payload of a data channel message
///
/// The payload is `[eventType, values]`, where `eventType` is either a bare
/// string or, on the first message for a type, `[eventType, fieldNames]`.
pub fn parse_data_message(data: &Value) -> Result<ParsedMessage> {
    let parts = data
        .as_array()
        .filter(|parts| parts.len() == 2)
        .ok_or_else(|| {
            StreamerError::ParseError(format!("expected [eventType, values], got {data}"))
        })?;

    let type_name = match &parts[0] {
        Value::String(name) => name.as_str(),
        Value::Array(header) => header.first().and_then(Value::as_str).ok_or_else(|| {
            StreamerError::ParseError(format!("event type header without a name: {}", parts[0]))
        })?,
        other => {
            return Err(StreamerError::ParseError(format!(
                "event type must be a string or list, got {other}"
            )))
        }
    };

    let Some(event_type) = EventType::from_wire(type_name) else {
        return Ok(ParsedMessage::Unknown(type_name.to_string()));
    };

    let values = parts[1].as_array().ok_or_else(|| {
        StreamerError::ParseError(format!("{event_type} values must be a list, got {}", parts[1]))
    })?;

    Ok(ParsedMessage::Events {
        event_type,
        frame: decode_frame(event_type, values)?,
    })
}
