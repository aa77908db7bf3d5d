//! Typed colon-delimited messages: `recipient_id:type_name:params...`.
//!
//! Grounded on `vcsms/server.py`'s `INCOMING_MESSAGE_TYPES` /
//! `OUTGOING_MESSAGE_TYPES` schema tables and `MessageParser`'s
//! construct/parse/handle split.

use std::collections::HashMap;

use num_bigint::BigUint;

use crate::error::ParseError;

/// A decoded message field. Integers keep their declared base only for
/// re-encoding; comparisons and arithmetic work on the parsed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(BigUint),
    Text(String),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<&BigUint> {
        match self {
            Value::Int(n) => Some(n),
            Value::Text(_) => None,
        }
    }
}

/// How a single field is encoded on the wire.
#[derive(Debug, Clone, Copy)]
pub enum FieldSpec {
    /// An integer encoded as ASCII digits in the given base (10 or 16).
    Int(u32),
    /// UTF-8 text. Only valid as the last field of a type, since it may
    /// itself contain unescaped colons.
    Text,
}

/// The field layout for one message type, in both directions.
pub type Schema = FieldSpec;

fn encode_field(value: &Value, spec: FieldSpec) -> Result<String, ParseError> {
    match (value, spec) {
        (Value::Int(n), FieldSpec::Int(base)) => match base {
            10 => Ok(n.to_str_radix(10)),
            16 => Ok(n.to_str_radix(16)),
            other => Err(ParseError::Malformed(format!("unsupported integer base {other}"))),
        },
        (Value::Text(s), FieldSpec::Text) => Ok(s.clone()),
        _ => Err(ParseError::Malformed("field value does not match its schema type".into())),
    }
}

fn decode_field(raw: &str, spec: FieldSpec) -> Result<Value, ParseError> {
    match spec {
        FieldSpec::Int(base) => {
            let trimmed = if base == 16 {
                raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")).unwrap_or(raw)
            } else {
                raw
            };
            let n = BigUint::parse_bytes(trimmed.as_bytes(), base)
                .ok_or_else(|| ParseError::Malformed(format!("invalid base-{base} integer: {raw}")))?;
            Ok(Value::Int(n))
        }
        FieldSpec::Text => Ok(Value::Text(raw.to_string())),
    }
}

/// A single message's parsed recipient, type, and fields. The sender is
/// deliberately absent: it is never carried on the wire, only known to the
/// authenticated connection the message arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMessage {
    pub recipient: String,
    pub type_name: String,
    pub fields: Vec<Value>,
}

/// A direction's set of known message types and their field layouts.
#[derive(Default)]
pub struct MessageSchema {
    types: HashMap<&'static str, Vec<Schema>>,
}

impl MessageSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, type_name: &'static str, fields: Vec<Schema>) -> Self {
        self.types.insert(type_name, fields);
        self
    }

    pub fn fields_for(&self, type_name: &str) -> Option<&[Schema]> {
        self.types.get(type_name).map(|v| v.as_slice())
    }

    /// Build the wire form `recipient:type_name:f1:f2:...`.
    pub fn construct(
        &self,
        recipient: &str,
        type_name: &str,
        fields: &[Value],
    ) -> Result<String, ParseError> {
        let spec = self
            .fields_for(type_name)
            .ok_or_else(|| ParseError::UnknownType(type_name.to_string()))?;
        if spec.len() != fields.len() {
            return Err(ParseError::Arity {
                type_name: type_name.to_string(),
                expected: spec.len(),
                got: fields.len(),
            });
        }
        let mut parts = vec![recipient.to_string(), type_name.to_string()];
        for (value, field_spec) in fields.iter().zip(spec.iter()) {
            parts.push(encode_field(value, *field_spec)?);
        }
        Ok(parts.join(":"))
    }

    /// Parse a line of the wire form into recipient, type, and fields.
    /// Only the final field may contain unescaped colons (it must be the
    /// schema's lone `Text` field in the last position).
    pub fn parse(&self, line: &str) -> Result<ParsedMessage, ParseError> {
        let mut remainder = line;
        let (recipient, rest) = split_once_or_malformed(remainder, "recipient")?;
        remainder = rest;
        let (type_name, rest) = match remainder.split_once(':') {
            Some((t, r)) => (t, r),
            None => (remainder, ""),
        };
        remainder = rest;

        let spec = self
            .fields_for(type_name)
            .ok_or_else(|| ParseError::UnknownType(type_name.to_string()))?;

        let mut fields = Vec::with_capacity(spec.len());
        if !spec.is_empty() {
            for (i, field_spec) in spec.iter().enumerate() {
                let is_last = i + 1 == spec.len();
                let (raw, rest) = if is_last {
                    (remainder, "")
                } else {
                    split_once_or_malformed(remainder, "field")?
                };
                fields.push(decode_field(raw, *field_spec)?);
                remainder = rest;
            }
        }

        Ok(ParsedMessage {
            recipient: recipient.to_string(),
            type_name: type_name.to_string(),
            fields,
        })
    }
}

fn split_once_or_malformed<'a>(s: &'a str, what: &str) -> Result<(&'a str, &'a str), ParseError> {
    s.split_once(':')
        .ok_or_else(|| ParseError::Malformed(format!("missing ':' after {what}")))
}

/// The incoming schema a server's connection speaks (client -> server).
pub fn server_incoming_schema() -> MessageSchema {
    MessageSchema::new()
        .register("GetKey", vec![FieldSpec::Int(10), FieldSpec::Text])
        .register("Quit", vec![])
        .register("NoSuchKeyRequest", vec![FieldSpec::Int(10)])
}

/// The outgoing schema a server's connection speaks (server -> client).
pub fn server_outgoing_schema() -> MessageSchema {
    MessageSchema::new()
        .register("KeyFound", vec![FieldSpec::Int(10), FieldSpec::Int(16), FieldSpec::Int(16)])
        .register("KeyNotFound", vec![FieldSpec::Int(10)])
        .register("UnknownMessageType", vec![FieldSpec::Text])
        .register("CiphertextMalformed", vec![])
        .register("InvalidIV", vec![])
        .register("MessageDecryptionFailure", vec![])
        .register("MessageMalformed", vec![])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construct_then_parse_get_key() {
        let schema = server_incoming_schema();
        let line = schema
            .construct("0", "GetKey", &[Value::Int(BigUint::from(7u32)), Value::Text("abc123".into())])
            .unwrap();
        assert_eq!(line, "0:GetKey:7:abc123");
        let parsed = schema.parse(&line).unwrap();
        assert_eq!(parsed.recipient, "0");
        assert_eq!(parsed.type_name, "GetKey");
        assert_eq!(parsed.fields[0], Value::Int(BigUint::from(7u32)));
        assert_eq!(parsed.fields[1], Value::Text("abc123".into()));
    }

    #[test]
    fn text_field_keeps_embedded_colons_when_last() {
        let schema = server_incoming_schema();
        let parsed = schema.parse("0:GetKey:7:has:colons:inside").unwrap();
        assert_eq!(parsed.fields[1], Value::Text("has:colons:inside".into()));
    }

    #[test]
    fn unknown_type_errors() {
        let schema = server_incoming_schema();
        assert!(matches!(
            schema.parse("0:Nonsense:1"),
            Err(ParseError::UnknownType(_))
        ));
    }

    #[test]
    fn hex_fields_tolerate_0x_prefix() {
        let schema = server_outgoing_schema();
        let parsed = schema.parse("1:KeyFound:3:0x1f:2a").unwrap();
        assert_eq!(parsed.fields[1], Value::Int(BigUint::from(0x1fu32)));
        assert_eq!(parsed.fields[2], Value::Int(BigUint::from(0x2au32)));
    }

    #[test]
    fn zero_field_type_has_no_trailing_separator() {
        let schema = server_outgoing_schema();
        let line = schema.construct("0", "CiphertextMalformed", &[]).unwrap();
        assert_eq!(line, "0:CiphertextMalformed");
    }
}
