//! Typed value decoding for graph property cells.
//!
//! Decoding never fails. A cell goes through three passes:
//! 1. reduce to a primitive (bytes are decoded to text, UTF-8 first, GB18030 as fallback)
//! 2. if the text is a stringified bytes literal (`b'\xe6\x80\xbb'`), unescape and decode again
//! 3. convert according to the property's [`TypeTag`]
//!
//! A conversion failure in pass 3 degrades to the pre-conversion text.

use std::fmt;
use std::sync::LazyLock;

use chrono::{Local, TimeZone};
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::schema::{PropertySchema, TypeTag};
use crate::value::GraphValue;

/// A decoded property value. Timestamps are already formatted local date-times.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TypedValue {
    Null,
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Timestamp(String),
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Null => Ok(()),
            TypedValue::String(s) | TypedValue::Timestamp(s) => f.write_str(s),
            TypedValue::Int(i) => write!(f, "{i}"),
            TypedValue::Float(x) => write!(f, "{x}"),
            TypedValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

#[derive(Debug, Error)]
enum DecodeError {
    #[error("cannot read {value:?} as {tag:?}")]
    Conversion { value: String, tag: TypeTag },
    #[error("epoch milliseconds out of range: {0}")]
    TimestampRange(i64),
}

#[derive(Debug, Clone, PartialEq)]
enum Primitive {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Primitive::Null => Ok(()),
            Primitive::Bool(b) => write!(f, "{b}"),
            Primitive::Int(i) => write!(f, "{i}"),
            Primitive::Float(x) => write!(f, "{x}"),
            Primitive::Text(s) => f.write_str(s),
        }
    }
}

/// Decode one property cell according to `schema`.
pub fn decode(raw: &GraphValue, property: &str, schema: &PropertySchema) -> TypedValue {
    let primitive = match to_primitive(raw) {
        Primitive::Text(text) => Primitive::Text(redecode_byte_literal(text)),
        other => other,
    };

    if primitive == Primitive::Null {
        return TypedValue::Null;
    }

    let tag = schema.type_of(property);
    match convert(&primitive, tag, schema.timestamp_format()) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(property, error = %e, "Property conversion failed, keeping text");
            TypedValue::String(primitive.to_string())
        }
    }
}

fn to_primitive(raw: &GraphValue) -> Primitive {
    match raw {
        GraphValue::Null => Primitive::Null,
        GraphValue::Bool(b) => Primitive::Bool(*b),
        GraphValue::Int(i) => Primitive::Int(*i),
        GraphValue::Float(x) => Primitive::Float(*x),
        GraphValue::Text(s) => Primitive::Text(s.clone()),
        GraphValue::Bytes(bytes) => Primitive::Text(decode_bytes(bytes)),
        // No native primitive: fall back to the textual rendering.
        other => Primitive::Text(other.to_string()),
    }
}

/// UTF-8 first; on failure GB18030 with replacement characters. Never fails.
pub fn decode_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (text, _had_errors) = encoding_rs::GB18030.decode_without_bom_handling(bytes);
            text.into_owned()
        }
    }
}

static BYTE_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:^|[^A-Za-z0-9_])b(?:'((?:[^'\\]|\\.)*)'|"((?:[^"\\]|\\.)*)")"#)
        .expect("valid byte-literal regex")
});

/// If `text` carries a stringified bytes literal, unescape it and decode the
/// bytes. Otherwise, or if the literal is malformed, return `text` untouched.
pub fn redecode_byte_literal(text: String) -> String {
    let Some(caps) = BYTE_LITERAL.captures(&text) else {
        return text;
    };
    let Some(body) = caps.get(1).or_else(|| caps.get(2)) else {
        return text;
    };
    match unescape_byte_literal(body.as_str()) {
        Some(bytes) => decode_bytes(&bytes),
        None => text,
    }
}

/// Parse the body of a bytes literal (`\xHH`, `\\`, `\'`, `\"`, `\n`, `\r`, `\t`, `\0`).
/// Returns `None` for non-ASCII content or a truncated escape.
pub fn unescape_byte_literal(body: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if !c.is_ascii() {
            return None;
        }
        if c != '\\' {
            out.push(c as u8);
            continue;
        }
        match chars.next()? {
            'x' => {
                let hi = chars.next()?.to_digit(16)?;
                let lo = chars.next()?.to_digit(16)?;
                out.push((hi * 16 + lo) as u8);
            }
            '\\' => out.push(b'\\'),
            '\'' => out.push(b'\''),
            '"' => out.push(b'"'),
            'n' => out.push(b'\n'),
            'r' => out.push(b'\r'),
            't' => out.push(b'\t'),
            '0' => out.push(0),
            other if other.is_ascii() => {
                // Unknown escapes stay literal.
                out.push(b'\\');
                out.push(other as u8);
            }
            _ => return None,
        }
    }
    Some(out)
}

fn convert(value: &Primitive, tag: TypeTag, ts_format: &str) -> Result<TypedValue, DecodeError> {
    let fail = || DecodeError::Conversion {
        value: value.to_string(),
        tag,
    };
    match tag {
        TypeTag::String => Ok(TypedValue::String(value.to_string())),
        TypeTag::Int => match value {
            Primitive::Int(i) => Ok(TypedValue::Int(*i)),
            Primitive::Float(x) if x.is_finite() => Ok(TypedValue::Int(x.trunc() as i64)),
            Primitive::Bool(b) => Ok(TypedValue::Int(i64::from(*b))),
            Primitive::Text(s) => s.trim().parse().map(TypedValue::Int).map_err(|_| fail()),
            _ => Err(fail()),
        },
        TypeTag::Float => match value {
            Primitive::Int(i) => Ok(TypedValue::Float(*i as f64)),
            Primitive::Float(x) => Ok(TypedValue::Float(*x)),
            Primitive::Bool(b) => Ok(TypedValue::Float(if *b { 1.0 } else { 0.0 })),
            Primitive::Text(s) => s.trim().parse().map(TypedValue::Float).map_err(|_| fail()),
            Primitive::Null => Err(fail()),
        },
        TypeTag::Bool => match value {
            Primitive::Bool(b) => Ok(TypedValue::Bool(*b)),
            Primitive::Int(i) => Ok(TypedValue::Bool(*i != 0)),
            Primitive::Float(x) => Ok(TypedValue::Bool(*x != 0.0)),
            Primitive::Text(s) => {
                let s = s.trim();
                if let Ok(i) = s.parse::<i64>() {
                    Ok(TypedValue::Bool(i != 0))
                } else if s.eq_ignore_ascii_case("true") {
                    Ok(TypedValue::Bool(true))
                } else if s.eq_ignore_ascii_case("false") {
                    Ok(TypedValue::Bool(false))
                } else {
                    Err(fail())
                }
            }
            Primitive::Null => Err(fail()),
        },
        TypeTag::Timestamp => {
            let millis = match value {
                Primitive::Int(i) => *i,
                Primitive::Float(x) if x.is_finite() => x.trunc() as i64,
                Primitive::Text(s) => s.trim().parse().map_err(|_| fail())?,
                _ => return Err(fail()),
            };
            format_epoch_millis(millis, ts_format).map(TypedValue::Timestamp)
        }
    }
}

fn format_epoch_millis(millis: i64, format: &str) -> Result<String, DecodeError> {
    Local
        .timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.format(format).to_string())
        .ok_or(DecodeError::TimestampRange(millis))
}
