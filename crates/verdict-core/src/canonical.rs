//! Canonical JSON serialization for byte-stable hashing.
//!
//! Every fingerprint in the engine is computed over bytes produced here.
//! The encoding is unique for semantically equal values:
//! - object keys sorted by Unicode code point
//! - arrays preserve input order
//! - integers in the signed 64-bit range render without a fraction
//! - other finite floats are rounded to [`FLOAT_DECIMALS`] decimal places and
//!   rendered in the shortest decimal form that reparses to the rounded
//!   value; `-0` normalizes to `0`; scientific notation is never emitted
//! - NaN and infinities are rejected
//! - no insignificant whitespace, no trailing newline

use serde::Serialize;
use serde_json::Value;

/// Decimal places every observable float is bounded to before hashing.
pub const FLOAT_DECIMALS: usize = 10;

/// Errors raised while producing canonical bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CanonicalError {
    #[error("numeric value is NaN or infinite")]
    InvalidNumeric,
    #[error("object key is not a string")]
    InvalidKey,
    #[error("serialization failed: {0}")]
    Serialization(String),
}

/// Round a finite float to [`FLOAT_DECIMALS`] decimal places.
///
/// Goes through the decimal formatter rather than scale-round-divide: the
/// formatter rounds the exact decimal expansion at any magnitude, and the
/// result is a fixed point of this function, which is what makes
/// canonicalization idempotent.
#[must_use]
pub fn round_float(value: f64) -> f64 {
    format!("{value:.prec$}", prec = FLOAT_DECIMALS)
        .parse()
        .unwrap_or(value)
}

/// Render a float in canonical form.
///
/// The output is the shortest decimal string that reparses to the rounded
/// value. Rust's `Display` for `f64` provides shortest-roundtrip decimal
/// notation, so the only extra work is the zero normalization.
pub fn canonical_number(value: f64) -> Result<String, CanonicalError> {
    if !value.is_finite() {
        return Err(CanonicalError::InvalidNumeric);
    }
    let rounded = round_float(value);
    if rounded == 0.0 {
        // Collapses both 0 and -0.
        return Ok("0".to_owned());
    }
    Ok(format!("{rounded}"))
}

/// Serialize any value to its unique canonical byte sequence.
///
/// This is the sole construction path for bytes that feed the hasher; code
/// that hashes output of any other serializer is a defect.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, CanonicalError> {
    let json = serde_json::to_value(value).map_err(classify_serde_error)?;
    let mut out = Vec::with_capacity(256);
    write_canonical_value(&json, &mut out)?;
    Ok(out)
}

/// Canonicalize a pre-built [`serde_json::Value`] without a serde round-trip.
pub fn value_to_canonical_bytes(value: &Value) -> Result<Vec<u8>, CanonicalError> {
    let mut out = Vec::with_capacity(256);
    write_canonical_value(value, &mut out)?;
    Ok(out)
}

fn classify_serde_error(err: serde_json::Error) -> CanonicalError {
    // serde_json refuses maps whose keys do not serialize as strings; that is
    // the only data-shaped failure the canonicalizer distinguishes.
    let message = err.to_string();
    if message.contains("key must be a string") {
        CanonicalError::InvalidKey
    } else {
        CanonicalError::Serialization(message)
    }
}

fn write_canonical_value(value: &Value, out: &mut Vec<u8>) -> Result<(), CanonicalError> {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(number) => {
            if let Some(signed) = number.as_i64() {
                out.extend_from_slice(signed.to_string().as_bytes());
            } else {
                let float = number.as_f64().ok_or(CanonicalError::InvalidNumeric)?;
                out.extend_from_slice(canonical_number(float)?.as_bytes());
            }
        }
        Value::String(text) => write_escaped_string(text, out),
        Value::Array(items) => {
            out.push(b'[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(b',');
                }
                write_canonical_value(item, out)?;
            }
            out.push(b']');
        }
        Value::Object(fields) => {
            // serde_json preserves insertion order; canonical form demands
            // code-point order, which for UTF-8 strings is byte order.
            let mut keys: Vec<&String> = fields.keys().collect();
            keys.sort_unstable();
            out.push(b'{');
            for (index, key) in keys.iter().enumerate() {
                if index > 0 {
                    out.push(b',');
                }
                write_escaped_string(key, out);
                out.push(b':');
                write_canonical_value(&fields[key.as_str()], out)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}

fn write_escaped_string(text: &str, out: &mut Vec<u8>) {
    out.push(b'"');
    for ch in text.chars() {
        match ch {
            '"' => out.extend_from_slice(b"\\\""),
            '\\' => out.extend_from_slice(b"\\\\"),
            '\n' => out.extend_from_slice(b"\\n"),
            '\r' => out.extend_from_slice(b"\\r"),
            '\t' => out.extend_from_slice(b"\\t"),
            '\u{0008}' => out.extend_from_slice(b"\\b"),
            '\u{000C}' => out.extend_from_slice(b"\\f"),
            control if (control as u32) < 0x20 => {
                let mut buf = [0u8; 6];
                let escaped = format_control_escape(control as u32, &mut buf);
                out.extend_from_slice(escaped);
            }
            other => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out.push(b'"');
}

fn format_control_escape(code: u32, buf: &mut [u8; 6]) -> &[u8] {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    buf[0] = b'\\';
    buf[1] = b'u';
    buf[2] = b'0';
    buf[3] = b'0';
    buf[4] = HEX[((code >> 4) & 0x0f) as usize];
    buf[5] = HEX[(code & 0x0f) as usize];
    &buf[..]
}
