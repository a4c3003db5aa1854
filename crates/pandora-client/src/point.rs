// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Data point encoding.
//!
//! A point is one line of `key=value` tokens separated by tabs:
//!
//! ```text
//! f1=abc<TAB>f2=123<TAB>ok=true<TAB>ts=2026-10-15T08:30:00Z<LF>
//! ```
//!
//! [`PointEntry`] accumulates the tokens of one point, [`DataPoints`] is the
//! batch buffer that the client sends or spills to disk.

use chrono::{DateTime, Utc};
use std::fmt;

use crate::buffer::Buffer;
use crate::error::{Error, Result};

/// Initial capacity of a batch buffer.
pub const DATA_BUFFER_SIZE: usize = 4096;

/// Field separator within a point.
const FIELD_SEPARATOR: char = '\t';

/// Timestamp format, always UTC.
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// A typed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    String(String),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Bool(bool),
    Time(DateTime<Utc>),
}

impl fmt::Display for FieldValue {
    /// - integers in decimal
    /// - floats with six fractional digits (`3.140000`)
    /// - booleans as `true` / `false`
    /// - times as `YYYY-MM-DDTHH:MM:SSZ`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(v) => f.write_str(v),
            FieldValue::Int32(v) => write!(f, "{}", v),
            FieldValue::Int64(v) => write!(f, "{}", v),
            FieldValue::Float32(v) => write!(f, "{:.6}", v),
            FieldValue::Float64(v) => write!(f, "{:.6}", v),
            FieldValue::Bool(v) => f.write_str(if *v { "true" } else { "false" }),
            FieldValue::Time(v) => write!(f, "{}", v.format(TIME_FORMAT)),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::String(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Int32(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int64(v)
    }
}

impl From<f32> for FieldValue {
    fn from(v: f32) -> Self {
        FieldValue::Float32(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float64(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(v: DateTime<Utc>) -> Self {
        FieldValue::Time(v)
    }
}

/// Tokens of a single data point.
#[derive(Debug, Clone, Default)]
pub struct PointEntry {
    fields: Vec<String>,
}

impl PointEntry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render one `key=value` token.
    ///
    /// Keys must be non-empty and free of `=`, tab and newline. String
    /// values must be free of tab and newline.
    pub fn append_field(&mut self, key: &str, value: impl Into<FieldValue>) -> Result<&mut Self> {
        validate_key(key)?;
        let value = value.into();
        if let FieldValue::String(s) = &value {
            if s.contains(&['\t', '\n'][..]) {
                return Err(Error::InvalidArgument(format!(
                    "value of field '{}' contains a tab or newline",
                    key
                )));
            }
        }
        self.fields.push(format!("{}={}", key, value));
        Ok(self)
    }

    pub fn append_string(&mut self, key: &str, value: &str) -> Result<&mut Self> {
        self.append_field(key, value)
    }

    pub fn append_int32(&mut self, key: &str, value: i32) -> Result<&mut Self> {
        self.append_field(key, value)
    }

    pub fn append_int64(&mut self, key: &str, value: i64) -> Result<&mut Self> {
        self.append_field(key, value)
    }

    pub fn append_float32(&mut self, key: &str, value: f32) -> Result<&mut Self> {
        self.append_field(key, value)
    }

    pub fn append_float64(&mut self, key: &str, value: f64) -> Result<&mut Self> {
        self.append_field(key, value)
    }

    pub fn append_boolean(&mut self, key: &str, value: bool) -> Result<&mut Self> {
        self.append_field(key, value)
    }

    pub fn append_time(&mut self, key: &str, value: DateTime<Utc>) -> Result<&mut Self> {
        self.append_field(key, value)
    }

    /// Append a time given as seconds since the Unix epoch.
    pub fn append_unix_time(&mut self, key: &str, secs: i64) -> Result<&mut Self> {
        let time = DateTime::<Utc>::from_timestamp(secs, 0).ok_or_else(|| {
            Error::InvalidArgument(format!("timestamp {} out of range", secs))
        })?;
        self.append_field(key, time)
    }

    /// Join the accumulated tokens with tabs (no trailing newline).
    pub fn finish(&self) -> String {
        let mut line = String::new();
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                line.push(FIELD_SEPARATOR);
            }
            line.push_str(field);
        }
        line
    }

    /// Drop all tokens so the entry can be reused.
    pub fn clear(&mut self) {
        self.fields.clear();
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidArgument("field key is empty".to_string()));
    }
    if key.contains(&['=', '\t', '\n'][..]) {
        return Err(Error::InvalidArgument(format!(
            "field key '{}' contains '=', a tab or a newline",
            key.escape_debug()
        )));
    }
    Ok(())
}

/// A batch of encoded points backed by a growable [`Buffer`].
#[derive(Debug)]
pub struct DataPoints {
    buf: Buffer,
    point_count: usize,
}

impl DataPoints {
    pub fn new() -> Self {
        Self::with_capacity(DATA_BUFFER_SIZE)
    }

    /// Batch whose buffer starts at `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Buffer::growable(capacity),
            point_count: 0,
        }
    }

    /// Encode `entry` as one newline-terminated line.
    ///
    /// On error the batch is left unchanged.
    pub fn append(&mut self, entry: &PointEntry) -> Result<()> {
        if entry.is_empty() {
            return Err(Error::InvalidArgument(
                "point entry has no fields".to_string(),
            ));
        }

        let mut line = entry.finish();
        line.push('\n');
        self.buf.write(line.as_bytes())?;
        self.point_count += 1;
        Ok(())
    }

    /// Append pre-encoded text verbatim, counting it as one point.
    pub fn append_raw(&mut self, line: &[u8]) -> Result<()> {
        if line.is_empty() {
            return Err(Error::InvalidArgument("raw point is empty".to_string()));
        }
        self.buf.write(line)?;
        self.point_count += 1;
        Ok(())
    }

    /// Reset count and buffer for a new accumulation cycle.
    pub fn clear(&mut self) {
        self.buf.reset();
        self.point_count = 0;
    }

    /// Encoded size in bytes.
    pub fn len(&self) -> usize {
        self.buf.size()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Number of points appended since the last clear.
    pub fn count(&self) -> usize {
        self.point_count
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.buf.as_bytes()
    }
}

impl Default for DataPoints {
    fn default() -> Self {
        Self::new()
    }
}
