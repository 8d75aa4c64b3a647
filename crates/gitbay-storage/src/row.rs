// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row-mapping helpers shared by the query modules.
//!
//! IDs and enums are stored as TEXT for debuggability; JSON columns hold
//! serialized `serde_json::Value` payloads.

use std::str::FromStr;

use rusqlite::types::Type;
use uuid::Uuid;

/// Parse a TEXT column into a `Uuid`, mapping failures onto rusqlite's
/// conversion error so they surface through the normal query path.
pub fn parse_uuid(idx: usize, value: String) -> Result<Uuid, rusqlite::Error> {
    Uuid::parse_str(&value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Parse a TEXT column into any `FromStr` enum (strum-backed).
pub fn parse_enum<T>(idx: usize, value: String) -> Result<T, rusqlite::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    T::from_str(&value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Parse a TEXT column holding JSON.
pub fn parse_json(idx: usize, value: String) -> Result<serde_json::Value, rusqlite::Error> {
    serde_json::from_str(&value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Parse an optional TEXT column holding JSON.
pub fn parse_json_opt(
    idx: usize,
    value: Option<String>,
) -> Result<Option<serde_json::Value>, rusqlite::Error> {
    value.map(|v| parse_json(idx, v)).transpose()
}
