//! Best-effort SQL introspection for database span tags.
//!
//! These are heuristics, not a parser: they look for the first verb keyword
//! and the first table reference after `from`/`update`. Anything they cannot
//! recognize yields the documented failure value `"unknown"`; a span with
//! an `unknown` tag is always preferred over a failed span.

use once_cell::sync::Lazy;
use regex::Regex;

/// Tag value used whenever a heuristic finds no match.
pub const UNKNOWN: &str = "unknown";

static VERB: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(select|update|delete)\b").expect("valid verb pattern"));

// Quoted form first: schema and table may be wrapped in double quotes or
// backticks, e.g. `UPDATE "shop"."orders" SET ...`.
static QUOTED_TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(?:update|from)\s+(?:["`]?([A-Za-z0-9_]+)["`]?\.)?["`]([^"`]+)["`]"#)
        .expect("valid quoted table pattern")
});

static TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:update|from)\s+(?:([A-Za-z0-9_]+)\.)?([A-Za-z0-9_]+)")
        .expect("valid table pattern")
});

/// Infers the statement verb from raw SQL: `select`, `update`, `delete`,
/// or [`UNKNOWN`].
pub fn infer_verb(statement: &str) -> String {
    VERB.captures(statement)
        .and_then(|caps| caps.get(1))
        .map_or_else(|| UNKNOWN.to_string(), |m| m.as_str().to_lowercase())
}

/// Infers the primary `schema.table` reference from raw SQL.
///
/// An unqualified table name is prefixed with `default_schema`; no
/// recognizable `from`/`update` clause yields [`UNKNOWN`].
pub fn infer_table(statement: &str, default_schema: &str) -> String {
    let caps = match QUOTED_TABLE
        .captures(statement)
        .or_else(|| TABLE.captures(statement))
    {
        Some(caps) => caps,
        None => return UNKNOWN.to_string(),
    };

    let table = caps.get(2).map_or(UNKNOWN, |m| m.as_str());
    match caps.get(1) {
        Some(schema) => format!("{}.{}", schema.as_str(), table),
        None => format!("{}.{}", default_schema, table),
    }
}
