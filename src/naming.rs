//! Physical names of partition tables and the round-robin cursor.
//!
//! Partition tables are always named `<prefix><index>`; nothing else in the
//! crate builds partition names by hand.

use std::fmt;

pub const RANGE_TABLE_PREFIX: &str = "range_part";
pub const RROBIN_TABLE_PREFIX: &str = "rrobin_part";
pub const RROBIN_INSERT_SEQ: &str = "rrobin_insert_seq";

/// Partitioning strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    Range,
    RoundRobin,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Range => "range",
            Strategy::RoundRobin => "round-robin",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "range" => Ok(Strategy::Range),
            "round-robin" | "round_robin" | "rrobin" | "rr" => Ok(Strategy::RoundRobin),
            _ => Err(format!(
                "Invalid strategy '{}'. Must be one of: range, round-robin",
                s
            )),
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            Strategy::Range => RANGE_TABLE_PREFIX,
            Strategy::RoundRobin => RROBIN_TABLE_PREFIX,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn partition_table_name(strategy: Strategy, index: usize) -> String {
    format!("{}{}", strategy.prefix(), index)
}

/// Inverse of [`partition_table_name`]. `None` for tables that share the
/// prefix but are not `<prefix><digits>`.
pub fn parse_partition_index(strategy: Strategy, table_name: &str) -> Option<usize> {
    let suffix = table_name.strip_prefix(strategy.prefix())?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

/// Double-quote an identifier for DuckDB.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn qualified_name(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}
