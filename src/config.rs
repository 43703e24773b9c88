//! This file provide some configuration for sqlplan
//! Caution: TEMP_TABLE_PREFIX is part of the plan contract with the executor,
//! changing it breaks any executor that looks nested queries up by key.

pub const _NAME: &str = "sqlplan";
pub const _VERSION: &str = "0.1.0";

pub const LOG_LEVEL: &str = "info";
pub const LOG_PATH: &str = "./logs/sqlplan.log";

/// Key prefix for nested subqueries registered in `NESTED_QUERIES`.
/// `#` cannot start an unquoted SQL identifier, so keys never collide with table names.
pub const TEMP_TABLE_PREFIX: &str = "###temp_";

/// Prefix of auto-generated names for unaliased CASE expressions.
pub const CASE_NAME_PREFIX: &str = "case";

/// Maximum nesting of subqueries, CASE expressions and token groups.
pub const MAX_NESTING_DEPTH: usize = 64;
