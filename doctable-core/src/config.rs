//! Configuration for tables and databases.
//!
//! Defaults live here rather than in shared mutable state: every [`Table`](crate::table::Table)
//! and [`Database`](crate::database::Database) receives its configuration at construction.

use serde::{Deserialize, Serialize};

/// Default number of query results kept per table.
pub const DEFAULT_CACHE_CAPACITY: usize = 10;

/// Name of the table used by the database-level shortcuts.
pub const DEFAULT_TABLE_NAME: &str = "_default";

/// Capacity of a query cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheCapacity {
    /// Keep at most this many entries. A capacity of `0` caches nothing.
    Bounded(usize),
    /// Never evict.
    Unbounded,
}

impl Default for CacheCapacity {
    fn default() -> Self {
        CacheCapacity::Bounded(DEFAULT_CACHE_CAPACITY)
    }
}

impl From<usize> for CacheCapacity {
    fn from(capacity: usize) -> Self {
        CacheCapacity::Bounded(capacity)
    }
}

impl From<Option<usize>> for CacheCapacity {
    fn from(capacity: Option<usize>) -> Self {
        capacity.map_or(CacheCapacity::Unbounded, CacheCapacity::Bounded)
    }
}

/// Configuration for a single table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Capacity of the table's query cache
    pub cache_capacity: CacheCapacity,
}

impl TableConfig {
    /// Set the query cache capacity
    pub fn with_cache_capacity(mut self, capacity: impl Into<CacheCapacity>) -> Self {
        self.cache_capacity = capacity.into();
        self
    }
}

/// Configuration for a database and the tables it opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Table used by the database-level shortcuts
    pub default_table: String,
    /// Configuration applied to every table opened through the database
    pub table: TableConfig,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            default_table: DEFAULT_TABLE_NAME.to_string(),
            table: TableConfig::default(),
        }
    }
}

impl DatabaseConfig {
    /// Set the name of the default table
    pub fn with_default_table(mut self, name: impl Into<String>) -> Self {
        self.default_table = name.into();
        self
    }

    /// Set the query cache capacity of every table
    pub fn with_cache_capacity(mut self, capacity: impl Into<CacheCapacity>) -> Self {
        self.table = self.table.with_cache_capacity(capacity);
        self
    }
}
