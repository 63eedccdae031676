//! Operation contract of the hosted row store.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Tables the application reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Notes,
    Sentences,
}

impl Table {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Notes => "notes",
            Self::Sentences => "sentences",
        }
    }
}

/// Row filter: equality or set membership on one column.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    In(String, Vec<Value>),
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(column.into(), value.into())
    }

    pub fn is_in<V: Into<Value>>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::In(column.into(), values.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn column(&self) -> &str {
        match self {
            Self::Eq(column, _) | Self::In(column, _) => column,
        }
    }

    /// Whether `row` passes this filter.
    #[must_use]
    pub fn matches(&self, row: &Value) -> bool {
        let Some(actual) = row.get(self.column()) else {
            return false;
        };
        match self {
            Self::Eq(_, expected) => actual == expected,
            Self::In(_, expected) => expected.contains(actual),
        }
    }
}

/// Single-column ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// Zero-based row window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRange {
    pub offset: usize,
    pub limit: usize,
}

/// Parameters of a select request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectQuery {
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub range: Option<RowRange>,
    /// Ask for the exact number of matching rows
    pub count: bool,
    /// Return only the count, no rows
    pub head: bool,
    /// Attach the number of related rows in this table to each row
    pub embed_count: Option<Table>,
}

impl SelectQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub fn order_desc(mut self, column: impl Into<String>) -> Self {
        self.order = Some(Order {
            column: column.into(),
            ascending: false,
        });
        self
    }

    #[must_use]
    pub const fn range(mut self, offset: usize, limit: usize) -> Self {
        self.range = Some(RowRange { offset, limit });
        self
    }

    #[must_use]
    pub const fn with_count(mut self) -> Self {
        self.count = true;
        self
    }

    #[must_use]
    pub const fn head_only(mut self) -> Self {
        self.count = true;
        self.head = true;
        self
    }

    #[must_use]
    pub const fn count_related(mut self, table: Table) -> Self {
        self.embed_count = Some(table);
        self
    }

    /// Column list in PostgREST syntax, e.g. `*,sentences(count)`.
    #[must_use]
    pub fn select_clause(&self) -> String {
        self.embed_count
            .map_or_else(|| "*".to_string(), |table| format!("*,{}(count)", table.name()))
    }
}

/// Rows returned by a select, plus the exact count when requested.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectResult {
    pub rows: Vec<Value>,
    pub total: Option<usize>,
}

/// The signed-in user as seen by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{0}")]
    Api(String),
    #[error("Failed to decode backend response: {0}")]
    Decode(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Query engine of the hosted backend.
///
/// Row-level security is enforced by the implementation: rows the principal
/// may not see or touch are silently excluded, so mutations report the rows
/// they actually affected.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    async fn select_rows(&self, table: Table, query: &SelectQuery) -> BackendResult<SelectResult>;

    /// Insert rows and return them as stored.
    async fn insert_rows(&self, table: Table, rows: Vec<Value>) -> BackendResult<Vec<Value>>;

    /// Apply `patch` to matching rows and return the updated rows.
    async fn update_rows(
        &self,
        table: Table,
        filters: &[Filter],
        patch: Value,
    ) -> BackendResult<Vec<Value>>;

    /// Delete matching rows and return the deleted rows.
    async fn delete_rows(&self, table: Table, filters: &[Filter]) -> BackendResult<Vec<Value>>;

    /// Current principal, if signed in.
    fn principal(&self) -> Option<Principal>;
}
