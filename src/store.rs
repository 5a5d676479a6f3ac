//! Generic data-store collaborator.
//!
//! The storefront keeps its tables in a hosted backend. This module describes
//! the narrow query shape the rest of the crate depends on: select with
//! equality and range filters, ordering, single-row and multi-row fetch, and
//! insert/update/upsert. Rows are JSON objects.
//!
//! [`MemoryStore`] is an in-process implementation used by tests, demos and
//! local development.
//!
//! # Examples
//!
//! ```rust
//! use serde_json::json;
//! use storefront_core::store::{DataStore, MemoryStore, Query};
//!
//! # tokio_test::block_on(async {
//! let store = MemoryStore::new();
//! store.insert_json("products", json!({"sku": "serum-30", "price": 42})).unwrap();
//! store.insert_json("products", json!({"sku": "balm-15", "price": 18})).unwrap();
//!
//! let cheap = store
//!     .fetch_many(&Query::table("products").lt("price", 20))
//!     .await
//!     .unwrap();
//! assert_eq!(cheap.len(), 1);
//! assert_eq!(cheap[0]["sku"], "balm-15");
//! # });
//! ```

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use serde_json::{Map, Value};

use crate::retry::{retry_if, RetryPolicy};

/// A single record: column name to value.
pub type Row = Map<String, Value>;

/// A predicate on one column.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Column equals the value.
    Eq(String, Value),
    /// Column does not equal the value.
    Neq(String, Value),
    /// Column is strictly greater than the value.
    Gt(String, Value),
    /// Column is greater than or equal to the value.
    Gte(String, Value),
    /// Column is strictly less than the value.
    Lt(String, Value),
    /// Column is less than or equal to the value.
    Lte(String, Value),
    /// Column equals any of the values.
    In(String, Vec<Value>),
}

/// Sort order for multi-row fetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    /// Column to sort by.
    pub column: String,
    /// Ascending when true.
    pub ascending: bool,
}

/// A select against one table.
///
/// Built fluently; filters are combined with AND.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    table: String,
    filters: Vec<Filter>,
    order: Option<Order>,
    limit: Option<usize>,
}

impl Query {
    /// Start a query on `table` with no filters.
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    /// Add an arbitrary filter.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// `column = value`
    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::Eq(column.into(), value.into()))
    }

    /// `column != value`
    pub fn neq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::Neq(column.into(), value.into()))
    }

    /// `column > value`
    pub fn gt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::Gt(column.into(), value.into()))
    }

    /// `column >= value`
    pub fn gte(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::Gte(column.into(), value.into()))
    }

    /// `column < value`
    pub fn lt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::Lt(column.into(), value.into()))
    }

    /// `column <= value`
    pub fn lte(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::Lte(column.into(), value.into()))
    }

    /// `column IN (values...)`
    pub fn in_list<I, V>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.filter(Filter::In(column.into(), values))
    }

    /// Sort the result by `column`.
    pub fn order_by(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.into(),
            ascending,
        });
        self
    }

    /// Return at most `n` rows.
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Table name.
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Filters in insertion order.
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Requested ordering, if any.
    pub fn order(&self) -> Option<&Order> {
        self.order.as_ref()
    }

    /// Row limit, if any.
    pub fn row_limit(&self) -> Option<usize> {
        self.limit
    }

    /// Whether `row` satisfies every filter.
    pub fn matches(&self, row: &Row) -> bool {
        self.filters.iter().all(|f| f.matches(row))
    }
}

impl Filter {
    /// The column this filter reads.
    pub fn column(&self) -> &str {
        match self {
            Filter::Eq(c, _)
            | Filter::Neq(c, _)
            | Filter::Gt(c, _)
            | Filter::Gte(c, _)
            | Filter::Lt(c, _)
            | Filter::Lte(c, _)
            | Filter::In(c, _) => c,
        }
    }

    /// Evaluate the filter against a row. A missing column never matches.
    pub fn matches(&self, row: &Row) -> bool {
        let Some(actual) = row.get(self.column()) else {
            return false;
        };
        match self {
            Filter::Eq(_, v) => actual == v,
            Filter::Neq(_, v) => actual != v,
            Filter::Gt(_, v) => compare(actual, v) == Some(Ordering::Greater),
            Filter::Gte(_, v) => matches!(
                compare(actual, v),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Filter::Lt(_, v) => compare(actual, v) == Some(Ordering::Less),
            Filter::Lte(_, v) => {
                matches!(compare(actual, v), Some(Ordering::Less | Ordering::Equal))
            }
            Filter::In(_, vs) => vs.contains(actual),
        }
    }
}

/// Order two JSON scalars of the same kind. Mixed kinds are incomparable.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Errors from a data store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// The backend could not be reached or refused the request.
    Unavailable(String),
    /// A single-row fetch matched more than one row.
    MultipleRows {
        /// Table queried.
        table: String,
        /// Number of matching rows.
        count: usize,
    },
    /// An upsert row lacked its conflict column.
    MissingColumn {
        /// Table written.
        table: String,
        /// The absent column.
        column: String,
    },
    /// A value was not a JSON object, or a row did not decode.
    Decode(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(msg) => write!(f, "data store unavailable: {}", msg),
            Self::MultipleRows { table, count } => {
                write!(f, "expected at most one row from {}, found {}", table, count)
            }
            Self::MissingColumn { table, column } => {
                write!(f, "row for {} is missing column {}", table, column)
            }
            Self::Decode(msg) => write!(f, "could not decode row: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl StoreError {
    /// Whether retrying the same request could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// The query interface the crate needs from a backend.
#[allow(async_fn_in_trait)]
pub trait DataStore {
    /// Fetch at most one row. More than one match is an error.
    async fn fetch_one(&self, query: &Query) -> Result<Option<Row>, StoreError>;

    /// Fetch every matching row, honouring order and limit.
    async fn fetch_many(&self, query: &Query) -> Result<Vec<Row>, StoreError>;

    /// Append a row to `table`.
    async fn insert(&self, table: &str, row: Row) -> Result<(), StoreError>;

    /// Merge `patch` into every row matching `query`. Returns the number updated.
    async fn update(&self, query: &Query, patch: Row) -> Result<usize, StoreError>;

    /// Replace the row whose `conflict_column` equals the new row's, or insert it.
    async fn upsert(&self, table: &str, conflict_column: &str, row: Row)
        -> Result<(), StoreError>;
}

impl<S: DataStore + ?Sized> DataStore for &S {
    async fn fetch_one(&self, query: &Query) -> Result<Option<Row>, StoreError> {
        (**self).fetch_one(query).await
    }

    async fn fetch_many(&self, query: &Query) -> Result<Vec<Row>, StoreError> {
        (**self).fetch_many(query).await
    }

    async fn insert(&self, table: &str, row: Row) -> Result<(), StoreError> {
        (**self).insert(table, row).await
    }

    async fn update(&self, query: &Query, patch: Row) -> Result<usize, StoreError> {
        (**self).update(query, patch).await
    }

    async fn upsert(
        &self,
        table: &str,
        conflict_column: &str,
        row: Row,
    ) -> Result<(), StoreError> {
        (**self).upsert(table, conflict_column, row).await
    }
}

/// In-process table store.
///
/// Rows keep insertion order unless a query asks for an ordering.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Vec<Row>>>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a JSON object synchronously. Handy for seeding fixtures.
    pub fn insert_json(&self, table: &str, value: Value) -> Result<(), StoreError> {
        let row = into_row(value)?;
        self.lock().entry(table.to_string()).or_default().push(row);
        Ok(())
    }

    /// Number of rows in `table`.
    pub fn len(&self, table: &str) -> usize {
        self.lock().get(table).map_or(0, Vec::len)
    }

    /// Whether `table` has no rows.
    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Row>>> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn select(&self, query: &Query) -> Vec<Row> {
        let tables = self.lock();
        let mut rows: Vec<Row> = tables
            .get(query.table_name())
            .map(|rows| rows.iter().filter(|r| query.matches(r)).cloned().collect())
            .unwrap_or_default();
        drop(tables);

        if let Some(order) = query.order() {
            rows.sort_by(|a, b| {
                let ord = match (a.get(&order.column), b.get(&order.column)) {
                    (Some(x), Some(y)) => compare(x, y).unwrap_or(Ordering::Equal),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                };
                if order.ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }
        if let Some(limit) = query.row_limit() {
            rows.truncate(limit);
        }
        rows
    }
}

/// Convert a JSON value into a row, rejecting non-objects.
pub fn into_row(value: Value) -> Result<Row, StoreError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Decode(format!("expected object, got {}", other))),
    }
}

impl DataStore for MemoryStore {
    async fn fetch_one(&self, query: &Query) -> Result<Option<Row>, StoreError> {
        let mut rows = self.select(query);
        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop()),
            count => Err(StoreError::MultipleRows {
                table: query.table_name().to_string(),
                count,
            }),
        }
    }

    async fn fetch_many(&self, query: &Query) -> Result<Vec<Row>, StoreError> {
        Ok(self.select(query))
    }

    async fn insert(&self, table: &str, row: Row) -> Result<(), StoreError> {
        self.lock().entry(table.to_string()).or_default().push(row);
        Ok(())
    }

    async fn update(&self, query: &Query, patch: Row) -> Result<usize, StoreError> {
        let mut tables = self.lock();
        let Some(rows) = tables.get_mut(query.table_name()) else {
            return Ok(0);
        };
        let mut updated = 0;
        for row in rows.iter_mut().filter(|r| query.matches(r)) {
            for (column, value) in &patch {
                row.insert(column.clone(), value.clone());
            }
            updated += 1;
        }
        Ok(updated)
    }

    async fn upsert(
        &self,
        table: &str,
        conflict_column: &str,
        row: Row,
    ) -> Result<(), StoreError> {
        let Some(key) = row.get(conflict_column).cloned() else {
            return Err(StoreError::MissingColumn {
                table: table.to_string(),
                column: conflict_column.to_string(),
            });
        };
        let mut tables = self.lock();
        let rows = tables.entry(table.to_string()).or_default();
        match rows.iter_mut().find(|r| r.get(conflict_column) == Some(&key)) {
            Some(existing) => *existing = row,
            None => rows.push(row),
        }
        Ok(())
    }
}

/// Wraps a store so transient failures are retried.
///
/// Only [`StoreError::Unavailable`] is retried, with the policy's flat
/// `initial_delay` between attempts. Other errors return at once.
///
/// # Examples
///
/// ```rust
/// use storefront_core::store::{MemoryStore, RetryingStore};
/// use storefront_core::RetryPolicy;
///
/// let store = RetryingStore::new(MemoryStore::new(), RetryPolicy::default());
/// assert_eq!(store.policy().max_retries(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct RetryingStore<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S> RetryingStore<S> {
    /// Retry calls to `inner` under `policy`.
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// The retry policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl<S: DataStore> DataStore for RetryingStore<S> {
    async fn fetch_one(&self, query: &Query) -> Result<Option<Row>, StoreError> {
        retry_if(
            || self.inner.fetch_one(query),
            &self.policy,
            StoreError::is_transient,
        )
        .await
    }

    async fn fetch_many(&self, query: &Query) -> Result<Vec<Row>, StoreError> {
        retry_if(
            || self.inner.fetch_many(query),
            &self.policy,
            StoreError::is_transient,
        )
        .await
    }

    async fn insert(&self, table: &str, row: Row) -> Result<(), StoreError> {
        retry_if(
            || self.inner.insert(table, row.clone()),
            &self.policy,
            StoreError::is_transient,
        )
        .await
    }

    async fn update(&self, query: &Query, patch: Row) -> Result<usize, StoreError> {
        retry_if(
            || self.inner.update(query, patch.clone()),
            &self.policy,
            StoreError::is_transient,
        )
        .await
    }

    async fn upsert(
        &self,
        table: &str,
        conflict_column: &str,
        row: Row,
    ) -> Result<(), StoreError> {
        retry_if(
            || self.inner.upsert(table, conflict_column, row.clone()),
            &self.policy,
            StoreError::is_transient,
        )
        .await
    }
}
