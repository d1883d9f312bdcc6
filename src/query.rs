//! Query descriptors and SQLite argument binding.

use serde_json::Value as JsonValue;
use sqlx::Sqlite;
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;

use crate::error::Result;

/// A renderable description of a SQL statement plus positional arguments.
///
/// This is the seam towards whatever query builder the host uses: anything
/// that can produce `(statement text, ordered argument list)` can be executed
/// through the facade. Rendering may fail; a failed render is returned to the
/// caller without the statement ever being executed.
pub trait RenderSql: Send + Sync {
   fn render(&self) -> Result<(String, Vec<JsonValue>)>;
}

/// A plain SQL statement with positional `?` placeholders and JSON arguments.
///
/// # Examples
///
/// ```
/// use sqlx_sqlite_traced::SqlQuery;
///
/// let query = SqlQuery::new("INSERT INTO users (name, age) VALUES (?, ?)")
///    .bind("Alice")
///    .bind(30);
/// ```
#[derive(Debug, Clone)]
pub struct SqlQuery {
   sql: String,
   args: Vec<JsonValue>,
}

impl SqlQuery {
   pub fn new(sql: impl Into<String>) -> Self {
      Self {
         sql: sql.into(),
         args: Vec::new(),
      }
   }

   /// Append a positional argument.
   pub fn bind(mut self, value: impl Into<JsonValue>) -> Self {
      self.args.push(value.into());
      self
   }
}

impl RenderSql for SqlQuery {
   fn render(&self) -> Result<(String, Vec<JsonValue>)> {
      Ok((self.sql.clone(), self.args.clone()))
   }
}

/// A select-like descriptor that supports attaching `LIMIT` and `OFFSET`.
///
/// Paginated reads rebind limit and offset on the row query; anything else in
/// the statement is opaque to this type.
#[derive(Debug, Clone)]
pub struct SelectQuery {
   sql: String,
   args: Vec<JsonValue>,
   limit: Option<i64>,
   offset: Option<i64>,
}

impl SelectQuery {
   pub fn new(sql: impl Into<String>) -> Self {
      Self {
         sql: sql.into(),
         args: Vec::new(),
         limit: None,
         offset: None,
      }
   }

   /// Append a positional argument.
   pub fn bind(mut self, value: impl Into<JsonValue>) -> Self {
      self.args.push(value.into());
      self
   }

   pub fn limit(mut self, limit: i64) -> Self {
      self.limit = Some(limit);
      self
   }

   pub fn offset(mut self, offset: i64) -> Self {
      self.offset = Some(offset);
      self
   }
}

impl RenderSql for SelectQuery {
   fn render(&self) -> Result<(String, Vec<JsonValue>)> {
      let mut sql = self.sql.clone();
      let mut args = self.args.clone();

      if let Some(limit) = self.limit {
         sql.push_str(" LIMIT ?");
         args.push(limit.into());
      }
      if let Some(offset) = self.offset {
         if self.limit.is_none() {
            // SQLite rejects OFFSET without LIMIT; -1 means unbounded.
            sql.push_str(" LIMIT -1");
         }
         sql.push_str(" OFFSET ?");
         args.push(offset.into());
      }

      Ok((sql, args))
   }
}

/// Build a SQLx query from rendered statement text and arguments.
pub(crate) fn build_query<'q>(
   sql: &'q str,
   args: &[JsonValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
   let mut query = sqlx::query(sql);
   for value in args {
      query = bind_value(query, value.clone());
   }
   query
}

/// Bind a JSON value to a SQLx query.
///
/// Integers are bound as i64 to preserve precision; non-integral numbers fall
/// back to f64. Arrays and objects are bound through SQLx's JSON support.
pub fn bind_value<'q>(
   query: Query<'q, Sqlite, SqliteArguments<'q>>,
   value: JsonValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
   match value {
      JsonValue::Null => query.bind(None::<JsonValue>),
      JsonValue::Bool(flag) => query.bind(flag),
      JsonValue::String(text) => query.bind(text),
      JsonValue::Number(number) => {
         if let Some(int) = number.as_i64() {
            query.bind(int)
         } else {
            query.bind(number.as_f64().unwrap_or_default())
         }
      }
      other => query.bind(other),
   }
}
