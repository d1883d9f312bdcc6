//! Span instrumentation for database round trips.
//!
//! Every read, write, and transaction is wrapped in a `tracing` span carrying
//! the rendered statement, a derived operation name, and (unless disabled) the
//! stringified argument list. Failures are recorded on the active span, with
//! one deliberate exception: the "record not found" condition is an expected
//! outcome of single-row reads and is never recorded as an error.

use std::fmt::Write as _;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::Span;
use tracing::field::Empty;

use crate::error::Error;
use crate::transaction::TransactionOptions;

/// Fallback operation name for statements with no leading token.
///
/// A fixed value prevents creating tracing operations that differ only by
/// whitespace.
const OPERATION_UNKNOWN: &str = "UNKNOWN";

/// Maps a rendered SQL statement to a span name.
pub type SpanNamer = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Default span name: the first 15 characters of the statement, with an
/// ellipsis when truncated.
pub fn default_span_name(statement: &str) -> String {
   let prefix: String = statement.chars().take(15).collect();
   if statement.chars().count() > 15 {
      format!("{prefix}...")
   } else {
      prefix
   }
}

/// The first 'word' of a SQL statement, upper-cased — usually the operation
/// name (e.g. 'SELECT').
fn sql_operation_name(statement: &str) -> String {
   match statement.split_whitespace().next() {
      Some(first) => first.to_uppercase(),
      None => OPERATION_UNKNOWN.to_string(),
   }
}

/// Stringify query arguments for span attachment.
///
/// Arguments travel as owned JSON values, so this always shows values rather
/// than addresses. Strings are rendered bare, everything else in its JSON
/// form.
fn format_parameters(args: &[JsonValue]) -> String {
   let mut out = String::new();
   for (index, arg) in args.iter().enumerate() {
      if index > 0 {
         out.push_str(", ");
      }
      match arg {
         JsonValue::String(text) => out.push_str(text),
         other => {
            let _ = write!(out, "{other}");
         }
      }
   }
   out
}

/// Static attributes describing the logical server behind the pool.
#[derive(Debug, Clone)]
pub struct ServerAttributes {
   pub host: String,
   pub port: u16,
   pub user: String,
}

/// Immutable instrumentation configuration, injected at construction.
///
/// There is no ambient/global configuration lookup: whatever tracing behavior
/// a facade has, it was given explicitly.
///
/// # Examples
///
/// ```
/// use sqlx_sqlite_traced::Instrumentation;
///
/// let instrumentation = Instrumentation::new()
///    .with_server("db.internal", 5432, "app")
///    .without_query_parameters();
/// ```
#[derive(Clone)]
pub struct Instrumentation {
   span_namer: SpanNamer,
   include_parameters: bool,
   server: Option<ServerAttributes>,
   attributes: Vec<(String, String)>,
}

impl Default for Instrumentation {
   fn default() -> Self {
      Self {
         span_namer: Arc::new(default_span_name),
         include_parameters: true,
         server: None,
         attributes: Vec::new(),
      }
   }
}

impl Instrumentation {
   pub fn new() -> Self {
      Self::default()
   }

   /// Use `namer` to generate span names from rendered SQL statements.
   pub fn with_span_namer(
      mut self,
      namer: impl Fn(&str) -> String + Send + Sync + 'static,
   ) -> Self {
      self.span_namer = Arc::new(namer);
      self
   }

   /// Leave query arguments out of span attributes.
   pub fn without_query_parameters(mut self) -> Self {
      self.include_parameters = false;
      self
   }

   /// Attach logical server coordinates to every span.
   pub fn with_server(
      mut self,
      host: impl Into<String>,
      port: u16,
      user: impl Into<String>,
   ) -> Self {
      self.server = Some(ServerAttributes {
         host: host.into(),
         port,
         user: user.into(),
      });
      self
   }

   /// Attach free-form `key=value` attributes to every span.
   pub fn with_attributes<K, V>(mut self, attributes: impl IntoIterator<Item = (K, V)>) -> Self
   where
      K: Into<String>,
      V: Into<String>,
   {
      self
         .attributes
         .extend(attributes.into_iter().map(|(k, v)| (k.into(), v.into())));
      self
   }

   /// Span wrapping one query round trip.
   pub(crate) fn query_span(&self, sql: &str, args: &[JsonValue]) -> Span {
      let span_name = (self.span_namer)(sql);
      let operation = sql_operation_name(sql);
      let span = tracing::info_span!(
         "db.query",
         otel.kind = "client",
         otel.name = %span_name,
         otel.status_code = Empty,
         db.operation.name = %operation,
         db.query.text = %sql,
         db.query.parameter = Empty,
         db.attributes = Empty,
         server.address = Empty,
         server.port = Empty,
         db.user = Empty,
         exception.message = Empty,
      );

      if self.include_parameters {
         span.record("db.query.parameter", format_parameters(args).as_str());
      }
      self.record_static_attributes(&span);

      span
   }

   /// Span wrapping a whole transaction, begin through resolution.
   pub(crate) fn transaction_span(&self, options: &TransactionOptions) -> Span {
      let span = tracing::info_span!(
         "db.transaction",
         otel.kind = "client",
         otel.status_code = Empty,
         db.tx.isolation = %options.behavior,
         db.tx.read_only = options.read_only,
         db.tx.operation = Empty,
         db.tx.status = Empty,
         db.attributes = Empty,
         server.address = Empty,
         server.port = Empty,
         db.user = Empty,
         exception.message = Empty,
      );

      self.record_static_attributes(&span);

      span
   }

   fn record_static_attributes(&self, span: &Span) {
      if let Some(server) = &self.server {
         span.record("server.address", server.host.as_str());
         span.record("server.port", u64::from(server.port));
         span.record("db.user", server.user.as_str());
      }
      if !self.attributes.is_empty() {
         let mut joined = String::new();
         for (index, (key, value)) in self.attributes.iter().enumerate() {
            if index > 0 {
               joined.push_str(", ");
            }
            let _ = write!(joined, "{key}={value}");
         }
         span.record("db.attributes", joined.as_str());
      }
   }

   /// Record a failure on `span`.
   ///
   /// The "record not found" sentinel is an expected empty-result condition
   /// and is not recorded.
   pub(crate) fn record_error(&self, span: &Span, error: &Error) {
      if error.is_not_found() {
         return;
      }

      span.record("otel.status_code", "ERROR");
      span.record("exception.message", tracing::field::display(error));
      tracing::error!(parent: span, error = %error, "database operation failed");
   }
}

impl std::fmt::Debug for Instrumentation {
   fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
      f.debug_struct("Instrumentation")
         .field("include_parameters", &self.include_parameters)
         .field("server", &self.server)
         .field("attributes", &self.attributes)
         .finish_non_exhaustive()
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use serde_json::json;

   #[test]
   fn test_operation_name_is_first_token_upper_cased() {
      assert_eq!(sql_operation_name("select * from users"), "SELECT");
      assert_eq!(sql_operation_name("  INSERT INTO t VALUES (?)"), "INSERT");
      assert_eq!(sql_operation_name("delete from t"), "DELETE");
   }

   #[test]
   fn test_operation_name_falls_back_for_empty_statements() {
      assert_eq!(sql_operation_name(""), OPERATION_UNKNOWN);
      assert_eq!(sql_operation_name("   \t "), OPERATION_UNKNOWN);
   }

   #[test]
   fn test_default_span_name_truncates_long_statements() {
      assert_eq!(
         default_span_name("SELECT id, name FROM users"),
         "SELECT id, name..."
      );
   }

   #[test]
   fn test_default_span_name_keeps_short_statements_whole() {
      assert_eq!(default_span_name("COMMIT"), "COMMIT");
   }

   #[test]
   fn test_format_parameters_shows_values() {
      let params = format_parameters(&[json!("Alice"), json!(30), json!(null), json!(true)]);
      assert_eq!(params, "Alice, 30, null, true");
   }

   #[test]
   fn test_format_parameters_empty() {
      assert_eq!(format_parameters(&[]), "");
   }
}
