//! Traced SQLite data access built on sqlx.
//!
//! This crate wraps a connected [`sqlx::SqlitePool`] with two things:
//!
//! - A uniform, span-instrumented query path ([`Queryable`]) — streaming
//!   reads, single-row reads, scalar reads, writes, and paginated reads.
//!   Every database round trip carries tracing metadata (operation name,
//!   statement text, arguments), and an empty single-row result is normalized
//!   into the matchable [`Error::NotFound`] sentinel instead of being treated
//!   as an operational fault.
//! - A panic/error-safe transaction boundary
//!   ([`TracedDatabase::run_in_transaction`]) that resolves the transaction
//!   exactly once on every exit path: commit on success, rollback on error or
//!   panic.
//!
//! Code running inside a transaction ([`TransactionScope`]) and code running
//! against the live pool ([`TracedDatabase`]) are interchangeable through the
//! [`Queryable`] trait.
//!
//! # Example
//!
//! ```no_run
//! use sqlx_sqlite_traced::{Queryable, SqlQuery, TracedDatabase, TransactionOptions};
//!
//! # async fn example() -> sqlx_sqlite_traced::Result<()> {
//! let pool = sqlx::SqlitePool::connect("sqlite:app.db").await?;
//! let mut db = TracedDatabase::new(pool);
//!
//! // Write
//! db.execute(&SqlQuery::new("INSERT INTO users (name) VALUES (?)").bind("Alice"))
//!    .await?;
//!
//! // Single-row read (positional binding via a tuple destination)
//! let (name,): (String,) = db
//!    .query_one(&SqlQuery::new("SELECT name FROM users WHERE id = ?").bind(1))
//!    .await?;
//! assert_eq!(name, "Alice");
//!
//! // Transaction: commit on Ok, rollback on Err or panic
//! db.run_in_transaction(TransactionOptions::default(), |tx| {
//!    Box::pin(async move {
//!       tx.execute(&SqlQuery::new("DELETE FROM users WHERE id = ?").bind(1))
//!          .await?;
//!       Ok(())
//!    })
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod executor;
pub mod pagination;
pub mod query;
pub mod trace;
pub mod transaction;
pub mod wrapper;

pub use error::{Error, Result};
pub use executor::QueryExecutor;
pub use pagination::{PaginationInput, PaginationOutput};
pub use query::{RenderSql, SelectQuery, SqlQuery, bind_value};
pub use trace::{Instrumentation, ServerAttributes, SpanNamer, default_span_name};
pub use transaction::{TransactionBehavior, TransactionOptions};
pub use wrapper::{Queryable, TracedDatabase, TransactionScope, WriteQueryResult};
