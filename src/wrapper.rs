//! The traced data access facade.
//!
//! [`TracedDatabase`] wraps a connected [`SqlitePool`] and is the main entry
//! point. [`TransactionScope`] is the same read/write surface bound to an open
//! transaction; both implement [`Queryable`], so code written against the
//! trait runs unchanged in and out of a transaction.

use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{Decode, FromRow, Row, Sqlite, Transaction, Type};
use tracing::Instrument;

use crate::error::{Error, Result};
use crate::executor::QueryExecutor;
use crate::pagination::{PaginationInput, PaginationOutput};
use crate::query::{RenderSql, SelectQuery, build_query};
use crate::trace::Instrumentation;

/// Result returned from write operations (e.g. INSERT, UPDATE, DELETE).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteQueryResult {
   /// The number of rows affected by the write operation.
   pub rows_affected: u64,
   /// The last inserted row ID (SQLite ROWID).
   ///
   /// Only set for INSERT operations on tables with a ROWID.
   /// Tables created with `WITHOUT ROWID` will not set this value (returns 0).
   pub last_insert_id: i64,
}

/// The uniform read/write surface over a query executor capability.
///
/// Implemented by [`TracedDatabase`] (queries run against the live pool) and
/// [`TransactionScope`] (queries run on the open transaction's connection).
/// Every operation renders its descriptor, wraps the round trip in a tracing
/// span, and returns tagged errors; a failed render is never executed.
#[allow(async_fn_in_trait)]
pub trait Queryable {
   /// Execute a streaming read, invoking `handler` once per result row.
   ///
   /// The row stream is closed before this returns. Fetch failures are
   /// recorded on the span and returned tagged; an error from `handler` stops
   /// the stream and is passed back unmodified.
   async fn query<F>(&mut self, query: &dyn RenderSql, handler: F) -> Result<()>
   where
      F: FnMut(&SqliteRow) -> Result<()> + Send;

   /// Execute a single-row read and bind the row to `T`.
   ///
   /// Field-mapped binding comes from `#[derive(FromRow)]` on a struct;
   /// positional binding from a tuple destination. An empty result is
   /// returned as the [`Error::NotFound`] sentinel (tagged, matchable via
   /// [`Error::is_not_found`]) and is not recorded as a span error.
   async fn query_one<T>(&mut self, query: &dyn RenderSql) -> Result<T>
   where
      T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin;

   /// Execute a single-value read, decoding column 0 of the single row.
   ///
   /// Same error contract as [`Queryable::query_one`].
   async fn query_scalar<T>(&mut self, query: &dyn RenderSql) -> Result<T>
   where
      T: for<'r> Decode<'r, Sqlite> + Type<Sqlite> + Send + Unpin;

   /// Execute a write statement.
   async fn execute(&mut self, query: &dyn RenderSql) -> Result<WriteQueryResult>;

   /// Execute a paginated read: a count query for the total, then the row
   /// query with limit/offset derived from `input`.
   ///
   /// Either failure aborts with a tagged error. On success the handler has
   /// seen one page of rows and the returned [`PaginationOutput`] carries the
   /// page count for the full result set.
   async fn query_paginated<F>(
      &mut self,
      count_query: &dyn RenderSql,
      query: SelectQuery,
      input: PaginationInput,
      handler: F,
   ) -> Result<PaginationOutput>
   where
      F: FnMut(&SqliteRow) -> Result<()> + Send;
}

/// A connected SQLite database with traced query execution.
///
/// Cloning is cheap; clones share the pool and instrumentation
/// configuration.
#[derive(Debug, Clone)]
pub struct TracedDatabase {
   pool: SqlitePool,
   instrumentation: Instrumentation,
}

impl TracedDatabase {
   /// Wrap a connected pool with default instrumentation.
   pub fn new(pool: SqlitePool) -> Self {
      Self::with_instrumentation(pool, Instrumentation::default())
   }

   /// Wrap a connected pool with explicit instrumentation configuration.
   pub fn with_instrumentation(pool: SqlitePool, instrumentation: Instrumentation) -> Self {
      Self {
         pool,
         instrumentation,
      }
   }

   /// The underlying pool, for operations outside this facade (e.g.
   /// migrations).
   pub fn pool(&self) -> &SqlitePool {
      &self.pool
   }

   pub(crate) fn instrumentation(&self) -> &Instrumentation {
      &self.instrumentation
   }
}

impl Queryable for TracedDatabase {
   async fn query<F>(&mut self, query: &dyn RenderSql, mut handler: F) -> Result<()>
   where
      F: FnMut(&SqliteRow) -> Result<()> + Send,
   {
      stream_rows(
         QueryExecutor::Pool(&self.pool),
         &self.instrumentation,
         query,
         &mut handler,
      )
      .await
   }

   async fn query_one<T>(&mut self, query: &dyn RenderSql) -> Result<T>
   where
      T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
   {
      fetch_one_row(
         QueryExecutor::Pool(&self.pool),
         &self.instrumentation,
         query,
      )
      .await
   }

   async fn query_scalar<T>(&mut self, query: &dyn RenderSql) -> Result<T>
   where
      T: for<'r> Decode<'r, Sqlite> + Type<Sqlite> + Send + Unpin,
   {
      fetch_scalar(
         QueryExecutor::Pool(&self.pool),
         &self.instrumentation,
         query,
      )
      .await
   }

   async fn execute(&mut self, query: &dyn RenderSql) -> Result<WriteQueryResult> {
      execute_write(
         QueryExecutor::Pool(&self.pool),
         &self.instrumentation,
         query,
      )
      .await
   }

   async fn query_paginated<F>(
      &mut self,
      count_query: &dyn RenderSql,
      query: SelectQuery,
      input: PaginationInput,
      mut handler: F,
   ) -> Result<PaginationOutput>
   where
      F: FnMut(&SqliteRow) -> Result<()> + Send,
   {
      fetch_paginated(
         QueryExecutor::Pool(&self.pool),
         &self.instrumentation,
         count_query,
         query,
         input,
         &mut handler,
      )
      .await
   }
}

/// The read/write surface of one open transaction.
///
/// Handed to the callback of
/// [`run_in_transaction`](TracedDatabase::run_in_transaction); every query
/// runs on the transaction's connection, never the pool. The scope shares the
/// database's instrumentation configuration but is an independent value — the
/// originating [`TracedDatabase`] stays usable (outside the transaction)
/// while the scope is alive.
pub struct TransactionScope {
   tx: Transaction<'static, Sqlite>,
   instrumentation: Instrumentation,
}

impl TransactionScope {
   pub(crate) fn new(tx: Transaction<'static, Sqlite>, instrumentation: Instrumentation) -> Self {
      Self {
         tx,
         instrumentation,
      }
   }

   /// Hand the transaction back for resolution.
   pub(crate) fn into_transaction(self) -> Transaction<'static, Sqlite> {
      self.tx
   }
}

impl Queryable for TransactionScope {
   async fn query<F>(&mut self, query: &dyn RenderSql, mut handler: F) -> Result<()>
   where
      F: FnMut(&SqliteRow) -> Result<()> + Send,
   {
      stream_rows(
         QueryExecutor::Connection(&mut *self.tx),
         &self.instrumentation,
         query,
         &mut handler,
      )
      .await
   }

   async fn query_one<T>(&mut self, query: &dyn RenderSql) -> Result<T>
   where
      T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
   {
      fetch_one_row(
         QueryExecutor::Connection(&mut *self.tx),
         &self.instrumentation,
         query,
      )
      .await
   }

   async fn query_scalar<T>(&mut self, query: &dyn RenderSql) -> Result<T>
   where
      T: for<'r> Decode<'r, Sqlite> + Type<Sqlite> + Send + Unpin,
   {
      fetch_scalar(
         QueryExecutor::Connection(&mut *self.tx),
         &self.instrumentation,
         query,
      )
      .await
   }

   async fn execute(&mut self, query: &dyn RenderSql) -> Result<WriteQueryResult> {
      execute_write(
         QueryExecutor::Connection(&mut *self.tx),
         &self.instrumentation,
         query,
      )
      .await
   }

   async fn query_paginated<F>(
      &mut self,
      count_query: &dyn RenderSql,
      query: SelectQuery,
      input: PaginationInput,
      mut handler: F,
   ) -> Result<PaginationOutput>
   where
      F: FnMut(&SqliteRow) -> Result<()> + Send,
   {
      fetch_paginated(
         QueryExecutor::Connection(&mut *self.tx),
         &self.instrumentation,
         count_query,
         query,
         input,
         &mut handler,
      )
      .await
   }
}

enum StreamFailure {
   Fetch(Error),
   Handler(Error),
}

async fn stream_rows(
   mut executor: QueryExecutor<'_>,
   instrumentation: &Instrumentation,
   query: &dyn RenderSql,
   handler: &mut (dyn FnMut(&SqliteRow) -> Result<()> + Send),
) -> Result<()> {
   let (sql, args) = query.render().map_err(|error| error.tag())?;
   let span = instrumentation.query_span(&sql, &args);

   let outcome = async {
      let mut rows = executor.fetch(build_query(&sql, &args));
      loop {
         match rows.try_next().await {
            Ok(Some(row)) => {
               if let Err(handler_error) = handler(&row) {
                  break Err(StreamFailure::Handler(handler_error));
               }
            }
            Ok(None) => break Ok(()),
            Err(fetch_error) => break Err(StreamFailure::Fetch(Error::from(fetch_error))),
         }
      }
      // `rows` is dropped here; the stream never outlives the operation.
   }
   .instrument(span.clone())
   .await;

   match outcome {
      Ok(()) => Ok(()),
      Err(StreamFailure::Fetch(error)) => {
         instrumentation.record_error(&span, &error);
         Err(error.tag())
      }
      // The handler's own failure goes back to the caller unmodified.
      Err(StreamFailure::Handler(error)) => Err(error),
   }
}

async fn fetch_one_row<T>(
   mut executor: QueryExecutor<'_>,
   instrumentation: &Instrumentation,
   query: &dyn RenderSql,
) -> Result<T>
where
   T: for<'r> FromRow<'r, SqliteRow>,
{
   let (sql, args) = query.render().map_err(|error| error.tag())?;
   let span = instrumentation.query_span(&sql, &args);

   let outcome = async {
      let row = executor
         .fetch_one(build_query(&sql, &args))
         .await
         .map_err(Error::from)?;
      T::from_row(&row).map_err(Error::from)
   }
   .instrument(span.clone())
   .await;

   outcome.map_err(|error| {
      // A not-found is informational, not a span error; record_error
      // suppresses it.
      instrumentation.record_error(&span, &error);
      error.tag()
   })
}

async fn fetch_scalar<T>(
   mut executor: QueryExecutor<'_>,
   instrumentation: &Instrumentation,
   query: &dyn RenderSql,
) -> Result<T>
where
   T: for<'r> Decode<'r, Sqlite> + Type<Sqlite>,
{
   let (sql, args) = query.render().map_err(|error| error.tag())?;
   let span = instrumentation.query_span(&sql, &args);

   let outcome = async {
      let row = executor
         .fetch_one(build_query(&sql, &args))
         .await
         .map_err(Error::from)?;
      row.try_get::<T, _>(0).map_err(Error::from)
   }
   .instrument(span.clone())
   .await;

   outcome.map_err(|error| {
      instrumentation.record_error(&span, &error);
      error.tag()
   })
}

async fn execute_write(
   mut executor: QueryExecutor<'_>,
   instrumentation: &Instrumentation,
   query: &dyn RenderSql,
) -> Result<WriteQueryResult> {
   let (sql, args) = query.render().map_err(|error| error.tag())?;
   let span = instrumentation.query_span(&sql, &args);

   let outcome = async {
      executor
         .execute(build_query(&sql, &args))
         .await
         .map_err(Error::from)
   }
   .instrument(span.clone())
   .await;

   match outcome {
      Ok(done) => Ok(WriteQueryResult {
         rows_affected: done.rows_affected(),
         last_insert_id: done.last_insert_rowid(),
      }),
      Err(error) => {
         instrumentation.record_error(&span, &error);
         Err(error.tag())
      }
   }
}

async fn fetch_paginated(
   mut executor: QueryExecutor<'_>,
   instrumentation: &Instrumentation,
   count_query: &dyn RenderSql,
   query: SelectQuery,
   input: PaginationInput,
   handler: &mut (dyn FnMut(&SqliteRow) -> Result<()> + Send),
) -> Result<PaginationOutput> {
   let total_rows: i64 = fetch_scalar(executor.reborrow(), instrumentation, count_query).await?;

   let query = query.limit(input.page_size).offset(input.offset());
   stream_rows(executor, instrumentation, &query, handler).await?;

   Ok(PaginationOutput::new(input, total_rows))
}
