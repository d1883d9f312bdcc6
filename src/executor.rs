//! The minimal execute surface a facade needs.

use futures::stream::BoxStream;
use sqlx::Sqlite;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnection, SqlitePool, SqliteQueryResult, SqliteRow};

/// Where queries run: the live pool, or the single connection of an open
/// transaction.
///
/// These are the only two variants; the facade executes through this enum and
/// is otherwise oblivious to which one it holds.
pub enum QueryExecutor<'c> {
   /// Queries run against the connection pool.
   Pool(&'c SqlitePool),
   /// Queries run on an open transaction's connection.
   Connection(&'c mut SqliteConnection),
}

impl QueryExecutor<'_> {
   /// Reborrow for a sub-operation without giving up the capability.
   pub(crate) fn reborrow(&mut self) -> QueryExecutor<'_> {
      match self {
         Self::Pool(pool) => QueryExecutor::Pool(*pool),
         Self::Connection(conn) => QueryExecutor::Connection(&mut **conn),
      }
   }

   /// Stream result rows on either executor.
   pub(crate) fn fetch<'q>(
      &'q mut self,
      query: Query<'q, Sqlite, SqliteArguments<'q>>,
   ) -> BoxStream<'q, sqlx::Result<SqliteRow>> {
      match self {
         Self::Pool(pool) => query.fetch(&**pool),
         Self::Connection(conn) => query.fetch(&mut **conn),
      }
   }

   /// Fetch exactly one row on either executor.
   ///
   /// Errors with `sqlx::Error::RowNotFound` when the query matches nothing.
   pub(crate) async fn fetch_one<'a>(
      &mut self,
      query: Query<'a, Sqlite, SqliteArguments<'a>>,
   ) -> sqlx::Result<SqliteRow> {
      match self {
         Self::Pool(pool) => query.fetch_one(&**pool).await,
         Self::Connection(conn) => query.fetch_one(&mut **conn).await,
      }
   }

   /// Run a write statement on either executor.
   pub(crate) async fn execute<'a>(
      &mut self,
      query: Query<'a, Sqlite, SqliteArguments<'a>>,
   ) -> sqlx::Result<SqliteQueryResult> {
      match self {
         Self::Pool(pool) => query.execute(&**pool).await,
         Self::Connection(conn) => query.execute(&mut **conn).await,
      }
   }
}
