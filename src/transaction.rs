//! Panic/error-safe transaction orchestration.
//!
//! [`TracedDatabase::run_in_transaction`] opens a transaction, hands the
//! callback a [`TransactionScope`] bound to it, and resolves the transaction
//! exactly once from the callback's outcome — commit on success, rollback on
//! error, rollback-then-re-raise on panic.

use std::fmt;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::error::{Error, Result};
use crate::wrapper::{TracedDatabase, TransactionScope};

/// SQLite transaction behavior — the isolation surface SQLite exposes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionBehavior {
   /// Take locks lazily, on first use.
   #[default]
   Deferred,
   /// Take the write lock up front.
   Immediate,
   /// Take an exclusive lock up front.
   Exclusive,
}

impl fmt::Display for TransactionBehavior {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      match self {
         Self::Deferred => f.write_str("deferred"),
         Self::Immediate => f.write_str("immediate"),
         Self::Exclusive => f.write_str("exclusive"),
      }
   }
}

/// Options applied when a transaction is opened. Immutable for the
/// transaction's lifetime.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TransactionOptions {
   pub behavior: TransactionBehavior,
   /// A read-only transaction is opened deferred regardless of `behavior`;
   /// in WAL mode that keeps it a pure read transaction.
   pub read_only: bool,
}

impl TransactionOptions {
   pub(crate) fn begin_statement(&self) -> &'static str {
      if self.read_only {
         return "BEGIN DEFERRED";
      }
      match self.behavior {
         TransactionBehavior::Deferred => "BEGIN DEFERRED",
         TransactionBehavior::Immediate => "BEGIN IMMEDIATE",
         TransactionBehavior::Exclusive => "BEGIN EXCLUSIVE",
      }
   }
}

impl TracedDatabase {
   /// Run `work` inside a database transaction and resolve the transaction
   /// from the outcome.
   ///
   /// Exactly one of commit or rollback happens on every exit path:
   ///
   /// - `work` returns `Ok` → commit; a commit failure replaces the success
   ///   as the returned error.
   /// - `work` returns `Err` → rollback; the error comes back unchanged,
   ///   unless rollback itself fails, in which case the returned
   ///   [`Error::RollbackFailed`] carries both failures.
   /// - `work` panics → rollback is attempted and its outcome recorded, then
   ///   the original panic is re-raised. A rollback failure is recorded but
   ///   never replaces the panic.
   ///
   /// The scope handed to `work` executes on the transaction's connection,
   /// never the pool. A span wraps the whole operation; spans opened by
   /// queries inside `work` nest under it. If the returned future is dropped
   /// mid-flight, the underlying transaction rolls back on drop.
   ///
   /// # Examples
   ///
   /// ```no_run
   /// # async fn example(db: &sqlx_sqlite_traced::TracedDatabase) -> sqlx_sqlite_traced::Result<()> {
   /// use sqlx_sqlite_traced::{Queryable, SqlQuery, TransactionOptions};
   ///
   /// db.run_in_transaction(TransactionOptions::default(), |tx| {
   ///    Box::pin(async move {
   ///       tx.execute(
   ///          &SqlQuery::new("UPDATE accounts SET balance = balance - ? WHERE id = ?")
   ///             .bind(10)
   ///             .bind(1),
   ///       )
   ///       .await?;
   ///       tx.execute(
   ///          &SqlQuery::new("UPDATE accounts SET balance = balance + ? WHERE id = ?")
   ///             .bind(10)
   ///             .bind(2),
   ///       )
   ///       .await?;
   ///       Ok(())
   ///    })
   /// })
   /// .await
   /// # }
   /// ```
   pub async fn run_in_transaction<T, F>(&self, options: TransactionOptions, work: F) -> Result<T>
   where
      F: for<'t> FnOnce(&'t mut TransactionScope) -> BoxFuture<'t, Result<T>>,
   {
      let span = self.instrumentation().transaction_span(&options);

      let tx = match self
         .pool()
         .begin_with(options.begin_statement())
         .instrument(span.clone())
         .await
      {
         Ok(tx) => tx,
         Err(begin_error) => {
            let error = Error::from(begin_error);
            self.instrumentation().record_error(&span, &error);
            return Err(error.tag());
         }
      };

      let mut scope = TransactionScope::new(tx, self.instrumentation().clone());
      let outcome = AssertUnwindSafe(work(&mut scope).instrument(span.clone()))
         .catch_unwind()
         .await;
      let tx = scope.into_transaction();

      match outcome {
         // Unrecovered fault in `work`: roll back as cleanup, then re-raise
         // the original payload.
         Err(panic_payload) => {
            span.record("db.tx.operation", "rollback");
            match tx.rollback().instrument(span.clone()).await {
               Ok(()) => {
                  span.record("db.tx.status", "rollback succeeded");
               }
               Err(rollback_error) => {
                  self
                     .instrumentation()
                     .record_error(&span, &Error::from(rollback_error));
                  span.record("db.tx.status", "rollback failed");
               }
            }
            std::panic::resume_unwind(panic_payload)
         }
         Ok(Err(work_error)) => {
            self.instrumentation().record_error(&span, &work_error);
            span.record("db.tx.operation", "rollback");
            match tx.rollback().instrument(span.clone()).await {
               Ok(()) => {
                  span.record("db.tx.status", "rollback succeeded");
                  Err(work_error)
               }
               Err(rollback_error) => {
                  let rollback_error = Error::from(rollback_error);
                  self.instrumentation().record_error(&span, &rollback_error);
                  span.record("db.tx.status", "rollback failed");
                  Err(Error::RollbackFailed {
                     source: Box::new(work_error),
                     rollback: Box::new(rollback_error),
                  })
               }
            }
         }
         Ok(Ok(value)) => {
            span.record("db.tx.operation", "commit");
            match tx.commit().instrument(span.clone()).await {
               Ok(()) => {
                  span.record("db.tx.status", "commit succeeded");
                  Ok(value)
               }
               Err(commit_error) => {
                  let error = Error::from(commit_error);
                  self.instrumentation().record_error(&span, &error);
                  span.record("db.tx.status", "commit failed");
                  Err(error.tag())
               }
            }
         }
      }
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_begin_statement_follows_behavior() {
      let options = TransactionOptions {
         behavior: TransactionBehavior::Immediate,
         read_only: false,
      };
      assert_eq!(options.begin_statement(), "BEGIN IMMEDIATE");

      let options = TransactionOptions {
         behavior: TransactionBehavior::Exclusive,
         read_only: false,
      };
      assert_eq!(options.begin_statement(), "BEGIN EXCLUSIVE");

      assert_eq!(TransactionOptions::default().begin_statement(), "BEGIN DEFERRED");
   }

   #[test]
   fn test_read_only_pins_deferred() {
      let options = TransactionOptions {
         behavior: TransactionBehavior::Exclusive,
         read_only: true,
      };
      assert_eq!(options.begin_statement(), "BEGIN DEFERRED");
   }

   #[test]
   fn test_behavior_display_for_span_attributes() {
      assert_eq!(TransactionBehavior::Deferred.to_string(), "deferred");
      assert_eq!(TransactionBehavior::Immediate.to_string(), "immediate");
      assert_eq!(TransactionBehavior::Exclusive.to_string(), "exclusive");
   }
}
