use std::panic::Location;

/// Result type alias for traced database operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for traced database operations.
///
/// The `NotFound` sentinel stays detectable through any amount of wrapping:
/// [`Error::is_not_found`] inspects the chain structurally rather than by
/// string matching.
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// Error from SQLx operations.
   #[error(transparent)]
   Sqlx(sqlx::Error),

   /// A query descriptor could not be rendered into statement text and
   /// arguments. The query was never executed.
   #[error("query render failed: {0}")]
   Render(String),

   /// A single-row read matched no rows.
   ///
   /// This is an expected condition, not an operational fault: it is never
   /// recorded as a span error.
   #[error("record not found")]
   NotFound(#[source] sqlx::Error),

   /// A failure annotated with the source location where it crossed the data
   /// access layer. Produced by [`Error::tag`].
   #[error("{location}: {source}")]
   Tagged {
      location: &'static Location<'static>,
      source: Box<Error>,
   },

   /// The transaction callback failed and the subsequent rollback failed too.
   /// Both failures stay inspectable.
   #[error("transaction failed: {source}; rollback also failed: {rollback}")]
   RollbackFailed {
      source: Box<Error>,
      rollback: Box<Error>,
   },

   /// Generic error for caller-supplied work that doesn't fit other
   /// categories.
   #[error("{0}")]
   Other(String),
}

impl From<sqlx::Error> for Error {
   fn from(error: sqlx::Error) -> Self {
      match error {
         sqlx::Error::RowNotFound => Error::NotFound(sqlx::Error::RowNotFound),
         other => Error::Sqlx(other),
      }
   }
}

impl Error {
   /// Wrap this error with the caller's source location.
   ///
   /// The location lands in the error's textual chain ("src/file.rs:12:34:
   /// ..."); the wrapped error remains reachable for matching, so
   /// `err.tag().is_not_found()` still holds for a `NotFound`.
   #[track_caller]
   pub fn tag(self) -> Self {
      Error::Tagged {
         location: Location::caller(),
         source: Box::new(self),
      }
   }

   /// True if this error is, or wraps, the "record not found" sentinel.
   pub fn is_not_found(&self) -> bool {
      match self {
         Error::NotFound(_) => true,
         Error::Tagged { source, .. } => source.is_not_found(),
         Error::RollbackFailed { source, .. } => source.is_not_found(),
         _ => false,
      }
   }

   /// The rollback failure attached to this error, if resolution failed after
   /// the transaction callback had already erred.
   pub fn rollback_error(&self) -> Option<&Error> {
      match self {
         Error::RollbackFailed { rollback, .. } => Some(rollback),
         Error::Tagged { source, .. } => source.rollback_error(),
         _ => None,
      }
   }
}
