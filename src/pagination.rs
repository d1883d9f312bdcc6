//! Pagination arithmetic for paged reads.

use serde::{Deserialize, Serialize};

/// Caller-supplied paging parameters.
///
/// Pages are 1-based; a page of 0 or less is treated as the first page when
/// computing the row offset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PaginationInput {
   pub page: i64,
   pub page_size: i64,
}

impl PaginationInput {
   /// Row offset for this page: `(page - 1) * page_size`, clamped to 0 for
   /// non-positive pages.
   pub fn offset(&self) -> i64 {
      if self.page > 0 {
         (self.page - 1) * self.page_size
      } else {
         0
      }
   }
}

/// Derived paging summary returned from a paginated read.
///
/// Recomputed on every call; carries no identity of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationOutput {
   pub page: i64,
   pub page_size: i64,
   pub page_count: i64,
   pub total_rows: i64,
}

impl PaginationOutput {
   pub fn new(input: PaginationInput, total_rows: i64) -> Self {
      Self {
         page: input.page,
         page_size: input.page_size,
         page_count: page_count(input.page_size, total_rows),
         total_rows,
      }
   }
}

/// Number of pages needed for `total_rows` rows at `page_size` rows per page.
///
/// A non-positive page size means "everything on one page"; it is defined, not
/// an error.
fn page_count(page_size: i64, total_rows: i64) -> i64 {
   if page_size <= 0 || page_size >= total_rows {
      return 1;
   }

   if total_rows % page_size == 0 {
      total_rows / page_size
   } else {
      total_rows / page_size + 1
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_offset_is_zero_for_non_positive_pages() {
      for page in [0, -1, -50] {
         let input = PaginationInput { page, page_size: 10 };
         assert_eq!(input.offset(), 0);
      }
   }

   #[test]
   fn test_offset_for_positive_pages() {
      let input = PaginationInput {
         page: 1,
         page_size: 10,
      };
      assert_eq!(input.offset(), 0);

      let input = PaginationInput {
         page: 3,
         page_size: 25,
      };
      assert_eq!(input.offset(), 50);
   }

   #[test]
   fn test_page_count_single_page_when_everything_fits() {
      assert_eq!(page_count(10, 0), 1);
      assert_eq!(page_count(10, 10), 1);
      assert_eq!(page_count(100, 7), 1);
   }

   #[test]
   fn test_page_count_non_positive_page_size_is_one_page() {
      assert_eq!(page_count(0, 500), 1);
      assert_eq!(page_count(-5, 500), 1);
   }

   #[test]
   fn test_page_count_exact_division() {
      assert_eq!(page_count(10, 20), 2);
      assert_eq!(page_count(5, 100), 20);
   }

   #[test]
   fn test_page_count_rounds_up() {
      assert_eq!(page_count(10, 25), 3);
      assert_eq!(page_count(10, 21), 3);
      assert_eq!(page_count(3, 10), 4);
   }

   #[test]
   fn test_output_carries_input_through() {
      let input = PaginationInput {
         page: 2,
         page_size: 10,
      };
      let output = PaginationOutput::new(input, 25);
      assert_eq!(
         output,
         PaginationOutput {
            page: 2,
            page_size: 10,
            page_count: 3,
            total_rows: 25,
         }
      );
   }
}
