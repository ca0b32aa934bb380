// storefront/src/models/pagination.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Copy, Deserialize, Validate)]
pub struct PageRequest {
  #[validate(range(min = 1, message = "page must be at least 1"))]
  pub page: i64,
  #[validate(range(min = 1, max = 100, message = "page_size must be between 1 and 100"))]
  pub page_size: i64,
}

impl PageRequest {
  pub fn offset(&self) -> i64 {
    (self.page - 1) * self.page_size
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T: Serialize> {
  pub current_page: i64,
  pub page_size: i64,
  pub last_page: i64,
  pub total_records: i64,
  pub orders: Vec<T>,
}

impl<T: Serialize> Paginated<T> {
  pub fn new(request: PageRequest, total_records: i64, orders: Vec<T>) -> Self {
    Self {
      current_page: request.page,
      page_size: request.page_size,
      last_page: last_page(total_records, request.page_size),
      total_records,
      orders,
    }
  }
}

/// `ceil(total / page_size)`, never below 1.
pub fn last_page(total_records: i64, page_size: i64) -> i64 {
  if page_size <= 0 {
    return 1;
  }
  ((total_records + page_size - 1) / page_size).max(1)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn last_page_rounds_up() {
    assert_eq!(last_page(25, 10), 3);
    assert_eq!(last_page(30, 10), 3);
    assert_eq!(last_page(31, 10), 4);
  }

  #[test]
  fn last_page_is_at_least_one() {
    assert_eq!(last_page(0, 10), 1);
  }

  #[test]
  fn offset_starts_at_zero() {
    let req = PageRequest { page: 2, page_size: 10 };
    assert_eq!(req.offset(), 10);
  }
}
