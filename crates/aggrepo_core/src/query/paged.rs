//! Paged query result value type.
//!
//! # Invariants
//! - `page_count == ceil(total_count / page_size)`, 0 when `total_count == 0`.
//! - `page_number >= 1`, `page_size >= 1` and `data.len() <= page_size`
//!   for every instance except the zero-valued [`PagedResult::EMPTY`].

use crate::repo::error::{RepoError, RepoResult};
use serde::Serialize;

/// One page of query results plus paging metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PagedResult<T> {
    total_count: u64,
    page_count: u64,
    page_size: u32,
    page_number: u32,
    data: Vec<T>,
}

impl<T> PagedResult<T> {
    /// Zero-valued sentinel for "no matching page".
    pub const EMPTY: Self = Self {
        total_count: 0,
        page_count: 0,
        page_size: 0,
        page_number: 0,
        data: Vec::new(),
    };

    pub fn new(total_count: u64, page_size: u32, page_number: u32, data: Vec<T>) -> RepoResult<Self> {
        if page_size == 0 {
            return Err(RepoError::OutOfRange {
                parameter: "page_size",
                value: page_size,
            });
        }
        if page_number == 0 {
            return Err(RepoError::OutOfRange {
                parameter: "page_number",
                value: page_number,
            });
        }
        if data.len() > page_size as usize {
            return Err(RepoError::InvalidData(format!(
                "page holds {} items but page_size is {page_size}",
                data.len()
            )));
        }

        Ok(Self {
            total_count,
            page_count: total_count.div_ceil(u64::from(page_size)),
            page_size,
            page_number,
            data,
        })
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn page_count(&self) -> u64 {
        self.page_count
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn into_data(self) -> Vec<T> {
        self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::PagedResult;
    use crate::repo::error::RepoError;

    #[test]
    fn page_count_rounds_up() {
        let page = PagedResult::new(10, 3, 1, vec![1, 2, 3]).unwrap();
        assert_eq!(page.page_count(), 4);
        assert_eq!(page.total_count(), 10);
        assert_eq!(page.data(), &[1, 2, 3]);
    }

    #[test]
    fn zero_total_has_zero_pages() {
        let page = PagedResult::<u8>::new(0, 5, 1, Vec::new()).unwrap();
        assert_eq!(page.page_count(), 0);
        assert!(page.is_empty());
    }

    #[test]
    fn rejects_invalid_page_parameters() {
        let err = PagedResult::<u8>::new(1, 0, 1, Vec::new()).unwrap_err();
        assert!(matches!(err, RepoError::OutOfRange { parameter: "page_size", .. }));

        let err = PagedResult::<u8>::new(1, 2, 0, Vec::new()).unwrap_err();
        assert!(matches!(err, RepoError::OutOfRange { parameter: "page_number", .. }));

        let err = PagedResult::new(3, 2, 1, vec![1, 2, 3]).unwrap_err();
        assert!(matches!(err, RepoError::InvalidData(_)));
    }

    #[test]
    fn empty_sentinel_is_zero_valued() {
        let empty = PagedResult::<String>::EMPTY;
        assert_eq!(empty.total_count(), 0);
        assert_eq!(empty.page_count(), 0);
        assert_eq!(empty.page_size(), 0);
        assert!(empty.is_empty());
    }
}
