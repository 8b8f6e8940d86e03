//! Query options shared by every `get_all`/`find_all` call.
//!
//! # Responsibility
//! - Collect specification, sort, paging and eager-load hints in one value.
//! - Own the paging rules (`skip = (n - 1) * size`, `take = size`).
//!
//! # Invariants
//! - Paging is only valid together with a sort key and a definite order.
//! - Range checks (`OutOfRange`) run before the ordering check
//!   (`InvalidOperation`).

use super::paged::PagedResult;
use crate::repo::error::{RepoError, RepoResult};
use crate::specification::{FieldPath, Specification};

/// Requested sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Ascending,
    Descending,
    /// No ordering requested; adapter-stable order applies.
    #[default]
    Unspecified,
}

/// Sort key plus direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub key: FieldPath,
    pub order: SortOrder,
}

impl Sort {
    pub fn new(key: impl Into<FieldPath>, order: SortOrder) -> Self {
        Self {
            key: key.into(),
            order,
        }
    }

    pub fn ascending(key: impl Into<FieldPath>) -> Self {
        Self::new(key, SortOrder::Ascending)
    }

    pub fn descending(key: impl Into<FieldPath>) -> Self {
        Self::new(key, SortOrder::Descending)
    }

    /// Returns whether this sort defines an order at all.
    pub fn is_ordered(&self) -> bool {
        self.order != SortOrder::Unspecified
    }
}

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub size: u32,
}

impl Page {
    pub fn new(number: u32, size: u32) -> Self {
        Self { number, size }
    }

    /// Validates the page and converts it to a skip/take window.
    pub fn window(self) -> RepoResult<Window> {
        if self.number < 1 {
            return Err(RepoError::OutOfRange {
                parameter: "page_number",
                value: self.number,
            });
        }
        if self.size < 1 {
            return Err(RepoError::OutOfRange {
                parameter: "page_size",
                value: self.size,
            });
        }

        Ok(Window {
            skip: u64::from(self.number - 1) * u64::from(self.size),
            take: u64::from(self.size),
        })
    }
}

/// Rows to skip and take after filtering and sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub skip: u64,
    pub take: u64,
}

impl Window {
    pub fn first() -> Self {
        Self { skip: 0, take: 1 }
    }
}

/// Options for collection queries.
///
/// Every field is optional: the default query matches everything, in
/// adapter-stable order, without paging or eager loading.
#[derive(Debug)]
pub struct Query<T> {
    specification: Specification<T>,
    sort: Option<Sort>,
    page: Option<Page>,
    eager_load: Vec<String>,
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            specification: self.specification.clone(),
            sort: self.sort.clone(),
            page: self.page,
            eager_load: self.eager_load.clone(),
        }
    }
}

impl<T> Default for Query<T> {
    fn default() -> Self {
        Self {
            specification: Specification::Any,
            sort: None,
            page: None,
            eager_load: Vec::new(),
        }
    }
}

impl<T> Query<T> {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn matching(specification: Specification<T>) -> Self {
        Self {
            specification,
            ..Self::default()
        }
    }

    pub fn filter(mut self, specification: Specification<T>) -> Self {
        self.specification = specification;
        self
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn sort_by(self, key: impl Into<FieldPath>, order: SortOrder) -> Self {
        self.sort(Sort::new(key, order))
    }

    pub fn page(mut self, number: u32, size: u32) -> Self {
        self.page = Some(Page::new(number, size));
        self
    }

    pub fn eager_load(mut self, relation: impl Into<String>) -> Self {
        self.eager_load.push(relation.into());
        self
    }

    pub fn specification(&self) -> &Specification<T> {
        &self.specification
    }

    pub fn sort_spec(&self) -> Option<&Sort> {
        self.sort.as_ref()
    }

    pub fn page_spec(&self) -> Option<Page> {
        self.page
    }

    pub fn relations(&self) -> &[String] {
        &self.eager_load
    }

    /// Applies the paging rules and returns the window, if paging was asked.
    ///
    /// # Errors
    /// - `OutOfRange` when page number or size is below 1.
    /// - `InvalidOperation` when paging lacks a sort key with a definite order.
    pub fn validate(&self) -> RepoResult<Option<Window>> {
        let Some(page) = self.page else {
            return Ok(None);
        };

        let window = page.window()?;
        match &self.sort {
            Some(sort) if sort.is_ordered() => Ok(Some(window)),
            _ => Err(RepoError::InvalidOperation(
                "paged queries require a sort key and a sort order".to_string(),
            )),
        }
    }
}

/// Result of a collection query: a plain sequence, or a page when the query
/// asked for paging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResult<T> {
    Items(Vec<T>),
    Page(PagedResult<T>),
}

impl<T> QueryResult<T> {
    /// Entities held by this result (the page data for paged results).
    pub fn items(&self) -> &[T] {
        match self {
            Self::Items(items) => items,
            Self::Page(page) => page.data(),
        }
    }

    pub fn into_items(self) -> Vec<T> {
        match self {
            Self::Items(items) => items,
            Self::Page(page) => page.into_data(),
        }
    }

    pub fn into_page(self) -> Option<PagedResult<T>> {
        match self {
            Self::Items(_) => None,
            Self::Page(page) => Some(page),
        }
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }
}
