//! Repository contract and its unit-of-work backed implementation.
//!
//! # Responsibility
//! - Expose CRUD and query access for one aggregate-root type.
//! - Route writes to the bound unit of work and reads to its store.
//!
//! # Invariants
//! - `get*` fails with `NotFound` exactly where `find*` returns nothing.
//! - Paging is validated (`OutOfRange`, then `InvalidOperation`) before any
//!   store access.
//! - Repositories hold no state besides the context reference.

use super::context::RepositoryContext;
use super::error::{RepoError, RepoResult};
use super::store::{Store, StoreQuery};
use crate::id::EntityId;
use crate::model::entity::AggregateRoot;
use crate::query::options::{Query, QueryResult, Window};
use crate::query::paged::PagedResult;
use crate::specification::Specification;
use log::debug;
use std::marker::PhantomData;
use std::time::Instant;

/// Data access surface for one aggregate-root type.
pub trait Repository<T: AggregateRoot> {
    /// Registers the aggregate as new in the bound unit of work.
    fn add(&self, entity: &T) -> RepoResult<()>;

    /// Registers the aggregate as modified in the bound unit of work.
    fn update(&self, entity: &T) -> RepoResult<()>;

    /// Registers the aggregate as deleted in the bound unit of work.
    fn remove(&self, entity: &T) -> RepoResult<()>;

    /// Direct lookup by identifier.
    ///
    /// # Errors
    /// - `NotFound` when no stored aggregate has this identifier.
    fn get_by_key(&self, id: EntityId) -> RepoResult<T>;

    /// First match in store-stable order, with the named relations loaded.
    fn find(&self, specification: &Specification<T>, eager_load: &[&str]) -> RepoResult<Option<T>>;

    /// Like [`Repository::find`], but an empty result is an error.
    fn get(&self, specification: &Specification<T>, eager_load: &[&str]) -> RepoResult<T> {
        self.find(specification, eager_load)?
            .ok_or(RepoError::NotFound {
                kind: T::KIND,
                id: None,
            })
    }

    /// Collection query; returns a page when `query` asks for paging.
    ///
    /// # Errors
    /// - `OutOfRange` for page number or size below 1.
    /// - `InvalidOperation` for paging without a definite sort order.
    fn find_all(&self, query: &Query<T>) -> RepoResult<QueryResult<T>>;

    /// Like [`Repository::find_all`], but an empty sequence or page is an
    /// error.
    fn get_all(&self, query: &Query<T>) -> RepoResult<QueryResult<T>> {
        let result = self.find_all(query)?;
        if result.is_empty() {
            return Err(RepoError::NotFound {
                kind: T::KIND,
                id: None,
            });
        }
        Ok(result)
    }

    /// Whether at least one aggregate matches, without loading them.
    fn exists(&self, specification: &Specification<T>) -> RepoResult<bool>;
}

/// Repository bound to a [`RepositoryContext`].
pub struct ContextRepository<'ctx, T, S: Store> {
    context: &'ctx RepositoryContext<S>,
    _aggregate: PhantomData<fn() -> T>,
}

impl<'ctx, T, S: Store> ContextRepository<'ctx, T, S> {
    pub fn new(context: &'ctx RepositoryContext<S>) -> Self {
        Self {
            context,
            _aggregate: PhantomData,
        }
    }

    pub fn context(&self) -> &'ctx RepositoryContext<S> {
        self.context
    }
}

impl<T, S: Store> Clone for ContextRepository<'_, T, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, S: Store> Copy for ContextRepository<'_, T, S> {}

impl<T: AggregateRoot, S: Store> ContextRepository<'_, T, S> {
    fn store(&self) -> &S {
        self.context.store()
    }

    fn log_query(&self, paged: bool, rows: usize, started_at: Instant) {
        debug!(
            "event=repo_query module=repo status=ok context={} kind={} paged={} rows={} duration_ms={}",
            self.context.id(),
            T::KIND,
            paged,
            rows,
            started_at.elapsed().as_millis()
        );
    }
}

impl<T: AggregateRoot, S: Store> Repository<T> for ContextRepository<'_, T, S> {
    fn add(&self, entity: &T) -> RepoResult<()> {
        self.context.register_new(entity)
    }

    fn update(&self, entity: &T) -> RepoResult<()> {
        self.context.register_modified(entity)
    }

    fn remove(&self, entity: &T) -> RepoResult<()> {
        self.context.register_deleted(entity)
    }

    fn get_by_key(&self, id: EntityId) -> RepoResult<T> {
        self.store().load(id)?.ok_or(RepoError::NotFound {
            kind: T::KIND,
            id: Some(id),
        })
    }

    fn find(&self, specification: &Specification<T>, eager_load: &[&str]) -> RepoResult<Option<T>> {
        let started_at = Instant::now();
        let relations: Vec<String> = eager_load.iter().map(|name| name.to_string()).collect();
        let request = StoreQuery {
            specification,
            sort: None,
            window: Some(Window::first()),
            eager_load: &relations,
        };

        let found = self.store().query(&request)?.into_iter().next();
        self.log_query(false, usize::from(found.is_some()), started_at);
        Ok(found)
    }

    fn find_all(&self, query: &Query<T>) -> RepoResult<QueryResult<T>> {
        let started_at = Instant::now();
        let window = query.validate()?;
        let request = StoreQuery {
            specification: query.specification(),
            sort: query.sort_spec(),
            window,
            eager_load: query.relations(),
        };

        let result = match (query.page_spec(), window) {
            (Some(page), Some(_)) => {
                let total_count = self.store().count(query.specification())?;
                let data = self.store().query(&request)?;
                QueryResult::Page(PagedResult::new(total_count, page.size, page.number, data)?)
            }
            _ => QueryResult::Items(self.store().query(&request)?),
        };

        self.log_query(query.page_spec().is_some(), result.len(), started_at);
        Ok(result)
    }

    fn exists(&self, specification: &Specification<T>) -> RepoResult<bool> {
        self.store().exists(specification)
    }
}
