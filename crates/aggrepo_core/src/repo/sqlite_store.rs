//! SQLite-backed storage adapter.
//!
//! # Responsibility
//! - Persist aggregates as JSON documents partitioned by `AggregateRoot::KIND`.
//! - Push fully structural specifications down to SQL; evaluate trees with
//!   opaque predicates in memory with the same value ordering.
//! - Keep relation fields in `aggregate_relations` and merge them back only
//!   when a query eager-loads them.
//!
//! # Invariants
//! - Default order is `id ASC`; it is also the tie-breaker after any sort.
//! - Filters and sort keys see the stored root document only. Conditions and
//!   sort keys on relation fields are rejected; opaque predicates see the
//!   aggregate without relations.
//! - `flush` runs in one transaction: inserts, then updates, then deletes.
//! - A relation that is `null`/absent in a flushed document leaves the stored
//!   relation untouched.

use super::error::{RepoError, RepoResult};
use super::sql_filter::{json_path, translate, SqlFilter};
use super::store::{ChangeSet, PendingEntity, Store, StoreQuery};
use crate::db::{open_db, open_db_in_memory, DbError};
use crate::id::EntityId;
use crate::model::entity::AggregateRoot;
use crate::query::options::{Sort, SortOrder};
use crate::specification::{compare_values, FieldPath, Specification};
use log::debug;
use rusqlite::types::Value as SqlValue;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Transaction, TransactionBehavior,
};
use serde_json::Value;
use std::path::Path;
use std::time::Instant;

/// Storage adapter over one SQLite connection.
///
/// Each unit of work owns its own store, and with it its own connection.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Wraps a migrated connection.
    ///
    /// # Errors
    /// - `Db(MissingRequiredTable)` when the store schema is absent.
    pub fn new(conn: Connection) -> RepoResult<Self> {
        for table in ["aggregates", "aggregate_relations"] {
            if !table_exists(&conn, table)? {
                return Err(DbError::MissingRequiredTable(table).into());
            }
        }
        Ok(Self { conn })
    }

    /// Opens (and migrates) a database file.
    pub fn open(path: impl AsRef<Path>) -> RepoResult<Self> {
        Self::new(open_db(path)?)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> RepoResult<Self> {
        Self::new(open_db_in_memory()?)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn query_translated<T: AggregateRoot>(
        &self,
        filter: SqlFilter,
        request: &StoreQuery<'_, T>,
    ) -> RepoResult<Vec<T>> {
        let mut sql = format!(
            "SELECT id, body FROM aggregates WHERE kind = ? AND {}",
            filter.clause
        );
        let mut bind_values = vec![SqlValue::Text(T::KIND.to_string())];
        bind_values.extend(filter.params);

        sql.push_str(" ORDER BY ");
        if let Some(sort) = ordered(request.sort) {
            sql.push_str("json_extract(body, ?) ");
            sql.push_str(direction(sort.order));
            sql.push_str(", ");
            bind_values.push(SqlValue::Text(json_path(&sort.key)?));
        }
        sql.push_str("id ASC");

        if let Some(window) = request.window {
            sql.push_str(" LIMIT ? OFFSET ?");
            bind_values.push(SqlValue::Integer(to_sql_int(window.take)));
            bind_values.push(SqlValue::Integer(to_sql_int(window.skip)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut entities = Vec::new();
        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            let body: String = row.get(1)?;
            let mut document = parse_body(T::KIND, &id, &body)?;
            self.attach_relations(&id, &mut document, request.eager_load)?;
            entities.push(decode(&id, document)?);
        }

        Ok(entities)
    }

    fn query_in_memory<T: AggregateRoot>(&self, request: &StoreQuery<'_, T>) -> RepoResult<Vec<T>> {
        let sort = ordered(request.sort);
        if let Some(sort) = sort {
            json_path(&sort.key)?;
        }

        // Matching and sorting see the stored document, as the SQL path and
        // `count` do; relations are attached to the window only.
        let mut matched = Vec::new();
        for (id, document) in self.load_partition(T::KIND)? {
            let entity: T = decode(&id, document.clone())?;
            if request
                .specification
                .is_satisfied_by_document(&entity, &document)
            {
                matched.push((id, document));
            }
        }

        if let Some(sort) = sort {
            matched.sort_by(|(_, left), (_, right)| {
                let left = sort.key.resolve(left).unwrap_or(&Value::Null);
                let right = sort.key.resolve(right).unwrap_or(&Value::Null);
                let ordering = compare_values(left, right);
                match sort.order {
                    SortOrder::Descending => ordering.reverse(),
                    _ => ordering,
                }
            });
        }

        let window: Vec<_> = match request.window {
            Some(window) => matched
                .into_iter()
                .skip(to_usize(window.skip))
                .take(to_usize(window.take))
                .collect(),
            None => matched,
        };

        let mut entities = Vec::with_capacity(window.len());
        for (id, mut document) in window {
            self.attach_relations(&id, &mut document, request.eager_load)?;
            entities.push(decode(&id, document)?);
        }
        Ok(entities)
    }

    /// Counts matches in memory, stopping at `limit`; used for trees with
    /// opaque predicates.
    fn count_in_memory<T: AggregateRoot>(
        &self,
        specification: &Specification<T>,
        limit: Option<u64>,
    ) -> RepoResult<u64> {
        let mut count = 0_u64;
        for (id, document) in self.load_partition(T::KIND)? {
            let entity: T = decode(&id, document.clone())?;
            if specification.is_satisfied_by_document(&entity, &document) {
                count += 1;
                if limit.is_some_and(|limit| count >= limit) {
                    break;
                }
            }
        }
        Ok(count)
    }

    fn load_partition(&self, kind: &str) -> RepoResult<Vec<(String, Value)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, body FROM aggregates WHERE kind = ?1 ORDER BY id ASC;")?;
        let mut rows = stmt.query([kind])?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            let body: String = row.get(1)?;
            let document = parse_body(kind, &id, &body)?;
            documents.push((id, document));
        }
        Ok(documents)
    }

    fn attach_relations(
        &self,
        owner_id: &str,
        document: &mut Value,
        eager_load: &[String],
    ) -> RepoResult<()> {
        if eager_load.is_empty() {
            return Ok(());
        }

        let object = document.as_object_mut().ok_or_else(|| {
            RepoError::InvalidData(format!("aggregate `{owner_id}` is not a JSON object"))
        })?;
        let mut stmt = self.conn.prepare_cached(
            "SELECT body FROM aggregate_relations WHERE owner_id = ?1 AND relation = ?2;",
        )?;
        for relation in eager_load {
            let body: Option<String> = stmt
                .query_row(params![owner_id, relation.as_str()], |row| row.get(0))
                .optional()?;
            if let Some(body) = body {
                let value = serde_json::from_str(&body).map_err(|err| {
                    RepoError::InvalidData(format!(
                        "invalid relation `{relation}` of `{owner_id}`: {err}"
                    ))
                })?;
                object.insert(relation.clone(), value);
            }
        }
        Ok(())
    }

    fn count_where(&self, kind: &str, filter: SqlFilter) -> RepoResult<u64> {
        let sql = format!(
            "SELECT COUNT(*) FROM aggregates WHERE kind = ? AND {}",
            filter.clause
        );
        let mut bind_values = vec![SqlValue::Text(kind.to_string())];
        bind_values.extend(filter.params);
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(bind_values), |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn exists_where(&self, kind: &str, filter: SqlFilter) -> RepoResult<bool> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM aggregates WHERE kind = ? AND {})",
            filter.clause
        );
        let mut bind_values = vec![SqlValue::Text(kind.to_string())];
        bind_values.extend(filter.params);
        let exists: i64 = self
            .conn
            .query_row(&sql, params_from_iter(bind_values), |row| row.get(0))?;
        Ok(exists == 1)
    }
}

impl Store for SqliteStore {
    fn load<T: AggregateRoot>(&self, id: EntityId) -> RepoResult<Option<T>> {
        let id_text = id.to_string();
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM aggregates WHERE kind = ?1 AND id = ?2;",
                params![T::KIND, id_text.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        body.map(|body| decode(&id_text, parse_body(T::KIND, &id_text, &body)?))
            .transpose()
    }

    fn query<T: AggregateRoot>(&self, request: &StoreQuery<'_, T>) -> RepoResult<Vec<T>> {
        ensure_relations::<T>(request.eager_load)?;
        ensure_root_paths(request.specification)?;
        if let Some(sort) = ordered(request.sort) {
            ensure_root_field::<T>(&sort.key)?;
        }
        let started_at = Instant::now();

        let (path, entities) = match translate(request.specification)? {
            Some(filter) => ("sql", self.query_translated(filter, request)?),
            None => ("memory", self.query_in_memory(request)?),
        };

        debug!(
            "event=store_query module=store status=ok kind={} path={} rows={} duration_ms={}",
            T::KIND,
            path,
            entities.len(),
            started_at.elapsed().as_millis()
        );
        Ok(entities)
    }

    fn count<T: AggregateRoot>(&self, specification: &Specification<T>) -> RepoResult<u64> {
        ensure_root_paths(specification)?;
        match translate(specification)? {
            Some(filter) => self.count_where(T::KIND, filter),
            None => self.count_in_memory(specification, None),
        }
    }

    fn exists<T: AggregateRoot>(&self, specification: &Specification<T>) -> RepoResult<bool> {
        ensure_root_paths(specification)?;
        match translate(specification)? {
            Some(filter) => self.exists_where(T::KIND, filter),
            None => Ok(self.count_in_memory(specification, Some(1))? > 0),
        }
    }

    fn flush(&self, changes: &ChangeSet<'_>) -> RepoResult<()> {
        let started_at = Instant::now();
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;

        for entity in &changes.inserted {
            let (body, relations) = split_relations(entity)?;
            tx.execute(
                "INSERT INTO aggregates (id, kind, body) VALUES (?1, ?2, ?3);",
                params![entity.id.to_string(), entity.kind, body],
            )?;
            write_relations(&tx, entity, &relations)?;
        }

        for entity in &changes.updated {
            let (body, relations) = split_relations(entity)?;
            let changed = tx.execute(
                "UPDATE aggregates
                 SET
                    body = ?3,
                    updated_at = (CAST(strftime('%s', 'now') AS INTEGER) * 1000)
                 WHERE id = ?1 AND kind = ?2;",
                params![entity.id.to_string(), entity.kind, body],
            )?;
            if changed == 0 {
                return Err(not_found(entity));
            }
            write_relations(&tx, entity, &relations)?;
        }

        for entity in &changes.deleted {
            let changed = tx.execute(
                "DELETE FROM aggregates WHERE id = ?1 AND kind = ?2;",
                params![entity.id.to_string(), entity.kind],
            )?;
            if changed == 0 {
                return Err(not_found(entity));
            }
        }

        tx.commit()?;
        debug!(
            "event=store_flush module=store status=ok inserted={} updated={} deleted={} duration_ms={}",
            changes.inserted.len(),
            changes.updated.len(),
            changes.deleted.len(),
            started_at.elapsed().as_millis()
        );
        Ok(())
    }
}

fn ensure_relations<T: AggregateRoot>(eager_load: &[String]) -> RepoResult<()> {
    for relation in eager_load {
        if !T::RELATIONS.contains(&relation.as_str()) {
            return Err(RepoError::InvalidOperation(format!(
                "`{relation}` is not a relation of {}",
                T::KIND
            )));
        }
    }
    Ok(())
}

/// Rejects conditions on relation fields: relations live outside the stored
/// root document, so neither SQL nor the in-memory path can see them.
fn ensure_root_paths<T: AggregateRoot>(specification: &Specification<T>) -> RepoResult<()> {
    if let Specification::Condition(condition) = specification {
        return ensure_root_field::<T>(condition.field());
    }
    if let Some(left) = specification.left() {
        ensure_root_paths(left)?;
    }
    if let Some(right) = specification.right() {
        ensure_root_paths(right)?;
    }
    Ok(())
}

fn ensure_root_field<T: AggregateRoot>(field: &FieldPath) -> RepoResult<()> {
    let Some(head) = field.segments().next() else {
        return Ok(());
    };
    if T::RELATIONS.iter().any(|relation| *relation == head) {
        return Err(RepoError::InvalidOperation(format!(
            "`{field}` is a relation of {}; relations cannot be filtered or sorted on",
            T::KIND
        )));
    }
    Ok(())
}

fn split_relations(entity: &PendingEntity) -> RepoResult<(String, Vec<(&'static str, String)>)> {
    let mut document = entity.document.clone();
    let object = document.as_object_mut().ok_or_else(|| {
        RepoError::InvalidData(format!(
            "{} `{}` must serialize to a JSON object",
            entity.kind, entity.id
        ))
    })?;

    let mut relations = Vec::new();
    for relation in entity.relations {
        if let Some(value) = object.remove(*relation) {
            if !value.is_null() {
                relations.push((*relation, value.to_string()));
            }
        }
    }

    Ok((document.to_string(), relations))
}

fn write_relations(
    tx: &Transaction<'_>,
    entity: &PendingEntity,
    relations: &[(&'static str, String)],
) -> RepoResult<()> {
    for (relation, body) in relations {
        tx.execute(
            "INSERT INTO aggregate_relations (owner_id, relation, body)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (owner_id, relation) DO UPDATE SET body = excluded.body;",
            params![entity.id.to_string(), relation, body],
        )?;
    }
    Ok(())
}

fn parse_body(kind: &str, id: &str, body: &str) -> RepoResult<Value> {
    serde_json::from_str(body)
        .map_err(|err| RepoError::InvalidData(format!("invalid {kind} document `{id}`: {err}")))
}

fn decode<T: AggregateRoot>(id: &str, document: Value) -> RepoResult<T> {
    serde_json::from_value(document).map_err(|err| {
        RepoError::InvalidData(format!("cannot decode {} `{id}`: {err}", T::KIND))
    })
}

fn not_found(entity: &PendingEntity) -> RepoError {
    RepoError::NotFound {
        kind: entity.kind,
        id: Some(entity.id),
    }
}

fn ordered(sort: Option<&Sort>) -> Option<&Sort> {
    sort.filter(|sort| sort.is_ordered())
}

fn direction(order: SortOrder) -> &'static str {
    match order {
        SortOrder::Descending => "DESC",
        _ => "ASC",
    }
}

fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_usize(value: u64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
