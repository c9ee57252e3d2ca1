// ABOUTME: CRUD, filtered listing, and lazy scanning of generic records on the storage manager.
// ABOUTME: Every mutation is one IMMEDIATE transaction; reads come from a consistent snapshot.

use futures::Stream;
use podshelf_core::{Record, RecordFields, timestamp};
use rusqlite::types::Value;
use rusqlite::{OptionalExtension, Row, Transaction, params, params_from_iter};

use crate::error::StoreError;
use crate::manager::StorageManager;
use crate::page::{Page, Pagination};
use crate::schema::timestamp_column;

const SELECT_RECORD: &str =
    "SELECT id, name, description, created_at, updated_at FROM records";

/// Restricts which records a list or scan returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// Case-insensitive (ASCII) substring match on `name`.
    pub name_contains: Option<String>,
}

impl RecordFilter {
    pub fn name_contains(needle: impl Into<String>) -> Self {
        Self {
            name_contains: Some(needle.into()),
        }
    }
}

impl StorageManager {
    /// Insert a new record and return it with its assigned id and timestamps.
    pub async fn create_record(&self, fields: RecordFields) -> Result<Record, StoreError> {
        fields.validate()?;
        self.write("create_record", move |tx| {
            let now = timestamp::now();
            tx.execute(
                "INSERT INTO records (name, description, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)",
                params![fields.name, fields.description, timestamp::to_db(&now)],
            )?;
            Ok(Record {
                id: tx.last_insert_rowid(),
                name: fields.name,
                description: fields.description,
                created_at: now,
                updated_at: now,
            })
        })
        .await
    }

    pub async fn get_record(&self, id: i64) -> Result<Record, StoreError> {
        self.read("get_record", move |tx| fetch_record(tx, id)).await
    }

    /// Replace the writable fields of an existing record, bumping `updated_at`.
    pub async fn update_record(&self, id: i64, fields: RecordFields) -> Result<Record, StoreError> {
        self.write("update_record", move |tx| {
            let existing = fetch_record(tx, id)?;
            fields.validate()?;
            let updated_at = timestamp::after(existing.updated_at);
            tx.execute(
                "UPDATE records SET name = ?1, description = ?2, updated_at = ?3 WHERE id = ?4",
                params![
                    fields.name,
                    fields.description,
                    timestamp::to_db(&updated_at),
                    id
                ],
            )?;
            Ok(Record {
                name: fields.name,
                description: fields.description,
                updated_at,
                ..existing
            })
        })
        .await
    }

    /// Remove a record. Deleting an absent id is `NotFound`, including a second delete.
    pub async fn delete_record(&self, id: i64) -> Result<(), StoreError> {
        self.write("delete_record", move |tx| {
            let removed = tx.execute("DELETE FROM records WHERE id = ?1", params![id])?;
            if removed == 0 {
                return Err(StoreError::not_found("record", id));
            }
            Ok(())
        })
        .await
    }

    /// One page of records matching `filter`, ordered by id, plus the total match count.
    pub async fn list_records(
        &self,
        filter: RecordFilter,
        pagination: Pagination,
    ) -> Result<Page<Record>, StoreError> {
        pagination.validate()?;
        self.read("list_records", move |tx| {
            query_page(tx, &filter, pagination, true)
        })
        .await
    }

    /// A lazy sequence over every record matching `filter`, fetched `page_size` at a time.
    pub fn scan_records(&self, filter: RecordFilter, page_size: u32) -> RecordScan {
        RecordScan {
            store: self.clone(),
            filter,
            page_size: page_size.clamp(1, Pagination::MAX_LIMIT),
            cursor: 0,
            exhausted: false,
        }
    }
}

/// Keyset-paged iteration over records. Finite; `restart` begins again from the lowest id.
#[derive(Debug, Clone)]
pub struct RecordScan {
    store: StorageManager,
    filter: RecordFilter,
    page_size: u32,
    cursor: i64,
    exhausted: bool,
}

impl RecordScan {
    /// Fetch the next page, or `None` once every matching record has been returned.
    pub async fn next_page(&mut self) -> Result<Option<Vec<Record>>, StoreError> {
        if self.exhausted {
            return Ok(None);
        }
        let filter = self.filter.clone();
        let pagination = Pagination::After {
            after: self.cursor,
            limit: self.page_size,
        };
        let page = self
            .store
            .read("scan_records", move |tx| {
                query_page(tx, &filter, pagination, false)
            })
            .await?;

        match page.next_cursor {
            Some(cursor) => self.cursor = cursor,
            None => self.exhausted = true,
        }
        if page.items.is_empty() {
            return Ok(None);
        }
        Ok(Some(page.items))
    }

    pub fn restart(&mut self) {
        self.cursor = 0;
        self.exhausted = false;
    }

    /// Adapt into a stream of pages. The stream ends after the first error.
    pub fn into_pages(self) -> impl Stream<Item = Result<Vec<Record>, StoreError>> + Send + 'static {
        futures::stream::try_unfold(self, |mut scan| async move {
            let page = scan.next_page().await?;
            Ok::<_, StoreError>(page.map(|items| (items, scan)))
        })
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<Record> {
    Ok(Record {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: timestamp_column(row, 3)?,
        updated_at: timestamp_column(row, 4)?,
    })
}

fn fetch_record(tx: &Transaction<'_>, id: i64) -> Result<Record, StoreError> {
    tx.query_row(
        &format!("{SELECT_RECORD} WHERE id = ?1"),
        params![id],
        record_from_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::not_found("record", id))
}

fn query_page(
    tx: &Transaction<'_>,
    filter: &RecordFilter,
    pagination: Pagination,
    with_total: bool,
) -> Result<Page<Record>, StoreError> {
    let mut conditions: Vec<&str> = Vec::new();
    let mut args: Vec<Value> = Vec::new();
    if let Some(needle) = &filter.name_contains {
        conditions.push("name LIKE ? ESCAPE '\\'");
        args.push(Value::Text(like_pattern(needle)));
    }

    let total = if with_total {
        let sql = format!("SELECT COUNT(*) FROM records{}", where_sql(&conditions));
        let count: i64 = tx.query_row(&sql, params_from_iter(args.iter()), |row| row.get(0))?;
        count.max(0) as u64
    } else {
        0
    };

    let offset = match pagination {
        Pagination::After { after, .. } => {
            conditions.push("id > ?");
            args.push(Value::Integer(after));
            0
        }
        Pagination::Offset { offset, .. } => i64::try_from(offset).unwrap_or(i64::MAX),
    };
    let limit = pagination.limit() as usize;
    // One extra row tells us whether another page exists.
    args.push(Value::Integer(limit as i64 + 1));
    args.push(Value::Integer(offset));

    let sql = format!(
        "{SELECT_RECORD}{} ORDER BY id ASC LIMIT ? OFFSET ?",
        where_sql(&conditions)
    );
    let mut stmt = tx.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(args.iter()), record_from_row)?;

    let mut items = Vec::new();
    for row in rows {
        items.push(row?);
    }

    let next_cursor = if items.len() > limit {
        items.truncate(limit);
        items.last().map(|r| r.id)
    } else {
        None
    };

    Ok(Page {
        items,
        next_cursor,
        total,
    })
}

fn where_sql(conditions: &[&str]) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    }
}

/// `%needle%` with LIKE metacharacters escaped by backslash.
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::StoreConfig;
    use podshelf_core::ValidationError;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> StorageManager {
        StorageManager::open(&StoreConfig::new(dir.path())).unwrap()
    }

    async fn seed(store: &StorageManager, names: &[&str]) -> Vec<Record> {
        let mut out = Vec::new();
        for name in names {
            out.push(store.create_record(RecordFields::new(*name)).await.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn create_then_read_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let created = store
            .create_record(RecordFields::new("a").with_description("first"))
            .await
            .unwrap();
        assert_eq!(created.id, 1);
        assert_eq!(created.created_at, created.updated_at);

        let read = store.get_record(created.id).await.unwrap();
        assert_eq!(read, created);
    }

    #[tokio::test]
    async fn create_rejects_invalid_fields() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let err = store.create_record(RecordFields::new("  ")).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let page = store
            .list_records(RecordFilter::default(), Pagination::default())
            .await
            .unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn missing_ids_are_not_found() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        assert!(matches!(
            store.get_record(42).await,
            Err(StoreError::NotFound { entity: "record", id: 42 })
        ));
        assert!(matches!(
            store.update_record(42, RecordFields::new("x")).await,
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.delete_record(42).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn update_bumps_updated_at_only() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let created = store.create_record(RecordFields::new("a")).await.unwrap();

        let updated = store
            .update_record(created.id, RecordFields::new("b"))
            .await
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.name, "b");
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at > created.updated_at);

        assert_eq!(store.get_record(created.id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn failed_update_leaves_record_unchanged() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let created = store
            .create_record(RecordFields::new("stable").with_description("keep me"))
            .await
            .unwrap();

        let err = store
            .update_record(created.id, RecordFields::new(""))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation(ValidationError::Invalid { field: "name", .. })
        ));

        assert_eq!(store.get_record(created.id).await.unwrap(), created);
    }

    #[tokio::test]
    async fn delete_is_not_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let created = store.create_record(RecordFields::new("gone")).await.unwrap();

        store.delete_record(created.id).await.unwrap();
        assert!(matches!(
            store.delete_record(created.id).await,
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.get_record(created.id).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_delete() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let first = store.create_record(RecordFields::new("a")).await.unwrap();
        store.delete_record(first.id).await.unwrap();

        let second = store.create_record(RecordFields::new("b")).await.unwrap();
        assert!(second.id > first.id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_get_distinct_ids() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let mut tasks = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store
                    .create_record(RecordFields::new(format!("r{i}")))
                    .await
                    .unwrap()
                    .id
            }));
        }

        let mut ids = HashSet::new();
        for task in tasks {
            assert!(ids.insert(task.await.unwrap()), "duplicate id");
        }
        assert_eq!(ids.len(), 32);
    }

    #[tokio::test]
    async fn list_pages_by_offset_and_cursor() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let seeded = seed(&store, &["a", "b", "c", "d", "e"]).await;

        let first = store
            .list_records(
                RecordFilter::default(),
                Pagination::Offset {
                    offset: 0,
                    limit: 2,
                },
            )
            .await
            .unwrap();
        assert_eq!(first.total, 5);
        assert_eq!(first.items, seeded[0..2].to_vec());
        assert_eq!(first.next_cursor, Some(seeded[1].id));

        let second = store
            .list_records(
                RecordFilter::default(),
                Pagination::After {
                    after: first.next_cursor.unwrap(),
                    limit: 2,
                },
            )
            .await
            .unwrap();
        assert_eq!(second.items, seeded[2..4].to_vec());

        let last = store
            .list_records(
                RecordFilter::default(),
                Pagination::Offset {
                    offset: 4,
                    limit: 2,
                },
            )
            .await
            .unwrap();
        assert_eq!(last.items, seeded[4..].to_vec());
        assert_eq!(last.next_cursor, None);
    }

    #[tokio::test]
    async fn list_filters_by_name() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        seed(&store, &["Alpha", "beta", "alphabet", "100% pure", "1000 pure"]).await;

        let page = store
            .list_records(RecordFilter::name_contains("ALPHA"), Pagination::default())
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        let names: Vec<_> = page.items.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "alphabet"]);

        let page = store
            .list_records(RecordFilter::name_contains("0%"), Pagination::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].name, "100% pure");
    }

    #[tokio::test]
    async fn list_rejects_bad_limit() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let err = store
            .list_records(
                RecordFilter::default(),
                Pagination::Offset {
                    offset: 0,
                    limit: 0,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation(ValidationError::InvalidQuery { param: "limit", .. })
        ));
    }

    #[tokio::test]
    async fn scan_is_lazy_finite_and_restartable() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let seeded = seed(&store, &["a", "b", "c", "d", "e"]).await;

        let mut scan = store.scan_records(RecordFilter::default(), 2);
        let mut seen = Vec::new();
        let mut pages = 0;
        while let Some(page) = scan.next_page().await.unwrap() {
            pages += 1;
            seen.extend(page);
        }
        assert_eq!(pages, 3);
        assert_eq!(seen, seeded);
        assert!(scan.next_page().await.unwrap().is_none());

        scan.restart();
        let again = scan.next_page().await.unwrap().unwrap();
        assert_eq!(again, seeded[0..2].to_vec());
    }

    #[tokio::test]
    async fn scan_streams_pages() {
        use futures::TryStreamExt;

        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        seed(&store, &["x", "y", "z"]).await;

        let pages: Vec<Vec<Record>> = store
            .scan_records(RecordFilter::default(), 2)
            .into_pages()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages.concat().len(), 3);
    }

    #[test]
    fn like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("a_b%c\\"), "%a\\_b\\%c\\\\%");
        assert_eq!(like_pattern("plain"), "%plain%");
    }
}
