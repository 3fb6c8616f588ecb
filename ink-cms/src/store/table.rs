use std::collections::BTreeMap;
use std::marker::PhantomData;

use anyhow::{Context, Result};
use ink_core::errors::InkError;
use ink_core::{TenantContext, TenantId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::SqliteConnection;

use super::db::{next_id, sql_id, Db};

/// A row that belongs to exactly one tenant.
pub trait TenantScoped: Clone + Send + Sync + Serialize + DeserializeOwned {
    fn id(&self) -> u64;
    fn tenant_id(&self) -> &TenantId;
}

macro_rules! tenant_scoped {
    ($($ty:ty),* $(,)?) => {
        $(
            impl TenantScoped for $ty {
                fn id(&self) -> u64 {
                    self.id
                }

                fn tenant_id(&self) -> &TenantId {
                    &self.tenant_id
                }
            }
        )*
    };
}

tenant_scoped!(
    crate::models::User,
    crate::models::Post,
    crate::models::Category,
    crate::models::Tag,
    crate::models::MediaFile,
    crate::models::Setting,
    crate::models::Comment,
);

/// Rows of one tenant, keyed by id.
pub type Rows<T> = BTreeMap<u64, T>;

struct Statements {
    select_tenant: String,
    select_one: String,
    insert: String,
    update: String,
    delete: String,
    clear: String,
}

impl Statements {
    fn new(table: &str) -> Self {
        Self {
            select_tenant: format!("SELECT body FROM {table} WHERE tenant_id = ? ORDER BY id"),
            select_one: format!("SELECT body FROM {table} WHERE tenant_id = ? AND id = ?"),
            insert: format!("INSERT INTO {table} (id, tenant_id, body) VALUES (?, ?, ?)"),
            update: format!("UPDATE {table} SET body = ? WHERE tenant_id = ? AND id = ?"),
            delete: format!("DELETE FROM {table} WHERE tenant_id = ? AND id = ?"),
            clear: format!("DELETE FROM {table} WHERE tenant_id = ?"),
        }
    }
}

/// Rows partitioned by tenant, kept in one SQLite table.
///
/// Every operation takes the [`TenantContext`] it runs for and every
/// statement is bound to that tenant's id, so a call only ever sees its
/// own partition. Ids come from one sequence shared by all tenants, so an
/// id never names rows in two partitions. Rows are stored as JSON in the
/// `body` column.
pub struct TenantTable<T> {
    db: Db,
    table: &'static str,
    entity: &'static str,
    sql: Statements,
    _rows: PhantomData<fn() -> T>,
}

/// Parse a path id; anything that isn't one is simply not found.
pub fn parse_id(entity: &str, id: &str) -> Result<u64> {
    id.trim()
        .parse::<u64>()
        .map_err(|_| InkError::not_found(format!("{entity} not found")).into_anyhow())
}

impl<T: TenantScoped> TenantTable<T> {
    /// Create the backing table when missing.
    pub async fn open(db: Db, table: &'static str, entity: &'static str) -> Result<Self> {
        db.execute(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                body TEXT NOT NULL
            )"
        ))
        .await?;
        db.execute(&format!("CREATE INDEX IF NOT EXISTS {table}_tenant ON {table} (tenant_id)"))
            .await?;

        Ok(Self {
            db,
            table,
            entity,
            sql: Statements::new(table),
            _rows: PhantomData,
        })
    }

    pub fn entity(&self) -> &'static str {
        self.entity
    }

    fn not_found(&self) -> anyhow::Error {
        InkError::not_found(format!("{} not found", self.entity)).into_anyhow()
    }

    fn check_stamp(&self, ctx: &TenantContext, row: &T, id: u64) -> Result<()> {
        if !ctx.owns(row.tenant_id()) || row.id() != id {
            anyhow::bail!(
                "{} row {id} stamped for tenant {} written under tenant {}",
                self.entity,
                row.tenant_id(),
                ctx.tenant_id
            );
        }
        Ok(())
    }

    fn decode(&self, ctx: &TenantContext, body: &str) -> Result<Option<T>> {
        let row: T = serde_json::from_str(body)
            .with_context(|| format!("unreadable {} row in {}", self.entity, self.table))?;
        Ok(ctx.owns(row.tenant_id()).then_some(row))
    }

    fn encode(&self, row: &T) -> Result<String> {
        Ok(serde_json::to_string(row)?)
    }

    async fn load(&self, conn: &mut SqliteConnection, ctx: &TenantContext) -> Result<Rows<T>> {
        let bodies: Vec<String> = sqlx::query_scalar(&self.sql.select_tenant)
            .bind(ctx.tenant_id.as_str())
            .fetch_all(conn)
            .await?;

        let mut rows = Rows::new();
        for body in bodies {
            if let Some(row) = self.decode(ctx, &body)? {
                rows.insert(row.id(), row);
            }
        }
        Ok(rows)
    }

    async fn load_one(&self, conn: &mut SqliteConnection, ctx: &TenantContext, id: u64) -> Result<Option<T>> {
        let body: Option<String> = sqlx::query_scalar(&self.sql.select_one)
            .bind(ctx.tenant_id.as_str())
            .bind(sql_id(id))
            .fetch_optional(conn)
            .await?;
        match body {
            Some(body) => self.decode(ctx, &body),
            None => Ok(None),
        }
    }

    async fn store(&self, conn: &mut SqliteConnection, ctx: &TenantContext, row: &T) -> Result<()> {
        sqlx::query(&self.sql.update)
            .bind(self.encode(row)?)
            .bind(ctx.tenant_id.as_str())
            .bind(sql_id(row.id()))
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Insert the row `build` makes from a fresh id and the tenant's
    /// current rows. The row must carry that id and the context's tenant.
    pub async fn insert_with<F>(&self, ctx: &TenantContext, build: F) -> Result<T>
    where
        F: FnOnce(u64, &Rows<T>) -> Result<T>,
    {
        let mut tx = self.db.write().await?;
        let rows = self.load(tx.conn(), ctx).await?;
        let id = next_id(tx.conn(), self.table).await?;

        let row = build(id, &rows)?;
        self.check_stamp(ctx, &row, id)?;
        sqlx::query(&self.sql.insert)
            .bind(sql_id(id))
            .bind(ctx.tenant_id.as_str())
            .bind(self.encode(&row)?)
            .execute(tx.conn())
            .await?;
        tx.commit().await?;
        Ok(row)
    }

    pub async fn get(&self, ctx: &TenantContext, id: u64) -> Result<Option<T>> {
        let mut conn = self.db.pool().acquire().await?;
        self.load_one(&mut conn, ctx, id).await
    }

    /// Like [`TenantTable::get`], answering NotFound for a missing row.
    pub async fn require(&self, ctx: &TenantContext, id: u64) -> Result<T> {
        self.get(ctx, id).await?.ok_or_else(|| self.not_found())
    }

    /// Rows matching `pred`, in id order.
    pub async fn find<F>(&self, ctx: &TenantContext, pred: F) -> Result<Vec<T>>
    where
        F: Fn(&T) -> bool,
    {
        let mut conn = self.db.pool().acquire().await?;
        let rows = self.load(&mut conn, ctx).await?;
        Ok(rows.into_values().filter(|row| pred(row)).collect())
    }

    pub async fn find_one<F>(&self, ctx: &TenantContext, pred: F) -> Result<Option<T>>
    where
        F: Fn(&T) -> bool,
    {
        let mut conn = self.db.pool().acquire().await?;
        let rows = self.load(&mut conn, ctx).await?;
        Ok(rows.into_values().find(|row| pred(row)))
    }

    pub async fn count<F>(&self, ctx: &TenantContext, pred: F) -> Result<usize>
    where
        F: Fn(&T) -> bool,
    {
        Ok(self.find(ctx, pred).await?.len())
    }

    /// Change one row. `change` sees the row and the tenant's other rows;
    /// when it fails the row is left as it was.
    pub async fn update_with<F>(&self, ctx: &TenantContext, id: u64, change: F) -> Result<T>
    where
        F: FnOnce(&mut T, &Rows<T>) -> Result<()>,
    {
        let mut tx = self.db.write().await?;
        let mut rows = self.load(tx.conn(), ctx).await?;
        let mut row = rows.remove(&id).ok_or_else(|| self.not_found())?;

        change(&mut row, &rows)?;
        self.check_stamp(ctx, &row, id)?;
        self.store(tx.conn(), ctx, &row).await?;
        tx.commit().await?;
        Ok(row)
    }

    /// Apply `change` to every row of the tenant; returns how many it
    /// reported as changed.
    pub async fn update_all<F>(&self, ctx: &TenantContext, mut change: F) -> Result<usize>
    where
        F: FnMut(&mut T) -> bool,
    {
        let mut tx = self.db.write().await?;
        let rows = self.load(tx.conn(), ctx).await?;
        let mut changed = 0;
        for (id, mut row) in rows {
            if !change(&mut row) {
                continue;
            }
            self.check_stamp(ctx, &row, id)?;
            self.store(tx.conn(), ctx, &row).await?;
            changed += 1;
        }
        tx.commit().await?;
        Ok(changed)
    }

    pub async fn remove(&self, ctx: &TenantContext, id: u64) -> Result<T> {
        let mut tx = self.db.write().await?;
        let row = self
            .load_one(tx.conn(), ctx, id)
            .await?
            .ok_or_else(|| self.not_found())?;
        sqlx::query(&self.sql.delete)
            .bind(ctx.tenant_id.as_str())
            .bind(sql_id(id))
            .execute(tx.conn())
            .await?;
        tx.commit().await?;
        Ok(row)
    }

    /// Delete every row of the tenant `pred` matches, in one transaction.
    pub async fn remove_where<F>(&self, ctx: &TenantContext, pred: F) -> Result<Vec<T>>
    where
        F: Fn(&T) -> bool,
    {
        let mut tx = self.db.write().await?;
        let rows = self.load(tx.conn(), ctx).await?;
        let mut removed = Vec::new();
        for (id, row) in rows {
            if !pred(&row) {
                continue;
            }
            sqlx::query(&self.sql.delete)
                .bind(ctx.tenant_id.as_str())
                .bind(sql_id(id))
                .execute(tx.conn())
                .await?;
            removed.push(row);
        }
        tx.commit().await?;
        Ok(removed)
    }

    /// Drop the whole partition of a tenant that is being deleted.
    pub async fn clear_tenant(&self, tenant_id: &TenantId) -> Result<usize> {
        let mut tx = self.db.write().await?;
        let done = sqlx::query(&self.sql.clear)
            .bind(tenant_id.as_str())
            .execute(tx.conn())
            .await?;
        tx.commit().await?;
        Ok(usize::try_from(done.rows_affected())?)
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: u64,
        tenant_id: TenantId,
        text: String,
    }

    impl TenantScoped for Note {
        fn id(&self) -> u64 {
            self.id
        }

        fn tenant_id(&self) -> &TenantId {
            &self.tenant_id
        }
    }

    fn note(ctx: &TenantContext, id: u64, text: &str) -> Note {
        Note {
            id,
            tenant_id: ctx.tenant_id.clone(),
            text: text.to_string(),
        }
    }

    async fn notes() -> TenantTable<Note> {
        let db = Db::in_memory().await.unwrap();
        TenantTable::open(db, "notes", "Note").await.unwrap()
    }

    #[tokio::test]
    async fn tenants_never_see_each_others_rows() {
        let table = notes().await;
        let a = TenantContext::new("a");
        let b = TenantContext::new("b");

        let row = table.insert_with(&a, |id, _| Ok(note(&a, id, "hi"))).await.unwrap();

        assert!(table.get(&a, row.id).await.unwrap().is_some());
        assert!(table.get(&b, row.id).await.unwrap().is_none());
        assert!(table.find(&b, |_| true).await.unwrap().is_empty());
        assert_eq!(table.count(&b, |_| true).await.unwrap(), 0);

        let err = table.update_with(&b, row.id, |n, _| {
            n.text = "pwned".into();
            Ok(())
        });
        assert_eq!(InkError::kind_of(&err.await.unwrap_err()), ink_core::ErrorKind::NotFound);
        assert!(table.remove(&b, row.id).await.is_err());
        assert_eq!(table.update_all(&b, |_| true).await.unwrap(), 0);
        assert_eq!(table.clear_tenant(&TenantId::from("b")).await.unwrap(), 0);
        assert_eq!(table.get(&a, row.id).await.unwrap().unwrap().text, "hi");
    }

    #[tokio::test]
    async fn rows_must_carry_the_callers_tenant() {
        let table = notes().await;
        let a = TenantContext::new("a");
        let b = TenantContext::new("b");

        assert!(table.insert_with(&a, |id, _| Ok(note(&b, id, "x"))).await.is_err());
        assert!(table.find(&a, |_| true).await.unwrap().is_empty());
        assert!(table.find(&b, |_| true).await.unwrap().is_empty());

        let row = table.insert_with(&a, |id, _| Ok(note(&a, id, "x"))).await.unwrap();
        let moved = table
            .update_with(&a, row.id, |n, _| {
                n.tenant_id = TenantId::from("b");
                Ok(())
            })
            .await;
        assert!(moved.is_err());
        assert_eq!(
            table.get(&a, row.id).await.unwrap().unwrap().tenant_id,
            TenantId::from("a")
        );
    }

    #[tokio::test]
    async fn failed_updates_leave_the_row_alone() {
        let table = notes().await;
        let a = TenantContext::new("a");
        let row = table.insert_with(&a, |id, _| Ok(note(&a, id, "keep"))).await.unwrap();

        let res = table
            .update_with(&a, row.id, |n, _| {
                n.text = "changed".into();
                Err(InkError::conflict("nope").into_anyhow())
            })
            .await;
        assert!(res.is_err());
        assert_eq!(table.get(&a, row.id).await.unwrap().unwrap().text, "keep");
    }

    #[tokio::test]
    async fn ids_are_unique_across_tenants_and_builders_see_siblings() {
        let table = notes().await;
        let a = TenantContext::new("a");
        let b = TenantContext::new("b");

        let first = table.insert_with(&a, |id, _| Ok(note(&a, id, "1"))).await.unwrap();
        let second = table.insert_with(&b, |id, _| Ok(note(&b, id, "1"))).await.unwrap();
        assert_ne!(first.id, second.id);

        let third = table
            .insert_with(&a, |id, rows| Ok(note(&a, id, &rows.len().to_string())))
            .await
            .unwrap();
        assert_eq!(third.text, "1");

        let touched = table
            .update_all(&a, |n| {
                n.text.push('!');
                n.id == first.id
            })
            .await
            .unwrap();
        assert_eq!(touched, 1);
        assert_eq!(table.get(&a, first.id).await.unwrap().unwrap().text, "1!");
        assert_eq!(table.get(&a, third.id).await.unwrap().unwrap().text, "1");

        assert_eq!(table.clear_tenant(&TenantId::from("a")).await.unwrap(), 2);
        assert_eq!(table.count(&b, |_| true).await.unwrap(), 1);
        assert!(parse_id("Note", "x").is_err());
    }

    #[tokio::test]
    async fn remove_where_stays_inside_the_partition() {
        let table = notes().await;
        let a = TenantContext::new("a");
        let b = TenantContext::new("b");
        for text in ["spam", "ham", "spam"] {
            table.insert_with(&a, |id, _| Ok(note(&a, id, text))).await.unwrap();
        }
        table.insert_with(&b, |id, _| Ok(note(&b, id, "spam"))).await.unwrap();

        let gone = table.remove_where(&a, |n| n.text == "spam").await.unwrap();
        assert_eq!(gone.len(), 2);
        assert_eq!(table.count(&a, |_| true).await.unwrap(), 1);
        assert_eq!(table.count(&b, |n| n.text == "spam").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn rows_outlive_the_table_handle() {
        let db = Db::in_memory().await.unwrap();
        let a = TenantContext::new("a");

        let first = TenantTable::<Note>::open(db.clone(), "notes", "Note").await.unwrap();
        let row = first.insert_with(&a, |id, _| Ok(note(&a, id, "kept"))).await.unwrap();
        drop(first);

        let reopened = TenantTable::<Note>::open(db, "notes", "Note").await.unwrap();
        assert_eq!(reopened.require(&a, row.id).await.unwrap().text, "kept");
        let next = reopened.insert_with(&a, |id, _| Ok(note(&a, id, "next"))).await.unwrap();
        assert!(next.id > row.id);
    }
}
