//! # Lookup Repository
//!
//! Read-only lookups the sequence generator needs: "find store by name or
//! code" and "find employee by id within a store". Both ignore
//! soft-deleted rows.

use sqlx::SqlitePool;

use ledger_core::{Employee, Store};

use crate::error::DbResult;

/// Repository for store/employee lookups.
#[derive(Debug, Clone)]
pub struct LookupRepository {
    pool: SqlitePool,
}

impl LookupRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LookupRepository { pool }
    }

    /// Finds a live store whose id, code or name matches `needle`.
    ///
    /// Code and name match case-insensitively. An exact id wins over a code,
    /// a code over a name.
    pub async fn find_store(&self, needle: &str) -> DbResult<Option<Store>> {
        let data: Option<String> = sqlx::query_scalar(
            r#"
            SELECT data FROM stores
            WHERE is_deleted = 0
              AND (
                id = ?1
                OR lower(business_key) = lower(?1)
                OR lower(json_extract(data, '$.name')) = lower(?1)
              )
            ORDER BY
                CASE
                    WHEN id = ?1 THEN 0
                    WHEN lower(business_key) = lower(?1) THEN 1
                    ELSE 2
                END,
                created_at ASC
            LIMIT 1
            "#,
        )
        .bind(needle.trim())
        .fetch_optional(&self.pool)
        .await?;

        data.map(|d| serde_json::from_str(&d))
            .transpose()
            .map_err(Into::into)
    }

    /// Finds a live employee by id, only if they belong to `store_id`.
    pub async fn find_employee(&self, employee_id: &str, store_id: &str) -> DbResult<Option<Employee>> {
        let data: Option<String> = sqlx::query_scalar(
            r#"
            SELECT data FROM employees
            WHERE id = ?1 AND scope_id = ?2 AND is_deleted = 0
            "#,
        )
        .bind(employee_id)
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?;

        data.map(|d| serde_json::from_str(&d))
            .transpose()
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use ledger_core::RecordMeta;

    fn store(id: &str, name: &str, code: &str) -> Store {
        Store {
            id: id.into(),
            user_id: "u-1".into(),
            name: name.into(),
            code: code.into(),
            address: None,
            phone: None,
            is_active: true,
            meta: RecordMeta::default(),
        }
    }

    #[tokio::test]
    async fn test_find_store_by_code_name_or_id() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.records().put(&store("s-1", "Acme Traders", "ACME")).await.unwrap();

        let lookups = db.lookups();
        assert_eq!(lookups.find_store("acme").await.unwrap().unwrap().id, "s-1");
        assert_eq!(lookups.find_store("ACME TRADERS").await.unwrap().unwrap().id, "s-1");
        assert_eq!(lookups.find_store("s-1").await.unwrap().unwrap().code, "ACME");
        assert!(lookups.find_store("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_employee_requires_matching_store() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let employee = Employee {
            id: "e-1".into(),
            store_id: "s-1".into(),
            name: "Jane Doe".into(),
            employee_code: "JD01".into(),
            role: None,
            phone: None,
            is_active: true,
            meta: RecordMeta::default(),
        };
        db.records().put(&employee).await.unwrap();

        let lookups = db.lookups();
        assert!(lookups.find_employee("e-1", "s-1").await.unwrap().is_some());
        assert!(lookups.find_employee("e-1", "s-2").await.unwrap().is_none());
    }
}
