//! Postgres-backed repository.
//!
//! Multi-statement writes run inside a `sqlx::Transaction`. If the owning future is dropped
//! (request timeout, client gone) before `commit`, the transaction rolls back on drop, so a
//! cancelled reassign-delete never becomes partially visible.

use crate::domain::model::{
    Department, DepartmentChanges, DepartmentFilter, DepartmentId, Employee, NewEmployee,
    ParentFilter,
};
use crate::domain::ports::DepartmentRepository;
use crate::utils::error::{OrgError, Result};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use std::time::Duration;

pub const SCHEMA_SQL: &str = include_str!("../../migrations/0001_init.sql");

/// Key for the transaction-scoped advisory lock serialising re-parenting.
const HIERARCHY_LOCK_KEY: i64 = 0x6f72_675f_7472_6565;

const DEPARTMENT_COLUMNS: &str = "id, name, parent_id, created_at";
const EMPLOYEE_COLUMNS: &str = "id, department_id, full_name, position, hired_at, created_at";

// UNION (not UNION ALL) stops the walk on rows already seen, so a corrupted loop terminates.
const ANCESTRY_CONTAINS_SQL: &str = r#"
    WITH RECURSIVE ancestry AS (
        SELECT id, parent_id FROM departments WHERE id = $1
        UNION
        SELECT d.id, d.parent_id
        FROM departments d
        JOIN ancestry a ON d.id = a.parent_id
    )
    SELECT EXISTS (SELECT 1 FROM ancestry WHERE id = $2)
"#;

/// Translate constraint violations into the caller-facing taxonomy; anything else stays internal.
pub fn map_database_error(err: sqlx::Error) -> OrgError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return OrgError::conflict("resource with the same unique attributes already exists");
        }
        if db_err.is_foreign_key_violation() {
            return OrgError::validation("invalid foreign key reference");
        }
        if db_err.is_check_violation() {
            return OrgError::validation("department cannot be parent of itself");
        }
    }
    OrgError::StorageError(err)
}

#[derive(Debug, Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        tracing::info!("database schema is up to date");
        Ok(())
    }

    async fn begin_hierarchy_edit(&self) -> Result<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(HIERARCHY_LOCK_KEY)
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }
}

#[async_trait]
impl DepartmentRepository for PgRepository {
    async fn find_department_by_id(&self, id: DepartmentId) -> Result<Option<Department>> {
        let department = sqlx::query_as::<_, Department>(&format!(
            "SELECT {} FROM departments WHERE id = $1",
            DEPARTMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(department)
    }

    async fn count_departments(&self, filter: &DepartmentFilter) -> Result<u64> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM departments WHERE TRUE");
        if let Some(id) = filter.id {
            query.push(" AND id = ").push_bind(id);
        }
        match filter.parent {
            ParentFilter::Any => {}
            ParentFilter::Root => {
                query.push(" AND parent_id IS NULL");
            }
            ParentFilter::Id(parent_id) => {
                query.push(" AND parent_id = ").push_bind(parent_id);
            }
        }
        if let Some(name) = &filter.name {
            query
                .push(" AND LOWER(name) = LOWER(")
                .push_bind(name.clone())
                .push(")");
        }
        if let Some(excluded) = filter.exclude_id {
            query.push(" AND id <> ").push_bind(excluded);
        }

        let count = query.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    async fn insert_department(
        &self,
        name: &str,
        parent_id: Option<DepartmentId>,
    ) -> Result<Department> {
        sqlx::query_as::<_, Department>(&format!(
            "INSERT INTO departments (name, parent_id) VALUES ($1, $2) RETURNING {}",
            DEPARTMENT_COLUMNS
        ))
        .bind(name)
        .bind(parent_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_database_error)
    }

    async fn update_department(
        &self,
        id: DepartmentId,
        changes: &DepartmentChanges,
    ) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut tx = self.begin_hierarchy_edit().await?;

        // 在鎖內重新檢查祖先鏈，避免並行搬移造成循環
        if let Some(Some(parent_id)) = changes.parent_id {
            let closes_loop = sqlx::query_scalar::<_, bool>(ANCESTRY_CONTAINS_SQL)
                .bind(parent_id)
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
            if closes_loop {
                return Err(OrgError::conflict("department cycle detected"));
            }
        }

        let mut query = QueryBuilder::<Postgres>::new("UPDATE departments SET ");
        let mut assignments = query.separated(", ");
        if let Some(name) = &changes.name {
            assignments.push("name = ").push_bind_unseparated(name.clone());
        }
        if let Some(parent_id) = changes.parent_id {
            assignments
                .push("parent_id = ")
                .push_bind_unseparated(parent_id);
        }
        query.push(" WHERE id = ").push_bind(id);

        let result = query
            .build()
            .execute(&mut *tx)
            .await
            .map_err(map_database_error)?;
        if result.rows_affected() == 0 {
            return Err(OrgError::not_found("department not found"));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_department_cascade(&self, id: DepartmentId) -> Result<()> {
        // ON DELETE CASCADE on both foreign keys removes the subtree and its employees.
        sqlx::query("DELETE FROM departments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_database_error)?;
        Ok(())
    }

    async fn reassign_and_delete(
        &self,
        id: DepartmentId,
        employee_target: DepartmentId,
        children_new_parent: Option<DepartmentId>,
    ) -> Result<()> {
        let mut tx = self.begin_hierarchy_edit().await?;

        // 鎖住被刪除的部門列：父節點必須仍是呼叫端讀到的值，並阻擋並行的 FK 插入
        let current_parent = sqlx::query_scalar::<_, Option<DepartmentId>>(
            "SELECT parent_id FROM departments WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| OrgError::not_found("department not found"))?;
        if current_parent != children_new_parent {
            return Err(OrgError::conflict(
                "department was moved concurrently, retry the request",
            ));
        }

        let moved = sqlx::query("UPDATE employees SET department_id = $1 WHERE department_id = $2")
            .bind(employee_target)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_database_error)?;

        let spliced = sqlx::query("UPDATE departments SET parent_id = $1 WHERE parent_id = $2")
            .bind(children_new_parent)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_database_error)?;

        sqlx::query("DELETE FROM departments WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_database_error)?;

        tx.commit().await?;
        tracing::debug!(
            department_id = id,
            employees_moved = moved.rows_affected(),
            children_spliced = spliced.rows_affected(),
            "reassign transaction committed"
        );
        Ok(())
    }

    async fn find_children(&self, parent_id: DepartmentId) -> Result<Vec<Department>> {
        let children = sqlx::query_as::<_, Department>(&format!(
            r#"SELECT {} FROM departments WHERE parent_id = $1 ORDER BY name COLLATE "C", id"#,
            DEPARTMENT_COLUMNS
        ))
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(children)
    }

    async fn find_employees(&self, department_id: DepartmentId) -> Result<Vec<Employee>> {
        let employees = sqlx::query_as::<_, Employee>(&format!(
            r#"SELECT {} FROM employees WHERE department_id = $1 ORDER BY full_name COLLATE "C", id"#,
            EMPLOYEE_COLUMNS
        ))
        .bind(department_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(employees)
    }

    async fn insert_employee(&self, employee: &NewEmployee) -> Result<Employee> {
        sqlx::query_as::<_, Employee>(&format!(
            "INSERT INTO employees (department_id, full_name, position, hired_at) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            EMPLOYEE_COLUMNS
        ))
        .bind(employee.department_id)
        .bind(&employee.full_name)
        .bind(&employee.position)
        .bind(employee.hired_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_database_error)
    }
}
