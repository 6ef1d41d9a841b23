use crate::domain::model::{
    Department, DepartmentChanges, DepartmentFilter, DepartmentId, DepartmentTree, DeleteMode,
    Employee, GetDepartmentOptions, NewEmployee, ParentUpdate,
};
use crate::domain::ports::DepartmentRepository;
use crate::utils::error::{OrgError, Result};
use crate::utils::validation::{normalize_required_string, validate_range};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use tracing::instrument;

pub const MIN_TREE_DEPTH: i32 = 0;
pub const MAX_TREE_DEPTH: i32 = 5;

const DEPARTMENT_NOT_FOUND: &str = "department not found";
const SIBLING_NAME_TAKEN: &str = "department name must be unique under the same parent";

type TreeFuture<'a> = Pin<Box<dyn Future<Output = Result<DepartmentTree>> + Send + 'a>>;

/// Invariant-preserving operations over the department forest.
///
/// The engine keeps no state of its own; the repository is the source of truth and every
/// check is re-run per call, so one engine can be shared freely between concurrent requests.
/// Pre-checks are optimistic: the repository's constraints catch races that slip past them.
pub struct DepartmentEngine<R: DepartmentRepository> {
    repository: R,
}

impl<R: DepartmentRepository> DepartmentEngine<R> {
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    #[instrument(skip(self, name))]
    pub async fn create_department(
        &self,
        name: &str,
        parent_id: Option<DepartmentId>,
    ) -> Result<Department> {
        let name = normalize_required_string("name", name)?;

        if let Some(parent_id) = parent_id {
            self.ensure_department_exists(parent_id).await?;
        }

        self.ensure_sibling_name_free(parent_id, &name, None).await?;

        let department = self.repository.insert_department(&name, parent_id).await?;
        tracing::info!(department_id = department.id, "department created");
        Ok(department)
    }

    #[instrument(skip(self, full_name, position))]
    pub async fn create_employee(
        &self,
        department_id: DepartmentId,
        full_name: &str,
        position: &str,
        hired_at: Option<NaiveDate>,
    ) -> Result<Employee> {
        let full_name = normalize_required_string("full_name", full_name)?;
        let position = normalize_required_string("position", position)?;

        self.ensure_department_exists(department_id).await?;

        let employee = self
            .repository
            .insert_employee(&NewEmployee {
                department_id,
                full_name,
                position,
                hired_at,
            })
            .await?;
        tracing::info!(employee_id = employee.id, "employee created");
        Ok(employee)
    }

    #[instrument(skip(self))]
    pub async fn get_department(
        &self,
        id: DepartmentId,
        options: &GetDepartmentOptions,
    ) -> Result<DepartmentTree> {
        let department = self.load_department(id).await?;

        validate_range("depth", options.depth, MIN_TREE_DEPTH, MAX_TREE_DEPTH)?;

        self.build_tree(department, options.depth, options.include_employees)
            .await
    }

    #[instrument(skip(self, name))]
    pub async fn update_department(
        &self,
        id: DepartmentId,
        name: Option<&str>,
        parent: ParentUpdate,
    ) -> Result<Department> {
        let department = self.load_department(id).await?;

        if name.is_none() && !parent.is_present() {
            return Ok(department);
        }

        let new_name = match name {
            Some(raw) => normalize_required_string("name", raw)?,
            None => department.name.clone(),
        };
        let new_parent_id = parent.resolve(department.parent_id);

        if let ParentUpdate::Set(parent_id) = parent {
            if parent_id == id {
                return Err(OrgError::validation("department cannot be parent of itself"));
            }
            self.ensure_department_exists(parent_id).await?;
            if self.would_create_cycle(id, parent_id).await? {
                tracing::debug!(parent_id, "re-parent rejected, cycle detected");
                return Err(OrgError::conflict("department cycle detected"));
            }
        }

        self.ensure_sibling_name_free(new_parent_id, &new_name, Some(id))
            .await?;

        let mut changes = DepartmentChanges::default();
        if name.is_some() && new_name != department.name {
            changes.name = Some(new_name);
        }
        if parent.is_present() && new_parent_id != department.parent_id {
            changes.parent_id = Some(new_parent_id);
        }

        if changes.is_empty() {
            return Ok(department);
        }

        self.repository.update_department(id, &changes).await?;
        tracing::info!(department_id = id, ?changes, "department updated");

        // 重新讀取，回傳資料庫中的實際狀態
        self.load_department(id).await
    }

    #[instrument(skip(self))]
    pub async fn delete_department(
        &self,
        id: DepartmentId,
        mode: &str,
        reassign_to: Option<DepartmentId>,
    ) -> Result<()> {
        let department = self.load_department(id).await?;

        let mode = DeleteMode::parse(mode).ok_or_else(|| {
            OrgError::validation(format!("mode must be one of: {}", DeleteMode::ALLOWED))
        })?;

        match mode {
            DeleteMode::Cascade => {
                self.repository.delete_department_cascade(id).await?;
            }
            DeleteMode::Reassign => {
                let target = reassign_to.ok_or_else(|| {
                    OrgError::validation(
                        "reassign_to_department_id is required when mode=reassign",
                    )
                })?;
                if target == id {
                    return Err(OrgError::validation(
                        "reassign_to_department_id cannot be the same department",
                    ));
                }
                self.ensure_department_exists(target).await?;

                // Children move up to the deleted department's own parent, not to `target`.
                self.repository
                    .reassign_and_delete(id, target, department.parent_id)
                    .await?;
            }
        }

        tracing::info!(department_id = id, mode = mode.as_str(), "department deleted");
        Ok(())
    }

    fn build_tree(
        &self,
        department: Department,
        depth: i32,
        include_employees: bool,
    ) -> TreeFuture<'_> {
        Box::pin(async move {
            let employees = if include_employees {
                Some(self.repository.find_employees(department.id).await?)
            } else {
                None
            };

            let mut children = Vec::new();
            if depth > 0 {
                for child in self.repository.find_children(department.id).await? {
                    children.push(
                        self.build_tree(child, depth - 1, include_employees)
                            .await?,
                    );
                }
            }

            Ok(DepartmentTree {
                department,
                employees,
                children,
            })
        })
    }

    /// Walks upward from `new_parent_id`; reaching `id` on the way means the move would close a loop.
    async fn would_create_cycle(
        &self,
        id: DepartmentId,
        new_parent_id: DepartmentId,
    ) -> Result<bool> {
        let mut visited = HashSet::new();
        let mut current = Some(new_parent_id);

        while let Some(cursor) = current {
            if cursor == id {
                return Ok(true);
            }
            // A revisit means the stored graph already loops; never extend it.
            if !visited.insert(cursor) {
                tracing::warn!(department_id = cursor, "existing cycle found in parent chain");
                return Ok(true);
            }
            current = match self.repository.find_department_by_id(cursor).await? {
                Some(ancestor) => ancestor.parent_id,
                None => None,
            };
        }

        Ok(false)
    }

    async fn load_department(&self, id: DepartmentId) -> Result<Department> {
        self.repository
            .find_department_by_id(id)
            .await?
            .ok_or_else(|| OrgError::not_found(DEPARTMENT_NOT_FOUND))
    }

    async fn ensure_department_exists(&self, id: DepartmentId) -> Result<()> {
        let count = self
            .repository
            .count_departments(&DepartmentFilter::by_id(id))
            .await?;
        if count == 0 {
            return Err(OrgError::not_found(DEPARTMENT_NOT_FOUND));
        }
        Ok(())
    }

    async fn ensure_sibling_name_free(
        &self,
        parent_id: Option<DepartmentId>,
        name: &str,
        exclude_id: Option<DepartmentId>,
    ) -> Result<()> {
        let filter = DepartmentFilter::siblings_named(parent_id, name).excluding(exclude_id);
        if self.repository.count_departments(&filter).await? > 0 {
            tracing::debug!(?parent_id, "sibling name already taken");
            return Err(OrgError::conflict(SIBLING_NAME_TAKEN));
        }
        Ok(())
    }
}
