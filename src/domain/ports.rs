use crate::domain::model::{
    Department, DepartmentChanges, DepartmentFilter, DepartmentId, Employee, NewEmployee,
};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Storage contract consumed by the hierarchy engine.
///
/// Implementations own storage mechanics only and carry no business rules, but they are
/// expected to enforce the same constraints a relational schema would: foreign keys,
/// sibling-name uniqueness on `(parent_id, lower(name))`, and cascading removal of a
/// department's subtree. Constraint violations surface as `OrgError::Conflict` (uniqueness)
/// or `OrgError::Validation` (dangling reference).
#[async_trait]
pub trait DepartmentRepository: Send + Sync {
    async fn find_department_by_id(&self, id: DepartmentId) -> Result<Option<Department>>;

    async fn count_departments(&self, filter: &DepartmentFilter) -> Result<u64>;

    async fn insert_department(
        &self,
        name: &str,
        parent_id: Option<DepartmentId>,
    ) -> Result<Department>;

    async fn update_department(&self, id: DepartmentId, changes: &DepartmentChanges)
        -> Result<()>;

    /// Remove the department together with every descendant department and all their employees.
    async fn delete_department_cascade(&self, id: DepartmentId) -> Result<()>;

    /// Atomically move employees of `id` to `employee_target`, re-parent the children of `id`
    /// to `children_new_parent`, and delete `id`. Either all three happen or none does.
    ///
    /// `children_new_parent` must still be the parent of `id` when the write runs: a department
    /// moved in the meantime yields `Conflict`, one already deleted yields `NotFound`.
    async fn reassign_and_delete(
        &self,
        id: DepartmentId,
        employee_target: DepartmentId,
        children_new_parent: Option<DepartmentId>,
    ) -> Result<()>;

    /// Direct children ordered by name ascending (ordinal, case-sensitive).
    async fn find_children(&self, parent_id: DepartmentId) -> Result<Vec<Department>>;

    /// Employees of one department ordered by full name ascending (ordinal, case-sensitive).
    async fn find_employees(&self, department_id: DepartmentId) -> Result<Vec<Employee>>;

    async fn insert_employee(&self, employee: &NewEmployee) -> Result<Employee>;
}
