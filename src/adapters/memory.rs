use crate::domain::model::{
    Department, DepartmentChanges, DepartmentFilter, DepartmentId, Employee, EmployeeId,
    NewEmployee,
};
use crate::domain::ports::DepartmentRepository;
use crate::utils::error::{OrgError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

const UNIQUE_VIOLATION: &str = "resource with the same unique attributes already exists";
const FOREIGN_KEY_VIOLATION: &str = "invalid foreign key reference";
const HIERARCHY_CHANGED: &str = "department was moved concurrently, retry the request";

#[derive(Debug, Clone, Default)]
struct MemoryState {
    departments: BTreeMap<DepartmentId, Department>,
    employees: BTreeMap<EmployeeId, Employee>,
    next_department_id: DepartmentId,
    next_employee_id: EmployeeId,
}

impl MemoryState {
    fn allocate_department_id(&mut self) -> DepartmentId {
        self.next_department_id += 1;
        self.next_department_id
    }

    fn allocate_employee_id(&mut self) -> EmployeeId {
        self.next_employee_id += 1;
        self.next_employee_id
    }

    /// Same guarantees the relational schema gives: foreign keys, unique sibling names,
    /// and (as the Postgres adapter adds on top) an acyclic parent graph.
    fn verify(&self) -> Result<()> {
        let mut names = HashSet::new();
        for department in self.departments.values() {
            if let Some(parent_id) = department.parent_id {
                if !self.departments.contains_key(&parent_id) {
                    return Err(OrgError::validation(FOREIGN_KEY_VIOLATION));
                }
            }
            if !names.insert((department.parent_id, department.name.to_lowercase())) {
                return Err(OrgError::conflict(UNIQUE_VIOLATION));
            }
        }

        for employee in self.employees.values() {
            if !self.departments.contains_key(&employee.department_id) {
                return Err(OrgError::validation(FOREIGN_KEY_VIOLATION));
            }
        }

        for start in self.departments.keys() {
            let mut seen = HashSet::new();
            let mut cursor = Some(*start);
            while let Some(id) = cursor {
                if !seen.insert(id) {
                    return Err(OrgError::conflict("department cycle detected"));
                }
                cursor = self.departments.get(&id).and_then(|d| d.parent_id);
            }
        }

        Ok(())
    }

    fn subtree_ids(&self, root: DepartmentId) -> HashSet<DepartmentId> {
        let mut collected = HashSet::from([root]);
        let mut frontier = vec![root];
        while let Some(parent) = frontier.pop() {
            for department in self.departments.values() {
                if department.parent_id == Some(parent) && collected.insert(department.id) {
                    frontier.push(department.id);
                }
            }
        }
        collected
    }
}

/// Process-local repository. Every write is applied to a scratch copy, checked against the
/// schema constraints, and only then swapped in, so each call is all-or-nothing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn department_count(&self) -> Result<usize> {
        Ok(self.lock()?.departments.len())
    }

    pub fn employee_count(&self) -> Result<usize> {
        Ok(self.lock()?.employees.len())
    }

    pub fn find_employee_by_id(&self, id: EmployeeId) -> Result<Option<Employee>> {
        Ok(self.lock()?.employees.get(&id).cloned())
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| OrgError::internal("in-memory store lock poisoned"))
    }

    fn transact<T>(&self, apply: impl FnOnce(&mut MemoryState) -> Result<T>) -> Result<T> {
        let mut guard = self.lock()?;
        let mut scratch = guard.clone();
        let value = apply(&mut scratch)?;
        scratch.verify()?;
        *guard = scratch;
        Ok(value)
    }
}

#[async_trait]
impl DepartmentRepository for InMemoryRepository {
    async fn find_department_by_id(&self, id: DepartmentId) -> Result<Option<Department>> {
        Ok(self.lock()?.departments.get(&id).cloned())
    }

    async fn count_departments(&self, filter: &DepartmentFilter) -> Result<u64> {
        let state = self.lock()?;
        Ok(state
            .departments
            .values()
            .filter(|department| filter.matches(department))
            .count() as u64)
    }

    async fn insert_department(
        &self,
        name: &str,
        parent_id: Option<DepartmentId>,
    ) -> Result<Department> {
        self.transact(|state| {
            let department = Department {
                id: state.allocate_department_id(),
                name: name.to_string(),
                parent_id,
                created_at: Utc::now(),
            };
            state.departments.insert(department.id, department.clone());
            Ok(department)
        })
    }

    async fn update_department(
        &self,
        id: DepartmentId,
        changes: &DepartmentChanges,
    ) -> Result<()> {
        self.transact(|state| {
            let department = state
                .departments
                .get_mut(&id)
                .ok_or_else(|| OrgError::not_found("department not found"))?;
            if let Some(name) = &changes.name {
                department.name = name.clone();
            }
            if let Some(parent_id) = changes.parent_id {
                department.parent_id = parent_id;
            }
            Ok(())
        })
    }

    async fn delete_department_cascade(&self, id: DepartmentId) -> Result<()> {
        self.transact(|state| {
            let doomed = state.subtree_ids(id);
            state.departments.retain(|key, _| !doomed.contains(key));
            state
                .employees
                .retain(|_, employee| !doomed.contains(&employee.department_id));
            Ok(())
        })
    }

    async fn reassign_and_delete(
        &self,
        id: DepartmentId,
        employee_target: DepartmentId,
        children_new_parent: Option<DepartmentId>,
    ) -> Result<()> {
        self.transact(|state| {
            let current_parent = state
                .departments
                .get(&id)
                .map(|department| department.parent_id)
                .ok_or_else(|| OrgError::not_found("department not found"))?;
            if current_parent != children_new_parent {
                return Err(OrgError::conflict(HIERARCHY_CHANGED));
            }

            for employee in state.employees.values_mut() {
                if employee.department_id == id {
                    employee.department_id = employee_target;
                }
            }
            for department in state.departments.values_mut() {
                if department.parent_id == Some(id) {
                    department.parent_id = children_new_parent;
                }
            }
            state.departments.remove(&id);
            Ok(())
        })
    }

    async fn find_children(&self, parent_id: DepartmentId) -> Result<Vec<Department>> {
        let state = self.lock()?;
        let mut children: Vec<Department> = state
            .departments
            .values()
            .filter(|department| department.parent_id == Some(parent_id))
            .cloned()
            .collect();
        children.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(children)
    }

    async fn find_employees(&self, department_id: DepartmentId) -> Result<Vec<Employee>> {
        let state = self.lock()?;
        let mut employees: Vec<Employee> = state
            .employees
            .values()
            .filter(|employee| employee.department_id == department_id)
            .cloned()
            .collect();
        employees.sort_by(|a, b| a.full_name.cmp(&b.full_name).then(a.id.cmp(&b.id)));
        Ok(employees)
    }

    async fn insert_employee(&self, employee: &NewEmployee) -> Result<Employee> {
        self.transact(|state| {
            let record = Employee {
                id: state.allocate_employee_id(),
                department_id: employee.department_id,
                full_name: employee.full_name.clone(),
                position: employee.position.clone(),
                hired_at: employee.hired_at,
                created_at: Utc::now(),
            };
            state.employees.insert(record.id, record.clone());
            Ok(record)
        })
    }
}
