#![allow(dead_code)]

use async_trait::async_trait;
use org_chart::domain::model::{
    Department, DepartmentChanges, DepartmentFilter, DepartmentId, Employee, NewEmployee,
};
use org_chart::{DepartmentEngine, DepartmentRepository, InMemoryRepository, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Delegates to an `InMemoryRepository`, counting writes and optionally blinding the
/// existence/uniqueness pre-checks so write-time constraint handling can be observed.
#[derive(Clone, Default)]
pub struct RecordingRepository {
    pub inner: InMemoryRepository,
    pub updates: Arc<AtomicUsize>,
    pub blind_counts: Arc<AtomicBool>,
}

impl RecordingRepository {
    pub fn update_calls(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn blind_pre_checks(&self) {
        self.blind_counts.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl DepartmentRepository for RecordingRepository {
    async fn find_department_by_id(&self, id: DepartmentId) -> Result<Option<Department>> {
        self.inner.find_department_by_id(id).await
    }

    async fn count_departments(&self, filter: &DepartmentFilter) -> Result<u64> {
        if self.blind_counts.load(Ordering::SeqCst) && filter.name.is_some() {
            return Ok(0);
        }
        self.inner.count_departments(filter).await
    }

    async fn insert_department(
        &self,
        name: &str,
        parent_id: Option<DepartmentId>,
    ) -> Result<Department> {
        self.inner.insert_department(name, parent_id).await
    }

    async fn update_department(
        &self,
        id: DepartmentId,
        changes: &DepartmentChanges,
    ) -> Result<()> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update_department(id, changes).await
    }

    async fn delete_department_cascade(&self, id: DepartmentId) -> Result<()> {
        self.inner.delete_department_cascade(id).await
    }

    async fn reassign_and_delete(
        &self,
        id: DepartmentId,
        employee_target: DepartmentId,
        children_new_parent: Option<DepartmentId>,
    ) -> Result<()> {
        self.inner
            .reassign_and_delete(id, employee_target, children_new_parent)
            .await
    }

    async fn find_children(&self, parent_id: DepartmentId) -> Result<Vec<Department>> {
        self.inner.find_children(parent_id).await
    }

    async fn find_employees(&self, department_id: DepartmentId) -> Result<Vec<Employee>> {
        self.inner.find_employees(department_id).await
    }

    async fn insert_employee(&self, employee: &NewEmployee) -> Result<Employee> {
        self.inner.insert_employee(employee).await
    }
}

/// Delegates to another repository, but applies queued re-parenting writes right before a
/// reassign-delete reaches the store, as a concurrent request would.
#[derive(Clone)]
pub struct InterleavingRepository<R> {
    pub inner: R,
    queued: Arc<Mutex<Vec<(DepartmentId, Option<DepartmentId>)>>>,
}

impl<R: DepartmentRepository> InterleavingRepository<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            queued: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn move_before_reassign(&self, id: DepartmentId, new_parent: Option<DepartmentId>) {
        self.queued.lock().unwrap().push((id, new_parent));
    }
}

#[async_trait]
impl<R: DepartmentRepository> DepartmentRepository for InterleavingRepository<R> {
    async fn find_department_by_id(&self, id: DepartmentId) -> Result<Option<Department>> {
        self.inner.find_department_by_id(id).await
    }

    async fn count_departments(&self, filter: &DepartmentFilter) -> Result<u64> {
        self.inner.count_departments(filter).await
    }

    async fn insert_department(
        &self,
        name: &str,
        parent_id: Option<DepartmentId>,
    ) -> Result<Department> {
        self.inner.insert_department(name, parent_id).await
    }

    async fn update_department(
        &self,
        id: DepartmentId,
        changes: &DepartmentChanges,
    ) -> Result<()> {
        self.inner.update_department(id, changes).await
    }

    async fn delete_department_cascade(&self, id: DepartmentId) -> Result<()> {
        self.inner.delete_department_cascade(id).await
    }

    async fn reassign_and_delete(
        &self,
        id: DepartmentId,
        employee_target: DepartmentId,
        children_new_parent: Option<DepartmentId>,
    ) -> Result<()> {
        let moves: Vec<_> = self.queued.lock().unwrap().drain(..).collect();
        for (moved, new_parent) in moves {
            let changes = DepartmentChanges {
                name: None,
                parent_id: Some(new_parent),
            };
            self.inner.update_department(moved, &changes).await?;
        }
        self.inner
            .reassign_and_delete(id, employee_target, children_new_parent)
            .await
    }

    async fn find_children(&self, parent_id: DepartmentId) -> Result<Vec<Department>> {
        self.inner.find_children(parent_id).await
    }

    async fn find_employees(&self, department_id: DepartmentId) -> Result<Vec<Employee>> {
        self.inner.find_employees(department_id).await
    }

    async fn insert_employee(&self, employee: &NewEmployee) -> Result<Employee> {
        self.inner.insert_employee(employee).await
    }
}

pub fn memory_engine() -> DepartmentEngine<InMemoryRepository> {
    DepartmentEngine::new(InMemoryRepository::new())
}

pub async fn department(
    engine: &DepartmentEngine<InMemoryRepository>,
    name: &str,
    parent_id: Option<DepartmentId>,
) -> Department {
    engine.create_department(name, parent_id).await.unwrap()
}

pub async fn employee(
    engine: &DepartmentEngine<InMemoryRepository>,
    department_id: DepartmentId,
    full_name: &str,
) -> Employee {
    engine
        .create_employee(department_id, full_name, "Engineer", None)
        .await
        .unwrap()
}
