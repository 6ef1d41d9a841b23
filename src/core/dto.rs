//! Wire representations of departments, employees and subtrees.
//!
//! Timestamps serialize as RFC 3339, calendar dates as `YYYY-MM-DD`. A department's
//! `parent_id` is always present (`null` for roots); an employee's `hired_at` and a tree
//! node's `employees` are omitted entirely when absent.

use crate::domain::model::{Department, DepartmentId, DepartmentTree, Employee, EmployeeId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentDto {
    pub id: DepartmentId,
    pub name: String,
    pub parent_id: Option<DepartmentId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeDto {
    pub id: EmployeeId,
    pub department_id: DepartmentId,
    pub full_name: String,
    pub position: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hired_at: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentTreeDto {
    pub department: DepartmentDto,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employees: Option<Vec<EmployeeDto>>,
    pub children: Vec<DepartmentTreeDto>,
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Strict `YYYY-MM-DD` parsing; surrounding whitespace is tolerated.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    // chrono accepts unpadded fields and signed years, the wire format does neither
    let digits_in_place = value.len() == 10
        && value.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !digits_in_place {
        return None;
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

impl From<Department> for DepartmentDto {
    fn from(department: Department) -> Self {
        Self {
            id: department.id,
            name: department.name,
            parent_id: department.parent_id,
            created_at: department.created_at,
        }
    }
}

impl From<Employee> for EmployeeDto {
    fn from(employee: Employee) -> Self {
        Self {
            id: employee.id,
            department_id: employee.department_id,
            full_name: employee.full_name,
            position: employee.position,
            hired_at: employee.hired_at.map(format_date),
            created_at: employee.created_at,
        }
    }
}

impl From<DepartmentTree> for DepartmentTreeDto {
    fn from(tree: DepartmentTree) -> Self {
        Self {
            department: tree.department.into(),
            employees: tree
                .employees
                .map(|employees| employees.into_iter().map(EmployeeDto::from).collect()),
            children: tree.children.into_iter().map(DepartmentTreeDto::from).collect(),
        }
    }
}
