pub mod dto;
pub mod hierarchy;

pub use crate::domain::model::{Department, DepartmentTree, Employee};
pub use crate::domain::ports::DepartmentRepository;
pub use crate::utils::error::Result;
