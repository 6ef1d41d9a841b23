pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::http::{app, router};
pub use adapters::memory::InMemoryRepository;
#[cfg(feature = "postgres")]
pub use adapters::postgres::PgRepository;
pub use config::{AppConfig, ServerCli, StorageKind};
pub use core::hierarchy::DepartmentEngine;
pub use domain::model::{DeleteMode, GetDepartmentOptions, ParentUpdate};
pub use domain::ports::DepartmentRepository;
pub use utils::error::{ErrorKind, OrgError, Result};
