use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};

pub type DepartmentId = i64;
pub type EmployeeId = i64;

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Department {
    pub id: DepartmentId,
    pub name: String,
    pub parent_id: Option<DepartmentId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Employee {
    pub id: EmployeeId,
    pub department_id: DepartmentId,
    pub full_name: String,
    pub position: String,
    pub hired_at: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEmployee {
    pub department_id: DepartmentId,
    pub full_name: String,
    pub position: String,
    pub hired_at: Option<NaiveDate>,
}

/// Requested change to a department's parent reference.
///
/// `Unchanged` means the caller did not mention the parent at all, `Clear` means the
/// caller explicitly asked for the department to become a root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParentUpdate {
    #[default]
    Unchanged,
    Clear,
    Set(DepartmentId),
}

impl ParentUpdate {
    pub fn is_present(&self) -> bool {
        !matches!(self, ParentUpdate::Unchanged)
    }

    /// The parent this update resolves to, given the current one.
    pub fn resolve(&self, current: Option<DepartmentId>) -> Option<DepartmentId> {
        match self {
            ParentUpdate::Unchanged => current,
            ParentUpdate::Clear => None,
            ParentUpdate::Set(id) => Some(*id),
        }
    }

    /// serde `deserialize_with` hook: a present `null` becomes `Clear`, a present integer `Set`.
    /// Combine with `#[serde(default)]` so an absent field stays `Unchanged`.
    pub fn deserialize_present<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<DepartmentId>::deserialize(deserializer)? {
            Some(id) => ParentUpdate::Set(id),
            None => ParentUpdate::Clear,
        })
    }
}

/// Field-level changes handed to the repository. `None` leaves a column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepartmentChanges {
    pub name: Option<String>,
    pub parent_id: Option<Option<DepartmentId>>,
}

impl DepartmentChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.parent_id.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    /// Remove the whole subtree together with every employee in it.
    Cascade,
    /// Move employees to another department and splice child departments one level up.
    Reassign,
}

impl DeleteMode {
    pub const ALLOWED: &'static str = "cascade, reassign";

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "cascade" => Some(DeleteMode::Cascade),
            "reassign" => Some(DeleteMode::Reassign),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeleteMode::Cascade => "cascade",
            DeleteMode::Reassign => "reassign",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParentFilter {
    #[default]
    Any,
    Root,
    Id(DepartmentId),
}

impl From<Option<DepartmentId>> for ParentFilter {
    fn from(parent_id: Option<DepartmentId>) -> Self {
        match parent_id {
            Some(id) => ParentFilter::Id(id),
            None => ParentFilter::Root,
        }
    }
}

/// Predicate for `DepartmentRepository::count_departments`. All set criteria must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepartmentFilter {
    pub id: Option<DepartmentId>,
    pub parent: ParentFilter,
    /// Case-insensitive name match.
    pub name: Option<String>,
    pub exclude_id: Option<DepartmentId>,
}

impl DepartmentFilter {
    pub fn by_id(id: DepartmentId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn siblings_named(parent_id: Option<DepartmentId>, name: &str) -> Self {
        Self {
            parent: parent_id.into(),
            name: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn excluding(mut self, id: Option<DepartmentId>) -> Self {
        self.exclude_id = id;
        self
    }

    pub fn matches(&self, department: &Department) -> bool {
        if let Some(id) = self.id {
            if department.id != id {
                return false;
            }
        }
        match self.parent {
            ParentFilter::Any => {}
            ParentFilter::Root => {
                if department.parent_id.is_some() {
                    return false;
                }
            }
            ParentFilter::Id(parent) => {
                if department.parent_id != Some(parent) {
                    return false;
                }
            }
        }
        if let Some(name) = &self.name {
            if department.name.to_lowercase() != name.to_lowercase() {
                return false;
            }
        }
        if let Some(excluded) = self.exclude_id {
            if department.id == excluded {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetDepartmentOptions {
    pub depth: i32,
    pub include_employees: bool,
}

impl Default for GetDepartmentOptions {
    fn default() -> Self {
        Self {
            depth: 1,
            include_employees: true,
        }
    }
}

/// A materialised subtree. `employees` is `None` when they were not requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepartmentTree {
    pub department: Department,
    pub employees: Option<Vec<Employee>>,
    pub children: Vec<DepartmentTree>,
}

impl DepartmentTree {
    /// Number of levels below this node that were materialised.
    pub fn levels(&self) -> usize {
        self.children
            .iter()
            .map(|child| child.levels() + 1)
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "ParentUpdate::deserialize_present")]
        parent_id: ParentUpdate,
    }

    #[test]
    fn test_parent_update_tri_state() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.parent_id, ParentUpdate::Unchanged);

        let cleared: Patch = serde_json::from_str(r#"{"parent_id":null}"#).unwrap();
        assert_eq!(cleared.parent_id, ParentUpdate::Clear);

        let set: Patch = serde_json::from_str(r#"{"parent_id":7}"#).unwrap();
        assert_eq!(set.parent_id, ParentUpdate::Set(7));

        assert!(serde_json::from_str::<Patch>(r#"{"parent_id":"7"}"#).is_err());
    }

    #[test]
    fn test_parent_update_resolve() {
        assert_eq!(ParentUpdate::Unchanged.resolve(Some(3)), Some(3));
        assert_eq!(ParentUpdate::Clear.resolve(Some(3)), None);
        assert_eq!(ParentUpdate::Set(9).resolve(None), Some(9));
    }

    #[test]
    fn test_filter_matches_siblings_case_insensitively() {
        let dept = Department {
            id: 4,
            name: "Sales".to_string(),
            parent_id: None,
            created_at: Utc::now(),
        };
        assert!(DepartmentFilter::siblings_named(None, "sALES").matches(&dept));
        assert!(!DepartmentFilter::siblings_named(Some(1), "Sales").matches(&dept));
        assert!(!DepartmentFilter::siblings_named(None, "Sales")
            .excluding(Some(4))
            .matches(&dept));
        assert!(DepartmentFilter::by_id(4).matches(&dept));
    }

    #[test]
    fn test_delete_mode_parse() {
        assert_eq!(DeleteMode::parse("cascade"), Some(DeleteMode::Cascade));
        assert_eq!(DeleteMode::parse("reassign"), Some(DeleteMode::Reassign));
        assert_eq!(DeleteMode::parse("purge"), None);
        assert_eq!(DeleteMode::parse(""), None);
    }
}
