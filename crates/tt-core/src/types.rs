//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// A manual duration edit was not a whole number of rounding units.
    #[error("duration must be a multiple of {unit} minutes, got {value}")]
    UnroundedDuration { value: u32, unit: u32 },
}

/// Store-assigned identifier of a time entry.
///
/// Issued monotonically by the store on insert and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(i64);

impl EntryId {
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for EntryId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().trim_start_matches('#').parse().map(Self)
    }
}

/// A validated project label.
///
/// Project names must contain at least one non-whitespace character.
/// Surrounding whitespace is trimmed on construction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectName(String);

impl ProjectName {
    /// Creates a new project name after validation.
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Empty {
                field: "project name",
            });
        }
        if trimmed.len() == name.len() {
            Ok(Self(name))
        } else {
            Ok(Self(trimmed.to_string()))
        }
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProjectName {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProjectName> for String {
    fn from(name: ProjectName) -> Self {
        name.0
    }
}

impl fmt::Display for ProjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ProjectName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_name_rejects_empty() {
        assert!(ProjectName::new("").is_err());
        assert!(ProjectName::new("   ").is_err());
        assert!(ProjectName::new("Alpha").is_ok());
    }

    #[test]
    fn project_name_trims_whitespace() {
        let name = ProjectName::new("  Client work \n").unwrap();
        assert_eq!(name.as_str(), "Client work");
    }

    #[test]
    fn project_name_serde_roundtrip() {
        let name = ProjectName::new("Alpha").unwrap();
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"Alpha\"");
        let parsed: ProjectName = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, name);
    }

    #[test]
    fn project_name_serde_rejects_empty() {
        let result: Result<ProjectName, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }

    #[test]
    fn entry_id_serializes_as_integer() {
        let id = EntryId::new(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
        let parsed: EntryId = serde_json::from_str("42").unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn entry_id_parses_with_optional_hash() {
        assert_eq!("7".parse::<EntryId>().unwrap(), EntryId::new(7));
        assert_eq!("#7".parse::<EntryId>().unwrap(), EntryId::new(7));
        assert!("seven".parse::<EntryId>().is_err());
    }
}
