//! Insight entity types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Insight category a loader is bound to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Organization,
    Project,
    User,
}

impl EntityType {
    pub const ALL_VARIANTS_STR: &'static str = "organization|project|user";

    pub const ALL_VARIANTS: &'static [EntityType] =
        &[EntityType::Organization, EntityType::Project, EntityType::User];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match *self {
            Self::Organization => "organization",
            Self::Project => "project",
            Self::User => "user",
        }
    }

    /// Path segment of the backend collection for this entity.
    #[must_use]
    pub const fn endpoint(&self) -> &'static str {
        match *self {
            Self::Organization => "organizations",
            Self::Project => "projects",
            Self::User => "users",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "organization" | "organizations" | "org" => Ok(Self::Organization),
            "project" | "projects" => Ok(Self::Project),
            "user" | "users" => Ok(Self::User),
            _ => Err(CoreError::UnknownEntityType(s.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_names() {
        assert_eq!("organization".parse::<EntityType>(), Ok(EntityType::Organization));
        assert_eq!("Projects".parse::<EntityType>(), Ok(EntityType::Project));
        assert_eq!(" user ".parse::<EntityType>(), Ok(EntityType::User));
    }

    #[test]
    fn test_parse_unknown_name_fails() {
        let err = "team".parse::<EntityType>().unwrap_err();
        assert_eq!(err, CoreError::UnknownEntityType("team".to_owned()));
        assert!(err.to_string().contains(EntityType::ALL_VARIANTS_STR));
    }

    #[test]
    fn test_round_trip_through_as_str() {
        for entity in EntityType::ALL_VARIANTS {
            assert_eq!(entity.as_str().parse::<EntityType>(), Ok(*entity));
        }
    }

    #[test]
    fn test_endpoint_is_plural() {
        assert_eq!(EntityType::Organization.endpoint(), "organizations");
        assert_eq!(EntityType::User.endpoint(), "users");
    }
}
