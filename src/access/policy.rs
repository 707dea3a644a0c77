use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use thiserror::Error;

use crate::entities::EntityKind;
use crate::types::Operation;

const DEFAULT_POLICY: &str = include_str!("default_policy.yaml");
const WILDCARD: &str = "*";

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Failed to read access policy {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid access policy: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Access policy names unknown entity '{entity}' under role '{role}'")]
    UnknownEntity { role: String, entity: String },

    #[error("Access policy default role '{0}' is not defined")]
    UnknownDefaultRole(String),
}

/// Role-level permissions: role -> entity (or `*`) -> operations.
/// An explicit entity entry replaces the wildcard entry for that entity.
#[derive(Debug, Clone, Deserialize)]
pub struct RolePolicy {
    #[serde(default)]
    default_role: Option<String>,
    roles: HashMap<String, HashMap<String, HashSet<Operation>>>,
}

impl RolePolicy {
    pub fn from_yaml(source: &str) -> Result<Self, PolicyError> {
        let policy: RolePolicy = serde_yaml::from_str(source)?;

        for (role, entities) in &policy.roles {
            for entity in entities.keys() {
                if entity != WILDCARD && EntityKind::from_name(entity).is_none() {
                    return Err(PolicyError::UnknownEntity {
                        role: role.clone(),
                        entity: entity.clone(),
                    });
                }
            }
        }
        if let Some(default_role) = &policy.default_role {
            if !policy.roles.contains_key(default_role) {
                return Err(PolicyError::UnknownDefaultRole(default_role.clone()));
            }
        }

        Ok(policy)
    }

    pub fn embedded() -> Result<Self, PolicyError> {
        Self::from_yaml(DEFAULT_POLICY)
    }

    /// Policy from `path`, or the embedded default
    pub fn load(path: Option<&str>) -> Result<Self, PolicyError> {
        match path {
            Some(path) => {
                let source = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
                    path: path.to_string(),
                    source,
                })?;
                tracing::info!("Loaded access policy from {}", path);
                Self::from_yaml(&source)
            }
            None => Self::embedded(),
        }
    }

    pub fn allows(&self, roles: &[String], kind: EntityKind, op: Operation) -> bool {
        let default_roles: Vec<String> = self.default_role.iter().cloned().collect();
        let roles = if roles.is_empty() { &default_roles[..] } else { roles };

        roles.iter().any(|role| {
            self.roles
                .get(role)
                .and_then(|entities| entities.get(kind.name()).or_else(|| entities.get(WILDCARD)))
                .map(|ops| ops.contains(&op))
                .unwrap_or(false)
        })
    }
}
