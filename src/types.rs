/// Shared types used across the codebase

use axum::http::Method;
use serde::{Deserialize, Serialize};

/// Operations a caller can request against an entity.
/// Used by the access policy, the handlers and the notification payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    /// Map a method on a record route (`/api/<entity>/:id`)
    pub fn for_record(method: &Method) -> Option<Self> {
        match *method {
            Method::GET => Some(Operation::Read),
            Method::PUT => Some(Operation::Update),
            Method::DELETE => Some(Operation::Delete),
            _ => None,
        }
    }

    /// Map a method on a collection route (`/api/<entity>`)
    pub fn for_collection(method: &Method) -> Option<Self> {
        match *method {
            Method::GET => Some(Operation::Read),
            Method::POST => Some(Operation::Create),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_methods_map_to_operations() {
        assert_eq!(Operation::for_record(&Method::GET), Some(Operation::Read));
        assert_eq!(Operation::for_record(&Method::PUT), Some(Operation::Update));
        assert_eq!(Operation::for_record(&Method::DELETE), Some(Operation::Delete));
        assert_eq!(Operation::for_record(&Method::PATCH), None);
        assert_eq!(Operation::for_record(&Method::POST), None);
    }

    #[test]
    fn collection_methods_map_to_operations() {
        assert_eq!(Operation::for_collection(&Method::GET), Some(Operation::Read));
        assert_eq!(Operation::for_collection(&Method::POST), Some(Operation::Create));
        assert_eq!(Operation::for_collection(&Method::DELETE), None);
    }
}
