//! Role model and the role-reference sum type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Role entity.
#[derive(Debug, Clone, FromRow)]
pub struct Role {
    pub role_id: Uuid,
    pub role_code: String,
    pub role_label: String,
    pub created_utc: DateTime<Utc>,
}

/// A role reference as it arrives from callers: either a bare role name or a
/// full record. Resolved once at the data-access boundary so the rest of the
/// service only ever sees a role code.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum RoleRef {
    Name(String),
    Record { role_id: Uuid, role_name: String },
}

impl RoleRef {
    /// The role code this reference points at.
    pub fn code(&self) -> &str {
        match self {
            RoleRef::Name(name) => name,
            RoleRef::Record { role_name, .. } => role_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_ref_deserializes_both_shapes() {
        let name: RoleRef = serde_json::from_str(r#""designer""#).unwrap();
        assert_eq!(name.code(), "designer");

        let record: RoleRef = serde_json::from_str(
            r#"{"role_id":"11111111-1111-1111-1111-111111111111","role_name":"admin"}"#,
        )
        .unwrap();
        assert_eq!(record.code(), "admin");
    }
}
