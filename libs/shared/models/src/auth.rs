use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::user::UserRole;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

impl JwtClaims {
    /// Clinic role carried by the token. Supabase puts "authenticated" in the
    /// top-level `role` claim, so the metadata objects are consulted as well.
    pub fn clinic_role(&self) -> Option<UserRole> {
        let from_metadata = |metadata: &Option<serde_json::Value>| {
            metadata
                .as_ref()
                .and_then(|value| value.get("role"))
                .and_then(|role| role.as_str())
                .and_then(|role| role.parse().ok())
        };

        self.role
            .as_deref()
            .and_then(|role| role.parse().ok())
            .or_else(|| from_metadata(&self.app_metadata))
            .or_else(|| from_metadata(&self.user_metadata))
    }
}

/// The authenticated caller, inserted into request extensions by the auth middleware.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub role: UserRole,
}

impl Actor {
    pub fn new(user_id: Uuid, role: UserRole) -> Self {
        Self {
            user_id,
            email: None,
            role,
        }
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}
