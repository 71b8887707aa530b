use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Patient,
    Doctor,
    Receptionist,
    Admin,
}

impl UserRole {
    /// Front-desk and administrative roles that act on behalf of patients.
    pub fn is_staff(&self) -> bool {
        matches!(self, UserRole::Receptionist | UserRole::Admin)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Patient => write!(f, "patient"),
            UserRole::Doctor => write!(f, "doctor"),
            UserRole::Receptionist => write!(f, "receptionist"),
            UserRole::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "patient" => Ok(UserRole::Patient),
            "doctor" => Ok(UserRole::Doctor),
            "receptionist" => Ok(UserRole::Receptionist),
            "admin" => Ok(UserRole::Admin),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// Role-specific profile data. Only the fields that belong to a role exist on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum RoleProfile {
    Patient {
        #[serde(default)]
        medical_history: Option<String>,
    },
    Doctor {
        #[serde(default)]
        specialization: Option<String>,
    },
    Receptionist,
    Admin,
}

impl RoleProfile {
    pub fn role(&self) -> UserRole {
        match self {
            RoleProfile::Patient { .. } => UserRole::Patient,
            RoleProfile::Doctor { .. } => UserRole::Doctor,
            RoleProfile::Receptionist => UserRole::Receptionist,
            RoleProfile::Admin => UserRole::Admin,
        }
    }
}

/// Identity record. The password hash belongs to the auth provider and is
/// never loaded into this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(flatten)]
    pub profile: RoleProfile,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn role(&self) -> UserRole {
        self.profile.role()
    }

    pub fn is_doctor(&self) -> bool {
        self.role() == UserRole::Doctor
    }

    pub fn is_patient(&self) -> bool {
        self.role() == UserRole::Patient
    }

    pub fn specialization(&self) -> Option<&str> {
        match &self.profile {
            RoleProfile::Doctor { specialization } => specialization.as_deref(),
            _ => None,
        }
    }
}
