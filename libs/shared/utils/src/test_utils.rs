use std::sync::Arc;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::Actor;
use shared_models::user::{RoleProfile, User, UserRole};

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_supabase_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            supabase_service_role_key: "test-service-key".to_string(),
            ..AppConfig::default()
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self::patient("test@example.com")
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn receptionist(email: &str) -> Self {
        Self::new(email, "receptionist")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn user_role(&self) -> UserRole {
        self.role.parse().unwrap_or(UserRole::Patient)
    }

    pub fn to_actor(&self) -> Actor {
        Actor {
            user_id: self.id,
            email: Some(self.email.clone()),
            role: self.user_role(),
        }
    }

    pub fn to_user(&self) -> User {
        let profile = match self.user_role() {
            UserRole::Patient => RoleProfile::Patient { medical_history: None },
            UserRole::Doctor => RoleProfile::Doctor {
                specialization: Some("General Practice".to_string()),
            },
            UserRole::Receptionist => RoleProfile::Receptionist,
            UserRole::Admin => RoleProfile::Admin,
        };
        let username = self.email.split('@').next().unwrap_or("user").to_string();

        User {
            id: self.id,
            name: username.replace('.', " "),
            username,
            email: self.email.clone(),
            phone: None,
            profile,
            created_at: Utc::now(),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        Self::sign(
            json!({
                "sub": user.id,
                "email": user.email,
                "role": user.role,
                "iat": now.timestamp(),
                "exp": exp.timestamp()
            }),
            secret,
        )
    }

    /// Supabase-style token: `role` is "authenticated", clinic role lives in app metadata.
    pub fn create_token_with_metadata_role(user: &TestUser, secret: &str, clinic_role: &str) -> String {
        let now = Utc::now();

        Self::sign(
            json!({
                "sub": user.id,
                "email": user.email,
                "role": "authenticated",
                "app_metadata": { "role": clinic_role },
                "iat": now.timestamp(),
                "exp": (now + Duration::hours(1)).timestamp()
            }),
            secret,
        )
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }

    fn sign(payload: Value, secret: &str) -> String {
        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }
}

pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn user_row(user: &TestUser) -> Value {
        let specialization = (user.role == "doctor").then_some("General Practice");
        json!({
            "id": user.id,
            "username": user.email.split('@').next().unwrap_or("user"),
            "email": user.email,
            "name": "Test User",
            "phone": null,
            "role": user.role,
            "specialization": specialization,
            "medical_history": null,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn availability_row(doctor_id: Uuid, day_of_week: u8, start_time: u16, end_time: u16) -> Value {
        json!({
            "id": Uuid::new_v4(),
            "doctor_id": doctor_id,
            "day_of_week": day_of_week,
            "start_time": start_time,
            "end_time": end_time,
            "is_available": true
        })
    }

    pub fn appointment_row(patient_id: Uuid, doctor_id: Uuid, date_time: &str, status: &str) -> Value {
        json!({
            "id": Uuid::new_v4(),
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "date_time": date_time,
            "duration_minutes": 30,
            "status": status,
            "type": "in-person",
            "notes": null,
            "is_emergency": false,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn error_response(message: &str, code: &str) -> Value {
        json!({
            "message": message,
            "code": code
        })
    }
}
