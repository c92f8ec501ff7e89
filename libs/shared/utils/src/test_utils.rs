use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

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
    /// Config whose Supabase URL points at a wiremock server, with a
    /// freshly signed access token so the session provider reports a
    /// live session.
    pub fn for_mock_server(base_url: &str) -> Self {
        Self {
            supabase_url: base_url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        let staff = TestUser::receptionist("staff@clinic.example");
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            supabase_access_token: JwtTestUtils::create_test_token(
                &staff,
                &self.jwt_secret,
                None,
            ),
            whatsapp_country_code: "51".to_string(),
        }
    }

    /// Same config but without a session token (signed-out state).
    pub fn to_app_config_without_session(&self) -> AppConfig {
        AppConfig {
            supabase_access_token: String::new(),
            ..self.to_app_config()
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "receptionist".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn receptionist(email: &str) -> Self {
        Self::new(email, "receptionist")
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
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

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Canned PostgREST rows for the three agenda tables.
pub struct MockSupabaseRows;

impl MockSupabaseRows {
    pub fn doctor_row(id: &str, full_name: &str, consultation_fee: Option<f64>) -> Value {
        json!({
            "id": id,
            "clinic_id": Uuid::new_v4(),
            "profile_id": null,
            "full_name": full_name,
            "specialty": "Medicina General",
            "consultation_fee": consultation_fee,
            "phone": "+51 999 111 222",
            "is_active": true,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn patient_row(id: &str, full_name: &str, phone: &str) -> Value {
        json!({
            "id": id,
            "clinic_id": Uuid::new_v4(),
            "full_name": full_name,
            "phone": phone,
            "email": null,
            "dni": null,
            "date_of_birth": null,
            "notes": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    /// A fully joined appointment row as returned by the agenda query.
    pub fn appointment_row(
        id: &str,
        date: &str,
        start_time: &str,
        status: &str,
        patient_phone: &str,
        consultation_fee: Option<f64>,
    ) -> Value {
        json!({
            "id": id,
            "clinic_id": Uuid::new_v4(),
            "doctor_id": Uuid::new_v4(),
            "patient_id": Uuid::new_v4(),
            "appointment_date": date,
            "start_time": start_time,
            "end_time": "23:59:00",
            "status": status,
            "reason": null,
            "notes": null,
            "reminder_sent": false,
            "confirmation_sent": false,
            "prepayment_requested": false,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z",
            "doctor": Self::doctor_row(
                &Uuid::new_v4().to_string(),
                "Dra. Rosa Quispe",
                consultation_fee,
            ),
            "patient": Self::patient_row(
                &Uuid::new_v4().to_string(),
                "Juan Pérez",
                patient_phone,
            )
        })
    }

    /// The narrow monthly projection used by the KPI aggregation.
    pub fn monthly_row(status: &str, consultation_fee: Option<f64>) -> Value {
        json!({
            "status": status,
            "doctor": { "consultation_fee": consultation_fee }
        })
    }

    pub fn error_response(message: &str, code: &str) -> Value {
        json!({
            "error": {
                "message": message,
                "code": code
            }
        })
    }
}
