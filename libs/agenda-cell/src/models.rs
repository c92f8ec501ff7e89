// libs/agenda-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Fallback fee (in soles) when a doctor has no consultation fee recorded.
pub const DEFAULT_CONSULTATION_FEE: f64 = 50.0;

// ==============================================================================
// CORE AGENDA MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: AppointmentStatus,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub reminder_sent: bool,
    pub confirmation_sent: bool,
    pub prepayment_requested: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    // Joined rows, present when the query selects doctor:doctors(*) / patient:patients(*)
    #[serde(default)]
    pub doctor: Option<Doctor>,
    #[serde(default)]
    pub patient: Option<Patient>,
}

impl Appointment {
    /// Phone number usable for WhatsApp actions, if the joined patient has one.
    pub fn patient_phone(&self) -> Option<&str> {
        self.patient
            .as_ref()
            .map(|p| p.phone.trim())
            .filter(|p| !p.is_empty())
    }

    /// Fee charged for this appointment, falling back to the default when
    /// the doctor join is missing or carries no fee.
    pub fn consultation_fee(&self) -> f64 {
        self.doctor
            .as_ref()
            .map(Doctor::fee)
            .unwrap_or(DEFAULT_CONSULTATION_FEE)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Rescheduled,
    Cancelled,
    NoShow,
    Completed,
}

impl AppointmentStatus {
    /// Quick actions (reminder, prepayment request, reschedule) are only
    /// offered while the appointment is still actionable.
    pub fn allows_quick_actions(&self) -> bool {
        !matches!(
            self,
            AppointmentStatus::Cancelled
                | AppointmentStatus::Completed
                | AppointmentStatus::NoShow
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Rescheduled => write!(f, "rescheduled"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
            AppointmentStatus::Completed => write!(f, "completed"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub profile_id: Option<Uuid>,
    pub full_name: String,
    pub specialty: Option<String>,
    pub consultation_fee: Option<f64>,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Doctor {
    pub fn fee(&self) -> f64 {
        self.consultation_fee.unwrap_or(DEFAULT_CONSULTATION_FEE)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub full_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub dni: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct AgendaQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum AgendaError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Patient has no phone number")]
    MissingPhone,

    #[error("No active session")]
    NoSession,

    #[error("Database error: {0}")]
    DatabaseError(String),
}
