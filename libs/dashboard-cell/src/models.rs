// libs/dashboard-cell/src/models.rs
use serde::{Deserialize, Serialize};

use agenda_cell::models::{Appointment, AppointmentStatus};

/// Point-in-time dashboard aggregate. Derived, never persisted; recomputed
/// on each dashboard mount. `Default` is the all-zero snapshot the UI shows
/// while loading or after a failed fetch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KpiSnapshot {
    pub today_appointments: i64,
    /// Share of today's appointments that are confirmed or completed,
    /// rounded to an integer percentage in [0, 100].
    pub confirmed_percentage: i64,
    pub monthly_no_show_rate: i64,
    /// Sum of consultation fees for the month's appointments that were
    /// neither cancelled nor no-shows. A fee-based approximation, not a
    /// reconciliation against recorded payments.
    pub recovered_money: f64,
    pub pending_appointments: i64,
    /// First five of today's appointments that are not cancelled or
    /// completed, in start-time order.
    pub upcoming_appointments: Vec<Appointment>,
}

/// Narrow projection fetched for the monthly aggregation: status plus the
/// joined doctor fee, nothing else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyAppointmentRow {
    pub status: AppointmentStatus,
    #[serde(default)]
    pub doctor: Option<DoctorFee>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorFee {
    pub consultation_fee: Option<f64>,
}
