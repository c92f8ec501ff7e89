// libs/dashboard-cell/src/services/kpi.rs
use std::sync::Arc;

use anyhow::Result;
use chrono::{Datelike, Months, NaiveDate, Utc};
use reqwest::Method;
use tracing::{debug, error};

use agenda_cell::models::{Appointment, AppointmentStatus, DEFAULT_CONSULTATION_FEE};
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::SessionProvider;

use crate::models::{KpiSnapshot, MonthlyAppointmentRow};

/// Derives the dashboard summary cards from two independent queries:
/// today's appointments (full joins) and the current month's appointments
/// (status + fee projection only). The two fetches run concurrently and
/// are joined only when the snapshot is assembled; neither depends on the
/// other's completion order.
pub struct DashboardKpiService {
    supabase: Arc<SupabaseClient>,
    session: Arc<dyn SessionProvider>,
}

impl DashboardKpiService {
    pub fn new(config: &AppConfig, session: Arc<dyn SessionProvider>) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            session,
        }
    }

    /// Compute the snapshot for "today" at invocation time.
    pub async fn compute_daily_snapshot(&self) -> KpiSnapshot {
        self.compute_snapshot_for(Utc::now().date_naive()).await
    }

    /// Date-parameterized variant so tests can pin the day. Fetch errors
    /// are logged and the affected fields keep their zero defaults; this
    /// method always returns a snapshot so the UI never hangs.
    pub async fn compute_snapshot_for(&self, today: NaiveDate) -> KpiSnapshot {
        let Some(session) = self.session.current_session().await else {
            debug!("No session; dashboard KPIs keep their zero defaults");
            return KpiSnapshot::default();
        };

        let (today_rows, month_rows) = tokio::join!(
            self.fetch_today(today, &session.access_token),
            self.fetch_month(today, &session.access_token),
        );

        let today_rows = today_rows.unwrap_or_else(|e| {
            error!("Error fetching today's appointments for KPIs: {}", e);
            Vec::new()
        });
        let month_rows = month_rows.unwrap_or_else(|e| {
            error!("Error fetching monthly appointments for KPIs: {}", e);
            Vec::new()
        });

        snapshot_from_rows(today_rows, &month_rows)
    }

    async fn fetch_today(&self, date: NaiveDate, token: &str) -> Result<Vec<Appointment>> {
        let path = format!(
            "/rest/v1/appointments?select=*,doctor:doctors(*),patient:patients(*)\
             &appointment_date=eq.{}&order=start_time.asc",
            date.format("%Y-%m-%d")
        );
        self.supabase.request(Method::GET, &path, Some(token), None).await
    }

    async fn fetch_month(&self, date: NaiveDate, token: &str) -> Result<Vec<MonthlyAppointmentRow>> {
        let (month_start, month_end) = month_bounds(date);
        let path = format!(
            "/rest/v1/appointments?select=status,doctor:doctors(consultation_fee)\
             &appointment_date=gte.{}&appointment_date=lte.{}",
            month_start.format("%Y-%m-%d"),
            month_end.format("%Y-%m-%d")
        );
        self.supabase.request(Method::GET, &path, Some(token), None).await
    }
}

/// First and last calendar day of the month containing `date`.
pub fn month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = date.with_day(1).unwrap_or(date);
    let end = start
        .checked_add_months(Months::new(1))
        .and_then(|next_month| next_month.pred_opt())
        .unwrap_or(date);
    (start, end)
}

/// Pure assembly of the snapshot from the two result sets.
pub fn snapshot_from_rows(
    today_rows: Vec<Appointment>,
    month_rows: &[MonthlyAppointmentRow],
) -> KpiSnapshot {
    let confirmed = today_rows
        .iter()
        .filter(|apt| {
            matches!(
                apt.status,
                AppointmentStatus::Confirmed | AppointmentStatus::Completed
            )
        })
        .count();
    let pending = today_rows
        .iter()
        .filter(|apt| apt.status == AppointmentStatus::Pending)
        .count();

    let no_show = month_rows
        .iter()
        .filter(|row| row.status == AppointmentStatus::NoShow)
        .count();
    let recovered_money: f64 = month_rows
        .iter()
        .filter(|row| {
            !matches!(
                row.status,
                AppointmentStatus::NoShow | AppointmentStatus::Cancelled
            )
        })
        .map(|row| {
            row.doctor
                .as_ref()
                .and_then(|d| d.consultation_fee)
                .unwrap_or(DEFAULT_CONSULTATION_FEE)
        })
        .sum();

    let confirmed_percentage = percentage(confirmed, today_rows.len());
    let monthly_no_show_rate = percentage(no_show, month_rows.len());
    let today_appointments = today_rows.len() as i64;
    let upcoming_appointments: Vec<Appointment> = today_rows
        .into_iter()
        .filter(|apt| {
            !matches!(
                apt.status,
                AppointmentStatus::Cancelled | AppointmentStatus::Completed
            )
        })
        .take(5)
        .collect();

    KpiSnapshot {
        today_appointments,
        confirmed_percentage,
        monthly_no_show_rate,
        recovered_money,
        pending_appointments: pending as i64,
        upcoming_appointments,
    }
}

fn percentage(part: usize, total: usize) -> i64 {
    if total == 0 {
        0
    } else {
        ((part as f64 / total as f64) * 100.0).round() as i64
    }
}
