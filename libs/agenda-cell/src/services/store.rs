// libs/agenda-cell/src/services/store.rs
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, error, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{Session, SessionProvider};
use shared_models::notify::{NoticeSeverity, Notifier};

use crate::models::{AgendaError, Appointment, AppointmentStatus};
use crate::services::whatsapp::{self, LinkOpener};

#[derive(Default)]
struct AgendaState {
    appointments: Vec<Appointment>,
    loading: bool,
}

/// Owns the appointment list for the currently selected agenda date.
///
/// A monotonically increasing fetch generation guards against out-of-order
/// completion: when two loads overlap, only the result belonging to the
/// latest generation is allowed to touch state, so an older, slower
/// response can never overwrite a newer one. In-flight requests are not
/// aborted; only their visible effect is discarded.
pub struct AgendaStore {
    supabase: Arc<SupabaseClient>,
    session: Arc<dyn SessionProvider>,
    notifier: Arc<dyn Notifier>,
    links: Arc<dyn LinkOpener>,
    country_code: String,
    state: Mutex<AgendaState>,
    generation: AtomicU64,
    alive: AtomicBool,
}

impl AgendaStore {
    pub fn new(
        config: &AppConfig,
        session: Arc<dyn SessionProvider>,
        notifier: Arc<dyn Notifier>,
        links: Arc<dyn LinkOpener>,
    ) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            session,
            notifier,
            links,
            country_code: config.whatsapp_country_code.clone(),
            state: Mutex::new(AgendaState::default()),
            generation: AtomicU64::new(0),
            alive: AtomicBool::new(true),
        }
    }

    /// Current appointment list, ordered by start time ascending.
    pub fn appointments(&self) -> Vec<Appointment> {
        self.state().appointments.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state().loading
    }

    /// Load the agenda for a calendar date, superseding any in-flight load.
    ///
    /// Without a session the list is cleared and nothing is fetched; that is
    /// the signed-out empty state, not an error. Fetch failures surface a
    /// notification unless a newer load (or teardown) superseded this one,
    /// in which case they are expected and discarded silently.
    pub async fn load(&self, date: NaiveDate) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let date_str = date.format("%Y-%m-%d").to_string();

        self.commit(generation, |state| state.loading = true);

        let Some(session) = self.session.current_session().await else {
            // No session yet (e.g. right after a login redirect)
            self.commit(generation, |state| {
                state.appointments.clear();
                state.loading = false;
            });
            return;
        };

        let path = format!(
            "/rest/v1/appointments?select=*,doctor:doctors(*),patient:patients(*)\
             &appointment_date=eq.{}&order=start_time.asc",
            date_str
        );

        let result: Result<Vec<Appointment>, _> = self
            .supabase
            .request(Method::GET, &path, Some(&session.access_token), None)
            .await;

        match result {
            Ok(appointments) => {
                self.commit(generation, |state| {
                    state.appointments = appointments;
                    state.loading = false;
                });
            }
            Err(e) => {
                if !self.commit(generation, |state| state.loading = false) {
                    debug!("Discarding stale agenda fetch for {}: {}", date_str, e);
                    return;
                }
                error!("Error fetching appointments for {}: {}", date_str, e);
                self.notifier.notify(
                    "Error",
                    "No se pudieron cargar las citas",
                    NoticeSeverity::Error,
                );
            }
        }
    }

    /// Change the status of a single appointment. The local entry is patched
    /// in place after the remote write succeeds; no refetch, no rollback.
    pub async fn update_status(
        &self,
        id: Uuid,
        status: AppointmentStatus,
    ) -> Result<(), AgendaError> {
        let session = self.require_session().await?;

        match self
            .patch_appointment(id, json!({ "status": status }), &session)
            .await
        {
            Ok(()) => {
                self.patch_local(id, |apt| apt.status = status);
                self.notifier.notify(
                    "Estado actualizado",
                    "El estado de la cita ha sido actualizado",
                    NoticeSeverity::Info,
                );
                Ok(())
            }
            Err(e) => {
                error!("Error updating status of appointment {}: {}", id, e);
                self.notifier.notify(
                    "Error",
                    "No se pudo actualizar el estado",
                    NoticeSeverity::Error,
                );
                Err(e)
            }
        }
    }

    /// Open a WhatsApp reminder for the patient, then mark `reminder_sent`.
    ///
    /// The flag update is best effort: once the deep link is opened the
    /// message has already left from the user's perspective, so a failing
    /// remote write is logged but never surfaced.
    pub async fn send_reminder(&self, id: Uuid) -> Result<(), AgendaError> {
        let appointment = self.find(id)?;
        let (phone, patient_name) = self.require_phone(&appointment)?;

        let message = whatsapp::reminder_message(
            &patient_name,
            appointment.appointment_date,
            appointment.start_time,
        );
        self.links
            .open(&whatsapp::deep_link(&self.country_code, &phone, &message));

        match self.flag_appointment(id, "reminder_sent").await {
            Ok(()) => {
                self.patch_local(id, |apt| apt.reminder_sent = true);
                self.notifier.notify(
                    "Recordatorio",
                    "Se abrió WhatsApp para enviar el recordatorio",
                    NoticeSeverity::Info,
                );
            }
            Err(e) => warn!("Could not mark reminder as sent for {}: {}", id, e),
        }

        Ok(())
    }

    /// Open a WhatsApp prepayment request, then mark `prepayment_requested`.
    /// Same best-effort flag semantics as `send_reminder`.
    pub async fn request_payment(&self, id: Uuid) -> Result<(), AgendaError> {
        let appointment = self.find(id)?;
        let (phone, patient_name) = self.require_phone(&appointment)?;

        let message = whatsapp::prepayment_message(
            &patient_name,
            appointment.appointment_date,
            appointment.consultation_fee(),
        );
        self.links
            .open(&whatsapp::deep_link(&self.country_code, &phone, &message));

        match self.flag_appointment(id, "prepayment_requested").await {
            Ok(()) => {
                self.patch_local(id, |apt| apt.prepayment_requested = true);
                self.notifier.notify(
                    "Solicitud de prepago",
                    "Se abrió WhatsApp para solicitar el prepago",
                    NoticeSeverity::Info,
                );
            }
            Err(e) => warn!("Could not mark prepayment as requested for {}: {}", id, e),
        }

        Ok(())
    }

    pub async fn cancel(&self, id: Uuid) -> Result<(), AgendaError> {
        self.update_status(id, AppointmentStatus::Cancelled).await
    }

    /// Teardown. Any in-flight fetch becomes a no-op when it resolves.
    pub fn close(&self) {
        self.alive.store(false, Ordering::SeqCst);
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn state(&self) -> MutexGuard<'_, AgendaState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_current(&self, generation: u64) -> bool {
        self.alive.load(Ordering::SeqCst)
            && self.generation.load(Ordering::SeqCst) == generation
    }

    /// Apply a state change only if `generation` is still current,
    /// checking and writing under the same lock. A newer load bumps the
    /// counter before it can commit, so a superseded load observes the
    /// bump here at the latest and backs off. Returns whether the change
    /// was applied.
    fn commit<F>(&self, generation: u64, change: F) -> bool
    where
        F: FnOnce(&mut AgendaState),
    {
        let mut state = self.state();
        if !self.is_current(generation) {
            return false;
        }
        change(&mut state);
        true
    }

    fn find(&self, id: Uuid) -> Result<Appointment, AgendaError> {
        self.state()
            .appointments
            .iter()
            .find(|apt| apt.id == id)
            .cloned()
            .ok_or(AgendaError::NotFound)
    }

    fn patch_local<F>(&self, id: Uuid, patch: F)
    where
        F: FnOnce(&mut Appointment),
    {
        let mut state = self.state();
        if let Some(apt) = state.appointments.iter_mut().find(|a| a.id == id) {
            patch(apt);
        }
    }

    /// Precondition for WhatsApp actions: a joined patient with a usable
    /// phone number. Failing it surfaces one blocking notification and
    /// performs no remote call.
    fn require_phone(&self, appointment: &Appointment) -> Result<(String, String), AgendaError> {
        match appointment.patient_phone() {
            Some(phone) => {
                let name = appointment
                    .patient
                    .as_ref()
                    .map(|p| p.full_name.clone())
                    .unwrap_or_default();
                Ok((phone.to_string(), name))
            }
            None => {
                self.notifier.notify(
                    "Error",
                    "El paciente no tiene número de teléfono",
                    NoticeSeverity::Error,
                );
                Err(AgendaError::MissingPhone)
            }
        }
    }

    async fn require_session(&self) -> Result<Session, AgendaError> {
        match self.session.current_session().await {
            Some(session) => Ok(session),
            None => {
                self.notifier.notify(
                    "Error",
                    "No hay una sesión activa",
                    NoticeSeverity::Error,
                );
                Err(AgendaError::NoSession)
            }
        }
    }

    async fn flag_appointment(&self, id: Uuid, flag: &str) -> Result<(), AgendaError> {
        let session = self
            .session
            .current_session()
            .await
            .ok_or(AgendaError::NoSession)?;
        self.patch_appointment(id, json!({ flag: true }), &session)
            .await
    }

    /// Single-row PATCH against the appointments table.
    async fn patch_appointment(
        &self,
        id: Uuid,
        body: Value,
        session: &Session,
    ) -> Result<(), AgendaError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);

        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(&session.access_token),
                Some(body),
                Some(headers),
            )
            .await
            .map_err(|e| AgendaError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(AgendaError::NotFound);
        }

        Ok(())
    }
}
