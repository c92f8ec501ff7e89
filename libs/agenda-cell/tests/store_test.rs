use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use agenda_cell::models::{AgendaError, AppointmentStatus};
use agenda_cell::services::whatsapp::LinkOpener;
use agenda_cell::services::AgendaStore;
use shared_models::auth::SessionProvider;
use shared_models::notify::{NoticeSeverity, Notifier};
use shared_utils::session::{NoSessionProvider, TokenSessionProvider};
use shared_utils::test_utils::{MockSupabaseRows, TestConfig};

#[derive(Default)]
struct RecordingNotifier {
    notices: Mutex<Vec<(String, String, NoticeSeverity)>>,
}

impl RecordingNotifier {
    fn notices(&self) -> Vec<(String, String, NoticeSeverity)> {
        self.notices.lock().unwrap().clone()
    }

    fn errors(&self) -> Vec<(String, String, NoticeSeverity)> {
        self.notices()
            .into_iter()
            .filter(|(_, _, severity)| *severity == NoticeSeverity::Error)
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, title: &str, description: &str, severity: NoticeSeverity) {
        self.notices
            .lock()
            .unwrap()
            .push((title.to_string(), description.to_string(), severity));
    }
}

#[derive(Default)]
struct RecordingLinkOpener {
    urls: Mutex<Vec<String>>,
}

impl RecordingLinkOpener {
    fn opened(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

impl LinkOpener for RecordingLinkOpener {
    fn open(&self, url: &str) {
        self.urls.lock().unwrap().push(url.to_string());
    }
}

fn build_store(
    mock_server: &MockServer,
) -> (Arc<AgendaStore>, Arc<RecordingNotifier>, Arc<RecordingLinkOpener>) {
    let config = TestConfig::for_mock_server(&mock_server.uri()).to_app_config();
    let notifier = Arc::new(RecordingNotifier::default());
    let links = Arc::new(RecordingLinkOpener::default());
    let session: Arc<dyn SessionProvider> = Arc::new(TokenSessionProvider::new(&config));

    let store = Arc::new(AgendaStore::new(
        &config,
        session,
        notifier.clone(),
        links.clone(),
    ));

    (store, notifier, links)
}

async fn mount_agenda(
    mock_server: &MockServer,
    date: &str,
    rows: Vec<serde_json::Value>,
    delay_ms: u64,
) {
    let mut response = ResponseTemplate::new(200).set_body_json(json!(rows));
    if delay_ms > 0 {
        response = response.set_delay(Duration::from_millis(delay_ms));
    }

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("appointment_date", format!("eq.{}", date)))
        .respond_with(response)
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn test_load_populates_agenda_for_date() {
    let mock_server = MockServer::start().await;
    let (store, notifier, _) = build_store(&mock_server);

    let id = Uuid::new_v4().to_string();
    mount_agenda(
        &mock_server,
        "2025-03-07",
        vec![MockSupabaseRows::appointment_row(
            &id,
            "2025-03-07",
            "09:30:00",
            "pending",
            "987 654 321",
            Some(80.0),
        )],
        0,
    )
    .await;

    store.load(NaiveDate::from_ymd_opt(2025, 3, 7).unwrap()).await;

    let appointments = store.appointments();
    assert_eq!(appointments.len(), 1);
    assert_eq!(appointments[0].id.to_string(), id);
    assert_eq!(appointments[0].status, AppointmentStatus::Pending);
    assert!(!store.is_loading());
    assert!(notifier.errors().is_empty());
}

#[tokio::test]
async fn test_slow_superseded_load_never_overwrites_newer_result() {
    let mock_server = MockServer::start().await;
    let (store, _, _) = build_store(&mock_server);

    let slow_id = Uuid::new_v4().to_string();
    let fast_id = Uuid::new_v4().to_string();

    // The response for the first date arrives after the second one.
    mount_agenda(
        &mock_server,
        "2025-03-07",
        vec![MockSupabaseRows::appointment_row(
            &slow_id,
            "2025-03-07",
            "09:00:00",
            "pending",
            "987654321",
            None,
        )],
        300,
    )
    .await;
    mount_agenda(
        &mock_server,
        "2025-03-08",
        vec![MockSupabaseRows::appointment_row(
            &fast_id,
            "2025-03-08",
            "10:00:00",
            "confirmed",
            "987654321",
            None,
        )],
        0,
    )
    .await;

    let slow_store = store.clone();
    let slow_load = tokio::spawn(async move {
        slow_store
            .load(NaiveDate::from_ymd_opt(2025, 3, 7).unwrap())
            .await;
    });

    // Give the first load time to issue its request before superseding it.
    tokio::time::sleep(Duration::from_millis(50)).await;
    store.load(NaiveDate::from_ymd_opt(2025, 3, 8).unwrap()).await;

    slow_load.await.expect("slow load task panicked");

    let appointments = store.appointments();
    assert_eq!(appointments.len(), 1);
    assert_eq!(appointments[0].id.to_string(), fast_id);
    assert!(!store.is_loading());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_loads_commit_only_the_latest_generation() {
    let mock_server = MockServer::start().await;
    let (store, _, _) = build_store(&mock_server);

    let slow_id = Uuid::new_v4().to_string();
    let fast_id = Uuid::new_v4().to_string();

    mount_agenda(
        &mock_server,
        "2025-03-07",
        vec![MockSupabaseRows::appointment_row(
            &slow_id,
            "2025-03-07",
            "09:00:00",
            "pending",
            "987654321",
            None,
        )],
        15,
    )
    .await;
    mount_agenda(
        &mock_server,
        "2025-03-08",
        vec![MockSupabaseRows::appointment_row(
            &fast_id,
            "2025-03-08",
            "10:00:00",
            "confirmed",
            "987654321",
            None,
        )],
        0,
    )
    .await;

    // Tight timings across real worker threads, repeated so the stale
    // commit has many chances to land between the newer load's check and
    // its state write.
    for _ in 0..25 {
        let superseded_store = store.clone();
        let superseded = tokio::spawn(async move {
            superseded_store
                .load(NaiveDate::from_ymd_opt(2025, 3, 7).unwrap())
                .await;
        });

        for _ in 0..200 {
            if store.is_loading() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        store.load(NaiveDate::from_ymd_opt(2025, 3, 8).unwrap()).await;
        superseded.await.expect("superseded load task panicked");

        let appointments = store.appointments();
        assert_eq!(appointments.len(), 1);
        assert_eq!(appointments[0].id.to_string(), fast_id);
    }
}

#[tokio::test]
async fn test_closed_store_discards_in_flight_results() {
    let mock_server = MockServer::start().await;
    let (store, notifier, _) = build_store(&mock_server);

    mount_agenda(
        &mock_server,
        "2025-03-07",
        vec![MockSupabaseRows::appointment_row(
            &Uuid::new_v4().to_string(),
            "2025-03-07",
            "09:00:00",
            "pending",
            "987654321",
            None,
        )],
        200,
    )
    .await;

    let loading_store = store.clone();
    let load = tokio::spawn(async move {
        loading_store
            .load(NaiveDate::from_ymd_opt(2025, 3, 7).unwrap())
            .await;
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    store.close();
    load.await.expect("load task panicked");

    assert!(store.appointments().is_empty());
    assert!(notifier.errors().is_empty());
}

#[tokio::test]
async fn test_load_without_session_clears_list_and_stays_quiet() {
    let mock_server = MockServer::start().await;

    // No mock mounted: a request against the server would 404 and surface
    // an error notice, which must not happen while signed out.
    let config = TestConfig::for_mock_server(&mock_server.uri()).to_app_config_without_session();
    let notifier = Arc::new(RecordingNotifier::default());
    let links = Arc::new(RecordingLinkOpener::default());
    let store = AgendaStore::new(
        &config,
        Arc::new(NoSessionProvider),
        notifier.clone(),
        links,
    );

    store.load(NaiveDate::from_ymd_opt(2025, 3, 7).unwrap()).await;

    assert!(store.appointments().is_empty());
    assert!(!store.is_loading());
    assert!(notifier.notices().is_empty());
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_fetch_error_surfaces_single_notification() {
    let mock_server = MockServer::start().await;
    let (store, notifier, _) = build_store(&mock_server);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(500).set_body_json(
            MockSupabaseRows::error_response("internal error", "XX000"),
        ))
        .mount(&mock_server)
        .await;

    store.load(NaiveDate::from_ymd_opt(2025, 3, 7).unwrap()).await;

    assert!(store.appointments().is_empty());
    assert!(!store.is_loading());
    let errors = notifier.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].1, "No se pudieron cargar las citas");
}

#[tokio::test]
async fn test_update_status_patches_local_entry_without_refetch() {
    let mock_server = MockServer::start().await;
    let (store, notifier, _) = build_store(&mock_server);

    let id = Uuid::new_v4();
    mount_agenda(
        &mock_server,
        "2025-03-07",
        vec![MockSupabaseRows::appointment_row(
            &id.to_string(),
            "2025-03-07",
            "09:30:00",
            "pending",
            "987654321",
            None,
        )],
        0,
    )
    .await;
    store.load(NaiveDate::from_ymd_opt(2025, 3, 7).unwrap()).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": id }])))
        .expect(1)
        .mount(&mock_server)
        .await;

    store
        .update_status(id, AppointmentStatus::Confirmed)
        .await
        .expect("status update should succeed");

    let appointments = store.appointments();
    assert_eq!(appointments[0].status, AppointmentStatus::Confirmed);
    assert!(notifier
        .notices()
        .iter()
        .any(|(title, _, _)| title == "Estado actualizado"));
}

#[tokio::test]
async fn test_update_status_failure_leaves_state_untouched() {
    let mock_server = MockServer::start().await;
    let (store, notifier, _) = build_store(&mock_server);

    let id = Uuid::new_v4();
    mount_agenda(
        &mock_server,
        "2025-03-07",
        vec![MockSupabaseRows::appointment_row(
            &id.to_string(),
            "2025-03-07",
            "09:30:00",
            "pending",
            "987654321",
            None,
        )],
        0,
    )
    .await;
    store.load(NaiveDate::from_ymd_opt(2025, 3, 7).unwrap()).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(500).set_body_json(
            MockSupabaseRows::error_response("boom", "XX000"),
        ))
        .mount(&mock_server)
        .await;

    let result = store.update_status(id, AppointmentStatus::Confirmed).await;

    assert_matches!(result, Err(AgendaError::DatabaseError(_)));
    assert_eq!(store.appointments()[0].status, AppointmentStatus::Pending);
    assert_eq!(notifier.errors().len(), 1);
}

#[tokio::test]
async fn test_cancel_is_a_status_update_to_cancelled() {
    let mock_server = MockServer::start().await;
    let (store, _, _) = build_store(&mock_server);

    let id = Uuid::new_v4();
    mount_agenda(
        &mock_server,
        "2025-03-07",
        vec![MockSupabaseRows::appointment_row(
            &id.to_string(),
            "2025-03-07",
            "09:30:00",
            "confirmed",
            "987654321",
            None,
        )],
        0,
    )
    .await;
    store.load(NaiveDate::from_ymd_opt(2025, 3, 7).unwrap()).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": id }])))
        .mount(&mock_server)
        .await;

    store.cancel(id).await.expect("cancel should succeed");

    assert_eq!(store.appointments()[0].status, AppointmentStatus::Cancelled);
}

#[tokio::test]
async fn test_send_reminder_opens_deep_link_and_marks_flag() {
    let mock_server = MockServer::start().await;
    let (store, notifier, links) = build_store(&mock_server);

    let id = Uuid::new_v4();
    mount_agenda(
        &mock_server,
        "2025-03-07",
        vec![MockSupabaseRows::appointment_row(
            &id.to_string(),
            "2025-03-07",
            "09:30:00",
            "pending",
            "987 654 321",
            None,
        )],
        0,
    )
    .await;
    store.load(NaiveDate::from_ymd_opt(2025, 3, 7).unwrap()).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": id }])))
        .expect(1)
        .mount(&mock_server)
        .await;

    store.send_reminder(id).await.expect("reminder should succeed");

    let opened = links.opened();
    assert_eq!(opened.len(), 1);
    assert!(opened[0].starts_with("https://wa.me/51987654321?text="));
    assert!(opened[0].contains("07%2F03%2F2025"));
    assert!(opened[0].contains("09%3A30"));

    assert!(store.appointments()[0].reminder_sent);
    assert!(notifier
        .notices()
        .iter()
        .any(|(title, _, _)| title == "Recordatorio"));
}

#[tokio::test]
async fn test_send_reminder_without_phone_makes_no_remote_call() {
    let mock_server = MockServer::start().await;
    let (store, notifier, links) = build_store(&mock_server);

    let id = Uuid::new_v4();
    mount_agenda(
        &mock_server,
        "2025-03-07",
        vec![MockSupabaseRows::appointment_row(
            &id.to_string(),
            "2025-03-07",
            "09:30:00",
            "pending",
            "",
            None,
        )],
        0,
    )
    .await;
    store.load(NaiveDate::from_ymd_opt(2025, 3, 7).unwrap()).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let result = store.send_reminder(id).await;

    assert_matches!(result, Err(AgendaError::MissingPhone));
    assert!(links.opened().is_empty());
    let errors = notifier.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].1, "El paciente no tiene número de teléfono");
    assert!(!store.appointments()[0].reminder_sent);
}

#[tokio::test]
async fn test_reminder_flag_failure_is_not_surfaced() {
    let mock_server = MockServer::start().await;
    let (store, notifier, links) = build_store(&mock_server);

    let id = Uuid::new_v4();
    mount_agenda(
        &mock_server,
        "2025-03-07",
        vec![MockSupabaseRows::appointment_row(
            &id.to_string(),
            "2025-03-07",
            "09:30:00",
            "pending",
            "987654321",
            None,
        )],
        0,
    )
    .await;
    store.load(NaiveDate::from_ymd_opt(2025, 3, 7).unwrap()).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(500).set_body_json(
            MockSupabaseRows::error_response("boom", "XX000"),
        ))
        .mount(&mock_server)
        .await;

    // The message already left the user's machine, so the failing flag
    // update must stay invisible.
    let result = store.send_reminder(id).await;

    assert_matches!(result, Ok(()));
    assert_eq!(links.opened().len(), 1);
    assert!(notifier.errors().is_empty());
    assert!(!store.appointments()[0].reminder_sent);
}

#[tokio::test]
async fn test_request_payment_defaults_missing_fee_to_fifty() {
    let mock_server = MockServer::start().await;
    let (store, _, links) = build_store(&mock_server);

    let id = Uuid::new_v4();
    mount_agenda(
        &mock_server,
        "2025-03-07",
        vec![MockSupabaseRows::appointment_row(
            &id.to_string(),
            "2025-03-07",
            "09:30:00",
            "confirmed",
            "987654321",
            None,
        )],
        0,
    )
    .await;
    store.load(NaiveDate::from_ymd_opt(2025, 3, 7).unwrap()).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": id }])))
        .mount(&mock_server)
        .await;

    store
        .request_payment(id)
        .await
        .expect("payment request should succeed");

    let opened = links.opened();
    assert_eq!(opened.len(), 1);
    // "S/50" URL-encoded
    assert!(opened[0].contains("S%2F50"));
    assert!(store.appointments()[0].prepayment_requested);
}

#[test]
fn test_terminal_statuses_do_not_offer_quick_actions() {
    for status in [
        AppointmentStatus::Cancelled,
        AppointmentStatus::Completed,
        AppointmentStatus::NoShow,
    ] {
        assert!(!status.allows_quick_actions(), "{} should be terminal", status);
    }

    for status in [
        AppointmentStatus::Pending,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Rescheduled,
    ] {
        assert!(status.allows_quick_actions(), "{} should allow actions", status);
    }
}
