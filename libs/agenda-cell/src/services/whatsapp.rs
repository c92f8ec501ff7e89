// libs/agenda-cell/src/services/whatsapp.rs
use chrono::{NaiveDate, NaiveTime};
use tracing::info;

const WHATSAPP_BASE_URL: &str = "https://wa.me";

/// Collaborator that hands a deep link to an external browsing context.
/// No response is awaited; opening the link is fire-and-forget.
pub trait LinkOpener: Send + Sync {
    fn open(&self, url: &str);
}

/// Default opener that records the deep link in the log stream so the
/// dashboard front-end (or an operator) can follow it.
pub struct TracingLinkOpener;

impl LinkOpener for TracingLinkOpener {
    fn open(&self, url: &str) {
        info!("Opening WhatsApp deep link: {}", url);
    }
}

/// Strip everything that is not a digit, matching how the dashboard
/// normalises phone numbers before building wa.me links.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Build a `https://wa.me/<cc><phone>?text=<message>` deep link with the
/// message URL-encoded.
pub fn deep_link(country_code: &str, phone: &str, message: &str) -> String {
    format!(
        "{}/{}{}?text={}",
        WHATSAPP_BASE_URL,
        country_code,
        normalize_phone(phone),
        urlencoding::encode(message)
    )
}

pub fn reminder_message(patient_name: &str, date: NaiveDate, start_time: NaiveTime) -> String {
    format!(
        "Hola {}, le recordamos su cita médica para el {} a las {}. \
         Por favor confirme su asistencia respondiendo este mensaje.",
        patient_name,
        date.format("%d/%m/%Y"),
        start_time.format("%H:%M"),
    )
}

pub fn prepayment_message(patient_name: &str, date: NaiveDate, fee: f64) -> String {
    format!(
        "Hola {}, para confirmar su cita del {}, por favor realice un prepago \
         de S/{} vía Yape o Plin. Esto nos ayuda a reservar su horario. ¡Gracias!",
        patient_name,
        date.format("%d/%m/%Y"),
        fee,
    )
}
