use tracing::{error, info};

/// Severity of a transient user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeSeverity {
    Info,
    Error,
}

/// Collaborator that surfaces transient feedback to clinic staff
/// (the toast widget in the dashboard UI).
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, description: &str, severity: NoticeSeverity);
}

/// Default notifier that writes notices to the log stream.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, title: &str, description: &str, severity: NoticeSeverity) {
        match severity {
            NoticeSeverity::Info => info!("notice: {}: {}", title, description),
            NoticeSeverity::Error => error!("notice: {}: {}", title, description),
        }
    }
}
