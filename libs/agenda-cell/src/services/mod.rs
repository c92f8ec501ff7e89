pub mod store;
pub mod whatsapp;

pub use store::AgendaStore;
pub use whatsapp::{LinkOpener, TracingLinkOpener};
