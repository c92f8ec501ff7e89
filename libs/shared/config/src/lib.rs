use std::env;
use tracing::warn;

/// Country code prefixed to patient phone numbers in WhatsApp deep links.
pub const DEFAULT_WHATSAPP_COUNTRY_CODE: &str = "51";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    /// Access token the dashboard uses against protected tables.
    /// Empty means no active session yet.
    pub supabase_access_token: String,
    pub whatsapp_country_code: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            supabase_access_token: env::var("SUPABASE_ACCESS_TOKEN")
                .unwrap_or_default(),
            whatsapp_country_code: env::var("WHATSAPP_COUNTRY_CODE")
                .unwrap_or_else(|_| DEFAULT_WHATSAPP_COUNTRY_CODE.to_string()),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }
}
