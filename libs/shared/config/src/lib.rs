use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub llm_model: String,
    pub mail_gateway_url: String,
    pub chat_timeout_secs: u64,
    pub report_timeout_secs: u64,
    pub notify_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            jwt_secret: env::var("APP_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("APP_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            llm_api_key: env::var("OPENAI_API_KEY")
                .unwrap_or_else(|_| String::new()),
            llm_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            llm_model: env::var("OPENAI_MODEL")
                .unwrap_or_else(|_| "gpt-4.1-mini".to_string()),
            mail_gateway_url: env::var("MAIL_GATEWAY_URL")
                .unwrap_or_else(|_| String::new()),
            chat_timeout_secs: parse_secs("CHAT_TIMEOUT_SECS", 30),
            report_timeout_secs: parse_secs("REPORT_TIMEOUT_SECS", 20),
            notify_timeout_secs: parse_secs("NOTIFY_TIMEOUT_SECS", 5),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }
        if !config.is_llm_configured() {
            warn!("OPENAI_API_KEY not set - agent falls back to rule-based planning");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.jwt_secret.is_empty()
    }

    pub fn is_llm_configured(&self) -> bool {
        !self.llm_api_key.is_empty() && !self.llm_base_url.is_empty()
    }

    pub fn is_mail_configured(&self) -> bool {
        !self.mail_gateway_url.is_empty()
    }
}

fn parse_secs(var: &str, default: u64) -> u64 {
    match env::var(var) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} is not a number, using default {}", var, default);
            default
        }),
        Err(_) => default,
    }
}
