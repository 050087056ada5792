use dotenvy::dotenv;
use serde::Serialize;
use std::{env, fmt};
use thiserror::Error;

pub const COMMERCETOOLS_REGIONS: [&str; 5] = [
    "us-central1.gcp",
    "us-east-2.aws",
    "europe-west1.gcp",
    "eu-central-1.aws",
    "australia-southeast1.gcp",
];

const DEFAULT_VISION_URL: &str = "https://vision.googleapis.com";
const DEFAULT_GENERATIVE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_EVENT_TRIGGER: &str = "ProductCreated";

/// Source of raw settings; `env::var` in production, a map in tests.
pub type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationMessage {
    pub code: &'static str,
    pub message: &'static str,
    pub referenced_by: &'static str,
}

impl fmt::Display for ValidationMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code, self.message)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid environment variables: {}", join_messages(.0))]
    Invalid(Vec<ValidationMessage>),
    #[error("missing required property `{0}`")]
    MissingProperty(&'static str),
}

impl ConfigError {
    pub fn codes(&self) -> Vec<&'static str> {
        match self {
            ConfigError::Invalid(messages) => messages.iter().map(|m| m.code).collect(),
            ConfigError::MissingProperty(_) => Vec::new(),
        }
    }
}

fn join_messages(messages: &[ValidationMessage]) -> String {
    messages
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone)]
pub struct Config {
    pub commercetools: CommercetoolsSettings,
    pub google: GoogleSettings,
    pub server: ServerSettings,
    pub http: HttpSettings,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(&|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        let mut problems = Vec::new();
        let commercetools = CommercetoolsSettings::collect(lookup, &mut problems);
        let google = GoogleSettings::collect(lookup, &mut problems);
        if !problems.is_empty() {
            return Err(ConfigError::Invalid(problems));
        }
        Ok(Self {
            commercetools,
            google,
            server: ServerSettings::from_lookup(lookup),
            http: HttpSettings::from_lookup(lookup),
        })
    }
}

#[derive(Debug, Clone)]
pub struct CommercetoolsSettings {
    pub client_id: String,
    pub client_secret: String,
    pub project_key: String,
    pub scope: Option<String>,
    pub region: String,
    pub auth_url: String,
    pub api_url: String,
}

impl CommercetoolsSettings {
    /// Loads only the store credentials; used by the deploy hooks.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(&|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        let mut problems = Vec::new();
        let settings = Self::collect(lookup, &mut problems);
        if problems.is_empty() {
            Ok(settings)
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }

    fn collect(lookup: Lookup<'_>, problems: &mut Vec<ValidationMessage>) -> Self {
        let client_id = lookup("CTP_CLIENT_ID").unwrap_or_default();
        let client_secret = lookup("CTP_CLIENT_SECRET").unwrap_or_default();
        let project_key = lookup("CTP_PROJECT_KEY").unwrap_or_default();
        let scope = non_blank(lookup("CTP_SCOPE"));
        let region = lookup("CTP_REGION").unwrap_or_default();

        if !standard_string(&client_id, 24, 24) {
            problems.push(ValidationMessage {
                code: "InValidClientId",
                message: "Client id should be 24 characters.",
                referenced_by: "environmentVariables",
            });
        }
        if !standard_string(&client_secret, 32, 32) {
            problems.push(ValidationMessage {
                code: "InvalidClientSecret",
                message: "Client secret should be 32 characters.",
                referenced_by: "environmentVariables",
            });
        }
        if !standard_key(&project_key) {
            problems.push(ValidationMessage {
                code: "InvalidProjectKey",
                message: "Project key should be a valid string.",
                referenced_by: "environmentVariables",
            });
        }
        if scope.as_deref().is_some_and(|scope| !standard_string(scope, 2, usize::MAX)) {
            problems.push(ValidationMessage {
                code: "InvalidScope",
                message: "Scope should be at least 2 characters long.",
                referenced_by: "environmentVariables",
            });
        }
        if !COMMERCETOOLS_REGIONS.contains(&region.as_str()) {
            problems.push(ValidationMessage {
                code: "InvalidRegion",
                message: "Not a valid region.",
                referenced_by: "environmentVariables",
            });
        }

        let auth_url = non_blank(lookup("CTP_AUTH_URL"))
            .unwrap_or_else(|| format!("https://auth.{region}.commercetools.com"));
        let api_url = non_blank(lookup("CTP_API_URL"))
            .unwrap_or_else(|| format!("https://api.{region}.commercetools.com"));

        Self {
            client_id,
            client_secret,
            project_key,
            scope,
            region,
            auth_url: auth_url.trim_end_matches('/').to_string(),
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Clone)]
pub struct GoogleSettings {
    pub service_account_base64: String,
    pub generative_api_key: String,
    pub gemini_model: String,
    pub vision_url: String,
    pub generative_url: String,
}

impl fmt::Debug for GoogleSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleSettings")
            .field("gemini_model", &self.gemini_model)
            .field("vision_url", &self.vision_url)
            .field("generative_url", &self.generative_url)
            .finish_non_exhaustive()
    }
}

impl GoogleSettings {
    fn collect(lookup: Lookup<'_>, problems: &mut Vec<ValidationMessage>) -> Self {
        let service_account_base64 = non_blank(lookup("BASE64_ENCODED_GCP_SERVICE_ACCOUNT"));
        let generative_api_key = non_blank(lookup("GENERATIVE_AI_API_KEY"));
        let gemini_model = non_blank(lookup("GEMINI_MODEL"));

        if service_account_base64.is_none() {
            problems.push(ValidationMessage {
                code: "MissingServiceAccount",
                message: "BASE64_ENCODED_GCP_SERVICE_ACCOUNT is not set.",
                referenced_by: "environmentVariables",
            });
        }
        if generative_api_key.is_none() {
            problems.push(ValidationMessage {
                code: "MissingGenerativeApiKey",
                message: "GENERATIVE_AI_API_KEY is not set.",
                referenced_by: "environmentVariables",
            });
        }
        if gemini_model.is_none() {
            problems.push(ValidationMessage {
                code: "MissingGeminiModel",
                message: "GEMINI_MODEL is not set.",
                referenced_by: "environmentVariables",
            });
        }

        Self {
            service_account_base64: service_account_base64.unwrap_or_default(),
            generative_api_key: generative_api_key.unwrap_or_default(),
            gemini_model: gemini_model.unwrap_or_default(),
            vision_url: non_blank(lookup("VISION_API_URL"))
                .unwrap_or_else(|| DEFAULT_VISION_URL.into())
                .trim_end_matches('/')
                .to_string(),
            generative_url: non_blank(lookup("GENERATIVE_AI_API_URL"))
                .unwrap_or_else(|| DEFAULT_GENERATIVE_URL.into())
                .trim_end_matches('/')
                .to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub port: u16,
    pub request_max_bytes: usize,
    pub job_history_capacity: usize,
}

impl ServerSettings {
    fn from_lookup(lookup: Lookup<'_>) -> Self {
        Self {
            port: parsed(lookup, "PORT").unwrap_or(8080),
            request_max_bytes: parsed(lookup, "REQUEST_MAX_BYTES")
                .filter(|v| *v > 0)
                .unwrap_or(256 * 1024),
            job_history_capacity: parsed(lookup, "JOB_HISTORY_CAPACITY")
                .filter(|v| *v > 0)
                .unwrap_or(256),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            connect_timeout_secs: 5,
        }
    }
}

impl HttpSettings {
    pub fn from_lookup(lookup: Lookup<'_>) -> Self {
        let defaults = Self::default();
        Self {
            timeout_secs: parsed(lookup, "HTTP_TIMEOUT_SECS").unwrap_or(defaults.timeout_secs),
            connect_timeout_secs: parsed(lookup, "HTTP_CONNECT_TIMEOUT_SECS")
                .unwrap_or(defaults.connect_timeout_secs),
        }
    }
}

/// Settings read by the deploy hooks that manage the push subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionSettings {
    pub topic_name: String,
    pub gcp_project_id: String,
    pub event_triggers: Vec<String>,
}

impl SubscriptionSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(&|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        let topic_name = non_blank(lookup("CONNECT_GCP_TOPIC_NAME"))
            .ok_or(ConfigError::MissingProperty("CONNECT_GCP_TOPIC_NAME"))?;
        let gcp_project_id = non_blank(lookup("CONNECT_GCP_PROJECT_ID"))
            .ok_or(ConfigError::MissingProperty("CONNECT_GCP_PROJECT_ID"))?;
        Ok(Self {
            topic_name,
            gcp_project_id,
            event_triggers: event_triggers(lookup("EVENT_TRIGGER_NAME").as_deref()),
        })
    }
}

pub fn event_triggers(raw: Option<&str>) -> Vec<String> {
    let triggers: Vec<String> = raw
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect();
    if triggers.is_empty() {
        vec![DEFAULT_EVENT_TRIGGER.to_string()]
    } else {
        triggers
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed<T: std::str::FromStr>(lookup: Lookup<'_>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse::<T>().ok())
}

fn standard_string(value: &str, min: usize, max: usize) -> bool {
    let len = value.chars().count();
    len >= min && len <= max
}

fn standard_key(value: &str) -> bool {
    standard_string(value, 2, 256)
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
