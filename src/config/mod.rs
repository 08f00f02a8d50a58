use std::collections::BTreeMap;
use std::env;
use std::fmt;

const DEFAULT_MAX_DOCUMENTS: usize = 50;
const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 32 * 1024 * 1024;
const DEFAULT_CITIZENS_CHARTER_DAYS: i64 = 70;
const DEFAULT_FINAL_ACTION_OFFSET_DAYS: i64 = 14;

/// Configuration for the felling workflow engine. Constructed explicitly by
/// the host; `load` reads the environment for deployments.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub max_documents_per_application: usize,
    pub max_file_size_bytes: u64,
    /// Administrative areas keyed by cost code; the value is the hub name
    /// recorded as the application's area code.
    pub configured_areas: BTreeMap<String, String>,
    pub citizens_charter_days: i64,
    pub final_action_date_offset_days: i64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_documents_per_application: DEFAULT_MAX_DOCUMENTS,
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            configured_areas: BTreeMap::new(),
            citizens_charter_days: DEFAULT_CITIZENS_CHARTER_DAYS,
            final_action_date_offset_days: DEFAULT_FINAL_ACTION_OFFSET_DAYS,
        }
    }
}

impl WorkflowConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let max_documents = match env::var("FLO_MAX_DOCUMENTS") {
            Ok(value) => value
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidNumber("FLO_MAX_DOCUMENTS"))?,
            Err(_) => DEFAULT_MAX_DOCUMENTS,
        };

        let max_file_size = match env::var("FLO_MAX_FILE_SIZE_BYTES") {
            Ok(value) => value
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidNumber("FLO_MAX_FILE_SIZE_BYTES"))?,
            Err(_) => DEFAULT_MAX_FILE_SIZE_BYTES,
        };

        let citizens_charter_days = match env::var("FLO_CITIZENS_CHARTER_DAYS") {
            Ok(value) => value
                .parse::<i64>()
                .map_err(|_| ConfigError::InvalidNumber("FLO_CITIZENS_CHARTER_DAYS"))?,
            Err(_) => DEFAULT_CITIZENS_CHARTER_DAYS,
        };

        let final_action_date_offset_days = match env::var("FLO_FINAL_ACTION_OFFSET_DAYS") {
            Ok(value) => value
                .parse::<i64>()
                .map_err(|_| ConfigError::InvalidNumber("FLO_FINAL_ACTION_OFFSET_DAYS"))?,
            Err(_) => DEFAULT_FINAL_ACTION_OFFSET_DAYS,
        };

        let configured_areas = match env::var("FLO_AREAS") {
            Ok(value) => parse_areas(&value)?,
            Err(_) => BTreeMap::new(),
        };

        Ok(Self {
            max_documents_per_application: max_documents,
            max_file_size_bytes: max_file_size,
            configured_areas,
            citizens_charter_days,
            final_action_date_offset_days,
        })
    }

    /// Hub name for an administrative cost code, if configured.
    pub fn area_for_cost_code(&self, cost_code: &str) -> Option<&str> {
        self.configured_areas
            .get(cost_code)
            .map(String::as_str)
    }
}

/// `FLO_AREAS` holds `cost_code=hub` pairs separated by `;`.
fn parse_areas(raw: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    let mut areas = BTreeMap::new();
    for pair in raw.split(';').filter(|pair| !pair.trim().is_empty()) {
        let (code, hub) = pair
            .split_once('=')
            .ok_or(ConfigError::InvalidAreaPair)?;
        let code = code.trim();
        let hub = hub.trim();
        if code.is_empty() || hub.is_empty() {
            return Err(ConfigError::InvalidAreaPair);
        }
        areas.insert(code.to_string(), hub.to_string());
    }
    Ok(areas)
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidNumber(&'static str),
    InvalidAreaPair,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidNumber(var) => write!(f, "{} must be a valid number", var),
            ConfigError::InvalidAreaPair => {
                write!(f, "FLO_AREAS entries must take the form cost_code=hub")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
