use crate::classifier::{Locale, PatternClassifier};
use crate::error::{Result, ShiftError};
use crate::fiscal::FiscalPeriod;
use crate::utils::validate_fiscal_year_offset;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_locales() -> Vec<Locale> {
    vec![Locale::English, Locale::Dutch]
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ShiftConfig {
    #[serde(default)]
    #[schemars(
        description = "Months between the calendar year end and the fiscal year end, 0-11. 0 means the fiscal year is the calendar year. 6 means the fiscal year ends in June."
    )]
    pub fiscal_year_offset_months: u32,

    #[serde(default)]
    #[schemars(
        description = "Reporting period per project id, as a literal such as 'q119', 'ar23', 'mr0424' or an ISO date '2019-03-31'."
    )]
    pub projects: BTreeMap<String, String>,

    #[serde(default = "default_request_timeout_secs")]
    #[schemars(description = "Timeout in seconds for calls to the remote mapping store.")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    #[schemars(
        description = "Base URL of the remote mapping store. When absent the shifter must be given a store explicitly."
    )]
    pub store_url: Option<String>,

    #[serde(default = "default_locales")]
    #[schemars(
        description = "Locales whose period patterns are tried, in order. Defaults to English then Dutch."
    )]
    pub locales: Vec<Locale>,
}

impl Default for ShiftConfig {
    fn default() -> Self {
        Self {
            fiscal_year_offset_months: 0,
            projects: BTreeMap::new(),
            request_timeout_secs: default_request_timeout_secs(),
            store_url: None,
            locales: default_locales(),
        }
    }
}

impl ShiftConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Checks the offset, the locale list and every configured reporting
    /// period literal.
    pub fn validate(&self) -> Result<()> {
        validate_fiscal_year_offset(self.fiscal_year_offset_months)?;
        if self.locales.is_empty() {
            return Err(ShiftError::InvalidConfig(
                "at least one locale must be configured".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ShiftError::InvalidConfig(
                "request_timeout_secs must be positive".to_string(),
            ));
        }
        for (project, literal) in &self.projects {
            FiscalPeriod::parse(literal, self.fiscal_year_offset_months).map_err(|e| {
                ShiftError::InvalidConfig(format!("project '{}': {}", project, e))
            })?;
        }
        Ok(())
    }

    pub fn classifier(&self) -> PatternClassifier {
        PatternClassifier::for_locales(&self.locales)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ShiftConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}
