use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShiftError {
    #[error("Unsupported period format '{format}' for period type '{period_type}' (table: {}, article: {})",
        or_dash(.table_id), or_dash(.article_id))]
    UnsupportedFormat {
        period_type: String,
        format: String,
        table_id: Option<String>,
        article_id: Option<String>,
    },

    #[error("Unknown date format tag: {0}")]
    UnknownFormatTag(String),

    #[error("Unknown period type: {0}")]
    UnknownPeriodType(String),

    #[error("Invalid reporting period '{0}': expected q119, ar23, mr0424 or yyyy-MM-dd")]
    InvalidReportingPeriod(String),

    #[error("No reporting period configured for project: {0}")]
    UnknownProject(String),

    #[error("Date marker '{text}' is missing its {field} fragment")]
    MissingFragment { field: &'static str, text: String },

    #[error("Date calculation error: {0}")]
    DateError(String),

    #[error("Invalid fact period '{0}': expected yyyyMMdd or yyyyMMdd_yyyyMMdd")]
    InvalidPeriodString(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Mapping store error: {0}")]
    Store(String),

    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

fn or_dash(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}

pub type Result<T> = std::result::Result<T, ShiftError>;
