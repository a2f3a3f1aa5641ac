use serde::{Deserialize, Serialize};

/// Where in the document a log entry or error originates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub fact_id: Option<String>,
    pub table_id: Option<String>,
    pub article_id: Option<String>,
}

impl SourceLocation {
    pub fn table(table_id: Option<String>, article_id: Option<String>) -> Self {
        Self {
            fact_id: None,
            table_id,
            article_id,
        }
    }

    pub fn with_fact(&self, fact_id: &str) -> Self {
        Self {
            fact_id: Some(fact_id.to_string()),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    #[serde(flatten)]
    pub location: SourceLocation,
}

/// Collects typed log entries for one shift run and mirrors each of them to
/// the `log` facade.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<LogEntry>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn debug(&mut self, location: &SourceLocation, message: impl Into<String>) {
        self.push(LogLevel::Debug, location, message.into());
    }

    pub fn warn(&mut self, location: &SourceLocation, message: impl Into<String>) {
        self.push(LogLevel::Warning, location, message.into());
    }

    pub fn error(&mut self, location: &SourceLocation, message: impl Into<String>) {
        self.push(LogLevel::Error, location, message.into());
    }

    fn push(&mut self, level: LogLevel, location: &SourceLocation, message: String) {
        let place = describe_location(location);
        match level {
            LogLevel::Debug => log::debug!("{}{}", place, message),
            LogLevel::Warning => log::warn!("{}{}", place, message),
            LogLevel::Error => log::error!("{}{}", place, message),
        }
        self.entries.push(LogEntry {
            level,
            message,
            location: location.clone(),
        });
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn count(&self, level: LogLevel) -> usize {
        self.entries.iter().filter(|e| e.level == level).count()
    }

    pub fn has_errors(&self) -> bool {
        self.count(LogLevel::Error) > 0
    }

    pub fn into_entries(self) -> Vec<LogEntry> {
        self.entries
    }
}

fn describe_location(location: &SourceLocation) -> String {
    let parts: Vec<String> = [
        location.article_id.as_ref().map(|id| format!("article {}", id)),
        location.table_id.as_ref().map(|id| format!("table {}", id)),
        location.fact_id.as_ref().map(|id| format!("fact {}", id)),
    ]
    .into_iter()
    .flatten()
    .collect();

    if parts.is_empty() {
        String::new()
    } else {
        format!("[{}] ", parts.join(", "))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftCounts {
    /// Fact markers found in the document, duplicates included.
    pub found: usize,
    pub unique: usize,
    /// Facts with an internal mapping entry that were examined.
    pub investigated: usize,
    pub shifted: usize,
    pub unchanged: usize,
    pub rejected: usize,
    pub failed_writes: usize,
}

/// Outcome of a shift run. Always produced, whether the run succeeded or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftReport {
    pub success: bool,
    pub message: String,
    pub counts: ShiftCounts,
    pub debug: Vec<LogEntry>,
    pub warnings: Vec<LogEntry>,
    pub errors: Vec<LogEntry>,
}

impl ShiftReport {
    pub fn new(success: bool, message: impl Into<String>, counts: ShiftCounts, diagnostics: Diagnostics) -> Self {
        let mut debug = Vec::new();
        let mut warnings = Vec::new();
        let mut errors = Vec::new();
        for entry in diagnostics.into_entries() {
            match entry.level {
                LogLevel::Debug => debug.push(entry),
                LogLevel::Warning => warnings.push(entry),
                LogLevel::Error => errors.push(entry),
            }
        }
        Self {
            success,
            message: message.into(),
            counts,
            debug,
            warnings,
            errors,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
