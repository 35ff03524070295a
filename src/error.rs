use thiserror::Error;

/// Errors raised while loading, shaping or exporting dashboard data.
///
/// The web layer never propagates these to the user verbatim: a failed load
/// becomes a generic banner and a missing column disables one section.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("failed to fetch sheet `{sheet}`: {reason}")]
    Fetch { sheet: String, reason: String },

    #[error("sheet `{0}` is empty")]
    EmptySheet(String),

    #[error("failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("required column not found: {0}")]
    MissingColumn(&'static str),

    #[error("chart rendering failed: {0}")]
    Chart(String),

    #[error("export failed: {0}")]
    Export(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, DashboardError>;
