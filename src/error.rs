use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XLSX write error: {0}")]
    XlsxWrite(#[from] rust_xlsxwriter::XlsxError),
}

impl AppError {
    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::Conflict(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    /// Stable wire code reported in the `error.code` field of a response.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Validation(_) => "validation_failed",
            AppError::MissingColumns(_) => "missing_columns",
            AppError::Db(_) => "db_query_failed",
            AppError::Io(_) => "io_failed",
            AppError::XlsxWrite(_) => "xlsx_write_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::MissingColumns(cols) => Some(serde_json::json!({ "missing": cols })),
            _ => None,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
