use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;

use anyhow::Error as AnyhowError;
use serde::{Deserialize, Serialize};
use serde_json::{error::Category, Error as SerdeJsonError};
use sqlx::{error::ErrorKind, Error as SqlxError};
use std::io::Error as IoError;
use ts_rs::TS;

/// Error shape shared by the store, the version manager and the UI bindings.
///
/// `code` is an `AREA/REASON` string (`VERSIONS/NOT_FOUND`, `SQLITE/UNIQUE`)
/// the UI maps to localized text; `message` is the English fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AppError {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    #[ts(type = "Record<string, string>")]
    pub context: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub cause: Option<Box<AppError>>,
}

pub type AppResult<T> = std::result::Result<T, AppError>;

impl AppError {
    pub const UNKNOWN_CODE: &'static str = "APP/UNKNOWN";
    pub const GENERIC_CODE: &'static str = "APP/GENERIC";

    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        AppError {
            code: code.into(),
            message: message.into(),
            context: HashMap::new(),
            cause: None,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> &HashMap<String, String> {
        &self.context
    }

    pub fn cause(&self) -> Option<&AppError> {
        self.cause.as_deref()
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_cause(mut self, cause: impl Into<AppError>) -> Self {
        self.cause = Some(Box::new(cause.into()));
        self
    }

    /// Walks the cause chain and reports whether any link carries `code`.
    pub fn has_code(&self, code: &str) -> bool {
        let mut current = Some(self);
        while let Some(err) = current {
            if err.code == code {
                return true;
            }
            current = err.cause();
        }
        false
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.context.is_empty() {
            write!(f, "[{}] {}", self.code, self.message)
        } else {
            write!(f, "[{}] {} ({:?})", self.code, self.message, self.context)
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

impl From<&str> for AppError {
    fn from(message: &str) -> Self {
        AppError::new(AppError::GENERIC_CODE, message)
    }
}

impl From<String> for AppError {
    fn from(message: String) -> Self {
        AppError::new(AppError::GENERIC_CODE, message)
    }
}

/// Outermost context becomes the error; inner links become nested causes.
/// An `AppError` found in the chain is kept whole, with its own causes.
impl From<AnyhowError> for AppError {
    fn from(error: AnyhowError) -> Self {
        let mut links: Vec<&(dyn StdError + 'static)> = Vec::new();
        for link in error.chain() {
            links.push(link);
            if link.is::<AppError>() {
                break;
            }
        }

        links.into_iter().rev().fold(None, |cause: Option<AppError>, link| {
            let node = match link.downcast_ref::<AppError>() {
                Some(app) => app.clone(),
                None => AppError::new(AppError::UNKNOWN_CODE, link.to_string()),
            };
            Some(match cause {
                Some(cause) => node.with_cause(cause),
                None => node,
            })
        })
        .unwrap_or_else(|| AppError::new(AppError::UNKNOWN_CODE, error.to_string()))
    }
}

impl From<IoError> for AppError {
    fn from(error: IoError) -> Self {
        let app_error = AppError::new(format!("IO/{:?}", error.kind()), error.to_string());
        match error.raw_os_error() {
            Some(os_code) => app_error.with_context("os_code", os_code.to_string()),
            None => app_error,
        }
    }
}

impl From<SerdeJsonError> for AppError {
    fn from(error: SerdeJsonError) -> Self {
        let code = match error.classify() {
            Category::Io => "JSON/IO",
            Category::Syntax => "JSON/SYNTAX",
            Category::Data => "JSON/DATA",
            Category::Eof => "JSON/EOF",
        };
        let mut app_error = AppError::new(code, error.to_string());
        if error.line() > 0 {
            app_error = app_error
                .with_context("line", error.line().to_string())
                .with_context("column", error.column().to_string());
        }
        app_error
    }
}

fn database_error(db: &dyn sqlx::error::DatabaseError) -> AppError {
    let code = match db.kind() {
        ErrorKind::UniqueViolation => "SQLITE/UNIQUE".to_string(),
        ErrorKind::ForeignKeyViolation => "SQLITE/FOREIGN_KEY".to_string(),
        ErrorKind::NotNullViolation => "SQLITE/NOT_NULL".to_string(),
        ErrorKind::CheckViolation => "SQLITE/CHECK".to_string(),
        _ => db
            .code()
            .map(|code| format!("SQLITE/{code}"))
            .unwrap_or_else(|| "SQLX/DATABASE".to_string()),
    };
    let app_error = AppError::new(code, db.message());
    match db.constraint() {
        Some(constraint) => app_error.with_context("constraint", constraint),
        None => app_error,
    }
}

impl From<SqlxError> for AppError {
    fn from(error: SqlxError) -> Self {
        match error {
            SqlxError::Database(db) => database_error(db.as_ref()),
            SqlxError::Io(err) => AppError::from(err).with_context("source", "sqlx"),
            SqlxError::RowNotFound => AppError::new("SQLX/ROW_NOT_FOUND", "Record not found"),
            SqlxError::PoolTimedOut | SqlxError::PoolClosed => {
                AppError::new("SQLX/POOL", "Database connection unavailable")
            }
            SqlxError::ColumnDecode { index, source } => {
                AppError::new("SQLX/COLUMN_DECODE", source.to_string())
                    .with_context("column", index.to_string())
            }
            other => AppError::new("SQLX/ERROR", other.to_string()),
        }
    }
}
