//! # Error Handling for Grid Requests
//!
//! Every failure the compiler can raise is a [`GridError`]. The variants split into two
//! families:
//!
//! - **Request/configuration validation** (unknown columns, incomplete conditions,
//!   searching a resource without searchable columns). These are caller or integrator
//!   bugs, never retried, and map to `400 Bad Request`.
//! - **Store failures**, propagated unchanged from the [`DocumentStore`] except for a
//!   missing text index, which is recognised by its error code and re-raised as
//!   [`GridError::MissingSearchIndex`] with a remediation hint.
//!
//! Internal details of store errors are logged with `tracing` and never sent to clients:
//!
//! ```rust,ignore
//! async fn list(
//!     State(state): State<AppState>,
//!     Json(request): Json<GridRequest>,
//! ) -> Result<GridResponse, GridError> {
//!     state.filter.get_grid_response(&state.store, &request).await
//! }
//! ```
//!
//! [`DocumentStore`]: crate::database::DocumentStore

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::database::StoreError;

/// Errors raised while compiling or executing a grid request.
#[derive(Debug, Error)]
pub enum GridError {
    /// A filter condition references a column absent from the conditions map.
    #[error(
        "Column '{column}' cannot be used as condition! Have you forgotten to add it to '{resource}' conditions?"
    )]
    MissingConditionColumn { column: String, resource: String },

    /// A sortation references a column absent from the sortations map.
    #[error(
        "Column '{column}' cannot be used as sortation! Have you forgotten to add it to '{resource}' sortations?"
    )]
    MissingSortationColumn { column: String, resource: String },

    /// Search was requested but the resource has no usable searchable columns.
    ///
    /// `column` is set when a searchable column is missing from the conditions map.
    #[error("{}", missing_search_message(.column.as_deref(), .resource))]
    MissingSearchColumn {
        column: Option<String>,
        resource: String,
    },

    /// A condition lacks `column`, `operator`, or a `value` its operator needs.
    #[error("Advanced filter must have 'column', 'operator' and 'value' field!")]
    MissingAdvancedFilterRequiredField,

    /// The store refused a text search because the collection has no text index.
    #[error(
        "Column cannot be used for searching! Missing TEXT index on '{resource}' searchable columns!"
    )]
    MissingSearchIndex { resource: String },

    /// The resource's date format cannot render a date.
    #[error("Date format '{format}' is not a valid chrono format string")]
    InvalidDateFormat { format: String },

    /// Any other store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn missing_search_message(column: Option<&str>, resource: &str) -> String {
    match column {
        Some(column) => format!(
            "Column '{column}' cannot be used for searching! Have you forgotten to add it to '{resource}' conditions?"
        ),
        None => format!(
            "Column cannot be used for searching! Have you forgotten to add searchable columns to '{resource}'?"
        ),
    }
}

impl GridError {
    pub const MISSING_CONDITION_COLUMN: u16 = 1;
    pub const MISSING_SORTATION_COLUMN: u16 = 2;
    pub const MISSING_SEARCH_COLUMN: u16 = 3;
    pub const MISSING_ADVANCED_FILTER_REQUIRED_FIELD: u16 = 4;
    pub const MISSING_SEARCH_INDEX: u16 = 5;
    pub const INVALID_DATE_FORMAT: u16 = 6;
    pub const STORE_ERROR: u16 = 7;

    pub fn missing_condition_column(column: impl Into<String>, resource: impl Into<String>) -> Self {
        Self::MissingConditionColumn {
            column: column.into(),
            resource: resource.into(),
        }
    }

    pub fn missing_sortation_column(column: impl Into<String>, resource: impl Into<String>) -> Self {
        Self::MissingSortationColumn {
            column: column.into(),
            resource: resource.into(),
        }
    }

    pub fn missing_search_column(column: Option<&str>, resource: impl Into<String>) -> Self {
        Self::MissingSearchColumn {
            column: column.map(str::to_string),
            resource: resource.into(),
        }
    }

    /// Wrap a store error, recognising the "index not found" code raised by text search.
    #[must_use]
    pub fn from_store(err: StoreError, resource: &str) -> Self {
        if err.is_missing_index() {
            Self::MissingSearchIndex {
                resource: resource.to_string(),
            }
        } else {
            Self::Store(err)
        }
    }

    /// Stable numeric code for this error kind.
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::MissingConditionColumn { .. } => Self::MISSING_CONDITION_COLUMN,
            Self::MissingSortationColumn { .. } => Self::MISSING_SORTATION_COLUMN,
            Self::MissingSearchColumn { .. } => Self::MISSING_SEARCH_COLUMN,
            Self::MissingAdvancedFilterRequiredField => Self::MISSING_ADVANCED_FILTER_REQUIRED_FIELD,
            Self::MissingSearchIndex { .. } => Self::MISSING_SEARCH_INDEX,
            Self::InvalidDateFormat { .. } => Self::INVALID_DATE_FORMAT,
            Self::Store(_) => Self::STORE_ERROR,
        }
    }

    /// True for errors caused by the request itself.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MissingConditionColumn { .. }
                | Self::MissingSortationColumn { .. }
                | Self::MissingSearchColumn { .. }
                | Self::MissingAdvancedFilterRequiredField
        )
    }

    /// Get the HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    /// Get the user-facing error message (sanitized)
    fn user_message(&self) -> String {
        match self {
            Self::Store(_) => "A database error occurred".to_string(),
            other => other.to_string(),
        }
    }

    /// Log internal error details (not sent to user)
    fn log_internal(&self) {
        match self {
            Self::Store(err) => {
                tracing::error!(error = %err, code = ?err.code(), "Store error occurred");
            }
            Self::MissingSearchIndex { resource } | Self::InvalidDateFormat { format: resource } => {
                tracing::error!(details = %self, target_name = %resource, "Grid configuration error");
            }
            _ => {
                tracing::debug!(
                    error = %self,
                    status = %self.status_code(),
                    "Grid request rejected"
                );
            }
        }
    }
}

/// Error response sent to users (sanitized)
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: u16,
}

impl IntoResponse for GridError {
    fn into_response(self) -> Response {
        self.log_internal();

        let status = self.status_code();
        let body = ErrorResponse {
            error: self.user_message(),
            code: self.code(),
        };

        (status, Json(body)).into_response()
    }
}
