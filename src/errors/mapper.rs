//! Classification of failed exchanges into the error taxonomy.

use super::{NationBuilderError, NationBuilderErrorKind, ServiceErrorDetails};
use crate::transport::HttpResponse;
use serde_json::Value;
use std::collections::BTreeSet;
use std::ops::RangeInclusive;

/// Status codes that always count as success.
pub const SUCCESSFUL_STATUSES: RangeInclusive<u16> = 200..=299;

/// Maps transport failures and HTTP responses onto [`NationBuilderErrorKind`]s.
///
/// A service-error envelope always wins over the status code: a 4xx/5xx body that
/// parses as `{code, message, ...}` becomes `Service`, never `Http`.
#[derive(Debug, Clone)]
pub struct ErrorMapper {
    successful_empty_statuses: BTreeSet<u16>,
}

impl Default for ErrorMapper {
    fn default() -> Self {
        Self::new([204])
    }
}

impl ErrorMapper {
    /// Creates a mapper with the given "successful empty response" statuses.
    pub fn new(successful_empty_statuses: impl IntoIterator<Item = u16>) -> Self {
        Self {
            successful_empty_statuses: successful_empty_statuses.into_iter().collect(),
        }
    }

    /// Returns true if the status belongs to the success set.
    pub fn is_successful(&self, status: u16) -> bool {
        SUCCESSFUL_STATUSES.contains(&status) || self.successful_empty_statuses.contains(&status)
    }

    /// Returns true if a response with this status may legitimately have no body.
    pub fn is_successful_empty(&self, status: u16) -> bool {
        self.successful_empty_statuses.contains(&status)
    }

    /// Normalizes an error raised before any response arrived.
    pub fn map_transport(&self, error: NationBuilderError) -> NationBuilderError {
        if error.kind() == NationBuilderErrorKind::Transport {
            return error;
        }
        let message = error.message().to_string();
        NationBuilderError::transport(message).with_cause(error)
    }

    /// Maps a response whose status is outside the success set.
    pub fn map_failure(&self, response: &HttpResponse, json: Option<&Value>) -> NationBuilderError {
        let retry_after = response
            .header("retry-after")
            .and_then(|v| v.trim().parse::<u64>().ok());

        let mut error = match json.and_then(ServiceErrorDetails::from_json) {
            Some(details) => NationBuilderError::new(
                NationBuilderErrorKind::Service,
                details.message.clone(),
            )
            .with_service_details(details),
            None => NationBuilderError::new(
                NationBuilderErrorKind::Http,
                format!("HTTP {} error", response.status),
            ),
        };
        error = error.with_status(response.status);
        if !response.body.is_empty() {
            error = error.with_body(response.body.clone());
        }
        if let Some(seconds) = retry_after {
            error = error.with_retry_after(seconds);
        }
        error
    }

    /// Maps a successful status whose body could not be used.
    ///
    /// Bodies that still carry the service envelope become `Service` errors.
    pub fn map_malformed_success(
        &self,
        response: &HttpResponse,
        json: Option<&Value>,
        reason: impl Into<String>,
    ) -> NationBuilderError {
        let error = match json.and_then(ServiceErrorDetails::from_json) {
            Some(details) => NationBuilderError::new(
                NationBuilderErrorKind::Service,
                details.message.clone(),
            )
            .with_service_details(details),
            None => NationBuilderError::invalid_response(reason),
        };
        error.with_status(response.status).with_body(response.body.clone())
    }
}
