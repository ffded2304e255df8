//! Terminal results of the registry pipeline.
//!
//! Every stage either passes its result on (`ControlFlow::Continue`) or stops
//! the pipeline with an [`Outcome`] (`ControlFlow::Break`).

use crate::fetch::{FetchError, FetchedResponse};
use http::StatusCode;
use modproxy_api::ModuleIdentifier;

pub const RESOURCE_NOT_FOUND: &str = "404 Resource Not Found";

/// Downstream cacheability of an outbound response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cacheability {
    /// Fully pinned content, never changes
    Immutable,
    /// May be cached but must be revalidated
    Revalidate,
    /// Must never be stored, e.g. anything derived from "latest"
    NoStore,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Redirect {
        status: StatusCode,
        location: String,
        warning: Option<String>,
        cache: Cacheability,
    },
    NotFound {
        message: String,
        warning: Option<String>,
    },
    BadRequest {
        message: String,
    },
    Content {
        id: ModuleIdentifier,
        response: FetchedResponse,
    },
    Json {
        body: serde_json::Value,
        cache: Cacheability,
    },
    UpstreamFailure {
        status: StatusCode,
        message: String,
    },
    MethodNotAllowed,
    /// Client went away before the origin answered
    Cancelled,
    /// Not a registry path; belongs to the website
    NotRegistry,
}

impl Outcome {
    /// `302 Found` that must not be cached downstream.
    pub fn found(location: impl Into<String>) -> Self {
        Outcome::Redirect {
            status: StatusCode::FOUND,
            location: location.into(),
            warning: None,
            cache: Cacheability::NoStore,
        }
    }

    /// `301 Moved Permanently`.
    pub fn moved(location: impl Into<String>) -> Self {
        Outcome::Redirect {
            status: StatusCode::MOVED_PERMANENTLY,
            location: location.into(),
            warning: None,
            cache: Cacheability::Revalidate,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Outcome::NotFound {
            message: message.into(),
            warning: None,
        }
    }

    pub fn resource_not_found() -> Self {
        Self::not_found(RESOURCE_NOT_FOUND)
    }

    pub fn with_warning(self, text: impl Into<String>) -> Self {
        match self {
            Outcome::Redirect {
                status,
                location,
                cache,
                ..
            } => Outcome::Redirect {
                status,
                location,
                warning: Some(text.into()),
                cache,
            },
            Outcome::NotFound { message, .. } => Outcome::NotFound {
                message,
                warning: Some(text.into()),
            },
            other => other,
        }
    }

    pub fn with_cache(self, cache: Cacheability) -> Self {
        match self {
            Outcome::Redirect {
                status,
                location,
                warning,
                ..
            } => Outcome::Redirect {
                status,
                location,
                warning,
                cache,
            },
            Outcome::Json { body, .. } => Outcome::Json { body, cache },
            other => other,
        }
    }

    pub fn upstream_status(status: StatusCode) -> Self {
        Outcome::UpstreamFailure {
            status: StatusCode::BAD_GATEWAY,
            message: format!("Origin responded with {}", status.as_u16()),
        }
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Redirect { .. } => "redirect",
            Outcome::NotFound { .. } => "not_found",
            Outcome::BadRequest { .. } => "bad_request",
            Outcome::Content { .. } => "content",
            Outcome::Json { .. } => "json",
            Outcome::UpstreamFailure { .. } => "upstream_failure",
            Outcome::MethodNotAllowed => "method_not_allowed",
            Outcome::Cancelled => "cancelled",
            Outcome::NotRegistry => "not_registry",
        }
    }
}

impl From<FetchError> for Outcome {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Cancelled => Outcome::Cancelled,
            FetchError::Exhausted { .. } => Outcome::UpstreamFailure {
                status: StatusCode::BAD_GATEWAY,
                message: "Failed to fetch from origin".to_string(),
            },
            FetchError::Decode { .. } => Outcome::UpstreamFailure {
                status: StatusCode::BAD_GATEWAY,
                message: "Origin returned malformed metadata".to_string(),
            },
        }
    }
}
