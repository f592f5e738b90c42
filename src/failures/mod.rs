//! Extraction failure clustering
//!
//! Field-level extraction failures are collected per run in a [`FailureIndex`],
//! grouped by host, extraction method and failure kind. At the end of a run each
//! group becomes one [`FailureReport`] whose stack traces share their common
//! leading frames (see [`traceback`]).
//!
//! Network failures never end up here: an unreachable site is not a bug in the
//! extraction service.

use crate::extraction::FailureKind;
use crate::types::Field;
use crate::utils::host_of;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::Location;
use std::sync::{Mutex, PoisonError};

pub mod report;
pub mod traceback;

pub use report::{build_reports, write_reports, FailureReport};

/// Method name used for failures that did not come from a single field
pub const GENERAL_PARSING_ERROR: &str = "general parsing error";

/// One call site in a [`Trace`]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Frame {
    /// Function (or method path) executing at this site
    pub function: String,
    /// Source file of the call site
    pub file: String,
    /// Line of the call site
    pub line: u32,
}

impl Frame {
    /// Frame for the caller's location
    #[track_caller]
    pub fn here(function: impl Into<String>) -> Self {
        let location = Location::caller();
        Self {
            function: function.into(),
            file: location.file().to_string(),
            line: location.line(),
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at {} ({}:{})", self.function, self.file, self.line)
    }
}

/// Call sites leading to a failure, outermost first
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Trace {
    /// Frames, `frames[0]` is the outermost call
    pub frames: Vec<Frame>,
}

impl Trace {
    /// Start a trace at the caller's location
    #[track_caller]
    pub fn capture(function: impl Into<String>) -> Self {
        Self {
            frames: vec![Frame::here(function)],
        }
    }

    /// Add the caller's location as the new outermost frame
    #[track_caller]
    pub fn within(mut self, function: impl Into<String>) -> Self {
        self.frames.insert(0, Frame::here(function));
        self
    }

    /// Number of frames
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the trace has no frames
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// A failed extraction on one URL
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsingFailure {
    /// URL of the document being extracted
    pub url: String,
    /// What went wrong
    pub kind: FailureKind,
    /// Message from the extraction service
    pub message: String,
    /// Where it went wrong
    pub trace: Trace,
}

/// Failures that share host, method and kind
#[derive(Clone, Debug)]
pub struct FailureCluster {
    /// Host the failing URLs belong to
    pub host: String,
    /// Field whose extraction failed, `None` for document-level failures
    pub method: Option<Field>,
    /// Failure kind
    pub kind: FailureKind,
    /// Failures in the order they were recorded
    pub failures: Vec<ParsingFailure>,
}

impl FailureCluster {
    /// Method name as shown in reports
    pub fn method_name(&self) -> String {
        method_name(self.method)
    }
}

/// Method name for a failure site
pub fn method_name(method: Option<Field>) -> String {
    match method {
        Some(field) => field.display_name(),
        None => GENERAL_PARSING_ERROR.to_string(),
    }
}

// host -> method -> kind -> failures
type Clusters =
    BTreeMap<String, BTreeMap<Option<Field>, BTreeMap<FailureKind, Vec<ParsingFailure>>>>;

/// Run-scoped collection of extraction failures
///
/// Shared between fetch workers; every method takes `&self`.
#[derive(Debug, Default)]
pub struct FailureIndex {
    clusters: Mutex<Clusters>,
}

impl FailureIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure under the URL's host, the failing method and the kind
    ///
    /// `method` is `None` when the document as a whole could not be parsed.
    pub fn record(
        &self,
        url: &str,
        method: Option<Field>,
        kind: FailureKind,
        message: impl Into<String>,
        trace: Trace,
    ) -> ParsingFailure {
        let host = host_of(url);
        if host == url {
            tracing::warn!(url = %url, "could not extract host");
        }

        let failure = ParsingFailure {
            url: url.to_string(),
            kind,
            message: message.into(),
            trace,
        };

        let mut clusters = self.clusters.lock().unwrap_or_else(PoisonError::into_inner);
        clusters
            .entry(host)
            .or_default()
            .entry(method)
            .or_default()
            .entry(kind)
            .or_default()
            .push(failure.clone());

        failure
    }

    /// Total number of recorded failures
    pub fn len(&self) -> usize {
        let clusters = self.clusters.lock().unwrap_or_else(PoisonError::into_inner);
        clusters
            .values()
            .flat_map(BTreeMap::values)
            .flat_map(BTreeMap::values)
            .map(Vec::len)
            .sum()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy out all clusters, ordered by host, method and kind
    pub fn clusters(&self) -> Vec<FailureCluster> {
        let clusters = self.clusters.lock().unwrap_or_else(PoisonError::into_inner);
        let mut out = Vec::new();
        for (host, methods) in clusters.iter() {
            for (method, kinds) in methods {
                for (kind, failures) in kinds {
                    out.push(FailureCluster {
                        host: host.clone(),
                        method: *method,
                        kind: *kind,
                        failures: failures.clone(),
                    });
                }
            }
        }
        out
    }

    /// Drop everything recorded so far
    pub fn clear(&self) {
        self.clusters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
