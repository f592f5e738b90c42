//! Record extraction
//!
//! The extraction service turns a fetched document into field values. It is
//! reached through the [`ExtractionService`] trait so the pipeline can run
//! against any implementation:
//!
//! - [`SchemaOrgExtractor`] - reads schema.org `Recipe` JSON-LD blocks
//! - test doubles that script every field outcome
//!
//! [`extract`] drives a service over all eight [`Field`]s, normalizes the values
//! and classifies the failures into the run's [`crate::failures::FailureIndex`].

use crate::failures::Trace;
use crate::types::Field;
use std::fmt;
use thiserror::Error;

pub mod adapter;
pub mod schema_org;

pub use adapter::{extract, normalize};
pub use schema_org::SchemaOrgExtractor;

/// Closed set of ways a field extraction can fail
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FailureKind {
    /// The service has no support for this field on this site
    NotImplemented,
    /// The structured data lacks the property
    SchemaMissing,
    /// The property is present but empty
    ElementMissing,
    /// The property has an unexpected shape
    TypeMismatch,
    /// The document could not be interpreted at all
    Unparseable,
}

impl FailureKind {
    /// Name shown in failure reports
    pub fn display_name(&self) -> &'static str {
        match self {
            FailureKind::NotImplemented => "NotImplementedForSite",
            FailureKind::SchemaMissing => "SchemaPropertyMissing",
            FailureKind::ElementMissing => "ElementNotFound",
            FailureKind::TypeMismatch => "UnexpectedType",
            FailureKind::Unparseable => "DocumentUnparseable",
        }
    }

    /// Whether failures of this kind go into the failure index
    ///
    /// A field the service does not implement for a site is a known
    /// limitation, not a bug.
    pub fn is_recorded(&self) -> bool {
        !matches!(self, FailureKind::NotImplemented)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Raw value returned by the extraction service for one field
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    /// The service returned nothing
    Missing,
    /// Plain text
    Text(String),
    /// A number (durations in minutes, servings)
    Number(f64),
    /// A list of strings (ingredients, instruction steps)
    List(Vec<String>),
    /// Ordered key/value pairs (nutrients)
    Map(Vec<(String, String)>),
}

/// Failure extracting one field
#[derive(Clone, Debug, Error)]
#[error("{kind}: {message}")]
pub struct FieldFailure {
    /// What went wrong
    pub kind: FailureKind,
    /// Service-provided detail
    pub message: String,
    /// Where it went wrong
    pub trace: Trace,
}

impl FieldFailure {
    /// Failure raised at the caller's location inside `function`
    #[track_caller]
    pub fn new(kind: FailureKind, function: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            trace: Trace::capture(function),
        }
    }

    /// Add the caller's location as the outermost frame
    #[track_caller]
    pub fn within(mut self, function: &str) -> Self {
        self.trace = self.trace.within(function);
        self
    }
}

/// Failure interpreting a whole document
#[derive(Clone, Debug, Error)]
pub enum DocumentFailure {
    /// The site is not supported by the service
    #[error("site not supported: {0}")]
    Unsupported(String),

    /// The document is supported in principle but could not be parsed
    #[error("document could not be parsed: {message}")]
    Unparseable {
        /// Service-provided detail
        message: String,
        /// Where it went wrong
        trace: Trace,
    },
}

/// A document the service has parsed, queried one field at a time
pub trait ParsedDocument: Send {
    /// Extract one field
    ///
    /// Fields are independent: a failure on one must not affect the others.
    fn field(&self, field: Field) -> Result<FieldValue, FieldFailure>;
}

/// The external extraction service
pub trait ExtractionService: Send + Sync {
    /// Version string stored with every record, used for staleness checks
    fn version(&self) -> &str;

    /// Parse a fetched document
    fn parse(&self, url: &str, document: &[u8])
    -> Result<Box<dyn ParsedDocument>, DocumentFailure>;
}
