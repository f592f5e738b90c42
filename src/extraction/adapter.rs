//! Drives an [`ExtractionService`] over every field of a document

use super::{DocumentFailure, ExtractionService, FailureKind, FieldValue};
use crate::failures::FailureIndex;
use crate::types::{Field, FieldTier, NA, Record, RecordFields, RecordStatus};
use crate::utils::contains_alphanumeric;

// Essential and on-display fields log at error, metadata at warn
macro_rules! field_log {
    ($field:expr, $($arg:tt)+) => {
        match $field.tier() {
            FieldTier::Metadata => tracing::warn!($($arg)+),
            FieldTier::Essential | FieldTier::OnDisplay => tracing::error!($($arg)+),
        }
    };
}

fn capitalized(field: Field) -> String {
    let name = field.display_name();
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => name,
    }
}

fn render_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn render_pairs(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}: {}", k, v))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Convert a raw service value into the stored string for `field`
///
/// Values without any letter or digit, blank values, `0` and the literal
/// `None` become [`NA`].
pub fn normalize(field: Field, value: FieldValue) -> String {
    let mut unexpected_type = None;

    let text = match value {
        FieldValue::Missing => String::new(),
        FieldValue::Number(n) if n == 0.0 => String::new(),
        FieldValue::Number(n) => render_number(n),
        FieldValue::Text(s) => match field {
            Field::Instructions => s.replace("\n\n", "\n").replace("\n,", "\n"),
            _ => s,
        },
        FieldValue::List(items) => match field {
            // A string that was split into characters is put back together
            Field::Ingredients if items.iter().all(|c| c.chars().count() < 2) => items
                .iter()
                .map(|c| match c.as_str() {
                    "" => " ",
                    "," => "\n",
                    other => other,
                })
                .collect(),
            Field::Ingredients | Field::Instructions => items.join("\n"),
            _ => {
                unexpected_type = Some("list");
                items.join(", ")
            }
        },
        FieldValue::Map(pairs) => {
            if field != Field::Nutrients {
                unexpected_type = Some("map");
            }
            render_pairs(&pairs)
        }
    };

    if !contains_alphanumeric(&text) || text.trim().is_empty() || text == "None" {
        field_log!(field, field = %field, "{} contains nothing", capitalized(field));
        return NA.to_string();
    }
    if let Some(kind) = unexpected_type {
        field_log!(field, field = %field, "'{}' has the unhandled type {}", field, kind);
    }
    text
}

/// Extract a record from a fetched document
///
/// Every field is extracted independently. Failed fields become [`NA`]; all
/// failures except [`FailureKind::NotImplemented`] are added to `failures`.
/// A document the service cannot handle yields an [`RecordStatus::Unknown`]
/// placeholder.
pub fn extract(
    url: &str,
    document: &[u8],
    service: &dyn ExtractionService,
    failures: &FailureIndex,
) -> Record {
    let version = service.version();

    let parsed = match service.parse(url, document) {
        Ok(parsed) => parsed,
        Err(DocumentFailure::Unsupported(reason)) => {
            tracing::warn!(url = %url, reason = %reason, "website not supported");
            return Record::placeholder(url, RecordStatus::Unknown, version);
        }
        Err(DocumentFailure::Unparseable { message, trace }) => {
            tracing::error!(url = %url, error = %message, "parsing error");
            failures.record(
                url,
                None,
                FailureKind::Unparseable,
                message,
                trace.within("extract"),
            );
            return Record::placeholder(url, RecordStatus::Unknown, version);
        }
    };

    tracing::info!(url = %url, "parsing document");
    let mut fields = RecordFields::default();
    for field in Field::ALL {
        let value = match parsed.field(field) {
            Ok(value) => normalize(field, value),
            Err(failure) if !failure.kind.is_recorded() => {
                field_log!(field, field = %field, "{} not implemented for this website", capitalized(field));
                NA.to_string()
            }
            Err(failure) => {
                field_log!(field, field = %field, error = %failure, "No {} found", field.display_name());
                let failure = failure.within("extract");
                failures.record(url, Some(field), failure.kind, failure.message, failure.trace);
                NA.to_string()
            }
        };
        fields.set(field, value);
    }

    let record = Record::parsed(url, fields, version);
    tracing::info!(url = %url, status = %record.status, "extracted record");
    record
}
