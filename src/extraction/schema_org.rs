//! schema.org `Recipe` extraction from JSON-LD
//!
//! Most recipe sites embed their data as a `<script type="application/ld+json">`
//! block describing a schema.org `Recipe`, either on its own, inside an array or
//! inside an `@graph` container.

use super::{
    DocumentFailure, ExtractionService, FailureKind, FieldFailure, FieldValue, ParsedDocument,
};
use crate::failures::Trace;
use crate::types::Field;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::{Map, Value};
use std::sync::LazyLock;

const JSON_LD_SELECTOR: &str = r#"script[type="application/ld+json"]"#;

#[allow(clippy::expect_used)]
static ISO_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^P(?:(\d+(?:\.\d+)?)D)?(?:T(?:(\d+(?:\.\d+)?)H)?(?:(\d+(?:\.\d+)?)M)?(?:(\d+(?:\.\d+)?)S)?)?$",
    )
    .expect("duration pattern is valid")
});

/// Extraction service reading schema.org JSON-LD
#[derive(Debug, Clone)]
pub struct SchemaOrgExtractor {
    version: String,
}

impl SchemaOrgExtractor {
    /// Create an extractor reporting the crate version
    pub fn new() -> Self {
        Self {
            version: concat!("schema-org/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    /// Create an extractor reporting a custom version string
    pub fn with_version(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }
}

impl Default for SchemaOrgExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractionService for SchemaOrgExtractor {
    fn version(&self) -> &str {
        &self.version
    }

    fn parse(
        &self,
        url: &str,
        document: &[u8],
    ) -> Result<Box<dyn ParsedDocument>, DocumentFailure> {
        let html = Html::parse_document(&String::from_utf8_lossy(document));
        let selector = Selector::parse(JSON_LD_SELECTOR).map_err(|e| DocumentFailure::Unparseable {
            message: format!("invalid selector: {}", e),
            trace: Trace::capture("SchemaOrgExtractor::parse"),
        })?;

        let mut malformed = None;
        let mut blocks = 0;
        for script in html.select(&selector) {
            blocks += 1;
            let text: String = script.text().collect();
            match serde_json::from_str::<Value>(&text) {
                Ok(value) => {
                    if let Some(recipe) = find_recipe(&value) {
                        return Ok(Box::new(SchemaOrgRecipe {
                            host: site_host(url),
                            recipe: recipe.clone(),
                        }));
                    }
                }
                Err(e) => {
                    tracing::debug!(url = %url, error = %e, "malformed JSON-LD block");
                    malformed.get_or_insert(e);
                }
            }
        }

        match malformed {
            Some(e) => Err(DocumentFailure::Unparseable {
                message: format!("malformed JSON-LD: {}", e),
                trace: Trace::capture("SchemaOrgExtractor::parse"),
            }),
            None if blocks == 0 => Err(DocumentFailure::Unsupported(
                "no JSON-LD data found".to_string(),
            )),
            None => Err(DocumentFailure::Unsupported(
                "no schema.org Recipe in JSON-LD data".to_string(),
            )),
        }
    }
}

fn is_recipe(object: &Map<String, Value>) -> bool {
    match object.get("@type") {
        Some(Value::String(t)) => t == "Recipe",
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some("Recipe")),
        _ => false,
    }
}

fn find_recipe(value: &Value) -> Option<&Map<String, Value>> {
    match value {
        Value::Object(object) if is_recipe(object) => Some(object),
        Value::Object(object) => object.get("@graph").and_then(find_recipe),
        Value::Array(items) => items.iter().find_map(find_recipe),
        _ => None,
    }
}

fn site_host(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_string())
}

/// Parse an ISO 8601 duration (`PT1H30M`, `P1DT2H`) into minutes
fn iso_duration_minutes(s: &str) -> Option<f64> {
    let caps = ISO_DURATION.captures(s.trim())?;
    // `P` and `PT` alone match the pattern but carry no component
    if (1..=4).all(|i| caps.get(i).is_none()) {
        return None;
    }
    let part = |i: usize| -> f64 {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .unwrap_or(0.0)
    };
    Some((part(1) * 1440.0 + part(2) * 60.0 + part(3) + part(4) / 60.0).round())
}

struct SchemaOrgRecipe {
    host: Option<String>,
    recipe: Map<String, Value>,
}

impl SchemaOrgRecipe {
    fn property(&self, key: &str) -> Result<&Value, FieldFailure> {
        match self.recipe.get(key) {
            None | Some(Value::Null) => Err(FieldFailure::new(
                FailureKind::SchemaMissing,
                "SchemaOrgRecipe::property",
                format!("schema.org Recipe has no '{}'", key),
            )),
            Some(value) if is_empty(value) => Err(FieldFailure::new(
                FailureKind::ElementMissing,
                "SchemaOrgRecipe::property",
                format!("'{}' is empty", key),
            )),
            Some(value) => Ok(value),
        }
    }

    fn ingredients(&self) -> Result<FieldValue, FieldFailure> {
        let value = self
            .property("recipeIngredient")
            .or_else(|_| self.property("ingredients"))
            .map_err(|f| f.within("SchemaOrgRecipe::ingredients"))?;
        match value {
            Value::String(s) => Ok(FieldValue::Text(s.clone())),
            Value::Array(items) => Ok(FieldValue::List(strings(items, "SchemaOrgRecipe::ingredients")?)),
            other => Err(type_mismatch("SchemaOrgRecipe::ingredients", "recipeIngredient", other)),
        }
    }

    fn instructions(&self) -> Result<FieldValue, FieldFailure> {
        let value = self
            .property("recipeInstructions")
            .map_err(|f| f.within("SchemaOrgRecipe::instructions"))?;
        match value {
            Value::String(s) => Ok(FieldValue::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => {
                let mut steps = Vec::new();
                collect_steps(value, &mut steps)?;
                Ok(FieldValue::List(steps))
            }
            other => Err(type_mismatch("SchemaOrgRecipe::instructions", "recipeInstructions", other)),
        }
    }

    fn text(&self, key: &str) -> Result<FieldValue, FieldFailure> {
        match self.property(key).map_err(|f| f.within("SchemaOrgRecipe::text"))? {
            Value::String(s) => Ok(FieldValue::Text(s.clone())),
            other => Err(type_mismatch("SchemaOrgRecipe::text", key, other)),
        }
    }

    fn total_time(&self) -> Result<FieldValue, FieldFailure> {
        match self
            .property("totalTime")
            .map_err(|f| f.within("SchemaOrgRecipe::total_time"))?
        {
            Value::Number(n) => Ok(FieldValue::Number(n.as_f64().unwrap_or(0.0))),
            Value::String(s) => iso_duration_minutes(s).map(FieldValue::Number).ok_or_else(|| {
                FieldFailure::new(
                    FailureKind::TypeMismatch,
                    "SchemaOrgRecipe::total_time",
                    format!("'{}' is not an ISO 8601 duration", s),
                )
            }),
            other => Err(type_mismatch("SchemaOrgRecipe::total_time", "totalTime", other)),
        }
    }

    fn yields(&self) -> Result<FieldValue, FieldFailure> {
        let value = self
            .property("recipeYield")
            .map_err(|f| f.within("SchemaOrgRecipe::yields"))?;
        let value = match value {
            Value::Array(items) => items.first().unwrap_or(value),
            other => other,
        };
        match value {
            Value::Number(n) => Ok(FieldValue::Text(format!("{} servings", n))),
            Value::String(s) if s.trim().chars().all(|c| c.is_ascii_digit()) && !s.trim().is_empty() => {
                Ok(FieldValue::Text(format!("{} servings", s.trim())))
            }
            Value::String(s) => Ok(FieldValue::Text(s.clone())),
            other => Err(type_mismatch("SchemaOrgRecipe::yields", "recipeYield", other)),
        }
    }

    fn image(&self) -> Result<FieldValue, FieldFailure> {
        let value = self
            .property("image")
            .map_err(|f| f.within("SchemaOrgRecipe::image"))?;
        let value = match value {
            Value::Array(items) => items.first().unwrap_or(value),
            other => other,
        };
        match value {
            Value::String(s) => Ok(FieldValue::Text(s.clone())),
            Value::Object(object) => match object.get("url") {
                Some(Value::String(s)) => Ok(FieldValue::Text(s.clone())),
                _ => Err(FieldFailure::new(
                    FailureKind::ElementMissing,
                    "SchemaOrgRecipe::image",
                    "ImageObject has no url",
                )),
            },
            other => Err(type_mismatch("SchemaOrgRecipe::image", "image", other)),
        }
    }

    fn nutrients(&self) -> Result<FieldValue, FieldFailure> {
        match self
            .property("nutrition")
            .map_err(|f| f.within("SchemaOrgRecipe::nutrients"))?
        {
            Value::Object(object) => Ok(FieldValue::Map(
                object
                    .iter()
                    .filter(|(k, _)| !k.starts_with('@'))
                    .filter_map(|(k, v)| scalar(v).map(|v| (k.clone(), v)))
                    .collect(),
            )),
            other => Err(type_mismatch("SchemaOrgRecipe::nutrients", "nutrition", other)),
        }
    }

    fn host(&self) -> Result<FieldValue, FieldFailure> {
        self.host.clone().map(FieldValue::Text).ok_or_else(|| {
            FieldFailure::new(
                FailureKind::ElementMissing,
                "SchemaOrgRecipe::host",
                "URL has no host",
            )
        })
    }
}

impl ParsedDocument for SchemaOrgRecipe {
    fn field(&self, field: Field) -> Result<FieldValue, FieldFailure> {
        let result = match field {
            Field::Ingredients => self.ingredients(),
            Field::Instructions => self.instructions(),
            Field::Title => self.text("name"),
            Field::TotalTime => self.total_time(),
            Field::Yields => self.yields(),
            Field::Host => self.host(),
            Field::Image => self.image(),
            Field::Nutrients => self.nutrients(),
        };
        result.map_err(|f| f.within("SchemaOrgRecipe::field"))
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(object) => object.is_empty(),
        _ => false,
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[track_caller]
fn type_mismatch(function: &str, key: &str, found: &Value) -> FieldFailure {
    let found = match found {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    FieldFailure::new(
        FailureKind::TypeMismatch,
        function,
        format!("unexpected {} for '{}'", found, key),
    )
}

fn strings(items: &[Value], function: &str) -> Result<Vec<String>, FieldFailure> {
    items
        .iter()
        .map(|item| scalar(item).ok_or_else(|| type_mismatch(function, "list item", item)))
        .collect()
}

/// Flatten `HowToStep` / `HowToSection` structures into step texts
fn collect_steps(value: &Value, steps: &mut Vec<String>) -> Result<(), FieldFailure> {
    match value {
        Value::String(s) => steps.push(s.clone()),
        Value::Array(items) => {
            for item in items {
                collect_steps(item, steps)?;
            }
        }
        Value::Object(object) => {
            if let Some(Value::String(text)) = object.get("text") {
                steps.push(text.clone());
            } else if let Some(items) = object.get("itemListElement") {
                collect_steps(items, steps)?;
            } else {
                return Err(FieldFailure::new(
                    FailureKind::TypeMismatch,
                    "collect_steps",
                    "instruction step has neither text nor itemListElement",
                ));
            }
        }
        other => return Err(type_mismatch("collect_steps", "recipeInstructions", other)),
    }
    Ok(())
}
