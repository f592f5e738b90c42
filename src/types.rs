//! Core types for recipe-harvest
//!
//! A [`Record`] is the structured result of extracting one URL's document. Its
//! [`RecordStatus`] is derived from which of the eight [`Field`]s could be
//! extracted and doubles as the cache signal used by [`crate::cache`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Error, Result};

/// Sentinel for any attribute whose value could not be extracted
pub const NA: &str = "N/A";

/// Number of extracted attributes on a [`Record`]
pub const FIELD_COUNT: usize = 8;

/// Completeness of a record, ranked from worst to best
///
/// The declaration order is the ranking: comparing two statuses with `<` asks
/// which one is less complete.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    /// No fetch attempt has been made yet
    #[default]
    NotInitialized,
    /// The site could not be reached (timeout, redirect loop, connection failure)
    Unreachable,
    /// The extraction service does not support the site
    Unknown,
    /// At least one essential field is missing
    IncompleteEssential,
    /// All essential fields present, an on-display field is missing
    IncompleteOnDisplay,
    /// All display fields present, a metadata field is missing
    CompleteOnDisplay,
    /// Every field present
    Complete,
}

impl RecordStatus {
    /// All statuses in rank order
    pub const ALL: [RecordStatus; 7] = [
        RecordStatus::NotInitialized,
        RecordStatus::Unreachable,
        RecordStatus::Unknown,
        RecordStatus::IncompleteEssential,
        RecordStatus::IncompleteOnDisplay,
        RecordStatus::CompleteOnDisplay,
        RecordStatus::Complete,
    ];

    /// Convert the stored ordinal to a status
    ///
    /// Unknown ordinals decode as [`RecordStatus::NotInitialized`], which forces a refetch.
    pub fn from_i32(status: i32) -> Self {
        match status {
            0 => RecordStatus::Unreachable,
            1 => RecordStatus::Unknown,
            2 => RecordStatus::IncompleteEssential,
            3 => RecordStatus::IncompleteOnDisplay,
            4 => RecordStatus::CompleteOnDisplay,
            5 => RecordStatus::Complete,
            _ => RecordStatus::NotInitialized,
        }
    }

    /// Convert the status to its stored ordinal
    pub fn to_i32(&self) -> i32 {
        match self {
            RecordStatus::NotInitialized => -1,
            RecordStatus::Unreachable => 0,
            RecordStatus::Unknown => 1,
            RecordStatus::IncompleteEssential => 2,
            RecordStatus::IncompleteOnDisplay => 3,
            RecordStatus::CompleteOnDisplay => 4,
            RecordStatus::Complete => 5,
        }
    }

    /// Whether a record with this status has enough data to be written out
    pub fn is_displayable(&self) -> bool {
        *self >= RecordStatus::IncompleteOnDisplay
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordStatus::NotInitialized => "NOT_INITIALIZED",
            RecordStatus::Unreachable => "UNREACHABLE",
            RecordStatus::Unknown => "UNKNOWN",
            RecordStatus::IncompleteEssential => "INCOMPLETE_ESSENTIAL",
            RecordStatus::IncompleteOnDisplay => "INCOMPLETE_ON_DISPLAY",
            RecordStatus::CompleteOnDisplay => "COMPLETE_ON_DISPLAY",
            RecordStatus::Complete => "COMPLETE",
        };
        f.write_str(name)
    }
}

// Stored as its ordinal
impl sqlx::Type<sqlx::Sqlite> for RecordStatus {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <i32 as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <i32 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for RecordStatus {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> std::result::Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.to_i32(), buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for RecordStatus {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> std::result::Result<Self, sqlx::error::BoxDynError> {
        let ordinal = <i32 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self::from_i32(ordinal))
    }
}

/// How much a field matters for a usable record
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldTier {
    /// Without it the record is useless
    Essential,
    /// Shown in the rendered output
    OnDisplay,
    /// Collected but not shown
    Metadata,
}

/// One extracted attribute of a record
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// Ingredient list, one per line
    Ingredients,
    /// Preparation steps, one per line
    Instructions,
    /// Recipe title
    Title,
    /// Total time in minutes
    TotalTime,
    /// Servings
    Yields,
    /// Host the recipe was published on
    Host,
    /// Image URL
    Image,
    /// Nutrient table, `key: value` per line
    Nutrients,
}

impl Field {
    /// All fields, essential first, then on-display, then metadata
    pub const ALL: [Field; FIELD_COUNT] = [
        Field::Ingredients,
        Field::Instructions,
        Field::Title,
        Field::TotalTime,
        Field::Yields,
        Field::Host,
        Field::Image,
        Field::Nutrients,
    ];

    /// Tier of this field
    pub fn tier(&self) -> FieldTier {
        match self {
            Field::Ingredients | Field::Instructions => FieldTier::Essential,
            Field::Title | Field::TotalTime | Field::Yields => FieldTier::OnDisplay,
            Field::Host | Field::Image | Field::Nutrients => FieldTier::Metadata,
        }
    }

    /// Column / method name of this field
    pub fn name(&self) -> &'static str {
        match self {
            Field::Ingredients => "ingredients",
            Field::Instructions => "instructions",
            Field::Title => "title",
            Field::TotalTime => "total_time",
            Field::Yields => "yields",
            Field::Host => "host",
            Field::Image => "image",
            Field::Nutrients => "nutrients",
        }
    }

    /// Name with underscores replaced by spaces, for log messages
    pub fn display_name(&self) -> String {
        self.name().replace('_', " ")
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The eight extracted attribute values of a record
///
/// Values are never absent: anything that could not be extracted holds [`NA`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFields {
    /// Ingredient list, one per line
    pub ingredients: String,
    /// Preparation steps, one per line
    pub instructions: String,
    /// Recipe title
    pub title: String,
    /// Total time in minutes
    pub total_time: String,
    /// Servings
    pub yields: String,
    /// Host the recipe was published on
    pub host: String,
    /// Image URL
    pub image: String,
    /// Nutrient table
    pub nutrients: String,
}

impl Default for RecordFields {
    fn default() -> Self {
        Self {
            ingredients: NA.to_string(),
            instructions: NA.to_string(),
            title: NA.to_string(),
            total_time: NA.to_string(),
            yields: NA.to_string(),
            host: NA.to_string(),
            image: NA.to_string(),
            nutrients: NA.to_string(),
        }
    }
}

impl RecordFields {
    /// Build from values ordered like [`Field::ALL`]
    ///
    /// Rejects lists whose length does not match the attribute count.
    pub fn from_values(values: Vec<String>) -> Result<Self> {
        let [ingredients, instructions, title, total_time, yields, host, image, nutrients] =
            <[String; FIELD_COUNT]>::try_from(values).map_err(|v| {
                Error::InvalidRecord(format!(
                    "expected {} attribute values, got {}",
                    FIELD_COUNT,
                    v.len()
                ))
            })?;
        Ok(Self {
            ingredients,
            instructions,
            title,
            total_time,
            yields,
            host,
            image,
            nutrients,
        })
    }

    /// Value of a single field
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Ingredients => &self.ingredients,
            Field::Instructions => &self.instructions,
            Field::Title => &self.title,
            Field::TotalTime => &self.total_time,
            Field::Yields => &self.yields,
            Field::Host => &self.host,
            Field::Image => &self.image,
            Field::Nutrients => &self.nutrients,
        }
    }

    /// Mutable access to a single field
    pub fn get_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Ingredients => &mut self.ingredients,
            Field::Instructions => &mut self.instructions,
            Field::Title => &mut self.title,
            Field::TotalTime => &mut self.total_time,
            Field::Yields => &mut self.yields,
            Field::Host => &mut self.host,
            Field::Image => &mut self.image,
            Field::Nutrients => &mut self.nutrients,
        }
    }

    /// Set a single field
    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        *self.get_mut(field) = value.into();
    }

    /// Whether the field holds the sentinel
    pub fn is_missing(&self, field: Field) -> bool {
        self.get(field) == NA
    }
}

/// Derive the completeness status of a set of extracted values
///
/// Returns the lowest status whose required fields are all present.
/// [`RecordStatus::Unreachable`] and [`RecordStatus::Unknown`] are never produced
/// here; they are assigned to URLs that never reach field extraction.
pub fn derive_status(fields: &RecordFields) -> RecordStatus {
    let missing_in = |tier: FieldTier| {
        Field::ALL
            .iter()
            .filter(|f| f.tier() == tier)
            .any(|f| fields.is_missing(*f))
    };

    if missing_in(FieldTier::Essential) {
        RecordStatus::IncompleteEssential
    } else if missing_in(FieldTier::OnDisplay) {
        RecordStatus::IncompleteOnDisplay
    } else if missing_in(FieldTier::Metadata) {
        RecordStatus::CompleteOnDisplay
    } else {
        RecordStatus::Complete
    }
}

/// Derive the status from values ordered like [`Field::ALL`]
///
/// Fails if the number of values does not match the attribute count.
pub fn derive_status_from_values(values: &[&str]) -> Result<RecordStatus> {
    let owned: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    Ok(derive_status(&RecordFields::from_values(owned)?))
}

/// One record per URL
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Unique key
    pub url: String,
    /// Extracted attribute values
    pub fields: RecordFields,
    /// Completeness of the extracted values
    pub status: RecordStatus,
    /// Version of the extraction service that produced this record
    pub extractor_version: String,
}

impl Record {
    /// Build a record from extracted values, deriving its status
    pub fn parsed(url: impl Into<String>, fields: RecordFields, extractor_version: &str) -> Self {
        let status = derive_status(&fields);
        Self {
            url: url.into(),
            fields,
            status,
            extractor_version: extractor_version.to_string(),
        }
    }

    /// Placeholder for a URL that never reached field extraction
    ///
    /// Used for [`RecordStatus::Unreachable`] and [`RecordStatus::Unknown`].
    pub fn placeholder(
        url: impl Into<String>,
        status: RecordStatus,
        extractor_version: &str,
    ) -> Self {
        Self {
            url: url.into(),
            fields: RecordFields::default(),
            status,
            extractor_version: extractor_version.to_string(),
        }
    }

    /// Title if present, else the URL
    pub fn display_title(&self) -> &str {
        if self.fields.is_missing(Field::Title) {
            &self.url
        } else {
            &self.fields.title
        }
    }
}

/// Run-scoped statistics, shared between workers
#[derive(Debug, Default)]
pub struct Counts {
    strings: AtomicUsize,
    urls: AtomicUsize,
    require_fetching: AtomicUsize,
    reached: AtomicUsize,
    parsed_successfully: AtomicUsize,
    parsed_partially: AtomicUsize,
}

impl Counts {
    /// Create empty counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Add to the number of candidate strings inspected
    pub fn add_strings(&self, n: usize) {
        self.strings.fetch_add(n, Ordering::Relaxed);
    }

    /// Add to the number of strings identified as URLs
    pub fn add_urls(&self, n: usize) {
        self.urls.fetch_add(n, Ordering::Relaxed);
    }

    /// Add to the number of URLs that need fetching
    pub fn add_require_fetching(&self, n: usize) {
        self.require_fetching.fetch_add(n, Ordering::Relaxed);
    }

    /// Count one site that answered
    pub fn inc_reached(&self) {
        self.reached.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a freshly extracted record by its status
    pub fn record_parsed(&self, status: RecordStatus) {
        match status {
            RecordStatus::IncompleteOnDisplay => {
                self.parsed_partially.fetch_add(1, Ordering::Relaxed);
            }
            RecordStatus::CompleteOnDisplay | RecordStatus::Complete => {
                self.parsed_successfully.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    /// Copy the current values
    pub fn snapshot(&self) -> CountsSnapshot {
        CountsSnapshot {
            strings: self.strings.load(Ordering::Relaxed),
            urls: self.urls.load(Ordering::Relaxed),
            require_fetching: self.require_fetching.load(Ordering::Relaxed),
            reached: self.reached.load(Ordering::Relaxed),
            parsed_successfully: self.parsed_successfully.load(Ordering::Relaxed),
            parsed_partially: self.parsed_partially.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`Counts`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountsSnapshot {
    /// Candidate strings inspected
    pub strings: usize,
    /// Strings identified as URLs
    pub urls: usize,
    /// URLs not yet (fully) cached
    pub require_fetching: usize,
    /// Sites that answered
    pub reached: usize,
    /// Records with all display fields
    pub parsed_successfully: usize,
    /// Records missing an on-display field
    pub parsed_partially: usize,
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

impl fmt::Display for CountsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[Absolute|Percentage of count above]")?;
        writeln!(f)?;
        writeln!(f, "Total number of strings: {}", self.strings)?;
        writeln!(
            f,
            "Identified as URLs: [{}|{:.2}%]",
            self.urls,
            percent(self.urls, self.strings)
        )?;
        writeln!(
            f,
            "URLs not yet (fully) saved: [{}|{:.2}%]",
            self.require_fetching,
            percent(self.require_fetching, self.urls)
        )?;
        writeln!(
            f,
            "URLs reached: [{}|{:.2}%]",
            self.reached,
            percent(self.reached, self.urls)
        )?;
        writeln!(
            f,
            "Recipes parsed partially: [{}|{:.2}%]",
            self.parsed_partially,
            percent(self.parsed_partially, self.urls)
        )?;
        writeln!(
            f,
            "Recipes parsed fully: [{}|{:.2}%]",
            self.parsed_successfully,
            percent(self.parsed_successfully, self.urls)
        )
    }
}
