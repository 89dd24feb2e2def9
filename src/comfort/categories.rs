//! Bound based classification of UTCI values into labels.
//!
//! A category document maps keys of the form `"lower, upper"` to labels, where
//! either bound may be `null` for an open end. A value belongs to an entry when
//! it lies above the lower bound and at or below the upper bound.

use crate::comfort::error::CategoryError;
use log::warn;
use ordered_float::OrderedFloat;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::OnceLock;

/// Label given to values that no entry covers.
pub const UNKNOWN_LABEL: &str = "unknown";

pub const STRESS_TABLE_KEY: &str = "STRESS_CATEGORIES";
pub const COMFORT_TABLE_KEY: &str = "COMFORT_RATINGS";

/// The built-in category document, also shipped as `config/categories.json`.
pub const DEFAULT_CATEGORIES_JSON: &str = include_str!("../../config/categories.json");

const DEFAULT_STRESS: [(Option<f64>, Option<f64>, &str); 10] = [
    (None, Some(-40.0), "extreme cold stress"),
    (Some(-40.0), Some(-27.0), "very strong cold stress"),
    (Some(-27.0), Some(-13.0), "strong cold stress"),
    (Some(-13.0), Some(0.0), "moderate cold stress"),
    (Some(0.0), Some(9.0), "slight cold stress"),
    (Some(9.0), Some(26.0), "no thermal stress"),
    (Some(26.0), Some(32.0), "moderate heat stress"),
    (Some(32.0), Some(38.0), "strong heat stress"),
    (Some(38.0), Some(46.0), "very strong heat stress"),
    (Some(46.0), None, "extreme heat stress"),
];

const DEFAULT_COMFORT: [(Option<f64>, Option<f64>, &str); 5] = [
    (None, Some(0.0), "cold stress"),
    (Some(0.0), Some(9.0), "comfort for short period"),
    (Some(9.0), Some(26.0), "comfort"),
    (Some(26.0), Some(28.0), "comfort for short period"),
    (Some(28.0), None, "heat stress"),
];

static GLOBAL_TABLES: OnceLock<CategoryTables> = OnceLock::new();

/// One labelled interval `(lower, upper]`. `None` leaves that end open.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryEntry {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub label: String,
}

impl CategoryEntry {
    pub fn contains(&self, value: f64) -> bool {
        self.lower.map_or(true, |lower| value > lower)
            && self.upper.map_or(true, |upper| value <= upper)
    }

    fn sort_key(&self) -> (OrderedFloat<f64>, OrderedFloat<f64>) {
        (
            OrderedFloat(self.lower.unwrap_or(f64::NEG_INFINITY)),
            OrderedFloat(self.upper.unwrap_or(f64::INFINITY)),
        )
    }
}

/// An ordered list of category entries.
///
/// Entries are kept in ascending order of lower bound (open first), ties broken
/// by upper bound, so lookups do not depend on the key order of the source
/// document. The first entry containing a value wins.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTable {
    entries: Vec<CategoryEntry>,
}

impl CategoryTable {
    /// Builds a table, rejecting entries whose interval is empty.
    ///
    /// Overlapping entries and gaps between them are allowed but logged.
    pub fn new(mut entries: Vec<CategoryEntry>) -> Result<Self, CategoryError> {
        for entry in &entries {
            if let (Some(lower), Some(upper)) = (entry.lower, entry.upper) {
                if lower >= upper {
                    return Err(CategoryError::InvertedBounds {
                        key: format_key(entry.lower, entry.upper),
                    });
                }
            }
        }
        entries.sort_by_key(CategoryEntry::sort_key);
        let table = CategoryTable { entries };
        for issue in table.coverage_issues() {
            warn!("Category table: {}", issue);
        }
        Ok(table)
    }

    /// Parses one table of a category document.
    pub fn from_json_map(map: &Map<String, Value>) -> Result<Self, CategoryError> {
        let mut entries = Vec::with_capacity(map.len());
        for (key, label) in map {
            let (lower, upper) = parse_key(key)?;
            let label = label
                .as_str()
                .ok_or_else(|| CategoryError::InvalidLabel { key: key.clone() })?;
            entries.push(CategoryEntry {
                lower,
                upper,
                label: label.to_string(),
            });
        }
        Self::new(entries)
    }

    fn from_defaults(defaults: &[(Option<f64>, Option<f64>, &str)]) -> Self {
        CategoryTable {
            entries: defaults
                .iter()
                .map(|(lower, upper, label)| CategoryEntry {
                    lower: *lower,
                    upper: *upper,
                    label: label.to_string(),
                })
                .collect(),
        }
    }

    pub fn entries(&self) -> &[CategoryEntry] {
        &self.entries
    }

    /// Label of the first entry containing `value`, or [`UNKNOWN_LABEL`].
    pub fn classify(&self, value: f64) -> &str {
        self.entries
            .iter()
            .find(|e| e.contains(value))
            .map_or(UNKNOWN_LABEL, |e| e.label.as_str())
    }

    /// Distinct labels in table order.
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            if !labels.contains(&entry.label.as_str()) {
                labels.push(&entry.label);
            }
        }
        labels
    }

    /// Overlaps and gaps between neighbouring entries.
    pub fn coverage_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        for pair in self.entries.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            let prev_upper = prev.upper.unwrap_or(f64::INFINITY);
            let next_lower = next.lower.unwrap_or(f64::NEG_INFINITY);
            if prev_upper > next_lower {
                issues.push(format!(
                    "'{}' {} overlaps '{}' {}",
                    prev.label,
                    format_key(prev.lower, prev.upper),
                    next.label,
                    format_key(next.lower, next.upper)
                ));
            } else if prev_upper < next_lower {
                issues.push(format!(
                    "values in ({}, {}] have no category",
                    prev_upper, next_lower
                ));
            }
        }
        issues
    }
}

/// The stress and comfort tables used to label UTCI values.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTables {
    pub stress: CategoryTable,
    pub comfort: CategoryTable,
}

impl CategoryTables {
    /// Parses a category document with `STRESS_CATEGORIES` and
    /// `COMFORT_RATINGS` tables.
    ///
    /// # Errors
    ///
    /// Fails on malformed JSON, a missing table, a key without exactly two
    /// bounds, an unreadable bound or an empty interval.
    pub fn from_json(document: &str) -> Result<Self, CategoryError> {
        let root: Map<String, Value> = serde_json::from_str(document)?;
        let table = |name: &str| -> Result<CategoryTable, CategoryError> {
            let map = root
                .get(name)
                .and_then(Value::as_object)
                .ok_or_else(|| CategoryError::MissingTable(name.to_string()))?;
            CategoryTable::from_json_map(map)
        };
        Ok(CategoryTables {
            stress: table(STRESS_TABLE_KEY)?,
            comfort: table(COMFORT_TABLE_KEY)?,
        })
    }

    /// Reads and parses a category document from disk.
    pub fn from_path(path: &Path) -> Result<Self, CategoryError> {
        let document = std::fs::read_to_string(path)
            .map_err(|e| CategoryError::Io(path.to_path_buf(), e))?;
        Self::from_json(&document)
    }

    /// The UTCI stress scale and the five step comfort rating.
    pub fn defaults() -> Self {
        CategoryTables {
            stress: CategoryTable::from_defaults(&DEFAULT_STRESS),
            comfort: CategoryTable::from_defaults(&DEFAULT_COMFORT),
        }
    }
}

impl Default for CategoryTables {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Installs the process-wide tables. Only the first call succeeds.
pub fn init_global(tables: CategoryTables) -> Result<(), CategoryError> {
    GLOBAL_TABLES
        .set(tables)
        .map_err(|_| CategoryError::AlreadyInitialised)
}

/// The process-wide tables, falling back to the defaults when none were
/// installed.
pub fn global() -> &'static CategoryTables {
    GLOBAL_TABLES.get_or_init(CategoryTables::defaults)
}

fn parse_key(key: &str) -> Result<(Option<f64>, Option<f64>), CategoryError> {
    let parts: Vec<&str> = key.split(',').collect();
    let [lower, upper] = parts.as_slice() else {
        return Err(CategoryError::BoundCount {
            key: key.to_string(),
        });
    };
    Ok((parse_bound(key, lower)?, parse_bound(key, upper)?))
}

fn parse_bound(key: &str, raw: &str) -> Result<Option<f64>, CategoryError> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("null") {
        return Ok(None);
    }
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(CategoryError::InvalidBound {
            key: key.to_string(),
            bound: raw.to_string(),
        }),
    }
}

fn format_key(lower: Option<f64>, upper: Option<f64>) -> String {
    let show = |b: Option<f64>| b.map_or_else(|| "null".to_string(), |v| v.to_string());
    format!("{}, {}", show(lower), show(upper))
}
