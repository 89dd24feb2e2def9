use crate::comfort::categories::{CategoryTable, CategoryTables};
use crate::comfort::polynomial::utci_approx;
use crate::comfort::vapour_pressure::vapour_pressure_kpa;
use crate::types::units::{
    celsius_to_fahrenheit, fahrenheit_to_celsius, fps_to_mps, mps_to_fps, Units,
};
use crate::types::weather_series::{EpwRecord, WeatherTimeSeries};
use chrono::NaiveDateTime;
use log::{debug, info};
use polars::prelude::{Column, DataFrame, PolarsResult};
use std::fmt;

/// Lowest wind speed the UTCI approximation is valid for, in m/s.
pub const MIN_WIND_SPEED: f64 = 0.5;
/// Highest wind speed the UTCI approximation is valid for, in m/s.
pub const MAX_WIND_SPEED: f64 = 17.0;

const ROUNDING: f64 = 1e5;

/// Weather conditions for one UTCI evaluation.
///
/// Values passed in IP units are converted to SI on construction, and the
/// wind speed is then limited to the valid range of the approximation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermalInput {
    dry_bulb: f64,
    mean_radiant: f64,
    wind_speed: f64,
    relative_humidity: f64,
    units: Units,
}

impl ThermalInput {
    pub fn new(
        dry_bulb: f64,
        mean_radiant: f64,
        wind_speed: f64,
        relative_humidity: f64,
        units: Units,
    ) -> Self {
        let (dry_bulb, mean_radiant, wind_speed) = match units {
            Units::Si => (dry_bulb, mean_radiant, wind_speed),
            Units::Ip => (
                fahrenheit_to_celsius(dry_bulb),
                fahrenheit_to_celsius(mean_radiant),
                fps_to_mps(wind_speed),
            ),
        };
        ThermalInput {
            dry_bulb,
            mean_radiant,
            wind_speed: wind_speed.clamp(MIN_WIND_SPEED, MAX_WIND_SPEED),
            relative_humidity,
            units: Units::Si,
        }
    }

    /// Inputs for one archive row.
    ///
    /// The dew point column stands in for the mean radiant temperature. Returns
    /// `None` when any of the four values is missing.
    pub fn from_record(record: &EpwRecord) -> Option<Self> {
        Some(Self::new(
            record.dry_bulb_temperature?,
            record.dew_point_temperature?,
            record.wind_speed?,
            record.relative_humidity?,
            Units::Si,
        ))
    }

    /// Inputs built from the mean of every present value in the series.
    ///
    /// Returns `None` if one of the four columns has no value at all.
    pub fn mean_of(series: &WeatherTimeSeries) -> Option<Self> {
        let mean = |values: &mut dyn Iterator<Item = Option<f64>>| {
            let (sum, count) = values
                .flatten()
                .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
            (count > 0).then(|| sum / count as f64)
        };
        Some(Self::new(
            mean(&mut series.iter().map(|r| r.dry_bulb_temperature))?,
            mean(&mut series.iter().map(|r| r.dew_point_temperature))?,
            mean(&mut series.iter().map(|r| r.wind_speed))?,
            mean(&mut series.iter().map(|r| r.relative_humidity))?,
            Units::Si,
        ))
    }

    /// The same conditions expressed in IP units (°F, ft/s).
    pub fn to_ip(&self) -> Self {
        match self.units {
            Units::Ip => *self,
            Units::Si => ThermalInput {
                dry_bulb: celsius_to_fahrenheit(self.dry_bulb),
                mean_radiant: celsius_to_fahrenheit(self.mean_radiant),
                wind_speed: mps_to_fps(self.wind_speed),
                relative_humidity: self.relative_humidity,
                units: Units::Ip,
            },
        }
    }

    /// The same conditions expressed in SI units (°C, m/s).
    pub fn to_si(&self) -> Self {
        match self.units {
            Units::Si => *self,
            Units::Ip => ThermalInput {
                dry_bulb: fahrenheit_to_celsius(self.dry_bulb),
                mean_radiant: fahrenheit_to_celsius(self.mean_radiant),
                wind_speed: fps_to_mps(self.wind_speed),
                relative_humidity: self.relative_humidity,
                units: Units::Si,
            },
        }
    }

    pub fn dry_bulb(&self) -> f64 {
        self.dry_bulb
    }

    pub fn mean_radiant(&self) -> f64 {
        self.mean_radiant
    }

    pub fn wind_speed(&self) -> f64 {
        self.wind_speed
    }

    pub fn relative_humidity(&self) -> f64 {
        self.relative_humidity
    }

    pub fn units(&self) -> Units {
        self.units
    }
}

/// UTCI of `input` in °C, rounded to 5 decimal places.
pub fn utci(input: &ThermalInput) -> f64 {
    round_utci(utci_unrounded(input))
}

/// UTCI of `input` in °C at full precision. Category lookups use this value.
pub fn utci_unrounded(input: &ThermalInput) -> f64 {
    let si = input.to_si();
    let pa = vapour_pressure_kpa(si.dry_bulb, si.relative_humidity);
    let delta_t_tr = si.mean_radiant - si.dry_bulb;
    utci_approx(si.dry_bulb, si.wind_speed, delta_t_tr, pa)
}

fn round_utci(value: f64) -> f64 {
    (value * ROUNDING).round() / ROUNDING
}

/// UTCI and its two labels for one time step.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComfortResult {
    /// UTCI in °C, `None` when the inputs were missing.
    pub utci: Option<f64>,
    pub stress_category: Option<String>,
    pub comfort_rating: Option<String>,
}

impl ComfortResult {
    /// Result for a time step whose inputs were missing.
    pub fn missing() -> Self {
        Self::default()
    }

    pub fn is_missing(&self) -> bool {
        self.utci.is_none()
    }

    pub fn utci_fahrenheit(&self) -> Option<f64> {
        self.utci.map(celsius_to_fahrenheit)
    }
}

/// Which of the two label tables to look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryKind {
    Stress,
    Comfort,
}

/// Share of the time steps that received one label.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelShare {
    pub label: String,
    /// Fraction of all time steps, in 0..=1.
    pub ratio: f64,
}

impl LabelShare {
    /// Percentage rounded to one decimal.
    pub fn percentage(&self) -> f64 {
        (self.ratio * 1000.0).round() / 10.0
    }
}

impl fmt::Display for LabelShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ratio < 0.001 {
            write!(f, "{} experienced < 0.1% of the year", self.label)
        } else {
            write!(
                f,
                "{} experienced {:.1}% of the year",
                self.label,
                self.percentage()
            )
        }
    }
}

/// Results for every time step of a series, in series order.
#[derive(Debug, Clone, PartialEq)]
pub struct ComfortReport {
    pub timestamps: Vec<Option<NaiveDateTime>>,
    pub results: Vec<ComfortResult>,
    stress_labels: Vec<String>,
    comfort_labels: Vec<String>,
}

impl ComfortReport {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn utci_values(&self) -> Vec<Option<f64>> {
        self.results.iter().map(|r| r.utci).collect()
    }

    /// Time steps that could not be evaluated because inputs were missing.
    pub fn missing_samples(&self) -> usize {
        self.results.iter().filter(|r| r.is_missing()).count()
    }

    /// Share of all time steps per label, in table order.
    ///
    /// Every label of the table is listed, including those that never occur.
    /// Values outside every entry are reported as "unknown" when present.
    /// Missing time steps count towards the total but carry no label.
    pub fn label_shares(&self, kind: CategoryKind) -> Vec<LabelShare> {
        let (labels, values): (&[String], Vec<Option<&str>>) = match kind {
            CategoryKind::Stress => (
                self.stress_labels.as_slice(),
                self.results
                    .iter()
                    .map(|r| r.stress_category.as_deref())
                    .collect(),
            ),
            CategoryKind::Comfort => (
                self.comfort_labels.as_slice(),
                self.results
                    .iter()
                    .map(|r| r.comfort_rating.as_deref())
                    .collect(),
            ),
        };
        if values.is_empty() {
            return Vec::new();
        }

        let total = values.len() as f64;
        let share = |label: &str| LabelShare {
            label: label.to_string(),
            ratio: values.iter().filter(|v| **v == Some(label)).count() as f64 / total,
        };
        let mut shares: Vec<LabelShare> = labels.iter().map(|l| share(l)).collect();
        let unknown = share(crate::comfort::categories::UNKNOWN_LABEL);
        if unknown.ratio > 0.0 {
            shares.push(unknown);
        }
        shares
    }

    /// Sentences like "comfort experienced 41.2% of the year", one per label.
    pub fn describe_shares(&self, kind: CategoryKind) -> Vec<String> {
        self.label_shares(kind)
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    /// The report as a polars [`DataFrame`] with `datetime`, `utci`,
    /// `stress_category` and `comfort_rating` columns.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let stress: Vec<Option<String>> = self
            .results
            .iter()
            .map(|r| r.stress_category.clone())
            .collect();
        let comfort: Vec<Option<String>> = self
            .results
            .iter()
            .map(|r| r.comfort_rating.clone())
            .collect();
        DataFrame::new(vec![
            Column::new("datetime".into(), self.timestamps.clone()),
            Column::new("utci".into(), self.utci_values()),
            Column::new("stress_category".into(), stress),
            Column::new("comfort_rating".into(), comfort),
        ])
    }
}

/// Computes the UTCI and labels it with a pair of category tables.
#[derive(Debug, Clone, Default)]
pub struct ComfortEngine {
    tables: CategoryTables,
}

impl ComfortEngine {
    pub fn new(tables: CategoryTables) -> Self {
        ComfortEngine { tables }
    }

    /// An engine using the process-wide tables.
    pub fn from_global() -> Self {
        Self::new(crate::comfort::categories::global().clone())
    }

    pub fn tables(&self) -> &CategoryTables {
        &self.tables
    }

    pub fn table(&self, kind: CategoryKind) -> &CategoryTable {
        match kind {
            CategoryKind::Stress => &self.tables.stress,
            CategoryKind::Comfort => &self.tables.comfort,
        }
    }

    /// Labels are looked up with the unrounded UTCI, so a value just above a
    /// bound is not pulled into the lower category by rounding.
    pub fn evaluate(&self, input: &ThermalInput) -> ComfortResult {
        let raw = utci_unrounded(input);
        ComfortResult {
            utci: Some(round_utci(raw)),
            stress_category: Some(self.tables.stress.classify(raw).to_string()),
            comfort_rating: Some(self.tables.comfort.classify(raw).to_string()),
        }
    }

    /// Evaluates every row of `series`. Rows with missing inputs get a
    /// [`ComfortResult::missing`] entry so the report stays aligned 1:1.
    pub fn compute(&self, series: &WeatherTimeSeries) -> ComfortReport {
        let results: Vec<ComfortResult> = series
            .iter()
            .map(|record| match ThermalInput::from_record(record) {
                Some(input) => self.evaluate(&input),
                None => ComfortResult::missing(),
            })
            .collect();
        let report = ComfortReport {
            timestamps: series.timestamps(),
            results,
            stress_labels: self.label_list(CategoryKind::Stress),
            comfort_labels: self.label_list(CategoryKind::Comfort),
        };
        if report.missing_samples() > 0 {
            info!(
                "{} of {} time steps lack inputs for the UTCI",
                report.missing_samples(),
                report.len()
            );
        }
        debug!("Computed UTCI for {} time steps", report.len());
        report
    }

    /// One result for the mean conditions of the series.
    pub fn compute_mean(&self, series: &WeatherTimeSeries) -> ComfortResult {
        ThermalInput::mean_of(series)
            .map(|input| self.evaluate(&input))
            .unwrap_or_default()
    }

    fn label_list(&self, kind: CategoryKind) -> Vec<String> {
        self.table(kind)
            .labels()
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}
