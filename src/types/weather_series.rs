//! The canonical hourly time series produced by the EPW parser.

use crate::archive::schema::{EpwField, FIELD_COUNT};
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::{Column, DataFrame, PolarsResult};

/// Row count of a full non-leap year of hourly data.
pub const HOURS_PER_YEAR: usize = 8760;
/// Row count of a full leap year of hourly data.
pub const HOURS_PER_LEAP_YEAR: usize = 8784;

/// Station metadata from the LOCATION row (header row 1).
#[derive(Debug, Clone, PartialEq)]
pub struct EpwLocation {
    pub city: String,
    pub state: String,
    pub country: String,
    pub source: String,
    pub station_id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Hours offset from GMT.
    pub time_zone: f64,
    /// Meters above sea level.
    pub elevation: f64,
}

/// The DATA PERIODS row (header row 8).
#[derive(Debug, Clone, PartialEq)]
pub struct DataPeriod {
    pub count: u32,
    pub records_per_hour: u32,
    pub name: String,
    pub start_day_of_week: String,
    pub start: String,
    pub end: String,
}

/// The eight header rows preceding the hourly data.
#[derive(Debug, Clone, PartialEq)]
pub struct EpwHeader {
    pub location: EpwLocation,
    pub design_conditions: String,
    pub typical_extreme_periods: String,
    pub ground_temperatures: String,
    pub holidays_daylight_savings: String,
    pub comments_1: String,
    pub comments_2: String,
    pub data_period: DataPeriod,
}

/// One hourly row of an EPW archive.
///
/// Every numeric field is `None` when its raw text could not be coerced.
/// Hours run 1..=24 as in the raw file; use [`EpwRecord::timestamp`] for a
/// calendar timestamp.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EpwRecord {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
    pub hour: Option<u32>,
    pub minute: Option<u32>,
    pub uncertainty: String,
    pub dry_bulb_temperature: Option<f64>,
    pub dew_point_temperature: Option<f64>,
    pub relative_humidity: Option<f64>,
    pub atmospheric_station_pressure: Option<f64>,
    pub extraterrestrial_horizontal_radiation: Option<f64>,
    pub extraterrestrial_direct_normal_radiation: Option<f64>,
    pub horizontal_infrared_radiation_intensity: Option<f64>,
    pub global_horizontal_radiation: Option<f64>,
    pub direct_normal_radiation: Option<f64>,
    pub diffuse_horizontal_radiation: Option<f64>,
    pub global_horizontal_illuminance: Option<f64>,
    pub direct_normal_illuminance: Option<f64>,
    pub diffuse_horizontal_illuminance: Option<f64>,
    pub zenith_luminance: Option<f64>,
    pub wind_direction: Option<f64>,
    pub wind_speed: Option<f64>,
    pub total_sky_cover: Option<f64>,
    pub opaque_sky_cover: Option<f64>,
    pub visibility: Option<f64>,
    pub ceiling_height: Option<f64>,
    pub present_weather_observation: Option<f64>,
    pub present_weather_codes: Option<f64>,
    pub precipitable_water: Option<f64>,
    pub aerosol_optical_depth: Option<f64>,
    pub snow_depth: Option<f64>,
    pub days_since_last_snowfall: Option<f64>,
    pub albedo: Option<f64>,
    pub liquid_precipitation_depth: Option<f64>,
    pub liquid_precipitation_quantity: Option<f64>,
}

fn whole<T: TryFrom<i64>>(value: Option<f64>) -> Option<T> {
    let value = value?;
    if value.fract() != 0.0 {
        return None;
    }
    T::try_from(value as i64).ok()
}

impl EpwRecord {
    /// Numeric value of `field`. Always `None` for [`EpwField::Uncertainty`].
    pub fn get(&self, field: EpwField) -> Option<f64> {
        match field {
            EpwField::Year => self.year.map(f64::from),
            EpwField::Month => self.month.map(f64::from),
            EpwField::Day => self.day.map(f64::from),
            EpwField::Hour => self.hour.map(f64::from),
            EpwField::Minute => self.minute.map(f64::from),
            EpwField::Uncertainty => None,
            EpwField::DryBulbTemperature => self.dry_bulb_temperature,
            EpwField::DewPointTemperature => self.dew_point_temperature,
            EpwField::RelativeHumidity => self.relative_humidity,
            EpwField::AtmosphericStationPressure => self.atmospheric_station_pressure,
            EpwField::ExtraterrestrialHorizontalRadiation => {
                self.extraterrestrial_horizontal_radiation
            }
            EpwField::ExtraterrestrialDirectNormalRadiation => {
                self.extraterrestrial_direct_normal_radiation
            }
            EpwField::HorizontalInfraredRadiationIntensity => {
                self.horizontal_infrared_radiation_intensity
            }
            EpwField::GlobalHorizontalRadiation => self.global_horizontal_radiation,
            EpwField::DirectNormalRadiation => self.direct_normal_radiation,
            EpwField::DiffuseHorizontalRadiation => self.diffuse_horizontal_radiation,
            EpwField::GlobalHorizontalIlluminance => self.global_horizontal_illuminance,
            EpwField::DirectNormalIlluminance => self.direct_normal_illuminance,
            EpwField::DiffuseHorizontalIlluminance => self.diffuse_horizontal_illuminance,
            EpwField::ZenithLuminance => self.zenith_luminance,
            EpwField::WindDirection => self.wind_direction,
            EpwField::WindSpeed => self.wind_speed,
            EpwField::TotalSkyCover => self.total_sky_cover,
            EpwField::OpaqueSkyCover => self.opaque_sky_cover,
            EpwField::Visibility => self.visibility,
            EpwField::CeilingHeight => self.ceiling_height,
            EpwField::PresentWeatherObservation => self.present_weather_observation,
            EpwField::PresentWeatherCodes => self.present_weather_codes,
            EpwField::PrecipitableWater => self.precipitable_water,
            EpwField::AerosolOpticalDepth => self.aerosol_optical_depth,
            EpwField::SnowDepth => self.snow_depth,
            EpwField::DaysSinceLastSnowfall => self.days_since_last_snowfall,
            EpwField::Albedo => self.albedo,
            EpwField::LiquidPrecipitationDepth => self.liquid_precipitation_depth,
            EpwField::LiquidPrecipitationQuantity => self.liquid_precipitation_quantity,
        }
    }

    /// Stores a coerced numeric value. Date parts that are not whole numbers in
    /// range of their type become `None`.
    pub fn set(&mut self, field: EpwField, value: Option<f64>) {
        match field {
            EpwField::Year => self.year = whole(value),
            EpwField::Month => self.month = whole(value),
            EpwField::Day => self.day = whole(value),
            EpwField::Hour => self.hour = whole(value),
            EpwField::Minute => self.minute = whole(value),
            EpwField::Uncertainty => {}
            EpwField::DryBulbTemperature => self.dry_bulb_temperature = value,
            EpwField::DewPointTemperature => self.dew_point_temperature = value,
            EpwField::RelativeHumidity => self.relative_humidity = value,
            EpwField::AtmosphericStationPressure => self.atmospheric_station_pressure = value,
            EpwField::ExtraterrestrialHorizontalRadiation => {
                self.extraterrestrial_horizontal_radiation = value
            }
            EpwField::ExtraterrestrialDirectNormalRadiation => {
                self.extraterrestrial_direct_normal_radiation = value
            }
            EpwField::HorizontalInfraredRadiationIntensity => {
                self.horizontal_infrared_radiation_intensity = value
            }
            EpwField::GlobalHorizontalRadiation => self.global_horizontal_radiation = value,
            EpwField::DirectNormalRadiation => self.direct_normal_radiation = value,
            EpwField::DiffuseHorizontalRadiation => self.diffuse_horizontal_radiation = value,
            EpwField::GlobalHorizontalIlluminance => self.global_horizontal_illuminance = value,
            EpwField::DirectNormalIlluminance => self.direct_normal_illuminance = value,
            EpwField::DiffuseHorizontalIlluminance => self.diffuse_horizontal_illuminance = value,
            EpwField::ZenithLuminance => self.zenith_luminance = value,
            EpwField::WindDirection => self.wind_direction = value,
            EpwField::WindSpeed => self.wind_speed = value,
            EpwField::TotalSkyCover => self.total_sky_cover = value,
            EpwField::OpaqueSkyCover => self.opaque_sky_cover = value,
            EpwField::Visibility => self.visibility = value,
            EpwField::CeilingHeight => self.ceiling_height = value,
            EpwField::PresentWeatherObservation => self.present_weather_observation = value,
            EpwField::PresentWeatherCodes => self.present_weather_codes = value,
            EpwField::PrecipitableWater => self.precipitable_water = value,
            EpwField::AerosolOpticalDepth => self.aerosol_optical_depth = value,
            EpwField::SnowDepth => self.snow_depth = value,
            EpwField::DaysSinceLastSnowfall => self.days_since_last_snowfall = value,
            EpwField::Albedo => self.albedo = value,
            EpwField::LiquidPrecipitationDepth => self.liquid_precipitation_depth = value,
            EpwField::LiquidPrecipitationQuantity => self.liquid_precipitation_quantity = value,
        }
    }

    /// Number of numeric fields without a value.
    pub fn missing_count(&self) -> usize {
        EpwField::ALL
            .iter()
            .filter(|f| f.is_numeric() && self.get(**f).is_none())
            .count()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_count() == 0
    }

    /// Hour of day in 0..=23. Raw hour 24 becomes 0.
    pub fn normalized_hour(&self) -> Option<u32> {
        match self.hour? {
            h @ 0..=24 => Some(h % 24),
            _ => None,
        }
    }

    /// Calendar timestamp of the row.
    ///
    /// Hour 24 rolls over to 00:00 of the following day (and year, on 31 December).
    /// Hours 0..=23 stay on the same day. A minute of 60 counts as 0.
    /// Returns `None` if any date part is missing or out of range.
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        let date = NaiveDate::from_ymd_opt(self.year?, self.month?, self.day?)?;
        let minute = match self.minute.unwrap_or(0) {
            60 => 0,
            m @ 0..=59 => m,
            _ => return None,
        };
        match self.hour? {
            24 => date.succ_opt()?.and_hms_opt(0, minute, 0),
            h @ 0..=23 => date.and_hms_opt(h, minute, 0),
            _ => None,
        }
    }

    /// Serializes the 35 fields back to their positional text form.
    ///
    /// Whole numbers are written without a decimal point and missing values as
    /// empty fields, so integer data round-trips unchanged.
    pub fn to_row(&self) -> String {
        let mut fields: Vec<String> = Vec::with_capacity(FIELD_COUNT);
        for field in EpwField::ALL {
            if field == EpwField::Uncertainty {
                fields.push(self.uncertainty.clone());
            } else {
                fields.push(self.get(field).map(format_value).unwrap_or_default());
            }
        }
        fields.join(",")
    }
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// An ordered series of hourly EPW records with the header they came with.
///
/// The parser never assumes a fixed length. A full year holds
/// [`HOURS_PER_YEAR`] rows, or [`HOURS_PER_LEAP_YEAR`] for leap-year archives.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherTimeSeries {
    pub header: EpwHeader,
    pub records: Vec<EpwRecord>,
}

impl WeatherTimeSeries {
    pub fn new(header: EpwHeader, records: Vec<EpwRecord>) -> Self {
        Self { header, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_leap_length(&self) -> bool {
        self.records.len() == HOURS_PER_LEAP_YEAR
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EpwRecord> {
        self.records.iter()
    }

    /// All values of one field, in row order.
    pub fn column(&self, field: EpwField) -> Vec<Option<f64>> {
        self.records.iter().map(|r| r.get(field)).collect()
    }

    /// Number of rows where `field` is missing.
    pub fn missing_in(&self, field: EpwField) -> usize {
        self.records.iter().filter(|r| r.get(field).is_none()).count()
    }

    /// Number of missing numeric values across all rows and fields.
    pub fn missing_count(&self) -> usize {
        self.records.iter().map(EpwRecord::missing_count).sum()
    }

    pub fn timestamps(&self) -> Vec<Option<NaiveDateTime>> {
        self.records.iter().map(EpwRecord::timestamp).collect()
    }

    pub fn to_rows(&self) -> Vec<String> {
        self.records.iter().map(EpwRecord::to_row).collect()
    }

    /// Converts the series into a polars [`DataFrame`] with one column per
    /// schema field plus a `datetime` column built with the hour 24 rollover.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let mut columns: Vec<Column> = Vec::with_capacity(FIELD_COUNT + 1);
        for field in EpwField::ALL {
            let name = field.column_name().into();
            if field == EpwField::Uncertainty {
                let values: Vec<String> =
                    self.records.iter().map(|r| r.uncertainty.clone()).collect();
                columns.push(Column::new(name, values));
            } else {
                columns.push(Column::new(name, self.column(field)));
            }
        }
        columns.push(Column::new("datetime".into(), self.timestamps()));
        DataFrame::new(columns)
    }
}

impl<'a> IntoIterator for &'a WeatherTimeSeries {
    type Item = &'a EpwRecord;
    type IntoIter = std::slice::Iter<'a, EpwRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
