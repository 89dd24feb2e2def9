//! Parser for the text form of an EPW archive.

use crate::archive::error::ParseError;
use crate::archive::schema::{EpwField, FIELD_COUNT, HEADER_ROWS};
use crate::types::weather_series::{
    DataPeriod, EpwHeader, EpwLocation, EpwRecord, WeatherTimeSeries,
};
use log::{debug, info, warn};
use std::ops::RangeInclusive;
use std::path::Path;

const HEADER_KEYWORDS: [&str; HEADER_ROWS] = [
    "LOCATION",
    "DESIGN CONDITIONS",
    "TYPICAL/EXTREME PERIODS",
    "GROUND TEMPERATURES",
    "HOLIDAYS/DAYLIGHT SAVINGS",
    "COMMENTS 1",
    "COMMENTS 2",
    "DATA PERIODS",
];

/// How the text of numeric fields is turned into numbers.
///
/// `Numeric` is the default. `IntegerOnly` gives the same values as the
/// reference EPW tooling, which reads every field as an integer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Coercion {
    /// Integer and decimal text are both accepted.
    #[default]
    Numeric,
    /// Only integer text is accepted; decimal text becomes missing. Matches
    /// the reference EPW tooling.
    IntegerOnly,
}

impl Coercion {
    /// Coerces one raw field. Text that cannot be read is `None`.
    pub fn coerce(self, raw: &str) -> Option<f64> {
        let text = raw.trim();
        match self {
            Coercion::Numeric => text.parse::<f64>().ok().filter(|v| v.is_finite()),
            Coercion::IntegerOnly => text.parse::<i64>().ok().map(|v| v as f64),
        }
    }
}

/// Turns EPW text into a [`WeatherTimeSeries`].
///
/// The first eight rows form the header. LOCATION and DATA PERIODS are read
/// into typed fields; the other six are kept as raw text. Every following
/// non-blank row is one record of 35 positional fields. Field level problems
/// never fail the parse: a value that cannot be coerced, or a field missing
/// from a short row, is stored as `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EpwParser {
    coercion: Coercion,
}

impl EpwParser {
    pub fn new(coercion: Coercion) -> Self {
        EpwParser { coercion }
    }

    pub fn coercion(&self) -> Coercion {
        self.coercion
    }

    /// Parses a complete archive.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Header`] if a header row is missing, starts with
    /// the wrong keyword, or if the location coordinates, time zone,
    /// elevation, period count or records-per-hour cannot be read.
    pub fn parse(&self, text: &str) -> Result<WeatherTimeSeries, ParseError> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut lines = text.lines();

        let mut header_rows: Vec<&str> = Vec::with_capacity(HEADER_ROWS);
        for (i, keyword) in HEADER_KEYWORDS.iter().enumerate() {
            let line = lines.next().ok_or_else(|| ParseError::Header {
                line: i + 1,
                reason: format!("missing {} row", keyword),
            })?;
            let found = line.split(',').next().unwrap_or_default().trim();
            if !found.eq_ignore_ascii_case(keyword) {
                return Err(ParseError::Header {
                    line: i + 1,
                    reason: format!("expected {} row, found '{}'", keyword, found),
                });
            }
            header_rows.push(line);
        }

        let header = EpwHeader {
            location: parse_location(header_rows[0])?,
            design_conditions: header_rows[1].to_string(),
            typical_extreme_periods: header_rows[2].to_string(),
            ground_temperatures: header_rows[3].to_string(),
            holidays_daylight_savings: header_rows[4].to_string(),
            comments_1: header_rows[5].to_string(),
            comments_2: header_rows[6].to_string(),
            data_period: parse_data_period(header_rows[7])?,
        };

        let records: Vec<EpwRecord> = lines
            .filter(|line| !line.trim().is_empty())
            .map(|line| self.parse_row(line))
            .collect();

        let series = WeatherTimeSeries::new(header, records);
        info!(
            "Parsed {} EPW records for station {} ({} missing values)",
            series.len(),
            series.header.location.station_id,
            series.missing_count()
        );
        Ok(series)
    }

    /// Parses raw archive bytes. See [`decode_archive`] for the encoding rules.
    pub fn parse_bytes(&self, bytes: Vec<u8>) -> Result<WeatherTimeSeries, ParseError> {
        let text = decode_archive(bytes)?;
        self.parse(&text)
    }

    /// Reads and parses an EPW file from disk.
    pub fn parse_path(&self, path: &Path) -> Result<WeatherTimeSeries, ParseError> {
        let bytes =
            std::fs::read(path).map_err(|e| ParseError::FileRead(path.to_path_buf(), e))?;
        self.parse_bytes(bytes)
    }

    /// Maps one data row onto the 35 schema fields.
    pub fn parse_row(&self, line: &str) -> EpwRecord {
        let mut record = EpwRecord::default();
        let mut field_count = 0;
        for (index, raw) in line.split(',').enumerate() {
            field_count = index + 1;
            let Some(field) = EpwField::from_index(index) else {
                continue;
            };
            if field.is_numeric() {
                record.set(field, self.coercion.coerce(raw));
            } else {
                record.uncertainty = raw.to_string();
            }
        }
        if field_count != FIELD_COUNT {
            debug!(
                "EPW row has {} fields instead of {}: {}",
                field_count, FIELD_COUNT, line
            );
        }
        record
    }
}

/// Turns archive bytes into text.
///
/// The eight header rows must be UTF-8. Invalid bytes in data rows are
/// replaced with U+FFFD, so only the fields they appear in read as missing.
pub fn decode_archive(bytes: Vec<u8>) -> Result<String, ParseError> {
    let bytes = match String::from_utf8(bytes) {
        Ok(text) => return Ok(text),
        Err(e) => e.into_bytes(),
    };

    let mut text = String::with_capacity(bytes.len());
    let mut damaged_rows = 0;
    for (index, line) in bytes.split_inclusive(|b| *b == b'\n').enumerate() {
        match std::str::from_utf8(line) {
            Ok(valid) => text.push_str(valid),
            Err(source) if index < HEADER_ROWS => {
                return Err(ParseError::Encoding {
                    line: index + 1,
                    source,
                })
            }
            Err(_) => {
                damaged_rows += 1;
                text.push_str(&String::from_utf8_lossy(line));
            }
        }
    }
    warn!(
        "{} EPW data rows contain invalid UTF-8; the affected values are read as missing",
        damaged_rows
    );
    Ok(text)
}

fn header_field<'a>(fields: &[&'a str], index: usize, line: usize) -> Result<&'a str, ParseError> {
    fields
        .get(index)
        .map(|f| f.trim())
        .ok_or_else(|| ParseError::Header {
            line,
            reason: format!("missing field {}", index),
        })
}

fn header_number<T: std::str::FromStr>(
    fields: &[&str],
    index: usize,
    line: usize,
    name: &str,
) -> Result<T, ParseError> {
    let raw = header_field(fields, index, line)?;
    raw.parse::<T>().map_err(|_| ParseError::Header {
        line,
        reason: format!("invalid {} '{}'", name, raw),
    })
}

/// A finite header number inside `range`.
fn header_bounded(
    fields: &[&str],
    index: usize,
    name: &str,
    range: RangeInclusive<f64>,
) -> Result<f64, ParseError> {
    let value: f64 = header_number(fields, index, 1, name)?;
    if !value.is_finite() || !range.contains(&value) {
        return Err(ParseError::Header {
            line: 1,
            reason: format!("{} {} is out of range", name, value),
        });
    }
    Ok(value)
}

fn parse_location(row: &str) -> Result<EpwLocation, ParseError> {
    let fields: Vec<&str> = row.split(',').collect();
    let text = |index: usize| fields.get(index).map(|f| f.trim().to_string()).unwrap_or_default();
    Ok(EpwLocation {
        city: text(1),
        state: text(2),
        country: text(3),
        source: text(4),
        station_id: text(5),
        latitude: header_bounded(&fields, 6, "latitude", -90.0..=90.0)?,
        longitude: header_bounded(&fields, 7, "longitude", -180.0..=180.0)?,
        time_zone: header_bounded(&fields, 8, "time zone", -12.0..=14.0)?,
        elevation: header_bounded(&fields, 9, "elevation", f64::MIN..=f64::MAX)?,
    })
}

fn parse_data_period(row: &str) -> Result<DataPeriod, ParseError> {
    let fields: Vec<&str> = row.split(',').collect();
    let text = |index: usize| fields.get(index).map(|f| f.trim().to_string()).unwrap_or_default();
    Ok(DataPeriod {
        count: header_number(&fields, 1, HEADER_ROWS, "data period count")?,
        records_per_hour: header_number(&fields, 2, HEADER_ROWS, "records per hour")?,
        name: text(3),
        start_day_of_week: text(4),
        start: text(5),
        end: text(6),
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{Duration, NaiveDate};

    pub(crate) const HEADER: &str = "LOCATION,Lumparland Langnas Harbour,-,ALA,SRC-TMYx,027240,60.11700,20.28300,2.0,5.0
DESIGN CONDITIONS,0
TYPICAL/EXTREME PERIODS,0
GROUND TEMPERATURES,0
HOLIDAYS/DAYLIGHT SAVINGS,No,0,0,0
COMMENTS 1,Synthetic archive
COMMENTS 2,Constant weather
DATA PERIODS,1,1,Data,Friday, 1/ 1,12/31";

    pub(crate) const UNCERTAINTY: &str = "?9?9?9?9E0?9?9?9*9*9?9*9*9?9*9*9?9?9*9*9*9?9*9*9*_*9*9*9*9*9";

    /// One data row with the given date parts, 25 C air, a 30 C dew point,
    /// 50 % humidity and 1.5 m/s of wind.
    pub(crate) fn row(year: i32, month: u32, day: u32, hour: u32) -> String {
        format!(
            "{},{},{},{},60,{},25,30,50,101300,0,0,300,0,0,0,0,0,0,0,180,1.5,5,3,16,77777,9,999999999,10,0.1,0,88,0.2,0,0",
            year, month, day, hour, UNCERTAINTY
        )
    }

    /// The data rows of `hours` consecutive hours from the start of 2021.
    pub(crate) fn rows(hours: usize) -> Vec<String> {
        let start = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        (0..hours)
            .map(|i| {
                let date = start + Duration::days((i / 24) as i64);
                row(
                    chrono::Datelike::year(&date),
                    chrono::Datelike::month(&date),
                    chrono::Datelike::day(&date),
                    (i % 24) as u32 + 1,
                )
            })
            .collect()
    }

    /// A complete archive text with `hours` data rows.
    pub(crate) fn epw_text(hours: usize) -> String {
        let mut text = HEADER.to_string();
        for row in rows(hours) {
            text.push('\n');
            text.push_str(&row);
        }
        text.push('\n');
        text
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{epw_text, row, rows, HEADER};
    use super::*;
    use crate::types::weather_series::{HOURS_PER_LEAP_YEAR, HOURS_PER_YEAR};

    #[test]
    fn parses_header() {
        let series = EpwParser::default().parse(&epw_text(24)).unwrap();
        let location = &series.header.location;
        assert_eq!(location.city, "Lumparland Langnas Harbour");
        assert_eq!(location.country, "ALA");
        assert_eq!(location.station_id, "027240");
        assert_eq!(location.latitude, 60.117);
        assert_eq!(location.longitude, 20.283);
        assert_eq!(location.time_zone, 2.0);
        assert_eq!(location.elevation, 5.0);
        assert_eq!(series.header.data_period.count, 1);
        assert_eq!(series.header.data_period.records_per_hour, 1);
        assert_eq!(series.header.data_period.start_day_of_week, "Friday");
        assert_eq!(series.header.comments_1, "COMMENTS 1,Synthetic archive");
    }

    #[test]
    fn parses_a_full_year_and_a_leap_year() {
        let year = EpwParser::default().parse(&epw_text(HOURS_PER_YEAR)).unwrap();
        assert_eq!(year.len(), HOURS_PER_YEAR);
        assert!(!year.is_leap_length());

        let leap = EpwParser::default()
            .parse(&epw_text(HOURS_PER_LEAP_YEAR))
            .unwrap();
        assert_eq!(leap.len(), HOURS_PER_LEAP_YEAR);
        assert!(leap.is_leap_length());
    }

    #[test]
    fn fields_follow_schema_order() {
        let series = EpwParser::default().parse(&epw_text(1)).unwrap();
        let record = &series.records[0];
        assert_eq!(record.year, Some(2021));
        assert_eq!(record.month, Some(1));
        assert_eq!(record.day, Some(1));
        assert_eq!(record.hour, Some(1));
        assert_eq!(record.minute, Some(60));
        assert_eq!(record.uncertainty, super::fixtures::UNCERTAINTY);
        assert_eq!(record.dry_bulb_temperature, Some(25.0));
        assert_eq!(record.dew_point_temperature, Some(30.0));
        assert_eq!(record.relative_humidity, Some(50.0));
        assert_eq!(record.wind_direction, Some(180.0));
        assert_eq!(record.wind_speed, Some(1.5));
        assert_eq!(record.aerosol_optical_depth, Some(0.1));
        assert_eq!(record.liquid_precipitation_quantity, Some(0.0));
        assert!(record.is_complete());
    }

    #[test]
    fn bad_fields_become_missing_without_failing() {
        let line = "2021,1,1,1,60,A7,abc,10,,101300";
        let record = EpwParser::default().parse_row(line);
        assert_eq!(record.dry_bulb_temperature, None);
        assert_eq!(record.dew_point_temperature, Some(10.0));
        assert_eq!(record.relative_humidity, None);
        assert_eq!(record.atmospheric_station_pressure, Some(101300.0));
        // The short row keeps its tail missing.
        assert_eq!(record.wind_speed, None);
        assert_eq!(record.liquid_precipitation_quantity, None);
        assert_eq!(record.missing_count(), 27);
    }

    #[test]
    fn integer_only_coercion_drops_decimals() {
        let record = EpwParser::new(Coercion::IntegerOnly).parse_row(&row(2021, 1, 1, 1));
        assert_eq!(record.dry_bulb_temperature, Some(25.0));
        assert_eq!(record.wind_speed, None);
        assert_eq!(record.aerosol_optical_depth, None);

        assert_eq!(Coercion::Numeric.coerce(" 2.5 "), Some(2.5));
        assert_eq!(Coercion::Numeric.coerce("NaN"), None);
        assert_eq!(Coercion::IntegerOnly.coerce("-7"), Some(-7.0));
        assert_eq!(Coercion::IntegerOnly.coerce("2.5"), None);
    }

    #[test]
    fn rows_round_trip() {
        let text = epw_text(48);
        let series = EpwParser::default().parse(&text).unwrap();
        assert_eq!(series.to_rows(), rows(48));

        // Integer-only parsing still reproduces every integer field.
        let integers = EpwParser::new(Coercion::IntegerOnly).parse(&text).unwrap();
        for (parsed, original) in integers.to_rows().iter().zip(rows(48)) {
            let parsed: Vec<&str> = parsed.split(',').collect();
            for (i, raw) in original.split(',').enumerate() {
                if raw.parse::<i64>().is_ok() || i == EpwField::Uncertainty.index() {
                    assert_eq!(parsed[i], raw, "field {}", i);
                } else {
                    assert_eq!(parsed[i], "", "field {}", i);
                }
            }
        }
    }

    #[test]
    fn blank_lines_and_crlf_are_ignored() {
        let text = epw_text(3).replace('\n', "\r\n") + "\r\n\r\n";
        let series = EpwParser::default().parse(&text).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.records[2].liquid_precipitation_quantity, Some(0.0));
    }

    #[test]
    fn missing_header_rows_are_fatal() {
        let truncated: String = HEADER.lines().take(5).collect::<Vec<_>>().join("\n");
        assert!(matches!(
            EpwParser::default().parse(&truncated),
            Err(ParseError::Header { line: 6, .. })
        ));
    }

    #[test]
    fn wrong_keyword_is_fatal() {
        let text = epw_text(2).replacen("GROUND TEMPERATURES", "GROUND", 1);
        assert!(matches!(
            EpwParser::default().parse(&text),
            Err(ParseError::Header { line: 4, .. })
        ));
    }

    #[test]
    fn unreadable_location_is_fatal() {
        let text = epw_text(2).replacen("60.11700", "north", 1);
        let err = EpwParser::default().parse(&text).unwrap_err();
        assert!(matches!(err, ParseError::Header { line: 1, ref reason } if reason.contains("latitude")));

        let text = epw_text(2).replacen("DATA PERIODS,1,1", "DATA PERIODS,one,1", 1);
        assert!(matches!(
            EpwParser::default().parse(&text),
            Err(ParseError::Header { line: 8, .. })
        ));
    }

    #[test]
    fn invalid_utf8_in_a_data_row_only_loses_that_field() {
        let mut text = HEADER.to_string();
        for row in rows(2) {
            text.push('\n');
            text.push_str(&row);
        }
        text.push('\n');
        text.push_str(&row(2021, 1, 1, 3).replacen(",25,", ",2X,", 1));
        text.push('\n');
        let mut bytes = text.into_bytes();
        let marker = bytes.iter().rposition(|b| *b == b'X').unwrap();
        bytes[marker] = 0xE9;

        let series = EpwParser::default().parse_bytes(bytes).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.records[0].dry_bulb_temperature, Some(25.0));
        assert_eq!(series.records[2].dry_bulb_temperature, None);
        assert_eq!(series.records[2].dew_point_temperature, Some(30.0));
        assert_eq!(series.records[2].hour, Some(3));
        assert_eq!(series.missing_count(), 1);
    }

    #[test]
    fn invalid_utf8_in_the_header_is_fatal() {
        let mut bytes = epw_text(1).into_bytes();
        let comment = bytes.windows(9).position(|w| w == b"Synthetic").unwrap();
        bytes[comment] = 0xff;
        assert!(matches!(
            EpwParser::default().parse_bytes(bytes),
            Err(ParseError::Encoding { line: 6, .. })
        ));
    }

    #[test]
    fn non_finite_or_out_of_range_location_is_fatal() {
        let cases = [
            ("60.11700,20.28300,2.0,5.0", "NaN,20.28300,2.0,5.0"),
            ("60.11700,20.28300,2.0,5.0", "95.0,20.28300,2.0,5.0"),
            ("60.11700,20.28300,2.0,5.0", "60.11700,inf,2.0,5.0"),
            ("60.11700,20.28300,2.0,5.0", "60.11700,20.28300,30.0,5.0"),
            ("60.11700,20.28300,2.0,5.0", "60.11700,20.28300,2.0,-inf"),
        ];
        for (good, bad) in cases {
            let text = epw_text(1).replacen(good, bad, 1);
            assert!(
                matches!(
                    EpwParser::default().parse(&text),
                    Err(ParseError::Header { line: 1, .. })
                ),
                "accepted {}",
                bad
            );
        }
    }

    #[test]
    fn parses_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("station.epw");
        std::fs::write(&path, epw_text(24)).unwrap();
        let series = EpwParser::default().parse_path(&path).unwrap();
        assert_eq!(series.len(), 24);
        assert!(matches!(
            EpwParser::default().parse_path(&dir.path().join("absent.epw")),
            Err(ParseError::FileRead(..))
        ));
    }
}
