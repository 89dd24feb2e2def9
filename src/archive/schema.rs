//! Positional schema of an EPW hourly data row.

use std::fmt;

/// Number of comma separated fields in one EPW data row.
pub const FIELD_COUNT: usize = 35;

/// Number of header rows (LOCATION .. DATA PERIODS) preceding the hourly data.
pub const HEADER_ROWS: usize = 8;

/// One of the 35 positional fields of an EPW data row, in file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EpwField {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    /// Data source and uncertainty flags. The only field kept as text.
    Uncertainty,
    DryBulbTemperature,
    DewPointTemperature,
    RelativeHumidity,
    AtmosphericStationPressure,
    ExtraterrestrialHorizontalRadiation,
    ExtraterrestrialDirectNormalRadiation,
    HorizontalInfraredRadiationIntensity,
    GlobalHorizontalRadiation,
    DirectNormalRadiation,
    DiffuseHorizontalRadiation,
    GlobalHorizontalIlluminance,
    DirectNormalIlluminance,
    DiffuseHorizontalIlluminance,
    ZenithLuminance,
    WindDirection,
    WindSpeed,
    TotalSkyCover,
    OpaqueSkyCover,
    Visibility,
    CeilingHeight,
    PresentWeatherObservation,
    PresentWeatherCodes,
    PrecipitableWater,
    AerosolOpticalDepth,
    SnowDepth,
    DaysSinceLastSnowfall,
    Albedo,
    LiquidPrecipitationDepth,
    LiquidPrecipitationQuantity,
}

impl EpwField {
    /// All fields in row order.
    pub const ALL: [EpwField; FIELD_COUNT] = [
        EpwField::Year,
        EpwField::Month,
        EpwField::Day,
        EpwField::Hour,
        EpwField::Minute,
        EpwField::Uncertainty,
        EpwField::DryBulbTemperature,
        EpwField::DewPointTemperature,
        EpwField::RelativeHumidity,
        EpwField::AtmosphericStationPressure,
        EpwField::ExtraterrestrialHorizontalRadiation,
        EpwField::ExtraterrestrialDirectNormalRadiation,
        EpwField::HorizontalInfraredRadiationIntensity,
        EpwField::GlobalHorizontalRadiation,
        EpwField::DirectNormalRadiation,
        EpwField::DiffuseHorizontalRadiation,
        EpwField::GlobalHorizontalIlluminance,
        EpwField::DirectNormalIlluminance,
        EpwField::DiffuseHorizontalIlluminance,
        EpwField::ZenithLuminance,
        EpwField::WindDirection,
        EpwField::WindSpeed,
        EpwField::TotalSkyCover,
        EpwField::OpaqueSkyCover,
        EpwField::Visibility,
        EpwField::CeilingHeight,
        EpwField::PresentWeatherObservation,
        EpwField::PresentWeatherCodes,
        EpwField::PrecipitableWater,
        EpwField::AerosolOpticalDepth,
        EpwField::SnowDepth,
        EpwField::DaysSinceLastSnowfall,
        EpwField::Albedo,
        EpwField::LiquidPrecipitationDepth,
        EpwField::LiquidPrecipitationQuantity,
    ];

    /// Zero based position of the field within a data row.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<EpwField> {
        Self::ALL.get(index).copied()
    }

    pub fn is_numeric(self) -> bool {
        self != EpwField::Uncertainty
    }

    /// Column name used when the series is exported as a table.
    pub fn column_name(self) -> &'static str {
        match self {
            EpwField::Year => "year",
            EpwField::Month => "month",
            EpwField::Day => "day",
            EpwField::Hour => "hour",
            EpwField::Minute => "minute",
            EpwField::Uncertainty => "uncertainty",
            EpwField::DryBulbTemperature => "dry_bulb_temperature",
            EpwField::DewPointTemperature => "dew_point_temperature",
            EpwField::RelativeHumidity => "relative_humidity",
            EpwField::AtmosphericStationPressure => "atmospheric_station_pressure",
            EpwField::ExtraterrestrialHorizontalRadiation => {
                "extraterrestrial_horizontal_radiation"
            }
            EpwField::ExtraterrestrialDirectNormalRadiation => {
                "extraterrestrial_direct_normal_radiation"
            }
            EpwField::HorizontalInfraredRadiationIntensity => {
                "horizontal_infrared_radiation_intensity"
            }
            EpwField::GlobalHorizontalRadiation => "global_horizontal_radiation",
            EpwField::DirectNormalRadiation => "direct_normal_radiation",
            EpwField::DiffuseHorizontalRadiation => "diffuse_horizontal_radiation",
            EpwField::GlobalHorizontalIlluminance => "global_horizontal_illuminance",
            EpwField::DirectNormalIlluminance => "direct_normal_illuminance",
            EpwField::DiffuseHorizontalIlluminance => "diffuse_horizontal_illuminance",
            EpwField::ZenithLuminance => "zenith_luminance",
            EpwField::WindDirection => "wind_direction",
            EpwField::WindSpeed => "wind_speed",
            EpwField::TotalSkyCover => "total_sky_cover",
            EpwField::OpaqueSkyCover => "opaque_sky_cover",
            EpwField::Visibility => "visibility",
            EpwField::CeilingHeight => "ceiling_height",
            EpwField::PresentWeatherObservation => "present_weather_observation",
            EpwField::PresentWeatherCodes => "present_weather_codes",
            EpwField::PrecipitableWater => "precipitable_water",
            EpwField::AerosolOpticalDepth => "aerosol_optical_depth",
            EpwField::SnowDepth => "snow_depth",
            EpwField::DaysSinceLastSnowfall => "days_since_last_snowfall",
            EpwField::Albedo => "albedo",
            EpwField::LiquidPrecipitationDepth => "liquid_precipitation_depth",
            EpwField::LiquidPrecipitationQuantity => "liquid_precipitation_quantity",
        }
    }
}

impl fmt::Display for EpwField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.column_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_follow_row_order() {
        for (i, field) in EpwField::ALL.iter().enumerate() {
            assert_eq!(field.index(), i);
            assert_eq!(EpwField::from_index(i), Some(*field));
        }
        assert_eq!(EpwField::DryBulbTemperature.index(), 6);
        assert_eq!(EpwField::WindDirection.index(), 20);
        assert_eq!(EpwField::WindSpeed.index(), 21);
        assert_eq!(EpwField::LiquidPrecipitationQuantity.index(), 34);
        assert_eq!(EpwField::from_index(FIELD_COUNT), None);
    }

    #[test]
    fn only_uncertainty_is_text() {
        let text: Vec<_> = EpwField::ALL.iter().filter(|f| !f.is_numeric()).collect();
        assert_eq!(text, vec![&EpwField::Uncertainty]);
    }
}
