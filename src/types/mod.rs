pub mod lat_lon;
pub mod station;
pub mod units;
pub mod weather_series;
