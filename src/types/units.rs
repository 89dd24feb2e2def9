//! Unit system tag and the SI / IP conversions used by thermal inputs.

use std::fmt;

/// Feet per second in one meter per second, as used by the UTCI reference tooling.
pub const FPS_PER_MPS: f64 = 3.281;

/// The unit system a set of values is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Units {
    /// International System: °C and m/s.
    #[default]
    Si,
    /// Imperial / inch-pound: °F and ft/s.
    Ip,
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Units::Si => write!(f, "SI"),
            Units::Ip => write!(f, "IP"),
        }
    }
}

pub fn fahrenheit_to_celsius(value: f64) -> f64 {
    (value - 32.0) * 5.0 / 9.0
}

pub fn celsius_to_fahrenheit(value: f64) -> f64 {
    (value * 9.0 / 5.0) + 32.0
}

pub fn fps_to_mps(value: f64) -> f64 {
    value / FPS_PER_MPS
}

pub fn mps_to_fps(value: f64) -> f64 {
    value * FPS_PER_MPS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temperature_conversions() {
        assert_eq!(fahrenheit_to_celsius(32.0), 0.0);
        assert_eq!(fahrenheit_to_celsius(212.0), 100.0);
        assert_eq!(celsius_to_fahrenheit(-40.0), -40.0);
        assert!((celsius_to_fahrenheit(fahrenheit_to_celsius(77.0)) - 77.0).abs() < 1e-12);
    }

    #[test]
    fn speed_conversions() {
        assert_eq!(fps_to_mps(3.281), 1.0);
        assert_eq!(mps_to_fps(2.0), 6.562);
    }

    #[test]
    fn display_tags() {
        assert_eq!(Units::Si.to_string(), "SI");
        assert_eq!(Units::Ip.to_string(), "IP");
        assert_eq!(Units::default(), Units::Si);
    }
}
