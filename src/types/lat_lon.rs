/// Represents a geographical coordinate using latitude and longitude.
///
/// Latitude is the first element (index 0), and longitude is the second (index 1).
/// Both values are WGS84 decimal degrees.
///
/// # Examples
///
/// ```
/// use epw_comfort::LatLon;
///
/// let langnas = LatLon(60.1167, 20.2833);
/// assert_eq!(langnas.0, 60.1167); // Latitude
/// assert_eq!(langnas.1, 20.2833); // Longitude
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon(pub f64, pub f64);

impl LatLon {
    pub fn latitude(&self) -> f64 {
        self.0
    }

    pub fn longitude(&self) -> f64 {
        self.1
    }
}
