pub mod categories;
pub mod engine;
pub mod error;
pub mod polynomial;
pub mod vapour_pressure;
