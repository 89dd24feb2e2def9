pub mod distance;
pub mod document_store;
pub mod error;
pub mod station_store;
