pub mod acquirer;
pub mod error;
pub mod parser;
pub mod schema;
