pub mod discovery;
pub mod error;
