pub mod error;

pub use error::ValidatorError;
