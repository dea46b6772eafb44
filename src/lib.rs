pub mod models;
pub mod processing;
pub mod validation;
pub mod utils;
pub mod key_validator;

pub use key_validator::KeyValidator;
