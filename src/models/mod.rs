pub mod data;

pub use data::{
    CodeGroup, CodePair, CoinType, DetectedCode, ErrorKind, KeyMaterial, PerPairResult,
    ValidationReport,
};
