use std::fmt;

use clap::ValueEnum;
use serde::Serialize;

/// Address scheme a sheet is audited against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CoinType {
    Btc,
    Eth,
}

impl fmt::Display for CoinType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CoinType::Btc => write!(f, "BTC"),
            CoinType::Eth => write!(f, "ETH"),
        }
    }
}

/// One decoded QR code with its axis-aligned bounding box in image
/// coordinates. Coordinates are signed because detector corner points can
/// land a pixel or two outside the frame on skewed scans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedCode {
    pub payload: String,
    pub top: i32,
    pub left: i32,
    pub width: u32,
    pub height: u32,
}

impl DetectedCode {
    pub fn bottom(&self) -> i32 {
        self.top + self.height as i32
    }

    pub fn right(&self) -> i32 {
        self.left + self.width as i32
    }
}

/// Two codes sharing a row: private key on the left, address on the right.
#[derive(Debug, Clone)]
pub struct CodePair {
    pub left: DetectedCode,
    pub right: DetectedCode,
    pub row_y: i32,
}

impl CodePair {
    /// Invariant: `left.left < right.left`; callers hand the codes in
    /// already sorted.
    pub fn new(left: DetectedCode, right: DetectedCode) -> Self {
        let row_y = left.top.min(right.top);
        CodePair { left, right, row_y }
    }
}

/// Outcome of grouping one vertical band of codes.
#[derive(Debug, Clone)]
pub enum CodeGroup {
    Pair(CodePair),
    /// A band that closed with a single code and no partner.
    Incomplete(DetectedCode),
}

/// Key material decoded from one pair, held only while that pair is
/// being verified.
#[derive(Debug, Clone)]
pub struct KeyMaterial {
    pub scheme: CoinType,
    pub private_key: String,
    pub address: String,
}

/// What went wrong for a single pair. None of these abort the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail")]
pub enum ErrorKind {
    MalformedPair { codes_found: usize },
    KeyFormat(String),
    Recognition(String),
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::MalformedPair { codes_found } => {
                write!(f, "Code group held {} code(s) instead of 2", codes_found)
            }
            ErrorKind::KeyFormat(msg) => write!(f, "Key format error: {}", msg),
            ErrorKind::Recognition(msg) => write!(f, "Text recognition error: {}", msg),
        }
    }
}

/// Verdict for one code group, in sheet order. `crypto_match` is the only
/// field that feeds the aggregate; `ocr_text` is advisory.
#[derive(Debug, Clone, Serialize)]
pub struct PerPairResult {
    pub pair_index: usize,
    pub private_key: Option<String>,
    pub address: Option<String>,
    pub derived_address: Option<String>,
    pub ocr_text: String,
    pub crypto_match: bool,
    pub error: Option<ErrorKind>,
}

/// Full report for one sheet.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub results: Vec<PerPairResult>,
    pub overall_valid: bool,
}

impl ValidationReport {
    /// A sheet passes only when it produced at least one pair and every
    /// pair verified. Zero detected codes is a failing report, not an
    /// error.
    pub fn from_results(results: Vec<PerPairResult>) -> Self {
        let overall_valid = !results.is_empty() && results.iter().all(|r| r.crypto_match);
        ValidationReport {
            results,
            overall_valid,
        }
    }
}
