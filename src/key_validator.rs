use std::path::Path;

use image::DynamicImage;

use crate::models::{CodeGroup, CoinType, ErrorKind, KeyMaterial, PerPairResult, ValidationReport};
use crate::processing::image::{ImageProcessor, PreparedScan};
use crate::processing::ocr::OcrProcessor;
use crate::processing::pairing::group_codes;
use crate::processing::qr::QrLocator;
use crate::utils::ValidatorError;
use crate::validation::verify_key_pair;

/// Audits one sheet image: locate codes, pair them by row, recognize the
/// advisory text band, re-derive every address and aggregate the verdicts.
pub struct KeyValidator {
    coin: CoinType,
}

impl KeyValidator {
    pub fn new(coin: CoinType) -> Self {
        KeyValidator { coin }
    }

    pub fn coin(&self) -> CoinType {
        self.coin
    }

    /// Full pipeline for one sheet. Only a failed image load returns
    /// `Err`; everything downstream lands in the report.
    pub fn validate(&self, image_path: &Path) -> Result<ValidationReport, ValidatorError> {
        let scan = ImageProcessor::prepare(image_path)?;
        Ok(self.validate_scan(&scan))
    }

    /// Detection onward, for callers that already hold a decoded image.
    pub fn validate_scan(&self, scan: &PreparedScan) -> ValidationReport {
        let codes = QrLocator::locate(&scan.binary);
        if codes.is_empty() {
            log::info!("no QR codes detected");
            return ValidationReport::from_results(Vec::new());
        }

        let groups = group_codes(codes);
        log::info!("formed {} code group(s)", groups.len());

        let results = groups
            .iter()
            .enumerate()
            .map(|(idx, group)| self.validate_group(idx + 1, group, &scan.original))
            .collect();
        ValidationReport::from_results(results)
    }

    /// Exactly one result per group; nothing in here aborts the sheet.
    fn validate_group(
        &self,
        pair_index: usize,
        group: &CodeGroup,
        original: &DynamicImage,
    ) -> PerPairResult {
        let pair = match group {
            CodeGroup::Incomplete(_) => {
                log::warn!("group {} holds a single code, cannot pair", pair_index);
                return PerPairResult {
                    pair_index,
                    private_key: None,
                    address: None,
                    derived_address: None,
                    ocr_text: String::new(),
                    crypto_match: false,
                    error: Some(ErrorKind::MalformedPair { codes_found: 1 }),
                };
            }
            CodeGroup::Pair(pair) => pair,
        };

        let (ocr_text, recognition_error) = match OcrProcessor::extract_pair_text(original, pair) {
            Ok(text) => (text, None),
            Err(err) => {
                log::warn!("text recognition failed for pair {}: {}", pair_index, err);
                (String::new(), Some(err))
            }
        };

        let material = KeyMaterial {
            scheme: self.coin,
            private_key: pair.left.payload.clone(),
            address: pair.right.payload.clone(),
        };
        let verification = verify_key_pair(&material);

        // A key-format failure outranks the advisory recognition failure.
        let error = verification.error.or_else(|| {
            recognition_error.map(|err| match err {
                ValidatorError::Recognition(msg) => ErrorKind::Recognition(msg),
                other => ErrorKind::Recognition(other.to_string()),
            })
        });

        PerPairResult {
            pair_index,
            private_key: Some(material.private_key),
            address: Some(material.address),
            derived_address: verification.derived_address,
            ocr_text,
            crypto_match: verification.matched,
            error,
        }
    }
}
