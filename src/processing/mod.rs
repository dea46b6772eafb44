pub mod image;
pub mod ocr;
pub mod pairing;
pub mod qr;

pub use self::image::{ImageProcessor, PreparedScan};
pub use self::ocr::OcrProcessor;
pub use self::qr::QrLocator;
