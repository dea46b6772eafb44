pub mod crypto;

pub use crypto::{decode_wif, verify_key_pair, DecodedWif, PairVerification};
