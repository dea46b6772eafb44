use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::SecretKey;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use tiny_keccak::{Hasher, Keccak};

use crate::models::{CoinType, ErrorKind, KeyMaterial};
use crate::utils::ValidatorError;

/// Mainnet version byte prefixes.
const WIF_VERSION: u8 = 0x80;
const P2PKH_VERSION: u8 = 0x00;

/// Trailing marker on a WIF payload whose public key serializes compressed.
const WIF_COMPRESSED_FLAG: u8 = 0x01;

/// A WIF string taken apart: the raw scalar plus the serialization the
/// matching address was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedWif {
    pub secret: [u8; 32],
    pub compressed: bool,
}

/// Outcome of re-deriving one pair's address. Derivation failures land in
/// `error`; they never abort the sheet.
#[derive(Debug, Clone)]
pub struct PairVerification {
    pub matched: bool,
    pub derived_address: Option<String>,
    pub error: Option<ErrorKind>,
}

/// Re-derives the address for one pair and compares it to the claimed one.
pub fn verify_key_pair(material: &KeyMaterial) -> PairVerification {
    match material.scheme.derive_address(&material.private_key) {
        Ok(derived) => {
            let matched = material.scheme.addresses_match(&derived, &material.address);
            PairVerification {
                matched,
                derived_address: Some(derived),
                error: None,
            }
        }
        Err(err) => {
            log::debug!("address derivation failed: {}", err);
            let message = match err {
                ValidatorError::KeyFormat(msg) => msg,
                other => other.to_string(),
            };
            PairVerification {
                matched: false,
                derived_address: None,
                error: Some(ErrorKind::KeyFormat(message)),
            }
        }
    }
}

impl CoinType {
    /// Re-derives the printed address from the private-key payload.
    pub fn derive_address(&self, private_key: &str) -> Result<String, ValidatorError> {
        match self {
            CoinType::Btc => derive_btc_address(private_key),
            CoinType::Eth => derive_eth_address(private_key),
        }
    }

    /// BTC addresses carry their own checksum and compare exactly. ETH
    /// comparison is case-insensitive; EIP-55 mixed-case checksums are
    /// accepted but not enforced.
    pub fn addresses_match(&self, derived: &str, claimed: &str) -> bool {
        match self {
            CoinType::Btc => derived == claimed,
            CoinType::Eth => normalize_eth(derived) == normalize_eth(claimed),
        }
    }
}

/// WIF → raw scalar. Checks base58 shape, checksum, version byte and body
/// length, in that order.
pub fn decode_wif(wif: &str) -> Result<DecodedWif, ValidatorError> {
    let raw = bs58::decode(wif)
        .into_vec()
        .map_err(|e| ValidatorError::KeyFormat(format!("WIF is not valid base58: {}", e)))?;
    if raw.len() < 5 {
        return Err(ValidatorError::KeyFormat(format!(
            "WIF decodes to {} bytes, too short for a checksum",
            raw.len()
        )));
    }

    let (payload, checksum) = raw.split_at(raw.len() - 4);
    let digest = double_sha256(payload);
    if digest[..4] != *checksum {
        return Err(ValidatorError::KeyFormat("WIF checksum mismatch".to_string()));
    }
    if payload[0] != WIF_VERSION {
        return Err(ValidatorError::KeyFormat(format!(
            "WIF version byte is 0x{:02x}, expected 0x{:02x}",
            payload[0], WIF_VERSION
        )));
    }

    let body = &payload[1..];
    let (key_bytes, compressed) = match body.len() {
        32 => (body, false),
        33 if body[32] == WIF_COMPRESSED_FLAG => (&body[..32], true),
        _ => {
            return Err(ValidatorError::KeyFormat(format!(
                "WIF key body has unexpected length {}",
                body.len()
            )))
        }
    };

    let mut secret = [0u8; 32];
    secret.copy_from_slice(key_bytes);
    Ok(DecodedWif { secret, compressed })
}

/// WIF private key → P2PKH address, honoring the WIF compression flag so
/// the public key serializes the same way it did when the sheet was made.
pub fn derive_btc_address(wif: &str) -> Result<String, ValidatorError> {
    let decoded = decode_wif(wif)?;
    let secret = SecretKey::from_slice(&decoded.secret).map_err(|_| {
        ValidatorError::KeyFormat("WIF scalar is not a valid secp256k1 key".to_string())
    })?;
    let point = secret.public_key().to_encoded_point(decoded.compressed);
    Ok(base58check(P2PKH_VERSION, &hash160(point.as_bytes())))
}

/// 32-byte hex private key (optional 0x prefix) → 0x-prefixed lower-case
/// Keccak-256 address.
pub fn derive_eth_address(private_key: &str) -> Result<String, ValidatorError> {
    let normalized = private_key.to_lowercase();
    let digits = normalized.strip_prefix("0x").unwrap_or(&normalized);
    let bytes = hex::decode(digits)
        .map_err(|e| ValidatorError::KeyFormat(format!("private key is not valid hex: {}", e)))?;
    if bytes.len() != 32 {
        return Err(ValidatorError::KeyFormat(format!(
            "private key must be 32 bytes, got {}",
            bytes.len()
        )));
    }

    let secret = SecretKey::from_slice(&bytes).map_err(|_| {
        ValidatorError::KeyFormat("private key is not a valid secp256k1 scalar".to_string())
    })?;
    let point = secret.public_key().to_encoded_point(false);
    // Keccak over the 64 coordinate bytes, without the 0x04 prefix.
    let digest = keccak256(&point.as_bytes()[1..]);
    Ok(format!("0x{}", hex::encode(&digest[12..])))
}

fn normalize_eth(address: &str) -> String {
    let lower = address.to_lowercase();
    lower.strip_prefix("0x").unwrap_or(&lower).to_string()
}

fn base58check(version: u8, payload: &[u8]) -> String {
    let mut buf = Vec::with_capacity(payload.len() + 5);
    buf.push(version);
    buf.extend_from_slice(payload);
    let checksum = double_sha256(&buf);
    buf.extend_from_slice(&checksum[..4]);
    bs58::encode(buf).into_string()
}

fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    let ripe = Ripemd160::digest(sha);
    ripe.into()
}

fn double_sha256(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    second.into()
}

fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut output);
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    // Scalar 1 in both WIF serializations, with the matching published
    // P2PKH addresses.
    const WIF_UNCOMPRESSED_ONE: &str = "5HpHagT65TZzG1PH3CSu63k8DbpvD8s5ip4nEB3kEsreAnchuDf";
    const WIF_COMPRESSED_ONE: &str = "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn";
    const ADDR_UNCOMPRESSED_ONE: &str = "1EHNa6Q4Jz2uvNExL497mE43ikXhwF6kZm";
    const ADDR_COMPRESSED_ONE: &str = "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH";

    // The long-standing WIF reference vector.
    const WIF_REFERENCE: &str = "5HueCGU8rMjxEXxiPuD5BDku4MkFqeZyd4dZ1jvhTVqvbTLvyTJ";
    const WIF_REFERENCE_HEX: &str =
        "0c28fca386c7a227600b2fe50b7cae11ec86d3bf1fbe471be89827e19d72aa1d";

    // Stock development key shipped by common ETH toolchains, address in
    // its EIP-55 mixed-case form.
    const ETH_DEV_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const ETH_DEV_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    fn scalar_one() -> [u8; 32] {
        let mut scalar = [0u8; 32];
        scalar[31] = 1;
        scalar
    }

    #[test]
    fn decodes_reference_wif() {
        let decoded = decode_wif(WIF_REFERENCE).unwrap();
        assert_eq!(hex::encode(decoded.secret), WIF_REFERENCE_HEX);
        assert!(!decoded.compressed);
    }

    #[test]
    fn decodes_compression_flag() {
        let plain = decode_wif(WIF_UNCOMPRESSED_ONE).unwrap();
        assert_eq!(plain.secret, scalar_one());
        assert!(!plain.compressed);

        let flagged = decode_wif(WIF_COMPRESSED_ONE).unwrap();
        assert_eq!(flagged.secret, scalar_one());
        assert!(flagged.compressed);
    }

    #[test]
    fn rejects_tampered_wif_checksum() {
        let mut tampered = WIF_REFERENCE.to_string();
        tampered.pop();
        tampered.push('K');
        let err = decode_wif(&tampered).unwrap_err();
        assert!(matches!(err, ValidatorError::KeyFormat(msg) if msg.contains("checksum")));
    }

    #[test]
    fn rejects_foreign_version_byte() {
        // 0xef is the testnet prefix; the checksum itself is sound.
        let testnet = base58check(0xef, &scalar_one());
        let err = decode_wif(&testnet).unwrap_err();
        assert!(matches!(err, ValidatorError::KeyFormat(msg) if msg.contains("version")));
    }

    #[test]
    fn btc_round_trip_compressed() {
        let derived = derive_btc_address(WIF_COMPRESSED_ONE).unwrap();
        assert_eq!(derived, ADDR_COMPRESSED_ONE);
        assert!(CoinType::Btc.addresses_match(&derived, ADDR_COMPRESSED_ONE));
    }

    #[test]
    fn btc_round_trip_uncompressed() {
        let derived = derive_btc_address(WIF_UNCOMPRESSED_ONE).unwrap();
        assert_eq!(derived, ADDR_UNCOMPRESSED_ONE);
    }

    #[test]
    fn btc_flipped_address_character_fails() {
        let mut flipped = ADDR_COMPRESSED_ONE.to_string();
        flipped.pop();
        flipped.push('J');
        let derived = derive_btc_address(WIF_COMPRESSED_ONE).unwrap();
        assert!(!CoinType::Btc.addresses_match(&derived, &flipped));
    }

    #[test]
    fn eth_round_trip_ignores_case_and_prefix() {
        let derived = derive_eth_address(ETH_DEV_KEY).unwrap();
        assert_eq!(derived, ETH_DEV_ADDRESS.to_lowercase());

        assert!(CoinType::Eth.addresses_match(&derived, ETH_DEV_ADDRESS));
        assert!(CoinType::Eth.addresses_match(&derived, &ETH_DEV_ADDRESS.to_lowercase()));
        assert!(CoinType::Eth.addresses_match(&derived, ETH_DEV_ADDRESS.trim_start_matches("0x")));
    }

    #[test]
    fn eth_scalar_one_address() {
        let key = "0x0000000000000000000000000000000000000000000000000000000000000001";
        let derived = derive_eth_address(key).unwrap();
        assert_eq!(derived, "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf");
    }

    #[test]
    fn eth_mismatched_address_fails() {
        let derived = derive_eth_address(ETH_DEV_KEY).unwrap();
        assert!(!CoinType::Eth.addresses_match(
            &derived,
            "0x0000000000000000000000000000000000000000"
        ));
    }

    #[test]
    fn eth_rejects_bad_hex() {
        let err = derive_eth_address("zzzz").unwrap_err();
        assert!(matches!(err, ValidatorError::KeyFormat(_)));

        let err = derive_eth_address("ab").unwrap_err();
        assert!(matches!(err, ValidatorError::KeyFormat(msg) if msg.contains("32 bytes")));
    }

    #[test]
    fn keccak_empty_input_anchor() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn verify_key_pair_records_format_errors() {
        let material = KeyMaterial {
            scheme: CoinType::Btc,
            private_key: "not-a-wif".to_string(),
            address: ADDR_COMPRESSED_ONE.to_string(),
        };
        let outcome = verify_key_pair(&material);
        assert!(!outcome.matched);
        assert!(outcome.derived_address.is_none());
        assert!(matches!(outcome.error, Some(ErrorKind::KeyFormat(_))));
    }

    #[test]
    fn verify_key_pair_accepts_valid_material() {
        let material = KeyMaterial {
            scheme: CoinType::Btc,
            private_key: WIF_COMPRESSED_ONE.to_string(),
            address: ADDR_COMPRESSED_ONE.to_string(),
        };
        let outcome = verify_key_pair(&material);
        assert!(outcome.matched);
        assert_eq!(outcome.derived_address.as_deref(), Some(ADDR_COMPRESSED_ONE));
        assert!(outcome.error.is_none());
    }
}
