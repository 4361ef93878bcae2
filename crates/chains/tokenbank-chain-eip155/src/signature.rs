//! Splitting a wallet-produced signature into the `(v, r, s)` the bank expects.
//!
//! `permitDeposit` takes the three components separately, while
//! `depositWithPermit2` forwards the packed 65 bytes untouched.

use alloy_primitives::{B256, Bytes, hex};

/// Length of a packed `r || s || v` signature in bytes.
pub const SIGNATURE_LENGTH: usize = 65;

/// Expected length of the hex form, `0x` prefix included.
pub const SIGNATURE_HEX_LENGTH: usize = 2 + SIGNATURE_LENGTH * 2;

/// Components of a packed ECDSA signature, taken as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureParts {
    pub r: B256,
    pub s: B256,
    /// Last byte of the signature; `27`/`28` from most wallets.
    pub v: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureFormatError {
    #[error("Signature is missing")]
    Missing,
    #[error("Signature must start with 0x")]
    MissingPrefix,
    #[error("Signature must be {SIGNATURE_HEX_LENGTH} characters long, got {actual}")]
    WrongLength { actual: usize },
    #[error("Signature is not valid hex")]
    InvalidHex,
}

/// Decomposes a `0x`-prefixed 65-byte hex signature.
///
/// `r` is bytes `0..32`, `s` is bytes `32..64` and `v` is byte `64`. No
/// normalisation is applied to any of them.
///
/// ```
/// use tokenbank_chain_eip155::signature::decompose;
///
/// let sig = format!("0x{}{}1b", "11".repeat(32), "22".repeat(32));
/// let parts = decompose(&sig).unwrap();
/// assert_eq!(parts.v, 27);
/// assert_eq!(parts.r.0, [0x11; 32]);
/// ```
pub fn decompose(signature: &str) -> Result<SignatureParts, SignatureFormatError> {
    let bytes = decode_prefixed(signature)?;
    if signature.len() != SIGNATURE_HEX_LENGTH || bytes.len() != SIGNATURE_LENGTH {
        return Err(SignatureFormatError::WrongLength {
            actual: signature.len(),
        });
    }
    Ok(SignatureParts {
        r: B256::from_slice(&bytes[0..32]),
        s: B256::from_slice(&bytes[32..64]),
        v: bytes[64],
    })
}

/// Decodes a `0x`-prefixed signature into raw bytes without checking its length.
///
/// Permit2 verifies compact and contract signatures as well, so the bytes are
/// passed through. A bare `0x` counts as a missing signature.
pub fn raw_signature_bytes(signature: &str) -> Result<Bytes, SignatureFormatError> {
    let bytes = decode_prefixed(signature)?;
    if bytes.is_empty() {
        return Err(SignatureFormatError::Missing);
    }
    Ok(Bytes::from(bytes))
}

fn decode_prefixed(signature: &str) -> Result<Vec<u8>, SignatureFormatError> {
    if signature.is_empty() {
        return Err(SignatureFormatError::Missing);
    }
    let digits = signature
        .strip_prefix("0x")
        .ok_or(SignatureFormatError::MissingPrefix)?;
    if digits.len() % 2 != 0 {
        return Err(SignatureFormatError::WrongLength {
            actual: signature.len(),
        });
    }
    hex::decode(digits).map_err(|_| SignatureFormatError::InvalidHex)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signature(r: u8, s: u8, v: u8) -> String {
        format!(
            "0x{}{}{}",
            hex::encode([r; 32]),
            hex::encode([s; 32]),
            hex::encode([v])
        )
    }

    #[test]
    fn test_decompose_splits_components() {
        let sig = signature(0xaa, 0xbb, 0x1c);
        assert_eq!(sig.len(), SIGNATURE_HEX_LENGTH);
        let parts = decompose(&sig).unwrap();
        assert_eq!(parts.r, B256::repeat_byte(0xaa));
        assert_eq!(parts.s, B256::repeat_byte(0xbb));
        assert_eq!(parts.v, 28);
    }

    #[test]
    fn test_decompose_is_pure() {
        let sig = signature(0x01, 0x02, 0x1b);
        assert_eq!(decompose(&sig).unwrap(), decompose(&sig).unwrap());
    }

    #[test]
    fn test_v_is_not_normalised() {
        let parts = decompose(&signature(0x01, 0x02, 0x00)).unwrap();
        assert_eq!(parts.v, 0);
        let parts = decompose(&signature(0x01, 0x02, 0xff)).unwrap();
        assert_eq!(parts.v, 0xff);
    }

    #[test]
    fn test_uppercase_hex_accepted() {
        let sig = format!("0x{}", "AB".repeat(65));
        assert!(decompose(&sig).is_ok());
    }

    #[test]
    fn test_short_signatures_fail() {
        let full = signature(0xaa, 0xbb, 0x1b);
        for len in [2, 4, 66, 130, 131] {
            let err = decompose(&full[..len]).unwrap_err();
            assert!(
                matches!(
                    err,
                    SignatureFormatError::WrongLength { .. } | SignatureFormatError::InvalidHex
                ),
                "length {len}: {err:?}"
            );
        }
        assert_eq!(
            decompose(&full[..130]).unwrap_err(),
            SignatureFormatError::WrongLength { actual: 130 }
        );
    }

    #[test]
    fn test_long_signature_fails() {
        let sig = format!("{}00", signature(0xaa, 0xbb, 0x1b));
        assert_eq!(
            decompose(&sig).unwrap_err(),
            SignatureFormatError::WrongLength { actual: 134 }
        );
    }

    #[test]
    fn test_missing_and_prefix() {
        assert_eq!(decompose("").unwrap_err(), SignatureFormatError::Missing);
        let without_prefix = signature(0xaa, 0xbb, 0x1b)[2..].to_string();
        assert_eq!(
            decompose(&without_prefix).unwrap_err(),
            SignatureFormatError::MissingPrefix
        );
    }

    #[test]
    fn test_invalid_hex() {
        let sig = format!("0x{}", "zz".repeat(65));
        assert_eq!(decompose(&sig).unwrap_err(), SignatureFormatError::InvalidHex);
    }

    #[test]
    fn test_raw_bytes_passthrough() {
        let sig = signature(0xaa, 0xbb, 0x1b);
        let raw = raw_signature_bytes(&sig).unwrap();
        assert_eq!(raw.len(), 65);
        assert_eq!(raw[64], 0x1b);
        // 64-byte compact signatures are forwarded too.
        let compact = format!("0x{}", "11".repeat(64));
        assert_eq!(raw_signature_bytes(&compact).unwrap().len(), 64);
        assert_eq!(
            raw_signature_bytes("abcd").unwrap_err(),
            SignatureFormatError::MissingPrefix
        );
    }

    #[test]
    fn test_raw_bytes_reject_empty_body() {
        assert_eq!(
            raw_signature_bytes("0x").unwrap_err(),
            SignatureFormatError::Missing
        );
        assert_eq!(
            raw_signature_bytes("").unwrap_err(),
            SignatureFormatError::Missing
        );
    }
}
