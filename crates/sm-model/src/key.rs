// key.rs — Elliptic-curve public keys.
//
// A managed application is identified by its P-256 public key. The key is
// kept as its two raw 32-byte coordinates; every other representation
// (uncompressed SEC1 point, storage blob, hex string) is derived from them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Size of one affine coordinate of a P-256 point.
pub const ECC_COORDINATE_SIZE: usize = 32;

/// Size of an exported public key (`x || y`).
pub const ECC_PUBLIC_KEY_SIZE: usize = 2 * ECC_COORDINATE_SIZE;

/// Leading byte of an uncompressed SEC1 point.
const UNCOMPRESSED_POINT_TAG: u8 = 0x04;

/// A P-256 public key.
///
/// Ordering and equality are byte-wise over `x || y`, which is also the
/// primary key used by storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PublicKey {
    x: [u8; ECC_COORDINATE_SIZE],
    y: [u8; ECC_COORDINATE_SIZE],
}

impl PublicKey {
    pub fn new(x: [u8; ECC_COORDINATE_SIZE], y: [u8; ECC_COORDINATE_SIZE]) -> Self {
        Self { x, y }
    }

    /// Import a key exported with [`PublicKey::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ModelError> {
        if bytes.len() != ECC_PUBLIC_KEY_SIZE {
            return Err(ModelError::InvalidKeyLength {
                expected: ECC_PUBLIC_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut key = Self::default();
        key.x.copy_from_slice(&bytes[..ECC_COORDINATE_SIZE]);
        key.y.copy_from_slice(&bytes[ECC_COORDINATE_SIZE..]);
        Ok(key)
    }

    /// Import an uncompressed SEC1 point (`0x04 || x || y`).
    pub fn from_uncompressed_point(point: &[u8]) -> Result<Self, ModelError> {
        if point.len() != ECC_PUBLIC_KEY_SIZE + 1 {
            return Err(ModelError::InvalidKeyLength {
                expected: ECC_PUBLIC_KEY_SIZE + 1,
                actual: point.len(),
            });
        }
        if point[0] != UNCOMPRESSED_POINT_TAG {
            return Err(ModelError::UnsupportedPointFormat(point[0]));
        }
        Self::from_bytes(&point[1..])
    }

    pub fn x(&self) -> &[u8; ECC_COORDINATE_SIZE] {
        &self.x
    }

    pub fn y(&self) -> &[u8; ECC_COORDINATE_SIZE] {
        &self.y
    }

    /// Overwrite both coordinates at once.
    pub fn set(&mut self, x: [u8; ECC_COORDINATE_SIZE], y: [u8; ECC_COORDINATE_SIZE]) {
        self.x = x;
        self.y = y;
    }

    /// Export as `x || y`.
    pub fn to_bytes(&self) -> [u8; ECC_PUBLIC_KEY_SIZE] {
        let mut out = [0u8; ECC_PUBLIC_KEY_SIZE];
        out[..ECC_COORDINATE_SIZE].copy_from_slice(&self.x);
        out[ECC_COORDINATE_SIZE..].copy_from_slice(&self.y);
        out
    }

    /// Export as an uncompressed SEC1 point, the form used in
    /// SubjectPublicKeyInfo and by signature verification.
    pub fn to_uncompressed_point(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ECC_PUBLIC_KEY_SIZE + 1);
        out.push(UNCOMPRESSED_POINT_TAG);
        out.extend_from_slice(&self.x);
        out.extend_from_slice(&self.y);
        out
    }

    /// True when both coordinates are zero (a key that was never set).
    pub fn is_empty(&self) -> bool {
        self.x.iter().chain(self.y.iter()).all(|b| *b == 0)
    }
}

/// Lowercase hex of `x || y`.
impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.x.iter().chain(self.y.iter()) {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bytes() -> Vec<u8> {
        (0..ECC_PUBLIC_KEY_SIZE as u8).collect()
    }

    #[test]
    fn from_bytes_splits_coordinates() {
        let key = PublicKey::from_bytes(&sample_bytes()).unwrap();
        assert_eq!(key.x()[0], 0);
        assert_eq!(key.y()[0], 32);
        assert_eq!(key.to_bytes().to_vec(), sample_bytes());
    }

    #[test]
    fn from_bytes_rejects_wrong_length() {
        let err = PublicKey::from_bytes(&[1, 2, 3]).unwrap_err();
        assert!(matches!(
            err,
            ModelError::InvalidKeyLength {
                expected: 64,
                actual: 3
            }
        ));
    }

    #[test]
    fn uncompressed_point_round_trip() {
        let key = PublicKey::from_bytes(&sample_bytes()).unwrap();
        let point = key.to_uncompressed_point();
        assert_eq!(point.len(), 65);
        assert_eq!(point[0], 0x04);
        assert_eq!(PublicKey::from_uncompressed_point(&point).unwrap(), key);
    }

    #[test]
    fn compressed_point_is_rejected() {
        let mut point = vec![0x02];
        point.extend_from_slice(&sample_bytes());
        assert!(matches!(
            PublicKey::from_uncompressed_point(&point),
            Err(ModelError::UnsupportedPointFormat(0x02))
        ));
    }

    #[test]
    fn set_overwrites_both_coordinates() {
        let mut key = PublicKey::from_bytes(&sample_bytes()).unwrap();
        key.set([0xaa; 32], [0xbb; 32]);
        assert_eq!(key.x(), &[0xaa; 32]);
        assert_eq!(key.y(), &[0xbb; 32]);
    }

    #[test]
    fn empty_key_detection() {
        assert!(PublicKey::default().is_empty());
        assert!(!PublicKey::new([0; 32], [1; 32]).is_empty());
    }

    #[test]
    fn display_is_lowercase_hex() {
        let key = PublicKey::new([0xab; 32], [0x01; 32]);
        let hex = key.to_string();
        assert_eq!(hex.len(), 128);
        assert!(hex.starts_with("abab"));
        assert!(hex.ends_with("0101"));
    }

    #[test]
    fn ordering_is_bytewise() {
        let low = PublicKey::new([0; 32], [0xff; 32]);
        let high = PublicKey::new([1; 32], [0; 32]);
        assert!(low < high);
    }
}
