//! Derivation paths, serialized the way the Oasis app expects them.
//!
//! Two shapes are accepted: the 3-component ADR 8 path (`m/44'/474'/x'`) and the 5-component
//! legacy path. Every component is hardened, whatever the caller passed in, and written as a
//! little-endian `u32`.

use thiserror::Error;

use crate::constants::HARDENED;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("invalid path: expected 3 or 5 components, got {0}")]
    InvalidLength(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationPath(Vec<u32>);

impl DerivationPath {
    pub fn new(components: &[u32]) -> Result<Self, PathError> {
        match components.len() {
            3 | 5 => Ok(Self(components.to_vec())),
            n => Err(PathError::InvalidLength(n)),
        }
    }

    pub fn components(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Serializes the path as `4 * len` bytes of hardened little-endian components.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.0.len() * 4);
        for component in &self.0 {
            buf.extend_from_slice(&(component | HARDENED).to_le_bytes());
        }
        buf
    }
}

impl TryFrom<&[u32]> for DerivationPath {
    type Error = PathError;

    fn try_from(components: &[u32]) -> Result<Self, Self::Error> {
        Self::new(components)
    }
}

impl TryFrom<Vec<u32>> for DerivationPath {
    type Error = PathError;

    fn try_from(components: Vec<u32>) -> Result<Self, Self::Error> {
        Self::new(&components)
    }
}

/// Validates and serializes a path in one step.
pub fn encode_path(components: &[u32]) -> Result<Vec<u8>, PathError> {
    Ok(DerivationPath::new(components)?.encode())
}
