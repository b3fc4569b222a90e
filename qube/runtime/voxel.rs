//! Occupancy decoding over a 3x3x3 neighbourhood cube.

use std::{fmt, str::FromStr};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Low 27 bits, one per cell of the cube.
pub const VOXEL_MASK: u32 = 0x07FF_FFFF;

/// Default number of memoised signatures.
pub const DEFAULT_CACHE_CAPACITY: usize = 4096;

const HEX_MARKER: &str = "0x";

const fn face_mask(cells: [u32; 9]) -> u32 {
    let mut mask = 0;
    let mut i = 0;
    while i < cells.len() {
        mask |= 1 << cells[i];
        i += 1;
    }
    mask
}

const FORWARD_FACE: u32 = face_mask([2, 5, 8, 11, 14, 17, 20, 23, 26]);
const BACKWARD_FACE: u32 = face_mask([0, 3, 6, 9, 12, 15, 18, 21, 24]);
const LEFT_FACE: u32 = face_mask([0, 1, 2, 9, 10, 11, 18, 19, 20]);
const RIGHT_FACE: u32 = face_mask([6, 7, 8, 15, 16, 17, 24, 25, 26]);

/// Heading probed against one face of the cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Front face.
    Forward,
    /// Back face.
    Backward,
    /// Left face.
    Left,
    /// Right face.
    Right,
}

impl Direction {
    /// Every direction, in probe order.
    pub const ALL: [Self; 4] = [Self::Forward, Self::Backward, Self::Left, Self::Right];

    /// Lower-case name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Backward => "backward",
            Self::Left => "left",
            Self::Right => "right",
        }
    }

    /// Bits of the face this direction looks at.
    #[must_use]
    pub const fn face(self) -> u32 {
        match self {
            Self::Forward => FORWARD_FACE,
            Self::Backward => BACKWARD_FACE,
            Self::Left => LEFT_FACE,
            Self::Right => RIGHT_FACE,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Raised for direction names outside the four faces.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown direction: {0}")]
pub struct UnknownDirection(pub String);

impl FromStr for Direction {
    type Err = UnknownDirection;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|direction| direction.label() == value)
            .ok_or_else(|| UnknownDirection(value.to_string()))
    }
}

/// Decodes occupancy signatures with a bounded memo.
#[derive(Debug, Clone)]
pub struct VoxelCollisionDetector {
    cache: IndexMap<String, u32>,
    capacity: usize,
    hits: u64,
    misses: u64,
}

impl Default for VoxelCollisionDetector {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl VoxelCollisionDetector {
    /// Creates a detector keeping at most `capacity` decoded signatures.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            cache: IndexMap::with_capacity(capacity.min(DEFAULT_CACHE_CAPACITY)),
            capacity,
            hits: 0,
            misses: 0,
        }
    }

    /// Decodes the hex payload after `0x` into a 27-bit mask.
    ///
    /// Unparsable signatures decode to `0` (fully unoccupied) and are not
    /// memoised.
    pub fn decode(&mut self, signature: &str) -> u32 {
        if let Some(bits) = self.cache.get(signature) {
            self.hits += 1;
            return *bits;
        }
        self.misses += 1;
        let Some(bits) = decode_signature(signature) else {
            debug!(signature, "voxel signature unparsable; assuming empty");
            return 0;
        };
        if self.cache.len() >= self.capacity {
            self.cache.shift_remove_index(0);
        }
        self.cache.insert(signature.to_string(), bits);
        bits
    }

    /// Whether any cell on the face for `direction` is occupied.
    #[must_use]
    pub const fn collision_ahead(bits: u32, direction: Direction) -> bool {
        bits & direction.face() != 0
    }

    /// Name-based variant of [`Self::collision_ahead`]; unknown names see nothing.
    #[must_use]
    pub fn collision_ahead_named(bits: u32, direction: &str) -> bool {
        direction
            .parse()
            .is_ok_and(|direction| Self::collision_ahead(bits, direction))
    }

    /// Number of memoised signatures.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// `(hits, misses)` since construction.
    #[must_use]
    pub const fn cache_stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}

/// Payload runs from the first `0x` up to the next one, read as a signed,
/// arbitrarily long hex integer with optional `_` separators. Only the low
/// 27 bits survive, in two's complement for negative values.
fn decode_signature(signature: &str) -> Option<u32> {
    let start = signature.find(HEX_MARKER)? + HEX_MARKER.len();
    let payload = signature[start..].split(HEX_MARKER).next()?.trim();
    let (negative, digits) = match payload.as_bytes().first()? {
        b'-' => (true, &payload[1..]),
        b'+' => (false, &payload[1..]),
        _ => (false, payload),
    };
    let digits = digits
        .strip_prefix("0X")
        .map_or(digits, |rest| rest.strip_prefix('_').unwrap_or(rest));

    let mut value: u32 = 0;
    let mut seen_digit = false;
    let mut after_separator = false;
    for ch in digits.chars() {
        if ch == '_' {
            if !seen_digit || after_separator {
                return None;
            }
            after_separator = true;
            continue;
        }
        let digit = ch.to_digit(16)?;
        value = ((value << 4) | digit) & 0x0FFF_FFFF;
        seen_digit = true;
        after_separator = false;
    }
    if !seen_digit || after_separator {
        return None;
    }
    let value = if negative { value.wrapping_neg() } else { value };
    Some(value & VOXEL_MASK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_single_forward_bit() {
        let mut detector = VoxelCollisionDetector::default();
        let bits = detector.decode("voxel:sha256:0x00000004");
        assert_eq!(bits, 1 << 2);
        assert!(VoxelCollisionDetector::collision_ahead(bits, Direction::Forward));
        assert!(VoxelCollisionDetector::collision_ahead(bits, Direction::Left));
        assert!(!VoxelCollisionDetector::collision_ahead(bits, Direction::Backward));
    }

    #[test]
    fn zero_signature_is_clear_everywhere() {
        let mut detector = VoxelCollisionDetector::default();
        let bits = detector.decode("voxel:0x00000000");
        assert_eq!(bits, 0);
        for direction in Direction::ALL {
            assert!(!VoxelCollisionDetector::collision_ahead(bits, direction));
        }
    }

    #[test]
    fn payload_is_masked_to_27_bits() {
        let mut detector = VoxelCollisionDetector::default();
        assert_eq!(detector.decode("0xFFFFFFFFFFFFFFFFFFFF"), VOXEL_MASK);
        assert_eq!(detector.decode("0x1_0"), 16);
        assert_eq!(detector.decode("0x-4"), VOXEL_MASK - 3);
    }

    #[test]
    fn unparsable_signatures_decode_to_zero_and_are_not_cached() {
        let mut detector = VoxelCollisionDetector::default();
        for raw in ["voxel:none", "0x", "0xZZ", "0x0x12", "0x__1", "0x1_"] {
            assert_eq!(detector.decode(raw), 0, "{raw}");
        }
        assert_eq!(detector.cached(), 0);
    }

    #[test]
    fn cache_hits_and_evicts_oldest() {
        let mut detector = VoxelCollisionDetector::new(2);
        detector.decode("0x1");
        detector.decode("0x2");
        detector.decode("0x1");
        assert_eq!(detector.cache_stats(), (1, 2));
        detector.decode("0x3");
        assert_eq!(detector.cached(), 2);
        detector.decode("0x1");
        assert_eq!(detector.cache_stats(), (1, 4));
    }

    #[test]
    fn named_directions() {
        assert!(VoxelCollisionDetector::collision_ahead_named(1 << 26, "right"));
        assert!(!VoxelCollisionDetector::collision_ahead_named(VOXEL_MASK, "up"));
        assert_eq!("left".parse::<Direction>().unwrap(), Direction::Left);
        assert!("Forward".parse::<Direction>().is_err());
    }
}
