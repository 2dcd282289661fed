use serde::{Deserialize, Serialize};

/// Delimiter used by the canonical layer-key encoding.
const DELIMITER: char = '|';

/// A 2D integer grid coordinate.
///
/// Every sparse layer is keyed by the canonical string form `"<row>|<col>"`
/// (row first — this ordering is part of the persisted map format and must
/// not change). Structural equality only; no normalization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The sentinel "outside the surface" position used to clear the hover cell.
    pub const OUTSIDE: Point = Point::new(-1, -1);

    /// Canonical layer-map key: `"<row>|<col>"`.
    pub fn to_key(self) -> String {
        format!("{}{}{}", self.y, DELIMITER, self.x)
    }

    /// Parse a canonical `"<row>|<col>"` key back into a point.
    ///
    /// Returns `None` on anything that is not exactly two integers, so a
    /// malformed persisted map surfaces as a format error instead of a panic.
    /// Handles negative coordinates (which naive `split('|')`-and-index code
    /// in the wild tends to get wrong).
    pub fn from_key(key: &str) -> Option<Self> {
        let (row, col) = key.split_once(DELIMITER)?;
        let y: i32 = row.trim().parse().ok()?;
        let x: i32 = col.trim().parse().ok()?;
        Some(Self { x, y })
    }

    pub fn is_outside(self) -> bool {
        self == Self::OUTSIDE
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_row_then_col() {
        assert_eq!(Point::new(3, 7).to_key(), "7|3");
        assert_eq!(Point::new(0, 0).to_key(), "0|0");
    }

    #[test]
    fn key_round_trip() {
        for &(x, y) in &[(0, 0), (1, 0), (0, 1), (15, 15), (-1, -1), (-42, 17), (i32::MAX, i32::MIN)] {
            let p = Point::new(x, y);
            assert_eq!(Point::from_key(&p.to_key()), Some(p));
        }
    }

    #[test]
    fn malformed_keys_are_rejected() {
        for key in ["", "|", "1", "1|", "|1", "a|b", "1|2|3", "1.5|2"] {
            assert_eq!(Point::from_key(key), None, "key {:?} should not parse", key);
        }
    }

    #[test]
    fn equality_is_structural() {
        assert_eq!(Point::new(2, 5), Point::from((2, 5)));
        assert_ne!(Point::new(5, 2), Point::new(2, 5));
    }

    #[test]
    fn outside_sentinel() {
        assert!(Point::OUTSIDE.is_outside());
        assert!(!Point::new(0, 0).is_outside());
        assert!(!Point::new(-1, 0).is_outside());
    }
}
