//! Distance math and the initiator tie-break shared by every peer.

use std::cmp::Ordering;

/// Radius, in coordinate units, inside which two peers hear each other.
pub const DEFAULT_MAX_DISTANCE: f64 = 500.0;

/// Euclidean distance between two points.
pub fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - b.0).hypot(a.1 - b.1)
}

/// Whether `self_id` is the side that dials `other_id`.
///
/// For any two distinct ids exactly one side returns `true`, so both peers
/// agree on the caller without exchanging a message.
pub fn initiates(self_id: &str, other_id: &str) -> bool {
    other_id.cmp(self_id) == Ordering::Less
}

/// Quadratic falloff from full strength at distance zero down to `floor`
/// at `max_distance` and beyond.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Falloff {
    pub max_distance: f64,
    pub floor: f64,
}

impl Falloff {
    pub fn new(max_distance: f64, floor: f64) -> Self {
        Self {
            max_distance,
            floor,
        }
    }

    /// `max(floor, (1 - clamp(d / max, 0, 1))^2)`
    pub fn gain(&self, d: f64) -> f64 {
        let ratio = (d / self.max_distance).clamp(0.0, 1.0);
        (1.0 - ratio).powi(2).max(self.floor)
    }

    pub fn in_range(&self, d: f64) -> bool {
        d < self.max_distance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_euclidean() {
        assert_eq!(distance((0.0, 0.0), (3.0, 4.0)), 5.0);
        assert_eq!(distance((3.0, 4.0), (0.0, 0.0)), 5.0);
        assert_eq!(distance((1.5, 1.5), (1.5, 1.5)), 0.0);
    }

    #[test]
    fn exactly_one_side_initiates() {
        let ids = ["A", "B", "client_01", "client_02", "a", "Z", "client_0", "ö"];
        for a in ids {
            for b in ids {
                if a == b {
                    assert!(!initiates(a, b));
                    continue;
                }
                assert_ne!(initiates(a, b), initiates(b, a), "{a} vs {b}");
            }
        }
    }

    #[test]
    fn greater_id_dials() {
        // "A" < "B", so "B" is the caller for this pair.
        assert!(initiates("B", "A"));
        assert!(!initiates("A", "B"));
    }

    #[test]
    fn gain_is_one_at_origin() {
        let falloff = Falloff::new(500.0, 0.1);
        assert_eq!(falloff.gain(0.0), 1.0);
    }

    #[test]
    fn gain_reaches_floor_at_and_beyond_max() {
        let audio = Falloff::new(500.0, 0.1);
        let visual = Falloff::new(500.0, 0.0);
        for d in [500.0, 500.1, 1_000.0, f64::MAX] {
            assert_eq!(audio.gain(d), 0.1);
            assert_eq!(visual.gain(d), 0.0);
        }
    }

    #[test]
    fn gain_is_non_increasing() {
        let falloff = Falloff::new(300.0, 0.05);
        let mut prev = falloff.gain(0.0);
        let mut d = 0.0;
        while d <= 400.0 {
            let g = falloff.gain(d);
            assert!(g <= prev, "gain rose at d={d}: {g} > {prev}");
            prev = g;
            d += 0.5;
        }
    }

    #[test]
    fn gain_is_quadratic_inside_range() {
        let falloff = Falloff::new(500.0, 0.0);
        assert!((falloff.gain(250.0) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn in_range_is_strict() {
        let falloff = Falloff::new(500.0, 0.0);
        assert!(falloff.in_range(499.999));
        assert!(!falloff.in_range(500.0));
    }
}
