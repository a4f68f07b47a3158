//! Rating intervals for range partitioning.
//!
//! Both the bulk builder (as SQL predicates) and the insert router (as a
//! direct index computation) go through [`RangeBounds::for_partition`], so a
//! rating sitting exactly on a boundary lands in the same partition either
//! way.

pub const MIN_RATING: f64 = 0.0;
pub const MAX_RATING: f64 = 5.0;

/// Interval owned by one range partition: `[lower, upper]` for partition 0,
/// `(lower, upper]` for every other partition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeBounds {
    pub lower: f64,
    pub upper: f64,
    pub lower_inclusive: bool,
}

impl RangeBounds {
    pub fn for_partition(index: usize, partitions: usize) -> Self {
        debug_assert!(partitions > 0 && index < partitions);
        let delta = MAX_RATING / partitions as f64;
        let lower = if index == 0 {
            MIN_RATING
        } else {
            index as f64 * delta
        };
        // The last upper bound is pinned so float drift can never drop 5.0.
        let upper = if index + 1 == partitions {
            MAX_RATING
        } else {
            (index + 1) as f64 * delta
        };
        Self {
            lower,
            upper,
            lower_inclusive: index == 0,
        }
    }

    pub fn contains(&self, rating: f64) -> bool {
        let above_lower = if self.lower_inclusive {
            rating >= self.lower
        } else {
            rating > self.lower
        };
        above_lower && rating <= self.upper
    }

    /// `WHERE` fragment with two positional parameters: lower, then upper.
    pub fn sql_predicate(&self, column: &str) -> String {
        let op = if self.lower_inclusive { ">=" } else { ">" };
        format!("{column} {op} ? AND {column} <= ?")
    }
}

/// Index of the range partition that owns `rating` when `partitions`
/// partitions exist. `rating` must already be validated into [0, 5].
pub fn partition_for_rating(rating: f64, partitions: usize) -> usize {
    debug_assert!(partitions > 0);
    let delta = MAX_RATING / partitions as f64;
    let mut idx = (rating / delta).floor() as usize;
    if idx != 0 && rating == idx as f64 * delta {
        idx -= 1;
    }
    idx = idx.min(partitions - 1);

    // The division above can be off by one ulp near a boundary; settle
    // against the exact bounds the builder uses.
    loop {
        let bounds = RangeBounds::for_partition(idx, partitions);
        if idx > 0 && rating <= bounds.lower {
            idx -= 1;
        } else if idx + 1 < partitions && rating > bounds.upper {
            idx += 1;
        } else {
            return idx;
        }
    }
}

pub fn is_valid_rating(rating: f64) -> bool {
    rating.is_finite() && (MIN_RATING..=MAX_RATING).contains(&rating)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owners(rating: f64, partitions: usize) -> Vec<usize> {
        (0..partitions)
            .filter(|&i| RangeBounds::for_partition(i, partitions).contains(rating))
            .collect()
    }

    #[test]
    fn test_two_partitions() {
        assert_eq!(partition_for_rating(0.0, 2), 0);
        assert_eq!(partition_for_rating(2.5, 2), 0);
        assert_eq!(partition_for_rating(2.6, 2), 1);
        assert_eq!(partition_for_rating(5.0, 2), 1);
    }

    #[test]
    fn test_single_partition_owns_everything() {
        for rating in [0.0, 0.5, 2.5, 4.99, 5.0] {
            assert_eq!(partition_for_rating(rating, 1), 0);
        }
        let b = RangeBounds::for_partition(0, 1);
        assert_eq!((b.lower, b.upper, b.lower_inclusive), (0.0, 5.0, true));
    }

    #[test]
    fn test_bounds_are_contiguous() {
        for n in 1..=32 {
            for i in 1..n {
                let prev = RangeBounds::for_partition(i - 1, n);
                let cur = RangeBounds::for_partition(i, n);
                assert_eq!(prev.upper, cur.lower, "n={n} i={i}");
                assert!(!cur.lower_inclusive);
            }
            assert_eq!(RangeBounds::for_partition(n - 1, n).upper, MAX_RATING);
        }
    }

    #[test]
    fn test_boundaries_match_predicates() {
        for n in 1..=32 {
            let delta = MAX_RATING / n as f64;
            for k in 0..=n {
                let rating = (k as f64 * delta).min(MAX_RATING);
                let idx = partition_for_rating(rating, n);
                assert_eq!(owners(rating, n), vec![idx], "n={n} k={k}");
                if k > 0 && k < n {
                    assert_eq!(idx, k - 1, "boundary goes low: n={n} k={k}");
                }
            }
        }
    }

    #[test]
    fn test_grid_has_exactly_one_owner() {
        for n in [1, 2, 3, 4, 5, 6, 7, 9, 10, 11, 13, 100] {
            for step in 0..=500 {
                let rating = step as f64 / 100.0;
                let idx = partition_for_rating(rating, n);
                assert_eq!(owners(rating, n), vec![idx], "n={n} rating={rating}");
            }
        }
    }

    #[test]
    fn test_sql_predicate() {
        assert_eq!(
            RangeBounds::for_partition(0, 2).sql_predicate("rating"),
            "rating >= ? AND rating <= ?"
        );
        assert_eq!(
            RangeBounds::for_partition(1, 2).sql_predicate("rating"),
            "rating > ? AND rating <= ?"
        );
    }

    #[test]
    fn test_valid_rating() {
        assert!(is_valid_rating(0.0));
        assert!(is_valid_rating(5.0));
        assert!(!is_valid_rating(-0.5));
        assert!(!is_valid_rating(5.5));
        assert!(!is_valid_rating(f64::NAN));
    }
}
