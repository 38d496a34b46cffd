//! The visible-set diffing engine. Each connection tracks which instances
//! it can currently see; every time that set is recomputed we need to know
//! which instances just left view, which just entered, and which were
//! already visible and simply need a refreshed state pushed to the client.

use crate::model::InstanceId;
use std::collections::HashSet;

/// Half the edge length of the square viewport, in tiles. A player sees a
/// `2 * VIEW_RADIUS + 1` square centred on themselves, i.e. 21x21.
pub const VIEW_RADIUS: i32 = 10;

pub fn coord_in_view(center_y: i32, center_x: i32, y: i32, x: i32) -> bool {
    (center_y - VIEW_RADIUS..=center_y + VIEW_RADIUS).contains(&y)
        && (center_x - VIEW_RADIUS..=center_x + VIEW_RADIUS).contains(&x)
}

#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct ViewDiff {
    pub left: Vec<InstanceId>,
    pub entered: Vec<InstanceId>,
    pub stayed: Vec<InstanceId>,
}

/// Computes the three-way diff between the previously visible set and the
/// newly computed one. `previous` is consumed; `current` becomes the
/// caller's new tracked set.
pub fn diff_visible_sets(previous: &HashSet<InstanceId>, current: &HashSet<InstanceId>) -> ViewDiff {
    let left = previous.difference(current).copied().collect();
    let entered = current.difference(previous).copied().collect();
    let stayed = current.intersection(previous).copied().collect();

    ViewDiff { left, entered, stayed }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coord_in_view_bounds() {
        assert!(coord_in_view(10, 10, 0, 10));
        assert!(coord_in_view(10, 10, 20, 10));
        assert!(!coord_in_view(10, 10, 21, 10));
        assert!(!coord_in_view(10, 10, -1, 10));
    }

    #[test]
    fn test_diff_classifies_correctly() {
        let previous: HashSet<InstanceId> = [1, 2, 3].into_iter().collect();
        let current: HashSet<InstanceId> = [2, 3, 4].into_iter().collect();

        let mut diff = diff_visible_sets(&previous, &current);
        diff.left.sort();
        diff.entered.sort();
        diff.stayed.sort();

        assert_eq!(diff.left, vec![1]);
        assert_eq!(diff.entered, vec![4]);
        assert_eq!(diff.stayed, vec![2, 3]);
    }

    #[test]
    fn test_diff_empty_previous_is_all_entered() {
        let previous = HashSet::new();
        let current: HashSet<InstanceId> = [1, 2].into_iter().collect();

        let diff = diff_visible_sets(&previous, &current);

        assert!(diff.left.is_empty());
        assert_eq!(diff.entered.len(), 2);
        assert!(diff.stayed.is_empty());
    }

    #[test]
    fn test_visible_set_bounded_by_viewport_area() {
        // The maximum number of instances that can simultaneously be "entered"
        // in one diff is bounded by the viewport area, 21 * 21 = 441.
        let previous = HashSet::new();
        let current: HashSet<InstanceId> = (0..441).collect();

        let diff = diff_visible_sets(&previous, &current);

        assert!(diff.entered.len() <= 441);
    }
}
