//! Collapses per-slice offset estimates into one supported offset.

use super::types::{Alignment, SliceShift};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
struct Group {
    first_seen: usize,
    count: usize,
    cost_sum: f64,
}

/// Picks the offset shared by the largest number of slices.
///
/// Two estimates agree only when their integer offsets are equal. Empty
/// entries (slices without a match) cast no vote. Among groups of equal size
/// the one whose first vote comes earliest wins. When no slice matched the
/// result is [`Alignment::none`].
pub fn vote(shifts: &[Option<SliceShift>]) -> Alignment {
    let mut groups: HashMap<(i32, i32), Group> = HashMap::new();

    for (index, shift) in shifts.iter().enumerate() {
        let Some(shift) = shift else {
            continue;
        };
        let group = groups.entry((shift.dx, shift.dy)).or_insert(Group {
            first_seen: index,
            count: 0,
            cost_sum: 0.0,
        });
        group.count += 1;
        group.cost_sum += shift.cost;
    }

    groups
        .into_iter()
        .max_by(|(_, a), (_, b)| {
            a.count
                .cmp(&b.count)
                .then_with(|| b.first_seen.cmp(&a.first_seen))
        })
        .map(|((dx, dy), group)| {
            Alignment::new(dx, dy, group.cost_sum / group.count as f64, group.count)
        })
        .unwrap_or_else(Alignment::none)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shift(dx: i32, dy: i32, cost: f64) -> Option<SliceShift> {
        Some(SliceShift { dx, dy, cost })
    }

    #[test]
    fn test_largest_group_wins_with_group_mean_cost() {
        let shifts = vec![
            shift(1, 1, 9.0),
            shift(5, -2, 1.0),
            None,
            shift(5, -2, 3.0),
            shift(1, 1, 9.0),
            shift(5, -2, 2.0),
        ];
        let result = vote(&shifts);
        assert_eq!((result.dx, result.dy), (5, -2));
        assert_eq!(result.support_count, 3);
        assert!((result.cost - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_ties_keep_first_seen_offset() {
        let shifts = vec![
            None,
            shift(3, 4, 0.5),
            shift(-1, 0, 0.1),
            shift(-1, 0, 0.1),
            shift(3, 4, 0.5),
        ];
        let result = vote(&shifts);
        assert_eq!((result.dx, result.dy), (3, 4));
        assert_eq!(result.support_count, 2);
    }

    #[test]
    fn test_all_empty_is_zero_support() {
        assert_eq!(vote(&[None, None, None]), Alignment::none());
        assert_eq!(vote(&[]), Alignment::none());
    }

    #[test]
    fn test_agreement_is_exact() {
        let shifts = vec![shift(2, 2, 1.0), shift(2, 3, 1.0), shift(3, 2, 1.0)];
        let result = vote(&shifts);
        assert_eq!(result.support_count, 1);
        assert_eq!((result.dx, result.dy), (2, 2));
    }

    #[test]
    fn test_support_never_exceeds_votes() {
        let shifts: Vec<_> = (0..20)
            .map(|i| if i % 3 == 0 { None } else { shift(i % 2, 0, 1.0) })
            .collect();
        let result = vote(&shifts);
        let votes = shifts.iter().filter(|s| s.is_some()).count();
        assert!(result.support_count >= 1 && result.support_count <= votes);
    }
}
