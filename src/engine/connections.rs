// Proximity connections between particles.
//
// Brute-force O(N²) pass over every unordered pair. N is fixed and small
// (60 particles = 1,770 distance checks per frame), so no spatial grid.

use glam::Vec3;

/// Unordered pair of particle indices with `a < b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Connection {
    pub a: usize,
    pub b: usize,
}

/// Rebuild `out` with all pairs closer than `threshold`, in ascending (i, j)
/// order with i as the outer loop.
pub fn derive_connections(positions: &[Vec3], threshold: f32, out: &mut Vec<Connection>) {
    out.clear();
    for i in 0..positions.len() {
        for j in (i + 1)..positions.len() {
            if positions[i].distance(positions[j]) < threshold {
                out.push(Connection { a: i, b: j });
            }
        }
    }
}

/// Rebuild the line-segment vertex list for one frame.
///
/// Clears `out`, then appends both endpoints (6 scalars) of every connection
/// in order. The previous contents are never reused.
pub fn build_line_vertices(positions: &[Vec3], connections: &[Connection], out: &mut Vec<f32>) {
    out.clear();
    for c in connections {
        out.extend_from_slice(&positions[c.a].to_array());
        out.extend_from_slice(&positions[c.b].to_array());
    }
}

/// Upper bound on connections for `count` particles: one per unordered pair.
pub fn max_connections(count: usize) -> usize {
    count * count.saturating_sub(1) / 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng, rngs::StdRng};
    use std::collections::HashSet;

    fn connections(positions: &[Vec3], threshold: f32) -> Vec<Connection> {
        let mut out = vec![Connection { a: 9, b: 9 }];
        derive_connections(positions, threshold, &mut out);
        out
    }

    #[test]
    fn close_pair_is_connected() {
        let positions = [Vec3::ZERO, Vec3::new(3.0, 0.0, 0.0)];
        assert_eq!(
            connections(&positions, 4.0),
            vec![Connection { a: 0, b: 1 }]
        );
    }

    #[test]
    fn distant_pair_is_not_connected() {
        let positions = [Vec3::ZERO, Vec3::new(5.0, 0.0, 0.0)];
        assert!(connections(&positions, 4.0).is_empty());
    }

    #[test]
    fn threshold_is_exclusive() {
        let positions = [Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0)];
        assert!(connections(&positions, 4.0).is_empty());
    }

    #[test]
    fn matches_brute_force_pair_set_without_self_connections() {
        let mut rng = StdRng::seed_from_u64(7);
        let positions: Vec<Vec3> = (0..40)
            .map(|_| {
                Vec3::new(
                    rng.gen_range(-6.0..6.0),
                    rng.gen_range(-3.5..3.5),
                    rng.gen_range(-3.5..3.5),
                )
            })
            .collect();

        let derived: HashSet<(usize, usize)> = connections(&positions, 4.0)
            .into_iter()
            .map(|c| (c.a, c.b))
            .collect();

        let mut expected = HashSet::new();
        for (i, p) in positions.iter().enumerate() {
            for (j, q) in positions.iter().enumerate() {
                if i != j && p.distance(*q) < 4.0 {
                    expected.insert((i.min(j), i.max(j)));
                }
            }
        }

        assert_eq!(derived, expected);
        assert!(derived.iter().all(|&(a, b)| a < b));
    }

    #[test]
    fn pairs_are_emitted_in_ascending_order() {
        let positions = [Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z];
        let pairs: Vec<(usize, usize)> = connections(&positions, 4.0)
            .into_iter()
            .map(|c| (c.a, c.b))
            .collect();
        assert_eq!(pairs, vec![(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)]);
    }

    #[test]
    fn vertex_list_is_rebuilt_deterministically() {
        let positions = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 2.0, 0.5),
            Vec3::new(9.0, 0.0, 0.0),
        ];
        let mut first = vec![42.0; 100];
        build_line_vertices(&positions, &connections(&positions, 4.0), &mut first);
        assert_eq!(first, vec![0.0, 0.0, 0.0, 1.0, 2.0, 0.5]);

        let mut second = Vec::new();
        build_line_vertices(&positions, &connections(&positions, 4.0), &mut second);
        assert_eq!(first, second);
    }

    #[test]
    fn max_connections_counts_unordered_pairs() {
        assert_eq!(max_connections(0), 0);
        assert_eq!(max_connections(1), 0);
        assert_eq!(max_connections(60), 1770);
    }
}
