//! Vertex deviation between two `vertices_plus` lists.

use crate::value::{Value, Vec3};
use serde::Serialize;

/// How far one side's vertices moved.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VertexDeviation {
    pub changed_count: usize,
    /// Sum of `|dx| + |dy| + |dz|` over changed vertices.
    pub total_deviation: f64,
    /// Largest single-axis move.
    pub max_deviation: f64,
    /// `total_deviation / (changed_count * 3)`.
    pub avg_deviation: f64,
}

/// Extract vertex sets from a `vertices_plus` value.
pub fn vertex_sets(value: &Value) -> Option<Vec<Vec<Vec3>>> {
    value
        .as_list()?
        .iter()
        .map(|set| set.as_list()?.iter().map(Value::as_vector3).collect())
        .collect()
}

/// Compare vertex sets pairwise.
///
/// Sets and vertices are matched by position. A vertex present on only one
/// side counts as changed without adding deviation. Returns `None` when
/// nothing moved.
pub fn compare_vertex_sets(a: &[Vec<Vec3>], b: &[Vec<Vec3>]) -> Option<VertexDeviation> {
    let mut changed_count = 0usize;
    let mut total = 0.0f64;
    let mut max = 0.0f64;

    for i in 0..a.len().max(b.len()) {
        let set_a = a.get(i).map(Vec::as_slice).unwrap_or(&[]);
        let set_b = b.get(i).map(Vec::as_slice).unwrap_or(&[]);
        for j in 0..set_a.len().max(set_b.len()) {
            match (set_a.get(j), set_b.get(j)) {
                (Some(va), Some(vb)) => {
                    let (dx, dy, dz) = (
                        (va.x - vb.x).abs(),
                        (va.y - vb.y).abs(),
                        (va.z - vb.z).abs(),
                    );
                    let deviation = dx + dy + dz;
                    if deviation > 0.0 {
                        changed_count += 1;
                        total += deviation;
                        max = max.max(dx).max(dy).max(dz);
                    }
                }
                _ => changed_count += 1,
            }
        }
    }

    if changed_count == 0 {
        return None;
    }
    Some(VertexDeviation {
        changed_count,
        total_deviation: total,
        max_deviation: max,
        avg_deviation: total / (changed_count as f64 * 3.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(x: f64, y: f64, z: f64) -> Vec3 {
        Vec3::new(x, y, z)
    }

    #[test]
    fn test_single_axis_move() {
        let dev = compare_vertex_sets(&[vec![v(0.0, 0.0, 0.0)]], &[vec![v(0.0, 0.0, 1.0)]]).unwrap();
        assert_eq!(dev.changed_count, 1);
        assert_eq!(dev.max_deviation, 1.0);
        assert_eq!(dev.total_deviation, 1.0);
        assert!((dev.avg_deviation - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_identical_sets() {
        let set = vec![vec![v(1.0, 2.0, 3.0), v(4.0, 5.0, 6.0)]];
        assert!(compare_vertex_sets(&set, &set).is_none());
    }

    #[test]
    fn test_missing_vertex_counts_without_deviation() {
        let a = vec![vec![v(0.0, 0.0, 0.0), v(1.0, 1.0, 1.0)]];
        let b = vec![vec![v(0.0, 0.0, 0.0)]];
        let dev = compare_vertex_sets(&a, &b).unwrap();
        assert_eq!(dev.changed_count, 1);
        assert_eq!(dev.total_deviation, 0.0);
        assert_eq!(dev.avg_deviation, 0.0);
    }

    #[test]
    fn test_missing_set() {
        let a = vec![vec![v(0.0, 0.0, 0.0)], vec![v(1.0, 0.0, 0.0), v(2.0, 0.0, 0.0)]];
        let b = vec![vec![v(0.0, 0.0, 0.0)]];
        assert_eq!(compare_vertex_sets(&a, &b).unwrap().changed_count, 2);
    }

    #[test]
    fn test_max_is_per_axis() {
        let dev = compare_vertex_sets(&[vec![v(0.0, 0.0, 0.0)]], &[vec![v(3.0, -2.0, 1.0)]]).unwrap();
        assert_eq!(dev.total_deviation, 6.0);
        assert_eq!(dev.max_deviation, 3.0);
    }

    #[test]
    fn test_vertex_sets_shape() {
        let value = Value::List(vec![Value::List(vec![Value::Vector3(v(1.0, 2.0, 3.0))])]);
        assert_eq!(vertex_sets(&value), Some(vec![vec![v(1.0, 2.0, 3.0)]]));
        assert_eq!(vertex_sets(&Value::Integer(1)), None);
        assert_eq!(
            vertex_sets(&Value::List(vec![Value::List(vec![Value::Integer(1)])])),
            None
        );
    }
}
