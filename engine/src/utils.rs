// Copyright (c) 2020 White Leaf
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

use num_traits::float::Float;
use std::collections::{hash_map::Iter as MapIter, HashMap};
use std::hash::Hash;
use std::ops::AddAssign;

/// Keys present in both maps. Walks the smaller map and probes the other.
pub fn common_keys_iter<'a, K, V>(
    a: &'a HashMap<K, V>,
    b: &'a HashMap<K, V>,
) -> CommonKeyIterator<'a, K, V>
where
    K: Hash + Eq,
{
    let (shortest, longest, swapped) = if a.len() > b.len() {
        (b, a, true)
    } else {
        (a, b, false)
    };

    CommonKeyIterator {
        shortest: shortest.iter(),
        longest,
        swapped,
    }
}

#[derive(Debug)]
pub struct CommonKeyIterator<'a, K, V>
where
    K: Hash + Eq,
{
    shortest: MapIter<'a, K, V>,
    longest: &'a HashMap<K, V>,
    swapped: bool,
}

impl<'a, K, V> Iterator for CommonKeyIterator<'a, K, V>
where
    K: Hash + Eq,
{
    /// Values come back in `(a, b)` order regardless of which map is shorter
    type Item = (&'a K, (&'a V, &'a V));

    fn next(&mut self) -> Option<Self::Item> {
        let mut short_val = self.shortest.next()?;

        loop {
            if let Some(long_val) = self.longest.get(short_val.0) {
                let pair = if self.swapped {
                    (long_val, short_val.1)
                } else {
                    (short_val.1, long_val)
                };

                break Some((short_val.0, pair));
            } else {
                short_val = self.shortest.next()?;
            }
        }
    }
}

/// Cosine similarity of two sparse vectors, norms taken over every entry.
/// `None` when either vector is all zeros.
pub fn cosine_similarity<K, V>(a: &HashMap<K, V>, b: &HashMap<K, V>) -> Option<V>
where
    K: Hash + Eq,
    V: Float + AddAssign,
{
    let mut dot_prod = V::zero();
    for (_, (x, y)) in common_keys_iter(a, b) {
        dot_prod += (*x) * (*y);
    }

    let a_norm = a.values().fold(V::zero(), |acc, x| acc + x.powi(2)).sqrt();
    let b_norm = b.values().fold(V::zero(), |acc, y| acc + y.powi(2)).sqrt();

    let cos_sim = dot_prod / (a_norm * b_norm);
    if cos_sim.is_nan() || cos_sim.is_infinite() {
        None
    } else {
        Some(cos_sim)
    }
}

pub fn dot<V: Float>(a: &[V], b: &[V]) -> V {
    a.iter()
        .zip(b.iter())
        .fold(V::zero(), |acc, (x, y)| acc + (*x) * (*y))
}

pub fn euclidean_norm<V: Float>(a: &[V]) -> V {
    dot(a, a).sqrt()
}

/// Rescales `row` onto the ball of the given radius if it lies outside it
pub fn project_onto_ball<V: Float>(row: &mut [V], radius: V) {
    let norm = euclidean_norm(row);
    if norm > radius && norm > V::zero() {
        let scale = radius / norm;
        for x in row.iter_mut() {
            *x = *x * scale;
        }
    }
}

/// `a - b`, element-wise
pub fn difference<V: Float>(a: &[V], b: &[V]) -> Vec<V> {
    a.iter().zip(b.iter()).map(|(x, y)| *x - *y).collect()
}

/// `row += step * direction`
pub fn add_scaled<V: Float>(row: &mut [V], direction: &[V], step: V) {
    for (x, d) in row.iter_mut().zip(direction.iter()) {
        *x = *x + step * (*d);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use common_macros::hash_map;

    #[test]
    fn common_key_iterator() {
        let a = hash_map! {
            0 => 0.,
            2 => 0.,
            3 => 0.,
            5 => 0.,
        };

        let b = hash_map! {
            0 => 2.,
            1 => 1.,
            5 => 2.,
        };

        let mut keys: Vec<_> = common_keys_iter(&a, &b).map(|(k, _)| *k).collect();
        keys.sort();
        assert_eq!(keys, vec![0, 5]);

        // b is shorter, values still come back as (a, b)
        for (_, (x, y)) in common_keys_iter(&a, &b) {
            assert_approx_eq!(*x, 0.);
            assert_approx_eq!(*y, 2.);
        }
    }

    #[test]
    fn cosine_uses_full_norms() {
        let a = hash_map! {
            (0, 0) => 1.,
            (0, 1) => 1.,
        };

        let b = hash_map! {
            (0, 0) => 1.,
            (1, 1) => 1.,
        };

        assert_approx_eq!(cosine_similarity(&a, &b).unwrap(), 0.5);
        assert_approx_eq!(cosine_similarity(&a, &a).unwrap(), 1.0);

        let empty = HashMap::new();
        assert!(cosine_similarity(&a, &empty).is_none());
    }

    #[test]
    fn projection_only_shrinks() {
        let mut outside = vec![3.0, 4.0];
        project_onto_ball(&mut outside, 1.0);
        assert_approx_eq!(euclidean_norm(&outside), 1.0);
        assert_approx_eq!(outside[0], 0.6);

        let mut inside = vec![0.3, 0.4];
        project_onto_ball(&mut inside, 1.0);
        assert_eq!(inside, vec![0.3, 0.4]);
    }

    #[test]
    fn vector_ops() {
        assert_approx_eq!(dot(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]), 32.0);
        assert_eq!(difference(&[1.0, 2.0], &[0.5, 3.0]), vec![0.5, -1.0]);

        let mut row = vec![1.0, 1.0];
        add_scaled(&mut row, &[2.0, -2.0], 0.5);
        assert_eq!(row, vec![2.0, 0.0]);
    }
}
