//! Buckets: state sets kept as several size-bounded pieces.
//!
//! When an image would exceed the node budget, the operand is split on a
//! variable and each half is processed on its own. The pieces of a bucket
//! always denote their union.

use std::collections::VecDeque;

use log::debug;

use crate::bdd::Bdd;
use crate::error::{Error, Result};
use crate::reference::Ref;

pub type Bucket = Vec<Ref>;

pub fn remove_zero(bdd: &Bdd, bucket: &mut Bucket) {
    bucket.retain(|&f| !bdd.is_zero(f));
}

/// Union of all the pieces.
pub fn bucket_union(bdd: &Bdd, bucket: &Bucket) -> Ref {
    bdd.apply_or_many(bucket.iter().copied())
}

/// Join pieces as long as the unions stay within `max_nodes`.
pub fn merge_bucket(bdd: &Bdd, bucket: &mut Bucket, max_nodes: usize) {
    remove_zero(bdd, bucket);
    let mut merged: Bucket = Vec::with_capacity(bucket.len());
    for &piece in bucket.iter() {
        match merged.last_mut() {
            Some(last) => match bdd.apply_or_limited(*last, piece, max_nodes) {
                Ok(union) => *last = union,
                Err(_) => merged.push(piece),
            },
            None => merged.push(piece),
        }
    }
    *bucket = merged;
}

/// Split `f` into two disjoint non-empty halves on the topmost variable
/// where both branches are satisfiable. `None` if `f` is a single cube.
pub fn split(bdd: &Bdd, f: Ref) -> Option<(Ref, Ref)> {
    let mut node = f;
    while !bdd.is_terminal(node) {
        let low = bdd.low_node(node);
        let high = bdd.high_node(node);
        if !bdd.is_zero(low) && !bdd.is_zero(high) {
            let x = bdd.mk_var(bdd.variable(node.index()));
            return Some((bdd.apply_and(f, -x), bdd.apply_and(f, x)));
        }
        node = if bdd.is_zero(low) { high } else { low };
    }
    None
}

/// Apply a size-bounded operation to every piece of `input`, splitting any
/// piece whose result overflows `max_nodes`. Pieces that cannot be split
/// any further are processed without a budget.
pub fn apply_split<F>(bdd: &Bdd, input: &[Ref], max_nodes: usize, mut op: F) -> Result<Bucket>
where
    F: FnMut(Ref, usize) -> Result<Ref>,
{
    let mut queue: VecDeque<Ref> = input.iter().copied().filter(|&f| !bdd.is_zero(f)).collect();
    let mut res = Bucket::new();

    while let Some(piece) = queue.pop_front() {
        let image = match op(piece, max_nodes) {
            Ok(image) => image,
            Err(Error::NodeLimit { limit }) => match split(bdd, piece) {
                Some((a, b)) => {
                    debug!("Splitting piece of {} nodes (budget {})", bdd.size(piece), limit);
                    queue.push_front(b);
                    queue.push_front(a);
                    continue;
                }
                None => op(piece, usize::MAX)?,
            },
            Err(e) => return Err(e),
        };
        if !bdd.is_zero(image) {
            res.push(image);
        }
    }

    Ok(res)
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_split_is_partition() {
        let bdd = Bdd::default();
        let f = bdd.apply_or(bdd.cube([1, 2]), bdd.cube([-1, 3]));

        let (a, b) = split(&bdd, f).unwrap();
        assert!(!bdd.is_zero(a));
        assert!(!bdd.is_zero(b));
        assert_eq!(bdd.apply_and(a, b), bdd.zero);
        assert_eq!(bdd.apply_or(a, b), f);

        assert_eq!(split(&bdd, bdd.cube([1, -2, 3])), None);
        assert_eq!(split(&bdd, bdd.zero), None);
    }

    #[test]
    fn test_merge_bucket() {
        let bdd = Bdd::default();
        let mut bucket = vec![bdd.cube([1]), bdd.zero, bdd.cube([-1, 2])];
        merge_bucket(&bdd, &mut bucket, usize::MAX);
        assert_eq!(bucket, vec![bdd.apply_or(bdd.mk_var(1), bdd.mk_var(2))]);

        let mut bucket = vec![bdd.cube([1, 2, 3]), bdd.cube([-1, -2, -3])];
        merge_bucket(&bdd, &mut bucket, 2);
        assert_eq!(bucket.len(), 2);
    }

    #[test]
    fn test_apply_split_retries_pieces() {
        let bdd = Bdd::default();
        let f = bdd.apply_or_many([bdd.cube([1, 2]), bdd.cube([-1, 3]), bdd.cube([-1, -3, 4])]);

        // Identity that refuses anything but single cubes under a budget.
        let mut calls = 0;
        let res = apply_split(&bdd, &[f], 1, |piece, budget| {
            calls += 1;
            if budget != usize::MAX && split(&bdd, piece).is_some() {
                Err(Error::NodeLimit { limit: budget })
            } else {
                Ok(piece)
            }
        })
        .unwrap();

        assert!(res.len() >= 3);
        assert!(calls > 3);
        assert_eq!(bucket_union(&bdd, &res), f);
    }

    #[test]
    fn test_apply_split_propagates_fatal_errors() {
        let bdd = Bdd::default();
        let res = apply_split(&bdd, &[bdd.mk_var(1)], 10, |_, _| {
            Err(Error::InvalidPlan("boom".into()))
        });
        assert!(matches!(res, Err(Error::InvalidPlan(_))));
    }
}
