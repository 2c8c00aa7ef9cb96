//! All-pairs shortest face distances over the dual graph.
//!
//! The dual graph connects faces sharing a mesh edge, weighted by the
//! blended metric from [`crate::mesh`]. Dijkstra runs from every source
//! face; the source set is split into disjoint batches processed on the
//! rayon pool, and each batch fills its own block of rows, so the result is
//! deterministic regardless of scheduling.

use crate::mesh::Mesh;
use log::info;
use nalgebra::DMatrix;
use ordered_float::OrderedFloat;
use priority_queue::PriorityQueue;
use rayon::prelude::*;
use std::time::Instant;

/// Number of source batches processed in parallel.
pub const NUM_BATCHES: usize = 6;

/// Dense, symmetric matrix of minimum path weights between all face pairs.
/// Unreachable pairs are `f64::INFINITY`; the diagonal is zero.
pub fn all_pairs_distances(mesh: &Mesh) -> DMatrix<f64> {
    let n = mesh.faces.len();
    let started = Instant::now();
    let sources: Vec<usize> = (0..n).collect();
    let batch = ((n + NUM_BATCHES - 1) / NUM_BATCHES).max(1);
    let blocks: Vec<Vec<f64>> = sources
        .par_chunks(batch)
        .map(|chunk| {
            let mut rows = Vec::with_capacity(chunk.len() * n);
            for &src in chunk {
                rows.extend(single_source(mesh, src));
            }
            rows
        })
        .collect();
    let flat = blocks.concat();
    info!(
        "all-pairs face distances ({0}x{0}) computed in {1:.2?}",
        n,
        started.elapsed()
    );
    DMatrix::from_row_slice(n, n, &flat)
}

/// One row of the distance matrix: Dijkstra from `src`.
fn single_source(mesh: &Mesh, src: usize) -> Vec<f64> {
    let n = mesh.faces.len();
    let mut dists = vec![f64::INFINITY; n];
    let mut vis = vec![false; n];
    // `PriorityQueue` is a max-queue over `Ord` priorities; negating the
    // distance on push and pop turns it into the min-queue Dijkstra needs.
    let mut pq: PriorityQueue<usize, OrderedFloat<f64>> = PriorityQueue::new();
    dists[src] = 0.;
    pq.push(src, OrderedFloat::from(-0f64));
    while let Some((node, cur_dist)) = pq.pop() {
        let cur_dist = -cur_dist.into_inner();
        vis[node] = true;
        for info in &mesh.faces[node].nbrs {
            if vis[info.fid] {
                continue;
            }
            let next = cur_dist + info.dis;
            if next < dists[info.fid] {
                dists[info.fid] = next;
                pq.push(info.fid, OrderedFloat::from(-next));
            }
        }
    }
    dists
}
