//! Hierarchical binary decomposition by fuzzy k-medoid clustering and cuts.
//!
//! A [`Segment`] is one unit of work: a subset of faces, the corresponding
//! block of the global distance matrix, and a pair of representative faces.
//! [`Segment::seg`] alternates two steps until the representatives stop
//! improving: every face receives a probability of belonging to each
//! representative (inversely proportional to its distance to it), and each
//! representative moves to the face minimizing the probability-weighted
//! total distance of its cluster. Faces whose top two probabilities are
//! within a small margin form a *fuzzy* band; a minimum cut through that
//! band, with capacities low across sharp creases, decides the final crisp
//! boundary. Sufficiently large and angularly varied regions are then
//! decomposed one level deeper.

use crate::max_flow::FlowNetwork;
use crate::mesh::Mesh;
use crate::shortest_path;
use log::{debug, warn};
use nalgebra::DMatrix;
use std::f64::consts::PI;

/// Clusters produced by one decomposition pass.
pub const CLUSTERS_PER_PASS: usize = 2;
/// Trial seeds sampled during farthest-point initialization.
const TRIAL_SEEDS: usize = 20;
/// Refinement rounds before the iteration is cut off.
const MAX_ROUNDS: usize = 20;
/// A representative must beat the old cost by this much to count as a move.
const COST_EPS: f64 = 1e-12;
/// Regularizer added to cluster distances before inversion.
const REP_EPS: f64 = 1e-12;

/// A mesh together with its face-distance matrix and the running count of
/// labels handed out so far. The matrix is built once and never mutated;
/// labels are written only by [`Segment::seg`].
pub struct Model {
    pub mesh: Mesh,
    pub f_dis: DMatrix<f64>,
    pub label_nums: usize,
}

impl Model {
    pub fn new(mesh: Mesh) -> Self {
        let f_dis = shortest_path::all_pairs_distances(&mesh);
        Self {
            mesh,
            f_dis,
            label_nums: 0,
        }
    }
}

/// Role of a face while one fuzzy band is being cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Outside,
    Source,
    Sink,
    Fuzzy,
}

/// One decomposition work unit over a face subset.
pub struct Segment {
    /// Global face ids under consideration; everything below indexes into
    /// this list.
    fids: Vec<usize>,
    level: usize,
    /// Local block of the global distance matrix.
    f_dis: DMatrix<f64>,
    num: usize,
    /// Representative faces, as local indices. Duplicates are possible.
    reps: Vec<usize>,
    /// Slots holding the first occurrence of each distinct representative.
    uniques: Vec<usize>,
    /// Range of dihedral angles between same-label adjacent faces inside
    /// this segment.
    ang_diff: f64,
    local_avg_dis: f64,
    global_avg_dis: f64,
    global_max_dis: f64,
}

impl Segment {
    /// A segment covering the whole mesh.
    pub fn whole_mesh(model: &Model, level: usize) -> Self {
        Self::new(model, level, (0..model.mesh.faces.len()).collect())
    }

    pub fn new(model: &Model, level: usize, fids: Vec<usize>) -> Self {
        let m = fids.len();
        let f_dis = DMatrix::from_fn(m, m, |r, c| model.f_dis[(fids[r], fids[c])]);

        let n = model.f_dis.nrows();
        let global_max_dis = model.f_dis.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
            - model.f_dis.iter().cloned().fold(f64::INFINITY, f64::min);
        if global_max_dis.is_infinite() {
            warn!("dual graph is disconnected; segmentation is best-effort");
        }
        let global_avg_dis = model.f_dis.sum() / (n * (n - 1)) as f64;
        let local_avg_dis = f_dis.sum() / (m * (m - 1)) as f64;

        // The most distant local pair, scanning rows first so that ties
        // resolve to the lowest indices.
        let (mut max_r, mut max_c, mut max_dis) = (0, 0, f64::NEG_INFINITY);
        for r in 0..m {
            for c in 0..m {
                if f_dis[(r, c)] > max_dis {
                    max_dis = f_dis[(r, c)];
                    max_r = r;
                    max_c = c;
                }
            }
        }

        let (num, mut reps, gaps) = farthest_point_seeds(&f_dis);
        debug!("level {}: seed gaps {:?}", level, gaps);
        if num == 2 {
            // For a binary split the two most distant faces beat the sampled
            // seeds.
            let (rep0, rep1) = if max_r <= max_c {
                (max_r, max_c)
            } else {
                (max_c, max_r)
            };
            reps[0] = rep0;
            reps[1] = rep1;
        }
        let uniques = unique_slots(&reps);

        let (mut min_ang, mut max_ang) = (PI, 0f64);
        for &fid in &fids {
            let face = &model.mesh.faces[fid];
            for info in &face.nbrs {
                if model.mesh.faces[info.fid].label == face.label {
                    min_ang = min_ang.min(info.angle);
                    max_ang = max_ang.max(info.angle);
                }
            }
        }
        let ang_diff = max_ang - min_ang;

        Self {
            fids,
            level,
            f_dis,
            num,
            reps,
            uniques,
            ang_diff,
            local_avg_dis,
            global_avg_dis,
            global_max_dis,
        }
    }

    /// Segments this face subset in place, then recurses into the resulting
    /// regions while the recursion gates hold.
    pub fn seg(&mut self, model: &mut Model) {
        let m = self.fids.len();
        let offset = model.label_nums;
        let fuzzy = offset + self.num;
        let mut prob = DMatrix::zeros(self.num, m);

        for round in 0..MAX_ROUNDS {
            self.compute_prob(&mut prob);
            let (new_reps, rep_cost) = self.recompute_reps(model, &mut prob, offset, fuzzy);
            // A slot moves only when the candidate is both different and
            // strictly cheaper.
            let changed = new_reps.iter().zip(&self.reps).enumerate().any(
                |(k, (&new_rep, &old_rep))| {
                    rep_cost[(k, new_rep)] < rep_cost[(k, old_rep)] - COST_EPS
                        && new_rep != old_rep
                },
            );
            debug!("level {} round {}: reps {:?}", self.level, round, self.reps);
            if !changed {
                break;
            }
            self.reps = new_reps;
            self.uniques = unique_slots(&self.reps);
        }

        self.recompute_reps(model, &mut prob, offset, fuzzy);
        self.assign(model, &mut prob, offset, fuzzy);
        self.resolve_fuzzy(model, offset, fuzzy);
        model.label_nums += self.num;

        let mut max_rep_dis = 0f64;
        for &a in &self.reps {
            for &b in &self.reps {
                max_rep_dis = max_rep_dis.max(self.f_dis[(a, b)]);
            }
        }
        if self.level > 0 || max_rep_dis / self.global_max_dis < 0.1 {
            return;
        }

        // Build all children before descending: `seg` rewrites labels, which
        // the `label % num` test below depends on.
        let mut children = Vec::new();
        for sid in 0..self.num {
            if !self.uniques.contains(&sid) {
                continue;
            }
            let fids: Vec<usize> = self
                .fids
                .iter()
                .copied()
                .filter(|&fid| model.mesh.faces[fid].label % self.num == sid)
                .collect();
            if fids.is_empty() {
                continue;
            }
            children.push(Segment::new(model, self.level + 1, fids));
        }
        for mut child in children {
            if child.ang_diff > 0.3 && child.local_avg_dis / child.global_avg_dis > 0.2 {
                child.seg(model);
            }
        }
    }

    /// Fills `prob[k, f]` with the probability that face `f` belongs to the
    /// representative in slot `k`: inverse distances, normalized over the
    /// distinct representatives. A representative face collapses to
    /// probability one in its own slot. Every column sums to one.
    fn compute_prob(&self, prob: &mut DMatrix<f64>) {
        for fid in 0..self.fids.len() {
            if let Some(slot) = self.reps.iter().position(|&rep| rep == fid) {
                for k in 0..self.num {
                    prob[(k, fid)] = 0.;
                }
                prob[(slot, fid)] = 1.;
                continue;
            }
            let inv_sum: f64 = self
                .uniques
                .iter()
                .map(|&u| 1. / self.f_dis[(fid, self.reps[u])])
                .sum();
            for k in 0..self.num {
                prob[(k, fid)] = if self.uniques.contains(&k) {
                    1. / self.f_dis[(fid, self.reps[k])] / inv_sum
                } else {
                    0.
                };
            }
        }
    }

    /// Hard labeling with a fuzzy margin: a face whose two best
    /// probabilities are within `eps` receives a fuzzy pair label instead of
    /// a crisp one.
    fn assign(&self, model: &mut Model, prob: &mut DMatrix<f64>, offset: usize, fuzzy: usize) {
        let eps = if self.num <= 3 { 0.04 } else { 0.02 };
        for k in 0..self.num {
            if !self.uniques.contains(&k) {
                prob.row_mut(k).fill(0.);
            }
        }
        for fid in 0..self.fids.len() {
            if self.uniques.len() == 1 {
                model.mesh.faces[self.fids[fid]].label = offset + self.uniques[0];
                continue;
            }
            let mut first = self.uniques[0];
            for &k in &self.uniques[1..] {
                if prob[(k, fid)] > prob[(first, fid)] {
                    first = k;
                }
            }
            let mut second = usize::MAX;
            for &k in &self.uniques {
                if k == first {
                    continue;
                }
                if second == usize::MAX || prob[(k, fid)] > prob[(second, fid)] {
                    second = k;
                }
            }
            let gap = prob[(first, fid)] - prob[(second, fid)];
            model.mesh.faces[self.fids[fid]].label = if gap > eps {
                offset + first
            } else {
                fuzzy + first * self.num + second
            };
        }
    }

    /// One refinement step: provisionally label every face, express each
    /// cluster's distance to every face as the mean over its crisp members,
    /// rebuild the probability field from those distances and pick the face
    /// minimizing each cluster's expected distance as its new
    /// representative.
    fn recompute_reps(
        &self,
        model: &mut Model,
        prob: &mut DMatrix<f64>,
        offset: usize,
        fuzzy: usize,
    ) -> (Vec<usize>, DMatrix<f64>) {
        self.assign(model, prob, offset, fuzzy);
        let m = self.fids.len();

        let mut rep_dis = DMatrix::zeros(self.num, m);
        let mut counts = vec![0usize; self.num];
        for kf in 0..m {
            // Fuzzy pair labels land at `num` or above and contribute
            // nothing here.
            let k = model.mesh.faces[self.fids[kf]].label - offset;
            if k < self.num {
                counts[k] += 1;
                for i in 0..m {
                    rep_dis[(k, i)] += self.f_dis[(kf, i)];
                }
            }
        }
        for k in 0..self.num {
            if counts[k] > 0 {
                let inv = 1. / counts[k] as f64;
                for i in 0..m {
                    rep_dis[(k, i)] *= inv;
                }
            } else {
                for i in 0..m {
                    rep_dis[(k, i)] = f64::INFINITY;
                }
            }
        }
        for i in 0..m {
            let inv_sum: f64 = (0..self.num).map(|k| 1. / (rep_dis[(k, i)] + REP_EPS)).sum();
            for k in 0..self.num {
                prob[(k, i)] = 1. / (rep_dis[(k, i)] + REP_EPS) / inv_sum;
            }
        }

        let rep_cost = &*prob * &self.f_dis;
        let mut new_reps = Vec::with_capacity(self.num);
        for k in 0..self.num {
            let mut best = 0;
            for i in 1..m {
                if rep_cost[(k, i)] < rep_cost[(k, best)] {
                    best = i;
                }
            }
            new_reps.push(best);
        }
        (new_reps, rep_cost)
    }

    /// Resolves every fuzzy band between an ordered pair of clusters by a
    /// minimum cut whose capacities are low across sharp creases.
    fn resolve_fuzzy(&self, model: &mut Model, offset: usize, fuzzy: usize) {
        let face_count = model.mesh.faces.len();
        for (a, &i) in self.uniques.iter().enumerate() {
            for &j in &self.uniques[a + 1..] {
                let mut roles = vec![Role::Outside; face_count];
                for &fid in &self.fids {
                    let face = &model.mesh.faces[fid];
                    if face.label == fuzzy + i * self.num + j
                        || face.label == fuzzy + j * self.num + i
                    {
                        roles[fid] = Role::Fuzzy;
                        for info in &face.nbrs {
                            let nbr_label = model.mesh.faces[info.fid].label;
                            if nbr_label == offset + i {
                                roles[info.fid] = Role::Source;
                            } else if nbr_label == offset + j {
                                roles[info.fid] = Role::Sink;
                            }
                        }
                    }
                }

                // Capacity graph over the band and its two borders, plus the
                // two virtual terminals. Arcs touching an outside face can
                // never carry flow and are skipped.
                let (source, sink) = (face_count, face_count + 1);
                let mut net = FlowNetwork::with_size(face_count + 2);
                for (u, face) in model.mesh.faces.iter().enumerate() {
                    if roles[u] == Role::Outside {
                        continue;
                    }
                    for info in &face.nbrs {
                        if roles[info.fid] == Role::Outside {
                            continue;
                        }
                        let capacity = 1. / (1. + info.ang_dis / model.mesh.avg_ang_dis);
                        net.add_edge(u, info.fid, capacity);
                    }
                }
                for u in 0..face_count {
                    match roles[u] {
                        Role::Source => net.add_edge(source, u, f64::INFINITY),
                        Role::Sink => net.add_edge(u, sink, f64::INFINITY),
                        _ => {}
                    }
                }

                let (flow, side) = net.edmonds_karp(source, sink);
                debug!("cut between clusters {} and {}: flow {:.4}", i, j, flow);
                for &fid in &self.fids {
                    if roles[fid] == Role::Fuzzy {
                        model.mesh.faces[fid].label =
                            if side[fid] { offset + i } else { offset + j };
                    }
                }
            }
        }
    }
}

/// Farthest-point sampling: start from the centermost face, then repeatedly
/// add the face whose distance to the chosen set is largest, recording that
/// distance as the gap. The binary split keeps the first two seeds.
fn farthest_point_seeds(f_dis: &DMatrix<f64>) -> (usize, Vec<usize>, Vec<f64>) {
    let m = f_dis.nrows();
    let mut best = 0;
    let mut best_sum = f64::INFINITY;
    for j in 0..m {
        let row_sum = f_dis.row(j).sum();
        if row_sum < best_sum {
            best_sum = row_sum;
            best = j;
        }
    }
    let mut reps = vec![best];
    let mut gaps = Vec::with_capacity(TRIAL_SEEDS);
    for _ in 0..TRIAL_SEEDS {
        let (mut rep, mut max_dis) = (0, 0f64);
        for j in 0..m {
            let mut min_dis = f64::INFINITY;
            for &r in &reps {
                min_dis = min_dis.min(f_dis[(j, r)]);
            }
            if min_dis > max_dis {
                max_dis = min_dis;
                rep = j;
            }
        }
        reps.push(rep);
        gaps.push(max_dis);
    }
    reps.truncate(CLUSTERS_PER_PASS);
    (CLUSTERS_PER_PASS, reps, gaps)
}

/// Slots of the first occurrence of each distinct representative, ascending.
fn unique_slots(reps: &[usize]) -> Vec<usize> {
    let mut seen: Vec<usize> = Vec::new();
    let mut slots = Vec::new();
    for (slot, &rep) in reps.iter().enumerate() {
        if !seen.contains(&rep) {
            seen.push(rep);
            slots.push(slot);
        }
    }
    slots
}
