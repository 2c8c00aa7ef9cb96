//! Maximum flow over a capacity network, used to cut fuzzy boundary bands.
//!
//! Arcs come in residual pairs: adding an arc of capacity `c` also creates
//! the opposite arc of capacity zero, and the two keep a weak reference to
//! each other so that augmenting one updates the other in O(1). Augmenting
//! paths are found by breadth-first search (Edmonds–Karp), and the search
//! that fails to reach the sink doubles as the minimum-cut certificate: the
//! set of nodes it visited is the source side of the cut.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

/// A directed arc with its current flow. `capacity == 0` marks the residual
/// arc of a pair.
#[derive(Debug, Clone)]
pub struct FlowEdge {
    pub from: usize,
    pub to: usize,
    pub flow: f64,
    pub capacity: f64,
    /// The paired arc pointing in the opposite direction.
    pub residual: Weak<RefCell<FlowEdge>>,
}

impl FlowEdge {
    pub fn new(from: usize, to: usize, capacity: f64) -> [Rc<RefCell<Self>>; 2] {
        let forward = Rc::new(RefCell::new(FlowEdge {
            from,
            to,
            flow: 0.,
            capacity,
            residual: Weak::default(),
        }));
        let backward = Rc::new(RefCell::new(FlowEdge {
            from: to,
            to: from,
            flow: 0.,
            capacity: 0.,
            residual: Weak::default(),
        }));
        forward.borrow_mut().residual = Rc::downgrade(&backward);
        backward.borrow_mut().residual = Rc::downgrade(&forward);
        [forward, backward]
    }

    pub fn remaining_capacity(&self) -> f64 {
        self.capacity - self.flow
    }

    pub fn augment(&mut self, bottleneck: f64) {
        self.flow += bottleneck;
        self.residual.upgrade().unwrap().borrow_mut().flow -= bottleneck;
    }
}

/// Adjacency-list capacity network.
pub struct FlowNetwork {
    edges: Vec<Vec<Rc<RefCell<FlowEdge>>>>,
}

impl FlowNetwork {
    /// An empty network over `n` nodes.
    pub fn with_size(n: usize) -> Self {
        Self {
            edges: vec![vec![]; n],
        }
    }

    pub fn node_count(&self) -> usize {
        self.edges.len()
    }

    /// Adds an arc and its zero-capacity residual pair.
    pub fn add_edge(&mut self, from: usize, to: usize, capacity: f64) {
        let [forward, backward] = FlowEdge::new(from, to, capacity);
        self.edges[from].push(forward);
        self.edges[to].push(backward);
    }

    /// Iterates over all arcs, residual ones included.
    pub fn edges(&self) -> impl Iterator<Item = &Rc<RefCell<FlowEdge>>> {
        self.edges.iter().flatten()
    }

    /// Runs Edmonds–Karp from `source` to `sink`.
    ///
    /// Returns the total flow and, per node, whether the final (failed)
    /// search still reached it through residual capacity. That reachable set
    /// is the source side of a minimum cut.
    pub fn edmonds_karp(&self, source: usize, sink: usize) -> (f64, Vec<bool>) {
        let n = self.node_count();
        let mut visited = vec![0u32; n];
        let mut visited_token = 1;
        let mut max_flow = 0.;

        loop {
            // BFS for the shortest augmenting path, tracking parent arcs.
            let mut prev: Vec<Option<Rc<RefCell<FlowEdge>>>> = vec![None; n];
            let mut queue = VecDeque::with_capacity(n);
            visited[source] = visited_token;
            queue.push_back(source);
            while let Some(node) = queue.pop_front() {
                if node == sink {
                    break;
                }
                for edge in &self.edges[node] {
                    let e = edge.borrow();
                    if e.remaining_capacity() > 0. && visited[e.to] != visited_token {
                        visited[e.to] = visited_token;
                        prev[e.to] = Some(edge.clone());
                        queue.push_back(e.to);
                    }
                }
            }
            if prev[sink].is_none() {
                let side = visited.iter().map(|&t| t == visited_token).collect();
                return (max_flow, side);
            }

            let mut bottleneck = f64::INFINITY;
            let mut node = sink;
            while let Some(edge) = &prev[node] {
                bottleneck = bottleneck.min(edge.borrow().remaining_capacity());
                node = edge.borrow().from;
            }
            let mut node = sink;
            while let Some(edge) = &prev[node] {
                edge.borrow_mut().augment(bottleneck);
                node = edge.borrow().from;
            }
            max_flow += bottleneck;
            visited_token += 1;
        }
    }
}

impl std::ops::Index<usize> for FlowNetwork {
    type Output = Vec<Rc<RefCell<FlowEdge>>>;
    fn index(&self, index: usize) -> &Self::Output {
        &self.edges[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network(n: usize, edges: &[(usize, usize, f64)]) -> FlowNetwork {
        let mut net = FlowNetwork::with_size(n);
        for &(from, to, capacity) in edges {
            net.add_edge(from, to, capacity);
        }
        net
    }

    /// Total capacity of the arcs leaving the source side.
    fn cut_capacity(net: &FlowNetwork, side: &[bool]) -> f64 {
        net.edges()
            .map(|e| e.borrow())
            .filter(|e| side[e.from] && !side[e.to])
            .map(|e| e.capacity)
            .sum()
    }

    #[test]
    fn small_network() {
        let net = network(
            6,
            &[
                // source edges
                (5, 0, 10.),
                (5, 1, 10.),
                // sink edges
                (2, 4, 10.),
                (3, 4, 10.),
                // middle
                (0, 1, 2.),
                (0, 2, 4.),
                (0, 3, 8.),
                (1, 3, 9.),
                (3, 2, 6.),
            ],
        );
        let (flow, side) = net.edmonds_karp(5, 4);
        assert!((flow - 19.).abs() < 1e-9);
        assert!(side[5] && !side[4]);
        assert!((cut_capacity(&net, &side) - flow).abs() < 1e-9);
    }

    #[test]
    fn disconnected_network() {
        let net = network(4, &[(3, 0, 9.), (1, 2, 9.)]);
        let (flow, side) = net.edmonds_karp(3, 2);
        assert_eq!(flow, 0.);
        assert!(side[3] && side[0]);
        assert!(!side[1] && !side[2]);
    }

    #[test]
    fn medium_network() {
        let net = network(
            12,
            &[
                // from source
                (11, 0, 5.),
                (11, 1, 20.),
                (11, 2, 10.),
                // to sink
                (7, 10, 7.),
                (8, 10, 15.),
                (9, 10, 60.),
                // middle
                (0, 1, 3.),
                (0, 5, 4.),
                (1, 4, 14.),
                (1, 5, 14.),
                (2, 1, 5.),
                (2, 3, 4.),
                (3, 4, 3.),
                (3, 9, 11.),
                (4, 6, 4.),
                (4, 8, 22.),
                (5, 6, 8.),
                (5, 7, 3.),
                (6, 7, 12.),
                (7, 8, 9.),
                (8, 9, 11.),
            ],
        );
        let (flow, side) = net.edmonds_karp(11, 10);
        assert!((flow - 29.).abs() < 1e-9);
        assert!((cut_capacity(&net, &side) - flow).abs() < 1e-9);
    }

    /// A band of four inner nodes between two source-side and two sink-side
    /// borders, unit capacities everywhere: the cut value equals the number
    /// of arcs crossing the narrowest layer.
    #[test]
    fn uniform_band_cut_counts_edges() {
        let (s, t) = (8, 9);
        let mut net = network(
            10,
            &[
                // borders into the band
                (0, 2, 1.),
                (1, 3, 1.),
                // inside the band, with lateral arcs
                (2, 3, 1.),
                (3, 2, 1.),
                (2, 4, 1.),
                (3, 5, 1.),
                (4, 5, 1.),
                (5, 4, 1.),
                // band to the far borders
                (4, 6, 1.),
                (5, 7, 1.),
            ],
        );
        net.add_edge(s, 0, f64::INFINITY);
        net.add_edge(s, 1, f64::INFINITY);
        net.add_edge(6, t, f64::INFINITY);
        net.add_edge(7, t, f64::INFINITY);
        let (flow, side) = net.edmonds_karp(s, t);
        assert!((flow - 2.).abs() < 1e-9);
        assert!((cut_capacity(&net, &side) - flow).abs() < 1e-9);
    }
}
