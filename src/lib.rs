//! # Mesh segmentation by fuzzy clustering and cuts
//!
//! This crate decomposes a triangular surface mesh into semantically coherent
//! regions. Faces of the mesh form the nodes of a dual graph whose edge
//! weights blend the dihedral angle between adjacent faces with an
//! approximate geodesic distance between their centroids. On top of that
//! graph the pipeline runs:
//!
//! 1. [`mesh`] — adjacency construction and the per-edge distance metric;
//! 2. [`shortest_path`] — all-pairs shortest face distances (Dijkstra from
//!    every face, parallel over sources);
//! 3. [`segmentation`] — iterative k-medoid refinement of a per-face
//!    probability field, producing crisp regions and a fuzzy boundary band;
//! 4. [`max_flow`] — a minimum cut through the fuzzy band, so that the final
//!    region boundary follows sharp creases.
//!
//! Regions that are still large and angularly varied are decomposed again,
//! one level at a time.
//!
//! # Resources
//!
//! - [Katz & Tal, "Hierarchical Mesh Decomposition using Fuzzy Clustering
//!   and Cuts" (SIGGRAPH 2003)](https://doi.org/10.1145/882262.882369)
//! - [Maximum flow (Edmonds–Karp)](https://en.wikipedia.org/wiki/Edmonds%E2%80%93Karp_algorithm)

pub mod _test_meshes;
pub mod max_flow;
pub mod mesh;
pub mod ply;
pub mod segmentation;
pub mod shortest_path;

use thiserror::Error;

/// Everything that can go wrong while reading, building or writing a mesh.
///
/// The segmentation itself has no recoverable failure modes; once a model is
/// built, the pipeline runs to completion.
#[derive(Error, Debug)]
pub enum Error {
    #[error("malformed input: {0}")]
    InputFormat(String),

    #[error("face {fid} has {count} neighbors, expected exactly 3")]
    NonManifold { fid: usize, count: usize },

    #[error("face {fid} has a zero-length normal")]
    DegenerateFace { fid: usize },

    #[error("i/o error")]
    Io {
        #[from]
        source: std::io::Error,
    },
}
