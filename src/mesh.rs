//! Triangle mesh with face adjacency and the blended dual-graph metric.
//!
//! Every face records its three neighbors together with three quantities per
//! shared edge: the dihedral angle, an *angular distance* that penalizes
//! concave creases more than convex ones, and an approximate *geodesic
//! distance* between the two face centroids (the straight segment connecting
//! them after the two triangles are flattened into a common plane). The
//! distances are normalized by their mesh-wide means and blended into the
//! single edge weight used by the shortest-path stage.

use crate::Error;
use nalgebra::Vector3;
use num_traits::Float;
use std::collections::HashMap;

/// Below this magnitude a face normal is considered zero.
pub const NORMAL_EPS: f64 = 1e-12;
/// Tolerance of the convexity test `n0 · (c1 - c0) < CONVEX_EPS`.
pub const CONVEX_EPS: f64 = 1e-12;
/// Angular-distance weight of a convex crease.
pub const ETA_CONVEX: f64 = 0.2;
/// Angular-distance weight of a concave crease.
pub const ETA_CONCAVE: f64 = 1.0;
/// Blend factor: `dis = (1 - DELTA) * ang + DELTA * geo` (both normalized).
pub const DELTA: f64 = 0.8;

/// `acos` with its argument clamped to the domain.
///
/// Due to double rounding the dot product of two unit vectors may land
/// slightly outside `[-1, 1]`, which would make `acos` return NaN.
pub trait SafeArcCos: Float {
    fn acos_safe(self) -> Self;
}

impl SafeArcCos for f64 {
    fn acos_safe(self) -> Self {
        if self <= -1.0 {
            std::f64::consts::PI
        } else if self >= 1.0 {
            0.
        } else {
            self.acos()
        }
    }
}

/// One adjacency record, stored on both faces sharing the edge.
#[derive(Debug, Clone)]
pub struct NeighborInfo {
    /// The two shared vertex ids, ascending.
    pub vids: (usize, usize),
    /// Id of the face on the other side of the edge.
    pub fid: usize,
    /// Dihedral angle between the two faces, in `[0, pi]`.
    pub angle: f64,
    /// Angular distance `eta * (1 - n0 . n1)`.
    pub ang_dis: f64,
    /// Squared centroid-to-centroid distance in the flattened patch.
    pub geo_dis: f64,
    /// Blended edge weight of the dual graph.
    pub dis: f64,
}

impl NeighborInfo {
    fn new(vids: (usize, usize), fid: usize, angle: f64, ang_dis: f64, geo_dis: f64) -> Self {
        Self {
            vids,
            fid,
            angle,
            ang_dis,
            geo_dis,
            dis: 0.,
        }
    }
}

/// A triangular face. Neighbors reference other faces by index only.
#[derive(Debug, Clone)]
pub struct Face {
    /// The three vertex ids.
    pub vids: [usize; 3],
    /// Centroid of the three vertex positions.
    pub center: Vector3<f64>,
    /// Unit outward normal; zero for degenerate faces.
    pub norm: Vector3<f64>,
    /// Segmentation label, written by the segmenter.
    pub label: usize,
    /// Exactly three entries once adjacency is built.
    pub nbrs: Vec<NeighborInfo>,
}

impl Face {
    pub fn new(v0: &Vector3<f64>, v1: &Vector3<f64>, v2: &Vector3<f64>, vids: [usize; 3]) -> Self {
        let center = (v0 + v1 + v2) / 3.0;
        let n = (v1 - v0).cross(&(v2 - v0));
        let norm = if n.norm() < NORMAL_EPS {
            Vector3::zeros()
        } else {
            n.normalize()
        };
        Self {
            vids,
            center,
            norm,
            label: 0,
            nbrs: Vec::with_capacity(3),
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.norm == Vector3::zeros()
    }
}

/// A closed manifold triangle mesh with adjacency built.
#[derive(Debug)]
pub struct Mesh {
    pub vertices: Vec<Vector3<f64>>,
    pub faces: Vec<Face>,
    /// Mean angular distance over all adjacency records.
    pub avg_ang_dis: f64,
    /// Mean geodesic distance over all adjacency records.
    pub avg_geo_dis: f64,
}

impl Mesh {
    /// Builds centroids, normals, adjacency and the blended metric.
    ///
    /// Fails on out-of-range vertex ids, zero-length normals and on any face
    /// that does not end up with exactly three neighbors.
    pub fn new(vertices: Vec<Vector3<f64>>, face_vids: Vec<[usize; 3]>) -> Result<Self, Error> {
        if face_vids.is_empty() {
            return Err(Error::InputFormat("mesh has no faces".into()));
        }
        if let Some(&vid) = face_vids.iter().flatten().find(|&&v| v >= vertices.len()) {
            return Err(Error::InputFormat(format!(
                "face references vertex {} but only {} vertices exist",
                vid,
                vertices.len()
            )));
        }
        let mut faces: Vec<Face> = face_vids
            .iter()
            .map(|&[a, b, c]| Face::new(&vertices[a], &vertices[b], &vertices[c], [a, b, c]))
            .collect();
        if let Some(fid) = faces.iter().position(Face::is_degenerate) {
            return Err(Error::DegenerateFace { fid });
        }

        // Pair up the two owners of each canonical edge; the metric is
        // computed on the second occurrence.
        let mut edge_owner: HashMap<(usize, usize), usize> = HashMap::new();
        for fid in 0..faces.len() {
            let [a, b, c] = faces[fid].vids;
            for &(u, v) in &[(a, b), (b, c), (c, a)] {
                let key = if u < v { (u, v) } else { (v, u) };
                match edge_owner.get(&key).copied() {
                    None => {
                        edge_owner.insert(key, fid);
                    }
                    Some(other) => {
                        let (angle, ang_dis, geo_dis) = adjacency_metric(
                            &faces[other],
                            &faces[fid],
                            &vertices[key.0],
                            &vertices[key.1],
                        );
                        faces[other]
                            .nbrs
                            .push(NeighborInfo::new(key, fid, angle, ang_dis, geo_dis));
                        faces[fid]
                            .nbrs
                            .push(NeighborInfo::new(key, other, angle, ang_dis, geo_dis));
                    }
                }
            }
        }
        if let Some((fid, face)) = faces.iter().enumerate().find(|(_, f)| f.nbrs.len() != 3) {
            return Err(Error::NonManifold {
                fid,
                count: face.nbrs.len(),
            });
        }

        let count = (faces.len() * 3) as f64;
        let avg_ang_dis =
            faces.iter().flat_map(|f| &f.nbrs).map(|n| n.ang_dis).sum::<f64>() / count;
        let avg_geo_dis =
            faces.iter().flat_map(|f| &f.nbrs).map(|n| n.geo_dis).sum::<f64>() / count;
        for face in &mut faces {
            for info in &mut face.nbrs {
                info.dis =
                    (1. - DELTA) * info.ang_dis / avg_ang_dis + DELTA * info.geo_dis / avg_geo_dis;
            }
        }

        Ok(Self {
            vertices,
            faces,
            avg_ang_dis,
            avg_geo_dis,
        })
    }
}

/// Dihedral angle, angular distance and geodesic distance between two faces
/// sharing the edge `e0 -- e1`.
fn adjacency_metric(
    f0: &Face,
    f1: &Face,
    e0: &Vector3<f64>,
    e1: &Vector3<f64>,
) -> (f64, f64, f64) {
    let cos_dihedral = f0.norm.dot(&f1.norm);
    let angle = cos_dihedral.acos_safe();
    let convex = f0.norm.dot(&(f1.center - f0.center)) < CONVEX_EPS;
    let eta = if convex { ETA_CONVEX } else { ETA_CONCAVE };
    let ang_dis = eta * (1. - cos_dihedral);

    // Flatten the two triangles around the shared edge: the geodesic between
    // the centroids becomes a straight segment, and the angle it subtends at
    // `e0` is the sum of the two in-plane angles. Law of cosines, in squared
    // form.
    let axis = e1 - e0;
    let d0 = f0.center - e0;
    let d1 = f1.center - e0;
    let theta0 = (d0.dot(&axis) / (d0.norm() * axis.norm())).acos_safe();
    let theta1 = (d1.dot(&axis) / (d1.norm() * axis.norm())).acos_safe();
    let geo_dis =
        d0.norm_squared() + d1.norm_squared() - 2. * d0.norm() * d1.norm() * (theta0 + theta1).cos();

    (angle, ang_dis, geo_dis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::_test_meshes;

    #[test]
    fn every_face_has_three_neighbors() {
        let (vertices, faces) = _test_meshes::tetrahedron();
        let mesh = Mesh::new(vertices, faces).unwrap();
        assert_eq!(mesh.faces.len(), 4);
        for face in &mesh.faces {
            assert_eq!(face.nbrs.len(), 3);
        }
    }

    #[test]
    fn open_strip_is_rejected() {
        let (vertices, faces) = _test_meshes::open_strip();
        match Mesh::new(vertices, faces) {
            Err(Error::NonManifold { fid: 0, count: 1 }) => {}
            other => panic!("expected NonManifold, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn degenerate_face_is_rejected() {
        let vertices = vec![
            Vector3::new(0., 0., 0.),
            Vector3::new(1., 0., 0.),
            Vector3::new(2., 0., 0.),
        ];
        match Mesh::new(vertices, vec![[0, 1, 2]]) {
            Err(Error::DegenerateFace { fid: 0 }) => {}
            other => panic!("expected DegenerateFace, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn out_of_range_vertex_is_rejected() {
        let vertices = vec![
            Vector3::new(0., 0., 0.),
            Vector3::new(1., 0., 0.),
            Vector3::new(0., 1., 0.),
        ];
        assert!(matches!(
            Mesh::new(vertices, vec![[0, 1, 7]]),
            Err(Error::InputFormat(_))
        ));
    }

    /// The convexity test flips `eta` between 0.2 and 1.0, so a sign change
    /// of `n0 . (c1 - c0)` scales the angular distance by exactly 5.
    #[test]
    fn concave_crease_is_five_times_harder() {
        let v0 = Vector3::new(0., 0., 0.);
        let v1 = Vector3::new(1., 0., 0.);
        let v2 = Vector3::new(0., 1., 0.);
        let ang_dis_at = |h: f64| {
            let v3 = Vector3::new(0.5, -0.5, h);
            let f0 = Face::new(&v0, &v1, &v2, [0, 1, 2]);
            let f1 = Face::new(&v1, &v0, &v3, [1, 0, 3]);
            let (_, ang_dis, _) = adjacency_metric(&f0, &f1, &v0, &v1);
            ang_dis
        };
        let convex = ang_dis_at(-3e-6);
        let concave = ang_dis_at(3e-6);
        assert!((concave / convex - 5.0).abs() < 1e-9);
    }

    /// Two coplanar right triangles forming a unit square: the flattened
    /// geodesic is the plain squared centroid distance, 2/9.
    #[test]
    fn coplanar_pair_metric() {
        let v0 = Vector3::new(0., 0., 0.);
        let v1 = Vector3::new(1., 0., 0.);
        let v2 = Vector3::new(1., 1., 0.);
        let v3 = Vector3::new(0., 1., 0.);
        let f0 = Face::new(&v0, &v1, &v2, [0, 1, 2]);
        let f1 = Face::new(&v0, &v2, &v3, [0, 2, 3]);
        let (angle, ang_dis, geo_dis) = adjacency_metric(&f0, &f1, &v0, &v2);
        assert!(angle.abs() < 1e-9);
        assert!(ang_dis.abs() < 1e-12);
        assert!((geo_dis - 2. / 9.).abs() < 1e-9);
    }

    #[test]
    fn tetrahedron_metric_is_uniform() {
        let (vertices, faces) = _test_meshes::tetrahedron();
        let mesh = Mesh::new(vertices, faces).unwrap();
        // Regular tetrahedron: every adjacency is convex with the same
        // dihedral angle, so every blended weight normalizes to 1.
        let expected_angle = (-1.0f64 / 3.0).acos();
        for face in &mesh.faces {
            for info in &face.nbrs {
                assert!((info.angle - expected_angle).abs() < 1e-9);
                assert!((info.ang_dis - ETA_CONVEX * (1. + 1. / 3.)).abs() < 1e-9);
                assert!((info.dis - 1.).abs() < 1e-9);
            }
        }
    }
}
