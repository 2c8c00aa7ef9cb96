//! Small hand-built meshes shared by the unit tests.

use nalgebra::Vector3;

/// Regular tetrahedron with outward-wound faces. Every pair of faces is
/// adjacent and every adjacency is geometrically identical.
pub fn tetrahedron() -> (Vec<Vector3<f64>>, Vec<[usize; 3]>) {
    let vertices = vec![
        Vector3::new(1., 1., 1.),
        Vector3::new(1., -1., -1.),
        Vector3::new(-1., 1., -1.),
        Vector3::new(-1., -1., 1.),
    ];
    let faces = vec![[0, 1, 2], [0, 3, 1], [0, 2, 3], [1, 3, 2]];
    (vertices, faces)
}

/// Two disjoint regular tetrahedra; the dual graph has two components.
pub fn two_tetrahedra() -> (Vec<Vector3<f64>>, Vec<[usize; 3]>) {
    let (mut vertices, mut faces) = tetrahedron();
    let (shifted, more) = tetrahedron();
    vertices.extend(shifted.iter().map(|v| v + Vector3::new(10., 0., 0.)));
    faces.extend(more.iter().map(|f| [f[0] + 4, f[1] + 4, f[2] + 4]));
    (vertices, faces)
}

/// Unit cube, two right triangles per side, outward winding.
pub fn cube() -> (Vec<Vector3<f64>>, Vec<[usize; 3]>) {
    let vertices = vec![
        Vector3::new(0., 0., 0.),
        Vector3::new(1., 0., 0.),
        Vector3::new(1., 1., 0.),
        Vector3::new(0., 1., 0.),
        Vector3::new(0., 0., 1.),
        Vector3::new(1., 0., 1.),
        Vector3::new(1., 1., 1.),
        Vector3::new(0., 1., 1.),
    ];
    let faces = vec![
        [0, 3, 2], // bottom
        [0, 2, 1],
        [4, 5, 6], // top
        [4, 6, 7],
        [0, 1, 5], // front
        [0, 5, 4],
        [2, 3, 7], // back
        [2, 7, 6],
        [0, 4, 7], // left
        [0, 7, 3],
        [1, 2, 6], // right
        [1, 6, 5],
    ];
    (vertices, faces)
}

/// Two triangles sharing one edge; the boundary edges have a single owner,
/// so the mesh is not closed.
pub fn open_strip() -> (Vec<Vector3<f64>>, Vec<[usize; 3]>) {
    let vertices = vec![
        Vector3::new(0., 0., 0.),
        Vector3::new(1., 0., 0.),
        Vector3::new(0., 1., 0.),
        Vector3::new(1., 1., 0.),
    ];
    let faces = vec![[0, 1, 2], [1, 3, 2]];
    (vertices, faces)
}
