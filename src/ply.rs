//! ASCII point-list reader and writer.
//!
//! The header declares `element vertex N` and `element face M`; the body is
//! the last `N + M` lines of the file, `N` vertex lines (`x y z`) followed
//! by `M` face lines (`3 v1 v2 v3`, trailing tokens ignored). On write, each
//! face line is suffixed with an RGB triple derived from its label.

use crate::mesh::Mesh;
use crate::Error;
use log::info;
use nalgebra::Vector3;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

pub fn read_ply<P: AsRef<Path>>(path: P) -> Result<(Vec<Vector3<f64>>, Vec<[usize; 3]>), Error> {
    let text = fs::read_to_string(path)?;
    parse_ply(&text)
}

fn parse_count(token: &str, line: &str) -> Result<usize, Error> {
    token
        .trim()
        .parse()
        .map_err(|_| Error::InputFormat(format!("bad element count: {}", line)))
}

pub fn parse_ply(text: &str) -> Result<(Vec<Vector3<f64>>, Vec<[usize; 3]>), Error> {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let mut v_num: Option<usize> = None;
    let mut f_num: Option<usize> = None;
    for &line in &lines {
        if let Some(count) = line.strip_prefix("element vertex") {
            v_num = Some(parse_count(count, line)?);
        } else if let Some(count) = line.strip_prefix("element face") {
            f_num = Some(parse_count(count, line)?);
        } else if line == "endheader" || line == "end_header" {
            break;
        }
    }
    let v_num = v_num.ok_or_else(|| Error::InputFormat("header declares no vertices".into()))?;
    let f_num = f_num.ok_or_else(|| Error::InputFormat("header declares no faces".into()))?;
    if lines.len() < v_num + f_num {
        return Err(Error::InputFormat(format!(
            "body has fewer than {} + {} lines",
            v_num, f_num
        )));
    }

    let body = &lines[lines.len() - v_num - f_num..];
    let mut vertices = Vec::with_capacity(v_num);
    for line in &body[..v_num] {
        let mut tokens = line.split_whitespace();
        let mut coord = || -> Option<f64> { tokens.next()?.parse().ok() };
        match (coord(), coord(), coord()) {
            (Some(x), Some(y), Some(z)) => vertices.push(Vector3::new(x, y, z)),
            _ => return Err(Error::InputFormat(format!("bad vertex line: {}", line))),
        }
    }
    let mut faces = Vec::with_capacity(f_num);
    for line in &body[v_num..] {
        let mut tokens = line.split_whitespace();
        let mut index = || -> Option<usize> { tokens.next()?.parse().ok() };
        match (index(), index(), index(), index()) {
            (Some(3), Some(a), Some(b), Some(c)) => faces.push([a, b, c]),
            _ => return Err(Error::InputFormat(format!("bad face line: {}", line))),
        }
    }
    Ok((vertices, faces))
}

/// RGB triple encoding a segmentation label.
pub fn label_color(label: usize) -> (u8, u8, u8) {
    (
        (60 * (label % 4 + 1)) as u8,
        (80 * ((label + 1) % 3 + 1)) as u8,
        (50 * ((label + 2) % 5 + 1)) as u8,
    )
}

pub fn write_ply<P: AsRef<Path>>(path: P, mesh: &Mesh) -> Result<(), Error> {
    let mut out = BufWriter::new(fs::File::create(path.as_ref())?);
    writeln!(out, "ply")?;
    writeln!(out, "format ascii 1.0")?;
    writeln!(out, "element vertex {}", mesh.vertices.len())?;
    writeln!(out, "property float x")?;
    writeln!(out, "property float y")?;
    writeln!(out, "property float z")?;
    writeln!(out, "element face {}", mesh.faces.len())?;
    writeln!(out, "property list uchar int vertex_indices")?;
    writeln!(out, "property uint8 red")?;
    writeln!(out, "property uint8 green")?;
    writeln!(out, "property uint8 blue")?;
    writeln!(out, "end_header")?;
    for v in &mesh.vertices {
        writeln!(out, "{} {} {}", v.x, v.y, v.z)?;
    }
    for face in &mesh.faces {
        let (r, g, b) = label_color(face.label);
        writeln!(
            out,
            "3 {} {} {} {} {} {}",
            face.vids[0], face.vids[1], face.vids[2], r, g, b
        )?;
    }
    out.flush()?;
    info!(
        "wrote {} ({} vertices, {} faces)",
        path.as_ref().display(),
        mesh.vertices.len(),
        mesh.faces.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::_test_meshes;

    #[test]
    fn parses_minimal_file() {
        let text = "ply\nelement vertex 3\nelement face 1\nendheader\n\
                    0 0 0\n1 0 0\n0 1 0\n3 0 1 2\n";
        let (vertices, faces) = parse_ply(text).unwrap();
        assert_eq!(vertices.len(), 3);
        assert_eq!(vertices[1], Vector3::new(1., 0., 0.));
        assert_eq!(faces, vec![[0, 1, 2]]);
    }

    #[test]
    fn trailing_tokens_are_ignored() {
        let text = "element vertex 1\nelement face 1\nend_header\n\
                    1.5 2.5 3.5 255\n3 0 0 0 10 20 30\n";
        let (vertices, faces) = parse_ply(text).unwrap();
        assert_eq!(vertices[0], Vector3::new(1.5, 2.5, 3.5));
        assert_eq!(faces[0], [0, 0, 0]);
    }

    #[test]
    fn rejects_missing_header_counts() {
        assert!(matches!(
            parse_ply("ply\nendheader\n"),
            Err(Error::InputFormat(_))
        ));
    }

    #[test]
    fn rejects_non_triangle_faces() {
        let text = "element vertex 3\nelement face 1\nendheader\n\
                    0 0 0\n1 0 0\n0 1 0\n4 0 1 2\n";
        assert!(matches!(parse_ply(text), Err(Error::InputFormat(_))));
    }

    #[test]
    fn rejects_truncated_body() {
        let text = "element vertex 5\nelement face 2\nendheader\n0 0 0\n";
        assert!(matches!(parse_ply(text), Err(Error::InputFormat(_))));
    }

    #[test]
    fn label_colors_stay_in_range() {
        for label in 0..20 {
            let (r, g, b) = label_color(label);
            assert!(r >= 60 && g >= 80 && b >= 50);
        }
        assert_eq!(label_color(0), (60, 160, 150));
    }

    #[test]
    fn written_mesh_reads_back() {
        let (vertices, face_vids) = _test_meshes::tetrahedron();
        let mut mesh = Mesh::new(vertices, face_vids.clone()).unwrap();
        for (i, face) in mesh.faces.iter_mut().enumerate() {
            face.label = i % 2;
        }
        let path = std::env::temp_dir().join("meshseg_roundtrip.ply");
        write_ply(&path, &mesh).unwrap();
        let (vertices, faces) = read_ply(&path).unwrap();
        fs::remove_file(&path).ok();
        assert_eq!(vertices.len(), mesh.vertices.len());
        assert_eq!(faces, face_vids);
        for (v, w) in vertices.iter().zip(&mesh.vertices) {
            assert!((v - w).norm() < 1e-12);
        }
    }
}
