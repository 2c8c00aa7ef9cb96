//! Segments a fixed set of meshes: reads `data/<name>.ply`, decomposes it
//! and writes the colored result to `data/<name>-output.ply`.

use log::{error, info};
use meshseg::mesh::Mesh;
use meshseg::ply;
use meshseg::segmentation::{Model, Segment};

const INPUTS: &[&str] = &["knife", "scissors", "binoculars", "knob", "mug"];

fn run(name: &str) -> Result<(), meshseg::Error> {
    let (vertices, faces) = ply::read_ply(format!("data/{}.ply", name))?;
    let mesh = Mesh::new(vertices, faces)?;
    let mut model = Model::new(mesh);
    let mut segment = Segment::whole_mesh(&model, 2);
    segment.seg(&mut model);
    ply::write_ply(format!("data/{}-output.ply", name), &model.mesh)
}

fn main() {
    env_logger::init();
    for name in INPUTS {
        info!("segmenting {}", name);
        if let Err(e) = run(name) {
            error!("{}: {}", name, e);
            std::process::exit(1);
        }
    }
}
