//! Splinter headless destruction demo
//!
//! Builds a small tower of clusters on an anchored base with a beam held by a
//! joint, meshes it, shoots at the lowest block and steps the simulation until
//! the collapse settles.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p splinter-demo -- [OPTIONS]
//! ```
//!
//! ## Options
//!
//! - `--hits <N>`: Number of shots into the lowest block (default: 3)
//! - `--radius <R>`: Damage radius in world units (default: 1.5)
//! - `--delay-ms <MS>`: Collapse delay in milliseconds (default: 150)
//! - `--shared`: Share corner vertices between quads when meshing
//! - `-h, --help`: Print help message
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::{IVec3, UVec3, Vec3};
use splinter_core::{Color, Placement, VoxelCode, VoxelGrid};
use splinter_destruction::{
    DamageRequest, DamageScheduler, DestructionConfig, DestructionGraph, GraphEvent, Joint,
};
use splinter_fracture::{FractureSplitter, SphericalFracture};
use splinter_mesh::{GreedyMesher, VertexSharing};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Simulation step.
const FRAME: Duration = Duration::from_millis(16);
/// Frames to simulate after the last hit.
const SETTLE_FRAMES: usize = 120;

/// Demo parameters (from CLI or defaults).
#[derive(Debug, Clone)]
struct DemoParams {
    hits: usize,
    radius: f32,
    delay: Duration,
    sharing: VertexSharing,
}

impl Default for DemoParams {
    fn default() -> Self {
        Self {
            hits: 3,
            radius: 1.5,
            delay: Duration::from_millis(150),
            sharing: VertexSharing::PerQuad,
        }
    }
}

impl DemoParams {
    fn from_args() -> Self {
        let mut params = Self::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            let value = args.get(i + 1);
            match args[i].as_str() {
                "--hits" => {
                    if let Some(v) = value.and_then(|v| v.parse().ok()) {
                        params.hits = v;
                        i += 1;
                    }
                }
                "--radius" => {
                    if let Some(v) = value.and_then(|v| v.parse().ok()) {
                        params.radius = v;
                        i += 1;
                    }
                }
                "--delay-ms" => {
                    if let Some(v) = value.and_then(|v| v.parse().ok()) {
                        params.delay = Duration::from_millis(v);
                        i += 1;
                    }
                }
                "--shared" => params.sharing = VertexSharing::SharedCorners,
                other => warn!("ignoring unknown argument {other}"),
            }
            i += 1;
        }

        params
    }
}

fn solid(size: UVec3, color: Color) -> VoxelGrid {
    let mut grid = VoxelGrid::new(size.x, size.y, size.z);
    grid.fill_box(IVec3::ZERO, size.as_ivec3() - IVec3::ONE, VoxelCode::from_color(color));
    grid
}

/// Placement whose grid starts at world corner `min`.
fn placed_at(min: Vec3) -> Placement {
    Placement::at(min + Vec3::ONE)
}

/// Base slab, three stacked blocks and a beam off the top block whose far end
/// is held by a joint.
fn build_tower(graph: &mut DestructionGraph) -> anyhow::Result<Vec<Vec3>> {
    let stone = Color::new(128, 124, 118);
    let brick = Color::new(164, 84, 60);
    let wood = Color::new(120, 86, 50);

    let base = graph.add_cluster(solid(UVec3::new(6, 2, 6), stone), placed_at(Vec3::ZERO));
    graph.set_anchored(base, true)?;

    let mut centers = Vec::new();
    for level in 0..3 {
        let min = Vec3::new(1.0, 2.0 + 3.0 * level as f32, 1.0);
        graph.add_cluster(solid(UVec3::new(4, 3, 4), brick), placed_at(min));
        centers.push(min + Vec3::new(2.0, 1.5, 2.0));
    }

    let beam_min = Vec3::new(5.0, 9.0, 2.0);
    graph.add_cluster(solid(UVec3::new(6, 1, 2), wood), placed_at(beam_min));
    graph.add_joint(Joint::new(beam_min + Vec3::new(5.5, 0.5, 1.0), 0.5));
    Ok(centers)
}

fn mesh_all(graph: &DestructionGraph, mesher: &GreedyMesher) {
    let grids: Vec<VoxelGrid> = graph
        .clusters()
        .filter(|c| c.has_grid() && !c.is_collapsed())
        .map(|c| c.grid().copy())
        .collect();
    let start = Instant::now();
    let meshes = mesher.generate_batch(&grids);
    let vertices: usize = meshes.iter().map(|m| m.vertex_count()).sum();
    let triangles: usize = meshes.iter().map(|m| m.triangle_count()).sum();
    info!(
        "Meshed {} standing clusters: {} vertices, {} triangles in {:.2?}",
        meshes.len(),
        vertices,
        triangles,
        start.elapsed()
    );
}

fn log_events(graph: &mut DestructionGraph, elapsed: Duration) {
    for event in graph.take_events() {
        match event {
            GraphEvent::ClusterCollapsed { cluster, cause } => {
                info!("[{elapsed:>6.0?}] {cluster} collapsed ({cause:?})");
            }
            GraphEvent::FragmentSpawned {
                parent,
                fragment,
                voxels,
            } => info!("[{elapsed:>6.0?}] {fragment} broke off {parent} ({voxels} voxels)"),
            GraphEvent::FixationChanged { joint, clusters } => {
                info!("[{elapsed:>6.0?}] {joint} now holds {clusters} clusters");
            }
            GraphEvent::FixationBroken { joint } => {
                warn!("[{elapsed:>6.0?}] {joint} lost its last cluster");
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    if std::env::args().any(|arg| arg == "-h" || arg == "--help") {
        print_help();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let params = DemoParams::from_args();
    info!("Splinter destruction demo: {params:?}");

    let config = DestructionConfig::default().with_collapse_delay(params.delay);
    let policy = SphericalFracture::new(
        FractureSplitter::new().with_max_fragment_voxels(config.max_fragment_voxels),
    );
    let mut graph = DestructionGraph::with_policy(config, Arc::new(policy));
    let centers = build_tower(&mut graph)?;

    let start = Instant::now();
    let connections = graph.bake();
    info!(
        "Baked {} connections between {} clusters in {:.2?}",
        connections,
        graph.cluster_count(),
        start.elapsed()
    );
    for connection in graph.connections() {
        info!("  {} <-> {}", connection.a, connection.b);
    }

    let mesher = GreedyMesher::new(params.sharing);
    mesh_all(&graph, &mesher);

    // Lowest block is cluster 1, right above the base.
    let target = graph
        .clusters()
        .nth(1)
        .map(splinter_destruction::Cluster::id)
        .ok_or_else(|| anyhow::anyhow!("tower has no blocks"))?;
    let mut scheduler = DamageScheduler::new();
    for hit in 0..params.hits {
        let offset = Vec3::new(hit as f32 * 0.7 - 0.7, 0.0, -2.0);
        let request = DamageRequest::new(target, centers[0] + offset, params.radius);
        scheduler.submit(&graph, request)?;
    }

    let mut elapsed = Duration::ZERO;
    let mut frames_idle = 0;
    while frames_idle < SETTLE_FRAMES {
        for (ticket, report) in scheduler.poll(&mut graph) {
            match report {
                Ok(report) => info!(
                    "[{elapsed:>6.0?}] hit {:?} removed {} voxels, {} fragments",
                    ticket,
                    report.removed.len(),
                    report.fragments.len()
                ),
                Err(err) => warn!("[{elapsed:>6.0?}] hit {ticket:?} failed: {err}"),
            }
        }
        graph.update(FRAME);
        elapsed += FRAME;
        log_events(&mut graph, elapsed);

        if scheduler.is_idle() && graph.pending_collapses().next().is_none() {
            frames_idle += 1;
        } else {
            frames_idle = 0;
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    let standing = graph.clusters().filter(|c| !c.is_collapsed()).count();
    info!(
        "Settled after {elapsed:.0?}: {standing} of {} clusters standing",
        graph.cluster_count()
    );
    mesh_all(&graph, &mesher);
    Ok(())
}

fn print_help() {
    eprintln!(
        "Splinter headless destruction demo

USAGE:
    cargo run -p splinter-demo -- [OPTIONS]

OPTIONS:
    --hits <N>          Number of shots into the lowest block (default: 3)
    --radius <R>        Damage radius in world units (default: 1.5)
    --delay-ms <MS>     Collapse delay in milliseconds (default: 150)
    --shared            Share corner vertices between quads when meshing
    -h, --help          Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG            Set log level (e.g., info, debug, trace)"
    );
}
