//! Terminal demo: searches a path across a small map, blocks it and
//! searches again after the terrain change.
//!
//! Run: cargo run --bin qtpfs-demo -- --search dijkstra
//! Logging: RUST_LOG=qtpfs_paths=debug cargo run --bin qtpfs-demo

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use log::info;
use qtpfs_core::{Point, Range, SQUARE_SIZE, SpeedModMap, Vec3};
use qtpfs_paths::{LayerConfig, LayerId, ManagerConfig, Path, PathId, PathManager, SearchType};

const MAP: &[&str] = &[
    "................................",
    "................................",
    "..######.............~~~~~~.....",
    "..#....#.............~~~~~~.....",
    "..#....#.............~~~~~~.....",
    "..#..................~~~~~~.....",
    "..######........................",
    "...........#######..............",
    "...........#.....#......++++++..",
    "...........#.....#......++++++..",
    ".................#..............",
    "...........#######..............",
    "................................",
    "....~~~~~~~~~~..................",
    "....~~~~~~~~~~..................",
    "................................",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Search {
    Astar,
    Dijkstra,
}

impl From<Search> for SearchType {
    fn from(s: Search) -> Self {
        match s {
            Search::Astar => SearchType::AStar,
            Search::Dijkstra => SearchType::Dijkstra,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "qtpfs-demo")]
#[command(about = "Search paths over a quad-tree tesselated map")]
struct Cli {
    /// Manager configuration as JSON; missing fields use defaults.
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Overrides the configured search type.
    #[arg(long, short = 's', value_enum)]
    search: Option<Search>,

    /// Disable waypoint smoothing.
    #[arg(long)]
    no_smooth: bool,

    /// Edge length of the root nodes, in cells.
    #[arg(long, default_value_t = 8)]
    root: i32,

    /// Source cell as `x,z`.
    #[arg(long, default_value = "1,1", value_parser = parse_cell)]
    from: Point,

    /// Target cell as `x,z`.
    #[arg(long, default_value = "30,14", value_parser = parse_cell)]
    to: Point,

    /// Print the leaf nodes of the layer.
    #[arg(long, short = 'n')]
    nodes: bool,
}

fn parse_cell(s: &str) -> Result<Point, String> {
    let (x, z) = s.split_once(',').ok_or_else(|| format!("expected x,z, got {s:?}"))?;
    let x = x.trim().parse().map_err(|e| format!("bad x in {s:?}: {e}"))?;
    let z = z.trim().parse().map_err(|e| format!("bad z in {s:?}: {e}"))?;
    Ok(Point::new(x, z))
}

fn load_config(cli: &Cli) -> Result<ManagerConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(file) => serde_json::from_str(&std::fs::read_to_string(file)?)?,
        None => ManagerConfig::default(),
    };
    if let Some(search) = cli.search {
        config.search_type = search.into();
    }
    if cli.no_smooth {
        config.search.smooth_paths = false;
    }
    Ok(config)
}

/// Mark every cell a path passes through, sampling each segment at half a
/// cell.
fn render(terrain: &SpeedModMap, path: &Path) -> String {
    let size = terrain.range().size();
    let mut grid: Vec<Vec<char>> = (0..size.z)
        .map(|z| {
            (0..size.x)
                .map(|x| match terrain.get(Point::new(x, z)).unwrap_or(0.0) {
                    v if v <= 0.0 => '#',
                    v if v < 1.0 => '~',
                    v if v > 1.0 => '+',
                    _ => '.',
                })
                .collect()
        })
        .collect();
    let mut mark = |v: Vec3, ch: char| {
        let p = v.cell();
        if p.x >= 0 && p.z >= 0 && p.x < size.x && p.z < size.z {
            let cell = &mut grid[p.z as usize][p.x as usize];
            if *cell != 'o' && *cell != 'S' && *cell != 'T' {
                *cell = ch;
            }
        }
    };

    for pair in path.points().windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let steps = ((a.distance_2d(b) / (SQUARE_SIZE * 0.5)).ceil() as usize).max(1);
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            mark(a + (b - a) * t, '*');
        }
    }
    for &p in path.points().iter().skip(1).take(path.len().saturating_sub(2)) {
        mark(p, 'o');
    }
    mark(path.source_point(), 'S');
    mark(path.target_point(), 'T');

    grid.into_iter()
        .map(|row| row.into_iter().collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}

fn report(pm: &PathManager, terrain: &SpeedModMap, id: PathId) {
    match pm.path(id) {
        Some(path) => {
            println!(
                "path {id}: {} waypoints, length {:.1}, updated {} time(s)",
                path.len(),
                path.length(),
                path.num_updates()
            );
            for p in path.points() {
                println!("  {p}");
            }
            println!("{}\n", render(terrain, path));
        }
        None => println!("path {id}: no path\n"),
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&cli)?;
    info!("manager config: {config:?}");

    let mut terrain = SpeedModMap::from_ascii(MAP);
    let mut pm = PathManager::new(config);
    let layer: LayerId = pm.add_layer(
        &terrain,
        LayerConfig {
            root_node_size: cli.root,
            ..LayerConfig::default()
        },
    );

    if cli.nodes {
        if let Some(nodes) = pm.layer(layer) {
            for id in nodes.leaves() {
                let node = nodes.node(id);
                println!("{id}: {} cost {:.2}", node.rect(), node.move_cost());
            }
        }
    }

    let src = cli.from.center();
    let tgt = cli.to.center();
    let id = pm.request_path(layer, src, tgt, 0.0, None)?;
    let update = pm.update();
    println!(
        "search: {} searched, {} failed, {} nodes expanded",
        update.searched.len(),
        update.failed.len(),
        update.nodes_expanded
    );
    report(&pm, &terrain, id);

    // Wall off the middle of the map and let the manager re-search.
    let wall = Range::new(20, 0, 21, 15);
    terrain.fill_range(wall, 0.0);
    let dead = pm.terrain_change(layer, &terrain, wall)?;
    println!("terrain change: {dead} path(s) marked dead");
    let update = pm.update();
    println!(
        "re-search: {} searched, {} failed, {} nodes expanded",
        update.searched.len(),
        update.failed.len(),
        update.nodes_expanded
    );
    report(&pm, &terrain, id);

    if pm.path(id).is_some() {
        let next = pm.next_waypoint(id, src, 4.0)?;
        println!("next waypoint from {src}: {next}");
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
