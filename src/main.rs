use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use hybrid_car_planner::{
    CostMap, GoalKey, HolonomicCache, NonHolonomicTable, PlanRequest, Planner, PlannerConfig, Pose,
    viz,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

#[derive(Parser)]
#[command(name = "hybrid_car_planner")]
#[command(about = "Hybrid A* path planning for a car on a costed grid")]
struct Cli {
    /// TOML configuration file, defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Plan one path and print it
    Plan {
        /// Greyscale cost map raster, bright cells are free
        #[arg(short, long)]
        map: PathBuf,

        /// Start as x,z,heading_deg in grid units
        #[arg(long, allow_hyphen_values = true)]
        start: String,

        /// Goal as x,z in grid units
        #[arg(long, allow_hyphen_values = true)]
        goal: String,

        /// Target speed [km/h]
        #[arg(long, default_value = "20.0")]
        speed: f64,

        #[arg(long)]
        reverse: bool,

        /// Precomputed goal maps for this cost map
        #[arg(long)]
        goal_maps: Option<PathBuf>,

        /// Precomputed non-holonomic table
        #[arg(long)]
        table: Option<PathBuf>,

        /// Stream the search and path to a rerun viewer
        #[arg(long)]
        viz: bool,
    },

    /// Build the non-holonomic-without-obstacles table
    BuildTable {
        #[arg(short, long)]
        output: PathBuf,

        #[arg(long, default_value = "4")]
        workers: usize,
    },

    /// Precompute holonomic goal maps for a list of goal cells
    BuildGoals {
        #[arg(short, long)]
        map: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Goal cells as x,z
        #[arg(long = "goal", required = true, allow_hyphen_values = true)]
        goals: Vec<String>,

        #[arg(long, default_value = "4")]
        workers: usize,
    },
}

fn parse_numbers(text: &str) -> anyhow::Result<Vec<f64>> {
    text.split(',')
        .map(|v| {
            v.trim()
                .parse::<f64>()
                .with_context(|| format!("invalid number {:?} in {:?}", v, text))
        })
        .collect()
}

fn parse_pose(text: &str) -> anyhow::Result<Pose> {
    match parse_numbers(text)?.as_slice() {
        [x, z] => Ok(Pose::new(*x, *z, 0.0)),
        [x, z, heading_deg] => Ok(Pose::new(*x, *z, heading_deg.to_radians())),
        _ => bail!("expected x,z or x,z,heading_deg, got {:?}", text),
    }
}

fn load_map(config: &PlannerConfig, path: &std::path::Path) -> anyhow::Result<Arc<CostMap>> {
    let map = CostMap::load(path)
        .with_context(|| format!("loading cost map {}", path.display()))?
        .with_out_of_bounds_cost(config.map.out_of_bounds_cost);
    Ok(Arc::new(map))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hybrid_car_planner=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            PlannerConfig::load(path)
                .with_context(|| format!("loading configuration {}", path.display()))?
        }
        None => {
            info!("Using default configuration");
            PlannerConfig::default()
        }
    };

    match cli.command {
        Command::Plan {
            map,
            start,
            goal,
            speed,
            reverse,
            goal_maps,
            table,
            viz,
        } => {
            let start = parse_pose(&start)?;
            let goal = parse_pose(&goal)?;
            let map = load_map(&config, &map)?;

            let cache = match goal_maps {
                Some(path) => HolonomicCache::load(map, config.costs.obstacle_weight, &path)
                    .with_context(|| format!("loading goal maps {}", path.display()))?,
                None => HolonomicCache::new(map, config.costs.obstacle_weight),
            };
            let table = match table {
                Some(path) => Some(Arc::new(
                    NonHolonomicTable::load(&path)
                        .with_context(|| format!("loading table {}", path.display()))?,
                )),
                None => None,
            };
            let planner = Planner::new(config, Arc::new(cache), table)?;

            let rec = if viz {
                let rec = rerun::RecordingStreamBuilder::new("hybrid_car_planner").spawn()?;
                viz::log_cost_map(&rec, planner.map());
                let radius = planner.config().search.goal_radius / planner.config().map.resolution;
                viz::log_endpoints(&rec, &start, &goal, radius);
                Some(rec)
            } else {
                None
            };

            let request = PlanRequest::new(start, goal, speed).with_reverse(reverse);
            let t0 = Instant::now();
            let outcome = planner.plan(&request, rec.as_ref())?;
            println!("running T: {:?}", t0.elapsed());

            match outcome.path() {
                Some(path) => {
                    println!("Done! {} steps, length {:.1}", path.len(), path.length());
                    if let Some((steer, direction)) = path.first_move() {
                        println!("First move: steer {} deg, {:?}", steer, direction);
                    }
                    for step in &path {
                        println!(
                            "{:8.2} {:8.2} {:7.1} {:4} {:?}",
                            step.pose.x,
                            step.pose.z,
                            step.pose.theta.to_degrees(),
                            step.steer_deg,
                            step.direction
                        );
                    }
                    if let Some(rec) = &rec {
                        viz::log_path(rec, &path.densify(planner.kinematics(), 0.2));
                        viz::log_vehicle(
                            rec,
                            &path,
                            &planner.config().vehicle,
                            planner.config().map.resolution,
                        );
                    }
                }
                None => {
                    println!(
                        "Searching failed! ({} states closed)",
                        outcome.stats.closed
                    );
                }
            }
        }

        Command::BuildTable { output, workers } => {
            let table = NonHolonomicTable::build(&config, workers)?;
            table
                .save(&output)
                .with_context(|| format!("writing table {}", output.display()))?;
        }

        Command::BuildGoals {
            map,
            output,
            goals,
            workers,
        } => {
            let goals = goals
                .iter()
                .map(|g| parse_pose(g).map(|p| GoalKey::from_pose(&p)))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let map = load_map(&config, &map)?;
            let cache = HolonomicCache::new(map, config.costs.obstacle_weight);

            let t0 = Instant::now();
            cache.precompute(&goals, workers)?;
            info!("Computed {} goal maps in {:?}", cache.len(), t0.elapsed());
            cache
                .save(&output)
                .with_context(|| format!("writing goal maps {}", output.display()))?;
        }
    }

    Ok(())
}
