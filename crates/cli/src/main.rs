//! Ecotope CLI - Spatial cluster detection

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use ecotope_algorithms::cluster::{amoeba, AmoebaParams, Criterion, Overlap, SeedOrdering};
use ecotope_algorithms::stats::PrecomputedScores;
use ecotope_algorithms::weights::{
    ContiguityKind, DistanceBand, DistanceMetric, WeightsMatrix, WeightsMode, WeightsParams,
};
use ecotope_core::io::{read_geojson, write_geojson};
use ecotope_core::{AttributeValue, CancelToken, FeatureCollection};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "ecotope")]
#[command(author, version, about = "Spatial cluster detection", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a spatial weights matrix and print its summary
    Weights {
        /// Input GeoJSON file
        input: PathBuf,

        #[command(flatten)]
        weights: WeightsArgs,
    },
    /// Detect spatial clusters with AMOEBA
    Detect {
        /// Input GeoJSON file
        input: PathBuf,

        /// Attribute holding the precomputed local statistic (e.g. a Gi*
        /// z-score written by an external statistics tool)
        #[arg(short, long)]
        score_attribute: String,

        /// Attribute to average per cluster (defaults to the score
        /// attribute)
        #[arg(long)]
        value_attribute: Option<String>,

        /// Acceptance criterion direction
        #[arg(long, value_enum, default_value = "max")]
        criterion: CriterionArg,

        /// Criterion threshold on the regional score
        #[arg(long, default_value = "1.96", allow_hyphen_values = true)]
        cutoff: f64,

        /// Seed ranking direction
        #[arg(long, value_enum, default_value = "desc")]
        seed_order: OrderArg,

        /// Overlap policy between clusters
        #[arg(long, value_enum, default_value = "avoid")]
        overlap: OverlapArg,

        /// Drop single-member clusters
        #[arg(long)]
        drop_singletons: bool,

        /// Report unclustered feature ids
        #[arg(long)]
        unclustered: bool,

        /// Write a copy of the input with a cluster_id attribute
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        weights: WeightsArgs,
    },
}

#[derive(Args)]
struct WeightsArgs {
    /// Contiguity rule (ignored when a distance band is set)
    #[arg(long, value_enum, default_value = "queen")]
    contiguity: ContiguityArg,

    /// Contiguity order (neighbor-expansion hops)
    #[arg(long, default_value = "1")]
    order: usize,

    /// Weight hop-h contiguity neighbors at 1/h
    #[arg(long)]
    order_decay: bool,

    /// Use k-nearest-neighbor distance weights
    #[arg(long, conflicts_with = "threshold")]
    knn: Option<usize>,

    /// Use threshold-distance weights
    #[arg(long, conflicts_with = "knn")]
    threshold: Option<f64>,

    /// Distance metric for distance-based weights
    #[arg(long, value_enum, default_value = "euclidean")]
    metric: MetricArg,

    /// Inverse-distance decay exponent
    #[arg(long)]
    decay: Option<f64>,

    /// Standardize every row to sum to 1
    #[arg(long)]
    row_standardize: bool,

    /// Include each feature in its own neighbor row
    #[arg(long)]
    self_neighbor: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ContiguityArg {
    Queen,
    Rook,
    Bishop,
}

#[derive(Clone, Copy, ValueEnum)]
enum MetricArg {
    Euclidean,
    Manhattan,
}

#[derive(Clone, Copy, ValueEnum)]
enum CriterionArg {
    /// Regional score must stay at or above the cutoff
    Max,
    /// Regional score must stay at or below the cutoff
    Min,
}

#[derive(Clone, Copy, ValueEnum)]
enum OrderArg {
    Desc,
    Asc,
}

#[derive(Clone, Copy, ValueEnum)]
enum OverlapArg {
    Remove,
    Avoid,
}

impl WeightsArgs {
    fn to_params(&self) -> WeightsParams {
        let mode = if let Some(k) = self.knn {
            WeightsMode::Distance {
                band: DistanceBand::KNearest(k),
                metric: self.metric.into(),
                decay_exponent: self.decay,
            }
        } else if let Some(d) = self.threshold {
            WeightsMode::Distance {
                band: DistanceBand::Threshold(d),
                metric: self.metric.into(),
                decay_exponent: self.decay,
            }
        } else {
            WeightsMode::Contiguity {
                kind: self.contiguity.into(),
                order: self.order,
                order_decay: self.order_decay,
            }
        };
        WeightsParams {
            mode,
            row_standardize: self.row_standardize,
            self_neighbor: self.self_neighbor,
        }
    }
}

impl From<ContiguityArg> for ContiguityKind {
    fn from(arg: ContiguityArg) -> Self {
        match arg {
            ContiguityArg::Queen => ContiguityKind::Queen,
            ContiguityArg::Rook => ContiguityKind::Rook,
            ContiguityArg::Bishop => ContiguityKind::Bishop,
        }
    }
}

impl From<MetricArg> for DistanceMetric {
    fn from(arg: MetricArg) -> Self {
        match arg {
            MetricArg::Euclidean => DistanceMetric::Euclidean,
            MetricArg::Manhattan => DistanceMetric::Manhattan,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install tracing subscriber")?;

    match cli.command {
        Commands::Weights { input, weights } => cmd_weights(&input, &weights),
        Commands::Detect {
            input,
            score_attribute,
            value_attribute,
            criterion,
            cutoff,
            seed_order,
            overlap,
            drop_singletons,
            unclustered,
            output,
            weights,
        } => cmd_detect(DetectRun {
            input,
            score_attribute,
            value_attribute,
            criterion,
            cutoff,
            seed_order,
            overlap,
            drop_singletons,
            unclustered,
            output,
            weights,
        }),
    }
}

fn load(input: &PathBuf) -> Result<FeatureCollection> {
    let features = read_geojson(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    info!(features = features.len(), "loaded {}", input.display());
    Ok(features)
}

fn spinner(message: &'static str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap());
    bar.set_message(message);
    bar.enable_steady_tick(std::time::Duration::from_millis(100));
    bar
}

fn cmd_weights(input: &PathBuf, args: &WeightsArgs) -> Result<()> {
    let features = load(input)?;
    let start = Instant::now();

    let bar = spinner("building weights matrix...");
    let matrix = WeightsMatrix::build(&features, &args.to_params())?;
    bar.finish_and_clear();

    info!("weights matrix built in {:.2}s", start.elapsed().as_secs_f64());
    println!("{}", serde_json::to_string_pretty(&matrix.summary())?);
    Ok(())
}

struct DetectRun {
    input: PathBuf,
    score_attribute: String,
    value_attribute: Option<String>,
    criterion: CriterionArg,
    cutoff: f64,
    seed_order: OrderArg,
    overlap: OverlapArg,
    drop_singletons: bool,
    unclustered: bool,
    output: Option<PathBuf>,
    weights: WeightsArgs,
}

fn cmd_detect(run: DetectRun) -> Result<()> {
    let features = load(&run.input)?;
    let start = Instant::now();

    let bar = spinner("building weights matrix...");
    let matrix = WeightsMatrix::build(&features, &run.weights.to_params())?;
    bar.finish_and_clear();

    let provider = PrecomputedScores::from_attribute(&features, &run.score_attribute)?;
    let value_attribute = run
        .value_attribute
        .as_deref()
        .unwrap_or(&run.score_attribute);

    let params = AmoebaParams {
        ordering: match run.seed_order {
            OrderArg::Desc => SeedOrdering::Descending,
            OrderArg::Asc => SeedOrdering::Ascending,
        },
        criterion: match run.criterion {
            CriterionArg::Max => Criterion::Maximization { threshold: run.cutoff },
            CriterionArg::Min => Criterion::Minimization { threshold: run.cutoff },
        },
        overlap: match run.overlap {
            OverlapArg::Remove => Overlap::Remove,
            OverlapArg::Avoid => Overlap::Avoid,
        },
        exclude_singletons: run.drop_singletons,
        report_unclustered: run.unclustered,
        ..Default::default()
    };

    let bar = spinner("growing clusters...");
    let detection = amoeba(
        &features,
        &matrix,
        &provider,
        value_attribute,
        &params,
        &CancelToken::new(),
    )?;
    bar.finish_and_clear();

    info!(
        clusters = detection.clusters.len(),
        "detection completed in {:.2}s",
        start.elapsed().as_secs_f64()
    );

    if let Some(path) = &run.output {
        let mut labeled = features.clone();
        for cluster in &detection.clusters {
            for member in &cluster.members {
                if let Some(f) = labeled.features.iter_mut().find(|f| &f.id == member) {
                    f.set_property("cluster_id", AttributeValue::Int(cluster.id as i64));
                }
            }
        }
        write_geojson(path, &labeled)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!("labeled features written to {}", path.display());
    }

    println!("{}", serde_json::to_string_pretty(&detection)?);
    Ok(())
}
