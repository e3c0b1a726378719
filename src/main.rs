use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use canopy_forest::{
    DecisionTreeConfig, EvaluationReport, Evaluator, FoldStrategy, KFold, MaxFeatures,
    RandomForestConfig, SplitCriterion,
};
use canopy_io::{EncodedTable, Encoder, ReportWriter, TableReader, TargetColumn};

#[derive(Parser)]
#[command(name = "canopy")]
#[command(about = "Random-forest out-of-bag and k-fold error for delimited datasets")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed for bootstrap, feature sampling and fold shuffling
    #[arg(long, default_value_t = 99, global = true)]
    seed: u64,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel computation (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

/// How to read and encode the input table.
#[derive(Args, Debug, Clone)]
struct DataArgs {
    /// Single-character cell delimiter ("tab" for tab-separated files)
    #[arg(long, default_value = ",", value_parser = parse_delimiter)]
    delimiter: u8,

    /// Name of the class column (defaults to the last column)
    #[arg(long)]
    target: Option<String>,

    /// Column to drop before encoding, such as a row id (repeatable)
    #[arg(long = "exclude")]
    exclude: Vec<String>,
}

/// Tree-growing parameters shared by forests and single trees.
#[derive(Args, Debug, Clone)]
struct ForestArgs {
    /// Split quality criterion: "gini" or "entropy"
    #[arg(long, default_value = "entropy", value_parser = parse_criterion)]
    criterion: SplitCriterion,

    /// Features tried per split: "sqrt", "log2", "all", a count, or a fraction in (0, 1]
    #[arg(long, default_value = "sqrt", value_parser = parse_max_features)]
    max_features: MaxFeatures,

    /// Maximum tree depth (unlimited if not set)
    #[arg(long)]
    max_depth: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the out-of-bag error and the mean k-fold error of a random forest
    Error {
        /// Path to the delimited input file
        file: PathBuf,

        /// Number of trees in the forest
        n_trees: usize,

        /// Minimum number of samples in each leaf
        min_leaf: usize,

        /// Number of cross-validation folds
        k: usize,

        /// Keep each class's share roughly equal across folds
        #[arg(long, default_value_t = false)]
        stratified: bool,

        /// Write the first tree of the full-data forest as Graphviz DOT
        #[arg(long)]
        dot: Option<PathBuf>,

        /// Print a JSON summary instead of the one-line report
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Also write the JSON summary to this file
        #[arg(long)]
        summary: Option<PathBuf>,

        #[command(flatten)]
        data: DataArgs,

        #[command(flatten)]
        forest: ForestArgs,
    },

    /// Time fitting one forest on the whole dataset
    Time {
        /// Path to the delimited input file
        file: PathBuf,

        /// Number of trees in the forest
        n_trees: usize,

        /// Minimum number of samples in each leaf
        min_leaf: usize,

        #[command(flatten)]
        data: DataArgs,

        #[command(flatten)]
        forest: ForestArgs,
    },

    /// Fit one decision tree on the whole dataset and write it as Graphviz DOT
    Tree {
        /// Path to the delimited input file
        file: PathBuf,

        /// Output path for the DOT file
        #[arg(long)]
        dot: PathBuf,

        /// Minimum number of samples in each leaf
        #[arg(long, default_value_t = 1)]
        min_leaf: usize,

        /// Split quality criterion: "gini" or "entropy"
        #[arg(long, default_value = "entropy", value_parser = parse_criterion)]
        criterion: SplitCriterion,

        /// Maximum tree depth (unlimited if not set)
        #[arg(long)]
        max_depth: Option<usize>,

        #[command(flatten)]
        data: DataArgs,
    },
}

// --- JSON output structs ---

#[derive(Serialize)]
struct ErrorOutput<'a> {
    file: String,
    n_samples: usize,
    n_features: usize,
    n_classes: usize,
    class_names: &'a [String],
    n_trees: usize,
    min_leaf: usize,
    n_folds: usize,
    stratified: bool,
    fold_errors: &'a [f64],
    mean_kfold_error: f64,
    oob_error: f64,
    oob_confusion: &'a [Vec<usize>],
}

#[derive(Serialize)]
struct TreeOutput {
    file: String,
    dot: String,
    min_leaf: usize,
    n_nodes: usize,
    n_leaves: usize,
    depth: usize,
}

fn parse_delimiter(s: &str) -> Result<u8, String> {
    match s {
        "tab" | "\\t" => Ok(b'\t'),
        _ => match s.as_bytes() {
            [byte] => Ok(*byte),
            _ => Err(format!("delimiter must be a single ASCII character, got \"{s}\"")),
        },
    }
}

fn parse_criterion(s: &str) -> Result<SplitCriterion, String> {
    match s {
        "gini" => Ok(SplitCriterion::Gini),
        "entropy" => Ok(SplitCriterion::Entropy),
        other => Err(format!("unknown criterion: {other} (expected gini or entropy)")),
    }
}

fn parse_max_features(s: &str) -> Result<MaxFeatures, String> {
    match s {
        "sqrt" => Ok(MaxFeatures::Sqrt),
        "log2" => Ok(MaxFeatures::Log2),
        "all" => Ok(MaxFeatures::All),
        other => {
            if let Ok(count) = other.parse::<usize>() {
                return Ok(MaxFeatures::Fixed(count));
            }
            match other.parse::<f64>() {
                Ok(f) if f > 0.0 && f <= 1.0 => Ok(MaxFeatures::Fraction(f)),
                _ => Err(format!(
                    "invalid max features: {other} (expected sqrt, log2, all, a count, or a fraction in (0, 1])"
                )),
            }
        }
    }
}

/// Load and encode the input table.
fn load_table(file: &Path, data: &DataArgs) -> Result<EncodedTable> {
    let dataset = TableReader::new(file)
        .with_delimiter(data.delimiter)
        .read()
        .with_context(|| format!("failed to read {}", file.display()))?;

    let target = data
        .target
        .clone()
        .map_or(TargetColumn::Last, TargetColumn::Named);
    let table = Encoder::new(target)
        .with_excluded(data.exclude.iter().cloned())
        .encode(&dataset)
        .context("failed to encode table")?;
    info!(
        n_rows = table.n_rows(),
        n_features = table.n_features(),
        n_classes = table.n_classes(),
        "table ready"
    );
    Ok(table)
}

fn forest_config(
    n_trees: usize,
    min_leaf: usize,
    forest: &ForestArgs,
    seed: u64,
) -> Result<RandomForestConfig> {
    Ok(RandomForestConfig::new(n_trees)?
        .with_min_samples_leaf(min_leaf)
        .with_criterion(forest.criterion)
        .with_max_features(forest.max_features)
        .with_max_depth(forest.max_depth)
        .with_seed(seed))
}

fn write_first_tree(path: &Path, report: &EvaluationReport, table: &EncodedTable) -> Result<()> {
    let dot = report
        .forest
        .tree(0)?
        .to_dot(&table.feature_names, &table.target_codes)?;
    ReportWriter::new()
        .write_dot(path, &dot)
        .context("failed to write DOT file")?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Error {
            file,
            n_trees,
            min_leaf,
            k,
            stratified,
            dot,
            json,
            summary,
            data,
            forest,
        } => {
            let table = load_table(&file, &data)?;

            let strategy = if stratified {
                FoldStrategy::Stratified
            } else {
                FoldStrategy::Shuffled
            };
            let kfold = KFold::new(k)?.with_seed(cli.seed).with_strategy(strategy);
            let config = forest_config(n_trees, min_leaf, &forest, cli.seed)?;

            let evaluator = Evaluator::new(config, kfold);
            let report = evaluator
                .evaluate(&table.features, &table.target)
                .context("evaluation failed")?;

            if let Some(path) = &dot {
                write_first_tree(path, &report, &table)?;
            }

            let output = ErrorOutput {
                file: file.display().to_string(),
                n_samples: report.n_samples,
                n_features: report.n_features,
                n_classes: report.n_classes,
                class_names: &table.target_codes,
                n_trees: evaluator.config().n_trees(),
                min_leaf: evaluator.config().min_samples_leaf(),
                n_folds: evaluator.kfold().n_folds(),
                stratified: evaluator.kfold().strategy() == FoldStrategy::Stratified,
                fold_errors: &report.fold_errors,
                mean_kfold_error: report.mean_kfold_error,
                oob_error: report.oob_error,
                oob_confusion: report.oob_confusion.as_rows(),
            };
            let rendered = serde_json::to_string_pretty(&output)?;

            if let Some(path) = &summary {
                ReportWriter::new()
                    .write_json(path, &rendered)
                    .context("failed to write summary")?;
            }

            if json {
                println!("{rendered}");
            } else {
                println!("oob {:.5} kfold {:.6}", report.oob_error, report.mean_kfold_error);
            }
        }

        Command::Time {
            file,
            n_trees,
            min_leaf,
            data,
            forest,
        } => {
            let table = load_table(&file, &data)?;
            let config = forest_config(n_trees, min_leaf, &forest, cli.seed)?;

            let start = Instant::now();
            let result = config
                .fit(&table.features, &table.target)
                .context("training failed")?;
            let elapsed = start.elapsed().as_secs_f64();
            info!(n_trees = result.forest().n_trees(), elapsed, "forest fitted");

            println!("Fitting {n_trees} estimators {min_leaf} min leaf size {elapsed:.6} seconds");
        }

        Command::Tree {
            file,
            dot,
            min_leaf,
            criterion,
            max_depth,
            data,
        } => {
            let table = load_table(&file, &data)?;

            let tree_config = DecisionTreeConfig::new()
                .with_criterion(criterion)
                .with_max_depth(max_depth)
                .with_min_samples_leaf(min_leaf)
                .with_min_samples_split((2 * min_leaf).max(2))
                .with_seed(cli.seed);
            let tree = tree_config
                .fit(&table.features, &table.target)
                .context("tree training failed")?;

            let rendered = tree.to_dot(&table.feature_names, &table.target_codes)?;
            ReportWriter::new()
                .write_dot(&dot, &rendered)
                .context("failed to write DOT file")?;

            let output = TreeOutput {
                file: file.display().to_string(),
                dot: dot.display().to_string(),
                min_leaf: tree_config.min_samples_leaf(),
                n_nodes: tree.n_nodes(),
                n_leaves: tree.n_leaves(),
                depth: tree.depth(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
