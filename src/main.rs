use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use ccml_io::{Industry, Kpi, KpiValues, MaturityLevel, ModelKey, Observation, SurveyResult};
use ccml_model::{BundleStore, ClassProbability, TrainingConfig};
use ccml_rf::{SplitCriterion, SplitMethod};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

mod context;
mod page;
mod web;

use context::{AppContext, ModelLocation, train_and_save};

#[derive(Parser)]
#[command(name = "ccml")]
#[command(about = "Call-center analytics maturity level prediction")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed for the holdout split and the forest
    #[arg(long, default_value_t = TrainingConfig::DEFAULT_SEED, global = true)]
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

/// Where bundles are stored and under which key.
#[derive(Args, Debug, Clone)]
struct StoreArgs {
    /// Directory holding bundles and training reports
    #[arg(long, default_value = "models")]
    model_dir: PathBuf,

    /// Bundle key (must match [a-zA-Z0-9_-]+)
    #[arg(long, default_value = ModelKey::DEFAULT)]
    key: ModelKey,
}

/// Training hyperparameters.
#[derive(Args, Debug, Clone)]
struct ForestArgs {
    /// Number of trees in the Random Forest
    #[arg(long, default_value_t = ccml_rf::RandomForestConfig::DEFAULT_N_TREES)]
    n_trees: usize,

    /// Maximum tree depth (unlimited if not set)
    #[arg(long)]
    max_depth: Option<usize>,

    /// Fraction of rows held out for the accuracy estimate
    #[arg(long, default_value_t = TrainingConfig::DEFAULT_TEST_FRACTION)]
    test_fraction: f64,

    /// Split-finding strategy: "exact" or "extra-trees"
    #[arg(long, default_value = "exact")]
    split_method: String,

    /// Impurity criterion: "gini" or "entropy"
    #[arg(long, default_value = "gini")]
    criterion: String,
}

impl ForestArgs {
    fn training_config(&self, seed: u64) -> Result<TrainingConfig> {
        Ok(TrainingConfig::new()
            .with_seed(seed)
            .with_n_trees(self.n_trees)
            .with_max_depth(self.max_depth)
            .with_test_fraction(self.test_fraction)
            .with_split_method(parse_split_method(&self.split_method)?)
            .with_criterion(parse_criterion(&self.criterion)?))
    }
}

/// One call center's KPIs; omitted values take the training mean.
#[derive(Args, Debug, Clone)]
struct KpiArgs {
    /// Average handle time, minutes
    #[arg(long)]
    aht_min: Option<f64>,

    /// Non-talk time, minutes
    #[arg(long)]
    ntt_min: Option<f64>,

    /// Cross talk, percent
    #[arg(long)]
    cross_talk_pct: Option<f64>,

    /// Customer satisfaction, percent
    #[arg(long)]
    csat_pct: Option<f64>,

    /// Sentiment score
    #[arg(long)]
    sentiment_score: Option<f64>,

    /// Net promoter score
    #[arg(long)]
    nps_score: Option<f64>,

    /// First call resolution, percent
    #[arg(long)]
    fcr_pct: Option<f64>,

    /// Average speed of answer, seconds
    #[arg(long)]
    asa_sec: Option<f64>,

    /// Abandonment rate, percent
    #[arg(long)]
    abandonment_rate_pct: Option<f64>,
}

impl KpiArgs {
    fn get(&self, kpi: Kpi) -> Option<f64> {
        match kpi {
            Kpi::Aht => self.aht_min,
            Kpi::Ntt => self.ntt_min,
            Kpi::CrossTalk => self.cross_talk_pct,
            Kpi::Csat => self.csat_pct,
            Kpi::Sentiment => self.sentiment_score,
            Kpi::Nps => self.nps_score,
            Kpi::Fcr => self.fcr_pct,
            Kpi::Asa => self.asa_sec,
            Kpi::AbandonmentRate => self.abandonment_rate_pct,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Fit a bundle on the training CSV, store it, and write its report
    Train {
        /// Path to the training CSV file
        #[arg(long, default_value = "MLData.csv")]
        data: PathBuf,

        #[command(flatten)]
        store: StoreArgs,

        #[command(flatten)]
        forest: ForestArgs,
    },

    /// Predict the maturity level of one call center with a stored bundle
    Predict {
        #[command(flatten)]
        store: StoreArgs,

        #[command(flatten)]
        kpis: KpiArgs,

        /// Medallia survey result
        #[arg(long, default_value = "Satisfied")]
        survey_result: SurveyResult,

        /// Industry served
        #[arg(long, default_value = "Healthcare")]
        industry: Industry,
    },

    /// Serve the prediction form and JSON API
    Serve {
        /// Path to the training CSV file (read only when training is needed)
        #[arg(long, default_value = "MLData.csv")]
        data: PathBuf,

        #[command(flatten)]
        store: StoreArgs,

        #[command(flatten)]
        forest: ForestArgs,

        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:8501")]
        listen: SocketAddr,

        /// Retrain and overwrite the stored bundle before serving
        #[arg(long, default_value_t = false)]
        retrain: bool,
    },
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct TrainOutput {
    key: String,
    bundle: PathBuf,
    n_train: usize,
    n_test: usize,
    accuracy: f64,
    classes: Vec<MaturityLevel>,
    n_features: usize,
    top_features: Vec<FeatureOutput>,
}

#[derive(Serialize)]
struct FeatureOutput {
    name: String,
    importance: f64,
}

#[derive(Serialize)]
struct PredictOutput {
    label: MaturityLevel,
    probabilities: Vec<ClassProbability>,
    accuracy: f64,
}

fn parse_split_method(s: &str) -> Result<SplitMethod> {
    match s {
        "exact" => Ok(SplitMethod::Exact),
        "extra-trees" => Ok(SplitMethod::ExtraTrees),
        other => anyhow::bail!("unknown split method: {other} (expected exact or extra-trees)"),
    }
}

fn parse_criterion(s: &str) -> Result<SplitCriterion> {
    match s {
        "gini" => Ok(SplitCriterion::Gini),
        "entropy" => Ok(SplitCriterion::Entropy),
        other => anyhow::bail!("unknown criterion: {other} (expected gini or entropy)"),
    }
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
        Command::Train {
            data,
            store,
            forest,
        } => {
            let config = forest.training_config(cli.seed)?;
            let location = ModelLocation {
                data,
                model_dir: store.model_dir,
                key: store.key,
            };
            let (outcome, bundle_path) =
                train_and_save(&location, &config).context("training failed")?;

            let output = TrainOutput {
                key: location.key.to_string(),
                bundle: bundle_path,
                n_train: outcome.evaluation.n_train,
                n_test: outcome.evaluation.n_test,
                accuracy: outcome.evaluation.accuracy,
                classes: outcome.bundle.classes().to_vec(),
                n_features: outcome.bundle.preprocessor().n_outputs(),
                top_features: outcome
                    .importances
                    .iter()
                    .take(5)
                    .map(|f| FeatureOutput {
                        name: f.name.clone(),
                        importance: f.importance,
                    })
                    .collect(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Predict {
            store,
            kpis,
            survey_result,
            industry,
        } => {
            let bundle = BundleStore::new(&store.model_dir)
                .load(&store.key)
                .context("failed to load bundle")?;
            info!(
                classes = bundle.classes().len(),
                n_trees = bundle.forest().n_trees(),
                "bundle loaded"
            );

            let ranges = bundle.kpi_ranges();
            let means = ranges.means();
            let observation = Observation {
                kpis: KpiValues::from_fn(|kpi| kpis.get(kpi).unwrap_or_else(|| means.get(kpi))),
                survey_result,
                industry,
            };
            if let Err(err) = ranges.check(&observation.kpis) {
                warn!(error = %err, "input lies outside the training data");
            }

            let prediction = bundle
                .predict_observation(&observation)
                .context("prediction failed")?;
            let output = PredictOutput {
                label: prediction.label,
                probabilities: prediction.probabilities,
                accuracy: bundle.accuracy(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Serve {
            data,
            store,
            forest,
            listen,
            retrain,
        } => {
            let config = forest.training_config(cli.seed)?;
            let location = ModelLocation {
                data,
                model_dir: store.model_dir,
                key: store.key,
            };
            let ctx = AppContext::initialize(&location, &config, retrain)
                .context("failed to prepare model")?;

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("failed to start async runtime")?;
            runtime
                .block_on(web::serve(Arc::new(ctx), listen))
                .with_context(|| format!("server on {listen} failed"))?;
        }
    }

    Ok(())
}
