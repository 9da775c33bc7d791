//! In-process client/server run of an encrypted decision-tree evaluation.

use std::path::{Path, PathBuf};
use std::time::Instant;

use aces_tree::{
    required_depth, AcesEngine, Client, ClearEngine, Config, DecisionTreeEvaluator, Decryptor, Error,
    EvaluatorOptions, HomomorphicEngine, Node, SecureComparator,
};
use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use csv::Writer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EngineKind {
    /// Depth-counting slot simulator
    Clear,
    /// ACES public-key scheme
    Aces,
}

impl EngineKind {
    fn name(self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::Aces => "aces",
        }
    }
}

#[derive(Parser)]
#[command(about = "Evaluate a decision tree on encrypted features")]
struct Opt {
    /// JSON tree document; the built-in three-leaf tree when omitted
    #[arg(long)]
    tree: Option<PathBuf>,
    /// Feature values, comma separated
    #[arg(
        long,
        value_delimiter = ',',
        allow_negative_numbers = true,
        default_values_t = [10i64, 23, 18]
    )]
    features: Vec<i64>,
    #[arg(long, value_enum, default_value_t = EngineKind::Clear)]
    engine: EngineKind,
    /// JSON configuration document
    #[arg(long)]
    config: Option<PathBuf>,
    /// Evaluate subtrees concurrently
    #[arg(long)]
    parallel: bool,
    /// Write a CSV row of run statistics here
    #[arg(long)]
    stats: Option<PathBuf>,
}

struct RunStats {
    required: u32,
    available: u32,
    operations: usize,
    elapsed_ms: f64,
    result: Option<i64>,
}

fn run<E, K>(
    engine: &E,
    key: K,
    operations: impl Fn() -> usize,
    tree: &Node,
    features: &[i64],
    options: EvaluatorOptions,
) -> Result<RunStats>
where
    E: HomomorphicEngine,
    K: Decryptor<E>,
{
    let available = engine.remaining_depth();
    let required = required_depth(tree, SecureComparator::new(engine)?.depth());
    let client = Client::new(engine, key);

    let start = Instant::now();
    let result = match DecisionTreeEvaluator::new(engine, tree, options) {
        Ok(evaluator) => {
            let inputs = client.encrypt_features(features)?;
            let verdict = evaluator.evaluate(&inputs)?;
            client.dump("verdict", &verdict)?;
            Some(client.decrypt_value(&verdict)?)
        }
        Err(Error::DepthBudget {
            required,
            available,
        }) => {
            warn!(required, available, "tree rejected: engine depth budget too small");
            None
        }
        Err(e) => return Err(e.into()),
    };

    Ok(RunStats {
        required,
        available,
        operations: operations(),
        elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
        result,
    })
}

fn write_stats(path: &Path, engine: EngineKind, stats: &RunStats, expected: i64) -> Result<()> {
    let mut wtr = Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    wtr.write_record([
        "engine",
        "required_depth",
        "available_depth",
        "operations",
        "time_ms",
        "result",
        "expected",
    ])?;
    wtr.write_record([
        engine.name().to_string(),
        stats.required.to_string(),
        stats.available.to_string(),
        stats.operations.to_string(),
        format!("{:.3}", stats.elapsed_ms),
        stats.result.map(|r| r.to_string()).unwrap_or_default(),
        expected.to_string(),
    ])?;
    wtr.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let opt = Opt::parse();
    let mut config = match &opt.config {
        Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };
    config.evaluator.parallel |= opt.parallel;

    let tree = match &opt.tree {
        Some(path) => Node::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => Node::reference(),
    };
    let expected = tree.evaluate(&opt.features)?;
    info!(
        engine = opt.engine.name(),
        features = ?opt.features,
        internal = tree.count_internal(),
        height = tree.height(),
        "starting evaluation"
    );

    let stats = match opt.engine {
        EngineKind::Clear => {
            let (engine, key) = ClearEngine::generate_keypair(config.clear.clone())?;
            run(&engine, key, || engine.operations(), &tree, &opt.features, config.evaluator)?
        }
        EngineKind::Aces => {
            let (engine, key) = AcesEngine::generate_keypair(config.aces.clone())?;
            run(&engine, key, || engine.operations(), &tree, &opt.features, config.evaluator)?
        }
    };

    if let Some(path) = &opt.stats {
        write_stats(path, opt.engine, &stats, expected)?;
    }

    match stats.result {
        Some(result) if result != expected => {
            bail!("encrypted evaluation returned {result}, plaintext evaluation {expected}")
        }
        Some(result) => info!(
            result,
            operations = stats.operations,
            time_ms = stats.elapsed_ms,
            "encrypted evaluation matches plaintext"
        ),
        None => info!(
            required = stats.required,
            available = stats.available,
            "no evaluation performed"
        ),
    }
    Ok(())
}
