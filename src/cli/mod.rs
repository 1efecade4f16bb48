//! Readmission pipeline CLI
//!
//! Command-line interface for analysis, training, evaluation and request
//! dispatch.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::analysis::{read_artifact, AnalysisProducer, DatasetPaths};
use crate::config::PipelineConfig;
use crate::dispatch::{DispatchTable, PipelineContext};
use crate::evaluation::evaluate_model;
use crate::export::{manifest_path_for, FeatureManifest, ModelArtifact};
use crate::training::{ModelType, TrainEngine};
use crate::utils::{describe_table, load_train_split};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn fmt_score(v: Option<f64>) -> String {
    v.map_or_else(|| "n/a".to_string(), |v| format!("{:.4}", v))
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "readmit")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Hospital readmission analysis, training and evaluation")]
#[command(long_about = None)]
pub struct Cli {
    /// JSON pipeline configuration
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a classifier on the train split and persist it
    Train {
        /// Train file or dataset-store directory
        #[arg(long = "train_path")]
        train_path: PathBuf,

        /// Output model file
        #[arg(long = "model_output")]
        model_output: PathBuf,

        /// Output feature manifest (defaults beside the model)
        #[arg(long = "manifest_output")]
        manifest_output: Option<PathBuf>,

        /// Analysis artifact supplying column kinds
        #[arg(long)]
        analysis: Option<PathBuf>,

        /// gradient_boosting, logistic_regression, random_forest or auto
        #[arg(long)]
        model: Option<ModelType>,

        /// Cross-validation folds (0 disables)
        #[arg(long = "cv_folds")]
        cv_folds: Option<usize>,
    },

    /// Score a persisted model on the test split
    Evaluate {
        /// Persisted model file
        #[arg(long = "model_path")]
        model_path: PathBuf,

        /// Test file or dataset-store directory
        #[arg(long = "test_path")]
        test_path: PathBuf,

        /// Feature manifest (defaults beside the model)
        #[arg(long = "manifest_path")]
        manifest_path: Option<PathBuf>,
    },

    /// Analyze the train split and write the analysis artifact
    Analyze {
        /// Train file or dataset-store directory
        #[arg(long = "train_path")]
        train_path: PathBuf,

        /// Test file or directory recorded in the artifact
        #[arg(long = "test_path")]
        test_path: Option<PathBuf>,

        /// Artifact output file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Route a free-text request to analysis, modeling or evaluation
    Run {
        /// Request text, e.g. "train a classifier"
        #[arg(long)]
        request: String,

        /// Dataset file or dataset-store directory
        #[arg(long)]
        dataset: Option<PathBuf>,
    },

    /// Show shape and column kinds of a table
    Info {
        /// Input file or dataset-store directory
        #[arg(long)]
        data: PathBuf,
    },
}

impl Commands {
    /// Prefix printed before the error message when the command fails
    pub fn failure_prefix(&self) -> &'static str {
        match self {
            Commands::Train { .. } => "Training failed",
            Commands::Evaluate { .. } => "Evaluation failed",
            Commands::Analyze { .. } => "Analysis failed",
            Commands::Run { .. } => "Request failed",
            Commands::Info { .. } => "Inspection failed",
        }
    }
}

/// Configuration from `--config`, or defaults
pub fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    match path {
        Some(path) => Ok(PipelineConfig::from_file(path)?),
        None => Ok(PipelineConfig::default()),
    }
}

/// Execute one parsed command line
pub fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Train {
            train_path,
            model_output,
            manifest_output,
            analysis,
            model,
            cv_folds,
        } => cmd_train(
            config,
            &train_path,
            &model_output,
            manifest_output.as_deref(),
            analysis.as_deref(),
            model,
            cv_folds,
        ),
        Commands::Evaluate {
            model_path,
            test_path,
            manifest_path,
        } => cmd_evaluate(&model_path, &test_path, manifest_path.as_deref()),
        Commands::Analyze {
            train_path,
            test_path,
            output,
        } => cmd_analyze(config, &train_path, test_path, output.as_deref()),
        Commands::Run { request, dataset } => cmd_run(config, &request, dataset),
        Commands::Info { data } => cmd_info(&data),
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(
    config: PipelineConfig,
    train_path: &Path,
    model_output: &Path,
    manifest_output: Option<&Path>,
    analysis_path: Option<&Path>,
    model: Option<ModelType>,
    cv_folds: Option<usize>,
) -> anyhow::Result<()> {
    section("Train");

    step_run("Loading train split");
    let start = Instant::now();
    let df = load_train_split(train_path)?;
    step_done(&format!("{} rows × {} cols in {:?}", df.height(), df.width(), start.elapsed()));

    let analysis = match analysis_path {
        Some(path) => {
            let artifact = read_artifact(path)?;
            step_ok(&format!("Column kinds from {}", path.display()));
            Some(artifact)
        }
        None => None,
    };

    let mut training = config.training.clone();
    if let Some(model) = model {
        training = training.with_model(model);
    }
    if let Some(folds) = cv_folds {
        training = training.with_cv(folds);
    }

    step_run(&format!("Training {}", training.model_type.as_str().cyan()));
    let start = Instant::now();
    let engine = TrainEngine::new(training).with_preprocessing(config.preprocessing.clone());
    let outcome = engine.train(&df, analysis.as_ref())?;
    step_done(&format!("{:?}", start.elapsed()));

    let manifest_output = manifest_output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| manifest_path_for(model_output));
    ModelArtifact::from_outcome(&outcome, &config.target_column).save(model_output)?;
    FeatureManifest::new(outcome.manifest.clone()).save(&manifest_output)?;
    step_ok(&format!("Model    → {}", model_output.display()));
    step_ok(&format!("Manifest → {}", manifest_output.display()));

    println!();
    println!("  {:<24} {:>10} {:>10}", muted("Candidate"), muted("Val AUC"), muted("CV AUC"));
    println!("  {}", dim(&"─".repeat(46)));
    for c in &outcome.candidates {
        match &c.error {
            Some(err) => println!("  {:<24} {}", c.model_type.as_str(), format!("err: {}", err).red()),
            None => println!(
                "  {:<24} {:>10} {:>10}",
                c.model_type.as_str(),
                fmt_score(c.validation_auc),
                fmt_score(c.cv.as_ref().map(|cv| cv.auc.mean_score)),
            ),
        }
    }
    println!("  {}", dim(&"─".repeat(46)));

    println!();
    println!("  {:<16} {}", muted("Selected"), outcome.selected.as_str().white().bold());
    println!("  {:<16} {}", muted("Validation AUC"), fmt_score(outcome.validation_auc()).white().bold());
    println!("  {:<16} {}", muted("Training AUC"), fmt_score(outcome.training_auc).white());
    println!("  {:<16} {}", muted("Time"), format!("{:.3}s", outcome.training_time_secs).white());
    println!();

    Ok(())
}

pub fn cmd_evaluate(
    model_path: &Path,
    test_path: &Path,
    manifest_path: Option<&Path>,
) -> anyhow::Result<()> {
    section("Evaluate");

    step_run("Scoring test split");
    let start = Instant::now();
    let report = evaluate_model(model_path, manifest_path, test_path)?;
    step_done(&format!("{} rows in {:?}", report.n_samples(), start.elapsed()));

    println!();
    for line in report.to_string().lines() {
        println!("  {}", line);
    }
    println!();
    Ok(())
}

pub fn cmd_analyze(
    config: PipelineConfig,
    train_path: &Path,
    test_path: Option<PathBuf>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Analyze");

    step_run("Loading train split");
    let df = load_train_split(train_path)?;
    step_done(&format!("{} rows × {} cols", df.height(), df.width()));

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.paths.analysis.clone());
    let producer = AnalysisProducer::new(config.target_column.clone());
    let artifact = producer.run(&df, DatasetPaths::new(train_path, test_path), &output)?;
    step_ok(&format!("Artifact → {}", output.display()));

    println!();
    line_box_top();
    line_box_center(&format!("{}", "Dataset Analysis".white().bold()));
    line_box_sep();
    line_box(&kv("Samples  ", &artifact.num_samples.to_string()));
    line_box(&kv("Columns  ", &artifact.features.len().to_string()));
    for (label, count) in &artifact.class_distribution {
        line_box(&kv(&format!("Class {:<3}", label), &count.to_string()));
    }
    line_box(&kv("Imbalance", &artifact.imbalance_ratio().map_or("n/a".to_string(), |r| format!("{:.2}", r))));
    line_box_empty();
    line_box_bottom();
    println!();
    Ok(())
}

pub fn cmd_run(config: PipelineConfig, request: &str, dataset: Option<PathBuf>) -> anyhow::Result<()> {
    let mut ctx = PipelineContext::new(config);
    if let Some(dataset) = dataset {
        ctx = ctx.with_dataset(dataset);
    }

    let delegation = DispatchTable::new().dispatch(&ctx, request)?;
    println!("{}", serde_json::to_string_pretty(&delegation)?);
    Ok(())
}

pub fn cmd_info(data_path: &Path) -> anyhow::Result<()> {
    section("Data Info");

    let df = load_train_split(data_path)?;

    println!("  {:<12} {}", muted("Path"), data_path.display());
    println!("  {:<12} {}", muted("Rows"), df.height());
    println!("  {:<12} {}", muted("Columns"), df.width());
    println!("  {:<12} {:.2} MB", muted("Memory"), df.estimated_size() as f64 / 1024.0 / 1024.0);
    println!();

    println!("  {:<24} {:<12} {:>6}", muted("Column"), muted("Kind"), muted("Nulls"));
    println!("  {}", dim(&"─".repeat(44)));

    for (name, kind, nulls) in describe_table(&df) {
        println!(
            "  {:<24} {:<12} {:>6}",
            name,
            kind.as_str().truecolor(140, 140, 140),
            nulls
        );
    }

    println!();
    Ok(())
}
