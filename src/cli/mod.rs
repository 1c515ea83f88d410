//! Command-line interface
//!
//! `serve` runs the HTTP API; `train`, `predict` and `kinds` work offline
//! against a local model directory.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::object_storage::Dataset;
use crate::registry::{ModelRegistry, TrainRequest};
use crate::store::LocalModelStore;
use crate::training::{Hyperparameters, ModelKind};

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

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "model-serve")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train and serve regression models over HTTP")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API (default)
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "API_PORT", default_value = "8000")]
        port: u16,

        /// Host to bind to
        #[arg(long, env = "API_HOST", default_value = "0.0.0.0")]
        host: String,

        /// Directory for model artifacts
        #[arg(long, env = "MODELS_DIR", default_value = "./models")]
        models_dir: String,
    },

    /// Train a model from a CSV file and save it
    Train {
        /// Input CSV file with a header row
        #[arg(short, long)]
        data: PathBuf,

        /// Label column name
        #[arg(short, long)]
        target: String,

        /// Model kind (LinReg, Catboost)
        #[arg(short, long, default_value = "LinReg")]
        kind: String,

        /// Artifact name (defaults to the kind name)
        #[arg(short, long)]
        name: Option<String>,

        /// Hyperparameters as a JSON object
        #[arg(long)]
        params: Option<String>,

        /// Directory for model artifacts
        #[arg(long, env = "MODELS_DIR", default_value = "./models")]
        models_dir: PathBuf,
    },

    /// Predict with a saved model
    Predict {
        /// Artifact name
        #[arg(short, long)]
        name: String,

        /// Input CSV file with a header row
        #[arg(short, long)]
        data: PathBuf,

        /// Column to drop before predicting, e.g. the label column
        #[arg(long)]
        drop: Option<String>,

        /// Directory for model artifacts
        #[arg(long, env = "MODELS_DIR", default_value = "./models")]
        models_dir: PathBuf,

        /// Output predictions CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List supported model kinds
    Kinds,
}

// ─── Data loading ──────────────────────────────────────────────────────────────

pub fn load_data(path: &Path) -> anyhow::Result<DataFrame> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if ext != "csv" {
        anyhow::bail!("Unsupported file format: {} (expected .csv)", ext);
    }

    let df = CsvReadOptions::default()
        .with_infer_schema_length(Some(1000))
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(df)
}

/// Split a frame into feature rows and the `target` column
pub fn split_target(df: &DataFrame, target: &str) -> anyhow::Result<(Vec<Vec<f64>>, Vec<f64>)> {
    let labels = Dataset::from_dataframe(&df.select([target])?)?
        .rows
        .into_iter()
        .flatten()
        .collect();
    let features = Dataset::from_dataframe(&df.drop(target)?)?.rows;
    Ok((features, labels))
}

fn parse_params(raw: Option<&str>) -> anyhow::Result<Option<Hyperparameters>> {
    raw.map(|s| -> anyhow::Result<Hyperparameters> {
        match serde_json::from_str::<serde_json::Value>(s)? {
            serde_json::Value::Object(map) => Ok(map),
            _ => anyhow::bail!("--params must be a JSON object"),
        }
    })
    .transpose()
}

fn local_registry(models_dir: &Path) -> anyhow::Result<ModelRegistry> {
    let store = LocalModelStore::new(models_dir)?;
    Ok(ModelRegistry::new(Arc::new(store)))
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub async fn cmd_train(
    data_path: &Path,
    target: &str,
    kind: &str,
    name: Option<String>,
    params: Option<&str>,
    models_dir: &Path,
) -> anyhow::Result<()> {
    section("Train");

    step_run("Loading data");
    let start = Instant::now();
    let df = load_data(data_path)?;
    step_done(&format!("{} rows × {} cols in {:?}", df.height(), df.width(), start.elapsed()));

    let (features, labels) = split_target(&df, target)?;
    let mut request = TrainRequest::new(kind, features, labels);
    if let Some(params) = parse_params(params)? {
        request = request.with_params(params);
    }
    if let Some(name) = name {
        request = request.with_name(name);
    }

    step_run(&format!("Training {}", kind.cyan()));
    let registry = local_registry(models_dir)?;
    let outcome = registry.train(request).await?;
    step_done(&format!("{:.3}s", outcome.metrics.training_time_secs));

    println!();
    println!("  {:<16} {}", muted("Saved as"), outcome.name.white().bold());
    println!("  {:<16} {}", muted("R²"), format!("{:.4}", outcome.metrics.r2).white().bold());
    println!("  {:<16} {}", muted("RMSE"), format!("{:.4}", outcome.metrics.rmse).white());
    println!("  {:<16} {}", muted("MAE"), format!("{:.4}", outcome.metrics.mae).white());
    println!("  {:<16} {}", muted("Store"), registry.store().scope().white());
    println!();

    Ok(())
}

pub async fn cmd_predict(
    name: &str,
    data_path: &Path,
    drop: Option<&str>,
    models_dir: &Path,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Predict");

    step_run("Loading data");
    let mut df = load_data(data_path)?;
    if let Some(column) = drop {
        df = df.drop(column)?;
    }
    step_done(&format!("{} rows × {} cols", df.height(), df.width()));

    let features = Dataset::from_dataframe(&df)?.rows;
    let registry = local_registry(models_dir)?;

    step_run(&format!("Predicting with {}", name.cyan()));
    let start = Instant::now();
    let predictions = registry.predict(name, &features).await?;
    step_done(&format!("{:?}", start.elapsed()));

    match output {
        Some(path) => {
            let dataset = Dataset::new(
                vec!["prediction".to_string()],
                predictions.into_iter().map(|p| vec![p]).collect(),
            );
            std::fs::write(path, dataset.to_csv()?)?;
            println!("  {} {}", ok("✓"), format!("Predictions written to {}", path.display()));
        }
        None => {
            println!();
            for (i, p) in predictions.iter().enumerate() {
                println!("  {:>6}  {}", dim(&i.to_string()), format!("{:.6}", p).white());
            }
        }
    }

    println!();
    Ok(())
}

pub fn cmd_kinds() {
    section("Model kinds");
    for kind in ModelKind::ALL {
        println!("  {} {}", accent("›"), kind.as_str().white());
    }
    println!();
}

// ─── Serve ─────────────────────────────────────────────────────────────────────

pub async fn cmd_serve(host: &str, port: u16, models_dir: &str) -> anyhow::Result<()> {
    use crate::server::{run_server, ServerConfig};

    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", "Model Serve".white().bold()));
    line_box_center(&format!("{}", dim(&format!("v{}", env!("CARGO_PKG_VERSION")))));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("API    ", &format!("http://{}:{}", host, port)));
    line_box(&kv("Health ", &format!("http://{}:{}/health", host, port)));
    line_box(&kv("Models ", models_dir));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box_center(&format!("{}", dim("ctrl+c to stop")));
    line_box_empty();
    line_box_bottom();
    println!();

    let config = ServerConfig {
        host: host.to_string(),
        port,
        models_dir: models_dir.to_string(),
        ..Default::default()
    };

    run_server(config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[1mbold\x1b[0m"), "bold");
    }

    #[test]
    fn test_parse_params() {
        assert!(parse_params(None).unwrap().is_none());
        let params = parse_params(Some(r#"{"alpha": 0.5}"#)).unwrap().unwrap();
        assert_eq!(params["alpha"], 0.5);
        assert!(parse_params(Some("[1, 2]")).is_err());
    }

    #[test]
    fn test_split_target() {
        let df = df!(
            "x1" => [1.0, 2.0, 3.0],
            "x2" => [2.0, 3.0, 4.0],
            "y" => [1.0, 2.0, 3.0]
        )
        .unwrap();
        let (features, labels) = split_target(&df, "y").unwrap();
        assert_eq!(features, vec![vec![1.0, 2.0], vec![2.0, 3.0], vec![3.0, 4.0]]);
        assert_eq!(labels, vec![1.0, 2.0, 3.0]);
    }

    #[tokio::test]
    async fn test_train_then_predict_from_csv() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("train.csv");
        std::fs::write(&data, "x1,x2,y\n1,2,1\n2,3,2\n3,4,3\n").unwrap();
        let models = dir.path().join("models");

        cmd_train(&data, "y", "LinReg", Some("cli-model".into()), None, &models)
            .await
            .unwrap();
        assert!(models.join("cli-model.bin").exists());

        let out = dir.path().join("preds.csv");
        cmd_predict("cli-model", &data, Some("y"), &models, Some(out.as_path()))
            .await
            .unwrap();
        let written = Dataset::from_csv(&std::fs::read(&out).unwrap()).unwrap();
        assert_eq!(written.n_rows(), 3);
    }
}
