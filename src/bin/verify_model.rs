/// Inspect the deployed model bundle and spot-check it against labelled data
///
/// Usage: verify_model [--export] [--sample <csv>] [--rows <n>]

use std::path::{Path, PathBuf};
use anyhow::{bail, Context, Result};
use colored::Colorize;

use meme_signal::config::Config;
use meme_signal::features::{FeatureColumns, FeatureMatrix};
use meme_signal::model::{ModelBundle, ModelMetadata};
use meme_signal::prediction::Predictor;

const DEFAULT_SAMPLE_ROWS: usize = 10;
const LABEL_COLUMN: &str = "label";

#[derive(Debug, Default)]
struct Args {
    export: bool,
    sample: Option<PathBuf>,
    rows: Option<usize>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args::default();
    let mut iter = std::env::args().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--export" => args.export = true,
            "--sample" => {
                let path = iter.next().context("--sample needs a CSV path")?;
                args.sample = Some(PathBuf::from(path));
            }
            "--rows" => {
                let n = iter.next().context("--rows needs a number")?;
                args.rows = Some(n.parse().with_context(|| format!("invalid row count: {}", n))?);
            }
            other => bail!("unknown argument: {}", other),
        }
    }

    Ok(args)
}

fn section(title: &str) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", title.bright_green().bold());
    println!("{}", "=".repeat(60).bright_blue());
}

fn percent(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}%", v * 100.0))
        .unwrap_or_else(|| "n/a".to_string())
}

fn score(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.4}", v))
        .unwrap_or_else(|| "n/a".to_string())
}

/// Accuracies as percentages, F1 as a raw score.
fn metric_lines(metadata: &ModelMetadata) -> Vec<String> {
    let mut lines = vec![
        format!("Train accuracy:  {}", percent(metadata.train_accuracy)),
        format!("Test accuracy:   {}", percent(metadata.test_accuracy)),
        format!("Train F1:        {}", score(metadata.train_f1)),
        format!("Test F1:         {}", score(metadata.test_f1)),
    ];
    if let (Some(mean), Some(std)) = (metadata.cv_mean_accuracy, metadata.cv_std_accuracy) {
        lines.push(format!(
            "CV accuracy:     {:.2}% (+/- {:.2}%)",
            mean * 100.0,
            std * 100.0
        ));
    }
    if let (Some(train), Some(test)) = (metadata.train_samples, metadata.test_samples) {
        lines.push(format!("Samples:         {} train / {} test", train, test));
    }
    lines
}

fn print_model_info(bundle: &ModelBundle) {
    let booster = bundle.booster();
    let metadata = bundle.metadata();

    section("📦 MODEL INFORMATION");
    println!("   Objective:       {}", booster.objective().name());
    println!("   XGBoost version: {}", booster.version().unwrap_or("unknown"));
    println!("   Classes:         {:?}", bundle.label_encoder().classes());
    println!("   Features:        {}", bundle.feature_columns().len());
    println!("   Trees:           {} ({} used)", booster.num_trees(), booster.trees_used());
    match booster.best_iteration() {
        Some(best) => println!("   Best iteration:  {}", best),
        None => println!("   Best iteration:  all rounds"),
    }
    if let Some(date) = &metadata.training_date {
        println!("   Trained:         {}", date);
    }

    section("📊 PERFORMANCE METRICS");
    for line in metric_lines(metadata) {
        println!("   {}", line);
    }

    if !metadata.feature_importance_top20.is_empty() {
        section("🏆 TOP FEATURES");
        for (i, fi) in metadata.feature_importance_top20.iter().take(10).enumerate() {
            println!("   {:>2}. {:<40} {:.4}", i + 1, fi.feature, fi.importance);
        }
    }
}

fn export_artifacts(config: &Config, bundle: &ModelBundle) -> Result<()> {
    section("💾 EXPORTING ARTIFACTS");

    let columns_path = config.model.feature_columns_path();
    bundle.feature_columns().save(&columns_path)?;
    println!("   {} {}", "✓".green(), columns_path.display());

    let encoder_path = config.model.label_encoder_path();
    bundle.label_encoder().save(&encoder_path)?;
    println!("   {} {}", "✓".green(), encoder_path.display());

    Ok(())
}

/// Read up to `limit` rows, mapping CSV headers onto the model's columns.
/// Missing columns and unparseable cells become NaN.
fn read_sample(
    path: &Path,
    columns: &FeatureColumns,
    limit: usize,
) -> Result<(FeatureMatrix, Vec<String>)> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let headers = reader.headers()?.clone();

    let label_index = headers
        .iter()
        .position(|h| h == LABEL_COLUMN)
        .with_context(|| format!("{} has no '{}' column", path.display(), LABEL_COLUMN))?;

    let positions: Vec<Option<usize>> = columns
        .names()
        .iter()
        .map(|name| headers.iter().position(|h| h == name))
        .collect();

    let missing = positions.iter().filter(|p| p.is_none()).count();
    if missing > 0 {
        println!(
            "   {} {} feature columns absent from the sample, treated as missing",
            "⚠".yellow(),
            missing
        );
    }

    let mut rows = Vec::new();
    let mut labels = Vec::new();
    for record in reader.records().take(limit) {
        let record = record?;
        let row: Vec<f64> = positions
            .iter()
            .map(|pos| {
                pos.and_then(|i| record.get(i))
                    .and_then(|cell| cell.trim().parse::<f64>().ok())
                    .unwrap_or(f64::NAN)
            })
            .collect();
        rows.push(row);
        labels.push(record.get(label_index).unwrap_or_default().to_string());
    }

    let matrix = FeatureMatrix::from_rows(columns, rows)?;
    Ok((matrix, labels))
}

fn check_sample(bundle: ModelBundle, path: &Path, limit: usize) -> Result<()> {
    section("🧪 SAMPLE PREDICTIONS");

    let predictor = Predictor::new(std::sync::Arc::new(bundle));
    let (mut matrix, labels) = read_sample(path, predictor.bundle().feature_columns(), limit)?;
    matrix.sanitize();

    let encoder = predictor.bundle().label_encoder();
    let classifications = predictor.classify(&matrix)?;

    let mut correct = 0;
    for (i, (classification, actual)) in classifications.iter().zip(labels.iter()).enumerate() {
        let predicted = encoder.inverse_transform(classification.class_index)?;
        let confidence = classification.probabilities[classification.class_index] * 100.0;
        let mark = if predicted == actual {
            correct += 1;
            "✓".green()
        } else {
            "✗".red()
        };
        println!(
            "   {} Row {:>3}: actual {:<6} predicted {:<6} ({:.1}%)",
            mark,
            i + 1,
            actual,
            predicted,
            confidence
        );
    }

    let total = classifications.len();
    if total > 0 {
        println!(
            "\n   Sample accuracy: {}/{} ({:.1}%)",
            correct,
            total,
            correct as f64 / total as f64 * 100.0
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .compact()
        .init();

    let args = parse_args()?;
    let config = Config::load()?;

    println!("🔍 Verifying model in {}", config.model.directory.display());
    let bundle = ModelBundle::load(&config.model).context("failed to load model bundle")?;
    println!("{}", "✅ Model bundle loaded".green());

    print_model_info(&bundle);

    if args.export {
        export_artifacts(&config, &bundle)?;
    }

    if let Some(path) = &args.sample {
        check_sample(bundle, path, args.rows.unwrap_or(DEFAULT_SAMPLE_ROWS))?;
    }

    println!("\n{}", "✅ Verification complete".bright_green().bold());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_lines() {
        let metadata = ModelMetadata {
            train_accuracy: Some(0.97),
            test_accuracy: Some(0.9123),
            train_f1: Some(0.9612),
            test_f1: None,
            cv_mean_accuracy: Some(0.9),
            cv_std_accuracy: Some(0.01),
            ..ModelMetadata::default()
        };

        let lines = metric_lines(&metadata);
        assert_eq!(lines[0], "Train accuracy:  97.00%");
        assert_eq!(lines[1], "Test accuracy:   91.23%");
        assert_eq!(lines[2], "Train F1:        0.9612");
        assert_eq!(lines[3], "Test F1:         n/a");
        assert_eq!(lines[4], "CV accuracy:     90.00% (+/- 1.00%)");
        assert_eq!(lines.len(), 5);
    }
}
