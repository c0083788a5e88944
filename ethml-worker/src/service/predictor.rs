//! Predictor
//!
//! Runs a model against a data point. The production implementation spawns
//! the model script as a child process and reads its JSON answer from stdout.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use ethml_core::domain::settlement::Prediction;
use ethml_core::domain::task::ModelId;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

/// Produces a prediction for a model and data point
#[async_trait]
pub trait Predictor: Send + Sync {
    async fn predict(&self, model_id: ModelId, data_point: &str) -> Result<Prediction>;
}

/// Runs `{python} {models_dir}/model_{id}.py {data_point}`
pub struct ProcessPredictor {
    python_bin: String,
    models_dir: PathBuf,
}

/// First JSON line a model script prints
#[derive(Debug, Deserialize)]
struct ModelOutput {
    prediction: f64,
    confidence: f64,
}

impl ProcessPredictor {
    pub fn new(python_bin: impl Into<String>, models_dir: impl Into<PathBuf>) -> Self {
        Self {
            python_bin: python_bin.into(),
            models_dir: models_dir.into(),
        }
    }

    /// Path of the script serving a model
    pub fn model_path(&self, model_id: ModelId) -> PathBuf {
        self.models_dir.join(format!("model_{}.py", model_id))
    }

    fn command(&self, script: &Path, data_point: &str) -> Command {
        let mut command = Command::new(&self.python_bin);
        command
            .arg(script)
            .arg(data_point)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl Predictor for ProcessPredictor {
    async fn predict(&self, model_id: ModelId, data_point: &str) -> Result<Prediction> {
        let script = self.model_path(model_id);
        if !script.is_file() {
            bail!("Model script not found: {}", script.display());
        }

        debug!("Running {} {} {}", self.python_bin, script.display(), data_point);

        let output = self
            .command(&script, data_point)
            .output()
            .await
            .with_context(|| format!("Failed to start {}", self.python_bin))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "model_{}.py exited with {}: {}",
                model_id,
                output.status,
                stderr.trim()
            );
        }

        parse_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parses the first non-empty stdout line as `{prediction, confidence}`
///
/// Predictions are integers on the ledger, so a fractional value is rounded.
fn parse_output(stdout: &str) -> Result<Prediction> {
    let line = stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .context("Model produced no output")?;

    let output: ModelOutput =
        serde_json::from_str(line).with_context(|| format!("Invalid model output: {}", line))?;

    if !output.prediction.is_finite() {
        bail!("Model returned a non-finite prediction");
    }

    Ok(Prediction {
        prediction: output.prediction.round() as i64,
        confidence: output.confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_first_line() {
        let prediction =
            parse_output("\n{\"prediction\": 358, \"confidence\": 0.9}\n{\"prediction\": 1}\n")
                .unwrap();
        assert_eq!(prediction.prediction, 358);
        assert_eq!(prediction.confidence, 0.9);
    }

    #[test]
    fn test_parse_rounds_fractional_prediction() {
        let prediction = parse_output(r#"{"prediction": 41.6, "confidence": 0.5}"#).unwrap();
        assert_eq!(prediction.prediction, 42);
    }

    #[test]
    fn test_parse_rejects_bad_output() {
        assert!(parse_output("").is_err());
        assert!(parse_output("Traceback (most recent call last):").is_err());
        assert!(parse_output(r#"{"confidence": 0.5}"#).is_err());
    }

    #[test]
    fn test_model_path() {
        let predictor = ProcessPredictor::new("python3", "/opt/models");
        assert_eq!(
            predictor.model_path(7),
            PathBuf::from("/opt/models/model_7.py")
        );
    }

    #[tokio::test]
    async fn test_missing_script_fails() {
        let predictor = ProcessPredictor::new("python3", "/nonexistent-models-dir");
        let err = predictor.predict(1, "QmPoint").await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
