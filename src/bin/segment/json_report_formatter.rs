use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use chrono::Utc;
use indexmap::IndexMap;
use segmentation_kit::{ErrorKind, Segment, SegmentationOutcome, SegmenterConfig, Stage};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Meta {
    pub generated_at: String,
    pub data_dir: String,
    pub engine: String,
    pub config: SegmenterConfig,
}

#[derive(Debug, Serialize)]
pub struct FailureRecord {
    pub utterance_id: Option<String>,
    pub stage: Option<Stage>,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub meta: Meta,
    pub utterances: IndexMap<String, Vec<Segment>>,
    pub failures: Vec<FailureRecord>,
}

pub fn build_report(
    data_dir: &Path,
    engine: &str,
    config: &SegmenterConfig,
    outcome: &SegmentationOutcome,
) -> Report {
    Report {
        meta: Meta {
            generated_at: Utc::now().to_rfc3339(),
            data_dir: data_dir.display().to_string(),
            engine: engine.to_string(),
            config: config.clone(),
        },
        utterances: outcome.segments.clone(),
        failures: outcome
            .failures
            .iter()
            .map(|err| FailureRecord {
                utterance_id: err.utterance_id().map(str::to_string),
                stage: err.stage(),
                kind: err.kind(),
                message: err.to_string(),
            })
            .collect(),
    }
}

pub fn write_report(path: &Path, report: &Report) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| {
            format!(
                "Failed to create report output directory '{}': {err}",
                parent.display()
            )
        })?;
    }

    let mut file = File::create(path)
        .map_err(|err| format!("Failed to create report file '{}': {err}", path.display()))?;
    serde_json::to_writer_pretty(&mut file, report).map_err(|err| {
        format!(
            "Failed to serialize report JSON '{}': {err}",
            path.display()
        )
    })?;
    file.write_all(b"\n")
        .map_err(|err| format!("Failed to finalize report file '{}': {err}", path.display()))?;
    Ok(())
}
