use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use segmentation_kit::Segment;

/// `begin end label` per line, seconds with seven decimals.
pub fn render_lab(segments: &[Segment]) -> String {
    let mut out = String::new();
    for segment in segments {
        let _ = writeln!(
            out,
            "{:.7} {:.7} {}",
            segment.begin_s, segment.end_s, segment.label
        );
    }
    out
}

pub fn write_lab(waveform: &Path, segments: &[Segment]) -> Result<PathBuf, String> {
    let out_path = waveform.with_extension("lab");
    fs::write(&out_path, render_lab(segments))
        .map_err(|err| format!("Failed to write result '{}': {err}", out_path.display()))?;
    Ok(out_path)
}
