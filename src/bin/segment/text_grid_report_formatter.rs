use std::path::{Path, PathBuf};

use segmentation_kit::Segment;
use textgrid::{Interval, TextGrid, Tier, TierType};

pub fn write_textgrid(waveform: &Path, segments: &[Segment]) -> Result<PathBuf, String> {
    let out_path = waveform.with_extension("TextGrid");
    let xmin = segments.first().map_or(0.0, |segment| segment.begin_s);
    let xmax = segments
        .last()
        .map_or(0.0, |segment| segment.end_s)
        .max(xmin + 0.001);

    let mut textgrid = TextGrid::new(xmin, xmax).map_err(|err| {
        format!(
            "Failed to build TextGrid structure '{}': {err}",
            out_path.display()
        )
    })?;

    let intervals = segments
        .iter()
        .map(|segment| Interval {
            xmin: segment.begin_s,
            xmax: segment.end_s,
            text: if segment.is_silence {
                String::new()
            } else {
                segment.label.clone()
            },
        })
        .collect();
    let units_tier = Tier {
        name: "units".to_string(),
        tier_type: TierType::IntervalTier,
        xmin,
        xmax,
        intervals,
        points: Vec::new(),
    };
    textgrid.add_tier(units_tier).map_err(|err| {
        format!(
            "Failed to add units tier for '{}': {err}",
            out_path.display()
        )
    })?;

    textgrid
        .to_file(&out_path, false)
        .map_err(|err| format!("Failed to write TextGrid '{}': {err}", out_path.display()))?;
    Ok(out_path)
}
