use crate::alignment::dictionary::Dictionary;
use crate::alignment::trace::AlignedUnit;
use crate::config::UnitGranularity;
use crate::engine::{CancellationFlag, EngineRequest, EngineTrace};
use crate::error::SegmentationError;

/// Runs one forced-alignment decode and returns its raw trace.
pub trait DecodingEngine: Send + Sync {
    fn run(
        &self,
        request: &EngineRequest,
        cancel: &CancellationFlag,
    ) -> Result<EngineTrace, SegmentationError>;

    fn label(&self) -> &str;
}

/// Turns a raw trace into grammar-ordered units.
pub trait TraceParser: Send + Sync {
    fn parse(
        &self,
        trace: &str,
        dictionary: &Dictionary,
        granularity: UnitGranularity,
    ) -> Result<Vec<AlignedUnit>, SegmentationError>;
}
