pub mod alignment;
pub mod config;
pub mod corpus;
pub mod engine;
pub mod error;
pub mod features;
pub mod lexicon;
pub mod logging;
pub mod pipeline;
pub mod types;

use std::path::Path;
use std::sync::Arc;

pub use config::{
    EngineConfig, FailurePolicy, FrameTiming, SegmenterConfig, TriphoneContext, UnitGranularity,
};
pub use error::{ErrorKind, SegmentationError, Stage};
pub use lexicon::{Lexicon, Pronunciation, PronunciationSource};
pub use pipeline::builder::SegmenterBuilder;
pub use pipeline::runtime::Segmenter;
pub use pipeline::traits::{DecodingEngine, TraceParser};
pub use types::{InputSource, Segment, SegmentationOutcome, SegmentationResult, Utterance};

/// Segments `data_dir` with Julius using the given lexicon and models.
pub fn segment(
    data_dir: &Path,
    config: SegmenterConfig,
    engine_config: EngineConfig,
    lexicon: Arc<Lexicon>,
) -> Result<SegmentationOutcome, SegmentationError> {
    SegmenterBuilder::new(config)
        .with_engine_config(engine_config)
        .with_lexicon(lexicon)
        .build()?
        .segment(data_dir)
}
