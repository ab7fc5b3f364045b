use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{EngineConfig, SegmenterConfig};
use crate::engine::julius::JuliusEngine;
use crate::error::SegmentationError;
use crate::lexicon::kana::KanaTranscriber;
use crate::lexicon::{Lexicon, PronunciationSource};
use crate::pipeline::defaults::JuliusTraceParser;
use crate::pipeline::runtime::{Segmenter, SegmenterParts};
use crate::pipeline::traits::{DecodingEngine, TraceParser};

pub struct SegmenterBuilder {
    config: SegmenterConfig,
    engine_config: EngineConfig,
    lexicon: Option<Arc<Lexicon>>,
    lexicon_path: Option<PathBuf>,
    pronunciation_fallback: Option<Box<dyn PronunciationSource>>,
    engine: Option<Box<dyn DecodingEngine>>,
    trace_parser: Option<Box<dyn TraceParser>>,
}

impl SegmenterBuilder {
    pub fn new(config: SegmenterConfig) -> Self {
        Self {
            config,
            engine_config: EngineConfig::default(),
            lexicon: None,
            lexicon_path: None,
            pronunciation_fallback: None,
            engine: None,
            trace_parser: None,
        }
    }

    pub fn with_engine_config(mut self, engine_config: EngineConfig) -> Self {
        self.engine_config = engine_config;
        self
    }

    pub fn with_lexicon(mut self, lexicon: Arc<Lexicon>) -> Self {
        self.lexicon = Some(lexicon);
        self
    }

    /// Loads the lexicon at build time. Ignored when a lexicon is given directly.
    pub fn with_lexicon_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.lexicon_path = Some(path.into());
        self
    }

    pub fn with_pronunciation_fallback(mut self, fallback: Box<dyn PronunciationSource>) -> Self {
        self.pronunciation_fallback = Some(fallback);
        self
    }

    pub fn with_engine(mut self, engine: Box<dyn DecodingEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn with_trace_parser(mut self, trace_parser: Box<dyn TraceParser>) -> Self {
        self.trace_parser = Some(trace_parser);
        self
    }

    pub fn build(self) -> Result<Segmenter, SegmentationError> {
        self.config.validate()?;

        let lexicon = match (self.lexicon, self.lexicon_path) {
            (Some(lexicon), _) => lexicon,
            (None, Some(path)) => Arc::new(Lexicon::from_path(Path::new(&path))?),
            (None, None) => Arc::new(Lexicon::new()),
        };

        let fallback = match self.pronunciation_fallback {
            Some(fallback) => Some(fallback),
            None if self.config.kana_fallback => {
                Some(Box::new(KanaTranscriber) as Box<dyn PronunciationSource>)
            }
            None => None,
        };
        if lexicon.is_empty() && fallback.is_none() {
            return Err(SegmentationError::configuration(
                "no pronunciation source: provide a lexicon or enable kana_fallback",
            ));
        }

        let engine = match self.engine {
            Some(engine) => engine,
            None => {
                self.engine_config.validate(&self.config)?;
                Box::new(JuliusEngine::new(self.engine_config, &self.config))
            }
        };

        tracing::debug!(
            engine = engine.label(),
            lexicon_words = lexicon.len(),
            fallback = fallback.is_some(),
            triphone = self.config.triphone,
            max_concurrent_engines = self.config.max_concurrent_engines,
            "segmenter built"
        );

        Ok(Segmenter::from_parts(SegmenterParts {
            config: self.config,
            lexicon,
            pronunciation_fallback: fallback,
            engine,
            trace_parser: self
                .trace_parser
                .unwrap_or_else(|| Box::new(JuliusTraceParser)),
        }))
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::{CancellationFlag, EngineRequest, EngineTrace};
    use crate::error::ErrorKind;

    use super::*;

    struct MockEngine;

    impl DecodingEngine for MockEngine {
        fn run(
            &self,
            _request: &EngineRequest,
            _cancel: &CancellationFlag,
        ) -> Result<EngineTrace, SegmentationError> {
            Ok(EngineTrace::default())
        }

        fn label(&self) -> &str {
            "mock"
        }
    }

    fn lexicon() -> Arc<Lexicon> {
        Arc::new(Lexicon::from_entries([("a", vec!["a"])]).unwrap())
    }

    #[test]
    fn build_with_lexicon_and_mock_engine() {
        let segmenter = SegmenterBuilder::new(SegmenterConfig::default())
            .with_lexicon(lexicon())
            .with_engine(Box::new(MockEngine))
            .build()
            .expect("build should succeed");
        assert_eq!(segmenter.engine_label(), "mock");
    }

    #[test]
    fn build_rejects_invalid_config() {
        let config = SegmenterConfig {
            max_concurrent_engines: 0,
            ..SegmenterConfig::default()
        };
        let err = SegmenterBuilder::new(config)
            .with_lexicon(lexicon())
            .with_engine(Box::new(MockEngine))
            .build()
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn build_requires_a_pronunciation_source() {
        let err = SegmenterBuilder::new(SegmenterConfig::default())
            .with_engine(Box::new(MockEngine))
            .build()
            .err()
            .unwrap();
        assert!(err.to_string().contains("no pronunciation source"));

        let config = SegmenterConfig {
            kana_fallback: true,
            ..SegmenterConfig::default()
        };
        assert!(SegmenterBuilder::new(config)
            .with_engine(Box::new(MockEngine))
            .build()
            .is_ok());
    }

    #[test]
    fn build_fails_on_missing_lexicon_file() {
        let err = SegmenterBuilder::new(SegmenterConfig::default())
            .with_lexicon_path("/nonexistent/lexicon.txt")
            .with_engine(Box::new(MockEngine))
            .build()
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn triphone_julius_requires_hlist() {
        let config = SegmenterConfig {
            triphone: true,
            ..SegmenterConfig::default()
        };
        let mut engine_config = EngineConfig::default();
        engine_config.triphone_hlist = None;
        let err = SegmenterBuilder::new(config)
            .with_lexicon(lexicon())
            .with_engine_config(engine_config)
            .build()
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
