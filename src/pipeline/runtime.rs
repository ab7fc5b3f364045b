use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crate::alignment::assemble::SegmentationAssembler;
use crate::alignment::dictionary::{Dictionary, DictionaryBuilder};
use crate::alignment::grammar::Grammar;
use crate::config::{FailurePolicy, FrameTiming, SegmenterConfig};
use crate::corpus::{self, CorpusEntry};
use crate::engine::{CancellationFlag, EngineRequest};
use crate::error::{ErrorKind, SegmentationError, Stage};
use crate::features::HtkHeader;
use crate::lexicon::{Lexicon, PronunciationSource};
use crate::pipeline::artifacts::ArtifactScope;
use crate::pipeline::traits::{DecodingEngine, TraceParser};
use crate::types::{InputSource, Segment, SegmentationOutcome, Utterance};

pub struct Segmenter {
    config: SegmenterConfig,
    lexicon: Arc<Lexicon>,
    pronunciation_fallback: Option<Box<dyn PronunciationSource>>,
    engine: Box<dyn DecodingEngine>,
    trace_parser: Box<dyn TraceParser>,
}

pub(crate) struct SegmenterParts {
    pub config: SegmenterConfig,
    pub lexicon: Arc<Lexicon>,
    pub pronunciation_fallback: Option<Box<dyn PronunciationSource>>,
    pub engine: Box<dyn DecodingEngine>,
    pub trace_parser: Box<dyn TraceParser>,
}

type UtteranceResult = Result<Vec<Segment>, SegmentationError>;

impl Segmenter {
    pub(crate) fn from_parts(parts: SegmenterParts) -> Self {
        Self {
            config: parts.config,
            lexicon: parts.lexicon,
            pronunciation_fallback: parts.pronunciation_fallback,
            engine: parts.engine,
            trace_parser: parts.trace_parser,
        }
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    pub fn lexicon(&self) -> &Arc<Lexicon> {
        &self.lexicon
    }

    pub fn engine_label(&self) -> &str {
        self.engine.label()
    }

    /// Segments every utterance under `data_dir`.
    ///
    /// Under [`FailurePolicy::AbortOnFirst`] the first failure (in corpus
    /// order) is returned and in-flight engine runs are cancelled. Under
    /// [`FailurePolicy::Continue`] failed utterances are left out of the
    /// result and reported in [`SegmentationOutcome::failures`].
    pub fn segment(&self, data_dir: &Path) -> Result<SegmentationOutcome, SegmentationError> {
        let entries = corpus::discover(data_dir)?;
        self.segment_entries(&entries, |_, _| {})
    }

    /// Like [`Segmenter::segment`] over already discovered entries.
    /// `on_complete` runs on the calling thread as each utterance finishes.
    pub fn segment_entries<F>(
        &self,
        entries: &[CorpusEntry],
        mut on_complete: F,
    ) -> Result<SegmentationOutcome, SegmentationError>
    where
        F: FnMut(&CorpusEntry, &UtteranceResult),
    {
        let input_mfcc = self.config.input_mfcc;
        self.run_corpus(entries, |entry, cancel| {
            let utterance = entry.load(input_mfcc)?;
            self.segment_utterance_with(&utterance, cancel)
        }, |index, result| on_complete(&entries[index], result))
        .and_then(|results| self.collect_outcome(entries.iter().map(|e| e.id.as_str()), results))
    }

    /// Segments already loaded utterances, in the given order.
    pub fn segment_utterances(
        &self,
        utterances: &[Utterance],
    ) -> Result<SegmentationOutcome, SegmentationError> {
        self.run_corpus(
            utterances,
            |utterance, cancel| self.segment_utterance_with(utterance, cancel),
            |_, _| {},
        )
        .and_then(|results| self.collect_outcome(utterances.iter().map(|u| u.id.as_str()), results))
    }

    pub fn segment_utterance(&self, utterance: &Utterance) -> UtteranceResult {
        self.segment_utterance_with(utterance, &CancellationFlag::default())
    }

    /// Replays a captured engine trace for `words` without running the engine.
    pub fn segments_from_trace(&self, words: &[String], trace: &str) -> UtteranceResult {
        let (dictionary, _) = self.build_artifacts(words)?;
        let units = self
            .trace_parser
            .parse(trace, &dictionary, self.config.granularity)?;
        self.assembler(self.config.frame_timing).assemble(&units)
    }

    /// Dictionary and grammar for one transcript.
    pub fn build_artifacts(
        &self,
        words: &[String],
    ) -> Result<(Dictionary, Grammar), SegmentationError> {
        let dictionary = self.build_dictionary(words)?;
        let grammar = Grammar::compile(&dictionary)?;
        Ok((dictionary, grammar))
    }

    fn build_dictionary(&self, words: &[String]) -> Result<Dictionary, SegmentationError> {
        let triphone = self.config.triphone.then_some(self.config.triphone_context);
        DictionaryBuilder::new(&self.lexicon)
            .with_fallback(self.pronunciation_fallback.as_deref())
            .with_silence_at_ends(!self.config.disable_silence_at_ends)
            .with_triphone(triphone)
            .build(words)
    }

    fn assembler(&self, timing: FrameTiming) -> SegmentationAssembler {
        SegmentationAssembler::new(timing, self.config.disable_silence_at_ends)
    }

    fn segment_utterance_with(
        &self,
        utterance: &Utterance,
        cancel: &CancellationFlag,
    ) -> UtteranceResult {
        let id = utterance.id.as_str();
        let started_at = Instant::now();

        if utterance.words.is_empty() {
            return Err(SegmentationError::dictionary("transcript has no words")
                .in_utterance(id, Stage::Transcript));
        }

        let dictionary = self
            .build_dictionary(&utterance.words)
            .map_err(|e| e.in_utterance(id, Stage::Dictionary))?;
        let grammar =
            Grammar::compile(&dictionary).map_err(|e| e.in_utterance(id, Stage::Grammar))?;

        let (timing, header) = self
            .frame_timing_for(&utterance.input)
            .map_err(|e| e.in_utterance(id, Stage::Input))?;

        let scope = if self.config.leave_dict {
            ArtifactScope::retained(&utterance.directory, id)
        } else {
            ArtifactScope::temporary(id).map_err(|e| e.in_utterance(id, Stage::Engine))?
        };
        let dictionary_path = scope
            .write_dictionary(&dictionary.render())
            .map_err(|e| e.in_utterance(id, Stage::Dictionary))?;
        let grammar_path = scope
            .write_grammar(&grammar.render_dfa())
            .map_err(|e| e.in_utterance(id, Stage::Grammar))?;

        let request = EngineRequest {
            utterance_id: id.to_string(),
            dictionary_path,
            grammar_path,
            input: utterance.input.clone(),
        };
        let trace = match self.engine.run(&request, cancel) {
            Ok(trace) => trace,
            Err(err) => {
                if scope.is_retained() {
                    if let Err(log_err) = scope.write_log(&format!("{err}\n")) {
                        tracing::warn!(utterance = id, error = %log_err, "engine log not written");
                    }
                }
                return Err(err.in_utterance(id, Stage::Engine));
            }
        };
        if scope.is_retained() {
            let mut log = trace.stdout.clone();
            if !trace.stderr.is_empty() {
                log.push_str(&trace.stderr);
            }
            scope
                .write_log(&log)
                .map_err(|e| e.in_utterance(id, Stage::Engine))?;
        }

        let units = self
            .trace_parser
            .parse(&trace.stdout, &dictionary, self.config.granularity)
            .map_err(|e| e.in_utterance(id, Stage::Parse))?;
        let segments = self
            .assembler(timing)
            .assemble(&units)
            .map_err(|e| e.in_utterance(id, Stage::Assemble))?;

        if let (Some(header), Some(last)) = (header, units.last()) {
            let aligned_frames = u64::from(last.end_frame) + 1;
            if aligned_frames != u64::from(header.n_samples) {
                tracing::warn!(
                    utterance = id,
                    aligned_frames,
                    feature_frames = header.n_samples,
                    "alignment does not span the feature file"
                );
            }
        }

        tracing::info!(
            utterance = id,
            segments = segments.len(),
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "utterance segmented"
        );
        Ok(segments)
    }

    fn frame_timing_for(
        &self,
        input: &InputSource,
    ) -> Result<(FrameTiming, Option<HtkHeader>), SegmentationError> {
        match input {
            InputSource::Waveform(_) => Ok((self.config.frame_timing, None)),
            InputSource::Features(path) => {
                let header = HtkHeader::read(path)?;
                let timing = self
                    .config
                    .frame_timing
                    .with_frame_shift_ms(header.frame_shift_ms());
                Ok((timing, Some(header)))
            }
        }
    }

    /// Runs `work` over `items` on up to `max_concurrent_engines` scoped
    /// workers. Results come back in item order; items never started
    /// because of an abort are `None`.
    fn run_corpus<T, W, C>(
        &self,
        items: &[T],
        work: W,
        mut on_complete: C,
    ) -> Result<Vec<Option<UtteranceResult>>, SegmentationError>
    where
        T: Sync,
        W: Fn(&T, &CancellationFlag) -> UtteranceResult + Sync,
        C: FnMut(usize, &UtteranceResult),
    {
        let cancel = CancellationFlag::default();
        let abort_on_failure = self.config.failure_policy == FailurePolicy::AbortOnFirst;
        let workers = self.config.max_concurrent_engines.clamp(1, items.len().max(1));
        let next = AtomicUsize::new(0);
        let mut results: Vec<Option<UtteranceResult>> = items.iter().map(|_| None).collect();

        tracing::info!(
            utterances = items.len(),
            workers,
            engine = self.engine.label(),
            "segmentation started"
        );

        thread::scope(|scope| {
            let (tx, rx) = mpsc::channel::<(usize, UtteranceResult)>();
            for _ in 0..workers {
                let tx = tx.clone();
                let (next, cancel, work) = (&next, &cancel, &work);
                scope.spawn(move || loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let index = next.fetch_add(1, Ordering::SeqCst);
                    let Some(item) = items.get(index) else {
                        break;
                    };
                    let result = work(item, cancel);
                    if result.is_err() && abort_on_failure {
                        cancel.cancel();
                    }
                    if tx.send((index, result)).is_err() {
                        break;
                    }
                });
            }
            drop(tx);

            for (index, result) in rx {
                if let Err(err) = &result {
                    if err.kind() != ErrorKind::Cancelled {
                        tracing::warn!(error = %err, "utterance failed");
                    }
                }
                on_complete(index, &result);
                results[index] = Some(result);
            }
        });

        Ok(results)
    }

    fn collect_outcome<'a>(
        &self,
        ids: impl Iterator<Item = &'a str>,
        results: Vec<Option<UtteranceResult>>,
    ) -> Result<SegmentationOutcome, SegmentationError> {
        let mut outcome = SegmentationOutcome::default();
        for (id, result) in ids.zip(results) {
            match result {
                Some(Ok(segments)) => {
                    outcome.segments.insert(id.to_string(), segments);
                }
                Some(Err(err)) => outcome.failures.push(err),
                None => {}
            }
        }

        if self.config.failure_policy == FailurePolicy::AbortOnFirst && !outcome.failures.is_empty()
        {
            let position = outcome
                .failures
                .iter()
                .position(|err| err.kind() != ErrorKind::Cancelled)
                .unwrap_or(0);
            return Err(outcome.failures.swap_remove(position));
        }

        tracing::info!(
            segmented = outcome.segments.len(),
            failed = outcome.failures.len(),
            "segmentation finished"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use crate::config::TriphoneContext;
    use crate::engine::EngineTrace;
    use crate::pipeline::builder::SegmenterBuilder;

    use super::*;

    /// Replays a fixed alignment for any request, recording what it was asked.
    struct ScriptedEngine {
        rows: Vec<(u32, u32, &'static str)>,
        requests: Mutex<Vec<EngineRequest>>,
    }

    impl ScriptedEngine {
        fn new(rows: Vec<(u32, u32, &'static str)>) -> Self {
            Self {
                rows,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl DecodingEngine for ScriptedEngine {
        fn run(
            &self,
            request: &EngineRequest,
            _cancel: &CancellationFlag,
        ) -> Result<EngineTrace, SegmentationError> {
            assert!(request.dictionary_path.is_file());
            assert!(request.grammar_path.is_file());
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(request.clone());
            }
            let mut stdout = String::from("=== begin forced alignment ===\n");
            for (b, e, label) in &self.rows {
                stdout.push_str(&format!("[{b:4} {e:4}]  -1.000000  {label}\n"));
            }
            stdout.push_str("=== end forced alignment ===\n");
            Ok(EngineTrace {
                stdout,
                ..EngineTrace::default()
            })
        }

        fn label(&self) -> &str {
            "scripted"
        }
    }

    fn hello_world_rows() -> Vec<(u32, u32, &'static str)> {
        vec![
            (0, 4, "silB"),
            (5, 11, "h"),
            (12, 17, "e"),
            (18, 24, "l"),
            (25, 33, "o"),
            (34, 39, "w"),
            (40, 45, "er"),
            (46, 51, "l"),
            (52, 60, "d"),
            (61, 70, "silE"),
        ]
    }

    fn hello_world_triphone_rows() -> Vec<(u32, u32, &'static str)> {
        vec![
            (0, 4, "silB"),
            (5, 11, "h+e"),
            (12, 17, "h-e+l"),
            (18, 24, "e-l+o"),
            (25, 33, "l-o+w"),
            (34, 39, "o-w+er"),
            (40, 45, "w-er+l"),
            (46, 51, "er-l+d"),
            (52, 60, "l-d"),
            (61, 70, "silE"),
        ]
    }

    struct FailingEngine;

    impl DecodingEngine for FailingEngine {
        fn run(
            &self,
            _request: &EngineRequest,
            _cancel: &CancellationFlag,
        ) -> Result<EngineTrace, SegmentationError> {
            Err(SegmentationError::from_engine_failure(
                "julius".to_string(),
                "exit status 2".to_string(),
                "ERROR: cannot open hmmdefs",
            ))
        }

        fn label(&self) -> &str {
            "failing"
        }
    }

    fn segmenter(config: SegmenterConfig, engine: ScriptedEngine) -> Segmenter {
        let lexicon = Lexicon::from_entries([
            ("hello", vec!["h e l o"]),
            ("world", vec!["w er l d"]),
        ])
        .unwrap();
        SegmenterBuilder::new(config)
            .with_lexicon(Arc::new(lexicon))
            .with_engine(Box::new(engine))
            .build()
            .expect("build")
    }

    fn utterance(dir: &Path, id: &str, words: &str) -> Utterance {
        Utterance::new(
            id,
            words.split_whitespace().map(str::to_string).collect(),
            InputSource::Waveform(dir.join(format!("{id}.wav"))),
        )
    }

    #[test]
    fn segment_utterance_produces_contiguous_segments() {
        let dir = tempfile::tempdir().unwrap();
        let segmenter = segmenter(
            SegmenterConfig::default(),
            ScriptedEngine::new(hello_world_rows()),
        );
        let segments = segmenter
            .segment_utterance(&utterance(dir.path(), "hw", "hello world"))
            .unwrap();
        assert_eq!(segments.len(), 10);
        assert_eq!(segments[0].begin_s, 0.0);
        for pair in segments.windows(2) {
            assert!((pair[0].end_s - pair[1].begin_s).abs() < 1e-9);
        }
        // nothing retained without leave_dict
        assert!(!dir.path().join("hw.dict").exists());
    }

    #[test]
    fn leave_dict_keeps_artifacts_and_trace() {
        let dir = tempfile::tempdir().unwrap();
        let config = SegmenterConfig {
            leave_dict: true,
            ..SegmenterConfig::default()
        };
        let segmenter = segmenter(config, ScriptedEngine::new(hello_world_rows()));
        segmenter
            .segment_utterance(&utterance(dir.path(), "hw", "hello world"))
            .unwrap();
        let dict = std::fs::read_to_string(dir.path().join("hw.dict")).unwrap();
        assert_eq!(
            dict,
            "0 [w_0] silB\n1 [w_1] h e l o\n2 [w_2] w er l d\n3 [w_3] silE\n"
        );
        assert!(dir.path().join("hw.dfa").is_file());
        assert!(dir.path().join("hw.log").is_file());
    }

    #[test]
    fn lexicon_miss_fails_at_dictionary_stage() {
        let dir = tempfile::tempdir().unwrap();
        let segmenter = segmenter(
            SegmenterConfig {
                leave_dict: true,
                ..SegmenterConfig::default()
            },
            ScriptedEngine::new(hello_world_rows()),
        );
        let err = segmenter
            .segment_utterance(&utterance(dir.path(), "z", "hello zebra"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LexiconMiss);
        assert_eq!(err.stage(), Some(Stage::Dictionary));
        assert!(!dir.path().join("z.dict").exists());
        assert!(!dir.path().join("z.dfa").exists());
    }

    #[test]
    fn empty_transcript_fails_at_transcript_stage() {
        let dir = tempfile::tempdir().unwrap();
        let segmenter = segmenter(
            SegmenterConfig::default(),
            ScriptedEngine::new(hello_world_rows()),
        );
        let err = segmenter
            .segment_utterance(&utterance(dir.path(), "e", ""))
            .unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Transcript));
    }

    #[test]
    fn continue_policy_collects_failures_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let config = SegmenterConfig {
            failure_policy: FailurePolicy::Continue,
            max_concurrent_engines: 3,
            ..SegmenterConfig::default()
        };
        let segmenter = segmenter(config, ScriptedEngine::new(hello_world_rows()));
        let utterances = vec![
            utterance(dir.path(), "a", "hello world"),
            utterance(dir.path(), "b", "hello zebra"),
            utterance(dir.path(), "c", "hello world"),
            utterance(dir.path(), "d", "world hello"),
        ];
        let outcome = segmenter.segment_utterances(&utterances).unwrap();
        let ids: Vec<_> = outcome.segments.keys().map(String::as_str).collect();
        assert_eq!(ids, ["a", "c"]);
        let failed: Vec<_> = outcome
            .failures
            .iter()
            .map(|e| (e.utterance_id().unwrap_or(""), e.kind()))
            .collect();
        assert_eq!(
            failed,
            [("b", ErrorKind::LexiconMiss), ("d", ErrorKind::AlignmentParse)]
        );
        assert!(!outcome.is_complete());
    }

    #[test]
    fn abort_policy_returns_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let segmenter = segmenter(
            SegmenterConfig::default(),
            ScriptedEngine::new(hello_world_rows()),
        );
        let utterances = vec![
            utterance(dir.path(), "a", "hello world"),
            utterance(dir.path(), "b", "hello zebra"),
            utterance(dir.path(), "c", "hello world"),
        ];
        let err = segmenter.segment_utterances(&utterances).unwrap_err();
        assert_eq!(err.utterance_id(), Some("b"));
    }

    #[test]
    fn segments_from_trace_replays_without_engine() {
        let segmenter = segmenter(SegmenterConfig::default(), ScriptedEngine::new(Vec::new()));
        let trace = "=== begin forced alignment ===\n\
                     [   0    4]  -1.0  silB\n\
                     [   5   11]  -1.0  h\n\
                     [  12   17]  -1.0  e\n\
                     [  18   24]  -1.0  l\n\
                     [  25   33]  -1.0  o\n\
                     [  34   40]  -1.0  silE\n\
                     === end forced alignment ===\n";
        let segments = segmenter
            .segments_from_trace(&["hello".to_string()], trace)
            .unwrap();
        let labels: Vec<_> = segments.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, ["silB", "h", "e", "l", "o", "silE"]);
        assert!((segments[5].end_s - 0.41).abs() < 1e-9);
    }

    #[test]
    fn triphone_mode_changes_labels_not_boundaries() {
        let dir = tempfile::tempdir().unwrap();
        let mono = segmenter(
            SegmenterConfig::default(),
            ScriptedEngine::new(hello_world_rows()),
        )
        .segment_utterance(&utterance(dir.path(), "hw", "hello world"))
        .unwrap();
        let tri = segmenter(
            SegmenterConfig {
                triphone: true,
                ..SegmenterConfig::default()
            },
            ScriptedEngine::new(hello_world_triphone_rows()),
        )
        .segment_utterance(&utterance(dir.path(), "hw", "hello world"))
        .unwrap();
        assert_eq!(mono.len(), tri.len());
        for (m, t) in mono.iter().zip(&tri) {
            assert_eq!((m.begin_frame, m.end_frame), (t.begin_frame, t.end_frame));
        }
        assert_eq!(tri[4].label, "l-o+w");
        assert_eq!(mono[4].label, "o");
    }

    #[test]
    fn engine_triphone_labels_are_reported_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let config = SegmenterConfig {
            triphone: true,
            triphone_context: TriphoneContext::WithinWord,
            ..SegmenterConfig::default()
        };
        let segments = segmenter(config, ScriptedEngine::new(hello_world_triphone_rows()))
            .segment_utterance(&utterance(dir.path(), "hw", "hello world"))
            .unwrap();
        // within-word context would be "l-o" and "w+er"
        assert_eq!(segments[4].label, "l-o+w");
        assert_eq!(segments[5].label, "o-w+er");
    }

    #[test]
    fn trimming_boundary_silence_keeps_interior_boundaries() {
        let dir = tempfile::tempdir().unwrap();
        let kept = segmenter(
            SegmenterConfig::default(),
            ScriptedEngine::new(hello_world_rows()),
        )
        .segment_utterance(&utterance(dir.path(), "hw", "hello world"))
        .unwrap();
        let trimmed = segmenter(
            SegmenterConfig {
                disable_silence_at_ends: true,
                ..SegmenterConfig::default()
            },
            ScriptedEngine::new(hello_world_rows()),
        )
        .segment_utterance(&utterance(dir.path(), "hw", "hello world"))
        .unwrap();
        assert_eq!(trimmed.len(), 8);
        assert_eq!(trimmed[..], kept[1..9]);
        assert!((trimmed[0].begin_s - 0.05).abs() < 1e-9);
    }

    #[test]
    fn failed_engine_run_still_leaves_a_log() {
        let dir = tempfile::tempdir().unwrap();
        let config = SegmenterConfig {
            leave_dict: true,
            ..SegmenterConfig::default()
        };
        let segmenter = SegmenterBuilder::new(config)
            .with_lexicon(Arc::new(
                Lexicon::from_entries([("hello", vec!["h e l o"])]).unwrap(),
            ))
            .with_engine(Box::new(FailingEngine))
            .build()
            .unwrap();
        let err = segmenter
            .segment_utterance(&utterance(dir.path(), "f", "hello"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EngineInvocation);
        let log = std::fs::read_to_string(dir.path().join("f.log")).unwrap();
        assert!(log.contains("cannot open hmmdefs"), "{log}");
    }
}
