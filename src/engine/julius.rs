use std::time::Duration;

use crate::config::{EngineConfig, SegmenterConfig, UnitGranularity};
use crate::engine::process;
use crate::engine::{CancellationFlag, EngineRequest, EngineTrace};
use crate::error::SegmentationError;
use crate::pipeline::traits::DecodingEngine;
use crate::types::InputSource;

/// Julius in forced-alignment mode.
#[derive(Debug, Clone)]
pub struct JuliusEngine {
    engine: EngineConfig,
    triphone: bool,
    granularity: UnitGranularity,
    debug: bool,
    timeout: Option<Duration>,
}

impl JuliusEngine {
    pub fn new(engine: EngineConfig, config: &SegmenterConfig) -> Self {
        Self {
            engine,
            triphone: config.triphone,
            granularity: config.granularity,
            debug: config.debug,
            timeout: config.engine_timeout(),
        }
    }

    pub fn engine_config(&self) -> &EngineConfig {
        &self.engine
    }

    pub fn command_args(&self, request: &EngineRequest) -> Vec<String> {
        let hmm = if self.triphone {
            &self.engine.triphone_hmm
        } else {
            &self.engine.monophone_hmm
        };
        let mut args = vec![
            "-h".to_string(),
            hmm.display().to_string(),
            "-dfa".to_string(),
            request.grammar_path.display().to_string(),
            "-v".to_string(),
            request.dictionary_path.display().to_string(),
        ];
        args.push(
            match self.granularity {
                UnitGranularity::Phoneme => "-palign",
                UnitGranularity::Word => "-walign",
            }
            .to_string(),
        );
        if self.triphone {
            if let Some(hlist) = &self.engine.triphone_hlist {
                args.push("-hlist".to_string());
                args.push(hlist.display().to_string());
            }
        }
        args.push("-input".to_string());
        args.push(
            match request.input {
                InputSource::Waveform(_) => "file",
                InputSource::Features(_) => "htkparam",
            }
            .to_string(),
        );
        if self.debug {
            args.push("-debug".to_string());
        }
        args.extend(self.engine.extra_args.iter().cloned());
        args
    }
}

impl DecodingEngine for JuliusEngine {
    fn run(
        &self,
        request: &EngineRequest,
        cancel: &CancellationFlag,
    ) -> Result<EngineTrace, SegmentationError> {
        let args = self.command_args(request);
        let stdin_payload = format!("{}\n", request.input.path().display());
        tracing::debug!(
            utterance = %request.utterance_id,
            command = %process::render_command(self.engine.executable.as_os_str(), &args),
            "invoking julius"
        );

        let trace = process::run_with_stdin(
            self.engine.executable.as_os_str(),
            &args,
            &stdin_payload,
            self.timeout,
            cancel,
        )?;

        if self.debug && !trace.stderr.is_empty() {
            tracing::debug!(
                utterance = %request.utterance_id,
                stderr = %trace.stderr.trim_end(),
                "julius stderr"
            );
        }
        tracing::debug!(
            utterance = %request.utterance_id,
            elapsed_ms = trace.elapsed.as_millis() as u64,
            trace_bytes = trace.stdout.len(),
            "julius finished"
        );
        Ok(trace)
    }

    fn label(&self) -> &str {
        "julius"
    }
}
