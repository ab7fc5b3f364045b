use std::path::PathBuf;

use chrono::Utc;
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use segmentation_kit::corpus::{self, CorpusEntry};
use segmentation_kit::{
    logging, EngineConfig, FailurePolicy, Segment, SegmenterBuilder, SegmenterConfig,
    UnitGranularity,
};

#[path = "segment/json_report_formatter.rs"]
mod json_report_formatter;
#[path = "segment/lab_report_formatter.rs"]
mod lab_report_formatter;
#[path = "segment/text_grid_report_formatter.rs"]
mod text_grid_report_formatter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// `<id>.lab` next to each waveform (segmentation-kit format).
    Lab,
    /// One JSON report for the whole corpus.
    Json,
    #[value(name = "textgrid")]
    TextGrid,
}

#[derive(Debug, Parser)]
#[command(name = "segment")]
#[command(about = "Forced phoneme alignment of a corpus with Julius")]
struct Args {
    /// Directory holding `<id>.wav` and `<id>.txt` pairs.
    data_dir: PathBuf,
    /// Do not insert silence at the beginning and end of each utterance.
    #[arg(long, env = "SEGMENTATION_KIT_DISABLE_SILENCE_AT_ENDS")]
    disable_silence_at_ends: bool,
    /// Keep the generated `.dfa`, `.dict` and `.log` files.
    #[arg(long, env = "SEGMENTATION_KIT_LEAVE_DICT")]
    leave_dict: bool,
    /// Run Julius with `-debug` and log its stderr.
    #[arg(long, env = "SEGMENTATION_KIT_DEBUG")]
    debug: bool,
    /// Use the triphone model instead of the monophone model.
    #[arg(long, env = "SEGMENTATION_KIT_TRIPHONE")]
    triphone: bool,
    /// Read `<id>.mfc` HTK parameter files instead of waveforms.
    #[arg(long, env = "SEGMENTATION_KIT_INPUT_MFCC")]
    input_mfcc: bool,
    /// Align words instead of phonemes.
    #[arg(long, env = "SEGMENTATION_KIT_WORD_ALIGN")]
    word_align: bool,
    /// Shift boundaries by half an analysis window like segmentation-kit.
    #[arg(long, env = "SEGMENTATION_KIT_CENTER_ON_WINDOW")]
    center_on_window: bool,
    /// Pronunciation lexicon (`word phone phone ...`). Without one,
    /// transcripts are read as hiragana.
    #[arg(long, env = "SEGMENTATION_KIT_LEXICON")]
    lexicon: Option<PathBuf>,
    /// Resolve words missing from the lexicon as hiragana.
    #[arg(long, env = "SEGMENTATION_KIT_KANA_FALLBACK")]
    kana_fallback: bool,
    /// JSON file with segmenter settings; command line flags are applied on top.
    #[arg(long, env = "SEGMENTATION_KIT_CONFIG")]
    config: Option<PathBuf>,
    /// JSON file with engine settings; overrides --model-dir and --julius.
    #[arg(long, env = "SEGMENTATION_KIT_ENGINE_CONFIG")]
    engine_config: Option<PathBuf>,
    #[arg(long, env = "SEGMENTATION_KIT_MODEL_DIR", default_value = "models")]
    model_dir: PathBuf,
    #[arg(long, env = "SEGMENTATION_KIT_JULIUS", default_value = EngineConfig::DEFAULT_EXECUTABLE)]
    julius: PathBuf,
    /// Number of Julius processes run at once.
    #[arg(long, env = "SEGMENTATION_KIT_JOBS")]
    jobs: Option<usize>,
    #[arg(long, env = "SEGMENTATION_KIT_TIMEOUT_MS")]
    timeout_ms: Option<u64>,
    /// Report failed utterances and keep going.
    #[arg(long, env = "SEGMENTATION_KIT_CONTINUE_ON_ERROR")]
    continue_on_error: bool,
    #[arg(
        long,
        env = "SEGMENTATION_KIT_FORMAT",
        value_enum,
        default_value_t = OutputFormat::Lab
    )]
    output_format: OutputFormat,
    /// JSON report path (defaults to `<data_dir>/segmentation-<timestamp>.json`).
    #[arg(long, env = "SEGMENTATION_KIT_OUT")]
    out: Option<PathBuf>,
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args = Args::parse();
    let config = segmenter_config(&args)?;
    let engine_config = match &args.engine_config {
        Some(path) => EngineConfig::load(path).map_err(|err| err.to_string())?,
        None => EngineConfig::from_model_dir(&args.model_dir).with_executable(&args.julius),
    };

    let mut builder = SegmenterBuilder::new(config.clone()).with_engine_config(engine_config);
    if let Some(path) = &args.lexicon {
        builder = builder.with_lexicon_path(path);
    }
    let segmenter = builder.build().map_err(|err| err.to_string())?;

    let entries = corpus::discover(&args.data_dir).map_err(|err| err.to_string())?;
    if entries.is_empty() {
        return Err(format!(
            "No waveforms found under '{}'.",
            args.data_dir.display()
        ));
    }

    let progress = ProgressBar::new(entries.len() as u64);
    progress.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-"),
    );
    progress.set_message("starting...");

    let mut write_errors = Vec::new();
    let outcome = segmenter.segment_entries(&entries, |entry, result| {
        progress.set_message(entry.id.clone());
        if let Ok(segments) = result {
            if let Err(err) = write_per_utterance(args.output_format, entry, segments) {
                write_errors.push(err);
            }
        }
        progress.inc(1);
    });
    progress.finish_with_message("segmentation complete");
    let outcome = outcome.map_err(|err| err.to_string())?;

    for (id, segments) in &outcome.segments {
        println!("=====Segmentation result of {id}.wav=====");
        print!("{}", lab_report_formatter::render_lab(segments));
    }
    for failure in &outcome.failures {
        eprintln!("{failure}");
    }

    if args.output_format == OutputFormat::Json {
        let out_path = args.out.clone().unwrap_or_else(|| {
            let run_id = Utc::now().format("%Y%m%dT%H%M%SZ");
            args.data_dir.join(format!("segmentation-{run_id}.json"))
        });
        let report = json_report_formatter::build_report(
            &args.data_dir,
            segmenter.engine_label(),
            &config,
            &outcome,
        );
        json_report_formatter::write_report(&out_path, &report)?;
        println!("Report saved in \"{}\".", out_path.display());
    }

    if let Some(err) = write_errors.into_iter().next() {
        return Err(err);
    }
    if !outcome.is_complete() {
        return Err(format!(
            "{} of {} utterances failed.",
            outcome.failures.len(),
            entries.len()
        ));
    }
    Ok(())
}

fn segmenter_config(args: &Args) -> Result<SegmenterConfig, String> {
    let mut config = match &args.config {
        Some(path) => SegmenterConfig::load(path).map_err(|err| err.to_string())?,
        None => SegmenterConfig::default(),
    };
    config.disable_silence_at_ends |= args.disable_silence_at_ends;
    config.leave_dict |= args.leave_dict;
    config.debug |= args.debug;
    config.triphone |= args.triphone;
    config.input_mfcc |= args.input_mfcc;
    config.frame_timing.center_on_window |= args.center_on_window;
    config.kana_fallback |= args.kana_fallback || args.lexicon.is_none();
    if args.word_align {
        config.granularity = UnitGranularity::Word;
    }
    if args.continue_on_error {
        config.failure_policy = FailurePolicy::Continue;
    }
    if let Some(jobs) = args.jobs {
        config.max_concurrent_engines = jobs;
    }
    if args.timeout_ms.is_some() {
        config.engine_timeout_ms = args.timeout_ms;
    }
    Ok(config)
}

fn write_per_utterance(
    format: OutputFormat,
    entry: &CorpusEntry,
    segments: &[Segment],
) -> Result<(), String> {
    match format {
        OutputFormat::Lab => {
            lab_report_formatter::write_lab(&entry.waveform, segments).map(|_| ())
        }
        OutputFormat::TextGrid => {
            text_grid_report_formatter::write_textgrid(&entry.waveform, segments).map(|_| ())
        }
        OutputFormat::Json => Ok(()),
    }
}
