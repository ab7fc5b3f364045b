use std::ffi::OsStr;
use std::io::{ErrorKind as IoErrorKind, Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use crate::engine::{CancellationFlag, EngineTrace};
use crate::error::SegmentationError;

const POLL_INTERVAL: Duration = Duration::from_millis(20);
const EXIT_DRAIN: Duration = Duration::from_secs(2);
const KILL_DRAIN: Duration = Duration::from_millis(100);

#[must_use]
pub fn command_exists(program: impl AsRef<OsStr>) -> bool {
    which::which(program).is_ok()
}

/// Runs `program` with `stdin_payload` on stdin, capturing stdout and stderr
/// separately. The child is killed when `timeout` elapses or `cancel` is
/// raised.
pub fn run_with_stdin(
    program: &OsStr,
    args: &[String],
    stdin_payload: &str,
    timeout: Option<Duration>,
    cancel: &CancellationFlag,
) -> Result<EngineTrace, SegmentationError> {
    let rendered = render_command(program, args);
    if !command_exists(program) {
        return Err(SegmentationError::from_engine_failure(
            rendered,
            "executable not found".to_string(),
            "",
        ));
    }
    if cancel.is_cancelled() {
        return Err(SegmentationError::Cancelled { command: rendered });
    }

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            SegmentationError::from_engine_failure(rendered.clone(), format!("spawn failed: {e}"), "")
        })?;
    let started_at = Instant::now();

    let stdout_rx = child.stdout.take().map(drain_in_background);
    let stderr_rx = child.stderr.take().map(drain_in_background);

    if let Some(mut stdin) = child.stdin.take() {
        match stdin.write_all(stdin_payload.as_bytes()) {
            Ok(()) => {}
            // the engine may exit before reading its input list
            Err(e) if e.kind() == IoErrorKind::BrokenPipe => {}
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(SegmentationError::from_engine_failure(
                    rendered,
                    format!("writing stdin failed: {e}"),
                    "",
                ));
            }
        }
    }

    loop {
        let polled = child.try_wait().map_err(|e| {
            SegmentationError::from_engine_failure(rendered.clone(), format!("wait failed: {e}"), "")
        })?;
        if let Some(status) = polled {
            let stdout = collect(stdout_rx.as_ref(), EXIT_DRAIN);
            let stderr = collect(stderr_rx.as_ref(), EXIT_DRAIN);
            return finish(rendered, status, stdout, stderr, started_at.elapsed());
        }

        if cancel.is_cancelled() {
            let _ = child.kill();
            let _ = child.wait();
            tracing::debug!(command = %rendered, "engine run cancelled");
            return Err(SegmentationError::Cancelled { command: rendered });
        }

        if let Some(limit) = timeout {
            if started_at.elapsed() >= limit {
                let _ = child.kill();
                let _ = child.wait();
                let stderr = collect(stderr_rx.as_ref(), KILL_DRAIN);
                return Err(SegmentationError::from_engine_timeout(
                    rendered,
                    saturating_duration_ms(limit),
                    &stderr,
                ));
            }
        }

        thread::sleep(POLL_INTERVAL);
    }
}

fn drain_in_background<R: Read + Send + 'static>(mut pipe: R) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        let _ = tx.send(buf);
    });
    rx
}

fn collect(rx: Option<&Receiver<Vec<u8>>>, wait: Duration) -> String {
    rx.and_then(|rx| rx.recv_timeout(wait).ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

fn finish(
    rendered: String,
    status: ExitStatus,
    stdout: String,
    stderr: String,
    elapsed: Duration,
) -> Result<EngineTrace, SegmentationError> {
    if status.success() {
        return Ok(EngineTrace {
            stdout,
            stderr,
            elapsed,
        });
    }
    let detail = match status.code() {
        Some(code) => format!("exit status {code}"),
        None => "terminated by signal".to_string(),
    };
    Err(SegmentationError::from_engine_failure(rendered, detail, &stderr))
}

pub(crate) fn render_command(program: &OsStr, args: &[String]) -> String {
    let mut rendered = program.to_string_lossy().into_owned();
    for arg in args {
        rendered.push(' ');
        rendered.push_str(arg);
    }
    rendered
}

fn saturating_duration_ms(duration: Duration) -> u64 {
    duration.as_millis().try_into().unwrap_or(u64::MAX)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn run(program: &str, args: &[&str], payload: &str, timeout: Option<Duration>) -> Result<EngineTrace, SegmentationError> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        run_with_stdin(
            OsStr::new(program),
            &args,
            payload,
            timeout,
            &CancellationFlag::default(),
        )
    }

    #[test]
    fn stdin_reaches_the_child_and_stdout_is_captured() {
        let trace = run("cat", &[], "utt.wav\n", Some(Duration::from_secs(10))).unwrap();
        assert_eq!(trace.stdout, "utt.wav\n");
        assert!(trace.stderr.is_empty());
    }

    #[test]
    fn non_zero_exit_is_an_invocation_error() {
        let err = run("false", &[], "", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EngineInvocation);
        assert!(err.to_string().contains("exit status 1"), "{err}");
    }

    #[test]
    fn missing_program_is_an_invocation_error() {
        let err = run("definitely-not-a-julius-binary", &[], "", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EngineInvocation);
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn deadline_kills_the_child() {
        let started = Instant::now();
        let err = run("sleep", &["30"], "", Some(Duration::from_millis(200))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EngineTimeout);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn raised_flag_cancels_before_spawn() {
        let flag = CancellationFlag::default();
        flag.cancel();
        let err = run_with_stdin(OsStr::new("true"), &[], "", None, &flag).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn flag_raised_mid_run_kills_the_child() {
        let flag = CancellationFlag::default();
        let remote = flag.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(150));
            remote.cancel();
        });
        let started = Instant::now();
        let err = run_with_stdin(
            OsStr::new("sleep"),
            &["30".to_string()],
            "",
            None,
            &flag,
        )
        .unwrap_err();
        canceller.join().unwrap();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
