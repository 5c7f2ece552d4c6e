use std::io::Read;
use std::process::{ChildStderr, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(25);
/// How long to wait for the stderr reader once the child has exited.
const STDERR_GRACE: Duration = Duration::from_secs(1);
/// Only the tail of stderr is kept for error messages.
const STDERR_TAIL: usize = 4096;

/// Run `argv` and wait at most `timeout` for it to exit successfully.
///
/// On timeout the child is killed and reaped before returning.
pub fn run_bounded(argv: &[String], timeout: Duration) -> Result<(), String> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| "empty command".to_string())?;
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("spawn {}: {}", program, e))?;

    // Drain stderr while waiting so a chatty child cannot block on a full pipe.
    let stderr_rx = child.stderr.take().map(drain_stderr);

    let deadline = Instant::now() + timeout;
    let status: ExitStatus = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(format!(
                    "{} did not finish within {}s",
                    argv.join(" "),
                    timeout.as_secs_f32()
                ));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => return Err(format!("wait for {}: {}", program, e)),
        }
    };

    if status.success() {
        return Ok(());
    }
    let stderr = stderr_rx
        .and_then(|rx| rx.recv_timeout(STDERR_GRACE).ok())
        .unwrap_or_default();
    let code = status
        .code()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "signal".to_string());
    Err(format!(
        "{} exited with {}: {}",
        argv.join(" "),
        code,
        stderr.trim()
    ))
}

/// Read `pipe` to EOF on a background thread, keeping the last
/// `STDERR_TAIL` bytes. The text is sent once the pipe closes.
fn drain_stderr(mut pipe: ChildStderr) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut tail: Vec<u8> = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            match pipe.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    tail.extend_from_slice(&buf[..n]);
                    if tail.len() > STDERR_TAIL {
                        tail.drain(..tail.len() - STDERR_TAIL);
                    }
                }
            }
        }
        let _ = tx.send(String::from_utf8_lossy(&tail).into_owned());
    });
    rx
}

/// `systemctl is-active <unit>`; `None` if systemctl cannot be run.
pub fn unit_state(unit: &str) -> Option<String> {
    let output = Command::new("systemctl")
        .arg("is-active")
        .arg(unit)
        .stdin(Stdio::null())
        .output()
        .ok()?;
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_success() {
        assert!(run_bounded(&argv(&["true"]), Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn test_failure_reports_stderr() {
        let err = run_bounded(
            &argv(&["sh", "-c", "echo unit failed >&2; exit 3"]),
            Duration::from_secs(5),
        )
        .unwrap_err();
        assert!(err.contains("exited with 3"), "{}", err);
        assert!(err.contains("unit failed"), "{}", err);
    }

    #[test]
    fn test_large_stderr_does_not_stall_success() {
        let started = Instant::now();
        let result = run_bounded(
            &argv(&["sh", "-c", "head -c 200000 /dev/zero >&2; exit 0"]),
            Duration::from_secs(3),
        );
        assert!(result.is_ok(), "{:?}", result);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn test_large_stderr_failure_keeps_tail() {
        let err = run_bounded(
            &argv(&[
                "sh",
                "-c",
                "head -c 200000 /dev/zero | tr '\\0' x >&2; echo last words >&2; exit 4",
            ]),
            Duration::from_secs(5),
        )
        .unwrap_err();
        assert!(err.contains("exited with 4"), "{}", &err[..80.min(err.len())]);
        assert!(err.ends_with("last words"), "{}", &err[err.len().saturating_sub(80)..]);
        assert!(err.len() < STDERR_TAIL + 200);
    }

    #[test]
    fn test_timeout_kills_child() {
        let started = Instant::now();
        let err = run_bounded(&argv(&["sleep", "10"]), Duration::from_millis(200)).unwrap_err();
        assert!(err.contains("did not finish"), "{}", err);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_missing_program() {
        let err = run_bounded(
            &argv(&["/nonexistent/zivpn-restart"]),
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(err.starts_with("spawn"), "{}", err);
    }

    #[test]
    fn test_empty_command() {
        assert!(run_bounded(&[], Duration::from_secs(1)).is_err());
    }
}
