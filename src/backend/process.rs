use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::BackendError;

const CHECK_INTERVAL: Duration = Duration::from_millis(10);

/// Run `program` and return its trimmed stdout.
///
/// The child is killed if it is still running after `timeout`, so a hung
/// player never stalls the sync loop. A non-zero exit is reported with stderr.
pub fn run_with_timeout(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<String, BackendError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| BackendError::Spawn {
            program: program.to_string(),
            source,
        })?;

    let started = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if started.elapsed() >= timeout => {
                log::debug!("{} still running after {:?}, killing it", program, timeout);
                let _ = child.kill();
                let _ = child.wait();
                return Err(BackendError::Timeout {
                    program: program.to_string(),
                    timeout,
                });
            }
            Ok(None) => thread::sleep(CHECK_INTERVAL),
            Err(source) => {
                let _ = child.kill();
                return Err(BackendError::Spawn {
                    program: program.to_string(),
                    source,
                });
            }
        }
    };

    let stdout = read_pipe(child.stdout.take());
    if !status.success() {
        return Err(BackendError::CommandFailed {
            program: program.to_string(),
            status,
            stderr: read_pipe(child.stderr.take()),
        });
    }

    Ok(stdout)
}

fn read_pipe<R: Read>(pipe: Option<R>) -> String {
    let mut text = String::new();
    if let Some(mut pipe) = pipe {
        if let Err(e) = pipe.read_to_string(&mut text) {
            log::debug!("Failed to read child output: {}", e);
        }
    }
    text.trim().to_string()
}
