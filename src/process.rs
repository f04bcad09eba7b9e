use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;

use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::logging::Logger;

/// Output of one external process invocation (spec §4.1).
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
}

impl ProcessOutput {
    pub fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Launches `executable` in `cwd` with `args`, through the platform's `env`
/// resolution so `PATH` lookup applies.
///
/// Ordering contract: stdout is drained to EOF before the child is waited
/// on, so a child that fills the stdout pipe buffer before exiting can
/// never deadlock us. Stderr is drained only after the child has exited.
pub async fn run<I, S>(
    executable: &str,
    cwd: &Path,
    args: I,
    logger: &dyn Logger,
) -> ProcessOutput
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<String> = args
        .into_iter()
        .map(|a| a.as_ref().to_string_lossy().into_owned())
        .collect();
    logger.debug(&format!("run: {} {}", executable, args.join(" ")));

    let child = Command::new(executable)
        .current_dir(cwd)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn();

    let mut child = match child {
        Ok(c) => c,
        Err(e) => {
            let message = format!("failed to spawn {}: {}", executable, e);
            logger.error(&message);
            return ProcessOutput {
                stdout: Vec::new(),
                stderr: message.into_bytes(),
                exit_code: -1,
            };
        }
    };

    let mut stdout_pipe = child.stdout.take().expect("stdout was piped");
    let mut stdout = Vec::new();
    if let Err(e) = stdout_pipe.read_to_end(&mut stdout).await {
        logger.warning(&format!("failed to read stdout of {}: {}", executable, e));
    }
    drop(stdout_pipe);

    let status = match child.wait().await {
        Ok(s) => s,
        Err(e) => {
            let message = format!("failed to wait on {}: {}", executable, e);
            logger.error(&message);
            return ProcessOutput {
                stdout,
                stderr: message.into_bytes(),
                exit_code: -1,
            };
        }
    };

    let mut stderr_pipe = child.stderr.take().expect("stderr was piped");
    let mut stderr = Vec::new();
    if let Err(e) = stderr_pipe.read_to_end(&mut stderr).await {
        logger.warning(&format!("failed to read stderr of {}: {}", executable, e));
    }

    let exit_code = status.code().unwrap_or(-1);
    if exit_code != 0 {
        logger.warning(&format!(
            "{} exited with {} (args: {})",
            executable,
            exit_code,
            args.join(" ")
        ));
    }

    ProcessOutput {
        stdout,
        stderr,
        exit_code,
    }
}
