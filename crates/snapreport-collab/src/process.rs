use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};

use snapreport_core::InvokeError;
use tracing::debug;

use crate::traits::Invoker;

/// Delivers payloads by running the target as a program with the payload
/// on stdin. A non-zero exit status is a delivery failure.
#[derive(Clone, Debug, Default)]
pub struct CommandInvoker {
    pub args: Vec<String>,
}

impl CommandInvoker {
    pub fn new(args: Vec<String>) -> Self {
        Self { args }
    }
}

impl Invoker for CommandInvoker {
    fn invoke(&self, target: &str, payload: &[u8]) -> Result<(), InvokeError> {
        let mut child = Command::new(target)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => InvokeError::Unresolvable {
                    target: target.to_string(),
                    reason: e.to_string(),
                },
                _ => InvokeError::Unreachable {
                    target: target.to_string(),
                    reason: e.to_string(),
                },
            })?;

        // Feed stdin from its own thread while this one drains stdout and
        // stderr; a target that echoes as it reads would otherwise fill its
        // output pipe and stall both sides.
        let writer = child.stdin.take().map(|mut stdin| {
            let payload = payload.to_vec();
            std::thread::spawn(move || stdin.write_all(&payload))
        });

        let out = child.wait_with_output().map_err(|e| InvokeError::Unreachable {
            target: target.to_string(),
            reason: e.to_string(),
        })?;

        // A target that exits without reading stdin shows up as a broken
        // pipe here; its exit status decides the outcome.
        if let Some(handle) = writer {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(invoke_target = target, error = %e, "payload write to target stdin failed"),
                Err(_) => debug!(invoke_target = target, "stdin writer thread panicked"),
            }
        }

        if !out.status.success() {
            return Err(InvokeError::Failed {
                target: target.to_string(),
                reason: format!(
                    "exit {}\nstderr:{}",
                    out.status,
                    String::from_utf8_lossy(&out.stderr).trim()
                ),
            });
        }
        debug!(invoke_target = target, stdout_bytes = out.stdout.len(), "target accepted payload");
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn successful_program_accepts_payload() {
        let inv = CommandInvoker::new(vec![]);
        inv.invoke("cat", b"{\"EventVersion\":\"1.0\"}").unwrap();
    }

    #[test]
    fn large_payload_to_echoing_program_completes() {
        let inv = CommandInvoker::new(vec![]);
        let payload = vec![b'x'; 1024 * 1024];
        inv.invoke("cat", &payload).unwrap();
    }

    #[test]
    fn failing_program_is_reported() {
        let inv = CommandInvoker::new(vec![]);
        let err = inv.invoke("false", b"{}").unwrap_err();
        assert!(matches!(err, InvokeError::Failed { .. }));
    }

    #[test]
    fn missing_program_is_unresolvable() {
        let inv = CommandInvoker::new(vec![]);
        let err = inv.invoke("/nonexistent/snapreport-target", b"{}").unwrap_err();
        assert!(matches!(err, InvokeError::Unresolvable { .. }));
    }
}
