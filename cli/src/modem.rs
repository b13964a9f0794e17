//! Adapter around an external acoustic-modem decoder process.
//!
//! One long-lived child is spawned per session. Normalized f32 samples are
//! streamed to its stdin (little-endian), and each successfully demodulated
//! payload arrives as one base64 line on its stdout, collected by a reader
//! thread so `decode` never blocks the decode worker.

use std::io::{self, BufRead, BufReader, ErrorKind, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use log::warn;
use thiserror::Error;

use heywifi_core::{Modem, ModemConfig};

#[derive(Debug, Error)]
pub enum ModemError {
    #[error("modem command `{0}` was not found")]
    NotFound(String),

    #[error("failed to start modem `{tool}`: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("modem process has no stdio pipes")]
    Stdio,
}

pub struct ProcessModem {
    child: Child,
    stdin: ChildStdin,
    payloads: Receiver<Vec<u8>>,
    broken: bool,
}

impl ProcessModem {
    pub fn spawn(command: &str, config: &ModemConfig) -> Result<Self, ModemError> {
        let mut child = Command::new(command)
            .args(["--rate", &config.sample_rate.to_string()])
            .args(["--profile", &config.profile])
            .arg("--profiles")
            .arg(&config.profiles)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound => ModemError::NotFound(command.to_owned()),
                _ => ModemError::Spawn {
                    tool: command.to_owned(),
                    source: err,
                },
            })?;

        let stdin = child.stdin.take().ok_or(ModemError::Stdio)?;
        let stdout = child.stdout.take().ok_or(ModemError::Stdio)?;

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                let Ok(line) = line else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match BASE64.decode(line) {
                    Ok(payload) => {
                        if tx.send(payload).is_err() {
                            break;
                        }
                    }
                    Err(err) => warn!("modem emitted an undecodable line: {err}"),
                }
            }
        });

        Ok(Self {
            child,
            stdin,
            payloads: rx,
            broken: false,
        })
    }
}

impl Modem for ProcessModem {
    fn decode(&mut self, samples: &[f32]) -> Option<Vec<u8>> {
        if !self.broken {
            let mut buf = Vec::with_capacity(samples.len() * 4);
            for sample in samples {
                buf.extend_from_slice(&sample.to_le_bytes());
            }
            if let Err(err) = self.stdin.write_all(&buf) {
                warn!("modem stdin closed: {err}");
                self.broken = true;
            }
        }
        self.payloads.try_recv().ok()
    }
}

impl Drop for ProcessModem {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
