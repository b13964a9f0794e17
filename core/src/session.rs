//! Provisioning protocol state machine.
//!
//! Driven by the decode worker through [`ProvisioningSession::handle_payload`]
//! once a credential frame arrives. External actuation (connection manager,
//! address lookup, broker publishes) sits behind traits so the machine is
//! testable without touching the system.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, error, info, warn};
use serde::Serialize;

use crate::cipher;
use crate::decoder::StopHandle;
use crate::error::Result;
use crate::frame::CredentialFrame;
use crate::{PUBLISH_ATTEMPTS, STATUS_CONNECTED, STATUS_CONNECTING, STATUS_DONE};

/// Wi-Fi actuation via the system connection manager.
pub trait ConnectionManager {
    /// Fail with a configuration error when the tool is absent, before any
    /// connect command is attempted.
    fn ensure_available(&self) -> Result<()>;
    fn rescan(&self) -> Result<()>;
    fn delete_profile(&self, ssid: &str) -> Result<()>;
    fn connect(&self, ssid: &str, password: &str) -> Result<()>;
}

/// Lookup of the IPv4 address assigned to the wireless interface.
pub trait NetInfo {
    fn wlan_ipv4(&self) -> Result<Option<String>>;
}

/// Message-broker publishes: plain status codes on the fixed status topic,
/// encrypted results on the per-channel topic.
pub trait Publisher {
    fn publish_status(&self, code: u8) -> Result<()>;
    fn publish_result(&self, channel: u16, message: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingCredentials,
    Connecting,
    Connected,
    Reporting,
    Done,
    FailedConnect,
    FailedNoIp,
}

/// Plaintext of the result message, encrypted before publish.
#[derive(Serialize)]
struct ResultMessage<'a> {
    id: u16,
    data: &'a str,
}

pub struct ProvisioningSession<C, N, P> {
    conn: C,
    net: N,
    publisher: P,
    decoder_stop: StopHandle,
    state: Mutex<SessionState>,
    done: Arc<AtomicBool>,
}

impl<C, N, P> ProvisioningSession<C, N, P>
where
    C: ConnectionManager,
    N: NetInfo,
    P: Publisher,
{
    pub fn new(conn: C, net: N, publisher: P, decoder_stop: StopHandle) -> Self {
        Self {
            conn,
            net,
            publisher,
            decoder_stop,
            state: Mutex::new(SessionState::Idle),
            done: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Mark the session as listening. Called once the decoder is running.
    pub fn begin(&self) {
        self.set_state(SessionState::AwaitingCredentials);
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    /// Completion flag observed by the outer run loop.
    pub fn done_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.done)
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    /// Run the protocol for one decoded payload. A payload that fails to
    /// parse keeps the session waiting; a later transmission can still
    /// succeed. Stage failures after that are terminal.
    pub fn handle_payload(&self, payload: &[u8]) -> Result<()> {
        // Only the listening state accepts credentials; a payload decoded
        // after the session finished or failed must not re-run the
        // connect flow.
        let state = self.state();
        if state != SessionState::AwaitingCredentials {
            debug!("ignoring credential payload in state {state:?}");
            return Ok(());
        }

        let frame = match CredentialFrame::parse(payload) {
            Ok(frame) => frame,
            Err(err) => {
                warn!("ignoring undecodable credential frame: {err}");
                return Ok(());
            }
        };
        info!(
            "credentials received for network {:?} (channel {})",
            frame.ssid, frame.channel
        );

        self.set_state(SessionState::Connecting);
        self.publish_status(STATUS_CONNECTING);
        if let Err(err) = self.connect(&frame) {
            error!("failed to connect the Wi-Fi network: {err}");
            self.fail(SessionState::FailedConnect);
            return Err(err);
        }
        self.set_state(SessionState::Connected);
        info!("Wi-Fi is connected");

        let ip = match self.net.wlan_ipv4() {
            Ok(Some(ip)) => ip,
            Ok(None) => {
                error!("no IP address found");
                self.fail(SessionState::FailedNoIp);
                return Ok(());
            }
            Err(err) => {
                error!("address lookup failed: {err}");
                self.fail(SessionState::FailedNoIp);
                return Err(err);
            }
        };
        info!("address {ip}");

        self.set_state(SessionState::Reporting);
        self.publish_status(STATUS_CONNECTED);
        // Credentials consumed; nothing left to listen for.
        self.decoder_stop.signal_stop();
        self.report(frame.channel, payload, &ip)?;

        self.set_state(SessionState::Done);
        self.publish_status(STATUS_DONE);
        self.done.store(true, Ordering::SeqCst);
        info!("done");
        Ok(())
    }

    fn connect(&self, frame: &CredentialFrame) -> Result<()> {
        self.conn.ensure_available()?;
        if let Err(err) = self.conn.rescan() {
            warn!("wifi rescan failed: {err}");
        }
        // A stale profile under the same name shadows the new credentials;
        // deleting a profile that does not exist is fine.
        if let Err(err) = self.conn.delete_profile(&frame.ssid) {
            debug!("no stale profile deleted: {err}");
        }
        self.conn.connect(&frame.ssid, &frame.password)
    }

    /// Encrypt the result and publish it with bounded retries. Exhausting
    /// the attempts is logged but non-fatal; the session still completes.
    fn report(&self, channel: u16, raw_payload: &[u8], ip: &str) -> Result<()> {
        let plaintext = serde_json::to_string(&ResultMessage { id: channel, data: ip })?;
        let message = cipher::encrypt(channel, raw_payload, plaintext.as_bytes());

        for attempt in 1..=PUBLISH_ATTEMPTS {
            match self.publisher.publish_result(channel, &message) {
                Ok(()) => return Ok(()),
                Err(err) => {
                    warn!("result publish attempt {attempt}/{PUBLISH_ATTEMPTS} failed: {err}")
                }
            }
        }
        error!("failed to send the result message after {PUBLISH_ATTEMPTS} attempts");
        Ok(())
    }

    /// Status broadcasts are best-effort; a lost one only degrades the
    /// observer's progress view.
    fn publish_status(&self, code: u8) {
        if let Err(err) = self.publisher.publish_status(code) {
            warn!("status publish ({code}) failed: {err}");
        }
    }

    fn fail(&self, state: SessionState) {
        self.set_state(state);
        self.decoder_stop.signal_stop();
        self.done.store(true, Ordering::SeqCst);
    }

    fn set_state(&self, state: SessionState) {
        *self.state.lock().unwrap() = state;
    }
}
