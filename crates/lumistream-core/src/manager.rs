//! Session management
//!
//! Owns one [`Session`] per physical controller, keyed by logical server id.
//! Installations address panels as (server id, panel index); the manager is
//! only the container, all protocol work happens in the sessions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{error, info};

use crate::protocol::{
    open_port, ProtocolError, SerialTransport, Session, SessionConfig, DEFAULT_BAUD_RATE,
    DEFAULT_TIMEOUT_MS,
};

/// Where to find one controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSpec {
    /// Serial device path (e.g., "/dev/ttyACM0")
    pub device: String,
    /// Baud rate
    pub baud: u32,
    /// Read timeout in milliseconds
    pub timeout_ms: u64,
}

impl ServerSpec {
    /// Spec for a device at the default baud rate and timeout
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            baud: DEFAULT_BAUD_RATE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// A collection of sessions keyed by logical server id
pub struct SessionManager {
    sessions: BTreeMap<u32, Session>,
}

impl SessionManager {
    /// Open and reset a session for every reachable server
    ///
    /// Servers whose port cannot be opened or whose controller fails its
    /// reset are skipped with a logged error; the rest of the installation
    /// keeps running.
    pub fn connect(servers: &BTreeMap<u32, ServerSpec>, config: &SessionConfig) -> Self {
        let mut sessions = BTreeMap::new();
        for (&server_id, spec) in servers {
            match Self::open_session(spec, config) {
                Ok(session) => {
                    info!(server_id, device = %spec.device, "controller session ready");
                    sessions.insert(server_id, session);
                }
                Err(e) => {
                    error!(server_id, device = %spec.device, "skipping controller: {e}");
                }
            }
        }
        Self { sessions }
    }

    fn open_session(spec: &ServerSpec, config: &SessionConfig) -> Result<Session, ProtocolError> {
        let port = open_port(
            &spec.device,
            spec.baud,
            Duration::from_millis(spec.timeout_ms),
        )?;
        let mut session = Session::new(
            Box::new(SerialTransport::new(port)),
            SessionConfig {
                timeout_ms: spec.timeout_ms,
                ..config.clone()
            },
        )?;
        session.reset_board()?;
        Ok(session)
    }

    /// Get the session for a server id
    pub fn session(&mut self, server_id: u32) -> Option<&mut Session> {
        self.sessions.get_mut(&server_id)
    }

    /// Server ids with a live session, in order
    pub fn server_ids(&self) -> Vec<u32> {
        self.sessions.keys().copied().collect()
    }

    /// Iterate over all live sessions
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&u32, &mut Session)> {
        self.sessions.iter_mut()
    }

    /// Drop the session for a server id, closing it
    pub fn remove(&mut self, server_id: u32) -> Option<Session> {
        self.sessions.remove(&server_id)
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check whether any session is live
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_spec_defaults() {
        let spec = ServerSpec::new("/dev/ttyACM0");
        assert_eq!(spec.baud, DEFAULT_BAUD_RATE);
        assert_eq!(spec.timeout_ms, DEFAULT_TIMEOUT_MS);
    }

    #[test]
    fn test_connect_skips_unreachable_servers() {
        let mut servers = BTreeMap::new();
        servers.insert(0, ServerSpec::new("/dev/does-not-exist-0"));
        servers.insert(1, ServerSpec::new("/dev/does-not-exist-1"));
        let manager = SessionManager::connect(&servers, &SessionConfig::default());
        assert!(manager.is_empty());
    }
}
