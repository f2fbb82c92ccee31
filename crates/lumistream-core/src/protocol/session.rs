//! Session state machine
//!
//! Owns one transport, the line counter, and the ack ledger, and turns
//! high-level commands into framed, checksummed, flow-controlled traffic.
//!
//! The model is single-threaded blocking-with-polling: there is no reader
//! thread, and the transport is only read inside [`Session::submit_sync`],
//! [`Session::set_linenum`], and [`Session::reset_board`]. A controller that
//! never acknowledges stalls the caller visibly; desynchronizing the line
//! numbers and silently corrupting the displayed frame would be worse.

use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

use super::commands::{Command, Mnemonic};
use super::frame;
use super::ledger::AckLedger;
use super::response::{classify, Response, Telemetry};
use super::transport::Transport;
use super::{
    ProtocolError, BENIGN_ERROR_CODES, DEFAULT_BUFFER_CAPACITY, DEFAULT_CHUNK_SIZE,
    DEFAULT_TIMEOUT_MS, OFFSET_KEY, PAYLOAD_KEY,
};

/// Hold time for each half of a DTR/RTS reset pulse
const RESET_PULSE_MS: u64 = 100;

/// Base64 group size: four payload characters per packed pixel
const PAYLOAD_CHARS_PER_GROUP: usize = 4;

/// Channel bytes carried by one base64 group
const CHANNELS_PER_GROUP: usize = 3;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Bound to a transport, controller not yet reset
    Disconnected,
    /// Board reset sequence in progress
    Resetting,
    /// Streaming normally
    Ready,
    /// Waiting for ledger capacity or an in-flight line-number reset
    Draining,
    /// Terminated by a fatal fault or by the caller
    Closed,
}

/// Session configuration
///
/// Passed at construction; there is no global protocol state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Controller receive buffer capacity in bytes
    pub buffer_capacity: usize,
    /// Maximum framed length of one payload chunk
    pub chunk_size: usize,
    /// Append XOR checksums to outgoing frames
    pub checksums: bool,
    /// Device error codes that are logged but never fatal
    pub benign_codes: Vec<u16>,
    /// Transport read timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            chunk_size: DEFAULT_CHUNK_SIZE,
            checksums: true,
            benign_codes: BENIGN_ERROR_CODES.to_vec(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// One protocol session with one panel controller
pub struct Session {
    /// The underlying byte stream
    transport: Box<dyn Transport>,
    /// Current lifecycle state
    state: SessionState,
    /// Next line number to send; wraps only via [`Session::set_linenum`]
    linenum: u64,
    /// Sent-but-unacknowledged commands
    ledger: AckLedger,
    /// Protocol configuration
    config: SessionConfig,
}

impl Session {
    /// Bind a session to an open transport
    pub fn new(
        mut transport: Box<dyn Transport>,
        config: SessionConfig,
    ) -> Result<Self, ProtocolError> {
        transport.set_timeout(Duration::from_millis(config.timeout_ms))?;
        Ok(Self {
            transport,
            state: SessionState::Disconnected,
            linenum: 0,
            ledger: AckLedger::new(config.buffer_capacity),
            config,
        })
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Next line number that will be assigned
    pub fn line_number(&self) -> u64 {
        self.linenum
    }

    /// Number of commands awaiting acknowledgement
    pub fn pending(&self) -> usize {
        self.ledger.len()
    }

    /// Terminate the session; further submissions error
    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }

    fn ensure_open(&self) -> Result<(), ProtocolError> {
        if self.state == SessionState::Closed {
            return Err(ProtocolError::Closed);
        }
        Ok(())
    }

    /// Submit a command under the current line number and track it for
    /// acknowledgement
    ///
    /// Drains any buffered responses, waits (draining, blocking on the
    /// transport) until the controller buffer has room for the frame, records
    /// the command in the ledger, writes the frame, and increments the line
    /// counter. Returns the line number used. The call returns once the frame
    /// is written, not once it is acknowledged.
    pub fn submit_sync(&mut self, mnemonic: Mnemonic, args: &str) -> Result<u64, ProtocolError> {
        self.ensure_open()?;
        self.drain_available()?;
        loop {
            // Recomputed each pass: a resend handled while draining renumbers
            // the counter, which can change the frame's length.
            let framed = frame::format_frame(
                Some(self.linenum),
                mnemonic.code(),
                args,
                self.config.checksums,
            );
            let framed_len = framed.len() + 1;
            if self.ledger.capacity_remaining() >= framed_len {
                if self.state == SessionState::Draining {
                    self.state = SessionState::Ready;
                }
                let line = self.linenum;
                self.ledger.record(line, Command::new(mnemonic, args), framed_len);
                self.write_line(&framed)?;
                self.linenum += 1;
                return Ok(line);
            }
            self.state = SessionState::Draining;
            self.drain_blocking()?;
        }
    }

    /// Submit a command without a line number, fire-and-forget
    ///
    /// Same drain and capacity behavior as [`Session::submit_sync`], but the
    /// frame is not tracked. Only used for verbs the controller does not
    /// acknowledge.
    pub fn submit_async(&mut self, mnemonic: Mnemonic, args: &str) -> Result<(), ProtocolError> {
        self.ensure_open()?;
        self.drain_available()?;
        let framed = frame::format_frame(None, mnemonic.code(), args, self.config.checksums);
        let framed_len = framed.len() + 1;
        while self.ledger.capacity_remaining() < framed_len {
            self.state = SessionState::Draining;
            self.drain_blocking()?;
        }
        if self.state == SessionState::Draining {
            self.state = SessionState::Ready;
        }
        self.write_line(&framed)
    }

    /// Split a packed payload across as many frames as it needs
    ///
    /// Each chunk is sized so the skeleton, the payload characters, and the
    /// newline fit in `chunk_size` bytes, cut at base64 group boundaries so
    /// every chunk decodes to whole pixels. Chunks after the first carry an
    /// `S<offset>` channel offset. Fails without sending anything further if
    /// the skeleton leaves no room for even one group; that is a
    /// configuration problem, not a runtime condition.
    pub fn chunk_and_submit(
        &mut self,
        mnemonic: Mnemonic,
        fixed_args: &str,
        payload: &str,
    ) -> Result<(), ProtocolError> {
        self.ensure_open()?;
        let mut offset = 0usize;
        let mut rest = payload;
        while !rest.is_empty() {
            let mut args = String::from(fixed_args);
            if offset > 0 {
                if !args.is_empty() {
                    args.push(' ');
                }
                args.push(OFFSET_KEY);
                args.push_str(&offset.to_string());
            }
            if !args.is_empty() {
                args.push(' ');
            }
            args.push(PAYLOAD_KEY);

            let skeleton =
                frame::format_frame(Some(self.linenum), mnemonic.code(), &args, false);
            let avail = self.config.chunk_size.saturating_sub(skeleton.len() + 1);
            let groups = avail / PAYLOAD_CHARS_PER_GROUP;
            if groups == 0 {
                return Err(ProtocolError::ChunkTooSmall {
                    chunk_size: self.config.chunk_size,
                    skeleton_len: skeleton.len(),
                });
            }

            let take = (groups * PAYLOAD_CHARS_PER_GROUP).min(rest.len());
            let (chunk, remainder) = rest.split_at(take);
            args.push_str(chunk);
            self.submit_sync(mnemonic, &args)?;

            offset += take / PAYLOAD_CHARS_PER_GROUP * CHANNELS_PER_GROUP;
            rest = remainder;
        }
        Ok(())
    }

    /// Reset the controller and resynchronize line numbering from zero
    ///
    /// Sends the soft reset, pulses DTR and RTS twice the way the stock
    /// controllers expect, discards boot chatter between pulses, then runs
    /// [`Session::set_linenum`] to zero.
    pub fn reset_board(&mut self) -> Result<(), ProtocolError> {
        self.ensure_open()?;
        self.state = SessionState::Resetting;
        info!("resetting controller");
        self.submit_async(Mnemonic::SoftReset, "")?;
        for _ in 0..2 {
            self.transport.set_dtr(false)?;
            self.transport.set_rts(false)?;
            thread::sleep(Duration::from_millis(RESET_PULSE_MS));
            self.discard_chatter()?;
            self.transport.set_dtr(true)?;
            self.transport.set_rts(true)?;
            thread::sleep(Duration::from_millis(RESET_PULSE_MS));
            self.discard_chatter()?;
        }
        // A partial boot line with no terminator would otherwise prepend to
        // the first real response.
        self.transport.clear_input_buffer()?;
        self.set_linenum(0)
    }

    /// Reset the controller's expected line number and the local counter
    ///
    /// Submits the line-number reset, moves the local counter to `n + 1`, and
    /// blocks until the ledger is empty: the reset entry pins capacity at
    /// zero until the controller acknowledges it, so nothing can overlap it.
    pub fn set_linenum(&mut self, n: u64) -> Result<(), ProtocolError> {
        self.submit_sync(Mnemonic::SetLineNumber, &format!("N{n}"))?;
        self.linenum = n + 1;
        while !self.ledger.is_empty() {
            self.state = SessionState::Draining;
            self.drain_blocking()?;
        }
        self.state = SessionState::Ready;
        Ok(())
    }

    /// Read and discard whatever the controller printed while booting
    ///
    /// Bootloader noise is not protocol output; classifying it would fault
    /// the session on garbage.
    fn discard_chatter(&mut self) -> Result<(), ProtocolError> {
        while self.transport.bytes_to_read()? > 0 {
            match self.transport.read_line()? {
                Some(line) => debug!(line = line.trim_end(), "boot chatter"),
                None => break,
            }
        }
        Ok(())
    }

    fn write_line(&mut self, framed: &str) -> Result<(), ProtocolError> {
        trace!(frame = framed, "tx");
        let mut bytes = framed.as_bytes().to_vec();
        if !framed.ends_with('\n') {
            bytes.push(b'\n');
        }
        self.transport.write_all(&bytes)?;
        Ok(())
    }

    /// Drain responses that are already buffered, without blocking
    fn drain_available(&mut self) -> Result<(), ProtocolError> {
        self.drain(false)
    }

    /// Drain responses, blocking on the first read up to the transport timeout
    fn drain_blocking(&mut self) -> Result<(), ProtocolError> {
        self.drain(true)
    }

    /// One read cycle: consume every currently buffered line
    ///
    /// Counts idle markers across the whole cycle; an idle report with no
    /// state-changing response in the same cycle means the controller
    /// considers itself caught up, so any locally tracked outstanding
    /// commands are stale and the ledger is cleared.
    fn drain(&mut self, block: bool) -> Result<(), ProtocolError> {
        let mut idles = 0u32;
        let mut state_changing = false;
        let mut block_next = block;
        loop {
            if !block_next && self.transport.bytes_to_read()? == 0 {
                break;
            }
            block_next = false;
            let Some(line) = self.transport.read_line()? else {
                break;
            };
            self.dispatch(&line, &mut idles, &mut state_changing)?;
        }
        if idles > 0 && !state_changing {
            self.ledger.clear();
        }
        Ok(())
    }

    fn dispatch(
        &mut self,
        line: &str,
        idles: &mut u32,
        state_changing: &mut bool,
    ) -> Result<(), ProtocolError> {
        match classify(line) {
            Response::Ack { line } => {
                *state_changing = true;
                if self.ledger.ack(line).is_some() {
                    trace!(line, "ack");
                }
            }
            Response::LineError {
                line,
                code,
                message,
            } => {
                *state_changing = true;
                self.handle_error(code, &message, Some(line))?;
            }
            Response::BareError { code, message } => {
                *state_changing = true;
                self.handle_error(code, &message, None)?;
            }
            Response::Resend { line } => {
                *state_changing = true;
                self.handle_resend(line)?;
            }
            Response::Idle => *idles += 1,
            Response::Telemetry(telemetry) => log_telemetry(&telemetry),
            Response::Unrecognized { raw } => warn!(%raw, "unrecognized controller line"),
        }
        Ok(())
    }

    /// React to a device-reported error
    ///
    /// Benign codes are logged and swallowed; anything else closes the
    /// session, because streaming on with desynchronized line numbers would
    /// silently corrupt the displayed output.
    fn handle_error(
        &mut self,
        code: u16,
        message: &str,
        line: Option<u64>,
    ) -> Result<(), ProtocolError> {
        let command = line
            .and_then(|l| self.ledger.get(l))
            .map(|c| c.to_string())
            .unwrap_or_else(|| String::from("<unknown>"));
        error!(
            code,
            ?line,
            %command,
            "controller reported E{}: {}",
            code,
            message
        );
        if self.config.benign_codes.contains(&code) {
            return Ok(());
        }
        self.state = SessionState::Closed;
        Err(ProtocolError::DeviceFault {
            code,
            message: message.to_string(),
            command,
        })
    }

    /// Replay the outstanding tail after a resend request
    ///
    /// A resend for a line the ledger no longer tracks is logged and ignored;
    /// the controller may be asking for something already superseded.
    /// Otherwise every outstanding command is resubmitted in its original
    /// relative order, renumbered from the requested line.
    fn handle_resend(&mut self, line: u64) -> Result<(), ProtocolError> {
        if !self.ledger.contains(line) {
            error!(line, "resend requested for a line no longer tracked");
            return Ok(());
        }
        let snapshot = self.ledger.drain();
        warn!(
            from = line,
            count = snapshot.len(),
            "controller requested resend, replaying outstanding commands"
        );
        self.linenum = line;
        for (_, command) in snapshot {
            self.submit_sync(command.mnemonic, &command.args)?;
        }
        Ok(())
    }
}

fn log_telemetry(telemetry: &Telemetry) {
    match telemetry {
        Telemetry::LoopRate { fps, queue } => debug!(?fps, ?queue, "controller loop rate"),
        Telemetry::LoopTiming { phases } => trace!(?phases, "controller loop timing"),
        Telemetry::GetCounters { fields } => trace!(?fields, "controller fetch counters"),
        Telemetry::ProcessCounters { fields } => {
            trace!(?fields, "controller process counters")
        }
        Telemetry::SetEcho { raw } => debug!(setting = %raw, "controller setting echo"),
        Telemetry::Other { raw } => trace!(%raw, "controller telemetry"),
    }
}
