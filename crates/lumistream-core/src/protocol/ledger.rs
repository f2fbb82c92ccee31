//! Ack ledger and flow control
//!
//! Tracks commands that have been written to the controller but not yet
//! acknowledged, and answers whether the controller's receive buffer has room
//! for more. Iteration order is insertion order, which equals send order; both
//! the capacity walk and resend replay depend on that ordering, so the ledger
//! is an explicit ordered structure rather than a hash map.

use tracing::warn;

use super::commands::Command;

/// One outstanding command
#[derive(Debug, Clone)]
struct LedgerEntry {
    /// Line number the command was sent under
    line: u64,
    /// The original command, kept for error annotation and resend replay
    command: Command,
    /// Byte length of the frame as written, newline included
    framed_len: usize,
}

/// Ordered record of sent-but-unacknowledged commands
#[derive(Debug)]
pub struct AckLedger {
    entries: Vec<LedgerEntry>,
    /// Controller receive buffer capacity in bytes
    capacity: usize,
}

impl AckLedger {
    /// Create an empty ledger accounting against the given buffer capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity,
        }
    }

    /// Record a command as outstanding under `line`
    ///
    /// Line numbers come from the session's monotonic counter, so entries are
    /// unique and non-decreasing by construction.
    pub fn record(&mut self, line: u64, command: Command, framed_len: usize) {
        debug_assert!(
            self.entries.iter().all(|e| e.line != line),
            "duplicate ledger line {line}"
        );
        self.entries.push(LedgerEntry {
            line,
            command,
            framed_len,
        });
    }

    /// Bytes of controller buffer not yet consumed by outstanding commands
    ///
    /// A pending line-number reset short-circuits to zero: its effect on
    /// downstream numbering cannot be overlapped with other in-flight
    /// commands, so nothing more may be sent until it is acknowledged.
    pub fn capacity_remaining(&self) -> usize {
        let mut used = 0usize;
        for entry in &self.entries {
            if entry.command.mnemonic.is_line_reset() {
                return 0;
            }
            used += entry.framed_len;
            if used >= self.capacity {
                return 0;
            }
        }
        self.capacity - used
    }

    /// Check whether another command may be sent at all
    pub fn is_ready(&self) -> bool {
        self.capacity_remaining() > 0
            && !self.entries.iter().any(|e| e.command.mnemonic.is_line_reset())
    }

    /// Acknowledge `line`, returning the completed command
    ///
    /// An ack for a line that is not outstanding is a protocol anomaly but not
    /// a fault: it is logged and the session proceeds. Whether it should
    /// instead force a line-number resync is a product-level call; today we
    /// warn and continue.
    pub fn ack(&mut self, line: u64) -> Option<Command> {
        match self.entries.iter().position(|e| e.line == line) {
            Some(idx) => Some(self.entries.remove(idx).command),
            None => {
                warn!(line, "ack for unknown line, possible desynchronization");
                None
            }
        }
    }

    /// Look up the outstanding command for `line`
    pub fn get(&self, line: u64) -> Option<&Command> {
        self.entries.iter().find(|e| e.line == line).map(|e| &e.command)
    }

    /// Check whether `line` is outstanding
    pub fn contains(&self, line: u64) -> bool {
        self.entries.iter().any(|e| e.line == line)
    }

    /// Drop all entries, logging which line numbers were abandoned
    ///
    /// Lossy; used only when resynchronizing after the controller reports
    /// itself idle or an unrecoverable line-level condition.
    pub fn clear(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        let abandoned: Vec<u64> = self.entries.iter().map(|e| e.line).collect();
        warn!(?abandoned, "clearing ledger, abandoning unacknowledged lines");
        self.entries.clear();
    }

    /// Remove and return every outstanding command in send order
    ///
    /// Used to snapshot the ledger for resend replay; the entries are about to
    /// be resubmitted, so nothing is logged as abandoned.
    pub fn drain(&mut self) -> Vec<(u64, Command)> {
        self.entries
            .drain(..)
            .map(|e| (e.line, e.command))
            .collect()
    }

    /// Number of outstanding commands
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether nothing is outstanding
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::commands::Mnemonic;
    use pretty_assertions::assert_eq;

    fn cmd(mnemonic: Mnemonic) -> Command {
        Command::new(mnemonic, "Q0")
    }

    #[test]
    fn test_capacity_decreases_by_framed_len() {
        let mut ledger = AckLedger::new(1024);
        assert_eq!(ledger.capacity_remaining(), 1024);
        ledger.record(1, cmd(Mnemonic::PixelsRgb), 100);
        assert_eq!(ledger.capacity_remaining(), 924);
        ledger.record(2, cmd(Mnemonic::ShowFrame), 24);
        assert_eq!(ledger.capacity_remaining(), 900);
    }

    #[test]
    fn test_capacity_saturates_at_zero() {
        let mut ledger = AckLedger::new(64);
        ledger.record(1, cmd(Mnemonic::PixelsRgb), 60);
        ledger.record(2, cmd(Mnemonic::PixelsRgb), 60);
        assert_eq!(ledger.capacity_remaining(), 0);
        assert!(!ledger.is_ready());
    }

    #[test]
    fn test_ack_restores_capacity() {
        let mut ledger = AckLedger::new(1024);
        ledger.record(1, cmd(Mnemonic::PixelsRgb), 100);
        ledger.record(2, cmd(Mnemonic::ShowFrame), 24);
        let done = ledger.ack(1).expect("line 1 outstanding");
        assert_eq!(done.mnemonic, Mnemonic::PixelsRgb);
        assert_eq!(ledger.capacity_remaining(), 1000);
    }

    #[test]
    fn test_unknown_ack_warns_not_crashes() {
        let mut ledger = AckLedger::new(1024);
        ledger.record(1, cmd(Mnemonic::PixelsRgb), 100);
        assert!(ledger.ack(99).is_none());
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_line_reset_blocks_all_capacity() {
        let mut ledger = AckLedger::new(1024);
        ledger.record(5, Command::new(Mnemonic::SetLineNumber, "N0"), 16);
        assert_eq!(ledger.capacity_remaining(), 0);
        assert!(!ledger.is_ready());

        // blocked even if it is not the first entry
        let mut ledger = AckLedger::new(1024);
        ledger.record(5, cmd(Mnemonic::PixelsRgb), 100);
        ledger.record(6, Command::new(Mnemonic::SetLineNumber, "N0"), 16);
        assert_eq!(ledger.capacity_remaining(), 0);

        // acking the reset entry unblocks
        ledger.ack(6);
        assert!(ledger.capacity_remaining() > 0);
        assert!(ledger.is_ready());
    }

    #[test]
    fn test_clear_empties() {
        let mut ledger = AckLedger::new(1024);
        ledger.record(1, cmd(Mnemonic::PixelsRgb), 100);
        ledger.record(2, Command::new(Mnemonic::SetLineNumber, "N0"), 16);
        ledger.clear();
        assert!(ledger.is_empty());
        assert_eq!(ledger.capacity_remaining(), 1024);
    }

    #[test]
    fn test_drain_preserves_send_order() {
        let mut ledger = AckLedger::new(1024);
        ledger.record(5, Command::new(Mnemonic::PixelsRgb, "Q0 Va"), 20);
        ledger.record(6, Command::new(Mnemonic::PixelsRgb, "Q1 Vb"), 20);
        ledger.record(7, Command::new(Mnemonic::ShowFrame, ""), 12);
        let drained = ledger.drain();
        assert!(ledger.is_empty());
        let lines: Vec<u64> = drained.iter().map(|(l, _)| *l).collect();
        assert_eq!(lines, vec![5, 6, 7]);
    }
}
