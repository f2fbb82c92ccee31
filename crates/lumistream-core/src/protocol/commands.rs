//! Protocol commands
//!
//! Defines the command verbs understood by the panel controller firmware.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Command verbs for panel controller communication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mnemonic {
    /// Set a run of RGB pixels on a panel ('M2600')
    PixelsRgb,

    /// Set a run of HSV pixels on a panel ('M2601')
    PixelsHsv,

    /// Fill an entire panel with one RGB value ('M2602')
    FillRgb,

    /// Fill an entire panel with one HSV value ('M2603')
    FillHsv,

    /// Commit the staged frame to the LEDs ('M2610')
    ShowFrame,

    /// Reset the controller's expected line number ('M110')
    SetLineNumber,

    /// Soft-reset the controller ('M9999')
    SoftReset,
}

impl Mnemonic {
    /// Get the wire code for this verb
    pub fn code(&self) -> &'static str {
        match self {
            Mnemonic::PixelsRgb => "M2600",
            Mnemonic::PixelsHsv => "M2601",
            Mnemonic::FillRgb => "M2602",
            Mnemonic::FillHsv => "M2603",
            Mnemonic::ShowFrame => "M2610",
            Mnemonic::SetLineNumber => "M110",
            Mnemonic::SoftReset => "M9999",
        }
    }

    /// Check if this verb is acknowledged by the controller
    ///
    /// The soft reset is fire-and-forget; everything else is sent with a line
    /// number and tracked until acked.
    pub fn expects_ack(&self) -> bool {
        !matches!(self, Mnemonic::SoftReset)
    }

    /// Check if this verb resets the controller's line counter
    ///
    /// A pending line-number reset blocks all further sends until it is
    /// acknowledged; its effect on downstream numbering cannot be overlapped
    /// with other in-flight commands.
    pub fn is_line_reset(&self) -> bool {
        matches!(self, Mnemonic::SetLineNumber)
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One submitted command: verb plus argument text
///
/// Immutable once created; owned by the ack ledger while outstanding and
/// discarded on acknowledgement or ledger clear.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Protocol verb
    pub mnemonic: Mnemonic,
    /// Argument text (key/value tokens, may embed a payload fragment)
    pub args: String,
}

impl Command {
    /// Create a new command record
    pub fn new(mnemonic: Mnemonic, args: impl Into<String>) -> Self {
        Self {
            mnemonic,
            args: args.into(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.is_empty() {
            f.write_str(self.mnemonic.code())
        } else {
            write!(f, "{} {}", self.mnemonic.code(), self.args)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_codes() {
        assert_eq!(Mnemonic::PixelsRgb.code(), "M2600");
        assert_eq!(Mnemonic::ShowFrame.code(), "M2610");
        assert_eq!(Mnemonic::SetLineNumber.code(), "M110");
    }

    #[test]
    fn test_ack_expectations() {
        assert!(Mnemonic::PixelsRgb.expects_ack());
        assert!(Mnemonic::SetLineNumber.expects_ack());
        assert!(!Mnemonic::SoftReset.expects_ack());
    }

    #[test]
    fn test_only_m110_resets_line_counter() {
        assert!(Mnemonic::SetLineNumber.is_line_reset());
        assert!(!Mnemonic::SoftReset.is_line_reset());
        assert!(!Mnemonic::ShowFrame.is_line_reset());
    }

    #[test]
    fn test_command_display() {
        let cmd = Command::new(Mnemonic::PixelsRgb, "Q0 Vabc=");
        assert_eq!(cmd.to_string(), "M2600 Q0 Vabc=");
        let bare = Command::new(Mnemonic::ShowFrame, "");
        assert_eq!(bare.to_string(), "M2610");
    }
}
