//! Frame encoding
//!
//! Builds the ASCII command lines sent to a panel controller.
//!
//! Frame format:
//! ```text
//! [ "N" <line> " " ] <mnemonic> [ " " <args> ] [ " " "*" <xor-checksum> ] "\n"
//! ```
//! The checksum is the running XOR of every character code in the frame up to
//! and including the trailing space, appended in decimal after a `*`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

/// XOR checksum of an ASCII command string
///
/// Every character in a frame maps to exactly one byte on the wire, so the
/// character-code XOR is a plain byte fold.
pub fn checksum(text: &str) -> u8 {
    text.bytes().fold(0u8, |acc, b| acc ^ b)
}

/// Append the checksum suffix to a formatted command
///
/// A trailing space is part of the checksummed text, matching what the
/// controller firmware recomputes on receipt.
pub fn add_checksum(mut cmd: String) -> String {
    cmd.push(' ');
    let sum = checksum(&cmd);
    cmd.push('*');
    cmd.push_str(&sum.to_string());
    cmd
}

/// Format a command line from its parts
///
/// Pieces that are absent are simply omitted; the joined result never
/// contains double spaces.
pub fn format_frame(linenum: Option<u64>, mnemonic: &str, args: &str, with_checksum: bool) -> String {
    let mut cmd = String::new();
    if let Some(n) = linenum {
        cmd.push('N');
        cmd.push_str(&n.to_string());
        cmd.push(' ');
    }
    cmd.push_str(mnemonic);
    if !args.is_empty() {
        cmd.push(' ');
        cmd.push_str(args);
    }
    if with_checksum {
        cmd = add_checksum(cmd);
    }
    cmd
}

/// Pack channel values into the textual payload format
///
/// Each value is folded modulo 256 into one byte (Euclidean, so negative
/// inputs wrap the way the panel generators expect) and the byte string is
/// base64 encoded. Total for any input; out-of-range values fold, they do
/// not error.
pub fn pack_channels(channels: &[i64]) -> String {
    let bytes: Vec<u8> = channels.iter().map(|&c| c.rem_euclid(256) as u8).collect();
    BASE64.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_checksum_matches_manual_xor() {
        let text = "N0 M110 N0 ";
        let expected = text.bytes().fold(0u8, |a, b| a ^ b);
        assert_eq!(checksum(text), expected);
    }

    #[test]
    fn test_frame_with_linenum_and_args() {
        let frame = format_frame(Some(0), "M110", "N0", false);
        assert_eq!(frame, "N0 M110 N0");
    }

    #[test]
    fn test_frame_without_linenum() {
        let frame = format_frame(None, "M9999", "", false);
        assert_eq!(frame, "M9999");
    }

    #[test]
    fn test_frame_without_args_has_no_double_space() {
        let frame = format_frame(Some(7), "M2610", "", false);
        assert_eq!(frame, "N7 M2610");
    }

    #[test]
    fn test_checksum_suffix_reparses() {
        let frame = format_frame(Some(3), "M2610", "", true);
        let (body, suffix) = frame.split_once('*').expect("checksum suffix present");
        let sum: u8 = suffix.parse().expect("decimal checksum");
        assert_eq!(checksum(body), sum);
        assert!(body.ends_with(' '));
    }

    #[test]
    fn test_pack_folds_modulo_256() {
        let packed = pack_channels(&[0, 255, 256, 257, -1]);
        let decoded = BASE64.decode(packed).expect("valid base64");
        assert_eq!(decoded, vec![0, 255, 0, 1, 255]);
    }

    #[test]
    fn test_pack_roundtrip() {
        let values: Vec<i64> = (0..300).map(|v| v * 7 - 100).collect();
        let packed = pack_channels(&values);
        let decoded = BASE64.decode(packed).expect("valid base64");
        let expected: Vec<u8> = values.iter().map(|v| v.rem_euclid(256) as u8).collect();
        assert_eq!(decoded, expected);
    }

    #[test]
    fn test_pack_empty() {
        assert_eq!(pack_channels(&[]), "");
    }
}
