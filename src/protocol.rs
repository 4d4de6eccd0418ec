//! ADB host-protocol wire constants: length-prefixed ASCII framing and the
//! four-letter status tags used by both the host protocol and the sync
//! sub-protocol.

/// `OKAY` — request succeeded, a value or nothing follows.
pub const OKAY: &[u8; 4] = b"OKAY";
/// `FAIL` — request failed, a length-prefixed reason follows.
pub const FAIL: &[u8; 4] = b"FAIL";
/// `STAT` — sync stat reply.
pub const STAT: &[u8; 4] = b"STAT";
/// `LIST` — sync list request.
pub const LIST: &[u8; 4] = b"LIST";
/// `DENT` — sync directory entry.
pub const DENT: &[u8; 4] = b"DENT";
/// `RECV` — sync pull request.
pub const RECV: &[u8; 4] = b"RECV";
/// `DATA` — sync chunk.
pub const DATA: &[u8; 4] = b"DATA";
/// `DONE` — sync terminator.
pub const DONE: &[u8; 4] = b"DONE";
/// `SEND` — sync push request.
pub const SEND: &[u8; 4] = b"SEND";
/// `QUIT` — unused by this implementation, kept for completeness.
pub const QUIT: &[u8; 4] = b"QUIT";

/// Decode a 4-digit upper-case hex length prefix.
pub fn decode_length(length: &str) -> Result<usize, std::num::ParseIntError> {
    usize::from_str_radix(length, 16)
}

/// Encode a length as a 4-digit, zero-padded, upper-case hex string.
///
/// Values above `0xFFFF` still format (more than 4 hex digits), which is how
/// this implementation chooses to handle the out-of-range case named in
/// spec.md §8 — callers that need the 4-digit wire guarantee rely on
/// `Parser::read_value`/`Connection::write` only ever seeing payloads that
/// fit in 4 hex digits, which holds for every request this crate sends.
pub fn encode_length(length: usize) -> String {
    format!("{length:04X}")
}

/// Prefix `data` with its encoded length, for protocols that frame a whole
/// value rather than a command string (sync `SEND`/`RECV` error payloads).
pub fn encode_data(data: &[u8]) -> Vec<u8> {
    let mut out = encode_length(data.len()).into_bytes();
    out.extend_from_slice(data);
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn length_roundtrip() {
        for n in [0usize, 1, 15, 16, 255, 256, 4095, 4096, 0xFFFF] {
            let encoded = encode_length(n);
            assert_eq!(encoded.len(), 4);
            assert_eq!(decode_length(&encoded).unwrap(), n);
        }
    }

    #[test]
    fn encode_data_prefixes_length() {
        let out = encode_data(b"hello");
        assert_eq!(&out[..4], b"0005");
        assert_eq!(&out[4..], b"hello");
    }
}
