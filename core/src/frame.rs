//! Credential frame layout:
//!
//! `[ssid_len:1][ssid][pwd_len:1][password][..padding..][channel:2]`
//!
//! The channel id always occupies the last two bytes of the payload
//! (little-endian), independent of the ssid/password fields. The payload is
//! over-provisioned on the transmit side, so arbitrary padding may sit
//! between the password and the channel trailer.

use crate::error::{ProvisionError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialFrame {
    pub ssid: String,
    pub password: String,
    pub channel: u16,
}

impl CredentialFrame {
    /// Parse a decoded payload. Every slice is bounds-checked: a short
    /// payload is a `TruncatedFrame` error, never a panic.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let truncated = |needed: usize| ProvisionError::TruncatedFrame {
            needed,
            have: payload.len(),
        };

        let ssid_len = *payload.first().ok_or_else(|| truncated(1))? as usize;
        let ssid_end = 1 + ssid_len;
        let pwd_len = *payload.get(ssid_end).ok_or_else(|| truncated(ssid_end + 1))? as usize;
        let pwd_start = ssid_end + 1;
        let pwd_end = pwd_start + pwd_len;

        // The channel trailer must fit after the password, padding or not.
        if payload.len() < pwd_end + 2 {
            return Err(truncated(pwd_end + 2));
        }

        let ssid = std::str::from_utf8(&payload[1..ssid_end])?.to_owned();
        let password = std::str::from_utf8(&payload[pwd_start..pwd_end])?.to_owned();

        // Channel comes from the last two bytes of the whole payload, not
        // from the bytes adjacent to the password.
        let channel = u16::from_le_bytes([payload[payload.len() - 2], payload[payload.len() - 1]]);

        Ok(Self {
            ssid,
            password,
            channel,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(ssid: &str, password: &str, padding: usize, channel: u16) -> Vec<u8> {
        let mut payload = vec![ssid.len() as u8];
        payload.extend_from_slice(ssid.as_bytes());
        payload.push(password.len() as u8);
        payload.extend_from_slice(password.as_bytes());
        payload.extend(std::iter::repeat(0u8).take(padding));
        payload.extend_from_slice(&channel.to_le_bytes());
        payload
    }

    #[test]
    fn test_parse_reference_payload() {
        let payload = [3, b'A', b'B', b'C', 4, b'p', b'a', b's', b's', 0x01, 0x00];
        let frame = CredentialFrame::parse(&payload).unwrap();
        assert_eq!(frame.ssid, "ABC");
        assert_eq!(frame.password, "pass");
        assert_eq!(frame.channel, 1);
    }

    #[test]
    fn test_channel_read_from_trailer_regardless_of_padding() {
        for padding in [0, 1, 7, 32] {
            let payload = encode("home-net", "hunter2", padding, 0xBEEF);
            let frame = CredentialFrame::parse(&payload).unwrap();
            assert_eq!(frame.ssid, "home-net");
            assert_eq!(frame.password, "hunter2");
            assert_eq!(frame.channel, 0xBEEF);
        }
    }

    #[test]
    fn test_channel_is_little_endian() {
        let payload = encode("x", "y", 4, 0x0102);
        let frame = CredentialFrame::parse(&payload).unwrap();
        assert_eq!(frame.channel, 0x0102);
        assert_eq!(payload[payload.len() - 2], 0x02);
        assert_eq!(payload[payload.len() - 1], 0x01);
    }

    #[test]
    fn test_empty_payload_is_truncated() {
        match CredentialFrame::parse(&[]) {
            Err(ProvisionError::TruncatedFrame { needed: 1, have: 0 }) => {}
            other => panic!("expected TruncatedFrame, got {other:?}"),
        }
    }

    #[test]
    fn test_short_payloads_never_index_out_of_bounds() {
        let full = encode("ABC", "pass", 0, 1);
        // Every prefix shorter than the minimum length must fail cleanly.
        for cut in 0..full.len() - 1 {
            match CredentialFrame::parse(&full[..cut]) {
                Err(ProvisionError::TruncatedFrame { .. }) => {}
                other => panic!("prefix of {cut} bytes: expected TruncatedFrame, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_ssid_length_past_end_is_truncated() {
        // ssid_len claims 200 bytes but only a handful follow
        let payload = [200u8, b'a', b'b', 0, 0, 0];
        assert!(matches!(
            CredentialFrame::parse(&payload),
            Err(ProvisionError::TruncatedFrame { .. })
        ));
    }

    #[test]
    fn test_invalid_utf8_in_ssid() {
        let mut payload = encode("aa", "pw", 0, 5);
        payload[1] = 0xFF;
        payload[2] = 0xFE;
        assert!(matches!(
            CredentialFrame::parse(&payload),
            Err(ProvisionError::FrameEncoding(_))
        ));
    }

    #[test]
    fn test_empty_ssid_and_password_allowed() {
        let payload = encode("", "", 0, 9);
        let frame = CredentialFrame::parse(&payload).unwrap();
        assert_eq!(frame.ssid, "");
        assert_eq!(frame.password, "");
        assert_eq!(frame.channel, 9);
    }
}
