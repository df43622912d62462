//! SSRC allocation
//!
//! HomeKit expects the SSRC as a signed 32-bit value, so the top byte of
//! the random source is cleared to keep it non-negative.

use rand::RngCore;

use crate::RtpSsrc;

/// Largest SSRC value this module hands out (`2^31 - 1`)
pub const MAX_SSRC: RtpSsrc = i32::MAX as RtpSsrc;

/// Generate a fresh 31-bit SSRC
pub fn generate_ssrc() -> RtpSsrc {
    let mut source = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut source);
    ssrc_from_bytes(source)
}

/// Build an SSRC from four random bytes, forcing the top byte to zero
pub fn ssrc_from_bytes(mut source: [u8; 4]) -> RtpSsrc {
    source[0] = 0;
    u32::from_be_bytes(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_top_byte_cleared() {
        assert_eq!(ssrc_from_bytes([0xff, 0xff, 0xff, 0xff]), 0x00ff_ffff);
        assert_eq!(ssrc_from_bytes([0x80, 0x00, 0x00, 0x01]), 1);
    }

    #[test]
    fn test_generated_ssrc_in_range() {
        for _ in 0..1000 {
            let ssrc = generate_ssrc();
            assert!(ssrc <= MAX_SSRC);
            assert!(i32::try_from(ssrc).is_ok());
        }
    }

    #[test]
    fn test_generated_ssrc_varies() {
        let values: HashSet<RtpSsrc> = (0..64).map(|_| generate_ssrc()).collect();
        assert!(values.len() > 60, "only {} distinct SSRCs out of 64", values.len());
    }
}
