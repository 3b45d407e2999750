//! CSRNG based on the platform (OS) CSRNG.
//!
//! Used for nonce generation and for generating fresh master secrets.

use aes_gcm::aead::{rand_core::RngCore, OsRng};

use gdir_common::{Error, Result};

/// Fill the buffer with random bytes from the OS.
///
/// Unlike `RngCore::fill_bytes`, a failing entropy source is reported as
/// [`Error::RandomSource`] instead of panicking.
pub fn fill_buf(buf: &mut [u8]) -> Result<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| Error::RandomSource(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::fill_buf;

    #[test]
    fn test_fill_buf() {
        // works with zero-len buf - edge case
        let mut buf: [u8; 0] = [];
        assert!(fill_buf(&mut buf).is_ok());

        let mut buf = [0u8; 32];
        fill_buf(&mut buf).unwrap();
        assert_ne!(buf, [0u8; 32], "output not all zeroes");
    }
}
