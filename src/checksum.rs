//! CRC-64 fingerprint for payloads.
//!
//! Senders may log or attach it next to a payload they push through the data
//! channel. Nothing on the receive path verifies it.

use crc::{Crc, CRC_64_WE};

// poly 0x42F0E1EBA9EA3693, msb first, init and xorout all ones
static CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_WE);

/// crc64 of `data`.
pub fn crc64(data: &[u8]) -> u64 {
    CRC64.checksum(data)
}

#[cfg(test)]
mod tests {
    use super::crc64;

    const POLY: u64 = 0x42F0_E1EB_A9EA_3693;

    fn reference(data: &[u8]) -> u64 {
        let mut table = [0u64; 256];
        for (byte, slot) in table.iter_mut().enumerate() {
            let mut crc = (byte as u64) << 56;
            for _ in 0..8 {
                crc = if crc & (1 << 63) != 0 {
                    (crc << 1) ^ POLY
                } else {
                    crc << 1
                };
            }
            *slot = crc;
        }

        let mut crc = u64::MAX;
        for &b in data {
            let idx = ((crc >> 56) as u8 ^ b) as usize;
            crc = table[idx] ^ (crc << 8);
        }
        crc ^ u64::MAX
    }

    #[test]
    fn test_check_value() {
        assert_eq!(crc64(b"123456789"), 0x62EC_59E3_F1A4_F00A);
    }

    #[test]
    fn test_empty() {
        assert_eq!(crc64(b""), 0);
        assert_eq!(reference(b""), 0);
    }

    #[test]
    fn test_matches_table_driven() {
        let payload: Vec<u8> = (0..5000u32).map(|i| (i * 31 % 251) as u8).collect();
        assert_eq!(crc64(&payload), reference(&payload));
        assert_eq!(crc64(b"HELLO c1"), reference(b"HELLO c1"));
    }

    #[test]
    fn test_deterministic() {
        let data = b"the quick brown fox";
        assert_eq!(crc64(data), crc64(data));
    }

    #[test]
    fn test_single_bit_flip() {
        let a = vec![0x5au8; 1422];
        for bit in [0usize, 7, 100 * 8 + 3, 1421 * 8 + 7] {
            let mut b = a.clone();
            b[bit / 8] ^= 1 << (bit % 8);
            assert_ne!(crc64(&a), crc64(&b));
        }
    }
}
