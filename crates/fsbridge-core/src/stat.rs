//! Decoded file-metadata record.
//!
//! Stat-family completions decode the OS stat structure into a
//! [`StatRecord`] with named fields, then write it into the caller's
//! 16-slot u64 buffer in a fixed order. The order is part of the external
//! contract — hosts index the buffer positionally.

use crate::error::{BridgeError, Result};

/// File metadata decoded from a successful stat/lstat/fstat.
///
/// Field order in the flattened output: dev, mode, nlink, uid, gid, rdev,
/// ino, size, blksize, blocks, flags, gen, then the four timestamps in
/// milliseconds (atime, mtime, ctime, birthtime).
///
/// `flags` and `gen` are BSD fields; platforms without them report 0.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct StatRecord {
    pub dev: u64,
    pub mode: u64,
    pub nlink: u64,
    pub uid: u64,
    pub gid: u64,
    pub rdev: u64,
    pub ino: u64,
    pub size: u64,
    pub blksize: u64,
    pub blocks: u64,
    pub flags: u64,
    pub gen: u64,
    pub atime_ms: u64,
    pub mtime_ms: u64,
    pub ctime_ms: u64,
    pub birthtime_ms: u64,
}

impl StatRecord {
    /// Number of u64 slots a flattened record occupies.
    pub const FIELD_COUNT: usize = 16;

    /// Flatten into a fixed array, preserving the contract order.
    pub fn to_array(&self) -> [u64; Self::FIELD_COUNT] {
        [
            self.dev,
            self.mode,
            self.nlink,
            self.uid,
            self.gid,
            self.rdev,
            self.ino,
            self.size,
            self.blksize,
            self.blocks,
            self.flags,
            self.gen,
            self.atime_ms,
            self.mtime_ms,
            self.ctime_ms,
            self.birthtime_ms,
        ]
    }

    /// Write the flattened record into `out`.
    ///
    /// Bounds-checked: `out` must hold at least [`Self::FIELD_COUNT`]
    /// slots, otherwise nothing is written.
    pub fn write_to(&self, out: &mut [u64]) -> Result<()> {
        if out.len() < Self::FIELD_COUNT {
            return Err(BridgeError::InvalidBuffer);
        }
        out[..Self::FIELD_COUNT].copy_from_slice(&self.to_array());
        Ok(())
    }
}

/// Convert an OS (seconds, nanoseconds) timestamp pair to milliseconds.
///
/// `secs * 1000 + nsecs / 1_000_000`, integer truncation. Every decode
/// path uses this single helper so sub-millisecond behavior stays
/// consistent across backends.
#[inline]
pub fn time_to_ms(secs: i64, nsecs: i64) -> u64 {
    (secs.wrapping_mul(1000).wrapping_add(nsecs / 1_000_000)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_order() {
        let rec = StatRecord {
            dev: 1,
            mode: 2,
            nlink: 3,
            uid: 4,
            gid: 5,
            rdev: 6,
            ino: 7,
            size: 8,
            blksize: 9,
            blocks: 10,
            flags: 11,
            gen: 12,
            atime_ms: 13,
            mtime_ms: 14,
            ctime_ms: 15,
            birthtime_ms: 16,
        };
        let arr = rec.to_array();
        for (i, v) in arr.iter().enumerate() {
            assert_eq!(*v, (i + 1) as u64);
        }
    }

    #[test]
    fn test_write_to_bounds() {
        let rec = StatRecord::default();
        let mut short = [0u64; 15];
        assert!(rec.write_to(&mut short).is_err());

        let mut exact = [u64::MAX; 16];
        rec.write_to(&mut exact).unwrap();
        assert_eq!(exact, [0u64; 16]);

        // A longer buffer only has its first 16 slots touched.
        let mut long = [u64::MAX; 18];
        rec.write_to(&mut long).unwrap();
        assert_eq!(long[15], 0);
        assert_eq!(long[16], u64::MAX);
    }

    #[test]
    fn test_time_to_ms() {
        assert_eq!(time_to_ms(0, 0), 0);
        assert_eq!(time_to_ms(1, 0), 1000);
        assert_eq!(time_to_ms(1, 500_000_000), 1500);
        // Sub-millisecond nanoseconds truncate.
        assert_eq!(time_to_ms(1, 999_999), 1000);
        assert_eq!(time_to_ms(1, 1_000_000), 1001);
    }
}
