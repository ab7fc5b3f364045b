//! HTK parameter file headers.
//!
//! Feature-input mode hands `.mfc` files straight to the engine; only the
//! 12-byte big-endian header is read here, to learn the frame shift and the
//! number of frames.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::SegmentationError;

pub const HEADER_LEN: usize = 12;

/// HTK `parmKind` base code for MFCC.
const PARM_KIND_MFCC: u16 = 6;
const PARM_KIND_BASE_MASK: u16 = 0o77;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HtkHeader {
    pub n_samples: u32,
    /// Sample period in 100 ns units.
    pub sample_period: u32,
    /// Bytes per frame.
    pub sample_size: u16,
    pub parm_kind: u16,
}

impl HtkHeader {
    pub fn read(path: &Path) -> Result<Self, SegmentationError> {
        let mut file = File::open(path)
            .map_err(|e| SegmentationError::io(format!("open {}", path.display()), e))?;
        let mut bytes = [0u8; HEADER_LEN];
        file.read_exact(&mut bytes).map_err(|e| {
            SegmentationError::io(format!("read HTK header of {}", path.display()), e)
        })?;
        let header = Self::from_bytes(bytes);
        header.validate(path)?;
        Ok(header)
    }

    pub fn from_bytes(bytes: [u8; HEADER_LEN]) -> Self {
        Self {
            n_samples: u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            sample_period: u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            sample_size: u16::from_be_bytes([bytes[8], bytes[9]]),
            parm_kind: u16::from_be_bytes([bytes[10], bytes[11]]),
        }
    }

    fn validate(&self, path: &Path) -> Result<(), SegmentationError> {
        if self.sample_period == 0 || self.sample_size == 0 {
            return Err(SegmentationError::configuration(format!(
                "{} is not an HTK parameter file (period {}, sample size {})",
                path.display(),
                self.sample_period,
                self.sample_size
            )));
        }
        if !self.is_mfcc() {
            tracing::warn!(
                path = %path.display(),
                parm_kind = self.parm_kind,
                "feature file is not MFCC; the acoustic model may reject it"
            );
        }
        Ok(())
    }

    pub fn is_mfcc(&self) -> bool {
        self.parm_kind & PARM_KIND_BASE_MASK == PARM_KIND_MFCC
    }

    pub fn frame_shift_ms(&self) -> f64 {
        f64::from(self.sample_period) / 10_000.0
    }

    pub fn duration_s(&self) -> f64 {
        f64::from(self.n_samples) * self.frame_shift_ms() / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(n_samples: u32, period: u32, size: u16, kind: u16) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&n_samples.to_be_bytes());
        bytes[4..8].copy_from_slice(&period.to_be_bytes());
        bytes[8..10].copy_from_slice(&size.to_be_bytes());
        bytes[10..12].copy_from_slice(&kind.to_be_bytes());
        bytes
    }

    #[test]
    fn decodes_big_endian_fields() {
        // MFCC_E_D_Z: 6 | E(0o100) | D(0o400) | Z(0o4000)
        let kind = 6 | 0o100 | 0o400 | 0o4000;
        let header = HtkHeader::from_bytes(header_bytes(300, 100_000, 104, kind));
        assert_eq!(header.n_samples, 300);
        assert_eq!(header.sample_size, 104);
        assert!(header.is_mfcc());
        assert!((header.frame_shift_ms() - 10.0).abs() < 1e-12);
        assert!((header.duration_s() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn read_rejects_short_and_zero_period_files() {
        let dir = tempfile::tempdir().unwrap();
        let short = dir.path().join("short.mfc");
        std::fs::write(&short, [0u8; 5]).unwrap();
        assert!(HtkHeader::read(&short).is_err());

        let zero = dir.path().join("zero.mfc");
        std::fs::write(&zero, header_bytes(10, 0, 52, 6)).unwrap();
        let err = HtkHeader::read(&zero).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
    }

    #[test]
    fn read_accepts_header_followed_by_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("utt.mfc");
        let mut data = header_bytes(2, 50_000, 8, 6).to_vec();
        data.extend_from_slice(&[0u8; 16]);
        std::fs::write(&path, data).unwrap();
        let header = HtkHeader::read(&path).unwrap();
        assert!((header.frame_shift_ms() - 5.0).abs() < 1e-12);
    }
}
