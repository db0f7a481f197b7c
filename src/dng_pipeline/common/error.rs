use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Failed to open asset {}: {reason}", path.display())]
    AssetOpen { path: PathBuf, reason: String },

    #[error("Frame {index} is out of range (asset has {frame_count} frames)")]
    FrameIndex { index: u64, frame_count: u64 },

    #[error("Invalid frame metadata: {0}")]
    Metadata(String),

    #[error("Invalid metadata for frame {frame_index}: {cause}")]
    FrameMetadata { frame_index: u64, cause: String },

    #[error("Failed to decode frame {frame_index}: {cause}")]
    Decode { frame_index: u64, cause: String },

    #[error("Failed to write frame {frame_index}: {cause}")]
    Write { frame_index: u64, cause: String },

    #[error("A conversion is already running on this converter")]
    JobAlreadyRunning,

    #[error("Invalid DNG file: {0}")]
    InvalidDng(String),

    #[error("Conversion worker stopped unexpectedly: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConversionError {
    /// Index of the frame the error originated from, if it is frame-scoped.
    pub fn frame_index(&self) -> Option<u64> {
        match self {
            ConversionError::FrameIndex { index, .. } => Some(*index),
            ConversionError::Decode { frame_index, .. }
            | ConversionError::Write { frame_index, .. }
            | ConversionError::FrameMetadata { frame_index, .. } => Some(*frame_index),
            _ => None,
        }
    }

    /// Attaches `frame_index` to an asset-level metadata error.
    pub(crate) fn at_frame(self, frame_index: u64) -> Self {
        match self {
            ConversionError::Metadata(cause) => ConversionError::FrameMetadata { frame_index, cause },
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConversionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_frame_scopes_metadata_errors() {
        let error = ConversionError::Metadata("black level 5000 is not below white level 4095".to_string()).at_frame(3);
        assert!(matches!(error, ConversionError::FrameMetadata { frame_index: 3, .. }));
        assert_eq!(error.frame_index(), Some(3));

        let io = ConversionError::Io(std::io::Error::other("disk")).at_frame(3);
        assert_eq!(io.frame_index(), None);
    }
}
