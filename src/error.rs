use thiserror::Error;

use crate::core_modules::frame::PixelFormat;

/// Reasons an incoming buffer cannot be read as a pixel grid.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Empty frame buffer")]
    EmptyBuffer,

    #[error("Invalid frame dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Row stride {bytes_per_row} is shorter than one {width}px row of {format:?}")]
    StrideTooShort {
        bytes_per_row: usize,
        width: u32,
        format: PixelFormat,
    },

    #[error("Frame buffer holds {actual} bytes, expected at least {expected}")]
    BufferTooShort { expected: usize, actual: usize },

    #[error("Frame layout {width}x{height} with row stride {bytes_per_row} does not fit in memory")]
    LayoutOverflow {
        bytes_per_row: usize,
        width: u32,
        height: u32,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Frame decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Frame render error: {0}")]
    Render(String),
}
