// THEORY:
// The `frame` module defines the buffers that move through the pipeline and who owns
// them at each point.
//
// - `RawFrame` is what a capture layer hands over: bytes, dimensions, a pixel format
//   and a row stride. Nothing about it has been checked yet.
// - `Frame` is a decoded, validated, tightly packed pixel grid. Decoding is the only
//   way to get one, so every `Frame` is safe to index without bounds surprises.
// - `DisplayFrame` is a finished frame plus the orientation it must be presented in.
//   Orientation is metadata: pixels are only rotated when a sink asks for
//   `into_upright`, which keeps the unfiltered path free of copies.

use std::time::Instant;

use image::{ImageBuffer, Rgb, Rgba, imageops};

use crate::core_modules::pixel::pixel::Pixel;
use crate::core_modules::transform_registry::TransformSelector;
use crate::error::{DecodeError, FrameError};

/// Byte layout of a single pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgba8,
    /// Native layout of most camera capture buffers.
    Bgra8,
    /// No alpha; treated as opaque.
    Rgb8,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => 4,
            PixelFormat::Rgb8 => 3,
        }
    }

    pub const fn has_alpha(self) -> bool {
        !matches!(self, PixelFormat::Rgb8)
    }

    /// Reads one pixel. `bytes` must hold at least `bytes_per_pixel()` bytes.
    #[inline]
    pub fn read(self, bytes: &[u8]) -> Pixel {
        match self {
            PixelFormat::Rgba8 => Pixel::from_bytes(bytes[0], bytes[1], bytes[2], bytes[3]),
            PixelFormat::Bgra8 => Pixel::from_bytes(bytes[2], bytes[1], bytes[0], bytes[3]),
            PixelFormat::Rgb8 => Pixel::from_bytes(bytes[0], bytes[1], bytes[2], u8::MAX),
        }
    }

    /// Writes one pixel. `bytes` must hold at least `bytes_per_pixel()` bytes.
    #[inline]
    pub fn write(self, pixel: &Pixel, bytes: &mut [u8]) {
        let [r, g, b, a] = pixel.to_bytes();
        match self {
            PixelFormat::Rgba8 => bytes[..4].copy_from_slice(&[r, g, b, a]),
            PixelFormat::Bgra8 => bytes[..4].copy_from_slice(&[b, g, r, a]),
            PixelFormat::Rgb8 => bytes[..3].copy_from_slice(&[r, g, b]),
        }
    }
}

/// An undecoded buffer as delivered by a frame source.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub bytes_per_row: usize,
    pub format: PixelFormat,
}

impl RawFrame {
    /// A tightly packed buffer (no row padding).
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Self {
        let bytes_per_row = width as usize * format.bytes_per_pixel();
        Self::with_stride(data, width, height, bytes_per_row, format)
    }

    pub fn with_stride(
        data: Vec<u8>,
        width: u32,
        height: u32,
        bytes_per_row: usize,
        format: PixelFormat,
    ) -> Self {
        Self {
            data,
            width,
            height,
            bytes_per_row,
            format,
        }
    }
}

/// A validated, tightly packed pixel grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
    frame_id: u64,
    captured_at: Instant,
}

impl Frame {
    /// Validates a raw buffer and packs it. Padded rows are copied into a tight
    /// layout; an already tight buffer is moved without copying.
    pub fn decode(raw: RawFrame, frame_id: u64) -> Result<Frame, DecodeError> {
        let RawFrame {
            mut data,
            width,
            height,
            bytes_per_row,
            format,
        } = raw;

        if data.is_empty() {
            return Err(DecodeError::EmptyBuffer);
        }
        if width == 0 || height == 0 {
            return Err(DecodeError::InvalidDimensions { width, height });
        }

        let rows = height as usize;
        let overflow = DecodeError::LayoutOverflow {
            bytes_per_row,
            width,
            height,
        };
        let row_len = (width as usize)
            .checked_mul(format.bytes_per_pixel())
            .ok_or_else(|| overflow.clone())?;
        if bytes_per_row < row_len {
            return Err(DecodeError::StrideTooShort {
                bytes_per_row,
                width,
                format,
            });
        }

        // The last row needs no padding after it.
        let expected = bytes_per_row
            .checked_mul(rows - 1)
            .and_then(|len| len.checked_add(row_len))
            .ok_or_else(|| overflow.clone())?;
        let packed_len = row_len.checked_mul(rows).ok_or(overflow)?;
        if data.len() < expected {
            return Err(DecodeError::BufferTooShort {
                expected,
                actual: data.len(),
            });
        }

        let data = if bytes_per_row == row_len {
            data.truncate(packed_len);
            data
        } else {
            let mut packed = Vec::with_capacity(packed_len);
            for row in data.chunks(bytes_per_row).take(rows) {
                packed.extend_from_slice(&row[..row_len]);
            }
            packed
        };

        Ok(Frame {
            data,
            width,
            height,
            format,
            frame_id,
            captured_at: Instant::now(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn row_len(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// Reads the pixel at (x, y), or `None` outside the grid.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Pixel> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let bpp = self.format.bytes_per_pixel();
        let start = y as usize * self.row_len() + x as usize * bpp;
        Some(self.format.read(&self.data[start..start + bpp]))
    }

    /// A new frame with the same identity and geometry but different pixel bytes.
    /// Fails when `data` does not match the geometry.
    pub fn with_data(&self, data: Vec<u8>) -> Result<Frame, FrameError> {
        let expected = self.row_len() * self.height as usize;
        if data.len() != expected {
            return Err(FrameError::Render(format!(
                "output holds {} bytes, frame needs {expected}",
                data.len()
            )));
        }
        Ok(Frame {
            data,
            width: self.width,
            height: self.height,
            format: self.format,
            frame_id: self.frame_id,
            captured_at: self.captured_at,
        })
    }
}

/// How a frame must be rotated, clockwise, to appear upright on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Orientation {
    Up,
    /// 90° clockwise. The usual back-camera sensor orientation on a portrait display.
    #[default]
    Right,
    Down,
    Left,
}

impl Orientation {
    pub const fn quarter_turns_clockwise(self) -> u8 {
        match self {
            Orientation::Up => 0,
            Orientation::Right => 1,
            Orientation::Down => 2,
            Orientation::Left => 3,
        }
    }

    pub const fn swaps_axes(self) -> bool {
        matches!(self, Orientation::Right | Orientation::Left)
    }
}

/// A finished frame ready for presentation.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayFrame {
    pub frame: Frame,
    pub orientation: Orientation,
    /// The filter actually applied to `frame`. `Identity` after a render fallback.
    pub applied: TransformSelector,
}

impl DisplayFrame {
    pub fn frame_id(&self) -> u64 {
        self.frame.frame_id()
    }

    /// Dimensions once rotated upright.
    pub fn display_size(&self) -> (u32, u32) {
        if self.orientation.swaps_axes() {
            (self.frame.height(), self.frame.width())
        } else {
            (self.frame.width(), self.frame.height())
        }
    }

    /// Materializes the orientation, returning a frame whose pixels are upright.
    pub fn into_upright(self) -> Result<Frame, FrameError> {
        let turns = self.orientation.quarter_turns_clockwise();
        if turns == 0 {
            return Ok(self.frame);
        }
        let Frame {
            data,
            width,
            height,
            format,
            frame_id,
            captured_at,
        } = self.frame;
        let (width, height, data) = match format {
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => rotate::<Rgba<u8>>(width, height, data, turns)?,
            PixelFormat::Rgb8 => rotate::<Rgb<u8>>(width, height, data, turns)?,
        };
        Ok(Frame {
            data,
            width,
            height,
            format,
            frame_id,
            captured_at,
        })
    }
}

fn rotate<P>(width: u32, height: u32, data: Vec<u8>, turns: u8) -> Result<(u32, u32, Vec<u8>), FrameError>
where
    P: image::Pixel<Subpixel = u8> + 'static,
{
    let buffer = ImageBuffer::<P, Vec<u8>>::from_raw(width, height, data)
        .ok_or_else(|| FrameError::Render(format!("cannot view {width}x{height} buffer as an image")))?;
    let rotated = match turns % 4 {
        1 => imageops::rotate90(&buffer),
        2 => imageops::rotate180(&buffer),
        3 => imageops::rotate270(&buffer),
        _ => buffer,
    };
    Ok((rotated.width(), rotated.height(), rotated.into_raw()))
}
