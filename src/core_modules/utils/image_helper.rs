pub mod image_helper {
    use std::path::Path;

    use image::ImageEncoder;

    use crate::core_modules::frame::{DisplayFrame, Frame, PixelFormat};
    use crate::error::FrameError;

    /// Writes a frame to a PNG file as stored, without applying any orientation.
    pub fn save(path: impl AsRef<Path>, frame: &Frame) -> Result<(), image::error::ImageError> {
        let output = std::fs::File::create(path)?;
        let encoder = image::codecs::png::PngEncoder::new(output);

        match frame.format() {
            PixelFormat::Rgba8 => encoder.write_image(
                frame.as_bytes(),
                frame.width(),
                frame.height(),
                image::ExtendedColorType::Rgba8,
            )?,
            PixelFormat::Rgb8 => encoder.write_image(
                frame.as_bytes(),
                frame.width(),
                frame.height(),
                image::ExtendedColorType::Rgb8,
            )?,
            PixelFormat::Bgra8 => {
                let mut rgba = frame.as_bytes().to_vec();
                for pixel in rgba.chunks_exact_mut(4) {
                    pixel.swap(0, 2);
                }
                encoder.write_image(&rgba, frame.width(), frame.height(), image::ExtendedColorType::Rgba8)?
            }
        }

        Ok(())
    }

    /// Rotates a display frame upright and writes it to a PNG file.
    pub fn save_upright(path: impl AsRef<Path>, frame: DisplayFrame) -> Result<(), FrameError> {
        let upright = frame.into_upright()?;
        save(path, &upright).map_err(|e| FrameError::Render(e.to_string()))
    }
}
