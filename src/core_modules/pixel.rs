// THEORY:
// The `Pixel` module is the smallest unit the color pipeline reasons about. It is a
// "dumb" data container holding one pixel as normalized channel intensities, which is
// the domain every transform matrix is defined over.
//
// Key architectural principles:
// 1.  **Normalized Domain**: Channels live in [0.0, 1.0]. Byte-oriented buffers are
//     converted on the way in (`/ 255`) and quantized on the way out (`* 255`, rounded),
//     so the matrix math never has to know about storage formats.
// 2.  **Alpha Passthrough**: Alpha is carried along but never mixed. A pixel from a
//     format without alpha is treated as fully opaque.
// 3.  **Single-Pixel Scope**: Nothing here looks at neighbors. That is what lets the
//     transform run independently per pixel, per row, or per tile.

pub mod pixel {
    pub type Byte = u8;
    pub type NormalizedChannel = f32;

    const MAX_BYTE: NormalizedChannel = 255.0;

    /// A single pixel with normalized (0.0-1.0) channel intensities.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct Pixel {
        pub red: NormalizedChannel,
        pub green: NormalizedChannel,
        pub blue: NormalizedChannel,
        /// Passed through every transform unchanged.
        pub alpha: NormalizedChannel,
    }

    impl Default for Pixel {
        fn default() -> Self {
            Pixel::rgb(0.0, 0.0, 0.0)
        }
    }

    impl Pixel {
        pub fn new(
            red: NormalizedChannel,
            green: NormalizedChannel,
            blue: NormalizedChannel,
            alpha: NormalizedChannel,
        ) -> Self {
            Pixel { red, green, blue, alpha }
        }

        /// An opaque pixel.
        pub fn rgb(red: NormalizedChannel, green: NormalizedChannel, blue: NormalizedChannel) -> Self {
            Pixel::new(red, green, blue, 1.0)
        }

        pub fn from_bytes(red: Byte, green: Byte, blue: Byte, alpha: Byte) -> Self {
            Pixel::new(
                red as NormalizedChannel / MAX_BYTE,
                green as NormalizedChannel / MAX_BYTE,
                blue as NormalizedChannel / MAX_BYTE,
                alpha as NormalizedChannel / MAX_BYTE,
            )
        }

        /// The color channels as an (R, G, B) column vector.
        #[inline]
        pub fn channels(&self) -> [NormalizedChannel; 3] {
            [self.red, self.green, self.blue]
        }

        /// Clamps every color channel into [0.0, 1.0]. NaN collapses to 0.0.
        #[inline]
        pub fn clamped(self) -> Self {
            Pixel {
                red: clamp_unit(self.red),
                green: clamp_unit(self.green),
                blue: clamp_unit(self.blue),
                alpha: self.alpha,
            }
        }

        /// Quantizes back to 8-bit (R, G, B, A), clamping out-of-range values first.
        pub fn to_bytes(&self) -> [Byte; 4] {
            [
                quantize(self.red),
                quantize(self.green),
                quantize(self.blue),
                quantize(self.alpha),
            ]
        }
    }

    #[inline]
    fn clamp_unit(value: NormalizedChannel) -> NormalizedChannel {
        if value.is_nan() {
            return 0.0;
        }
        value.clamp(0.0, 1.0)
    }

    #[inline]
    fn quantize(value: NormalizedChannel) -> Byte {
        (clamp_unit(value) * MAX_BYTE).round() as Byte
    }
}

#[cfg(test)]
mod tests {
    use super::pixel::*;

    #[test]
    fn bytes_survive_normalization() {
        for value in [0u8, 1, 17, 128, 200, 254, 255] {
            let pixel = Pixel::from_bytes(value, value, value, value);
            assert_eq!(pixel.to_bytes(), [value; 4]);
        }
    }

    #[test]
    fn clamp_pulls_out_of_range_channels_back() {
        let pixel = Pixel::new(1.7, -0.3, f32::NAN, 0.5).clamped();
        assert_eq!(pixel, Pixel::new(1.0, 0.0, 0.0, 0.5));
    }

    #[test]
    fn quantize_saturates_instead_of_wrapping() {
        assert_eq!(Pixel::new(2.0, -1.0, 0.5, 1.0).to_bytes(), [255, 0, 128, 255]);
    }
}
