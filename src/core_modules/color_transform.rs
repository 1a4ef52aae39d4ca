// THEORY:
// `ColorTransform` is the pure per-pixel math: `output = M · input` on the (R, G, B)
// column vector, alpha copied through, result clamped into [0, 1].
//
// Key architectural principles:
// 1.  **Stateless**: Both entry points take the matrix as an argument. There is no
//     filter object to configure, so nothing can be reconfigured halfway through a
//     frame.
// 2.  **No Cross-Pixel Dependency**: Every pixel is computed from itself alone. `apply`
//     exploits that by cutting the frame into horizontal bands and handing each band
//     to its own scoped thread. The result is bit-identical for any band count.
// 3.  **Defensive Clamp**: The built-in matrices are convex, so in-range input stays in
//     range. The clamp is there for out-of-range upstream data and custom matrices.

use std::thread;

use crate::core_modules::frame::{Frame, PixelFormat};
use crate::core_modules::pixel::pixel::Pixel;
use crate::core_modules::transform_registry::TransformMatrix;

/// Transforms one pixel. Alpha is passed through.
#[inline]
pub fn apply_pixel(pixel: Pixel, matrix: &TransformMatrix) -> Pixel {
    let input = pixel.channels();
    let [r, g, b] = matrix.rows.map(|row| {
        row[0] * input[0] + row[1] * input[1] + row[2] * input[2]
    });
    Pixel::new(r, g, b, pixel.alpha).clamped()
}

/// Transforms a packed buffer of `format` pixels into `output`, which must be the same length.
pub fn apply_to_buffer(input: &[u8], output: &mut [u8], format: PixelFormat, matrix: &TransformMatrix) {
    let bpp = format.bytes_per_pixel();
    for (src, dst) in input.chunks_exact(bpp).zip(output.chunks_exact_mut(bpp)) {
        let pixel = apply_pixel(format.read(src), matrix);
        format.write(&pixel, dst);
    }
}

/// Transforms a whole frame into a freshly allocated pixel buffer, splitting the rows
/// across up to `workers` threads. The input frame is left untouched.
pub fn apply(frame: &Frame, matrix: &TransformMatrix, workers: usize) -> Vec<u8> {
    let input = frame.as_bytes();
    let mut output = vec![0u8; input.len()];

    let row_len = frame.row_len();
    let rows = frame.height() as usize;
    let bands = workers.clamp(1, rows.max(1));
    let format = frame.format();

    if bands == 1 {
        apply_to_buffer(input, &mut output, format, matrix);
        return output;
    }

    let rows_per_band = rows.div_ceil(bands);
    let band_len = rows_per_band * row_len;
    thread::scope(|scope| {
        for (src, dst) in input.chunks(band_len).zip(output.chunks_mut(band_len)) {
            scope.spawn(move || apply_to_buffer(src, dst, format, matrix));
        }
    });

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::frame::RawFrame;
    use crate::core_modules::transform_registry::{DEUTERANOPIA, PROTANOPIA, TRITANOPIA};
    use proptest::prelude::*;

    fn assert_close(actual: Pixel, expected: (f32, f32, f32)) {
        let eps = 1e-6;
        assert!((actual.red - expected.0).abs() < eps, "{actual:?} vs {expected:?}");
        assert!((actual.green - expected.1).abs() < eps, "{actual:?} vs {expected:?}");
        assert!((actual.blue - expected.2).abs() < eps, "{actual:?} vs {expected:?}");
    }

    #[test]
    fn pure_red_under_protanopia() {
        let out = apply_pixel(Pixel::rgb(1.0, 0.0, 0.0), &PROTANOPIA);
        assert_close(out, (0.567, 0.558, 0.0));
    }

    #[test]
    fn pure_green_under_deuteranopia() {
        let out = apply_pixel(Pixel::rgb(0.0, 1.0, 0.0), &DEUTERANOPIA);
        assert_close(out, (0.375, 0.3, 0.3));
    }

    #[test]
    fn alpha_is_passed_through() {
        let out = apply_pixel(Pixel::new(0.3, 0.6, 0.9, 0.25), &TRITANOPIA);
        assert_eq!(out.alpha, 0.25);
    }

    #[test]
    fn out_of_range_input_is_clamped() {
        let out = apply_pixel(Pixel::rgb(3.0, -2.0, 1.5), &TRITANOPIA);
        for channel in out.channels() {
            assert!((0.0..=1.0).contains(&channel));
        }
    }

    #[test]
    fn banding_does_not_change_the_result() {
        let (width, height) = (7u32, 13u32);
        let data: Vec<u8> = (0..width * height * 4).map(|i| (i * 37 % 256) as u8).collect();
        let frame = Frame::decode(RawFrame::new(data, width, height, PixelFormat::Bgra8), 0).unwrap();

        let single = apply(&frame, &PROTANOPIA, 1);
        for workers in [2, 3, 4, 13, 64] {
            assert_eq!(apply(&frame, &PROTANOPIA, workers), single, "workers = {workers}");
        }
    }

    #[test]
    fn rgb8_frames_have_no_alpha_to_carry() {
        let frame = Frame::decode(RawFrame::new(vec![255, 0, 0], 1, 1, PixelFormat::Rgb8), 0).unwrap();
        // 0.567 * 255 = 144.585, 0.558 * 255 = 142.29
        assert_eq!(apply(&frame, &PROTANOPIA, 4), vec![145, 142, 0]);
    }

    fn unit() -> impl Strategy<Value = f32> {
        0.0f32..=1.0
    }

    proptest! {
        #[test]
        fn in_range_input_stays_in_range(r in unit(), g in unit(), b in unit(), which in 0usize..3) {
            let matrix = [&PROTANOPIA, &DEUTERANOPIA, &TRITANOPIA][which];
            let input = Pixel::rgb(r, g, b);
            let input_channels = input.channels();
            // Convex rows: each output channel sits between the smallest and largest input.
            let lo = input_channels.iter().cloned().fold(f32::INFINITY, f32::min);
            let hi = input_channels.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
            for channel in apply_pixel(input, matrix).channels() {
                prop_assert!((0.0..=1.0).contains(&channel));
                prop_assert!(channel >= lo - 1e-5 && channel <= hi + 1e-5);
            }
        }

        #[test]
        fn repeated_application_is_bit_identical(r in unit(), g in unit(), b in unit(), a in unit(), which in 0usize..3) {
            let matrix = [&PROTANOPIA, &DEUTERANOPIA, &TRITANOPIA][which];
            let input = Pixel::new(r, g, b, a);
            let first = apply_pixel(input, matrix);
            let second = apply_pixel(input, matrix);
            prop_assert_eq!(first.red.to_bits(), second.red.to_bits());
            prop_assert_eq!(first.green.to_bits(), second.green.to_bits());
            prop_assert_eq!(first.blue.to_bits(), second.blue.to_bits());
            prop_assert_eq!(first.alpha.to_bits(), second.alpha.to_bits());
        }
    }
}
