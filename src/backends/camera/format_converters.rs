// SPDX-License-Identifier: GPL-3.0-only
//! Raw sample unpacking for the conversion stage
//!
//! Each routine turns the image region of one raw buffer into a flat vector
//! of 16-bit samples, stripping row padding declared by the layout's stride.
//! Bytes past the image region (embedded metadata trailers) are ignored.

use super::types::{FrameLayout, PixelEncoding, SampleFrame};
use crate::errors::{ConvertError, ConvertResult};

/// Convert the image region of a raw buffer according to its layout.
///
/// Dispatches on the layout's sample encoding. The returned frame carries
/// exactly `layout.shape.pixel_count()` samples in row-major order.
pub fn convert_frame(data: &[u8], layout: &FrameLayout) -> ConvertResult<SampleFrame> {
    let samples = match layout.encoding {
        PixelEncoding::Mono12Packed => mono12_packed_to_u16(data, layout)?,
        PixelEncoding::Mono16 => mono16_to_u16(data, layout)?,
        PixelEncoding::Mono32 => {
            return Err(ConvertError::UnsupportedEncoding(PixelEncoding::Mono32));
        }
    };
    Ok(SampleFrame {
        shape: layout.shape,
        samples,
    })
}

/// Unpack Mono12Packed rows into 16-bit samples
///
/// Mono12Packed stores two 12-bit samples in three bytes:
/// ```text
/// [A11:A4][B11:B4][B3:B0,A3:A0]
/// ```
/// An odd row width leaves a two-byte tail holding the final sample:
/// ```text
/// [A11:A4][xxxx,A3:A0]
/// ```
pub fn mono12_packed_to_u16(data: &[u8], layout: &FrameLayout) -> ConvertResult<Vec<u16>> {
    check_image_region(data, layout)?;

    let width = layout.shape.width as usize;
    let row_bytes = PixelEncoding::Mono12Packed.bytes_per_row(layout.shape.width);
    let mut samples = Vec::with_capacity(layout.shape.pixel_count());

    for row in image_rows(data, layout, row_bytes) {
        let mut produced = 0;
        let mut chunks = row.chunks_exact(3);
        for chunk in &mut chunks {
            if produced >= width {
                break;
            }
            let a = ((chunk[0] as u16) << 4) | ((chunk[2] as u16) & 0x0f);
            samples.push(a);
            produced += 1;
            if produced < width {
                let b = ((chunk[1] as u16) << 4) | ((chunk[2] as u16) >> 4);
                samples.push(b);
                produced += 1;
            }
        }
        let tail = chunks.remainder();
        if produced < width && tail.len() >= 2 {
            samples.push(((tail[0] as u16) << 4) | ((tail[1] as u16) & 0x0f));
        }
    }

    Ok(samples)
}

/// Copy Mono16 rows into 16-bit samples, dropping row padding
pub fn mono16_to_u16(data: &[u8], layout: &FrameLayout) -> ConvertResult<Vec<u16>> {
    check_image_region(data, layout)?;

    let row_bytes = PixelEncoding::Mono16.bytes_per_row(layout.shape.width);
    let mut samples = Vec::with_capacity(layout.shape.pixel_count());

    for row in image_rows(data, layout, row_bytes) {
        for pair in row.chunks_exact(2) {
            samples.push(u16::from_le_bytes([pair[0], pair[1]]));
        }
    }

    Ok(samples)
}

/// Iterate the unpadded portion of each row in the image region
fn image_rows<'a>(
    data: &'a [u8],
    layout: &FrameLayout,
    row_bytes: usize,
) -> impl Iterator<Item = &'a [u8]> {
    let stride = layout.stride;
    (0..layout.shape.height as usize).map(move |row| {
        let start = row * stride;
        &data[start..start + row_bytes]
    })
}

fn check_image_region(data: &[u8], layout: &FrameLayout) -> ConvertResult<()> {
    let expected = layout.image_bytes();
    if data.len() < expected {
        return Err(ConvertError::ShortBuffer {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::FrameShape;

    fn packed_layout(width: u32, height: u32, encoding: PixelEncoding) -> FrameLayout {
        FrameLayout::packed(FrameShape::new(width, height), encoding)
    }

    #[test]
    fn mono12_unpacks_sample_pairs() {
        // Samples 0xABC and 0x123 -> bytes [0xAB, 0x12, 0x3C]
        let layout = packed_layout(2, 1, PixelEncoding::Mono12Packed);
        let samples = mono12_packed_to_u16(&[0xAB, 0x12, 0x3C], &layout).unwrap();
        assert_eq!(samples, vec![0x0ABC, 0x0123]);
    }

    #[test]
    fn mono12_handles_odd_width_tail() {
        // Two full samples then a two-byte tail carrying 0x456
        let layout = packed_layout(3, 1, PixelEncoding::Mono12Packed);
        let samples = mono12_packed_to_u16(&[0xAB, 0x12, 0x3C, 0x45, 0x06], &layout).unwrap();
        assert_eq!(samples, vec![0x0ABC, 0x0123, 0x0456]);
    }

    #[test]
    fn mono16_strips_row_padding() {
        let mut layout = packed_layout(2, 2, PixelEncoding::Mono16);
        layout.stride = 6; // 4 image bytes + 2 padding bytes per row
        let data = [
            0x01, 0x00, 0x02, 0x00, 0xEE, 0xEE, // row 0
            0x03, 0x00, 0x04, 0x00, 0xEE, 0xEE, // row 1
        ];
        let samples = mono16_to_u16(&data, &layout).unwrap();
        assert_eq!(samples, vec![1, 2, 3, 4]);
    }

    #[test]
    fn trailing_metadata_bytes_are_ignored() {
        let layout = packed_layout(2, 1, PixelEncoding::Mono16);
        let data = [0x05, 0x00, 0x06, 0x00, 0xDE, 0xAD, 0xBE, 0xEF];
        let frame = convert_frame(&data, &layout).unwrap();
        assert_eq!(frame.samples, vec![5, 6]);
        assert_eq!(frame.shape, FrameShape::new(2, 1));
    }

    #[test]
    fn short_buffer_is_rejected() {
        let layout = packed_layout(4, 4, PixelEncoding::Mono16);
        let result = mono16_to_u16(&[0u8; 8], &layout);
        assert_eq!(
            result,
            Err(ConvertError::ShortBuffer {
                expected: 32,
                actual: 8
            })
        );
    }

    #[test]
    fn mono32_is_unsupported() {
        let layout = packed_layout(2, 2, PixelEncoding::Mono32);
        let result = convert_frame(&[0u8; 16], &layout);
        assert_eq!(
            result.unwrap_err(),
            ConvertError::UnsupportedEncoding(PixelEncoding::Mono32)
        );
    }
}
