use image::imageops::{FilterType, grayscale, resize};
use image::{DynamicImage, ImageBuffer, Luma};
use tracemark_types::models::Signature;
use tracing::debug;

use crate::ExtractError;

const IMG_SCALE: u32 = 8;

/// Bits in an image signature.
pub const HASH_BITS: u32 = IMG_SCALE * IMG_SCALE;

pub fn signature(bytes: &[u8]) -> Result<Signature, ExtractError> {
    if bytes.is_empty() {
        return Err(ExtractError::Empty);
    }

    let img = image::load_from_memory(bytes).map_err(|e| ExtractError::Undecodable(e.to_string()))?;
    debug!("Hashing {}x{} image", img.width(), img.height());
    Ok(Signature::Image {
        hash: compute_dhash(&img),
    })
}

/// Horizontal gradient hash: one bit per pixel pair on a 9x8 grayscale thumbnail,
/// set when brightness increases left to right.
pub fn compute_dhash(img: &DynamicImage) -> u64 {
    let signature = to_grayscale_signature(img);

    let mut hash = 0u64;
    let mut bit_position = 0;

    for y in 0..IMG_SCALE {
        for x in 0..IMG_SCALE {
            let current_pixel = signature.get_pixel(x, y)[0];
            let next_pixel = signature.get_pixel(x + 1, y)[0];

            if current_pixel < next_pixel {
                hash |= 1 << bit_position;
            }

            bit_position += 1;
        }
    }

    hash
}

fn to_grayscale_signature(img: &DynamicImage) -> ImageBuffer<Luma<u8>, Vec<u8>> {
    let gray_image = grayscale(img);

    resize(&gray_image, IMG_SCALE + 1, IMG_SCALE, FilterType::Triangle)
}

pub fn hamming_distance(left: u64, right: u64) -> u32 {
    (left ^ right).count_ones()
}

/// 1 - hamming_distance / 64
pub fn hamming_similarity(left: u64, right: u64) -> f64 {
    1.0 - hamming_distance(left, right) as f64 / HASH_BITS as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn encode(img: RgbImage) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn gradient(width: u32, height: u32, offset: u8, rising: bool) -> RgbImage {
        RgbImage::from_fn(width, height, |x, _| {
            let step = (x * 200 / width) as u8;
            let v = if rising { step } else { 200 - step };
            let v = v.saturating_add(offset);
            Rgb([v, v, v])
        })
    }

    fn hash_of(bytes: &[u8]) -> u64 {
        match signature(bytes).unwrap() {
            Signature::Image { hash } => hash,
            other => panic!("unexpected signature {:?}", other),
        }
    }

    #[test]
    fn identical_bytes_hash_identically() {
        let png = encode(gradient(64, 48, 0, true));
        assert_eq!(hash_of(&png), hash_of(&png));
    }

    #[test]
    fn brightness_shift_and_rescale_stay_close() {
        let original = hash_of(&encode(gradient(64, 48, 0, true)));
        let brighter = hash_of(&encode(gradient(128, 96, 20, true)));
        assert!(hamming_similarity(original, brighter) >= 0.9);
    }

    #[test]
    fn opposite_gradients_are_far_apart() {
        let rising = hash_of(&encode(gradient(64, 48, 0, true)));
        let falling = hash_of(&encode(gradient(64, 48, 0, false)));
        assert!(hamming_similarity(rising, falling) < 0.5);
    }

    #[test]
    fn hamming_similarity_is_symmetric() {
        let a = 0b1011_0000u64;
        let b = 0b0001_1111u64;
        assert_eq!(hamming_distance(a, b), 6);
        assert_eq!(hamming_similarity(a, b), hamming_similarity(b, a));
        assert_eq!(hamming_similarity(a, a), 1.0);
    }
}
