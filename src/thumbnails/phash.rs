use image::DynamicImage;
use image_hasher::{HashAlg, HasherConfig, ImageHash};

/// Perceptual hash of a decoded preview, base64-encoded.
pub fn compute_phash(image: &DynamicImage) -> String {
    let hasher = HasherConfig::new()
        .hash_alg(HashAlg::DoubleGradient)
        .hash_size(8, 8)
        .to_hasher();
    hasher.hash_image(image).to_base64()
}

/// Hamming distance between two encoded hashes. `u32::MAX` when either side
/// fails to decode, which callers read as "changed".
pub fn hamming_distance(lhs: &str, rhs: &str) -> u32 {
    let Ok(h1) = ImageHash::<Vec<u8>>::from_base64(lhs) else {
        return u32::MAX;
    };
    let Ok(h2) = ImageHash::<Vec<u8>>::from_base64(rhs) else {
        return u32::MAX;
    };
    h1.dist(&h2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn gradient() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(64, 64, |x, y| {
            Rgba([(x * 4) as u8, (y * 4) as u8, 128, 255])
        }))
    }

    fn checkerboard() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(64, 64, |x, y| {
            if (x / 8 + y / 8) % 2 == 0 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([0, 0, 0, 255])
            }
        }))
    }

    #[test]
    fn identical_previews_hash_to_distance_zero() {
        let a = compute_phash(&gradient());
        let b = compute_phash(&gradient());
        assert_eq!(hamming_distance(&a, &b), 0);
    }

    #[test]
    fn different_previews_are_apart() {
        let a = compute_phash(&gradient());
        let b = compute_phash(&checkerboard());
        assert!(hamming_distance(&a, &b) > 0);
    }

    #[test]
    fn undecodable_hashes_count_as_changed() {
        assert_eq!(hamming_distance("not base64!!", "also not"), u32::MAX);
    }
}
