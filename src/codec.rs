//! PNG data-URI exchange with the front end.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{ImageFormat, RgbImage, RgbaImage};
use std::io::Cursor;

pub const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

#[derive(Debug, thiserror::Error)]
pub enum DataUriError {
    #[error("data URI is not a base64 PNG")]
    MissingPrefix,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid image payload: {0}")]
    Image(#[from] image::ImageError),
}

/// Encode a frame as a PNG data URI
pub fn encode_png_data_uri(frame: &RgbImage) -> Result<String, DataUriError> {
    let _span = tracing::debug_span!("png_encode").entered();

    let mut png = Vec::new();
    frame.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

    let mut uri = String::with_capacity(PNG_DATA_URI_PREFIX.len() + png.len() * 4 / 3 + 4);
    uri.push_str(PNG_DATA_URI_PREFIX);
    STANDARD.encode_string(&png, &mut uri);
    Ok(uri)
}

/// Decode a PNG data URI, keeping (or synthesizing) the alpha channel
pub fn decode_png_data_uri(uri: &str) -> Result<RgbaImage, DataUriError> {
    let payload = uri
        .strip_prefix(PNG_DATA_URI_PREFIX)
        .ok_or(DataUriError::MissingPrefix)?;
    let bytes = STANDARD.decode(payload.trim_end())?;
    let image = image::load_from_memory_with_format(&bytes, ImageFormat::Png)?;
    Ok(image.to_rgba8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, Rgba};

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 37 % 256) as u8, (y * 91 % 256) as u8, ((x ^ y) % 256) as u8])
        })
    }

    #[test]
    fn png_round_trip_is_lossless() {
        let frame = gradient(17, 9);
        let uri = encode_png_data_uri(&frame).unwrap();
        assert!(uri.starts_with(PNG_DATA_URI_PREFIX));

        let decoded = decode_png_data_uri(&uri).unwrap();
        assert_eq!(decoded.dimensions(), frame.dimensions());
        for (x, y, px) in frame.enumerate_pixels() {
            let Rgb([r, g, b]) = *px;
            assert_eq!(*decoded.get_pixel(x, y), Rgba([r, g, b, 255]));
        }
    }

    #[test]
    fn alpha_channel_is_preserved() {
        let mut overlay = RgbaImage::new(2, 1);
        overlay.put_pixel(0, 0, Rgba([10, 20, 30, 0]));
        overlay.put_pixel(1, 0, Rgba([40, 50, 60, 128]));

        let mut png = Vec::new();
        overlay
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        let uri = format!("{PNG_DATA_URI_PREFIX}{}", STANDARD.encode(&png));

        assert_eq!(decode_png_data_uri(&uri).unwrap(), overlay);
    }

    #[test]
    fn rejects_foreign_uris() {
        assert!(matches!(
            decode_png_data_uri("data:image/jpeg;base64,AAAA"),
            Err(DataUriError::MissingPrefix)
        ));
        assert!(matches!(
            decode_png_data_uri("data:image/png;base64,@@@"),
            Err(DataUriError::Base64(_))
        ));
        assert!(matches!(
            decode_png_data_uri("data:image/png;base64,AAAA"),
            Err(DataUriError::Image(_))
        ));
    }
}
