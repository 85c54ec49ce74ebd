//! `data:` URI encoding for uploaded backgrounds and stored captures.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataUriError {
    #[error("not a data URI")]
    MissingScheme,
    #[error("data URI has no ',' separator")]
    MissingPayload,
    #[error("only base64 data URIs are supported")]
    NotBase64,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("failed to encode PNG: {0}")]
    Png(#[from] image::ImageError),
}

/// Encode raw bytes as `data:<mime>;base64,<payload>`
pub fn encode(bytes: &[u8], mime: &str) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Encode an image as a PNG data URI
pub fn encode_png(image: &RgbaImage) -> Result<String, DataUriError> {
    let mut png = Vec::new();
    image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(encode(&png, "image/png"))
}

/// Split a base64 data URI into its mime type and decoded bytes
pub fn decode(uri: &str) -> Result<(String, Vec<u8>), DataUriError> {
    let rest = uri
        .trim()
        .strip_prefix("data:")
        .ok_or(DataUriError::MissingScheme)?;
    let (header, payload) = rest.split_once(',').ok_or(DataUriError::MissingPayload)?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or(DataUriError::NotBase64)?;
    let bytes = STANDARD.decode(payload.trim())?;
    Ok((mime.to_string(), bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_splits_mime() {
        let uri = encode(b"hello", "image/jpeg");
        assert!(uri.starts_with("data:image/jpeg;base64,"));
        let (mime, bytes) = decode(&uri).unwrap();
        assert_eq!(mime, "image/jpeg");
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(matches!(decode("image.png"), Err(DataUriError::MissingScheme)));
        assert!(matches!(decode("data:image/png;base64"), Err(DataUriError::MissingPayload)));
        assert!(matches!(decode("data:text/plain,hi"), Err(DataUriError::NotBase64)));
        assert!(matches!(decode("data:image/png;base64,@@@"), Err(DataUriError::Base64(_))));
    }

    #[test]
    fn test_png_uri_decodes_to_same_pixels() {
        let img = RgbaImage::from_pixel(3, 2, image::Rgba([1, 2, 3, 255]));
        let (mime, bytes) = decode(&encode_png(&img).unwrap()).unwrap();
        assert_eq!(mime, "image/png");
        let back = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(back, img);
    }
}
