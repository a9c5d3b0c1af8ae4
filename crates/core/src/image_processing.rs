//! Image decoding and encoding utilities.
//!
//! This module turns uploaded files into decoded images and serializes
//! decoded images into the base64 PNG payload sent to the Gemini API.
//!
//! # Example
//!
//! ```ignore
//! use plant_doctor_core::image_processing::ImageProcessor;
//!
//! let image = ImageProcessor::decode_upload(&std::fs::read("leaf.jpg")?)?;
//! let encoded = ImageProcessor::encode(&image)?;
//! println!("{} base64 chars", encoded.len());
//! ```

use crate::error::{AppError, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use image::{DynamicImage, ImageFormat, ImageReader};
use std::borrow::Cow;
use std::fmt;
use std::io::Cursor;

/// MIME type of the inline image data produced by [`ImageProcessor::encode`].
pub const ENCODED_MIME_TYPE: &str = "image/png";

/// Upload formats accepted by [`ImageProcessor::decode_upload`].
pub const SUPPORTED_FORMATS: &[ImageFormat] = &[ImageFormat::Jpeg, ImageFormat::Png];

/// File extensions offered by file pickers.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Base64 text of a PNG-serialized image.
///
/// Built fresh for every analysis and never mutated afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedImage(String);

impl EncodedImage {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// Payloads run to megabytes; keep them out of debug output.
impl fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncodedImage({} bytes)", self.0.len())
    }
}

/// Image processing utilities for the analysis workflow.
pub struct ImageProcessor;

impl ImageProcessor {
    /// Serializes an image to PNG and encodes the bytes as standard,
    /// padded base64.
    ///
    /// Any pixel layout is accepted. Floating point layouts, which PNG
    /// cannot hold, are converted to 16-bit RGBA first.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Encoding`] if the image has a zero dimension or
    /// the PNG encoder rejects the pixel buffer.
    pub fn encode(image: &DynamicImage) -> Result<EncodedImage> {
        if image.width() == 0 || image.height() == 0 {
            return Err(AppError::encoding(format!(
                "image has zero dimension ({}x{})",
                image.width(),
                image.height()
            )));
        }

        let encodable = match image {
            DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
                Cow::Owned(DynamicImage::ImageRgba16(image.to_rgba16()))
            }
            _ => Cow::Borrowed(image),
        };

        let mut buffer: Vec<u8> = Vec::new();
        encodable
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .map_err(|e| AppError::encoding(format!("Failed to encode image: {}", e)))?;

        tracing::debug!(
            width = image.width(),
            height = image.height(),
            png_bytes = buffer.len(),
            "encoded image as PNG"
        );

        Ok(EncodedImage(BASE64.encode(buffer)))
    }

    /// Decodes an uploaded file, guessing its format from the content.
    ///
    /// Only JPEG and PNG are accepted.
    ///
    /// # Errors
    ///
    /// - [`AppError::Decoding`] if the data is empty or corrupt
    /// - [`AppError::UnsupportedFormat`] for any other image format
    pub fn decode_upload(bytes: &[u8]) -> Result<DynamicImage> {
        if bytes.is_empty() {
            return Err(AppError::decoding("file is empty"));
        }

        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| AppError::decoding(format!("Failed to read image: {}", e)))?;

        match reader.format() {
            Some(format) if SUPPORTED_FORMATS.contains(&format) => {}
            Some(format) => return Err(AppError::UnsupportedFormat(format!("{:?}", format))),
            None => return Err(AppError::UnsupportedFormat("unrecognized data".to_string())),
        }

        reader
            .decode()
            .map_err(|e| AppError::decoding(format!("Failed to decode image: {}", e)))
    }

    /// Returns true if the path has an extension accepted for upload.
    pub fn has_supported_extension(path: &std::path::Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, ImageBuffer, Rgb, Rgba};

    fn decode_base64_png(encoded: &EncodedImage) -> DynamicImage {
        let bytes = BASE64.decode(encoded.as_str()).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Png);
        image::load_from_memory(&bytes).unwrap()
    }

    #[test]
    fn encode_round_trips_dimensions() {
        let img = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(7, 3, Rgb([10, 200, 30])));
        let encoded = ImageProcessor::encode(&img).unwrap();
        assert!(!encoded.is_empty());

        let decoded = decode_base64_png(&encoded);
        assert_eq!(decoded.dimensions(), (7, 3));
        assert_eq!(decoded.to_rgb8().get_pixel(6, 2), &Rgb([10, 200, 30]));
    }

    #[test]
    fn encode_accepts_various_pixel_layouts() {
        let images = [
            DynamicImage::new_luma8(4, 5),
            DynamicImage::new_luma_a8(4, 5),
            DynamicImage::ImageRgba8(ImageBuffer::from_pixel(4, 5, Rgba([1, 2, 3, 128]))),
            DynamicImage::new_rgb16(4, 5),
            DynamicImage::new_rgb32f(4, 5),
            DynamicImage::new_rgba32f(4, 5),
        ];

        for img in &images {
            let encoded = ImageProcessor::encode(img).unwrap();
            assert_eq!(decode_base64_png(&encoded).dimensions(), (4, 5));
        }
    }

    #[test]
    fn encode_uses_padded_standard_alphabet() {
        let encoded = ImageProcessor::encode(&DynamicImage::new_rgb8(1, 1)).unwrap();
        assert!(encoded.as_str().len() % 4 == 0);
        assert!(
            encoded
                .as_str()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=')
        );
    }

    #[test]
    fn encode_rejects_zero_dimension() {
        let err = ImageProcessor::encode(&DynamicImage::new_rgb8(0, 10)).unwrap_err();
        assert!(matches!(err, AppError::Encoding(_)));
    }

    #[test]
    fn decode_upload_accepts_png_and_jpeg() {
        let img = DynamicImage::new_rgb8(6, 4);

        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png).unwrap();
        assert_eq!(ImageProcessor::decode_upload(&png).unwrap().dimensions(), (6, 4));

        let mut jpeg = Vec::new();
        img.write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg).unwrap();
        assert_eq!(ImageProcessor::decode_upload(&jpeg).unwrap().dimensions(), (6, 4));
    }

    #[test]
    fn decode_upload_rejects_empty_and_garbage() {
        assert!(matches!(
            ImageProcessor::decode_upload(&[]),
            Err(AppError::Decoding(_))
        ));
        assert!(matches!(
            ImageProcessor::decode_upload(b"definitely not an image"),
            Err(AppError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn decode_upload_rejects_truncated_png() {
        let png_signature = [137, 80, 78, 71, 13, 10, 26, 10];
        assert!(matches!(
            ImageProcessor::decode_upload(&png_signature),
            Err(AppError::Decoding(_))
        ));
    }

    #[test]
    fn supported_extensions_are_case_insensitive() {
        use std::path::Path;
        assert!(ImageProcessor::has_supported_extension(Path::new("leaf.JPG")));
        assert!(ImageProcessor::has_supported_extension(Path::new("leaf.png")));
        assert!(!ImageProcessor::has_supported_extension(Path::new("leaf.gif")));
        assert!(!ImageProcessor::has_supported_extension(Path::new("leaf")));
    }
}
