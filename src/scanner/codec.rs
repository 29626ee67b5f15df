//! Image decoding and thumbnail encoding.
//!
//! The scanner only needs three things from a codec: the pixel size of a
//! source image, a scaled-down rendering of it, and a JPEG encoding of that
//! rendering. [`ImageCrateCodec`] provides them with the `image` crate.

use std::io::Cursor;

use image::imageops::FilterType;
use image::codecs::jpeg::JpegEncoder;
use image::ImageReader;

use crate::catalog::Rotation;

/// JPEG quality of stored thumbnails.
pub const THUMBNAIL_JPEG_QUALITY: u8 = 85;

/// Errors raised by an [`ImageCodec`].
#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    /// The `image` crate failed to decode or encode.
    #[error(transparent)]
    Image(#[from] image::ImageError),

    /// Reading the image header failed.
    #[error("cannot read image header: {0}")]
    Io(#[from] std::io::Error),

    /// A pixel buffer does not match its declared size.
    #[error("pixel buffer does not match {width}x{height}")]
    InvalidBuffer {
        /// Declared width
        width: u32,
        /// Declared height
        height: u32,
    },

    /// The data is not an image this codec understands.
    #[error("unsupported image: {0}")]
    Unsupported(String),
}

/// Pixel size of a source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    /// Width in pixels
    pub pixel_width: u32,
    /// Height in pixels
    pub pixel_height: u32,
}

/// A decoded 8-bit RGB image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbImage {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Row-major RGB triples
    pub pixels: Vec<u8>,
}

/// Image codec used by the scanner.
pub trait ImageCodec: Send + Sync {
    /// Read the pixel size of an encoded image.
    fn decode(&self, bytes: &[u8]) -> Result<ImageInfo, CodecError>;

    /// Decode an image and scale it to exactly `width` x `height`.
    fn decode_scaled(&self, bytes: &[u8], width: u32, height: u32)
        -> Result<RgbImage, CodecError>;

    /// Encode a decoded image as JPEG.
    fn encode_jpeg(&self, image: &RgbImage) -> Result<Vec<u8>, CodecError>;
}

/// [`ImageCodec`] backed by the `image` crate (JPEG, PNG, GIF).
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCrateCodec;

impl ImageCodec for ImageCrateCodec {
    fn decode(&self, bytes: &[u8]) -> Result<ImageInfo, CodecError> {
        let (pixel_width, pixel_height) = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()?
            .into_dimensions()?;
        Ok(ImageInfo {
            pixel_width,
            pixel_height,
        })
    }

    fn decode_scaled(
        &self,
        bytes: &[u8],
        width: u32,
        height: u32,
    ) -> Result<RgbImage, CodecError> {
        let image = image::load_from_memory(bytes)?;
        let scaled = image.resize_exact(width, height, FilterType::Triangle).to_rgb8();
        Ok(RgbImage {
            width: scaled.width(),
            height: scaled.height(),
            pixels: scaled.into_raw(),
        })
    }

    fn encode_jpeg(&self, image: &RgbImage) -> Result<Vec<u8>, CodecError> {
        let buffer = image::RgbImage::from_raw(image.width, image.height, image.pixels.clone())
            .ok_or(CodecError::InvalidBuffer {
                width: image.width,
                height: image.height,
            })?;
        let mut out = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut out, THUMBNAIL_JPEG_QUALITY);
        buffer.write_with_encoder(encoder)?;
        Ok(out)
    }
}

/// Display rotation from the EXIF orientation tag, [`Rotation::Rotate0`]
/// when there is no readable tag.
#[must_use]
pub fn exif_rotation(bytes: &[u8]) -> Rotation {
    let mut reader = Cursor::new(bytes);
    match exif::Reader::new().read_from_container(&mut reader) {
        Ok(exif_data) => exif_data
            .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .map_or(Rotation::Rotate0, Rotation::from_exif_orientation),
        Err(_) => Rotation::Rotate0,
    }
}
