use image::{
    codecs::{
        jpeg::JpegEncoder,
        png::{CompressionType, FilterType as PngFilter, PngEncoder},
    },
    imageops::FilterType,
    DynamicImage, ImageFormat,
};

use super::services::IngestError;

/// Raster formats the optimizer re-encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    Jpeg,
    Png,
}

impl RasterFormat {
    pub fn from_mime(content_type: &str) -> Option<Self> {
        match essence(content_type).as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }

    fn image_format(self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
        }
    }
}

/// `"Image/JPEG; charset=binary"` -> `"image/jpeg"`
pub fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

#[derive(Debug, Clone, Copy)]
pub struct TransformSettings {
    pub max_dimension: u32,
    pub jpeg_quality: u8,
}

#[derive(Debug)]
pub struct Optimized {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Decodes, bounds the longest edge to `max_dimension` and re-encodes in the
/// same format. Smaller images keep their size.
pub fn optimize(
    data: &[u8],
    format: RasterFormat,
    settings: &TransformSettings,
) -> Result<Optimized, IngestError> {
    let img = image::load_from_memory_with_format(data, format.image_format())
        .map_err(|e| IngestError::Decode(e.to_string()))?;

    let max = settings.max_dimension;
    let img = if img.width() > max || img.height() > max {
        img.resize(max, max, FilterType::Lanczos3)
    } else {
        img
    };

    let mut bytes = Vec::new();
    let encoded = match format {
        RasterFormat::Jpeg => {
            // JPEG has no alpha channel
            DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(
                JpegEncoder::new_with_quality(&mut bytes, settings.jpeg_quality),
            )
        }
        RasterFormat::Png => img.write_with_encoder(PngEncoder::new_with_quality(
            &mut bytes,
            CompressionType::Best,
            PngFilter::Adaptive,
        )),
    };
    encoded.map_err(|e| IngestError::Internal(format!("encode {:?}: {}", format, e)))?;

    Ok(Optimized {
        bytes,
        width: img.width(),
        height: img.height(),
    })
}
