use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::{ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::AppError;
use crate::models::SignatureRaster;

/// Signature pad payload as it arrives over JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignaturePayload {
    pub width: u32,
    pub height: u32,
    /// Base64 of `width * height * 4` RGBA bytes.
    pub rgba: String,
}

impl TryFrom<SignaturePayload> for SignatureRaster {
    type Error = AppError;

    fn try_from(payload: SignaturePayload) -> Result<Self, Self::Error> {
        let rgba = BASE64
            .decode(payload.rgba.as_bytes())
            .map_err(|e| AppError::Validation(format!("Signature is not valid base64: {}", e)))?;

        Ok(SignatureRaster {
            width: payload.width,
            height: payload.height,
            rgba,
        })
    }
}

impl SignatureRaster {
    /// An untouched pad is a single flat colour.
    pub fn is_blank(&self) -> bool {
        let mut pixels = self.rgba.chunks_exact(4);
        match pixels.next() {
            Some(first) => pixels.all(|pixel| pixel == first),
            None => true,
        }
    }
}

/// PNG-encodes the raster, or returns `None` when nothing was drawn.
#[instrument(skip_all)]
pub fn encode(raster: Option<&SignatureRaster>) -> Result<Option<Vec<u8>>, AppError> {
    let Some(raster) = raster else {
        return Ok(None);
    };

    let expected = (raster.width as usize)
        .checked_mul(raster.height as usize)
        .and_then(|pixels| pixels.checked_mul(4))
        .ok_or_else(|| {
            AppError::Validation(format!(
                "Signature raster of {}x{} is too large",
                raster.width, raster.height
            ))
        })?;

    if raster.width == 0 || raster.height == 0 || raster.rgba.len() != expected {
        return Err(AppError::Validation(format!(
            "Signature raster of {}x{} needs {} bytes, got {}",
            raster.width,
            raster.height,
            expected,
            raster.rgba.len()
        )));
    }

    if raster.is_blank() {
        debug!("Signature pad untouched, storing no signature");
        return Ok(None);
    }

    let image = RgbaImage::from_raw(raster.width, raster.height, raster.rgba.clone())
        .ok_or_else(|| AppError::Validation("Signature raster has the wrong size".to_string()))?;

    let mut png = Vec::new();
    image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

    debug!(bytes = png.len(), "Encoded signature as PNG");
    Ok(Some(png))
}

pub fn decode(png: &[u8]) -> Result<RgbaImage, AppError> {
    let image = image::load_from_memory_with_format(png, ImageFormat::Png)?;
    Ok(image.to_rgba8())
}
