//! QR code rendering for public profile URLs

use qrcode::{render::svg, EcLevel, QrCode};

use crate::error::ProfileError;

/// Smallest rendered edge in pixels
const MIN_DIMENSION: u32 = 256;

/// Render `url` as an SVG QR code
pub fn render_qr_svg(url: &str) -> Result<String, ProfileError> {
    let code = QrCode::with_error_correction_level(url.as_bytes(), EcLevel::M)
        .map_err(|e| ProfileError::Qr(e.to_string()))?;

    Ok(code
        .render::<svg::Color>()
        .min_dimensions(MIN_DIMENSION, MIN_DIMENSION)
        .quiet_zone(true)
        .build())
}
