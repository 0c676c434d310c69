//! server-icon.png: любая картинка до 2 МБ обрезается по центру до 64x64.

use image::imageops::FilterType;
use image::ImageFormat;
use mcpanel_core::{AddonError, Result};
use std::io::Cursor;

use crate::gateway::ServerGateway;

pub const ICON_FILE: &str = "server-icon.png";
pub const MAX_ICON_BYTES: usize = 2 * 1024 * 1024;
pub const ICON_SIZE: u32 = 64;

/// Декодирует, заполняет квадрат 64x64 и кодирует в PNG
pub fn render_icon(bytes: &[u8]) -> Result<Vec<u8>> {
    if bytes.is_empty() {
        return Err(AddonError::Validation("The icon field is required.".into()));
    }
    if bytes.len() > MAX_ICON_BYTES {
        return Err(AddonError::Validation(
            "The icon must not be greater than 2048 kilobytes.".into(),
        ));
    }

    let img = image::load_from_memory(bytes).map_err(|e| AddonError::Image(e.to_string()))?;
    let icon = img.resize_to_fill(ICON_SIZE, ICON_SIZE, FilterType::Lanczos3);

    let mut out = Cursor::new(Vec::new());
    icon.write_to(&mut out, ImageFormat::Png)
        .map_err(|e| AddonError::Image(e.to_string()))?;
    Ok(out.into_inner())
}

pub async fn set_icon(gateway: &dyn ServerGateway, server: &str, bytes: &[u8]) -> Result<()> {
    let png = render_icon(bytes)?;
    gateway.put_content(server, ICON_FILE, png).await?;
    log::info!("Server icon updated for {}", server);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::FakeGateway;
    use image::{GenericImageView, RgbaImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, image::Rgba([200, 40, 40, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_cover_resize() {
        let icon = render_icon(&png(300, 120)).unwrap();
        let decoded = image::load_from_memory(&icon).unwrap();
        assert_eq!(decoded.dimensions(), (64, 64));
    }

    #[test]
    fn test_rejects_garbage_and_oversize() {
        assert!(matches!(render_icon(b"not an image"), Err(AddonError::Image(_))));
        assert!(matches!(render_icon(&[]), Err(AddonError::Validation(_))));
        let huge = vec![0u8; MAX_ICON_BYTES + 1];
        assert!(matches!(render_icon(&huge), Err(AddonError::Validation(_))));
    }

    #[tokio::test]
    async fn test_set_icon_writes_png() {
        let gw = FakeGateway::new();
        set_icon(&gw, "srv", &png(16, 16)).await.unwrap();
        assert!(gw.called("write server-icon.png"));
        assert!(gw.has("server-icon.png"));
    }
}
