use image::DynamicImage;

use crate::core::errors::PipelineError;
use crate::core::types::ImageSource;

/// Decode an image from a path or an in-memory buffer on the blocking pool.
///
/// Decoding a full-screen capture is CPU-bound and would otherwise stall the
/// async runtime for tens of milliseconds.
pub async fn load_image_async(source: ImageSource) -> Result<DynamicImage, PipelineError> {
    tokio::task::spawn_blocking(move || load_image(&source)).await?
}

/// Synchronous counterpart of [`load_image_async`]
pub fn load_image(source: &ImageSource) -> Result<DynamicImage, PipelineError> {
    match source {
        ImageSource::Path(path) => image::open(path)
            .map_err(|e| PipelineError::ImageLoad(format!("{}: {}", path.display(), e))),
        ImageSource::Bytes(bytes) => image::load_from_memory(bytes)
            .map_err(|e| PipelineError::ImageLoad(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use std::path::PathBuf;

    fn red_png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([255, 0, 0, 255]),
        ));
        let mut png_bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
            .unwrap();
        png_bytes
    }

    #[tokio::test]
    async fn test_load_image_from_memory_async() {
        let source = ImageSource::from(red_png(4, 3));

        let img = load_image_async(source).await.unwrap();
        assert_eq!(img.width(), 4);
        assert_eq!(img.height(), 3);
    }

    #[tokio::test]
    async fn test_load_image_rejects_garbage() {
        let source = ImageSource::from(b"not an image".to_vec());

        let result = load_image_async(source).await;
        assert!(matches!(result, Err(PipelineError::ImageLoad(_))));
    }

    #[test]
    fn test_load_image_missing_path() {
        let source = ImageSource::from(PathBuf::from("/nonexistent/screenshot.png"));
        let err = load_image(&source).unwrap_err();
        assert!(err.to_string().contains("screenshot.png"));
    }
}
