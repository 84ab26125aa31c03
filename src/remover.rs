use std::io::Cursor;

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::{ImageFormat, RgbaImage};
use tracing::debug;

use crate::config::RembgConfig;

/// Filename of the cutout photo sent back to the chat.
pub const OUTPUT_FILENAME: &str = "no_bg.png";

/// A pre-trained model that returns its input image with background pixels
/// made transparent. The model itself lives outside this crate; we only
/// consume it as an image-to-image function.
#[async_trait]
pub trait BackgroundRemover: Send + Sync {
    async fn remove(&self, image: RgbaImage) -> Result<RgbaImage>;
}

/// Background removal backed by a rembg-compatible HTTP service
/// (`rembg s` exposes `POST /api/remove` taking a multipart file).
pub struct RembgService {
    client: reqwest::Client,
    endpoint: String,
}

impl RembgService {
    pub fn new(config: RembgConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint,
        }
    }
}

#[async_trait]
impl BackgroundRemover for RembgService {
    async fn remove(&self, image: RgbaImage) -> Result<RgbaImage> {
        let png = encode_png(&image)?;

        debug!("Sending {} byte image to {}", png.len(), self.endpoint);

        let part = reqwest::multipart::Part::bytes(png)
            .file_name("image.png")
            .mime_str("image/png")
            .context("Failed to build multipart body")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .context("Failed to reach the background removal service")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Background removal service error ({})", status);
        }

        let bytes = response
            .bytes()
            .await
            .context("Failed to read the background removal response")?;

        decode_rgba(&bytes)
    }
}

/// Full photo pipeline: decode the downloaded bytes to an in-memory RGBA
/// image, run the remover, re-encode the cutout as PNG bytes for upload.
pub async fn remove_background(
    bytes: &[u8],
    remover: &dyn BackgroundRemover,
) -> Result<Vec<u8>> {
    let input = decode_rgba(bytes)?;
    let cutout = remover.remove(input).await?;
    encode_png(&cutout)
}

fn decode_rgba(bytes: &[u8]) -> Result<RgbaImage> {
    let decoded = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .context("Failed to sniff image format")?
        .decode()
        .context("Failed to decode image")?;
    Ok(decoded.to_rgba8())
}

fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .context("Failed to encode PNG")?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    /// Stand-in model: blanks the alpha channel of every pixel.
    struct ClearAlpha;

    #[async_trait]
    impl BackgroundRemover for ClearAlpha {
        async fn remove(&self, mut image: RgbaImage) -> Result<RgbaImage> {
            for pixel in image.pixels_mut() {
                pixel.0[3] = 0;
            }
            Ok(image)
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl BackgroundRemover for AlwaysFails {
        async fn remove(&self, _image: RgbaImage) -> Result<RgbaImage> {
            anyhow::bail!("inference failed")
        }
    }

    fn opaque_png(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]));
        encode_png(&image).unwrap()
    }

    #[tokio::test]
    async fn test_pipeline_outputs_png_with_transformed_alpha() {
        let input = opaque_png(3, 2);

        let output = remove_background(&input, &ClearAlpha).await.unwrap();

        assert_eq!(&output[..8], &PNG_MAGIC);
        let cutout = decode_rgba(&output).unwrap();
        assert_eq!(cutout.dimensions(), (3, 2));
        assert!(cutout.pixels().all(|p| p.0[3] == 0));
        // Color channels survive the round trip untouched.
        assert!(cutout.pixels().all(|p| p.0[..3] == [10, 20, 30]));
    }

    #[tokio::test]
    async fn test_pipeline_rejects_undecodable_bytes() {
        let err = remove_background(b"definitely not an image", &ClearAlpha)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("decode"));
    }

    #[tokio::test]
    async fn test_pipeline_propagates_model_failure() {
        let input = opaque_png(1, 1);
        let err = remove_background(&input, &AlwaysFails).await.unwrap_err();
        assert!(err.to_string().contains("inference failed"));
    }

    #[tokio::test]
    async fn test_rembg_service_decodes_returned_cutout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/remove"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(opaque_png(2, 2)))
            .expect(1)
            .mount(&server)
            .await;

        let service = RembgService::new(RembgConfig {
            endpoint: format!("{}/api/remove", server.uri()),
        });

        let cutout = service
            .remove(RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255])))
            .await
            .unwrap();
        assert_eq!(cutout.dimensions(), (2, 2));
    }

    #[tokio::test]
    async fn test_rembg_service_surfaces_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let service = RembgService::new(RembgConfig {
            endpoint: format!("{}/api/remove", server.uri()),
        });

        let err = service
            .remove(RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 255])))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("503"));
    }
}
