//! Local copies of channel logos, scaled to the 16:9 tiles the pages show.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use thiserror::Error;

use super::Catalogue;

/// Served in place of channels whose logo is absent or unusable.
pub const MISSING_LOGO: &str = "/assets/images/missing_logo.png";
pub const LOGO_WIDTH: u32 = 320;
pub const LOGO_HEIGHT: u32 = 180;

#[derive(Debug, Error)]
pub enum LogoError {
    #[error("failed to fetch logo: {0}")]
    Http(#[from] reqwest::Error),
    #[error("logo request returned {0}")]
    Status(reqwest::StatusCode),
    #[error("failed to decode logo: {0}")]
    Image(#[from] image::ImageError),
    #[error("failed to store logo: {0}")]
    Io(#[from] std::io::Error),
    #[error("logo worker failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Directory of scaled PNG logos, one file per channel id.
#[derive(Debug, Clone)]
pub struct LogoCache {
    dir: PathBuf,
    client: reqwest::Client,
}

impl LogoCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cache file name for `id`. Base64 ids may contain `/`.
    pub fn file_name(id: &str) -> String {
        format!("{}.png", id.replace('/', "_"))
    }

    /// Path under `/logo/` for `id`, downloading and scaling `raw_logo` on
    /// a cache miss. Any failure yields [`MISSING_LOGO`].
    pub async fn resolve(&self, id: &str, raw_logo: Option<&str>) -> String {
        let Some(raw) = raw_logo.filter(|raw| !raw.trim().is_empty()) else {
            return MISSING_LOGO.to_string();
        };
        match self.fetch(id, raw).await {
            Ok(route) => route,
            Err(err) => {
                tracing::warn!(target: "m3u", channel = id, logo = raw, error = %err, "using placeholder logo");
                MISSING_LOGO.to_string()
            }
        }
    }

    async fn fetch(&self, id: &str, raw: &str) -> Result<String, LogoError> {
        let name = Self::file_name(id);
        let route = format!("/logo/{name}");
        let path = self.dir.join(&name);
        if tokio::fs::metadata(&path)
            .await
            .is_ok_and(|meta| meta.is_file())
        {
            return Ok(route);
        }

        let response = self.client.get(raw).send().await?;
        if !response.status().is_success() {
            return Err(LogoError::Status(response.status()));
        }
        let bytes = response.bytes().await?;
        let png = tokio::task::spawn_blocking(move || scale(&bytes)).await??;

        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&path, png).await?;
        tracing::debug!(target: "m3u", channel = id, path = %path.display(), "cached logo");
        Ok(route)
    }

    /// Points every channel at its cached logo. Channels left without one
    /// get `None`, which the pages render as [`MISSING_LOGO`].
    pub async fn localize(&self, catalogue: &mut Catalogue) {
        for channel in catalogue.channels_mut() {
            let logo = self.resolve(&channel.id, channel.logo.as_deref()).await;
            channel.logo = (logo != MISSING_LOGO).then_some(logo);
        }
    }
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

fn scale(bytes: &[u8]) -> Result<Vec<u8>, image::ImageError> {
    let logo = image::load_from_memory(bytes)?.resize_exact(LOGO_WIDTH, LOGO_HEIGHT, FilterType::Lanczos3);
    encode_png(&logo)
}

/// Flat grey tile served at [`MISSING_LOGO`].
pub fn placeholder_png() -> Result<Vec<u8>, image::ImageError> {
    let tile = RgbImage::from_pixel(LOGO_WIDTH, LOGO_HEIGHT, Rgb([48, 48, 48]));
    encode_png(&DynamicImage::ImageRgb8(tile))
}
