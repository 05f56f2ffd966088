//! M3U playlist parsing and the channel catalogue built from it.

mod catalogue;
mod logo;

use std::io::BufRead;
use std::sync::LazyLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use regex::Regex;
use thiserror::Error;
use url::Url;

pub use catalogue::{Catalogue, CatalogueError, Category, Channel};
pub use logo::{placeholder_png, LogoCache, LogoError, LOGO_HEIGHT, LOGO_WIDTH, MISSING_LOGO};

pub const DEFAULT_CATEGORY: &str = "Uncategorized";

static ATTRIBUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([a-zA-Z0-9-]+?)="([^"]+)""#).expect("attribute pattern"));

#[derive(Debug, Error)]
pub enum M3uError {
    #[error("failed to read playlist: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to fetch playlist: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid m3u file format. Expected #EXTM3U file header")]
    MissingHeader,
    #[error("Invalid m3u file format. Expected EXTINF metadata to contain tvg attributes and channel name: {0}")]
    InvalidEntry(String),
    #[error("playlist ends before the media url of {0}")]
    MissingMediaUrl(String),
}

/// Reads a playlist. Channels are grouped by `group-title`; within a
/// category the first channel with a given id wins.
pub fn parse(reader: impl BufRead) -> Result<Catalogue, M3uError> {
    let mut catalogue = Catalogue::default();
    let mut lines = reader.lines();

    match lines.next().transpose()? {
        None => return Ok(catalogue),
        Some(first) if first.trim_start_matches('\u{feff}').starts_with("#EXTM3U") => {}
        Some(_) => return Err(M3uError::MissingHeader),
    }

    while let Some(line) = lines.next().transpose()? {
        let Some(info) = line.trim().strip_prefix("#EXTINF:") else {
            continue;
        };
        let (attributes, title) =
            split_entry(info).ok_or_else(|| M3uError::InvalidEntry(line.clone()))?;
        let media_url = lines
            .next()
            .transpose()?
            .ok_or_else(|| M3uError::MissingMediaUrl(title.to_string()))?;

        let mut channel = Channel {
            id: title.to_string(),
            title: title.to_string(),
            media_url: media_url.trim().to_string(),
            category: DEFAULT_CATEGORY.to_string(),
            ..Channel::default()
        };
        for capture in ATTRIBUTE.captures_iter(attributes) {
            let value = capture[2].to_string();
            match &capture[1] {
                "group-title" => channel.category = value,
                "tvg-id" => channel.id = value,
                "tvg-logo" => channel.logo = Some(value),
                "tvg-url" => channel.description = value,
                _ => {}
            }
        }
        channel.id = channel_id(&channel.id);
        catalogue.insert(channel);
    }

    tracing::info!(
        target: "m3u",
        categories = catalogue.categories().count(),
        channels = catalogue.channel_count(),
        "parsed playlist"
    );
    Ok(catalogue)
}

/// Reads a playlist from a local path or an `http(s)` URL.
pub async fn load(source: &str) -> Result<Catalogue, M3uError> {
    let remote = Url::parse(source)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"));
    let contents = if let Some(url) = remote {
        tracing::debug!(target: "m3u", %url, "fetching playlist");
        reqwest::get(url).await?.error_for_status()?.text().await?
    } else {
        tokio::fs::read_to_string(source).await?
    };
    parse(contents.as_bytes())
}

/// Splits `#EXTINF` data at the first comma outside quoted attribute
/// values.
fn split_entry(info: &str) -> Option<(&str, &str)> {
    let mut quoted = false;
    for (index, ch) in info.char_indices() {
        match ch {
            '"' => quoted = !quoted,
            ',' if !quoted => return Some((&info[..index], info[index + 1..].trim())),
            _ => {}
        }
    }
    None
}

fn channel_id(raw: &str) -> String {
    STANDARD.encode(raw.replace(' ', "_"))
}
