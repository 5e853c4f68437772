// Thumbnail download for preview surfaces

/// Fetch settings for [`fetch_thumbnail`]
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailConfig {
    pub timeout_secs: u64,
    pub max_width: u32,
    pub max_height: u32,
    pub proxy: Option<String>,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_width: 220,
            max_height: 130,
            proxy: None,
        }
    }
}

/// Decoded RGBA8 image
#[derive(Debug, Clone, PartialEq)]
pub struct Thumbnail {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Download and downscale a thumbnail. Any failure yields `None`.
#[cfg(feature = "thumbnail")]
pub async fn fetch_thumbnail(url: &str, config: &ThumbnailConfig) -> Option<Thumbnail> {
    use std::time::Duration;

    let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(config.timeout_secs));
    if let Some(proxy_url) = &config.proxy {
        match reqwest::Proxy::all(proxy_url) {
            Ok(proxy) => builder = builder.proxy(proxy),
            Err(e) => tracing::debug!("[Thumbnail] ignoring bad proxy {}: {}", proxy_url, e),
        }
    }

    let client = match builder.build() {
        Ok(client) => client,
        Err(e) => {
            tracing::debug!("[Thumbnail] client error: {}", e);
            return None;
        }
    };

    let bytes = match client.get(url).send().await.and_then(|r| r.error_for_status()) {
        Ok(resp) => match resp.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!("[Thumbnail] read failed for {}: {}", url, e);
                return None;
            }
        },
        Err(e) => {
            tracing::debug!("[Thumbnail] request failed for {}: {}", url, e);
            return None;
        }
    };

    decode_and_fit(&bytes, config.max_width, config.max_height)
}

/// Without the `thumbnail` feature there is nothing to fetch with.
#[cfg(not(feature = "thumbnail"))]
pub async fn fetch_thumbnail(_url: &str, _config: &ThumbnailConfig) -> Option<Thumbnail> {
    None
}

/// Decode image bytes and shrink them to fit `max_width`x`max_height`,
/// keeping the aspect ratio.
#[cfg(feature = "thumbnail")]
pub fn decode_and_fit(bytes: &[u8], max_width: u32, max_height: u32) -> Option<Thumbnail> {
    let img = match image::load_from_memory(bytes) {
        Ok(img) => img,
        Err(e) => {
            tracing::debug!("[Thumbnail] decode failed: {}", e);
            return None;
        }
    };

    // scales to fit inside the box, aspect ratio preserved
    let rgba = img.thumbnail(max_width, max_height).to_rgba8();
    Some(Thumbnail {
        width: rgba.width(),
        height: rgba.height(),
        rgba: rgba.into_raw(),
    })
}
