use crate::platform::Platform;
use crate::search::{Hit, PlatformResult, NO_IMAGE_SENTINEL};
use serde::{Deserialize, Serialize};

/// Everything one search produced, one entry per platform that contributed hits,
/// in the order the platforms were requested.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct AggregateSearchResult {
    pub platforms: Vec<PlatformResult>,
}

impl AggregateSearchResult {
    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }

    pub fn total_hits(&self) -> usize {
        self.platforms.iter().map(|p| p.hits.len()).sum()
    }

    /// Looks a hit up by URL, returning it with the platform it came from.
    pub fn find_hit(&self, url: &str) -> Option<(&Platform, &Hit)> {
        self.platforms.iter().find_map(|block| {
            block
                .hits
                .iter()
                .find(|hit| hit.url == url)
                .map(|hit| (&block.platform, hit))
        })
    }
}

/// Collects per-platform results into one aggregate. Order is preserved, nothing
/// is deduplicated across platforms, and a platform appearing twice keeps only
/// its first result.
pub fn aggregate(results: Vec<PlatformResult>) -> AggregateSearchResult {
    let mut platforms: Vec<PlatformResult> = Vec::with_capacity(results.len());
    for result in results {
        if platforms.iter().any(|p| p.platform == result.platform) {
            continue;
        }
        platforms.push(result);
    }
    AggregateSearchResult { platforms }
}

/// Cleans up a schema-valid result: trims text, turns blank optional fields and
/// the no-image placeholder into `None`, and drops hits without a title or URL.
pub fn normalize(result: PlatformResult) -> PlatformResult {
    let hits = result
        .hits
        .into_iter()
        .filter_map(normalize_hit)
        .collect();
    PlatformResult {
        platform: result.platform,
        hits,
    }
}

fn normalize_hit(hit: Hit) -> Option<Hit> {
    let title = hit.title.trim().to_string();
    let url = hit.url.trim().to_string();
    if title.is_empty() || url.is_empty() {
        return None;
    }
    Some(Hit {
        title,
        url,
        rating: non_blank(hit.rating),
        price: non_blank(hit.price),
        image_url: non_blank(hit.image_url).filter(|image| {
            image != NO_IMAGE_SENTINEL
                && (image.starts_with("http://") || image.starts_with("https://"))
        }),
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
