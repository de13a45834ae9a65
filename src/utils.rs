use reqwest::Url;

use crate::types::HarvestError;

/// Resolves `url` against `base_url`, dropping fragments. Returns `None` when
/// the result is not an http(s) url.
pub fn normalize_url(base_url: &str, url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() || url.starts_with("data:") {
        return None;
    }
    let mut new_url = match Url::parse(url) {
        Ok(u) => u,
        Err(_e) => Url::parse(base_url).ok()?.join(url).ok()?,
    };
    if new_url.scheme() != "http" && new_url.scheme() != "https" {
        return None;
    }
    // we remove the fragments (#)
    new_url.set_fragment(None);
    Some(new_url.to_string())
}

/// First value of the query parameter `name`, percent-decoded.
pub fn query_parameter(url: &str, name: &str) -> Option<String> {
    let u = Url::parse(url).ok()?;
    let mut pairs = u.query_pairs();
    pairs
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

pub fn search_url(base_url: &str, query: &str, photo_type: &str) -> Result<String, HarvestError> {
    let url = format!(
        "{}?text={}&type={}",
        base_url,
        urlencoding::encode(query),
        urlencoding::encode(photo_type)
    );
    Url::parse(&url).map_err(|e| HarvestError::InvalidUrl(format!("{}: {}", url, e)))?;
    Ok(url)
}

/// Text after the last `.` of the url, or the whole url if it has none.
pub fn trailing_segment(url: &str) -> &str {
    match url.rsplit_once('.') {
        Some((_, ext)) => ext,
        None => url,
    }
}

pub fn contains_marker(text: &str, markers: &[String]) -> bool {
    markers.iter().any(|m| text.contains(m.as_str()))
}
