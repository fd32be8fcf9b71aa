use crate::UrlError;
use url::Url;

/// Query parameters that only carry tracking data and never identify a product
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid", "ref", "ref_", "source"];

/// Resolves a scraped link against the page it was found on and normalizes it
/// into the canonical form used as the deduplication key
///
/// # Normalization Steps
///
/// 1. Resolve `href` relative to `page_url`; reject if malformed
/// 2. Require an HTTP(S) scheme (the scheme itself is kept)
/// 3. Lowercase the host and drop a `www.` prefix
/// 4. Normalize path:
///    - Remove dot segments (. and ..)
///    - Collapse repeated slashes
///    - Remove trailing slash (except for root /)
/// 5. Remove fragment
/// 6. Remove tracking query parameters
/// 7. Sort remaining query parameters by key
/// 8. Remove empty query string
///
/// # Arguments
///
/// * `href` - The link as it appeared in the page (absolute or relative)
/// * `page_url` - The URL of the page the link was scraped from
///
/// # Returns
///
/// * `Ok(Url)` - Canonical link
/// * `Err(UrlError)` - The link could not be resolved or is not HTTP(S)
///
/// # Examples
///
/// ```
/// use shelf_scout::url::canonicalize_link;
/// use url::Url;
///
/// let page = Url::parse("https://WWW.Shop.example/search?k=lamp").unwrap();
/// let link = canonicalize_link("/dp/B01/?ref_=sr_1&th=1#reviews", &page).unwrap();
/// assert_eq!(link.as_str(), "https://shop.example/dp/B01?th=1");
/// ```
pub fn canonicalize_link(href: &str, page_url: &Url) -> Result<Url, UrlError> {
    let href = href.trim();
    if href.is_empty() {
        return Err(UrlError::Malformed("empty link".to_string()));
    }

    let mut url = page_url
        .join(href)
        .map_err(|e| UrlError::Parse(format!("{}: {}", href, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS links are supported, got: {}",
            url.scheme()
        )));
    }

    let host = url.host_str().ok_or(UrlError::MissingHost)?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    Ok(url)
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", segments.join("/"))
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    // Stable, so repeated keys keep their relative order
    params.sort_by(|a, b| a.0.cmp(&b.0));

    params
}

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Url {
        Url::parse("https://books.example.com/catalogue/page-2.html").unwrap()
    }

    fn canon(href: &str) -> String {
        canonicalize_link(href, &page()).unwrap().to_string()
    }

    #[test]
    fn test_relative_link_resolved() {
        assert_eq!(
            canon("a-light-in-the-attic_1000/index.html"),
            "https://books.example.com/catalogue/a-light-in-the-attic_1000/index.html"
        );
    }

    #[test]
    fn test_parent_relative_link() {
        assert_eq!(
            canon("../media/cache/2c/da.jpg"),
            "https://books.example.com/media/cache/2c/da.jpg"
        );
    }

    #[test]
    fn test_scheme_kept() {
        let page = Url::parse("http://shop.example/").unwrap();
        let link = canonicalize_link("/item/1", &page).unwrap();
        assert_eq!(link.as_str(), "http://shop.example/item/1");
    }

    #[test]
    fn test_remove_www_and_lowercase() {
        assert_eq!(
            canon("https://WWW.Shop.EXAMPLE/Item/9"),
            "https://shop.example/Item/9"
        );
    }

    #[test]
    fn test_remove_trailing_slash() {
        assert_eq!(canon("https://shop.example/item/"), "https://shop.example/item");
    }

    #[test]
    fn test_keep_root_slash() {
        assert_eq!(canon("https://shop.example/"), "https://shop.example/");
    }

    #[test]
    fn test_remove_fragment() {
        assert_eq!(
            canon("https://shop.example/item#reviews"),
            "https://shop.example/item"
        );
    }

    #[test]
    fn test_remove_tracking_params() {
        assert_eq!(
            canon("https://shop.example/dp/B01?ref_=sr_1_1&utm_source=x&qid=9&keywords=lamp"),
            "https://shop.example/dp/B01?keywords=lamp&qid=9"
        );
    }

    #[test]
    fn test_all_tracking_params_removed() {
        for param in ["utm_medium", "fbclid", "gclid", "mc_eid", "ref", "ref_", "source"] {
            let href = format!("https://shop.example/item?{}=value", param);
            assert_eq!(canon(&href), "https://shop.example/item", "kept {}", param);
        }
    }

    #[test]
    fn test_encoded_values_survive_sorting() {
        assert_eq!(
            canon("https://shop.example/s?q=desk+lamp&b=%26"),
            "https://shop.example/s?b=%26&q=desk+lamp"
        );
    }

    #[test]
    fn test_multiple_slashes() {
        assert_eq!(
            canon("https://shop.example///path//to///item"),
            "https://shop.example/path/to/item"
        );
    }

    #[test]
    fn test_same_product_different_forms() {
        let a = canon("/catalogue/book_1/index.html?utm_campaign=x");
        let b = canon("https://www.books.example.com/catalogue/./book_1/index.html#top");
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_scheme() {
        let result = canonicalize_link("mailto:someone@example.com", &page());
        assert!(matches!(result.unwrap_err(), UrlError::InvalidScheme(_)));
    }

    #[test]
    fn test_empty_link() {
        assert!(canonicalize_link("   ", &page()).is_err());
    }
}
