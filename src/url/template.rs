use crate::UrlError;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::form_urlencoded;
use url::Url;

/// Everything but RFC 3986 unreserved characters is escaped in a path segment
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Fills a source's URL template with a search term and page index
///
/// `{page}` is replaced by the page index. `{term}` is form-encoded in the
/// query (a space becomes `+`) and percent-encoded in the path (a space
/// becomes `%20`, a slash `%2F`). The result must be an absolute HTTP(S) URL.
///
/// # Examples
///
/// ```
/// use shelf_scout::url::build_target_url;
///
/// let url = build_target_url("https://shop.example/s?k={term}&page={page}", "desk lamp", 2).unwrap();
/// assert_eq!(url.as_str(), "https://shop.example/s?k=desk+lamp&page=2");
/// ```
pub fn build_target_url(template: &str, term: &str, page: u32) -> Result<Url, UrlError> {
    let (path, query) = match template.find('?') {
        Some(pos) => template.split_at(pos),
        None => (template, ""),
    };

    let in_path = utf8_percent_encode(term, PATH_SEGMENT).to_string();
    let in_query: String = form_urlencoded::byte_serialize(term.as_bytes()).collect();

    let filled = format!(
        "{}{}",
        path.replace("{term}", &in_path),
        query.replace("{term}", &in_query)
    )
    .replace("{page}", &page.to_string());

    let url = Url::parse(&filled).map_err(|e| UrlError::Parse(format!("{}: {}", filled, e)))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(UrlError::InvalidScheme(other.to_string())),
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    Ok(url)
}
