//! Article URL construction.

use prts_core::Error;
use url::Url;

/// URL of a wiki article: `base` with the article name appended as one
/// percent-encoded path segment.
///
/// `base` must be an absolute http(s) URL; a trailing slash is optional.
pub fn article_url(base: &str, article: &str) -> Result<Url, Error> {
    let article = article.trim();
    if article.is_empty() {
        return Err(Error::InvalidInput("article name is empty".into()));
    }

    let mut url = Url::parse(base.trim()).map_err(|e| Error::InvalidUrl(format!("{base}: {e}")))?;
    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(Error::InvalidUrl(format!("unsupported scheme: {scheme}"))),
    }

    url.path_segments_mut()
        .map_err(|_| Error::InvalidUrl(format!("{base} cannot be a base URL")))?
        .pop_if_empty()
        .push(article);
    url.set_fragment(None);

    Ok(url)
}
