//! Small string and URL helpers shared across the pipeline

use crate::types::Counts;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;
use url::Url;

#[allow(clippy::expect_used)]
static HOSTNAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?\.)+[A-Za-z]{2,63}$")
        .expect("hostname pattern is valid")
});

#[allow(clippy::expect_used)]
static UNSAFE_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9 ._()-]").expect("filename pattern is valid"));

/// Shorten `s` to at most `max_length` characters for log output
///
/// Longer strings end in `...`; line breaks are flattened to spaces.
pub fn head_str(s: &str, max_length: usize) -> String {
    let shortened = if s.chars().count() > max_length {
        let keep = max_length.saturating_sub(3);
        let head: String = s.chars().take(keep).collect();
        format!("{}...", head.trim_end())
    } else {
        s.to_string()
    };
    shortened.replace("\r\n", " ").replace('\n', " ")
}

/// Host part of a URL, falling back to the raw string when it has none
pub fn host_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

/// Whether the string has at least one letter or digit
pub fn contains_alphanumeric(s: &str) -> bool {
    s.chars().any(char::is_alphanumeric)
}

/// Parse one candidate string as a fetchable URL
///
/// A missing scheme defaults to `http://`. Query and fragment are dropped so the
/// same page is not queued twice under different tracking parameters.
pub fn parse_url(candidate: &str) -> Option<Url> {
    let with_scheme = if candidate.starts_with("http") {
        candidate.to_string()
    } else {
        format!("http://{}", candidate)
    };

    let mut url = Url::parse(&with_scheme).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    match url.host() {
        Some(url::Host::Domain(domain)) if HOSTNAME.is_match(domain) => {}
        Some(url::Host::Ipv4(_)) | Some(url::Host::Ipv6(_)) => {}
        _ => return None,
    }

    url.set_query(None);
    url.set_fragment(None);
    Some(url)
}

/// Pick the unique URLs out of whitespace-separated input lines
///
/// Every whitespace-separated token counts as one string in `counts`. The URLs
/// themselves are counted once the cache resolves them.
pub fn identify_urls<S: AsRef<str>>(lines: &[S], counts: &Counts) -> BTreeSet<String> {
    let mut urls = BTreeSet::new();
    let mut strings = 0;

    for line in lines {
        for token in line.as_ref().split_whitespace() {
            strings += 1;
            match parse_url(token) {
                Some(url) => {
                    let url = url.to_string();
                    if urls.contains(&url) {
                        tracing::warn!(url = %url, "already queued");
                    } else {
                        tracing::info!(url = %url, "queued");
                        urls.insert(url);
                    }
                }
                None => tracing::debug!(token = %token, "not an URL"),
            }
        }
    }

    counts.add_strings(strings);
    urls
}

/// Make a report title usable as a file name
pub fn sanitize_filename(title: &str) -> String {
    UNSAFE_FILENAME_CHARS.replace_all(title, "_").into_owned()
}
