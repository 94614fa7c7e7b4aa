/// URL utilities shared by the feed parser and the article store.
pub mod url {
    use url::Url;

    const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_cid", "mc_eid", "ocid"];

    fn is_tracking_param(key: &str) -> bool {
        key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
    }

    /// Canonical form of an article link, or `None` if it is not an absolute
    /// http(s) URL. Idempotent: `canonicalize(canonicalize(x)) == canonicalize(x)`.
    pub fn canonicalize(raw: &str) -> Option<String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        let mut url = match Url::parse(trimmed) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let rest = trimmed.strip_prefix("//").unwrap_or(trimmed);
                Url::parse(&format!("https://{rest}")).ok()?
            }
            Err(_) => return None,
        };
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return None;
        }
        if url.scheme() == "http" {
            url.set_scheme("https").ok()?;
        }
        if url.port() == Some(443) {
            url.set_port(None).ok()?;
        }
        url.set_fragment(None);

        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !is_tracking_param(key))
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }

        let path = url.path().to_string();
        if path.len() > 1 && path.ends_with('/') {
            url.set_path(path.trim_end_matches('/'));
        }

        Some(url.to_string())
    }

    pub fn is_valid_feed_url(url_str: &str) -> bool {
        match Url::parse(url_str) {
            Ok(url) => matches!(url.scheme(), "http" | "https") && url.host().is_some(),
            Err(_) => false,
        }
    }
}

/// Plain-text helpers.
pub mod text {
    /// Number of Unicode scalar values, the unit every length setting is expressed in.
    pub fn char_len(text: &str) -> usize {
        text.chars().count()
    }

    /// The first `max_chars` characters of `text`, never splitting a code point.
    pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
        match text.char_indices().nth(max_chars) {
            Some((idx, _)) => &text[..idx],
            None => text,
        }
    }

    /// Deterministic summary used whenever AI enrichment is unavailable.
    pub fn fallback_summary(text: &str, max_chars: usize) -> String {
        format!("{}…", truncate_chars(text, max_chars))
    }

    pub fn collapse_whitespace(text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// `None` for missing or whitespace-only strings.
    pub fn non_empty(text: Option<String>) -> Option<String> {
        text.filter(|t| !t.trim().is_empty())
    }
}

/// HTML to text conversion for feed fields.
pub mod html {
    use scraper::{ElementRef, Html, Node};

    /// Elements whose contents are code or embeds, never readable text.
    pub const NON_TEXT_TAGS: &[&str] = &["script", "style", "noscript", "iframe", "template", "object"];

    /// Visible text of an HTML fragment with entities decoded and whitespace collapsed.
    pub fn to_plain_text(fragment: &str) -> String {
        if !fragment.contains('<') && !fragment.contains('&') {
            return super::text::collapse_whitespace(fragment);
        }
        let parsed = Html::parse_fragment(fragment);
        visible_text(parsed.root_element(), NON_TEXT_TAGS)
    }

    /// Text nodes under `root`, skipping any nested inside one of `skip_tags`.
    pub fn visible_text(root: ElementRef<'_>, skip_tags: &[&str]) -> String {
        let parts: Vec<&str> = root
            .descendants()
            .filter_map(|node| match node.value() {
                Node::Text(t) => Some((node, &**t)),
                _ => None,
            })
            .filter(|(node, _)| {
                !node
                    .ancestors()
                    .filter_map(|a| a.value().as_element())
                    .any(|e| skip_tags.contains(&e.name()))
            })
            .map(|(_, t)| t)
            .collect();
        super::text::collapse_whitespace(&parts.join(" "))
    }
}

/// Time formatting for run reports.
pub mod time {
    use std::time::Duration;

    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();

        if total_seconds < 60 {
            format!("{}.{:01}s", total_seconds, duration.subsec_millis() / 100)
        } else if total_seconds < 3600 {
            format!("{}m{:02}s", total_seconds / 60, total_seconds % 60)
        } else {
            format!("{}h{:02}m", total_seconds / 3600, (total_seconds % 3600) / 60)
        }
    }
}
