use crate::error::BreadboxError;
use crate::http::HttpClient;
use crate::models::Torrent;
use tracing::{debug, info, instrument, warn};

pub const NYAA_ORIGIN: &str = "https://nyaa.si";

/// Scrapes torrent pages on a nyaa-style index for their download links.
pub struct NyaaClient {
    http: HttpClient,
    origin: String,
}

/// Links found on a torrent page. The first match of each kind wins.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PageLinks {
    pub magnet: Option<String>,
    pub file: Option<String>,
}

impl NyaaClient {
    pub fn new(http: HttpClient) -> Self {
        Self::with_origin(http, NYAA_ORIGIN)
    }

    pub fn with_origin(http: HttpClient, origin: &str) -> Self {
        Self {
            http,
            origin: origin.trim_end_matches('/').to_string(),
        }
    }

    pub fn page_url(&self, torrent_id: u64) -> String {
        format!("{}/view/{}", self.origin, torrent_id)
    }

    #[instrument(skip(self))]
    pub async fn fetch(&self, torrent_id: u64) -> Result<Torrent, BreadboxError> {
        let url = self.page_url(torrent_id);
        info!("Fetching torrent page {}", url);

        let html = self.http.get_text(&url).await?;
        debug!("Received HTML response: {} chars", html.len());

        let links = extract_links(&html);
        let Some(magnet) = links.magnet else {
            warn!("No magnet link on {}", url);
            return Err(BreadboxError::Parse(format!("no magnet link found on {}", url)));
        };

        let file = links.file.map(|href| {
            if href.starts_with("http://") || href.starts_with("https://") {
                href
            } else {
                format!("{}/{}", self.origin, href.trim_start_matches('/'))
            }
        });

        Ok(Torrent { magnet, file, url })
    }
}

/// Walks every `<a ...>` start tag in document order and keeps the first
/// magnet href and the first `.torrent` href.
pub fn extract_links(html: &str) -> PageLinks {
    let lowered = html.to_ascii_lowercase();
    let mut links = PageLinks::default();

    let mut start_pos = 0;
    while let Some(tag_start) = lowered[start_pos..].find("<a") {
        let actual_start = start_pos + tag_start;
        let after_name = actual_start + 2;

        let Some(end_pos) = lowered[actual_start..].find('>') else {
            break;
        };
        let tag_end = actual_start + end_pos + 1;
        start_pos = tag_end;

        // Skip <abbr>, <area> and friends.
        let is_anchor = lowered[after_name..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_whitespace() || c == '>' || c == '/');
        if !is_anchor {
            continue;
        }

        let Some(href) = extract_attribute(&html[actual_start..tag_end], "href") else {
            continue;
        };

        if href.starts_with("magnet:?") {
            if links.magnet.is_none() {
                links.magnet = Some(href);
            }
        } else if href.ends_with(".torrent") && links.file.is_none() {
            links.file = Some(href);
        }

        if links.magnet.is_some() && links.file.is_some() {
            break;
        }
    }

    links
}

/// Reads a quoted or bare attribute value from a single start tag.
fn extract_attribute(tag: &str, name: &str) -> Option<String> {
    let lowered = tag.to_ascii_lowercase();
    let mut search_from = 0;

    while let Some(found) = lowered[search_from..].find(name) {
        let name_start = search_from + found;
        let name_end = name_start + name.len();
        search_from = name_end;

        let preceded_by_space = lowered[..name_start]
            .chars()
            .last()
            .is_some_and(|c| c.is_ascii_whitespace());
        if !preceded_by_space {
            continue;
        }

        let rest = tag[name_end..].trim_start();
        let Some(rest) = rest.strip_prefix('=') else {
            continue;
        };
        let rest = rest.trim_start();

        let value = match rest.chars().next() {
            Some(quote @ ('"' | '\'')) => {
                let inner = &rest[1..];
                &inner[..inner.find(quote)?]
            }
            Some(_) => {
                let end = rest
                    .find(|c: char| c.is_ascii_whitespace() || c == '>')
                    .unwrap_or(rest.len());
                &rest[..end]
            }
            None => return None,
        };

        return Some(unescape(value));
    }

    None
}

/// Decodes the character references that show up in hrefs.
fn unescape(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let decoded = rest.find(';').and_then(|semi| {
            let entity = &rest[1..semi];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, semi))
        });

        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
