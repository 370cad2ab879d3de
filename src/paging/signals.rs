use reqwest::header::{HeaderMap, LINK};
use reqwest::Url;
use tracing::debug;

/// Pagination hints a listing response carries.
///
/// GitHub describes its pages through the `Link` header (`rel="next"`, `rel="last"`);
/// GitLab sends `X-Page`, `X-Next-Page`, `X-Total` and `X-Total-Pages`, dropping the
/// totals on very large result sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageSignals {
    pub current_page: Option<u32>,
    pub next_page: Option<u32>,
    pub last_page: Option<u32>,
    /// `per_page` as echoed in the `Link` URLs.
    pub link_per_page: Option<u32>,
    pub total_items: Option<u64>,
    pub total_pages: Option<u32>,
    /// Whether a `Link` header was present at all.
    pub has_links: bool,
}

impl PageSignals {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut signals = headers
            .get(LINK)
            .and_then(|value| value.to_str().ok())
            .map(parse_link_header)
            .unwrap_or_default();

        signals.current_page = header_number(headers, "x-page").or(signals.current_page);
        if let Some(next) = header_number(headers, "x-next-page") {
            signals.next_page = Some(next);
        }
        signals.total_items = header_number(headers, "x-total");
        signals.total_pages = header_number(headers, "x-total-pages");
        signals
    }

    /// Page to fetch after `page`, or `None` when the listing is exhausted.
    pub fn next_after(&self, page: u32) -> Option<u32> {
        if let Some(next) = self.next_page {
            return Some(next);
        }
        match self.total_pages {
            Some(total) if page < total => Some(page + 1),
            _ => None,
        }
    }
}

/// Parse an RFC 8288 `Link` header as GitHub emits it.
pub fn parse_link_header(value: &str) -> PageSignals {
    let mut signals = PageSignals {
        has_links: true,
        ..PageSignals::default()
    };

    for part in value.split(',') {
        let part = part.trim();
        let (Some(open), Some(close)) = (part.find('<'), part.find('>')) else {
            continue;
        };
        if close <= open + 1 {
            continue;
        }
        let url = match Url::parse(&part[open + 1..close]) {
            Ok(url) => url,
            Err(err) => {
                debug!(error = %err, "skipping unparseable Link URL");
                continue;
            }
        };

        let mut page = None;
        for (key, val) in url.query_pairs() {
            match key.as_ref() {
                "page" => page = val.parse::<u32>().ok(),
                "per_page" => {
                    if let Ok(per_page) = val.parse::<u32>() {
                        signals.link_per_page = Some(per_page);
                    }
                }
                _ => {}
            }
        }

        let params = &part[close + 1..];
        if params.contains("rel=\"next\"") {
            signals.next_page = page;
        } else if params.contains("rel=\"last\"") {
            signals.last_page = page;
        }
    }

    signals
}

fn header_number<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers
        .get(name)?
        .to_str()
        .ok()
        .map(str::trim)
        .filter(|value| !value.is_empty())?
        .parse()
        .ok()
}
