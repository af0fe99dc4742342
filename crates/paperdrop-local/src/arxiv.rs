//! Minimal arXiv metadata client (Atom feed) for PDF URL resolution.
//!
//! Notes:
//! - ArXiv exposes an Atom API at `https://export.arxiv.org/api/query`.
//! - Parsing is deliberately minimal and resilient: only the entry id, title,
//!   and PDF link are read.
//! - When the feed omits the PDF link, the canonical `/pdf/<id>.pdf` shape is
//!   used instead.

use paperdrop_core::{Error, Result};

/// Atom API endpoint, `PAPERDROP_ARXIV_ENDPOINT`-overridable. Resolved once
/// at client construction; `lookup_pdf_url` takes the endpoint as a value so
/// no call reads process environment.
pub fn arxiv_api_endpoint() -> Result<reqwest::Url> {
    let s = std::env::var("PAPERDROP_ARXIV_ENDPOINT")
        .ok()
        .unwrap_or_else(|| "https://export.arxiv.org/api/query".to_string());
    let url = reqwest::Url::parse(s.trim()).map_err(|e| Error::Download(e.to_string()))?;
    Ok(url)
}

#[derive(Debug, Clone, Default)]
pub struct ArxivEntry {
    pub arxiv_id: String,
    pub title: String,
    pub pdf_url: Option<String>,
}

fn normalize_ws(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

/// Extract an arXiv identifier from an abstract or PDF URL: the last path
/// segment with one trailing `.pdf` suffix removed. Works for both modern ids
/// (`2310.12345`, `2310.12345v2`) and whatever the URL's final segment holds.
pub fn arxiv_id_from_url(url: &str) -> Result<String> {
    let trimmed = url.trim();
    let last = trimmed.rsplit('/').next().unwrap_or("");
    let id = last.strip_suffix(".pdf").unwrap_or(last);
    if id.is_empty() {
        return Err(Error::InvalidUrl(format!("no arxiv id in url: {url}")));
    }
    Ok(id.to_string())
}

/// Canonical PDF URL for an arXiv id.
pub fn arxiv_pdf_url(id: &str) -> String {
    format!("https://arxiv.org/pdf/{}.pdf", id.trim())
}

fn link_attrs(e: &quick_xml::events::BytesStart) -> (Option<String>, Option<String>, Option<String>) {
    let mut rel = None;
    let mut ty = None;
    let mut href = None;
    for a in e.attributes().flatten() {
        let k = String::from_utf8_lossy(a.key.as_ref()).to_string();
        let v = a
            .unescape_value()
            .map(|v| v.to_string())
            .unwrap_or_default();
        match k.as_str() {
            "rel" => rel = Some(v),
            "type" => ty = Some(v),
            "href" => href = Some(v),
            _ => {}
        }
    }
    (rel, ty, href)
}

/// Parse the entries of an arXiv Atom feed. Malformed XML yields the entries
/// parsed so far rather than an error.
pub fn parse_atom(body: &str) -> Vec<ArxivEntry> {
    let mut reader = quick_xml::Reader::from_str(body);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    #[derive(Default)]
    struct Cur {
        id_url: String,
        title: String,
        pdf_url: Option<String>,
        in_entry: bool,
        cur_text: String,
    }

    let mut entries = Vec::new();
    let mut cur = Cur::default();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Eof) => break,
            Ok(quick_xml::events::Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name.ends_with("entry") {
                    cur = Cur {
                        in_entry: true,
                        ..Cur::default()
                    };
                }
                if cur.in_entry && name.ends_with("link") {
                    let (rel, ty, href) = link_attrs(&e);
                    if rel.as_deref() == Some("related") && ty.as_deref() == Some("application/pdf")
                    {
                        cur.pdf_url = href;
                    }
                }
            }
            Ok(quick_xml::events::Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if cur.in_entry && name.ends_with("link") {
                    let (rel, ty, href) = link_attrs(&e);
                    if rel.as_deref() == Some("related") && ty.as_deref() == Some("application/pdf")
                    {
                        cur.pdf_url = href;
                    }
                }
            }
            Ok(quick_xml::events::Event::Text(t)) => {
                if cur.in_entry {
                    let txt = t.unescape().map(|t| t.to_string()).unwrap_or_default();
                    cur.cur_text.push_str(&txt);
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if cur.in_entry {
                    let txt = normalize_ws(&cur.cur_text);
                    if name.ends_with("id") {
                        cur.id_url = txt;
                    } else if name.ends_with("title") {
                        cur.title = txt;
                    }
                    cur.cur_text.clear();

                    if name.ends_with("entry") {
                        cur.in_entry = false;
                        let arxiv_id = cur
                            .id_url
                            .rfind("/abs/")
                            .map(|i| cur.id_url[i + "/abs/".len()..].trim_matches('/').to_string())
                            .filter(|id| !id.is_empty())
                            .unwrap_or_else(|| cur.id_url.clone());
                        entries.push(ArxivEntry {
                            arxiv_id,
                            title: cur.title.clone(),
                            pdf_url: cur.pdf_url.clone(),
                        });
                    }
                }
            }
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    entries
}

/// Resolve an arXiv id to its PDF URL via the Atom `id_list` endpoint.
pub async fn lookup_pdf_url(
    http: &reqwest::Client,
    endpoint: reqwest::Url,
    id: &str,
    timeout_ms: u64,
) -> Result<String> {
    let id = id.trim();
    if id.is_empty() {
        return Err(Error::InvalidUrl("arxiv id must be non-empty".to_string()));
    }

    let mut url = endpoint;
    url.query_pairs_mut()
        .append_pair("id_list", id)
        .append_pair("max_results", "1");

    let resp = http
        .get(url)
        .timeout(std::time::Duration::from_millis(timeout_ms.max(1000)))
        .send()
        .await
        .map_err(|e| Error::Download(e.to_string()))?;
    let status = resp.status().as_u16();
    if !resp.status().is_success() {
        return Err(Error::Download(format!(
            "arxiv id_list query failed: HTTP {status}"
        )));
    }
    let body = resp
        .text()
        .await
        .map_err(|e| Error::Download(e.to_string()))?;
    let entries = parse_atom(&body);
    match entries.first() {
        Some(entry) => Ok(entry
            .pdf_url
            .clone()
            .unwrap_or_else(|| arxiv_pdf_url(id))),
        None => Err(Error::Download(format!("arxiv id not found: {id}"))),
    }
}
