use anyhow::{Context, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;

use crate::storage::Source;
use crate::util::validate_url;

/// SEC-003: Maximum allowed nesting depth for OPML outline elements.
/// Prevents stack overflow attacks from maliciously crafted deeply nested OPMLs.
const MAX_OPML_DEPTH: usize = 50;

/// Errors that can occur during OPML parsing.
#[derive(Debug, Error)]
pub enum OpmlError {
    /// SEC-003: OPML nesting depth exceeds safety limit.
    #[error("OPML nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),

    /// XML parsing failed.
    #[error("XML parse error: {0}")]
    XmlParse(String),
}

/// Reads an OPML subscription list and returns its feeds as sources.
///
/// Each `<outline>` carrying an `xmlUrl` becomes a [`Source`] named after its
/// `title` attribute, falling back to `text`, then to the URL itself. Folder
/// outlines are traversed but not returned. Feeds with invalid URLs
/// (localhost, private IPs, non-HTTP schemes) are skipped with a warning.
///
/// # Security
///
/// XXE is not possible: `quick-xml` (0.37) does not parse `<!ENTITY>`
/// declarations, so custom entities fail to decode instead of expanding.
pub async fn load_sources(path: &Path) -> Result<Vec<Source>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read OPML file: {}", path.display()))?;
    parse_opml_content(&content)
}

fn parse_opml_content(content: &str) -> Result<Vec<Source>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut sources = Vec::new();
    let mut buf = Vec::new();
    let mut depth: usize = 0;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"outline" => {
                depth += 1;
                if depth > MAX_OPML_DEPTH {
                    return Err(OpmlError::MaxDepthExceeded(MAX_OPML_DEPTH).into());
                }
                if let Some(source) = outline_source(&e, &reader)? {
                    sources.push(source);
                }
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"outline" => {
                if let Some(source) = outline_source(&e, &reader)? {
                    sources.push(source);
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"outline" => {
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(OpmlError::XmlParse(e.to_string()).into()),
            _ => {}
        }
        buf.clear();
    }

    Ok(sources)
}

/// `Some(Source)` for a feed outline, `None` for folders and rejected URLs.
fn outline_source(e: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<Option<Source>> {
    let mut xml_url = None;
    let mut title = None;
    let mut text = None;

    for attr_result in e.attributes() {
        let attr = match attr_result {
            Ok(attr) => attr,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed OPML attribute");
                continue;
            }
        };
        let decoder = reader.decoder();
        match attr.key.as_ref() {
            b"xmlUrl" => xml_url = Some(attr.decode_and_unescape_value(decoder)?.into_owned()),
            b"title" => title = Some(attr.decode_and_unescape_value(decoder)?.into_owned()),
            b"text" => text = Some(attr.decode_and_unescape_value(decoder)?.into_owned()),
            _ => {}
        }
    }

    let Some(url) = xml_url else {
        return Ok(None);
    };

    if let Err(e) = validate_url(&url) {
        tracing::warn!(url = %url, error = %e, "Skipping invalid feed URL in OPML");
        return Ok(None);
    }

    let name = title
        .or(text)
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| url.clone());
    Ok(Some(Source::new(name, url)))
}

/// Renders sources as an OPML 2.0 document (used by `fastrss sources --opml`).
pub fn export_opml(sources: &[Source]) -> Result<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    let mut root = BytesStart::new("opml");
    root.push_attribute(("version", "2.0"));

    emit(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    emit(&mut writer, Event::Start(root))?;
    emit(&mut writer, Event::Start(BytesStart::new("head")))?;
    emit(&mut writer, Event::Start(BytesStart::new("title")))?;
    emit(&mut writer, Event::Text(BytesText::new("fastrss sources")))?;
    emit(&mut writer, Event::End(BytesEnd::new("title")))?;
    emit(&mut writer, Event::End(BytesEnd::new("head")))?;
    emit(&mut writer, Event::Start(BytesStart::new("body")))?;

    for source in sources {
        let mut outline = BytesStart::new("outline");
        outline.push_attribute(("type", "rss"));
        outline.push_attribute(("text", source.name.as_str()));
        outline.push_attribute(("title", source.name.as_str()));
        outline.push_attribute(("xmlUrl", source.url.as_str()));
        emit(&mut writer, Event::Empty(outline))?;
    }

    emit(&mut writer, Event::End(BytesEnd::new("body")))?;
    emit(&mut writer, Event::End(BytesEnd::new("opml")))?;

    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).context("Generated OPML contains invalid UTF-8")
}

fn emit(writer: &mut Writer<Cursor<Vec<u8>>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .context("Failed to write OPML element")?;
    Ok(())
}
