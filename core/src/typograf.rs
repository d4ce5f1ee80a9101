//! SOAP client for the ArtLebedev typograph web service.
//!
//! # Design
//! Like the dispatcher, the client never does I/O: `build_process_text`
//! produces an `HttpRequest` and `parse_process_text` consumes the
//! `HttpResponse`. `typogrify` glues the two together over a `Transport`.
//!
//! The service expects HTML-escaped input, so the text is entity-escaped
//! once before being XML-escaped into the envelope.

use crate::error::TypografError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::transport::Transport;

/// Address of the SOAP web service.
pub const SERVICE_URL: &str = "http://typograf.artlebedev.ru/webservices/typograf.asmx";

/// SOAPAction header for the `ProcessText` operation.
pub const SOAP_ACTION: &str = "http://typograf.artlebedev.ru/webservices/ProcessText";

/// Encoding declared when the caller names none.
pub const DEFAULT_ENCODING: &str = "UTF-8";

const SOAP_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema";
const TYPOGRAF_NS: &str = "http://typograf.artlebedev.ru/webservices/";

// Fixed ProcessText parameters: entity output, <br> and <p> on, 3-char nobr.
const ENTITY_TYPE: u8 = 4;
const USE_BR: u8 = 1;
const USE_P: u8 = 1;
const MAX_NOBR: u8 = 3;

const RESULT_TAG: &str = "ProcessTextResult";

/// Stateless client for the typograph service.
#[derive(Debug, Clone)]
pub struct TypografClient {
    service_url: String,
}

impl Default for TypografClient {
    fn default() -> Self {
        Self::new(SERVICE_URL)
    }
}

impl TypografClient {
    pub fn new(service_url: &str) -> Self {
        Self {
            service_url: service_url.to_string(),
        }
    }

    pub fn service_url(&self) -> &str {
        &self.service_url
    }

    pub fn build_process_text(&self, text: &str, encoding: &str) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Post,
            url: self.service_url.clone(),
            headers: vec![
                ("Content-Type".to_string(), "text/xml".to_string()),
                ("SOAPAction".to_string(), SOAP_ACTION.to_string()),
            ],
            body: Some(envelope(text, encoding)),
        }
    }

    /// Extract the typographed text from a `ProcessText` response.
    pub fn parse_process_text(&self, response: HttpResponse) -> Result<String, TypografError> {
        if response.status != 200 {
            return Err(TypografError::HttpStatus {
                status: response.status,
                body: response.body,
            });
        }
        element_text(&response.body, RESULT_TAG)
            .map(|raw| decode_content(&raw))
            .ok_or(TypografError::MissingResult)
    }
}

/// Send `text` through the typograph service and return the result.
pub async fn typogrify(
    transport: &dyn Transport,
    client: &TypografClient,
    text: &str,
    encoding: &str,
) -> Result<String, TypografError> {
    let request = client.build_process_text(text, encoding);
    let response = transport.execute(request).await?;
    client.parse_process_text(response)
}

fn envelope(text: &str, encoding: &str) -> String {
    let text = escape_xml(&escape_html(text));
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="{encoding}"?>"#,
            r#"<soap:Envelope xmlns:xsi="{xsi}" xmlns:xsd="{xsd}" xmlns:soap="{soap}">"#,
            "<soap:Body>",
            r#"<ProcessText xmlns="{ns}">"#,
            "<text>{text}</text>",
            "<entityType>{entity_type}</entityType>",
            "<useBr>{use_br}</useBr>",
            "<useP>{use_p}</useP>",
            "<maxNobr>{max_nobr}</maxNobr>",
            "</ProcessText>",
            "</soap:Body>",
            "</soap:Envelope>",
        ),
        encoding = escape_xml(encoding),
        xsi = XSI_NS,
        xsd = XSD_NS,
        soap = SOAP_NS,
        ns = TYPOGRAF_NS,
        text = text,
        entity_type = ENTITY_TYPE,
        use_br = USE_BR,
        use_p = USE_P,
        max_nobr = MAX_NOBR,
    )
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            c if is_xml_char(c) => out.push(c),
            _ => out.push(char::REPLACEMENT_CHARACTER),
        }
    }
    out
}

/// The XML 1.0 `Char` production.
fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
}

/// Raw content of the first `tag` element, with or without a namespace
/// prefix. A self-closing element yields an empty string.
///
/// This is a scan, not a parser: the element must not be nested in itself,
/// and a CDATA section inside it must not contain its closing tag.
fn element_text(xml: &str, tag: &str) -> Option<String> {
    let mut rest = xml;
    while let Some(lt) = rest.find('<') {
        rest = &rest[lt + 1..];
        let end = rest.find('>')?;
        let head = &rest[..end];
        let name = head
            .split(|c: char| c.is_whitespace() || c == '/')
            .next()
            .unwrap_or_default();
        let local = name.rsplit(':').next().unwrap_or(name);
        if local != tag || head.starts_with('/') {
            continue;
        }
        if head.ends_with('/') {
            return Some(String::new());
        }
        let body = &rest[end + 1..];
        let close = format!("</{name}>");
        let stop = body.find(&close)?;
        return Some(body[..stop].to_string());
    }
    None
}

/// Character data of raw element content: comments are dropped, CDATA
/// sections are taken verbatim, everything else is unescaped.
fn decode_content(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    loop {
        let comment = rest.find("<!--");
        let cdata = rest.find("<![CDATA[");
        let (start, is_cdata) = match (comment, cdata) {
            (Some(c), Some(d)) if d < c => (d, true),
            (Some(c), _) => (c, false),
            (None, Some(d)) => (d, true),
            (None, None) => break,
        };
        out.push_str(&unescape_xml(&rest[..start]));
        let (open, close) = if is_cdata { ("<![CDATA[", "]]>") } else { ("<!--", "-->") };
        let inner = &rest[start + open.len()..];
        let Some(end) = inner.find(close) else {
            rest = "";
            break;
        };
        if is_cdata {
            out.push_str(&inner[..end]);
        }
        rest = &inner[end + close.len()..];
    }
    out.push_str(&unescape_xml(rest));
    out
}

fn unescape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail
            .find(';')
            .and_then(|semi| decode_entity(&tail[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = match entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => entity.strip_prefix('#')?.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}
