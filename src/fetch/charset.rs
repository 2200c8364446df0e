//! Response body decoding
//!
//! Bodies travel through the fetch layer as raw bytes. Feeds are handed to
//! the feed parser undecoded so the XML prolog can name its own encoding;
//! HTML pages are decoded here.
//!
//! Encoding precedence: byte-order mark, then the `charset` parameter of the
//! `Content-Type` header, then a `<meta>` or XML prolog declaration in the
//! first kilobyte of the document, then UTF-8.

use encoding_rs::{Encoding, UTF_8};
use std::borrow::Cow;

/// How far into a document to look for an encoding declaration
const SNIFF_LIMIT: usize = 1024;

/// Decodes a body to text, replacing malformed sequences
pub fn decode_body<'a>(body: &'a [u8], content_type: Option<&str>) -> Cow<'a, str> {
    let encoding = content_type
        .and_then(charset_from_content_type)
        .or_else(|| sniff_declared_charset(body))
        .unwrap_or(UTF_8);

    // BOM takes precedence over the label
    let (text, _, _) = encoding.decode(body);
    text
}

/// Extracts the `charset` parameter of a `Content-Type` value
pub fn charset_from_content_type(content_type: &str) -> Option<&'static Encoding> {
    content_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("charset"))
        .and_then(|(_, value)| label_to_encoding(value))
}

/// Looks for an encoding declared inside the document head
fn sniff_declared_charset(body: &[u8]) -> Option<&'static Encoding> {
    let head = &body[..body.len().min(SNIFF_LIMIT)];
    let head = String::from_utf8_lossy(head).to_ascii_lowercase();

    ["charset=", "encoding="].iter().find_map(|marker| {
        let start = head.find(marker)? + marker.len();
        let value: String = head[start..]
            .trim_start_matches(['"', '\''])
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
            .collect();
        label_to_encoding(&value)
    })
}

fn label_to_encoding(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label(label.trim().trim_matches(['"', '\'']).as_bytes())
}
