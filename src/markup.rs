//! Markup serialization helpers: escaping, tag validation and structural markers.

use crate::error::RenderError;

/// Opens a boundary's rendered span
pub const BOUNDARY_START: &str = "<!--$-->";
/// Closes a boundary's rendered span
pub const BOUNDARY_END: &str = "<!--/$-->";
/// Separates adjacent text nodes so a client can split them again
pub const TEXT_SEPARATOR: &str = "<!-- -->";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.iter().any(|void| void.eq_ignore_ascii_case(tag))
}

/// Escape text content and attribute values
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            other => escaped.push(other),
        }
    }
    escaped
}

pub fn validate_tag(tag: &str) -> Result<(), RenderError> {
    let mut chars = tag.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == ':' || c == '-')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(RenderError::InvalidMarkup(format!("invalid tag name {:?}", tag)))
    }
}

pub fn is_valid_attribute_name(name: &str) -> bool {
    !name.is_empty()
        && !name.chars().any(|c| {
            c.is_whitespace() || c.is_control() || matches!(c, '"' | '\'' | '>' | '/' | '=' | '<')
        })
}

/// Serialize an opening tag; void elements are self-closed
pub fn open_tag(
    tag: &str,
    attributes: &[(String, String)],
    root_attribute: Option<&str>,
) -> Result<String, RenderError> {
    validate_tag(tag)?;
    let mut out = String::with_capacity(tag.len() + 2);
    out.push('<');
    out.push_str(tag);
    for (name, value) in attributes {
        if !is_valid_attribute_name(name) {
            return Err(RenderError::InvalidMarkup(format!(
                "invalid attribute name {:?} on <{}>",
                name, tag
            )));
        }
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape(value));
        out.push('"');
    }
    if let Some(root) = root_attribute {
        out.push(' ');
        out.push_str(root);
        out.push_str("=\"\"");
    }
    if is_void_element(tag) {
        out.push_str("/>");
    } else {
        out.push('>');
    }
    Ok(out)
}

pub fn close_tag(tag: &str) -> String {
    format!("</{}>", tag)
}
