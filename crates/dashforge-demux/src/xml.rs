//! A minimal XML element tree, just capable enough for the MPD and Smooth
//! Streaming Client Manifest subsets this crate parses.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, Result};

/// One XML element: its tag name, attributes, trimmed text content, and
/// child elements in document order.
#[derive(Debug, Clone, Default)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn attr_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.attr(name).unwrap_or(default)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn find_first(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Depth-first search for the first descendant named `name`, at any
    /// nesting depth (used for PlayReady `WRMHEADER` documents, whose `KID`
    /// element sits under a variable-depth `DATA`/`PROTECTINFO` chain).
    pub fn find_descendant(&self, name: &str) -> Option<&Element> {
        for child in &self.children {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.find_descendant(name) {
                return Some(found);
            }
        }
        None
    }
}

/// Parse `xml` and return its first top-level element (the document root).
pub fn parse(xml: &str) -> Result<Element> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    let mut buf = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| Error::malformed_input(e.to_string()))?;
        match event {
            Event::Start(tag) => stack.push(element_from_tag(&tag)?),
            Event::Empty(tag) => {
                let element = element_from_tag(&tag)?;
                push_into_parent(&mut stack, &mut root, element);
            }
            Event::End(tag) => {
                let close_name = String::from_utf8_lossy(tag.name().as_ref()).into_owned();
                match stack.pop() {
                    Some(element) if element.name == close_name => {
                        push_into_parent(&mut stack, &mut root, element);
                    }
                    Some(element) => {
                        return Err(Error::malformed_input(format!(
                            "mismatched closing tag: expected {}, found {}",
                            element.name, close_name
                        )));
                    }
                    None => return Err(Error::malformed_input("closing tag with no open element")),
                }
            }
            Event::Text(text) => {
                let unescaped = text
                    .unescape()
                    .map_err(|e| Error::malformed_input(e.to_string()))?;
                push_text(&mut stack, unescaped.trim());
            }
            Event::CData(text) => {
                let raw = String::from_utf8_lossy(&text.into_inner()).into_owned();
                push_text(&mut stack, raw.trim());
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    root.ok_or_else(|| Error::malformed_input("no root element found"))
}

fn element_from_tag(tag: &BytesStart<'_>) -> Result<Element> {
    let name = String::from_utf8_lossy(tag.name().as_ref()).into_owned();
    let mut attrs = Vec::new();
    for attr in tag.attributes() {
        let attr = attr.map_err(|e| Error::malformed_input(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| Error::malformed_input(e.to_string()))?
            .into_owned();
        attrs.push((key, value));
    }
    Ok(Element {
        name,
        attrs,
        text: String::new(),
        children: Vec::new(),
    })
}

fn push_text(stack: &mut [Element], text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(top) = stack.last_mut() {
        if !top.text.is_empty() {
            top.text.push(' ');
        }
        top.text.push_str(text);
    }
}

fn push_into_parent(stack: &mut Vec<Element>, root: &mut Option<Element>, element: Element) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    } else if root.is_none() {
        *root = Some(element);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_with_attributes() {
        let xml = r#"<?xml version="1.0"?>
<MPD type="static">
  <Period id="0">
    <AdaptationSet contentType="video">
      <Representation id="1" bandwidth="500000"/>
    </AdaptationSet>
  </Period>
</MPD>"#;
        let root = parse(xml).unwrap();
        assert_eq!(root.name, "MPD");
        assert_eq!(root.attr("type"), Some("static"));

        let period = root.find_first("Period").unwrap();
        let adaptation_set = period.find_first("AdaptationSet").unwrap();
        assert_eq!(adaptation_set.attr("contentType"), Some("video"));

        let representation = adaptation_set.find_first("Representation").unwrap();
        assert_eq!(representation.attr("bandwidth"), Some("500000"));
    }

    #[test]
    fn captures_text_content() {
        let xml = r#"<BaseURL>https://cdn.example.com/seg/</BaseURL>"#;
        let root = parse(xml).unwrap();
        assert_eq!(root.text, "https://cdn.example.com/seg/");
    }

    #[test]
    fn find_descendant_searches_below_direct_children() {
        let xml = r#"<WRMHEADER><DATA><PROTECTINFO><KID>abc123==</KID></PROTECTINFO></DATA></WRMHEADER>"#;
        let root = parse(xml).unwrap();
        let kid = root.find_descendant("KID").unwrap();
        assert_eq!(kid.text, "abc123==");
    }

    #[test]
    fn parses_self_closing_segment_timeline_entries() {
        let xml = r#"<SegmentTimeline><S t="0" d="1000" r="2"/><S d="500"/></SegmentTimeline>"#;
        let root = parse(xml).unwrap();
        let entries: Vec<&Element> = root.children_named("S").collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].attr("r"), Some("2"));
        assert_eq!(entries[1].attr("d"), Some("500"));
    }
}
