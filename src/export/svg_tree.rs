//! Owned SVG element tree used as the disposable copy during export.
//!
//! Attribute values and text are kept in their escaped source form, so a
//! parse/serialize cycle preserves every tag, attribute and character entity
//! of the diagram. Declarations, doctypes and processing instructions are
//! dropped; exports write their own prolog.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::diagram::svg_utils::sanitize_svg_font_family;
use crate::markdown::html::escape_html;

use super::ExportError;

const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";
const XLINK_NAMESPACE: &str = "http://www.w3.org/1999/xlink";

/// A node in the copied tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SvgNode {
    Element(SvgElement),
    /// Escaped character data, entity references included.
    Text(String),
    CData(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvgElement {
    pub name: String,
    /// Attribute names and escaped values, in source order.
    pub attrs: Vec<(String, String)>,
    pub children: Vec<SvgNode>,
}

impl SvgElement {
    fn from_start(reader: &Reader<&[u8]>, start: &BytesStart<'_>) -> Result<Self, ExportError> {
        let name = decode(reader, start.name().as_ref())?;
        let mut attrs = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| ExportError::Parse(e.to_string()))?;
            attrs.push((
                decode(reader, attr.key.as_ref())?,
                decode(reader, &attr.value)?,
            ));
        }
        Ok(Self {
            name,
            attrs,
            children: Vec::new(),
        })
    }

    /// Local part of the element name (`svg:rect` -> `rect`).
    pub fn local_name(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(&self.name)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set an attribute; `value` is escaped.
    pub fn set_attr(&mut self, name: &str, value: &str) {
        let value = escape_html(value);
        match self.attrs.iter_mut().find(|(key, _)| key == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }

    /// Elements below this one, depth first.
    pub fn descendants(&self) -> Vec<&SvgElement> {
        let mut out = Vec::new();
        let mut stack: Vec<&SvgElement> = vec![self];
        while let Some(element) = stack.pop() {
            for child in element.children.iter().rev() {
                if let SvgNode::Element(child) = child {
                    stack.push(child);
                }
            }
            if !std::ptr::eq(element, self) {
                out.push(element);
            }
        }
        out
    }

    /// Concatenated raw text of direct text children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|child| match child {
                SvgNode::Text(text) | SvgNode::CData(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    fn write(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attrs {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(value);
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                SvgNode::Element(element) => element.write(out),
                SvgNode::Text(text) => out.push_str(text),
                SvgNode::CData(text) => {
                    out.push_str("<![CDATA[");
                    out.push_str(text);
                    out.push_str("]]>");
                }
                SvgNode::Comment(text) => {
                    out.push_str("<!--");
                    out.push_str(text);
                    out.push_str("-->");
                }
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

fn decode(reader: &Reader<&[u8]>, raw: &[u8]) -> Result<String, ExportError> {
    reader
        .decoder()
        .decode(raw)
        .map(|text| text.into_owned())
        .map_err(|e| ExportError::Parse(e.to_string()))
}

/// Axis-aligned bounds of the diagram in user units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    /// The box grown by `margin` on every side.
    pub fn expand(&self, margin: f32) -> Self {
        Self {
            x: self.x - margin,
            y: self.y - margin,
            width: self.width + margin * 2.0,
            height: self.height + margin * 2.0,
        }
    }
}

/// A parsed copy of one rendered `<svg>` diagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvgDocument {
    pub root: SvgElement,
}

impl SvgDocument {
    /// Parse the first `<svg>` element of `markup`. Anything after it is ignored.
    pub fn parse(markup: &str) -> Result<Self, ExportError> {
        let markup = sanitize_svg_font_family(markup);
        let mut reader = Reader::from_str(&markup);
        reader.config_mut().trim_text(false);

        let mut stack: Vec<SvgElement> = Vec::new();
        loop {
            let event = reader.read_event().map_err(|e| {
                ExportError::Parse(format!(
                    "{e} at byte {}",
                    reader.buffer_position()
                ))
            })?;
            match event {
                Event::Start(start) => {
                    let element = SvgElement::from_start(&reader, &start)?;
                    ensure_svg_root(&stack, &element)?;
                    stack.push(element);
                }
                Event::Empty(start) => {
                    let element = SvgElement::from_start(&reader, &start)?;
                    ensure_svg_root(&stack, &element)?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(SvgNode::Element(element)),
                        None => return Ok(Self { root: element }),
                    }
                }
                Event::End(_) => {
                    let Some(element) = stack.pop() else {
                        return Err(ExportError::Parse("unbalanced end tag".to_string()));
                    };
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(SvgNode::Element(element)),
                        None => return Ok(Self { root: element }),
                    }
                }
                Event::Text(text) => {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(SvgNode::Text(decode(&reader, &text)?));
                    }
                }
                Event::GeneralRef(entity) => {
                    if let Some(parent) = stack.last_mut() {
                        let name = entity
                            .decode()
                            .map_err(|e| ExportError::Parse(e.to_string()))?;
                        parent.children.push(SvgNode::Text(format!("&{name};")));
                    }
                }
                Event::CData(data) => {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(SvgNode::CData(decode(&reader, &data)?));
                    }
                }
                Event::Comment(comment) => {
                    if let Some(parent) = stack.last_mut() {
                        parent
                            .children
                            .push(SvgNode::Comment(decode(&reader, &comment)?));
                    }
                }
                Event::Eof => {
                    return Err(ExportError::Parse(if stack.is_empty() {
                        "no <svg> element found".to_string()
                    } else {
                        "unexpected end of input".to_string()
                    }));
                }
                _ => {}
            }
        }
    }

    /// Add the SVG namespace (and the XLink one when `xlink:` attributes are
    /// used) to the root if missing.
    pub fn ensure_namespace(&mut self) {
        if self.root.attr("xmlns").is_none() {
            self.root.set_attr("xmlns", SVG_NAMESPACE);
        }
        let uses_xlink = std::iter::once(&self.root)
            .chain(self.root.descendants())
            .any(|e| e.attrs.iter().any(|(key, _)| key.starts_with("xlink:")));
        if uses_xlink && self.root.attr("xmlns:xlink").is_none() {
            self.root.set_attr("xmlns:xlink", XLINK_NAMESPACE);
        }
    }

    /// Bounds from the root `viewBox`, falling back to `width`/`height`.
    pub fn bounding_box(&self) -> Result<BoundingBox, ExportError> {
        if let Some(view_box) = self.root.attr("viewBox") {
            let values: Vec<f32> = view_box
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|part| !part.is_empty())
                .filter_map(|part| part.parse().ok())
                .collect();
            if let [x, y, width, height] = values[..] {
                return checked(BoundingBox {
                    x,
                    y,
                    width,
                    height,
                });
            }
        }
        let width = self.root.attr("width").and_then(parse_length);
        let height = self.root.attr("height").and_then(parse_length);
        match (width, height) {
            (Some(width), Some(height)) => checked(BoundingBox {
                x: 0.0,
                y: 0.0,
                width,
                height,
            }),
            _ => Err(ExportError::InvalidDimensions {
                width: width.unwrap_or(0.0),
                height: height.unwrap_or(0.0),
            }),
        }
    }

    /// Insert an opaque rectangle covering `bbox` grown by `margin` as the
    /// first child of the root, so it paints behind everything else.
    pub fn insert_background(&mut self, color: &str, margin: f32, bbox: &BoundingBox) {
        let area = bbox.expand(margin);
        let mut rect = SvgElement {
            name: "rect".to_string(),
            attrs: Vec::new(),
            children: Vec::new(),
        };
        rect.set_attr("x", &format_number(area.x));
        rect.set_attr("y", &format_number(area.y));
        rect.set_attr("width", &format_number(area.width));
        rect.set_attr("height", &format_number(area.height));
        rect.set_attr("fill", color);
        self.root.children.insert(0, SvgNode::Element(rect));
    }

    /// First non-empty `<title>` text, unescaped.
    pub fn title(&self) -> Option<String> {
        self.root
            .descendants()
            .into_iter()
            .filter(|e| e.local_name() == "title")
            .map(|e| e.text())
            .map(|raw| {
                quick_xml::escape::unescape(&raw)
                    .map(|text| text.into_owned())
                    .unwrap_or(raw)
            })
            .map(|text| text.trim().to_string())
            .find(|text| !text.is_empty())
    }

    pub fn serialize(&self) -> String {
        let mut out = String::new();
        self.root.write(&mut out);
        out
    }
}

fn ensure_svg_root(stack: &[SvgElement], element: &SvgElement) -> Result<(), ExportError> {
    if stack.is_empty() && element.local_name() != "svg" {
        return Err(ExportError::Parse(format!(
            "root element is <{}>, not <svg>",
            element.name
        )));
    }
    Ok(())
}

fn checked(bbox: BoundingBox) -> Result<BoundingBox, ExportError> {
    let valid = bbox.width.is_finite()
        && bbox.height.is_finite()
        && bbox.width > 0.0
        && bbox.height > 0.0;
    if valid {
        Ok(bbox)
    } else {
        Err(ExportError::InvalidDimensions {
            width: bbox.width,
            height: bbox.height,
        })
    }
}

/// Parse an absolute length (`120`, `120.5px`). Relative units are rejected.
fn parse_length(value: &str) -> Option<f32> {
    let value = value.trim();
    let number = value.strip_suffix("px").unwrap_or(value);
    number.trim().parse().ok()
}

fn format_number(value: f32) -> String {
    let text = format!("{value:.3}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}
