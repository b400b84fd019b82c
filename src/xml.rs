//! XML body → `serde_json::Value`, so SOAP responses share the REST/DB extraction path.
//!
//! Shape rules: the document element is unwrapped, namespace prefixes are dropped,
//! attributes become members, repeated siblings collapse into an array, text-only
//! elements become strings, and text next to attributes/children is stored under `""`.

use anyhow::{anyhow, bail, Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{Map, Value};

struct Frame {
    name: String,
    members: Map<String, Value>,
    text: String,
}

impl Frame {
    fn open(start: &BytesStart<'_>) -> Result<Self> {
        Ok(Self {
            name: local_name(start.local_name().as_ref())?,
            members: attributes(start)?,
            text: String::new(),
        })
    }

    fn close(self) -> (String, Value) {
        let text = self.text.trim().to_string();
        let value = if self.members.is_empty() {
            Value::String(text)
        } else {
            let mut members = self.members;
            if !text.is_empty() {
                members.insert(String::new(), Value::String(text));
            }
            Value::Object(members)
        };
        (self.name, value)
    }
}

pub fn xml_to_value(xml: &str) -> Result<Value> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<Value> = None;

    loop {
        let event = reader
            .read_event()
            .with_context(|| format!("reading XML at byte {}", reader.buffer_position()))?;
        match event {
            Event::Start(start) => stack.push(Frame::open(&start)?),
            Event::Empty(start) => {
                let (name, value) = Frame::open(&start)?.close();
                attach(&mut stack, &mut root, name, value)?;
            }
            Event::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text.unescape().context("unescaping XML text")?);
                }
            }
            Event::CData(data) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::End(_) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| anyhow!("unbalanced closing tag"))?;
                let (name, value) = frame.close();
                attach(&mut stack, &mut root, name, value)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        bail!("unexpected end of XML inside <{}>", stack[stack.len() - 1].name);
    }
    root.ok_or_else(|| anyhow!("XML document has no root element"))
}

fn attach(
    stack: &mut [Frame],
    root: &mut Option<Value>,
    name: String,
    value: Value,
) -> Result<()> {
    let Some(parent) = stack.last_mut() else {
        if root.is_some() {
            bail!("XML document has more than one root element");
        }
        *root = Some(value);
        return Ok(());
    };

    match parent.members.get_mut(&name) {
        None => {
            parent.members.insert(name, value);
        }
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
    }
    Ok(())
}

fn attributes(start: &BytesStart<'_>) -> Result<Map<String, Value>> {
    let mut out = Map::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| anyhow!("bad XML attribute: {e}"))?;
        let key = attr.key.as_ref();
        if key == b"xmlns" || key.starts_with(b"xmlns:") {
            continue;
        }
        let name = local_name(attr.key.local_name().as_ref())?;
        let value = attr.unescape_value().context("unescaping XML attribute")?;
        out.insert(name, Value::String(value.into_owned()));
    }
    Ok(out)
}

fn local_name(raw: &[u8]) -> Result<String> {
    std::str::from_utf8(raw)
        .map(str::to_string)
        .context("XML name is not UTF-8")
}
