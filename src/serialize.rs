//! Serialization of the result tree to bytes, honoring `xsl:output`.

use crate::ast::{OutputMethod, OutputSettings};
use crate::tree::{ResultNode, ResultTree};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::io::Cursor;

/// Render the result tree into an owned buffer. An empty tree yields an
/// empty buffer under the text method, and just the declaration (if any)
/// under the xml method.
pub fn serialize(tree: &ResultTree, settings: &OutputSettings) -> std::io::Result<Vec<u8>> {
    match settings.method {
        OutputMethod::Text => Ok(collect_text(&tree.children).into_bytes()),
        OutputMethod::Xml => serialize_xml(tree, settings),
    }
}

fn collect_text(nodes: &[ResultNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            ResultNode::Text(t) => out.push_str(t),
            ResultNode::Element { children, .. } => out.push_str(&collect_text(children)),
            ResultNode::Comment(_) => {}
        }
    }
    out
}

fn serialize_xml(tree: &ResultTree, settings: &OutputSettings) -> std::io::Result<Vec<u8>> {
    let cursor = Cursor::new(Vec::new());
    let mut writer = if settings.indent {
        Writer::new_with_indent(cursor, b' ', 2)
    } else {
        Writer::new(cursor)
    };

    if !settings.omit_xml_declaration {
        writer.write_event(Event::Decl(BytesDecl::new(
            "1.0",
            Some(settings.encoding.as_str()),
            None,
        )))?;
        // Keep the declaration on its own line.
        if !settings.indent {
            writer.write_event(Event::Text(BytesText::from_escaped("\n")))?;
        }
    }

    for node in &tree.children {
        write_node(&mut writer, node)?;
    }

    let mut bytes = writer.into_inner().into_inner();
    if !bytes.is_empty() && !bytes.ends_with(b"\n") {
        bytes.push(b'\n');
    }
    Ok(bytes)
}

fn write_node(writer: &mut Writer<Cursor<Vec<u8>>>, node: &ResultNode) -> std::io::Result<()> {
    match node {
        ResultNode::Element { name, attributes, children } => {
            let mut start = BytesStart::new(name.as_str());
            for (key, value) in attributes {
                start.push_attribute((key.as_str(), value.as_str()));
            }
            if children.is_empty() {
                writer.write_event(Event::Empty(start))?;
            } else {
                writer.write_event(Event::Start(start))?;
                for child in children {
                    write_node(writer, child)?;
                }
                writer.write_event(Event::End(BytesEnd::new(name.as_str())))?;
            }
        }
        ResultNode::Text(text) => {
            writer.write_event(Event::Text(BytesText::new(text)))?;
        }
        ResultNode::Comment(text) => {
            writer.write_event(Event::Comment(BytesText::new(text)))?;
        }
    }
    Ok(())
}
