//! Event-driven stylesheet compiler.
//!
//! A quick-xml reader walks the stylesheet source and feeds a frame stack;
//! closing a frame folds it into an [`Instruction`] on the enclosing body.
//! The result is a [`CompiledStylesheet`] with no references into the
//! source text, so the source can be dropped immediately after compilation.

use crate::ast::{
    Avt, AvtSegment, Body, CompiledStylesheet, GlobalBinding, Instruction, OutputMethod,
    OutputSettings, TemplateRule,
};
use crate::error::{CompileError, Location};
use crate::pattern::Pattern;
use crate::xpath::ast::Expression;
use crate::xpath::parser::parse_expression;
use log::{debug, trace};
use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};

const XSLT_NS: &str = "http://www.w3.org/1999/XSL/Transform";

/// Compile stylesheet source text into its executable form.
pub fn compile(source: &str) -> Result<CompiledStylesheet, CompileError> {
    let mut reader = Reader::from_str(source);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    let mut compiler = Compiler::new();

    loop {
        let location = Location {
            offset: reader.buffer_position() as usize,
        };
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => compiler.start_element(&e, location, false)?,
            Ok(Event::Empty(e)) => compiler.start_element(&e, location, true)?,
            Ok(Event::Text(e)) => {
                let raw = std::str::from_utf8(e.as_ref())
                    .map_err(|err| CompileError::NotAStylesheet(err.to_string()))?;
                let text = unescape(raw)
                    .map_err(|err| CompileError::NotAStylesheet(err.to_string()))?;
                compiler.text(&text);
            }
            Ok(Event::End(_)) => compiler.end_element(location)?,
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(source) => return Err(CompileError::Xml { location, source }),
        }
        buf.clear();
    }

    compiler.finish()
}

/// What an open element on the stack will become once it closes.
#[derive(Debug)]
enum Frame {
    Stylesheet,
    Template { pattern: Pattern, priority: f64 },
    ForEach { select: Expression },
    If { test: Expression },
    Choose { whens: Vec<(Expression, Body)>, otherwise: Option<Body> },
    When { test: Expression },
    Otherwise,
    Copy,
    Element { name: Avt },
    Attribute { name: Avt },
    Literal { name: String, attrs: Vec<(String, Avt)> },
    Text,
    Binding { name: String, select: Option<Expression>, is_param: bool, global: bool },
    /// Elements we tolerate but ignore wholesale, like xsl:output.
    Ignored,
}

struct Compiler {
    stack: Vec<Frame>,
    /// Parallel to the frames that carry a body.
    bodies: Vec<Body>,
    rules: Vec<TemplateRule>,
    globals: Vec<GlobalBinding>,
    output: OutputSettings,
    saw_stylesheet: bool,
}

impl Compiler {
    fn new() -> Self {
        Compiler {
            stack: Vec::new(),
            bodies: Vec::new(),
            rules: Vec::new(),
            globals: Vec::new(),
            output: OutputSettings::default(),
            saw_stylesheet: false,
        }
    }

    fn start_element(
        &mut self,
        e: &BytesStart<'_>,
        location: Location,
        is_empty: bool,
    ) -> Result<(), CompileError> {
        let name = std::str::from_utf8(e.name().as_ref())
            .map_err(|err| CompileError::NotAStylesheet(err.to_string()))?
            .to_string();
        trace!("open <{}> at {}", name, location);

        let frame = match name.strip_prefix("xsl:") {
            Some(local) => self.xslt_element(local, e, location)?,
            None => {
                if self.stack.is_empty() {
                    return Err(CompileError::NotAStylesheet(format!(
                        "root element is <{}>",
                        name
                    )));
                }
                if matches!(self.stack.last(), Some(Frame::Stylesheet)) {
                    return Err(CompileError::UnexpectedElement {
                        name,
                        message: "literal elements are only allowed inside templates".to_string(),
                        location,
                    });
                }
                let attrs = literal_attributes(e, location)?;
                Frame::Literal { name, attrs }
            }
        };

        if let Some(frame) = self.push(frame, location)? {
            if is_empty {
                self.close_frame(frame, location)?;
            } else {
                self.stack.push(frame);
            }
        }
        Ok(())
    }

    /// Build the frame for an `xsl:` element, or fold leaf instructions
    /// straight into the current body and return `None`.
    fn xslt_element(
        &mut self,
        local: &str,
        e: &BytesStart<'_>,
        location: Location,
    ) -> Result<Frame, CompileError> {
        Ok(match local {
            "stylesheet" | "transform" => {
                let version = require_attr(e, local, "version", location)?;
                if version != "1.0" {
                    return Err(CompileError::UnsupportedVersion(version));
                }
                if let Some(ns) = attr(e, "xmlns:xsl", location)? {
                    if ns != XSLT_NS {
                        return Err(CompileError::NotAStylesheet(format!(
                            "xsl prefix bound to '{}'",
                            ns
                        )));
                    }
                }
                self.saw_stylesheet = true;
                Frame::Stylesheet
            }
            "template" => {
                let match_attr = require_attr(e, local, "match", location)?;
                let pattern = Pattern::parse(&match_attr)?;
                let priority = match attr(e, "priority", location)? {
                    Some(p) => p
                        .parse::<f64>()
                        .map_err(|_| CompileError::InvalidPriority(p))?,
                    None => pattern.default_priority(),
                };
                Frame::Template { pattern, priority }
            }
            "output" => {
                self.read_output(e, location)?;
                Frame::Ignored
            }
            "param" | "variable" => {
                let name = require_attr(e, local, "name", location)?;
                let select = match attr(e, "select", location)? {
                    Some(s) => Some(expression(&s)?),
                    None => None,
                };
                let global = matches!(self.stack.last(), Some(Frame::Stylesheet));
                Frame::Binding {
                    name,
                    select,
                    is_param: local == "param",
                    global,
                }
            }
            "value-of" => {
                let select = expression(&require_attr(e, local, "select", location)?)?;
                self.emit(Instruction::ValueOf { select });
                return Ok(Frame::Ignored);
            }
            "apply-templates" => {
                let select = match attr(e, "select", location)? {
                    Some(s) => Some(expression(&s)?),
                    None => None,
                };
                self.emit(Instruction::ApplyTemplates { select });
                return Ok(Frame::Ignored);
            }
            "copy-of" => {
                let select = expression(&require_attr(e, local, "select", location)?)?;
                self.emit(Instruction::CopyOf { select });
                return Ok(Frame::Ignored);
            }
            "for-each" => Frame::ForEach {
                select: expression(&require_attr(e, local, "select", location)?)?,
            },
            "if" => Frame::If {
                test: expression(&require_attr(e, local, "test", location)?)?,
            },
            "choose" => Frame::Choose {
                whens: Vec::new(),
                otherwise: None,
            },
            "when" => Frame::When {
                test: expression(&require_attr(e, local, "test", location)?)?,
            },
            "otherwise" => Frame::Otherwise,
            "copy" => Frame::Copy,
            "element" => Frame::Element {
                name: parse_avt(&require_attr(e, local, "name", location)?)?,
            },
            "attribute" => Frame::Attribute {
                name: parse_avt(&require_attr(e, local, "name", location)?)?,
            },
            "text" => Frame::Text,
            other => {
                return Err(CompileError::UnsupportedInstruction {
                    name: other.to_string(),
                    location,
                });
            }
        })
    }

    /// Validate placement and open a body for frames that carry one.
    /// Returns `None` when the frame was consumed here.
    fn push(&mut self, frame: Frame, location: Location) -> Result<Option<Frame>, CompileError> {
        match &frame {
            Frame::Stylesheet => {
                if !self.stack.is_empty() {
                    return Err(CompileError::UnexpectedElement {
                        name: "xsl:stylesheet".to_string(),
                        message: "only allowed as the document root".to_string(),
                        location,
                    });
                }
            }
            Frame::Template { .. } => {
                if !matches!(self.stack.last(), Some(Frame::Stylesheet)) {
                    return Err(CompileError::UnexpectedElement {
                        name: "xsl:template".to_string(),
                        message: "only allowed directly under the stylesheet".to_string(),
                        location,
                    });
                }
                self.bodies.push(Vec::new());
            }
            Frame::When { .. } | Frame::Otherwise => {
                if !matches!(self.stack.last(), Some(Frame::Choose { .. })) {
                    return Err(CompileError::UnexpectedElement {
                        name: "xsl:when".to_string(),
                        message: "only allowed inside xsl:choose".to_string(),
                        location,
                    });
                }
                self.bodies.push(Vec::new());
            }
            Frame::ForEach { .. }
            | Frame::If { .. }
            | Frame::Copy
            | Frame::Element { .. }
            | Frame::Attribute { .. }
            | Frame::Literal { .. }
            | Frame::Binding { .. } => {
                self.bodies.push(Vec::new());
            }
            Frame::Choose { .. } | Frame::Text | Frame::Ignored => {}
        }
        Ok(Some(frame))
    }

    fn end_element(&mut self, location: Location) -> Result<(), CompileError> {
        let frame = self.stack.pop().ok_or_else(|| CompileError::UnexpectedElement {
            name: String::new(),
            message: "unbalanced end tag".to_string(),
            location,
        })?;
        self.close_frame(frame, location)
    }

    fn close_frame(&mut self, frame: Frame, location: Location) -> Result<(), CompileError> {
        match frame {
            Frame::Stylesheet | Frame::Ignored => {}
            Frame::Template { pattern, priority } => {
                let body = self.pop_body();
                debug!("compiled template match='{}' priority={}", pattern, priority);
                self.rules.push(TemplateRule {
                    pattern,
                    priority,
                    order: self.rules.len(),
                    body,
                });
            }
            Frame::ForEach { select } => {
                let body = self.pop_body();
                self.emit(Instruction::ForEach { select, body });
            }
            Frame::If { test } => {
                let body = self.pop_body();
                self.emit(Instruction::If { test, body });
            }
            Frame::Choose { whens, otherwise } => {
                self.emit(Instruction::Choose { whens, otherwise });
            }
            Frame::When { test } => {
                let body = self.pop_body();
                if let Some(Frame::Choose { whens, otherwise }) = self.stack.last_mut() {
                    if otherwise.is_some() {
                        return Err(CompileError::UnexpectedElement {
                            name: "xsl:when".to_string(),
                            message: "must precede xsl:otherwise".to_string(),
                            location,
                        });
                    }
                    whens.push((test, body));
                }
            }
            Frame::Otherwise => {
                let body = self.pop_body();
                if let Some(Frame::Choose { otherwise, .. }) = self.stack.last_mut() {
                    if otherwise.replace(body).is_some() {
                        return Err(CompileError::UnexpectedElement {
                            name: "xsl:otherwise".to_string(),
                            message: "at most one per xsl:choose".to_string(),
                            location,
                        });
                    }
                }
            }
            Frame::Copy => {
                let body = self.pop_body();
                self.emit(Instruction::Copy { body });
            }
            Frame::Element { name } => {
                let body = self.pop_body();
                self.emit(Instruction::Element { name, body });
            }
            Frame::Attribute { name } => {
                let body = self.pop_body();
                self.emit(Instruction::Attribute { name, body });
            }
            Frame::Literal { name, attrs } => {
                let body = self.pop_body();
                self.emit(Instruction::LiteralElement { name, attrs, body });
            }
            Frame::Text => {}
            Frame::Binding { name, select, is_param, global } => {
                let body = self.pop_body();
                let default = match (select, body.is_empty()) {
                    (Some(_), false) => {
                        return Err(CompileError::UnexpectedElement {
                            name: format!("xsl:{}", if is_param { "param" } else { "variable" }),
                            message: "cannot carry both a select attribute and content"
                                .to_string(),
                            location,
                        });
                    }
                    (Some(expr), true) => Some(expr),
                    (None, false) => Some(binding_content(&name, body, location)?),
                    (None, true) => None,
                };
                if global {
                    self.globals.push(GlobalBinding { name, default, is_param });
                } else {
                    // Local variables without a select bind the empty string.
                    let select =
                        default.unwrap_or_else(|| Expression::Literal(String::new()));
                    self.emit(Instruction::Variable { name, select });
                }
            }
        }
        Ok(())
    }

    fn text(&mut self, text: &str) {
        if matches!(self.stack.last(), Some(Frame::Ignored)) {
            return;
        }
        let preserve = matches!(self.stack.last(), Some(Frame::Text));
        if !preserve && text.trim().is_empty() {
            return;
        }
        if let Some(body) = self.bodies.last_mut() {
            if let Some(Instruction::Text(prev)) = body.last_mut() {
                prev.push_str(text);
            } else {
                body.push(Instruction::Text(text.to_string()));
            }
        }
    }

    fn emit(&mut self, instruction: Instruction) {
        if let Some(body) = self.bodies.last_mut() {
            body.push(instruction);
        }
    }

    fn pop_body(&mut self) -> Body {
        // Every frame that reaches close_frame with a body pushed one in push().
        self.bodies.pop().unwrap_or_default()
    }

    fn read_output(
        &mut self,
        e: &BytesStart<'_>,
        location: Location,
    ) -> Result<(), CompileError> {
        if let Some(method) = attr(e, "method", location)? {
            self.output.method = match method.as_str() {
                "xml" => OutputMethod::Xml,
                "text" => OutputMethod::Text,
                other => {
                    return Err(CompileError::UnexpectedElement {
                        name: "xsl:output".to_string(),
                        message: format!("unsupported method '{}'", other),
                        location,
                    });
                }
            };
        }
        if let Some(v) = attr(e, "omit-xml-declaration", location)? {
            self.output.omit_xml_declaration = v == "yes";
        }
        if let Some(v) = attr(e, "indent", location)? {
            self.output.indent = v == "yes";
        }
        if let Some(v) = attr(e, "encoding", location)? {
            self.output.encoding = v;
        }
        Ok(())
    }

    fn finish(self) -> Result<CompiledStylesheet, CompileError> {
        if !self.stack.is_empty() {
            return Err(CompileError::UnclosedElements(self.stack.len()));
        }
        if !self.saw_stylesheet {
            return Err(CompileError::NotAStylesheet(
                "no xsl:stylesheet element found".to_string(),
            ));
        }
        debug!(
            "stylesheet compiled: {} template(s), {} global(s)",
            self.rules.len(),
            self.globals.len()
        );
        Ok(CompiledStylesheet {
            rules: self.rules,
            globals: self.globals,
            output: self.output,
        })
    }
}

/// Content-form bindings are supported for plain text only; anything that
/// would need a result-tree fragment must use a select expression instead.
fn binding_content(
    name: &str,
    body: Body,
    location: Location,
) -> Result<Expression, CompileError> {
    let mut value = String::new();
    for instruction in body {
        match instruction {
            Instruction::Text(text) => value.push_str(&text),
            _ => {
                return Err(CompileError::UnexpectedElement {
                    name: format!("binding '{}'", name),
                    message: "only text content is supported; use select for computed values"
                        .to_string(),
                    location,
                });
            }
        }
    }
    Ok(Expression::Literal(value))
}

fn expression(text: &str) -> Result<Expression, CompileError> {
    parse_expression(text).map_err(|source| CompileError::Expression {
        expression: text.to_string(),
        source,
    })
}

fn attr(
    e: &BytesStart<'_>,
    name: &str,
    location: Location,
) -> Result<Option<String>, CompileError> {
    for a in e.attributes() {
        let a = a.map_err(|err| CompileError::Xml {
            location,
            source: quick_xml::Error::InvalidAttr(err),
        })?;
        if a.key.as_ref() == name.as_bytes() {
            let value = a
                .unescape_value()
                .map_err(|source| CompileError::Xml { location, source })?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn require_attr(
    e: &BytesStart<'_>,
    element: &str,
    name: &str,
    location: Location,
) -> Result<String, CompileError> {
    attr(e, name, location)?.ok_or_else(|| CompileError::MissingAttribute {
        element: format!("xsl:{}", element),
        attribute: name.to_string(),
        location,
    })
}

fn literal_attributes(
    e: &BytesStart<'_>,
    location: Location,
) -> Result<Vec<(String, Avt)>, CompileError> {
    let mut attrs = Vec::new();
    for a in e.attributes() {
        let a = a.map_err(|err| CompileError::Xml {
            location,
            source: quick_xml::Error::InvalidAttr(err),
        })?;
        let key = String::from_utf8_lossy(a.key.as_ref()).into_owned();
        let value = a
            .unescape_value()
            .map_err(|source| CompileError::Xml { location, source })?;
        attrs.push((key, parse_avt(&value)?));
    }
    Ok(attrs)
}

/// Split an attribute value template into literal and `{expr}` segments.
/// `{{` and `}}` are escapes for the braces themselves.
pub fn parse_avt(text: &str) -> Result<Avt, CompileError> {
    if !text.contains(['{', '}']) {
        return Ok(Avt::Literal(text.to_string()));
    }

    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                if !literal.is_empty() {
                    segments.push(AvtSegment::Literal(std::mem::take(&mut literal)));
                }
                let mut expr = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => expr.push(c),
                        None => {
                            return Err(CompileError::ValueTemplate {
                                avt: text.to_string(),
                                message: "unterminated '{'".to_string(),
                            });
                        }
                    }
                }
                segments.push(AvtSegment::Expression(expression(&expr)?));
            }
            '}' => {
                return Err(CompileError::ValueTemplate {
                    avt: text.to_string(),
                    message: "'}' outside an expression".to_string(),
                });
            }
            c => literal.push(c),
        }
    }
    if !literal.is_empty() {
        segments.push(AvtSegment::Literal(literal));
    }
    Ok(Avt::Segments(segments))
}
