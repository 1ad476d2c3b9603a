//! Template execution: drives a compiled stylesheet over an input
//! document, emitting output through an [`OutputBuilder`].

use crate::ast::{Avt, AvtSegment, Body, CompiledStylesheet, Instruction, TemplateRule};
use crate::error::ExecutionError;
use crate::tree::{OutputBuilder, TextCapture};
use crate::xpath::ast::Expression;
use crate::xpath::datasource::{DataSourceNode, NodeType, QName};
use crate::xpath::engine::{EvaluationContext, XPathValue, evaluate};
use crate::xpath::error::XPathError;
use crate::xpath::parser::parse_expression;
use log::{debug, trace, warn};
use std::cmp::Ordering;
use std::collections::HashMap;

/// One run of a stylesheet over one document. Globals are resolved at
/// construction; [`Executor::run`] then walks the tree.
pub struct Executor<'s, 'a, N: DataSourceNode<'a>> {
    sheet: &'s CompiledStylesheet,
    root: N,
    globals: HashMap<String, XPathValue<N>>,
    _marker: std::marker::PhantomData<&'a ()>,
}

/// Local variable bindings, innermost scope last.
type Scopes<'a, N> = Vec<HashMap<String, XPathValue<N>>>;

impl<'s, 'a, N: DataSourceNode<'a> + 'a> Executor<'s, 'a, N> {
    /// Resolves global bindings against the document root. Caller
    /// parameters are XPath expressions; a value like `42` binds a
    /// number, `'abc'` binds a string. A parameter bound by the caller
    /// overrides the stylesheet default of the same name.
    pub fn new(
        sheet: &'s CompiledStylesheet,
        root: N,
        params: &[(String, String)],
    ) -> Result<Self, ExecutionError> {
        let mut globals: HashMap<String, XPathValue<N>> = HashMap::new();
        let empty = HashMap::new();

        for (name, value) in params {
            let expr = parse_expression(value)?;
            let ctx = EvaluationContext::new(root, root, 1, 1, &empty);
            let value = evaluate(&expr, &ctx)?;
            trace!("caller parameter ${} = {}", name, value);
            globals.insert(name.clone(), value);
        }

        // Stylesheet defaults, in declaration order so later bindings can
        // reference earlier ones. Caller values win over param defaults.
        for binding in &sheet.globals {
            if binding.is_param && globals.contains_key(&binding.name) {
                continue;
            }
            let value = match &binding.default {
                Some(expr) => {
                    let ctx = EvaluationContext::new(root, root, 1, 1, &globals);
                    evaluate(expr, &ctx)?
                }
                None => XPathValue::String(String::new()),
            };
            globals.insert(binding.name.clone(), value);
        }

        Ok(Executor {
            sheet,
            root,
            globals,
            _marker: std::marker::PhantomData,
        })
    }

    pub fn run(&self, builder: &mut dyn OutputBuilder) -> Result<(), ExecutionError> {
        debug!("executing stylesheet with {} rule(s)", self.sheet.rules.len());
        self.apply_to_nodes(&[self.root], builder, &mut vec![HashMap::new()])
    }

    fn apply_to_nodes(
        &self,
        nodes: &[N],
        builder: &mut dyn OutputBuilder,
        scopes: &mut Scopes<'a, N>,
    ) -> Result<(), ExecutionError> {
        let size = nodes.len();
        for (i, &node) in nodes.iter().enumerate() {
            match self.best_rule(node) {
                Some(rule) => {
                    trace!("node matched template '{}'", rule.pattern);
                    self.exec_body(&rule.body, node, i + 1, size, builder, scopes)?;
                }
                None => self.builtin_rule(node, builder, scopes)?,
            }
        }
        Ok(())
    }

    /// Highest priority wins; among equal priorities the later
    /// declaration wins.
    fn best_rule(&self, node: N) -> Option<&'s TemplateRule> {
        self.sheet
            .rules
            .iter()
            .filter(|r| r.pattern.matches(node, self.root))
            .max_by(|a, b| {
                a.priority
                    .partial_cmp(&b.priority)
                    .unwrap_or(Ordering::Equal)
                    .then(a.order.cmp(&b.order))
            })
    }

    /// The XSLT built-in rules: recurse through elements, copy text and
    /// attribute values, drop comments and processing instructions.
    fn builtin_rule(
        &self,
        node: N,
        builder: &mut dyn OutputBuilder,
        scopes: &mut Scopes<'a, N>,
    ) -> Result<(), ExecutionError> {
        match node.node_type() {
            NodeType::Root | NodeType::Element => {
                let children: Vec<N> = node.children().collect();
                self.apply_to_nodes(&children, builder, scopes)
            }
            NodeType::Text | NodeType::Attribute => {
                builder.add_text(&node.string_value())
            }
            NodeType::Comment | NodeType::ProcessingInstruction => Ok(()),
        }
    }

    fn exec_body(
        &self,
        body: &Body,
        node: N,
        position: usize,
        size: usize,
        builder: &mut dyn OutputBuilder,
        scopes: &mut Scopes<'a, N>,
    ) -> Result<(), ExecutionError> {
        scopes.push(HashMap::new());
        let result = self.exec_instructions(body, node, position, size, builder, scopes);
        scopes.pop();
        result
    }

    fn exec_instructions(
        &self,
        body: &Body,
        node: N,
        position: usize,
        size: usize,
        builder: &mut dyn OutputBuilder,
        scopes: &mut Scopes<'a, N>,
    ) -> Result<(), ExecutionError> {
        for instruction in body {
            match instruction {
                Instruction::Text(text) => builder.add_text(text)?,

                Instruction::ValueOf { select } => {
                    let value = self.eval(select, node, position, size, scopes)?;
                    builder.add_text(&value.to_string())?;
                }

                Instruction::ApplyTemplates { select } => {
                    let targets = match select {
                        Some(expr) => {
                            self.node_set(expr, node, position, size, scopes)?
                        }
                        None => node.children().collect(),
                    };
                    self.apply_to_nodes(&targets, builder, scopes)?;
                }

                Instruction::ForEach { select, body } => {
                    let targets = self.node_set(select, node, position, size, scopes)?;
                    let count = targets.len();
                    for (i, target) in targets.into_iter().enumerate() {
                        self.exec_body(body, target, i + 1, count, builder, scopes)?;
                    }
                }

                Instruction::If { test, body } => {
                    if self.eval(test, node, position, size, scopes)?.to_bool() {
                        self.exec_body(body, node, position, size, builder, scopes)?;
                    }
                }

                Instruction::Choose { whens, otherwise } => {
                    let mut taken = false;
                    for (test, body) in whens {
                        if self.eval(test, node, position, size, scopes)?.to_bool() {
                            self.exec_body(body, node, position, size, builder, scopes)?;
                            taken = true;
                            break;
                        }
                    }
                    if !taken {
                        if let Some(body) = otherwise {
                            self.exec_body(body, node, position, size, builder, scopes)?;
                        }
                    }
                }

                Instruction::Copy { body } => {
                    self.shallow_copy(node, body, position, size, builder, scopes)?;
                }

                Instruction::CopyOf { select } => {
                    match self.eval(select, node, position, size, scopes)? {
                        XPathValue::NodeSet(nodes) => {
                            for n in nodes {
                                self.deep_copy(n, builder)?;
                            }
                        }
                        other => builder.add_text(&other.to_string())?,
                    }
                }

                Instruction::Element { name, body } => {
                    let name = self.eval_avt(name, node, position, size, scopes)?;
                    builder.start_element(&name)?;
                    self.exec_body(body, node, position, size, builder, scopes)?;
                    builder.end_element()?;
                }

                Instruction::Attribute { name, body } => {
                    let name = self.eval_avt(name, node, position, size, scopes)?;
                    let mut capture = TextCapture::new();
                    self.exec_body(body, node, position, size, &mut capture, scopes)?;
                    builder.set_attribute(&name, &capture.into_string())?;
                }

                Instruction::Variable { name, select } => {
                    let value = self.eval(select, node, position, size, scopes)?;
                    if let Some(scope) = scopes.last_mut() {
                        scope.insert(name.clone(), value);
                    }
                }

                Instruction::LiteralElement { name, attrs, body } => {
                    builder.start_element(name)?;
                    for (attr_name, avt) in attrs {
                        let value = self.eval_avt(avt, node, position, size, scopes)?;
                        builder.set_attribute(attr_name, &value)?;
                    }
                    self.exec_body(body, node, position, size, builder, scopes)?;
                    builder.end_element()?;
                }
            }
        }
        Ok(())
    }

    fn shallow_copy(
        &self,
        node: N,
        body: &Body,
        position: usize,
        size: usize,
        builder: &mut dyn OutputBuilder,
        scopes: &mut Scopes<'a, N>,
    ) -> Result<(), ExecutionError> {
        match node.node_type() {
            NodeType::Root => {
                self.exec_body(body, node, position, size, builder, scopes)
            }
            NodeType::Element => {
                builder.start_element(&qualified_name(node)?)?;
                self.exec_body(body, node, position, size, builder, scopes)?;
                builder.end_element()
            }
            NodeType::Attribute => {
                builder.set_attribute(&qualified_name(node)?, &node.string_value())
            }
            NodeType::Text => builder.add_text(&node.string_value()),
            NodeType::Comment => builder.add_comment(&node.string_value()),
            NodeType::ProcessingInstruction => {
                warn!("dropping processing instruction during copy");
                Ok(())
            }
        }
    }

    fn deep_copy(&self, node: N, builder: &mut dyn OutputBuilder) -> Result<(), ExecutionError> {
        match node.node_type() {
            NodeType::Root => {
                for child in node.children() {
                    self.deep_copy(child, builder)?;
                }
                Ok(())
            }
            NodeType::Element => {
                builder.start_element(&qualified_name(node)?)?;
                for attr in node.attributes() {
                    builder.set_attribute(&qualified_name(attr)?, &attr.string_value())?;
                }
                for child in node.children() {
                    self.deep_copy(child, builder)?;
                }
                builder.end_element()
            }
            NodeType::Attribute => {
                builder.set_attribute(&qualified_name(node)?, &node.string_value())
            }
            NodeType::Text => builder.add_text(&node.string_value()),
            NodeType::Comment => builder.add_comment(&node.string_value()),
            NodeType::ProcessingInstruction => Ok(()),
        }
    }

    fn eval(
        &self,
        expr: &Expression,
        node: N,
        position: usize,
        size: usize,
        scopes: &Scopes<'a, N>,
    ) -> Result<XPathValue<N>, ExecutionError> {
        let variables = self.variables_in_scope(scopes);
        let ctx = EvaluationContext::new(node, self.root, position, size, &variables);
        Ok(evaluate(expr, &ctx)?)
    }

    fn node_set(
        &self,
        expr: &Expression,
        node: N,
        position: usize,
        size: usize,
        scopes: &Scopes<'a, N>,
    ) -> Result<Vec<N>, ExecutionError> {
        match self.eval(expr, node, position, size, scopes)? {
            XPathValue::NodeSet(nodes) => Ok(nodes),
            other => Err(ExecutionError::XPath(XPathError::Type(format!(
                "expected a node-set, got {}",
                kind_of(&other)
            )))),
        }
    }

    fn eval_avt(
        &self,
        avt: &Avt,
        node: N,
        position: usize,
        size: usize,
        scopes: &Scopes<'a, N>,
    ) -> Result<String, ExecutionError> {
        match avt {
            Avt::Literal(s) => Ok(s.clone()),
            Avt::Segments(segments) => {
                let mut out = String::new();
                for segment in segments {
                    match segment {
                        AvtSegment::Literal(s) => out.push_str(s),
                        AvtSegment::Expression(expr) => {
                            let value = self.eval(expr, node, position, size, scopes)?;
                            out.push_str(&value.to_string());
                        }
                    }
                }
                Ok(out)
            }
        }
    }

    /// Flattens globals and local scopes into one lookup table; inner
    /// scopes shadow outer ones.
    fn variables_in_scope(&self, scopes: &Scopes<'a, N>) -> HashMap<String, XPathValue<N>> {
        let mut variables = self.globals.clone();
        for scope in scopes {
            for (name, value) in scope {
                variables.insert(name.clone(), value.clone());
            }
        }
        variables
    }
}

fn qualified_name<'a, N: DataSourceNode<'a>>(node: N) -> Result<String, ExecutionError> {
    let QName { prefix, local_part } = node
        .name()
        .ok_or_else(|| ExecutionError::Copy("node has no name".to_string()))?;
    Ok(match prefix {
        Some(p) => format!("{}:{}", p, local_part),
        None => local_part.to_string(),
    })
}

fn kind_of<N>(value: &XPathValue<N>) -> &'static str {
    match value {
        XPathValue::NodeSet(_) => "a node-set",
        XPathValue::String(_) => "a string",
        XPathValue::Number(_) => "a number",
        XPathValue::Boolean(_) => "a boolean",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::tree::{ResultNode, TreeBuilder};
    use crate::xpath::datasource::mock::{node, sample_tree};

    fn run_on_mock(stylesheet_body: &str, params: &[(String, String)]) -> crate::tree::ResultTree {
        let source = format!(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">{}</xsl:stylesheet>"#,
            stylesheet_body
        );
        let sheet = compile(&source).unwrap();
        let tree = sample_tree();
        let executor = Executor::new(&sheet, node(&tree, 0), params).unwrap();
        let mut builder = TreeBuilder::new();
        executor.run(&mut builder).unwrap();
        builder.finish()
    }

    fn text_of(tree: &crate::tree::ResultTree) -> String {
        fn walk(nodes: &[ResultNode], out: &mut String) {
            for n in nodes {
                match n {
                    ResultNode::Text(t) => out.push_str(t),
                    ResultNode::Element { children, .. } => walk(children, out),
                    ResultNode::Comment(_) => {}
                }
            }
        }
        let mut out = String::new();
        walk(&tree.children, &mut out);
        out
    }

    #[test]
    fn builtin_rules_copy_text_through() {
        let tree = run_on_mock("", &[]);
        assert_eq!(text_of(&tree), "HelloWorld");
    }

    #[test]
    fn explicit_root_template_replaces_builtin() {
        let tree = run_on_mock(
            r#"<xsl:template match="/"><out>hi</out></xsl:template>"#,
            &[],
        );
        assert_eq!(tree.children.len(), 1);
        match &tree.children[0] {
            ResultNode::Element { name, children, .. } => {
                assert_eq!(name, "out");
                assert_eq!(children, &[ResultNode::Text("hi".to_string())]);
            }
            other => panic!("expected element, got {:?}", other),
        }
    }

    #[test]
    fn caller_parameter_is_visible_as_variable() {
        let tree = run_on_mock(
            r#"<xsl:template match="/"><xsl:value-of select="$n"/></xsl:template>"#,
            &[("n".to_string(), "42".to_string())],
        );
        assert_eq!(text_of(&tree), "42");
    }

    #[test]
    fn unbound_parameter_falls_back_to_empty_string() {
        let tree = run_on_mock(
            r#"<xsl:param name="missing"/>
               <xsl:template match="/">[<xsl:value-of select="$missing"/>]</xsl:template>"#,
            &[],
        );
        assert_eq!(text_of(&tree), "[]");
    }

    #[test]
    fn caller_value_overrides_param_default() {
        let tree = run_on_mock(
            r#"<xsl:param name="n" select="1"/>
               <xsl:template match="/"><xsl:value-of select="$n"/></xsl:template>"#,
            &[("n".to_string(), "42".to_string())],
        );
        assert_eq!(text_of(&tree), "42");
    }

    #[test]
    fn string_parameter_values_need_quoting() {
        let tree = run_on_mock(
            r#"<xsl:template match="/"><xsl:value-of select="$s"/></xsl:template>"#,
            &[("s".to_string(), "'hi'".to_string())],
        );
        assert_eq!(text_of(&tree), "hi");
    }

    #[test]
    fn higher_priority_template_wins() {
        let tree = run_on_mock(
            r#"<xsl:template match="para">low</xsl:template>
               <xsl:template match="para" priority="1">high</xsl:template>
               <xsl:template match="div"><xsl:apply-templates/></xsl:template>"#,
            &[],
        );
        assert_eq!(text_of(&tree), "highhigh");
    }

    #[test]
    fn tie_goes_to_later_declaration() {
        let tree = run_on_mock(
            r#"<xsl:template match="para">first</xsl:template>
               <xsl:template match="para">second</xsl:template>
               <xsl:template match="div"><xsl:apply-templates/></xsl:template>"#,
            &[],
        );
        assert_eq!(text_of(&tree), "secondsecond");
    }

    #[test]
    fn for_each_with_position() {
        let tree = run_on_mock(
            r#"<xsl:template match="/">
                 <xsl:for-each select="//para"><xsl:value-of select="position()"/>,</xsl:for-each>
               </xsl:template>"#,
            &[],
        );
        assert_eq!(text_of(&tree), "1,2,");
    }

    #[test]
    fn identity_template_preserves_structure() {
        let tree = run_on_mock(
            r#"<xsl:template match="@*|node()">
                 <xsl:copy><xsl:apply-templates select="@*|node()"/></xsl:copy>
               </xsl:template>"#,
            &[],
        );
        assert_eq!(tree.children.len(), 2);
        match &tree.children[0] {
            ResultNode::Element { name, attributes, children } => {
                assert_eq!(name, "para");
                assert_eq!(
                    attributes,
                    &[
                        ("id".to_string(), "p1".to_string()),
                        ("lang".to_string(), "en".to_string())
                    ]
                );
                assert_eq!(children, &[ResultNode::Text("Hello".to_string())]);
            }
            other => panic!("expected para, got {:?}", other),
        }
    }

    #[test]
    fn copy_of_is_a_deep_copy() {
        let tree = run_on_mock(
            r#"<xsl:template match="/"><xsl:copy-of select="//div"/></xsl:template>"#,
            &[],
        );
        match &tree.children[0] {
            ResultNode::Element { name, children, .. } => {
                assert_eq!(name, "div");
                assert!(matches!(
                    &children[0],
                    ResultNode::Element { name, .. } if name == "para"
                ));
            }
            other => panic!("expected div, got {:?}", other),
        }
    }

    #[test]
    fn local_variable_shadows_global() {
        let tree = run_on_mock(
            r#"<xsl:variable name="v" select="'outer'"/>
               <xsl:template match="/">
                 <xsl:variable name="v" select="'inner'"/>
                 <xsl:value-of select="$v"/>
               </xsl:template>"#,
            &[],
        );
        assert_eq!(text_of(&tree), "inner");
    }

    #[test]
    fn attribute_instruction_collects_text() {
        let tree = run_on_mock(
            r#"<xsl:template match="/">
                 <item><xsl:attribute name="label">x<xsl:value-of select="1+1"/></xsl:attribute></item>
               </xsl:template>"#,
            &[],
        );
        match &tree.children[0] {
            ResultNode::Element { attributes, .. } => {
                assert_eq!(attributes, &[("label".to_string(), "x2".to_string())]);
            }
            other => panic!("expected element, got {:?}", other),
        }
    }

    #[test]
    fn choose_picks_first_true_branch() {
        let tree = run_on_mock(
            r#"<xsl:template match="/">
                 <xsl:choose>
                   <xsl:when test="false()">a</xsl:when>
                   <xsl:when test="true()">b</xsl:when>
                   <xsl:otherwise>c</xsl:otherwise>
                 </xsl:choose>
               </xsl:template>"#,
            &[],
        );
        assert_eq!(text_of(&tree), "b");
    }

    #[test]
    fn apply_templates_rejects_non_node_set() {
        let source = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
            <xsl:template match="/"><xsl:apply-templates select="1+1"/></xsl:template>
        </xsl:stylesheet>"#;
        let sheet = compile(source).unwrap();
        let tree = sample_tree();
        let executor = Executor::new(&sheet, node(&tree, 0), &[]).unwrap();
        let mut builder = TreeBuilder::new();
        assert!(matches!(
            executor.run(&mut builder),
            Err(ExecutionError::XPath(XPathError::Type(_)))
        ));
    }
}
