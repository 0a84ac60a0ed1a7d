//! Code extraction module
//!
//! Uses tree-sitter to parse Go acceptance-test sources and extract:
//! - Test functions, with their step tables and sequential groups
//! - Configuration-builder methods, with the resources their templates name
//! - Method call sites and local struct bindings inside both
//! - Resource registrations

pub mod filter;
pub mod hcl;

use std::sync::Arc;

use tree_sitter::{Node, Parser};

use crate::types::{
    CallReceiver, CallSite, ConfigFunctionDecl, FileAnalysis, LocalBinding,
    ReceiverKind, RegistrationDecl, ResourceMention, SequentialEntry, TestFunctionDecl,
    TestStepDecl,
};

use filter::{DefaultTemplateFilter, MethodSignature, TemplateFilter};

/// Functions whose map literals list the resources a service registers
const REGISTRATION_FUNCTIONS: &[&str] = &["SupportedResources", "SupportedDataSources"];

/// Method returning the resource type of a typed resource
const RESOURCE_TYPE_METHOD: &str = "ResourceType";

/// Step-table field holding the configuration expression
const CONFIG_FIELD: &str = "Config";

const TESTING_T: &str = "*testing.T";

/// Predeclared Go types that never name a struct
const BUILTIN_TYPES: &[&str] = &[
    "string", "bool", "byte", "rune", "error", "any", "int", "int8", "int16", "int32", "int64",
    "uint", "uint8", "uint16", "uint32", "uint64", "uintptr", "float32", "float64", "complex64",
    "complex128",
];

/// Extracts test entities from Go source files using tree-sitter
pub struct Extractor {
    parser: Parser,
    filter: Arc<dyn TemplateFilter>,
}

impl Extractor {
    pub fn new() -> Self {
        Self::with_filter(Arc::new(DefaultTemplateFilter::new()))
    }

    pub fn with_filter(filter: Arc<dyn TemplateFilter>) -> Self {
        Self {
            parser: Parser::new(),
            filter,
        }
    }

    /// Extract entities from one source file
    pub fn extract_file(&mut self, path: &str, service: &str, content: &str) -> FileAnalysis {
        let language: tree_sitter::Language = tree_sitter_go::LANGUAGE.into();
        if self.parser.set_language(&language).is_err() {
            return FileAnalysis::failed(path, service, "Failed to set parser language");
        }

        let Some(tree) = self.parser.parse(content, None) else {
            return FileAnalysis::failed(path, service, "Failed to parse file");
        };

        let root = tree.root_node();

        // A file that does not parse cleanly contributes no entities
        if root.has_error() {
            let mut failed = FileAnalysis::failed(path, service, "Syntax error");
            for error in &mut failed.errors {
                error.line = first_error_line(root);
            }
            return failed;
        }

        let mut ctx = ExtractionContext {
            result: FileAnalysis {
                path: path.to_string(),
                service: service.to_string(),
                ..Default::default()
            },
            content,
            filter: self.filter.as_ref(),
        };

        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            match child.kind() {
                "function_declaration" => ctx.extract_function(child),
                "method_declaration" => ctx.extract_method(child),
                _ => {}
            }
        }

        ctx.result
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Strip pointer, address-of, generic arguments and package qualifier from a type
pub fn normalize_struct_name(text: &str) -> String {
    let text = text.trim().trim_start_matches(['&', '*']).trim();
    let text = text.split('[').next().unwrap_or(text);
    let text = text.rsplit('.').next().unwrap_or(text);
    text.trim().to_string()
}

fn first_error_line(node: Node) -> Option<u32> {
    if node.is_error() || node.is_missing() {
        return Some(node.start_position().row as u32 + 1);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error() {
            if let Some(line) = first_error_line(child) {
                return Some(line);
            }
        }
    }
    None
}

fn line_of(node: &Node) -> u32 {
    node.start_position().row as u32 + 1
}

/// Unwrap `literal_element` and parenthesized wrappers down to the expression
fn unwrap_element(node: Node) -> Node {
    let mut current = node;
    while matches!(current.kind(), "literal_element" | "parenthesized_expression") {
        match current.named_child(0) {
            Some(inner) => current = inner,
            None => break,
        }
    }
    current
}

/// Key and value of a `keyed_element`
fn keyed_parts(node: Node) -> Option<(Node, Node)> {
    let mut cursor = node.walk();
    let parts: Vec<Node> = node
        .named_children(&mut cursor)
        .filter(|c| c.kind() != "comment")
        .collect();
    match (parts.first(), parts.last()) {
        (Some(key), Some(value)) if parts.len() >= 2 => {
            Some((unwrap_element(*key), unwrap_element(*value)))
        }
        _ => None,
    }
}

/// Element list of a composite literal or bare literal value
fn literal_body(node: Node) -> Option<Node> {
    match node.kind() {
        "literal_value" => Some(node),
        "composite_literal" => node.child_by_field_name("body"),
        _ => None,
    }
}

fn is_string_literal(kind: &str) -> bool {
    kind == "interpreted_string_literal" || kind == "raw_string_literal"
}

struct ExtractionContext<'a> {
    result: FileAnalysis,
    content: &'a str,
    filter: &'a dyn TemplateFilter,
}

/// Facts collected while walking one function body
#[derive(Default)]
struct BodyFacts {
    call_sites: Vec<CallSite>,
    bindings: Vec<LocalBinding>,
    steps: Vec<TestStepDecl>,
    sequential: Vec<SequentialEntry>,
    mentions: Vec<ResourceMention>,
}

impl<'a> ExtractionContext<'a> {
    fn text(&self, node: &Node) -> &'a str {
        let start = node.start_byte();
        let end = node.end_byte();
        if start <= end && end <= self.content.len() {
            &self.content[start..end]
        } else {
            ""
        }
    }

    fn string_value(&self, node: &Node) -> String {
        let text = self.text(node);
        if is_string_literal(node.kind()) && text.len() >= 2 {
            text[1..text.len() - 1].to_string()
        } else {
            text.to_string()
        }
    }

    // =========================================================================
    // Declarations
    // =========================================================================

    fn extract_function(&mut self, node: Node) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(&name_node).to_string();

        if REGISTRATION_FUNCTIONS.contains(&name.as_str()) {
            if let Some(body) = node.child_by_field_name("body") {
                self.extract_registrations(body);
            }
        }

        if !self.takes_testing_t(node) {
            return;
        }

        let mut facts = BodyFacts::default();
        if let Some(body) = node.child_by_field_name("body") {
            self.collect_bindings(body, &mut facts);
            self.walk_body(body, None, &mut facts, false);
        }

        let struct_name = facts
            .bindings
            .iter()
            .min_by_key(|b| b.line)
            .map(|b| b.struct_name.clone());

        self.result.test_functions.push(TestFunctionDecl {
            name,
            struct_name,
            line: line_of(&node),
            call_sites: facts.call_sites,
            bindings: facts.bindings,
            steps: facts.steps,
            sequential: facts.sequential,
        });
    }

    fn extract_method(&mut self, node: Node) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(&name_node).to_string();

        let Some((receiver_name, struct_name, receiver_kind)) = self.receiver(node) else {
            return;
        };

        if REGISTRATION_FUNCTIONS.contains(&name.as_str()) {
            if let Some(body) = node.child_by_field_name("body") {
                self.extract_registrations(body);
            }
        }

        let returns_text = node
            .child_by_field_name("result")
            .map(|r| self.is_text_result(r))
            .unwrap_or(false);

        if name == RESOURCE_TYPE_METHOD && returns_text {
            self.extract_resource_type(node);
        }

        let sig = MethodSignature {
            name: &name,
            struct_name: &struct_name,
            has_receiver: true,
            returns_text,
        };
        if !self.filter.is_config_function(&sig) {
            return;
        }

        let mut facts = BodyFacts::default();
        if let Some(body) = node.child_by_field_name("body") {
            self.collect_bindings(body, &mut facts);
            self.walk_body(body, receiver_name.as_deref(), &mut facts, true);
        }

        let exported = name.chars().next().is_some_and(|c| c.is_uppercase());

        self.result.config_functions.push(ConfigFunctionDecl {
            name,
            struct_name,
            receiver_name,
            receiver_kind,
            returns_text,
            exported,
            line: line_of(&node),
            call_sites: facts.call_sites,
            bindings: facts.bindings,
            mentions: facts.mentions,
        });
    }

    /// Receiver variable, struct name and receiver kind of a method
    fn receiver(&self, node: Node) -> Option<(Option<String>, String, ReceiverKind)> {
        let list = node.child_by_field_name("receiver")?;
        let mut cursor = list.walk();
        let param = list
            .named_children(&mut cursor)
            .find(|c| c.kind() == "parameter_declaration")?;

        let ty = param.child_by_field_name("type")?;
        let receiver_kind = if ty.kind() == "pointer_type" {
            ReceiverKind::Pointer
        } else {
            ReceiverKind::Value
        };
        let struct_name = normalize_struct_name(self.text(&ty));
        if struct_name.is_empty() {
            return None;
        }

        let receiver_name = param
            .child_by_field_name("name")
            .map(|n| self.text(&n).to_string())
            .filter(|n| n != "_");

        Some((receiver_name, struct_name, receiver_kind))
    }

    fn is_text_result(&self, result: Node) -> bool {
        match result.kind() {
            "parameter_list" => {
                let mut cursor = result.walk();
                let params: Vec<Node> = result
                    .named_children(&mut cursor)
                    .filter(|c| c.kind() == "parameter_declaration")
                    .collect();
                params.len() == 1
                    && params[0]
                        .child_by_field_name("type")
                        .is_some_and(|t| self.text(&t) == "string")
            }
            _ => self.text(&result) == "string",
        }
    }

    /// Whether a function declaration or function type takes `*testing.T`
    fn takes_testing_t(&self, node: Node) -> bool {
        let Some(params) = node.child_by_field_name("parameters") else {
            return false;
        };
        let mut cursor = params.walk();
        let found = params.named_children(&mut cursor).any(|p| {
            p.child_by_field_name("type").is_some_and(|t| {
                let ty: String = self.text(&t).split_whitespace().collect();
                ty == TESTING_T
            })
        });
        found
    }

    // =========================================================================
    // Registrations
    // =========================================================================

    fn extract_registrations(&mut self, body: Node) {
        let mut stack = vec![body];
        while let Some(node) = stack.pop() {
            if node.kind() == "keyed_element" {
                if let Some((key, _)) = keyed_parts(node) {
                    if is_string_literal(key.kind()) {
                        let resource = self.string_value(&key);
                        if hcl::is_resource_name(&resource) {
                            self.result.registrations.push(RegistrationDecl {
                                resource,
                                line: line_of(&key),
                            });
                        }
                    }
                }
            }
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                stack.push(child);
            }
        }
        self.result.registrations.sort_by_key(|r| r.line);
    }

    fn extract_resource_type(&mut self, node: Node) {
        let Some(body) = node.child_by_field_name("body") else {
            return;
        };
        let mut stack = vec![body];
        while let Some(current) = stack.pop() {
            if current.kind() == "return_statement" {
                let mut cursor = current.walk();
                let literal = current
                    .named_children(&mut cursor)
                    .map(|c| match c.kind() {
                        "expression_list" => c.named_child(0).unwrap_or(c),
                        _ => c,
                    })
                    .find(|c| is_string_literal(c.kind()));
                if let Some(literal) = literal {
                    let resource = self.string_value(&literal);
                    if hcl::is_resource_name(&resource) {
                        self.result.registrations.push(RegistrationDecl {
                            resource,
                            line: line_of(&literal),
                        });
                    }
                }
                return;
            }
            let mut cursor = current.walk();
            for child in current.named_children(&mut cursor) {
                stack.push(child);
            }
        }
    }

    // =========================================================================
    // Function bodies
    // =========================================================================

    /// Record every local identifier bound to a struct value
    fn collect_bindings(&self, node: Node, facts: &mut BodyFacts) {
        match node.kind() {
            "short_var_declaration" | "assignment_statement" => {
                if let (Some(left), Some(right)) = (
                    node.child_by_field_name("left"),
                    node.child_by_field_name("right"),
                ) {
                    let mut lc = left.walk();
                    let mut rc = right.walk();
                    let names: Vec<Node> = left.named_children(&mut lc).collect();
                    let values: Vec<Node> = right.named_children(&mut rc).collect();
                    for (name, value) in names.iter().zip(values.iter()) {
                        if name.kind() != "identifier" {
                            continue;
                        }
                        if let Some(struct_name) = self.literal_struct(*value) {
                            facts.bindings.push(LocalBinding {
                                name: self.text(name).to_string(),
                                struct_name,
                                line: line_of(name),
                            });
                        }
                    }
                }
            }
            "var_spec" => self.collect_var_spec(node, facts),
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.collect_bindings(child, facts);
        }
    }

    fn collect_var_spec(&self, node: Node, facts: &mut BodyFacts) {
        let mut cursor = node.walk();
        let names: Vec<Node> = node
            .children_by_field_name("name", &mut cursor)
            .collect();

        let struct_name = match node.child_by_field_name("type") {
            Some(ty) => self.struct_type(ty),
            None => node
                .child_by_field_name("value")
                .and_then(|v| v.named_child(0))
                .and_then(|v| self.literal_struct(v)),
        };

        if let Some(struct_name) = struct_name {
            for name in names {
                facts.bindings.push(LocalBinding {
                    name: self.text(&name).to_string(),
                    struct_name: struct_name.clone(),
                    line: line_of(&name),
                });
            }
        }
    }

    /// Struct name of a type node that can name a struct
    fn struct_type(&self, ty: Node) -> Option<String> {
        match ty.kind() {
            "type_identifier" | "qualified_type" | "pointer_type" | "generic_type" => {
                let name = normalize_struct_name(self.text(&ty));
                if name.is_empty() || BUILTIN_TYPES.contains(&name.as_str()) {
                    None
                } else {
                    Some(name)
                }
            }
            _ => None,
        }
    }

    /// Struct name of `Foo{}`, `&Foo{}` or `pkg.Foo{}`
    fn literal_struct(&self, node: Node) -> Option<String> {
        let node = unwrap_element(node);
        match node.kind() {
            "composite_literal" => node
                .child_by_field_name("type")
                .and_then(|ty| self.struct_type(ty)),
            "unary_expression" => node
                .child_by_field_name("operand")
                .and_then(|operand| self.literal_struct(operand)),
            _ => None,
        }
    }

    fn walk_body(
        &self,
        node: Node,
        receiver_name: Option<&str>,
        facts: &mut BodyFacts,
        scan_templates: bool,
    ) {
        match node.kind() {
            "call_expression" => {
                if let Some(site) = self.call_site(node, receiver_name, &facts.bindings) {
                    facts.call_sites.push(site);
                }
            }
            "composite_literal" => {
                if let Some(ty) = node.child_by_field_name("type") {
                    match ty.kind() {
                        "slice_type" | "array_type" if self.is_step_table(ty) => {
                            self.extract_steps(node, receiver_name, facts);
                        }
                        "map_type" => self.extract_sequential(node, ty, facts),
                        _ => {}
                    }
                }
            }
            kind if scan_templates && is_string_literal(kind) => {
                let text = self.string_value(&node);
                facts.mentions.extend(hcl::scan_mentions(&text, line_of(&node)));
                return;
            }
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.walk_body(child, receiver_name, facts, scan_templates);
        }
    }

    fn call_site(
        &self,
        node: Node,
        receiver_name: Option<&str>,
        bindings: &[LocalBinding],
    ) -> Option<CallSite> {
        let function = node.child_by_field_name("function")?;
        if function.kind() != "selector_expression" {
            return None;
        }
        let operand = function.child_by_field_name("operand")?;
        let field = function.child_by_field_name("field")?;
        let receiver = self.text(&operand).to_string();
        let method = self.text(&field).to_string();

        let inner = unwrap_element(operand);
        let (kind, literal_struct) = match inner.kind() {
            "identifier" if Some(receiver.as_str()) == receiver_name => {
                (CallReceiver::SelfReceiver, None)
            }
            "identifier" if bindings.iter().any(|b| b.name == receiver) => {
                (CallReceiver::LocalVariable, None)
            }
            "composite_literal" | "unary_expression" => match self.literal_struct(inner) {
                Some(name) => (CallReceiver::StructLiteral, Some(name)),
                None => (CallReceiver::External, None),
            },
            _ => (CallReceiver::External, None),
        };

        Some(CallSite {
            line: line_of(&node),
            receiver,
            method,
            kind,
            literal_struct,
        })
    }

    fn is_step_table(&self, ty: Node) -> bool {
        ty.child_by_field_name("element")
            .is_some_and(|el| self.text(&el).ends_with("TestStep"))
    }

    fn extract_steps(&self, node: Node, receiver_name: Option<&str>, facts: &mut BodyFacts) {
        let Some(body) = literal_body(node) else {
            return;
        };

        let mut cursor = body.walk();
        let elements: Vec<Node> = body
            .named_children(&mut cursor)
            .filter(|c| c.kind() != "comment")
            .collect();

        for (index, element) in elements.into_iter().enumerate() {
            let inner = unwrap_element(element);
            let config = literal_body(inner).and_then(|fields| self.config_field(fields));

            let (expression, call) = match config {
                Some(value) => {
                    let call = if value.kind() == "call_expression" {
                        self.call_site(value, receiver_name, &facts.bindings)
                    } else {
                        None
                    };
                    (Some(self.text(&value).to_string()), call)
                }
                None => (None, None),
            };

            facts.steps.push(TestStepDecl {
                index: index as u32,
                line: line_of(&element),
                expression,
                call,
            });
        }
    }

    fn config_field<'t>(&self, fields: Node<'t>) -> Option<Node<'t>> {
        let mut cursor = fields.walk();
        let found = fields
            .named_children(&mut cursor)
            .filter(|c| c.kind() == "keyed_element")
            .filter_map(keyed_parts)
            .find(|(key, _)| self.text(key) == CONFIG_FIELD)
            .map(|(_, value)| value);
        found
    }

    /// Nested `group -> key -> test function` map literals
    fn extract_sequential(&self, node: Node, ty: Node, facts: &mut BodyFacts) {
        let Some(value_ty) = ty.child_by_field_name("value") else {
            return;
        };
        let (nested, func_ty) = match value_ty.kind() {
            "map_type" => match value_ty.child_by_field_name("value") {
                Some(inner) if inner.kind() == "function_type" => (true, inner),
                _ => return,
            },
            "function_type" => (false, value_ty),
            _ => return,
        };
        if !self.takes_testing_t(func_ty) {
            return;
        }

        let Some(body) = literal_body(node) else {
            return;
        };

        let mut cursor = body.walk();
        for element in body.named_children(&mut cursor) {
            if element.kind() != "keyed_element" {
                continue;
            }
            let Some((key, value)) = keyed_parts(element) else {
                continue;
            };
            let outer_key = self.string_value(&key);

            if !nested {
                if let Some(target) = self.function_reference(value) {
                    facts.sequential.push(SequentialEntry {
                        group: String::new(),
                        key: outer_key,
                        target,
                        line: line_of(&element),
                    });
                }
                continue;
            }

            let Some(group_body) = literal_body(value) else {
                continue;
            };
            let mut inner_cursor = group_body.walk();
            for inner in group_body.named_children(&mut inner_cursor) {
                if inner.kind() != "keyed_element" {
                    continue;
                }
                let Some((inner_key, inner_value)) = keyed_parts(inner) else {
                    continue;
                };
                if let Some(target) = self.function_reference(inner_value) {
                    facts.sequential.push(SequentialEntry {
                        group: outer_key.clone(),
                        key: self.string_value(&inner_key),
                        target,
                        line: line_of(&inner),
                    });
                }
            }
        }
    }

    fn function_reference(&self, value: Node) -> Option<String> {
        match value.kind() {
            "identifier" | "selector_expression" => Some(self.text(&value).to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MentionStyle;

    const RESOURCE_TEST: &str = r#"package network

import (
	"fmt"
	"testing"

	"github.com/example/provider/internal/acceptance"
)

type VirtualNetworkResource struct{}

func TestAccVirtualNetwork_basic(t *testing.T) {
	data := acceptance.BuildTestData(t, "azurerm_virtual_network", "test")
	r := VirtualNetworkResource{}

	data.ResourceTest(t, r, []acceptance.TestStep{
		{
			Config: r.basic(data),
		},
		data.ImportStep(),
		{
			Config: SubnetResource{}.withNetwork(data),
		},
	})
}

func (r VirtualNetworkResource) Exists(ctx string) (*bool, error) {
	return nil, nil
}

func (VirtualNetworkResource) template(data acceptance.TestData) string {
	return fmt.Sprintf(`
resource "azurerm_resource_group" "test" {
  name = "acctestRG-%d"
}
`, data.RandomInteger)
}

func (r *VirtualNetworkResource) basic(data acceptance.TestData) string {
	rg := ResourceGroupResource{}
	return fmt.Sprintf(`
%s
%s

resource "azurerm_virtual_network" "test" {
  resource_group_name = azurerm_resource_group.test.name
}
`, r.template(data), rg.basic(data))
}
"#;

    fn extract(code: &str) -> FileAnalysis {
        let mut extractor = Extractor::new();
        extractor.extract_file("internal/services/network/vnet_test.go", "network", code)
    }

    #[test]
    fn test_extractor_creation() {
        let extractor = Extractor::new();
        assert!(std::mem::size_of_val(&extractor) > 0);
    }

    #[test]
    fn test_extract_test_function() {
        let result = extract(RESOURCE_TEST);
        assert!(result.errors.is_empty());
        assert_eq!(result.test_functions.len(), 1);

        let test = &result.test_functions[0];
        assert_eq!(test.name, "TestAccVirtualNetwork_basic");
        assert_eq!(test.struct_name.as_deref(), Some("VirtualNetworkResource"));
        assert_eq!(test.line, 12);
    }

    #[test]
    fn test_extract_step_table() {
        let result = extract(RESOURCE_TEST);
        let steps = &result.test_functions[0].steps;
        assert_eq!(steps.len(), 3);

        assert_eq!(steps[0].index, 0);
        let call = steps[0].call.as_ref().unwrap();
        assert_eq!(call.method, "basic");
        assert_eq!(call.kind, CallReceiver::LocalVariable);

        assert_eq!(steps[1].index, 1);
        assert!(steps[1].expression.is_none());

        let call = steps[2].call.as_ref().unwrap();
        assert_eq!(call.kind, CallReceiver::StructLiteral);
        assert_eq!(call.literal_struct.as_deref(), Some("SubnetResource"));
        assert_eq!(call.method, "withNetwork");
    }

    #[test]
    fn test_config_function_filter() {
        let result = extract(RESOURCE_TEST);
        let names: Vec<&str> = result
            .config_functions
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["template", "basic"]);
    }

    #[test]
    fn test_receiver_details() {
        let result = extract(RESOURCE_TEST);
        let template = &result.config_functions[0];
        assert_eq!(template.receiver_name, None);
        assert_eq!(template.receiver_kind, ReceiverKind::Value);
        assert!(!template.exported);

        let basic = &result.config_functions[1];
        assert_eq!(basic.struct_name, "VirtualNetworkResource");
        assert_eq!(basic.receiver_name.as_deref(), Some("r"));
        assert_eq!(basic.receiver_kind, ReceiverKind::Pointer);
        assert!(basic.returns_text);
    }

    #[test]
    fn test_config_call_sites() {
        let result = extract(RESOURCE_TEST);
        let basic = &result.config_functions[1];

        let template_call = basic
            .call_sites
            .iter()
            .find(|c| c.method == "template")
            .unwrap();
        assert_eq!(template_call.kind, CallReceiver::SelfReceiver);

        let rg_call = basic.call_sites.iter().find(|c| c.receiver == "rg").unwrap();
        assert_eq!(rg_call.kind, CallReceiver::LocalVariable);
        assert_eq!(basic.bindings[0].struct_name, "ResourceGroupResource");

        let sprintf = basic
            .call_sites
            .iter()
            .find(|c| c.method == "Sprintf")
            .unwrap();
        assert_eq!(sprintf.kind, CallReceiver::External);
    }

    #[test]
    fn test_resource_mentions() {
        let result = extract(RESOURCE_TEST);
        let template = &result.config_functions[0];
        assert_eq!(template.mentions.len(), 1);
        assert_eq!(template.mentions[0].resource, "azurerm_resource_group");
        assert_eq!(template.mentions[0].style, MentionStyle::ResourceBlock);
        assert_eq!(template.mentions[0].line, 33);

        let basic = &result.config_functions[1];
        assert!(basic
            .mentions
            .iter()
            .any(|m| m.resource == "azurerm_virtual_network"
                && m.style == MentionStyle::ResourceBlock));
        assert!(basic
            .mentions
            .iter()
            .any(|m| m.resource == "azurerm_resource_group" && m.style == MentionStyle::Attribute));
    }

    #[test]
    fn test_extract_sequential_groups() {
        let code = r#"package keyvault

import "testing"

func TestAccKeyVault_sequential(t *testing.T) {
	acceptance.RunTestsInSequence(t, map[string]map[string]func(t *testing.T){
		"basic": {
			"basic":      testAccKeyVault_basic,
			"disappears": other.TestAccKeyVault_disappears,
		},
		"access": {
			"policy": testAccKeyVault_accessPolicy,
		},
	})
}
"#;
        let result = extract(code);
        let seq = &result.test_functions[0].sequential;
        assert_eq!(seq.len(), 3);
        assert_eq!(seq[0].group, "basic");
        assert_eq!(seq[0].key, "basic");
        assert_eq!(seq[0].target, "testAccKeyVault_basic");
        assert_eq!(seq[1].target, "other.TestAccKeyVault_disappears");
        assert_eq!(seq[2].group, "access");
        assert_eq!(seq[2].key, "policy");
    }

    #[test]
    fn test_extract_flat_sequential_table() {
        let code = r#"package x

import "testing"

func TestAccThing_serial(t *testing.T) {
	testCases := map[string]func(t *testing.T){
		"basic": testAccThing_basic,
	}
	acctest.RunSerialTests1Level(t, testCases, 0)
}
"#;
        let result = extract(code);
        let seq = &result.test_functions[0].sequential;
        assert_eq!(seq.len(), 1);
        assert_eq!(seq[0].group, "");
        assert_eq!(seq[0].key, "basic");
    }

    #[test]
    fn test_func_map_without_testing_t_is_not_sequential() {
        let code = r#"package x

import "testing"

func TestAccThing_names(t *testing.T) {
	formatters := map[string]func(string) string{
		"upper": strings.ToUpper,
	}
	grouped := map[string]map[string]func(int){
		"ints": {
			"print": printInt,
		},
	}
	check(t, formatters, grouped)
}
"#;
        let result = extract(code);
        assert_eq!(result.test_functions.len(), 1);
        assert!(result.test_functions[0].sequential.is_empty());
    }

    #[test]
    fn test_registrations() {
        let code = r#"package network

func (r Registration) SupportedResources() map[string]*schema.Resource {
	return map[string]*schema.Resource{
		"azurerm_virtual_network": resourceVirtualNetwork(),
		"azurerm_subnet":          resourceSubnet(),
	}
}

func (r NatGatewayResource) ResourceType() string {
	return "azurerm_nat_gateway"
}
"#;
        let mut extractor = Extractor::new();
        let result =
            extractor.extract_file("internal/services/network/registration.go", "network", code);
        let names: Vec<&str> = result
            .registrations
            .iter()
            .map(|r| r.resource.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["azurerm_virtual_network", "azurerm_subnet", "azurerm_nat_gateway"]
        );
        // ResourceType is a helper, never a template
        assert!(result.config_functions.is_empty());
    }

    #[test]
    fn test_var_declaration_binding() {
        let code = r#"package x

func (r FooResource) complete(data acceptance.TestData) string {
	var other BarResource
	return other.basic(data)
}
"#;
        let result = extract(code);
        let complete = &result.config_functions[0];
        assert_eq!(complete.bindings[0].name, "other");
        assert_eq!(complete.bindings[0].struct_name, "BarResource");
        assert_eq!(complete.call_sites[0].kind, CallReceiver::LocalVariable);
    }

    #[test]
    fn test_syntax_error_is_recorded() {
        let result = extract("package x\n\nfunc (r Foo) basic( string {\n");
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].file_path, "internal/services/network/vnet_test.go");
        assert!(result.errors[0].line.is_some());
    }

    #[test]
    fn test_broken_file_contributes_nothing() {
        let code = r#"package x

import "testing"

func TestAccFoo_basic(t *testing.T) {
	r := FooResource{}
	data.ResourceTest(t, r, []acceptance.TestStep{
		{
			Config: r.basic(),
		},
	})
}

func (FooResource) basic() string {
	return `resource "azurerm_foo" "test" {}`
}

func (r FooResource) broken( string {
"#;
        let result = extract(code);
        assert_eq!(result.errors.len(), 1);
        assert!(result.test_functions.is_empty());
        assert!(result.config_functions.is_empty());
        assert!(result.registrations.is_empty());
    }

    #[test]
    fn test_extract_empty_file() {
        let result = extract("package x\n");
        assert!(result.errors.is_empty());
        assert!(result.test_functions.is_empty());
        assert_eq!(result.service, "network");
    }

    #[test]
    fn test_normalize_struct_name() {
        assert_eq!(normalize_struct_name("*FooResource"), "FooResource");
        assert_eq!(normalize_struct_name("&pkg.FooResource"), "FooResource");
        assert_eq!(normalize_struct_name("Generic[T]"), "Generic");
        assert_eq!(normalize_struct_name(" Plain "), "Plain");
    }
}
