//! Tree-walking evaluator
//!
//! Executes a compiled program's functions against dynamic input values.
//! The value universe is the JSON one: null, booleans, numbers, strings,
//! arrays, and objects. Scopes map bound names either to borrowed input
//! values or, for `children`, to an evaluated node list; scopes are
//! cloned on every binding introduction so parent scopes are never
//! mutated.

use crate::compiler::Program;
use crate::parser::{Element, Node};
use crate::path::parse_path;
use crate::render::render_node;
use crate::span::Span;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;
use thiserror::Error;
use tracing::debug;

/// Errors raised while executing a compiled program. Runtime errors
/// carry no source span.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("no module with name {0}")]
    UndefinedModule(String),

    #[error("no function with name {function} in module {module}")]
    UndefinedFunction { function: String, module: String },

    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),

    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("cannot use '{0}' as array index: not an array reference")]
    NotArrayIndex(String),

    #[error("invalid array index: {0}")]
    InvalidIndex(String),

    #[error("array index out of bounds: {0}")]
    IndexOutOfBounds(usize),

    #[error("cannot navigate through type {0}")]
    CannotNavigate(&'static str),

    #[error("cannot iterate over '{value}' of type {type_name}")]
    NotIterable {
        value: String,
        type_name: &'static str,
    },

    #[error("cannot use '{value}' of type {type_name} as condition in if")]
    NotBoolean {
        value: String,
        type_name: &'static str,
    },

    #[error("cannot assign '{value}' of type {type_name} as inner text")]
    InvalidInnerText {
        value: String,
        type_name: &'static str,
    },

    #[error("cannot use '{value}' of type {type_name} as an attribute")]
    InvalidAttributeValue {
        value: String,
        type_name: &'static str,
    },

    #[error("unexpected binding for 'children'")]
    InvalidChildren,

    #[error("invalid input data: {0}")]
    Data(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A runtime binding: an input value borrowed from the caller's data, or
/// the node list an enclosing `<render>` passed as `children`.
#[derive(Clone)]
enum Binding<'a> {
    Value(&'a Value),
    Fragment(Rc<Vec<Node>>),
}

type Scope<'a> = HashMap<String, Binding<'a>>;

/// The JSON type name of a value, for diagnostics.
fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Compact JSON rendering of a value, for diagnostics.
fn stringify(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

/// Format a number the way text output wants it: integers without a
/// decimal point, everything else in the shortest form that round-trips.
fn format_number(number: &serde_json::Number) -> String {
    if let Some(i) = number.as_i64() {
        return i.to_string();
    }
    if let Some(u) = number.as_u64() {
        return u.to_string();
    }
    let f = number.as_f64().unwrap_or(0.0);
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 9e15 {
        (f as i64).to_string()
    } else {
        f.to_string()
    }
}

/// Strings and numbers have a text form; everything else does not.
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(format_number(n)),
        _ => None,
    }
}

/// Resolve a path against the scope, navigating objects by key and
/// arrays by bracketed index.
fn lookup<'a>(path: &str, scope: &Scope<'a>) -> Result<&'a Value, RuntimeError> {
    let parts = parse_path(path);
    let Some(first) = parts.first() else {
        return Err(RuntimeError::UndefinedVariable(path.to_string()));
    };

    let mut current = match scope.get(&first.value) {
        Some(Binding::Value(value)) => *value,
        Some(Binding::Fragment(_)) => return Err(RuntimeError::CannotNavigate("fragment")),
        None => return Err(RuntimeError::UndefinedVariable(first.value.clone())),
    };

    for part in &parts[1..] {
        current = match current {
            Value::Object(map) => map
                .get(&part.value)
                .ok_or_else(|| RuntimeError::KeyNotFound(part.value.clone()))?,
            Value::Array(items) => {
                if !part.is_array_ref {
                    return Err(RuntimeError::NotArrayIndex(part.value.clone()));
                }
                let index: usize = part
                    .value
                    .parse()
                    .map_err(|_| RuntimeError::InvalidIndex(part.value.clone()))?;
                items
                    .get(index)
                    .ok_or(RuntimeError::IndexOutOfBounds(index))?
            }
            other => return Err(RuntimeError::CannotNavigate(type_name(other))),
        };
    }

    Ok(current)
}

impl Program {
    /// Execute a function against any serializable input: the native
    /// record entry path. Field names follow the serde attributes of
    /// `T`, exactly as they would serialize to JSON.
    pub fn execute<W, T>(
        &self,
        writer: &mut W,
        module: &str,
        function: &str,
        data: &T,
    ) -> Result<(), crate::error::Error>
    where
        W: Write,
        T: Serialize + ?Sized,
    {
        let value = serde_json::to_value(data).map_err(RuntimeError::Data)?;
        self.execute_value(writer, module, function, &value)
    }

    /// Execute a function against an already-built JSON value tree,
    /// serializing the produced nodes to `writer`.
    pub fn execute_value<W: Write>(
        &self,
        writer: &mut W,
        module: &str,
        function: &str,
        data: &Value,
    ) -> Result<(), crate::error::Error> {
        debug!(module, function, "executing template function");

        let module_entry = self
            .module(module)
            .ok_or_else(|| RuntimeError::UndefinedModule(module.to_string()))?;
        let function_node =
            module_entry
                .function(function)
                .ok_or_else(|| RuntimeError::UndefinedFunction {
                    function: function.to_string(),
                    module: module.to_string(),
                })?;

        let mut scope = Scope::new();
        if let Some(params_as) = function_node.attr("params-as") {
            scope.insert(params_as.to_string(), Binding::Value(data));
        }

        for child in &function_node.children {
            let nodes = self.evaluate_node(module, child, &scope)?;
            for node in &nodes {
                render_node(writer, node).map_err(RuntimeError::Io)?;
            }
        }
        Ok(())
    }

    /// Evaluate one template node to the output nodes it produces.
    fn evaluate_node(
        &self,
        current_module: &str,
        node: &Node,
        scope: &Scope<'_>,
    ) -> Result<Vec<Node>, RuntimeError> {
        let element = match node {
            Node::Element(el) => el,
            // Text, comments, and doctypes pass through untouched.
            other => return Ok(vec![other.clone()]),
        };

        match element.tag.as_str() {
            "render" => self.evaluate_render(current_module, element, scope),
            "children" => evaluate_children(scope),
            "fragment" => self.evaluate_fragment(current_module, element, scope),
            "for" => self.evaluate_for(current_module, element, scope),
            "if" => self.evaluate_if(current_module, element, scope),
            _ => self.evaluate_native(current_module, element, scope),
        }
    }

    fn evaluate_nodes(
        &self,
        current_module: &str,
        nodes: &[Node],
        scope: &Scope<'_>,
    ) -> Result<Vec<Node>, RuntimeError> {
        let mut result = Vec::new();
        for node in nodes {
            result.extend(self.evaluate_node(current_module, node, scope)?);
        }
        Ok(result)
    }

    /// `<render function="F" [params="E"]>`: invoke another function,
    /// possibly across modules, with this element's evaluated children
    /// bound as `children` in the callee's scope.
    fn evaluate_render(
        &self,
        current_module: &str,
        element: &Element,
        scope: &Scope<'_>,
    ) -> Result<Vec<Node>, RuntimeError> {
        let function_name = element.attr("function").unwrap_or("");

        let params_value = match element.attr("params") {
            Some(path) => Some(lookup(path, scope)?),
            None => None,
        };

        // An imported name resolves to its exporting module.
        let mut target_module = current_module;
        if let Some(module_entry) = self.module(current_module) {
            for (imported_module, functions) in module_entry.imports() {
                if functions.iter().any(|f| f == function_name) {
                    target_module = imported_module.as_str();
                    break;
                }
            }
        }

        let target = self
            .module(target_module)
            .ok_or_else(|| RuntimeError::UndefinedModule(target_module.to_string()))?;
        let callee = target
            .function(function_name)
            .ok_or_else(|| RuntimeError::UndefinedFunction {
                function: function_name.to_string(),
                module: target_module.to_string(),
            })?;

        let mut callee_scope = Scope::new();
        if let (Some(params_as), Some(value)) = (callee.attr("params-as"), params_value) {
            callee_scope.insert(params_as.to_string(), Binding::Value(value));
        }

        let children = self.evaluate_nodes(current_module, &element.children, scope)?;
        callee_scope.insert("children".to_string(), Binding::Fragment(Rc::new(children)));

        self.evaluate_nodes(target_module, &callee.children, &callee_scope)
    }

    /// `<fragment [inner-text="E"]>`: a text node from the lookup, or
    /// the evaluated children spliced without a wrapping element.
    fn evaluate_fragment(
        &self,
        current_module: &str,
        element: &Element,
        scope: &Scope<'_>,
    ) -> Result<Vec<Node>, RuntimeError> {
        if let Some(path) = element.attr("inner-text") {
            let value = lookup(path, scope)?;
            let text = scalar_string(value).ok_or_else(|| RuntimeError::InvalidInnerText {
                value: stringify(value),
                type_name: type_name(value),
            })?;
            return Ok(vec![Node::text(text)]);
        }
        self.evaluate_nodes(current_module, &element.children, scope)
    }

    /// `<for each="E" [as="x"]>`: evaluate the children once per array
    /// element, with a fresh scope per iteration when `as` binds.
    fn evaluate_for(
        &self,
        current_module: &str,
        element: &Element,
        scope: &Scope<'_>,
    ) -> Result<Vec<Node>, RuntimeError> {
        let each = element.attr("each").unwrap_or("");
        let as_name = element.attr("as").filter(|name| !name.is_empty());

        let value = lookup(each, scope)?;
        let items = value.as_array().ok_or_else(|| RuntimeError::NotIterable {
            value: stringify(value),
            type_name: type_name(value),
        })?;

        let mut result = Vec::new();
        for item in items {
            match as_name {
                Some(name) => {
                    let mut iteration_scope = scope.clone();
                    iteration_scope.insert(name.to_string(), Binding::Value(item));
                    result.extend(self.evaluate_nodes(
                        current_module,
                        &element.children,
                        &iteration_scope,
                    )?);
                }
                None => {
                    result.extend(self.evaluate_nodes(
                        current_module,
                        &element.children,
                        scope,
                    )?);
                }
            }
        }
        Ok(result)
    }

    /// `<if true="E">`: children when the looked-up boolean is true.
    fn evaluate_if(
        &self,
        current_module: &str,
        element: &Element,
        scope: &Scope<'_>,
    ) -> Result<Vec<Node>, RuntimeError> {
        let condition = element.attr("true").unwrap_or("");
        let value = lookup(condition, scope)?;
        let truthy = value.as_bool().ok_or_else(|| RuntimeError::NotBoolean {
            value: stringify(value),
            type_name: type_name(value),
        })?;
        if !truthy {
            return Ok(Vec::new());
        }
        self.evaluate_nodes(current_module, &element.children, scope)
    }

    /// Any other element: clone the tag, process `inner-text` and
    /// `attr-*` bindings, pass other attributes through. The original
    /// children are only evaluated when no `inner-text` produced a
    /// text child.
    fn evaluate_native(
        &self,
        current_module: &str,
        element: &Element,
        scope: &Scope<'_>,
    ) -> Result<Vec<Node>, RuntimeError> {
        let mut result = Element {
            tag: element.tag.clone(),
            attrs: Vec::new(),
            children: Vec::new(),
            pos: element.pos.clone(),
        };

        for attr in &element.attrs {
            if attr.name == "inner-text" {
                let path = attr.value.as_deref().unwrap_or("");
                let value = lookup(path, scope)?;
                let text = scalar_string(value).ok_or_else(|| RuntimeError::InvalidInnerText {
                    value: stringify(value),
                    type_name: type_name(value),
                })?;
                result.children.push(Node::Text {
                    data: text,
                    span: Span::default(),
                });
            } else if let Some(key) = attr.name.strip_prefix("attr-") {
                let path = attr.value.as_deref().unwrap_or("");
                let value = lookup(path, scope)?;
                let text =
                    scalar_string(value).ok_or_else(|| RuntimeError::InvalidAttributeValue {
                        value: stringify(value),
                        type_name: type_name(value),
                    })?;
                result.attrs.push(crate::tokenizer::Attribute::new(key, text));
            } else {
                result.attrs.push(attr.clone());
            }
        }

        if result.children.is_empty() {
            result.children =
                self.evaluate_nodes(current_module, &element.children, scope)?;
        }

        Ok(vec![Node::Element(result)])
    }
}

/// `<children/>`: the node list bound by the enclosing render, empty
/// when nothing was bound.
fn evaluate_children(scope: &Scope<'_>) -> Result<Vec<Node>, RuntimeError> {
    match scope.get("children") {
        None => Ok(Vec::new()),
        Some(Binding::Fragment(nodes)) => Ok((**nodes).clone()),
        Some(Binding::Value(_)) => Err(RuntimeError::InvalidChildren),
    }
}
