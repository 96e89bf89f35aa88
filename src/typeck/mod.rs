//! Static typechecking of template modules
//!
//! Inference is Hindley–Milner-style with unification over structural
//! types plus unions. Each template function's parameter type starts as
//! a fresh variable (or `void` when it declares no `params-as`) and is
//! constrained by how the function's body uses it. Functions are checked
//! in dependency order, so a `<render>` target's parameter type is
//! always known before its callers are checked.

pub mod error;
pub mod ty;
pub mod unify;

use crate::error::Error;
use crate::parser::{Element, Node};
use crate::path::parse_path;
use crate::toposort::topological_sort;
use error::{TypeError, TypeResult};
use std::collections::{HashMap, HashSet};
use ty::{Type, TypeExpr};
use unify::unify;

/// Compile-time scope: bound variable name to its type.
type Scope = HashMap<String, TypeExpr>;

/// Infer the parameter types of every function in a parsed module.
/// `imported_functions` carries the already-resolved parameter types of
/// functions imported from other modules. The returned map covers both
/// declared and imported functions.
pub fn typecheck(
    root: &Element,
    imported_functions: &HashMap<String, Type>,
) -> Result<HashMap<String, Type>, Error> {
    let mut functions: HashMap<String, &Element> = HashMap::new();
    for el in root.child_elements() {
        if el.tag == "function" {
            match el.attr("name") {
                Some(name) if !name.is_empty() => {
                    functions.insert(name.to_string(), el);
                }
                _ => {
                    return Err(
                        TypeError::for_node(el, "function is missing attribute 'name'").into(),
                    );
                }
            }
        }
    }

    let graph = dependency_graph(root);
    let sorted = topological_sort(&graph, "function")?;

    let mut checker = TypeChecker::new();
    for (name, ty) in imported_functions {
        checker
            .function_params
            .insert(name.clone(), ty.to_expr());
    }

    for name in &sorted {
        let Some(function) = functions.get(name) else {
            // Imported functions have no body to check here.
            continue;
        };
        let mut scope = Scope::new();
        if let Some(params_as) = function.attr("params-as") {
            let var = checker.new_var();
            checker.function_params.insert(name.clone(), var.clone());
            scope.insert(params_as.to_string(), var);
        } else {
            checker
                .function_params
                .insert(name.clone(), TypeExpr::void());
        }
        checker.check_element(function, &scope)?;
    }

    Ok(checker
        .function_params
        .iter()
        .map(|(name, ty)| (name.clone(), ty.resolve()))
        .collect())
}

/// The function dependency graph of one module: declared and imported
/// functions as nodes, `caller -> render target` as edges.
fn dependency_graph(root: &Element) -> HashMap<String, HashSet<String>> {
    let mut deps: HashMap<String, HashSet<String>> = HashMap::new();
    for el in root.child_elements() {
        match el.tag.as_str() {
            "import" => {
                if let Some(name) = el.attr("function") {
                    deps.entry(name.to_string()).or_default();
                }
            }
            "function" => {
                if let Some(name) = el.attr("name") {
                    let targets = deps.entry(name.to_string()).or_default();
                    for child in &el.children {
                        find_renders(child, targets);
                    }
                }
            }
            _ => {}
        }
    }
    deps
}

/// Collect `<render function="...">` targets anywhere below `node`.
fn find_renders(node: &Node, deps: &mut HashSet<String>) {
    if let Node::Element(el) = node {
        if el.tag == "render" {
            if let Some(function) = el.attr("function") {
                deps.insert(function.to_string());
            }
        }
        for child in &el.children {
            find_renders(child, deps);
        }
    }
}

struct TypeChecker {
    next_var: u32,
    function_params: HashMap<String, TypeExpr>,
}

impl TypeChecker {
    fn new() -> Self {
        Self {
            next_var: 0,
            function_params: HashMap::new(),
        }
    }

    fn new_var(&mut self) -> TypeExpr {
        self.next_var += 1;
        TypeExpr::var(format!("t{}", self.next_var))
    }

    fn check_node(&mut self, node: &Node, scope: &Scope) -> TypeResult<()> {
        match node {
            Node::Element(el) => self.check_element(el, scope),
            _ => Ok(()),
        }
    }

    fn check_element(&mut self, el: &Element, scope: &Scope) -> TypeResult<()> {
        match el.tag.as_str() {
            "fragment" => self.check_fragment(el, scope),
            "for" => self.check_for(el, scope),
            "if" => self.check_if(el, scope),
            "render" => self.check_render(el, scope),
            _ => self.check_native(el, scope),
        }
    }

    fn check_children(&mut self, el: &Element, scope: &Scope) -> TypeResult<()> {
        for child in &el.children {
            self.check_node(child, scope)?;
        }
        Ok(())
    }

    /// Type a path lookup. The first component must be bound in scope;
    /// the rest constrain the walked type with fresh array/object shapes.
    /// Errors are bare messages; callers attach the attribute span.
    fn lookup(&mut self, path: &str, scope: &Scope) -> Result<TypeExpr, String> {
        let parts = parse_path(path);
        let Some(first) = parts.first() else {
            return Err("empty path".to_string());
        };
        if first.is_array_ref {
            return Err("unexpected array-index".to_string());
        }
        let Some(mut current) = scope.get(&first.value).cloned() else {
            return Err(format!("undefined variable '{}'", first.value));
        };

        for part in &parts[1..] {
            if part.is_array_ref {
                let element = self.new_var();
                unify(&current, &TypeExpr::array(element.clone()))
                    .map_err(|e| format!("cannot index non-array value: {}", e))?;
                current = element;
            } else {
                let field = self.new_var();
                let object = TypeExpr::object([(part.value.clone(), field.clone())]);
                unify(&current, &object)
                    .map_err(|e| format!("cannot access field '{}': {}", part.value, e))?;
                current = field;
            }
        }

        Ok(current)
    }

    /// Native elements: `inner-text` and `attr-*` bindings must be
    /// `string | number`; everything else passes through.
    fn check_native(&mut self, el: &Element, scope: &Scope) -> TypeResult<()> {
        for attr in &el.attrs {
            if attr.name == "inner-text" || attr.name.starts_with("attr-") {
                let path = attr.value.as_deref().unwrap_or("");
                let expr_ty = self
                    .lookup(path, scope)
                    .map_err(|msg| TypeError::for_attr(el, &attr.name, msg))?;
                unify(&expr_ty, &TypeExpr::string_or_number()).map_err(|e| {
                    TypeError::for_attr(
                        el,
                        &attr.name,
                        format!("invalid type for {} binding: {}", attr.name, e),
                    )
                })?;
            }
        }
        self.check_children(el, scope)
    }

    fn check_fragment(&mut self, el: &Element, scope: &Scope) -> TypeResult<()> {
        for attr in &el.attrs {
            match attr.name.as_str() {
                "inner-text" => {
                    let path = attr.value.as_deref().unwrap_or("");
                    let expr_ty = self
                        .lookup(path, scope)
                        .map_err(|msg| TypeError::for_attr(el, "inner-text", msg))?;
                    unify(&expr_ty, &TypeExpr::string_or_number()).map_err(|e| {
                        TypeError::for_attr(
                            el,
                            "inner-text",
                            format!("invalid type for inner-text: {}", e),
                        )
                    })?;
                }
                other => {
                    return Err(TypeError::for_node(
                        el,
                        format!("unrecognized attribute '{}' in {}", other, el.tag),
                    ));
                }
            }
        }
        self.check_children(el, scope)
    }

    fn check_for(&mut self, el: &Element, scope: &Scope) -> TypeResult<()> {
        let mut each = "";
        let mut as_name = "";
        for attr in &el.attrs {
            match attr.name.as_str() {
                "each" => each = attr.value.as_deref().unwrap_or(""),
                "as" => as_name = attr.value.as_deref().unwrap_or(""),
                other => {
                    return Err(TypeError::for_node(
                        el,
                        format!("unrecognized attribute '{}' in {}", other, el.tag),
                    ));
                }
            }
        }

        if each.is_empty() {
            return Err(TypeError::for_node(el, "for loop missing 'each' attribute"));
        }

        let iter_ty = self
            .lookup(each, scope)
            .map_err(|msg| TypeError::for_attr(el, "each", msg))?;

        let element = self.new_var();
        unify(&iter_ty, &TypeExpr::array(element.clone())).map_err(|e| {
            TypeError::for_attr(
                el,
                "each",
                format!("cannot iterate over non-array value: {}", e),
            )
        })?;

        // The binding is local to the loop body.
        let mut child_scope = scope.clone();
        if !as_name.is_empty() {
            child_scope.insert(as_name.to_string(), element);
        }
        self.check_children(el, &child_scope)
    }

    fn check_if(&mut self, el: &Element, scope: &Scope) -> TypeResult<()> {
        let mut cond = "";
        for attr in &el.attrs {
            match attr.name.as_str() {
                "true" => cond = attr.value.as_deref().unwrap_or(""),
                other => {
                    return Err(TypeError::for_node(
                        el,
                        format!("unrecognized attribute '{}' in {}", other, el.tag),
                    ));
                }
            }
        }

        if cond.is_empty() {
            return Err(TypeError::for_attr(el, "true", "empty condition in if"));
        }

        let cond_ty = self
            .lookup(cond, scope)
            .map_err(|msg| TypeError::for_attr(el, "true", msg))?;

        unify(&cond_ty, &TypeExpr::boolean()).map_err(|e| {
            TypeError::for_attr(el, "true", format!("condition must be boolean: {}", e))
        })?;

        self.check_children(el, scope)
    }

    fn check_render(&mut self, el: &Element, scope: &Scope) -> TypeResult<()> {
        let Some(function_name) = el.attr("function") else {
            return Err(TypeError::for_node(
                el,
                "render is missing attribute 'function'",
            ));
        };

        let param_ty = match self.function_params.get(function_name) {
            Some(ty) => ty.clone(),
            // Dependency ordering makes this unreachable from compile().
            None => {
                return Err(TypeError::for_node(
                    el,
                    format!("unknown function '{}'", function_name),
                ));
            }
        };

        if let Some(params) = el.attr("params") {
            let params_ty = self
                .lookup(params, scope)
                .map_err(|msg| TypeError::for_attr(el, "params", msg))?;
            unify(&params_ty, &param_ty).map_err(|e| {
                TypeError::for_node(
                    el,
                    format!(
                        "invalid parameter type for function '{}': {}",
                        function_name, e
                    ),
                )
            })?;
        } else if !param_ty.is_void() {
            return Err(TypeError::for_node(
                el,
                format!("missing attribute params in render call for {}", function_name),
            ));
        }

        self.check_children(el, scope)
    }
}
