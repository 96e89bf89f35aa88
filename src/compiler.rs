//! Compilation driver
//!
//! A `Compiler` collects named template sources; `compile` parses every
//! module, extracts its functions and imports, orders modules by their
//! import edges, and typechecks each one with the parameter types of its
//! imported functions in hand. The result is an immutable `Program`
//! ready for concurrent execution.

use crate::error::{Error, ReferenceError};
use crate::parser::{parse, Element, Node, ParseError};
use crate::toposort::topological_sort;
use crate::typeck::ty::Type;
use crate::typeck::typecheck;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Collects template sources before compilation.
#[derive(Debug, Default)]
pub struct Compiler {
    modules: HashMap<String, String>,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template source under a module name. A later source
    /// with the same name replaces the earlier one.
    pub fn add_module(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.modules.insert(name.into(), source.into());
    }

    /// Compile all registered modules into an executable program.
    pub fn compile(&self) -> Result<Program, Error> {
        let mut modules: HashMap<String, Module> = HashMap::new();
        let mut module_imports: HashMap<String, HashSet<String>> = HashMap::new();

        for (name, source) in &self.modules {
            debug!(module = %name, "parsing module");
            let root = parse(source)?;
            let module = Module::from_root(root)?;
            module_imports.insert(name.clone(), module.imports.keys().cloned().collect());
            modules.insert(name.clone(), module);
        }

        let sorted = topological_sort(&module_imports, "module")?;

        for name in &sorted {
            debug!(module = %name, "typechecking module");

            let mut imported: HashMap<String, Type> = HashMap::new();
            if let Some(module) = modules.get(name) {
                for (import_module, function_names) in &module.imports {
                    // Import targets exist: the module sort already
                    // rejected edges to unknown modules.
                    let Some(exporter) = modules.get(import_module) else {
                        continue;
                    };
                    for function_name in function_names {
                        match exporter.function_types.get(function_name) {
                            Some(ty) => {
                                imported.insert(function_name.clone(), ty.clone());
                            }
                            None => {
                                return Err(Error::UndefinedReference(
                                    ReferenceError::ImportedFunction {
                                        function: function_name.clone(),
                                        module: import_module.clone(),
                                    },
                                ));
                            }
                        }
                    }
                }
            }

            let function_types = match modules.get(name) {
                Some(module) => typecheck(&module.root, &imported)?,
                None => continue,
            };
            if let Some(module) = modules.get_mut(name) {
                module.function_types = function_types;
            }
        }

        Ok(Program { modules })
    }
}

/// A compiled module: its parsed tree, the functions it declares, the
/// functions it imports, and (after typechecking) every function's
/// inferred parameter type.
#[derive(Debug, Clone)]
pub struct Module {
    pub(crate) root: Element,
    /// Function name to the index of its node among the root's children.
    functions: HashMap<String, usize>,
    /// Imported module name to the function names taken from it.
    imports: HashMap<String, Vec<String>>,
    function_types: HashMap<String, Type>,
}

impl Module {
    /// Extract function and import declarations from a parsed root.
    fn from_root(root: Element) -> Result<Self, Error> {
        let mut functions: HashMap<String, usize> = HashMap::new();
        let mut imports: HashMap<String, Vec<String>> = HashMap::new();

        for (index, child) in root.children.iter().enumerate() {
            let Some(el) = child.as_element() else {
                continue;
            };
            match el.tag.as_str() {
                "function" => {
                    let Some(name) = el.attr("name").filter(|n| !n.is_empty()) else {
                        return Err(parse_fault(el, "function is missing attribute 'name'"));
                    };
                    if functions.insert(name.to_string(), index).is_some() {
                        return Err(parse_fault(el, format!("duplicate function '{}'", name)));
                    }
                }
                "import" => {
                    let Some(from) = el.attr("from").filter(|m| !m.is_empty()) else {
                        return Err(parse_fault(el, "import is missing attribute 'from'"));
                    };
                    let Some(function) = el.attr("function").filter(|f| !f.is_empty()) else {
                        return Err(parse_fault(el, "import is missing attribute 'function'"));
                    };
                    imports
                        .entry(from.to_string())
                        .or_default()
                        .push(function.to_string());
                }
                _ => {}
            }
        }

        Ok(Self {
            root,
            functions,
            imports,
            function_types: HashMap::new(),
        })
    }

    /// The node of a declared function.
    pub(crate) fn function(&self, name: &str) -> Option<&Element> {
        self.functions
            .get(name)
            .and_then(|&index| self.root.children.get(index))
            .and_then(Node::as_element)
    }

    pub(crate) fn imports(&self) -> &HashMap<String, Vec<String>> {
        &self.imports
    }

    /// The inferred parameter type of a function known to this module.
    pub fn function_type(&self, name: &str) -> Option<&Type> {
        self.function_types.get(name)
    }
}

fn parse_fault(el: &Element, message: impl Into<String>) -> Error {
    Error::Parse(ParseError {
        span: el.span(),
        message: message.into(),
    })
}

/// A compiled program: a mapping from module name to module, immutable
/// after compilation and safe to execute from concurrent callers.
#[derive(Debug, Clone)]
pub struct Program {
    pub(crate) modules: HashMap<String, Module>,
}

impl Program {
    pub(crate) fn module(&self, name: &str) -> Option<&Module> {
        self.modules.get(name)
    }

    /// The inferred parameter type of `function` in `module`.
    pub fn function_type(&self, module: &str, function: &str) -> Option<&Type> {
        self.module(module).and_then(|m| m.function_type(function))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_one(source: &str) -> Result<Program, Error> {
        let mut compiler = Compiler::new();
        compiler.add_module("main", source);
        compiler.compile()
    }

    #[test]
    fn test_compile_single_module() {
        let program = compile_one(
            r#"<function name="main" params-as="items">
  <for each="items" as="i"><div inner-text="i.title"></div></for>
</function>"#,
        )
        .unwrap();
        assert_eq!(
            program.function_type("main", "main").map(Type::to_string),
            Some("[]{title: string | number}".to_string())
        );
    }

    #[test]
    fn test_duplicate_function_is_rejected() {
        let err = compile_one(
            r#"<function name="main"></function><function name="main"></function>"#,
        )
        .unwrap_err();
        assert!(
            err.to_string().contains("duplicate function 'main'"),
            "{err}"
        );
    }

    #[test]
    fn test_import_missing_from() {
        let err = compile_one(r#"<import function="card"/>"#).unwrap_err();
        assert!(
            err.to_string().contains("import is missing attribute 'from'"),
            "{err}"
        );
    }

    #[test]
    fn test_import_of_unknown_module() {
        let err = compile_one(
            r#"<import from="nowhere" function="card"/><function name="main"></function>"#,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "undefined reference: module 'main' depends on undefined module 'nowhere'"
        );
    }

    #[test]
    fn test_import_of_unknown_function() {
        let mut compiler = Compiler::new();
        compiler.add_module("cards", r#"<function name="other"></function>"#);
        compiler.add_module(
            "main",
            r#"<import from="cards" function="card"/><function name="main"></function>"#,
        );
        let err = compiler.compile().unwrap_err();
        assert_eq!(
            err.to_string(),
            "undefined reference: function 'card' not found in module 'cards'"
        );
    }

    #[test]
    fn test_module_cycle() {
        let mut compiler = Compiler::new();
        compiler.add_module("a", r#"<import from="b" function="g"/><function name="f"></function>"#);
        compiler.add_module("b", r#"<import from="a" function="f"/><function name="g"></function>"#);
        let err = compiler.compile().unwrap_err();
        assert_eq!(err.to_string(), "cycle error: cycle detected among modules: a, b");
    }

    #[test]
    fn test_cross_module_types_flow() {
        let mut compiler = Compiler::new();
        compiler.add_module(
            "card",
            r#"<function name="card" params-as="x"><p inner-text="x.t"></p></function>"#,
        );
        compiler.add_module(
            "main",
            r#"<import from="card" function="card"/>
<function name="main" params-as="d"><render function="card" params="d.c"/></function>"#,
        );
        let program = compiler.compile().unwrap();
        assert_eq!(
            program.function_type("main", "main").map(Type::to_string),
            Some("{c: {t: string | number}}".to_string())
        );
    }

    #[test]
    fn test_parse_error_carries_module_source_span() {
        let err = compile_one("<div>").unwrap_err();
        assert_eq!(err.kind(), "parse error");
        assert!(err.span().is_some());
    }

    #[test]
    fn test_program_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Program>();
    }
}
