//! Type representations
//!
//! Types exist in two forms. `TypeExpr` is the unification form used
//! while a module is being checked: a shared mutable handle, so linking
//! a variable or widening an object is visible through every alias of
//! it. `Type` is the resolved form that survives into the compiled
//! program: a plain owned value, safe to share across threads.
//!
//! Unification variables only live inside a single typechecking pass;
//! `resolve` snapshots whatever they are linked to at the end of it.

use std::cell::{Ref, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

/// The primitive types of the template language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    String,
    Number,
    Boolean,
    Void,
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Primitive::String => write!(f, "string"),
            Primitive::Number => write!(f, "number"),
            Primitive::Boolean => write!(f, "boolean"),
            Primitive::Void => write!(f, "void"),
        }
    }
}

/// The shape of a type expression. `Var` links are set by unification.
#[derive(Debug, Clone)]
pub enum TypeRepr {
    Var {
        name: String,
        link: Option<TypeExpr>,
    },
    Primitive(Primitive),
    Array(TypeExpr),
    Object(HashMap<String, TypeExpr>),
    Union(Vec<TypeExpr>),
}

/// A type expression under inference. Cloning produces another handle to
/// the same underlying type, which is what lets `unify` thread bindings
/// through scopes and object fields.
#[derive(Debug, Clone)]
pub struct TypeExpr(Rc<RefCell<TypeRepr>>);

impl TypeExpr {
    pub fn new(repr: TypeRepr) -> Self {
        Self(Rc::new(RefCell::new(repr)))
    }

    pub fn var(name: impl Into<String>) -> Self {
        Self::new(TypeRepr::Var {
            name: name.into(),
            link: None,
        })
    }

    pub fn primitive(p: Primitive) -> Self {
        Self::new(TypeRepr::Primitive(p))
    }

    pub fn string() -> Self {
        Self::primitive(Primitive::String)
    }

    pub fn number() -> Self {
        Self::primitive(Primitive::Number)
    }

    pub fn boolean() -> Self {
        Self::primitive(Primitive::Boolean)
    }

    pub fn void() -> Self {
        Self::primitive(Primitive::Void)
    }

    pub fn array(element: TypeExpr) -> Self {
        Self::new(TypeRepr::Array(element))
    }

    pub fn object(fields: impl IntoIterator<Item = (String, TypeExpr)>) -> Self {
        Self::new(TypeRepr::Object(fields.into_iter().collect()))
    }

    pub fn union(members: impl IntoIterator<Item = TypeExpr>) -> Self {
        Self::new(TypeRepr::Union(members.into_iter().collect()))
    }

    /// The `string | number` union accepted by text bindings.
    pub fn string_or_number() -> Self {
        Self::union([Self::string(), Self::number()])
    }

    pub(crate) fn borrow(&self) -> Ref<'_, TypeRepr> {
        self.0.borrow()
    }

    pub(crate) fn clone_repr(&self) -> TypeRepr {
        self.0.borrow().clone()
    }

    pub(crate) fn set_repr(&self, repr: TypeRepr) {
        *self.0.borrow_mut() = repr;
    }

    pub(crate) fn ptr_eq(&self, other: &TypeExpr) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Follow variable links to the representative handle.
    pub fn prune(&self) -> TypeExpr {
        let link = match &*self.0.borrow() {
            TypeRepr::Var { link: Some(l), .. } => l.clone(),
            _ => return self.clone(),
        };
        link.prune()
    }

    /// Link an (unlinked) variable to `target`.
    pub(crate) fn set_link(&self, target: TypeExpr) {
        let mut repr = self.0.borrow_mut();
        if let TypeRepr::Var { link, .. } = &mut *repr {
            *link = Some(target);
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(*self.prune().borrow(), TypeRepr::Primitive(Primitive::Void))
    }

    /// A structural copy of this type: same shape, fresh cells, variable
    /// identity preserved through the memo table. Links are copied, so
    /// existing bindings hold in the copy while new ones stay local to it.
    pub fn deep_clone(&self) -> TypeExpr {
        let mut memo = HashMap::new();
        self.deep_clone_memo(&mut memo)
    }

    fn deep_clone_memo(&self, memo: &mut HashMap<*const RefCell<TypeRepr>, TypeExpr>) -> TypeExpr {
        let key = Rc::as_ptr(&self.0);
        if let Some(existing) = memo.get(&key) {
            return existing.clone();
        }
        // Insert a placeholder first so shared substructure maps to a
        // single copy; the repr is filled in below.
        let copy = TypeExpr::var("");
        memo.insert(key, copy.clone());

        let repr = match &*self.0.borrow() {
            TypeRepr::Var { name, link } => TypeRepr::Var {
                name: name.clone(),
                link: link.as_ref().map(|l| l.deep_clone_memo(memo)),
            },
            TypeRepr::Primitive(p) => TypeRepr::Primitive(*p),
            TypeRepr::Array(element) => TypeRepr::Array(element.deep_clone_memo(memo)),
            TypeRepr::Object(fields) => TypeRepr::Object(
                fields
                    .iter()
                    .map(|(name, ty)| (name.clone(), ty.deep_clone_memo(memo)))
                    .collect(),
            ),
            TypeRepr::Union(members) => {
                TypeRepr::Union(members.iter().map(|m| m.deep_clone_memo(memo)).collect())
            }
        };
        copy.set_repr(repr);
        copy
    }

    /// Snapshot this expression into the owned, immutable form.
    pub fn resolve(&self) -> Type {
        match &*self.prune().borrow() {
            TypeRepr::Var { name, .. } => Type::Var(name.clone()),
            TypeRepr::Primitive(p) => Type::Primitive(*p),
            TypeRepr::Array(element) => Type::Array(Box::new(element.resolve())),
            TypeRepr::Object(fields) => Type::Object(
                fields
                    .iter()
                    .map(|(name, ty)| (name.clone(), ty.resolve()))
                    .collect(),
            ),
            TypeRepr::Union(members) => Type::Union(members.iter().map(|m| m.resolve()).collect()),
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0.borrow() {
            TypeRepr::Var { name, link } => match link {
                Some(target) => write!(f, "{}", target),
                None => write!(f, "?{}", name),
            },
            TypeRepr::Primitive(p) => write!(f, "{}", p),
            TypeRepr::Array(element) => write!(f, "[]{}", element),
            TypeRepr::Object(fields) => {
                let mut names: Vec<&String> = fields.keys().collect();
                names.sort();
                write!(f, "{{")?;
                for (i, name) in names.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, fields[*name])?;
                }
                write!(f, "}}")
            }
            TypeRepr::Union(members) => {
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}", m)?;
                }
                Ok(())
            }
        }
    }
}

/// A resolved type: the inferred parameter type of a template function
/// as stored in the compiled program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    /// A variable left unconstrained by inference.
    Var(String),
    Primitive(Primitive),
    Array(Box<Type>),
    Object(BTreeMap<String, Type>),
    Union(Vec<Type>),
}

impl Type {
    pub fn void() -> Self {
        Type::Primitive(Primitive::Void)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Primitive(Primitive::Void))
    }

    /// Rehydrate into the unification form, sharing one cell per
    /// variable name so constraints placed on one occurrence reach the
    /// others.
    pub fn to_expr(&self) -> TypeExpr {
        let mut vars = HashMap::new();
        self.to_expr_memo(&mut vars)
    }

    fn to_expr_memo(&self, vars: &mut HashMap<String, TypeExpr>) -> TypeExpr {
        match self {
            Type::Var(name) => vars
                .entry(name.clone())
                .or_insert_with(|| TypeExpr::var(name.clone()))
                .clone(),
            Type::Primitive(p) => TypeExpr::primitive(*p),
            Type::Array(element) => TypeExpr::array(element.to_expr_memo(vars)),
            Type::Object(fields) => TypeExpr::object(
                fields
                    .iter()
                    .map(|(name, ty)| (name.clone(), ty.to_expr_memo(vars))),
            ),
            Type::Union(members) => {
                TypeExpr::union(members.iter().map(|m| m.to_expr_memo(vars)))
            }
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Var(name) => write!(f, "?{}", name),
            Type::Primitive(p) => write!(f, "{}", p),
            Type::Array(element) => write!(f, "[]{}", element),
            Type::Object(fields) => {
                write!(f, "{{")?;
                for (i, (name, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, ty)?;
                }
                write!(f, "}}")
            }
            Type::Union(members) => {
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}", m)?;
                }
                Ok(())
            }
        }
    }
}
