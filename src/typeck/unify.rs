//! Type unification
//!
//! Unification makes two type expressions equal by linking variables and
//! merging structure. Objects unify by width-open structural merge: the
//! merged field set is written back into both operands, so a later
//! `foo.bar` can extend an already-inferred object shape and symmetry is
//! preserved. Unions match if any member matches; the probe runs on deep
//! clones, so neither the union's variants nor the other operand are
//! mutated by it.

use crate::typeck::ty::{TypeExpr, TypeRepr};
use thiserror::Error;

/// A unification failure. The message carries the rendered types; the
/// typechecker attaches source spans at its call sites.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct UnifyError {
    pub message: String,
}

impl UnifyError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    fn cannot_unify(t1: &TypeExpr, t2: &TypeExpr) -> Self {
        Self::new(format!("cannot unify {} with {}", t1, t2))
    }
}

/// Check whether two types could unify, without binding anything.
fn probes_ok(t1: &TypeExpr, t2: &TypeExpr) -> bool {
    unify(&t1.deep_clone(), &t2.deep_clone()).is_ok()
}

/// Unify two type expressions, linking variables in place.
pub fn unify(t1: &TypeExpr, t2: &TypeExpr) -> Result<(), UnifyError> {
    let t1 = t1.prune();
    let t2 = t2.prune();

    if t1.ptr_eq(&t2) {
        return Ok(());
    }

    let r1 = t1.clone_repr();
    let r2 = t2.clone_repr();

    match (r1, r2) {
        (TypeRepr::Var { .. }, _) => {
            t1.set_link(t2);
            Ok(())
        }
        (_, TypeRepr::Var { .. }) => {
            t2.set_link(t1);
            Ok(())
        }

        (TypeRepr::Primitive(p1), TypeRepr::Primitive(p2)) if p1 == p2 => Ok(()),

        (TypeRepr::Array(e1), TypeRepr::Array(e2)) => unify(&e1, &e2),

        (TypeRepr::Object(fields1), TypeRepr::Object(fields2)) => {
            let mut merged = fields1;
            for (name, ty2) in fields2 {
                match merged.get(&name).cloned() {
                    Some(ty1) => {
                        unify(&ty1, &ty2)
                            .map_err(|e| UnifyError::new(format!("field {}: {}", name, e)))?;
                    }
                    None => {
                        merged.insert(name, ty2);
                    }
                }
            }
            // Both operands acquire the union of fields.
            t1.set_repr(TypeRepr::Object(merged.clone()));
            t2.set_repr(TypeRepr::Object(merged));
            Ok(())
        }

        (TypeRepr::Union(members1), TypeRepr::Union(members2)) => {
            for m1 in &members1 {
                for m2 in &members2 {
                    if probes_ok(m1, m2) {
                        return Ok(());
                    }
                }
            }
            Err(UnifyError::cannot_unify(&t1, &t2))
        }

        (TypeRepr::Union(members), _) => {
            if members.iter().any(|m| probes_ok(m, &t2)) {
                Ok(())
            } else {
                Err(UnifyError::cannot_unify(&t1, &t2))
            }
        }

        (_, TypeRepr::Union(members)) => {
            if members.iter().any(|m| probes_ok(m, &t1)) {
                Ok(())
            } else {
                Err(UnifyError::cannot_unify(&t1, &t2))
            }
        }

        _ => Err(UnifyError::cannot_unify(&t1, &t2)),
    }
}
