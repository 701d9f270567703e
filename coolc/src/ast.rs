//! The typed class hierarchy handed over by the semantic analyzer.
//!
//! Every expression already carries its static type and source line; nothing
//! here is re-validated.

use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::int_types::CoolInt;

pub const SELF: &str = "self";
pub const SELF_TYPE: &str = "SELF_TYPE";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Program {
    pub classes: Vec<Class>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Class {
    pub name: String,
    /// `None` only for the root class.
    pub parent: Option<String>,
    pub features: Vec<Feature>,
    pub file_name: String,
}

#[derive(Display, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Feature {
    Attribute {
        name: String,
        ty: String,
        init: Option<Expr>,
    },
    Method {
        name: String,
        formals: Vec<Formal>,
        return_type: String,
        /// `None` for methods whose body the runtime provides.
        body: Option<Expr>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Formal {
    pub name: String,
    pub ty: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    /// Static type from the analyzer; may be `SELF_TYPE`.
    pub ty: String,
    pub line: usize,
}

#[derive(Display, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BinOp {
    Plus,
    Minus,
    Mul,
    Div,
    Lt,
    Le,
    Eq,
}

#[derive(Display, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum UnOp {
    IsVoid,
    Not,
    Neg,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseBranch {
    pub name: String,
    pub ty: String,
    pub body: Expr,
}

#[derive(Display, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ExprKind {
    Bool(bool),
    Int(CoolInt),
    Str(String),
    /// Identifier reference, including `self`.
    Object(String),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnOp,
        expr: Box<Expr>,
    },
    New(String),
    Case {
        scrutinee: Box<Expr>,
        branches: Vec<CaseBranch>,
    },
    Let {
        name: String,
        ty: String,
        init: Option<Box<Expr>>,
        body: Box<Expr>,
    },
    Block(Vec<Expr>),
    While {
        pred: Box<Expr>,
        body: Box<Expr>,
    },
    If {
        pred: Box<Expr>,
        then: Box<Expr>,
        els: Box<Expr>,
    },
    Dispatch {
        receiver: Box<Expr>,
        /// Present for `e@T.m(...)`.
        static_type: Option<String>,
        method: String,
        args: Vec<Expr>,
    },
    Assign {
        name: String,
        expr: Box<Expr>,
    },
}

impl Program {
    pub fn class(&self, name: &str) -> Option<&Class> {
        self.classes.iter().find(|c| c.name == name)
    }
}

impl Class {
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str, Option<&Expr>)> {
        self.features.iter().filter_map(|f| match f {
            Feature::Attribute { name, ty, init } => Some((name.as_str(), ty.as_str(), init.as_ref())),
            Feature::Method { .. } => None,
        })
    }

    pub fn methods(&self) -> impl Iterator<Item = (&str, &[Formal], Option<&Expr>)> {
        self.features.iter().filter_map(|f| match f {
            Feature::Method {
                name, formals, body, ..
            } => Some((name.as_str(), formals.as_slice(), body.as_ref())),
            Feature::Attribute { .. } => None,
        })
    }
}

/// Constructors for hand-built hierarchies, mostly for tests.
pub mod helpers {
    use super::*;

    pub fn class(name: &str, parent: &str, features: Vec<Feature>) -> Class {
        Class {
            name: name.into(),
            parent: Some(parent.into()),
            features,
            file_name: format!("{}.cl", name.to_lowercase()),
        }
    }

    pub fn attr(name: &str, ty: &str, init: Option<Expr>) -> Feature {
        Feature::Attribute {
            name: name.into(),
            ty: ty.into(),
            init,
        }
    }

    pub fn method(name: &str, formals: &[(&str, &str)], return_type: &str, body: Expr) -> Feature {
        Feature::Method {
            name: name.into(),
            formals: formals
                .iter()
                .map(|(n, t)| Formal {
                    name: (*n).into(),
                    ty: (*t).into(),
                })
                .collect(),
            return_type: return_type.into(),
            body: Some(body),
        }
    }

    pub fn expr(kind: ExprKind, ty: &str, line: usize) -> Expr {
        Expr {
            kind,
            ty: ty.into(),
            line,
        }
    }

    pub fn int(v: CoolInt) -> Expr {
        expr(ExprKind::Int(v), "Int", 1)
    }

    pub fn boolean(v: bool) -> Expr {
        expr(ExprKind::Bool(v), "Bool", 1)
    }

    pub fn string(s: &str) -> Expr {
        expr(ExprKind::Str(s.into()), "String", 1)
    }

    pub fn object(name: &str, ty: &str) -> Expr {
        expr(ExprKind::Object(name.into()), ty, 1)
    }

    pub fn self_object() -> Expr {
        object(SELF, SELF_TYPE)
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        let ty = match op {
            BinOp::Plus | BinOp::Minus | BinOp::Mul | BinOp::Div => "Int",
            BinOp::Lt | BinOp::Le | BinOp::Eq => "Bool",
        };
        expr(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty,
            1,
        )
    }

    pub fn unary(op: UnOp, e: Expr) -> Expr {
        let ty = match op {
            UnOp::Neg => "Int",
            UnOp::IsVoid | UnOp::Not => "Bool",
        };
        expr(
            ExprKind::Unary {
                op,
                expr: Box::new(e),
            },
            ty,
            1,
        )
    }

    pub fn new(ty: &str) -> Expr {
        expr(ExprKind::New(ty.into()), ty, 1)
    }

    pub fn dispatch(receiver: Expr, method: &str, args: Vec<Expr>, ty: &str, line: usize) -> Expr {
        expr(
            ExprKind::Dispatch {
                receiver: Box::new(receiver),
                static_type: None,
                method: method.into(),
                args,
            },
            ty,
            line,
        )
    }

    pub fn static_dispatch(
        receiver: Expr,
        static_type: &str,
        method: &str,
        args: Vec<Expr>,
        ty: &str,
    ) -> Expr {
        expr(
            ExprKind::Dispatch {
                receiver: Box::new(receiver),
                static_type: Some(static_type.into()),
                method: method.into(),
                args,
            },
            ty,
            1,
        )
    }

    pub fn assign(name: &str, e: Expr) -> Expr {
        let ty = e.ty.clone();
        expr(
            ExprKind::Assign {
                name: name.into(),
                expr: Box::new(e),
            },
            &ty,
            1,
        )
    }

    pub fn let_in(name: &str, ty: &str, init: Option<Expr>, body: Expr) -> Expr {
        let body_ty = body.ty.clone();
        expr(
            ExprKind::Let {
                name: name.into(),
                ty: ty.into(),
                init: init.map(Box::new),
                body: Box::new(body),
            },
            &body_ty,
            1,
        )
    }

    pub fn block(exprs: Vec<Expr>) -> Expr {
        let ty = exprs.last().map(|e| e.ty.clone()).unwrap_or_else(|| "Object".into());
        expr(ExprKind::Block(exprs), &ty, 1)
    }

    pub fn while_loop(pred: Expr, body: Expr) -> Expr {
        expr(
            ExprKind::While {
                pred: Box::new(pred),
                body: Box::new(body),
            },
            "Object",
            1,
        )
    }

    pub fn if_then_else(pred: Expr, then: Expr, els: Expr, ty: &str) -> Expr {
        expr(
            ExprKind::If {
                pred: Box::new(pred),
                then: Box::new(then),
                els: Box::new(els),
            },
            ty,
            1,
        )
    }

    pub fn case(scrutinee: Expr, branches: Vec<(&str, &str, Expr)>, ty: &str, line: usize) -> Expr {
        expr(
            ExprKind::Case {
                scrutinee: Box::new(scrutinee),
                branches: branches
                    .into_iter()
                    .map(|(name, ty, body)| CaseBranch {
                        name: name.into(),
                        ty: ty.into(),
                        body,
                    })
                    .collect(),
            },
            ty,
            line,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::helpers::*;
    use super::*;

    #[test]
    fn hierarchy_survives_json() {
        let program = Program {
            classes: vec![class(
                "Main",
                "IO",
                vec![
                    attr("x", "Int", Some(int(3))),
                    method("main", &[], "Object", binary(BinOp::Plus, int(1), int(2))),
                ],
            )],
        };
        let text = serde_json::to_string(&program).unwrap();
        let back: Program = serde_json::from_str(&text).unwrap();
        assert_eq!(program, back);
        assert_eq!(1, back.class("Main").unwrap().attributes().count());
        assert_eq!(1, back.class("Main").unwrap().methods().count());
    }
}
