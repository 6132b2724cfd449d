//! The typed AST .
//!
//! Every [`Expr`] carries a mutable type slot, unset after lowering and
//! filled in by the semantic analyzer (Design Note 1). `Type` isn't `Copy`
//! (it owns boxed children), so the slot is a `RefCell<Option<Type>>`
//! rather than a bare `Cell`.

use std::cell::RefCell;

use crate::intern::Symbol;
use crate::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOpKind {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Neq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniOpKind {
    Not,
}

#[derive(Debug)]
pub enum Expr {
    Symbol(Symbol),
    Integer(i64),
    Float(f64),
    String(Symbol),
    Bool(bool),
    BinOp(BinOpKind, Box<Expr>, Box<Expr>),
    UniOp(UniOpKind, Box<Expr>),
    Call(Symbol, Vec<Expr>),
    Cast(Type, Box<Expr>),
    Array(Vec<Expr>),
    /// Pointer dereference.
    Get(Box<Expr>),
    /// Address-of a named variable.
    Ref(Symbol),
    /// Pointer to an array element.
    ARef(Box<Expr>, Box<Expr>),
    /// Internal node wrapper carrying the mutable type slot; see
    /// [`Expr::typed`]. Every expression constructed by the lowerer is
    /// wrapped in this so the analyzer has somewhere to write the
    /// resolved type.
    Typed(Box<Expr>, RefCell<Option<Type>>),
}

impl Expr {
    /// Wrap a freshly-lowered expression with an unset type slot.
    pub fn typed(inner: Expr) -> Expr {
        Expr::Typed(Box::new(inner), RefCell::new(None))
    }

    /// Peel away the `Typed` wrapper to get at the underlying node kind.
    pub fn kind(&self) -> &Expr {
        match self {
            Expr::Typed(inner, _) => inner.kind(),
            other => other,
        }
    }

    pub fn type_slot(&self) -> &RefCell<Option<Type>> {
        match self {
            Expr::Typed(_, slot) => slot,
            _ => panic!("type_slot called on an unwrapped Expr node"),
        }
    }

    pub fn resolved_type(&self) -> Type {
        self.type_slot()
            .borrow()
            .clone()
            .expect("expression type slot read before semantic analysis filled it")
    }

    pub fn set_type(&self, ty: Type) {
        *self.type_slot().borrow_mut() = Some(ty);
    }

    /// `Some(name)` if this expression (through any `Typed` wrapper) is a
    /// bare symbol reference.
    pub fn as_symbol(&self) -> Option<Symbol> {
        match self.kind() {
            Expr::Symbol(sym) => Some(*sym),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum Stmt {
    Decl(Symbol, Type),
    Let(Symbol, Expr),
    Set(Symbol, Expr),
    Store(Expr, Expr),
    Return(Expr),
    Call(Symbol, Vec<Expr>),
    CFlow(CFlowKind, Expr, Vec<Stmt>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CFlowKind {
    If,
    While,
}

#[derive(Debug, Clone)]
pub struct FuncArg {
    pub name: Symbol,
    pub ty: Type,
}

#[derive(Debug)]
pub struct Func {
    pub name: Symbol,
    pub args: Vec<FuncArg>,
    pub ret: Type,
    /// `None` for a forward declaration.
    pub body: Option<Vec<Stmt>>,
    pub vararg: bool,
}

#[derive(Debug, Clone)]
pub struct RecordField {
    pub name: Symbol,
    pub ty: Type,
}

#[derive(Debug, Clone)]
pub struct Record {
    pub name: Symbol,
    pub fields: Vec<RecordField>,
}

#[derive(Debug)]
pub enum Item {
    Include(Symbol),
    Func(Func),
    Record(Record),
}

#[derive(Debug, Default)]
pub struct Program {
    pub items: Vec<Item>,
}
