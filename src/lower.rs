//! The lowerer: raw [`Atom`] trees to the typed AST.
//!
//! Pattern-matches atom trees into `Item`/`Stmt`/`Expr` nodes, resolving
//! every keyword form. Arity and "is this a symbol" checks happen here, so
//! a `Program` that comes out of `lower` is guaranteed well-formed — the
//! analyzer never has to re-check shape, only types.

use crate::ast::{
    BinOpKind, CFlowKind, Expr, Func, FuncArg, Item, Program, Record, RecordField, Stmt, UniOpKind,
};
use crate::error::{CompileError, Result};
use crate::intern::{Interner, Symbol};
use crate::reader::Atom;
use crate::types::Type;

fn parse_err(msg: impl Into<String>) -> CompileError {
    CompileError::Parse(msg.into())
}

/// A list atom's children, or a parse error naming what was expected.
fn expect_list<'a>(atom: &'a Atom, what: &str) -> Result<&'a [Atom]> {
    atom.as_list()
        .ok_or_else(|| parse_err(format!("{what} must be an expression")))
}

fn expect_symbol(atom: &Atom, interner: &Interner, what: &str) -> Result<Symbol> {
    match atom {
        Atom::Symbol(sym) => Ok(*sym),
        _ => Err(parse_err(format!("{what} must be a symbol"))),
    }
}

fn head_symbol<'a>(list: &[Atom], interner: &'a Interner) -> Result<&'a str> {
    let head = list
        .first()
        .ok_or_else(|| parse_err("expression expected a symbol in head position, found nothing"))?;
    head.as_symbol(interner)
        .ok_or_else(|| parse_err("expression expected a symbol in head position"))
}

/// Type parsing: symbols for scalar kinds, `(Array T N)`,
/// `(@ T)`.
pub fn parse_type(atom: &Atom, interner: &Interner) -> Result<Type> {
    match atom {
        Atom::Symbol(sym) => match interner.resolve(*sym) {
            "I8" => Ok(Type::I8),
            "U8" => Ok(Type::U8),
            "I16" => Ok(Type::I16),
            "U16" => Ok(Type::U16),
            "I32" => Ok(Type::I32),
            "U32" => Ok(Type::U32),
            "I64" => Ok(Type::I64),
            "U64" => Ok(Type::U64),
            "Bool" => Ok(Type::Bool),
            "Void" => Ok(Type::Void),
            other => Err(parse_err(format!("unknown type: {other}"))),
        },
        Atom::List(items) => {
            let head = head_symbol(items, interner)?;
            match head {
                "Array" => {
                    if items.len() != 3 {
                        return Err(parse_err("(Array T N) expects exactly 2 arguments"));
                    }
                    let child = parse_type(&items[1], interner)?;
                    let count = match &items[2] {
                        Atom::Integer(n) => *n,
                        _ => return Err(parse_err("array length must be an integer literal")),
                    };
                    if count < 0 {
                        return Err(parse_err("array length must not be negative"));
                    }
                    Ok(Type::Array(Box::new(child), count as usize))
                }
                "@" => {
                    if items.len() != 2 {
                        return Err(parse_err("(@ T) expects exactly 1 argument"));
                    }
                    let child = parse_type(&items[1], interner)?;
                    Ok(Type::Pointer(Box::new(child)))
                }
                other => Err(parse_err(format!("invalid type modifier: {other}"))),
            }
        }
        _ => Err(parse_err("a type must be a symbol or an expression")),
    }
}

fn binop_kind(op: &str) -> Option<BinOpKind> {
    Some(match op {
        "+" => BinOpKind::Add,
        "-" => BinOpKind::Sub,
        "*" => BinOpKind::Mul,
        "/" => BinOpKind::Div,
        "mod" => BinOpKind::Mod,
        "=" => BinOpKind::Eq,
        "!=" => BinOpKind::Neq,
        "<" => BinOpKind::Lt,
        ">" => BinOpKind::Gt,
        "<=" => BinOpKind::LtEq,
        ">=" => BinOpKind::GtEq,
        "and" => BinOpKind::And,
        "or" => BinOpKind::Or,
        _ => return None,
    })
}

/// Expression lowering. Every node returned is wrapped
/// with an unset type slot via [`Expr::typed`].
pub fn lower_expr(atom: &Atom, interner: &Interner) -> Result<Expr> {
    let inner = match atom {
        Atom::Integer(n) => Expr::Integer(*n),
        Atom::Float(f) => Expr::Float(*f),
        Atom::String(sym) => Expr::String(*sym),
        Atom::Symbol(sym) => match interner.resolve(*sym) {
            "true" => Expr::Bool(true),
            "false" => Expr::Bool(false),
            _ => Expr::Symbol(*sym),
        },
        Atom::List(items) => {
            let head = head_symbol(items, interner)?;

            if let Some(kind) = binop_kind(head) {
                if items.len() != 3 {
                    return Err(parse_err(format!(
                        "binary operator '{head}' expects exactly 2 operands"
                    )));
                }
                let lhs = lower_expr(&items[1], interner)?;
                let rhs = lower_expr(&items[2], interner)?;
                Expr::BinOp(kind, Box::new(lhs), Box::new(rhs))
            } else {
                match head {
                    "not" => {
                        if items.len() != 2 {
                            return Err(parse_err("'not' expects exactly 1 operand"));
                        }
                        let arg = lower_expr(&items[1], interner)?;
                        Expr::UniOp(UniOpKind::Not, Box::new(arg))
                    }
                    "array" => {
                        let elements = items[1..]
                            .iter()
                            .map(|e| lower_expr(e, interner))
                            .collect::<Result<Vec<_>>>()?;
                        if elements.is_empty() {
                            return Err(parse_err("array literal must have at least one element"));
                        }
                        Expr::Array(elements)
                    }
                    "get" => {
                        if items.len() != 2 {
                            return Err(parse_err("'get' expects exactly 1 argument"));
                        }
                        Expr::Get(Box::new(lower_expr(&items[1], interner)?))
                    }
                    "ref" => {
                        if items.len() != 2 {
                            return Err(parse_err("'ref' expects exactly 1 argument"));
                        }
                        let name = expect_symbol(&items[1], interner, "'ref' argument")?;
                        Expr::Ref(name)
                    }
                    "aref" => {
                        if items.len() != 3 {
                            return Err(parse_err("'aref' expects exactly 2 arguments"));
                        }
                        let array = lower_expr(&items[1], interner)?;
                        let index = lower_expr(&items[2], interner)?;
                        Expr::ARef(Box::new(array), Box::new(index))
                    }
                    "cast" => {
                        if items.len() != 3 {
                            return Err(parse_err("'cast' expects exactly 2 arguments"));
                        }
                        let from = lower_expr(&items[1], interner)?;
                        let to = parse_type(&items[2], interner)?;
                        Expr::Cast(to, Box::new(from))
                    }
                    _ => {
                        let name_sym = match &items[0] {
                            Atom::Symbol(sym) => *sym,
                            _ => unreachable!("head_symbol already confirmed this is a symbol"),
                        };
                        let args = items[1..]
                            .iter()
                            .map(|e| lower_expr(e, interner))
                            .collect::<Result<Vec<_>>>()?;
                        Expr::Call(name_sym, args)
                    }
                }
            }
        }
    };

    Ok(Expr::typed(inner))
}

fn lower_stmt(atom: &Atom, interner: &Interner) -> Result<Stmt> {
    let items = expect_list(atom, "statement")?;
    let head = head_symbol(items, interner)?;

    match head {
        "decl" => {
            if items.len() != 3 {
                return Err(parse_err("'decl' expects exactly 2 arguments"));
            }
            let name = expect_symbol(&items[1], interner, "declared variable name")?;
            let ty = parse_type(&items[2], interner)?;
            Ok(Stmt::Decl(name, ty))
        }
        "let" => {
            if items.len() != 3 {
                return Err(parse_err("'let' expects exactly 2 arguments"));
            }
            let name = expect_symbol(&items[1], interner, "let-bound variable name")?;
            let value = lower_expr(&items[2], interner)?;
            Ok(Stmt::Let(name, value))
        }
        "set" => {
            if items.len() != 3 {
                return Err(parse_err("'set' expects exactly 2 arguments"));
            }
            let name = expect_symbol(&items[1], interner, "assigned variable name")?;
            let value = lower_expr(&items[2], interner)?;
            Ok(Stmt::Set(name, value))
        }
        "store" => {
            if items.len() != 3 {
                return Err(parse_err("'store' expects exactly 2 arguments"));
            }
            let ptr = lower_expr(&items[1], interner)?;
            let value = lower_expr(&items[2], interner)?;
            Ok(Stmt::Store(ptr, value))
        }
        "return" => {
            if items.len() != 2 {
                return Err(parse_err("'return' expects exactly 1 argument"));
            }
            Ok(Stmt::Return(lower_expr(&items[1], interner)?))
        }
        "if" => {
            if items.len() != 3 {
                return Err(parse_err("'if' expects exactly 2 arguments"));
            }
            let cond = lower_expr(&items[1], interner)?;
            let body = lower_body(&items[2], interner)?;
            Ok(Stmt::CFlow(CFlowKind::If, cond, body))
        }
        "while" => {
            if items.len() != 3 {
                return Err(parse_err("'while' expects exactly 2 arguments"));
            }
            let cond = lower_expr(&items[1], interner)?;
            let body = lower_body(&items[2], interner)?;
            Ok(Stmt::CFlow(CFlowKind::While, cond, body))
        }
        _ => {
            let name = match &items[0] {
                Atom::Symbol(sym) => *sym,
                _ => unreachable!("head_symbol already confirmed this is a symbol"),
            };
            let args = items[1..]
                .iter()
                .map(|e| lower_expr(e, interner))
                .collect::<Result<Vec<_>>>()?;
            Ok(Stmt::Call(name, args))
        }
    }
}

fn lower_body(atom: &Atom, interner: &Interner) -> Result<Vec<Stmt>> {
    let items = expect_list(atom, "a function/control-flow body")?;
    items.iter().map(|s| lower_stmt(s, interner)).collect()
}

fn lower_args(atom: &Atom, interner: &Interner) -> Result<(Vec<FuncArg>, bool)> {
    let items = expect_list(atom, "an argument list")?;

    let mut args = Vec::new();
    let mut vararg = false;

    for item in items {
        if item.is_symbol_named("...", interner) {
            vararg = true;
            break;
        }
        let pair = expect_list(item, "a function argument")?;
        if pair.len() != 2 {
            return Err(parse_err("function argument must be (Name Type) or ..."));
        }
        let name = expect_symbol(&pair[0], interner, "argument name")?;
        let ty = parse_type(&pair[1], interner)?;
        args.push(FuncArg { name, ty });
    }

    Ok((args, vararg))
}

fn lower_func(items: &[Atom], interner: &Interner) -> Result<Func> {
    if items.len() != 4 && items.len() != 5 {
        return Err(parse_err("invalid argument count to 'func'"));
    }
    let name = expect_symbol(&items[1], interner, "function name")?;
    let (args, vararg) = lower_args(&items[2], interner)?;
    let ret = parse_type(&items[3], interner)?;
    let body = if items.len() == 5 {
        Some(lower_body(&items[4], interner)?)
    } else {
        None
    };

    Ok(Func {
        name,
        args,
        ret,
        body,
        vararg,
    })
}

fn lower_record(items: &[Atom], interner: &Interner) -> Result<Record> {
    if items.len() < 2 {
        return Err(parse_err("'record' expects a name and a field list"));
    }
    let name = expect_symbol(&items[1], interner, "record name")?;

    let mut fields = Vec::new();
    for field_atom in &items[2..] {
        let pair = expect_list(field_atom, "a record field")?;
        if pair.len() != 2 {
            return Err(parse_err("record field must be (Name Type)"));
        }
        let field_name = expect_symbol(&pair[0], interner, "record field name")?;
        let ty = parse_type(&pair[1], interner)?;
        fields.push(RecordField {
            name: field_name,
            ty,
        });
    }

    Ok(Record { name, fields })
}

/// Top-level lowering: walk the root list, dispatching on each
/// element's head symbol.
pub fn lower_program(root: &Atom, interner: &Interner) -> Result<Program> {
    let items = root
        .as_list()
        .ok_or_else(|| parse_err("the top level of a program must be a list of declarations"))?;

    let mut program = Program::default();

    for item_atom in items {
        let fields = expect_list(item_atom, "a top-level declaration")?;
        let head = head_symbol(fields, interner)?;

        let item = match head {
            "include" => {
                if fields.len() != 2 {
                    return Err(parse_err("'include' expects exactly 1 argument"));
                }
                let name = match &fields[1] {
                    Atom::String(sym) => *sym,
                    _ => return Err(parse_err("'include' expects a string")),
                };
                Item::Include(name)
            }
            "func" => Item::Func(lower_func(fields, interner)?),
            "record" => Item::Record(lower_record(fields, interner)?),
            other => {
                return Err(parse_err(format!(
                    "unknown top-level declaration: {other}"
                )))
            }
        };

        program.items.push(item);
    }

    Ok(program)
}
