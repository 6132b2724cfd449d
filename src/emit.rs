//! The emitter: writes the synthesized-definitions prelude followed by
//! user code as ISO C, into an in-memory buffer. Nothing is written to
//! disk from here — the caller only opens the destination file once the
//! whole buffer is ready, so a failing compilation never leaves a partial
//! file behind.

use std::fmt::Write;

use crate::ast::{BinOpKind, CFlowKind, Expr, Func, Item, Program, Stmt, UniOpKind};
use crate::error::Result;
use crate::intern::{Interner, Symbol};
use crate::sema::CompilerCtx;
use crate::types::Type;

fn binop_c(kind: BinOpKind) -> &'static str {
    match kind {
        BinOpKind::Add => "+",
        BinOpKind::Sub => "-",
        BinOpKind::Mul => "*",
        BinOpKind::Div => "/",
        BinOpKind::Mod => "%",
        BinOpKind::Eq => "==",
        BinOpKind::Neq => "!=",
        BinOpKind::Lt => "<",
        BinOpKind::Gt => ">",
        BinOpKind::LtEq => "<=",
        BinOpKind::GtEq => ">=",
        BinOpKind::And => "&&",
        BinOpKind::Or => "||",
    }
}

/// The struct-plus-accessor template every synthesized array type emits,
/// named after its mangled name so identical shapes dedupe.
fn emit_array_synth(out: &mut String, child: &Type, count: usize, mangled: &str) -> Result<()> {
    writeln!(
        out,
        "typedef struct {{ {} inner[{}]; }} {};",
        child.type_c(),
        count,
        mangled
    )?;
    writeln!(
        out,
        "static inline {}* aref{}({} *a, long long int i) {{ return (a->inner + i); }}",
        child.type_c(),
        mangled,
        mangled
    )?;
    Ok(())
}

fn emit_prelude(out: &mut String, ctx: &CompilerCtx) -> Result<()> {
    for synth in &ctx.synth_defs {
        if let Type::Array(child, count) = &synth.ty {
            emit_array_synth(out, child, *count, &synth.ty.mangle())?;
        }
    }
    Ok(())
}

fn emit_include(out: &mut String, name: Symbol, interner: &Interner) -> Result<()> {
    writeln!(out, "#include <{}>", interner.resolve(name))?;
    Ok(())
}

fn emit_record(out: &mut String, record: &crate::ast::Record, interner: &Interner) -> Result<()> {
    writeln!(out, "typedef struct {{")?;
    for field in &record.fields {
        writeln!(
            out,
            "    {} {};",
            field.ty.type_c(),
            interner.resolve(field.name)
        )?;
    }
    writeln!(out, "}} {};", interner.resolve(record.name))?;
    Ok(())
}

fn emit_func_header(out: &mut String, func: &Func, interner: &Interner) -> Result<()> {
    write!(out, "{} {}(", func.ret.type_c(), interner.resolve(func.name))?;
    if func.args.is_empty() && !func.vararg {
        write!(out, "void")?;
    } else {
        for (i, arg) in func.args.iter().enumerate() {
            if i > 0 {
                write!(out, ", ")?;
            }
            write!(out, "{} {}", arg.ty.type_c(), interner.resolve(arg.name))?;
        }
        if func.vararg {
            if !func.args.is_empty() {
                write!(out, ", ")?;
            }
            write!(out, "...")?;
        }
    }
    write!(out, ")")?;
    Ok(())
}

fn emit_expr(out: &mut String, expr: &Expr, interner: &Interner) -> Result<()> {
    match expr.kind() {
        Expr::Integer(n) => write!(out, "{n}")?,
        Expr::Float(f) => write!(out, "{f}")?,
        Expr::String(sym) => write!(out, "\"{}\"", interner.resolve(*sym))?,
        Expr::Bool(b) => write!(out, "{}", if *b { 1 } else { 0 })?,
        Expr::Symbol(sym) => write!(out, "{}", interner.resolve(*sym))?,

        Expr::BinOp(kind, lhs, rhs) => {
            write!(out, "(")?;
            emit_expr(out, lhs, interner)?;
            write!(out, " {} ", binop_c(*kind))?;
            emit_expr(out, rhs, interner)?;
            write!(out, ")")?;
        }

        Expr::UniOp(UniOpKind::Not, inner) => {
            write!(out, "(!")?;
            emit_expr(out, inner, interner)?;
            write!(out, ")")?;
        }

        Expr::Call(name, args) => {
            write!(out, "{}(", interner.resolve(*name))?;
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    write!(out, ", ")?;
                }
                emit_expr(out, arg, interner)?;
            }
            write!(out, ")")?;
        }

        Expr::Cast(to, inner) => {
            write!(out, "(({})", to.type_c())?;
            emit_expr(out, inner, interner)?;
            write!(out, ")")?;
        }

        Expr::Array(elements) => {
            write!(out, "{{{{")?;
            for (i, el) in elements.iter().enumerate() {
                if i > 0 {
                    write!(out, ", ")?;
                }
                emit_expr(out, el, interner)?;
            }
            write!(out, "}}}}")?;
        }

        Expr::Get(inner) => {
            write!(out, "(*")?;
            emit_expr(out, inner, interner)?;
            write!(out, ")")?;
        }

        Expr::Ref(name) => write!(out, "(&{})", interner.resolve(*name))?,

        Expr::ARef(array, index) => {
            let mangled = array.resolved_type().mangle();
            write!(out, "aref{mangled}(&")?;
            emit_expr(out, array, interner)?;
            write!(out, ", ")?;
            emit_expr(out, index, interner)?;
            write!(out, ")")?;
        }

        Expr::Typed(..) => unreachable!("Expr::kind() never returns a Typed node"),
    }
    Ok(())
}

fn emit_stmt(out: &mut String, stmt: &Stmt, interner: &Interner, indent: usize) -> Result<()> {
    let pad = "    ".repeat(indent);
    match stmt {
        Stmt::Decl(name, ty) => {
            writeln!(out, "{pad}{} {};", ty.type_c(), interner.resolve(*name))?;
        }
        Stmt::Let(name, value) => {
            let ty = value.resolved_type();
            write!(out, "{pad}{} {} = ", ty.type_c(), interner.resolve(*name))?;
            emit_expr(out, value, interner)?;
            writeln!(out, ";")?;
        }
        Stmt::Set(name, value) => {
            write!(out, "{pad}{} = ", interner.resolve(*name))?;
            emit_expr(out, value, interner)?;
            writeln!(out, ";")?;
        }
        Stmt::Store(ptr, value) => {
            write!(out, "{pad}*")?;
            emit_expr(out, ptr, interner)?;
            write!(out, " = ")?;
            emit_expr(out, value, interner)?;
            writeln!(out, ";")?;
        }
        Stmt::Return(value) => {
            write!(out, "{pad}return ")?;
            emit_expr(out, value, interner)?;
            writeln!(out, ";")?;
        }
        Stmt::Call(name, args) => {
            write!(out, "{pad}{}(", interner.resolve(*name))?;
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    write!(out, ", ")?;
                }
                emit_expr(out, arg, interner)?;
            }
            writeln!(out, ");")?;
        }
        Stmt::CFlow(kind, cond, body) => {
            let keyword = match kind {
                CFlowKind::If => "if",
                CFlowKind::While => "while",
            };
            write!(out, "{pad}{keyword} (")?;
            emit_expr(out, cond, interner)?;
            writeln!(out, ") {{")?;
            for s in body {
                emit_stmt(out, s, interner, indent + 1)?;
            }
            writeln!(out, "{pad}}}")?;
        }
    }
    Ok(())
}

fn emit_func(out: &mut String, func: &Func, interner: &Interner) -> Result<()> {
    emit_func_header(out, func, interner)?;
    match &func.body {
        None => writeln!(out, ";")?,
        Some(body) => {
            writeln!(out, " {{")?;
            for stmt in body {
                emit_stmt(out, stmt, interner, 1)?;
            }
            writeln!(out, "}}")?;
        }
    }
    Ok(())
}

/// Render `program`'s prelude plus body, given the populated analysis
/// context, as a single ISO C translation unit.
pub fn emit(program: &Program, ctx: &CompilerCtx, interner: &Interner) -> Result<String> {
    let mut out = String::new();
    emit_prelude(&mut out, ctx)?;

    for item in &program.items {
        match item {
            Item::Include(name) => emit_include(&mut out, *name, interner)?,
            Item::Record(record) => emit_record(&mut out, record, interner)?,
            Item::Func(func) => emit_func(&mut out, func, interner)?,
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::lower_program;
    use crate::reader;
    use crate::sema::analyze;

    fn emit_src(src: &str) -> String {
        let mut interner = Interner::new();
        let atom = reader::read(src.as_bytes(), &mut interner).unwrap();
        let program = lower_program(&atom, &interner).unwrap();
        let ctx = analyze(&program, &interner).unwrap();
        emit(&program, &ctx, &interner).unwrap()
    }

    #[test]
    fn include_becomes_an_angle_bracket_directive() {
        let c = emit_src(r#"(include "stdio.h")"#);
        assert!(c.contains("#include <stdio.h>"));
    }

    #[test]
    fn forward_declaration_ends_in_a_semicolon_with_no_body() {
        let c = emit_src("(func f () I32)");
        assert!(c.contains("int f(void);"));
    }

    #[test]
    fn void_no_arg_function_spells_out_void_params() {
        let c = emit_src("(func main () Void ((return 0)))");
        assert!(c.contains("void main(void)"));
    }

    #[test]
    fn array_access_calls_the_synthesized_accessor() {
        let c = emit_src(
            "(func main () I32 ((decl a (Array I32 4)) (return (get (aref a 0)))))",
        );
        assert!(c.contains("typedef struct { int inner[4]; } _Array_I32_4;"));
        assert!(c.contains("aref_Array_I32_4(&a, 0)"));
    }

    #[test]
    fn array_literal_emits_double_brace_compound_initializer() {
        let c = emit_src(
            "(func main () I32 ((decl a (Array I32 3)) (set a (array 1 2 3)) (return 0)))",
        );
        assert!(c.contains("{{1, 2, 3}}"));
    }

    #[test]
    fn vararg_function_header_spells_out_the_ellipsis() {
        let c = emit_src(r#"(include "stdio.h") (func printf ((fmt (@ U8)) ...) I32)"#);
        assert!(c.contains("int printf(unsigned char* fmt, ...);"));
    }

    #[test]
    fn while_loop_braces_its_body_at_one_deeper_indent() {
        let c = emit_src(
            "(func main () I32 ((decl i I32) (set i 0) (while (< i 10) ((set i (+ i 1)))) (return i)))",
        );
        assert!(c.contains("while ((i < 10)) {"));
    }
}
