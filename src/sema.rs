//! The semantic analyzer: two-pass type checking over a lowered [`Program`].
//!
//! Pass 1 registers every function signature and record layout so forward
//! references resolve regardless of declaration order. Pass 2 walks each
//! function body with a scope stack, typing every expression in place and
//! synthesizing the C support definitions compound types need along the
//! way. All mutable pipeline state lives in [`CompilerCtx`]; nothing here
//! reaches for a global.

use std::collections::HashMap;

use crate::ast::{BinOpKind, CFlowKind, Expr, Func, FuncArg, Item, Program, Record, Stmt, UniOpKind};
use crate::error::{CompileError, Result};
use crate::intern::{Interner, Symbol};
use crate::types::Type;

#[derive(Debug, Clone)]
pub struct FuncSig {
    pub args: Vec<FuncArg>,
    pub ret: Type,
    pub vararg: bool,
    pub has_body: bool,
}

/// A synthesized C support definition for a compound type: the
/// `typedef struct { ... }` and its `aref<mangled>` accessor. Kept in
/// first-observed order so the emitter's prelude is deterministic.
#[derive(Debug, Clone)]
pub struct SynthDef {
    pub ty: Type,
}

/// Bundles the global state the original implementation threaded through
/// file-scope statics: function/record tables, the synthesized-definition
/// list, and the live scope stack.
pub struct CompilerCtx<'a> {
    pub interner: &'a Interner,
    pub funcs: HashMap<Symbol, FuncSig>,
    pub records: HashMap<Symbol, Record>,
    pub synth_defs: Vec<SynthDef>,
    synth_seen: std::collections::HashSet<String>,
    scopes: Vec<Vec<(Symbol, Type)>>,
}

impl<'a> CompilerCtx<'a> {
    pub fn new(interner: &'a Interner) -> Self {
        CompilerCtx {
            interner,
            funcs: HashMap::new(),
            records: HashMap::new(),
            synth_defs: Vec::new(),
            synth_seen: std::collections::HashSet::new(),
            scopes: Vec::new(),
        }
    }

    fn name(&self, sym: Symbol) -> &str {
        self.interner.resolve(sym)
    }

    fn push_scope(&mut self) {
        let cloned = self.scopes.last().cloned().unwrap_or_default();
        self.scopes.push(cloned);
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn bind(&mut self, name: Symbol, ty: Type) {
        self.scopes
            .last_mut()
            .expect("bind called outside any scope")
            .push((name, ty));
    }

    /// Last-inserted-wins lookup, searching the innermost scope's vector
    /// from the back.
    fn lookup(&self, name: Symbol) -> Option<Type> {
        self.scopes
            .last()?
            .iter()
            .rev()
            .find(|(n, _)| *n == name)
            .map(|(_, t)| t.clone())
    }

    /// Rebind `name` to `ty` in the innermost scope. Used by the
    /// side-effecting coercion rule below.
    fn rebind(&mut self, name: Symbol, ty: Type) {
        self.bind(name, ty);
    }

    /// Register a synthesized C support definition for `ty` if one hasn't
    /// already been emitted for this mangled name, recursing into child
    /// types first so dependencies appear earlier in the prelude.
    fn synthesize(&mut self, ty: &Type) {
        match ty {
            Type::Array(child, _) if !child.is_partial() => {
                self.synthesize(child);
                let mangled = ty.mangle();
                if self.synth_seen.insert(mangled) {
                    self.synth_defs.push(SynthDef { ty: ty.clone() });
                }
            }
            Type::Array(_, _) => {}
            Type::Pointer(child) => self.synthesize(child),
            _ => {}
        }
    }
}

/// Coercion at an assignment-like site. On success against a bare-symbol
/// expression, rebinds that symbol's scope entry to `dest` — the
/// side-effecting variant is the one this analyzer implements throughout
/// (two candidate definitions existed upstream; only this one is ever
/// reachable from a full type-check run).
fn coerce(ctx: &mut CompilerCtx, expr: &Expr, dest: &Type) -> Result<()> {
    let actual = expr.resolved_type();
    if !dest.coerces_from(&actual) {
        return Err(CompileError::Type(format!(
            "expected {}, found {}",
            dest.as_string(),
            actual.as_string()
        )));
    }

    if let Some(sym) = expr.as_symbol() {
        ctx.rebind(sym, dest.clone());
    }
    expr.set_type(dest.clone());
    ctx.synthesize(dest);
    Ok(())
}

fn type_cast(ctx: &mut CompilerCtx, to: &Type, from_expr: &Expr) -> Result<()> {
    let from = from_expr.resolved_type();
    if !to.casts_from(&from) {
        return Err(CompileError::Cast(format!(
            "cannot cast {} to {}",
            from.as_string(),
            to.as_string()
        )));
    }
    ctx.synthesize(to);
    Ok(())
}

fn type_expr(ctx: &mut CompilerCtx, expr: &Expr) -> Result<Type> {
    let ty = match expr.kind() {
        Expr::Integer(_) => Type::Integer,
        Expr::Float(_) => {
            return Err(CompileError::Internal(
                "floating-point literals reached the analyzer; the reader should have rejected them".to_string(),
            ))
        }
        Expr::String(_) => Type::Pointer(Box::new(Type::U8)),
        Expr::Bool(_) => Type::Bool,

        Expr::Symbol(sym) => ctx
            .lookup(*sym)
            .ok_or_else(|| CompileError::Unresolved(format!("'{}' is not in scope", ctx.name(*sym))))?,

        Expr::BinOp(kind, lhs, rhs) => {
            let lhs_ty = type_expr(ctx, lhs)?;
            lhs.set_type(lhs_ty.clone());
            // The right operand is typed independently from the left, never
            // inherited from it — the two sides can legitimately disagree
            // and the mismatch must surface as a real type error.
            let rhs_ty = type_expr(ctx, rhs)?;
            rhs.set_type(rhs_ty.clone());

            match kind {
                BinOpKind::And | BinOpKind::Or => {
                    if !Type::Bool.coerces_from(&lhs_ty) || !Type::Bool.coerces_from(&rhs_ty) {
                        return Err(CompileError::Type(format!(
                            "'and'/'or' expect Bool operands, found {} and {}",
                            lhs_ty.as_string(),
                            rhs_ty.as_string()
                        )));
                    }
                    Type::Bool
                }

                BinOpKind::Eq
                | BinOpKind::Neq
                | BinOpKind::Lt
                | BinOpKind::Gt
                | BinOpKind::LtEq
                | BinOpKind::GtEq => {
                    if !lhs_ty.coerces_from(&rhs_ty) && !rhs_ty.coerces_from(&lhs_ty) {
                        return Err(CompileError::Type(format!(
                            "relational operator operands must agree, found {} and {}",
                            lhs_ty.as_string(),
                            rhs_ty.as_string()
                        )));
                    }
                    Type::Bool
                }

                _ => {
                    if !lhs_ty.is_integer() || !rhs_ty.is_integer() {
                        return Err(CompileError::Type(format!(
                            "operator expects integer operands, found {} and {}",
                            lhs_ty.as_string(),
                            rhs_ty.as_string()
                        )));
                    }
                    if lhs_ty.is_partial() {
                        rhs_ty
                    } else {
                        lhs_ty
                    }
                }
            }
        }

        Expr::UniOp(UniOpKind::Not, inner) => {
            let inner_ty = type_expr(ctx, inner)?;
            inner.set_type(inner_ty.clone());
            if inner_ty != Type::Bool {
                return Err(CompileError::Type(format!(
                    "'not' expects Bool, found {}",
                    inner_ty.as_string()
                )));
            }
            Type::Bool
        }

        Expr::Call(name, args) => type_call(ctx, *name, args)?,

        Expr::Cast(to, inner) => {
            let inner_ty = type_expr(ctx, inner)?;
            inner.set_type(inner_ty);
            type_cast(ctx, to, inner)?;
            to.clone()
        }

        Expr::Array(elements) => {
            let first_ty = type_expr(ctx, &elements[0])?;
            elements[0].set_type(first_ty.clone());
            for el in &elements[1..] {
                let el_ty = type_expr(ctx, el)?;
                el.set_type(el_ty.clone());
                if !first_ty.coerces_from(&el_ty) && !el_ty.coerces_from(&first_ty) {
                    return Err(CompileError::Type(format!(
                        "array elements must share a type, found {} and {}",
                        first_ty.as_string(),
                        el_ty.as_string()
                    )));
                }
            }
            let array_ty = Type::Array(Box::new(first_ty), elements.len());
            ctx.synthesize(&array_ty);
            array_ty
        }

        Expr::Get(inner) => {
            let inner_ty = type_expr(ctx, inner)?;
            inner.set_type(inner_ty.clone());
            match inner_ty {
                Type::Pointer(child) => *child,
                other => {
                    return Err(CompileError::Type(format!(
                        "'get' expects a pointer, found {}",
                        other.as_string()
                    )))
                }
            }
        }

        Expr::Ref(name) => {
            let referenced = ctx
                .lookup(*name)
                .ok_or_else(|| CompileError::Unresolved(format!("'{}' is not in scope", ctx.name(*name))))?;
            let ty = Type::Pointer(Box::new(referenced));
            ctx.synthesize(&ty);
            ty
        }

        Expr::ARef(array, index) => {
            let array_ty = type_expr(ctx, array)?;
            array.set_type(array_ty.clone());
            let index_ty = type_expr(ctx, index)?;
            index.set_type(index_ty.clone());

            if !index_ty.is_integer() {
                return Err(CompileError::Type(format!(
                    "array index must be an integer, found {}",
                    index_ty.as_string()
                )));
            }

            match array_ty {
                Type::Array(child, _) => {
                    let ty = Type::Pointer(child);
                    ctx.synthesize(&ty);
                    ty
                }
                other => {
                    return Err(CompileError::Type(format!(
                        "'aref' expects an array, found {}",
                        other.as_string()
                    )))
                }
            }
        }

        Expr::Typed(..) => unreachable!("Expr::kind() never returns a Typed node"),
    };

    expr.set_type(ty.clone());
    Ok(ty)
}

fn type_call(ctx: &mut CompilerCtx, name: Symbol, args: &[Expr]) -> Result<Type> {
    let sig = ctx
        .funcs
        .get(&name)
        .cloned()
        .ok_or_else(|| CompileError::Unresolved(format!("call to unknown function '{}'", ctx.name(name))))?;

    if sig.vararg {
        if args.len() < sig.args.len() {
            return Err(CompileError::Arity(format!(
                "'{}' expects at least {} arguments, found {}",
                ctx.name(name),
                sig.args.len(),
                args.len()
            )));
        }
    } else if args.len() != sig.args.len() {
        return Err(CompileError::Arity(format!(
            "'{}' expects {} arguments, found {}",
            ctx.name(name),
            sig.args.len(),
            args.len()
        )));
    }

    for (i, arg) in args.iter().enumerate() {
        let arg_ty = type_expr(ctx, arg)?;
        arg.set_type(arg_ty);
        if let Some(param) = sig.args.get(i) {
            coerce(ctx, arg, &param.ty)?;
        }
        // Arguments past the declared parameter list (the variadic tail)
        // go through the generic vararg path only: no special-cased
        // formatting-function shortcut.
    }

    Ok(sig.ret.clone())
}

fn type_stmt(ctx: &mut CompilerCtx, stmt: &Stmt, ret_ty: &Type) -> Result<()> {
    match stmt {
        Stmt::Decl(name, ty) => {
            if let Type::Array(_, 0) = ty {
                return Err(CompileError::Type(format!(
                    "'{}' has zero-size array type {}",
                    ctx.name(*name),
                    ty.as_string()
                )));
            }
            ctx.synthesize(ty);
            ctx.bind(*name, ty.clone());
        }

        Stmt::Let(name, value) => {
            let value_ty = type_expr(ctx, value)?;
            value.set_type(value_ty.clone());
            ctx.bind(*name, value_ty);
        }

        Stmt::Set(name, value) => {
            let declared = ctx
                .lookup(*name)
                .ok_or_else(|| CompileError::Unresolved(format!("'{}' is not in scope", ctx.name(*name))))?;
            let value_ty = type_expr(ctx, value)?;
            value.set_type(value_ty);
            coerce(ctx, value, &declared)?;
        }

        Stmt::Store(ptr, value) => {
            let ptr_ty = type_expr(ctx, ptr)?;
            ptr.set_type(ptr_ty.clone());
            let target_ty = match ptr_ty {
                Type::Pointer(child) => *child,
                other => {
                    return Err(CompileError::Type(format!(
                        "'store' target must be a pointer, found {}",
                        other.as_string()
                    )))
                }
            };
            let value_ty = type_expr(ctx, value)?;
            value.set_type(value_ty);
            coerce(ctx, value, &target_ty)?;
        }

        Stmt::Return(value) => {
            let value_ty = type_expr(ctx, value)?;
            value.set_type(value_ty);
            coerce(ctx, value, ret_ty)?;
        }

        Stmt::Call(name, args) => {
            type_call(ctx, *name, args)?;
        }

        Stmt::CFlow(kind, cond, body) => {
            let cond_ty = type_expr(ctx, cond)?;
            cond.set_type(cond_ty.clone());
            if cond_ty != Type::Bool {
                let keyword = match kind {
                    CFlowKind::If => "if",
                    CFlowKind::While => "while",
                };
                return Err(CompileError::Type(format!(
                    "'{keyword}' condition must be Bool, found {}",
                    cond_ty.as_string()
                )));
            }

            ctx.push_scope();
            check_body(ctx, body, ret_ty)?;
            ctx.pop_scope();
        }
    }

    Ok(())
}

/// Type-check every statement in `body`, then revisit each `let` whose
/// bound value was still partial and see whether anything later in the
/// same block (a `set`, `return`, call argument, ...) pinned it down to a
/// concrete type through the scope rebind in [`coerce`]. A `let` that
/// stays partial after that — nothing downstream ever gave it a concrete
/// destination to coerce against — is a type error rather than a value
/// silently reaching the emitter half-typed.
fn check_body(ctx: &mut CompilerCtx, body: &[Stmt], ret_ty: &Type) -> Result<()> {
    for stmt in body {
        type_stmt(ctx, stmt, ret_ty)?;
    }

    for stmt in body {
        let Stmt::Let(name, value) = stmt else {
            continue;
        };
        if !value.resolved_type().is_partial() {
            continue;
        }

        let resolved = ctx.lookup(*name).ok_or_else(|| {
            CompileError::Internal(format!(
                "'{}' vanished from scope after its own 'let'",
                ctx.name(*name)
            ))
        })?;
        if resolved.is_partial() {
            return Err(CompileError::Type(format!(
                "not enough information to infer the type of '{}'",
                ctx.name(*name)
            )));
        }

        value.set_type(resolved.clone());
        ctx.synthesize(&resolved);
    }

    Ok(())
}

fn register_record(ctx: &mut CompilerCtx, record: &Record) -> Result<()> {
    if ctx.records.contains_key(&record.name) {
        return Err(CompileError::Redefinition(format!(
            "record '{}' is already defined",
            ctx.name(record.name)
        )));
    }
    for field in &record.fields {
        if let Type::Array(_, 0) = &field.ty {
            return Err(CompileError::Type(format!(
                "record '{}' field '{}' has zero-size array type",
                ctx.name(record.name),
                ctx.name(field.name)
            )));
        }
        // Supplemented: a record's field types are synthesized at
        // declaration time, even if the record is never instantiated.
        ctx.synthesize(&field.ty);
    }
    ctx.records.insert(record.name, record.clone());
    Ok(())
}

fn register_func(ctx: &mut CompilerCtx, func: &Func) -> Result<()> {
    if let Some(existing) = ctx.funcs.get(&func.name) {
        if existing.has_body && func.body.is_some() {
            return Err(CompileError::Redefinition(format!(
                "function '{}' is already defined",
                ctx.name(func.name)
            )));
        }
    }

    for arg in &func.args {
        if let Type::Array(_, 0) = &arg.ty {
            return Err(CompileError::Type(format!(
                "function '{}' parameter '{}' has zero-size array type",
                ctx.name(func.name),
                ctx.name(arg.name)
            )));
        }
    }
    if let Type::Array(_, 0) = &func.ret {
        return Err(CompileError::Type(format!(
            "function '{}' has zero-size array return type",
            ctx.name(func.name)
        )));
    }

    ctx.funcs.insert(
        func.name,
        FuncSig {
            args: func.args.clone(),
            ret: func.ret.clone(),
            vararg: func.vararg,
            has_body: func.body.is_some(),
        },
    );
    Ok(())
}

fn check_func_body(ctx: &mut CompilerCtx, func: &Func) -> Result<()> {
    let Some(body) = &func.body else {
        return Ok(());
    };

    ctx.push_scope();
    for arg in &func.args {
        ctx.synthesize(&arg.ty);
        ctx.bind(arg.name, arg.ty.clone());
    }
    ctx.synthesize(&func.ret);

    check_body(ctx, body, &func.ret)?;
    ctx.pop_scope();
    Ok(())
}

/// Run both passes over `program`, returning the populated context the
/// emitter reads its synthesized-definition prelude and item list from.
pub fn analyze<'a>(program: &Program, interner: &'a Interner) -> Result<CompilerCtx<'a>> {
    let mut ctx = CompilerCtx::new(interner);

    for item in &program.items {
        match item {
            Item::Func(func) => register_func(&mut ctx, func)?,
            Item::Record(record) => register_record(&mut ctx, record)?,
            Item::Include(_) => {}
        }
    }

    for item in &program.items {
        if let Item::Func(func) = item {
            check_func_body(&mut ctx, func)?;
        }
    }

    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::lower_program;
    use crate::reader;

    fn analyze_src(src: &str) -> Result<()> {
        let mut interner = Interner::new();
        let atom = reader::read(src.as_bytes(), &mut interner).unwrap();
        let program = lower_program(&atom, &interner).unwrap();
        analyze(&program, &interner).map(|_| ())
    }

    #[test]
    fn integer_literal_concretizes_to_the_declared_type() {
        analyze_src("(func main () I32 ((decl x I32) (set x 5) (return x)))").unwrap();
    }

    #[test]
    fn undeclared_variable_is_unresolved() {
        let err = analyze_src("(func main () I32 ((return x)))").unwrap_err();
        assert!(matches!(err, CompileError::Unresolved(_)));
    }

    #[test]
    fn mismatched_return_type_is_a_type_error() {
        let err = analyze_src(r#"(func main () I32 ((return "nope")))"#).unwrap_err();
        assert!(matches!(err, CompileError::Type(_)));
    }

    #[test]
    fn call_arity_mismatch_is_reported() {
        let err = analyze_src(
            "(func f ((a I32)) I32 ((return a))) (func main () I32 ((return (f 1 2))))",
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::Arity(_)));
    }

    #[test]
    fn unknown_call_target_is_unresolved() {
        let err = analyze_src("(func main () I32 ((return (nope))))").unwrap_err();
        assert!(matches!(err, CompileError::Unresolved(_)));
    }

    #[test]
    fn redeclared_function_body_is_a_redefinition() {
        let err = analyze_src(
            "(func f () I32 ((return 1))) (func f () I32 ((return 2)))",
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::Redefinition(_)));
    }

    #[test]
    fn zero_size_array_is_rejected_at_analysis_time() {
        let err = analyze_src("(func main () I32 ((decl x (Array I32 0)) (return 0)))").unwrap_err();
        assert!(matches!(err, CompileError::Type(_)));
    }

    #[test]
    fn binop_operands_are_typed_independently() {
        // lhs is a partial Integer literal, rhs is a sized U8 parameter;
        // the result concretizes to the sized side without either operand
        // silently inheriting the other's type.
        analyze_src("(func f ((a U8)) U8 ((return (+ 1 a))))").unwrap();
    }

    #[test]
    fn scope_does_not_leak_out_of_a_block() {
        let err = analyze_src(
            "(func main () I32 ((if true ((decl y I32))) (return y)))",
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::Unresolved(_)));
    }

    #[test]
    fn array_synthesis_is_recorded_once() {
        let mut interner = Interner::new();
        let atom = reader::read(
            b"(func main () I32 ((decl a (Array I32 4)) (decl b (Array I32 4)) (return 0)))",
            &mut interner,
        )
        .unwrap();
        let program = lower_program(&atom, &interner).unwrap();
        let ctx = analyze(&program, &interner).unwrap();
        let count = ctx
            .synth_defs
            .iter()
            .filter(|d| d.ty == Type::Array(Box::new(Type::I32), 4))
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn record_fields_synthesize_even_when_unused() {
        let mut interner = Interner::new();
        let atom = reader::read(
            b"(record Box (items (Array I32 3))) (func main () I32 ((return 0)))",
            &mut interner,
        )
        .unwrap();
        let program = lower_program(&atom, &interner).unwrap();
        let ctx = analyze(&program, &interner).unwrap();
        assert!(ctx
            .synth_defs
            .iter()
            .any(|d| d.ty == Type::Array(Box::new(Type::I32), 3)));
    }

    #[test]
    fn and_or_accept_bool_operands() {
        analyze_src("(func f ((a Bool) (b Bool)) Bool ((return (and a b))))").unwrap();
        analyze_src("(func f ((a Bool) (b Bool)) Bool ((return (or a b))))").unwrap();
    }

    #[test]
    fn and_on_integer_operands_is_a_type_error() {
        let err = analyze_src("(func f ((a I32) (b I32)) Bool ((return (and a b))))").unwrap_err();
        assert!(matches!(err, CompileError::Type(_)));
    }

    #[test]
    fn relational_operator_accepts_matching_bool_operands() {
        analyze_src("(func f ((a Bool) (b Bool)) Bool ((return (= a b))))").unwrap();
    }

    #[test]
    fn relational_operator_rejects_mismatched_types() {
        let err = analyze_src("(func f ((a Bool) (b I32)) Bool ((return (= a b))))").unwrap_err();
        assert!(matches!(err, CompileError::Type(_)));
    }

    #[test]
    fn array_literal_of_bare_literals_synthesizes_nothing_while_partial() {
        let mut interner = Interner::new();
        let atom = reader::read(
            b"(func main () I32 ((decl a (Array I32 3)) (set a (array 1 2 3)) (return 0)))",
            &mut interner,
        )
        .unwrap();
        let program = lower_program(&atom, &interner).unwrap();
        let ctx = analyze(&program, &interner).unwrap();
        assert!(ctx
            .synth_defs
            .iter()
            .all(|d| !d.ty.mangle().contains("Integer")));
    }

    #[test]
    fn let_bound_array_literal_never_concretized_is_a_type_error() {
        let err =
            analyze_src("(func main () I32 ((let a (array 1 2 3)) (return 0)))").unwrap_err();
        assert!(matches!(err, CompileError::Type(_)));
    }

    #[test]
    fn let_bound_literal_concretizes_once_returned() {
        analyze_src("(func f () I32 ((let x 3) (return x)))").unwrap();
    }
}
