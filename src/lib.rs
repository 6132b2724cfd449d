//! Falsetto: a single-pass whole-program compiler from FL, a small
//! S-expression systems language, to portable ISO C.
//!
//! The pipeline is four stages, each owning one file: [`reader`] turns
//! UTF-8 bytes into an atom tree, [`lower`] turns atoms into a typed AST,
//! [`sema`] type-checks that AST in place, and [`emit`] renders the result
//! as C source. There is no error recovery anywhere in the chain: the
//! first [`error::CompileError`] returned aborts the whole compilation.

pub mod ast;
pub mod emit;
pub mod error;
pub mod intern;
pub mod lower;
pub mod reader;
pub mod sema;
pub mod types;

use error::Result;
use intern::Interner;

/// Run the full pipeline over `source`, returning the emitted C text.
///
/// Nothing is written to disk here; the caller decides what to do with
/// the returned `String` (and should only open a destination file after
/// this returns `Ok`, so a failing compile never leaves a partial file
/// behind).
pub fn compile_source(source: &str) -> Result<String> {
    let mut interner = Interner::new();
    let atoms = reader::read(source.as_bytes(), &mut interner)?;
    let program = lower::lower_program(&atoms, &interner)?;
    let ctx = sema::analyze(&program, &interner)?;
    emit::emit(&program, &ctx, &interner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompileError;

    #[test]
    fn compiles_a_minimal_program_end_to_end() {
        let c = compile_source("(func main () I32 ((return 0)))").unwrap();
        assert!(c.contains("int main(void)"));
        assert!(c.contains("return 0;"));
    }

    #[test]
    fn bracket_style_does_not_change_the_emitted_output() {
        let parens = compile_source("(func main () I32 ((return 0)))").unwrap();
        let brackets = compile_source("[func main [] I32 [[return 0]]]").unwrap();
        assert_eq!(parens, brackets);
    }

    #[test]
    fn first_error_aborts_before_any_output_is_produced() {
        let err = compile_source("(func main () I32 ((return undefined_name)))").unwrap_err();
        assert!(matches!(err, CompileError::Unresolved(_)));
    }

    #[test]
    fn includes_precede_declarations_in_emitted_order() {
        let c = compile_source(
            r#"(include "stdio.h") (func printf ((fmt (@ U8)) ...) I32) (func main () I32 ((return 0)))"#,
        )
        .unwrap();
        let include_pos = c.find("#include").unwrap();
        let printf_pos = c.find("int printf").unwrap();
        assert!(include_pos < printf_pos);
    }
}
