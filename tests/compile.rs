//! End-to-end scenarios exercising the full `reader → lower → sema →
//! emit` pipeline through `falsetto::compile_source`. Comparisons
//! against expected C text are whitespace-insensitive; failure
//! scenarios assert on the returned `CompileError` variant.

use falsetto::compile_source;
use falsetto::error::CompileError;

/// Collapse runs of whitespace so emitted C can be compared loosely.
fn normalize(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[test]
fn s1_hello_world() {
    let c = compile_source(
        r#"(include "stdio.h") (func printf ((fmt (@ U8)) ...) I32) (func main () I32 ((printf "hi\n") (return 0)))"#,
    )
    .unwrap();

    let norm = normalize(&c);
    assert!(norm.contains("#include <stdio.h>"));
    assert!(norm.contains("int main(void) {"));
    assert!(norm.contains(r#"printf("hi\n");"#));
    assert!(norm.contains("return 0;"));
}

#[test]
fn s2_integer_literal_concretizes_to_the_declared_type() {
    let c = compile_source("(func main () I32 ((decl x I32) (set x 3) (return x)))").unwrap();
    let norm = normalize(&c);
    assert!(norm.contains("int x;"));
    assert!(norm.contains("x = 3;"));
}

#[test]
fn s3_array_synthesis_is_deduplicated_across_declarations() {
    let c = compile_source(
        "(func main () I32 ((decl a (Array I32 4)) (decl b (Array I32 4)) (return 0)))",
    )
    .unwrap();

    let typedef_count = c.matches("typedef struct { int inner[4]; }").count();
    let helper_count = c.matches("aref_Array_I32_4").count();

    assert_eq!(typedef_count, 1);
    // One in the helper's own definition, plus one call site per array
    // access — here zero call sites, so exactly the definition.
    assert_eq!(helper_count, 1);
}

#[test]
fn s4_pointer_round_trip() {
    let c = compile_source(
        "(func main () I32 ((decl p (@ I32)) (decl x I32) (set p (ref x)) (store p 7) (return (get p))))",
    )
    .unwrap();

    let norm = normalize(&c);
    let p_decl = norm.find("int* p;").unwrap();
    let x_decl = norm.find("int x;").unwrap();
    let set_p = norm.find("p = (&x);").unwrap();
    let store = norm.find("*p = 7;").unwrap();
    let ret = norm.find("return (*p);").unwrap();

    assert!(p_decl < set_p);
    assert!(x_decl < set_p);
    assert!(set_p < store);
    assert!(store < ret);
}

#[test]
fn s5_variadic_call_skips_coercion_on_the_tail() {
    let c = compile_source(
        r#"(func printf ((fmt (@ U8)) ...) I32) (func main () I32 ((printf "%d\n" 42) (return 0)))"#,
    )
    .unwrap();

    let norm = normalize(&c);
    assert!(norm.contains(r#"printf("%d\n", 42);"#));
}

#[test]
fn s6_bad_coercion_is_a_type_error_with_no_output() {
    let err = compile_source("(func f ((b Bool)) I32 ((return b)))").unwrap_err();
    match &err {
        CompileError::Type(msg) => {
            assert!(msg.contains("I32"));
            assert!(msg.contains("Bool"));
        }
        other => panic!("expected a Type error, got {other:?}"),
    }
}

#[test]
fn bracket_styles_are_fully_interchangeable() {
    let parens =
        compile_source("(func main () I32 ((decl x I32) (set x 1) (return x)))").unwrap();
    let mixed =
        compile_source("[func main () I32 {[decl x I32] [set x 1] (return x)}]").unwrap();
    assert_eq!(parens, mixed);
}

#[test]
fn unresolved_reference_is_fatal() {
    let err = compile_source("(func main () I32 ((return nonexistent)))").unwrap_err();
    assert!(matches!(err, CompileError::Unresolved(_)));
}

#[test]
fn redefining_a_function_body_is_fatal() {
    let err = compile_source(
        "(func f () I32 ((return 1))) (func f () I32 ((return 2)))",
    )
    .unwrap_err();
    assert!(matches!(err, CompileError::Redefinition(_)));
}

#[test]
fn call_arity_mismatch_is_fatal() {
    let err = compile_source(
        "(func f ((a I32) (b I32)) I32 ((return a))) (func main () I32 ((return (f 1))))",
    )
    .unwrap_err();
    assert!(matches!(err, CompileError::Arity(_)));
}

#[test]
fn invalid_cast_is_fatal() {
    let err = compile_source(
        "(func main () I32 ((decl a (Array I32 2)) (return (cast a I32))))",
    )
    .unwrap_err();
    assert!(matches!(err, CompileError::Cast(_)));
}

#[test]
fn unterminated_string_is_a_lex_error_not_a_parse_error() {
    let err = compile_source("(func main () I32 ((return \"unterminated)))").unwrap_err();
    assert!(matches!(err, CompileError::Lex(_)));
}

#[test]
fn decimal_point_is_rejected_at_the_reader() {
    let err = compile_source("(func main () I32 ((return 3.14)))").unwrap_err();
    assert!(matches!(err, CompileError::Lex(_)));
}

#[test]
fn zero_size_array_is_an_analysis_time_type_error() {
    let err =
        compile_source("(func main () I32 ((decl a (Array I32 0)) (return 0)))").unwrap_err();
    assert!(matches!(err, CompileError::Type(_)));
}

#[test]
fn record_declares_its_fields_as_a_c_struct() {
    let c = compile_source(
        "(record Point (x I32) (y I32)) (func main () I32 ((return 0)))",
    )
    .unwrap();
    let norm = normalize(&c);
    assert!(norm.contains("typedef struct { int x; int y; } Point;"));
}

#[test]
fn record_field_array_synthesizes_even_if_unused() {
    let c = compile_source(
        "(record Buffer (items (Array I32 8))) (func main () I32 ((return 0)))",
    )
    .unwrap();
    assert!(c.contains("_Array_I32_8"));
}

#[test]
fn no_output_type_ever_leaks_past_a_failed_compile() {
    // The library never touches the filesystem; failure surfaces purely
    // as an `Err`, so there is nothing for a caller to accidentally
    // persist on the error path.
    let result = compile_source("(func main () I32 ((return undeclared)))");
    assert!(result.is_err());
}
