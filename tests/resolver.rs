use loxide as lox;

use lox::interpreter::Interpreter;
use lox::parser::Parser;
use lox::resolver::Resolver;
use lox::scanner::Scanner;
use lox::token::Token;

/// Resolves a whole program the way file mode does and returns the
/// rendered diagnostics.
fn resolve_program(source: &str) -> Vec<String> {
    let tokens: Vec<Token> = Scanner::new(source).filter_map(Result::ok).collect();

    let (statements, parse_errors) = Parser::new(tokens).parse();

    assert!(
        parse_errors.is_empty(),
        "unexpected parse errors: {:?}",
        parse_errors
    );

    let mut interpreter: Interpreter = Interpreter::new();
    let mut resolver: Resolver = Resolver::new(&mut interpreter);

    resolver.resolve(&statements);
    resolver.end_program();

    resolver
        .into_errors()
        .iter()
        .map(ToString::to_string)
        .collect()
}

fn assert_resolves_with(source: &str, expected_substring: &str) {
    let errors = resolve_program(source);

    assert!(
        errors.iter().any(|e| e.contains(expected_substring)),
        "expected an error containing {:?}, got {:?}",
        expected_substring,
        errors
    );
}

fn assert_resolves_clean(source: &str) {
    let errors = resolve_program(source);

    assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
}

#[test]
fn clean_program_produces_no_diagnostics() {
    assert_resolves_clean(
        "fun make() { var i = 0; fun inc() { i = i + 1; return i; } return inc; }\n\
         var c = make();\n\
         print c();",
    );
}

#[test]
fn top_level_return_is_rejected() {
    assert_resolves_with("return 1;", "can only return from");
}

#[test]
fn returning_a_value_from_an_initializer_is_rejected() {
    assert_resolves_with(
        "class Foo { init() { return 1; } }",
        "Cannot return value from an initializer",
    );
}

#[test]
fn bare_return_from_an_initializer_is_allowed() {
    assert_resolves_clean("class Foo { init() { return; } }");
}

#[test]
fn this_outside_a_class_is_rejected() {
    assert_resolves_with("print this;", "can't use 'this' outside of a class");
}

#[test]
fn this_in_a_static_method_is_rejected() {
    assert_resolves_with(
        "class Foo { class bar() { return this; } }",
        "can't use 'this' in a static method",
    );
}

#[test]
fn super_outside_a_subclass_is_rejected() {
    assert_resolves_with(
        "class Foo { m() { return super.m(); } }",
        "can't use 'super' outside of a sub class",
    );
}

#[test]
fn class_cannot_inherit_from_itself() {
    assert_resolves_with("class Foo < Foo { }", "class cannot inherit from itself");
}

#[test]
fn local_redeclaration_is_rejected() {
    assert_resolves_with(
        "{ var a = 1; var a = 2; print a; }",
        "already declared in the same scope",
    );
}

#[test]
fn global_redeclaration_is_rejected() {
    assert_resolves_with(
        "var a = 1; var a = 2; print a;",
        "already declared in global scope",
    );
}

#[test]
fn shadowing_an_outer_scope_is_allowed() {
    assert_resolves_clean("var a = 1; { var a = 2; print a; } print a;");
}

#[test]
fn reading_a_local_in_its_own_initializer_is_rejected() {
    assert_resolves_with(
        "{ var a = a; print a; }",
        "can't read local variable in its own initializer",
    );
}

#[test]
fn unused_local_is_reported() {
    let errors = resolve_program("{ var unused = 1; }");

    assert!(
        errors.iter().any(|e| e.contains("Unused variable 'unused'")),
        "got {:?}",
        errors
    );
}

#[test]
fn unused_global_is_reported_at_end_of_program() {
    assert_resolves_with("var lonely = 1;", "Unused variable 'lonely'");
}

#[test]
fn assignment_alone_does_not_count_as_a_use() {
    assert_resolves_with("{ var a = 1; a = 2; }", "Unused variable 'a'");
}

#[test]
fn unused_parameters_are_not_reported() {
    assert_resolves_clean("fun f(ignored) { return 1; } print f(2);");
}

#[test]
fn native_functions_need_no_use() {
    // `clock` is preregistered; a program that never calls it is clean.
    assert_resolves_clean("print 1;");
}

#[test]
fn forward_reference_between_functions_is_allowed() {
    assert_resolves_clean(
        "fun isEven(n) { if (n == 0) return true; return isOdd(n - 1); }\n\
         fun isOdd(n) { if (n == 0) return false; return isEven(n - 1); }\n\
         print isEven(4);",
    );
}

#[test]
fn resolver_reports_multiple_errors_in_one_pass() {
    let errors = resolve_program("return 1; print this;");

    assert_eq!(errors.len(), 2, "got {:?}", errors);
}

#[test]
fn diagnostics_carry_line_and_column() {
    let errors = resolve_program("return 1;");

    assert_eq!(
        errors[0],
        "Error: can only return from functions or methods on line 1, character 1."
    );
}
