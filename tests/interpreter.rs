use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use loxide as lox;

use lox::driver::{Driver, Mode};

/// `print` sink that tests can read back after the run.
#[derive(Clone, Default)]
struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);

        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn run_program(source: &str) -> (String, bool, bool) {
    let buf: SharedBuf = SharedBuf::default();
    let mut driver: Driver = Driver::with_output(Box::new(buf.clone()));

    driver.run(source, Mode::File);

    let output: String = String::from_utf8(buf.0.borrow().clone()).unwrap();

    (output, driver.had_compile_error(), driver.had_runtime_error())
}

fn assert_prints(source: &str, expected: &[&str]) {
    let (output, compile_error, runtime_error) = run_program(source);

    assert!(!compile_error, "unexpected compile error for {:?}", source);
    assert!(!runtime_error, "unexpected runtime error for {:?}", source);

    let lines: Vec<&str> = output.lines().collect();

    assert_eq!(lines, expected, "source: {:?}", source);
}

fn assert_runtime_error(source: &str) {
    let (_, compile_error, runtime_error) = run_program(source);

    assert!(!compile_error, "unexpected compile error for {:?}", source);
    assert!(runtime_error, "expected a runtime error for {:?}", source);
}

fn assert_compile_error(source: &str) {
    let (_, compile_error, _) = run_program(source);

    assert!(compile_error, "expected a compile error for {:?}", source);
}

// ─────────────────────────────────────────────────────────────────────────
// Expressions and stringification
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn arithmetic() {
    assert_prints("print 1 + 2;", &["3"]);
    assert_prints("print 2 * 3 + 4;", &["10"]);
    assert_prints("print 7 / 2;", &["3.5"]);
    assert_prints("print -(1 + 2);", &["-3"]);
}

#[test]
fn numbers_print_without_trailing_zero() {
    assert_prints("print 7;", &["7"]);
    assert_prints("print 2.5;", &["2.5"]);
}

#[test]
fn nil_and_booleans_print_lowercase() {
    assert_prints("print nil;", &["nil"]);
    assert_prints("print true;", &["true"]);
    assert_prints("print 1 > 2;", &["false"]);
}

#[test]
fn string_plus_coerces_either_side() {
    assert_prints("var a = \"ab\"; print a + 3;", &["ab3"]);
    assert_prints("print 3 + \"ab\";", &["3ab"]);
    assert_prints("print \"a\" + \"b\";", &["ab"]);
}

#[test]
fn equality_rules() {
    assert_prints("print nil == nil;", &["true"]);
    assert_prints("print nil == 0;", &["false"]);
    assert_prints("print 1 == 1;", &["true"]);
    assert_prints("print \"a\" == \"a\";", &["true"]);
    assert_prints("print \"a\" != \"b\";", &["true"]);
}

#[test]
fn truthiness_counts_zero_and_empty_string_as_true() {
    assert_prints("print 0 ? \"t\" : \"f\";", &["t"]);
    assert_prints("print \"\" ? \"t\" : \"f\";", &["t"]);
    assert_prints("print nil ? \"t\" : \"f\";", &["f"]);
}

#[test]
fn ternary_evaluates_only_the_taken_branch() {
    assert_prints(
        "fun boom() { return 1 / 0; } print true ? \"ok\" : boom();",
        &["ok"],
    );
}

#[test]
fn comma_operator_yields_last_element() {
    assert_prints("var x = (1, 2, 3); print x;", &["3"]);
}

#[test]
fn logical_operators_pick_operands_by_truthiness() {
    assert_prints("print 1 or 2;", &["1"]);
    assert_prints("print nil or 2;", &["2"]);
    assert_prints("print nil and 2;", &["nil"]);
    assert_prints("print 1 and 2;", &["2"]);
}

#[test]
fn logical_operators_are_strict() {
    // Both operands always evaluate, so `f` runs even when the left side
    // already decides the answer.
    assert_prints(
        "var called = false;\n\
         fun f() { called = true; return true; }\n\
         print true or f();\n\
         print called;",
        &["true", "true"],
    );
}

#[test]
fn compound_assignment_on_variables() {
    assert_prints("var x = 10; x += 5; print x;", &["15"]);
    assert_prints("var x = 10; x -= 4; x *= 3; x /= 2; print x;", &["9"]);
}

// ─────────────────────────────────────────────────────────────────────────
// Statements, scoping, and control flow
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn for_loop_accumulates() {
    assert_prints(
        "var n = 0; for (var i = 0; i < 3; i = i + 1) { n = n + i; } print n;",
        &["3"],
    );
}

#[test]
fn while_loop_with_break() {
    assert_prints(
        "var n = 0;\n\
         while (true) { n = n + 1; if (n == 3) break; }\n\
         print n;",
        &["3"],
    );
}

#[test]
fn break_skips_the_rest_of_the_iteration() {
    assert_prints(
        "var n = 0;\n\
         for (var i = 0; i < 10; i = i + 1) { if (i == 2) break; n = n + 1; }\n\
         print n;",
        &["2"],
    );
}

#[test]
fn blocks_shadow_without_clobbering() {
    assert_prints(
        "var a = 1; { var a = 2; print a; } print a;",
        &["2", "1"],
    );
}

#[test]
fn closures_capture_the_definition_environment() {
    assert_prints(
        "var a = \"global\";\n\
         {\n\
           fun show() { print a; }\n\
           show();\n\
           var a = \"block\";\n\
           show();\n\
           print a;\n\
         }",
        &["global", "global", "block"],
    );
}

#[test]
fn closure_counter_keeps_private_state() {
    assert_prints(
        "fun make() { var i = 0; fun inc() { i = i + 1; return i; } return inc; }\n\
         var c = make();\n\
         print c(); print c(); print c();",
        &["1", "2", "3"],
    );
}

#[test]
fn functions_return_nil_by_default() {
    assert_prints("fun f() { return; } print f();", &["nil"]);
    assert_prints("fun g() { } print g();", &["nil"]);
}

#[test]
fn recursion_works_through_the_global_slot() {
    assert_prints(
        "fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); }\n\
         print fib(10);",
        &["55"],
    );
}

#[test]
fn mutual_recursion_through_forward_references() {
    assert_prints(
        "fun isEven(n) { if (n == 0) return true; return isOdd(n - 1); }\n\
         fun isOdd(n) { if (n == 0) return false; return isEven(n - 1); }\n\
         print isEven(4);",
        &["true"],
    );
}

#[test]
fn lambdas_are_first_class() {
    assert_prints(
        "var twice = fun (x) { return x * 2; }; print twice(5);",
        &["10"],
    );

    assert_prints("print fun (x) { return x; }(42);", &["42"]);
}

#[test]
fn function_values_stringify() {
    assert_prints("fun f() { } print f;", &["<fn f>"]);
    assert_prints("print clock == clock;", &["true"]);
}

// ─────────────────────────────────────────────────────────────────────────
// Classes
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn inherited_methods_dispatch_through_the_superclass_chain() {
    assert_prints(
        "class A { greet() { print \"hi\"; } } class B < A { } B().greet();",
        &["hi"],
    );
}

#[test]
fn initializer_stores_fields_through_this() {
    assert_prints(
        "class C { init(x) { this.x = x; } } print C(7).x;",
        &["7"],
    );
}

#[test]
fn initializer_always_returns_the_instance() {
    assert_prints(
        "class C { init() { this.x = 1; } }\n\
         var c = C();\n\
         print c.init() == c;",
        &["true"],
    );
}

#[test]
fn methods_bind_their_receiver() {
    assert_prints(
        "class C { init(x) { this.x = x; } get() { return this.x; } }\n\
         var c = C(7);\n\
         var m = c.get;\n\
         print m();",
        &["7"],
    );
}

#[test]
fn fields_are_created_on_assignment() {
    assert_prints(
        "class Bag { } var b = Bag(); b.weight = 3; print b.weight;",
        &["3"],
    );
}

#[test]
fn compound_assignment_on_fields() {
    assert_prints(
        "class Counter { init() { this.n = 0; } bump() { this.n += 1; } }\n\
         var c = Counter();\n\
         c.bump(); c.bump();\n\
         print c.n;",
        &["2"],
    );
}

#[test]
fn super_calls_the_overridden_method() {
    assert_prints(
        "class A { m() { return \"A\"; } }\n\
         class B < A { m() { return super.m() + \"B\"; } }\n\
         print B().m();",
        &["AB"],
    );
}

#[test]
fn static_methods_are_called_on_the_class() {
    assert_prints(
        "class Math { class square(n) { return n * n; } } print Math.square(4);",
        &["16"],
    );
}

#[test]
fn class_and_instance_stringification() {
    assert_prints("class Foo { } print Foo;", &["Foo"]);
    assert_prints("class Foo { } print Foo();", &["Foo instance"]);
}

#[test]
fn methods_can_refer_to_the_class_by_name() {
    assert_prints(
        "class C { dup() { return C(); } }\n\
         print C().dup();",
        &["C instance"],
    );
}

// ─────────────────────────────────────────────────────────────────────────
// REPL behavior
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn repl_lines_share_globals() {
    let buf: SharedBuf = SharedBuf::default();
    let mut driver: Driver = Driver::with_output(Box::new(buf.clone()));

    driver.run("var a = 1;", Mode::Repl);
    assert!(!driver.had_compile_error());

    driver.run("print a;", Mode::Repl);
    assert!(!driver.had_compile_error());
    assert!(!driver.had_runtime_error());

    let output: String = String::from_utf8(buf.0.borrow().clone()).unwrap();

    assert_eq!(output, "1\n");
}

#[test]
fn repl_does_not_flag_fresh_globals_as_unused() {
    let mut driver: Driver = Driver::new();

    driver.run("var pending = 1;", Mode::Repl);

    assert!(!driver.had_compile_error());
}

#[test]
fn repl_recovers_after_an_error_line() {
    let buf: SharedBuf = SharedBuf::default();
    let mut driver: Driver = Driver::with_output(Box::new(buf.clone()));

    driver.run("print 1 / 0;", Mode::Repl);
    assert!(driver.had_runtime_error());

    driver.run("print 2;", Mode::Repl);
    assert!(!driver.had_runtime_error());

    let output: String = String::from_utf8(buf.0.borrow().clone()).unwrap();

    assert_eq!(output, "2\n");
}

// ─────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn divide_by_zero_is_a_runtime_error() {
    assert_runtime_error("print 1 / 0;");
}

#[test]
fn arithmetic_type_mismatches_are_runtime_errors() {
    assert_runtime_error("print 1 - \"a\";");
    assert_runtime_error("print -\"a\";");
    assert_runtime_error("print 1 < \"a\";");
}

#[test]
fn undefined_variable_is_a_runtime_error() {
    assert_runtime_error("print q;");
}

#[test]
fn calling_a_non_callable_is_a_runtime_error() {
    assert_runtime_error("var x = 3; x();");
}

#[test]
fn arity_mismatches_are_runtime_errors() {
    assert_runtime_error("fun f(a, b) { return a; } f(1);");
    assert_runtime_error("clock(1);");
}

#[test]
fn property_access_on_non_instances_is_a_runtime_error() {
    assert_runtime_error("var x = 3; print x.y;");
    assert_runtime_error("var x = 3; x.y = 1;");
}

#[test]
fn undefined_property_is_a_runtime_error() {
    assert_runtime_error("class Foo { } print Foo().missing;");
}

#[test]
fn inheriting_from_a_non_class_is_a_runtime_error() {
    assert_runtime_error("var NotAClass = 3; class Sub < NotAClass { }");
}

#[test]
fn a_runtime_error_aborts_the_statement_list() {
    let (output, _, runtime_error) = run_program("print 1; print 1 / 0; print 2;");

    assert!(runtime_error);
    assert_eq!(output, "1\n");
}

#[test]
fn compile_errors_suppress_execution() {
    let (output, compile_error, _) = run_program("print 1; return 2;");

    assert!(compile_error);
    assert_eq!(output, "");
}

#[test]
fn scan_and_resolve_errors_set_the_compile_flag() {
    assert_compile_error("var s = \"abc");
    assert_compile_error("return 1;");
    assert_compile_error("class Foo { init() { return 1; } }");
    assert_compile_error("print this;");
}
