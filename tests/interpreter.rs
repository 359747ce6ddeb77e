use pretty_assertions::assert_eq;

use rox::error::LoxError;
use rox::interpreter::{self, Interpreter};
use rox::parser::{self, Parser};
use rox::resolver;
use rox::scanner;
use rox::session::Status;
use rox::value::Value;

mod common;

use common::{run, run_ok};

fn runtime_error(source: &str) -> String {
    let outcome = run(source);

    assert_eq!(outcome.status, Status::RuntimeError, "stdout: {}", outcome.stdout);
    assert_eq!(outcome.errors.len(), 1);

    outcome.errors[0].to_string()
}

// ───────────────────────────── expressions ─────────────────────────────

#[test]
fn arithmetic_and_number_formatting() {
    assert_eq!(
        run_ok("print 8 / 2; print 1 + 2 * 3; print 7 / 2; print -(3); print 1 / 0;"),
        "4\n7\n3.5\n-3\ninf\n"
    );
}

#[test]
fn string_concatenation() {
    assert_eq!(run_ok("print \"a\" + \"b\" + \"c\";"), "abc\n");
}

#[test]
fn mixed_plus_is_a_type_error() {
    assert_eq!(
        runtime_error("print \"a\" + 1;"),
        "Operands must be two numbers or two strings.\n[line 1]"
    );
}

#[test]
fn numeric_operators_check_operands() {
    assert_eq!(runtime_error("print 1 < \"x\";"), "Operands must be numbers.\n[line 1]");
    assert_eq!(runtime_error("print -\"x\";"), "Operand must be a number.\n[line 1]");
}

#[test]
fn equality_and_truthiness() {
    assert_eq!(
        run_ok(
            "print 1 == 1; print \"a\" != \"a\"; print nil == false; print 1 == \"1\";
             print !nil; print !0; print !\"\";"
        ),
        "true\nfalse\nfalse\nfalse\ntrue\nfalse\nfalse\n"
    );
}

#[test]
fn logical_operators_short_circuit_and_return_operands() {
    let source = r#"
        fun sideEffect() { print "called"; return true; }
        print false and sideEffect();
        print true or sideEffect();
        print nil or "default";
        print 1 and 2;
    "#;

    assert_eq!(run_ok(source), "false\ntrue\ndefault\n2\n");
}

// ───────────────────────────── variables and scope ─────────────────────────────

#[test]
fn block_shadowing() {
    assert_eq!(
        run_ok("var a = 1; { var a = 2; print a; } print a;"),
        "2\n1\n"
    );
}

#[test]
fn assignment_is_an_expression() {
    assert_eq!(run_ok("var a; var b; a = b = 3; print a; print b;"), "3\n3\n");
}

#[test]
fn uninitialized_variable_is_nil() {
    assert_eq!(run_ok("var a; print a;"), "nil\n");
}

#[test]
fn undefined_variable() {
    assert_eq!(runtime_error("print missing;"), "Undefined variable 'missing'.\n[line 1]");
    assert_eq!(runtime_error("\nmissing = 1;"), "Undefined variable 'missing'.\n[line 2]");
}

#[test]
fn closures_capture_the_resolved_binding() {
    let source = r#"
        var a = "global";
        {
            fun showA() { print a; }
            showA();
            var a = "block";
            showA();
        }
    "#;

    assert_eq!(run_ok(source), "global\nglobal\n");
}

// ───────────────────────────── control flow ─────────────────────────────

#[test]
fn if_else_and_while() {
    let source = r#"
        if (1 > 2) print "no"; else print "yes";
        var i = 0;
        while (i < 3) { print i; i = i + 1; }
    "#;

    assert_eq!(run_ok(source), "yes\n0\n1\n2\n");
}

#[test]
fn for_loop_variable_is_scoped_to_the_loop() {
    assert_eq!(run_ok("for (var i = 0; i < 3; i = i + 1) print i;"), "0\n1\n2\n");

    assert_eq!(
        runtime_error("for (var i = 0; i < 3; i = i + 1) {} print i;"),
        "Undefined variable 'i'.\n[line 1]"
    );
}

// ───────────────────────────── functions ─────────────────────────────

#[test]
fn functions_and_recursion() {
    let source = r#"
        fun fib(n) {
            if (n < 2) return n;
            return fib(n - 1) + fib(n - 2);
        }
        print fib(10);
        fun noReturn() {}
        print noReturn();
        print fib;
        print clock;
    "#;

    assert_eq!(run_ok(source), "55\nnil\n<fn fib>\n<native fn>\n");
}

#[test]
fn return_unwinds_nested_blocks_and_loops() {
    let source = r#"
        fun find() {
            for (var i = 0; i < 10; i = i + 1) {
                while (true) {
                    {
                        if (i == 3) return i;
                    }
                    i = i + 1;
                }
            }
            return -1;
        }
        print find();
        print "after";
    "#;

    assert_eq!(run_ok(source), "3\nafter\n");
}

#[test]
fn closure_counters_are_independent() {
    let source = r#"
        fun makeCounter() {
            var i = 0;
            fun count() { i = i + 1; return i; }
            return count;
        }
        var a = makeCounter();
        var b = makeCounter();
        print a();
        print a();
        print b();
        print a();
    "#;

    assert_eq!(run_ok(source), "1\n2\n1\n3\n");
}

#[test]
fn arity_is_checked_before_the_body_runs() {
    let outcome = run("fun f(a, b) { print \"ran\"; }\nf(1);");

    assert_eq!(outcome.stdout, "");
    assert_eq!(
        outcome.error_messages(),
        vec!["Expected 2 arguments but got 1.\n[line 2]"]
    );
}

#[test]
fn only_functions_and_classes_are_callable() {
    assert_eq!(
        runtime_error("\"not a function\"();"),
        "Can only call functions and classes.\n[line 1]"
    );
}

#[test]
fn runtime_error_stops_execution_but_keeps_earlier_output() {
    let outcome = run("print 1;\nprint nil + 1;\nprint 2;");

    assert_eq!(outcome.stdout, "1\n");
    assert_eq!(outcome.status.exit_code(), 70);
    assert_eq!(
        outcome.error_messages(),
        vec!["Operands must be two numbers or two strings.\n[line 2]"]
    );
}

#[test]
fn clock_returns_seconds() {
    assert_eq!(run_ok("print clock() > 1000000000;"), "true\n");
}

// ───────────────────────────── classes ─────────────────────────────

#[test]
fn instances_fields_and_methods() {
    let source = r#"
        class Point {
            init(x, y) { this.x = x; this.y = y; }
            sum() { return this.x + this.y; }
        }
        var p = Point(1, 2);
        print p;
        print Point;
        print p.sum();
        p.x = 10;
        print p.sum();
        var m = p.sum;
        print m();
    "#;

    assert_eq!(run_ok(source), "Point instance\nPoint\n3\n12\n12\n");
}

#[test]
fn initializer_returns_this() {
    let source = r#"
        class Foo {
            init() { this.v = 1; return; }
        }
        var foo = Foo();
        print foo.init() == foo;
        print foo.v;
    "#;

    assert_eq!(run_ok(source), "true\n1\n");
}

#[test]
fn constructor_arity_follows_init() {
    assert_eq!(
        runtime_error("class A { init(a) {} }\nA();"),
        "Expected 1 arguments but got 0.\n[line 2]"
    );

    assert_eq!(
        runtime_error("class B {}\nB(1);"),
        "Expected 0 arguments but got 1.\n[line 2]"
    );
}

#[test]
fn fields_shadow_methods() {
    let source = r#"
        class A { m() { return "method"; } }
        var a = A();
        a.m = "field";
        print a.m;
    "#;

    assert_eq!(run_ok(source), "field\n");
}

#[test]
fn property_errors() {
    assert_eq!(
        runtime_error("class A {}\nprint A().missing;"),
        "Undefined property 'missing'.\n[line 2]"
    );
    assert_eq!(runtime_error("print 1 .x;"), "Only instances have properties.\n[line 1]");
    assert_eq!(runtime_error("var s = \"s\"; s.x = 1;"), "Only instances have fields.\n[line 1]");
}

#[test]
fn super_calls_superclass_method() {
    let source = r#"
        class A { greet() { print "A"; } }
        class B < A {
            greet() {
                super.greet();
                print "B";
            }
        }
        B().greet();
    "#;

    assert_eq!(run_ok(source), "A\nB\n");
}

#[test]
fn inherited_methods_and_super_binding() {
    let source = r#"
        class A {
            method() { print "A method"; }
            name() { return "A"; }
        }
        class B < A {
            method() { print "B method"; }
            test() { super.method(); print this.name(); }
        }
        class C < B {}
        C().test();
    "#;

    assert_eq!(run_ok(source), "A method\nA\n");
}

#[test]
fn superclass_must_be_a_class() {
    assert_eq!(
        runtime_error("var NotAClass = \"so not a class\";\nclass Sub < NotAClass {}"),
        "Superclass must be a class.\n[line 2]"
    );
}

#[test]
fn undefined_super_method() {
    assert_eq!(
        runtime_error("class A {}\nclass B < A { m() { super.nope(); } }\nB().m();"),
        "Undefined property 'nope'.\n[line 2]"
    );
}

#[test]
fn bound_methods_remember_their_instance() {
    let source = r#"
        class Person {
            init(name) { this.name = name; }
            sayName() { print this.name; }
        }
        var jane = Person("Jane");
        var bill = Person("Bill");
        bill.sayName = jane.sayName;
        bill.sayName();
    "#;

    assert_eq!(run_ok(source), "Jane\n");
}

// ───────────────────────────── library entry points ─────────────────────────────

#[test]
fn interpret_entry_point_reports_runtime_errors() {
    let (tokens, _) = scanner::scan("print 1; print -nil;");
    let mut errors: Vec<LoxError> = Vec::new();

    let (statements, had_parse_error) = parser::parse(&tokens, &mut errors);
    assert!(!had_parse_error);

    let bindings = resolver::resolve(&statements, &mut errors);
    assert!(errors.is_empty());

    let mut out: Vec<u8> = Vec::new();
    let had_runtime_error = interpreter::interpret(&statements, bindings, &mut out, &mut errors);

    assert!(had_runtime_error);
    assert_eq!(String::from_utf8(out).unwrap(), "1\n");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].exit_code(), 70);
}

#[test]
fn feeding_a_second_program_keeps_bindings_apart() {
    let (first_tokens, _) = scanner::scan("{ var a = 1; { print a; } }\nfun getA() { var a = \"local\"; return a; }");
    let (second_tokens, _) = scanner::scan("var b = \"g\"; print b; print getA();");

    let mut errors: Vec<LoxError> = Vec::new();
    let mut interpreter = Interpreter::new(Vec::new());

    let first = Parser::new(&first_tokens).parse();
    assert!(!first.had_error());
    interpreter.resolve(resolver::resolve(&first.statements, &mut errors));
    interpreter.interpret(&first.statements).unwrap();

    assert_eq!(String::from_utf8_lossy(interpreter.output()), "1\n");

    let second = Parser::with_first_id(&second_tokens, first.next_id).parse();
    assert!(!second.had_error());
    assert!(second.next_id > first.next_id);
    interpreter.resolve(resolver::resolve(&second.statements, &mut errors));
    interpreter.interpret(&second.statements).unwrap();

    assert!(errors.is_empty());
    assert_eq!(
        String::from_utf8(interpreter.into_output()).unwrap(),
        "1\ng\nlocal\n"
    );
}

#[test]
fn single_expression_evaluation() {
    let (tokens, _) = scanner::scan("(5 - 2) * \"x\" == nil");
    let expr = Parser::new(&tokens).parse_expression();
    assert!(expr.is_ok());

    let (tokens, _) = scanner::scan("\"ab\" + \"cd\"");
    let expr = Parser::new(&tokens).parse_expression().unwrap();
    let mut interpreter = Interpreter::new(Vec::new());

    assert_eq!(interpreter.evaluate(&expr).unwrap(), Value::String("abcd".into()));
}

#[test]
fn static_errors_are_all_reported() {
    let outcome = run("print \"x\" $;\nprint (1;");

    assert_eq!(outcome.status, Status::StaticError);
    assert_eq!(
        outcome.error_messages(),
        vec![
            "[line 1] Error: Unexpected character: $",
            "[line 2] Error at ';': Expect ')' after expression.",
        ]
    );
}
