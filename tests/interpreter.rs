#[cfg(test)]
mod interpreter_tests {
    use std::cell::RefCell;
    use std::io::{self, Write};
    use std::rc::Rc;

    use treelox::interpreter::Interpreter;
    use treelox::lox::{Lox, Status};
    use treelox::parser::Parser;
    use treelox::scanner::Scanner;
    use treelox::token::{Token, TokenType};
    use treelox::value::{Callable, NativeFunction, Value};

    /// In-memory `print` sink that stays readable after the driver takes it.
    #[derive(Clone, Default)]
    struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.borrow()).into_owned()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn run(source: &str) -> (String, Vec<String>, Status) {
        let buffer = SharedBuffer::default();
        let mut lox = Lox::with_output(Box::new(buffer.clone()));
        let mut errors: Vec<String> = Vec::new();

        let status = lox.run(source, &mut errors);

        (buffer.contents(), errors, status)
    }

    fn run_ok(source: &str) -> String {
        let (output, errors, status) = run(source);
        assert_eq!(status, Status::Ok, "errors: {:?}", errors);
        output
    }

    fn evaluate(source: &str) -> Result<Value, String> {
        let (tokens, _) = Scanner::new(source).scan_tokens();
        let expr = Parser::new(&tokens)
            .parse_expression()
            .map_err(|errors| errors[0].to_string())?;

        Interpreter::with_output(Box::new(io::sink()))
            .evaluate(&expr)
            .map_err(|e| e.message())
    }

    #[test]
    fn test_literals_and_stringification() {
        let output = run_ok(
            "print 1.5; print 3; print -0.25; print \"text\"; print true; print false; print nil;",
        );

        assert_eq!(output, "1.5\n3\n-0.25\ntext\ntrue\nfalse\nnil\n");
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(evaluate("1 + 2"), Ok(Value::Number(3.0)));
        assert_eq!(evaluate("10 / 4"), Ok(Value::Number(2.5)));
        assert_eq!(evaluate("2 * (3 - 5)"), Ok(Value::Number(-4.0)));
        assert_eq!(evaluate("\"a\" + \"b\""), Ok(Value::from("ab")));
    }

    #[test]
    fn test_comparison_and_equality() {
        assert_eq!(evaluate("1 < 2"), Ok(Value::Bool(true)));
        assert_eq!(evaluate("2 <= 1"), Ok(Value::Bool(false)));
        assert_eq!(evaluate("nil == nil"), Ok(Value::Bool(true)));
        assert_eq!(evaluate("1 == \"1\""), Ok(Value::Bool(false)));
        assert_eq!(evaluate("\"a\" != \"a\""), Ok(Value::Bool(false)));
        assert_eq!(evaluate("!nil"), Ok(Value::Bool(true)));
        assert_eq!(evaluate("!0"), Ok(Value::Bool(false)));
    }

    #[test]
    fn test_operand_type_errors() {
        assert_eq!(
            evaluate("1 + \"b\""),
            Err("Operands must be two numbers or two strings.".to_string())
        );
        assert_eq!(evaluate("1 - true"), Err("Operands must be numbers.".to_string()));
        assert_eq!(evaluate("\"a\" < 1"), Err("Operands must be numbers.".to_string()));
        assert_eq!(evaluate("-\"a\""), Err("Operand must be a number.".to_string()));
    }

    #[test]
    fn test_division_by_zero_is_an_error() {
        let (output, errors, status) = run("print 1 / 0;");

        assert_eq!(output, "");
        assert_eq!(status, Status::RuntimeError);
        assert_eq!(errors, vec!["Attempt to divide by zero.\n[line 1]"]);
    }

    #[test]
    fn test_logical_operators_return_operands() {
        let output = run_ok(
            "print nil or \"yes\";\n\
             print \"first\" or undefined;\n\
             print false and undefined;\n\
             print 1 and 2;",
        );

        assert_eq!(output, "yes\nfirst\nfalse\n2\n");
    }

    #[test]
    fn test_runtime_error_stops_execution() {
        let (output, errors, status) = run("print 1;\nprint missing;\nprint 2;");

        assert_eq!(output, "1\n");
        assert_eq!(status, Status::RuntimeError);
        assert_eq!(errors, vec!["Undefined variable 'missing'.\n[line 2]"]);
        assert_eq!(status.exit_code(), 70);
    }

    #[test]
    fn test_static_error_prevents_execution() {
        let (output, errors, status) = run("print 1;\nprint ;");

        assert_eq!(output, "");
        assert_eq!(status, Status::StaticError);
        assert_eq!(status.exit_code(), 65);
        assert_eq!(errors, vec!["[line 2] Error at ';': Expect expression."]);
    }

    #[test]
    fn test_lex_error_is_static() {
        let (output, errors, status) = run("print 1; @");

        assert_eq!(output, "");
        assert_eq!(status, Status::StaticError);
        assert_eq!(errors, vec!["[line 1] Error: Unexpected character: @"]);
    }

    #[test]
    fn test_closures_capture_by_reference() {
        let output = run_ok("var i = 0; fun f() { return i; } i = 5; print f();");

        assert_eq!(output, "5\n");
    }

    #[test]
    fn test_sibling_closures_share_one_scope() {
        let output = run_ok(
            "var step; var read;\n\
             {\n\
               var n = 1;\n\
               fun bump() { n = n + 1; }\n\
               fun get() { return n; }\n\
               step = bump;\n\
               read = get;\n\
             }\n\
             step(); step();\n\
             print read();\n\
             fun pair() {\n\
               var value = 0;\n\
               fun set(v) { value = v; }\n\
               fun peek() { return value; }\n\
               set(42);\n\
               return peek;\n\
             }\n\
             print pair()();",
        );

        assert_eq!(output, "3\n42\n");
    }

    #[test]
    fn test_lexical_scope_is_static() {
        let output = run_ok(
            "var a = \"global\";\n\
             {\n\
               fun show() { print a; }\n\
               show();\n\
               var a = \"local\";\n\
               show();\n\
             }",
        );

        assert_eq!(output, "global\nglobal\n");
    }

    #[test]
    fn test_counter_closure_keeps_state() {
        let output = run_ok(
            "fun makeCounter() {\n\
               var count = 0;\n\
               fun inc() { count = count + 1; return count; }\n\
               return inc;\n\
             }\n\
             var a = makeCounter();\n\
             var b = makeCounter();\n\
             print a(); print a(); print b();",
        );

        assert_eq!(output, "1\n2\n1\n");
    }

    #[test]
    fn test_recursion_has_independent_frames() {
        let output = run_ok(
            "fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); }\n\
             print fib(15);\n\
             fun countdown(n) { if (n > 0) { var local = n; countdown(n - 1); print local; } }\n\
             countdown(3);",
        );

        assert_eq!(output, "610\n1\n2\n3\n");
    }

    #[test]
    fn test_shadowing_and_assignment_hit_nearest_binding() {
        let output = run_ok(
            "var a = 1;\n\
             {\n\
               var a = 2;\n\
               { a = 3; print a; }\n\
               print a;\n\
             }\n\
             print a;",
        );

        assert_eq!(output, "3\n3\n1\n");
    }

    #[test]
    fn test_return_inside_loop_ends_call() {
        let output = run_ok(
            "fun first() {\n\
               var i = 0;\n\
               while (i < 10) { if (i == 3) return i; print i; i = i + 1; }\n\
               print \"unreachable\";\n\
             }\n\
             print first();\n\
             fun nested() {\n\
               for (var i = 0; i < 3; i = i + 1) {\n\
                 for (var j = 0; j < 3; j = j + 1) { if (j == 1) return i * 10 + j; }\n\
               }\n\
               return -1;\n\
             }\n\
             print nested();",
        );

        assert_eq!(output, "0\n1\n2\n3\n1\n");
    }

    #[test]
    fn test_function_without_return_yields_nil() {
        let output = run_ok("fun noop() {} print noop(); fun early() { return; } print early();");

        assert_eq!(output, "nil\nnil\n");
    }

    #[test]
    fn test_callable_display() {
        let output = run_ok("fun add(a, b) { return a + b; } print add; print clock;");

        assert_eq!(output, "<fn add>\n<native fn>\n");
    }

    #[test]
    fn test_arity_mismatch() {
        let (_, errors, status) = run("fun add(a, b) { return a + b; }\nprint add(1);");

        assert_eq!(status, Status::RuntimeError);
        assert_eq!(errors, vec!["Expected 2 arguments but got 1.\n[line 2]"]);
    }

    #[test]
    fn test_calling_non_callable() {
        let (_, errors, status) = run("\"not a function\"();");

        assert_eq!(status, Status::RuntimeError);
        assert_eq!(errors, vec!["Can only call functions and classes.\n[line 1]"]);
    }

    #[test]
    fn test_clock_native() {
        let output = run_ok("var t = clock(); print t > 0; print clock() >= t;");

        assert_eq!(output, "true\ntrue\n");
    }

    #[test]
    fn test_host_defined_native() {
        let buffer = SharedBuffer::default();
        let mut lox = Lox::with_output(Box::new(buffer.clone()));

        lox.interpreter_mut()
            .define_native("half", 1, |args: &[Value]| match args {
                [Value::Number(n)] => Ok(Value::Number(n / 2.0)),
                _ => Err("half expects a number.".to_string()),
            });

        let mut errors: Vec<String> = Vec::new();
        assert_eq!(lox.run("print half(9);", &mut errors), Status::Ok);
        assert_eq!(lox.run("\n\nhalf(\"x\");", &mut errors), Status::RuntimeError);

        assert_eq!(buffer.contents(), "4.5\n");
        assert_eq!(errors, vec!["half expects a number.\n[line 3]"]);
    }

    #[test]
    fn test_native_failure_blames_call_site() {
        let native: Rc<NativeFunction> = Rc::new(NativeFunction {
            name: "fail".to_string(),
            arity: 0,
            func: |_args: &[Value]| Err("boom".to_string()),
        });
        let mut interpreter = Interpreter::with_output(Box::new(io::sink()));
        let paren = Token::new(TokenType::RIGHT_PAREN, ")", 7);

        let error = match native.call(&mut interpreter, Vec::new(), &paren) {
            Ok(value) => panic!("expected failure, got {:?}", value),
            Err(error) => error,
        };

        assert_eq!(error.to_string(), "boom\n[line 7]");
        assert_eq!(error.line(), Some(7));
        assert!(!error.is_static());
    }

    #[test]
    fn test_native_called_through_alias_reports_its_line() {
        let buffer = SharedBuffer::default();
        let mut lox = Lox::with_output(Box::new(buffer.clone()));
        lox.interpreter_mut()
            .define_native("check", 1, |args: &[Value]| match args {
                [Value::Bool(true)] => Ok(Value::Nil),
                _ => Err("check failed.".to_string()),
            });

        let mut errors: Vec<String> = Vec::new();
        let status = lox.run("var alias = check;\nalias(true);\nalias(false);", &mut errors);

        assert_eq!(status, Status::RuntimeError);
        assert_eq!(errors, vec!["check failed.\n[line 3]"]);
    }

    #[test]
    fn test_output_is_flushed_when_a_runtime_error_stops_the_run() {
        let buffer = SharedBuffer::default();
        let mut lox = Lox::with_output(Box::new(io::BufWriter::new(buffer.clone())));
        let mut errors: Vec<String> = Vec::new();

        let status = lox.run("print \"before\";\nprint nope;", &mut errors);

        assert_eq!(status, Status::RuntimeError);
        assert_eq!(buffer.contents(), "before\n");
    }

    #[test]
    fn test_session_keeps_globals_between_runs() {
        let buffer = SharedBuffer::default();
        let mut lox = Lox::with_output(Box::new(buffer.clone()));
        let mut errors: Vec<String> = Vec::new();

        assert_eq!(lox.run("var a = 1; fun get() { return a; }", &mut errors), Status::Ok);
        assert_eq!(lox.run("print nope;", &mut errors), Status::RuntimeError);
        assert_eq!(lox.run("a = a + 1; print get();", &mut errors), Status::Ok);

        assert_eq!(buffer.contents(), "2\n");
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_global_redeclaration_is_allowed() {
        let output = run_ok("var a = 1; var a = a + 1; print a;");

        assert_eq!(output, "2\n");
    }
}
