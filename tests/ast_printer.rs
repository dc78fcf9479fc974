#[cfg(test)]
mod ast_printer_tests {
    use std::cell::RefCell;
    use std::io::{self, Write};
    use std::rc::Rc;

    use treelox::ast::Expr;
    use treelox::ast_printer::AstPrinter;
    use treelox::interpreter::Interpreter;
    use treelox::lox::{Lox, Status};
    use treelox::parser::Parser;
    use treelox::scanner::Scanner;
    use treelox::value::Value;

    fn parse(source: &str) -> Expr {
        let (tokens, errors) = Scanner::new(source).scan_tokens();
        assert!(errors.is_empty(), "lex errors: {:?}", errors);

        match Parser::new(&tokens).parse_expression() {
            Ok(expr) => expr,
            Err(errors) => panic!("parse of {:?} failed: {:?}", source, errors),
        }
    }

    fn eval(expr: &Expr) -> Value {
        match Interpreter::with_output(Box::new(io::sink())).evaluate(expr) {
            Ok(value) => value,
            Err(e) => panic!("evaluation failed: {}", e),
        }
    }

    #[derive(Clone, Default)]
    struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Output of `program` with every `$` replaced by `expr`.
    fn run_with(program: &str, expr: &str) -> String {
        let buffer = SharedBuffer::default();
        let mut lox = Lox::with_output(Box::new(buffer.clone()));
        let mut errors: Vec<String> = Vec::new();

        let status = lox.run(&program.replace('$', expr), &mut errors);
        assert_eq!(status, Status::Ok, "{:?} failed: {:?}", expr, errors);

        let output = String::from_utf8_lossy(&buffer.0.borrow()).into_owned();
        output
    }

    #[test]
    fn test_prefix_form() {
        let cases = [
            ("true", "true"),
            ("nil", "nil"),
            ("42", "42.0"),
            ("0.5", "0.5"),
            ("\"hello\"", "hello"),
            ("-123 * (45.67)", "(* (- 123.0) (group 45.67))"),
            ("!(1 >= 2)", "(! (group (>= 1.0 2.0)))"),
            ("a or b", "(or a b)"),
            ("super.m", "(super m)"),
            ("this.x = 1", "(= (. this x) 1.0)"),
        ];

        for (source, expected) in cases {
            assert_eq!(AstPrinter::print(&parse(source)), expected, "source: {}", source);
        }
    }

    #[test]
    fn test_source_form_is_fully_parenthesized() {
        assert_eq!(
            AstPrinter::print_source(&parse("1 + 2 * -3")),
            "(1 + (2 * (-3)))"
        );
        assert_eq!(AstPrinter::print_source(&parse("\"x\" + \"y\"")), "(\"x\" + \"y\")");
        assert_eq!(AstPrinter::print_source(&parse("f(1, g)")), "f(1, g)");
    }

    #[test]
    fn test_source_round_trip_preserves_value() {
        let sources = [
            "1 + 2 * 3 - 4 / 8",
            "(1 + 2) * (3 - 4)",
            "-(-2.5) * 4",
            "!(1 < 2) == false",
            "\"con\" + \"cat\" + \"enated\"",
            "nil or false or \"last\"",
            "true and 1 >= 1 and 3 != 4",
            "10 - 2 - 3",
            "100 / 10 / 5",
        ];

        for source in sources {
            let original = parse(source);
            let reprinted = AstPrinter::print_source(&original);
            let reparsed = parse(&reprinted);

            assert_eq!(
                eval(&original),
                eval(&reparsed),
                "{:?} reprinted as {:?}",
                source,
                reprinted
            );
        }
    }

    #[test]
    fn test_round_trip_keeps_prefix_shape_modulo_grouping() {
        let original = parse("1 - 2 - 3");
        let reparsed = parse(&AstPrinter::print_source(&original));

        assert_eq!(AstPrinter::print(&original), "(- (- 1.0 2.0) 3.0)");
        assert_eq!(
            AstPrinter::print(&reparsed),
            "(group (- (group (- 1.0 2.0)) 3.0))"
        );
    }

    #[test]
    fn test_source_round_trip_through_calls_and_properties() {
        let prelude = "var a = 0; var b = 0;\n\
                       fun f(x, y) { return x * 10 + y; }\n\
                       class Box { init() { this.size = 1; } grow(n) { return this.size + n; } }\n\
                       var box = Box();\n";

        let cases = [
            "f(1 + 2, (3))",
            "(a = 2) * 3",
            "a = b = 5",
            "box.size = 4",
            "box.grow(f(0, 2)) * box.size",
            "Box().grow(-1)",
        ];

        for source in cases {
            let reprinted = AstPrinter::print_source(&parse(source));
            let program = format!("{}print $; print a; print b; print box.size;", prelude);

            assert_eq!(
                run_with(&program, source),
                run_with(&program, &reprinted),
                "{:?} reprinted as {:?}",
                source,
                reprinted
            );
        }
    }

    #[test]
    fn test_source_round_trip_through_super() {
        let program = "class A { m(n) { return n + 1; } }\n\
                       class B < A { m(n) { return 100; } t() { return $; } }\n\
                       print B().t();";

        let source = "super.m(2) * this.m(0)";
        let reprinted = AstPrinter::print_source(&parse(source));

        assert_eq!(run_with(program, source), "300\n");
        assert_eq!(run_with(program, &reprinted), "300\n");
    }
}
