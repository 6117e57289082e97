use fuse_ast::{Node, NodeKind, builders};
use fuse_emitter::{CodeGenerator, GenerateError, GenerateOptions, Printer};
use fuse_test_support::{parse_expression, parse_program};

fn print(node: &Node) -> String {
    Printer::print_to_string(node).unwrap()
}

fn print_compact(node: &Node) -> String {
    let options = GenerateOptions {
        compact: true,
        ..GenerateOptions::default()
    };
    Printer.generate(node, &options).unwrap().code
}

// =============================================================================
// Literals
// =============================================================================

#[test]
fn test_string_literals_are_escaped() {
    assert_eq!(print(&builders::string("a\"b\n")), r#""a\"b\n""#);
    assert_eq!(print(&builders::string("tab\there")), r#""tab\there""#);
}

#[test]
fn test_literal_raw_text_is_preserved() {
    assert_eq!(print(&parse_expression("'single'")), "'single'");
    assert_eq!(print(&parse_expression("0x10")), "0x10");
}

#[test]
fn test_synthesized_literals() {
    assert_eq!(print(&builders::number(42.0)), "42");
    assert_eq!(print(&builders::number(1.5)), "1.5");
    assert_eq!(print(&builders::boolean(false)), "false");
    assert_eq!(print(&builders::null()), "null");
    assert_eq!(print(&builders::void_zero()), "void 0");
}

#[test]
fn test_member_on_number_literal_is_parenthesized() {
    let node = builders::member(builders::number(1.0), "toString");
    assert_eq!(print(&node), "(1).toString");
}

// =============================================================================
// Precedence
// =============================================================================

#[test]
fn test_binary_precedence() {
    let a = || builders::ident("a");
    let b = || builders::ident("b");
    let c = || builders::ident("c");

    let sum_times = builders::binary(builders::binary(a(), "+", b()), "*", c());
    assert_eq!(print(&sum_times), "(a + b) * c");

    let left_assoc = builders::binary(builders::binary(a(), "-", b()), "-", c());
    assert_eq!(print(&left_assoc), "a - b - c");

    let right_nested = builders::binary(a(), "-", builders::binary(b(), "-", c()));
    assert_eq!(print(&right_nested), "a - (b - c)");
}

#[test]
fn test_exponent_is_right_associative() {
    let a = || builders::ident("a");
    let right = builders::binary(a(), "**", builders::binary(a(), "**", a()));
    assert_eq!(print(&right), "a ** a ** a");

    let left = builders::binary(builders::binary(a(), "**", a()), "**", a());
    assert_eq!(print(&left), "(a ** a) ** a");
}

#[test]
fn test_nullish_mixed_with_logical_keeps_parentheses() {
    assert_eq!(print(&parse_expression("(a ?? b) || c")), "(a ?? b) || c");
    assert_eq!(print(&parse_expression("a ?? (b && c)")), "a ?? (b && c)");
}

#[test]
fn test_conditional_and_assignment_nesting() {
    let expr = parse_expression("x = a ? b : c");
    assert_eq!(print(&expr), "x = a ? b : c");

    let test = builders::assign(builders::ident("t"), builders::ident("a"));
    let cond = builders::conditional(test, builders::ident("b"), builders::ident("c"));
    assert_eq!(print(&cond), "(t = a) ? b : c");
}

#[test]
fn test_unary_operators_do_not_fuse() {
    let node = builders::unary("-", builders::unary("-", builders::ident("x")));
    assert_eq!(print(&node), "- -x");
    assert_eq!(print(&parse_expression("typeof x")), "typeof x");
}

#[test]
fn test_new_with_call_in_callee() {
    let callee = builders::call(builders::ident("f"), vec![]);
    let node = Node::new(NodeKind::NewExpression)
        .with("callee", callee)
        .with("arguments", Vec::<Node>::new());
    assert_eq!(print(&node), "new (f())()");
}

// =============================================================================
// Statements
// =============================================================================

#[test]
fn test_program_statements_are_joined_by_newlines() {
    assert_eq!(print(&parse_program("a;\nb;")), "a;\nb;");
    assert_eq!(print(&parse_program("var a = 1, b;")), "var a = 1, b;");
}

#[test]
fn test_if_else_layout() {
    let tree = parse_program("if (a) b(); else { c(); }");
    assert_eq!(print(&tree), "if (a) b();\nelse {\n    c();\n}");

    let tree = parse_program("if (a) { b(); } else if (c) { d(); }");
    assert_eq!(
        print(&tree),
        "if (a) {\n    b();\n} else if (c) {\n    d();\n}"
    );
}

#[test]
fn test_function_declaration_layout() {
    let tree = parse_program("function f(a, b) { return a + b; }");
    assert_eq!(print(&tree), "function f(a, b) {\n    return a + b;\n}");

    let tree = parse_program("function g() {}");
    assert_eq!(print(&tree), "function g() { }");
}

#[test]
fn test_statement_starting_with_object_is_parenthesized() {
    let tree = parse_program("({ a: 1 }).a;");
    assert_eq!(print(&tree), "({ a: 1 }.a);");

    let tree = parse_program("export default { a: 1 };");
    assert_eq!(print(&tree), "export default { a: 1 };");
}

#[test]
fn test_arrow_with_object_body() {
    assert_eq!(print(&parse_expression("() => ({ a: 1 })")), "() => ({ a: 1 })");
    assert_eq!(print(&parse_expression("x => x + 1")), "(x) => x + 1");
}

#[test]
fn test_hoisted_var_declaration() {
    let decl = builders::var_decl(["_1_1", "_1_2"]);
    assert_eq!(print(&decl), "var _1_1, _1_2;");
}

// =============================================================================
// Compact mode
// =============================================================================

#[test]
fn test_compact_mode_separates_words_only() {
    let tree = parse_program("if (a) { return x; } else y = 1;");
    assert_eq!(print_compact(&tree), "if(a){return x;}else y=1;");

    let tree = parse_program("var a = 1;\nvar b = typeof a;");
    assert_eq!(print_compact(&tree), "var a=1;var b=typeof a;");
}

#[test]
fn test_compact_mode_keeps_plus_operators_apart() {
    let node = builders::binary(
        builders::ident("a"),
        "+",
        builders::unary("+", builders::ident("b")),
    );
    assert_eq!(print_compact(&node), "a+ +b");
}

// =============================================================================
// Optional chains and unsupported input
// =============================================================================

#[test]
fn test_optional_chain_printing() {
    assert_eq!(print(&parse_expression("a?.b[c]?.(d)")), "a?.b[c]?.(d)");
    assert_eq!(print(&parse_expression("a?.[0].b")), "a?.[0].b");
}

#[test]
fn test_jsx_is_reported_unsupported() {
    let err = Printer::print_to_string(&parse_expression("<div />")).unwrap_err();
    assert_eq!(
        err,
        GenerateError::Unsupported {
            kind: "JSXElement".to_string()
        }
    );
    assert_eq!(
        err.to_string(),
        "cannot generate code for node type 'JSXElement'"
    );
}

#[test]
fn test_missing_required_field() {
    let node = Node::new(NodeKind::ReturnStatement).with("argument", builders::ident("x"));
    assert_eq!(print(&node), "return x;");

    let broken = Node::new(NodeKind::ExpressionStatement);
    let err = Printer::print_to_string(&broken).unwrap_err();
    assert_eq!(
        err,
        GenerateError::MissingField {
            kind: "ExpressionStatement".to_string(),
            field: "expression"
        }
    );
}
