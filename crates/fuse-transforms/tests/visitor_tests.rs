use fuse_ast::{Node, NodeKind, builders};
use fuse_emitter::Printer;
use fuse_test_support::parse_program;
use fuse_transforms::{Rewrite, Transform, TransformContext, VisitScope, visit_tree};

fn print(node: &Node) -> String {
    Printer::print_to_string(node).unwrap()
}

fn run(source: &str, transforms: Vec<Box<dyn Transform>>) -> (String, fuse_transforms::VisitSummary) {
    let mut tree = parse_program(source);
    let mut transforms = transforms;
    let mut ctx = TransformContext::new("src/a.js", ".js");
    let summary = visit_tree(&mut tree, &mut transforms, &mut ctx);
    (print(&tree), summary)
}

/// Renames every identifier `from` to `to`.
struct Rename {
    from: &'static str,
    to: &'static str,
}

impl Transform for Rename {
    fn name(&self) -> &'static str {
        "rename"
    }

    fn visit(&mut self, node: &mut Node, _scope: &mut VisitScope<'_>) -> Rewrite {
        if node.name() == Some(self.from) {
            Rewrite::Replace(builders::ident(self.to))
        } else {
            Rewrite::Keep
        }
    }
}

/// Removes `debugger`-like calls: `drop()` statements and `drop` arguments.
struct DropCalls;

impl Transform for DropCalls {
    fn name(&self) -> &'static str {
        "drop-calls"
    }

    fn visit(&mut self, node: &mut Node, _scope: &mut VisitScope<'_>) -> Rewrite {
        match node.kind {
            NodeKind::ExpressionStatement => {
                let callee = node.node("expression").and_then(|e| e.node("callee"));
                if callee.and_then(Node::name) == Some("drop") {
                    return Rewrite::Remove;
                }
                Rewrite::Keep
            }
            NodeKind::Identifier if node.name() == Some("gone") => Rewrite::Remove,
            _ => Rewrite::Keep,
        }
    }
}

/// Hoists `var <temp>;` before every statement containing a `hoist()` call.
struct HoistMarker;

impl Transform for HoistMarker {
    fn name(&self) -> &'static str {
        "hoist-marker"
    }

    fn visit(&mut self, node: &mut Node, scope: &mut VisitScope<'_>) -> Rewrite {
        if node.kind == NodeKind::CallExpression
            && node.node("callee").and_then(Node::name) == Some("hoist")
        {
            let temp = scope.temp();
            scope.prepend([builders::var_decl([temp.clone()])]);
            return Rewrite::Replace(builders::ident(temp));
        }
        Rewrite::Keep
    }
}

#[test]
fn test_replace_reaches_every_identifier() {
    let (out, summary) = run("a + b(a);", vec![Box::new(Rename { from: "a", to: "z" })]);
    assert_eq!(out, "z + b(z);");
    assert_eq!(summary.replaced, 2);
}

#[test]
fn test_replacements_are_offered_again() {
    let transforms: Vec<Box<dyn Transform>> = vec![
        Box::new(Rename { from: "b", to: "a" }),
        Box::new(Rename { from: "a", to: "c" }),
    ];
    let (out, _) = run("b;", transforms);
    assert_eq!(out, "c;");
}

#[test]
fn test_rewrite_cycles_are_bounded() {
    let transforms: Vec<Box<dyn Transform>> = vec![
        Box::new(Rename { from: "a", to: "b" }),
        Box::new(Rename { from: "b", to: "a" }),
    ];
    // Terminates; the final name depends only on the pass bound
    let (out, summary) = run("a;", transforms);
    assert!(out == "a;" || out == "b;", "{out}");
    assert!(summary.replaced > 2);
}

#[test]
fn test_removed_statements_and_list_entries() {
    let (out, summary) = run("drop();\nf(gone, x);\ndrop(1);", vec![Box::new(DropCalls)]);
    assert_eq!(out, "f(x);");
    assert_eq!(summary.removed, 3);
}

#[test]
fn test_prepended_statements_land_before_the_statement() {
    let (out, summary) = run("a;\nf(hoist());\nb;", vec![Box::new(HoistMarker)]);
    assert_eq!(out, "a;\nvar _1_1;\nf(_1_1);\nb;");
    assert_eq!(summary.hoisted, 1);
}

#[test]
fn test_prepends_inside_blocks_stay_in_the_block() {
    let (out, _) = run(
        "function f() {\n    return hoist();\n}",
        vec![Box::new(HoistMarker)],
    );
    assert_eq!(out, "function f() {\n    var _1_1;\n    return _1_1;\n}");
}

#[test]
fn test_each_statement_gets_its_own_temp_key() {
    let (out, _) = run("f(hoist(), hoist());\ng(hoist());", vec![Box::new(HoistMarker)]);
    assert_eq!(
        out,
        "var _1_1;\nvar _1_2;\nf(_1_1, _1_2);\nvar _2_1;\ng(_2_1);"
    );
}

#[test]
fn test_root_replacement_hoists_to_the_front() {
    struct WrapRoot;
    impl Transform for WrapRoot {
        fn name(&self) -> &'static str {
            "wrap-root"
        }
        fn visit(&mut self, node: &mut Node, scope: &mut VisitScope<'_>) -> Rewrite {
            if node.kind == NodeKind::Program && !node.flag("wrapped") {
                node.set("wrapped", true);
                scope.prepend([builders::expr_stmt(builders::string("use strict"))]);
            }
            Rewrite::Keep
        }
    }
    let (out, summary) = run("a;", vec![Box::new(WrapRoot)]);
    assert_eq!(out, "\"use strict\";\na;");
    assert_eq!(summary.hoisted, 1);
}
