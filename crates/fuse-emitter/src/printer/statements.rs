use super::{Emitter, precedence, require, unsupported};
use crate::GenerateError;
use fuse_ast::{Node, NodeKind, Value};

type Result<T = ()> = std::result::Result<T, GenerateError>;

impl<'o> Emitter<'o> {
    // =========================================================================
    // Statements
    // =========================================================================

    pub(super) fn emit_statement(&mut self, node: &Node) -> Result {
        self.set_source_pos(node);
        match node.kind {
            NodeKind::Program => self.emit_statement_list(node.list("body")),
            NodeKind::ExpressionStatement => {
                let expression = require(node, "expression")?;
                if self.starts_ambiguously(expression) {
                    self.write("(");
                    self.emit_expression(expression, precedence::SEQUENCE)?;
                    self.write(")");
                } else {
                    self.emit_expression(expression, precedence::SEQUENCE)?;
                }
                self.write(";");
                Ok(())
            }
            NodeKind::BlockStatement | NodeKind::TSModuleBlock => self.emit_block(node),
            NodeKind::StaticBlock => {
                self.write("static");
                self.write_space();
                self.emit_block(node)
            }
            NodeKind::EmptyStatement => {
                self.write(";");
                Ok(())
            }
            NodeKind::DebuggerStatement => {
                self.write("debugger;");
                Ok(())
            }
            NodeKind::ReturnStatement => self.emit_keyword_argument(node, "return"),
            NodeKind::ThrowStatement => self.emit_keyword_argument(node, "throw"),
            NodeKind::BreakStatement | NodeKind::ContinueStatement => {
                let keyword = if node.kind == NodeKind::BreakStatement {
                    "break"
                } else {
                    "continue"
                };
                self.write(keyword);
                if let Some(label) = node.node("label") {
                    self.write(" ");
                    self.emit_expression(label, precedence::PRIMARY)?;
                }
                self.write(";");
                Ok(())
            }
            NodeKind::LabeledStatement => {
                self.emit_expression(require(node, "label")?, precedence::PRIMARY)?;
                self.write(":");
                self.write_space();
                self.emit_statement(require(node, "body")?)
            }
            NodeKind::IfStatement => self.emit_if(node),
            NodeKind::SwitchStatement => self.emit_switch(node),
            NodeKind::TryStatement => self.emit_try(node),
            NodeKind::WhileStatement => {
                self.write("while");
                self.write_space();
                self.emit_parenthesized(require(node, "test")?)?;
                self.emit_body(require(node, "body")?)
            }
            NodeKind::DoWhileStatement => {
                self.write("do");
                let body = require(node, "body")?;
                if body.kind == NodeKind::BlockStatement {
                    self.write_space();
                    self.emit_block(body)?;
                    self.write_space();
                } else {
                    self.write(" ");
                    self.emit_statement(body)?;
                    self.write_space();
                }
                self.write("while");
                self.write_space();
                self.emit_parenthesized(require(node, "test")?)?;
                self.write(";");
                Ok(())
            }
            NodeKind::ForStatement => self.emit_for(node),
            NodeKind::ForInStatement | NodeKind::ForOfStatement => self.emit_for_in_of(node),
            NodeKind::FunctionDeclaration => self.emit_function(node),
            NodeKind::ClassDeclaration => self.emit_class(node),
            NodeKind::VariableDeclaration => {
                self.emit_variable_declaration(node)?;
                self.write(";");
                Ok(())
            }
            NodeKind::ImportDeclaration => self.emit_import(node),
            NodeKind::ExportNamedDeclaration => self.emit_export_named(node),
            NodeKind::ExportDefaultDeclaration => self.emit_export_default(node),
            NodeKind::ExportAllDeclaration => {
                self.write("export");
                self.write_space();
                self.write("*");
                if let Some(exported) = node.node("exported") {
                    self.write(" as ");
                    self.emit_module_export_name(exported)?;
                }
                self.write_space();
                self.write("from");
                self.write_space();
                self.emit_expression(require(node, "source")?, precedence::PRIMARY)?;
                self.write(";");
                Ok(())
            }
            _ => Err(unsupported(node)),
        }
    }

    fn emit_statement_list(&mut self, statements: &[Value]) -> Result {
        let mut first = true;
        for statement in statements.iter().filter_map(Value::as_node) {
            if !first {
                self.write_line();
            }
            first = false;
            self.emit_statement(statement)?;
        }
        Ok(())
    }

    pub(super) fn emit_block(&mut self, node: &Node) -> Result {
        let body = node.list("body");
        if body.iter().all(Value::is_null) {
            self.write("{");
            self.write_space();
            self.write("}");
            return Ok(());
        }
        self.write("{");
        self.write_line();
        self.increase_indent();
        self.emit_statement_list(body)?;
        self.decrease_indent();
        self.write_line();
        self.write("}");
        Ok(())
    }

    /// Loop/if body: blocks on the same line, other statements after a space.
    fn emit_body(&mut self, body: &Node) -> Result {
        if body.kind == NodeKind::BlockStatement {
            self.write_space();
            self.emit_block(body)
        } else if body.kind == NodeKind::EmptyStatement {
            self.write(";");
            Ok(())
        } else {
            self.write_space();
            self.emit_statement(body)
        }
    }

    fn emit_keyword_argument(&mut self, node: &Node, keyword: &str) -> Result {
        self.write(keyword);
        if let Some(argument) = node.node("argument") {
            self.write(" ");
            self.emit_expression(argument, precedence::SEQUENCE)?;
        }
        self.write(";");
        Ok(())
    }

    fn emit_parenthesized(&mut self, expression: &Node) -> Result {
        self.write("(");
        self.emit_expression(expression, precedence::SEQUENCE)?;
        self.write(")");
        Ok(())
    }

    fn emit_if(&mut self, node: &Node) -> Result {
        self.write("if");
        self.write_space();
        self.emit_parenthesized(require(node, "test")?)?;
        let consequent = require(node, "consequent")?;
        self.emit_body(consequent)?;
        if let Some(alternate) = node.node("alternate") {
            if consequent.kind == NodeKind::BlockStatement {
                self.write_space();
            } else {
                self.write_line();
            }
            self.write("else");
            if alternate.kind == NodeKind::IfStatement {
                self.write(" ");
                self.emit_statement(alternate)?;
            } else {
                self.emit_body(alternate)?;
            }
        }
        Ok(())
    }

    fn emit_switch(&mut self, node: &Node) -> Result {
        self.write("switch");
        self.write_space();
        self.emit_parenthesized(require(node, "discriminant")?)?;
        self.write_space();
        self.write("{");
        self.write_line();
        self.increase_indent();
        for case in node.nodes("cases") {
            self.set_source_pos(case);
            match case.node("test") {
                Some(test) => {
                    self.write("case ");
                    self.emit_expression(test, precedence::SEQUENCE)?;
                    self.write(":");
                }
                None => self.write("default:"),
            }
            let consequent = case.list("consequent");
            if !consequent.is_empty() {
                self.write_line();
                self.increase_indent();
                self.emit_statement_list(consequent)?;
                self.decrease_indent();
            }
            self.write_line();
        }
        self.decrease_indent();
        self.write("}");
        Ok(())
    }

    fn emit_try(&mut self, node: &Node) -> Result {
        self.write("try");
        self.write_space();
        self.emit_block(require(node, "block")?)?;
        if let Some(handler) = node.node("handler") {
            self.write_space();
            self.write("catch");
            if let Some(param) = handler.node("param") {
                self.write_space();
                self.write("(");
                self.emit_expression(param, precedence::ASSIGNMENT)?;
                self.write(")");
            }
            self.write_space();
            self.emit_block(require(handler, "body")?)?;
        }
        if let Some(finalizer) = node.node("finalizer") {
            self.write_space();
            self.write("finally");
            self.write_space();
            self.emit_block(finalizer)?;
        }
        Ok(())
    }

    fn emit_for_init(&mut self, init: &Node) -> Result {
        if init.kind == NodeKind::VariableDeclaration {
            self.emit_variable_declaration(init)
        } else {
            self.emit_expression(init, precedence::SEQUENCE)
        }
    }

    fn emit_for(&mut self, node: &Node) -> Result {
        self.write("for");
        self.write_space();
        self.write("(");
        if let Some(init) = node.node("init") {
            self.emit_for_init(init)?;
        }
        self.write(";");
        if let Some(test) = node.node("test") {
            self.write_space();
            self.emit_expression(test, precedence::SEQUENCE)?;
        }
        self.write(";");
        if let Some(update) = node.node("update") {
            self.write_space();
            self.emit_expression(update, precedence::SEQUENCE)?;
        }
        self.write(")");
        self.emit_body(require(node, "body")?)
    }

    fn emit_for_in_of(&mut self, node: &Node) -> Result {
        self.write("for");
        if node.flag("await") {
            self.write(" await");
        }
        self.write_space();
        self.write("(");
        self.emit_for_init(require(node, "left")?)?;
        let keyword = if node.kind == NodeKind::ForInStatement {
            "in"
        } else {
            "of"
        };
        self.write(" ");
        self.write(keyword);
        self.write(" ");
        self.emit_expression(require(node, "right")?, precedence::ASSIGNMENT)?;
        self.write(")");
        self.emit_body(require(node, "body")?)
    }

    pub(super) fn emit_variable_declaration(&mut self, node: &Node) -> Result {
        self.set_source_pos(node);
        self.write(node.str_field("kind").unwrap_or("var"));
        self.write(" ");
        let mut first = true;
        for declarator in node.nodes("declarations") {
            if !first {
                self.write(",");
                self.write_space();
            }
            first = false;
            self.set_source_pos(declarator);
            self.emit_expression(require(declarator, "id")?, precedence::ASSIGNMENT)?;
            if let Some(init) = declarator.node("init") {
                self.write_space();
                self.write("=");
                self.write_space();
                self.emit_expression(init, precedence::ASSIGNMENT)?;
            }
        }
        Ok(())
    }

    // =========================================================================
    // Modules
    // =========================================================================

    fn emit_module_export_name(&mut self, node: &Node) -> Result {
        self.emit_expression(node, precedence::PRIMARY)
    }

    fn emit_import(&mut self, node: &Node) -> Result {
        self.write("import");
        let specifiers: Vec<&Node> = node.nodes("specifiers").collect();
        if !specifiers.is_empty() {
            self.write(" ");
            let mut wrote_any = false;
            let mut named = Vec::new();
            for specifier in specifiers {
                match specifier.kind {
                    NodeKind::ImportDefaultSpecifier => {
                        self.emit_expression(require(specifier, "local")?, precedence::PRIMARY)?;
                        wrote_any = true;
                    }
                    NodeKind::ImportNamespaceSpecifier => {
                        if wrote_any {
                            self.write(",");
                            self.write_space();
                        }
                        self.write("* as ");
                        self.emit_expression(require(specifier, "local")?, precedence::PRIMARY)?;
                        wrote_any = true;
                    }
                    _ => named.push(specifier),
                }
            }
            if !named.is_empty() {
                if wrote_any {
                    self.write(",");
                    self.write_space();
                }
                self.write("{");
                self.write_space();
                for (i, specifier) in named.iter().enumerate() {
                    if i > 0 {
                        self.write(",");
                        self.write_space();
                    }
                    let imported = require(specifier, "imported")?;
                    let local = require(specifier, "local")?;
                    self.emit_module_export_name(imported)?;
                    if imported.name() != local.name() || imported.name().is_none() {
                        self.write(" as ");
                        self.emit_expression(local, precedence::PRIMARY)?;
                    }
                }
                self.write_space();
                self.write("}");
            }
            self.write(" from");
        }
        self.write_space();
        self.emit_expression(require(node, "source")?, precedence::PRIMARY)?;
        self.write(";");
        Ok(())
    }

    fn emit_export_named(&mut self, node: &Node) -> Result {
        self.write("export ");
        if let Some(declaration) = node.node("declaration") {
            return self.emit_statement(declaration);
        }
        self.write("{");
        self.write_space();
        for (i, specifier) in node.nodes("specifiers").enumerate() {
            if i > 0 {
                self.write(",");
                self.write_space();
            }
            let local = require(specifier, "local")?;
            let exported = require(specifier, "exported")?;
            self.emit_module_export_name(local)?;
            if local.name() != exported.name() || exported.name().is_none() {
                self.write(" as ");
                self.emit_module_export_name(exported)?;
            }
        }
        self.write_space();
        self.write("}");
        if let Some(source) = node.node("source") {
            self.write_space();
            self.write("from");
            self.write_space();
            self.emit_expression(source, precedence::PRIMARY)?;
        }
        self.write(";");
        Ok(())
    }

    fn emit_export_default(&mut self, node: &Node) -> Result {
        self.write("export default ");
        let declaration = require(node, "declaration")?;
        match declaration.kind {
            NodeKind::FunctionDeclaration | NodeKind::ClassDeclaration => {
                self.emit_statement(declaration)
            }
            _ => {
                if self.starts_like_declaration(declaration) {
                    self.write("(");
                    self.emit_expression(declaration, precedence::SEQUENCE)?;
                    self.write(")");
                } else {
                    self.emit_expression(declaration, precedence::ASSIGNMENT)?;
                }
                self.write(";");
                Ok(())
            }
        }
    }
}
