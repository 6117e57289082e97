//! Recursive-descent parser for the JavaScript/JSX subset used in tests.
//!
//! Supported: `var`/`let`/`const`, function declarations and expressions,
//! arrows, `return`, `if`/`else`, `while`, `throw`, blocks, `export default`,
//! the usual operators, object/array literals with spread, optional chains,
//! `new`, and JSX elements, fragments and attributes.

use fuse_ast::builders;
use fuse_ast::{Node, NodeKind, ParseError, ParseOptions, Position, SourceLocation, Value};

/// Parse a module. Implements [`fuse_ast::Parser`] as a plain function.
pub fn parse_module(source: &str, options: &ParseOptions) -> std::result::Result<Node, ParseError> {
    let mut parser = JsParser::new(source, options);
    parser.parse_program()
}

/// Parse a program without locations, panicking on error.
pub fn parse_program(source: &str) -> Node {
    match parse_module(source, &ParseOptions::default()) {
        Ok(tree) => tree,
        Err(err) => panic!("failed to parse {source:?}: {err}"),
    }
}

/// Parse a single expression, panicking on error.
pub fn parse_expression(source: &str) -> Node {
    let options = ParseOptions::default();
    let mut parser = JsParser::new(source, &options);
    let result = parser.parse_expression().and_then(|expr| {
        parser.skip_trivia();
        if parser.at_end() {
            Ok(expr)
        } else {
            Err(parser.error("unexpected trailing input"))
        }
    });
    match result {
        Ok(expr) => expr,
        Err(err) => panic!("failed to parse expression {source:?}: {err}"),
    }
}

type Result<T> = std::result::Result<T, ParseError>;

const KEYWORDS: &[&str] = &[
    "var", "let", "const", "function", "return", "if", "else", "while", "throw", "new", "this",
    "null", "true", "false", "typeof", "void", "delete", "export", "default", "super", "in",
    "instanceof",
];

struct JsParser<'o> {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    options: &'o ParseOptions,
}

impl<'o> JsParser<'o> {
    fn new(source: &str, options: &'o ParseOptions) -> Self {
        JsParser {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 0,
            options,
        }
    }

    // =========================================================================
    // Character level
    // =========================================================================

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += c.len_utf16() as u32;
        }
        Some(c)
    }

    fn starts_with(&self, text: &str) -> bool {
        let mut offset = 0;
        for expected in text.chars() {
            if self.peek_at(offset) != Some(expected) {
                return false;
            }
            offset += 1;
        }
        true
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.advance();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    self.advance();
                    self.advance();
                    while !self.at_end() && !self.starts_with("*/") {
                        self.advance();
                    }
                    self.advance();
                    self.advance();
                }
                _ => return,
            }
        }
    }

    fn error(&self, message: &str) -> ParseError {
        let found = self
            .peek()
            .map_or_else(|| "end of input".to_string(), |c| format!("'{c}'"));
        ParseError::new(format!("{message}, found {found}")).at(self.line, self.column)
    }

    // =========================================================================
    // Token level
    // =========================================================================

    /// Consume punctuation `text` if it is next.
    fn eat(&mut self, text: &str) -> bool {
        self.skip_trivia();
        if self.starts_with(text) {
            for _ in text.chars() {
                self.advance();
            }
            true
        } else {
            false
        }
    }

    fn expect(&mut self, text: &str) -> Result<()> {
        if self.eat(text) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{text}'")))
        }
    }

    fn is_word_char(c: char) -> bool {
        c == '$' || c == '_' || c.is_alphanumeric()
    }

    fn peek_word(&mut self) -> Option<String> {
        self.skip_trivia();
        let first = self.peek()?;
        if !(first == '$' || first == '_' || first.is_alphabetic()) {
            return None;
        }
        let mut offset = 0;
        let mut word = String::new();
        while let Some(c) = self.peek_at(offset) {
            if !Self::is_word_char(c) {
                break;
            }
            word.push(c);
            offset += 1;
        }
        Some(word)
    }

    fn at_keyword(&mut self, keyword: &str) -> bool {
        self.peek_word().as_deref() == Some(keyword)
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.at_keyword(keyword) {
            for _ in keyword.chars() {
                self.advance();
            }
            true
        } else {
            false
        }
    }

    /// Any identifier name, keywords included (property names).
    fn identifier_name(&mut self) -> Result<String> {
        let Some(word) = self.peek_word() else {
            return Err(self.error("expected identifier"));
        };
        for _ in word.chars() {
            self.advance();
        }
        Ok(word)
    }

    fn binding_identifier(&mut self) -> Result<Node> {
        let start = self.start();
        let name = self.identifier_name()?;
        if KEYWORDS.contains(&name.as_str()) {
            return Err(self.error(&format!("'{name}' is a reserved word")));
        }
        Ok(self.finish(builders::ident(name), start))
    }

    fn eat_semicolon(&mut self) {
        self.eat(";");
    }

    // =========================================================================
    // Locations
    // =========================================================================

    fn start(&mut self) -> Position {
        self.skip_trivia();
        Position {
            line: self.line,
            column: self.column,
        }
    }

    fn finish(&self, node: Node, start: Position) -> Node {
        if !self.options.locations {
            return node;
        }
        let source = (!self.options.file_name.is_empty()).then(|| self.options.file_name.clone());
        node.with_loc(Some(SourceLocation {
            start,
            end: Position {
                line: self.line,
                column: self.column,
            },
            source,
        }))
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn parse_program(&mut self) -> Result<Node> {
        let start = self.start();
        let mut body = Vec::new();
        loop {
            self.skip_trivia();
            if self.at_end() {
                break;
            }
            body.push(self.parse_statement()?);
        }
        Ok(self.finish(builders::program(body, "module"), start))
    }

    fn parse_statement(&mut self) -> Result<Node> {
        let start = self.start();
        if self.peek() == Some('{') {
            return self.parse_block();
        }
        if self.eat(";") {
            return Ok(self.finish(Node::new(NodeKind::EmptyStatement), start));
        }
        if let Some(kind) = ["var", "let", "const"]
            .into_iter()
            .find(|kind| self.at_keyword(kind))
        {
            let decl = self.parse_variable_declaration(kind, start)?;
            self.eat_semicolon();
            return Ok(decl);
        }
        if self.at_keyword("function") {
            let function = self.parse_function(NodeKind::FunctionDeclaration)?;
            return Ok(self.finish(function, start));
        }
        if self.eat_keyword("return") {
            self.skip_trivia();
            let argument = if matches!(self.peek(), Some(';' | '}') | None) {
                None
            } else {
                Some(self.parse_expression()?)
            };
            self.eat_semicolon();
            let node = Node::new(NodeKind::ReturnStatement).with("argument", argument);
            return Ok(self.finish(node, start));
        }
        if self.eat_keyword("throw") {
            let argument = self.parse_expression()?;
            self.eat_semicolon();
            let node = Node::new(NodeKind::ThrowStatement).with("argument", argument);
            return Ok(self.finish(node, start));
        }
        if self.eat_keyword("if") {
            self.expect("(")?;
            let test = self.parse_expression()?;
            self.expect(")")?;
            let consequent = self.parse_statement()?;
            let alternate = if self.eat_keyword("else") {
                Some(self.parse_statement()?)
            } else {
                None
            };
            let node = Node::new(NodeKind::IfStatement)
                .with("test", test)
                .with("consequent", consequent)
                .with("alternate", alternate);
            return Ok(self.finish(node, start));
        }
        if self.eat_keyword("while") {
            self.expect("(")?;
            let test = self.parse_expression()?;
            self.expect(")")?;
            let body = self.parse_statement()?;
            let node = Node::new(NodeKind::WhileStatement)
                .with("test", test)
                .with("body", body);
            return Ok(self.finish(node, start));
        }
        if self.eat_keyword("export") {
            if !self.eat_keyword("default") {
                return Err(self.error("only 'export default' is supported"));
            }
            let declaration = self.parse_assignment()?;
            self.eat_semicolon();
            let node = Node::new(NodeKind::ExportDefaultDeclaration).with("declaration", declaration);
            return Ok(self.finish(node, start));
        }
        let expression = self.parse_expression()?;
        self.eat_semicolon();
        Ok(self.finish(builders::expr_stmt(expression), start))
    }

    fn parse_block(&mut self) -> Result<Node> {
        let start = self.start();
        self.expect("{")?;
        let mut body = Vec::new();
        while !self.eat("}") {
            if self.at_end() {
                return Err(self.error("unterminated block"));
            }
            body.push(self.parse_statement()?);
        }
        let node = Node::new(NodeKind::BlockStatement).with("body", body);
        Ok(self.finish(node, start))
    }

    fn parse_variable_declaration(&mut self, kind: &str, start: Position) -> Result<Node> {
        self.eat_keyword(kind);
        let mut declarations = Vec::new();
        loop {
            let decl_start = self.start();
            let id = self.binding_identifier()?;
            let init = if self.eat_assign() {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            let declarator = Node::new(NodeKind::VariableDeclarator)
                .with("id", id)
                .with("init", init);
            declarations.push(self.finish(declarator, decl_start));
            if !self.eat(",") {
                break;
            }
        }
        let node = Node::new(NodeKind::VariableDeclaration)
            .with("declarations", declarations)
            .with("kind", kind);
        Ok(self.finish(node, start))
    }

    /// `=` that is not `==` or `=>`.
    fn eat_assign(&mut self) -> bool {
        self.skip_trivia();
        if self.peek() == Some('=') && !matches!(self.peek_at(1), Some('=' | '>')) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn parse_params(&mut self) -> Result<Vec<Node>> {
        self.expect("(")?;
        let mut params = Vec::new();
        while !self.eat(")") {
            let start = self.start();
            let param = if self.eat("...") {
                let argument = self.binding_identifier()?;
                Node::new(NodeKind::RestElement).with("argument", argument)
            } else {
                let id = self.binding_identifier()?;
                if self.eat_assign() {
                    let right = self.parse_assignment()?;
                    Node::new(NodeKind::AssignmentPattern)
                        .with("left", id)
                        .with("right", right)
                } else {
                    id
                }
            };
            params.push(self.finish(param, start));
            if !self.eat(",") {
                self.expect(")")?;
                break;
            }
        }
        Ok(params)
    }

    fn parse_function(&mut self, kind: NodeKind) -> Result<Node> {
        self.eat_keyword("function");
        self.skip_trivia();
        let id = if self.peek() == Some('(') {
            None
        } else {
            Some(self.binding_identifier()?)
        };
        let params = self.parse_params()?;
        let body = self.parse_block()?;
        Ok(Node::new(kind)
            .with("id", id)
            .with("params", params)
            .with("body", body)
            .with("generator", false)
            .with("async", false))
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn parse_expression(&mut self) -> Result<Node> {
        let start = self.start();
        let first = self.parse_assignment()?;
        if !self.at_comma() {
            return Ok(first);
        }
        let mut expressions = vec![first];
        while self.eat(",") {
            expressions.push(self.parse_assignment()?);
        }
        let node = Node::new(NodeKind::SequenceExpression).with("expressions", expressions);
        Ok(self.finish(node, start))
    }

    fn at_comma(&mut self) -> bool {
        self.skip_trivia();
        self.peek() == Some(',')
    }

    fn parse_assignment(&mut self) -> Result<Node> {
        let start = self.start();
        if self.arrow_ahead() {
            return self.parse_arrow(start);
        }
        let left = self.parse_conditional()?;
        self.skip_trivia();
        for operator in ["||=", "&&=", "??=", "+=", "-=", "*="] {
            if self.eat(operator) {
                let right = self.parse_assignment()?;
                let node = Node::new(NodeKind::AssignmentExpression)
                    .with("operator", operator)
                    .with("left", left)
                    .with("right", right);
                return Ok(self.finish(node, start));
            }
        }
        if self.eat_assign() {
            let right = self.parse_assignment()?;
            return Ok(self.finish(builders::assign(left, right), start));
        }
        Ok(left)
    }

    /// Whether an arrow function starts here: `x =>` or `( ... ) =>`.
    fn arrow_ahead(&mut self) -> bool {
        self.skip_trivia();
        let mut offset = 0;
        match self.peek() {
            Some('(') => {
                let mut depth = 0usize;
                while let Some(c) = self.peek_at(offset) {
                    offset += 1;
                    match c {
                        '(' => depth += 1,
                        ')' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                }
                if depth != 0 {
                    return false;
                }
            }
            Some(c) if c == '$' || c == '_' || c.is_alphabetic() => {
                while self.peek_at(offset).is_some_and(Self::is_word_char) {
                    offset += 1;
                }
            }
            _ => return false,
        }
        while self.peek_at(offset).is_some_and(char::is_whitespace) {
            offset += 1;
        }
        self.peek_at(offset) == Some('=') && self.peek_at(offset + 1) == Some('>')
    }

    fn parse_arrow(&mut self, start: Position) -> Result<Node> {
        self.skip_trivia();
        let params = if self.peek() == Some('(') {
            self.parse_params()?
        } else {
            vec![self.binding_identifier()?]
        };
        self.expect("=>")?;
        self.skip_trivia();
        let (body, expression) = if self.peek() == Some('{') {
            (self.parse_block()?, false)
        } else {
            (self.parse_assignment()?, true)
        };
        let node = Node::new(NodeKind::ArrowFunctionExpression)
            .with("id", Value::Null)
            .with("params", params)
            .with("body", body)
            .with("expression", expression)
            .with("generator", false)
            .with("async", false);
        Ok(self.finish(node, start))
    }

    fn parse_conditional(&mut self) -> Result<Node> {
        let start = self.start();
        let test = self.parse_binary(0)?;
        self.skip_trivia();
        let is_question = self.peek() == Some('?')
            && !matches!(self.peek_at(1), Some('?'))
            && !(self.peek_at(1) == Some('.') && !self.peek_at(2).is_some_and(|c| c.is_ascii_digit()));
        if !is_question {
            return Ok(test);
        }
        self.advance();
        let consequent = self.parse_assignment()?;
        self.expect(":")?;
        let alternate = self.parse_assignment()?;
        Ok(self.finish(builders::conditional(test, consequent, alternate), start))
    }

    /// Next binary operator and its precedence, without consuming it.
    fn peek_binary_operator(&mut self) -> Option<(&'static str, u8)> {
        const OPERATORS: &[(&str, u8)] = &[
            ("===", 7),
            ("!==", 7),
            ("**", 12),
            ("==", 7),
            ("!=", 7),
            ("<=", 8),
            (">=", 8),
            ("&&", 3),
            ("||", 2),
            ("??", 1),
            ("+", 10),
            ("-", 10),
            ("*", 11),
            ("/", 11),
            ("%", 11),
            ("<", 8),
            (">", 8),
            ("&", 6),
            ("|", 4),
            ("^", 5),
        ];
        self.skip_trivia();
        if self.at_keyword("instanceof") {
            return Some(("instanceof", 8));
        }
        if self.at_keyword("in") {
            return Some(("in", 8));
        }
        for &(operator, precedence) in OPERATORS {
            if !self.starts_with(operator) {
                continue;
            }
            let next = self.peek_at(operator.len());
            // Compound assignment and `++`/`--` are not binary operators
            if next == Some('=') && !operator.ends_with('=') {
                return None;
            }
            if operator.len() == 1 && next == operator.chars().next() {
                return None;
            }
            return Some((operator, precedence));
        }
        None
    }

    fn parse_binary(&mut self, min_precedence: u8) -> Result<Node> {
        let start = self.start();
        let mut left = self.parse_unary()?;
        while let Some((operator, precedence)) = self.peek_binary_operator() {
            if precedence < min_precedence {
                break;
            }
            for _ in operator.chars() {
                self.advance();
            }
            let right = if operator == "**" {
                self.parse_binary(precedence)?
            } else {
                self.parse_binary(precedence + 1)?
            };
            let kind = if matches!(operator, "&&" | "||" | "??") {
                NodeKind::LogicalExpression
            } else {
                NodeKind::BinaryExpression
            };
            let node = Node::new(kind)
                .with("left", left)
                .with("operator", operator)
                .with("right", right);
            left = self.finish(node, start);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Node> {
        let start = self.start();
        for operator in ["++", "--"] {
            if self.eat(operator) {
                let argument = self.parse_unary()?;
                let node = Node::new(NodeKind::UpdateExpression)
                    .with("operator", operator)
                    .with("prefix", true)
                    .with("argument", argument);
                return Ok(self.finish(node, start));
            }
        }
        for operator in ["!", "-", "+", "~"] {
            if self.eat(operator) {
                let argument = self.parse_unary()?;
                return Ok(self.finish(builders::unary(operator, argument), start));
            }
        }
        for operator in ["typeof", "void", "delete"] {
            if self.eat_keyword(operator) {
                let argument = self.parse_unary()?;
                return Ok(self.finish(builders::unary(operator, argument), start));
            }
        }
        let expression = self.parse_call_member()?;
        for operator in ["++", "--"] {
            if self.starts_with(operator) {
                self.eat(operator);
                let node = Node::new(NodeKind::UpdateExpression)
                    .with("operator", operator)
                    .with("prefix", false)
                    .with("argument", expression);
                return Ok(self.finish(node, start));
            }
        }
        Ok(expression)
    }

    fn parse_arguments(&mut self) -> Result<Vec<Node>> {
        self.expect("(")?;
        let mut arguments = Vec::new();
        while !self.eat(")") {
            arguments.push(self.parse_spreadable()?);
            if !self.eat(",") {
                self.expect(")")?;
                break;
            }
        }
        Ok(arguments)
    }

    fn parse_spreadable(&mut self) -> Result<Node> {
        let start = self.start();
        if self.eat("...") {
            let argument = self.parse_assignment()?;
            let node = Node::new(NodeKind::SpreadElement).with("argument", argument);
            return Ok(self.finish(node, start));
        }
        self.parse_assignment()
    }

    fn parse_call_member(&mut self) -> Result<Node> {
        let start = self.start();
        let mut expression = if self.at_keyword("new") {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };
        // Set once a `?.` link appears; later links of the same chain are
        // optional-chain nodes with `optional: false`.
        let mut in_chain = false;
        loop {
            self.skip_trivia();
            if self.starts_with("?.") && !self.peek_at(2).is_some_and(|c| c.is_ascii_digit()) {
                self.eat("?.");
                in_chain = true;
                self.skip_trivia();
                expression = match self.peek() {
                    Some('(') => {
                        let arguments = self.parse_arguments()?;
                        optional_call(expression, arguments, true)
                    }
                    Some('[') => {
                        self.advance();
                        let property = self.parse_expression()?;
                        self.expect("]")?;
                        optional_member(expression, property, true, true)
                    }
                    _ => {
                        let property = self.property_identifier()?;
                        optional_member(expression, property, false, true)
                    }
                };
            } else if self.peek() == Some('.') && self.peek_at(1) != Some('.') {
                self.advance();
                let property = self.property_identifier()?;
                expression = if in_chain {
                    optional_member(expression, property, false, false)
                } else {
                    builders::member_expr(expression, property, false)
                };
            } else if self.peek() == Some('[') {
                self.advance();
                let property = self.parse_expression()?;
                self.expect("]")?;
                expression = if in_chain {
                    optional_member(expression, property, true, false)
                } else {
                    builders::member_expr(expression, property, true)
                };
            } else if self.peek() == Some('(') {
                let arguments = self.parse_arguments()?;
                expression = if in_chain {
                    optional_call(expression, arguments, false)
                } else {
                    builders::call(expression, arguments)
                };
            } else {
                break;
            }
            expression = self.finish(expression, start);
        }
        Ok(expression)
    }

    fn property_identifier(&mut self) -> Result<Node> {
        let start = self.start();
        let name = self.identifier_name()?;
        Ok(self.finish(builders::ident(name), start))
    }

    fn parse_new(&mut self) -> Result<Node> {
        let start = self.start();
        self.eat_keyword("new");
        let mut callee = self.parse_primary()?;
        loop {
            if self.eat(".") {
                let property = self.property_identifier()?;
                callee = builders::member_expr(callee, property, false);
            } else if self.eat("[") {
                let property = self.parse_expression()?;
                self.expect("]")?;
                callee = builders::member_expr(callee, property, true);
            } else {
                break;
            }
        }
        self.skip_trivia();
        let arguments = if self.peek() == Some('(') {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        let node = Node::new(NodeKind::NewExpression)
            .with("callee", callee)
            .with("arguments", arguments);
        Ok(self.finish(node, start))
    }

    fn parse_primary(&mut self) -> Result<Node> {
        let start = self.start();
        let node = match self.peek() {
            Some(c) if c.is_ascii_digit() || (c == '.' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit())) => {
                self.parse_number()?
            }
            Some('"' | '\'') => self.parse_string()?,
            Some('(') => {
                self.advance();
                let expression = self.parse_expression()?;
                self.expect(")")?;
                return Ok(expression);
            }
            Some('[') => self.parse_array()?,
            Some('{') => self.parse_object()?,
            Some('<') => return self.parse_jsx_element(),
            Some(_) => {
                let Some(word) = self.peek_word() else {
                    return Err(self.error("unexpected token"));
                };
                match word.as_str() {
                    "function" => self.parse_function(NodeKind::FunctionExpression)?,
                    "this" => {
                        self.eat_keyword("this");
                        Node::new(NodeKind::ThisExpression)
                    }
                    "super" => {
                        self.eat_keyword("super");
                        Node::new(NodeKind::Super)
                    }
                    "null" => {
                        self.eat_keyword("null");
                        builders::null()
                    }
                    "true" | "false" => {
                        self.eat_keyword(&word);
                        builders::boolean(word == "true")
                    }
                    _ => return self.binding_identifier(),
                }
            }
            None => return Err(self.error("unexpected end of input")),
        };
        Ok(self.finish(node, start))
    }

    fn parse_number(&mut self) -> Result<Node> {
        let mut raw = String::new();
        while let Some(c) = self.peek() {
            let exponent_sign = (c == '+' || c == '-') && raw.ends_with(['e', 'E']);
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || exponent_sign {
                raw.push(c);
                self.advance();
            } else {
                break;
            }
        }
        let value = if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
            i64::from_str_radix(hex, 16).ok().map(|v| v as f64)
        } else {
            raw.replace('_', "").parse::<f64>().ok()
        };
        let value = value.ok_or_else(|| self.error(&format!("invalid number '{raw}'")))?;
        Ok(builders::number(value).with("raw", raw))
    }

    fn parse_string(&mut self) -> Result<Node> {
        let Some(quote) = self.advance() else {
            return Err(self.error("expected string"));
        };
        let mut raw = String::from(quote);
        let mut value = String::new();
        loop {
            let Some(c) = self.advance() else {
                return Err(self.error("unterminated string"));
            };
            raw.push(c);
            if c == quote {
                break;
            }
            if c == '\n' {
                return Err(self.error("unterminated string"));
            }
            if c != '\\' {
                value.push(c);
                continue;
            }
            let Some(escaped) = self.advance() else {
                return Err(self.error("unterminated string"));
            };
            raw.push(escaped);
            match escaped {
                'n' => value.push('\n'),
                't' => value.push('\t'),
                'r' => value.push('\r'),
                '0' => value.push('\0'),
                'u' => {
                    let mut hex = String::new();
                    for _ in 0..4 {
                        if let Some(h) = self.advance() {
                            raw.push(h);
                            hex.push(h);
                        }
                    }
                    let code = u32::from_str_radix(&hex, 16)
                        .ok()
                        .and_then(char::from_u32)
                        .ok_or_else(|| self.error("invalid unicode escape"))?;
                    value.push(code);
                }
                other => value.push(other),
            }
        }
        Ok(builders::string(value).with("raw", raw))
    }

    fn parse_array(&mut self) -> Result<Node> {
        self.expect("[")?;
        let mut elements = Vec::new();
        loop {
            self.skip_trivia();
            if self.eat("]") {
                break;
            }
            if self.peek() == Some(',') {
                self.advance();
                elements.push(Value::Null);
                continue;
            }
            elements.push(Value::from(self.parse_spreadable()?));
            if !self.eat(",") {
                self.expect("]")?;
                break;
            }
        }
        Ok(Node::new(NodeKind::ArrayExpression).with("elements", Value::List(elements)))
    }

    fn parse_object(&mut self) -> Result<Node> {
        self.expect("{")?;
        let mut properties = Vec::new();
        while !self.eat("}") {
            let start = self.start();
            if self.eat("...") {
                let argument = self.parse_assignment()?;
                let spread = Node::new(NodeKind::SpreadElement).with("argument", argument);
                properties.push(self.finish(spread, start));
            } else {
                let (key, computed) = match self.peek() {
                    Some('[') => {
                        self.advance();
                        let key = self.parse_assignment()?;
                        self.expect("]")?;
                        (key, true)
                    }
                    Some('"' | '\'') => (self.parse_string()?, false),
                    Some(c) if c.is_ascii_digit() => (self.parse_number()?, false),
                    _ => (self.property_identifier()?, false),
                };
                self.skip_trivia();
                let property = match self.peek() {
                    Some(':') => {
                        self.advance();
                        let value = self.parse_assignment()?;
                        builders::property_with_key(key, value).with("computed", computed)
                    }
                    Some('(') => {
                        let params = self.parse_params()?;
                        let body = self.parse_block()?;
                        let function = Node::new(NodeKind::FunctionExpression)
                            .with("id", Value::Null)
                            .with("params", params)
                            .with("body", body)
                            .with("generator", false)
                            .with("async", false);
                        builders::property_with_key(key, function)
                            .with("computed", computed)
                            .with("method", true)
                    }
                    _ => {
                        if key.kind != NodeKind::Identifier || computed {
                            return Err(self.error("expected ':'"));
                        }
                        builders::property_with_key(key.clone(), key).with("shorthand", true)
                    }
                };
                properties.push(self.finish(property, start));
            }
            if !self.eat(",") {
                self.expect("}")?;
                break;
            }
        }
        Ok(builders::object(properties))
    }

    // =========================================================================
    // JSX
    // =========================================================================

    fn jsx_identifier(&mut self) -> Result<Node> {
        let start = self.start();
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if Self::is_word_char(c) || c == '-' {
                name.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if name.is_empty() {
            return Err(self.error("expected JSX identifier"));
        }
        let node = Node::new(NodeKind::JSXIdentifier).with("name", name);
        Ok(self.finish(node, start))
    }

    fn jsx_element_name(&mut self) -> Result<Node> {
        let start = self.start();
        let first = self.jsx_identifier()?;
        if self.peek() == Some(':') {
            self.advance();
            let name = self.jsx_identifier()?;
            let node = Node::new(NodeKind::JSXNamespacedName)
                .with("namespace", first)
                .with("name", name);
            return Ok(self.finish(node, start));
        }
        let mut name = first;
        while self.peek() == Some('.') {
            self.advance();
            let property = self.jsx_identifier()?;
            let node = Node::new(NodeKind::JSXMemberExpression)
                .with("object", name)
                .with("property", property);
            name = self.finish(node, start);
        }
        Ok(name)
    }

    fn jsx_attribute_name(&mut self) -> Result<Node> {
        let start = self.start();
        let first = self.jsx_identifier()?;
        if self.peek() == Some(':') {
            self.advance();
            let name = self.jsx_identifier()?;
            let node = Node::new(NodeKind::JSXNamespacedName)
                .with("namespace", first)
                .with("name", name);
            return Ok(self.finish(node, start));
        }
        Ok(first)
    }

    fn jsx_name_text(node: &Node) -> String {
        match node.kind {
            NodeKind::JSXMemberExpression => format!(
                "{}.{}",
                node.node("object").map(Self::jsx_name_text).unwrap_or_default(),
                node.node("property").map(Self::jsx_name_text).unwrap_or_default()
            ),
            NodeKind::JSXNamespacedName => format!(
                "{}:{}",
                node.node("namespace").map(Self::jsx_name_text).unwrap_or_default(),
                node.node("name").map(Self::jsx_name_text).unwrap_or_default()
            ),
            _ => node.name().unwrap_or_default().to_string(),
        }
    }

    fn parse_jsx_element(&mut self) -> Result<Node> {
        let start = self.start();
        self.expect("<")?;
        if self.eat(">") {
            let opening = Node::new(NodeKind::JSXOpeningFragment);
            let children = self.parse_jsx_children()?;
            self.expect("</")?;
            self.expect(">")?;
            let node = Node::new(NodeKind::JSXFragment)
                .with("openingFragment", opening)
                .with("children", children)
                .with("closingFragment", Node::new(NodeKind::JSXClosingFragment));
            return Ok(self.finish(node, start));
        }

        let name = self.jsx_element_name()?;
        let mut attributes = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                Some('/' | '>') => break,
                Some('{') => {
                    let attr_start = self.start();
                    self.advance();
                    self.expect("...")?;
                    let argument = self.parse_assignment()?;
                    self.expect("}")?;
                    let spread = Node::new(NodeKind::JSXSpreadAttribute).with("argument", argument);
                    attributes.push(self.finish(spread, attr_start));
                }
                Some(_) => {
                    let attr_start = self.start();
                    let attr_name = self.jsx_attribute_name()?;
                    let value = if self.eat_assign() {
                        self.skip_trivia();
                        match self.peek() {
                            Some('"' | '\'') => Some(self.parse_jsx_attribute_string()?),
                            Some('{') => Some(self.parse_jsx_container()?),
                            Some('<') => Some(self.parse_jsx_element()?),
                            _ => return Err(self.error("expected JSX attribute value")),
                        }
                    } else {
                        None
                    };
                    let attribute = Node::new(NodeKind::JSXAttribute)
                        .with("name", attr_name)
                        .with("value", value);
                    attributes.push(self.finish(attribute, attr_start));
                }
                None => return Err(self.error("unterminated JSX element")),
            }
        }

        let self_closing = self.eat("/");
        self.expect(">")?;
        let opening = Node::new(NodeKind::JSXOpeningElement)
            .with("name", name.clone())
            .with("attributes", attributes)
            .with("selfClosing", self_closing);
        let (children, closing) = if self_closing {
            (Vec::new(), None)
        } else {
            let children = self.parse_jsx_children()?;
            self.expect("</")?;
            let closing_name = self.jsx_element_name()?;
            if Self::jsx_name_text(&closing_name) != Self::jsx_name_text(&name) {
                return Err(self.error("mismatched JSX closing tag"));
            }
            self.expect(">")?;
            (
                children,
                Some(Node::new(NodeKind::JSXClosingElement).with("name", closing_name)),
            )
        };
        let node = Node::new(NodeKind::JSXElement)
            .with("openingElement", opening)
            .with("children", children)
            .with("closingElement", closing);
        Ok(self.finish(node, start))
    }

    /// JSX attribute strings have no escapes.
    fn parse_jsx_attribute_string(&mut self) -> Result<Node> {
        let start = self.start();
        let Some(quote) = self.advance() else {
            return Err(self.error("expected string"));
        };
        let mut value = String::new();
        loop {
            match self.advance() {
                Some(c) if c == quote => break,
                Some(c) => value.push(c),
                None => return Err(self.error("unterminated JSX string")),
            }
        }
        let raw = format!("{quote}{value}{quote}");
        Ok(self.finish(builders::string(value).with("raw", raw), start))
    }

    fn parse_jsx_container(&mut self) -> Result<Node> {
        let start = self.start();
        self.expect("{")?;
        self.skip_trivia();
        if self.peek() == Some('}') {
            let empty = Node::new(NodeKind::JSXEmptyExpression);
            self.advance();
            let node = Node::new(NodeKind::JSXExpressionContainer).with("expression", empty);
            return Ok(self.finish(node, start));
        }
        if self.eat("...") {
            let expression = self.parse_expression()?;
            self.expect("}")?;
            let node = Node::new(NodeKind::JSXSpreadChild).with("expression", expression);
            return Ok(self.finish(node, start));
        }
        let expression = self.parse_expression()?;
        self.expect("}")?;
        let node = Node::new(NodeKind::JSXExpressionContainer).with("expression", expression);
        Ok(self.finish(node, start))
    }

    fn parse_jsx_children(&mut self) -> Result<Vec<Node>> {
        let mut children = Vec::new();
        loop {
            let start = Position {
                line: self.line,
                column: self.column,
            };
            match self.peek() {
                None => return Err(self.error("unterminated JSX children")),
                Some('<') if self.peek_at(1) == Some('/') => return Ok(children),
                Some('<') => children.push(self.parse_jsx_element()?),
                Some('{') => children.push(self.parse_jsx_container()?),
                Some(_) => {
                    let mut text = String::new();
                    while let Some(c) = self.peek() {
                        if c == '<' || c == '{' {
                            break;
                        }
                        text.push(c);
                        self.advance();
                    }
                    let node = Node::new(NodeKind::JSXText)
                        .with("value", text.clone())
                        .with("raw", text);
                    children.push(self.finish(node, start));
                }
            }
        }
    }
}

fn optional_member(object: Node, property: Node, computed: bool, optional: bool) -> Node {
    Node::new(NodeKind::OptionalMemberExpression)
        .with("object", object)
        .with("property", property)
        .with("computed", computed)
        .with("optional", optional)
}

fn optional_call(callee: Node, arguments: Vec<Node>, optional: bool) -> Node {
    Node::new(NodeKind::OptionalCallExpression)
        .with("callee", callee)
        .with("arguments", arguments)
        .with("optional", optional)
}
