//! Tree-walking evaluator for the subset [`crate::js_parser`] accepts.
//!
//! Optional chains are evaluated natively (Babel `Optional*` nodes and
//! `ChainExpression`), so a tree can be run before and after lowering and
//! the results compared.

use fuse_ast::{Node, NodeKind, ParseOptions, Value};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Loop iterations allowed before evaluation is aborted.
const MAX_STEPS: u64 = 1_000_000;

type NativeFn = dyn Fn(&mut Interpreter, JsValue, Vec<JsValue>) -> Result<JsValue, String>;

// =============================================================================
// Values
// =============================================================================

#[derive(Clone)]
pub enum JsValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Object(Rc<RefCell<IndexMap<String, JsValue>>>),
    Array(Rc<RefCell<Vec<JsValue>>>),
    Function(Rc<JsFunction>),
}

pub struct JsFunction {
    kind: FunctionKind,
    properties: RefCell<IndexMap<String, JsValue>>,
}

enum FunctionKind {
    Closure {
        params: Vec<Node>,
        body: Node,
        expression: bool,
        arrow: bool,
        scope: Rc<Scope>,
    },
    Native(Box<NativeFn>),
}

impl JsValue {
    pub fn str(value: &str) -> JsValue {
        JsValue::Str(value.to_string())
    }

    pub fn object<'a>(entries: impl IntoIterator<Item = (&'a str, JsValue)>) -> JsValue {
        let map = entries
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect();
        JsValue::Object(Rc::new(RefCell::new(map)))
    }

    pub fn array(items: Vec<JsValue>) -> JsValue {
        JsValue::Array(Rc::new(RefCell::new(items)))
    }

    /// Wrap a Rust closure as a callable value.
    pub fn native(
        f: impl Fn(&mut Interpreter, JsValue, Vec<JsValue>) -> Result<JsValue, String> + 'static,
    ) -> JsValue {
        JsValue::Function(Rc::new(JsFunction {
            kind: FunctionKind::Native(Box::new(f)),
            properties: RefCell::new(IndexMap::new()),
        }))
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, JsValue::Undefined | JsValue::Null)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            JsValue::Undefined | JsValue::Null => false,
            JsValue::Bool(b) => *b,
            JsValue::Number(n) => *n != 0.0 && !n.is_nan(),
            JsValue::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            JsValue::Undefined => "undefined",
            JsValue::Null | JsValue::Object(_) | JsValue::Array(_) => "object",
            JsValue::Bool(_) => "boolean",
            JsValue::Number(_) => "number",
            JsValue::Str(_) => "string",
            JsValue::Function(_) => "function",
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            JsValue::Null => 0.0,
            JsValue::Bool(b) => f64::from(u8::from(*b)),
            JsValue::Number(n) => *n,
            JsValue::Str(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            _ => f64::NAN,
        }
    }

    /// `String(value)`.
    pub fn to_js_string(&self) -> String {
        match self {
            JsValue::Undefined => "undefined".to_string(),
            JsValue::Null => "null".to_string(),
            JsValue::Bool(b) => b.to_string(),
            JsValue::Number(n) => format_number(*n),
            JsValue::Str(s) => s.clone(),
            JsValue::Array(items) => items
                .borrow()
                .iter()
                .map(|item| {
                    if item.is_nullish() {
                        String::new()
                    } else {
                        item.to_js_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(","),
            JsValue::Object(_) => "[object Object]".to_string(),
            JsValue::Function(_) => "function () { [code] }".to_string(),
        }
    }

    /// Readable rendering for assertions: strings quoted, containers expanded.
    pub fn to_debug_string(&self) -> String {
        match self {
            JsValue::Str(s) => format!("{s:?}"),
            JsValue::Array(items) => {
                let items: Vec<String> = items.borrow().iter().map(JsValue::to_debug_string).collect();
                format!("[{}]", items.join(", "))
            }
            JsValue::Object(map) => {
                let map = map.borrow();
                if map.is_empty() {
                    return "{}".to_string();
                }
                let entries: Vec<String> = map
                    .iter()
                    .map(|(key, value)| format!("{key}: {}", value.to_debug_string()))
                    .collect();
                format!("{{ {} }}", entries.join(", "))
            }
            JsValue::Function(_) => "[Function]".to_string(),
            other => other.to_js_string(),
        }
    }

    fn strict_equals(&self, other: &JsValue) -> bool {
        match (self, other) {
            (JsValue::Undefined, JsValue::Undefined) | (JsValue::Null, JsValue::Null) => true,
            (JsValue::Bool(a), JsValue::Bool(b)) => a == b,
            (JsValue::Number(a), JsValue::Number(b)) => a == b,
            (JsValue::Str(a), JsValue::Str(b)) => a == b,
            (JsValue::Object(a), JsValue::Object(b)) => Rc::ptr_eq(a, b),
            (JsValue::Array(a), JsValue::Array(b)) => Rc::ptr_eq(a, b),
            (JsValue::Function(a), JsValue::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    fn loose_equals(&self, other: &JsValue) -> bool {
        if self.is_nullish() || other.is_nullish() {
            return self.is_nullish() && other.is_nullish();
        }
        match (self, other) {
            (JsValue::Number(_) | JsValue::Bool(_), JsValue::Str(_) | JsValue::Bool(_))
            | (JsValue::Str(_) | JsValue::Bool(_), JsValue::Number(_) | JsValue::Bool(_)) => {
                self.to_number() == other.to_number()
            }
            _ => self.strict_equals(other),
        }
    }
}

impl PartialEq for JsValue {
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

impl fmt::Debug for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_debug_string())
    }
}

impl From<f64> for JsValue {
    fn from(n: f64) -> Self {
        JsValue::Number(n)
    }
}

impl From<bool> for JsValue {
    fn from(b: bool) -> Self {
        JsValue::Bool(b)
    }
}

impl From<&str> for JsValue {
    fn from(s: &str) -> Self {
        JsValue::str(s)
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        (if n > 0.0 { "Infinity" } else { "-Infinity" }).to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

// =============================================================================
// Scopes
// =============================================================================

struct Scope {
    vars: RefCell<IndexMap<String, JsValue>>,
    parent: Option<Rc<Scope>>,
    /// `Some` on non-arrow function scopes and the global scope.
    this: Option<JsValue>,
    function_scope: bool,
}

impl Scope {
    fn new(parent: Option<Rc<Scope>>, this: Option<JsValue>, function_scope: bool) -> Rc<Scope> {
        Rc::new(Scope {
            vars: RefCell::new(IndexMap::new()),
            parent,
            this,
            function_scope,
        })
    }

    fn lookup(&self, name: &str) -> Option<JsValue> {
        if let Some(value) = self.vars.borrow().get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref().and_then(|parent| parent.lookup(name))
    }

    fn assign(&self, name: &str, value: JsValue) -> bool {
        if let Some(slot) = self.vars.borrow_mut().get_mut(name) {
            *slot = value;
            return true;
        }
        match &self.parent {
            Some(parent) => parent.assign(name, value),
            None => {
                self.vars.borrow_mut().insert(name.to_string(), value);
                true
            }
        }
    }

    fn declare(&self, name: &str, value: JsValue) {
        self.vars.borrow_mut().insert(name.to_string(), value);
    }

    /// Declare in the nearest function scope without clobbering an existing
    /// binding (`var` semantics).
    fn declare_var(&self, name: &str, value: Option<JsValue>) {
        if self.function_scope || self.parent.is_none() {
            let mut vars = self.vars.borrow_mut();
            match value {
                Some(value) => {
                    vars.insert(name.to_string(), value);
                }
                None => {
                    vars.entry(name.to_string()).or_insert(JsValue::Undefined);
                }
            }
            return;
        }
        if let Some(parent) = &self.parent {
            parent.declare_var(name, value);
        }
    }

    fn this(&self) -> JsValue {
        match (&self.this, &self.parent) {
            (Some(this), _) => this.clone(),
            (None, Some(parent)) => parent.this(),
            (None, None) => JsValue::Undefined,
        }
    }
}

enum Completion {
    Normal(JsValue),
    Return(JsValue),
}

// =============================================================================
// Interpreter
// =============================================================================

pub struct Interpreter {
    global: Rc<Scope>,
    steps: u64,
    /// Value of the last `export default` executed.
    pub default_export: Option<JsValue>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        let global = Scope::new(None, Some(JsValue::Undefined), true);
        let assign = JsValue::native(|_, _, args| {
            let mut args = args.into_iter();
            let target = args.next().unwrap_or(JsValue::Undefined);
            let JsValue::Object(target_map) = &target else {
                return Err("TypeError: Object.assign target must be an object".to_string());
            };
            for source in args {
                if let JsValue::Object(source_map) = source {
                    let entries: Vec<(String, JsValue)> = source_map
                        .borrow()
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect();
                    target_map.borrow_mut().extend(entries);
                }
            }
            Ok(target)
        });
        global.declare("Object", JsValue::object([("assign", assign)]));
        Interpreter {
            global,
            steps: 0,
            default_export: None,
        }
    }

    pub fn set_global(&mut self, name: &str, value: JsValue) {
        self.global.declare(name, value);
    }

    pub fn global(&self, name: &str) -> Option<JsValue> {
        self.global.lookup(name)
    }

    /// Parse `source` with the test parser and run it.
    pub fn eval(&mut self, source: &str) -> Result<JsValue, String> {
        let options = ParseOptions {
            jsx: true,
            ..ParseOptions::default()
        };
        let program = crate::js_parser::parse_module(source, &options).map_err(|e| e.to_string())?;
        self.run_program(&program)
    }

    /// Run a `Program`, returning the value of the last expression statement.
    pub fn run_program(&mut self, program: &Node) -> Result<JsValue, String> {
        let scope = Rc::clone(&self.global);
        match self.exec_statements(program.list("body"), &scope)? {
            Completion::Normal(value) | Completion::Return(value) => Ok(value),
        }
    }

    /// Call a function value from Rust.
    pub fn call(&mut self, callee: &JsValue, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, String> {
        let JsValue::Function(function) = callee else {
            return Err(format!(
                "TypeError: {} is not a function",
                callee.to_debug_string()
            ));
        };
        let function = Rc::clone(function);
        match &function.kind {
            FunctionKind::Native(native) => native(self, this, args),
            FunctionKind::Closure {
                params,
                body,
                expression,
                arrow,
                scope,
            } => {
                let call_scope = Scope::new(
                    Some(Rc::clone(scope)),
                    if *arrow { None } else { Some(this) },
                    true,
                );
                let mut args = args.into_iter();
                for param in params {
                    match param.kind {
                        NodeKind::RestElement => {
                            let rest: Vec<JsValue> = args.by_ref().collect();
                            let name = binding_name(param.node("argument"))?;
                            call_scope.declare(name, JsValue::array(rest));
                        }
                        NodeKind::AssignmentPattern => {
                            let mut value = args.next().unwrap_or(JsValue::Undefined);
                            if matches!(value, JsValue::Undefined) {
                                value = self.evaluate(require(param, "right")?, &call_scope)?;
                            }
                            call_scope.declare(binding_name(param.node("left"))?, value);
                        }
                        _ => {
                            let value = args.next().unwrap_or(JsValue::Undefined);
                            call_scope.declare(binding_name(Some(param))?, value);
                        }
                    }
                }
                if *expression {
                    return self.evaluate(body, &call_scope);
                }
                match self.exec_statements(body.list("body"), &call_scope)? {
                    Completion::Return(value) => Ok(value),
                    Completion::Normal(_) => Ok(JsValue::Undefined),
                }
            }
        }
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn exec_statements(&mut self, statements: &[Value], scope: &Rc<Scope>) -> Result<Completion, String> {
        // Function declarations are hoisted to the top of their list
        for statement in statements.iter().filter_map(Value::as_node) {
            if statement.kind == NodeKind::FunctionDeclaration {
                let function = self.make_function(statement, scope, false);
                scope.declare(binding_name(statement.node("id"))?, function);
            }
        }
        let mut last = JsValue::Undefined;
        for statement in statements.iter().filter_map(Value::as_node) {
            match self.exec(statement, scope)? {
                Completion::Normal(value) => last = value,
                ret @ Completion::Return(_) => return Ok(ret),
            }
        }
        Ok(Completion::Normal(last))
    }

    fn exec(&mut self, statement: &Node, scope: &Rc<Scope>) -> Result<Completion, String> {
        let normal = Ok(Completion::Normal(JsValue::Undefined));
        match statement.kind {
            NodeKind::ExpressionStatement => {
                let value = self.evaluate(require(statement, "expression")?, scope)?;
                Ok(Completion::Normal(value))
            }
            NodeKind::VariableDeclaration => {
                let is_var = statement.str_field("kind") == Some("var");
                for declarator in statement.nodes("declarations") {
                    let name = binding_name(declarator.node("id"))?;
                    let init = match declarator.node("init") {
                        Some(init) => Some(self.evaluate(init, scope)?),
                        None => None,
                    };
                    if is_var {
                        scope.declare_var(name, init);
                    } else {
                        scope.declare(name, init.unwrap_or(JsValue::Undefined));
                    }
                }
                normal
            }
            NodeKind::FunctionDeclaration | NodeKind::EmptyStatement => normal,
            NodeKind::ReturnStatement => {
                let value = match statement.node("argument") {
                    Some(argument) => self.evaluate(argument, scope)?,
                    None => JsValue::Undefined,
                };
                Ok(Completion::Return(value))
            }
            NodeKind::IfStatement => {
                let test = self.evaluate(require(statement, "test")?, scope)?;
                if test.is_truthy() {
                    self.exec(require(statement, "consequent")?, scope)
                } else if let Some(alternate) = statement.node("alternate") {
                    self.exec(alternate, scope)
                } else {
                    normal
                }
            }
            NodeKind::WhileStatement => {
                while self.evaluate(require(statement, "test")?, scope)?.is_truthy() {
                    self.tick()?;
                    if let ret @ Completion::Return(_) = self.exec(require(statement, "body")?, scope)? {
                        return Ok(ret);
                    }
                }
                normal
            }
            NodeKind::BlockStatement => {
                let block_scope = Scope::new(Some(Rc::clone(scope)), None, false);
                self.exec_statements(statement.list("body"), &block_scope)
            }
            NodeKind::ThrowStatement => {
                let value = self.evaluate(require(statement, "argument")?, scope)?;
                Err(format!("Uncaught {}", value.to_js_string()))
            }
            NodeKind::ExportDefaultDeclaration => {
                let value = self.evaluate(require(statement, "declaration")?, scope)?;
                self.default_export = Some(value);
                normal
            }
            _ => Err(format!("unsupported statement {}", statement.kind)),
        }
    }

    fn tick(&mut self) -> Result<(), String> {
        self.steps += 1;
        if self.steps > MAX_STEPS {
            return Err("step limit exceeded".to_string());
        }
        Ok(())
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn evaluate(&mut self, node: &Node, scope: &Rc<Scope>) -> Result<JsValue, String> {
        match &node.kind {
            NodeKind::Literal => Ok(match node.get("value") {
                Some(Value::Bool(b)) => JsValue::Bool(*b),
                Some(Value::Number(n)) => JsValue::Number(*n),
                Some(Value::String(s)) => JsValue::Str(s.clone()),
                _ => JsValue::Null,
            }),
            NodeKind::Identifier => {
                let name = node.name().unwrap_or_default();
                match scope.lookup(name) {
                    Some(value) => Ok(value),
                    None if name == "undefined" => Ok(JsValue::Undefined),
                    None => Err(format!("ReferenceError: {name} is not defined")),
                }
            }
            NodeKind::ThisExpression => Ok(scope.this()),
            NodeKind::ArrayExpression => {
                let mut items = Vec::new();
                for element in node.list("elements") {
                    match element.as_node() {
                        None => items.push(JsValue::Undefined),
                        Some(spread) if spread.kind == NodeKind::SpreadElement => {
                            let value = self.evaluate(require(spread, "argument")?, scope)?;
                            items.extend(spread_items(&value)?);
                        }
                        Some(element) => items.push(self.evaluate(element, scope)?),
                    }
                }
                Ok(JsValue::array(items))
            }
            NodeKind::ObjectExpression => self.eval_object(node, scope),
            NodeKind::FunctionExpression => Ok(self.make_function(node, scope, false)),
            NodeKind::ArrowFunctionExpression => Ok(self.make_function(node, scope, true)),
            NodeKind::UnaryExpression => self.eval_unary(node, scope),
            NodeKind::UpdateExpression => {
                let target = require(node, "argument")?;
                let old = self.evaluate(target, scope)?.to_number();
                let new = if node.str_field("operator") == Some("++") {
                    old + 1.0
                } else {
                    old - 1.0
                };
                self.assign_to(target, JsValue::Number(new), scope)?;
                Ok(JsValue::Number(if node.flag("prefix") { new } else { old }))
            }
            NodeKind::BinaryExpression => {
                let left = self.evaluate(require(node, "left")?, scope)?;
                let right = self.evaluate(require(node, "right")?, scope)?;
                binary_op(node.str_field("operator").unwrap_or_default(), &left, &right)
            }
            NodeKind::LogicalExpression => {
                let left = self.evaluate(require(node, "left")?, scope)?;
                let short_circuit = match node.str_field("operator") {
                    Some("&&") => !left.is_truthy(),
                    Some("||") => left.is_truthy(),
                    _ => !left.is_nullish(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.evaluate(require(node, "right")?, scope)
                }
            }
            NodeKind::AssignmentExpression => self.eval_assignment(node, scope),
            NodeKind::ConditionalExpression => {
                if self.evaluate(require(node, "test")?, scope)?.is_truthy() {
                    self.evaluate(require(node, "consequent")?, scope)
                } else {
                    self.evaluate(require(node, "alternate")?, scope)
                }
            }
            NodeKind::SequenceExpression => {
                let mut last = JsValue::Undefined;
                for expression in node.nodes("expressions") {
                    last = self.evaluate(expression, scope)?;
                }
                Ok(last)
            }
            NodeKind::NewExpression => {
                let callee = self.evaluate(require(node, "callee")?, scope)?;
                let args = self.eval_arguments(node, scope)?;
                let instance = JsValue::object([]);
                let result = self.call(&callee, instance.clone(), args)?;
                Ok(match result {
                    JsValue::Object(_) | JsValue::Array(_) | JsValue::Function(_) => result,
                    _ => instance,
                })
            }
            NodeKind::MemberExpression
            | NodeKind::CallExpression
            | NodeKind::OptionalMemberExpression
            | NodeKind::OptionalCallExpression
            | NodeKind::ChainExpression
            | NodeKind::ParenthesizedExpression => Ok(self
                .eval_chain_link(node, scope)?
                .map_or(JsValue::Undefined, |(value, _)| value)),
            kind if kind.is_transparent_wrapper() => self.evaluate(require(node, "expression")?, scope),
            _ => Err(format!("unsupported expression {}", node.kind)),
        }
    }

    /// Evaluate a member/call link, returning the value and the receiver a
    /// call through it would use. `None` means an optional link
    /// short-circuited and the rest of the chain is skipped.
    fn eval_chain_link(&mut self, node: &Node, scope: &Rc<Scope>) -> Result<Option<(JsValue, JsValue)>, String> {
        match node.kind {
            NodeKind::OptionalMemberExpression | NodeKind::MemberExpression => {
                let object_node = require(node, "object")?;
                let object = if node.kind == NodeKind::OptionalMemberExpression {
                    match self.eval_chain_link(object_node, scope)? {
                        Some((object, _)) => object,
                        None => return Ok(None),
                    }
                } else {
                    self.eval_receiver(object_node, scope)?.0
                };
                if node.flag("optional") && object.is_nullish() {
                    return Ok(None);
                }
                let key = self.property_key(node, scope)?;
                let value = get_property(&object, &key)?;
                Ok(Some((value, object)))
            }
            NodeKind::OptionalCallExpression | NodeKind::CallExpression => {
                let callee_node = require(node, "callee")?;
                let (callee, this) = if node.kind == NodeKind::OptionalCallExpression {
                    match self.eval_chain_link(callee_node, scope)? {
                        Some(link) => link,
                        None => return Ok(None),
                    }
                } else {
                    self.eval_receiver(callee_node, scope)?
                };
                if node.flag("optional") && callee.is_nullish() {
                    return Ok(None);
                }
                let args = self.eval_arguments(node, scope)?;
                let result = self.call(&callee, this, args)?;
                Ok(Some((result, JsValue::Undefined)))
            }
            NodeKind::ChainExpression | NodeKind::ParenthesizedExpression => {
                Ok(Some(self.eval_receiver(require(node, "expression")?, scope)?))
            }
            _ => Ok(Some((self.evaluate(node, scope)?, JsValue::Undefined))),
        }
    }

    /// Evaluate at a chain boundary: a short-circuit becomes `undefined`,
    /// the receiver is kept.
    fn eval_receiver(&mut self, node: &Node, scope: &Rc<Scope>) -> Result<(JsValue, JsValue), String> {
        Ok(self
            .eval_chain_link(node, scope)?
            .unwrap_or((JsValue::Undefined, JsValue::Undefined)))
    }

    fn property_key(&mut self, member: &Node, scope: &Rc<Scope>) -> Result<String, String> {
        let property = require(member, "property")?;
        if member.flag("computed") {
            Ok(self.evaluate(property, scope)?.to_js_string())
        } else {
            property
                .name()
                .map(str::to_string)
                .ok_or_else(|| "member property is not an identifier".to_string())
        }
    }

    fn eval_arguments(&mut self, node: &Node, scope: &Rc<Scope>) -> Result<Vec<JsValue>, String> {
        let mut args = Vec::new();
        for argument in node.nodes("arguments") {
            if argument.kind == NodeKind::SpreadElement {
                let value = self.evaluate(require(argument, "argument")?, scope)?;
                args.extend(spread_items(&value)?);
            } else {
                args.push(self.evaluate(argument, scope)?);
            }
        }
        Ok(args)
    }

    fn eval_object(&mut self, node: &Node, scope: &Rc<Scope>) -> Result<JsValue, String> {
        let mut map = IndexMap::new();
        for property in node.nodes("properties") {
            if property.kind == NodeKind::SpreadElement {
                if let JsValue::Object(source) = self.evaluate(require(property, "argument")?, scope)? {
                    for (key, value) in source.borrow().iter() {
                        map.insert(key.clone(), value.clone());
                    }
                }
                continue;
            }
            let key_node = require(property, "key")?;
            let key = if property.flag("computed") {
                self.evaluate(key_node, scope)?.to_js_string()
            } else if let Some(name) = key_node.name() {
                name.to_string()
            } else {
                self.evaluate(key_node, scope)?.to_js_string()
            };
            let value = self.evaluate(require(property, "value")?, scope)?;
            map.insert(key, value);
        }
        Ok(JsValue::Object(Rc::new(RefCell::new(map))))
    }

    fn eval_unary(&mut self, node: &Node, scope: &Rc<Scope>) -> Result<JsValue, String> {
        let argument = require(node, "argument")?;
        let operator = node.str_field("operator").unwrap_or_default();
        if operator == "delete" {
            return self.eval_delete(argument, scope);
        }
        if operator == "typeof"
            && argument.kind == NodeKind::Identifier
            && scope.lookup(argument.name().unwrap_or_default()).is_none()
        {
            return Ok(JsValue::str("undefined"));
        }
        let value = self.evaluate(argument, scope)?;
        Ok(match operator {
            "!" => JsValue::Bool(!value.is_truthy()),
            "-" => JsValue::Number(-value.to_number()),
            "+" => JsValue::Number(value.to_number()),
            "~" => JsValue::Number(f64::from(!(value.to_number() as i32))),
            "typeof" => JsValue::str(value.type_of()),
            "void" => JsValue::Undefined,
            other => return Err(format!("unsupported unary operator {other}")),
        })
    }

    fn eval_delete(&mut self, argument: &Node, scope: &Rc<Scope>) -> Result<JsValue, String> {
        let argument = match argument.kind {
            NodeKind::ChainExpression | NodeKind::ParenthesizedExpression => require(argument, "expression")?,
            _ => argument,
        };
        if !matches!(
            argument.kind,
            NodeKind::MemberExpression | NodeKind::OptionalMemberExpression
        ) {
            self.evaluate(argument, scope)?;
            return Ok(JsValue::Bool(true));
        }
        let object_node = require(argument, "object")?;
        let object = if argument.kind == NodeKind::OptionalMemberExpression {
            match self.eval_chain_link(object_node, scope)? {
                Some((object, _)) => object,
                None => return Ok(JsValue::Bool(true)),
            }
        } else {
            self.eval_receiver(object_node, scope)?.0
        };
        if argument.flag("optional") && object.is_nullish() {
            return Ok(JsValue::Bool(true));
        }
        let key = self.property_key(argument, scope)?;
        match &object {
            JsValue::Object(map) => {
                map.borrow_mut().shift_remove(&key);
            }
            JsValue::Function(function) => {
                function.properties.borrow_mut().shift_remove(&key);
            }
            JsValue::Undefined | JsValue::Null => {
                return Err(format!(
                    "TypeError: Cannot convert undefined or null to object (deleting '{key}')"
                ));
            }
            _ => {}
        }
        Ok(JsValue::Bool(true))
    }

    fn eval_assignment(&mut self, node: &Node, scope: &Rc<Scope>) -> Result<JsValue, String> {
        let target = require(node, "left")?;
        let right = require(node, "right")?;
        let operator = node.str_field("operator").unwrap_or("=");
        let value = match operator {
            "=" => self.evaluate(right, scope)?,
            "||=" | "&&=" | "??=" => {
                let current = self.evaluate(target, scope)?;
                let keep = match operator {
                    "||=" => current.is_truthy(),
                    "&&=" => !current.is_truthy(),
                    _ => !current.is_nullish(),
                };
                if keep {
                    return Ok(current);
                }
                self.evaluate(right, scope)?
            }
            compound => {
                let current = self.evaluate(target, scope)?;
                let rhs = self.evaluate(right, scope)?;
                binary_op(compound.trim_end_matches('='), &current, &rhs)?
            }
        };
        self.assign_to(target, value.clone(), scope)?;
        Ok(value)
    }

    fn assign_to(&mut self, target: &Node, value: JsValue, scope: &Rc<Scope>) -> Result<(), String> {
        match target.kind {
            NodeKind::Identifier => {
                scope.assign(target.name().unwrap_or_default(), value);
                Ok(())
            }
            NodeKind::MemberExpression => {
                let object = self.evaluate(require(target, "object")?, scope)?;
                let key = self.property_key(target, scope)?;
                set_property(&object, key, value)
            }
            ref kind if kind.is_transparent_wrapper() => {
                self.assign_to(require(target, "expression")?, value, scope)
            }
            _ => Err(format!("invalid assignment target {}", target.kind)),
        }
    }

    fn make_function(&self, node: &Node, scope: &Rc<Scope>, arrow: bool) -> JsValue {
        let params = node.nodes("params").cloned().collect();
        let body = node.node("body").cloned().unwrap_or_else(|| Node::new(NodeKind::BlockStatement));
        JsValue::Function(Rc::new(JsFunction {
            kind: FunctionKind::Closure {
                expression: body.kind != NodeKind::BlockStatement,
                params,
                body,
                arrow,
                scope: Rc::clone(scope),
            },
            properties: RefCell::new(IndexMap::new()),
        }))
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn require<'a>(node: &'a Node, field: &str) -> Result<&'a Node, String> {
    node.node(field)
        .ok_or_else(|| format!("{} is missing '{field}'", node.kind))
}

fn binding_name(node: Option<&Node>) -> Result<&str, String> {
    node.and_then(Node::name)
        .ok_or_else(|| "only identifier bindings are supported".to_string())
}

fn spread_items(value: &JsValue) -> Result<Vec<JsValue>, String> {
    match value {
        JsValue::Array(items) => Ok(items.borrow().clone()),
        JsValue::Str(s) => Ok(s.chars().map(|c| JsValue::Str(c.to_string())).collect()),
        other => Err(format!("TypeError: {} is not iterable", other.to_debug_string())),
    }
}

fn get_property(object: &JsValue, key: &str) -> Result<JsValue, String> {
    Ok(match object {
        JsValue::Undefined | JsValue::Null => {
            return Err(format!(
                "TypeError: Cannot read properties of {} (reading '{key}')",
                object.to_js_string()
            ));
        }
        JsValue::Object(map) => map.borrow().get(key).cloned().unwrap_or(JsValue::Undefined),
        JsValue::Array(items) => {
            let items = items.borrow();
            if key == "length" {
                JsValue::Number(items.len() as f64)
            } else {
                key.parse::<usize>()
                    .ok()
                    .and_then(|index| items.get(index).cloned())
                    .unwrap_or(JsValue::Undefined)
            }
        }
        JsValue::Str(s) => {
            if key == "length" {
                JsValue::Number(s.encode_utf16().count() as f64)
            } else {
                key.parse::<usize>()
                    .ok()
                    .and_then(|index| s.chars().nth(index))
                    .map_or(JsValue::Undefined, |c| JsValue::Str(c.to_string()))
            }
        }
        JsValue::Function(function) => {
            if let Some(value) = function.properties.borrow().get(key) {
                return Ok(value.clone());
            }
            if key == "call" {
                let target = JsValue::Function(Rc::clone(function));
                return Ok(JsValue::native(move |interpreter, _, args| {
                    let mut args = args.into_iter();
                    let this = args.next().unwrap_or(JsValue::Undefined);
                    interpreter.call(&target, this, args.collect())
                }));
            }
            JsValue::Undefined
        }
        JsValue::Bool(_) | JsValue::Number(_) => JsValue::Undefined,
    })
}

fn set_property(object: &JsValue, key: String, value: JsValue) -> Result<(), String> {
    match object {
        JsValue::Undefined | JsValue::Null => Err(format!(
            "TypeError: Cannot set properties of {} (setting '{key}')",
            object.to_js_string()
        )),
        JsValue::Object(map) => {
            map.borrow_mut().insert(key, value);
            Ok(())
        }
        JsValue::Array(items) => {
            if let Ok(index) = key.parse::<usize>() {
                let mut items = items.borrow_mut();
                if index >= items.len() {
                    items.resize(index + 1, JsValue::Undefined);
                }
                items[index] = value;
            }
            Ok(())
        }
        JsValue::Function(function) => {
            function.properties.borrow_mut().insert(key, value);
            Ok(())
        }
        _ => Ok(()),
    }
}

fn binary_op(operator: &str, left: &JsValue, right: &JsValue) -> Result<JsValue, String> {
    let numeric = |f: fn(f64, f64) -> f64| JsValue::Number(f(left.to_number(), right.to_number()));
    let compare = |f: fn(std::cmp::Ordering) -> bool| -> JsValue {
        let ordering = match (left, right) {
            (JsValue::Str(a), JsValue::Str(b)) => Some(a.cmp(b)),
            _ => left.to_number().partial_cmp(&right.to_number()),
        };
        JsValue::Bool(ordering.is_some_and(f))
    };
    let int = |f: fn(i32, i32) -> i32| {
        JsValue::Number(f64::from(f(left.to_number() as i32, right.to_number() as i32)))
    };
    Ok(match operator {
        "+" => {
            let is_stringy =
                |v: &JsValue| matches!(v, JsValue::Str(_) | JsValue::Object(_) | JsValue::Array(_));
            if is_stringy(left) || is_stringy(right) {
                JsValue::Str(format!("{}{}", left.to_js_string(), right.to_js_string()))
            } else {
                numeric(|a, b| a + b)
            }
        }
        "-" => numeric(|a, b| a - b),
        "*" => numeric(|a, b| a * b),
        "/" => numeric(|a, b| a / b),
        "%" => numeric(|a, b| a % b),
        "**" => numeric(f64::powf),
        "<" => compare(|o| o.is_lt()),
        ">" => compare(|o| o.is_gt()),
        "<=" => compare(|o| o.is_le()),
        ">=" => compare(|o| o.is_ge()),
        "===" => JsValue::Bool(left.strict_equals(right)),
        "!==" => JsValue::Bool(!left.strict_equals(right)),
        "==" => JsValue::Bool(left.loose_equals(right)),
        "!=" => JsValue::Bool(!left.loose_equals(right)),
        "&" => int(|a, b| a & b),
        "|" => int(|a, b| a | b),
        "^" => int(|a, b| a ^ b),
        "in" => match right {
            JsValue::Object(map) => JsValue::Bool(map.borrow().contains_key(&left.to_js_string())),
            _ => return Err("TypeError: 'in' requires an object".to_string()),
        },
        "instanceof" => JsValue::Bool(false),
        other => return Err(format!("unsupported operator {other}")),
    })
}
