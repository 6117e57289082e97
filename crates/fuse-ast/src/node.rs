//! Tree nodes.
//!
//! A [`Node`] is a tagged record: a [`NodeKind`] discriminator plus named
//! fields holding [`Value`]s. Nodes own their children; generated references
//! to temporaries are separate `Identifier` nodes that share a name, never a
//! node.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// =============================================================================
// Node kinds
// =============================================================================

macro_rules! node_kinds {
    ($($variant:ident),* $(,)?) => {
        /// Discriminator of a tree node.
        ///
        /// Kinds the core inspects or prints are listed explicitly; anything
        /// else a parser produces is carried as `Other` so trees round-trip.
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum NodeKind {
            $($variant,)*
            Other(String),
        }

        impl NodeKind {
            /// ESTree `type` name.
            pub fn as_str(&self) -> &str {
                match self {
                    $(NodeKind::$variant => stringify!($variant),)*
                    NodeKind::Other(name) => name,
                }
            }

            pub fn from_name(name: &str) -> NodeKind {
                match name {
                    $(stringify!($variant) => NodeKind::$variant,)*
                    other => NodeKind::Other(other.to_string()),
                }
            }
        }
    };
}

node_kinds! {
    // Program and statements
    Program,
    ExpressionStatement,
    BlockStatement,
    StaticBlock,
    EmptyStatement,
    DebuggerStatement,
    ReturnStatement,
    BreakStatement,
    ContinueStatement,
    LabeledStatement,
    IfStatement,
    SwitchStatement,
    SwitchCase,
    ThrowStatement,
    TryStatement,
    CatchClause,
    WhileStatement,
    DoWhileStatement,
    ForStatement,
    ForInStatement,
    ForOfStatement,
    // Declarations
    FunctionDeclaration,
    VariableDeclaration,
    VariableDeclarator,
    ClassDeclaration,
    ClassExpression,
    ClassBody,
    MethodDefinition,
    PropertyDefinition,
    // Modules
    ImportDeclaration,
    ImportSpecifier,
    ImportDefaultSpecifier,
    ImportNamespaceSpecifier,
    ExportNamedDeclaration,
    ExportDefaultDeclaration,
    ExportAllDeclaration,
    ExportSpecifier,
    // Expressions
    Identifier,
    PrivateIdentifier,
    Literal,
    ThisExpression,
    Super,
    ArrayExpression,
    ObjectExpression,
    Property,
    SpreadElement,
    FunctionExpression,
    ArrowFunctionExpression,
    UnaryExpression,
    UpdateExpression,
    BinaryExpression,
    LogicalExpression,
    AssignmentExpression,
    ConditionalExpression,
    CallExpression,
    NewExpression,
    MemberExpression,
    SequenceExpression,
    TemplateLiteral,
    TemplateElement,
    TaggedTemplateExpression,
    YieldExpression,
    AwaitExpression,
    ImportExpression,
    MetaProperty,
    ChainExpression,
    OptionalMemberExpression,
    OptionalCallExpression,
    ParenthesizedExpression,
    // Patterns
    ObjectPattern,
    ArrayPattern,
    RestElement,
    AssignmentPattern,
    // TypeScript wrappers and blocks
    TSAsExpression,
    TSNonNullExpression,
    TSTypeAssertion,
    TSSatisfiesExpression,
    TSModuleDeclaration,
    TSModuleBlock,
    // JSX
    JSXElement,
    JSXFragment,
    JSXOpeningElement,
    JSXClosingElement,
    JSXOpeningFragment,
    JSXClosingFragment,
    JSXAttribute,
    JSXSpreadAttribute,
    JSXIdentifier,
    JSXMemberExpression,
    JSXNamespacedName,
    JSXExpressionContainer,
    JSXEmptyExpression,
    JSXText,
    JSXSpreadChild,
}

impl NodeKind {
    /// Nodes whose `body`/`consequent` list holds statements that hoisted
    /// declarations can be inserted into.
    pub fn statement_list_field(&self) -> Option<&'static str> {
        match self {
            NodeKind::Program
            | NodeKind::BlockStatement
            | NodeKind::StaticBlock
            | NodeKind::TSModuleBlock => Some("body"),
            NodeKind::SwitchCase => Some("consequent"),
            _ => None,
        }
    }

    /// Type-only wrappers that evaluate to their `expression` field.
    pub fn is_transparent_wrapper(&self) -> bool {
        matches!(
            self,
            NodeKind::TSAsExpression
                | NodeKind::TSNonNullExpression
                | NodeKind::TSTypeAssertion
                | NodeKind::TSSatisfiesExpression
                | NodeKind::ParenthesizedExpression
        )
    }

    pub fn is_optional_chain(&self) -> bool {
        matches!(
            self,
            NodeKind::OptionalMemberExpression | NodeKind::OptionalCallExpression
        )
    }

    pub fn is_jsx(&self) -> bool {
        self.as_str().starts_with("JSX")
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Source locations
// =============================================================================

/// 1-based line, 0-based column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceLocation {
    pub start: Position,
    pub end: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

// =============================================================================
// Field values
// =============================================================================

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Node(Box<Node>),
    List(Vec<Value>),
    /// Plain record without a discriminator, e.g. a regex literal's
    /// `{ pattern, flags }`.
    Map(IndexMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_node_mut(&mut self) -> Option<&mut Node> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn into_node(self) -> Option<Node> {
        match self {
            Value::Node(node) => Some(*node),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        Value::Node(Box::new(node))
    }
}

impl From<Option<Node>> for Value {
    fn from(node: Option<Node>) -> Self {
        node.map_or(Value::Null, Value::from)
    }
}

impl From<Vec<Node>> for Value {
    fn from(nodes: Vec<Node>) -> Self {
        Value::List(nodes.into_iter().map(Value::from).collect())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

// =============================================================================
// Node
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub fields: IndexMap<String, Value>,
    /// Present only when the parser was asked for locations.
    pub loc: Option<SourceLocation>,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Node {
            kind,
            fields: IndexMap::new(),
            loc: None,
        }
    }

    /// Builder-style field setter.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn with_loc(mut self, loc: Option<SourceLocation>) -> Self {
        self.loc = loc;
        self
    }

    pub fn is(&self, kind: &NodeKind) -> bool {
        &self.kind == kind
    }

    /// Set a field, keeping its position when it already exists.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        if let Some(slot) = self.fields.get_mut(key) {
            *slot = value;
        } else {
            self.fields.insert(key.to_string(), value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.fields.get_mut(key)
    }

    /// Move a field's value out, leaving `Null` in its place.
    pub fn take(&mut self, key: &str) -> Value {
        self.fields
            .get_mut(key)
            .map(std::mem::take)
            .unwrap_or(Value::Null)
    }

    pub fn node(&self, key: &str) -> Option<&Node> {
        self.get(key).and_then(Value::as_node)
    }

    pub fn node_mut(&mut self, key: &str) -> Option<&mut Node> {
        self.get_mut(key).and_then(Value::as_node_mut)
    }

    pub fn take_node(&mut self, key: &str) -> Option<Node> {
        self.take(key).into_node()
    }

    pub fn list(&self, key: &str) -> &[Value] {
        self.get(key).and_then(Value::as_list).unwrap_or(&[])
    }

    pub fn list_mut(&mut self, key: &str) -> Option<&mut Vec<Value>> {
        self.get_mut(key).and_then(Value::as_list_mut)
    }

    /// Child nodes of a list field, skipping holes and non-node entries.
    pub fn nodes(&self, key: &str) -> impl Iterator<Item = &Node> {
        self.list(key).iter().filter_map(Value::as_node)
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Boolean field; absent or non-boolean reads as `false`.
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// `name` of an `Identifier`, `JSXIdentifier` or `PrivateIdentifier`.
    pub fn name(&self) -> Option<&str> {
        match self.kind {
            NodeKind::Identifier | NodeKind::JSXIdentifier | NodeKind::PrivateIdentifier => {
                self.str_field("name")
            }
            _ => None,
        }
    }

    /// Number of nodes in this subtree, including itself.
    pub fn count_nodes(&self) -> usize {
        fn count_value(value: &Value) -> usize {
            match value {
                Value::Node(node) => node.count_nodes(),
                Value::List(items) => items.iter().map(count_value).sum(),
                Value::Map(map) => map.values().map(count_value).sum(),
                _ => 0,
            }
        }
        1 + self.fields.values().map(count_value).sum::<usize>()
    }
}
