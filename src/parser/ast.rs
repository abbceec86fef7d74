/// Root of a parsed source file.
///
/// Kept as its own struct rather than a `Node` variant: a program never
/// nests inside another node, and every pass starts from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Block(BlockStatement),
    VariableDecl(VariableDeclaration),
    Assignment(AssignmentStatement),
    Loop(LoopStatement),
    ConditionalLoop(WhileStatement),
    ConditionalStatement(IfStatement),
    Break,
    Continue,
    Call(CallExpression),
    DeviceConfig(DeviceConfig),
    Numeric(String),
    ConstantRef(String),
    HashLiteral(String),
    Identifier(Identifier),
    UnaryOp(UnaryExpression),
    BinaryOp(BinaryExpression),
    Comparison(ComparisonExpression),
    Logical(LogicalExpression),
    Ternary(TernaryExpression),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockStatement {
    pub statements: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclaration {
    pub name: String,
    pub init: Box<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentStatement {
    pub target: Identifier,
    pub expr: Box<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopStatement {
    pub body: Box<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileStatement {
    pub condition: Box<Node>,
    pub body: Box<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStatement {
    pub condition: Box<Node>,
    pub then_branch: Box<Node>,
    pub else_branch: Option<Box<Node>>,
}

/// Built-in function or pseudo-op (`sleep`, `yield`, `hcf`) invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct CallExpression {
    pub name: String,
    pub args: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceConfig {
    pub device_type: String,
    pub addressing: DeviceAddressing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceAddressing {
    /// `d0`..`d5` or `db`.
    Port(String),
    /// Every device of the type on the network.
    Batch(BatchMode),
    /// Every device of the type carrying the given name.
    NamedBatch { name: String, mode: BatchMode },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    Average,
    Minimum,
    Maximum,
    Sum,
}

impl BatchMode {
    pub fn from_name(name: &str) -> Option<BatchMode> {
        match name {
            "Average" => Some(BatchMode::Average),
            "Minimum" => Some(BatchMode::Minimum),
            "Maximum" => Some(BatchMode::Maximum),
            "Sum" => Some(BatchMode::Sum),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BatchMode::Average => "Average",
            BatchMode::Minimum => "Minimum",
            BatchMode::Maximum => "Maximum",
            BatchMode::Sum => "Sum",
        }
    }
}

/// A variable or device alias, optionally indexed and with a logic type.
/// An index is only ever present together with a property.
#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub name: String,
    pub index: Option<Box<Node>>,
    pub property: Option<String>,
}

impl Identifier {
    pub fn plain(name: &str) -> Identifier {
        Identifier {
            name: name.to_owned(),
            index: None,
            property: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpression {
    pub kind: UnaryExpressionKind,
    pub expr: Box<Node>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryExpressionKind {
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpression {
    pub kind: BinaryExpressionKind,
    pub lhs: Box<Node>,
    pub rhs: Box<Node>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryExpressionKind {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonExpression {
    pub kind: ComparisonKind,
    pub lhs: Box<Node>,
    pub rhs: Box<Node>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ComparisonKind {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogicalExpression {
    pub kind: LogicalKind,
    pub lhs: Box<Node>,
    pub rhs: Box<Node>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogicalKind {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TernaryExpression {
    pub condition: Box<Node>,
    pub then_expr: Box<Node>,
    pub else_expr: Box<Node>,
}
