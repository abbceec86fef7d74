use std::fmt;

use crate::{
    codegen::registers::Register,
    parser::ast::{BatchMode, ComparisonKind},
};

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Register(Register),
    /// Literal text: a number, a named constant or a hash value.
    Immediate(String),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Register(r) => write!(f, "{}", r),
            Operand::Immediate(text) => write!(f, "{}", text),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithmeticOp {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            ArithmeticOp::Add => "add",
            ArithmeticOp::Sub => "sub",
            ArithmeticOp::Mul => "mul",
            ArithmeticOp::Div => "div",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BitwiseOp {
    And,
    Or,
}

impl BitwiseOp {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            BitwiseOp::And => "and",
            BitwiseOp::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Condition {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl Condition {
    pub fn inverse(&self) -> Condition {
        match self {
            Condition::Equal => Condition::NotEqual,
            Condition::NotEqual => Condition::Equal,
            Condition::Less => Condition::GreaterEqual,
            Condition::LessEqual => Condition::Greater,
            Condition::Greater => Condition::LessEqual,
            Condition::GreaterEqual => Condition::Less,
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            Condition::Equal => "eq",
            Condition::NotEqual => "ne",
            Condition::Less => "lt",
            Condition::LessEqual => "le",
            Condition::Greater => "gt",
            Condition::GreaterEqual => "ge",
        }
    }

    pub fn set_mnemonic(&self) -> String {
        format!("s{}", self.suffix())
    }

    pub fn branch_mnemonic(&self) -> String {
        format!("b{}", self.suffix())
    }

    pub fn relative_mnemonic(&self) -> String {
        format!("br{}", self.suffix())
    }
}

impl From<ComparisonKind> for Condition {
    fn from(kind: ComparisonKind) -> Condition {
        match kind {
            ComparisonKind::Equal => Condition::Equal,
            ComparisonKind::NotEqual => Condition::NotEqual,
            ComparisonKind::Less => Condition::Less,
            ComparisonKind::LessEqual => Condition::LessEqual,
            ComparisonKind::Greater => Condition::Greater,
            ComparisonKind::GreaterEqual => Condition::GreaterEqual,
        }
    }
}

/// How a load or store reaches its device(s).
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceTarget {
    Port(String),
    Batch {
        type_hash: i32,
        mode: BatchMode,
    },
    NamedBatch {
        type_hash: i32,
        name_hash: i32,
        mode: BatchMode,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Label(String),
    Move {
        dst: Register,
        src: Operand,
    },
    Arithmetic {
        op: ArithmeticOp,
        dst: Register,
        lhs: Operand,
        rhs: Operand,
    },
    Set {
        condition: Condition,
        dst: Register,
        lhs: Operand,
        rhs: Operand,
    },
    Bitwise {
        op: BitwiseOp,
        dst: Register,
        lhs: Operand,
        rhs: Operand,
    },
    Select {
        dst: Register,
        condition: Operand,
        then_value: Operand,
        else_value: Operand,
    },
    Jump(String),
    Branch {
        condition: Condition,
        lhs: Operand,
        rhs: Operand,
        target: String,
    },
    /// Branch by a line offset relative to this instruction.
    BranchRelative {
        condition: Condition,
        lhs: Operand,
        rhs: Operand,
        offset: i32,
    },
    Load {
        dst: Register,
        device: DeviceTarget,
        slot: Option<Operand>,
        property: String,
    },
    Store {
        device: DeviceTarget,
        slot: Option<Operand>,
        property: String,
        value: Operand,
    },
    Sleep(Operand),
    Yield,
    Hcf,
    /// Built-in math or bitwise function: `name dst args...`.
    Function {
        name: String,
        dst: Register,
        args: Vec<Operand>,
    },
}
