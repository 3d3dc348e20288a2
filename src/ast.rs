//! Syntax tree produced by the parser and walked by the translator.
//!
//! The parser accepts more of Python than the translator supports, so some
//! variants exist only to be reported as unsupported with their location.

use crate::token::Span;

#[derive(Debug, PartialEq, Clone)]
pub enum Constant {
    Integer(i64),
    Boolean(bool),
    String(String),
}

#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    Name(String),
    Constant(Constant),
    Call {
        func: Box<Expression>,
        args: Vec<Expression>,
    },
    Compare {
        left: Box<Expression>,
        ops: Vec<CompareOp>,
        comparators: Vec<Expression>,
    },
    BinaryOp {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },
    Attribute {
        object: Box<Expression>,
        name: String,
    },
    Subscript {
        object: Box<Expression>,
        index: Box<Expression>,
    },
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
    Tuple(Vec<Expression>),
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    In,
    NotIn,
    Is,
    IsNot,
}

impl CompareOp {
    /// Python spelling of the operator.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtE => "<=",
            Self::Gt => ">",
            Self::GtE => ">=",
            Self::In => "in",
            Self::NotIn => "not in",
            Self::Is => "is",
            Self::IsNot => "is not",
        }
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
}

impl BinaryOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
        }
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum UnaryOperator {
    Neg,
    Not,
}

impl UnaryOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Neg => "-",
            Self::Not => "not",
        }
    }
}

/// Assignment and loop target forms accepted by the parser.
#[derive(Debug, PartialEq, Clone)]
pub enum AssignTarget {
    Name(String),
    Attribute {
        object: Box<Expression>,
        name: String,
    },
    Subscript {
        object: Box<Expression>,
        index: Box<Expression>,
    },
    Tuple(Vec<AssignTarget>),
}

#[derive(Debug, PartialEq, Clone)]
pub enum StatementKind {
    Assign {
        targets: Vec<AssignTarget>,
        value: Expression,
    },
    Expr(Expression),
    If {
        test: Expression,
        body: Vec<Statement>,
        orelse: Vec<Statement>,
    },
    For {
        target: AssignTarget,
        iter: Expression,
        body: Vec<Statement>,
    },
    While {
        test: Expression,
        body: Vec<Statement>,
    },
    FunctionDef {
        name: String,
        params: Vec<String>,
        body: Vec<Statement>,
    },
    Return(Option<Expression>),
    Pass,
    Break,
    Continue,
}

/// A statement together with the position of its first token.
#[derive(Debug, PartialEq, Clone)]
pub struct Statement {
    pub kind: StatementKind,
    pub span: Span,
}

impl Statement {
    pub fn new(kind: StatementKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct Module {
    pub body: Vec<Statement>,
}
