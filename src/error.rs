//! Error kinds raised by each stage of the pipeline.
//!
//! Stages return `anyhow::Result` and raise one of these kinds with
//! `bail!`; callers that care about the kind recover it with
//! `err.downcast_ref::<ParseError>()` and friends.

use snafu::Snafu;

use crate::lexer::lex::Span;

#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(module)]
pub enum LexError {
    #[snafu(display("{span}: unexpected character '{ch}'"))]
    UnexpectedCharacter { ch: char, span: Span },

    #[snafu(display("{span}: unterminated string literal"))]
    UnterminatedString { span: Span },
}

#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(module)]
pub enum ParseError {
    #[snafu(display("{span}: unexpected token {found} (expected {expected})"))]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },

    #[snafu(display("unexpected end of input (expected {expected})"))]
    UnexpectedEof { expected: String },

    #[snafu(display("{span}: identifier not declared: {name}"))]
    Undeclared { name: String, span: Span },

    #[snafu(display("{span}: identifier already declared: {name}"))]
    Redeclared { name: String, span: Span },

    #[snafu(display("{span}: malformed device configuration: {reason}"))]
    MalformedDevice { reason: String, span: Span },

    #[snafu(display("{span}: too many arguments for device configuration"))]
    TooManyDeviceArguments { span: Span },

    #[snafu(display("{span}: unterminated grouping, expected ')'"))]
    UnterminatedGrouping { span: Span },

    #[snafu(display("{span}: `{name}` takes {expected} argument(s), got {found}"))]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
        span: Span,
    },

    #[snafu(display("{span}: index on `{name}` requires a logic type"))]
    IndexWithoutProperty { name: String, span: Span },

    #[snafu(display("{span}: unknown function: {name}"))]
    UnknownFunction { name: String, span: Span },

    #[snafu(display("{span}: `{keyword}` statement not within loop"))]
    LoopControlOutsideLoop { keyword: String, span: Span },
}

#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(module)]
pub enum CodeGenError {
    #[snafu(display("not supported: {what}"))]
    Unsupported { what: String },

    #[snafu(display("missing logic type on device `{name}`"))]
    MissingProperty { name: String },

    #[snafu(display("`{name}` is not a device, it has no logic types"))]
    PropertyOnVariable { name: String },

    #[snafu(display("indexed store on named batch device `{name}` is not supported"))]
    UnsupportedDeviceStore { name: String },

    #[snafu(display("no more free registers (r{min}..r{max})"))]
    RegistersExhausted { min: u8, max: u8 },

    #[snafu(display("register already freed: r{register}"))]
    RegisterAlreadyFree { register: u8 },

    #[snafu(display("{count} register(s) still reserved after code generation"))]
    RegisterLeak { count: usize },

    #[snafu(display("`{keyword}` statement not within loop"))]
    LoopControlOutsideLoop { keyword: String },

    #[snafu(display("variable not declared: {name}"))]
    Undeclared { name: String },

    #[snafu(display("variable already declared: {name}"))]
    Redeclared { name: String },

    #[snafu(display("`{name}` takes {expected} argument(s), got {found}"))]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
}
