pub mod error;
pub mod printer;
pub mod util;
pub mod lexer {
    pub mod lex;
}
pub mod parser {
    pub mod ast;
    pub mod recursive_descent;
}
pub mod optimizer {
    pub mod simplify;
}
pub mod codegen {
    pub mod gen;
    pub mod instr;
    pub mod labels;
    pub mod registers;
}
pub mod emitter {
    pub mod emit;
}

use anyhow::Result;
use log::debug;

use codegen::gen::Codegen;
use emitter::emit::emit_to_string;
use optimizer::simplify::Simplify;
use parser::{ast::Program, recursive_descent::Parser};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Run the AST simplifier before code generation.
    pub simplify: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions { simplify: true }
    }
}

/// Lexes and parses `src` into a program.
pub fn parse(src: &str) -> Result<Program> {
    let tokens = lexer::lex::tokenize(src)?;
    Parser::new(tokens).parse()
}

/// Compiles `src` to IC10 assembly text with the default options.
pub fn compile(src: &str) -> Result<String> {
    compile_with(src, &CompileOptions::default())
}

pub fn compile_with(src: &str, options: &CompileOptions) -> Result<String> {
    let mut program = parse(src)?;

    if options.simplify {
        program = program.simplify();
        debug!(
            "simplified to {} top-level statements",
            program.statements.len()
        );
    }

    let instructions = program.codegen()?;
    emit_to_string(&instructions)
}
