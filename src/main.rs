use std::path::PathBuf;

use anyhow::{bail, Result};
use structopt::StructOpt;

use ic10c::codegen::gen::Codegen;
use ic10c::emitter::emit::Emit;
use ic10c::lexer::lex::tokenize;
use ic10c::optimizer::simplify::Simplify;
use ic10c::parser::recursive_descent::Parser;

fn main() {
    env_logger::init();

    let opts = Opt::from_args();
    if let Err(e) = run(&opts) {
        eprintln!("ic10c: {}", e);
        std::process::exit(1);
    }
}

fn run(opts: &Opt) -> Result<()> {
    if !opts.path.is_file() {
        bail!("file not found: {}", opts.path.display());
    }
    let src = std::fs::read_to_string(&opts.path)?;

    let tokens = tokenize(&src)?;

    if opts.lex {
        for token in &tokens {
            println!("{} {:?}", token.span, token.token);
        }
        std::process::exit(0);
    }

    let mut parser = Parser::new(tokens);
    let raw_ast = parser.parse()?;

    if opts.parse {
        print!("{}", raw_ast);
        std::process::exit(0);
    }

    let ast = if opts.no_simplify {
        raw_ast
    } else {
        raw_ast.simplify()
    };

    if opts.simplify {
        print!("{}", ast);
        std::process::exit(0);
    }

    let instructions = ast.codegen()?;

    let mut stdout = std::io::stdout().lock();
    instructions.emit(&mut stdout)?;

    Ok(())
}

#[derive(Debug, StructOpt)]
#[structopt(name = "ic10c", about = "Compiles scripts to IC10 assembly")]
struct Opt {
    path: PathBuf,

    #[structopt(name = "lex", long)]
    lex: bool,

    #[structopt(name = "parse", long)]
    parse: bool,

    #[structopt(name = "simplify", long)]
    simplify: bool,

    #[structopt(name = "no-simplify", long)]
    no_simplify: bool,
}
