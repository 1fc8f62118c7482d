//! # whitespace
//! An interpreter for [Whitespace](https://en.wikipedia.org/wiki/Whitespace_(programming_language)),
//! a stack-based language whose programs consist only of spaces, tabs and line feeds.
//! Every other character is a comment, so programs can hide inside ordinary text.
//!
//! Running a program goes through three stages:
//! 1. [`parser`] strips the comments and tokenizes the source into instructions
//!    and label definitions,
//! 2. [`assembler`] resolves the label definitions into instruction indices,
//! 3. [`vm`] executes the resulting [`assembler::Program`] on a machine with a stack
//!    of arbitrary precision integers, a heap and a call stack.
//!
//! ```
//! // push 1, printi, end
//! let output = whitespace::execute("   \t\n\t\n \t\n\n\n", "").unwrap();
//! assert_eq!(output, "1");
//! ```
use thiserror::Error;

pub mod assembler;
pub mod config;
pub mod ops;
pub mod parser;
pub mod vm;

use assembler::{Assembler, AssemblyError, Program};
use config::get_config;
use parser::ParserError;
use vm::{RunError, VMOptions};

/// Any error which can happen between reading the source and the end of the run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Parser(#[from] ParserError),
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
    #[error(transparent)]
    Run(#[from] RunError),
}

/// Sanitize, tokenize and assemble program source text.
pub fn parse_program(source: &str) -> Result<Program, Error> {
    let mut assembler = Assembler::new();
    for token in parser::tokenize(&parser::sanitize(source)) {
        assembler.push(token?)?;
    }
    let program = assembler.finish();

    if get_config().should_log(5) {
        eprintln!("Assembled {} instructions, {} labels", program.len(), program.labels().len());
    }
    Ok(program)
}

/// Run a program on the given input and return everything it wrote.
pub fn execute(source: &str, input: &str) -> Result<String, Error> {
    let program = parse_program(source)?;
    let result = vm::run(&program, VMOptions::new(input))?;
    Ok(result.output)
}
