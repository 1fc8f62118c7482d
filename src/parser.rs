//! Turning source text into a stream of tokens.
use num_bigint::BigInt;
use thiserror::Error;

use crate::ops::{visible, Instruction, Label, Opcode, Token, LF, SPACE, TAB};


/// How many characters of the unrecognized remainder are shown in error messages.
const REMAINDER_PREVIEW: usize = 16;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParserError {
    /// `remainder` is the whole unread source from `position` in `S`/`T`/`N` notation.
    #[error("Unknown instruction at position {position}: `{}`.", preview(.remainder))]
    UnknownInstruction { position: usize, remainder: String },
    #[error("Number starting at position {position} is not terminated by a line feed.")]
    UnterminatedNumber { position: usize },
    #[error("Label starting at position {position} is not terminated by a line feed.")]
    UnterminatedLabel { position: usize },
}

fn preview(remainder: &str) -> String {
    match remainder.char_indices().nth(REMAINDER_PREVIEW) {
        Some((end, _)) => format!("{}...", &remainder[..end]),
        None => remainder.to_string(),
    }
}

/// Keep only spaces, tabs and line feeds, everything else is a comment.
pub fn sanitize(source: &str) -> String {
    source.chars().filter(|&c| c == SPACE || c == TAB || c == LF).collect()
}

/// Tokenize sanitized source text.
pub fn tokenize(source: &str) -> Tokenizer<'_> {
    Tokenizer::new(source)
}

/// A lazy iterator over the tokens of a program.
///
/// Yields at most one error, after which the iterator is exhausted.
#[derive(Debug, Clone)]
pub struct Tokenizer<'a> {
    source: &'a str,
    position: usize,
    failed: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str) -> Self {
        Tokenizer { source, position: 0, failed: false }
    }

    /// Byte offset of the next unread character.
    pub fn position(&self) -> usize {
        self.position
    }

    fn rest(&self) -> &'a str {
        &self.source[self.position..]
    }

    fn next_char(&mut self) -> Option<char> {
        let c = self.rest().chars().next()?;
        self.position += c.len_utf8();
        Some(c)
    }

    fn match_opcode(&mut self) -> Option<Opcode> {
        let rest = self.rest();
        let opcode = Opcode::ALL.into_iter().find(|opcode| rest.starts_with(opcode.code()))?;
        self.position += opcode.code().len();
        Some(opcode)
    }

    fn number(&mut self) -> Result<BigInt, ParserError> {
        let start = self.position;
        let negative = match self.next_char() {
            Some(SPACE) => false,
            Some(_) => true,
            None => return Err(ParserError::UnterminatedNumber { position: start }),
        };
        let mut value = BigInt::default();
        loop {
            match self.next_char() {
                Some(LF) => break,
                Some(c) => {
                    value <<= 1u32;
                    if c == TAB {
                        value += 1u32;
                    }
                }
                None => return Err(ParserError::UnterminatedNumber { position: start }),
            }
        }
        Ok(if negative { -value } else { value })
    }

    fn label(&mut self) -> Result<Label, ParserError> {
        let start = self.position;
        let end = self.rest().find(LF).ok_or(ParserError::UnterminatedLabel { position: start })?;
        let label = Label::new(&self.source[start..start + end]);
        self.position = start + end + LF.len_utf8();
        Ok(label)
    }

    fn read_token(&mut self) -> Result<Token, ParserError> {
        let start = self.position;
        let Some(opcode) = self.match_opcode() else {
            return Err(ParserError::UnknownInstruction {
                position: start,
                remainder: self.rest().chars().map(visible).collect(),
            });
        };

        Ok(match opcode {
            Opcode::Push => Instruction::Push(self.number()?).into(),
            Opcode::Duplicate => Instruction::Duplicate.into(),
            Opcode::Copy => Instruction::Copy(self.number()?).into(),
            Opcode::Swap => Instruction::Swap.into(),
            Opcode::Discard => Instruction::Discard.into(),
            Opcode::Slide => Instruction::Slide(self.number()?).into(),
            Opcode::Add => Instruction::Add.into(),
            Opcode::Subtract => Instruction::Subtract.into(),
            Opcode::Multiply => Instruction::Multiply.into(),
            Opcode::Divide => Instruction::Divide.into(),
            Opcode::Modulo => Instruction::Modulo.into(),
            Opcode::Store => Instruction::Store.into(),
            Opcode::Retrieve => Instruction::Retrieve.into(),
            Opcode::Mark => Token::Mark(self.label()?),
            Opcode::Call => Instruction::Call(self.label()?).into(),
            Opcode::Jump => Instruction::Jump(self.label()?).into(),
            Opcode::JumpIfZero => Instruction::JumpIfZero(self.label()?).into(),
            Opcode::JumpIfNegative => Instruction::JumpIfNegative(self.label()?).into(),
            Opcode::Return => Instruction::Return.into(),
            Opcode::Exit => Instruction::Exit.into(),
            Opcode::WriteChar => Instruction::WriteChar.into(),
            Opcode::WriteNumber => Instruction::WriteNumber.into(),
            Opcode::ReadChar => Instruction::ReadChar.into(),
            Opcode::ReadNumber => Instruction::ReadNumber.into(),
        })
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Result<Token, ParserError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.position >= self.source.len() {
            return None;
        }
        let result = self.read_token();
        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }
}
