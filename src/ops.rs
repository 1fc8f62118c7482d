//! The Whitespace instruction set and its encoding.
//!
//! Source text is made of three significant characters: space (`S`), tab (`T`)
//! and line feed (`N`). Every instruction starts with a fixed prefix code, some
//! of them are followed by a number or a label argument.
use std::fmt;

use num_bigint::{BigInt, Sign};
use num_traits::Zero;

pub const SPACE: char = ' ';
pub const TAB: char = '\t';
pub const LF: char = '\n';

/// Name of a jump target, the raw sequence of spaces and tabs from the source.
///
/// Labels are compared by their exact characters, `S` and `SS` are different labels.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label(String);

impl Label {
    pub fn new(name: impl Into<String>) -> Self {
        Label(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "-");
        }
        for c in self.0.chars() {
            write!(f, "{}", visible(c))?;
        }
        Ok(())
    }
}

/// Renders a significant character in the `S`/`T`/`N` notation.
pub fn visible(c: char) -> char {
    match c {
        SPACE => 'S',
        TAB => 'T',
        LF => 'N',
        other => other,
    }
}

/// The opcode of an instruction without its argument.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Opcode {
    Push,
    Duplicate,
    Copy,
    Swap,
    Discard,
    Slide,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Store,
    Retrieve,
    Mark,
    Call,
    Jump,
    JumpIfZero,
    JumpIfNegative,
    Return,
    Exit,
    WriteChar,
    WriteNumber,
    ReadChar,
    ReadNumber,
}

impl Opcode {
    /// All opcodes in the order in which the tokenizer tries them.
    pub const ALL: [Opcode; 24] = [
        Opcode::Push,
        Opcode::Duplicate,
        Opcode::Copy,
        Opcode::Swap,
        Opcode::Discard,
        Opcode::Slide,
        Opcode::Add,
        Opcode::Subtract,
        Opcode::Multiply,
        Opcode::Divide,
        Opcode::Modulo,
        Opcode::Store,
        Opcode::Retrieve,
        Opcode::Mark,
        Opcode::Call,
        Opcode::Jump,
        Opcode::JumpIfZero,
        Opcode::JumpIfNegative,
        Opcode::Return,
        Opcode::Exit,
        Opcode::WriteChar,
        Opcode::WriteNumber,
        Opcode::ReadChar,
        Opcode::ReadNumber,
    ];

    /// The whitespace prefix code of this opcode.
    pub fn code(self) -> &'static str {
        match self {
            Opcode::Push => "  ",
            Opcode::Duplicate => " \n ",
            Opcode::Copy => " \t ",
            Opcode::Swap => " \n\t",
            Opcode::Discard => " \n\n",
            Opcode::Slide => " \t\n",
            Opcode::Add => "\t   ",
            Opcode::Subtract => "\t  \t",
            Opcode::Multiply => "\t  \n",
            Opcode::Divide => "\t \t ",
            Opcode::Modulo => "\t \t\t",
            Opcode::Store => "\t\t ",
            Opcode::Retrieve => "\t\t\t",
            Opcode::Mark => "\n  ",
            Opcode::Call => "\n \t",
            Opcode::Jump => "\n \n",
            Opcode::JumpIfZero => "\n\t ",
            Opcode::JumpIfNegative => "\n\t\t",
            Opcode::Return => "\n\t\n",
            Opcode::Exit => "\n\n\n",
            Opcode::WriteChar => "\t\n  ",
            Opcode::WriteNumber => "\t\n \t",
            Opcode::ReadChar => "\t\n\t ",
            Opcode::ReadNumber => "\t\n\t\t",
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Push => "push",
            Opcode::Duplicate => "dup",
            Opcode::Copy => "copy",
            Opcode::Swap => "swap",
            Opcode::Discard => "drop",
            Opcode::Slide => "slide",
            Opcode::Add => "add",
            Opcode::Subtract => "sub",
            Opcode::Multiply => "mul",
            Opcode::Divide => "div",
            Opcode::Modulo => "mod",
            Opcode::Store => "store",
            Opcode::Retrieve => "retrieve",
            Opcode::Mark => "label",
            Opcode::Call => "call",
            Opcode::Jump => "jmp",
            Opcode::JumpIfZero => "jz",
            Opcode::JumpIfNegative => "jn",
            Opcode::Return => "ret",
            Opcode::Exit => "end",
            Opcode::WriteChar => "printc",
            Opcode::WriteNumber => "printi",
            Opcode::ReadChar => "readc",
            Opcode::ReadNumber => "readi",
        }
    }
}

/// A single executable instruction.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Instruction {
    Push(BigInt),
    Duplicate,
    /// Push a copy of the n-th value below the top.
    Copy(BigInt),
    Swap,
    Discard,
    /// Remove n values below the top, keeping the top.
    Slide(BigInt),
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Store,
    Retrieve,
    Call(Label),
    Jump(Label),
    JumpIfZero(Label),
    JumpIfNegative(Label),
    Return,
    Exit,
    WriteChar,
    WriteNumber,
    ReadChar,
    ReadNumber,
}

impl Instruction {
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Push(_) => Opcode::Push,
            Instruction::Duplicate => Opcode::Duplicate,
            Instruction::Copy(_) => Opcode::Copy,
            Instruction::Swap => Opcode::Swap,
            Instruction::Discard => Opcode::Discard,
            Instruction::Slide(_) => Opcode::Slide,
            Instruction::Add => Opcode::Add,
            Instruction::Subtract => Opcode::Subtract,
            Instruction::Multiply => Opcode::Multiply,
            Instruction::Divide => Opcode::Divide,
            Instruction::Modulo => Opcode::Modulo,
            Instruction::Store => Opcode::Store,
            Instruction::Retrieve => Opcode::Retrieve,
            Instruction::Call(_) => Opcode::Call,
            Instruction::Jump(_) => Opcode::Jump,
            Instruction::JumpIfZero(_) => Opcode::JumpIfZero,
            Instruction::JumpIfNegative(_) => Opcode::JumpIfNegative,
            Instruction::Return => Opcode::Return,
            Instruction::Exit => Opcode::Exit,
            Instruction::WriteChar => Opcode::WriteChar,
            Instruction::WriteNumber => Opcode::WriteNumber,
            Instruction::ReadChar => Opcode::ReadChar,
            Instruction::ReadNumber => Opcode::ReadNumber,
        }
    }

    /// Whether the instruction sets the instruction pointer itself instead of advancing it.
    pub fn is_control_transfer(&self) -> bool {
        matches!(
            self,
            Instruction::Call(_)
                | Instruction::Jump(_)
                | Instruction::JumpIfZero(_)
                | Instruction::JumpIfNegative(_)
                | Instruction::Return
        )
    }

    pub fn label(&self) -> Option<&Label> {
        match self {
            Instruction::Call(label)
            | Instruction::Jump(label)
            | Instruction::JumpIfZero(label)
            | Instruction::JumpIfNegative(label) => Some(label),
            _ => None,
        }
    }

    fn number(&self) -> Option<&BigInt> {
        match self {
            Instruction::Push(n) | Instruction::Copy(n) | Instruction::Slide(n) => Some(n),
            _ => None,
        }
    }

    /// Append the whitespace encoding of this instruction to `out`.
    pub fn encode(&self, out: &mut String) {
        out.push_str(self.opcode().code());
        if let Some(n) = self.number() {
            encode_number(n, out);
        } else if let Some(label) = self.label() {
            encode_label(label, out);
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode().mnemonic())?;
        if let Some(n) = self.number() {
            write!(f, " {n}")?;
        } else if let Some(label) = self.label() {
            write!(f, " {label}")?;
        }
        Ok(())
    }
}

/// An element of the tokenized source: an instruction or a label definition.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Token {
    Mark(Label),
    Instruction(Instruction),
}

impl Token {
    pub fn encode(&self, out: &mut String) {
        match self {
            Token::Mark(label) => {
                out.push_str(Opcode::Mark.code());
                encode_label(label, out);
            }
            Token::Instruction(instruction) => instruction.encode(out),
        }
    }
}

impl From<Instruction> for Token {
    fn from(instruction: Instruction) -> Self {
        Token::Instruction(instruction)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Mark(label) => write!(f, "{label}:"),
            Token::Instruction(instruction) => write!(f, "{instruction}"),
        }
    }
}

/// Sign, then the binary magnitude (space is 0, tab is 1), then a line feed.
/// Zero is written with an empty magnitude.
pub fn encode_number(n: &BigInt, out: &mut String) {
    out.push(if n.sign() == Sign::Minus { TAB } else { SPACE });
    if !n.is_zero() {
        for bit in n.magnitude().to_str_radix(2).chars() {
            out.push(if bit == '1' { TAB } else { SPACE });
        }
    }
    out.push(LF);
}

pub fn encode_label(label: &Label, out: &mut String) {
    out.push_str(label.as_str());
    out.push(LF);
}
