//! Label resolution: splits tokens into a flat instruction list and a label table.
use std::fmt;

use rustc_hash::FxHashMap as HashMap;
use thiserror::Error;

use crate::ops::{Instruction, Label, Token};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("Label {label} is defined twice (at instructions {first} and {second}).")]
    DuplicateLabel { label: Label, first: usize, second: usize },
}

/// An executable program: instructions without label marks, and the addresses of the labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    instructions: Vec<Instruction>,
    labels: HashMap<Label, usize>,
}

impl Program {
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Index of the instruction following the definition of `label`.
    pub fn resolve(&self, label: &Label) -> Option<usize> {
        self.labels.get(label).copied()
    }

    pub fn labels(&self) -> &HashMap<Label, usize> {
        &self.labels
    }

    /// All labels pointing at `index`, sorted.
    pub fn labels_at(&self, index: usize) -> Vec<&Label> {
        let mut labels: Vec<_> =
            self.labels.iter().filter(|&(_, &i)| i == index).map(|(label, _)| label).collect();
        labels.sort();
        labels
    }

    /// Rebuild a token sequence which assembles back into this program.
    pub fn disassemble(&self) -> Vec<Token> {
        let mut by_index: Vec<Vec<&Label>> = vec![Vec::new(); self.instructions.len() + 1];
        for (label, &index) in &self.labels {
            by_index[index].push(label);
        }

        let mut tokens = Vec::with_capacity(self.instructions.len() + self.labels.len());
        for (index, marks) in by_index.iter_mut().enumerate() {
            marks.sort();
            tokens.extend(marks.iter().map(|&label| Token::Mark(label.clone())));
            if let Some(instruction) = self.instructions.get(index) {
                tokens.push(instruction.clone().into());
            }
        }
        tokens
    }

    /// Whitespace source of this program.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        for token in self.disassemble() {
            token.encode(&mut out);
        }
        out
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in self.disassemble() {
            match token {
                Token::Mark(_) => writeln!(f, "{token}")?,
                Token::Instruction(_) => writeln!(f, "    {token}")?,
            }
        }
        Ok(())
    }
}

/// Incrementally builds a [`Program`] from tokens.
#[derive(Debug, Default)]
pub struct Assembler {
    program: Program,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, token: Token) -> Result<(), AssemblyError> {
        match token {
            Token::Mark(label) => {
                let index = self.program.instructions.len();
                if let Some(&first) = self.program.labels.get(&label) {
                    return Err(AssemblyError::DuplicateLabel { label, first, second: index });
                }
                self.program.labels.insert(label, index);
            }
            Token::Instruction(instruction) => self.program.instructions.push(instruction),
        }
        Ok(())
    }

    pub fn finish(self) -> Program {
        self.program
    }
}

/// Resolve labels of a token sequence.
///
/// References to labels are not checked here, jumping to an undefined label
/// fails only when the jump is executed.
pub fn assemble(tokens: impl IntoIterator<Item = Token>) -> Result<Program, AssemblyError> {
    let mut assembler = Assembler::new();
    for token in tokens {
        assembler.push(token)?;
    }
    Ok(assembler.finish())
}
