//! Functions for executing Whitespace programs.
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{Signed, ToPrimitive, Zero};
use rustc_hash::FxHashMap as HashMap;
use thiserror::Error;

use crate::{
    assembler::Program,
    config::get_config,
    ops::{Instruction, Label, LF},
};


/// An implementation of `Tracer` that does not track anything.
///
/// This is the best choice if you do not need to observe the program while
/// it is executed.
#[derive(Default, Debug, Clone, Copy)]
pub struct NoStats {}

impl Tracer for NoStats {
    #[inline(always)]
    fn instruction(&mut self, _ip: usize, _instruction: &Instruction, _: &Result<Effect, OperationError>) {}
    #[inline(always)]
    fn should_continue(&mut self, _ip: usize, _instruction: &Instruction) -> bool { true }
}

/// A trait for observing the execution of a program.
///
/// You can implement this trait to collect any statistics you need,
/// or to stop the program at a given instruction.
pub trait Tracer {
    /// Called after every executed instruction with its outcome.
    fn instruction(&mut self, ip: usize, instruction: &Instruction, result: &Result<Effect, OperationError>);
    /// Called before every instruction by [`Machine::run`], returning `false` stops the run.
    fn should_continue(&mut self, ip: usize, instruction: &Instruction) -> bool;
}

/// An error that can occur during the execution of a single instruction.
#[derive(Error, Debug, Clone, PartialEq, Eq, Hash)]
pub enum OperationError {
    #[error("Not enough elements on the stack: {stack_len} elements, {required} required")]
    StackUnderflow { stack_len: usize, required: usize },
    #[error("Adding to a full stack (limit {limit})")]
    PushFailed { limit: usize },
    #[error("Negative argument: {argument}")]
    NegativeArgument { argument: BigInt },
    #[error("Index out of range: index {index}, stack length {stack_len}")]
    IndexOutOfRange { stack_len: usize, index: BigInt },
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Modulo by zero")]
    ModuloByZero,
    #[error("Reading heap address {address} which was never written")]
    UnsetHeapAddress { address: BigInt },
    #[error("Heap is full (limit {limit} addresses)")]
    HeapFull { limit: usize },
    #[error("Undefined label: {label}")]
    UndefinedLabel { label: Label },
    #[error("Returning with an empty call stack")]
    EmptyCallStack,
    #[error("Call stack is full (limit {limit})")]
    CallStackOverflow { limit: usize },
    #[error("Reading past the end of the input")]
    InputExhausted,
    #[error("Input line is not a number: `{line}`")]
    InvalidNumber { line: String },
    #[error("Value is not a character: {value}")]
    InvalidCharacter { value: BigInt },
}

/// What happens with the instruction pointer after an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Continue with the next instruction.
    None,
    SetInstructionPointer(usize),
    /// Push the address of the next instruction to the call stack and jump.
    SaveAndSetInstructionPointer(usize),
    Halt,
}

/// Lifecycle of a [`Machine`]. `Halted` and `Faulted` are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Running,
    Halted,
    Faulted,
}

/// The internal state of the VM.
#[derive(Clone, Debug)]
struct State<'a> {
    program: &'a Program,
    input: &'a str,
    input_cursor: usize,
    ip: usize,
    stack: Vec<BigInt>,
    heap: HashMap<BigInt, BigInt>,
    call_stack: Vec<usize>,
    output: String,
    max_stack_size: usize,
    max_heap_size: usize,
    max_call_depth: usize,
}

impl<'a> State<'a> {
    fn new(program: &'a Program, options: &VMOptions<'a>) -> Self {
        State {
            program,
            input: options.input,
            input_cursor: 0,
            ip: 0,
            stack: options.initial_stack.to_vec(),
            heap: HashMap::default(),
            call_stack: Vec::new(),
            output: String::new(),
            max_stack_size: options.max_stack_size,
            max_heap_size: options.max_heap_size,
            max_call_depth: options.max_call_depth,
        }
    }

    fn require(&self, required: usize) -> Result<(), OperationError> {
        if self.stack.len() < required {
            return Err(OperationError::StackUnderflow { stack_len: self.stack.len(), required });
        }
        Ok(())
    }

    fn pop(&mut self) -> Result<BigInt, OperationError> {
        self.require(1)?;
        self.stack.pop().ok_or(OperationError::StackUnderflow { stack_len: 0, required: 1 })
    }

    fn push(&mut self, value: BigInt) -> Result<(), OperationError> {
        if self.stack.len() >= self.max_stack_size {
            return Err(OperationError::PushFailed { limit: self.max_stack_size });
        }
        self.stack.push(value);
        Ok(())
    }

    /// The n-th value below the top, 0 is the top.
    fn peek_n(&self, n: usize) -> Result<&BigInt, OperationError> {
        self.require(n + 1)?;
        Ok(&self.stack[self.stack.len() - 1 - n])
    }

    fn resolve(&self, label: &Label) -> Result<usize, OperationError> {
        self.program.resolve(label).ok_or_else(|| OperationError::UndefinedLabel { label: label.clone() })
    }

    fn store(&mut self, address: BigInt, value: BigInt) -> Result<(), OperationError> {
        if self.heap.len() >= self.max_heap_size && !self.heap.contains_key(&address) {
            return Err(OperationError::HeapFull { limit: self.max_heap_size });
        }
        self.heap.insert(address, value);
        Ok(())
    }

    fn binary(&mut self, f: impl FnOnce(&BigInt, &BigInt) -> BigInt) -> Result<(), OperationError> {
        self.require(2)?;
        let a = self.pop()?;
        let b = self.pop()?;
        self.push(f(&b, &a))
    }

    fn read_char(&mut self) -> Result<char, OperationError> {
        let c = self.input[self.input_cursor..].chars().next().ok_or(OperationError::InputExhausted)?;
        self.input_cursor += c.len_utf8();
        Ok(c)
    }

    /// Consume input up to and including the next line feed, returning the line without it.
    fn read_line(&mut self) -> Result<&'a str, OperationError> {
        let input: &'a str = self.input;
        let rest = &input[self.input_cursor..];
        let end = rest.find(LF).ok_or(OperationError::InputExhausted)?;
        self.input_cursor += end + LF.len_utf8();
        Ok(&rest[..end])
    }

    fn apply(&mut self, instruction: &Instruction) -> Result<Effect, OperationError> {
        match instruction {
            Instruction::Push(n) => self.push(n.clone())?,
            Instruction::Duplicate => {
                let top = self.peek_n(0)?.clone();
                self.push(top)?;
            }
            Instruction::Copy(n) => {
                if n.is_negative() {
                    return Err(OperationError::NegativeArgument { argument: n.clone() });
                }
                let stack_len = self.stack.len();
                let value = n
                    .to_usize()
                    .filter(|&n| n < stack_len)
                    .map(|n| self.stack[stack_len - 1 - n].clone())
                    .ok_or_else(|| OperationError::IndexOutOfRange { stack_len, index: n.clone() })?;
                self.push(value)?;
            }
            Instruction::Swap => {
                self.require(2)?;
                let len = self.stack.len();
                self.stack.swap(len - 1, len - 2);
            }
            Instruction::Discard => {
                self.pop()?;
            }
            Instruction::Slide(n) => {
                let top = self.pop()?;
                let below = self.stack.len();
                let count = if n.is_negative() {
                    below
                } else {
                    n.to_usize().map_or(below, |n| n.min(below))
                };
                self.stack.truncate(below - count);
                self.stack.push(top);
            }
            Instruction::Add => self.binary(|b, a| b + a)?,
            Instruction::Subtract => self.binary(|b, a| b - a)?,
            Instruction::Multiply => self.binary(|b, a| b * a)?,
            Instruction::Divide => {
                if self.peek_n(0)?.is_zero() {
                    self.require(2)?;
                    return Err(OperationError::DivisionByZero);
                }
                self.binary(|b, a| b.div_floor(a))?
            }
            Instruction::Modulo => {
                if self.peek_n(0)?.is_zero() {
                    self.require(2)?;
                    return Err(OperationError::ModuloByZero);
                }
                self.binary(|b, a| b.mod_floor(a))?
            }
            Instruction::Store => {
                self.require(2)?;
                let value = self.pop()?;
                let address = self.pop()?;
                self.store(address, value)?;
            }
            Instruction::Retrieve => {
                let address = self.peek_n(0)?;
                let value = self
                    .heap
                    .get(address)
                    .cloned()
                    .ok_or_else(|| OperationError::UnsetHeapAddress { address: address.clone() })?;
                let len = self.stack.len();
                self.stack[len - 1] = value;
            }
            Instruction::Call(label) => {
                let target = self.resolve(label)?;
                if self.call_stack.len() >= self.max_call_depth {
                    return Err(OperationError::CallStackOverflow { limit: self.max_call_depth });
                }
                return Ok(Effect::SaveAndSetInstructionPointer(target));
            }
            Instruction::Jump(label) => {
                return Ok(Effect::SetInstructionPointer(self.resolve(label)?));
            }
            Instruction::JumpIfZero(label) => {
                if self.peek_n(0)?.is_zero() {
                    let target = self.resolve(label)?;
                    self.pop()?;
                    return Ok(Effect::SetInstructionPointer(target));
                }
                self.pop()?;
            }
            Instruction::JumpIfNegative(label) => {
                if self.peek_n(0)?.is_negative() {
                    let target = self.resolve(label)?;
                    self.pop()?;
                    return Ok(Effect::SetInstructionPointer(target));
                }
                self.pop()?;
            }
            Instruction::Return => {
                let target = self.call_stack.pop().ok_or(OperationError::EmptyCallStack)?;
                return Ok(Effect::SetInstructionPointer(target));
            }
            Instruction::Exit => return Ok(Effect::Halt),
            Instruction::WriteChar => {
                let value = self.peek_n(0)?;
                let c = value
                    .to_u32()
                    .and_then(char::from_u32)
                    .ok_or_else(|| OperationError::InvalidCharacter { value: value.clone() })?;
                self.pop()?;
                self.output.push(c);
            }
            Instruction::WriteNumber => {
                let value = self.pop()?;
                self.output.push_str(&value.to_string());
            }
            Instruction::ReadChar => {
                self.require(1)?;
                let c = self.read_char()?;
                let address = self.pop()?;
                self.store(address, BigInt::from(c as u32))?;
            }
            Instruction::ReadNumber => {
                self.require(1)?;
                let line = self.read_line()?;
                let value = line
                    .trim()
                    .parse::<BigInt>()
                    .map_err(|_| OperationError::InvalidNumber { line: line.to_string() })?;
                let address = self.pop()?;
                self.store(address, value)?;
            }
        }

        Ok(Effect::None)
    }

    fn stack_top(&self) -> Vec<String> {
        self.stack.iter().rev().take(get_config().log_stack_top).map(|x| x.to_string()).collect()
    }
}

/// Options for the Whitespace virtual machine.
#[derive(Debug, Clone)]
pub struct VMOptions<'a> {
    /// Text consumed by the read instructions.
    input: &'a str,
    /// The initial stack of the program, the last value is the top.
    initial_stack: &'a [BigInt],
    /// The maximum size of the stack.
    max_stack_size: usize,
    /// The maximum number of distinct heap addresses.
    max_heap_size: usize,
    /// The maximum depth of nested calls.
    max_call_depth: usize,
    /// The maximum number of instructions to run, if this is reached,
    /// the program will stop with an error.
    ///
    /// Set to [`u64::MAX`] to disable this limit.
    max_op_count: u64,
    /// The maximum number of instructions to run, if this is reached,
    /// the program will stop with a success.
    ///
    /// Set to [`u64::MAX`] to disable this limit.
    stop_after: u64,
}

impl<'a> VMOptions<'a> {
    /// Options without any limits, reading from `input`.
    pub fn new(input: &'a str) -> Self {
        Self { input, ..Self::default() }
    }

    pub fn with_initial_stack(self, initial_stack: &'a [BigInt]) -> Self {
        Self { initial_stack, ..self }
    }

    pub fn with_max_stack_size(self, max_stack_size: usize) -> Self {
        Self { max_stack_size, ..self }
    }

    pub fn with_max_heap_size(self, max_heap_size: usize) -> Self {
        Self { max_heap_size, ..self }
    }

    pub fn with_max_call_depth(self, max_call_depth: usize) -> Self {
        Self { max_call_depth, ..self }
    }

    pub fn with_max_op_count(self, max_op_count: u64) -> Self {
        Self { max_op_count, ..self }
    }

    pub fn with_stop_after(self, stop_after: u64) -> Self {
        Self { stop_after, ..self }
    }
}

impl<'a> Default for VMOptions<'a> {
    fn default() -> Self {
        Self {
            input: "",
            initial_stack: &[],
            max_stack_size: usize::MAX,
            max_heap_size: usize::MAX,
            max_call_depth: usize::MAX,
            max_op_count: u64::MAX,
            stop_after: u64::MAX,
        }
    }
}

/// An error that happened while running a Whitespace program.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RunError {
    /// A specific instruction failed.
    #[error("Instruction {index} ({instruction}) failed (instruction counter {instruction_counter}): {error}")]
    InstructionFailed {
        /// The instruction which failed.
        instruction: Instruction,
        /// The 0-based index of this instruction in the program.
        index: usize,
        /// The number of instructions which have been run before this one.
        instruction_counter: u64,
        /// The specific error within the instruction.
        error: OperationError,
    },
    /// Execution reached the end of the program without an exit instruction.
    #[error("Instruction pointer {index} is past the end of the program, the program has to end with `end`.")]
    MissingExit { index: usize },
    /// The program executed more instructions than the limit specified within [`VMOptions`].
    #[error("The program ran for too long ({instruction_counter} instructions had been run).")]
    RunTooLong {
        /// The number of instructions which have been run
        instruction_counter: u64,
    },
}

impl RunError {
    /// The failure of the instruction, if an instruction failed.
    pub fn operation_error(&self) -> Option<&OperationError> {
        match self {
            RunError::InstructionFailed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// The successful result of running a Whitespace program.
#[derive(Debug, Clone)]
pub struct RunResult<T: Tracer> {
    /// Everything the program has written.
    pub output: String,
    /// The resulting stack after the program has finished.
    pub stack: Vec<BigInt>,
    /// The number of instructions which have been run.
    pub instruction_counter: u64,
    /// The instruction pointer at the end of the program.
    pub instruction_pointer: usize,
    /// Whether the program executed an exit instruction. This is `false`
    /// if the run was stopped early by `stop_after` or the tracer.
    pub halted: bool,
    pub tracer: T,
}

impl<T: Tracer> From<Machine<'_, T>> for RunResult<T> {
    fn from(m: Machine<'_, T>) -> Self {
        RunResult {
            output: m.state.output,
            stack: m.state.stack,
            instruction_counter: m.instructions_run,
            instruction_pointer: m.state.ip,
            halted: m.status == Status::Halted,
            tracer: m.tracer,
        }
    }
}

/// A steppable Whitespace virtual machine executing one program.
///
/// The machine owns all mutable state of a single run. After a failure
/// the state is kept as it was when the failing instruction started, as far
/// as the instruction did not modify it before failing.
#[derive(Debug, Clone)]
pub struct Machine<'a, T: Tracer = NoStats> {
    state: State<'a>,
    status: Status,
    instructions_run: u64,
    max_op_count: u64,
    stop_after: u64,
    tracer: T,
}

impl<'a> Machine<'a, NoStats> {
    pub fn new(program: &'a Program, options: &VMOptions<'a>) -> Self {
        Self::with_tracer(program, options, NoStats::default())
    }
}

impl<'a, T: Tracer> Machine<'a, T> {
    pub fn with_tracer(program: &'a Program, options: &VMOptions<'a>, tracer: T) -> Self {
        Machine {
            state: State::new(program, options),
            status: Status::Running,
            instructions_run: 0,
            max_op_count: options.max_op_count,
            stop_after: options.stop_after,
            tracer,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn program(&self) -> &'a Program {
        self.state.program
    }

    pub fn instruction_pointer(&self) -> usize {
        self.state.ip
    }

    /// The instruction which will be performed by the next [`Machine::step`].
    pub fn current_instruction(&self) -> Option<&'a Instruction> {
        self.state.program.get(self.state.ip)
    }

    pub fn stack(&self) -> &[BigInt] {
        &self.state.stack
    }

    pub fn heap(&self) -> &HashMap<BigInt, BigInt> {
        &self.state.heap
    }

    pub fn call_stack(&self) -> &[usize] {
        &self.state.call_stack
    }

    pub fn output(&self) -> &str {
        &self.state.output
    }

    /// Remove and return the output written so far, for hosts which stream it.
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.state.output)
    }

    /// Byte offset of the next unread input character.
    pub fn input_cursor(&self) -> usize {
        self.state.input_cursor
    }

    pub fn instruction_counter(&self) -> u64 {
        self.instructions_run
    }

    pub fn tracer(&self) -> &T {
        &self.tracer
    }

    /// Perform a single instruction.
    ///
    /// Does nothing once the machine is halted or faulted.
    pub fn step(&mut self) -> Result<Status, RunError> {
        if self.status != Status::Running {
            return Ok(self.status);
        }

        let ip = self.state.ip;
        let Some(instruction) = self.current_instruction() else {
            self.status = Status::Faulted;
            return Err(RunError::MissingExit { index: ip });
        };

        let conf = get_config();
        if conf.should_log(25) {
            eprintln!("{ip}: {instruction} Stack {}, top: {:?}", self.state.stack.len(), self.state.stack_top());
        }

        let result = self.state.apply(instruction);
        self.tracer.instruction(ip, instruction, &result);

        let effect = match result {
            Ok(effect) => effect,
            Err(error) => {
                self.status = Status::Faulted;
                return Err(RunError::InstructionFailed {
                    instruction: instruction.clone(),
                    index: ip,
                    instruction_counter: self.instructions_run,
                    error,
                });
            }
        };

        debug_assert!(matches!(effect, Effect::None | Effect::Halt) || instruction.is_control_transfer());
        match effect {
            Effect::None => self.state.ip += 1,
            Effect::SetInstructionPointer(new_ip) => {
                if conf.should_log(10) {
                    eprintln!("Branching {ip}->{new_ip} ({instruction}) Stack {}, top: {:?}", self.state.stack.len(), self.state.stack_top());
                }
                self.state.ip = new_ip;
            }
            Effect::SaveAndSetInstructionPointer(new_ip) => {
                if conf.should_log(10) {
                    eprintln!("Calling {ip}->{new_ip} ({instruction}) depth {}", self.state.call_stack.len() + 1);
                }
                self.state.call_stack.push(ip + 1);
                self.state.ip = new_ip;
            }
            Effect::Halt => self.status = Status::Halted,
        }

        self.instructions_run += 1;
        Ok(self.status)
    }

    /// Run until the program halts, fails, or a limit from [`VMOptions`] is reached.
    ///
    /// Returns [`Status::Running`] when the run was stopped by `stop_after` or by the tracer.
    /// Reaching `max_op_count` is an error but leaves the machine running.
    pub fn run(&mut self) -> Result<Status, RunError> {
        while self.status == Status::Running {
            if self.instructions_run >= self.stop_after {
                break;
            }
            if let Some(instruction) = self.current_instruction() {
                if !self.tracer.should_continue(self.state.ip, instruction) {
                    break;
                }
            }
            if self.instructions_run >= self.max_op_count {
                return Err(RunError::RunTooLong { instruction_counter: self.instructions_run });
            }
            self.step()?;
        }
        Ok(self.status)
    }
}

/// Run a Whitespace program with the given options.
///
/// # Example
/// ```
/// use num_bigint::BigInt;
/// use whitespace::assembler::assemble;
/// use whitespace::ops::Instruction;
/// use whitespace::vm::{run, VMOptions};
///
/// let program = assemble(vec![
///     Instruction::Push(BigInt::from(42)).into(),
///     Instruction::WriteNumber.into(),
///     Instruction::Exit.into(),
/// ]).unwrap();
/// let result = run(&program, VMOptions::default()).unwrap();
/// assert_eq!(result.output, "42");
/// assert!(result.halted);
/// ```
pub fn run(program: &Program, options: VMOptions) -> Result<RunResult<NoStats>, RunError> {
    run_with_stats::<NoStats>(program, options, NoStats::default())
}

/// Run a Whitespace program with the given options and a tracer.
/// If you do not need to observe the execution, use the [`run`] function instead.
pub fn run_with_stats<T: Tracer>(
    program: &Program,
    options: VMOptions,
    tracer: T,
) -> Result<RunResult<T>, RunError> {
    let mut machine = Machine::with_tracer(program, &options, tracer);
    machine.run()?;
    Ok(machine.into())
}
