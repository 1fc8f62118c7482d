use anyhow::Context;
use clap::Parser;
use std::io::{Read, Write};
use std::time::Duration;
use whitespace::vm::{Machine, Status, VMOptions};

/// Run a Whitespace program.
#[derive(Parser, Debug)]
#[command()]
struct Args {
    /// File containing a Whitespace program.
    #[arg()]
    file: String,
    /// File to use as the program input. Standard input is used if not given.
    #[arg(long, short = 'i')]
    input: Option<String>,
    /// Maximum stack size.
    #[arg(long, short = 'm', default_value_t = 16_777_216)]
    max_stack_size: usize,
    /// Maximum number of distinct heap addresses.
    #[arg(long, default_value_t = 16_777_216)]
    max_heap_size: usize,
    /// Maximum depth of nested calls.
    #[arg(long, default_value_t = 1_048_576)]
    max_call_depth: usize,
    /// A limit for the number of executed instructions.
    /// If the limit is reached, the program will be stopped with an error.
    #[arg(long, short = 'l')]
    op_limit: Option<u64>,
    /// Stop the program successfully after this many instructions.
    #[arg(long)]
    stop_after: Option<u64>,
    /// Print statistics after running the program.
    #[arg(long, short = 's')]
    stats: bool,
    /// Print the assembled program instead of running it.
    #[arg(long)]
    list: bool,
}

fn read_input(path: Option<&str>) -> Result<String, anyhow::Error> {
    Ok(match path {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("Cannot read input file {path}"))?,
        None => {
            let mut input = String::new();
            std::io::stdin().lock().read_to_string(&mut input)?;
            input
        }
    })
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let source = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Cannot read program {}", args.file))?;
    let program = whitespace::parse_program(&source)?;

    if args.list {
        print!("{program}");
        return Ok(());
    }

    let input = read_input(args.input.as_deref())?;
    let options = VMOptions::new(&input)
        .with_max_stack_size(args.max_stack_size)
        .with_max_heap_size(args.max_heap_size)
        .with_max_call_depth(args.max_call_depth)
        .with_max_op_count(args.op_limit.unwrap_or(u64::MAX))
        .with_stop_after(args.stop_after.unwrap_or(u64::MAX));

    let mut machine = Machine::new(&program, &options);
    let start_time = std::time::Instant::now();
    let result = machine.run();
    let elapsed = start_time.elapsed();

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(machine.output().as_bytes())?;
    stdout.flush()?;

    if args.stats {
        print_stats(machine.instruction_counter(), elapsed);
    }

    if let Err(error) = result {
        let top: Vec<String> = machine.stack().iter().rev().take(8).map(|x| x.to_string()).collect();
        return Err(error).with_context(|| {
            format!(
                "Program failed at instruction {}, stack has {} values, top: [{}]",
                machine.instruction_pointer(),
                machine.stack().len(),
                top.join(", ")
            )
        });
    }
    if machine.status() == Status::Running {
        eprintln!("Stopped after {} instructions.", machine.instruction_counter());
    }

    Ok(())
}

fn print_stats(instruction_counter: u64, elapsed: Duration) {
    let instructions_per_second = instruction_counter as f64 / elapsed.as_secs_f64();
    eprintln!("Execution time: {:?}", elapsed);
    eprintln!(
        "Instructions executed: {} ({}/s)",
        instruction_counter,
        match instructions_per_second {
            n if n >= 1_000_000.0 => format!("{:.1}M", n / 1_000_000.0),
            n if n >= 1_000.0 => format!("{:.1}k", n / 1_000.0),
            n => format!("{:.1}", n),
        }
    );
}
