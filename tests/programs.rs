use num_bigint::BigInt;
use whitespace::assembler::AssemblyError;
use whitespace::ops::Instruction;
use whitespace::parser::ParserError;
use whitespace::vm::{OperationError, RunError, VMOptions};
use whitespace::{execute, parse_program, Error};

/// Converts `S`/`T`/`N` notation into whitespace, ignoring anything else.
fn ws(notation: &str) -> String {
    notation
        .chars()
        .filter_map(|c| match c {
            'S' => Some(' '),
            'T' => Some('\t'),
            'N' => Some('\n'),
            _ => None,
        })
        .collect()
}

fn run(notation: &str, input: &str) -> Result<String, Error> {
    execute(&ws(notation), input)
}

#[test]
fn push_and_print() {
    // push 1, printi, end
    assert_eq!(run("SSSTN TNST NNN", "").unwrap(), "1");
    // push 1, push 2, push 3, printi x3
    assert_eq!(run("SSSTN SSSTSN SSSTTN TNST TNST TNST NNN", "").unwrap(), "321");
    assert_eq!(run("SSTTSTN TNST NNN", "").unwrap(), "-5");
    assert_eq!(run("SSSN TNST NNN", "").unwrap(), "0");
}

#[test]
fn printed_numbers_match_pushed_values() {
    let big: BigInt = BigInt::from(1) << 100;
    let values = (-300..=300)
        .map(BigInt::from)
        .chain([i64::MIN, i64::MAX].map(BigInt::from))
        .chain([big.clone(), -big.clone(), big * 7 + 3, BigInt::from(i64::MIN) - 1]);
    for value in values {
        let mut source = String::new();
        Instruction::Push(value.clone()).encode(&mut source);
        Instruction::WriteNumber.encode(&mut source);
        Instruction::Exit.encode(&mut source);
        assert_eq!(execute(&source, "").unwrap(), value.to_string(), "pushed {value}");
    }
}

#[test]
fn comments_are_ignored() {
    let source = "push\u{3000}   \tone\n\t\n \tprint\n\n\nend_of_program";
    assert_eq!(execute(source, "").unwrap(), "1");
}

#[test]
fn heap_hello() {
    // push 0, push 72, store, push 0, retrieve, printc, end
    assert_eq!(run("SSSN SSSTSSTSSSN TTS SSSN TTT TNSS NNN", "").unwrap(), "H");
}

#[test]
fn count_to_ten() {
    let program = "
        SS STN              push 1
        NSS STSN            label a
        SNS TNST            dup printi
        SS STSTSN TNSS      push 10 printc
        SS STN TSSS         push 1 add
        SNS SS STSTTN TSST  dup push 11 sub
        NTS TSN             jz b
        NSN STSN            jmp a
        NSS TSN             label b
        SNN NNN             drop end
    ";
    let expected: String = (1..=10).map(|i| format!("{i}\n")).collect();
    assert_eq!(run(program, "").unwrap(), expected);
}

#[test]
fn subroutine_returns_after_call() {
    let program = "
        NST TN          call t
        SS STSN TNST    push 2 printi
        NNN             end
        NSS TN          label t
        SS STN TNST     push 1 printi
        NTN             ret
    ";
    assert_eq!(run(program, "").unwrap(), "12");
}

#[test]
fn echo_number_squared() {
    let program = "
        SSSN TNTT       push 0 readi
        SSSN TTT        push 0 retrieve
        SNS TSSN        dup mul
        TNST NNN        printi end
    ";
    assert_eq!(run(program, "-12\n").unwrap(), "144");
    assert_eq!(run(program, "99999999999999999999\n").unwrap(), "9999999999999999999800000000000000000001");
}

#[test]
fn echo_characters_until_newline() {
    let program = "
        NSS SN              label s
        SSSN TNTS           push 0 readc
        SSSN TTT            push 0 retrieve
        SNS SSSTSTSN TSST   dup push 10 sub
        NTS TN              jz t
        TNSS                printc
        NSN SN              jmp s
        NSS TN              label t
        NNN                 end
    ";
    assert_eq!(run(program, "hello\nworld\n").unwrap(), "hello");
    assert_eq!(run(program, "řeč\n").unwrap(), "řeč");
}

#[test]
fn floor_division() {
    // push -7, push 2, div, printi, push -7, push 2, mod, printi
    assert_eq!(run("SSTTTTN SSSTSN TSTS TNST SSTTTTN SSSTSN TSTT TNST NNN", "").unwrap(), "-41");
}

#[test]
fn runs_are_independent() {
    // push 0, readc, push 0, retrieve, printi, end
    let program = "SSSN TNTS SSSN TTT TNST NNN";
    assert_eq!(run(program, "A").unwrap(), "65");
    assert_eq!(run(program, "B").unwrap(), "66");
    assert_eq!(run(program, "A").unwrap(), "65");
}

#[test]
fn empty_stack_pop_faults() {
    let err = run("SSSTN TNST TNST SSSTN TNST NNN", "").unwrap_err();
    match err {
        Error::Run(RunError::InstructionFailed { index, error, .. }) => {
            assert_eq!(index, 2);
            assert_eq!(error, OperationError::StackUnderflow { stack_len: 0, required: 1 });
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn lex_and_assembly_errors_happen_before_running() {
    assert!(matches!(run("SSSTN TNST NNN TN", ""), Err(Error::Parser(ParserError::UnknownInstruction { .. }))));
    assert!(matches!(run("SSSTT", ""), Err(Error::Parser(ParserError::UnterminatedNumber { .. }))));
    assert!(matches!(run("NSS SN NSS SN NNN", ""), Err(Error::Assembly(AssemblyError::DuplicateLabel { .. }))));
}

#[test]
fn undefined_label_faults_only_when_reached() {
    assert_eq!(run("NNN NSN TTN", "").unwrap(), "");
    assert!(matches!(
        run("NSN TTN NNN", ""),
        Err(Error::Run(RunError::InstructionFailed { error: OperationError::UndefinedLabel { .. }, .. }))
    ));
}

#[test]
fn missing_exit() {
    assert_eq!(run("SSSTN TNST", ""), Err(Error::Run(RunError::MissingExit { index: 2 })));
}

#[test]
fn encode_roundtrip() {
    let source = ws("
        NSS TN  SSSTN  NTT SN  NST SN  NNN
        NSS SN  SNN  NTN
    ");
    let program = parse_program(&source).unwrap();
    assert_eq!(program.len(), 6);
    let encoded = program.encode();
    assert_eq!(parse_program(&encoded).unwrap(), program);
    assert_eq!(encoded, source);
}

#[test]
fn listing() {
    let program = parse_program(&ws("NSS TN SSSTN NTT TN NNN")).unwrap();
    assert_eq!(program.to_string(), "T:\n    push 1\n    jn T\n    end\n");
}

#[test]
fn step_budget() {
    // label s, push 1, printi, jmp s
    let program = parse_program(&ws("NSS SN SSSTN TNST NSN SN")).unwrap();
    let err = whitespace::vm::run(&program, VMOptions::default().with_max_op_count(100)).unwrap_err();
    assert_eq!(err, RunError::RunTooLong { instruction_counter: 100 });

    let result = whitespace::vm::run(&program, VMOptions::default().with_stop_after(100)).unwrap();
    assert!(!result.halted);
    assert_eq!(result.output, "1".repeat(33));
}
