use std::{env, fs, process::ExitCode, time::Instant};

use unmask::{Deobfuscator, Options, ParseMode};

fn main() -> ExitCode {
    env_logger::init();
    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        eprintln!("usage: unmask <input.js> <output.js>");
        return ExitCode::FAILURE;
    }
    let code = match read_file(&args[1]) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let options = Options {
        dynamic: true,
        annotate: true,
        parse_mode: ParseMode::Strict,
        ..Options::default()
    };
    let start = Instant::now();
    let outcome = match Deobfuscator::new(options).run(&code) {
        Ok(outcome) => outcome,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };
    let elapsed = start.elapsed();

    if let Err(err) = fs::write(&args[2], &outcome.code) {
        eprintln!("error writing {}: {err}", args[2]);
        return ExitCode::FAILURE;
    }
    eprintln!(
        "cleaned in {elapsed:?}: {} renamed, {} simplified, {} branch(es), {} symbol(s) removed",
        outcome.report.variables_renamed,
        outcome.report.expressions_simplified,
        outcome.report.if_branches_removed,
        outcome.report.symbols_removed,
    );
    println!("deobfuscated code written to {}", args[2]);
    ExitCode::SUCCESS
}

fn read_file(file_path: &str) -> Result<String, String> {
    match fs::metadata(file_path) {
        Ok(metadata) => {
            if !metadata.is_file() {
                return Err(format!("{file_path} is not a file"));
            }
        }
        Err(err) => {
            return Err(format!("cannot read {file_path}: {err}"));
        }
    }
    fs::read_to_string(file_path).map_err(|err| format!("cannot read {file_path}: {err}"))
}
