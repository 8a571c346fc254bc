// main.rs - Command line front end
//
// A thin wrapper over the embedding API: process options, run source files,
// then read the terminal. Interactive sessions get line editing and
// history; piped input is consumed silently, Unix filter style.

use std::env;
use std::fs::File;
use std::io::{self, BufRead, BufReader, IsTerminal};
use std::process;

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use ingot::image::load_core;
use ingot::lexer::numberify;
use ingot::vm::{Forth, CELL_BYTES, DEFAULT_CORE_SIZE, MINIMUM_CORE_SIZE};

const DEFAULT_DUMP_NAME: &str = "forth.core";

fn usage(name: &str) {
    eprintln!(
        "usage: {} [-s file] [-e string] [-l file] [-t] [-h] [-m size] [-] files",
        name
    );
}

fn help() {
    eprintln!(
        "\
ingot: a small embeddable forth interpreter

\t-h        print out this help and exit unsuccessfully
\t-e string evaluate a string
\t-s file   save state of forth interpreter to file
\t-d        save state to '{}'
\t-l file   load previously saved state from file
\t-m size   specify forth memory size in kilobytes (cannot be used with '-l')
\t-t        process stdin after processing forth files
\t-         stop processing options

Options must come before files to execute.
",
        DEFAULT_DUMP_NAME
    );
}

fn open_or_die(name: &str) -> File {
    match File::open(name) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("( fatal 'file-open \"{}: {}\" )", name, e);
            process::exit(1);
        }
    }
}

fn get_or_init(forth: Option<Forth>, core_size: usize) -> Forth {
    match forth {
        Some(f) => f,
        None => match Forth::init(core_size, io::stdin(), io::stdout()) {
            Ok(f) => f,
            Err(e) => {
                eprintln!("error: initialization failed: {}", e);
                process::exit(1);
            }
        },
    }
}

/// Interactive read-eval loop with history. Each line is fed through the
/// string evaluator; a fatal error ends the session.
fn repl(forth: &mut Forth) -> i32 {
    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(_) => {
            // No terminal facilities; fall back to plain stdin.
            forth.set_file_input(io::stdin());
            return if forth.run().is_ok() { 0 } else { -1 };
        }
    };
    let history = dirs::home_dir().map(|mut p| {
        p.push(".ingot_history");
        p
    });
    if let Some(path) = &history {
        let _ = rl.load_history(path);
    }
    let mut rval = 0;
    loop {
        match rl.readline("") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(&line);
                match forth.eval(&line) {
                    Ok(()) => println!(" ok"),
                    Err(_) => {
                        rval = -1;
                        break;
                    }
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("error: {}", e);
                break;
            }
        }
    }
    if let Some(path) = &history {
        let _ = rl.save_history(path);
    }
    rval
}

/// Run one source file, skipping a leading shebang line.
fn run_file(forth: &mut Forth, path: &str) -> Result<(), ()> {
    let mut reader = BufReader::new(open_or_die(path));
    let starts_with_hash = matches!(reader.fill_buf(), Ok(buf) if buf.first() == Some(&b'#'));
    if starts_with_hash {
        let mut shebang = String::new();
        let _ = reader.read_line(&mut shebang);
    }
    forth.set_file_input(reader);
    forth.run().map_err(|_| ())
}

fn main_forth(args: &[String]) -> i32 {
    let mut save = false;
    let mut readterm = false;
    let mut mset = false;
    let mut evaluated = false;
    let mut dump_name = DEFAULT_DUMP_NAME.to_string();
    let mut core_size = DEFAULT_CORE_SIZE;
    let mut forth: Option<Forth> = None;
    let mut rval = 0;

    let mut i = 1;
    while i < args.len() && args[i].starts_with('-') {
        match &args[i][1..] {
            "" => {
                i += 1;
                break;
            }
            "h" => {
                usage(&args[0]);
                help();
                return -1;
            }
            "t" => readterm = true,
            "e" => {
                let Some(string) = args.get(i + 1) else {
                    eprintln!("error: invalid arguments");
                    usage(&args[0]);
                    return -1;
                };
                i += 1;
                let mut f = get_or_init(forth.take(), core_size);
                let failed = f.eval(string).is_err();
                forth = Some(f);
                evaluated = true;
                if failed {
                    rval = -1;
                    break;
                }
            }
            "s" => {
                let Some(name) = args.get(i + 1) else {
                    eprintln!("error: invalid arguments");
                    usage(&args[0]);
                    return -1;
                };
                i += 1;
                dump_name = name.clone();
                save = true;
            }
            "d" => save = true,
            "m" => {
                let kilobytes = args
                    .get(i + 1)
                    .and_then(|a| numberify(10, a))
                    .filter(|_| forth.is_none());
                let Some(kilobytes) = kilobytes else {
                    eprintln!("error: invalid arguments");
                    usage(&args[0]);
                    return -1;
                };
                i += 1;
                core_size = kilobytes as usize * 1024 / CELL_BYTES;
                if core_size < MINIMUM_CORE_SIZE {
                    eprintln!(
                        "error: -m too small (minimum {})",
                        MINIMUM_CORE_SIZE * CELL_BYTES / 1024
                    );
                    return -1;
                }
                mset = true;
            }
            "l" => {
                let name = args.get(i + 1).filter(|_| forth.is_none() && !mset);
                let Some(name) = name else {
                    eprintln!("error: invalid arguments");
                    usage(&args[0]);
                    return -1;
                };
                i += 1;
                let mut file = open_or_die(name);
                match load_core(&mut file) {
                    Ok(f) => forth = Some(f),
                    Err(e) => {
                        eprintln!("error: {}: core load failed: {}", name, e);
                        return -1;
                    }
                }
            }
            _ => {
                eprintln!("error: invalid arguments");
                usage(&args[0]);
                return -1;
            }
        }
        i += 1;
    }

    // With nothing to evaluate and no files named, read the terminal.
    readterm = (!evaluated && i >= args.len()) || readterm;
    let mut forth = get_or_init(forth.take(), core_size);
    forth.set_args(args.len());

    if rval == 0 {
        for path in &args[i..] {
            if run_file(&mut forth, path).is_err() {
                rval = -1;
                break;
            }
        }
    }

    if rval == 0 && readterm {
        if io::stdin().is_terminal() {
            rval = repl(&mut forth);
        } else {
            forth.set_file_input(io::stdin());
            if forth.run().is_err() {
                rval = -1;
            }
        }
    }

    if save {
        if rval != 0 || forth.invalid() {
            eprintln!("error: refusing to save invalid core");
            return -1;
        }
        let result = File::create(&dump_name)
            .map_err(|e| e.to_string())
            .and_then(|mut f| forth.save_core(&mut f).map_err(|e| e.to_string()));
        if let Err(e) = result {
            eprintln!("error: core file save to '{}' failed: {}", dump_name, e);
            rval = -1;
        }
    }
    rval
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let rval = main_forth(&args);
    process::exit(if rval == 0 { 0 } else { 1 });
}
