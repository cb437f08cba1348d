//! Interactive query shell over one SIMPLE source.
//!
//! `rustyline` provides line editing and history by default; a plain
//! stdin loop exists behind `--no-default-features`.

use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use quarry_qps::{Session, INVALID_QUERY};

pub fn cmd_repl(source: &Path) -> Result<()> {
    let session = Session::from_file(source)?;

    println!("{}", "Quarry query shell".green().bold());
    println!(
        "Loaded {}. Type a query, `help`, or `exit`.\n",
        source.display()
    );

    #[cfg(feature = "repl-rustyline")]
    {
        repl_rustyline(&session)
    }
    #[cfg(not(feature = "repl-rustyline"))]
    {
        repl_simple(&session)
    }
}

#[cfg(feature = "repl-rustyline")]
fn repl_rustyline(session: &Session) -> Result<()> {
    use anyhow::anyhow;
    use rustyline::error::ReadlineError;

    let mut rl = rustyline::DefaultEditor::new()
        .map_err(|e| anyhow!("failed to init rustyline: {e}"))?;

    loop {
        let line = match rl.readline("quarry> ") {
            Ok(l) => l,
            Err(ReadlineError::Eof) => break,
            Err(ReadlineError::Interrupted) => continue,
            Err(e) => return Err(anyhow!("readline error: {e}")),
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        rl.add_history_entry(line)
            .map_err(|e| anyhow!("failed to record history: {e}"))?;

        if !eval_line(session, line) {
            break;
        }
    }

    Ok(())
}

#[cfg(not(feature = "repl-rustyline"))]
fn repl_simple(session: &Session) -> Result<()> {
    use std::io::{self, Write};

    let stdin = io::stdin();
    loop {
        print!("{}", "quarry> ".cyan().bold());
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if !eval_line(session, line) {
            break;
        }
    }

    Ok(())
}

/// Handle one line. Returns `false` when the shell should exit.
fn eval_line(session: &Session, line: &str) -> bool {
    match line {
        "exit" | "quit" => return false,
        "help" => print_help(),
        query => {
            let results = session.evaluate(query);
            if results.first().map(String::as_str) == Some(INVALID_QUERY) {
                eprintln!("{} invalid query", "error:".red().bold());
            } else if results.is_empty() {
                println!("{}", "none".dimmed());
            } else {
                println!("{}", results.join(", "));
            }
        }
    }
    true
}

fn print_help() {
    println!("Enter a query, for example:");
    println!("  stmt s; Select s such that Follows(1, s)");
    println!("  assign a; variable v; Select <a, v> pattern a(v, _\"x + 1\"_)");
    println!("  Select BOOLEAN such that Calls(\"main\", _)");
    println!("Commands: help, exit");
}
