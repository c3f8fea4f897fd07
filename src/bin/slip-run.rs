//! Thin host binary: reads a JSON-encoded semantic AST, runs it, and prints
//! the resulting `{status, value}` outcome (`spec.md` §6 "Semantic AST
//! contract").
//!
//! Takes no part in parsing SLIP source text — the Transformer that
//! produces this JSON lives outside this crate entirely.

use std::io::Read;
use std::process::ExitCode;
use std::rc::Rc;

use slip::{CapabilitySet, CodeData, Runner};

fn read_input(path: Option<&str>) -> std::io::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let mut ast_path = None;
    let mut unrestricted = false;
    for arg in &mut args {
        match arg.as_str() {
            "--unrestricted" => unrestricted = true,
            "-h" | "--help" => {
                eprintln!("usage: slip-run [--unrestricted] [AST_JSON_FILE]");
                eprintln!("reads a JSON semantic AST from AST_JSON_FILE, or stdin if omitted");
                return ExitCode::SUCCESS;
            }
            other => ast_path = Some(other.to_owned()),
        }
    }

    let text = match read_input(ast_path.as_deref()) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("slip-run: failed to read input: {err}");
            return ExitCode::FAILURE;
        }
    };

    let code: CodeData = match serde_json::from_str(&text) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("slip-run: invalid semantic AST json: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut runner = Runner::new(Rc::new(code));
    if unrestricted {
        runner = runner.with_capabilities(CapabilitySet::unrestricted());
    }
    let outcome = runner.run();

    let payload = serde_json::json!({
        "status": if outcome.ok { "ok" } else { "err" },
        "value": serde_json::to_value(&outcome.value).unwrap_or(serde_json::Value::Null),
        "error": outcome.error,
    });
    println!("{}", serde_json::to_string_pretty(&payload).unwrap_or_default());

    if outcome.ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
