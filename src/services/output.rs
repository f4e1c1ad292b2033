use crate::domain::errors::WorkflowError;
use serde::Serialize;

#[derive(Serialize)]
pub struct JsonOut<T: Serialize> {
    pub ok: bool,
    pub data: T,
}

#[derive(Serialize)]
pub struct JsonErr {
    pub ok: bool,
    pub error: ErrorBody,
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub details: Vec<String>,
}

/// Machine output goes to stdout (only with `--json`); the human summary
/// always goes to stderr.
pub fn print_out<T: Serialize>(
    json: bool,
    data: &[T],
    row: impl Fn(&T) -> String,
) -> anyhow::Result<()> {
    for d in data {
        eprintln!("{}", row(d));
    }
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&JsonOut { ok: true, data })?
        );
    }
    Ok(())
}

pub fn print_one<T: Serialize>(
    json: bool,
    data: T,
    summary: impl Fn(&T) -> String,
) -> anyhow::Result<()> {
    eprintln!("{}", summary(&data));
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&JsonOut { ok: true, data })?
        );
    }
    Ok(())
}

pub fn print_error(json: bool, err: &anyhow::Error) {
    let (code, details) = match err.downcast_ref::<WorkflowError>() {
        Some(w) => (w.code(), w.details()),
        None => ("INTERNAL", vec![]),
    };
    eprintln!("error[{}]: {:#}", code, err);
    for d in &details {
        eprintln!("  - {}", d);
    }
    if json {
        let body = JsonErr {
            ok: false,
            error: ErrorBody {
                code: code.to_string(),
                message: format!("{:#}", err),
                details,
            },
        };
        if let Ok(s) = serde_json::to_string_pretty(&body) {
            println!("{}", s);
        }
    }
}
