use anyhow::Result;
use log::{error, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{self, BufRead, Write};

use crate::dispatch::Dispatcher;

/// Serve line-delimited JSON requests from stdin until EOF.
pub fn run_stdio(dispatcher: &Dispatcher) -> Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    info!("Listening for monitor requests on stdin/stdout");
    serve(dispatcher, stdin.lock(), stdout.lock())
}

pub fn serve<R, W>(dispatcher: &Dispatcher, mut reader: R, mut writer: W) -> Result<()>
where
    R: BufRead,
    W: Write,
{
    let mut raw = Vec::new();
    loop {
        raw.clear();
        if reader.read_until(b'\n', &mut raw)? == 0 {
            info!("EOF reached, stopping request loop");
            return Ok(());
        }

        // Invalid UTF-8 becomes U+FFFD and then fails JSON parsing below.
        let line = String::from_utf8_lossy(&raw);
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(line) {
            Ok(request) => handle(dispatcher, request),
            Err(err) => {
                error!("failed to parse request: {}", err);
                Response::error(None, err.to_string())
            }
        };
        write_response(&mut writer, &response)?;
    }
}

fn handle(dispatcher: &Dispatcher, request: Request) -> Response {
    match dispatcher.execute(&request.method, request.params) {
        Ok(result) => Response::ok(request.id, result),
        Err(err) => {
            error!("request '{}' failed: {}", request.method, err);
            Response::error(request.id, err.to_string())
        }
    }
}

fn write_response(writer: &mut dyn Write, response: &Response) -> Result<()> {
    let serialized = serde_json::to_string(response)?;
    writer.write_all(serialized.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Option<Value>,
}

#[derive(Debug, Serialize)]
struct Response {
    id: Option<Value>,
    result: Option<Value>,
    error: Option<String>,
}

impl Response {
    fn ok(id: Option<Value>, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Option<Value>, err: String) -> Self {
        Self {
            id,
            result: None,
            error: Some(err),
        }
    }
}
