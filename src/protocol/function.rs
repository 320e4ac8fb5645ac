//! Inbound runtime commands ("functions").

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::broadcast;

const KW_FUNCTION: &str = "FUNCTION";
const KW_FUNCTION_PAYLOAD: &str = "FUNCTION_PAYLOAD";
const KW_FUNCTION_PAYLOAD_END: &str = "FUNCTION_PAYLOAD_END";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// One decoded runtime-command invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Function {
    /// Command identifier, e.g. `set_job_config`.
    pub name: String,
    /// Correlation token; every result must echo it exactly once.
    pub uid: String,
    /// Positional arguments, order-significant.
    pub args: Vec<String>,
    /// Raw payload bytes (YAML or JSON document for set commands).
    pub payload: Vec<u8>,
    /// Payload content type as announced by the host.
    pub content_type: String,
    /// How long the host is willing to wait for a result.
    pub timeout: Duration,
}

/// Callback invoked for a decoded function. Handlers run on the read
/// loop's task, one at a time.
pub type Handler = Box<dyn Fn(Function) + Send + Sync>;

/// Capability for installing command handlers. The delivery loop that
/// invokes them belongs to whoever drives the input stream.
pub trait FunctionRegistry: Send + Sync {
    fn register(&self, name: &str, handler: Handler);
}

/// String-keyed handler table plus the input read loop.
#[derive(Default)]
pub struct FunctionRouter {
    handlers: Mutex<HashMap<String, Handler>>,
}

impl FunctionRegistry for FunctionRouter {
    fn register(&self, name: &str, handler: Handler) {
        let mut handlers = self.handlers.lock().unwrap_or_else(|e| e.into_inner());
        if handlers.insert(name.to_string(), handler).is_some() {
            tracing::warn!(function = name, "handler replaced");
        }
    }
}

impl FunctionRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read frames from `input` until EOF or shutdown, dispatching each
    /// decoded function to its handler. Unknown names are logged and
    /// dropped; the host times the call out on its side.
    pub async fn run<R>(&self, input: R, mut shutdown: broadcast::Receiver<()>)
    where
        R: AsyncRead + Unpin,
    {
        let mut lines = BufReader::new(input).lines();

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("function router stopping");
                    return;
                }
                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            if let Some(mut fun) = decode_frame_line(&line) {
                                if fun.content_type_pending() {
                                    fun.payload = read_payload(&mut lines).await;
                                }
                                self.dispatch(fun);
                            }
                        }
                        Ok(None) => {
                            tracing::info!("input stream ended");
                            return;
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "input read failed");
                            return;
                        }
                    }
                }
            }
        }
    }

    fn dispatch(&self, fun: Function) {
        // The handler table is never mutated after startup, so holding
        // the lock across the call cannot deadlock with a register.
        let handlers = self.handlers.lock().unwrap_or_else(|e| e.into_inner());
        match handlers.get(&fun.name) {
            Some(handler) => {
                crate::observability::metrics::record_function(&fun.name);
                handler(fun);
            }
            None => tracing::warn!(function = %fun.name, uid = %fun.uid, "no handler registered"),
        }
    }
}

impl Function {
    /// Whether this function was decoded from a FUNCTION_PAYLOAD frame
    /// and still awaits its payload lines.
    fn content_type_pending(&self) -> bool {
        !self.content_type.is_empty() && self.payload.is_empty()
    }
}

/// Decode a FUNCTION or FUNCTION_PAYLOAD header line. Returns `None`
/// for anything else (the stream also carries frames for other
/// subsystems).
fn decode_frame_line(line: &str) -> Option<Function> {
    let tokens = tokenize(line.trim_end_matches(['\n', '\r']));
    let keyword = tokens.first().map(String::as_str)?;
    if keyword != KW_FUNCTION && keyword != KW_FUNCTION_PAYLOAD {
        return None;
    }
    if tokens.len() < 4 {
        tracing::warn!(line, "short function frame");
        return None;
    }

    let uid = tokens[1].clone();
    let timeout = tokens[2]
        .parse::<u64>()
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_TIMEOUT);

    // The command and its arguments travel as one quoted field.
    let mut words = tokens[3].split_whitespace().map(str::to_string);
    let name = match words.next() {
        Some(name) => name,
        None => {
            tracing::warn!(line, "function frame without a command name");
            return None;
        }
    };
    let args: Vec<String> = words.collect();

    let content_type = if keyword == KW_FUNCTION_PAYLOAD {
        tokens.get(4).cloned().unwrap_or_else(|| "application/json".to_string())
    } else {
        String::new()
    };

    Some(Function { name, uid, args, payload: Vec::new(), content_type, timeout })
}

async fn read_payload<R>(lines: &mut tokio::io::Lines<BufReader<R>>) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let mut payload = String::new();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim_end() == KW_FUNCTION_PAYLOAD_END {
                    break;
                }
                if !payload.is_empty() {
                    payload.push('\n');
                }
                payload.push_str(&line);
            }
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "payload read failed");
                break;
            }
        }
    }
    payload.into_bytes()
}

/// Split a frame line into fields, honoring double-quoted grouping.
/// The host does not escape quotes inside quoted fields.
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in line.chars() {
        match c {
            '"' => quoted = !quoted,
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}
