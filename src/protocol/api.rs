//! Outbound host API: configuration objects and function results.

use std::fmt;
use std::io::{self, Write};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// How long a function result stays valid for the host's cache.
const RESULT_TTL: Duration = Duration::from_secs(2);

/// Commands the host may offer on a registered job config object.
const JOB_COMMANDS: &str = "schema get update delete";

/// Commands the host may offer on a registered module template.
const MODULE_COMMANDS: &str = "add schema";

/// Origin class of a registered job, as reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobType {
    /// Shipped with the agent or discovered from static files.
    Stock,
    /// Created at runtime through the dynamic configuration channel.
    Dyncfg,
}

impl JobType {
    pub fn as_str(self) -> &'static str {
        match self {
            JobType::Stock => "stock",
            JobType::Dyncfg => "dyncfg",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a job as reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Accepted,
    Running,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Accepted => "accepted",
            JobStatus::Running => "running",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability handle to the host process.
///
/// All methods return only transport-level errors; business failures
/// go through the reject path instead.
pub trait HostApi: Send + Sync {
    /// Enable the dynamic configuration subsystem at the host.
    fn enable_dyncfg(&self) -> io::Result<()>;

    /// Drop all dyncfg state the host may hold from a previous run.
    fn reset(&self) -> io::Result<()>;

    /// Register a collector module so the host can offer config UI/CLI
    /// for it.
    fn register_module(&self, module: &str) -> io::Result<()>;

    /// Register one job config object under a module.
    fn register_job(&self, module: &str, job: &str, job_type: JobType) -> io::Result<()>;

    /// Remove a previously registered job config object.
    fn remove_job(&self, module: &str, job: &str) -> io::Result<()>;

    /// Report a job's lifecycle status. The reason payload is for the
    /// host's logs only and does not travel on the wire.
    fn report_job_status(
        &self,
        module: &str,
        job: &str,
        status: JobStatus,
        reason: &str,
    ) -> io::Result<()>;

    /// Send a successful function result correlated by `uid`.
    fn function_result_success(
        &self,
        uid: &str,
        content_type: &str,
        payload: &str,
    ) -> io::Result<()>;

    /// Send a reject result correlated by `uid`. The payload must be a
    /// single-line JSON error envelope; see [`error_payload`].
    fn function_result_reject(
        &self,
        uid: &str,
        content_type: &str,
        payload: &str,
    ) -> io::Result<()>;
}

/// Build the single-line JSON error envelope carried by reject
/// results. Embedded newlines would corrupt the line framing, so they
/// are stripped from the message before encoding.
pub fn error_payload(message: &str) -> String {
    let sanitized: String =
        message.chars().map(|c| if c == '\n' || c == '\r' { ' ' } else { c }).collect();
    serde_json::json!({ "error": sanitized }).to_string()
}

/// Line-protocol implementation of [`HostApi`] over any writer.
///
/// Writes are serialized by an internal mutex so frames from
/// concurrent tasks never interleave.
pub struct LineApi<W: Write + Send> {
    plugin: String,
    out: Mutex<W>,
}

impl LineApi<io::Stdout> {
    /// The standard production wiring: frames go to stdout, where the
    /// host process reads them.
    pub fn stdout(plugin: &str) -> Self {
        Self::new(plugin, io::stdout())
    }
}

impl<W: Write + Send> LineApi<W> {
    pub fn new(plugin: &str, out: W) -> Self {
        Self { plugin: plugin.to_string(), out: Mutex::new(out) }
    }

    /// Consume the API and hand back the writer. Test helper.
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|e| e.into_inner())
    }

    fn module_id(&self, module: &str) -> String {
        format!("{}:collector:{}", self.plugin, module)
    }

    fn job_id(&self, module: &str, job: &str) -> String {
        format!("{}:collector:{}:{}", self.plugin, module, job)
    }

    fn send(&self, frame: &str) -> io::Result<()> {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        out.write_all(frame.as_bytes())?;
        out.flush()
    }

    fn function_result(
        &self,
        uid: &str,
        code: u16,
        content_type: &str,
        payload: &str,
    ) -> io::Result<()> {
        let expire = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .saturating_add(RESULT_TTL)
            .as_secs();
        self.send(&format_function_result(uid, code, content_type, expire, payload))
    }
}

/// Render a function result frame. The payload line is omitted
/// entirely when empty, not emitted as a blank line.
fn format_function_result(
    uid: &str,
    code: u16,
    content_type: &str,
    expire: u64,
    payload: &str,
) -> String {
    let mut frame = format!("FUNCTION_RESULT_BEGIN {uid} {code} {content_type} {expire}\n");
    if !payload.is_empty() {
        frame.push_str(payload);
        frame.push('\n');
    }
    frame.push_str("FUNCTION_RESULT_END\n\n");
    frame
}

impl<W: Write + Send> HostApi for LineApi<W> {
    fn enable_dyncfg(&self) -> io::Result<()> {
        self.send(&format!("DYNCFG_ENABLE {}\n\n", self.plugin))
    }

    fn reset(&self) -> io::Result<()> {
        self.send("DYNCFG_RESET\n\n")
    }

    fn register_module(&self, module: &str) -> io::Result<()> {
        self.send(&format!(
            "CONFIG {id} create accepted template /collectors/jobs internal 'type=internal,module={module}' '{MODULE_COMMANDS}' 0x0000 0x0000\n\n",
            id = self.module_id(module),
        ))
    }

    fn register_job(&self, module: &str, job: &str, job_type: JobType) -> io::Result<()> {
        self.send(&format!(
            "CONFIG {id} create accepted job /collectors/jobs {job_type} 'type={job_type},module={module},job={job}' '{JOB_COMMANDS}' 0x0000 0x0000\n\n",
            id = self.job_id(module, job),
        ))
    }

    fn remove_job(&self, module: &str, job: &str) -> io::Result<()> {
        self.send(&format!("CONFIG {id} delete\n\n", id = self.job_id(module, job)))
    }

    fn report_job_status(
        &self,
        module: &str,
        job: &str,
        status: JobStatus,
        reason: &str,
    ) -> io::Result<()> {
        if !reason.is_empty() {
            tracing::debug!(module, job, %status, reason, "job status reason");
        }
        self.send(&format!("CONFIG {id} status {status}\n\n", id = self.job_id(module, job)))
    }

    fn function_result_success(
        &self,
        uid: &str,
        content_type: &str,
        payload: &str,
    ) -> io::Result<()> {
        self.function_result(uid, 200, content_type, payload)
    }

    fn function_result_reject(
        &self,
        uid: &str,
        content_type: &str,
        payload: &str,
    ) -> io::Result<()> {
        self.function_result(uid, 400, content_type, payload)
    }
}
