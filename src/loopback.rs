//! In-process guest session
//!
//! `LoopbackKernel` stands in for a live SysML kernel. It understands the
//! statements the bridge sends (assignments of encoder output, the prelude,
//! the probe, `local_variables`, `SYSML_VERSION`, `Dir.chdir`) and nothing
//! else. Exact code strings can be scripted to return fixed stdout or to
//! fail.

use crate::adapter::sysml::PROBE_FUNCTION;
use crate::guest::{GuestValue, canonicalize, read};
use crate::kernel::{HostKernel, KernelMessage};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const LOOPBACK_VERSION: &str = "2.0.0-loopback";

#[derive(Debug, Default)]
struct Session {
    locals: Vec<(String, GuestValue)>,
    prelude_loaded: bool,
    cwd: Option<String>,
    scripted: HashMap<String, String>,
    failing: Vec<String>,
    executed: Vec<String>,
    warnings: Vec<String>,
}

impl Session {
    fn assign(&mut self, name: &str, value: GuestValue) {
        match self.locals.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => self.locals.push((name.to_string(), value)),
        }
    }

    fn local(&self, name: &str) -> Option<&GuestValue> {
        self.locals.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// `[:a, :b]`, as `print local_variables` shows it
    fn local_variables(&self) -> String {
        let symbols: Vec<String> = self.locals.iter().map(|(n, _)| format!(":{}", n)).collect();
        format!("[{}]", symbols.join(", "))
    }

    fn execute(&mut self, code: &str) -> std::result::Result<(), String> {
        if code.contains(&format!("def {}(", PROBE_FUNCTION)) {
            self.prelude_loaded = true;
            return Ok(());
        }
        if let Some(dir) = code.strip_prefix("Dir.chdir ") {
            return match read(dir).map_err(|e| e.to_string())? {
                GuestValue::Str(dir) => {
                    self.cwd = Some(dir);
                    Ok(())
                }
                other => Err(format!("no implicit conversion of {} into String", other.class_name())),
            };
        }
        let Some((name, literal)) = code.split_once(" = ") else {
            return Err(format!("unsupported statement: {}", code));
        };
        if !is_local_name(name) {
            return Err(format!("cannot assign to {}", name));
        }
        let value = read(literal).map_err(|e| e.to_string())?;
        self.assign(name, value);
        Ok(())
    }

    /// Output of a statement as (stream name, text)
    fn respond(&self, code: &str) -> (&'static str, String) {
        if let Some(text) = self.scripted.get(code) {
            return ("stdout", text.clone());
        }
        if code == "print local_variables" {
            return ("stdout", self.local_variables());
        }
        if code == "print SYSML_VERSION" {
            return ("stdout", LOOPBACK_VERSION.to_string());
        }
        let probe_prefix = format!("print({}(", PROBE_FUNCTION);
        let Some(expr) = code.strip_prefix(&probe_prefix).and_then(|r| r.strip_suffix("))")) else {
            return ("stderr", format!("NoMethodError: cannot evaluate {}", code));
        };
        if !self.prelude_loaded {
            return ("stderr", format!("NameError: undefined method `{}'", PROBE_FUNCTION));
        }
        match self.local(expr.trim()) {
            Some(value) => ("stdout", canonicalize(value)),
            None => ("stderr", format!("NameError: undefined local variable or method `{}'", expr)),
        }
    }
}

fn is_local_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A guest kernel living in this process
#[derive(Debug, Default)]
pub struct LoopbackKernel {
    session: Mutex<Session>,
}

impl LoopbackKernel {
    /// A session without the prelude, as a freshly started kernel
    pub fn new() -> Self {
        Self::default()
    }

    /// A session with the prelude already loaded
    pub fn initialized() -> Self {
        let kernel = Self::new();
        kernel.session().prelude_loaded = true;
        kernel
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set a guest variable directly
    pub fn define(&self, name: &str, value: GuestValue) {
        self.session().assign(name, value);
    }

    pub fn local(&self, name: &str) -> Option<GuestValue> {
        self.session().local(name).cloned()
    }

    pub fn locals(&self) -> Vec<(String, GuestValue)> {
        self.session().locals.clone()
    }

    /// Answer `code` with `stdout` instead of evaluating it
    pub fn script(&self, code: &str, stdout: &str) {
        self.session().scripted.insert(code.to_string(), stdout.to_string());
    }

    /// Make `code` fail when run as a cell
    pub fn fail_on(&self, code: &str) {
        self.session().failing.push(code.to_string());
    }

    pub fn prelude_loaded(&self) -> bool {
        self.session().prelude_loaded
    }

    pub fn cwd(&self) -> Option<String> {
        self.session().cwd.clone()
    }

    /// Every statement received, in order
    pub fn executed(&self) -> Vec<String> {
        self.session().executed.clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.session().warnings.clone()
    }
}

#[async_trait]
impl HostKernel for LoopbackKernel {
    async fn run_cell(
        &self,
        code: &str,
        _silent: bool,
        _store_history: bool,
        on_error: Option<&str>,
    ) -> Result<()> {
        let mut session = self.session();
        session.executed.push(code.to_string());

        let outcome = if session.failing.iter().any(|c| c == code) {
            Err("execution failed".to_string())
        } else {
            session.execute(code)
        };

        outcome.map_err(|reason| {
            let message = match on_error {
                Some(on_error) => format!("{}: {}", on_error, reason),
                None => reason,
            };
            session.warnings.push(message.clone());
            Error::GuestExecution(message)
        })
    }

    fn get_response(
        &self,
        code: &str,
        msg_types: &[&str],
        names: &[&str],
    ) -> Result<Vec<KernelMessage>> {
        let mut session = self.session();
        session.executed.push(code.to_string());
        let (stream, text) = session.respond(code);

        let message = KernelMessage::stream(stream, text);
        let wanted = msg_types.contains(&message.msg_type.as_str())
            && (names.is_empty() || names.contains(&stream));
        Ok(if wanted { vec![message] } else { Vec::new() })
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{}", message);
        self.session().warnings.push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::captured_stdout;

    fn stdout(kernel: &LoopbackKernel, code: &str) -> String {
        captured_stdout(&kernel.get_response(code, &["stream"], &["stdout"]).unwrap())
    }

    #[tokio::test]
    async fn test_assignment_reads_encoder_output() {
        let kernel = LoopbackKernel::new();
        kernel.run_cell("m = N[[1,2],[3,4]]", true, false, None).await.unwrap();
        kernel.run_cell("m = Set[1]", true, false, None).await.unwrap();

        assert_eq!(kernel.local("m"), Some(GuestValue::Set(vec![GuestValue::Integer(1)])));
        assert_eq!(kernel.locals().len(), 1);
    }

    #[tokio::test]
    async fn test_bad_statement_reports_on_error() {
        let kernel = LoopbackKernel::new();
        let err = kernel
            .run_cell("x = `ls`", true, false, Some("Failed to put variable x to SysML"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::GuestExecution(ref m) if m.starts_with("Failed to put variable x")));
        assert_eq!(kernel.warnings().len(), 1);
        assert!(kernel.run_cell("Foo = 1", true, false, None).await.is_err());
    }

    #[tokio::test]
    async fn test_prelude_enables_probe() {
        let kernel = LoopbackKernel::new();
        kernel.define("a", GuestValue::Bool(true));
        assert_eq!(stdout(&kernel, "print(__sysml_py_repr(a))"), "");

        kernel
            .run_cell(crate::adapter::sysml::INIT_STATEMENTS, true, false, None)
            .await
            .unwrap();
        assert!(kernel.prelude_loaded());
        assert_eq!(stdout(&kernel, "print(__sysml_py_repr(a))"), "True");
    }

    #[test]
    fn test_local_variables_listing() {
        let kernel = LoopbackKernel::initialized();
        assert_eq!(stdout(&kernel, "print local_variables"), "[]");
        kernel.define("a", GuestValue::Nil);
        kernel.define("sos_b", GuestValue::Nil);
        assert_eq!(stdout(&kernel, "print local_variables"), "[:a, :sos_b]");
    }

    #[test]
    fn test_scripted_output_and_filters() {
        let kernel = LoopbackKernel::initialized();
        kernel.script("print 1", "1");
        assert_eq!(stdout(&kernel, "print 1"), "1");
        assert!(kernel.get_response("print 1", &["display_data"], &[]).unwrap().is_empty());
        assert_eq!(kernel.executed(), vec!["print 1", "print 1"]);
    }
}
