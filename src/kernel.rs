//! Collaborator interfaces: the notebook host and its namespace

use crate::Result;
use crate::value::HostValue;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};

/// One IOPub message captured from the guest kernel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelMessage {
    pub msg_type: String,
    pub content: Value,
}

impl KernelMessage {
    /// A `stream` message on `name` (`stdout` or `stderr`)
    pub fn stream(name: &str, text: impl Into<String>) -> Self {
        Self {
            msg_type: "stream".to_string(),
            content: json!({ "name": name, "text": text.into() }),
        }
    }

    /// Text of a stream message
    pub fn text(&self) -> Option<&str> {
        if self.msg_type != "stream" {
            return None;
        }
        self.content.get("text").and_then(Value::as_str)
    }

    pub fn is_stdout(&self) -> bool {
        self.msg_type == "stream"
            && self.content.get("name").and_then(Value::as_str) == Some("stdout")
    }
}

/// Concatenated stdout of a response
pub fn captured_stdout(messages: &[KernelMessage]) -> String {
    messages
        .iter()
        .filter(|m| m.is_stdout())
        .filter_map(KernelMessage::text)
        .collect()
}

/// The notebook host's handle on the running guest kernel.
///
/// Requests are strictly sequential; callers never issue a second request
/// before the first completes.
#[async_trait]
pub trait HostKernel: Send + Sync {
    /// Execute guest source. `on_error` is the message the host shows if
    /// execution fails.
    async fn run_cell(
        &self,
        code: &str,
        silent: bool,
        store_history: bool,
        on_error: Option<&str>,
    ) -> Result<()>;

    /// Execute guest source and return the messages of the listed types
    fn get_response(
        &self,
        code: &str,
        msg_types: &[&str],
        names: &[&str],
    ) -> Result<Vec<KernelMessage>>;

    /// Surface a warning to the notebook user
    fn warn(&self, message: &str);
}

/// The host's variable namespace
pub trait HostNamespace {
    fn lookup(&self, name: &str) -> Option<&HostValue>;
    fn store(&mut self, name: &str, value: HostValue);
}

impl HostNamespace for HashMap<String, HostValue> {
    fn lookup(&self, name: &str) -> Option<&HostValue> {
        self.get(name)
    }

    fn store(&mut self, name: &str, value: HostValue) {
        self.insert(name.to_string(), value);
    }
}

impl HostNamespace for BTreeMap<String, HostValue> {
    fn lookup(&self, name: &str) -> Option<&HostValue> {
        self.get(name)
    }

    fn store(&mut self, name: &str, value: HostValue) {
        self.insert(name.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_captured_stdout_skips_other_streams() {
        let messages = vec![
            KernelMessage::stream("stdout", "[1,"),
            KernelMessage::stream("stderr", "warning: x"),
            KernelMessage {
                msg_type: "display_data".to_string(),
                content: json!({ "data": {} }),
            },
            KernelMessage::stream("stdout", "2]"),
        ];
        assert_eq!(captured_stdout(&messages), "[1,2]");
        assert_eq!(messages[1].text(), Some("warning: x"));
        assert_eq!(messages[2].text(), None);
    }

    #[test]
    fn test_namespaces() {
        let mut ns: HashMap<String, HostValue> = HashMap::new();
        ns.store("a", HostValue::Int(1));
        assert_eq!(ns.lookup("a"), Some(&HostValue::Int(1)));

        let mut ordered: BTreeMap<String, HostValue> = BTreeMap::new();
        ordered.store("b", HostValue::None);
        assert!(ordered.lookup("a").is_none());
        assert_eq!(ordered.lookup("b"), Some(&HostValue::None));
    }
}
