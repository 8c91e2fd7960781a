//! Pull (`%get`) and Push (`%put`) orchestration
//!
//! Every request to the host kernel is awaited before the next one is sent.
//! Pull is not atomic: assignments made before a failure stay in the guest.
//! Push is: one bad value and the caller gets nothing.

use crate::adapter::framework::LanguageModule;
use crate::adapter::sysml::{LANGUAGE_NAME, SysmlLanguage};
use crate::config::BridgeConfig;
use crate::encode::{encode, rule_name};
use crate::kernel::{HostKernel, HostNamespace, captured_stdout};
use crate::literal::decode;
use crate::value::HostValue;
use crate::{Error, Result};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

const LOCAL_VARIABLES: &str = "print local_variables";

/// Symbols in the guest's `local_variables` listing
static SYMBOL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":([A-Za-z_][A-Za-z0-9_]*)").expect("symbol pattern compiles"));

/// Values received from the guest, in transfer order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transfer {
    entries: Vec<(String, HostValue)>,
}

impl Transfer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; a replaced name keeps its position
    pub fn insert(&mut self, name: impl Into<String>, value: HostValue) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&HostValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HostValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Store every value in the host namespace
    pub fn apply_to(self, ns: &mut impl HostNamespace) {
        for (name, value) in self.entries {
            ns.store(&name, value);
        }
    }
}

/// Moves variables between the host namespace and a SysML kernel
pub struct SysmlBridge<K: HostKernel> {
    kernel: K,
    config: BridgeConfig,
    language: SysmlLanguage,
}

impl<K: HostKernel> SysmlBridge<K> {
    pub fn new(kernel: K) -> Self {
        Self::with_config(kernel, BridgeConfig::default())
    }

    pub fn with_config(kernel: K, config: BridgeConfig) -> Self {
        Self {
            kernel,
            config,
            language: SysmlLanguage::new(),
        }
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Load the guest prelude into a fresh kernel
    pub async fn initialize(&self) -> Result<()> {
        debug!(kernel = %self.config.kernel_name, "loading guest prelude");
        self.kernel
            .run_cell(
                self.language.init_statements(),
                true,
                false,
                Some("Failed to initialize SysML kernel"),
            )
            .await
    }

    /// Change the guest's working directory
    pub async fn change_directory(&self, dir: &str) -> Result<()> {
        let command = self.language.cd_command(dir);
        self.kernel
            .run_cell(&command, true, false, Some(&format!("Failed to change directory to {dir}")))
            .await
    }

    /// Pull: assign host variables in the guest, one at a time in `names` order.
    ///
    /// With `as_var` every value is assigned to that one guest name.
    pub async fn get_vars(
        &self,
        ns: &impl HostNamespace,
        names: &[&str],
        as_var: Option<&str>,
    ) -> Result<()> {
        for &name in names {
            let value = ns
                .lookup(name)
                .ok_or_else(|| Error::UndefinedVariable(name.to_string()))?;
            let target = as_var.unwrap_or(name);
            let literal = encode(value);
            if rule_name(value) == "unsupported" {
                warn!(variable = %name, type_name = value.type_name(), "sending unsupported value as a diagnostic string");
            }
            debug!(variable = %name, guest_name = %target, bytes = literal.len(), "pull");

            let on_error = format!("Failed to put variable {} to {}", name, LANGUAGE_NAME);
            self.kernel
                .run_cell(&format!("{} = {}", target, literal), true, false, Some(&on_error))
                .await?;
        }
        Ok(())
    }

    /// Push: read guest variables back into host values.
    ///
    /// Guest variables carrying the auxiliary prefix are added to `items`.
    /// Returns `None` if any value cannot be captured or decoded.
    pub fn put_vars(&self, items: &[&str], as_var: Option<&str>) -> Option<Transfer> {
        let mut names: Vec<String> = items.iter().map(|s| s.to_string()).collect();
        if self.config.discover_auxiliary {
            for aux in self.auxiliary_variables() {
                if !names.contains(&aux) {
                    names.push(aux);
                }
            }
        }

        let mut transfer = Transfer::new();
        for name in &names {
            let probe = SysmlLanguage::probe(name);
            let expr = match self.kernel.get_response(&probe, &["stream"], &["stdout"]) {
                Ok(messages) => captured_stdout(&messages),
                Err(e) => {
                    self.kernel.warn(&format!("Failed to evaluate {:?}: {}", probe, e));
                    return None;
                }
            };
            if self.config.echo_probe_output {
                self.kernel.warn(&format!("{:?}", expr));
            }
            debug!(variable = %name, expr = %expr.trim_end(), "push");

            match decode(&expr) {
                Ok(value) => transfer.insert(as_var.unwrap_or(name.as_str()), value),
                Err(e) => {
                    warn!(variable = %name, error = %e, "push aborted");
                    self.kernel.warn(&format!("Failed to evaluate {:?}: {}", expr, e));
                    return None;
                }
            }
        }
        Some(transfer)
    }

    /// Guest locals whose names start with the auxiliary prefix.
    /// Any failure here means there are none.
    fn auxiliary_variables(&self) -> Vec<String> {
        let text = match self.kernel.get_response(LOCAL_VARIABLES, &["stream"], &["stdout"]) {
            Ok(messages) => captured_stdout(&messages),
            Err(e) => {
                debug!(error = %e, "auxiliary discovery skipped");
                return Vec::new();
            }
        };
        SYMBOL
            .captures_iter(&text)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str())
            .filter(|name| name.starts_with(&self.config.auxiliary_prefix))
            .map(str::to_string)
            .collect()
    }

    /// Guest language version, as the guest prints it
    pub fn session_info(&self) -> Result<String> {
        let messages = self
            .kernel
            .get_response(self.language.version_statement(), &["stream"], &["stdout"])?;
        let version = captured_stdout(&messages);
        if version.trim().is_empty() {
            return Err(Error::Kernel("no version reported by guest".to_string()));
        }
        Ok(version.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guest::GuestValue;
    use crate::loopback::LoopbackKernel;
    use std::collections::HashMap;

    fn namespace(pairs: &[(&str, HostValue)]) -> HashMap<String, HostValue> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[tokio::test]
    async fn test_pull_assigns_in_order() {
        let bridge = SysmlBridge::new(LoopbackKernel::initialized());
        let ns = namespace(&[
            ("b", HostValue::Int(2)),
            ("a", HostValue::str("x")),
        ]);

        bridge.get_vars(&ns, &["b", "a"], None).await.unwrap();

        let executed = bridge.kernel().executed();
        assert_eq!(executed, vec!["b = 2".to_string(), "a = \"x\"".to_string()]);
        assert_eq!(bridge.kernel().local("a"), Some(GuestValue::Str("x".to_string())));
    }

    #[tokio::test]
    async fn test_pull_missing_variable_keeps_earlier_assignments() {
        let bridge = SysmlBridge::new(LoopbackKernel::initialized());
        let ns = namespace(&[("a", HostValue::Int(1)), ("c", HostValue::Int(3))]);

        let err = bridge.get_vars(&ns, &["a", "missing", "c"], None).await.unwrap_err();
        assert!(matches!(err, Error::UndefinedVariable(ref n) if n == "missing"));
        assert_eq!(bridge.kernel().local("a"), Some(GuestValue::Integer(1)));
        assert_eq!(bridge.kernel().local("c"), None);
    }

    #[tokio::test]
    async fn test_pull_guest_failure_aborts_batch() {
        let kernel = LoopbackKernel::initialized();
        kernel.fail_on("b = 2");
        let bridge = SysmlBridge::new(kernel);
        let ns = namespace(&[
            ("a", HostValue::Int(1)),
            ("b", HostValue::Int(2)),
            ("c", HostValue::Int(3)),
        ]);

        let err = bridge.get_vars(&ns, &["a", "b", "c"], None).await.unwrap_err();
        assert!(err.to_string().contains("Failed to put variable b to SysML"));
        assert_eq!(bridge.kernel().local("a"), Some(GuestValue::Integer(1)));
        assert_eq!(bridge.kernel().local("c"), None);
    }

    #[tokio::test]
    async fn test_pull_as_var_targets_one_name() {
        let bridge = SysmlBridge::new(LoopbackKernel::initialized());
        let ns = namespace(&[("a", HostValue::Int(1)), ("b", HostValue::Int(2))]);

        bridge.get_vars(&ns, &["a", "b"], Some("z")).await.unwrap();
        assert_eq!(bridge.kernel().local("z"), Some(GuestValue::Integer(2)));
        assert_eq!(bridge.kernel().local("a"), None);
    }

    #[tokio::test]
    async fn test_round_trip_through_guest() {
        let bridge = SysmlBridge::new(LoopbackKernel::initialized());
        let nested = HostValue::dict([
            ("a", HostValue::dict([("b", HostValue::Int(123))])),
            ("c", HostValue::Bool(true)),
        ]);
        let ns = namespace(&[
            ("null_var", HostValue::None),
            ("num_var", HostValue::Int(123)),
            ("char_var", HostValue::str("1\"23")),
            ("comp_var", HostValue::Complex { re: 1.0, im: 2.0 }),
            ("nested", nested.clone()),
        ]);
        let names = ["null_var", "num_var", "char_var", "comp_var", "nested"];

        bridge.get_vars(&ns, &names, None).await.unwrap();
        let transfer = bridge.put_vars(&names, None).unwrap();

        assert_eq!(transfer.names(), names.to_vec());
        for name in names {
            assert_eq!(transfer.get(name), ns.get(name), "variable {name}");
        }
    }

    #[test]
    fn test_push_discovers_auxiliary_variables() {
        let kernel = LoopbackKernel::initialized();
        kernel.define("x", GuestValue::Integer(1));
        kernel.define("sos_extra", GuestValue::Str("aux".to_string()));
        kernel.define("other", GuestValue::Nil);
        let bridge = SysmlBridge::new(kernel);

        let transfer = bridge.put_vars(&["x"], None).unwrap();
        assert_eq!(transfer.names(), vec!["x", "sos_extra"]);
        assert_eq!(transfer.get("sos_extra"), Some(&HostValue::str("aux")));
        assert!(transfer.get("other").is_none());
        assert!(bridge.kernel().executed().iter().any(|c| c == LOCAL_VARIABLES));
    }

    #[test]
    fn test_push_skips_requested_auxiliary_variables() {
        let kernel = LoopbackKernel::initialized();
        kernel.define("x", GuestValue::Integer(1));
        kernel.define("sos_extra", GuestValue::Integer(2));
        let bridge = SysmlBridge::new(kernel);

        let transfer = bridge.put_vars(&["sos_extra", "x"], None).unwrap();
        assert_eq!(transfer.names(), vec!["sos_extra", "x"]);
        let reads = bridge
            .kernel()
            .executed()
            .iter()
            .filter(|c| c.contains("__sysml_py_repr(sos_extra)"))
            .count();
        assert_eq!(reads, 1);
    }

    #[test]
    fn test_symbol_listing() {
        let names: Vec<&str> = SYMBOL
            .captures_iter("[:a, :sos_a, :_b2]")
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str())
            .collect();
        assert_eq!(names, vec!["a", "sos_a", "_b2"]);
    }

    #[test]
    fn test_echo_goes_to_host_warnings() {
        let kernel = LoopbackKernel::initialized();
        kernel.define("a", GuestValue::Integer(7));
        let config = BridgeConfig {
            echo_probe_output: true,
            discover_auxiliary: false,
            ..BridgeConfig::default()
        };
        let bridge = SysmlBridge::with_config(kernel, config);
        bridge.put_vars(&["a"], None).unwrap();
        assert_eq!(bridge.kernel().warnings(), vec!["\"7\"".to_string()]);

        let quiet = SysmlBridge::new(LoopbackKernel::initialized());
        quiet.kernel().define("a", GuestValue::Integer(7));
        quiet.put_vars(&["a"], None).unwrap();
        assert!(quiet.kernel().warnings().is_empty());
    }

    #[test]
    fn test_push_without_discovery() {
        let kernel = LoopbackKernel::initialized();
        kernel.define("sos_extra", GuestValue::Integer(5));
        let config = BridgeConfig { discover_auxiliary: false, ..BridgeConfig::default() };
        let bridge = SysmlBridge::with_config(kernel, config);

        let transfer = bridge.put_vars(&[], None).unwrap();
        assert!(transfer.is_empty());
        assert!(!bridge.kernel().executed().iter().any(|c| c == LOCAL_VARIABLES));
    }

    #[test]
    fn test_push_is_atomic() {
        let kernel = LoopbackKernel::initialized();
        kernel.define("a", GuestValue::Integer(1));
        kernel.define("b", GuestValue::Integer(2));
        kernel.script("print(__sysml_py_repr(b))", "not a literal(");
        let bridge = SysmlBridge::new(kernel);

        assert!(bridge.put_vars(&["a", "b"], None).is_none());
        let warnings = bridge.kernel().warnings();
        assert!(warnings.iter().any(|w| w.starts_with("Failed to evaluate \"not a literal(\"")));
    }

    #[test]
    fn test_push_undefined_variable_fails() {
        let bridge = SysmlBridge::new(LoopbackKernel::initialized());
        assert!(bridge.put_vars(&["nope"], None).is_none());
    }

    #[test]
    fn test_push_untransferrable_is_a_string() {
        let kernel = LoopbackKernel::initialized();
        kernel.define("p", GuestValue::Object("Proc".to_string()));
        let bridge = SysmlBridge::new(kernel);

        let transfer = bridge.put_vars(&["p"], Some("q")).unwrap();
        assert_eq!(transfer.get("q"), Some(&HostValue::str("Untransferrable variable")));
    }

    #[test]
    fn test_push_without_prelude_fails() {
        let kernel = LoopbackKernel::new();
        kernel.define("a", GuestValue::Integer(1));
        let bridge = SysmlBridge::new(kernel);
        assert!(bridge.put_vars(&["a"], None).is_none());
    }

    #[tokio::test]
    async fn test_initialize_loads_prelude() {
        let kernel = LoopbackKernel::new();
        kernel.define("a", GuestValue::Float(f64::NAN));
        let bridge = SysmlBridge::new(kernel);

        bridge.initialize().await.unwrap();
        let transfer = bridge.put_vars(&["a"], None).unwrap();
        assert!(matches!(transfer.get("a"), Some(HostValue::Float(f)) if f.is_nan()));
    }

    #[tokio::test]
    async fn test_change_directory() {
        let bridge = SysmlBridge::new(LoopbackKernel::initialized());
        bridge.change_directory("/tmp/my dir").await.unwrap();
        assert_eq!(bridge.kernel().cwd(), Some("/tmp/my dir".to_string()));
    }

    #[test]
    fn test_session_info() {
        let bridge = SysmlBridge::new(LoopbackKernel::initialized());
        assert_eq!(bridge.session_info().unwrap(), crate::loopback::LOOPBACK_VERSION);
    }

    #[test]
    fn test_transfer_apply() {
        let mut transfer = Transfer::new();
        transfer.insert("a", HostValue::Int(1));
        transfer.insert("b", HostValue::Int(2));
        transfer.insert("a", HostValue::Int(3));
        assert_eq!(transfer.names(), vec!["a", "b"]);

        let mut ns: HashMap<String, HostValue> = HashMap::new();
        transfer.apply_to(&mut ns);
        assert_eq!(ns.get("a"), Some(&HostValue::Int(3)));
    }
}
