//! SysML language module

use super::framework::LanguageModule;
use crate::encode::encode_str;

pub const LANGUAGE_NAME: &str = "SysML";
pub const BACKGROUND_COLOR: &str = "#e8c2be";

/// Guest routine that prints a value as a host literal
pub const PROBE_FUNCTION: &str = "__sysml_py_repr";

/// Guest prelude, run once per kernel session.
///
/// Branch order matters: `true`/`false` are checked before numbers, and the
/// matrix and data frame branches only exist when those classes are loaded.
pub const INIT_STATEMENTS: &str = r#"require 'set'

def __sysml_py_float(f)
  if f.nan?
    "float('nan')"
  elsif f.infinite?
    f > 0 ? "float('inf')" : "float('-inf')"
  else
    f.inspect
  end
end

def __sysml_py_repr(obj)
  if obj.is_a?(Integer)
    obj.inspect
  elsif obj.is_a?(String)
    obj.inspect
  elsif obj.is_a?(TrueClass)
    "True"
  elsif obj.is_a?(FalseClass)
    "False"
  elsif obj.is_a?(Float)
    __sysml_py_float(obj)
  elsif obj.nil?
    "None"
  elsif obj.is_a?(Set)
    obj.empty? ? "set()" : "{" + obj.map { |x| __sysml_py_repr(x) }.join(",") + "}"
  elsif obj.is_a?(Range)
    "range(" + obj.first.inspect + "," + (obj.exclude_end? ? obj.last : obj.last + 1).inspect + ")"
  elsif obj.is_a?(Array)
    "[" + obj.map { |x| __sysml_py_repr(x) }.join(",") + "]"
  elsif obj.is_a?(Hash)
    "{" + obj.map { |k, v| k.to_s.inspect + ":" + __sysml_py_repr(v) }.join(",") + "}"
  elsif defined?(NMatrix) && obj.is_a?(NMatrix)
    "numpy.matrix(" + __sysml_py_repr(obj.to_a) + ")"
  elsif defined?(Sysml::DataFrame) && obj.is_a?(Sysml::DataFrame)
    "pandas.DataFrame({" + obj.vectors.to_a.map { |c| c.to_s.inspect + ":" + __sysml_py_repr(obj[c].to_a) }.join(",") + "},index=" + __sysml_py_repr(obj.index.to_a) + ")"
  elsif obj.is_a?(Complex)
    "complex(" + __sysml_py_float(obj.real.to_f) + "," + __sysml_py_float(obj.imaginary.to_f) + ")"
  else
    "'Untransferrable variable'"
  end
end
"#;

/// The SysML guest kernel
#[derive(Debug, Default, Clone, Copy)]
pub struct SysmlLanguage;

impl SysmlLanguage {
    pub fn new() -> Self {
        Self
    }

    /// Guest expression that prints `expr` as a host literal
    pub fn probe(expr: &str) -> String {
        format!("print({}({}))", PROBE_FUNCTION, expr)
    }
}

impl LanguageModule for SysmlLanguage {
    fn language_name(&self) -> &str {
        LANGUAGE_NAME
    }

    fn kernel_names(&self) -> &[&str] {
        &["SysML"]
    }

    fn background_color(&self) -> &str {
        BACKGROUND_COLOR
    }

    fn init_statements(&self) -> &str {
        INIT_STATEMENTS
    }

    fn cd_command(&self, dir: &str) -> String {
        format!("Dir.chdir {}", encode_str(dir))
    }

    fn version_statement(&self) -> &str {
        "print SYSML_VERSION"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_description() {
        let sysml = SysmlLanguage::new();
        assert!(sysml.can_handle("SysML"));
        assert!(!sysml.can_handle("sysml"));
        assert_eq!(sysml.background_color(), "#e8c2be");
        assert!(sysml.init_statements().contains("def __sysml_py_repr(obj)"));
    }

    #[test]
    fn test_cd_command_quotes_path() {
        let sysml = SysmlLanguage::new();
        assert_eq!(sysml.cd_command("/tmp/x y"), r#"Dir.chdir "/tmp/x y""#);
        assert_eq!(sysml.cd_command(r"C:\#{x}"), r#"Dir.chdir "C:\\\#{x}""#);
    }

    #[test]
    fn test_probe_expression() {
        assert_eq!(SysmlLanguage::probe("a"), "print(__sysml_py_repr(a))");
    }
}
