//! Language module framework
//!
//! Describes what the notebook host needs to know about a guest language
//! before any value moves: which kernels it claims, how the kernel is
//! prepared, and how it is presented.

/// Static description of a guest language
pub trait LanguageModule: Send + Sync {
    /// Display name (`%use <name>`)
    fn language_name(&self) -> &str;

    /// Kernel spec names this module can drive
    fn kernel_names(&self) -> &[&str];

    /// Cell background color in the notebook UI
    fn background_color(&self) -> &str;

    /// Source run in a freshly started guest kernel
    fn init_statements(&self) -> &str;

    /// Guest statement that changes the working directory
    fn cd_command(&self, dir: &str) -> String;

    /// Guest statement that prints the language version
    fn version_statement(&self) -> &str;

    /// Check if this module drives the named kernel
    fn can_handle(&self, kernel: &str) -> bool {
        self.kernel_names().contains(&kernel)
    }
}

/// Registry of language modules
#[derive(Default)]
pub struct LanguageRegistry {
    modules: Vec<Box<dyn LanguageModule>>,
}

impl LanguageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, module: impl LanguageModule + 'static) {
        self.modules.push(Box::new(module));
    }

    /// Find the module for a kernel spec name
    pub fn find_for_kernel(&self, kernel: &str) -> Option<&dyn LanguageModule> {
        self.modules
            .iter()
            .find(|m| m.can_handle(kernel))
            .map(|m| m.as_ref())
    }

    /// Find a module by its language name, ignoring case
    pub fn find_by_name(&self, name: &str) -> Option<&dyn LanguageModule> {
        self.modules
            .iter()
            .find(|m| m.language_name().eq_ignore_ascii_case(name))
            .map(|m| m.as_ref())
    }

    pub fn modules(&self) -> &[Box<dyn LanguageModule>] {
        &self.modules
    }
}

/// Registry with every built-in language module
pub fn default_registry() -> LanguageRegistry {
    let mut registry = LanguageRegistry::new();
    registry.register(super::sysml::SysmlLanguage::new());
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestLanguage;

    impl LanguageModule for TestLanguage {
        fn language_name(&self) -> &str { "Test" }
        fn kernel_names(&self) -> &[&str] { &["test", "test3"] }
        fn background_color(&self) -> &str { "#ffffff" }
        fn init_statements(&self) -> &str { "" }
        fn cd_command(&self, dir: &str) -> String { format!("cd {dir}") }
        fn version_statement(&self) -> &str { "version" }
    }

    #[test]
    fn test_registry() {
        let mut registry = LanguageRegistry::new();
        registry.register(TestLanguage);

        assert!(registry.find_for_kernel("test3").is_some());
        assert!(registry.find_for_kernel("python3").is_none());
        assert!(registry.find_by_name("test").is_some());
    }

    #[test]
    fn test_default_registry_knows_sysml() {
        let registry = default_registry();
        let module = registry.find_for_kernel("SysML").unwrap();
        assert_eq!(module.language_name(), "SysML");
        assert_eq!(registry.modules().len(), 1);
    }
}
