//! Language modules
//!
//! A language module tells the notebook host how to prepare and present a
//! guest kernel. Value transfer itself lives in `encode`, `literal` and
//! `bridge`.

pub mod framework;
pub mod sysml;

pub use framework::{LanguageModule, LanguageRegistry, default_registry};
pub use sysml::SysmlLanguage;
