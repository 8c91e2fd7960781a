use std::sync::OnceLock;

static QUIET: OnceLock<bool> = OnceLock::new();

/// `SOS_SYSML_QUIET=1` silences informational output; errors and results still print
pub fn is_quiet() -> bool {
    *QUIET.get_or_init(|| quiet_from(std::env::var("SOS_SYSML_QUIET").ok().as_deref()))
}

fn quiet_from(value: Option<&str>) -> bool {
    value
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// How the CLI reports results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn from_flag(json: bool) -> Self {
        if json { Self::Json } else { Self::Human }
    }

    pub fn is_json(self) -> bool {
        self == Self::Json
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_values() {
        assert!(quiet_from(Some("1")));
        assert!(quiet_from(Some("TRUE")));
        assert!(!quiet_from(Some("0")));
        assert!(!quiet_from(None));
    }

    #[test]
    fn test_output_format() {
        assert!(OutputFormat::from_flag(true).is_json());
        assert_eq!(OutputFormat::from_flag(false), OutputFormat::Human);
    }
}
