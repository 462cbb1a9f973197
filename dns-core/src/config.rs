//! Process-wide server configuration.  Built once in `main` and passed
//! explicitly to whatever needs it, rather than read out of
//! module-scope global state (see DESIGN.md's note on testability).

/// Which preset a server was started with.  Selects the TTL/port/verbosity
/// defaults before any CLI override is applied.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RunMode {
    Dev,
    Production,
}

impl RunMode {
    fn preset(self) -> (u32, u16, bool) {
        match self {
            // (default_ttl, port, verbose)
            RunMode::Dev => (30, 8053, true),
            RunMode::Production => (3600, 53, false),
        }
    }
}

/// Immutable, process-wide configuration.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ServerConfig {
    pub mode: RunMode,
    pub default_ttl: u32,
    pub port: u16,
    pub verbose: bool,
}

impl ServerConfig {
    /// Build a config from a mode preset, with optional overrides applied
    /// on top.
    #[must_use]
    pub fn new(
        mode: RunMode,
        port: Option<u16>,
        ttl: Option<u32>,
        verbose: Option<bool>,
    ) -> Self {
        let (preset_ttl, preset_port, preset_verbose) = mode.preset();

        Self {
            mode,
            default_ttl: ttl.unwrap_or(preset_ttl),
            port: port.unwrap_or(preset_port),
            verbose: verbose.unwrap_or(preset_verbose),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dev_preset_has_no_overrides() {
        let cfg = ServerConfig::new(RunMode::Dev, None, None, None);
        assert_eq!(30, cfg.default_ttl);
        assert_eq!(8053, cfg.port);
        assert!(cfg.verbose);
    }

    #[test]
    fn production_preset_has_no_overrides() {
        let cfg = ServerConfig::new(RunMode::Production, None, None, None);
        assert_eq!(3600, cfg.default_ttl);
        assert_eq!(53, cfg.port);
        assert!(!cfg.verbose);
    }

    #[test]
    fn explicit_overrides_win() {
        let cfg = ServerConfig::new(RunMode::Production, Some(5353), Some(60), Some(true));
        assert_eq!(60, cfg.default_ttl);
        assert_eq!(5353, cfg.port);
        assert!(cfg.verbose);
    }
}
