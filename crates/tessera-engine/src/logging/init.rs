use std::sync::Once;

/// Crates whose `info` output drowns the engine's; capped at `warn` unless
/// the filter names them.
const NOISY: [&str; 4] = ["wgpu_core", "wgpu_hal", "naga", "winit"];

/// Logger configuration.
///
/// `env_filter` uses the `env_logger` filter syntax, e.g.
/// `"info,tessera_engine::gfx=trace"`. When unset, `RUST_LOG` is used, and
/// without that `default_level`.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub default_level: log::LevelFilter,
    pub write_style: env_logger::WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            default_level: log::LevelFilter::Info,
            write_style: env_logger::WriteStyle::Auto,
        }
    }
}

impl LoggingConfig {
    /// The filter string handed to `env_logger`.
    pub fn filter(&self) -> String {
        let user = self
            .env_filter
            .clone()
            .or_else(|| std::env::var("RUST_LOG").ok())
            .unwrap_or_else(|| self.default_level.to_string().to_lowercase());

        let mut filter = String::new();
        for krate in NOISY {
            if !user.contains(krate) {
                filter.push_str(krate);
                filter.push_str("=warn,");
            }
        }
        filter.push_str(&user);
        filter
    }
}

static INIT: Once = Once::new();

/// Initializes the global logger once; later calls are ignored.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = config.filter();
        // Fails only when another logger was installed first.
        let installed = env_logger::Builder::new()
            .parse_filters(&filter)
            .write_style(config.write_style)
            .try_init()
            .is_ok();
        if installed {
            log::debug!("logging initialized ({filter})");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noisy_crates_are_capped() {
        let cfg = LoggingConfig {
            env_filter: Some("debug".into()),
            ..Default::default()
        };
        let filter = cfg.filter();
        assert!(filter.starts_with("wgpu_core=warn,"));
        assert!(filter.contains("naga=warn"));
        assert!(filter.ends_with(",debug"));
    }

    #[test]
    fn explicit_crate_levels_win() {
        let cfg = LoggingConfig {
            env_filter: Some("info,naga=trace".into()),
            ..Default::default()
        };
        let filter = cfg.filter();
        assert!(!filter.contains("naga=warn"));
        assert!(filter.contains("wgpu_hal=warn"));
    }
}
