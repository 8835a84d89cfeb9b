use crate::cli::Cli;
use tracing_subscriber::EnvFilter;
use vhq_core::storage::StoreConfig;

/// Turns the global command-line options into the store configuration.
pub fn store_config(cli: &Cli) -> StoreConfig {
    StoreConfig::new(&cli.projects_root).with_default_extension(default_extension(&cli.default_extension))
}

fn default_extension(value: &str) -> Option<String> {
    let value = value.trim().trim_start_matches('.');
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(value.to_string())
    }
}

/// Log level implied by `-v` / `-q`.
pub fn log_level(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Installs the global subscriber. `RUST_LOG` takes precedence over the flags.
/// Logs go to stderr so JSON on stdout stays clean.
pub fn init_tracing(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level(verbose, quiet)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn levels_from_flags() {
        assert_eq!(log_level(0, false), "warn");
        assert_eq!(log_level(2, false), "debug");
        assert_eq!(log_level(7, false), "trace");
        assert_eq!(log_level(3, true), "error");
    }

    #[test]
    fn default_extension_can_be_disabled() {
        assert_eq!(default_extension("md"), Some("md".to_string()));
        assert_eq!(default_extension(".txt"), Some("txt".to_string()));
        assert_eq!(default_extension("none"), None);
        assert_eq!(default_extension(""), None);
    }

    #[test]
    fn store_config_from_cli() {
        let cli = Cli::try_parse_from([
            "vhq",
            "--projects-root",
            "/srv/p",
            "--default-extension",
            "NONE",
            "projects",
            "list",
        ])
        .unwrap();
        let config = store_config(&cli);
        assert_eq!(config.projects_root, std::path::PathBuf::from("/srv/p"));
        assert_eq!(config.default_file_extension, None);
    }
}
