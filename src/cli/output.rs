use crate::core::config::Settings;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub format: OutputFormat,
    pub pretty: bool,
    pub use_color: bool,
    pub verbose: bool,
}

impl OutputOptions {
    /// Flags win over the config file; `--json` wins over `--format`.
    pub fn resolve(
        json: bool,
        format: Option<&str>,
        pretty: bool,
        no_color: bool,
        verbose: bool,
        settings: &Settings,
    ) -> Self {
        let format = if json {
            OutputFormat::Json
        } else {
            format
                .and_then(OutputFormat::parse)
                .or_else(|| OutputFormat::parse(&settings.default_format))
                .unwrap_or(OutputFormat::Text)
        };
        let use_color = !no_color
            && match settings.color.as_str() {
                "always" => true,
                "never" => false,
                _ => detect_color(),
            };
        Self {
            format,
            pretty,
            use_color,
            verbose,
        }
    }

    pub fn to_json<T: serde::Serialize>(&self, value: &T) -> serde_json::Result<String> {
        if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        }
    }
}

pub fn detect_color() -> bool {
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }
    atty_stdout()
}

#[cfg(unix)]
fn atty_stdout() -> bool {
    unsafe { libc_isatty(1) != 0 }
}

#[cfg(not(unix))]
fn atty_stdout() -> bool {
    use std::io::IsTerminal;
    std::io::stdout().is_terminal()
}

#[cfg(unix)]
extern "C" {
    #[link_name = "isatty"]
    fn libc_isatty(fd: i32) -> i32;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(format: &str, color: &str) -> Settings {
        Settings {
            default_format: format.to_string(),
            color: color.to_string(),
            ..Settings::default()
        }
    }

    #[test]
    fn json_flag_overrides_everything() {
        let opts = OutputOptions::resolve(true, Some("text"), false, false, false, &settings("text", "auto"));
        assert_eq!(opts.format, OutputFormat::Json);
    }

    #[test]
    fn format_flag_overrides_config() {
        let opts = OutputOptions::resolve(false, Some("json"), false, false, false, &settings("text", "auto"));
        assert_eq!(opts.format, OutputFormat::Json);
        let opts = OutputOptions::resolve(false, None, false, false, false, &settings("json", "auto"));
        assert_eq!(opts.format, OutputFormat::Json);
        let opts = OutputOptions::resolve(false, Some("yaml"), false, false, false, &settings("bogus", "auto"));
        assert_eq!(opts.format, OutputFormat::Text);
    }

    #[test]
    fn color_setting_and_flag() {
        let opts = OutputOptions::resolve(false, None, false, false, false, &settings("text", "always"));
        assert!(opts.use_color);
        let opts = OutputOptions::resolve(false, None, false, true, false, &settings("text", "always"));
        assert!(!opts.use_color);
        let opts = OutputOptions::resolve(false, None, false, false, false, &settings("text", "never"));
        assert!(!opts.use_color);
    }

    #[test]
    fn to_json_honors_pretty() {
        let mut opts = OutputOptions::resolve(true, None, false, true, false, &Settings::default());
        assert_eq!(opts.to_json(&vec![1, 2]).unwrap(), "[1,2]");
        opts.pretty = true;
        assert!(opts.to_json(&vec![1, 2]).unwrap().contains('\n'));
    }
}
