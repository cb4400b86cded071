use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub capture: CaptureConfig,
    pub corrections: CorrectionsConfig,
    pub simulation: SimulationConfig,
    pub chat: ChatConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CaptureConfig {
    /// BCP-47 language tag requested from the recognition capability
    pub language: String,
    /// Delay before restarting a stream that dropped on its own
    pub restart_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorrectionsConfig {
    pub enabled: bool,
    /// Applied in listed order over the progressively rewritten transcript
    pub rules: Vec<CorrectionRuleConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorrectionRuleConfig {
    pub pattern: String,
    pub replacement: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SimulationConfig {
    /// Per-character reveal delay for the scripted transcript
    pub char_delay_ms: u64,
    pub questions: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub log_path: String,
}

impl Config {
    /// Load config from ~/.campus-voice.toml
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            Self::create_default(&config_path).context("failed to create default config")?;
        }

        let contents = fs::read_to_string(&config_path).context("failed to read config file")?;

        let config: Config = toml::from_str(&contents).context("failed to parse config TOML")?;

        Ok(config)
    }

    fn config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME").context("HOME environment variable not set")?;
        Ok(PathBuf::from(home).join(".campus-voice.toml"))
    }

    fn create_default(path: &PathBuf) -> Result<()> {
        fs::write(path, DEFAULT_CONFIG).context("failed to write default config")?;
        Ok(())
    }

    /// Expand ~ in paths to home directory
    pub fn expand_path(path: &str) -> Result<PathBuf> {
        if let Some(stripped) = path.strip_prefix("~/") {
            let home = std::env::var("HOME").context("HOME environment variable not set")?;
            Ok(PathBuf::from(home).join(stripped))
        } else {
            Ok(PathBuf::from(path))
        }
    }
}

const DEFAULT_CONFIG: &str = r#"[capture]
language = "en-IN"
restart_delay_ms = 100

[corrections]
enabled = true
rules = [
    { pattern = "bit", replacement = "BIET" },
    { pattern = "byte", replacement = "BIET" },
    { pattern = "be it", replacement = "BIET" },
    { pattern = "fee structure", replacement = "fee structure" },
    { pattern = "placement", replacement = "placement" },
    { pattern = "hostel", replacement = "hostel" },
    { pattern = "scholarship", replacement = "scholarship" },
]

[simulation]
char_delay_ms = 30
questions = [
    "What is the admission process for BE programs?",
    "Can you tell me about computer science department?",
    "What is the fee structure for MCA course?",
    "Which companies visit campus for placements?",
    "How is the hostel facility at BIET?",
    "What are the eligibility criteria for M.Tech?",
    "Tell me about the library facilities",
    "What is the placement percentage last year?",
    "How to apply for scholarships?",
    "What is the campus life like at BIET?",
]

[chat]
base_url = "http://localhost:5000"

[telemetry]
enabled = true
log_path = "~/.campus-voice/crash.log"
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config: Config = toml::from_str(DEFAULT_CONFIG).unwrap();

        assert_eq!(config.capture.language, "en-IN");
        assert_eq!(config.capture.restart_delay_ms, 100);
        assert_eq!(config.simulation.char_delay_ms, 30);
        assert_eq!(config.simulation.questions.len(), 10);
        assert!(config.corrections.enabled);
        assert_eq!(config.chat.base_url, "http://localhost:5000");
    }

    #[test]
    fn test_default_rules_preserve_order() {
        let config: Config = toml::from_str(DEFAULT_CONFIG).unwrap();

        let first = &config.corrections.rules[0];
        assert_eq!(first.pattern, "bit");
        assert_eq!(first.replacement, "BIET");

        // TOML array order is the application order
        let patterns: Vec<&str> = config
            .corrections
            .rules
            .iter()
            .map(|r| r.pattern.as_str())
            .collect();
        assert_eq!(patterns[..3], ["bit", "byte", "be it"]);
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let home = std::env::var("HOME").expect("HOME not set");
        let result = Config::expand_path("~/logs/crash.log").unwrap();
        assert_eq!(result, PathBuf::from(home).join("logs/crash.log"));
    }

    #[test]
    fn test_expand_path_absolute() {
        let result = Config::expand_path("/var/log/app.log").unwrap();
        assert_eq!(result, PathBuf::from("/var/log/app.log"));
    }

    #[test]
    fn test_minimal_config_rejected_on_missing_section() {
        let result: std::result::Result<Config, _> = toml::from_str("[capture]\nlanguage = \"en\"\nrestart_delay_ms = 100\n");
        assert!(result.is_err());
    }
}
