//! Optional address and person-name recognition.
//!
//! Matches from a recognizer are reported under the `address_name` rule.
//! Recognition is best effort: a failing recognizer never affects the
//! pattern rules.

use crate::error::{DetectError, Result};
use async_trait::async_trait;
use senswatch_core::ExtractorConfig;
use serde::Deserialize;
use tracing::debug;

/// Finds addresses and person names in free text.
#[async_trait]
pub trait EntityRecognizer: Send + Sync {
    /// Return every recognized entity, addresses first.
    async fn recognize(&self, text: &str) -> Result<Vec<String>>;
}

/// JSON printed by the recognizer command.
#[derive(Debug, Default, Deserialize)]
struct RecognizerOutput {
    #[serde(default)]
    addresses: Vec<String>,
    #[serde(default)]
    names: Vec<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Runs an external recognizer.
///
/// The text is written to a temporary file whose path is appended to the
/// command line. The command prints
/// `{"addresses": [...], "names": [...], "error": "..."}` on stdout.
#[derive(Debug, Clone)]
pub struct CommandRecognizer {
    argv: Vec<String>,
}

impl CommandRecognizer {
    /// Create a recognizer; `None` if `argv` is empty.
    #[must_use]
    pub fn new(argv: Vec<String>) -> Option<Self> {
        if argv.is_empty() {
            None
        } else {
            Some(Self { argv })
        }
    }

    /// Recognizer from `[extractors] recognizer_command`, if configured.
    #[must_use]
    pub fn from_config(config: &ExtractorConfig) -> Option<Self> {
        Self::new(config.recognizer_command.clone())
    }
}

#[async_trait]
impl EntityRecognizer for CommandRecognizer {
    async fn recognize(&self, text: &str) -> Result<Vec<String>> {
        let Some((program, args)) = self.argv.split_first() else {
            return Ok(Vec::new());
        };

        let input = tempfile::Builder::new()
            .prefix("content_")
            .suffix(".txt")
            .tempfile()?;
        tokio::fs::write(input.path(), text).await?;

        let output = tokio::process::Command::new(program)
            .args(args)
            .arg(input.path())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(DetectError::Recognizer(format!(
                "{program} exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let parsed: RecognizerOutput = serde_json::from_slice(&output.stdout)
            .map_err(|e| DetectError::Recognizer(format!("invalid recognizer output: {e}")))?;

        if let Some(error) = parsed.error.filter(|error| !error.is_empty()) {
            return Err(DetectError::Recognizer(error));
        }

        debug!(
            "Recognizer found {} addresses and {} names",
            parsed.addresses.len(),
            parsed.names.len()
        );

        let mut entities = parsed.addresses;
        entities.extend(parsed.names);
        Ok(entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandRecognizer {
        CommandRecognizer::new(vec![
            "sh".to_string(),
            "-c".to_string(),
            script.to_string(),
            "recognizer".to_string(),
        ])
        .expect("non-empty command")
    }

    #[test]
    fn test_empty_command_disables() {
        assert!(CommandRecognizer::new(Vec::new()).is_none());
        assert!(CommandRecognizer::from_config(&ExtractorConfig::default()).is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_recognizer_output() {
        let recognizer =
            sh(r#"echo '{"addresses": ["北京市海淀区"], "names": ["张三"], "error": ""}'"#);
        let entities = recognizer.recognize("张三住在北京市海淀区").await.unwrap();
        assert_eq!(entities, vec!["北京市海淀区", "张三"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_recognizer_reads_text_file() {
        // The script echoes the file's content back as a single name.
        let recognizer = sh(r#"printf '{"names": ["%s"]}' "$(cat "$1")""#);
        let entities = recognizer.recognize("李四").await.unwrap();
        assert_eq!(entities, vec!["李四"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_recognizer_failures() {
        let reported = sh(r#"echo '{"error": "model not loaded"}'"#);
        assert!(matches!(
            reported.recognize("text").await,
            Err(DetectError::Recognizer(msg)) if msg == "model not loaded"
        ));

        let garbage = sh("echo not-json");
        assert!(matches!(
            garbage.recognize("text").await,
            Err(DetectError::Recognizer(_))
        ));

        let crashed = sh("exit 3");
        assert!(matches!(
            crashed.recognize("text").await,
            Err(DetectError::Recognizer(_))
        ));
    }
}
