//! Output formatting for command results.
//!
//! Supports a human-readable text format and JSON.

use clap::ValueEnum;
use serde::Serialize;

/// Output format for command results
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON format
    Json,
}

/// Trait for types that can be formatted for output
pub trait Renderable: Serialize {
    /// Format as human-readable text
    fn to_text(&self) -> String;

    /// Format according to the specified output format
    fn render(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Text => self.to_text(),
            OutputFormat::Json => serde_json::to_string_pretty(self).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Sample {
        message: String,
    }

    impl Renderable for Sample {
        fn to_text(&self) -> String {
            self.message.clone()
        }
    }

    #[test]
    fn test_text_format() {
        let sample = Sample { message: "ok".to_string() };
        assert_eq!(sample.render(OutputFormat::Text), "ok");
    }

    #[test]
    fn test_json_format() {
        let sample = Sample { message: "ok".to_string() };
        let json = sample.render(OutputFormat::Json);
        assert!(json.contains("\"message\": \"ok\""));
    }
}
