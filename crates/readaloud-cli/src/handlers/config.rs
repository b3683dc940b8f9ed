//! Config command handler.
//!
//! Prints the configuration a `speak` invocation with the same flags and
//! environment would use. The API key is never printed.

use serde_json::json;

use readaloud_core::{PipelineConfig, Preferences};

use crate::commands::PipelineOptions;
use crate::error::CliError;

/// Execute the config command.
pub fn execute(options: &PipelineOptions, as_json: bool) -> Result<(), CliError> {
    let config = options.pipeline_config()?;
    let prefs = options.preferences();
    let rendered = if as_json {
        render_json(&config, &prefs)
    } else {
        render_text(&config, &prefs)
    };
    println!("{rendered}");
    Ok(())
}

/// Mask all but the last four characters of a credential.
pub fn redact(api_key: &str) -> String {
    let key = api_key.trim();
    if key.is_empty() {
        return "(not set)".to_string();
    }
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{tail}")
}

fn render_text(config: &PipelineConfig, prefs: &Preferences) -> String {
    let settings = prefs.voice_settings();
    let player = std::iter::once(config.player.program.as_str())
        .chain(config.player.args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ");
    let idle = config
        .idle_timeout
        .map_or_else(|| "none".to_string(), |t| format!("{}s", t.as_secs_f32()));
    let temp_dir = config
        .temp_dir
        .as_ref()
        .map_or_else(|| std::env::temp_dir().display().to_string(), |d| d.display().to_string());

    [
        format!("API key:             {}", redact(&prefs.api_key)),
        format!("Voice:               {}", prefs.effective_voice_id()),
        format!("Stability:           {}", settings.stability()),
        format!("Similarity boost:    {}", settings.similarity_boost()),
        format!("Backend:             {}", config.base_url),
        format!("Model:               {}", config.model_id),
        format!("Chunk schedule:      {:?}", config.chunk_length_schedule),
        format!("Stream chunk size:   {}", config.stream_chunk_size),
        format!("Connect timeout:     {}s", config.connect_timeout.as_secs_f32()),
        format!("First chunk timeout: {}s", config.first_chunk_timeout.as_secs_f32()),
        format!("Idle timeout:        {idle}"),
        format!("Player:              {player}"),
        format!("Playback:            {:?}", config.playback),
        format!("Temp directory:      {temp_dir}"),
    ]
    .join("\n")
}

fn render_json(config: &PipelineConfig, prefs: &Preferences) -> String {
    let settings = prefs.voice_settings();
    let value = json!({
        "api_key": redact(&prefs.api_key),
        "voice_id": prefs.effective_voice_id(),
        "voice_settings": {
            "stability": settings.stability(),
            "similarity_boost": settings.similarity_boost(),
        },
        "pipeline": config,
    });
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use readaloud_core::DEFAULT_VOICE_ID;

    use super::*;

    #[test]
    fn test_redact() {
        assert_eq!(redact(""), "(not set)");
        assert_eq!(redact("short"), "****");
        assert_eq!(redact("sk_0123456789abcd"), "****abcd");
    }

    #[test]
    fn test_text_never_contains_key() {
        let prefs = Preferences::new("sk_secret_value_1234", "");
        let text = render_text(&PipelineConfig::default(), &prefs);
        assert!(!text.contains("sk_secret_value"));
        assert!(text.contains("****1234"));
        assert!(text.contains(DEFAULT_VOICE_ID));
    }

    #[test]
    fn test_json_shape() {
        let prefs = Preferences::new("sk_secret_value_1234", "voice-1").with_knobs("2", "x");
        let value: serde_json::Value =
            serde_json::from_str(&render_json(&PipelineConfig::default(), &prefs)).unwrap();
        assert_eq!(value["api_key"], "****1234");
        assert_eq!(value["voice_id"], "voice-1");
        assert_eq!(value["pipeline"]["stream_chunk_size"], 8192);
        assert_eq!(
            value["pipeline"]["chunk_length_schedule"],
            json!([120, 160, 250, 290])
        );
        assert!(!value.to_string().contains("sk_secret_value"));
    }
}
