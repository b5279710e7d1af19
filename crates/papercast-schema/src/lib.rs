pub mod timestamp;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use timestamp::{Timestamp, TimestampError, TIMESTAMP_FORMAT};

/// A pipeline stage with its own versioned instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Summarizer,
    Scriptwriter,
    Enhancer,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role '{0}': expected summarizer, scriptwriter or enhancer")]
pub struct UnknownRole(pub String);

impl Role {
    /// Pipeline order.
    pub const ALL: [Role; 3] = [Role::Summarizer, Role::Scriptwriter, Role::Enhancer];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Summarizer => "summarizer",
            Role::Scriptwriter => "scriptwriter",
            Role::Enhancer => "enhancer",
        }
    }

    /// Short job description used when prompting about role boundaries.
    pub fn job(self) -> &'static str {
        match self {
            Role::Summarizer => "key point extractor/summarizer of academic texts",
            Role::Scriptwriter => "scriptwriter turning key points into a podcast script",
            Role::Enhancer => "script enhancer turning the script into a lively two-person dialogue",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "summarizer" => Ok(Role::Summarizer),
            "scriptwriter" => Ok(Role::Scriptwriter),
            "enhancer" => Ok(Role::Enhancer),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

/// Stage outputs of one podcast run, plus optional human feedback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodcastState {
    pub main_text: String,
    pub key_points: String,
    pub script_essence: String,
    pub enhanced_script: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

impl PodcastState {
    pub fn from_main_text(main_text: impl Into<String>) -> Self {
        Self {
            main_text: main_text.into(),
            ..Default::default()
        }
    }

    /// The field a role consumes as its user input.
    pub fn input_for(&self, role: Role) -> &str {
        match role {
            Role::Summarizer => &self.main_text,
            Role::Scriptwriter => &self.key_points,
            Role::Enhancer => &self.script_essence,
        }
    }

    pub fn set_output(&mut self, role: Role, text: String) {
        match role {
            Role::Summarizer => self.key_points = text,
            Role::Scriptwriter => self.script_essence = text,
            Role::Enhancer => self.enhanced_script = text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Speaker {
    Host,
    Guest,
}

impl Speaker {
    pub fn label(self) -> &'static str {
        match self {
            Speaker::Host => "Host",
            Speaker::Guest => "Guest",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueLine {
    pub speaker: Speaker,
    pub text: String,
}

impl fmt::Display for DialogueLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.speaker.label(), self.text)
    }
}

/// Which prompt version produced a podcast in a side-by-side creation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantKind {
    Baseline,
    Last,
    Random,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("Summarizer".parse::<Role>().unwrap(), Role::Summarizer);
        assert_eq!(" enhancer ".parse::<Role>().unwrap(), Role::Enhancer);
        let err = "narrator".parse::<Role>().unwrap_err();
        assert!(err.to_string().contains("narrator"));
    }

    #[test]
    fn role_input_fields() {
        let state = PodcastState {
            main_text: "paper".into(),
            key_points: "points".into(),
            script_essence: "script".into(),
            enhanced_script: "dialogue".into(),
            feedback: None,
        };
        assert_eq!(state.input_for(Role::Summarizer), "paper");
        assert_eq!(state.input_for(Role::Scriptwriter), "points");
        assert_eq!(state.input_for(Role::Enhancer), "script");
    }

    #[test]
    fn podcast_state_omits_absent_feedback() {
        let state = PodcastState::from_main_text("text");
        let json = serde_json::to_value(&state).unwrap();
        assert!(json.get("feedback").is_none());
        assert_eq!(json["main_text"], "text");
        assert_eq!(json["enhanced_script"], "");
    }

    #[test]
    fn podcast_state_reads_legacy_record_without_feedback() {
        let raw = r#"{"main_text":"a","key_points":"b","script_essence":"c","enhanced_script":"d"}"#;
        let state: PodcastState = serde_json::from_str(raw).unwrap();
        assert_eq!(state.feedback, None);
        assert_eq!(state.enhanced_script, "d");
    }

    #[test]
    fn dialogue_line_display() {
        let line = DialogueLine {
            speaker: Speaker::Guest,
            text: "Thanks for having me.".into(),
        };
        assert_eq!(line.to_string(), "Guest: Thanks for having me.");
    }

    #[test]
    fn role_serde_is_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Scriptwriter).unwrap(), "\"scriptwriter\"");
        assert_eq!(serde_json::to_string(&VariantKind::Last).unwrap(), "\"last\"");
    }
}
