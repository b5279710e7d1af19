use papercast_schema::{DialogueLine, Speaker};

const MARKERS: [(&str, Speaker); 2] = [("Host:", Speaker::Host), ("Guest:", Speaker::Guest)];

/// Splits an enhanced script into speaker turns.
///
/// Text before the first marker is dropped, as are turns with no text.
pub fn parse_dialogue(script: &str) -> Vec<DialogueLine> {
    let mut lines = Vec::new();
    let mut current: Option<(Speaker, usize)> = None;
    let mut pos = 0;

    while pos < script.len() {
        let rest = &script[pos..];
        let hit = MARKERS
            .iter()
            .find(|(marker, _)| rest.starts_with(marker));

        match hit {
            Some((marker, speaker)) => {
                if let Some((prev, start)) = current.take() {
                    push_turn(&mut lines, prev, &script[start..pos]);
                }
                pos += marker.len();
                current = Some((*speaker, pos));
            }
            None => {
                pos += rest.chars().next().map_or(1, char::len_utf8);
            }
        }
    }

    if let Some((speaker, start)) = current {
        push_turn(&mut lines, speaker, &script[start..]);
    }
    lines
}

fn push_turn(lines: &mut Vec<DialogueLine>, speaker: Speaker, raw: &str) {
    let text = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if !text.is_empty() {
        lines.push(DialogueLine { speaker, text });
    }
}

pub fn render_dialogue(lines: &[DialogueLine]) -> String {
    lines
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voices {
    pub host: String,
    pub guest: String,
}

impl Voices {
    pub fn new(host: impl Into<String>, guest: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            guest: guest.into(),
        }
    }

    pub fn voice_for(&self, speaker: Speaker) -> &str {
        match speaker {
            Speaker::Host => &self.host,
            Speaker::Guest => &self.guest,
        }
    }
}

impl Default for Voices {
    fn default() -> Self {
        Self::new("onyx", "nova")
    }
}
