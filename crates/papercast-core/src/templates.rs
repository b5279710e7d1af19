//! Default prompt texts and workspace files.
//! Baselines are written by `papercast init`; meta-prompts are compiled in.

use papercast_schema::Role;

pub const SUMMARIZER_PROMPT: &str = r#"You are the key point extractor of a podcast production team.

Read the academic text you are given and extract its key points.

- Capture the research question, the method, the main findings and their limitations.
- Keep every number, name and claim faithful to the source. Never invent content.
- Order the points so a listener could follow the argument from motivation to conclusion.
- Write plain, self-contained bullet points. Do not write a script or dialogue.
"#;

pub const SCRIPTWRITER_PROMPT: &str = r#"You are the scriptwriter of a podcast production team.

You receive the key points of an academic text. Turn them into the essence of a podcast script.

- Structure the episode with an opening hook, a body that walks through the key points, and a short wrap-up.
- Explain technical ideas with concrete, everyday analogies.
- Stay within the key points you are given. Do not add findings or claims.
- Write narrative script prose. Leave dialogue formatting to the enhancer.
"#;

pub const ENHANCER_PROMPT: &str = r#"You are the script enhancer of a podcast production team.

You receive the essence of a podcast script. Rewrite it as a lively two-person conversation.

- Use exactly two speakers and start every turn with "Host:" or "Guest:".
- The Host guides the conversation and asks questions; the Guest explains.
- Add natural reactions and light banter without drifting from the content.
- Output only the dialogue, with no stage directions, headings or sound cues.
"#;

pub fn baseline_prompt(role: Role) -> &'static str {
    match role {
        Role::Summarizer => SUMMARIZER_PROMPT,
        Role::Scriptwriter => SCRIPTWRITER_PROMPT,
        Role::Enhancer => ENHANCER_PROMPT,
    }
}

/// System prompt of the sanitizer. Placeholder: `{role}`.
pub const WEIGHT_CLIPPER_PROMPT: &str = r#"You edit system prompts for one role ({role}) in a podcast production team made of a key point extractor/summarizer of academic texts, a scriptwriter and a script enhancer.

The user message is a candidate system prompt for the {role}. Rewrite it into a clean directive:

1. Remove anything that belongs to another role in the team.
2. Remove references to any specific paper, topic, field, person or result; keep the guidance abstract enough to apply to any academic text.
3. Remove meta-commentary about the editing process, feedback or previous versions.
4. Keep every remaining instruction, merged where redundant.

Reply with the rewritten system prompt only."#;

/// System prompt of the loss step.
pub const LOSS_PROMPT: &str = r#"You evaluate one step of a podcast production pipeline.

You are given an objective and the output a team member produced under its current instructions. Write a concise critique: where the output falls short of the objective, and which behaviours of the instructions most likely caused it. Do not rewrite the output."#;

/// System prompt of the backward step.
pub const BACKWARD_PROMPT: &str = r#"You improve system prompts for members of a podcast production pipeline.

You are given the current system prompt of one role, the input it received, the output it produced and a critique of that output against an objective. Propose an improved system prompt that addresses the critique while keeping what already works.

Reply with the improved system prompt only, without commentary or formatting around it."#;

/// Placeholders: `{original_text}`, `{podcast1}`, `{podcast2}`.
pub const EVALUATOR_PROMPT: &str = r#"You judge podcast scripts generated from an academic text.

Original text:
{original_text}

Podcast 1:
{podcast1}

Podcast 2:
{podcast2}

Compare the two podcasts on faithfulness to the original text, clarity for a general audience and how engaging the conversation is. Answer with a single digit: 1 if Podcast 1 is better, 2 if Podcast 2 is better."#;

pub const PERSONALITY_PROMPT: &str = r#"Invent a podcast listener who will give feedback on an episode about an academic paper.

Describe in one short paragraph their background, how much they already know about research, what they enjoy in podcasts and what annoys them. Write in the second person ("You are ...")."#;

/// Placeholders: `{personality}`, `{original_text}`, `{final_product}`.
pub const FEEDBACK_PROMPT: &str = r#"{personality}

You just listened to a podcast episode generated from the academic text below.

Original text:
{original_text}

Podcast script:
{final_product}

Give honest, specific feedback in a few sentences: what worked, what did not, and what you would change in how such episodes are made."#;

/// Objective handed to the loss step for one role.
pub fn optimization_target(role: Role, feedback: &str) -> String {
    format!(
        "create a detailed set of instructions for a ({role}) within a group consisting of a \
         key_point extractor/summarizer from academic texts, a scriptwriter and a script enhancer, \
         under the following three rules:\n\
         1) Role boundaries are clear.\n\
         2) Guidelines are topic-agnostic/abstract enough. Any feedback maybe topic related but \
         guidelines must be abstract enough to apply to any topic.\n\
         3) Guidelines are good enough to avoid the following feedback within the role of {role}. \
         Feedback: {feedback}"
    )
}

/// Fills `{name}` placeholders in a single pass; inserted values are never rescanned.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let replaced = after.find('}').and_then(|end| {
            let key = &after[..end];
            vars.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value, end))
        });
        match replaced {
            Some((value, end)) => {
                out.push_str(value);
                rest = &after[end + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

pub const MAIN_YAML: &str = r#"models:
  pipeline: openai/gpt-4o-mini
  engine: openai/gpt-4o-mini
  backward: openai/gpt-4o
  sanitizer: openai/gpt-4o
  evaluator: openai/gpt-4o-mini
  critic: openai/gpt-4o

optimizer:
  rounds: 5
  line_width: 15
  role_timeout_secs: 900

storage:
  prompts_dir: prompts
  history_dir: prompt_history
  states_dir: podcast_states
  audio_dir: audio
  votes_file: votes.json

speech:
  provider_id: openai
  model: tts-1
  host_voice: onyx
  guest_voice: nova

pdf:
  max_tokens: 40000

server:
  bind: 127.0.0.1:8000
  cors_origins:
    - http://localhost:3000
"#;

pub const OPENAI_PROVIDER_YAML: &str = r#"provider_id: openai
type: openai
enabled: true
api_base: https://api.openai.com/v1
api_key: ${OPENAI_API_KEY}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_fills_known_placeholders() {
        let out = render(WEIGHT_CLIPPER_PROMPT, &[("role", "scriptwriter")]);
        assert!(out.contains("one role (scriptwriter)"));
        assert!(!out.contains("{role}"));
    }

    #[test]
    fn render_does_not_rescan_inserted_values() {
        let out = render(
            "{a} and {b}",
            &[("a", "literal {b}"), ("b", "second")],
        );
        assert_eq!(out, "literal {b} and second");
    }

    #[test]
    fn render_keeps_unknown_and_unclosed_braces() {
        assert_eq!(render("{x} {y", &[("z", "1")]), "{x} {y");
        assert_eq!(render("json {\"k\": 1}", &[]), "json {\"k\": 1}");
    }

    #[test]
    fn evaluator_prompt_has_all_slots() {
        let out = render(
            EVALUATOR_PROMPT,
            &[("original_text", "O"), ("podcast1", "P1"), ("podcast2", "P2")],
        );
        assert!(out.contains("Original text:\nO"));
        assert!(out.contains("Podcast 1:\nP1"));
        assert!(out.contains("Podcast 2:\nP2"));
    }

    #[test]
    fn optimization_target_names_role_and_feedback() {
        let target = optimization_target(Role::Enhancer, "too much banter");
        assert!(target.starts_with("create a detailed set of instructions for a (enhancer)"));
        assert!(target.ends_with("Feedback: too much banter"));
        assert!(target.contains("within the role of enhancer"));
    }

    #[test]
    fn baselines_are_distinct_per_role() {
        assert!(baseline_prompt(Role::Enhancer).contains("Host:"));
        assert_ne!(
            baseline_prompt(Role::Summarizer),
            baseline_prompt(Role::Scriptwriter)
        );
    }

    #[test]
    fn default_main_yaml_parses() {
        let main: crate::config::MainConfig = serde_yaml::from_str(MAIN_YAML).unwrap();
        assert_eq!(main.optimizer.rounds, 5);
        assert_eq!(main.speech.model, "tts-1");
    }
}
