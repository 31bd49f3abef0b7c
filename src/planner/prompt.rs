use crate::kernel::context::{ContextFrame, Speaker};
use crate::kernel::event::IntentAxis;
use crate::services::llm::{ChatMessage, ChatRole};

/// Turns of history the model sees.
pub const HISTORY_WINDOW: usize = 10;

const OPENING_PROMPT: &str =
    "The conversation is just starting. Suggest natural opening phrases the patient might want to say.";

/// Chat messages for one candidate-generation call.
pub fn build_messages(context: &ContextFrame, num_candidates: usize) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::new(
        ChatRole::System,
        system_prompt(context, num_candidates),
    )];

    let recent = context.recent_history(HISTORY_WINDOW);
    if recent.is_empty() {
        messages.push(ChatMessage::new(ChatRole::User, OPENING_PROMPT));
        return messages;
    }

    for entry in recent {
        let role = match entry.role {
            Speaker::Patient => ChatRole::Assistant,
            Speaker::Partner => ChatRole::User,
        };
        messages.push(ChatMessage::new(role, entry.text.clone()));
    }
    messages
}

fn system_prompt(context: &ContextFrame, num_candidates: usize) -> String {
    let axes = IntentAxis::ALL
        .iter()
        .map(|a| a.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let mut prompt = format!(
        "You speak on behalf of a person with ALS who answers by choosing one of a few short sentences.\n\
         Propose {n} different replies they could say next, each one or two short sentences, in the first person.\n\
         Cover different intents where possible. Allowed intents: {axes}.\n\
         Answer ONLY with a JSON array: [{{\"text\": \"...\", \"intent\": \"...\", \"confidence\": 0.0-1.0}}]",
        n = num_candidates,
        axes = axes,
    );

    if let Some(profile) = context.voice_profile.as_deref().filter(|p| !p.trim().is_empty()) {
        prompt.push_str("\n\n## Voice profile\n");
        prompt.push_str(profile.trim());
    }

    let env = &context.environment;
    prompt.push_str(&format!(
        "\n\n## Situation\nLocation: {}. Time of day: {}.",
        env.location, env.time_of_day
    ));
    if !env.people_present.is_empty() {
        prompt.push_str(&format!(" Present: {}.", env.people_present.join(", ")));
    }
    if !env.activity.is_empty() {
        prompt.push_str(&format!(" Activity: {}.", env.activity));
    }
    if !env.description.is_empty() {
        prompt.push_str(&format!(" {}", env.description));
    }

    prompt
}
