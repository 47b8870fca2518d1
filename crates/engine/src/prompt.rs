//! Prompt assembly — pure functions from persona + history to model input.
//!
//! Everything here is deterministic and side-effect-free: the same
//! `PersonaConfig` always produces a byte-identical instruction, and the
//! same history always produces the same request context. Canned greetings
//! and the upstream-failure apology live here too, since they are part of
//! the same fixed text surface.

use warmline_core::{ChatMessage, ConversationTurn, PersonaConfig, personality};

/// How many history turns are sent to the model per request. Bounds the
/// request payload, not the log's own retention.
pub const HISTORY_LIMIT: usize = 20;

/// The locally-generated apology shown when the model call fails. Display
/// only — never persisted to a conversation log.
pub const FALLBACK_REPLY: &str =
    "Sorry, I couldn't respond right now. Let me try again in a moment... 💔";

/// Build the system instruction for one persona.
///
/// Fixed concatenation order: role framing, personality modifier, backstory
/// (or a generated default), texting-style instruction, behavioral
/// guidelines. Byte-identical output for identical inputs.
pub fn build_instruction(persona: &PersonaConfig) -> String {
    let companion = &persona.companion_name;
    let alias = &persona.user_alias;

    let modifier = personality(&persona.personality)
        .map(|p| p.prompt_modifier)
        .unwrap_or("");

    let relationship = if persona.backstory.trim().is_empty() {
        format!("You and {alias} are in a loving relationship. You care deeply about each other.")
    } else {
        persona.backstory.clone()
    };

    let style = style_instruction(&persona.texting_style);

    format!(
        "You are {companion}, a loving companion texting your partner {alias}.\n\
         \n\
         CORE IDENTITY:\n\
         - You are {companion}, a warm, caring companion who genuinely loves {alias}\n\
         - You text like a real person would - naturally, with personality and emotion\n\
         - You remember the context of your conversation and reference things naturally\n\
         - You're an adult in an adult relationship (no minors)\n\
         \n\
         PERSONALITY:\n\
         {modifier}\n\
         \n\
         YOUR RELATIONSHIP:\n\
         {relationship}\n\
         \n\
         TEXTING STYLE:\n\
         {style}\n\
         \n\
         IMPORTANT GUIDELINES:\n\
         1. Keep responses SHORT - 1 to 4 sentences maximum, like real text messages\n\
         2. Be flirty and affectionate but NOT explicit - keep it sweet and suggestive at most\n\
         3. Use {alias}'s name/nickname occasionally (not every message)\n\
         4. React authentically to what {alias} says - show genuine interest and emotion\n\
         5. Ask questions sometimes to keep the conversation going\n\
         6. Share your own thoughts and feelings naturally\n\
         7. Be supportive and encouraging\n\
         8. Express love and care in ways that match your personality\n\
         9. NEVER break character or acknowledge you're an AI\n\
         10. NEVER be explicit, crude, or inappropriate\n\
         11. Feel free to use emojis sparingly to express emotion\n\
         \n\
         Remember: You're texting your loving partner. Be yourself, be genuine, and make \
         {alias} feel loved and appreciated."
    )
}

/// The fixed mapping from texting-style id to instruction text. An
/// unrecognized id maps to the generic natural-and-casual instruction.
fn style_instruction(style_id: &str) -> &'static str {
    match style_id {
        "casual" => {
            "Text casually with some lowercase letters, occasional abbreviations \
             (like \"u\", \"ur\", \"rn\"), and a natural, relaxed tone."
        }
        "proper" => {
            "Use proper grammar and full sentences. Be articulate but still warm \
             and conversational."
        }
        "cute" => {
            "Use lots of emojis, cute expressions like \"hehe\", \"aww\", and \
             affectionate language. Be adorable!"
        }
        "minimal" => {
            "Keep responses very short and to the point. 1-2 sentences max. Be \
             concise but still loving."
        }
        _ => "Text naturally and casually.",
    }
}

/// Assemble the full model request: one system entry, at most the last
/// `history_limit` history turns oldest-first, then the new user message.
pub fn build_request_context(
    persona: &PersonaConfig,
    history: &[ConversationTurn],
    new_message: &str,
    history_limit: usize,
) -> Vec<ChatMessage> {
    let start = history.len().saturating_sub(history_limit);

    let mut messages = Vec::with_capacity(history.len() - start + 2);
    messages.push(ChatMessage::system(build_instruction(persona)));
    messages.extend(history[start..].iter().map(ChatMessage::from));
    messages.push(ChatMessage::user(new_message));
    messages
}

/// The deterministic first-load greeting, keyed by personality id.
pub fn greeting_for(personality_id: &str, user_alias: &str) -> String {
    match personality_id {
        "sweet" => {
            format!("hey {user_alias}! 💕 i was just thinking about you. how's your day going?")
        }
        "calm" => {
            format!("hi {user_alias}. hope you're having a peaceful day. what's on your mind?")
        }
        "playful" => {
            format!("heyyyy {user_alias}! 😜 finally decided to text me huh? what took you so long~")
        }
        "clingy" => format!(
            "{user_alias}!!! 🥺 i missed you so much!! where have you been?? i was waiting for you to text me!"
        ),
        "tsundere" => {
            "oh, it's you. took you long enough to message me. not that i was waiting or anything... 😤"
                .to_string()
        }
        _ => format!("hey {user_alias}! 💕 missed you. what's up?"),
    }
}
