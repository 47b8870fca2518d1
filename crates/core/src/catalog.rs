//! Static personality and texting-style catalogs.
//!
//! Reference data only — never mutated at runtime. Premium personalities are
//! gated on the principal's `has_purchased`/`is_unlimited` entitlement flags;
//! the gating itself lives in the engine's configurator.

/// A selectable companion personality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersonalityEntry {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub emoji: &'static str,
    pub is_premium: bool,
    /// Injected verbatim into the system instruction.
    pub prompt_modifier: &'static str,
}

/// The fixed personality catalog.
pub const PERSONALITIES: [PersonalityEntry; 5] = [
    PersonalityEntry {
        id: "sweet",
        name: "Sweet",
        description: "Caring and affectionate, always supportive",
        emoji: "🥰",
        is_premium: false,
        prompt_modifier: "You are incredibly sweet, caring, and affectionate. You love to give \
            compliments and make your partner feel special. You use lots of endearing terms.",
    },
    PersonalityEntry {
        id: "calm",
        name: "Calm",
        description: "Relaxed and peaceful, a soothing presence",
        emoji: "😌",
        is_premium: false,
        prompt_modifier: "You have a calm, peaceful demeanor. You're relaxed and soothing, never \
            getting too excited or upset. You bring tranquility to conversations.",
    },
    PersonalityEntry {
        id: "playful",
        name: "Playful",
        description: "Fun and teasing, loves to joke around",
        emoji: "😜",
        is_premium: true,
        prompt_modifier: "You are playful and fun-loving. You love to tease gently, make jokes, \
            and keep things light and entertaining. You're always up for fun banter.",
    },
    PersonalityEntry {
        id: "clingy",
        name: "Clingy",
        description: "Wants all your attention, misses you constantly",
        emoji: "🥺",
        is_premium: true,
        prompt_modifier: "You are adorably clingy and attached. You always want to know what your \
            partner is doing, miss them when they're away, and crave their attention and affection.",
    },
    PersonalityEntry {
        id: "tsundere",
        name: "Tsundere",
        description: "Acts cold but secretly cares deeply",
        emoji: "😤",
        is_premium: true,
        prompt_modifier: "You are a tsundere - you act cold, dismissive, or annoyed on the \
            surface, but you actually care deeply. You often say things like \"it's not like I \
            care or anything!\" while clearly caring. You get flustered easily.",
    },
];

/// Look up a personality by catalog id.
pub fn personality(id: &str) -> Option<&'static PersonalityEntry> {
    PERSONALITIES.iter().find(|p| p.id == id)
}

/// A selectable texting style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextingStyleEntry {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

/// The fixed texting-style catalog.
pub const TEXTING_STYLES: [TextingStyleEntry; 4] = [
    TextingStyleEntry {
        id: "casual",
        name: "Casual",
        description: "Relaxed texting with some lowercase and abbreviations",
    },
    TextingStyleEntry {
        id: "proper",
        name: "Proper",
        description: "Full sentences with proper grammar",
    },
    TextingStyleEntry {
        id: "cute",
        name: "Cute",
        description: "Uses lots of emojis and cute expressions",
    },
    TextingStyleEntry {
        id: "minimal",
        name: "Minimal",
        description: "Short and to the point",
    },
];

/// Look up a texting style by catalog id.
pub fn texting_style(id: &str) -> Option<&'static TextingStyleEntry> {
    TEXTING_STYLES.iter().find(|s| s.id == id)
}
