//! Fixed story text and keyword tables.
//!
//! Everything the player can read that does not come from the model lives
//! here, so narration stays consistent across the orchestrators.

/// The heroine the player is talking to.
pub const HEROINE_NAME: &str = "Su Tang";

/// The player character.
pub const PLAYER_NAME: &str = "Chen Chen";

/// Shown when a new game starts.
pub const OPENING_LINE: &str = "(You are walking through the busy campus when you notice a cute girl \
hurrying about behind the baking club's booth...)";

/// Seeded as a system turn when a story is started as a continuation.
pub const INTRO_SYSTEM_TURN: &str = "(The first time you saw her was at the club recruitment fair. \
She was busy at the baking club's booth.)";

/// Emitted once closeness saturates and the confession branch opens.
pub const CONFESSION_NARRATION: &str = "(Su Tang stops walking and fidgets with the hem of her sleeve. \
Her cheeks are bright red.)\n\"Chen Chen... I've been wanting to say this for a while. I like you. \
Will you... go out with me?\"";

/// Ending text after the player accepts the confession.
pub const ACCEPTED_ENDING: &str = "(Su Tang's eyes go wide, then she breaks into the brightest smile \
you have ever seen and takes your hand.)\n\"Really? Then... from today on, we're together!\"\n\
[Ending reached: Sweet Beginning]";

/// Ending text after the player rejects the confession.
pub const REJECTED_ENDING: &str = "(Su Tang freezes for a moment, then forces a small smile.)\n\
\"I see... It's okay. Let's... stay friends, alright?\"\n\
[Ending reached: Unspoken Feelings]";

/// Reply to ordinary input once an ending has been reached.
pub const EPILOGUE: &str = "(This story has reached its ending. Start a new game or load a save to \
continue.)";

/// Canned replies used whenever no usable model output exists.
pub const BACKUP_REPLIES: [&str; 3] = [
    "Hmm... let me think about that.",
    "(Sorry, I zoned out for a second...)",
    "Um... what did you just say?",
];

/// Marker rendered in prompts when a list is empty.
pub const NONE_MARKER: &str = "none";

/// Transcript marker used before the first exchange.
pub const EMPTY_TRANSCRIPT: &str = "(You haven't started talking yet.)";

/// Motion phrases that gate movement-intent detection.
pub const MOVE_KEYWORDS: [&str; 7] = [
    "go to",
    "head to",
    "walk to",
    "move to",
    "take me to",
    "let's go",
    "go back to",
];

/// Phrases accepting a confession.
pub const ACCEPT_KEYWORDS: [&str; 8] = [
    "yes",
    "i like you too",
    "i love you",
    "i accept",
    "of course",
    "me too",
    "i'd love to",
    "let's be together",
];

/// Phrases rejecting a confession.
pub const REJECT_KEYWORDS: [&str; 7] = [
    "no",
    "sorry",
    "i can't",
    "i reject",
    "just friends",
    "stay friends",
    "not ready",
];

/// Prefix for operator commands.
pub const DEBUG_PREFIX: &str = "/debug";

/// Pick one of the canned replies.
pub fn backup_reply<R: rand::Rng + ?Sized>(rng: &mut R) -> &'static str {
    use rand::seq::SliceRandom;
    BACKUP_REPLIES.choose(rng).copied().unwrap_or(BACKUP_REPLIES[0])
}
