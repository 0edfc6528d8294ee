//! Emoji short codes used in reactions.

use std::borrow::Cow;

/// Glyph for a short code such as `+1` or `thinking_face`.
pub fn emoji_glyph(code: &str) -> Option<&'static str> {
    let glyph = match code {
        "+1" | "thumbsup" => "👍",
        "-1" | "thumbsdown" => "👎",
        "heart" => "❤️",
        "joy" => "😂",
        "ok_hand" => "👌",
        "bangbang" => "‼️",
        "100" => "💯",
        "face_with_cowboy_hat" => "🤠",
        "fire" => "🔥",
        "eyes" => "👀",
        "clap" => "👏",
        "raised_hands" => "🙌",
        "pray" => "🙏",
        "thinking_face" => "🤔",
        "smile" => "😄",
        "grin" => "😁",
        "laughing" => "😆",
        "wink" => "😉",
        "blush" => "😊",
        "yum" => "😋",
        "relieved" => "😌",
        "heart_eyes" => "😍",
        "sunglasses" => "😎",
        "smirk" => "😏",
        "neutral_face" => "😐",
        "expressionless" => "😑",
        "unamused" => "😒",
        "sweat_smile" => "😅",
        "sweat" => "😓",
        "disappointed_relieved" => "😥",
        "weary" => "😩",
        "pensive" => "😔",
        "confused" => "😕",
        "confounded" => "😖",
        "kissing_heart" => "😘",
        "kissing_closed_eyes" => "😚",
        "stuck_out_tongue_winking_eye" => "😜",
        "stuck_out_tongue_closed_eyes" => "😝",
        "disappointed" => "😞",
        "worried" => "😟",
        "angry" => "😠",
        "rage" => "😡",
        "cry" => "😢",
        "persevere" => "😣",
        "triumph" => "😤",
        "frowning" => "😦",
        "anguished" => "😧",
        "fearful" => "😨",
        "cold_sweat" => "😰",
        "hushed" => "😯",
        "flushed" => "😳",
        "dizzy_face" => "😵",
        "mask" => "😷",
        "sleeping" => "😴",
        "zzz" => "💤",
        "hankey" | "poop" | "shit" => "💩",
        "punch" => "👊",
        "fist" => "✊",
        "v" => "✌️",
        "wave" => "👋",
        "hand" => "✋",
        "open_hands" => "👐",
        "point_up" => "☝️",
        "point_down" => "👇",
        "point_left" => "👈",
        "point_right" => "👉",
        "muscle" => "💪",
        "metal" => "🤘",
        "runner" => "🏃",
        "dancer" => "💃",
        "dancers" => "👯",
        "ok_woman" => "🙆",
        "no_good" => "🙅",
        "raising_hand" => "🙋",
        "bow" => "🙇",
        "baby" => "👶",
        "angel" => "👼",
        "see_no_evil" => "🙈",
        "hear_no_evil" => "🙉",
        "speak_no_evil" => "🙊",
        "skull" => "💀",
        "alien" => "👽",
        "sparkles" => "✨",
        "star" => "⭐",
        "star2" => "🌟",
        "dizzy" => "💫",
        "boom" | "collision" => "💥",
        "anger" => "💢",
        "sweat_drops" => "💦",
        "droplet" => "💧",
        "dash" => "💨",
        "ocean" => "🌊",
        "cat" => "🐱",
        "dog" => "🐶",
        "mouse" => "🐭",
        "rabbit" => "🐰",
        "frog" => "🐸",
        "tiger" => "🐯",
        "bear" => "🐻",
        "pig" => "🐷",
        "cow" => "🐮",
        "monkey_face" => "🐵",
        "horse" => "🐴",
        "panda_face" => "🐼",
        "snake" => "🐍",
        "bird" => "🐦",
        "penguin" => "🐧",
        "turtle" => "🐢",
        "bug" => "🐛",
        "honeybee" => "🐝",
        "octopus" | "octocat" => "🐙",
        "fish" => "🐟",
        "whale" => "🐳",
        "dolphin" => "🐬",
        "dragon" => "🐉",
        "squirrel" => "🐿️",
        "cherry_blossom" => "🌸",
        "rose" => "🌹",
        "sunflower" => "🌻",
        "four_leaf_clover" => "🍀",
        "maple_leaf" => "🍁",
        "seedling" => "🌱",
        "cactus" => "🌵",
        "palm_tree" => "🌴",
        "evergreen_tree" => "🌲",
        "mushroom" => "🍄",
        "globe_with_meridians" => "🌐",
        "sun_with_face" => "🌞",
        "full_moon" => "🌕",
        "new_moon" => "🌑",
        "moon" => "🌔",
        "earth_africa" => "🌍",
        "earth_americas" => "🌎",
        "earth_asia" => "🌏",
        "volcano" => "🌋",
        "milky_way" => "🌌",
        "partly_sunny" => "⛅",
        _ => return None,
    };
    Some(glyph)
}

/// Glyph for a reaction name, falling back to the literal `:code:`.
///
/// Skin tone modifiers (`+1::skin-tone-3`) are ignored for the lookup.
pub fn resolve_emoji(code: &str) -> Cow<'static, str> {
    let base = code.split("::").next().unwrap_or(code);
    match emoji_glyph(base) {
        Some(glyph) => Cow::Borrowed(glyph),
        None => Cow::Owned(format!(":{code}:")),
    }
}
