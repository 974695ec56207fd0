//! Small string helpers: input validation, duration parsing and formatting.

use rand::Rng;
use regex::Regex;

/// Check a string against a pattern, treating compile failure as no match.
fn matches(pattern: &str, input: &str) -> bool {
    Regex::new(pattern)
        .map(|re| re.is_match(input))
        .unwrap_or(false)
}

/// Room names are plain alphanumeric.
pub fn is_valid_room(room: &str) -> bool {
    matches("^[a-zA-Z0-9]+$", room)
}

/// Nicks allow underscores, 1-32 characters.
pub fn is_valid_nick(nick: &str) -> bool {
    matches("^[a-zA-Z0-9_]{1,32}$", nick)
}

/// Nick-ban patterns additionally allow the `*` wildcard marker.
pub fn is_valid_nick_pattern(pattern: &str) -> bool {
    matches(r"^[a-zA-Z0-9_*]{1,32}$", pattern)
}

/// Account names are alphanumeric, 1-64 characters.
pub fn is_valid_account(account: &str) -> bool {
    matches("^[a-zA-Z0-9]{1,64}$", account)
}

/// Media ids are exactly 11 url-safe characters.
pub fn is_media_id(input: &str) -> bool {
    matches("^[a-zA-Z0-9_-]{11}$", input)
}

/// Generate a random lowercase alphanumeric nick, 5-25 characters.
pub fn random_nick() -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    let length = rng.gen_range(5..=25);
    (0..length)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

/// Parse a compact duration string like `2m58s`, `1h2m` or `45s` to seconds.
///
/// Also accepts the ISO 8601 form (`PT2M58S`) used by media directories.
/// Digits with no following unit marker are ignored; a string with no
/// recognized unit parses to 0.
pub fn parse_hms(input: &str) -> u64 {
    let body = input.strip_prefix("PT").unwrap_or(input);
    let mut seconds: u64 = 0;
    let mut digits = String::new();

    for ch in body.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }
        let value = match digits.parse::<u64>() {
            Ok(v) => v,
            Err(_) => return 0,
        };
        match ch.to_ascii_lowercase() {
            'h' => seconds += value * 3600,
            'm' => seconds += value * 60,
            's' => seconds += value,
            _ => continue,
        }
        digits.clear();
    }

    seconds
}

/// Format a second count as `mm:ss`, `h:mm:ss` or `d Day(s) h:mm:ss`.
pub fn format_time(total_seconds: u64) -> String {
    let (minutes, seconds) = (total_seconds / 60, total_seconds % 60);
    let (hours, minutes) = (minutes / 60, minutes % 60);
    let (days, hours) = (hours / 24, hours % 24);

    if days == 0 && hours == 0 {
        format!("{:02}:{:02}", minutes, seconds)
    } else if days == 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{} Day(s) {}:{:02}:{:02}", days, hours, minutes, seconds)
    }
}
