//! Inbound chat commands.

use alert_feed::RegionId;

/// Name the bot answers to in free-text triggers.
pub const BOT_NAME: &str = "AirRaidovych";

/// Region watched when a single-region command names none (Kyiv).
pub const DEFAULT_REGION_ID: RegionId = 25;

/// A command issued by a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    StartSingleRegionPoll(RegionId),
    StartAllRegionsPoll,
    StartSingleRegionPush(RegionId),
    StartAllRegionsPush,
    Stop,
    Dump,
    Greeting,
    Heartbeat,
}

impl Command {
    /// Parse message text into a command.
    ///
    /// Slash commands are case-insensitive and may carry a region id;
    /// free-text triggers must match `AirRaidovych | <phrase>` exactly
    /// (surrounding whitespace aside). Returns `None` for anything else,
    /// including a region argument that is not a number.
    pub fn parse(text: &str, default_region: RegionId) -> Option<Self> {
        let text = text.trim();

        if let Some(phrase) = trigger_phrase(text) {
            return match phrase {
                "hello" => Some(Command::Greeting),
                "please run infinite" => Some(Command::Heartbeat),
                "get states" => Some(Command::Dump),
                _ => None,
            };
        }

        let (command, rest) = split_command(text);
        let command = command.to_lowercase();
        let region = if rest.is_empty() {
            default_region
        } else {
            rest.parse().ok()?
        };

        match command.as_str() {
            "/start" => Some(Command::StartSingleRegionPoll(region)),
            "/start2" => Some(Command::StartSingleRegionPush(region)),
            "/startall" if rest.is_empty() => Some(Command::StartAllRegionsPoll),
            "/startall2" if rest.is_empty() => Some(Command::StartAllRegionsPush),
            "/stop" if rest.is_empty() => Some(Command::Stop),
            "/states" if rest.is_empty() => Some(Command::Dump),
            _ => None,
        }
    }
}

fn trigger_phrase(text: &str) -> Option<&str> {
    let (name, phrase) = text.split_once('|')?;
    (name.trim() == BOT_NAME).then(|| phrase.trim())
}

fn split_command(text: &str) -> (&str, &str) {
    let mut parts = text.splitn(2, |c: char| c.is_whitespace());
    let command = parts.next().unwrap_or("");
    let rest = parts.next().unwrap_or("").trim();
    (command, rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Option<Command> {
        Command::parse(text, DEFAULT_REGION_ID)
    }

    #[test]
    fn test_slash_commands() {
        assert_eq!(parse("/start"), Some(Command::StartSingleRegionPoll(25)));
        assert_eq!(parse("/START 12"), Some(Command::StartSingleRegionPoll(12)));
        assert_eq!(parse("/startall"), Some(Command::StartAllRegionsPoll));
        assert_eq!(parse("/start2"), Some(Command::StartSingleRegionPush(25)));
        assert_eq!(parse("/start2 9"), Some(Command::StartSingleRegionPush(9)));
        assert_eq!(parse("/startall2"), Some(Command::StartAllRegionsPush));
        assert_eq!(parse("  /stop  "), Some(Command::Stop));
        assert_eq!(parse("/states"), Some(Command::Dump));
    }

    #[test]
    fn test_triggers() {
        assert_eq!(parse("AirRaidovych | hello"), Some(Command::Greeting));
        assert_eq!(parse("AirRaidovych | please run infinite"), Some(Command::Heartbeat));
        assert_eq!(parse("AirRaidovych | get states"), Some(Command::Dump));
        assert_eq!(parse("AirRaidovych|hello"), Some(Command::Greeting));
        assert_eq!(parse("AirRaidovych | dance"), None);
        assert_eq!(parse("Somebody | hello"), None);
    }

    #[test]
    fn test_rejects_other_text() {
        assert_eq!(parse(""), None);
        assert_eq!(parse("hello"), None);
        assert_eq!(parse("/start kyiv"), None);
        assert_eq!(parse("/stop now"), None);
        assert_eq!(parse("/unknown"), None);
    }

    #[test]
    fn test_custom_default_region() {
        assert_eq!(
            Command::parse("/start", 14),
            Some(Command::StartSingleRegionPoll(14))
        );
    }

    #[test]
    fn test_split_command() {
        assert_eq!(split_command("/start 25"), ("/start", "25"));
        assert_eq!(split_command("/stop"), ("/stop", ""));
    }
}
