//! Inbound command parsing.

/// A chat or terminal command for the command gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Status,
    Unknown(String),
}

impl Command {
    /// Case-insensitive, surrounding whitespace ignored. English and Korean
    /// spellings are both accepted.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        match trimmed.to_lowercase().as_str() {
            "start" | "시작" => Command::Start,
            "stop" | "종료" => Command::Stop,
            "status" | "상태" => Command::Status,
            _ => Command::Unknown(trimmed.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_english_and_korean() {
        assert_eq!(Command::parse("start"), Command::Start);
        assert_eq!(Command::parse("시작"), Command::Start);
        assert_eq!(Command::parse("stop"), Command::Stop);
        assert_eq!(Command::parse("종료"), Command::Stop);
        assert_eq!(Command::parse("status"), Command::Status);
        assert_eq!(Command::parse("상태"), Command::Status);
    }

    #[test]
    fn ignores_case_and_whitespace() {
        assert_eq!(Command::parse("  START \n"), Command::Start);
        assert_eq!(Command::parse("Stop"), Command::Stop);
    }

    #[test]
    fn anything_else_is_unknown() {
        assert_eq!(
            Command::parse(" buy KRW-BTC "),
            Command::Unknown("buy KRW-BTC".into())
        );
        assert_eq!(Command::parse(""), Command::Unknown(String::new()));
        assert_eq!(Command::parse("starting"), Command::Unknown("starting".into()));
    }
}
