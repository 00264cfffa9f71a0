use std::fmt;

/// Unique handle of a conversation partner (the platform chat id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChatIdentity(pub i64);

impl fmt::Display for ChatIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Platform handle to media that was already uploaded and can be re-sent
/// without uploading it again.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaRef(pub String);

impl MediaRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
    Document,
}

impl MediaKind {
    pub fn label(&self) -> &'static str {
        match self {
            MediaKind::Photo => "PHOTO",
            MediaKind::Video => "VIDEO",
            MediaKind::Document => "FILE",
        }
    }
}

/// Bot commands the service understands. Anything else is `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Admin,
    Cancel,
    GetId,
    StopGetId,
    Other(String),
}

impl Command {
    /// Parse `/name`, `/name@botname` and `/name payload` forms.
    /// Returns `None` when the text is not a command at all.
    pub fn parse(text: &str) -> Option<Self> {
        let head = text.trim_start().strip_prefix('/')?.split_whitespace().next()?;
        let name = head.split('@').next().unwrap_or(head).to_lowercase();
        if name.is_empty() {
            return None;
        }

        Some(match name.as_str() {
            "start" => Command::Start,
            "admin" => Command::Admin,
            "cancel" => Command::Cancel,
            "getid" => Command::GetId,
            "stopgetid" => Command::StopGetId,
            _ => Command::Other(name),
        })
    }
}

/// Button-click payloads carried in inline keyboards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    NoAccount,
    HaveAccount,
    RegisteredDone,
    BroadcastConfirm,
    BroadcastCancel,
    Unknown(String),
}

impl CallbackAction {
    pub fn parse(data: &str) -> Self {
        match data {
            "no_account" => CallbackAction::NoAccount,
            "have_account" => CallbackAction::HaveAccount,
            "registered_done" => CallbackAction::RegisteredDone,
            "BC_CONFIRM" => CallbackAction::BroadcastConfirm,
            "BC_CANCEL" => CallbackAction::BroadcastCancel,
            other => CallbackAction::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CallbackAction::NoAccount => "no_account",
            CallbackAction::HaveAccount => "have_account",
            CallbackAction::RegisteredDone => "registered_done",
            CallbackAction::BroadcastConfirm => "BC_CONFIRM",
            CallbackAction::BroadcastCancel => "BC_CANCEL",
            CallbackAction::Unknown(data) => data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_command() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/getid"), Some(Command::GetId));
        assert_eq!(Command::parse("/stopgetid"), Some(Command::StopGetId));
    }

    #[test]
    fn test_parse_command_with_bot_suffix_and_payload() {
        assert_eq!(Command::parse("/start@funnel_bot"), Some(Command::Start));
        assert_eq!(Command::parse("/start ref42"), Some(Command::Start));
        assert_eq!(Command::parse("/ADMIN"), Some(Command::Admin));
    }

    #[test]
    fn test_parse_non_command() {
        assert_eq!(Command::parse("player42"), None);
        assert_eq!(Command::parse("/"), None);
        assert_eq!(
            Command::parse("/help"),
            Some(Command::Other("help".to_string()))
        );
    }

    #[test]
    fn test_callback_actions() {
        assert_eq!(CallbackAction::parse("BC_CONFIRM"), CallbackAction::BroadcastConfirm);
        assert_eq!(CallbackAction::parse("have_account").as_str(), "have_account");
        assert_eq!(
            CallbackAction::parse("stale"),
            CallbackAction::Unknown("stale".to_string())
        );
    }
}
