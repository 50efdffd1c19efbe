//! Closed event-type/channel taxonomy and the fixed event→channel mapping.

use serde::{Deserialize, Serialize};

/// The closed set of business event types the orchestrator accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Signup,
    Login,
    ResetPassword,
    Purchase,
    FriendRequest,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Signup => "signup",
            Self::Login => "login",
            Self::ResetPassword => "reset_password",
            Self::Purchase => "purchase",
            Self::FriendRequest => "friend_request",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "signup" => Some(Self::Signup),
            "login" => Some(Self::Login),
            "reset_password" => Some(Self::ResetPassword),
            "purchase" => Some(Self::Purchase),
            "friend_request" => Some(Self::FriendRequest),
            _ => None,
        }
    }

    /// Event-type specific queue priority (higher pops first).
    pub fn priority(&self) -> i32 {
        match self {
            Self::ResetPassword => 10,
            Self::Purchase => 8,
            Self::Signup => 5,
            Self::Login => 3,
            Self::FriendRequest => 2,
        }
    }

    /// Fixed, non-dynamic mapping of enabled delivery channels.
    pub fn enabled_channels(&self) -> &'static [Channel] {
        match self {
            Self::Signup => &[Channel::Email],
            Self::Login => &[Channel::Email, Channel::InApp],
            Self::ResetPassword => &[Channel::Email],
            Self::Purchase => &[Channel::Push],
            Self::FriendRequest => &[Channel::InApp],
        }
    }
}

/// The closed set of delivery channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    InApp,
    Push,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::InApp => "in_app",
            Self::Push => "push",
        }
    }
}

/// Request-scoped context passed alongside every orchestrator call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    pub instance_id: String,
    pub source_entity_id: String,
    pub source_entity_type: String,
    pub request_endpoint: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    /// Trace id assigned at ingress and propagated through queue/worker
    pub trace_id: uuid::Uuid,
}

impl Context {
    pub fn new(
        instance_id: impl Into<String>,
        source_entity_id: impl Into<String>,
        source_entity_type: impl Into<String>,
        request_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            source_entity_id: source_entity_id.into(),
            source_entity_type: source_entity_type.into(),
            request_endpoint: request_endpoint.into(),
            ip: None,
            user_agent: None,
            trace_id: uuid::Uuid::new_v4(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enabled_channels_match_fixed_mapping() {
        assert_eq!(EventType::Signup.enabled_channels(), &[Channel::Email]);
        assert_eq!(
            EventType::Login.enabled_channels(),
            &[Channel::Email, Channel::InApp]
        );
        assert_eq!(EventType::Purchase.enabled_channels(), &[Channel::Push]);
        assert_eq!(
            EventType::FriendRequest.enabled_channels(),
            &[Channel::InApp]
        );
    }

    #[test]
    fn priority_ordering() {
        assert!(EventType::ResetPassword.priority() > EventType::Purchase.priority());
        assert!(EventType::Purchase.priority() > EventType::Signup.priority());
        assert!(EventType::Signup.priority() > EventType::Login.priority());
        assert!(EventType::Login.priority() > EventType::FriendRequest.priority());
    }

    #[test]
    fn parse_rejects_unknown_event_type() {
        assert!(EventType::parse("unknown").is_none());
        assert_eq!(EventType::parse("purchase"), Some(EventType::Purchase));
    }
}
