//! Inbound/outbound classification of messages
//!
//! The backend's outgoing flag is authoritative when a row carries it, but
//! some rows omit it. The remaining rules are string-equality fallbacks.
//! Rules are evaluated in order and the first match classifies the message
//! as outbound; if none match it is inbound.

use std::collections::BTreeSet;

use crate::models::Message;

/// Sender name the backend uses for rows written by the account owner
pub const SENTINEL_SENDER_NAME: &str = "Me";

/// Which side of the thread a message is rendered on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Outbound,
    Inbound,
}

/// One signal that marks a message as sent by the local user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassificationRule {
    /// Backend outgoing flag is `true` or `1`
    Flag,
    /// `sender_name` equals the given sentinel
    SentinelName(String),
    /// `sender_number` is one of the local identities
    KnownNumber,
}

impl ClassificationRule {
    fn matches(&self, message: &Message, identities: &LocalIdentities) -> bool {
        match self {
            ClassificationRule::Flag => message.outgoing.is_some_and(|f| f.is_set()),
            ClassificationRule::SentinelName(name) => {
                message.sender_name.as_deref() == Some(name.as_str())
            }
            ClassificationRule::KnownNumber => message
                .sender_number
                .as_deref()
                .is_some_and(|n| identities.contains(n)),
        }
    }
}

/// The set of sender numbers that count as "me"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalIdentities(BTreeSet<String>);

impl LocalIdentities {
    /// Build from configured numbers, adding each number's national form.
    ///
    /// `+31612345678` also registers `0612345678`.
    pub fn from_numbers<I, S>(numbers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = BTreeSet::new();
        for number in numbers {
            let number = number.as_ref().trim();
            if number.is_empty() {
                continue;
            }
            if let Some(national) = national_format(number) {
                set.insert(national);
            }
            set.insert(number.to_string());
        }
        Self(set)
    }

    /// Build from exact strings without adding variants
    pub fn exact<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(values.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, number: &str) -> bool {
        self.0.contains(number)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Replace a leading `+` and two-digit country code with `0`
fn national_format(number: &str) -> Option<String> {
    let rest = number.strip_prefix('+')?;
    let mut chars = rest.chars();
    let (a, b) = (chars.next()?, chars.next()?);
    if a.is_ascii_digit() && b.is_ascii_digit() {
        Some(format!("0{}", chars.as_str()))
    } else {
        None
    }
}

/// Ordered rule list plus the identities the number rule checks against
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<ClassificationRule>,
    identities: LocalIdentities,
}

impl Classifier {
    /// Standard rule order: flag, sentinel name, known number
    pub fn new(identities: LocalIdentities) -> Self {
        Self::with_rules(
            vec![
                ClassificationRule::Flag,
                ClassificationRule::SentinelName(SENTINEL_SENDER_NAME.to_string()),
                ClassificationRule::KnownNumber,
            ],
            identities,
        )
    }

    pub fn with_rules(rules: Vec<ClassificationRule>, identities: LocalIdentities) -> Self {
        Self { rules, identities }
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    pub fn identities(&self) -> &LocalIdentities {
        &self.identities
    }

    /// First rule that marks the message as outgoing, if any
    pub fn matching_rule(&self, message: &Message) -> Option<&ClassificationRule> {
        self.rules
            .iter()
            .find(|rule| rule.matches(message, &self.identities))
    }

    pub fn is_outgoing(&self, message: &Message) -> bool {
        self.matching_rule(message).is_some()
    }

    pub fn side(&self, message: &Message) -> Side {
        if self.is_outgoing(message) {
            Side::Outbound
        } else {
            Side::Inbound
        }
    }
}

/// Classify with the standard rule order
pub fn is_outgoing(message: &Message, identities: &LocalIdentities) -> bool {
    [
        ClassificationRule::Flag,
        ClassificationRule::SentinelName(SENTINEL_SENDER_NAME.to_string()),
        ClassificationRule::KnownNumber,
    ]
    .iter()
    .any(|rule| rule.matches(message, identities))
}
