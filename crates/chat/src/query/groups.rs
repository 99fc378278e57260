//! Grouping of consecutive messages into display clusters
//!
//! A new group starts on the first message, whenever the side changes,
//! and between two inbound messages from different senders. Outbound
//! messages never split on sender identity since the local user is a
//! single sender. Groups are produced lazily in one left-to-right pass
//! and are recomputed from scratch on every poll.

use chrono::{DateTime, Utc};
use std::iter::Peekable;

use crate::classify::{Classifier, Side};
use crate::models::{Message, MessageId};

/// A message paired with its classification
#[derive(Debug, Clone, Copy)]
pub struct ClassifiedMessage<'a> {
    pub message: &'a Message,
    pub side: Side,
}

impl<'a> ClassifiedMessage<'a> {
    pub fn new(message: &'a Message, side: Side) -> Self {
        Self { message, side }
    }

    /// Sender number that matters for grouping; outbound has none
    fn group_sender(&self) -> Option<&'a str> {
        match self.side {
            Side::Outbound => None,
            Side::Inbound => self.message.sender_number.as_deref(),
        }
    }

    fn continues(&self, next: &ClassifiedMessage<'_>) -> bool {
        self.side == next.side
            && (self.side == Side::Outbound || self.group_sender() == next.group_sender())
    }
}

/// A run of consecutive messages rendered as one visual cluster
#[derive(Debug, Clone)]
pub struct DisplayGroup<'a> {
    pub side: Side,
    /// Sender shared by the group; always `None` for outbound groups
    pub sender_number: Option<&'a str>,
    pub messages: Vec<&'a Message>,
}

/// Header shown above the first message of a group
#[derive(Debug, Clone, PartialEq)]
pub struct GroupHeader<'a> {
    /// Sender name or number; outbound groups show no label
    pub sender_label: Option<&'a str>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl<'a> DisplayGroup<'a> {
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Header data, taken from the first message only
    pub fn header(&self) -> GroupHeader<'a> {
        let first = self.messages.first().copied();
        GroupHeader {
            sender_label: match self.side {
                Side::Outbound => None,
                Side::Inbound => first.and_then(Message::sender_label),
            },
            timestamp: first.and_then(|m| m.received_at),
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = &'a MessageId> + '_ {
        self.messages.iter().map(|&m| &m.id)
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.messages.iter().any(|m| &m.id == id)
    }
}

/// Lazy iterator of [`DisplayGroup`]s over classified messages
pub struct MessageGroups<'a, I>
where
    I: Iterator<Item = ClassifiedMessage<'a>>,
{
    inner: Peekable<I>,
}

impl<'a, I> Iterator for MessageGroups<'a, I>
where
    I: Iterator<Item = ClassifiedMessage<'a>>,
{
    type Item = DisplayGroup<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.inner.next()?;
        let mut group = DisplayGroup {
            side: first.side,
            sender_number: first.group_sender(),
            messages: vec![first.message],
        };

        let mut prev = first;
        while let Some(next) = self.inner.next_if(|next| prev.continues(next)) {
            group.messages.push(next.message);
            prev = next;
        }

        Some(group)
    }
}

/// Group already-classified messages, preserving input order
pub fn group_messages<'a, I>(items: I) -> MessageGroups<'a, I::IntoIter>
where
    I: IntoIterator<Item = ClassifiedMessage<'a>>,
{
    MessageGroups {
        inner: items.into_iter().peekable(),
    }
}

/// Classify each message and group the result
pub fn classify_and_group<'a>(
    messages: &'a [Message],
    classifier: &'a Classifier,
) -> MessageGroups<'a, impl Iterator<Item = ClassifiedMessage<'a>>> {
    group_messages(
        messages
            .iter()
            .map(move |m| ClassifiedMessage::new(m, classifier.side(m))),
    )
}
