/*
 * SPDX-FileCopyrightText: 2026 mapi-mime contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

use crate::core::{
    property::{NamedPropId, PropId, PropValue, PropertyBag},
    tags,
};

/// The broad family a message class string falls into. Classification
/// is by prefix, so custom subclasses such as `IPM.Task.MyForm` keep
/// their family's conversion behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MessageClass {
    /// Ordinary mail, `IPM.Note` and unsuffixed subclasses.
    Note,
    /// `IPM.Note.SMIME.MultipartSigned`: clear-signed, body carried verbatim.
    SmimeSigned,
    /// `IPM.Note.SMIME`: opaque-signed or encrypted blob.
    SmimeOpaque,
    /// `IPM.Task` family.
    Task,
    /// `IPM.Appointment` family.
    Appointment,
    /// `IPM.Schedule.Meeting` family (requests, responses, cancellations).
    MeetingRequest,
    /// `IPM.Contact` family.
    Contact,
    /// `IPM.StickyNote` family.
    StickyNote,
    /// Anything else.
    Other,
}

impl MessageClass {
    pub fn classify(class: &str) -> MessageClass {
        // Longest prefixes first; class strings compare case-insensitively.
        let c = class.to_ascii_uppercase();
        if c == "IPM.NOTE.SMIME.MULTIPARTSIGNED"
            || c.starts_with("IPM.NOTE.SMIME.MULTIPARTSIGNED.")
        {
            MessageClass::SmimeSigned
        } else if c == "IPM.NOTE.SMIME" || c.starts_with("IPM.NOTE.SMIME.") {
            MessageClass::SmimeOpaque
        } else if c == "IPM.NOTE" || c.starts_with("IPM.NOTE.") || c == "IPM" {
            MessageClass::Note
        } else if c == "IPM.TASK" || c.starts_with("IPM.TASK.") {
            MessageClass::Task
        } else if c == "IPM.APPOINTMENT" || c.starts_with("IPM.APPOINTMENT.") {
            MessageClass::Appointment
        } else if c == "IPM.SCHEDULE.MEETING" || c.starts_with("IPM.SCHEDULE.MEETING.") {
            MessageClass::MeetingRequest
        } else if c == "IPM.CONTACT" || c.starts_with("IPM.CONTACT.") {
            MessageClass::Contact
        } else if c == "IPM.STICKYNOTE" || c.starts_with("IPM.STICKYNOTE.") {
            MessageClass::StickyNote
        } else {
            MessageClass::Other
        }
    }

    /// Classes whose semantics do not survive a plain MIME rendering and
    /// therefore require the container format when no richer mapping is
    /// available.
    pub fn needs_rich_transport(self) -> bool {
        matches!(
            self,
            MessageClass::Task
                | MessageClass::StickyNote
                | MessageClass::Contact
                | MessageClass::Other
        )
    }

    pub fn is_calendar(self) -> bool {
        matches!(self, MessageClass::Appointment | MessageClass::MeetingRequest)
    }
}

/// Read-only typed views over a message bag's well-known properties.
pub trait MessageView {
    fn bag(&self) -> &PropertyBag;

    fn message_class(&self) -> &str {
        self.bag()
            .get_tag(tags::MESSAGE_CLASS)
            .and_then(|v| v.as_str())
            .unwrap_or("IPM.Note")
    }

    fn class(&self) -> MessageClass {
        MessageClass::classify(self.message_class())
    }

    fn subject(&self) -> Option<&str> {
        self.bag().get_tag(tags::SUBJECT).and_then(|v| v.as_str())
    }

    fn body_text(&self) -> Option<&str> {
        self.bag().get_tag(tags::BODY).and_then(|v| v.as_str())
    }

    fn body_html(&self) -> Option<&[u8]> {
        self.bag().get_tag(tags::HTML).and_then(|v| v.as_bytes())
    }

    fn rtf_compressed(&self) -> Option<&[u8]> {
        self.bag()
            .get_tag(tags::RTF_COMPRESSED)
            .and_then(|v| v.as_bytes())
    }

    fn internet_codepage(&self) -> Option<u16> {
        self.bag()
            .get_tag(tags::INTERNET_CPID)
            .and_then(|v| v.as_i32())
            .and_then(|v| u16::try_from(v).ok())
    }

    /// Whether a response to this message carries a vote, detected via
    /// the voting verb stream named property.
    fn has_voting_buttons(&self) -> bool {
        let verb = PropId::Named(NamedPropId::by_id(tags::PSETID_COMMON, tags::LID_VERB_STREAM));
        self.bag().contains(&verb)
    }

    /// Whether the message was re-sent by a delegate acting under a rule.
    fn is_delegated(&self) -> bool {
        self.bag()
            .get_tag(tags::DELEGATED_BY_RULE)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Whether an active reminder is set. Reminder state has no MIME
    /// rendering at all.
    fn has_reminder(&self) -> bool {
        let reminder =
            PropId::Named(NamedPropId::by_id(tags::PSETID_COMMON, tags::LID_REMINDER_SET));
        self.bag()
            .get(&reminder)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Whether MIME alone can represent this message without losing
    /// class-specific semantics.
    fn fits_plain_mime(&self) -> bool {
        !self.class().needs_rich_transport()
            && !self.has_voting_buttons()
            && !self.is_delegated()
            && !self.has_reminder()
    }
}

impl MessageView for PropertyBag {
    fn bag(&self) -> &PropertyBag {
        self
    }
}

/// Maps the numeric `IMPORTANCE` value to its header token, if it is
/// off-default.
pub fn importance_header(bag: &PropertyBag) -> Option<&'static str> {
    match bag.get_tag(tags::IMPORTANCE).and_then(|v| v.as_i32()) {
        Some(0) => Some("low"),
        Some(2) => Some("high"),
        _ => None,
    }
}

/// Maps the numeric `SENSITIVITY` value to its header token, if it is
/// off-default.
pub fn sensitivity_header(bag: &PropertyBag) -> Option<&'static str> {
    match bag.get_tag(tags::SENSITIVITY).and_then(|v| v.as_i32()) {
        Some(1) => Some("Personal"),
        Some(2) => Some("Private"),
        Some(3) => Some("Company-Confidential"),
        _ => None,
    }
}

/// Parses an `Importance` header token back to its numeric value.
pub fn importance_from_header(value: &str) -> Option<i32> {
    match value.trim().to_ascii_lowercase().as_str() {
        "low" => Some(0),
        "normal" => Some(1),
        "high" => Some(2),
        _ => None,
    }
}

/// Parses a `Sensitivity` header token back to its numeric value.
pub fn sensitivity_from_header(value: &str) -> Option<i32> {
    match value.trim().to_ascii_lowercase().as_str() {
        "personal" => Some(1),
        "private" => Some(2),
        "company-confidential" => Some(3),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_by_prefix() {
        assert_eq!(MessageClass::classify("IPM.Note"), MessageClass::Note);
        assert_eq!(MessageClass::classify("ipm.note.custom"), MessageClass::Note);
        assert_eq!(
            MessageClass::classify("IPM.Note.SMIME"),
            MessageClass::SmimeOpaque
        );
        assert_eq!(
            MessageClass::classify("IPM.Note.SMIME.MultipartSigned"),
            MessageClass::SmimeSigned
        );
        assert_eq!(MessageClass::classify("IPM.Task.MyForm"), MessageClass::Task);
        assert_eq!(
            MessageClass::classify("IPM.Schedule.Meeting.Request"),
            MessageClass::MeetingRequest
        );
        assert_eq!(MessageClass::classify("IPM.TaskRequest"), MessageClass::Other);
        assert_eq!(MessageClass::classify("REPORT.IPM.Note.NDR"), MessageClass::Other);
    }

    #[test]
    fn rich_transport_detection() {
        let mut bag = PropertyBag::new();
        assert!(bag.fits_plain_mime());

        bag.set(tags::MESSAGE_CLASS, PropValue::Unicode("IPM.Task".into()));
        assert!(!bag.fits_plain_mime());

        bag.set(tags::MESSAGE_CLASS, PropValue::Unicode("IPM.Note".into()));
        assert!(bag.fits_plain_mime());
        bag.set(
            PropId::Named(NamedPropId::by_id(tags::PSETID_COMMON, tags::LID_VERB_STREAM)),
            PropValue::Binary(vec![1, 2, 3]),
        );
        assert!(!bag.fits_plain_mime());
    }

    #[test]
    fn reminder_blocks_plain_mime() {
        let mut bag = PropertyBag::new();
        assert!(!bag.has_reminder());
        bag.set(
            PropId::Named(NamedPropId::by_id(
                tags::PSETID_COMMON,
                tags::LID_REMINDER_SET,
            )),
            PropValue::Bool(true),
        );
        assert!(bag.has_reminder());
        assert!(!bag.fits_plain_mime());
    }

    #[test]
    fn importance_and_sensitivity_tokens() {
        let mut bag = PropertyBag::new();
        assert_eq!(importance_header(&bag), None);
        bag.set(tags::IMPORTANCE, PropValue::Int32(1));
        assert_eq!(importance_header(&bag), None);
        bag.set(tags::IMPORTANCE, PropValue::Int32(2));
        assert_eq!(importance_header(&bag), Some("high"));
        assert_eq!(importance_from_header(" High "), Some(2));
        bag.set(tags::SENSITIVITY, PropValue::Int32(2));
        assert_eq!(sensitivity_header(&bag), Some("Private"));
        assert_eq!(sensitivity_from_header("company-confidential"), Some(3));
    }
}
