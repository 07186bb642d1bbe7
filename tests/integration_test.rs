/*
 * SPDX-FileCopyrightText: 2026 mapi-mime contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

use mapi_mime::{
    core::tags, tnef, Composer, ContainerDecision, ConvertError, Decomposer, NamedPropId, PropId,
    PropValue, PropertyBag, Recipient, RecipientType,
};
use proptest::prelude::*;

fn note_bag() -> PropertyBag {
    let mut bag = PropertyBag::new();
    bag.set(tags::MESSAGE_CLASS, PropValue::Unicode("IPM.Note".into()));
    bag.set(tags::SUBJECT, PropValue::Unicode("quarterly report".into()));
    bag.set(
        tags::BODY,
        PropValue::Unicode("The numbers are attached.".into()),
    );
    bag.set(
        tags::SENT_REPRESENTING_NAME,
        PropValue::Unicode("Ann Author".into()),
    );
    bag.set(
        tags::SENT_REPRESENTING_ADDRTYPE,
        PropValue::Unicode("SMTP".into()),
    );
    bag.set(
        tags::SENT_REPRESENTING_EMAIL,
        PropValue::Unicode("ann@example.com".into()),
    );
    bag.recipients.push(Recipient::smtp(
        RecipientType::To,
        Some("Bob Reader"),
        "bob@example.com",
    ));
    bag
}

#[test]
fn plain_note_survives_a_full_round_trip() {
    let composed = Composer::new().compose(&note_bag()).unwrap();
    assert_eq!(composed.container, ContainerDecision::Plain);

    let decomposed = Decomposer::new().decompose(&composed.message).unwrap();
    let bag = &decomposed.bag;
    assert_eq!(
        bag.get_tag(tags::MESSAGE_CLASS).and_then(|v| v.as_str()),
        Some("IPM.Note")
    );
    assert_eq!(
        bag.get_tag(tags::SUBJECT).and_then(|v| v.as_str()),
        Some("quarterly report")
    );
    assert_eq!(
        bag.get_tag(tags::SENT_REPRESENTING_EMAIL)
            .and_then(|v| v.as_str()),
        Some("ann@example.com")
    );
    let body = bag
        .get_tag(tags::BODY)
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    assert_eq!(body.trim_end(), "The numbers are attached.");

    assert_eq!(bag.recipients.len(), 1);
    let to = &bag.recipients[0];
    assert_eq!(to.kind, RecipientType::To);
    assert_eq!(to.email.as_deref(), Some("bob@example.com"));
}

#[test]
fn task_round_trips_through_the_container() {
    let mut bag = note_bag();
    bag.set(tags::MESSAGE_CLASS, PropValue::Unicode("IPM.Task".into()));
    bag.set(
        PropId::Named(NamedPropId::by_id(tags::PSETID_COMMON, 0x8101)),
        PropValue::Int32(75),
    );
    let mut report = mapi_mime::Attachment::default();
    report.props.set(
        tags::ATTACH_LONG_FILENAME,
        PropValue::Unicode("report.txt".into()),
    );
    report.props.set(
        tags::ATTACH_MIME_TAG,
        PropValue::Unicode("text/plain".into()),
    );
    report
        .props
        .set(tags::ATTACH_DATA, PropValue::Binary(b"profits: yes".to_vec()));
    bag.attachments.push(report);

    let composed = Composer::new().compose(&bag).unwrap();
    assert_eq!(composed.container, ContainerDecision::Tnef { reason: "task" });
    let text = String::from_utf8_lossy(&composed.message);
    assert!(text.contains("winmail.dat"));

    let decomposed = Decomposer::new().decompose(&composed.message).unwrap();
    let bag = &decomposed.bag;
    // The container's class wins over the MIME default.
    assert_eq!(
        bag.get_tag(tags::MESSAGE_CLASS).and_then(|v| v.as_str()),
        Some("IPM.Task")
    );
    assert_eq!(
        bag.get(&PropId::Named(NamedPropId::by_id(
            tags::PSETID_COMMON,
            0x8101
        )))
        .and_then(|v| v.as_i32()),
        Some(75)
    );
    assert_eq!(bag.attachments.len(), 1);
    let report = &bag.attachments[0];
    assert_eq!(report.filename(), Some("report.txt"));
    assert_eq!(report.content(), Some(b"profits: yes".as_ref()));
    // MIME recipients stay authoritative over the container's table.
    assert_eq!(bag.recipients.len(), 1);
}

#[test]
fn truncated_container_is_corrupt() {
    let stream = tnef::encode(&note_bag(), 1252).unwrap();
    let cut = &stream[..stream.len() - 3];
    assert!(matches!(tnef::decode(cut), Err(ConvertError::Corrupt(_))));
}

#[test]
fn property_bag_survives_json() {
    let mut bag = note_bag();
    bag.set(tags::CONVERSATION_INDEX, PropValue::Binary(vec![1, 2, 3]));
    let json = serde_json::to_string(&bag).unwrap();
    let back: PropertyBag = serde_json::from_str(&json).unwrap();
    assert_eq!(bag, back);
}

proptest! {
    #[test]
    fn container_decode_never_panics(data in proptest::collection::vec(any::<u8>(), 0..512)) {
        let _ = tnef::decode(&data);
    }

    #[test]
    fn text_recovery_is_total(
        bytes in proptest::collection::vec(any::<u8>(), 0..256),
        declared in proptest::option::of("(utf-8|windows-1252|iso-8859-1|koi8-r|bogus)"),
        strict in any::<bool>(),
    ) {
        let _ = mapi_mime::charset::recover_text(
            &bytes,
            declared.as_deref(),
            None,
            Some("us-ascii"),
            strict,
        );
    }
}
