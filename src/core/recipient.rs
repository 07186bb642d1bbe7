/*
 * SPDX-FileCopyrightText: 2026 mapi-mime contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

use crate::core::property::PropertyBag;

/// Where a recipient appears in the address headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RecipientType {
    To,
    Cc,
    Bcc,
}

impl RecipientType {
    pub fn code(self) -> i32 {
        match self {
            RecipientType::To => 1,
            RecipientType::Cc => 2,
            RecipientType::Bcc => 3,
        }
    }

    pub fn from_code(code: i32) -> Option<RecipientType> {
        Some(match code {
            1 => RecipientType::To,
            2 => RecipientType::Cc,
            3 => RecipientType::Bcc,
            _ => return None,
        })
    }
}

/// A single entry of a message's recipient table. The address type
/// distinguishes internet addresses (`SMTP`) from directory-internal
/// ones (`EX`), which must be resolved before a message can be sent to
/// the internet. Distribution lists resolve to their member sets.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Recipient {
    pub kind: RecipientType,
    pub name: Option<String>,
    /// Address type, typically `SMTP` or `EX`.
    pub addr_type: Option<String>,
    pub email: Option<String>,
    /// Extra per-recipient properties beyond the standard columns.
    pub props: PropertyBag,
}

impl Recipient {
    pub fn new(kind: RecipientType) -> Self {
        Recipient {
            kind,
            name: None,
            addr_type: None,
            email: None,
            props: PropertyBag::new(),
        }
    }

    pub fn smtp(kind: RecipientType, name: Option<&str>, email: &str) -> Self {
        Recipient {
            kind,
            name: name.map(str::to_string),
            addr_type: Some("SMTP".into()),
            email: Some(email.into()),
            props: PropertyBag::new(),
        }
    }

    pub fn is_smtp(&self) -> bool {
        self.addr_type
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case("SMTP"))
    }
}
