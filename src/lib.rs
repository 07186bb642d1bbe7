/*
 * SPDX-FileCopyrightText: 2026 mapi-mime contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! # mapi-mime
//!
//! _mapi-mime_ is the message-format conversion core of a groupware mail
//! gateway: it converts a structured, property-bag representation of an
//! e-mail message (the kind produced and consumed by a MAPI-style messaging
//! store) into wire-format Internet mail and back, and encodes/decodes the
//! legacy TNEF binary container that carries structured properties and
//! attachments plain MIME cannot represent (meeting metadata, voting
//! options, rich formatting).
//!
//! The library is a mapping and decision layer: MIME tokenization, part
//! boundary splitting and transfer-encoding codecs are provided by
//! [`mail-parser`](https://crates.io/crates/mail-parser) on the inbound
//! side and [`mail-builder`](https://crates.io/crates/mail-builder) on the
//! outbound side. Everything above that layer is implemented here:
//!
//! - **Outbound composition** ([`outbound::Composer`]): property bag →
//!   MIME message, including recipient and distribution-list expansion
//!   policy, plain/HTML/rich-text body selection, inline-vs-regular
//!   attachment placement, the TNEF-or-iCalendar decision, and verbatim
//!   passthrough of already-signed S/MIME payloads.
//! - **Inbound decomposition** ([`inbound::Decomposer`]): raw RFC 5322
//!   bytes → property bag, including recursive multipart dissection with
//!   alternative-part preference, cascading character-set recovery,
//!   embedded-message handling and TNEF merging.
//! - **TNEF codec** ([`tnef`]): symmetric byte-level encode/decode of the
//!   container stream, with named properties, multi-value types, nested
//!   embedded messages, per-block checksums and 4-byte value alignment.
//!
//! All conversions are synchronous and hold no global state; directory
//! resolution and iCalendar encoding are injected through the traits in
//! [`core::resolver`]. In the spirit of the Robustness Principle the
//! decomposer makes a best effort on malformed input: a bad alternative
//! part, an undecodable character set or a corrupt TNEF stream degrade to
//! diagnostics and opaque attachments rather than failing the message,
//! while conditions that would produce an unusable result (no sender, no
//! recipients, corrupt container on decode) surface as typed errors.

pub mod charset;
pub mod core;
pub mod inbound;
pub mod outbound;
pub mod rtf;
pub mod tnef;

use std::fmt;

use thiserror::Error;

pub use crate::core::{
    message::MessageClass,
    property::{
        AttachMethod, Attachment, NamedKind, NamedPropId, PropId, PropType, PropValue,
        PropertyBag, RenderInfo,
    },
    recipient::{Recipient, RecipientType},
    resolver::{
        CalendarCodec, DirectoryResolver, GroupMember, NamedPropResolver, NullResolver,
        ResolvedAddress,
    },
};
pub use crate::inbound::{Decomposed, Decomposer};
pub use crate::outbound::{Composed, Composer, ContainerDecision};

/// Errors returned by the conversion entry points.
///
/// `NoRecipients` and `NoSender` are deliberately distinct from the generic
/// failures so a calling spooler can cancel a send outright instead of
/// retrying it.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// A caller contract was violated (null/empty required input).
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),

    /// A mandatory property or header was absent.
    #[error("missing required {0}")]
    NotFound(&'static str),

    /// A recursion or loop guard tripped.
    #[error("input exceeds complexity limits: {0}")]
    TooComplex(&'static str),

    /// An unexpected fault in this library or one of its collaborators.
    #[error("conversion failed: {0}")]
    CallFailed(String),

    /// A structurally invalid TNEF container.
    #[error("corrupt container: {0}")]
    Corrupt(&'static str),

    /// A policy-blocked operation.
    #[error("denied by policy: {0}")]
    PermissionDenied(&'static str),

    /// The message has no usable recipient.
    #[error("message has no usable recipients")]
    NoRecipients,

    /// The message has no usable sender address.
    #[error("message has no usable sender")]
    NoSender,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for `Result<T, ConvertError>`.
pub type Result<T> = std::result::Result<T, ConvertError>;

/// Classification of a recoverable condition noted during a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DiagnosticCode {
    /// A declared character set was unknown and a fallback was used.
    UnknownCharset,
    /// Text was decoded with replacement characters.
    LossyCharset,
    /// A text part could not be decoded at all and was kept as an
    /// attachment.
    UndecodableText,
    /// A TNEF part failed to decode and was ignored.
    BrokenContainer,
    /// An alternative body candidate failed and the next one was used.
    AlternativePartFailed,
    /// iCalendar encode/decode failed and a fallback was used.
    CalendarFailed,
    /// A cyclic distribution-list branch was skipped.
    GroupCycleSkipped,
    /// An address could not be resolved against the directory.
    UnresolvedAddress,
    /// Nesting exceeded the recursion limit and a branch was flattened.
    DepthExceeded,
    /// A property could not be serialized and was left out.
    SkippedProperty,
    /// A compressed rich-text body could not be read.
    BrokenRichText,
}

/// Severity of a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Severity {
    Info,
    Warning,
}

/// A recoverable-but-noteworthy condition encountered while converting a
/// message. Diagnostics never imply that the conversion failed.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub detail: String,
}

impl Diagnostic {
    pub fn info(code: DiagnosticCode, detail: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Info,
            code,
            detail: detail.into(),
        }
    }

    pub fn warning(code: DiagnosticCode, detail: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            code,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.detail)
    }
}
