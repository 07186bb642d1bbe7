/*
 * SPDX-FileCopyrightText: 2026 mapi-mime contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! Recipient expansion: directory-internal addresses become internet
//! addresses, distribution lists become their member sets. Cyclic list
//! memberships terminate via a visited set rather than an error, so one
//! bad list cannot sink a message that still has deliverable
//! recipients.

use crate::{
    core::{
        recipient::{Recipient, RecipientType},
        resolver::{DirectoryResolver, GroupMember, ResolvedAddress},
    },
    ConvertError, Diagnostic, DiagnosticCode, Result,
};

/// A fully expanded, internet-addressable recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedRecipient {
    pub kind: RecipientType,
    pub name: Option<String>,
    pub email: String,
}

/// Knobs governing distribution-list handling during expansion.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ExpandPolicy {
    pub max_depth: usize,
    /// Flatten lists even when they publish their own internet address.
    pub force_group_expansion: bool,
    /// Permit flattening the organization-wide "everyone" list.
    pub allow_everyone: bool,
    /// Yield an empty set instead of failing when nothing expands; the
    /// caller then writes an undisclosed-recipients placeholder.
    pub placeholder_recipients: bool,
}

pub(crate) fn expand(
    directory: &dyn DirectoryResolver,
    recipients: &[Recipient],
    policy: ExpandPolicy,
    diags: &mut Vec<Diagnostic>,
) -> Result<Vec<ExpandedRecipient>> {
    let mut out = Vec::new();
    let mut visited: Vec<String> = Vec::new();
    for recipient in recipients {
        if recipient.is_smtp() {
            if let Some(email) = &recipient.email {
                push_unique(
                    &mut out,
                    ExpandedRecipient {
                        kind: recipient.kind,
                        name: recipient.name.clone(),
                        email: email.clone(),
                    },
                );
                continue;
            }
        }
        let member = GroupMember {
            addr_type: recipient.addr_type.clone(),
            address: recipient.email.clone(),
            name: recipient.name.clone(),
        };
        expand_member(
            directory,
            &member,
            recipient.kind,
            0,
            policy,
            &mut visited,
            &mut out,
            diags,
        )?;
    }
    if out.is_empty() {
        if policy.placeholder_recipients {
            return Ok(out);
        }
        return Err(ConvertError::NoRecipients);
    }
    Ok(out)
}

#[allow(clippy::too_many_arguments)]
fn expand_member(
    directory: &dyn DirectoryResolver,
    member: &GroupMember,
    kind: RecipientType,
    depth: usize,
    policy: ExpandPolicy,
    visited: &mut Vec<String>,
    out: &mut Vec<ExpandedRecipient>,
    diags: &mut Vec<Diagnostic>,
) -> Result<()> {
    if depth > policy.max_depth {
        diags.push(Diagnostic::warning(
            DiagnosticCode::DepthExceeded,
            "distribution list nesting limit reached",
        ));
        return Ok(());
    }
    if member
        .addr_type
        .as_deref()
        .is_some_and(|t| t.eq_ignore_ascii_case("SMTP"))
    {
        if let Some(address) = &member.address {
            push_unique(
                out,
                ExpandedRecipient {
                    kind,
                    name: member.name.clone(),
                    email: address.clone(),
                },
            );
        }
        return Ok(());
    }

    let Some(address) = &member.address else {
        diags.push(Diagnostic::warning(
            DiagnosticCode::UnresolvedAddress,
            member.name.clone().unwrap_or_else(|| "(unnamed)".into()),
        ));
        return Ok(());
    };
    let key = address.to_ascii_lowercase();
    if visited.contains(&key) {
        diags.push(Diagnostic::info(
            DiagnosticCode::GroupCycleSkipped,
            address.clone(),
        ));
        return Ok(());
    }
    visited.push(key);

    let addr_type = member.addr_type.as_deref().unwrap_or("EX");
    match directory.resolve(addr_type, address)? {
        ResolvedAddress::Mailbox { name, email } => push_unique(
            out,
            ExpandedRecipient {
                kind,
                name: name.or_else(|| member.name.clone()),
                email,
            },
        ),
        ResolvedAddress::Group { name, email, members } => {
            // A list with a published address of its own travels as one
            // recipient; its membership is not the sender's to disclose.
            if let (Some(list_email), false) = (&email, policy.force_group_expansion) {
                push_unique(
                    out,
                    ExpandedRecipient {
                        kind,
                        name: name.or_else(|| member.name.clone()),
                        email: list_email.clone(),
                    },
                );
                return Ok(());
            }
            if !policy.allow_everyone
                && name
                    .as_deref()
                    .is_some_and(|n| n.eq_ignore_ascii_case("everyone"))
            {
                return Err(ConvertError::PermissionDenied(
                    "expansion of the everyone list",
                ));
            }
            for inner in &members {
                expand_member(
                    directory, inner, kind, depth + 1, policy, visited, out, diags,
                )?;
            }
        }
        ResolvedAddress::Unknown => diags.push(Diagnostic::warning(
            DiagnosticCode::UnresolvedAddress,
            address.clone(),
        )),
    }
    Ok(())
}

fn push_unique(out: &mut Vec<ExpandedRecipient>, recipient: ExpandedRecipient) {
    let duplicate = out
        .iter()
        .any(|r| r.kind == recipient.kind && r.email.eq_ignore_ascii_case(&recipient.email));
    if !duplicate {
        out.push(recipient);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resolver::StaticDirectory;

    fn policy() -> ExpandPolicy {
        ExpandPolicy {
            max_depth: 16,
            force_group_expansion: false,
            allow_everyone: false,
            placeholder_recipients: false,
        }
    }

    fn ex(kind: RecipientType, address: &str) -> Recipient {
        Recipient {
            kind,
            name: None,
            addr_type: Some("EX".into()),
            email: Some(address.into()),
            props: Default::default(),
        }
    }

    fn smtp_member(email: &str) -> GroupMember {
        GroupMember {
            addr_type: Some("SMTP".into()),
            address: Some(email.into()),
            name: None,
        }
    }

    fn ex_member(address: &str) -> GroupMember {
        GroupMember {
            addr_type: Some("EX".into()),
            address: Some(address.into()),
            name: None,
        }
    }

    #[test]
    fn smtp_recipients_pass_through() {
        let directory = StaticDirectory::new();
        let recipients = vec![Recipient::smtp(
            RecipientType::To,
            Some("Pat"),
            "pat@example.com",
        )];
        let mut diags = Vec::new();
        let out = expand(&directory, &recipients, policy(), &mut diags).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].email, "pat@example.com");
        assert!(diags.is_empty());
    }

    #[test]
    fn group_expands_to_members() {
        let directory = StaticDirectory::new()
            .group(
                "/o=corp/cn=team",
                Some("Team"),
                None,
                vec![smtp_member("a@example.com"), ex_member("/o=corp/cn=b")],
            )
            .mailbox("/o=corp/cn=b", Some("B"), "b@example.com");
        let mut diags = Vec::new();
        let out = expand(
            &directory,
            &[ex(RecipientType::To, "/o=corp/cn=team")],
            policy(),
            &mut diags,
        )
        .unwrap();
        let emails: Vec<&str> = out.iter().map(|r| r.email.as_str()).collect();
        assert_eq!(emails, ["a@example.com", "b@example.com"]);
    }

    #[test]
    fn published_list_address_travels_whole() {
        let directory = StaticDirectory::new().group(
            "/o=corp/cn=team",
            Some("Team"),
            Some("team@example.com"),
            vec![smtp_member("a@example.com"), smtp_member("b@example.com")],
        );
        let mut diags = Vec::new();
        let out = expand(
            &directory,
            &[ex(RecipientType::To, "/o=corp/cn=team")],
            policy(),
            &mut diags,
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].email, "team@example.com");
        assert_eq!(out[0].name.as_deref(), Some("Team"));

        let forced = ExpandPolicy {
            force_group_expansion: true,
            ..policy()
        };
        let out = expand(
            &directory,
            &[ex(RecipientType::To, "/o=corp/cn=team")],
            forced,
            &mut diags,
        )
        .unwrap();
        let emails: Vec<&str> = out.iter().map(|r| r.email.as_str()).collect();
        assert_eq!(emails, ["a@example.com", "b@example.com"]);
    }

    #[test]
    fn everyone_expansion_is_denied() {
        let directory = StaticDirectory::new().group(
            "/o=corp/cn=everyone",
            Some("Everyone"),
            None,
            vec![smtp_member("a@example.com")],
        );
        let mut diags = Vec::new();
        let err = expand(
            &directory,
            &[ex(RecipientType::To, "/o=corp/cn=everyone")],
            policy(),
            &mut diags,
        )
        .unwrap_err();
        assert!(matches!(err, ConvertError::PermissionDenied(_)));

        let permissive = ExpandPolicy {
            allow_everyone: true,
            ..policy()
        };
        let out = expand(
            &directory,
            &[ex(RecipientType::To, "/o=corp/cn=everyone")],
            permissive,
            &mut diags,
        )
        .unwrap();
        assert_eq!(out[0].email, "a@example.com");
    }

    #[test]
    fn placeholder_policy_tolerates_empty_expansion() {
        let directory = StaticDirectory::new();
        let lenient = ExpandPolicy {
            placeholder_recipients: true,
            ..policy()
        };
        let mut diags = Vec::new();
        let out = expand(
            &directory,
            &[ex(RecipientType::To, "/o=corp/cn=ghost")],
            lenient,
            &mut diags,
        )
        .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn cyclic_groups_terminate() {
        let directory = StaticDirectory::new()
            .group(
                "/o=corp/cn=x",
                None,
                None,
                vec![smtp_member("x@example.com"), ex_member("/o=corp/cn=y")],
            )
            .group(
                "/o=corp/cn=y",
                None,
                None,
                vec![smtp_member("y@example.com"), ex_member("/o=corp/cn=x")],
            );
        let mut diags = Vec::new();
        let out = expand(
            &directory,
            &[ex(RecipientType::To, "/o=corp/cn=x")],
            policy(),
            &mut diags,
        )
        .unwrap();
        let emails: Vec<&str> = out.iter().map(|r| r.email.as_str()).collect();
        assert_eq!(emails, ["x@example.com", "y@example.com"]);
        assert!(diags
            .iter()
            .any(|d| d.code == DiagnosticCode::GroupCycleSkipped));
    }

    #[test]
    fn all_unresolved_is_no_recipients() {
        let directory = StaticDirectory::new();
        let mut diags = Vec::new();
        let err = expand(
            &directory,
            &[ex(RecipientType::To, "/o=corp/cn=ghost")],
            policy(),
            &mut diags,
        )
        .unwrap_err();
        assert!(matches!(err, ConvertError::NoRecipients));
        assert!(diags
            .iter()
            .any(|d| d.code == DiagnosticCode::UnresolvedAddress));
    }

    #[test]
    fn duplicates_are_collapsed() {
        let directory = StaticDirectory::new();
        let recipients = vec![
            Recipient::smtp(RecipientType::To, None, "pat@example.com"),
            Recipient::smtp(RecipientType::To, None, "PAT@example.com"),
            Recipient::smtp(RecipientType::Cc, None, "pat@example.com"),
        ];
        let mut diags = Vec::new();
        let out = expand(&directory, &recipients, policy(), &mut diags).unwrap();
        // Same mailbox on a different header line is kept.
        assert_eq!(out.len(), 2);
    }
}
