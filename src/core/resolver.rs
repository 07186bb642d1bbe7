/*
 * SPDX-FileCopyrightText: 2026 mapi-mime contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! Pluggable backends. The conversion engine itself owns no directory,
//! no calendar logic and no named-property registry; callers provide
//! whichever of these their deployment has, and [`NullResolver`] stands
//! in for the rest.

use uuid::Uuid;

use crate::{
    core::property::{NamedPropId, PropertyBag},
    Result,
};

/// What a directory lookup found for an address.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedAddress {
    /// A plain mailbox with its internet address.
    Mailbox {
        name: Option<String>,
        email: String,
    },
    /// A distribution list and its immediate members, each as an
    /// unresolved `(addr_type, address, name)` triple to be resolved in
    /// turn. `email` is the list's own internet address, when the
    /// directory publishes one.
    Group {
        name: Option<String>,
        email: Option<String>,
        members: Vec<GroupMember>,
    },
    /// The directory has no entry for this address.
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupMember {
    pub addr_type: Option<String>,
    pub address: Option<String>,
    pub name: Option<String>,
}

/// Resolves directory-internal addresses to internet addresses or
/// distribution-list member sets.
pub trait DirectoryResolver {
    fn resolve(&self, addr_type: &str, address: &str) -> Result<ResolvedAddress>;
}

/// Maps between named properties and the transient numeric tags a
/// backing store assigned them.
pub trait NamedPropResolver {
    /// The numeric tag for a named property, allocating one if the store
    /// supports it. `None` if the name cannot be mapped.
    fn id_for(&self, name: &NamedPropId) -> Result<Option<u16>>;

    /// The named property behind a transient numeric tag, if any.
    fn name_for(&self, id: u16) -> Result<Option<NamedPropId>>;
}

/// Converts calendar messages to and from their interchange text form.
pub trait CalendarCodec {
    /// Renders a meeting or appointment bag as iCalendar text.
    fn to_icalendar(&self, bag: &PropertyBag) -> Result<String>;

    /// Applies iCalendar text to a property bag.
    fn from_icalendar(&self, text: &str, bag: &mut PropertyBag) -> Result<()>;
}

/// The do-nothing backend: resolves no addresses, maps no names, codes
/// no calendars. Conversions degrade gracefully where it is used; the
/// engine falls back to the container format for calendar content and
/// skips properties whose names cannot be mapped.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullResolver;

impl DirectoryResolver for NullResolver {
    fn resolve(&self, _addr_type: &str, _address: &str) -> Result<ResolvedAddress> {
        Ok(ResolvedAddress::Unknown)
    }
}

impl NamedPropResolver for NullResolver {
    fn id_for(&self, _name: &NamedPropId) -> Result<Option<u16>> {
        Ok(None)
    }

    fn name_for(&self, _id: u16) -> Result<Option<NamedPropId>> {
        Ok(None)
    }
}

impl CalendarCodec for NullResolver {
    fn to_icalendar(&self, _bag: &PropertyBag) -> Result<String> {
        Err(crate::ConvertError::NotFound("calendar codec"))
    }

    fn from_icalendar(&self, _text: &str, _bag: &mut PropertyBag) -> Result<()> {
        Err(crate::ConvertError::NotFound("calendar codec"))
    }
}

/// A static in-memory directory, mainly for tests and small fixed
/// deployments.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    entries: Vec<(String, ResolvedAddress)>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        StaticDirectory::default()
    }

    pub fn mailbox(mut self, address: &str, name: Option<&str>, email: &str) -> Self {
        self.entries.push((
            address.to_ascii_lowercase(),
            ResolvedAddress::Mailbox {
                name: name.map(str::to_string),
                email: email.into(),
            },
        ));
        self
    }

    pub fn group(
        mut self,
        address: &str,
        name: Option<&str>,
        email: Option<&str>,
        members: Vec<GroupMember>,
    ) -> Self {
        self.entries.push((
            address.to_ascii_lowercase(),
            ResolvedAddress::Group {
                name: name.map(str::to_string),
                email: email.map(str::to_string),
                members,
            },
        ));
        self
    }
}

impl DirectoryResolver for StaticDirectory {
    fn resolve(&self, _addr_type: &str, address: &str) -> Result<ResolvedAddress> {
        let key = address.to_ascii_lowercase();
        Ok(self
            .entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.clone())
            .unwrap_or(ResolvedAddress::Unknown))
    }
}

/// A named-property registry backed by a `Uuid` keyspace, allocating
/// tags upward from `0x8000` in registration order.
#[derive(Debug, Clone, Default)]
pub struct StaticNames {
    names: std::cell::RefCell<Vec<NamedPropId>>,
}

impl StaticNames {
    pub fn new() -> Self {
        StaticNames::default()
    }

    pub fn with(guid: Uuid, ids: &[u32]) -> Self {
        let this = StaticNames::new();
        for id in ids {
            this.names.borrow_mut().push(NamedPropId::by_id(guid, *id));
        }
        this
    }
}

impl NamedPropResolver for StaticNames {
    fn id_for(&self, name: &NamedPropId) -> Result<Option<u16>> {
        let mut names = self.names.borrow_mut();
        if let Some(pos) = names.iter().position(|n| n == name) {
            return Ok(Some(0x8000 + pos as u16));
        }
        if names.len() >= 0x7FFF {
            return Err(crate::ConvertError::TooComplex("named property id space exhausted"));
        }
        names.push(name.clone());
        Ok(Some(0x8000 + (names.len() - 1) as u16))
    }

    fn name_for(&self, id: u16) -> Result<Option<NamedPropId>> {
        if id < 0x8000 {
            return Ok(None);
        }
        Ok(self.names.borrow().get((id - 0x8000) as usize).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_directory_is_case_insensitive() {
        let directory = StaticDirectory::new().mailbox(
            "/o=corp/cn=ann",
            Some("Ann"),
            "ann@example.com",
        );
        match directory.resolve("EX", "/O=CORP/CN=ANN").unwrap() {
            ResolvedAddress::Mailbox { email, .. } => assert_eq!(email, "ann@example.com"),
            other => panic!("unexpected resolution: {other:?}"),
        }
        assert_eq!(
            directory.resolve("EX", "/o=corp/cn=nobody").unwrap(),
            ResolvedAddress::Unknown
        );
    }

    #[test]
    fn static_names_allocate_stable_ids() {
        let guid = Uuid::from_u128(0x00062008_0000_0000_c000_000000000046);
        let names = StaticNames::new();
        let first = NamedPropId::by_id(guid, 0x8502);
        let second = NamedPropId::by_name(guid, "x-priority");

        let a = names.id_for(&first).unwrap().unwrap();
        let b = names.id_for(&second).unwrap().unwrap();
        assert_eq!(a, 0x8000);
        assert_eq!(b, 0x8001);
        // Repeat lookups reuse the allocated tag.
        assert_eq!(names.id_for(&first).unwrap(), Some(a));
        assert_eq!(names.name_for(b).unwrap(), Some(second));
        assert_eq!(names.name_for(0x7000).unwrap(), None);
    }
}
