// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const MAX_PART_BYTES: usize = 1023;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum JidError {
    #[error("address is empty")]
    Empty,
    #[error("address must not contain whitespace")]
    Whitespace,
    #[error("address has an empty local part before '@'")]
    EmptyLocal,
    #[error("address has an empty domain")]
    EmptyDomain,
    #[error("address has an empty resource after '/'")]
    EmptyResource,
    #[error("address {part} part exceeds {MAX_PART_BYTES} bytes")]
    PartTooLong { part: &'static str },
}

/// An address of the form `local@domain/resource`, with local part and
/// domain case-folded. Only the domain is mandatory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Jid(String);

impl Jid {
    pub fn parse(raw: &str) -> Result<Self, JidError> {
        if raw.is_empty() {
            return Err(JidError::Empty);
        }
        if raw.chars().any(char::is_whitespace) {
            return Err(JidError::Whitespace);
        }

        let (bare, resource) = match raw.split_once('/') {
            Some((bare, resource)) => (bare, Some(resource)),
            None => (raw, None),
        };
        let (local, domain) = match bare.split_once('@') {
            Some((local, domain)) => (Some(local), domain),
            None => (None, bare),
        };

        if local.is_some_and(str::is_empty) {
            return Err(JidError::EmptyLocal);
        }
        if domain.is_empty() {
            return Err(JidError::EmptyDomain);
        }
        if resource.is_some_and(str::is_empty) {
            return Err(JidError::EmptyResource);
        }
        for (part, value) in [
            ("local", local),
            ("domain", Some(domain)),
            ("resource", resource),
        ] {
            if value.is_some_and(|value| value.len() > MAX_PART_BYTES) {
                return Err(JidError::PartTooLong { part });
            }
        }

        let mut canonical = String::with_capacity(raw.len());
        if let Some(local) = local {
            canonical.push_str(&local.to_lowercase());
            canonical.push('@');
        }
        canonical.push_str(&domain.to_lowercase());
        if let Some(resource) = resource {
            canonical.push('/');
            canonical.push_str(resource);
        }
        Ok(Self(canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn bare_str(&self) -> &str {
        self.0.split_once('/').map_or(self.0.as_str(), |(bare, _)| bare)
    }

    pub fn local(&self) -> Option<&str> {
        self.bare_str().split_once('@').map(|(local, _)| local)
    }

    pub fn domain(&self) -> &str {
        let bare = self.bare_str();
        bare.split_once('@').map_or(bare, |(_, domain)| domain)
    }

    pub fn resource(&self) -> Option<&str> {
        self.0.split_once('/').map(|(_, resource)| resource)
    }

    pub fn is_bare(&self) -> bool {
        self.resource().is_none()
    }

    pub fn bare(&self) -> Self {
        Self(self.bare_str().to_owned())
    }

    pub fn domain_jid(&self) -> Self {
        Self(self.domain().to_owned())
    }

    pub fn xmpp_uri(&self) -> String {
        format!("xmpp:{}", self.bare_str())
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Jid {
    type Err = JidError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for Jid {
    type Error = JidError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Jid> for String {
    fn from(value: Jid) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::{Jid, JidError};

    #[test]
    fn parse_splits_local_domain_and_resource() -> Result<(), JidError> {
        let jid = Jid::parse("Alice@Example.org/phone")?;
        assert_eq!(jid.as_str(), "alice@example.org/phone");
        assert_eq!(jid.local(), Some("alice"));
        assert_eq!(jid.domain(), "example.org");
        assert_eq!(jid.resource(), Some("phone"));
        assert_eq!(jid.bare().as_str(), "alice@example.org");
        assert_eq!(jid.domain_jid().as_str(), "example.org");
        Ok(())
    }

    #[test]
    fn domain_only_address_is_valid() -> Result<(), JidError> {
        let jid = Jid::parse("conference.example.org")?;
        assert_eq!(jid.local(), None);
        assert_eq!(jid.domain(), "conference.example.org");
        assert!(jid.is_bare());
        Ok(())
    }

    #[test]
    fn resource_keeps_case_and_may_contain_at() -> Result<(), JidError> {
        let jid = Jid::parse("room@muc.example/Nick@Home")?;
        assert_eq!(jid.local(), Some("room"));
        assert_eq!(jid.resource(), Some("Nick@Home"));
        Ok(())
    }

    #[test]
    fn malformed_addresses_are_rejected() {
        assert_eq!(Jid::parse(""), Err(JidError::Empty));
        assert_eq!(Jid::parse("bob @x"), Err(JidError::Whitespace));
        assert_eq!(Jid::parse("@x"), Err(JidError::EmptyLocal));
        assert_eq!(Jid::parse("bob@"), Err(JidError::EmptyDomain));
        assert_eq!(Jid::parse("bob@x/"), Err(JidError::EmptyResource));
        let long = format!("{}@x", "a".repeat(1024));
        assert_eq!(
            Jid::parse(&long),
            Err(JidError::PartTooLong { part: "local" })
        );
    }

    #[test]
    fn xmpp_uri_uses_bare_address() -> Result<(), JidError> {
        let jid = Jid::parse("bob@x/laptop")?;
        assert_eq!(jid.xmpp_uri(), "xmpp:bob@x");
        Ok(())
    }
}
