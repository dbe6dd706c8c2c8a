//! Type-tagged identifiers
//!
//! Every entity id is `<prefix>_<32 hex chars>`, e.g. `sess_9f0c...`. The prefix names the
//! entity kind, so a project id can never be mistaken for a session token. Parsing checks
//! the prefix and the suffix shape before anything touches storage.

use std::fmt;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    User,
    Session,
    Project,
    Tag,
    Like,
    ProjectTag,
    UserTechnology,
    Request,
}

impl IdKind {
    pub fn prefix(self) -> &'static str {
        match self {
            IdKind::User => "usr",
            IdKind::Session => "sess",
            IdKind::Project => "proj",
            IdKind::Tag => "tag",
            IdKind::Like => "like",
            IdKind::ProjectTag => "ptag",
            IdKind::UserTechnology => "utech",
            IdKind::Request => "rid",
        }
    }
}

/// A validated, prefixed id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypedId {
    kind: IdKind,
    value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdParseError {
    #[error("id has no prefix separator")]
    MissingSeparator,
    #[error("id has the wrong type prefix")]
    WrongPrefix,
    #[error("id suffix is not a valid identifier")]
    BadSuffix,
}

impl TypedId {
    /// Generate a fresh id. Suffixes are random v4 uuids, so ids are never reused.
    pub fn generate(kind: IdKind) -> Self {
        Self {
            kind,
            value: format!("{}_{}", kind.prefix(), Uuid::new_v4().simple()),
        }
    }

    /// Parse `raw` as an id of the expected kind.
    pub fn parse(kind: IdKind, raw: &str) -> Result<Self, IdParseError> {
        let (prefix, suffix) = raw.rsplit_once('_').ok_or(IdParseError::MissingSeparator)?;
        if prefix != kind.prefix() {
            return Err(IdParseError::WrongPrefix);
        }
        // Canonical form only: 32 lowercase hex chars.
        if suffix.len() != 32
            || !suffix
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return Err(IdParseError::BadSuffix);
        }
        Uuid::try_parse(suffix).map_err(|_| IdParseError::BadSuffix)?;

        Ok(Self {
            kind,
            value: raw.to_string(),
        })
    }

    pub fn kind(&self) -> IdKind {
        self.kind
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn into_string(self) -> String {
        self.value
    }

    /// Short form safe for logs: prefix plus the first few suffix chars.
    pub fn redacted(&self) -> String {
        let keep = self.kind.prefix().len() + 1 + 6;
        format!("{}…", &self.value[..keep.min(self.value.len())])
    }
}

impl fmt::Display for TypedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Generate a new id string of the given kind.
pub fn new_id(kind: IdKind) -> String {
    TypedId::generate(kind).into_string()
}
