//! Tag slug normalization
//!
//! `normalize_slug` is the interoperable rule and must stay bit-exact: lowercase, each space
//! becomes `-`, every `.` and `/` is removed. Nothing else. Label cleanup (trimming, empty
//! checks) happens in [`TagLabel::parse`] before normalization.

use crate::error::{AppError, AppResult};

const MAX_LABEL_LEN: usize = 64;

pub fn normalize_slug(input: &str) -> String {
    input
        .to_lowercase()
        .chars()
        .filter(|c| *c != '.' && *c != '/')
        .map(|c| if c == ' ' { '-' } else { c })
        .collect()
}

/// A raw tag label split into its display name and lookup key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagLabel {
    pub name: String,
    pub slug: String,
}

impl TagLabel {
    pub fn parse(raw: &str) -> AppResult<Self> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(AppError::validation("tag label is empty"));
        }
        if name.chars().count() > MAX_LABEL_LEN {
            return Err(AppError::validation(format!(
                "tag label longer than {MAX_LABEL_LEN} characters"
            )));
        }
        let slug = normalize_slug(name);
        if slug.is_empty() {
            return Err(AppError::validation("tag label has no usable characters"));
        }
        Ok(Self {
            name: name.to_string(),
            slug,
        })
    }
}

/// Parse a label list, dropping later labels that collapse onto an earlier slug.
pub fn parse_labels<S: AsRef<str>>(raw: &[S]) -> AppResult<Vec<TagLabel>> {
    let mut labels: Vec<TagLabel> = Vec::with_capacity(raw.len());
    for label in raw {
        let label = TagLabel::parse(label.as_ref())?;
        if !labels.iter().any(|l| l.slug == label.slug) {
            labels.push(label);
        }
    }
    Ok(labels)
}
