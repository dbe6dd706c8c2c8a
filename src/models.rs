use crate::auth::policy::Owned;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tag categories
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TagCategory {
    Language,
    Framework,
    Tool,
    Database,
    #[default]
    Other,
}

impl TagCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagCategory::Language => "language",
            TagCategory::Framework => "framework",
            TagCategory::Tool => "tool",
            TagCategory::Database => "database",
            TagCategory::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "language" => Some(TagCategory::Language),
            "framework" => Some(TagCategory::Framework),
            "tool" => Some(TagCategory::Tool),
            "database" => Some(TagCategory::Database),
            "other" => Some(TagCategory::Other),
            _ => None,
        }
    }
}

/// Self-reported proficiency with a technology
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SkillLevel {
    #[default]
    Beginner,
    Intermediate,
    Expert,
}

impl SkillLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkillLevel::Beginner => "beginner",
            SkillLevel::Intermediate => "intermediate",
            SkillLevel::Expert => "expert",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "beginner" => Some(SkillLevel::Beginner),
            "intermediate" => Some(SkillLevel::Intermediate),
            "expert" => Some(SkillLevel::Expert),
            _ => None,
        }
    }
}

/// A technology tag. `usage_count` mirrors the number of association rows.
#[derive(Debug, Clone, Serialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub category: TagCategory,
    pub usage_count: i64,
    pub created_at: DateTime<Utc>,
}

/// A project with its tag slugs and owner handle resolved.
#[derive(Debug, Clone, Serialize)]
pub struct Project {
    pub id: String,
    pub owner_id: String,
    pub owner_username: String,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub like_count: i64,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Owned for Project {
    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

impl Project {
    /// Private projects are only visible to their owner.
    pub fn visible_to(&self, viewer_id: Option<&str>) -> bool {
        self.is_public || viewer_id == Some(self.owner_id.as_str())
    }
}

/// Optional metadata carried by a user-technology edge.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct TechnologyMetadata {
    #[serde(default)]
    pub skill_level: Option<SkillLevel>,
    #[serde(default)]
    pub years_experience: Option<f64>,
    #[serde(default)]
    pub is_primary: Option<bool>,
}

/// A technology on a user's profile.
#[derive(Debug, Clone, Serialize)]
pub struct UserTechnology {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub category: TagCategory,
    pub skill_level: SkillLevel,
    pub years_experience: Option<f64>,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
}

/// One entry in a project's liker list.
#[derive(Debug, Clone, Serialize)]
pub struct Liker {
    pub user_id: String,
    pub username: String,
    pub liked_at: DateTime<Utc>,
}

/// Public profile view of an identity.
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub id: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: Option<String>,
    pub technologies: Vec<String>,
    pub project_count: i64,
}

/// One page of results plus the pagination window that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: u32,
    pub offset: u32,
}

/// Validated pagination window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: Self::DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl Pagination {
    pub const DEFAULT_LIMIT: u32 = 20;
    pub const MAX_LIMIT: u32 = 100;

    /// Missing values take defaults; out-of-range limits are clamped into 1..=100.
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }
}
