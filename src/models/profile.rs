//! Profile domain models
//!
//! A profile is a link-in-bio page owned by one administrator. It moves
//! freely between `draft`, `active` and `inactive` until it is published;
//! publication assigns a public slug and is never undone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::admin::is_valid_email;

const MAX_NAME_LEN: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 1000;
const MAX_LINKS: usize = 50;
const MAX_LINK_TITLE_LEN: usize = 100;
const MAX_URL_LEN: usize = 2048;

/// Lifecycle state of a profile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileState {
    #[default]
    Draft,
    Active,
    Inactive,
    Published,
}

impl ProfileState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileState::Draft => "draft",
            ProfileState::Active => "active",
            ProfileState::Inactive => "inactive",
            ProfileState::Published => "published",
        }
    }
}

impl std::fmt::Display for ProfileState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProfileState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ProfileState::Draft),
            "active" => Ok(ProfileState::Active),
            "inactive" => Ok(ProfileState::Inactive),
            "published" => Ok(ProfileState::Published),
            _ => Err(format!("Invalid profile state: {}", s)),
        }
    }
}

/// External link shown on a profile page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileLink {
    pub title: String,
    pub url: String,
}

/// Profile stored in database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Unique profile ID
    pub id: i64,

    /// Administrator who owns this profile
    pub owner_id: i64,

    /// Display name
    pub name: String,

    /// Logo image URL
    pub logo_url: Option<String>,

    /// Contact email shown on the page
    pub email: Option<String>,

    /// Free-form description
    pub description: Option<String>,

    /// Theme descriptor, opaque to the service
    pub theme: serde_json::Value,

    /// Ordered external links
    pub links: Vec<ProfileLink>,

    /// Lifecycle state
    pub state: ProfileState,

    /// Public slug, present iff the profile is published
    pub slug: Option<String>,

    /// When the profile was published
    pub published_at: Option<DateTime<Utc>>,

    /// URL of the QR code pointing at the public page
    pub qr_url: Option<String>,

    /// When the profile was created
    pub created_at: DateTime<Utc>,
}

impl Profile {
    pub fn is_published(&self) -> bool {
        self.state == ProfileState::Published
    }

    /// Fields safe to expose to anonymous visitors
    pub fn public_view(&self) -> PublicProfile {
        PublicProfile {
            name: self.name.clone(),
            logo_url: self.logo_url.clone(),
            email: self.email.clone(),
            description: self.description.clone(),
            theme: self.theme.clone(),
            links: self.links.clone(),
            slug: self.slug.clone().unwrap_or_default(),
            qr_url: self.qr_url.clone(),
            published_at: self.published_at,
        }
    }
}

/// Profile record to be inserted
#[derive(Debug, Clone, PartialEq)]
pub struct NewProfile {
    pub owner_id: i64,
    pub name: String,
    pub logo_url: Option<String>,
    pub email: Option<String>,
    pub description: Option<String>,
    pub theme: serde_json::Value,
    pub links: Vec<ProfileLink>,
    pub state: ProfileState,
}

/// Columns written by the publish transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishUpdate {
    pub slug: String,
    pub published_at: DateTime<Utc>,
    pub qr_url: String,
}

/// Anonymous view of a published profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicProfile {
    pub name: String,
    pub logo_url: Option<String>,
    pub email: Option<String>,
    pub description: Option<String>,
    pub theme: serde_json::Value,
    pub links: Vec<ProfileLink>,
    pub slug: String,
    pub qr_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Result of a successful publication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishResponse {
    pub state: ProfileState,
    pub slug: String,
    pub public_url: String,
    pub qr_url: String,
}

fn empty_theme() -> serde_json::Value {
    serde_json::json!({})
}

/// Request to create a profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateProfileRequest {
    pub name: String,

    #[serde(default)]
    pub logo_url: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default = "empty_theme")]
    pub theme: serde_json::Value,

    #[serde(default)]
    pub links: Vec<ProfileLink>,

    #[serde(default)]
    pub state: ProfileState,
}

impl CreateProfileRequest {
    /// Check every field, collecting one message per problem
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        check_name(&self.name, &mut errors);
        check_optional_fields(
            self.logo_url.as_deref(),
            self.email.as_deref(),
            self.description.as_deref(),
            &mut errors,
        );
        check_theme(&self.theme, &mut errors);
        check_links(&self.links, &mut errors);

        if self.state == ProfileState::Published {
            errors.push("state: use the publish endpoint to publish a profile".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Build the record to insert for `owner_id`
    pub fn into_new_profile(self, owner_id: i64) -> NewProfile {
        NewProfile {
            owner_id,
            name: self.name.trim().to_string(),
            logo_url: self.logo_url,
            email: self.email.map(|e| e.trim().to_string()),
            description: self.description,
            theme: self.theme,
            links: self.links,
            state: self.state,
        }
    }
}

/// Partial update of a profile
///
/// Absent fields are left unchanged. For the optional text fields an
/// explicit `null` clears the stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub logo_url: Option<Option<String>>,

    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub email: Option<Option<String>>,

    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,

    #[serde(default)]
    pub theme: Option<serde_json::Value>,

    #[serde(default)]
    pub links: Option<Vec<ProfileLink>>,

    #[serde(default)]
    pub state: Option<ProfileState>,
}

impl UpdateProfileRequest {
    /// Check every present field, collecting one message per problem
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if let Some(name) = &self.name {
            check_name(name, &mut errors);
        }
        check_optional_fields(
            self.logo_url.as_ref().and_then(Option::as_deref),
            self.email.as_ref().and_then(Option::as_deref),
            self.description.as_ref().and_then(Option::as_deref),
            &mut errors,
        );
        if let Some(theme) = &self.theme {
            check_theme(theme, &mut errors);
        }
        if let Some(links) = &self.links {
            check_links(links, &mut errors);
        }
        if self.state == Some(ProfileState::Published) {
            errors.push("state: use the publish endpoint to publish a profile".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Apply the present fields to `profile`
    pub fn apply(self, profile: &mut Profile) {
        if let Some(name) = self.name {
            profile.name = name.trim().to_string();
        }
        if let Some(logo_url) = self.logo_url {
            profile.logo_url = logo_url;
        }
        if let Some(email) = self.email {
            profile.email = email.map(|email| email.trim().to_string());
        }
        if let Some(description) = self.description {
            profile.description = description;
        }
        if let Some(theme) = self.theme {
            profile.theme = theme;
        }
        if let Some(links) = self.links {
            profile.links = links;
        }
        if let Some(state) = self.state {
            profile.state = state;
        }
    }
}

/// Tell an explicit `null` (`Some(None)`) apart from an absent field (`None`)
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn check_name(name: &str, errors: &mut Vec<String>) {
    let len = name.trim().chars().count();
    if len == 0 {
        errors.push("name: must not be empty".to_string());
    } else if len > MAX_NAME_LEN {
        errors.push(format!("name: must be at most {} characters", MAX_NAME_LEN));
    }
}

fn check_optional_fields(
    logo_url: Option<&str>,
    email: Option<&str>,
    description: Option<&str>,
    errors: &mut Vec<String>,
) {
    if let Some(url) = logo_url {
        if !is_http_url(url) {
            errors.push("logo_url: must be an http(s) URL".to_string());
        }
    }
    if let Some(email) = email {
        if !is_valid_email(email.trim()) {
            errors.push("email: must be a valid email address".to_string());
        }
    }
    if let Some(description) = description {
        if description.chars().count() > MAX_DESCRIPTION_LEN {
            errors.push(format!(
                "description: must be at most {} characters",
                MAX_DESCRIPTION_LEN
            ));
        }
    }
}

fn check_theme(theme: &serde_json::Value, errors: &mut Vec<String>) {
    if !theme.is_object() {
        errors.push("theme: must be a JSON object".to_string());
    }
}

fn check_links(links: &[ProfileLink], errors: &mut Vec<String>) {
    if links.len() > MAX_LINKS {
        errors.push(format!("links: at most {} links are allowed", MAX_LINKS));
    }
    for (i, link) in links.iter().enumerate() {
        let title_len = link.title.trim().chars().count();
        if title_len == 0 || title_len > MAX_LINK_TITLE_LEN {
            errors.push(format!(
                "links[{}].title: must be 1 to {} characters",
                i, MAX_LINK_TITLE_LEN
            ));
        }
        if !is_http_url(&link.url) {
            errors.push(format!("links[{}].url: must be an http(s) URL", i));
        }
    }
}

fn is_http_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    match rest {
        Some(host) => {
            !host.is_empty() && url.len() <= MAX_URL_LEN && !url.chars().any(char::is_whitespace)
        }
        None => false,
    }
}
