//! Profile management and public resolution
//!
//! Owners manage their profiles through [`ProfileService`]; anonymous
//! visitors only ever reach published profiles through
//! [`ProfileService::resolve_by_slug`].

use std::sync::Arc;

use chrono::Utc;

use crate::database::Database;
use crate::error::{DbError, ProfileError};
use crate::models::{
    CreateProfileRequest, Profile, ProfileState, PublishResponse, PublishUpdate,
    UpdateProfileRequest,
};
use crate::storage::AssetStore;

use super::qr::render_qr_svg;
use super::slug::{generate_slug, is_public_slug};

/// Fresh slugs tried before giving up on a publish
const MAX_SLUG_ATTEMPTS: usize = 5;

/// Storage key of the QR code for a published profile
pub fn qr_key(profile_id: i64, slug: &str) -> String {
    format!("qr/{}-{}.svg", profile_id, slug)
}

/// Profile operations for owners and anonymous visitors
pub struct ProfileService<D: Database> {
    db: Arc<D>,
    assets: Arc<dyn AssetStore>,
    public_base_url: String,
}

impl<D: Database> ProfileService<D> {
    pub fn new(db: Arc<D>, assets: Arc<dyn AssetStore>, public_base_url: impl Into<String>) -> Self {
        Self {
            db,
            assets,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Public page URL for a slug
    pub fn public_url(&self, slug: &str) -> String {
        format!("{}/{}", self.public_base_url, slug)
    }

    /// List profiles owned by `owner_id`
    pub async fn list(&self, owner_id: i64) -> Result<Vec<Profile>, ProfileError> {
        Ok(self.db.list_profiles_by_owner(owner_id).await?)
    }

    /// Create a profile for `owner_id`
    pub async fn create(
        &self,
        owner_id: i64,
        request: CreateProfileRequest,
    ) -> Result<Profile, ProfileError> {
        request.validate().map_err(ProfileError::Validation)?;

        let id = self
            .db
            .create_profile(&request.into_new_profile(owner_id))
            .await?;

        tracing::info!(profile_id = id, owner_id, "Profile created");

        self.db.get_profile(id).await?.ok_or(ProfileError::NotFound)
    }

    /// Get a profile owned by `owner_id`
    pub async fn get(&self, id: i64, owner_id: i64) -> Result<Profile, ProfileError> {
        self.owned_profile(id, owner_id).await
    }

    /// Apply a partial update to a profile owned by `owner_id`
    ///
    /// A published profile keeps its state; only its content can change.
    pub async fn update(
        &self,
        id: i64,
        owner_id: i64,
        request: UpdateProfileRequest,
    ) -> Result<Profile, ProfileError> {
        request.validate().map_err(ProfileError::Validation)?;

        let mut profile = self.owned_profile(id, owner_id).await?;

        if profile.is_published() && request.state.is_some() {
            return Err(ProfileError::InvalidState(
                "a published profile cannot change state".to_string(),
            ));
        }

        request.apply(&mut profile);
        self.db
            .update_profile(&profile)
            .await
            .map_err(not_found_as_profile)?;

        tracing::info!(profile_id = id, owner_id, state = %profile.state, "Profile updated");

        Ok(profile)
    }

    /// Delete a profile owned by `owner_id`, along with its QR code
    pub async fn delete(&self, id: i64, owner_id: i64) -> Result<(), ProfileError> {
        let profile = self.owned_profile(id, owner_id).await?;

        self.db
            .delete_profile(id)
            .await
            .map_err(not_found_as_profile)?;

        if let Some(slug) = &profile.slug {
            self.discard_asset(&qr_key(id, slug)).await;
        }

        tracing::info!(profile_id = id, owner_id, "Profile deleted");

        Ok(())
    }

    /// Resolve a public slug to a published profile
    ///
    /// Anything that is not a well-formed slug of a published profile is
    /// not found. Malformed slugs never reach the database.
    pub async fn resolve_by_slug(&self, slug: &str) -> Result<Profile, ProfileError> {
        if !is_public_slug(slug) {
            return Err(ProfileError::NotFound);
        }

        match self.db.get_profile_by_slug(slug).await? {
            Some(profile) if profile.is_published() => Ok(profile),
            _ => Err(ProfileError::NotFound),
        }
    }

    /// Publish a profile owned by `owner_id`
    ///
    /// Assigns a new slug, stores a QR code of the public URL and moves the
    /// profile to `published` in one conditional update. Of concurrent
    /// publishes only one succeeds; the others get `AlreadyPublished` and
    /// their QR codes are removed.
    pub async fn publish(&self, id: i64, owner_id: i64) -> Result<PublishResponse, ProfileError> {
        let profile = self.owned_profile(id, owner_id).await?;
        if profile.is_published() {
            return Err(ProfileError::AlreadyPublished);
        }

        for attempt in 1..=MAX_SLUG_ATTEMPTS {
            let slug = generate_slug();
            let public_url = self.public_url(&slug);
            let svg = render_qr_svg(&public_url)?;
            let key = qr_key(id, &slug);
            let qr_url = self.assets.put(&key, svg.into_bytes()).await?;

            let update = PublishUpdate {
                slug,
                published_at: Utc::now(),
                qr_url,
            };

            match self.db.publish_profile(id, owner_id, &update).await {
                Ok(true) => {
                    tracing::info!(profile_id = id, owner_id, slug = %update.slug, "Profile published");
                    return Ok(PublishResponse {
                        state: ProfileState::Published,
                        slug: update.slug,
                        public_url,
                        qr_url: update.qr_url,
                    });
                }
                Ok(false) => {
                    self.discard_asset(&key).await;
                    // Lost a race: either another publish won or the profile is gone
                    return match self.db.get_profile(id).await? {
                        Some(_) => Err(ProfileError::AlreadyPublished),
                        None => Err(ProfileError::NotFound),
                    };
                }
                Err(DbError::ConstraintViolation(e)) => {
                    self.discard_asset(&key).await;
                    tracing::warn!(profile_id = id, attempt, error = %e, "Slug collision, retrying");
                }
                Err(e) => {
                    self.discard_asset(&key).await;
                    return Err(e.into());
                }
            }
        }

        Err(ProfileError::Database(DbError::ConstraintViolation(
            "could not allocate a unique slug".to_string(),
        )))
    }

    async fn owned_profile(&self, id: i64, owner_id: i64) -> Result<Profile, ProfileError> {
        let profile = self
            .db
            .get_profile(id)
            .await?
            .ok_or(ProfileError::NotFound)?;

        if profile.owner_id != owner_id {
            tracing::warn!(profile_id = id, owner_id, "Access to another administrator's profile");
            return Err(ProfileError::Forbidden);
        }

        Ok(profile)
    }

    async fn discard_asset(&self, key: &str) {
        if let Err(e) = self.assets.delete(key).await {
            tracing::warn!(key = %key, error = %e, "Failed to delete orphaned asset");
        }
    }
}

fn not_found_as_profile(e: DbError) -> ProfileError {
    match e {
        DbError::NotFound => ProfileError::NotFound,
        other => other.into(),
    }
}
