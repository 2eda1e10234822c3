//! The authenticated user
//!
//! The profile is fetched from `/v3/profile` the first time anything other
//! than the id is needed. The four stream registries are created on demand
//! and dropped by [`FeedlyUser::invalidate`].

use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::data::document::Document;
use crate::data::entities::{
    untag_path, EnterpriseCategory, EnterpriseTag, Streamable, UserCategory, UserTag,
    TAG_BATCH_SIZE,
};
use crate::identifier::{StreamId, STREAM_SOURCE_ENTERPRISE};
use crate::registry::{RegistryError, StreamRegistry};
use crate::session::{quote_plus, ApiError, ApiResult, SharedSession};
use crate::stream::StreamOptions;

const PROFILE_PATH: &str = "/v3/profile";

/// Profile and stream registries of the session's user
#[derive(Debug)]
pub struct FeedlyUser {
    session: SharedSession,
    profile: Document,
    populated: bool,
    user_categories: Option<StreamRegistry<UserCategory>>,
    user_tags: Option<StreamRegistry<UserTag>>,
    enterprise_categories: Option<StreamRegistry<EnterpriseCategory>>,
    enterprise_tags: Option<StreamRegistry<EnterpriseTag>>,
}

impl FeedlyUser {
    /// Placeholder user; only the id is known, if given
    pub fn new(session: SharedSession, user_id: Option<String>) -> Self {
        let profile = user_id.map(Document::with_id).unwrap_or_default();
        Self::from_profile(session, profile)
    }

    /// User from an already fetched profile
    ///
    /// A document with more than the id counts as populated.
    pub fn from_profile(session: SharedSession, profile: Document) -> Self {
        Self {
            session,
            populated: profile.len() > 1,
            profile,
            user_categories: None,
            user_tags: None,
            enterprise_categories: None,
            enterprise_tags: None,
        }
    }

    /// Session used for requests
    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    async fn populate(&mut self) -> ApiResult<()> {
        if self.populated {
            return Ok(());
        }
        let value = self
            .session
            .get(PROFILE_PATH)
            .await?
            .ok_or_else(|| ApiError::Parse("empty profile response".to_string()))?;
        self.profile = Document::from_value(value)?;
        self.populated = true;
        debug!(user_id = self.profile.id(), "Loaded profile");
        Ok(())
    }

    /// Full profile document
    pub async fn profile(&mut self) -> ApiResult<&Document> {
        self.populate().await?;
        Ok(&self.profile)
    }

    /// User id, fetching the profile only when it was not given
    pub async fn id(&mut self) -> ApiResult<String> {
        if self.profile.id().is_none() {
            self.populate().await?;
        }
        self.profile
            .id()
            .map(str::to_string)
            .ok_or_else(|| ApiError::Parse("profile has no id".to_string()))
    }

    /// Email address
    pub async fn email(&mut self) -> ApiResult<Option<String>> {
        Ok(self.profile().await?.get_str("email").map(str::to_string))
    }

    /// Full name
    pub async fn name(&mut self) -> ApiResult<Option<String>> {
        Ok(self.profile().await?.get_str("fullName").map(str::to_string))
    }

    /// Enterprise (team) name
    ///
    /// Taken from the profile, or learned from a loaded team registry.
    pub async fn enterprise_name(&mut self) -> ApiResult<Option<String>> {
        self.populate().await?;
        if let Some(name) = self.profile.get_str("enterpriseName") {
            return Ok(Some(name.to_string()));
        }
        let learned = self
            .enterprise_categories
            .as_ref()
            .and_then(|r| r.source_id())
            .or_else(|| self.enterprise_tags.as_ref().and_then(|r| r.source_id()))
            .map(str::to_string);
        if let Some(name) = &learned {
            self.profile
                .insert("enterpriseName", Value::String(name.clone()));
        }
        Ok(learned)
    }

    /// Drop the profile and every registry; the next access refetches
    pub fn invalidate(&mut self) {
        let id = self.profile.id().map(str::to_string);
        self.profile = id.map(Document::with_id).unwrap_or_default();
        self.populated = false;
        self.drop_registries();
    }

    fn drop_registries(&mut self) {
        self.user_categories = None;
        self.user_tags = None;
        self.enterprise_categories = None;
        self.enterprise_tags = None;
    }

    /// Personal categories
    pub async fn user_categories(&mut self) -> ApiResult<&mut StreamRegistry<UserCategory>> {
        let registry = match self.user_categories.take() {
            Some(registry) => registry,
            None => StreamRegistry::new(Arc::clone(&self.session), Some(self.id().await?)),
        };
        Ok(self.user_categories.insert(registry))
    }

    /// Personal tags
    pub async fn user_tags(&mut self) -> ApiResult<&mut StreamRegistry<UserTag>> {
        let registry = match self.user_tags.take() {
            Some(registry) => registry,
            None => StreamRegistry::new(Arc::clone(&self.session), Some(self.id().await?)),
        };
        Ok(self.user_tags.insert(registry))
    }

    /// Team categories
    pub async fn enterprise_categories(
        &mut self,
    ) -> ApiResult<&mut StreamRegistry<EnterpriseCategory>> {
        let registry = match self.enterprise_categories.take() {
            Some(registry) => registry,
            None => {
                StreamRegistry::new(Arc::clone(&self.session), self.enterprise_name().await?)
            }
        };
        Ok(self.enterprise_categories.insert(registry))
    }

    /// Team tags
    pub async fn enterprise_tags(&mut self) -> ApiResult<&mut StreamRegistry<EnterpriseTag>> {
        let registry = match self.enterprise_tags.take() {
            Some(registry) => registry,
            None => StreamRegistry::new(Arc::clone(&self.session), self.enterprise_name().await?),
        };
        Ok(self.enterprise_tags.insert(registry))
    }

    /// Aggregate of every personal category
    pub async fn all_user_categories_stream(&mut self) -> ApiResult<UserCategory> {
        let stream_id = StreamId::all_user_categories(&self.id().await?)?;
        Ok(UserCategory::from_stream_id(stream_id, Arc::clone(&self.session)))
    }

    /// Aggregate of every team category
    pub async fn all_enterprise_categories_stream(&mut self) -> ApiResult<EnterpriseCategory> {
        let name = match self.enterprise_name().await? {
            Some(name) => name,
            None => {
                self.enterprise_categories()
                    .await?
                    .streams()
                    .await
                    .map_err(|e| match e {
                        RegistryError::Api(api) => api,
                        other => ApiError::InvalidRequest(other.to_string()),
                    })?;
                self.enterprise_name().await?.ok_or_else(|| {
                    ApiError::InvalidRequest("user is not part of an enterprise".to_string())
                })?
            }
        };
        let stream_id = StreamId::all_enterprise_categories(&name)?;
        Ok(EnterpriseCategory::from_stream_id(
            stream_id,
            Arc::clone(&self.session),
        ))
    }

    /// Create a team tag and return it
    ///
    /// `emailSettings`, when given, must include followers.
    pub async fn create_enterprise_tag(&mut self, data: Value) -> ApiResult<EnterpriseTag> {
        if let Some(settings) = data.get("emailSettings") {
            let includes_followers = settings
                .get("includeFollowers")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if !includes_followers {
                return Err(ApiError::InvalidRequest(
                    "emailSettings must set includeFollowers".to_string(),
                ));
            }
        }

        let created = match self.session.post("/v3/enterprise/tags", data).await? {
            Some(Value::Array(mut items)) if !items.is_empty() => items.swap_remove(0),
            other => {
                return Err(ApiError::Parse(format!(
                    "unexpected tag creation response: {}",
                    other.unwrap_or(Value::Null)
                )))
            }
        };
        let tag = EnterpriseTag::from_document(
            Document::from_value(created)?,
            Arc::clone(&self.session),
        )?;
        info!(tag = tag.id(), label = tag.label(), "Created enterprise tag");

        if let Some(registry) = self.enterprise_tags.as_mut() {
            registry.insert_cached(tag.clone());
        }
        Ok(tag)
    }

    /// Comment on an entry
    pub async fn annotate_entry(
        &self,
        entry_id: &str,
        comment: &str,
        slack_mentions: &[String],
        email_mentions: &[String],
    ) -> ApiResult<()> {
        let body = json!({
            "comment": comment,
            "entryId": entry_id,
            "emailMentions": email_mentions,
            "slackMentions": slack_mentions,
        });
        self.session.post("/v3/annotations", body).await?;
        Ok(())
    }

    /// Delete this user's annotations on the entries the options select
    ///
    /// Not reversible. Returns the number of annotations deleted.
    pub async fn delete_annotations<S>(
        &mut self,
        streamable: &S,
        options: StreamOptions,
    ) -> ApiResult<usize>
    where
        S: Streamable + Sync,
    {
        let user_id = self.id().await?;
        let mut cursor = streamable.stream_contents(options);
        let mut deleted = 0;

        while let Some(entry) = cursor.next().await? {
            let own: Vec<String> = entry
                .annotations()
                .iter()
                .filter(|a| a.get("author").and_then(Value::as_str) == Some(user_id.as_str()))
                .filter_map(|a| a.get("id").and_then(Value::as_str).map(str::to_string))
                .collect();
            for annotation_id in own {
                let path = format!("/v3/annotations/{}", quote_plus(&annotation_id));
                self.session.delete(&path).await?;
                deleted += 1;
            }
        }

        debug!(deleted, "Deleted annotations");
        Ok(deleted)
    }

    /// Remove the tags this user applied to the entries the options select
    ///
    /// Not reversible. Entries are untagged per tag in batches. Returns the
    /// number of (tag, entry) pairs removed.
    pub async fn delete_tags<S>(&mut self, streamable: &S, options: StreamOptions) -> ApiResult<usize>
    where
        S: Streamable + Sync,
    {
        let user_id = self.id().await?;
        let mut cursor = streamable.stream_contents(options);
        let mut by_tag: BTreeMap<String, Vec<String>> = BTreeMap::new();

        while let Some(entry) = cursor.next().await? {
            let Some(entry_id) = entry.id() else { continue };
            for tag in entry.tags() {
                if tag_added_by(tag).as_deref() == Some(user_id.as_str()) {
                    if let Some(tag_id) = tag.get("id").and_then(Value::as_str) {
                        by_tag
                            .entry(tag_id.to_string())
                            .or_default()
                            .push(entry_id.to_string());
                    }
                }
            }
        }

        let mut removed = 0;
        for (tag_id, entry_ids) in &by_tag {
            for batch in entry_ids.chunks(TAG_BATCH_SIZE) {
                self.session.delete(&untag_path(tag_id, batch)).await?;
                removed += batch.len();
            }
        }

        debug!(tags = by_tag.len(), removed, "Deleted tags");
        Ok(removed)
    }
}

/// Who applied a tag to an entry
///
/// Team tags record it in `addedBy`; personal tag ids embed the owner
/// (`user/<id>/tag/...`). Tags with an empty label are system tags.
fn tag_added_by(tag: &Value) -> Option<String> {
    if tag.get("label").and_then(Value::as_str) == Some("") {
        return None;
    }
    let tag_id = tag.get("id").and_then(Value::as_str)?;
    if tag_id.starts_with(STREAM_SOURCE_ENTERPRISE) {
        tag.get("addedBy").and_then(Value::as_str).map(str::to_string)
    } else {
        StreamId::parse(tag_id)
            .ok()
            .map(|id| id.source_id().to_string())
    }
}
