// SPDX-License-Identifier: GPL-3.0-only
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::{require_user, AuthProvider, Feature};
use crate::entity::{Follow, UserProfile};
use crate::error::{ConflictReason, SyncError};
use crate::record::RecordId;
use crate::store::Predicate;
use crate::sync::{Repository, SyncClient};

/// Attempts at a read-modify-write before a concurrent writer wins.
const PROFILE_UPDATE_ATTEMPTS: u32 = 2;

pub const POINTS_GENERATE_MEAL: u64 = 10;
pub const POINTS_UPLOAD_PHOTO: u64 = 5;
pub const POINTS_SHARE_RECIPE: u64 = 10;
/// Extra on top of [`POINTS_SHARE_RECIPE`] for a user's first shared recipe
pub const POINTS_FIRST_RECIPE: u64 = 50;
/// Paid to the owner of a redeemed referral code
pub const POINTS_REFERRAL: u64 = 50;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum UsernameError {
    #[error("username must be 3-20 characters, got {0}")]
    Length(usize),

    #[error("username may only contain letters, digits and underscores")]
    Characters,

    #[error("username pattern: {0}")]
    Pattern(#[from] regex::Error),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ProfileError {
    #[error("invalid username: {0}")]
    InvalidUsername(#[from] UsernameError),

    #[error("unknown referral code {0}")]
    UnknownReferralCode(String),

    #[error("cannot redeem your own referral code")]
    OwnReferralCode,

    #[error("a referral code was already redeemed for this account")]
    AlreadyReferred,

    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Lower-case `raw` and check it against the username rules.
pub fn normalize_username(raw: &str) -> Result<String, UsernameError> {
    let name = raw.trim().to_lowercase();
    let length = name.chars().count();
    if !(3..=20).contains(&length) {
        return Err(UsernameError::Length(length));
    }
    let pattern = Regex::new(r"^[a-z0-9_]+$")?;
    if !pattern.is_match(&name) {
        return Err(UsernameError::Characters);
    }
    Ok(name)
}

/// Three letters of the username followed by four random characters, upper-cased.
pub fn generate_referral_code(username: &str) -> String {
    let prefix: String = username.chars().filter(char::is_ascii_alphanumeric).take(3).collect();
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(4).collect();
    format!("{}{}", prefix, suffix).to_uppercase()
}

pub struct ProfileManager {
    auth: Arc<dyn AuthProvider>,
    profiles: Repository<UserProfile>,
}

impl ProfileManager {
    pub fn new(client: Arc<SyncClient>, auth: Arc<dyn AuthProvider>) -> Self {
        Self {
            auth,
            profiles: Repository::new(client),
        }
    }

    /// Pull the signed-in user's profile; `None` when they have not created one yet.
    pub async fn load_profile(&self) -> Result<Option<UserProfile>, SyncError> {
        let user_id = require_user(self.auth.as_ref(), Feature::EditProfile)?;
        match self.profiles.refresh(&RecordId::new(user_id)).await {
            Ok(profile) => Ok(Some(profile)),
            Err(SyncError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn cached_profile(&self) -> Option<UserProfile> {
        let user_id = self.auth.current_user_key()?;
        self.profiles.cache().get(&user_id).await
    }

    /// Any user's profile, cached after the first read.
    pub async fn profile_of(&self, user_id: &str) -> Result<UserProfile, SyncError> {
        self.profiles.get(&RecordId::new(user_id)).await
    }

    pub async fn save_profile(&self, profile: &UserProfile) -> Result<UserProfile, SyncError> {
        let user_id = require_user(self.auth.as_ref(), Feature::EditProfile)?;
        if profile.user_id != user_id {
            return Err(SyncError::PermissionDenied(format!(
                "cannot edit profile of {}",
                profile.user_id
            )));
        }
        self.save_with_auth_policy(profile).await
    }

    async fn save_with_auth_policy(&self, profile: &UserProfile) -> Result<UserProfile, SyncError> {
        self.profiles
            .save_with(profile, &self.profiles.client().policies().auth)
            .await
    }

    /// Claim `raw` as the signed-in user's username, creating the profile if needed.
    pub async fn set_username(&self, raw: &str) -> Result<UserProfile, ProfileError> {
        let user_id = require_user(self.auth.as_ref(), Feature::EditProfile)?;
        let username = normalize_username(raw)?;

        let holders: Vec<UserProfile> = self
            .profiles
            .client()
            .query(Predicate::eq("usernameLower", username.as_str()), None, 2)
            .await?;
        if holders.iter().any(|holder| holder.user_id != user_id) {
            info!(user = %user_id, username = %username, "Username already taken");
            return Err(SyncError::name_taken(username).into());
        }

        let mut profile = match self.load_profile().await? {
            Some(profile) => profile,
            None => UserProfile::new(user_id.as_str(), username.as_str()),
        };
        if profile.referral_code.is_none() {
            profile.referral_code = Some(generate_referral_code(&username));
        }
        profile.username = username;

        Ok(self.save_with_auth_policy(&profile).await?)
    }

    /// Add `points` to the signed-in user's profile.
    pub async fn award_points(&self, points: u64) -> Result<UserProfile, SyncError> {
        let user_id = require_user(self.auth.as_ref(), Feature::EditProfile)?;
        self.add_points(&user_id, points).await
    }

    /// Award `points` for `action`, logging instead of failing.
    ///
    /// Returns the new total, or `None` when the award could not be saved.
    pub async fn reward(&self, action: &str, points: u64) -> Option<u64> {
        match self.award_points(points).await {
            Ok(profile) => Some(profile.points),
            Err(e) => {
                warn!(action, points, error = %e, "Failed to award points");
                None
            }
        }
    }

    /// Record that the signed-in user joined through `code` and pay its owner.
    ///
    /// The redeeming profile is saved first, so a failed payout is logged but
    /// never paid twice.
    pub async fn redeem_referral(&self, code: &str) -> Result<UserProfile, ProfileError> {
        let user_id = require_user(self.auth.as_ref(), Feature::EditProfile)?;
        let code = code.trim().to_uppercase();
        if code.is_empty() {
            return Err(ProfileError::UnknownReferralCode(code));
        }

        let mut profile = self
            .load_profile()
            .await?
            .ok_or_else(|| SyncError::NotFound(user_id.clone()))?;
        if profile.referred_by.is_some() {
            return Err(ProfileError::AlreadyReferred);
        }

        let referrer = self
            .profiles
            .client()
            .query::<UserProfile>(Predicate::eq("referralCode", code.as_str()), None, 1)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ProfileError::UnknownReferralCode(code.clone()))?;
        if referrer.user_id == user_id {
            return Err(ProfileError::OwnReferralCode);
        }

        profile.referred_by = Some(code);
        let saved = self.save_with_auth_policy(&profile).await?;

        match self.add_points(&referrer.user_id, POINTS_REFERRAL).await {
            Ok(_) => info!(user = %user_id, referrer = %referrer.user_id, "Referral redeemed"),
            Err(e) => warn!(
                user = %user_id,
                referrer = %referrer.user_id,
                error = %e,
                "Referral saved but the referrer was not paid"
            ),
        }
        Ok(saved)
    }

    /// Award the points for sharing a recipe and count the share.
    ///
    /// Logs instead of failing; returns the new total when the update was saved.
    pub async fn reward_share(&self, first_share: bool) -> Option<u64> {
        let user_id = self.auth.current_user_key()?;
        let points = if first_share {
            POINTS_SHARE_RECIPE + POINTS_FIRST_RECIPE
        } else {
            POINTS_SHARE_RECIPE
        };
        let result = self
            .update_profile(&user_id, |profile| {
                profile.points = profile.points.saturating_add(points);
                profile.recipes_shared += 1;
            })
            .await;
        match result {
            Ok(profile) => {
                info!(user = %user_id, points, first_share, total = profile.points, "Awarded share points");
                Some(profile.points)
            }
            Err(e) => {
                warn!(user = %user_id, points, error = %e, "Failed to award share points");
                None
            }
        }
    }

    /// Recount both sides of a follow edge and store the tallies on the
    /// profiles. Users without a profile are skipped.
    pub async fn sync_follow_counts(&self, follower_id: &str, followee_id: &str) {
        let client = self.profiles.client();
        match client.count::<Follow>(Predicate::eq("followerId", follower_id)).await {
            Ok(following) => {
                self.store_tally(follower_id, |profile| profile.following_count = following)
                    .await
            }
            Err(e) => warn!(user = %follower_id, error = %e, "Failed to count followed users"),
        }
        match client.count::<Follow>(Predicate::eq("followeeId", followee_id)).await {
            Ok(followers) => {
                self.store_tally(followee_id, |profile| profile.follower_count = followers)
                    .await
            }
            Err(e) => warn!(user = %followee_id, error = %e, "Failed to count followers"),
        }
    }

    async fn store_tally<F>(&self, user_id: &str, change: F)
    where
        F: FnMut(&mut UserProfile),
    {
        match self.update_profile(user_id, change).await {
            Ok(_) => {}
            Err(SyncError::NotFound(_)) => debug!(user = %user_id, "No profile to update"),
            Err(e) => warn!(user = %user_id, error = %e, "Failed to update follow counts"),
        }
    }

    async fn add_points(&self, user_id: &str, points: u64) -> Result<UserProfile, SyncError> {
        let saved = self
            .update_profile(user_id, |profile| {
                profile.points = profile.points.saturating_add(points);
            })
            .await?;
        info!(user = %user_id, points, total = saved.points, "Awarded points");
        Ok(saved)
    }

    /// Apply `change` to the stored profile of `user_id`.
    ///
    /// Re-reads and tries again when another writer changed the profile in between.
    async fn update_profile<F>(&self, user_id: &str, mut change: F) -> Result<UserProfile, SyncError>
    where
        F: FnMut(&mut UserProfile),
    {
        let id = RecordId::new(user_id);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let mut profile = self.profiles.refresh(&id).await?;
            change(&mut profile);

            match self.save_with_auth_policy(&profile).await {
                Ok(saved) => return Ok(saved),
                Err(SyncError::Conflict(ConflictReason::RecordChanged { .. }))
                    if attempt < PROFILE_UPDATE_ATTEMPTS =>
                {
                    warn!(user = %user_id, "Profile changed during update, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SessionAuth;
    use crate::entity::SyncableEntity;
    use crate::store::{MemoryStore, RemoteStore};
    use crate::sync::RetryPolicy;
    use crate::test_helpers::{quick_policies, ScriptedStore};

    fn setup(user: &str) -> (ProfileManager, Arc<MemoryStore>, Arc<SessionAuth>) {
        let memory = Arc::new(MemoryStore::new());
        let client = Arc::new(SyncClient::new(memory.clone(), quick_policies()));
        let auth = Arc::new(SessionAuth::signed_in(user));
        (ProfileManager::new(client, auth.clone()), memory, auth)
    }

    #[test]
    fn test_normalize_username() {
        assert_eq!(normalize_username("  Chef_Anna "), Ok("chef_anna".to_string()));
        assert_eq!(normalize_username("ab"), Err(UsernameError::Length(2)));
        assert_eq!(normalize_username(&"a".repeat(21)), Err(UsernameError::Length(21)));
        assert_eq!(normalize_username("chef anna"), Err(UsernameError::Characters));
        assert_eq!(normalize_username("chéf_anna"), Err(UsernameError::Characters));
    }

    #[tokio::test]
    async fn test_set_username_creates_profile() {
        let (profiles, memory, _) = setup("u1");
        let profile = profiles.set_username("Chef_Anna").await.unwrap();
        assert_eq!(profile.username, "chef_anna");
        assert!(profile.meta.change_tag.is_some());

        let stored = memory.fetch(&"u1".into()).await.unwrap();
        assert_eq!(stored.string("usernameLower"), Some("chef_anna"));
        assert_eq!(profiles.cached_profile().await, Some(profile));
    }

    #[tokio::test]
    async fn test_username_taken_by_someone_else() {
        let (profiles, memory, _) = setup("u1");
        memory
            .save(UserProfile::new("u2", "chef_anna").encode())
            .await
            .unwrap();

        let err = profiles.set_username("CHEF_ANNA").await.unwrap_err();
        assert_eq!(err, ProfileError::Sync(SyncError::name_taken("chef_anna")));
    }

    #[tokio::test]
    async fn test_keeping_own_username_is_allowed() {
        let (profiles, _, _) = setup("u1");
        profiles.set_username("chef_anna").await.unwrap();
        let again = profiles.set_username("chef_anna").await.unwrap();
        assert_eq!(again.username, "chef_anna");
    }

    #[tokio::test]
    async fn test_invalid_username_makes_no_remote_call() {
        let (profiles, memory, _) = setup("u1");
        let err = profiles.set_username("x").await.unwrap_err();
        assert!(matches!(err, ProfileError::InvalidUsername(_)));
        assert!(memory.is_empty().await);
    }

    #[tokio::test]
    async fn test_award_points() {
        let (profiles, _, _) = setup("u1");
        profiles.set_username("anna").await.unwrap();
        profiles.award_points(30).await.unwrap();
        let profile = profiles.award_points(75).await.unwrap();
        assert_eq!(profile.points, 105);
        assert_eq!(profile.level().level, 2);
    }

    #[tokio::test]
    async fn test_award_points_without_profile() {
        let (profiles, _, _) = setup("u1");
        let err = profiles.award_points(10).await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_cannot_save_other_profile() {
        let (profiles, _, _) = setup("u1");
        let err = profiles
            .save_profile(&UserProfile::new("u2", "bob"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_signed_out_profile_calls_fail() {
        let (profiles, _, auth) = setup("u1");
        auth.sign_out();
        assert_eq!(profiles.load_profile().await, Err(SyncError::Unauthenticated));
        assert!(profiles.cached_profile().await.is_none());
    }

    #[test]
    fn test_generate_referral_code() {
        let code = generate_referral_code("chef_anna");
        assert_eq!(code.len(), 7);
        assert!(code.starts_with("CHE"));
        assert_eq!(code, code.to_uppercase());
        assert!(generate_referral_code("a.b").starts_with("AB"));
    }

    #[tokio::test]
    async fn test_new_profile_gets_referral_code() {
        let (profiles, _, _) = setup("u1");
        let created = profiles.set_username("anna").await.unwrap();
        let code = created.referral_code.clone().unwrap();
        assert!(code.starts_with("ANN"));

        // Renaming keeps the code
        let renamed = profiles.set_username("anna_cooks").await.unwrap();
        assert_eq!(renamed.referral_code, Some(code));
    }

    #[tokio::test]
    async fn test_redeem_referral_pays_referrer() {
        let memory = Arc::new(MemoryStore::new());
        let client = Arc::new(SyncClient::new(memory.clone(), quick_policies()));
        let auth = Arc::new(SessionAuth::signed_in("u1"));
        let profiles = ProfileManager::new(client, auth.clone());

        let referrer = profiles.set_username("anna").await.unwrap();
        let code = referrer.referral_code.unwrap();

        auth.sign_in("u2");
        profiles.set_username("bob").await.unwrap();
        let redeemed = profiles.redeem_referral(&code.to_lowercase()).await.unwrap();
        assert_eq!(redeemed.referred_by, Some(code.clone()));
        assert_eq!(redeemed.points, 0);

        let anna = UserProfile::decode(&memory.fetch(&"u1".into()).await.unwrap()).unwrap();
        assert_eq!(anna.points, POINTS_REFERRAL);

        let again = profiles.redeem_referral(&code).await.unwrap_err();
        assert_eq!(again, ProfileError::AlreadyReferred);
    }

    #[tokio::test]
    async fn test_redeem_rejects_own_and_unknown_codes() {
        let (profiles, _, _) = setup("u1");
        let own = profiles.set_username("anna").await.unwrap().referral_code.unwrap();

        assert_eq!(
            profiles.redeem_referral(&own).await.unwrap_err(),
            ProfileError::OwnReferralCode
        );
        assert!(matches!(
            profiles.redeem_referral("NOPE123").await.unwrap_err(),
            ProfileError::UnknownReferralCode(_)
        ));
        assert!(matches!(
            profiles.redeem_referral("   ").await.unwrap_err(),
            ProfileError::UnknownReferralCode(_)
        ));
        let profile = profiles.load_profile().await.unwrap().unwrap();
        assert!(profile.referred_by.is_none());
    }

    #[tokio::test]
    async fn test_redeem_requires_profile() {
        let (profiles, _, _) = setup("u1");
        let err = profiles.redeem_referral("ANN1234").await.unwrap_err();
        assert!(matches!(err, ProfileError::Sync(SyncError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_profile_writes_use_auth_policy() {
        let store = Arc::new(ScriptedStore::new(Arc::new(MemoryStore::new())));
        let policies = crate::sync::RetryPolicies {
            auth: RetryPolicy {
                max_attempts: 2,
                ..quick_policies().auth
            },
            ..quick_policies()
        };
        let client = Arc::new(SyncClient::new(store.clone(), policies));
        let profiles = ProfileManager::new(client, Arc::new(SessionAuth::signed_in("u1")));

        store.fail_all_saves(Some(SyncError::TransientUnavailable("busy".to_string())));
        let err = profiles.set_username("anna").await.unwrap_err();
        assert!(matches!(err, ProfileError::Sync(SyncError::TransientUnavailable(_))));
        assert_eq!(store.save_calls(), 2);
    }

    #[tokio::test]
    async fn test_reward_swallows_failures() {
        let (profiles, _, _) = setup("u1");
        assert_eq!(profiles.reward("upload_photo", POINTS_UPLOAD_PHOTO).await, None);
        profiles.set_username("anna").await.unwrap();
        assert_eq!(profiles.reward("upload_photo", POINTS_UPLOAD_PHOTO).await, Some(5));
    }
}
