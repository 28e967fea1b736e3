//! Profile service
//!
//! Resolves author identities for embedding in article and comment
//! responses. User records are cached; follow state is always looked up
//! fresh for the viewer.

use super::error::{ServiceError, ServiceResult};
use super::lookup::bounded;
use crate::cache::{CacheLayer, MemoryCache};
use crate::db::repositories::{FollowGraph, UserDirectory};
use crate::models::{Profile, UserId, UserProfile};
use futures::future::try_join_all;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

const CACHE_KEY_PROFILE_BY_ID: &str = "profile:id:";
const CACHE_KEY_PROFILE_BY_USERNAME: &str = "profile:username:";

pub struct ProfileService {
    users: Arc<dyn UserDirectory>,
    follows: Arc<dyn FollowGraph>,
    cache: Arc<MemoryCache>,
    lookup_timeout: Duration,
}

impl ProfileService {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        follows: Arc<dyn FollowGraph>,
        cache: Arc<MemoryCache>,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            users,
            follows,
            cache,
            lookup_timeout,
        }
    }

    async fn cached(&self, key: &str) -> Option<UserProfile> {
        match self.cache.get::<UserProfile>(key).await {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!("Dropping unreadable cache entry {}: {}", key, e);
                let _ = self.cache.delete(key).await;
                None
            }
        }
    }

    async fn remember(&self, user: &UserProfile) {
        let keys = [
            format!("{}{}", CACHE_KEY_PROFILE_BY_ID, user.id),
            format!("{}{}", CACHE_KEY_PROFILE_BY_USERNAME, user.username),
        ];
        for key in keys {
            if let Err(e) = self.cache.set(&key, user).await {
                tracing::warn!("Failed to cache profile {}: {}", key, e);
            }
        }
    }

    /// Look up a user by id
    pub async fn user(&self, id: UserId) -> ServiceResult<Option<UserProfile>> {
        let key = format!("{}{}", CACHE_KEY_PROFILE_BY_ID, id);
        if let Some(user) = self.cached(&key).await {
            return Ok(Some(user));
        }

        let user = bounded(self.lookup_timeout, "user lookup", self.users.get_by_id(id)).await?;
        if let Some(ref user) = user {
            self.remember(user).await;
        }
        Ok(user)
    }

    /// Map a username to its user id
    pub async fn resolve_username(&self, username: &str) -> ServiceResult<Option<UserId>> {
        let key = format!("{}{}", CACHE_KEY_PROFILE_BY_USERNAME, username);
        if let Some(user) = self.cached(&key).await {
            return Ok(Some(user.id));
        }

        let user = bounded(
            self.lookup_timeout,
            "user lookup",
            self.users.find_by_username(username),
        )
        .await?;
        if let Some(ref user) = user {
            self.remember(user).await;
        }
        Ok(user.map(|u| u.id))
    }

    /// Whether `viewer` follows `author`. Anonymous viewers and authors
    /// looking at themselves never follow.
    pub async fn is_following(&self, viewer: Option<UserId>, author: UserId) -> ServiceResult<bool> {
        match viewer {
            Some(viewer) if viewer != author => {
                bounded(
                    self.lookup_timeout,
                    "follow-graph lookup",
                    self.follows.is_following(viewer, author),
                )
                .await
            }
            _ => Ok(false),
        }
    }

    /// Public profile of `author_id` as seen by `viewer`
    pub async fn profile(&self, author_id: UserId, viewer: Option<UserId>) -> ServiceResult<Profile> {
        let user = self.user(author_id).await?.ok_or_else(|| {
            ServiceError::Internal(anyhow::anyhow!("author {} has no user record", author_id))
        })?;
        let following = self.is_following(viewer, author_id).await?;
        Ok(Profile::from_user(user, following))
    }

    /// Profiles of several authors, each looked up once
    pub async fn profiles<I>(&self, author_ids: I, viewer: Option<UserId>) -> ServiceResult<HashMap<UserId, Profile>>
    where
        I: IntoIterator<Item = UserId>,
    {
        let distinct: BTreeSet<UserId> = author_ids.into_iter().collect();
        let lookups = distinct.into_iter().map(|id| async move {
            let profile = self.profile(id, viewer).await?;
            Ok::<_, ServiceError>((id, profile))
        });
        Ok(try_join_all(lookups).await?.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_cache;
    use crate::config::CacheConfig;
    use crate::db::repositories::MemoryRepository;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts directory hits so cache behaviour is observable
    struct CountingDirectory {
        inner: Arc<MemoryRepository>,
        hits: AtomicUsize,
    }

    #[async_trait]
    impl UserDirectory for CountingDirectory {
        async fn get_by_id(&self, id: UserId) -> anyhow::Result<Option<UserProfile>> {
            self.hits.fetch_add(1, Ordering::SeqCst);
            self.inner.get_by_id(id).await
        }

        async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<UserProfile>> {
            self.hits.fetch_add(1, Ordering::SeqCst);
            self.inner.find_by_username(username).await
        }
    }

    struct BrokenGraph;

    #[async_trait]
    impl FollowGraph for BrokenGraph {
        async fn is_following(&self, _: UserId, _: UserId) -> anyhow::Result<bool> {
            Err(anyhow::anyhow!("graph offline"))
        }
    }

    fn setup() -> (Arc<MemoryRepository>, Arc<CountingDirectory>, ProfileService) {
        let repo = Arc::new(MemoryRepository::new());
        let directory = Arc::new(CountingDirectory {
            inner: repo.clone(),
            hits: AtomicUsize::new(0),
        });
        let service = ProfileService::new(
            directory.clone(),
            repo.clone(),
            create_cache(&CacheConfig::default()),
            Duration::from_secs(1),
        );
        (repo, directory, service)
    }

    #[tokio::test]
    async fn test_profile_following() {
        let (repo, _, service) = setup();
        let alice = repo.add_user("alice");
        let bob = repo.add_user("bob");
        repo.follow(bob, alice);

        let seen_by_bob = service.profile(alice, Some(bob)).await.unwrap();
        assert_eq!(seen_by_bob.username, "alice");
        assert!(seen_by_bob.following);

        assert!(!service.profile(alice, None).await.unwrap().following);
        assert!(!service.profile(alice, Some(alice)).await.unwrap().following);
        assert!(!service.profile(bob, Some(alice)).await.unwrap().following);
    }

    #[tokio::test]
    async fn test_users_are_cached() {
        let (repo, directory, service) = setup();
        let alice = repo.add_user("alice");

        service.profile(alice, None).await.unwrap();
        service.profile(alice, None).await.unwrap();
        assert_eq!(service.resolve_username("alice").await.unwrap(), Some(alice));

        assert_eq!(directory.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_username() {
        let (_, _, service) = setup();
        assert_eq!(service.resolve_username("nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_profiles_deduplicates() {
        let (repo, directory, service) = setup();
        let alice = repo.add_user("alice");
        let bob = repo.add_user("bob");

        let profiles = service.profiles([alice, bob, alice], None).await.unwrap();
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[&bob].username, "bob");
        assert_eq!(directory.hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_follow_graph_failure_is_unavailable() {
        let repo = Arc::new(MemoryRepository::new());
        let alice = repo.add_user("alice");
        let bob = repo.add_user("bob");
        let service = ProfileService::new(
            repo,
            Arc::new(BrokenGraph),
            create_cache(&CacheConfig::default()),
            Duration::from_secs(1),
        );

        let err = service.profile(alice, Some(bob)).await.unwrap_err();
        assert!(matches!(err, ServiceError::ServiceUnavailable(_)));
        // Anonymous viewers never consult the graph.
        assert!(service.profile(alice, None).await.is_ok());
    }
}
