//! In-memory store
//!
//! `MemoryRepository` implements every store trait over one lock-protected
//! state. A single write lock per mutation makes each operation atomic,
//! including the article delete that drops its comments.
//!
//! Used by the `memory` database driver and throughout the tests.

use super::{ArticleRepository, CommentRepository, FollowGraph, SessionRepository, UserDirectory};
use crate::config::{SeedConfig, MAX_TOKEN_TTL_HOURS};
use crate::models::{
    Article, ArticleFilter, Comment, NewArticle, Session, UpdateArticleInput, UserId, UserProfile,
};
use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct MemoryState {
    articles: HashMap<String, Article>,
    comments: BTreeMap<i64, Comment>,
    users: BTreeMap<UserId, UserProfile>,
    follows: HashSet<(UserId, UserId)>,
    sessions: HashMap<String, Session>,
    last_article_id: i64,
    last_comment_id: i64,
    last_user_id: UserId,
}

/// Process-local implementation of all stores
#[derive(Default)]
pub struct MemoryRepository {
    state: RwLock<MemoryState>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    // Every mutation completes before the guard drops, so a poisoned lock
    // still guards consistent data.
    fn read(&self) -> RwLockReadGuard<'_, MemoryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a user and return its id.
    pub fn add_user(&self, username: impl Into<String>) -> UserId {
        let mut state = self.write();
        state.last_user_id += 1;
        let id = state.last_user_id;
        state.users.insert(id, UserProfile::new(id, username));
        id
    }

    /// Issue a token for a user, valid for `ttl`.
    pub fn add_session(&self, token: impl Into<String>, user_id: UserId, ttl: Duration) {
        let token = token.into();
        let session = Session {
            token: token.clone(),
            user_id,
            expires_at: Utc::now() + ttl,
        };
        self.write().sessions.insert(token, session);
    }

    /// Record that `follower` follows `author`.
    pub fn follow(&self, follower: UserId, author: UserId) {
        self.write().follows.insert((follower, author));
    }

    /// Load users, their session tokens and follows from configuration.
    pub fn apply_seed(&self, seed: &SeedConfig) -> Result<()> {
        let ttl = Duration::hours(seed.token_ttl_hours.min(MAX_TOKEN_TTL_HOURS) as i64);
        let mut ids = HashMap::new();

        for user in &seed.users {
            if ids.contains_key(user.username.as_str()) {
                bail!("Duplicate seeded user '{}'", user.username);
            }
            let id = self.add_user(user.username.clone());
            if let Some(profile) = self.write().users.get_mut(&id) {
                profile.bio = user.bio.clone();
                profile.image = user.image.clone();
            }
            for token in &user.tokens {
                self.add_session(token.clone(), id, ttl);
            }
            ids.insert(user.username.as_str(), id);
        }

        for follow in &seed.follows {
            match (ids.get(follow.follower.as_str()), ids.get(follow.author.as_str())) {
                (Some(&follower), Some(&author)) => self.follow(follower, author),
                _ => bail!(
                    "Seeded follow '{}' -> '{}' names an unknown user",
                    follow.follower,
                    follow.author
                ),
            }
        }

        tracing::info!(
            "Seeded {} users and {} follows into the in-memory store",
            seed.users.len(),
            seed.follows.len()
        );
        Ok(())
    }
}

#[async_trait]
impl ArticleRepository for MemoryRepository {
    async fn insert(&self, article: &NewArticle) -> Result<Option<Article>> {
        let mut state = self.write();
        if state.articles.contains_key(&article.slug) {
            return Ok(None);
        }
        state.last_article_id += 1;
        let created = Article {
            id: state.last_article_id,
            slug: article.slug.clone(),
            title: article.title.clone(),
            description: article.description.clone(),
            body: article.body.clone(),
            tag_list: article.tag_list.clone(),
            author_id: article.author_id,
            favorited_by: BTreeSet::new(),
            created_at: article.created_at,
            updated_at: article.created_at,
        };
        state.articles.insert(created.slug.clone(), created.clone());
        Ok(Some(created))
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Article>> {
        Ok(self.read().articles.get(slug).cloned())
    }

    async fn candidates(&self, _filter: &ArticleFilter) -> Result<Vec<Article>> {
        Ok(self.read().articles.values().cloned().collect())
    }

    async fn update(
        &self,
        slug: &str,
        input: &UpdateArticleInput,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Article>> {
        let mut state = self.write();
        Ok(state.articles.get_mut(slug).map(|article| {
            input.apply(article, updated_at);
            article.clone()
        }))
    }

    async fn delete(&self, slug: &str) -> Result<bool> {
        let mut state = self.write();
        if state.articles.remove(slug).is_none() {
            return Ok(false);
        }
        state.comments.retain(|_, c| c.article_slug != slug);
        Ok(true)
    }

    async fn set_favorite(
        &self,
        slug: &str,
        user_id: UserId,
        favorited: bool,
    ) -> Result<Option<Article>> {
        let mut state = self.write();
        Ok(state.articles.get_mut(slug).map(|article| {
            if favorited {
                article.favorited_by.insert(user_id);
            } else {
                article.favorited_by.remove(&user_id);
            }
            article.clone()
        }))
    }
}

#[async_trait]
impl CommentRepository for MemoryRepository {
    async fn insert(
        &self,
        slug: &str,
        author_id: UserId,
        body: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Option<Comment>> {
        let mut state = self.write();
        if !state.articles.contains_key(slug) {
            return Ok(None);
        }
        state.last_comment_id += 1;
        let comment = Comment {
            id: state.last_comment_id,
            article_slug: slug.to_string(),
            body: body.to_string(),
            author_id,
            created_at,
            updated_at: created_at,
        };
        state.comments.insert(comment.id, comment.clone());
        Ok(Some(comment))
    }

    async fn get(&self, slug: &str, id: i64) -> Result<Option<Comment>> {
        Ok(self
            .read()
            .comments
            .get(&id)
            .filter(|c| c.article_slug == slug)
            .cloned())
    }

    async fn list_for_article(&self, slug: &str) -> Result<Option<Vec<Comment>>> {
        let state = self.read();
        if !state.articles.contains_key(slug) {
            return Ok(None);
        }
        Ok(Some(
            state
                .comments
                .values()
                .filter(|c| c.article_slug == slug)
                .cloned()
                .collect(),
        ))
    }

    async fn delete(&self, slug: &str, id: i64) -> Result<bool> {
        let mut state = self.write();
        let matches = state
            .comments
            .get(&id)
            .is_some_and(|c| c.article_slug == slug);
        if matches {
            state.comments.remove(&id);
        }
        Ok(matches)
    }
}

#[async_trait]
impl FollowGraph for MemoryRepository {
    async fn is_following(&self, follower: UserId, author: UserId) -> Result<bool> {
        Ok(self.read().follows.contains(&(follower, author)))
    }
}

#[async_trait]
impl UserDirectory for MemoryRepository {
    async fn get_by_id(&self, id: UserId) -> Result<Option<UserProfile>> {
        Ok(self.read().users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserProfile>> {
        Ok(self
            .read()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }
}

#[async_trait]
impl SessionRepository for MemoryRepository {
    async fn resolve(&self, token: &str) -> Result<Option<UserId>> {
        Ok(self
            .read()
            .sessions
            .get(token)
            .filter(|s| !s.is_expired())
            .map(|s| s.user_id))
    }
}
