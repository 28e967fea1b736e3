//! Listing and feed query engine
//!
//! Stateless over the snapshot it is handed: filters in a fixed order (tag,
//! author, favorited-by, followed authors), sorts newest-first, then slices
//! the requested window.

use super::error::ServiceError;
use crate::config::ListingConfig;
use crate::models::{Article, ArticleFilter, ArticlePage, Pagination, UserId};
use std::collections::HashSet;

/// Parse raw `offset`/`limit` query values.
///
/// Missing values fall back to offset 0 and the configured default limit;
/// limits above the configured maximum are capped.
pub fn parse_pagination(
    offset: Option<&str>,
    limit: Option<&str>,
    listing: &ListingConfig,
) -> Result<Pagination, ServiceError> {
    let offset = parse_param("offset", offset)?.unwrap_or(0);
    let limit = parse_param("limit", limit)?
        .unwrap_or(listing.default_limit)
        .min(listing.max_limit);
    Ok(Pagination::new(offset, limit))
}

fn parse_param(param: &'static str, raw: Option<&str>) -> Result<Option<usize>, ServiceError> {
    raw.map(|value| {
        value.parse::<usize>().map_err(|_| ServiceError::InvalidQuery {
            param,
            value: value.to_string(),
        })
    })
    .transpose()
}

/// Apply `filter` (and, for feeds, the set of followed authors) to
/// `candidates` and cut out the requested page.
///
/// Ties on `created_at` are broken by descending id so paging is stable.
pub fn select(
    candidates: Vec<Article>,
    filter: &ArticleFilter,
    followed: Option<&HashSet<UserId>>,
    page: Pagination,
) -> ArticlePage {
    let mut matched: Vec<Article> = candidates
        .into_iter()
        .filter(|a| filter.tag.as_deref().map_or(true, |tag| a.has_tag(tag)))
        .filter(|a| filter.author_id.map_or(true, |id| a.author_id == id))
        .filter(|a| filter.favorited_by.map_or(true, |user| a.favorited_by.contains(&user)))
        .filter(|a| followed.map_or(true, |authors| authors.contains(&a.author_id)))
        .collect();

    matched.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });

    let total = matched.len();
    let articles = matched
        .into_iter()
        .skip(page.offset)
        .take(page.limit)
        .collect();

    ArticlePage { articles, total }
}
