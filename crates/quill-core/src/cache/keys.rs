//! Cache key construction.
//!
//! A key is `namespace:param:param:...` with `:` as the delimiter. Every
//! parameter is percent-escaped for `%`, `:` and the glob metacharacters
//! `* ? [ ] \`, so a parameter can never forge a delimiter and a key
//! prefix is always safe to hand to a glob-based scan.

use std::fmt;

use uuid::Uuid;

use crate::domain::{Page, PostQuery};

pub const DELIMITER: char = ':';

/// Key namespaces, one per cached shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    User,
    Post,
    PostList,
    PostSearch,
    AuthorPosts,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::User => "user",
            Namespace::Post => "post",
            Namespace::PostList => "posts",
            Namespace::PostSearch => "searchPosts",
            Namespace::AuthorPosts => "authorPosts",
        }
    }
}

/// A fully built cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Build a key from a namespace and its ordered parameters.
pub fn cache_key<I, S>(namespace: Namespace, params: I) -> CacheKey
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut key = String::from(namespace.as_str());
    for param in params {
        key.push(DELIMITER);
        escape_into(param.as_ref(), &mut key);
    }
    CacheKey(key)
}

/// Prefix matching every key of `namespace` whose leading parameters equal `params`.
///
/// Always ends with the delimiter, so `searchPosts:foo:` never matches `foobar`.
pub fn key_prefix<I, S>(namespace: Namespace, params: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut prefix = cache_key(namespace, params).0;
    prefix.push(DELIMITER);
    prefix
}

fn escape_into(param: &str, out: &mut String) {
    for ch in param.chars() {
        match ch {
            '%' => out.push_str("%25"),
            ':' => out.push_str("%3A"),
            '*' => out.push_str("%2A"),
            '?' => out.push_str("%3F"),
            '[' => out.push_str("%5B"),
            ']' => out.push_str("%5D"),
            '\\' => out.push_str("%5C"),
            other => out.push(other),
        }
    }
}

pub fn user_key(id: Uuid) -> CacheKey {
    cache_key(Namespace::User, [id.to_string()])
}

pub fn post_key(id: Uuid) -> CacheKey {
    cache_key(Namespace::Post, [id.to_string()])
}

fn page_params(page: Page) -> [String; 2] {
    [page.skip().to_string(), page.limit().to_string()]
}

/// Key for one page of a post listing.
pub fn post_query_key(query: &PostQuery) -> CacheKey {
    match query {
        PostQuery::All(page) => cache_key(Namespace::PostList, page_params(*page)),
        PostQuery::Search { term, page } => {
            let [skip, limit] = page_params(*page);
            cache_key(Namespace::PostSearch, [term.clone(), skip, limit])
        }
        PostQuery::ByAuthor { author_id, page } => {
            let [skip, limit] = page_params(*page);
            cache_key(Namespace::AuthorPosts, [author_id.to_string(), skip, limit])
        }
    }
}

/// Every page of the plain listing.
pub fn post_list_prefix() -> String {
    key_prefix(Namespace::PostList, std::iter::empty::<&str>())
}

/// Every page of every search.
pub fn post_search_prefix() -> String {
    key_prefix(Namespace::PostSearch, std::iter::empty::<&str>())
}

/// Every cached post, whatever its id.
pub fn post_prefix() -> String {
    key_prefix(Namespace::Post, std::iter::empty::<&str>())
}

/// Every page of one author's listing.
pub fn author_posts_prefix(author_id: Uuid) -> String {
    key_prefix(Namespace::AuthorPosts, [author_id.to_string()])
}
