use serde::{Deserialize, Serialize};

use super::repository::Repository;
use super::user::UserProfile;

/// One hit of a mixed search listing. Consumers match on the variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "item", rename_all = "snake_case")]
pub enum SearchResult {
    Repository(Repository),
    User(UserProfile),
}

impl SearchResult {
    pub fn title(&self) -> &str {
        match self {
            SearchResult::Repository(repo) => &repo.full_name,
            SearchResult::User(user) => &user.login,
        }
    }

    pub fn html_url(&self) -> &str {
        match self {
            SearchResult::Repository(repo) => &repo.html_url,
            SearchResult::User(user) => &user.html_url,
        }
    }
}

/// Envelope returned by the `/search/*` endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchPage<T> {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}
