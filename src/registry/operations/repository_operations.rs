//! Repository operations for registry client
//!
//! Implements tag listing (GET /v2/{name}/tags/list), following `Link: <...>; rel="next"`
//! pagination until the registry stops sending it.

use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::{RegistryError, Result};
use crate::logging::Logger;
use crate::registry::auth::RequestAuth;
use crate::registry::operations::{error_text, unauthorized};
use crate::registry::token_manager::{TokenManager, pull_scope};
use reqwest::Client;
use reqwest::header::LINK;
use serde::Deserialize;

/// Upper bound on followed pages, guards against a registry that links back to itself
const MAX_TAG_PAGES: usize = 1000;

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    tags: Option<Vec<String>>,
}

struct TagPage {
    tags: Vec<String>,
    next: Option<String>,
}

#[derive(Clone)]
pub struct RepositoryOperations {
    client: Client,
    address: String,
    output: Logger,
    token_manager: TokenManager,
}

impl RepositoryOperations {
    pub fn new(
        client: Client,
        address: String,
        output: Logger,
        token_manager: TokenManager,
    ) -> Self {
        Self {
            client,
            address,
            output,
            token_manager,
        }
    }

    /// List all tags in repository
    pub async fn list_tags(&self, repository: &str) -> Result<Vec<String>> {
        self.output
            .verbose(&format!("Listing tags for repository: {}", repository));

        let scope = pull_scope(repository);
        let mut url = format!("{}/v2/{}/tags/list", self.address, repository);
        let mut tags = Vec::new();

        for page in 1..=MAX_TAG_PAGES {
            let client = self.client.clone();
            let page_url = url.clone();
            let repository_copy = repository.to_string();

            let result = self
                .token_manager
                .execute_with_auth(&scope, move |auth| {
                    let client = client.clone();
                    let page_url = page_url.clone();
                    let repository = repository_copy.clone();
                    Box::pin(async move {
                        Self::list_tags_page(&client, &page_url, &repository, &auth).await
                    })
                })
                .await?;

            tags.extend(result.tags);

            match result.next {
                Some(next) => {
                    url = resolve_link(&self.address, &next)?;
                    self.output
                        .detail(&format!("Following tag page {}: {}", page + 1, url));
                }
                None => {
                    self.output.detail(&format!(
                        "Found {} tags for repository {}",
                        tags.len(),
                        repository
                    ));
                    return Ok(tags);
                }
            }
        }

        Err(RegistryError::Registry(format!(
            "Tag listing for {} exceeded {} pages",
            repository, MAX_TAG_PAGES
        )))
    }

    async fn list_tags_page(
        client: &Client,
        url: &str,
        repository: &str,
        auth: &RequestAuth,
    ) -> Result<TagPage> {
        let response = auth
            .apply(client.get(url))
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "tag listing"))?;

        let status = response.status();
        if status == 401 {
            return Err(unauthorized(&response, "tag listing"));
        }
        if !status.is_success() {
            let text = error_text(response).await;
            return Err(HttpErrorHandler::handle_registry_error(
                status,
                &text,
                &format!("tag listing for {}", repository),
            ));
        }

        let next = response
            .headers()
            .get(LINK)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_next_link);

        let body = response.text().await.map_err(|e| {
            RegistryError::Network(format!("Failed to read tags response: {}", e))
        })?;
        let tag_list: TagList = serde_json::from_str(&body).map_err(|e| {
            RegistryError::Registry(format!("Failed to parse tags response: {}", e))
        })?;

        Ok(TagPage {
            tags: tag_list.tags.unwrap_or_default(),
            next,
        })
    }
}

/// Extract the target of a `rel="next"` entry from a `Link` header
pub fn parse_next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|entry| {
        let (target, params) = entry.split_once(';')?;
        let is_next = params.split(';').any(|param| {
            let param = param.trim().replace(' ', "");
            param == "rel=\"next\"" || param == "rel=next"
        });
        if !is_next {
            return None;
        }
        let target = target.trim().strip_prefix('<')?.strip_suffix('>')?;
        Some(target.to_string())
    })
}

/// Link targets are usually relative to the registry root
fn resolve_link(address: &str, link: &str) -> Result<String> {
    let base = url::Url::parse(address)?;
    Ok(base.join(link)?.to_string())
}
