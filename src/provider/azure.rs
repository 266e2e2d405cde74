//! Azure DevOps provider
//!
//! REST endpoints used (api-version 6.0):
//! - `GET  {org}/{project}/_apis/git/repositories/{repo}` (default branch)
//! - `GET  .../refs?filter=heads/{branch}` (branch lookup)
//! - `GET  .../stats/branches?name={branch}` (tip commit)
//! - `GET  .../items?path=...&versionDescriptor.version={commit}` (file content)
//! - `GET  .../pullrequests?searchCriteria...` and `.../pullrequests/{id}`
//! - `POST .../pushes` (commit) and `POST .../pullrequests` (pull request)

use super::{short_ref, AuthorDetails, BranchRef, Provider, PullRequestInfo};
use crate::domain::{CredentialKind, Credentials, DependencyFile, Source};
use crate::error::{ConfigError, ProviderError};
use crate::http::{Authorization, HttpClient};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};

const API_VERSION: &str = "6.0";

/// Repository coordinates parsed from `org/project/_git/repo` or `org/project/repo`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureRepo {
    pub organization: String,
    pub project: String,
    pub repository: String,
}

impl AzureRepo {
    /// Parses a repository identifier
    pub fn parse(repo: &str) -> Result<Self, ConfigError> {
        let segments: Vec<&str> = repo.split('/').filter(|s| !s.is_empty()).collect();
        let (organization, project, repository) = match segments.as_slice() {
            [org, project, "_git", repo] => (*org, *project, *repo),
            [org, project, repo] => (*org, *project, *repo),
            _ => {
                return Err(ConfigError::invalid_repository(
                    repo,
                    "expected 'organization/project/_git/repository'",
                ))
            }
        };

        Ok(Self {
            organization: organization.to_string(),
            project: project.to_string(),
            repository: repository.to_string(),
        })
    }
}

/// Azure DevOps REST client bound to one repository
pub struct AzureProvider {
    client: HttpClient,
    endpoint: String,
    repo: AzureRepo,
    auth: Authorization,
}

#[derive(Debug, Deserialize)]
struct ValueList<T> {
    value: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefResponse {
    name: String,
    object_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullRequestResponse {
    pull_request_id: u64,
    #[serde(default)]
    title: String,
    source_ref_name: String,
    target_ref_name: String,
}

impl From<PullRequestResponse> for PullRequestInfo {
    fn from(pr: PullRequestResponse) -> Self {
        PullRequestInfo {
            number: pr.pull_request_id,
            title: pr.title,
            source_branch: short_ref(&pr.source_ref_name).to_string(),
            target_branch: short_ref(&pr.target_ref_name).to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryResponse {
    default_branch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BranchStatsResponse {
    commit: CommitRef,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitRef {
    commit_id: String,
}

impl AzureProvider {
    /// Creates a client for the source, using the first `dev.azure.com` git-source credential
    pub fn for_source(
        source: &Source,
        credentials: &Credentials,
        client: HttpClient,
    ) -> Result<Self, ConfigError> {
        let host = source.provider.hostname();
        let credential = credentials
            .find(CredentialKind::GitSource, host)
            .ok_or_else(|| ConfigError::missing(format!("git-source credential for {}", host)))?;

        Ok(Self {
            client,
            endpoint: source.provider.api_endpoint().to_string(),
            repo: AzureRepo::parse(&source.repo)?,
            auth: Authorization::Basic {
                username: String::new(),
                password: credential.secret.clone(),
            },
        })
    }

    /// Overrides the API endpoint (builder pattern)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn url(&self, repo: &AzureRepo, path: &str, query: &[(&str, &str)]) -> Result<Url, ProviderError> {
        let base = format!(
            "{}/{}/{}/_apis/git/repositories/{}{}",
            self.endpoint.trim_end_matches('/'),
            repo.organization,
            repo.project,
            repo.repository,
            path
        );
        let mut url = Url::parse(&base)
            .map_err(|e| ProviderError::invalid_response("building request URL", e.to_string()))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
            pairs.append_pair("api-version", API_VERSION);
        }
        Ok(url)
    }

    fn repo_url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, ProviderError> {
        self.url(&self.repo, path, query)
    }

    async fn get(&self, operation: &str, url: Url) -> Result<Option<String>, ProviderError> {
        tracing::debug!(operation, url = %url, "azure GET");
        let response = self
            .client
            .get_with_retry(url.as_str(), Some(&self.auth))
            .await
            .map_err(|e| transport_error(operation, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(operation, e))?;

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ProviderError::api(operation, status.as_u16(), error_message(&body)));
        }
        Ok(Some(body))
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        operation: &str,
        url: Url,
    ) -> Result<Option<T>, ProviderError> {
        match self.get(operation, url).await? {
            Some(body) => serde_json::from_str(&body)
                .map(Some)
                .map_err(|e| ProviderError::invalid_response(operation, e.to_string())),
            None => Ok(None),
        }
    }

    async fn post(&self, operation: &str, url: Url, body: &Value) -> Result<String, ProviderError> {
        tracing::debug!(operation, url = %url, "azure POST");
        let response = self
            .client
            .post_json(url.as_str(), Some(&self.auth), body)
            .await
            .map_err(|e| transport_error(operation, e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| transport_error(operation, e))?;

        if !status.is_success() {
            return Err(ProviderError::api(operation, status.as_u16(), error_message(&text)));
        }
        Ok(text)
    }
}

#[async_trait]
impl Provider for AzureProvider {
    async fn branch(&self, name: &str) -> Result<Option<BranchRef>, ProviderError> {
        let filter = format!("heads/{}", name);
        let url = self.repo_url("/refs", &[("filter", filter.as_str())])?;
        let refs: Option<ValueList<RefResponse>> = self.get_json("fetching branch", url).await?;

        let wanted = format!("refs/heads/{}", name);
        Ok(refs.and_then(|list| {
            list.value
                .into_iter()
                .find(|r| r.name == wanted)
                .map(|r| BranchRef {
                    name: r.name,
                    object_id: r.object_id,
                })
        }))
    }

    async fn pull_requests(
        &self,
        source_branch: &str,
        target_branch: &str,
    ) -> Result<Vec<PullRequestInfo>, ProviderError> {
        let source_ref = format!("refs/heads/{}", source_branch);
        let target_ref = format!("refs/heads/{}", target_branch);
        let url = self.repo_url(
            "/pullrequests",
            &[
                ("searchCriteria.status", "active"),
                ("searchCriteria.sourceRefName", source_ref.as_str()),
                ("searchCriteria.targetRefName", target_ref.as_str()),
            ],
        )?;
        let prs: Option<ValueList<PullRequestResponse>> =
            self.get_json("listing pull requests", url).await?;

        Ok(prs
            .map(|list| list.value.into_iter().map(PullRequestInfo::from).collect())
            .unwrap_or_default())
    }

    async fn create_commit(
        &self,
        branch: &str,
        base_commit: &str,
        message: &str,
        files: &[DependencyFile],
        author: Option<&AuthorDetails>,
    ) -> Result<(), ProviderError> {
        let url = self.repo_url("/pushes", &[])?;
        let body = push_body(branch, base_commit, message, files, author);
        self.post("creating commit", url, &body).await?;
        tracing::info!(branch, files = files.len(), "commit created");
        Ok(())
    }

    async fn create_pull_request(
        &self,
        title: &str,
        source_branch: &str,
        target_branch: &str,
        description: &str,
        labels: &[String],
    ) -> Result<PullRequestInfo, ProviderError> {
        let operation = "creating pull request";
        let url = self.repo_url("/pullrequests", &[])?;
        let body = pull_request_body(title, source_branch, target_branch, description, labels);
        let text = self.post(operation, url, &body).await?;

        let created: PullRequestResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::invalid_response(operation, e.to_string()))?;
        tracing::info!(number = created.pull_request_id, source_branch, "pull request created");
        Ok(created.into())
    }

    async fn get_pull_request(&self, number: u64) -> Result<Option<PullRequestInfo>, ProviderError> {
        let url = self.repo_url(&format!("/pullrequests/{}", number), &[])?;
        let pr: Option<PullRequestResponse> = self.get_json("fetching pull request", url).await?;
        Ok(pr.map(PullRequestInfo::from))
    }

    async fn fetch_default_branch(&self, repo: &str) -> Result<String, ProviderError> {
        let operation = "fetching default branch";
        let repo = AzureRepo::parse(repo)
            .map_err(|e| ProviderError::invalid_response(operation, e.to_string()))?;
        let url = self.url(&repo, "", &[])?;
        let response: Option<RepositoryResponse> = self.get_json(operation, url).await?;

        response
            .and_then(|r| r.default_branch)
            .map(|b| short_ref(&b).to_string())
            .ok_or_else(|| ProviderError::invalid_response(operation, "repository has no default branch"))
    }

    async fn fetch_commit(&self, branch: &str) -> Result<String, ProviderError> {
        let operation = "fetching branch commit";
        let url = self.repo_url("/stats/branches", &[("name", branch)])?;
        let stats: Option<BranchStatsResponse> = self.get_json(operation, url).await?;

        stats
            .map(|s| s.commit.commit_id)
            .ok_or_else(|| ProviderError::api(operation, 404, format!("branch '{}' not found", branch)))
    }

    async fn fetch_file(&self, commit: &str, path: &str) -> Result<Option<String>, ProviderError> {
        let url = self.repo_url(
            "/items",
            &[
                ("path", path),
                ("versionDescriptor.versionType", "commit"),
                ("versionDescriptor.version", commit),
                ("includeContent", "true"),
                ("$format", "octetStream"),
            ],
        )?;
        self.get("fetching file", url).await
    }
}

fn transport_error(operation: &str, e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout {
            operation: operation.to_string(),
        }
    } else {
        ProviderError::transport(operation, e.to_string())
    }
}

/// Takes `message` from a JSON error body, falling back to the raw body
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

fn push_body(
    branch: &str,
    base_commit: &str,
    message: &str,
    files: &[DependencyFile],
    author: Option<&AuthorDetails>,
) -> Value {
    let changes: Vec<Value> = files
        .iter()
        .map(|file| {
            json!({
                "changeType": "edit",
                "item": { "path": format!("/{}", file.path()) },
                "newContent": {
                    "content": STANDARD.encode(file.content.as_bytes()),
                    "contentType": "base64encoded"
                }
            })
        })
        .collect();

    let mut commit = json!({
        "comment": message,
        "changes": changes,
    });
    if let Some(author) = author {
        commit["author"] = json!({ "name": author.name, "email": author.email });
    }

    json!({
        "refUpdates": [{
            "name": format!("refs/heads/{}", branch),
            "oldObjectId": base_commit,
        }],
        "commits": [commit],
    })
}

fn pull_request_body(
    title: &str,
    source_branch: &str,
    target_branch: &str,
    description: &str,
    labels: &[String],
) -> Value {
    let labels: Vec<Value> = labels.iter().map(|l| json!({ "name": l })).collect();
    json!({
        "sourceRefName": format!("refs/heads/{}", source_branch),
        "targetRefName": format!("refs/heads/{}", target_branch),
        "title": title,
        "description": description,
        "labels": labels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Credential, FileType, ProviderKind};

    fn source() -> Source {
        Source::new(ProviderKind::Azure, "contoso/web/_git/shop", "/", None, None)
    }

    fn credentials() -> Credentials {
        vec![Credential::git_source("dev.azure.com", "pat")]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_parse_repo() {
        let repo = AzureRepo::parse("contoso/web/_git/shop").unwrap();
        assert_eq!(repo.organization, "contoso");
        assert_eq!(repo.project, "web");
        assert_eq!(repo.repository, "shop");

        assert_eq!(AzureRepo::parse("contoso/web/shop").unwrap(), repo);
        assert!(AzureRepo::parse("shop").is_err());
    }

    #[test]
    fn test_for_source_requires_credential() {
        let client = HttpClient::new().unwrap();
        let result = AzureProvider::for_source(&source(), &Credentials::new(), client);
        assert!(matches!(result, Err(ConfigError::MissingInput { .. })));
    }

    #[test]
    fn test_url_building() {
        let provider =
            AzureProvider::for_source(&source(), &credentials(), HttpClient::new().unwrap())
                .unwrap();
        let url = provider
            .repo_url("/refs", &[("filter", "heads/depbot/npm_and_yarn/left-pad-1.3.0")])
            .unwrap();
        assert_eq!(url.path(), "/contoso/web/_apis/git/repositories/shop/refs");
        let query = url.query().unwrap_or_default();
        assert!(query.contains("filter=heads%2Fdepbot%2Fnpm_and_yarn%2Fleft-pad-1.3.0"));
        assert!(query.contains("api-version=6.0"));
    }

    #[test]
    fn test_with_endpoint() {
        let provider =
            AzureProvider::for_source(&source(), &credentials(), HttpClient::new().unwrap())
                .unwrap()
                .with_endpoint("http://localhost:8080/");
        let url = provider.repo_url("", &[]).unwrap();
        assert_eq!(url.host_str(), Some("localhost"));
        assert_eq!(url.path(), "/contoso/web/_apis/git/repositories/shop");
    }

    #[test]
    fn test_error_message_from_json_body() {
        assert_eq!(
            error_message(r#"{"message":"TF401019: branch not found"}"#),
            "TF401019: branch not found"
        );
        assert_eq!(error_message("Service Unavailable\n"), "Service Unavailable");
    }

    #[test]
    fn test_push_body() {
        let files = vec![DependencyFile::new(
            "package.json",
            "/web",
            "{}",
            FileType::Manifest,
        )];
        let author = AuthorDetails {
            name: "depbot".to_string(),
            email: "bot@example.com".to_string(),
        };
        let body = push_body("depbot/x", "abc123", "Bump x", &files, Some(&author));

        assert_eq!(body["refUpdates"][0]["name"], "refs/heads/depbot/x");
        assert_eq!(body["refUpdates"][0]["oldObjectId"], "abc123");
        let change = &body["commits"][0]["changes"][0];
        assert_eq!(change["item"]["path"], "/web/package.json");
        assert_eq!(change["newContent"]["content"], "e30=");
        assert_eq!(body["commits"][0]["author"]["name"], "depbot");
    }

    #[test]
    fn test_push_body_without_author() {
        let body = push_body("b", "c", "m", &[], None);
        assert!(body["commits"][0].get("author").is_none());
    }

    #[test]
    fn test_pull_request_body() {
        let body = pull_request_body(
            "Bump left-pad from 1.0.0 to 1.3.0",
            "depbot/npm_and_yarn/left-pad-1.3.0",
            "main",
            "body",
            &["dependencies".to_string(), "javascript".to_string()],
        );
        assert_eq!(body["sourceRefName"], "refs/heads/depbot/npm_and_yarn/left-pad-1.3.0");
        assert_eq!(body["targetRefName"], "refs/heads/main");
        assert_eq!(body["labels"][1]["name"], "javascript");
    }

    #[test]
    fn test_pull_request_response_conversion() {
        let json = r#"{
            "pullRequestId": 42,
            "title": "Bump left-pad",
            "sourceRefName": "refs/heads/depbot/npm_and_yarn/left-pad-1.3.0",
            "targetRefName": "refs/heads/main"
        }"#;
        let response: PullRequestResponse = serde_json::from_str(json).unwrap();
        let info = PullRequestInfo::from(response);
        assert_eq!(info.number, 42);
        assert_eq!(info.source_branch, "depbot/npm_and_yarn/left-pad-1.3.0");
        assert_eq!(info.target_branch, "main");
    }
}
