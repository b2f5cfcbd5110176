use std::sync::{Arc, Mutex};
use std::time::Duration;

use sentinel_core::{HttpClient, HttpRequest, ReleaseContext, TransportError};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

/// What gets published for one version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReleaseDraft {
    pub tag_name: String,
    pub name: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("release API answered {status} (expected 201): {body}")]
    Unexpected { status: u16, body: String },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("encode release payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Creates the remote release record. A single attempt; any failure is
/// final.
pub trait ReleasePublisher: Send + Sync {
    fn create_release(&self, ctx: &ReleaseContext, draft: &ReleaseDraft) -> Result<(), PublishError>;
}

#[derive(Serialize)]
struct Payload<'a> {
    tag_name: &'a str,
    name: &'a str,
    body: &'a str,
    draft: bool,
    prerelease: bool,
}

/// GitHub's `POST /repos/{owner}/{repo}/releases`.
pub struct GitHubReleases {
    http: Arc<dyn HttpClient>,
    api_base: String,
    timeout: Duration,
}

impl GitHubReleases {
    pub fn new(http: Arc<dyn HttpClient>, api_base: impl Into<String>, timeout: Duration) -> Self {
        let api_base = api_base.into().trim_end_matches('/').to_string();
        Self { http, api_base, timeout }
    }

    pub fn endpoint(&self, repository: &str) -> String {
        format!("{}/repos/{}/releases", self.api_base, repository)
    }
}

impl ReleasePublisher for GitHubReleases {
    fn create_release(&self, ctx: &ReleaseContext, draft: &ReleaseDraft) -> Result<(), PublishError> {
        let payload = serde_json::to_string(&Payload {
            tag_name: &draft.tag_name,
            name: &draft.name,
            body: &draft.body,
            draft: false,
            prerelease: false,
        })?;
        let url = self.endpoint(&ctx.repository);
        let request = HttpRequest::post_json(&url, payload, self.timeout)
            .with_header("Accept", "application/vnd.github+json")
            .with_bearer(ctx.deploy_token.clone());

        let response = self.http.send(&request)?;
        if response.status != 201 {
            let body = response.body.chars().take(200).collect();
            return Err(PublishError::Unexpected { status: response.status, body });
        }
        info!(repository = %ctx.repository, tag = %draft.tag_name, "release record created");
        Ok(())
    }
}

/// In-memory publisher for tests. Fails every call when built with
/// [`RecordingPublisher::failing`].
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    fail_with: Option<u16>,
    published: Mutex<Vec<ReleaseDraft>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(status: u16) -> Self {
        Self { fail_with: Some(status), ..Self::default() }
    }

    pub fn published(&self) -> Vec<ReleaseDraft> {
        self.published.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl ReleasePublisher for RecordingPublisher {
    fn create_release(&self, _ctx: &ReleaseContext, draft: &ReleaseDraft) -> Result<(), PublishError> {
        if let Some(status) = self.fail_with {
            return Err(PublishError::Unexpected { status, body: String::new() });
        }
        self.published.lock().unwrap_or_else(|p| p.into_inner()).push(draft.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::{Environment, HttpResponse, Method, ReleaseVersion, ScriptedHttpClient, Secret};

    const URL: &str = "https://api.github.test/repos/acme/shop/releases";

    fn ctx() -> ReleaseContext {
        ReleaseContext {
            env: Environment::Dev,
            version: ReleaseVersion::parse("v1.2.3").unwrap(),
            required_process: "nginx".into(),
            api_url: "http://localhost/health".into(),
            deploy_token: Secret::new("ghp_token"),
            repository: "acme/shop".into(),
        }
    }

    fn draft() -> ReleaseDraft {
        ReleaseDraft {
            tag_name: "v1.2.3".into(),
            name: "Release v1.2.3".into(),
            body: "## Changes in v1.2.3\n- Initial release\n".into(),
        }
    }

    #[test]
    fn posts_payload_with_credentials() {
        let http = Arc::new(ScriptedHttpClient::new());
        http.respond(URL, Ok(HttpResponse::new(201)));
        let publisher = GitHubReleases::new(http.clone(), "https://api.github.test/", Duration::from_secs(5));

        publisher.create_release(&ctx(), &draft()).unwrap();

        let sent = http.requests_to(URL);
        assert_eq!(sent.len(), 1);
        let req = &sent[0];
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.timeout, Duration::from_secs(5));
        assert_eq!(req.bearer.as_ref().map(Secret::expose), Some("ghp_token"));
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["tag_name"], "v1.2.3");
        assert_eq!(body["name"], "Release v1.2.3");
        assert_eq!(body["draft"], false);
        assert_eq!(body["prerelease"], false);
        assert!(body.get("token").is_none());
    }

    #[test]
    fn anything_but_created_is_fatal() {
        for status in [200, 422, 500] {
            let http = Arc::new(ScriptedHttpClient::new());
            http.respond(URL, Ok(HttpResponse::new(status).with_body("nope")));
            let publisher = GitHubReleases::new(http.clone(), "https://api.github.test", Duration::from_secs(5));

            let err = publisher.create_release(&ctx(), &draft()).unwrap_err();
            assert!(matches!(err, PublishError::Unexpected { status: s, .. } if s == status));
            assert_eq!(http.requests().len(), 1, "no retry for {status}");
        }
    }

    #[test]
    fn transport_failure_surfaces() {
        let http = Arc::new(ScriptedHttpClient::new());
        http.respond(URL, Err(TransportError::Timeout("5s".into())));
        let publisher = GitHubReleases::new(http, "https://api.github.test", Duration::from_secs(5));
        assert!(matches!(publisher.create_release(&ctx(), &draft()), Err(PublishError::Transport(_))));
    }
}
