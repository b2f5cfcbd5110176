use std::io::Read;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use sentinel_core::{Environment, ReleaseContext, ReleaseVersion, Secret};
use sentinel_host::ReqwestHttpClient;
use sentinel_release::{ActuationError, GitHubReleases, ReleaseActuator};
use sentinel_vcs::contract::{add_bare_remote, commit_file, init_git_repo};
use sentinel_vcs::Repository;
use sentinel_vcs_git::GitRepository;
use tempfile::tempdir;
use tiny_http::{Response, Server};

fn ctx(version: &str) -> ReleaseContext {
    ReleaseContext {
        env: Environment::Stage,
        version: ReleaseVersion::parse(version).unwrap(),
        required_process: "nginx".into(),
        api_url: "http://127.0.0.1:1/health".into(),
        deploy_token: Secret::new("ghp_integration"),
        repository: "acme/shop".into(),
    }
}

#[test]
fn releases_against_git_and_http() {
    let dir = tempdir().unwrap();
    let work = dir.path().join("work");
    std::fs::create_dir_all(&work).unwrap();
    init_git_repo(&work, "main").unwrap();
    add_bare_remote(&work, &dir.path().join("remote.git"), "origin").unwrap();
    let repo = GitRepository::open(&work);
    repo.create_annotated_tag("v1.0.0", "Release v1.0.0").unwrap();
    commit_file(&work, "feature.txt", "x", "add feature").unwrap();

    let server = Server::http("127.0.0.1:0").unwrap();
    let base = format!("http://{}", server.server_addr().to_ip().unwrap());
    let handle = thread::spawn(move || {
        let mut request = server.recv().unwrap();
        let url = request.url().to_string();
        let auth = request
            .headers()
            .iter()
            .find(|h| h.field.equiv("Authorization"))
            .map(|h| h.value.as_str().to_string());
        let mut body = String::new();
        request.as_reader().read_to_string(&mut body).unwrap();
        request.respond(Response::from_string("{}").with_status_code(201)).unwrap();
        (url, auth, body)
    });

    let publisher = GitHubReleases::new(Arc::new(ReqwestHttpClient::new().unwrap()), base, Duration::from_secs(5));
    ReleaseActuator::new(&repo, &publisher, "origin").publish(&ctx("v1.1.0")).unwrap();

    let (url, auth, body) = handle.join().unwrap();
    assert_eq!(url, "/repos/acme/shop/releases");
    assert_eq!(auth.as_deref(), Some("Bearer ghp_integration"));
    let payload: serde_json::Value = serde_json::from_str(&body).unwrap();
    let notes = payload["body"].as_str().unwrap();
    assert!(notes.starts_with("## Changes in v1.1.0\n- "));
    assert!(notes.contains("add feature"));
    assert!(!notes.contains(" init"));

    assert!(repo.tag_exists("v1.1.0").unwrap());
    let remote = GitRepository::open(dir.path().join("remote.git"));
    assert!(remote.tag_exists("v1.1.0").unwrap());
}

#[test]
fn existing_git_tag_blocks_actuation() {
    let dir = tempdir().unwrap();
    init_git_repo(dir.path(), "main").unwrap();
    let repo = GitRepository::open(dir.path());
    repo.create_annotated_tag("v2.0.0", "Release v2.0.0").unwrap();

    let publisher = sentinel_release::RecordingPublisher::new();
    let err = ReleaseActuator::new(&repo, &publisher, "origin").publish(&ctx("v2.0.0")).unwrap_err();

    assert!(matches!(err, ActuationError::DuplicateTag(_)));
    assert!(publisher.published().is_empty());
}
