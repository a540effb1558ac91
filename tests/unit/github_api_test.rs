//! Unit tests for the REST client against a scripted transport.

use std::sync::Arc;

use gitdesk::services::github_api::{GitHubClient, IssueUpdate, PageSpec, RunFilter, API_VERSION};
use gitdesk::services::http_transport::{HttpResponse, Method, RequestBody, ScriptedTransport};
use gitdesk::types::errors::ApiError;
use gitdesk::types::issue::IssueState;
use gitdesk::types::repository::Repository;
use rstest::rstest;
use serde_json::{json, Value};

fn client() -> (ScriptedTransport, GitHubClient) {
    let transport = ScriptedTransport::new();
    let client = GitHubClient::new(Arc::new(transport.clone()), "gho_test");
    (transport, client)
}

fn commits(start: usize, n: usize) -> Value {
    Value::Array(
        (start..start + n)
            .map(|i| json!({"sha": format!("{:040}", i), "commit": {"message": format!("c{}", i)}}))
            .collect(),
    )
}

fn push_page(transport: &ScriptedTransport, path: &str, page: usize, body: Value) {
    let page = page.to_string();
    transport.push_with_query(Method::Get, path, &[("page", page.as_str())], HttpResponse::json_body(200, &body));
}

#[tokio::test]
async fn test_requests_carry_auth_and_version_headers() {
    let (transport, client) = client();
    transport.push(Method::Get, "/user", HttpResponse::json_body(200, &json!({"login": "octocat"})));

    let user = client.get_authenticated_user().await.unwrap();
    assert_eq!(user.login, "octocat");

    let request = &transport.requests()[0];
    assert_eq!(request.header_value("Authorization"), Some("Bearer gho_test"));
    assert_eq!(request.header_value("Accept"), Some("application/vnd.github+json"));
    assert_eq!(request.header_value("X-GitHub-Api-Version"), Some(API_VERSION));
}

#[tokio::test]
async fn test_401_maps_to_unauthorized() {
    let (transport, client) = client();
    transport.push(Method::Get, "/user/repos", HttpResponse::status_only(401));

    let err = client.get_repos("updated").await.unwrap_err();
    assert!(err.is_unauthorized());
}

#[tokio::test]
async fn test_commit_limit_stops_mid_listing() {
    let (transport, client) = client();
    let path = "/repos/o/r/commits";
    push_page(&transport, path, 1, commits(0, 100));
    push_page(&transport, path, 2, commits(100, 100));
    push_page(&transport, path, 3, commits(200, 100));

    let result = client.get_commits("o", "r", None, 150).await.unwrap();

    assert_eq!(result.len(), 150);
    assert_eq!(result[149].commit.message, "c149");
    let pages: Vec<String> = transport
        .requests()
        .iter()
        .filter_map(|r| r.query_value("page").map(str::to_string))
        .collect();
    assert_eq!(pages, vec!["1", "2"], "page 3 must never be requested");
}

#[tokio::test]
async fn test_small_limit_shrinks_page_size() {
    let (transport, client) = client();
    transport.push(Method::Get, "/repos/o/r/commits", HttpResponse::json_body(200, &commits(0, 20)));

    let result = client.get_commits("o", "r", Some("dev"), 20).await.unwrap();

    assert_eq!(result.len(), 20);
    let request = &transport.requests()[0];
    assert_eq!(request.query_value("per_page"), Some("20"));
    assert_eq!(request.query_value("sha"), Some("dev"));
}

#[tokio::test]
async fn test_pagination_stops_on_short_page() {
    let (transport, client) = client();
    let path = "/repos/o/r/commits";
    push_page(&transport, path, 1, commits(0, 100));
    push_page(&transport, path, 2, commits(100, 7));

    let result = client.get_commits("o", "r", None, 0).await.unwrap();

    assert_eq!(result.len(), 107);
    assert_eq!(transport.request_count(Method::Get, path), 2);
}

#[tokio::test]
async fn test_pagination_stops_on_empty_page() {
    let (transport, client) = client();
    let path = "/user/following";
    let users = |start: usize| Value::Array((start..start + 100).map(|i| json!({"login": format!("u{}", i)})).collect());
    push_page(&transport, path, 1, users(0));
    push_page(&transport, path, 2, json!([]));

    let result = client.get_following().await.unwrap();
    assert_eq!(result.len(), 100);
    assert_eq!(transport.request_count(Method::Get, path), 2);
}

#[tokio::test]
async fn test_later_page_failure_keeps_collected_items() {
    let (transport, client) = client();
    let path = "/repos/o/r/commits";
    push_page(&transport, path, 1, commits(0, 100));
    transport.push_with_query(Method::Get, path, &[("page", "2")], HttpResponse::status_only(502));

    let result = client.get_commits("o", "r", None, 0).await.unwrap();
    assert_eq!(result.len(), 100);
}

#[tokio::test]
async fn test_complete_listing_fails_on_later_page() {
    let (transport, client) = client();
    push_page(&transport, "/x", 1, commits(0, 10));
    transport.push_with_query(Method::Get, "/x", &[("page", "2")], HttpResponse::status_only(502));

    let result: Result<Vec<Value>, ApiError> = client.paginate("/x", &[], PageSpec::all(10).complete()).await;
    assert!(matches!(result, Err(ApiError::Status { status: 502, .. })));
}

#[tokio::test]
async fn test_notifications_never_return_a_partial_listing() {
    let (transport, client) = client();
    let threads = Value::Array(
        (0..50)
            .map(|i| json!({"id": i.to_string(), "unread": true, "subject": {"title": "t"}}))
            .collect(),
    );
    push_page(&transport, "/notifications", 1, threads);
    transport.push_with_query(Method::Get, "/notifications", &[("page", "2")], HttpResponse::status_only(502));

    assert!(client.get_notifications(false, false).await.is_err());
}

#[tokio::test]
async fn test_first_page_failure_is_an_error() {
    let (transport, client) = client();
    transport.push(Method::Get, "/repos/o/r/commits", HttpResponse::status_only(404));

    let err = client.get_commits("o", "r", None, 0).await.unwrap_err();
    assert!(matches!(err, ApiError::Status { status: 404, .. }));
}

#[tokio::test]
async fn test_paginate_honours_page_cap() {
    let (transport, client) = client();
    transport.push(Method::Get, "/x", HttpResponse::json_body(200, &commits(0, 10)));

    let items: Vec<Value> = client.paginate("/x", &[], PageSpec::pages(10, 2)).await.unwrap();
    assert_eq!(items.len(), 20);
    assert_eq!(transport.request_count(Method::Get, "/x"), 2);
}

#[tokio::test]
async fn test_received_events_reads_at_most_three_pages() {
    let (transport, client) = client();
    let events: Value = Value::Array(
        (0..100)
            .map(|i| json!({"id": i.to_string(), "type": "WatchEvent", "repo": {"name": "o/r"}}))
            .collect(),
    );
    transport.push(Method::Get, "/users/octocat/received_events", HttpResponse::json_body(200, &events));

    let result = client.get_received_events("octocat").await.unwrap();
    assert_eq!(result.len(), 300);
    assert_eq!(transport.request_count(Method::Get, "/users/octocat/received_events"), 3);
}

#[tokio::test]
async fn test_starred_sorted_by_updated_desc() {
    let (transport, client) = client();
    transport.push(
        Method::Get,
        "/user/starred",
        HttpResponse::json_body(
            200,
            &json!([
                {"id": 1, "name": "a", "full_name": "o/a", "updated_at": "2024-01-01T00:00:00Z"},
                {"id": 2, "name": "b", "full_name": "o/b", "updated_at": null},
                {"id": 3, "name": "c", "full_name": "o/c", "updated_at": "2024-03-01T00:00:00Z"}
            ]),
        ),
    );

    let repos: Vec<Repository> = client.get_starred().await.unwrap();
    let ids: Vec<u64> = repos.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![3, 1, 2]);
}

#[tokio::test]
async fn test_issues_exclude_pull_requests() {
    let (transport, client) = client();
    transport.push(
        Method::Get,
        "/repos/o/r/issues",
        HttpResponse::json_body(
            200,
            &json!([
                {"id": 1, "number": 1, "title": "bug"},
                {"id": 2, "number": 2, "title": "pr", "pull_request": {"url": "x"}}
            ]),
        ),
    );

    let issues = client.get_issues("o", "r", IssueState::All).await.unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].title, "bug");
    assert_eq!(transport.requests()[0].query_value("state"), Some("all"));
}

#[rstest]
#[case(204, Ok(true))]
#[case(404, Ok(false))]
#[case(500, Err(500))]
#[tokio::test]
async fn test_is_starred_membership(#[case] status: u16, #[case] expected: Result<bool, u16>) {
    let (transport, client) = client();
    transport.push(Method::Get, "/user/starred/o/r", HttpResponse::status_only(status));

    match (client.is_starred("o", "r").await, expected) {
        (Ok(got), Ok(want)) => assert_eq!(got, want),
        (Err(ApiError::Status { status, .. }), Err(want)) => assert_eq!(status, want),
        (got, want) => panic!("unexpected {:?} vs {:?}", got, want),
    }
}

#[tokio::test]
async fn test_mutation_with_unexpected_status_fails() {
    let (transport, client) = client();
    transport.push(Method::Put, "/user/starred/o/r", HttpResponse::status_only(204));
    transport.push(Method::Delete, "/user/starred/o/r", HttpResponse::status_only(500));

    assert!(client.star_repo("o", "r").await.is_ok());
    assert!(matches!(
        client.unstar_repo("o", "r").await,
        Err(ApiError::Status { status: 500, .. })
    ));
}

#[tokio::test]
async fn test_close_issue_sends_only_state() {
    let (transport, client) = client();
    transport.push(
        Method::Patch,
        "/repos/o/r/issues/5",
        HttpResponse::json_body(200, &json!({"id": 5, "number": 5, "title": "t", "state": "closed"})),
    );

    let issue = client.update_issue("o", "r", 5, &IssueUpdate::state("closed")).await.unwrap();
    assert!(!issue.is_open());
    assert_eq!(transport.requests()[0].body, RequestBody::Json(json!({"state": "closed"})));
}

#[tokio::test]
async fn test_search_omits_sort_for_best_match() {
    let (transport, client) = client();
    transport.push(
        Method::Get,
        "/search/repositories",
        HttpResponse::json_body(200, &json!({"total_count": 1, "items": [{"id": 1, "name": "r", "full_name": "o/r"}]})),
    );

    let repos = client.search_repos("language:rust", "best-match").await.unwrap();
    assert_eq!(repos.len(), 1);
    client.search_repos("language:rust", "stars").await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests[0].query_value("sort"), None);
    assert_eq!(requests[1].query_value("sort"), Some("stars"));
    assert_eq!(requests[0].query_value("q"), Some("language:rust"));
}

#[tokio::test]
async fn test_workflow_runs_are_read_from_envelope() {
    let (transport, client) = client();
    transport.push(
        Method::Get,
        "/repos/o/r/actions/workflows/9/runs",
        HttpResponse::json_body(200, &json!({"total_count": 1, "workflow_runs": [{"id": 77, "status": "completed", "conclusion": "success"}]})),
    );

    let filter = RunFilter {
        workflow_id: Some(9),
        branch: Some("main".to_string()),
        status: None,
    };
    let runs = client.get_workflow_runs("o", "r", &filter).await.unwrap();
    assert_eq!(runs[0].id, 77);
    assert_eq!(runs[0].status_text(), "success");
    assert_eq!(transport.requests()[0].query_value("branch"), Some("main"));
}

#[tokio::test]
async fn test_run_logs_url_comes_from_redirect() {
    let (transport, client) = client();
    transport.push(
        Method::Get,
        "/repos/o/r/actions/runs/5/logs",
        HttpResponse::status_only(302).with_header("Location", "https://logs.example/5.zip"),
    );

    let url = client.get_workflow_run_logs_url("o", "r", 5).await.unwrap();
    assert_eq!(url, "https://logs.example/5.zip");
    assert!(!transport.requests()[0].follow_redirects);
}

#[tokio::test]
async fn test_mark_notifications_read_sends_timestamp() {
    let (transport, client) = client();
    transport.push(Method::Put, "/notifications", HttpResponse::status_only(205));

    let at = chrono::DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z").unwrap().with_timezone(&chrono::Utc);
    client.mark_notifications_read(Some(at)).await.unwrap();

    assert_eq!(
        transport.requests()[0].body,
        RequestBody::Json(json!({"last_read_at": "2024-05-01T12:00:00Z"}))
    );
}

#[tokio::test]
async fn test_contents_single_file_is_wrapped() {
    let (transport, client) = client();
    transport.push(
        Method::Get,
        "/repos/o/r/contents/README.md",
        HttpResponse::json_body(
            200,
            &json!({"name": "README.md", "path": "README.md", "type": "file", "content": "aGk=", "encoding": "base64"}),
        ),
    );

    let items = client.get_contents("o", "r", "/README.md", None).await.unwrap();
    assert_eq!(items.len(), 1);
    let text = client.get_file_content("o", "r", "README.md", None).await.unwrap();
    assert_eq!(text, "hi");
}

#[tokio::test]
async fn test_branches_sorted_by_commit_date() {
    let (transport, client) = client();
    transport.push(
        Method::Get,
        "/repos/o/r/branches",
        HttpResponse::json_body(
            200,
            &json!([
                {"name": "old", "commit": {"sha": "a1"}},
                {"name": "new", "commit": {"sha": "b2"}},
                {"name": "broken", "commit": {"sha": "c3"}}
            ]),
        ),
    );
    let commit = |date: &str| json!({"sha": "x", "commit": {"committer": {"name": "n", "date": date}}});
    transport.push(Method::Get, "/repos/o/r/commits/a1", HttpResponse::json_body(200, &commit("2023-01-01T00:00:00Z")));
    transport.push(Method::Get, "/repos/o/r/commits/b2", HttpResponse::json_body(200, &commit("2024-01-01T00:00:00Z")));
    transport.push(Method::Get, "/repos/o/r/commits/c3", HttpResponse::status_only(500));

    let branches = client.get_branches("o", "r").await.unwrap();
    let names: Vec<&str> = branches.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["new", "old", "broken"]);
}

#[tokio::test]
async fn test_network_error_propagates() {
    let (transport, client) = client();
    transport.push_network_error(Method::Get, "/user", "connection refused");

    assert!(matches!(client.get_authenticated_user().await, Err(ApiError::Network(_))));
}
