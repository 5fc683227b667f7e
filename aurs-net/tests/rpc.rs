use std::time::Duration;

use aurs_common::universe::RegistryClient;
use aurs_common::AursError;
use aurs_net::http::RetryPolicy;
use aurs_net::{RpcClient, SearchField};
use mockito::{Matcher, Server};

fn client_for(server: &Server, batch_size: usize) -> RpcClient {
    RpcClient::with_base_url(
        &format!("{}/rpc/", server.url()),
        Duration::from_secs(5),
        batch_size,
    )
    .unwrap()
    .with_retry_policy(RetryPolicy {
        max_attempts: 3,
        backoff: Duration::ZERO,
    })
}

#[test]
fn test_info_returns_found_packages_only() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/rpc/")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("v".into(), "5".into()),
            Matcher::UrlEncoded("type".into(), "info".into()),
            Matcher::UrlEncoded("arg[]".into(), "yay".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"version":5,"type":"multiinfo","resultcount":1,
                "results":[{"Name":"yay","Version":"12.3.5-1","PackageBase":"yay",
                            "Depends":["git"]}]}"#,
        )
        .expect(1)
        .create();

    let client = client_for(&server, 200);
    let packages = client
        .info(&["yay".to_string(), "does-not-exist".to_string()])
        .unwrap();
    assert_eq!(packages.len(), 1);
    assert_eq!(packages[0].name, "yay");
    assert_eq!(packages[0].depends[0].package_name, "git");
    mock.assert();
}

#[test]
fn test_info_splits_requests_by_batch_size() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/rpc/")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"resultcount":0,"results":[]}"#)
        .expect(3)
        .create();

    let client = client_for(&server, 2);
    let names: Vec<String> = (0..5).map(|i| format!("pkg{i}")).collect();
    let packages = client.info(&names).unwrap();
    assert!(packages.is_empty());
    mock.assert();
}

#[test]
fn test_server_errors_are_retried_then_surface() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/rpc/")
        .match_query(Matcher::Any)
        .with_status(503)
        .expect(3)
        .create();

    let client = client_for(&server, 200);
    let err = client.info(&["yay".to_string()]).unwrap_err();
    assert!(err.is_retryable());
    mock.assert();
}

#[test]
fn test_query_level_error_is_not_retried() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/rpc/")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"resultcount":0,"results":[],"type":"error","error":"Too many package results."}"#)
        .expect(1)
        .create();

    let client = client_for(&server, 200);
    let err = client.search(SearchField::Name, "a").unwrap_err();
    assert!(matches!(err, AursError::Api(_)));
    mock.assert();
}

#[test]
fn test_search_passes_field_and_term() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/rpc/")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("type".into(), "search".into()),
            Matcher::UrlEncoded("by".into(), "maintainer".into()),
            Matcher::UrlEncoded("arg".into(), "jguer".into()),
        ]))
        .with_status(200)
        .with_body(
            r#"{"resultcount":2,"results":[
                {"Name":"yay","Version":"12-1","Popularity":30.0},
                {"Name":"yay-bin","Version":"12-1","Popularity":5.0}]}"#,
        )
        .create();

    let client = client_for(&server, 200);
    let results = client.search(SearchField::Maintainer, "jguer").unwrap();
    assert_eq!(results.len(), 2);
    mock.assert();
}
