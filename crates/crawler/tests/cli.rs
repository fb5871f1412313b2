// ABOUTME: Integration tests for the lore-crawl CLI binary.
// ABOUTME: Covers local HTML derivation, plain HTTP fetching of several urls, and argument errors.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use assert_cmd::assert::OutputAssertExt;
use assert_cmd::cargo::CommandCargoExt;
use httpmock::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

fn lore_crawl() -> Command {
    Command::cargo_bin("lore-crawl").unwrap()
}

fn html_file(dir: &TempDir, html: &str) -> PathBuf {
    let path = dir.path().join("page.html");
    fs::write(&path, html).unwrap();
    path
}

fn serve_page<'a>(server: &'a MockServer, path: &str, body: &str) -> httpmock::Mock<'a> {
    let html = format!("<html><body><p>{}</p></body></html>", body);
    server.mock(|when, then| {
        when.method(GET).path(path);
        then.status(200)
            .header("content-type", "text/html; charset=utf-8")
            .body(html);
    })
}

#[test]
fn derive_from_html_file() {
    let dir = TempDir::new().unwrap();
    let page = html_file(
        &dir,
        "<!DOCTYPE html><html><head><title>Test Page</title></head>\
         <body><article><p>A lightning wallet for everyday payments.</p></article></body></html>",
    );

    lore_crawl()
        .arg("--html")
        .arg(&page)
        .args(["--url", "https://example.com"])
        .assert()
        .success()
        .stdout(predicate::str::contains("A lightning wallet for everyday payments."))
        .stdout(predicate::str::contains("tags: lightning, wallet"));
}

#[test]
fn multiple_urls_over_http() {
    let server = MockServer::start();
    let relays = serve_page(&server, "/relays", "Page One is about nostr relays.");
    let mining = serve_page(&server, "/mining", "Page Two is about bitcoin mining.");

    let assert = lore_crawl()
        .args(["--fetcher", "http", "--allow-private-networks", "--json"])
        .arg(server.url("/relays"))
        .arg(server.url("/mining"))
        .assert()
        .success();

    relays.assert();
    mining.assert();

    let entries: Vec<serde_json::Value> =
        serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries[0]["content"].as_str().unwrap().contains("Page One"));
    assert!(entries[1]["tags"]
        .as_array()
        .unwrap()
        .iter()
        .any(|t| t == "mining"));
}

#[test]
fn private_url_rejected_without_flag() {
    let server = MockServer::start();
    let secret = serve_page(&server, "/secret", "Secret");

    lore_crawl()
        .args(["--fetcher", "http"])
        .arg(server.url("/secret"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("SSRF rejected"));

    secret.assert_hits(0);
}

#[test]
fn timing_goes_to_stderr() {
    let dir = TempDir::new().unwrap();
    let page = html_file(&dir, "<html><body><p>Test page body.</p></body></html>");

    lore_crawl()
        .arg("--html")
        .arg(&page)
        .args(["--url", "https://example.com", "--timing"])
        .assert()
        .success()
        .stderr(predicate::str::is_match(r"elapsed: \d+ms").unwrap());
}

#[test]
fn json_written_to_output_file() {
    let dir = TempDir::new().unwrap();
    let page = html_file(
        &dir,
        "<html><body><article><p>Content here.</p></article></body></html>",
    );
    let out = dir.path().join("entry.json");

    lore_crawl()
        .arg("--html")
        .arg(&page)
        .args(["--url", "https://example.com", "--json", "-o"])
        .arg(&out)
        .assert()
        .success();

    let entry: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert!(entry["content"].is_string());
    assert!(entry["extractor"].is_string());
}

#[test]
fn html_without_url_fails() {
    let dir = TempDir::new().unwrap();
    let page = html_file(&dir, "<html><body><p>Test</p></body></html>");

    lore_crawl()
        .arg("--html")
        .arg(&page)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--url is required"));
}

#[test]
fn no_args_fails() {
    lore_crawl()
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least one URL is required"));
}
