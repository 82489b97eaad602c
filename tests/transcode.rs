//! Tests for HTTPS URL ⇄ `did:web` transcoding round trips.

use didweb::{Error, did_url_to_https_url, https_url_to_did_url, url_to_did};

#[test]
fn root_path_round_trip() {
    let did = url_to_did("https://bar.com").expect("should transcode");
    assert_eq!(did, "did:web:bar.com");

    let url = did_url_to_https_url(&did).expect("should transcode");
    assert_eq!(url.origin, "https://bar.com");
    assert_eq!(url.base_url, "https://bar.com/.well-known/did.json");
}

#[test]
fn single_segment_round_trip() {
    let did = url_to_did("https://bar.com/path").expect("should transcode");
    assert_eq!(did, "did:web:bar.com:path");

    let url = did_url_to_https_url(&did).expect("should transcode");
    assert_eq!(url.base_url, "https://bar.com/path/did.json");
}

#[test]
fn port_round_trip() {
    let did = url_to_did("https://www.bar.org:46443").expect("should transcode");
    assert_eq!(did, "did:web:www.bar.org%3A46443");

    let url = did_url_to_https_url(&did).expect("should transcode");
    assert_eq!(url.origin, "https://www.bar.org:46443");
    assert_eq!(url.domain, "www.bar.org:46443");
}

#[test]
fn query_and_fragment_round_trip() {
    let did = url_to_did("https://host/path?service=bar#zFoo").expect("should transcode");
    assert_eq!(did, "did:web:host:path?service=bar#zFoo");

    let url = did_url_to_https_url(&did).expect("should transcode");
    assert_eq!(url.full_url, "https://host/path/did.json?service=bar#zFoo");
    assert_eq!(url.url_without_fragment, "https://host/path/did.json?service=bar");
    assert_eq!(url.search.as_deref(), Some("service=bar"));
    assert_eq!(url.fragment.as_deref(), Some("zFoo"));
}

#[test]
fn reserved_characters_round_trip() {
    let did = url_to_did("https://host/foo+srv").expect("should transcode");
    assert_eq!(did, "did:web:host:foo%2Bsrv");

    let url = did_url_to_https_url(&did).expect("should transcode");
    assert_eq!(url.base_url, "https://host/foo+srv/did.json");
}

#[test]
fn document_suffixes_are_canonical() {
    // encoding drops the suffix, decoding restores it
    let did = url_to_did("https://host/.well-known/did.json").expect("should transcode");
    assert_eq!(did, "did:web:host");
    let did = url_to_did("https://host/foo/did.json").expect("should transcode");
    assert_eq!(did, "did:web:host:foo");
    assert_eq!(
        did_url_to_https_url(&did).expect("should transcode").base_url,
        "https://host/foo/did.json"
    );
}

#[test]
fn did_excludes_query_and_fragment() {
    let did_url = https_url_to_did_url("https://host/path?service=bar#zFoo").expect("should transcode");
    assert_eq!(did_url.did, "did:web:host:path");
    assert_eq!(did_url.full_url, "did:web:host:path?service=bar#zFoo");
}

#[test]
fn rejects_raw_slash() {
    let err = did_url_to_https_url("did:web:bar.com/path").expect_err("should reject");
    assert!(matches!(err, Error::DomainContainsPath(_)));
}

#[test]
fn rejects_non_https() {
    let err = url_to_did("http://bar.com").expect_err("should reject");
    assert!(matches!(err, Error::InvalidProtocol(p) if p == "http:"));
}
