use biotask::types::{ExternalLink, LinkError, ACCEPTED_SCHEMES};

#[test]
fn test_every_documented_scheme_is_accepted() {
    let urls = [
        "http://archive.example.org/run42/reads.fastq.gz",
        "https://archive.example.org/run42/reads.fastq.gz",
        "ftp://mirror.example.org/pub/GRCh38.fa.gz",
        "ascp://transfer.example.org/vault/reads.bam",
        "s3://sequencing-drops/run42/reads.bam",
        "raw:FA000123",
    ];
    for url in urls {
        let link = ExternalLink::from_url(url).unwrap_or_else(|e| panic!("{url}: {e}"));
        assert!(ACCEPTED_SCHEMES.contains(&link.scheme()));
    }
}

#[test]
fn test_unsupported_schemes_are_rejected() {
    for url in ["file:///etc/passwd", "gopher://old.example.org/x", "data:text/plain,hi"] {
        let err = ExternalLink::from_url(url).unwrap_err();
        assert!(
            matches!(err, LinkError::UnsupportedScheme { .. }),
            "{url} gave {err}"
        );
    }
}

#[test]
fn test_malformed_urls_are_rejected() {
    assert!(matches!(
        ExternalLink::from_url("://nope").unwrap_err(),
        LinkError::InvalidUrl { .. }
    ));
}

#[test]
fn test_display_text_derivation() {
    let link =
        ExternalLink::from_url("https://archive.example.org/runs/SRR001/reads%20lane1.fq").unwrap();
    assert_eq!(link.text(), "reads lane1.fq");

    // Trailing slash: the last non-empty segment still wins.
    let link = ExternalLink::from_url("https://archive.example.org/runs/SRR001/").unwrap();
    assert_eq!(link.text(), "SRR001");
}

#[test]
fn test_explicit_text_and_format_are_kept() {
    let mut format = indexmap::IndexMap::new();
    format.insert("compression".to_string(), "gzip".to_string());
    let link = ExternalLink::new("lane 1", "s3://bucket/reads.fq.gz", Some(format)).unwrap();
    assert_eq!(link.text(), "lane 1");
    assert_eq!(
        link.format().and_then(|f| f.get("compression")).map(String::as_str),
        Some("gzip")
    );
}

#[test]
fn test_raw_scheme_marks_platform_reference() {
    assert!(ExternalLink::from_url("raw:FA000123")
        .unwrap()
        .is_platform_reference());
    assert!(!ExternalLink::from_url("https://x.org/f")
        .unwrap()
        .is_platform_reference());
}
