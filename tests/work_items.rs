use sitemap_audit::work::{build_work_items, file_key, plan_batches, WorkItem};

#[test]
fn file_key_strips_scheme_and_slashes() {
    assert_eq!(file_key("https://example.com/blog/post"), "example.com-blog-post");
    assert_eq!(file_key("http://example.com/"), "example.com-");
    assert_eq!(file_key("//cdn.example.com/a"), "cdn.example.com-a");
    assert_eq!(file_key("example.com/a"), "example.com-a");
}

#[test]
fn file_key_replaces_unsafe_characters() {
    assert_eq!(
        file_key("https://example.com:8080/search?q=a|b"),
        "example.com_8080-search_q=a_b"
    );
}

#[test]
fn duplicates_and_blanks_are_dropped() {
    let items = build_work_items(
        vec![
            "https://a.test/".to_string(),
            "  ".to_string(),
            "https://b.test/".to_string(),
            "https://a.test/".to_string(),
        ],
        0,
    );
    let urls: Vec<_> = items.iter().map(|i| i.raw_url.as_str()).collect();
    assert_eq!(urls, vec!["https://a.test/", "https://b.test/"]);
}

#[test]
fn max_urls_keeps_a_prefix() {
    let urls = (0..20).map(|i| format!("https://a.test/{i}"));
    let items = build_work_items(urls, 12);
    assert_eq!(items.len(), 12);
    assert_eq!(items[11].raw_url, "https://a.test/11");
}

#[test]
fn colliding_keys_get_distinct_suffixes() {
    let items = build_work_items(
        vec![
            "https://a.test/x".to_string(),
            "http://a.test/x".to_string(),
        ],
        0,
    );
    assert_eq!(items[0].file_key, "a.test-x");
    assert_ne!(items[1].file_key, items[0].file_key);
    assert!(items[1].file_key.starts_with("a.test-x-"));
    assert_eq!(items[1].file_key.len(), "a.test-x-".len() + 8);
}

#[test]
fn batches_are_contiguous_and_clamped() {
    let items: Vec<WorkItem> = (0..7)
        .map(|i| WorkItem::new(format!("https://a.test/{i}")))
        .collect();
    let batches = plan_batches(&items, 3);
    let sizes: Vec<_> = batches.iter().map(|b| b.len()).collect();
    assert_eq!(sizes, vec![3, 3, 1]);
    assert_eq!(batches[2].start, 6);
    assert_eq!(batches[2].items[0].raw_url, "https://a.test/6");
    assert!(plan_batches(&[], 3).is_empty());
}
