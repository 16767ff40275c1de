use rparsers::{
    config::Config,
    dsl,
    fingerprint::{self, Simhash},
    response, ExtractorConfig, ExtractorSet, Extracted, Extracteds, NormalizedContent, ParseError,
    Response, Result, SimilarityThreshold,
};
use std::sync::Arc;

fn raw_response(header: &str, body: &[u8]) -> Vec<u8> {
    let mut raw = header.as_bytes().to_vec();
    raw.extend_from_slice(b"\r\n\r\n");
    raw.extend_from_slice(body);
    raw
}

fn patterns(sources: &[&str]) -> Vec<String> {
    sources.iter().map(|s| s.to_string()).collect()
}

/// Roughly 1000 bytes of space separated words
fn sample_document() -> Vec<u8> {
    let mut doc = Vec::new();
    let mut i = 0u64;
    while doc.len() < 1000 {
        doc.extend_from_slice(format!("word{} ", (i * 7919) % 331).as_bytes());
        i += 1;
    }
    doc.truncate(1000);
    doc
}

fn xorshift_bytes(len: usize) -> Vec<u8> {
    let mut state: u64 = 0x9e37_79b9_7f4a_7c15;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state & 0xff) as u8
        })
        .collect()
}

#[test]
fn test_simhash_is_deterministic() {
    let doc = sample_document();
    let a = fingerprint::simhash(&doc);
    let b = fingerprint::simhash(&doc);

    assert_eq!(a, b);
    assert_eq!(fingerprint::distance(a, b), 0);
}

#[test]
fn test_simhash_ignores_token_order() {
    let a = fingerprint::simhash(b"alpha beta gamma alpha");
    let b = fingerprint::simhash(b"gamma alpha\nbeta  alpha");
    assert_eq!(a, b);
}

#[test]
fn test_simhash_small_edit_is_closer_than_random_content() {
    let doc = sample_document();

    let mut edited = doc.clone();
    let pos = (500..edited.len()).find(|&i| edited[i] != b' ').unwrap();
    edited[pos] = b'#';

    let noise = xorshift_bytes(1000);

    let base = fingerprint::simhash(&doc);
    let near = fingerprint::distance(base, fingerprint::simhash(&edited));
    let far = fingerprint::distance(base, fingerprint::simhash(&noise));

    assert!(near < far, "edit distance {} should be below random distance {}", near, far);
}

#[test]
fn test_simhash_hex_form() -> Result<()> {
    let hash = fingerprint::simhash(b"alpha beta gamma alpha");
    let rendered = hash.to_string();

    assert_eq!(rendered, rendered.to_lowercase());
    assert_eq!(rendered.parse::<Simhash>()?, hash);
    assert_eq!(fingerprint::simhash(b"").to_string(), "0");

    assert_eq!(fingerprint::distance_hex("ff", "0")?, 8);
    assert_eq!(fingerprint::distance_hex("ffffffffffffffff", "0")?, 64);
    assert!(matches!(
        fingerprint::distance_hex("zz", "0"),
        Err(ParseError::InvalidFingerprint(_))
    ));
    Ok(())
}

#[test]
fn test_fingerprint_set() -> Result<()> {
    let content = NormalizedContent::normalize(raw_response("HTTP/1.1 200 OK\r\nServer: nginx", b"hello world"))?;
    let set = fingerprint::fingerprint(&content);

    assert_eq!(set.body_md5, "5eb63bbbe01eeed093cb22bb8f5acdc3");
    assert_eq!(set.body_md5.len(), 32);
    assert_eq!(set.header_md5.len(), 32);
    assert_eq!(set.body_simhash, fingerprint::simhash(b"hello world"));
    assert!(set.body_mmh3.parse::<u32>().is_ok());

    let same = fingerprint::fingerprint(&content);
    assert!(set.same_body(&same));
    let distances = set.compare(&same);
    assert_eq!((distances.body, distances.header, distances.raw), (0, 0, 0));
    assert!(distances.is_near_duplicate(SimilarityThreshold::default()));

    let json = serde_json::to_value(&set)?;
    for key in ["body-md5", "header-md5", "raw-md5", "body-simhash", "header-simhash", "raw-simhash", "body-mmh3"] {
        assert!(json.get(key).is_some(), "missing key {}", key);
    }
    assert_eq!(json["body-simhash"], set.body_simhash.to_string());
    Ok(())
}

#[test]
fn test_similarity_threshold() {
    let threshold = SimilarityThreshold::default();
    assert_eq!(threshold.0, 8);
    assert!(threshold.is_near_duplicate(8));
    assert!(!threshold.is_near_duplicate(9));
    assert!(SimilarityThreshold(0).is_near_duplicate(0));
}

#[test]
fn test_transform_round_trips() -> Result<()> {
    let encoded = dsl::decode("b64en|hello")?;
    assert!(encoded.applied);
    assert_eq!(encoded.bytes, b"aGVsbG8=");

    let decoded = dsl::decode(&format!("b64de|{}", encoded.to_string_lossy()))?;
    assert_eq!(decoded.bytes, b"hello");

    let hexed = dsl::decode("hex|payload")?;
    assert_eq!(hexed.bytes, b"7061796c6f6164");
    assert_eq!(dsl::decode("unhex|7061796c6f6164")?.bytes, b"payload");

    assert_eq!(dsl::decode_to_string("md5|hello")?, "5d41402abc4b2a76b9719d911017c592");
    Ok(())
}

#[test]
fn test_transform_literals() -> Result<()> {
    let plain = dsl::decode("whatever")?;
    assert_eq!(plain.bytes, b"whatever");
    assert!(!plain.applied);

    let unknown = dsl::decode("rot13|abc")?;
    assert_eq!(unknown.bytes, b"rot13|abc");
    assert!(!unknown.applied);

    // Only the first pipe separates
    assert_eq!(dsl::decode("b64en|a|b")?.bytes, b"YXxi");
    Ok(())
}

#[test]
fn test_transform_strict_and_lenient_failures() {
    assert!(matches!(dsl::decode("b64de|!!!"), Err(ParseError::Base64Decode(_))));
    assert!(matches!(dsl::decode("unhex|zz"), Err(ParseError::HexDecode(_))));

    let lenient = dsl::decode_lenient("unhex|zz");
    assert_eq!(lenient.bytes, b"unhex|zz");
    assert!(!lenient.applied);
}

#[test]
fn test_normalize_splits_and_keeps_utf8() -> Result<()> {
    let raw = raw_response("HTTP/1.1 200 OK\r\nContent-Type: text/html", b"<p>ok</p>");
    let content = response::normalize(raw.clone())?;

    assert_eq!(content.header(), b"HTTP/1.1 200 OK\r\nContent-Type: text/html");
    assert_eq!(content.body(), b"<p>ok</p>");
    assert_eq!(content.raw(), raw.as_slice());
    assert_eq!(content.detected_charset(), None);
    Ok(())
}

#[test]
fn test_normalize_without_separator_fails() {
    let result = NormalizedContent::normalize(b"HTTP/1.1 200 OK\r\nno body here".to_vec());
    assert!(matches!(result, Err(ParseError::MissingHeaderSeparator)));
}

#[test]
fn test_normalize_converts_gbk() -> Result<()> {
    let raw = raw_response(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=GBK",
        b"<title>\xd6\xd0\xce\xc4</title>",
    );
    let content = NormalizedContent::normalize(raw)?;

    assert_eq!(content.detected_charset(), Some("gbk"));
    assert_eq!(content.body_text(), "<title>中文</title>");
    assert!(std::str::from_utf8(content.raw()).is_ok());
    assert!(content.raw().ends_with("中文</title>".as_bytes()));
    Ok(())
}

#[test]
fn test_header_charset_takes_priority_over_meta() -> Result<()> {
    let raw = raw_response(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=gbk",
        b"<meta charset=\"utf-8\"><p>\xc4\xe3\xba\xc3</p>",
    );
    let content = NormalizedContent::normalize(raw)?;

    assert_eq!(content.detected_charset(), Some("gbk"));
    assert!(content.body_text().contains("你好"));
    Ok(())
}

#[test]
fn test_meta_charset_is_used_without_header() -> Result<()> {
    let raw = raw_response(
        "HTTP/1.1 200 OK",
        b"<html><head><meta http-equiv=\"Content-Type\" content=\"text/html; charset=gb2312\"></head>\xc4\xe3\xba\xc3",
    );
    let content = NormalizedContent::normalize(raw)?;

    assert_eq!(content.detected_charset(), Some("gb2312"));
    assert!(content.body_text().ends_with("你好"));
    Ok(())
}

#[test]
fn test_utf16_charset_keeps_header_bytes() -> Result<()> {
    let header = "HTTP/1.1 200 OK\r\nServer: nginx\r\nContent-Type: text/plain; charset=utf-16";
    let raw = raw_response(header, b"h\0i\0");
    let content = NormalizedContent::normalize(raw.clone())?;

    assert_eq!(content.detected_charset(), Some("utf-16"));
    assert_eq!(content.header(), header.as_bytes());
    assert_eq!(content.body(), b"hi");
    assert!(content.raw().starts_with(header.as_bytes()));
    assert!(content.raw().ends_with(b"\r\n\r\nhi"));

    let response = Response::from_raw(raw);
    assert_eq!(response.server.as_deref(), Some("nginx"));
    assert_eq!(
        response.fingerprints().header_md5,
        rparsers::utils::encoding::md5_hex(header.as_bytes())
    );
    Ok(())
}

#[test]
fn test_malformed_gbk_passes_through_unchanged() -> Result<()> {
    let raw = raw_response("HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=gbk", b"ok \x81 bad");
    let content = NormalizedContent::normalize(raw.clone())?;

    assert_eq!(content.detected_charset(), Some("gbk"));
    assert_eq!(content.body(), b"ok \x81 bad");
    assert_eq!(content.raw(), raw.as_slice());
    Ok(())
}

#[test]
fn test_response_honours_meta_sniff_len() {
    let mut body = vec![b' '; 64];
    body.extend_from_slice(b"<meta charset=\"gbk\">\xc4\xe3\xba\xc3");
    let raw = raw_response("HTTP/1.1 200 OK", &body);

    let narrow = Response::from_raw_with(raw.clone(), 16);
    assert_eq!(narrow.charset, None);
    assert!(narrow.content().body().ends_with(b"\xc4\xe3\xba\xc3"));

    let wide = Response::from_raw_with(raw.clone(), 1024);
    assert_eq!(wide.charset.as_deref(), Some("gbk"));
    assert!(wide.content().body_text().ends_with("你好"));

    let config = Config::default();
    let default = Response::from_raw_with(raw, config.engine.meta_sniff_len);
    assert_eq!(default.fingerprints(), wide.fingerprints());
}

#[test]
fn test_response_record() {
    let raw = raw_response(
        "HTTP/1.1 200 OK\r\nServer: nginx/1.18.0\r\nSet-Cookie: PHPSESSID=abc123; path=/",
        b"<html><title> Admin Login </title></html>",
    );
    let response = Response::from_raw(raw);

    assert!(!response.is_opaque());
    assert_eq!(response.title, "Admin Login");
    assert!(response.has_title);
    assert_eq!(response.server.as_deref(), Some("nginx/1.18.0"));
    assert_eq!(response.language.as_deref(), Some("PHP"));
    assert_eq!(response.charset, None);
}

#[test]
fn test_response_powered_by_wins_over_cookie() {
    let raw = raw_response(
        "HTTP/1.1 200 OK\r\nX-Powered-By: Express\r\nSet-Cookie: JSESSIONID=1",
        b"{}",
    );
    assert_eq!(Response::from_raw(raw).language.as_deref(), Some("Express"));
}

#[test]
fn test_response_fallback_label() {
    let response = Response::from_raw(raw_response("HTTP/1.1 200 OK", b"plain"));
    assert!(!response.has_title);
    assert_eq!(response.title, "HTTP/1.1 200 ");

    let response = Response::from_raw(raw_response("\x01\x02", b""));
    assert_eq!(response.title, "\\x01\\x02\\r\\n\\r\\n");
}

#[test]
fn test_response_opaque_content() {
    let raw = b"garbage without separator".to_vec();
    let response = Response::from_raw(raw.clone());

    assert!(response.is_opaque());
    assert_eq!(response.content().raw(), raw.as_slice());
    assert!(response.content().body().is_empty());
    assert!(response.content().header().is_empty());

    let hashes = response.fingerprints();
    assert_eq!(hashes.body_md5, "d41d8cd98f00b204e9800998ecf8427e");
    assert_eq!(hashes.body_simhash, Simhash::new(0));
}

#[test]
fn test_extract_unique_and_ordinary() {
    let extractor = ExtractorConfig::new("words", patterns(&[r"\w+"])).compile();

    let all = extractor.extract("aa bb aa", false);
    assert_eq!(all.name, "words");
    assert_eq!(all.matches, vec!["aa", "bb", "aa"]);

    let unique = extractor.extract("aa bb aa", true);
    assert_eq!(unique.matches, vec!["aa", "bb"]);
}

#[test]
fn test_extract_empty_body() {
    let extractor = ExtractorConfig::new("words", patterns(&[r"\w+"])).compile();
    let result = extractor.extract("", false);

    assert_eq!(result.name, "words");
    assert!(result.is_empty());

    let set: ExtractorSet = vec![ExtractorConfig::new("words", patterns(&[r"\w+"]))].into_iter().collect();
    assert!(set.extract_all("", false).is_empty());
}

#[test]
fn test_extract_isolates_compile_failures() {
    let extractor = ExtractorConfig::new("ids", patterns(&["(unclosed", r"\d+"])).compile();

    assert_eq!(extractor.patterns().len(), 1);
    assert_eq!(extractor.failures().len(), 1);
    match &extractor.failures()[0] {
        ParseError::PatternCompile { extractor, index, pattern, .. } => {
            assert_eq!(extractor, "ids");
            assert_eq!(*index, 0);
            assert_eq!(pattern, "(unclosed");
        }
        other => panic!("unexpected failure {:?}", other),
    }

    assert_eq!(extractor.extract("id=42", false).matches, vec!["42"]);
}

#[test]
fn test_extract_obfuscated_patterns() {
    // "XGQr" is base64 for \d+
    let extractor = ExtractorConfig::new("digits", patterns(&["b64de|XGQr"])).compile();
    assert!(extractor.failures().is_empty());
    assert_eq!(extractor.extract("a1b22", false).matches, vec!["1", "22"]);
    assert_eq!(extractor.sources(), ["b64de|XGQr".to_string()]);

    // Invalid base64 falls back to the literal source as the pattern
    let literal = ExtractorConfig::new("literal", patterns(&["b64de|x+"])).compile();
    assert!(literal.failures().is_empty());
    assert_eq!(literal.extract("see xxx", false).matches, vec!["xxx"]);
}

#[test]
fn test_extract_all_in_configuration_order() {
    let set = ExtractorSet::compile(vec![
        ExtractorConfig::new("emails", patterns(&[r"[a-z]+@[a-z]+\.com"])),
        ExtractorConfig::new("digits", patterns(&[r"\d+"])),
        ExtractorConfig::new("none", patterns(&["zzz"])),
    ]);
    let results = set.extract_all("mail bob@corp.com or 555", false);

    let names: Vec<&str> = results.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["emails", "digits", "none"]);
    assert_eq!(results.get("emails").unwrap().matches, vec!["bob@corp.com"]);
    assert_eq!(results.get("digits").unwrap().matches, vec!["555"]);
    assert_eq!(results.clone().non_empty().len(), 2);
}

#[test]
fn test_extractor_tags() {
    let set = ExtractorSet::compile(vec![
        ExtractorConfig::new("aws", patterns(&["AKIA[0-9A-Z]{16}"])).with_tags(["secret", "cloud"]),
        ExtractorConfig::new("version", patterns(&[r"\d+\.\d+\.\d+"])).with_tags(["info"]),
    ]);

    let secrets = set.with_tag("secret");
    assert_eq!(secrets.len(), 1);
    assert!(secrets.get("aws").is_some());
    assert!(secrets.get("version").is_none());
    assert!(set.with_tag("missing").is_empty());
}

#[test]
fn test_extracteds_merge_and_display() {
    let mut results = Extracteds::new();
    results.merge(Extracted { name: "ip".to_string(), matches: vec!["1.1.1.1".to_string()] }, true);
    results.merge(
        Extracted {
            name: "ip".to_string(),
            matches: vec!["1.1.1.1".to_string(), "8.8.8.8".to_string()],
        },
        true,
    );
    results.merge(Extracted { name: "key".to_string(), matches: vec!["abc".to_string()] }, true);

    assert_eq!(results.len(), 2);
    assert_eq!(results.get("ip").unwrap().matches, vec!["1.1.1.1", "8.8.8.8"]);
    assert_eq!(results.to_string(), "[ ip:2 items ][ key:abc ] ");

    let json = serde_json::to_value(&results).unwrap();
    assert_eq!(json[0]["name"], "ip");
    assert_eq!(json[0]["extract_result"][1], "8.8.8.8");
}

#[test]
fn test_extractor_set_is_shared_across_threads() {
    let set = Arc::new(ExtractorSet::compile(vec![
        ExtractorConfig::new("words", patterns(&[r"[a-z]+"])),
        ExtractorConfig::new("digits", patterns(&[r"\d+"])),
    ]));
    let body = "abc 123 def 456 abc";
    let expected = set.extract_all(body, true);

    std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let set = Arc::clone(&set);
                s.spawn(move || set.extract_all(body, true))
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });

    assert_eq!(expected.get("words").unwrap().matches, vec!["abc", "def"]);
}

#[test]
fn test_extractor_config_accepts_regex_alias() -> Result<()> {
    let config: ExtractorConfig =
        serde_json::from_str(r#"{"name": "jwt", "regex": ["eyJ[A-Za-z0-9_-]+"], "tags": ["token"]}"#)?;

    assert_eq!(config.name, "jwt");
    assert_eq!(config.regexps, vec!["eyJ[A-Za-z0-9_-]+"]);
    assert!(config.tags.contains("token"));
    Ok(())
}

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.engine.simhash_threshold, 8);
    assert!(!config.engine.unique_extract);
    assert_eq!(config.engine.max_response_size, 4 * 1024 * 1024);
    assert_eq!(config.engine.meta_sniff_len, 1024);
    assert_eq!(config.engine.workers, 16);
    assert!(config.extractors.is_empty());
    assert_eq!(config.threshold(), SimilarityThreshold(8));
}

#[test]
fn test_config_save_and_load() -> Result<()> {
    use tempfile::Builder;

    let mut config = Config::default();
    config.engine.simhash_threshold = 3;
    config.engine.unique_extract = true;
    config.extractors.push(
        ExtractorConfig::new("digits", patterns(&[r"\d+", "b64de|XGQr"])).with_tags(["info"]),
    );

    let temp_file = Builder::new().suffix(".toml").tempfile().unwrap();
    let temp_path = temp_file.path().to_str().unwrap();

    config.save_to_file(temp_path)?;
    let loaded = Config::load_from_file(temp_path)?;

    assert_eq!(loaded.engine.simhash_threshold, 3);
    assert!(loaded.engine.unique_extract);
    assert_eq!(loaded.engine.workers, config.engine.workers);
    assert_eq!(loaded.extractors, config.extractors);

    let set = loaded.compile_extractors();
    assert_eq!(set.failures().count(), 0);
    assert_eq!(set.extract_all("a1", true).get("digits").unwrap().matches, vec!["1"]);
    Ok(())
}
