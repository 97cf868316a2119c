fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use vidup_protocol::{
        CompleteUploadRequest, CompleteUploadResponse, CookieFile, CoverUploadResponse,
        InitUploadResponse, NavResponse, PreUploadResponse, PublishRequest, PublishResponse,
        UposLocation,
    };

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    fn parse_fixture<T: serde::de::DeserializeOwned>(name: &str) -> T {
        serde_json::from_value(load_fixture(name))
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"))
    }

    /// Normalizes JSON values so that integer-valued floats compare equal.
    fn normalize_value(v: &serde_json::Value) -> serde_json::Value {
        match v {
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => serde_json::json!(f),
                None => v.clone(),
            },
            serde_json::Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), normalize_value(v)))
                    .collect(),
            ),
            serde_json::Value::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(normalize_value).collect())
            }
            _ => v.clone(),
        }
    }

    /// Deserializes a fixture, re-serializes it, and compares the JSON
    /// values. Catches renamed or dropped keys on types we also send.
    fn roundtrip_test<T>(name: &str)
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            normalize_value(&fixture),
            normalize_value(&reserialized),
            "roundtrip mismatch for {name}:\n  wire: {fixture}\n  ours: {reserialized}"
        );
    }

    // --- Outgoing bodies: exact key sets matter ---

    #[test]
    fn fixture_complete_upload_request() {
        roundtrip_test::<CompleteUploadRequest>("complete_upload_request.json");
    }

    #[test]
    fn fixture_publish_request() {
        roundtrip_test::<PublishRequest>("publish_request.json");
    }

    // --- Responses ---

    #[test]
    fn fixture_pre_upload_response() {
        roundtrip_test::<PreUploadResponse>("pre_upload_response.json");
    }

    #[test]
    fn pre_upload_response_ignores_unmodelled_fields() {
        let resp: PreUploadResponse = parse_fixture("pre_upload_response_full.json");
        assert_eq!(resp.chunk_size, 10_485_760);
        assert_eq!(resp.biz_id, 1_301_874_203);
        assert!(resp.auth.starts_with("ak="));

        let loc = UposLocation::parse("https", &resp.endpoint, &resp.upos_uri).unwrap();
        assert_eq!(
            loc.base_url,
            "https://upos-cs-upcdnbda2.bilivideo.com/ugcboss/n230917qn1x2y3z4.mp4"
        );
        assert_eq!(loc.remote_file_name, "n230917qn1x2y3z4");
    }

    #[test]
    fn fixture_init_upload_response() {
        roundtrip_test::<InitUploadResponse>("init_upload_response.json");
        let resp: InitUploadResponse = parse_fixture("init_upload_response.json");
        assert_eq!(resp.upload_id, "a1b2c3d4e5f60718293a4b5c6d7e8f90");
    }

    #[test]
    fn fixture_complete_upload_response() {
        roundtrip_test::<CompleteUploadResponse>("complete_upload_response.json");
        let resp: CompleteUploadResponse = parse_fixture("complete_upload_response.json");
        assert!(resp.is_ok());
    }

    #[test]
    fn fixture_publish_response() {
        roundtrip_test::<PublishResponse>("publish_response.json");
        let resp: PublishResponse = parse_fixture("publish_response.json");
        assert_eq!(resp.code, 0);
        assert_eq!(resp.data["bvid"], "BV1xx411c7mD");
    }

    #[test]
    fn fixture_cover_upload_response() {
        let resp: CoverUploadResponse = parse_fixture("cover_upload_response.json");
        assert_eq!(resp.code, 0);
        assert!(resp.data.url.ends_with("3f1e.jpg"));
    }

    #[test]
    fn fixture_nav_response() {
        let resp: NavResponse = parse_fixture("nav_response.json");
        assert_eq!(resp.data.uname, "ride_club");
    }

    #[test]
    fn fixture_cookie_file() {
        let file: CookieFile = parse_fixture("cookie_file.json");
        let cookies = &file.data.cookie_info.cookies;
        assert_eq!(cookies.len(), 3);
        assert!(
            cookies
                .iter()
                .any(|c| c.name == "bili_jct" && c.value == "0f1e2d3c4b5a69788796a5b4c3d2e1f0")
        );
    }

    #[test]
    fn publish_request_matches_csrf_in_cookie_file() {
        let file: CookieFile = parse_fixture("cookie_file.json");
        let req: PublishRequest = parse_fixture("publish_request.json");
        let jct = file
            .data
            .cookie_info
            .cookies
            .iter()
            .find(|c| c.name == "bili_jct")
            .unwrap();
        assert_eq!(req.csrf, jct.value);
        assert_eq!(req.videos[0].filename, "n230917qn1x2y3z4");
    }
}
