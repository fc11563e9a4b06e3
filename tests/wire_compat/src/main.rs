fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use multiupload_protocol::{
        DuplicateNotice, FileStatus, ProvisionResponse, StatusResponse, UploadedFile, Verdict,
        file_name_from_path,
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

    /// Deserializes a fixture, re-serializes it, and compares the JSON values.
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  wire: {fixture}\n  Rust: {reserialized}"
        );
        parsed
    }

    #[test]
    fn fixture_provision_response() {
        let resp: ProvisionResponse = roundtrip_test("provision_response.json");
        assert_eq!(resp.reference, "11370e18-6e24-453e-b45a-76d3e32ea33d");
        assert_eq!(resp.upload_request.href, "https://bucket.example/upload");
        assert_eq!(resp.upload_request.fields.len(), 8);
        assert_eq!(resp.upload_request.fields["acl"], "private");
    }

    #[test]
    fn fixture_status_ready() {
        let resp: StatusResponse = roundtrip_test("status_ready.json");
        assert_eq!(resp.status.verdict(), Verdict::Ready);
        assert!(resp.error_message.is_none());
    }

    #[test]
    fn fixture_status_quarantine() {
        let resp: StatusResponse = roundtrip_test("status_quarantine.json");
        assert_eq!(resp.status, FileStatus::Quarantine);
        assert_eq!(resp.status.verdict(), Verdict::Failed);
        assert_eq!(
            resp.error_message.as_deref(),
            Some("The selected file contains a virus")
        );
    }

    #[test]
    fn fixture_status_unknown_is_preserved() {
        let resp: StatusResponse = roundtrip_test("status_unknown.json");
        assert_eq!(resp.status, FileStatus::Other("SCANNING".into()));
        assert_eq!(resp.status.verdict(), Verdict::InProgress);
    }

    #[test]
    fn fixture_duplicate_notice() {
        let notice: DuplicateNotice = roundtrip_test("duplicate_notice.json");
        assert_eq!(notice.banner(), Some("You have already uploaded test.txt"));

        let empty: DuplicateNotice = roundtrip_test("duplicate_notice_empty.json");
        assert_eq!(empty.banner(), None);
    }

    #[test]
    fn fixture_uploaded_files() {
        let files: Vec<UploadedFile> = roundtrip_test("uploaded_files.json");
        assert_eq!(files.len(), 3);

        let settled: Vec<_> = files
            .iter()
            .filter(|f| f.is_settled())
            .map(|f| f.reference.as_str())
            .collect();
        assert_eq!(settled, vec!["ref-1", "ref-2"]);

        assert_eq!(
            file_name_from_path(&files[2].upload_details.file_name),
            "half.pdf"
        );
    }
}
