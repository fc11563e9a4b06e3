//! Placeholder expansion for URL and message templates.
//!
//! Templates use `{name}` placeholders, e.g. `/upload/status/{fileRef}` or
//! `File {fileNumber} {fileName} has been uploaded`.

/// Replaces every `{key}` occurrence with its value.
///
/// Unknown placeholders are left untouched.
pub fn expand_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in values {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}

/// Returns the final path segment of a file path.
///
/// Browsers report picked files as `C:\fakepath\name.pdf`, so both `/` and
/// `\` are treated as separators.
pub fn file_name_from_path(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_all_occurrences() {
        let out = expand_template("{a}-{b}-{a}", &[("a", "1"), ("b", "2")]);
        assert_eq!(out, "1-2-1");
    }

    #[test]
    fn leaves_unknown_placeholders() {
        let out = expand_template("/status/{fileRef}?v={version}", &[("fileRef", "123")]);
        assert_eq!(out, "/status/123?v={version}");
    }

    #[test]
    fn message_template() {
        let out = expand_template(
            "File {fileNumber} {fileName} has been uploaded",
            &[("fileNumber", "1"), ("fileName", "test.txt")],
        );
        assert_eq!(out, "File 1 test.txt has been uploaded");
    }

    #[test]
    fn file_name_strips_directories() {
        assert_eq!(file_name_from_path("/path/to/test.txt"), "test.txt");
        assert_eq!(file_name_from_path("C:\\fakepath\\report.pdf"), "report.pdf");
        assert_eq!(file_name_from_path("plain.png"), "plain.png");
        assert_eq!(file_name_from_path("dir/"), "");
    }
}
