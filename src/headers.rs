use std::collections::BTreeMap;

pub(crate) const CONTENT_TYPE: &str = "Content-Type";
pub(crate) const USER_AGENT: &str = "User-Agent";

/// Request headers keyed by the exact name the caller used.
///
/// Names are case sensitive and never canonicalized: `Content-Type` and
/// `content-type` are two different entries. Overwriting keeps the original
/// position.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestHeaders {
    entries: Vec<(String, String)>,
}

impl RequestHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: Option<&str>) {
        let Some(value) = value else {
            self.entries.retain(|(existing, _)| existing != name);
            return;
        };
        match self.entries.iter_mut().find(|(existing, _)| existing == name) {
            Some((_, existing_value)) => value.clone_into(existing_value),
            None => self.entries.push((name.to_owned(), value.to_owned())),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Flattens the map into `Name: value` lines.
    pub fn to_wire_lines(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|(name, value)| format!("{name}: {value}"))
            .collect()
    }
}

/// Response headers captured from raw header lines.
///
/// Names are lowercased; repeated names keep every value in receipt order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseHeaders {
    entries: BTreeMap<String, Vec<String>>,
}

impl ResponseHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one raw header line and returns the number of bytes consumed.
    ///
    /// A line without `:` is a status line. When it mentions `HTTP` every
    /// header seen so far is dropped, so only the last header block of a
    /// redirected exchange survives.
    pub fn receive_line(&mut self, line: &str) -> usize {
        match line.split_once(':') {
            Some((name, value)) => {
                self.entries
                    .entry(name.trim().to_lowercase())
                    .or_default()
                    .push(value.trim().to_owned());
            }
            None => {
                if line.to_ascii_uppercase().contains("HTTP") {
                    self.entries.clear();
                }
            }
        }
        line.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, name: &str) -> &[String] {
        self.entries
            .get(&name.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn get_line(&self, name: &str) -> String {
        self.get(name).join(",")
    }

    pub fn all(&self) -> &BTreeMap<String, Vec<String>> {
        &self.entries
    }

    pub fn all_lines(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|(name, values)| (name.clone(), values.join(",")))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{RequestHeaders, ResponseHeaders};

    #[test]
    fn request_headers_are_case_sensitive_and_last_write_wins() {
        let mut headers = RequestHeaders::new();
        headers.set("A", Some("1"));
        headers.set("B", Some("x"));
        headers.set("A", Some("2"));
        headers.set("a", Some("3"));
        assert_eq!(headers.to_wire_lines(), vec!["A: 2", "B: x", "a: 3"]);

        headers.set("A", None);
        assert_eq!(headers.get("A"), None);
        assert_eq!(headers.get("a"), Some("3"));
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn status_line_resets_previous_header_block() {
        let mut headers = ResponseHeaders::new();
        for line in [
            "HTTP/1.1 302 Found\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "HTTP/1.1 200 OK\r\n",
            "X-Foo: bar\r\n",
            "\r\n",
        ] {
            assert_eq!(headers.receive_line(line), line.len());
        }
        assert_eq!(headers.get("x-foo"), ["bar".to_owned()]);
        assert!(headers.get("content-type").is_empty());
        assert_eq!(headers.all().len(), 1);
    }

    #[test]
    fn repeated_headers_accumulate_in_order() {
        let mut headers = ResponseHeaders::new();
        headers.receive_line("http/2 200");
        headers.receive_line("Set-Cookie: a=1");
        headers.receive_line("set-cookie:  b=2 ");
        headers.receive_line("Location: http://example.com:8080/next");
        assert_eq!(headers.get("SET-COOKIE"), ["a=1".to_owned(), "b=2".to_owned()]);
        assert_eq!(headers.get_line("set-cookie"), "a=1,b=2");
        assert_eq!(
            headers.get_line("location"),
            "http://example.com:8080/next"
        );
        assert_eq!(
            headers.all_lines().get("set-cookie").map(String::as_str),
            Some("a=1,b=2")
        );
    }

    #[test]
    fn blank_line_without_http_keeps_headers() {
        let mut headers = ResponseHeaders::new();
        headers.receive_line("X-Trace: abc");
        assert_eq!(headers.receive_line("\r\n"), 2);
        assert_eq!(headers.get_line("x-trace"), "abc");
    }
}
