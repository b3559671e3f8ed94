use serde::de::DeserializeOwned;

use crate::error::Error;

const MAX_ERROR_BODY_LEN: usize = 2048;
const JSON_MIME: &str = "application/json";

/// Appends encoded query pairs to `url`, keeping any existing query and fragment.
pub fn build_url<K, V, I>(url: &str, params: I) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
    I: IntoIterator<Item = (K, V)>,
{
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (name, value) in params {
        serializer.append_pair(name.as_ref(), value.as_ref());
    }
    append_encoded_query(url, &serializer.finish())
}

pub(crate) fn append_encoded_query(url: &str, query: &str) -> String {
    // A `#` in the very first position is part of the base, not a fragment.
    let (base, fragment) = match url.find('#') {
        Some(index) if index > 0 => (&url[..index], &url[index + 1..]),
        _ => (url, ""),
    };

    let mut merged = String::with_capacity(url.len() + query.len() + 2);
    merged.push_str(base);
    if base.contains('?') {
        if !base.ends_with('&') && !base.ends_with('?') {
            merged.push('&');
        }
    } else {
        merged.push('?');
    }
    merged.push_str(query);
    if !fragment.is_empty() {
        merged.push('#');
        merged.push_str(fragment);
    }
    merged
}

pub(crate) fn is_mime_json(mime: &str) -> bool {
    mime.to_ascii_lowercase().starts_with(JSON_MIME)
}

pub(crate) fn parse_json_document(text: &str) -> Result<serde_json::Value, Error> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|source| Error::Deserialize {
            source,
            body: truncate_body(text),
        })?;
    if !(value.is_object() || value.is_array()) {
        return Err(Error::JsonRoot);
    }
    Ok(value)
}

pub(crate) fn decode_json_document<T>(text: &str) -> Result<T, Error>
where
    T: DeserializeOwned,
{
    let value = parse_json_document(text)?;
    serde_json::from_value(value).map_err(|source| Error::Deserialize {
        source,
        body: truncate_body(text),
    })
}

pub(crate) fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LEN {
        return body.to_owned();
    }
    let mut end = MAX_ERROR_BODY_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...<truncated {} bytes>", &body[..end], body.len() - end)
}

pub(crate) fn redact_uri_for_logs(uri_text: &str) -> String {
    let Ok(mut parsed) = url::Url::parse(uri_text) else {
        return uri_text.split(['?', '#']).next().unwrap_or(uri_text).to_owned();
    };

    let _ = parsed.set_username("");
    let _ = parsed.set_password(None);
    parsed.set_query(None);
    parsed.set_fragment(None);
    parsed.to_string()
}
