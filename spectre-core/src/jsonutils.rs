use std::hash::{Hash, Hasher};

use serde_json as json;
use sha2::{Digest, Sha256};

struct HashableJsonValue<'a>(&'a json::Value);

impl Hash for HashableJsonValue<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.0 {
            json::Value::Null => None::<()>.hash(state),
            json::Value::Bool(b) => b.hash(state),
            json::Value::Number(n) => n.to_string().hash(state),
            json::Value::String(s) => s.hash(state),
            json::Value::Array(a) => {
                for v in a {
                    HashableJsonValue(v).hash(state);
                }
            },
            json::Value::Object(o) => {
                for (k, v) in o {
                    k.hash(state);
                    HashableJsonValue(v).hash(state);
                }
            },
        }
    }
}

/// Stable hash of a JSON value, used for change-detection (e.g. has the spec of
/// this resource actually changed since the last observed event).
pub fn hash(v: &json::Value) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    let mut s = DefaultHasher::new();
    HashableJsonValue(v).hash(&mut s);
    s.finish()
}

pub fn hash_option(maybe_v: Option<&json::Value>) -> u64 {
    match maybe_v {
        None => hash(&json::Value::Null),
        Some(v) => hash(v),
    }
}

/// SHA256 over canonical bytes, used to build query-cache keys
/// (`SHA256(query_text + sorted_params_JSON)`).
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// A segment of a JSON path expression: a map key, or an index into an array.
#[derive(Clone, Debug)]
pub enum PathSegment {
    Key(String),
    Index(usize),
    /// `[*]` — fan out over every element of an array.
    Wildcard,
}

/// Parses a small path-expression DSL like `spec.valuesFrom[*].secretKeyRef.name`
/// into a sequence of segments. Grounded on the spec's design note calling for a
/// "total" path helper for deep nested JSON navigation: missing paths yield
/// `None`, never panic.
pub fn parse_path(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    for raw in path.split('.') {
        let mut key = raw;
        while let Some(start) = key.find('[') {
            if start > 0 {
                segments.push(PathSegment::Key(key[..start].to_string()));
            }
            let end = key[start..].find(']').map(|e| e + start).unwrap_or(key.len());
            let inner = &key[start + 1..end.min(key.len())];
            if inner == "*" {
                segments.push(PathSegment::Wildcard);
            } else if let Ok(idx) = inner.parse::<usize>() {
                segments.push(PathSegment::Index(idx));
            }
            key = if end + 1 <= key.len() { &key[end + 1..] } else { "" };
        }
        if !key.is_empty() {
            segments.push(PathSegment::Key(key.to_string()));
        }
    }
    segments
}

/// Navigates `root` along `segments`, fanning out on wildcards. Never panics;
/// any segment that doesn't resolve simply contributes no results.
pub fn navigate<'a>(root: &'a json::Value, segments: &[PathSegment]) -> Vec<&'a json::Value> {
    let mut current = vec![root];
    for seg in segments {
        let mut next = Vec::new();
        for v in current {
            match seg {
                PathSegment::Key(k) => {
                    if let Some(child) = v.get(k) {
                        next.push(child);
                    }
                },
                PathSegment::Index(i) => {
                    if let Some(child) = v.get(i) {
                        next.push(child);
                    }
                },
                PathSegment::Wildcard => {
                    if let Some(arr) = v.as_array() {
                        next.extend(arr.iter());
                    }
                },
            }
        }
        current = next;
    }
    current
}

/// Convenience for the common case of a single string value at `path`.
pub fn navigate_str<'a>(root: &'a json::Value, path: &str) -> Vec<&'a str> {
    navigate(root, &parse_path(path)).into_iter().filter_map(|v| v.as_str()).collect()
}
