//! REST request coalescing.

use serde_json::Value;

use crate::synth::{HttpMethod, Operation, RestRequest};

/// Coalesces consecutive REST requests before execution.
///
/// Consecutive PATCHes to the same path are merged into one request:
/// objects merge key-wise (later wins), arrays concatenate. Other verbs
/// pass through untouched.
#[derive(Debug, Default)]
pub struct RequestBatcher {
    requests: Vec<RestRequest>,
}

impl RequestBatcher {
    /// Creates an empty batcher.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            requests: Vec::new(),
        }
    }

    /// Adds a request, merging it into the previous one when possible.
    pub fn push(&mut self, request: RestRequest) {
        if request.method == HttpMethod::Patch {
            if let Some(last) = self.requests.last_mut() {
                if last.method == HttpMethod::Patch && last.path == request.path {
                    let merged = merge_bodies(last.body.take(), request.body);
                    last.body = merged;
                    return;
                }
            }
        }
        self.requests.push(request);
    }

    /// True when nothing has been pushed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Consumes the batcher into operations.
    #[must_use]
    pub fn into_operations(self) -> Vec<Operation> {
        self.requests.into_iter().map(Operation::Request).collect()
    }
}

fn merge_bodies(left: Option<Value>, right: Option<Value>) -> Option<Value> {
    match (left, right) {
        (Some(l), Some(r)) => Some(merge_values(l, r)),
        (l, None) => l,
        (None, r) => r,
    }
}

fn merge_values(left: Value, right: Value) -> Value {
    match (left, right) {
        (Value::Object(mut l), Value::Object(r)) => {
            for (key, rv) in r {
                match l.remove(&key) {
                    Some(lv) => {
                        l.insert(key, merge_values(lv, rv));
                    }
                    None => {
                        l.insert(key, rv);
                    }
                }
            }
            Value::Object(l)
        }
        (Value::Array(mut l), Value::Array(r)) => {
            l.extend(r);
            Value::Array(l)
        }
        (_, r) => r,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_consecutive_patches_merge_arrays() {
        let mut batcher = RequestBatcher::new();
        batcher.push(RestRequest::new(
            HttpMethod::Patch,
            "/data/acl/acl-sets/acl-set=edge",
            json!({"rules": [{"sequence": 10}]}),
        ));
        batcher.push(RestRequest::new(
            HttpMethod::Patch,
            "/data/acl/acl-sets/acl-set=edge",
            json!({"rules": [{"sequence": 20}]}),
        ));

        let ops = batcher.into_operations();
        assert_eq!(ops.len(), 1);
        let Operation::Request(req) = &ops[0] else {
            panic!("expected a request");
        };
        assert_eq!(
            req.body,
            Some(json!({"rules": [{"sequence": 10}, {"sequence": 20}]}))
        );
    }

    #[test]
    fn test_different_paths_are_not_merged() {
        let mut batcher = RequestBatcher::new();
        batcher.push(RestRequest::new(HttpMethod::Patch, "/a", json!({"x": 1})));
        batcher.push(RestRequest::new(HttpMethod::Patch, "/b", json!({"x": 2})));
        assert_eq!(batcher.into_operations().len(), 2);
    }

    #[test]
    fn test_delete_breaks_a_merge_run() {
        let mut batcher = RequestBatcher::new();
        batcher.push(RestRequest::new(HttpMethod::Patch, "/a", json!({"x": 1})));
        batcher.push(RestRequest::delete("/a"));
        batcher.push(RestRequest::new(HttpMethod::Patch, "/a", json!({"x": 2})));
        assert_eq!(batcher.into_operations().len(), 3);
    }

    #[test]
    fn test_object_merge_later_wins() {
        let mut batcher = RequestBatcher::new();
        batcher.push(RestRequest::new(
            HttpMethod::Patch,
            "/a",
            json!({"description": "old", "afi": "ipv4"}),
        ));
        batcher.push(RestRequest::new(
            HttpMethod::Patch,
            "/a",
            json!({"description": "new"}),
        ));
        let ops = batcher.into_operations();
        let Operation::Request(req) = &ops[0] else {
            panic!("expected a request");
        };
        assert_eq!(req.body, Some(json!({"description": "new", "afi": "ipv4"})));
    }
}
