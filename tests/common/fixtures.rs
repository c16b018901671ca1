//! Test fixtures and builder patterns for AdmissionReview bodies.

use serde_json::{Value, json};

/// Builder for `admission.k8s.io/v1` AdmissionReview request bodies.
///
/// # Example
/// ```
/// let body = ReviewBuilder::manifest_work("uid-1")
///     .operation("UPDATE")
///     .object(ManifestWorkBuilder::new("work").build())
///     .to_bytes();
/// ```
#[derive(Clone, Debug)]
pub struct ReviewBuilder {
    uid: String,
    group: String,
    version: String,
    kind: String,
    resource: String,
    name: String,
    namespace: Option<String>,
    operation: String,
    object: Value,
}

impl ReviewBuilder {
    /// Review for an arbitrary kind
    pub fn new(uid: impl Into<String>, group: &str, version: &str, kind: &str) -> Self {
        Self {
            uid: uid.into(),
            group: group.to_string(),
            version: version.to_string(),
            kind: kind.to_string(),
            resource: format!("{}s", kind.to_lowercase()),
            name: "test".to_string(),
            namespace: Some("default".to_string()),
            operation: "CREATE".to_string(),
            object: Value::Null,
        }
    }

    /// Review for a ManifestWork
    pub fn manifest_work(uid: impl Into<String>) -> Self {
        Self::new(uid, "work.open-cluster-management.io", "v1", "ManifestWork")
            .namespace("cluster1")
            .object(ManifestWorkBuilder::new("test").build())
    }

    pub fn operation(mut self, operation: &str) -> Self {
        self.operation = operation.to_string();
        self
    }

    pub fn namespace(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string());
        self
    }

    pub fn object(mut self, object: Value) -> Self {
        self.object = object;
        self
    }

    pub fn build(self) -> Value {
        json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": {
                "uid": self.uid,
                "kind": { "group": self.group, "version": self.version, "kind": self.kind },
                "resource": { "group": self.group, "version": self.version, "resource": self.resource },
                "name": self.name,
                "namespace": self.namespace,
                "operation": self.operation,
                "userInfo": { "username": "system:admin", "groups": ["system:masters"] },
                "object": self.object,
                "dryRun": false
            }
        })
    }

    pub fn to_bytes(self) -> Vec<u8> {
        serde_json::to_vec(&self.build()).unwrap()
    }
}

/// Builder for ManifestWork objects.
#[derive(Clone, Debug)]
pub struct ManifestWorkBuilder {
    name: String,
    namespace: String,
    manifests: Vec<Value>,
}

impl ManifestWorkBuilder {
    /// ManifestWork carrying one small ConfigMap
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: "cluster1".to_string(),
            manifests: vec![config_map("cm", "")],
        }
    }

    pub fn manifests(mut self, manifests: Vec<Value>) -> Self {
        self.manifests = manifests;
        self
    }

    /// Replace the manifests with one ConfigMap carrying `padding` bytes of data
    pub fn padded(mut self, padding: usize) -> Self {
        self.manifests = vec![config_map("cm", &"x".repeat(padding))];
        self
    }

    pub fn build(self) -> Value {
        json!({
            "apiVersion": "work.open-cluster-management.io/v1",
            "kind": "ManifestWork",
            "metadata": { "name": self.name, "namespace": self.namespace },
            "spec": { "workload": { "manifests": self.manifests } }
        })
    }
}

/// A ConfigMap manifest
pub fn config_map(name: &str, data: &str) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": { "name": name, "namespace": "default" },
        "data": { "payload": data }
    })
}

/// Size of `object` as the dispatcher measures it
pub fn serialized_size(object: &Value) -> usize {
    let object: kube::core::DynamicObject = serde_json::from_value(object.clone()).unwrap();
    serde_json::to_vec(&object).unwrap().len()
}

/// The `response` member of an encoded AdmissionReview
pub fn response(body: &[u8]) -> Value {
    let review: Value = serde_json::from_slice(body).unwrap();
    review["response"].clone()
}

/// `response.status.message`, or "" when absent
pub fn status_message(response: &Value) -> String {
    response["status"]["message"]
        .as_str()
        .unwrap_or_default()
        .to_string()
}
