//! # Resource Keys
//!
//! The untyped key the manager hands to `reconcile(key)` and the status
//! map key format `"<namespace>/<kind>/<name>"` used in `ReloaderConfig`
//! status (spec §6).

use std::fmt;

/// The kinds the controller ever needs to probe or reference by key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    ReloaderConfig,
    Secret,
    ConfigMap,
    Deployment,
    StatefulSet,
    DaemonSet,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::ReloaderConfig => "ReloaderConfig",
            Kind::Secret => "Secret",
            Kind::ConfigMap => "ConfigMap",
            Kind::Deployment => "Deployment",
            Kind::StatefulSet => "StatefulSet",
            Kind::DaemonSet => "DaemonSet",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Kind {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ReloaderConfig" => Ok(Kind::ReloaderConfig),
            "Secret" => Ok(Kind::Secret),
            "ConfigMap" => Ok(Kind::ConfigMap),
            "Deployment" => Ok(Kind::Deployment),
            "StatefulSet" => Ok(Kind::StatefulSet),
            "DaemonSet" => Ok(Kind::DaemonSet),
            other => Err(KeyParseError::UnknownKind(other.to_string())),
        }
    }
}

/// A namespaced key with no type hint, as handed to `reconcile`.
///
/// The manager enqueues only namespace/name; which kind it refers to is
/// discovered by probing (spec §4.4 "Event-type routing").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamespacedKey {
    pub namespace: String,
    pub name: String,
}

impl fmt::Display for NamespacedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A fully resolved `(namespace, kind, name)` triple, used as a status map
/// key: `"<namespace>/<kind>/<name>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    pub namespace: String,
    pub kind: Kind,
    pub name: String,
}

impl ResourceKey {
    pub fn new(namespace: impl Into<String>, kind: Kind, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.kind, self.name)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum KeyParseError {
    #[error("resource key {0:?} does not have the form \"namespace/kind/name\"")]
    Malformed(String),
    #[error("unknown resource kind {0:?}")]
    UnknownKind(String),
}

impl std::str::FromStr for ResourceKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '/');
        let (Some(namespace), Some(kind), Some(name)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(KeyParseError::Malformed(s.to_string()));
        };
        if namespace.is_empty() || name.is_empty() {
            return Err(KeyParseError::Malformed(s.to_string()));
        }
        Ok(ResourceKey::new(namespace, kind.parse()?, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_parse() {
        let key = ResourceKey::new("ns", Kind::Secret, "db-credentials");
        let encoded = key.to_string();
        assert_eq!(encoded, "ns/Secret/db-credentials");
        let decoded: ResourceKey = encoded.parse().unwrap();
        assert_eq!(decoded, key);
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!("just-a-name".parse::<ResourceKey>().is_err());
        assert!("ns//name".parse::<ResourceKey>().is_err());
    }

    #[test]
    fn rejects_unknown_kind() {
        assert!("ns/Widget/name".parse::<ResourceKey>().is_err());
    }

    #[test]
    fn name_may_itself_contain_slashes() {
        // splitn(3, ...) leaves any further slashes inside `name`.
        let decoded: ResourceKey = "ns/ConfigMap/weird/name".parse().unwrap();
        assert_eq!(decoded.name, "weird/name");
    }
}
