use std::{collections::HashSet, fmt, sync::Arc};

use crate::proxies::Dialer;

/// Proxy configuration exactly as it appeared in the source file.
pub type RawConfig = serde_yaml::Mapping;

#[derive(Clone)]
pub struct Endpoint {
    pub name: String,
    pub dialer: Arc<dyn Dialer>,
    pub raw: RawConfig,
}

impl Endpoint {
    pub fn new(
        name: String,
        dialer: Arc<dyn Dialer>,
        raw: RawConfig,
    ) -> Self {
        Self { name, dialer, raw }
    }

    pub fn protocol(&self) -> &str {
        self.dialer.protocol()
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.name)
            .field("protocol", &self.protocol())
            .finish()
    }
}

/// Endpoints in load order, unique by name.
#[derive(Debug, Default, Clone)]
pub struct EndpointSet {
    endpoints: Vec<Endpoint>,
    names: HashSet<String>,
}

impl EndpointSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false and keeps the existing entry when the name is taken.
    pub fn insert(&mut self, endpoint: Endpoint) -> bool {
        if !self.names.insert(endpoint.name.clone()) {
            return false;
        }
        self.endpoints.push(endpoint);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Endpoint> {
        self.endpoints.iter()
    }

    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&Endpoint) -> bool,
    {
        let names = &mut self.names;
        self.endpoints.retain(|endpoint| {
            let kept = keep(endpoint);
            if !kept {
                names.remove(&endpoint.name);
            }
            kept
        });
    }
}

impl IntoIterator for EndpointSet {
    type Item = Endpoint;
    type IntoIter = std::vec::IntoIter<Endpoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.endpoints.into_iter()
    }
}

impl<'a> IntoIterator for &'a EndpointSet {
    type Item = &'a Endpoint;
    type IntoIter = std::slice::Iter<'a, Endpoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.endpoints.iter()
    }
}

impl FromIterator<Endpoint> for EndpointSet {
    fn from_iter<I: IntoIterator<Item = Endpoint>>(iter: I) -> Self {
        let mut set = EndpointSet::new();
        for endpoint in iter {
            set.insert(endpoint);
        }
        set
    }
}
