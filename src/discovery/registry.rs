//! Name-keyed registry of discovery capabilities.
//!
//! Capabilities are registered once at startup and looked up by lower-cased
//! name, or by asking each in registration order whether it can handle a URL.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::LinkDiscovery;

/// Preferred-capability value meaning "no preference".
pub const AUTO: &str = "auto";

/// Registered discovery capabilities.
#[derive(Default)]
pub struct DiscoveryRegistry {
    by_name: HashMap<String, Arc<dyn LinkDiscovery>>,
    order: Vec<String>,
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

impl DiscoveryRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a capability, replacing any earlier one with the same name.
    #[tracing::instrument(skip(self, capability), fields(capability_name))]
    pub fn register(&mut self, capability: Arc<dyn LinkDiscovery>) {
        let key = normalize(capability.name());
        tracing::Span::current().record("capability_name", key.as_str());
        debug!(name = %key, "Registering discovery capability");
        if self.by_name.insert(key.clone(), capability).is_none() {
            self.order.push(key);
        }
    }

    /// Looks a capability up by name, ignoring case.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn LinkDiscovery>> {
        self.by_name.get(&normalize(name)).cloned()
    }

    /// Picks the capability for `url`.
    ///
    /// The `preferred` capability wins when it can handle the URL; otherwise
    /// the first registered capability that can. `"auto"` means no preference.
    #[must_use]
    pub fn find_best(&self, url: &str, preferred: &str) -> Option<Arc<dyn LinkDiscovery>> {
        let preferred = normalize(preferred);
        if preferred != AUTO {
            if let Some(capability) = self.by_name.get(&preferred) {
                if capability.can_handle(url) {
                    return Some(Arc::clone(capability));
                }
                debug!(preferred = %preferred, url, "preferred capability cannot handle url");
            }
        }

        self.order
            .iter()
            .filter_map(|name| self.by_name.get(name))
            .find(|capability| capability.can_handle(url))
            .cloned()
    }

    /// Registered names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    /// Number of registered capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl fmt::Debug for DiscoveryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoveryRegistry")
            .field("capabilities", &self.order)
            .finish()
    }
}
