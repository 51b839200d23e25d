// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Aspect layers and the order computed between them

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identity of one aspect layer: the aspect plus an optional layer name.
/// The unnamed layer is the aspect's default layer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AspectLayerId {
    pub aspect: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<String>,
}

impl AspectLayerId {
    pub fn new(aspect: impl Into<String>) -> Self {
        Self {
            aspect: aspect.into(),
            layer: None,
        }
    }

    pub fn with_layer(aspect: impl Into<String>, layer: impl Into<String>) -> Self {
        Self {
            aspect: aspect.into(),
            layer: Some(layer.into()),
        }
    }

    /// Fragment used when naming members produced by this layer, e.g. `Logging` or `Cache_Inner`
    pub fn member_suffix(&self) -> String {
        match &self.layer {
            Some(layer) => format!("{}_{}", short_name(&self.aspect), layer),
            None => short_name(&self.aspect).to_string(),
        }
    }
}

/// Last segment of a dotted aspect name
fn short_name(aspect: &str) -> &str {
    aspect.rsplit('.').next().unwrap_or(aspect)
}

impl fmt::Display for AspectLayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.layer {
            Some(layer) => write!(f, "{}:{}", self.aspect, layer),
            None => f.write_str(&self.aspect),
        }
    }
}

/// One side of an ordering constraint. Without a layer name it stands for every layer of the aspect.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerSelector {
    pub aspect: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<String>,
}

impl LayerSelector {
    pub fn aspect(aspect: impl Into<String>) -> Self {
        Self {
            aspect: aspect.into(),
            layer: None,
        }
    }

    pub fn layer(aspect: impl Into<String>, layer: impl Into<String>) -> Self {
        Self {
            aspect: aspect.into(),
            layer: Some(layer.into()),
        }
    }

    pub fn matches(&self, id: &AspectLayerId) -> bool {
        self.aspect == id.aspect && (self.layer.is_none() || self.layer == id.layer)
    }
}

impl fmt::Display for LayerSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.layer {
            Some(layer) => write!(f, "{}:{}", self.aspect, layer),
            None => write!(f, "{}:*", self.aspect),
        }
    }
}

/// User-declared constraint: transformations of `before` are applied before those of `after`,
/// so `before` sits closer to the source declaration in an override chain
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderingConstraint {
    pub before: LayerSelector,
    pub after: LayerSelector,
}

impl OrderingConstraint {
    pub fn new(before: LayerSelector, after: LayerSelector) -> Self {
        Self { before, after }
    }
}

/// Total order of the registered layers plus the partial order the constraints actually imply
#[derive(Debug, Clone, Default)]
pub struct LayerOrder {
    /// Layers from first-applied to last-applied
    layers: Vec<AspectLayerId>,
    /// Position of each layer in `layers`
    order_of: HashMap<AspectLayerId, usize>,
    /// `implied[i][j]`: layer at position i is constrained before layer at position j
    implied: Vec<Vec<bool>>,
}

impl LayerOrder {
    pub(crate) fn new(layers: Vec<AspectLayerId>, implied: Vec<Vec<bool>>) -> Self {
        let order_of = layers.iter().enumerate().map(|(index, id)| (id.clone(), index)).collect();
        Self { layers, order_of, implied }
    }

    /// Layers in application order
    pub fn layers(&self) -> &[AspectLayerId] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Position of a layer, `None` when it was never registered
    pub fn order(&self, id: &AspectLayerId) -> Option<usize> {
        self.order_of.get(id).copied()
    }

    /// Whether the constraints themselves fix the relative order of two layers
    pub fn is_comparable(&self, a: &AspectLayerId, b: &AspectLayerId) -> bool {
        match (self.order(a), self.order(b)) {
            (Some(x), Some(y)) => x == y || self.implied[x][y] || self.implied[y][x],
            _ => false,
        }
    }

    /// Every pair of layers whose order was chosen by the tie-break, in order
    pub fn unordered_pairs(&self) -> Vec<(&AspectLayerId, &AspectLayerId)> {
        let mut pairs = Vec::new();
        for (i, first) in self.layers.iter().enumerate() {
            for (j, second) in self.layers.iter().enumerate().skip(i + 1) {
                if !self.implied[i][j] && !self.implied[j][i] {
                    pairs.push((first, second));
                }
            }
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_suffix_uses_short_aspect_name() {
        assert_eq!(AspectLayerId::new("Demo.Aspects.Logging").member_suffix(), "Logging");
        assert_eq!(AspectLayerId::with_layer("Cache", "Inner").member_suffix(), "Cache_Inner");
    }

    #[test]
    fn test_selector_without_layer_matches_all_layers() {
        let selector = LayerSelector::aspect("Cache");
        assert!(selector.matches(&AspectLayerId::new("Cache")));
        assert!(selector.matches(&AspectLayerId::with_layer("Cache", "Inner")));
        assert!(!selector.matches(&AspectLayerId::new("Logging")));
        assert!(!LayerSelector::layer("Cache", "Outer").matches(&AspectLayerId::with_layer("Cache", "Inner")));
    }

    #[test]
    fn test_layer_id_json_omits_missing_layer() {
        let json = serde_json::to_string(&AspectLayerId::new("Logging")).unwrap();
        assert_eq!(json, r#"{"aspect":"Logging"}"#);
    }
}
