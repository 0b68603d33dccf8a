use flame_cat_protocol::ValueFormatter;
use serde::Serialize;

use super::{CallTree, CallTreeNode};

/// One execution context's finished call tree plus metadata.
///
/// Produced by [`StackSampleBuilder::build`](crate::builder::StackSampleBuilder::build);
/// the tree cannot be modified afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    name: String,
    value_formatter: ValueFormatter,
    total_weight: f64,
    tree: CallTree,
}

impl Profile {
    pub(crate) fn new(
        name: String,
        value_formatter: ValueFormatter,
        total_weight: f64,
        tree: CallTree,
    ) -> Self {
        Self {
            name,
            value_formatter,
            total_weight,
            tree,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_formatter(&self) -> ValueFormatter {
        self.value_formatter
    }

    /// Total duration or weight covered by the profile.
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    pub fn root(&self) -> &CallTreeNode {
        self.tree.root()
    }

    pub fn tree(&self) -> &CallTree {
        &self.tree
    }

    /// Format a weight with this profile's formatter.
    pub fn format_value(&self, value: f64) -> String {
        self.value_formatter.format(value)
    }

    /// Pre-order walk over every frame node with its depth.
    pub fn walk<'a, F>(&'a self, visit: F)
    where
        F: FnMut(&'a CallTreeNode, usize),
    {
        self.tree.walk(visit);
    }

    /// Export the tree as folded stacks (`a;b;c <self weight>`), one line per
    /// node that carries self weight, in pre-order.
    pub fn folded_stacks(&self) -> Vec<String> {
        let mut path: Vec<&str> = Vec::new();
        let mut lines = Vec::new();
        self.tree.walk(|node, depth| {
            path.truncate(depth);
            path.push(node.name());
            if node.self_weight > 0.0 {
                lines.push(format!("{} {}", path.join(";"), node.self_weight));
            }
        });
        lines
    }
}

/// Related profiles extracted from one input, e.g. one per thread.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileGroup {
    pub name: String,
    /// Index of the profile shown by default.
    pub index_to_view: usize,
    pub profiles: Vec<Profile>,
}

impl ProfileGroup {
    /// Group profiles under the naming rule shared by importers: a single
    /// profile lends the group its name, several leave it empty.
    ///
    /// Returns `None` when there is nothing to group.
    pub fn from_profiles(profiles: Vec<Profile>) -> Option<Self> {
        let name = match profiles.as_slice() {
            [] => return None,
            [only] => only.name.clone(),
            _ => String::new(),
        };
        Some(Self {
            name,
            index_to_view: 0,
            profiles,
        })
    }

    pub fn profile_to_view(&self) -> Option<&Profile> {
        self.profiles.get(self.index_to_view)
    }
}
