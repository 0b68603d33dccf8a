use std::sync::Arc;

use log::{debug, trace};

use super::ImportResult;
use crate::builder::StackSampleBuilder;
use crate::lines::LineSource;
use crate::model::{Frame, FrameInfo, FrameRegistry, ProfileGroup};

/// Import folded stacks, one `root;child;leaf <weight>` sample per line, as
/// written by `stackcollapse-*` scripts. Each line's weight is charged to its
/// leaf through the builder's weight mode.
pub fn import_collapsed<S: LineSource + ?Sized>(source: &S) -> ImportResult {
    let mut registry = FrameRegistry::new();
    let mut builder = StackSampleBuilder::new();

    for line in source.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((stack_str, count)) = split_count(line) else {
            trace!("skipping collapsed line without count: {line:?}");
            continue;
        };

        let stack: Vec<Arc<Frame>> = stack_str
            .split(';')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| registry.intern(name, FrameInfo::named(name)))
            .collect();
        if stack.is_empty() {
            continue;
        }

        if let Err(err) = builder.append_sample_with_weight(&stack, count) {
            debug!("skipping collapsed line {line:?}: {err}");
        }
    }

    if builder.sample_count() == 0 {
        return ImportResult::NotRecognized;
    }
    ProfileGroup::from_profiles(vec![builder.build()]).into()
}

fn split_count(line: &str) -> Option<(&str, f64)> {
    let (stack, count) = line.rsplit_once(|c: char| c.is_ascii_whitespace())?;
    let count: f64 = count.parse().ok()?;
    Some((stack.trim(), count))
}
