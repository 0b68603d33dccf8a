pub mod collapsed;
pub mod perf;

use std::io::Read;

use log::info;
use thiserror::Error;

use crate::lines::LineSource;
use crate::model::ProfileGroup;

pub use collapsed::import_collapsed;
pub use perf::import_perf_script;

/// Outcome of running an importer over some content.
///
/// `NotRecognized` is an expected result, not a failure: it tells the caller
/// to try the next format.
#[derive(Debug)]
pub enum ImportResult {
    Recognized(ProfileGroup),
    NotRecognized,
}

impl ImportResult {
    pub fn is_recognized(&self) -> bool {
        matches!(self, Self::Recognized(_))
    }

    pub fn into_group(self) -> Option<ProfileGroup> {
        match self {
            Self::Recognized(group) => Some(group),
            Self::NotRecognized => None,
        }
    }
}

impl From<Option<ProfileGroup>> for ImportResult {
    fn from(group: Option<ProfileGroup>) -> Self {
        group.map_or(Self::NotRecognized, Self::Recognized)
    }
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to read profile: {0}")]
    Io(#[from] std::io::Error),
}

/// Auto-detect the format and import it.
///
/// Detection strategy: run each text importer in turn and keep the first
/// that recognizes the content. `perf script` goes first because collapsed
/// stacks are the most permissive format.
pub fn import_auto<S: LineSource + ?Sized>(source: &S) -> ImportResult {
    if let ImportResult::Recognized(group) = import_perf_script(source) {
        info!("imported perf script: {} profile(s)", group.profiles.len());
        return ImportResult::Recognized(group);
    }

    if let ImportResult::Recognized(group) = import_collapsed(source) {
        info!("imported collapsed stacks");
        return ImportResult::Recognized(group);
    }

    ImportResult::NotRecognized
}

/// Read everything from `reader` and auto-detect its format.
pub fn import_reader<R: Read>(mut reader: R) -> Result<ImportResult, ImportError> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    Ok(import_auto(data.as_slice()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_perf_script() {
        let input = "app 7 1.000000: cycles:\n\t1 main (/bin/app)\n\napp 7 1.500000: cycles:\n\t1 main (/bin/app)\n";
        let group = import_auto(input).into_group();
        assert_eq!(group.map(|g| g.name), Some("app tid: 7".to_string()));
    }

    #[test]
    fn falls_back_to_collapsed() {
        let group = import_auto("main;foo 3\nmain;bar 2\n").into_group();
        let total = group
            .as_ref()
            .and_then(ProfileGroup::profile_to_view)
            .map(|p| p.total_weight());
        assert_eq!(total, Some(5.0));
    }

    #[test]
    fn unknown_content_is_not_recognized() {
        assert!(!import_auto("hello world\n").is_recognized());
        assert!(!import_auto("").is_recognized());
    }

    #[test]
    fn reader_entry_point() {
        let data: &[u8] = b"main;foo 1\n";
        let result = import_reader(data);
        assert!(matches!(result, Ok(ImportResult::Recognized(_))));
    }
}
