//! Staging directory discovery.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::fetch::is_regular_file;
use crate::ingestion::IngestionFormat;

/// A staged file the pipeline knows how to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    /// Full path inside the staging directory.
    pub path: PathBuf,
    /// Format derived from the extension.
    pub format: IngestionFormat,
}

impl StagedFile {
    /// File name without directory; this is the registry key.
    pub fn filename(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// List regular files directly under `dir` with a `.csv`, `.json` or `.parquet` extension.
///
/// A symlink to a regular file counts as a staged file under the link's own name. Other files,
/// broken links and subdirectories are left out silently. Entries come back sorted by file name
/// so repeated runs visit files in the same order.
pub fn discover_staged_files(dir: &Path) -> Result<Vec<StagedFile>, walkdir::Error> {
    let mut staged = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        if !is_regular_file(&entry) {
            continue;
        }
        let Some(format) = IngestionFormat::from_path(entry.path()) else {
            continue;
        };
        staged.push(StagedFile {
            path: entry.into_path(),
            format,
        });
    }
    Ok(staged)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::discover_staged_files;
    use crate::ingestion::IngestionFormat;

    #[test]
    fn keeps_recognized_extensions_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["c.parquet", "a.csv", "b.JSON", "readme.txt", "no_extension"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        fs::create_dir(dir.path().join("d.csv")).unwrap();

        let staged = discover_staged_files(dir.path()).unwrap();
        let names: Vec<String> = staged.iter().map(|f| f.filename()).collect();
        assert_eq!(names, vec!["a.csv", "b.JSON", "c.parquet"]);
        assert_eq!(
            staged.iter().map(|f| f.format).collect::<Vec<_>>(),
            vec![
                IngestionFormat::Csv,
                IngestionFormat::Json,
                IngestionFormat::Parquet
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_files_are_staged_under_the_link_name() {
        let dir = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        fs::write(elsewhere.path().join("real.csv"), "quantidade,valor\n1,2\n").unwrap();
        std::os::unix::fs::symlink(elsewhere.path().join("real.csv"), dir.path().join("link.csv"))
            .unwrap();
        std::os::unix::fs::symlink(elsewhere.path().join("gone.csv"), dir.path().join("broken.csv"))
            .unwrap();
        std::os::unix::fs::symlink(elsewhere.path(), dir.path().join("pasta.csv")).unwrap();

        let staged = discover_staged_files(dir.path()).unwrap();
        let names: Vec<String> = staged.iter().map(|f| f.filename()).collect();
        assert_eq!(names, vec!["link.csv"]);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_staged_files(&dir.path().join("absent")).is_err());
    }
}
