use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use templar::cli::Args;
use walkdir::WalkDir;

/// Copies `tests/fixtures/<name>` into a fresh temporary directory, so that
/// builds never write next to the checked-in fixtures.
pub fn copy_fixture(name: &str) -> tempfile::TempDir {
    let source = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name);
    let tmp_dir = tempfile::tempdir().unwrap();
    for entry in WalkDir::new(&source).into_iter().filter_map(Result::ok) {
        let rel = entry.path().strip_prefix(&source).unwrap();
        let target = tmp_dir.path().join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).unwrap();
        } else {
            fs::copy(entry.path(), &target).unwrap();
        }
    }
    tmp_dir
}

/// Arguments for a one-shot build of `env` with the configuration at `config`.
pub fn build_args(config: &Path, env: &str) -> Args {
    Args {
        config: config.to_path_buf(),
        env: env.to_string(),
        debug: true,
        watch: false,
        sync: false,
        verbose: 2,
    }
}

pub fn expected_dir(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/expected").join(name)
}

/// Prints a diff of files and their contents between two directories.
/// Shows files only present in one directory and content differences for files present in both.
///
/// # Arguments
/// * `dir1` - The first directory to compare (actual output).
/// * `dir2` - The second directory to compare (expected output).
pub fn print_dir_diff(dir1: &Path, dir2: &Path) {
    let files1 = relative_files(dir1);
    let files2 = relative_files(dir2);

    println!("\n=== Directory Comparison ===");
    println!("Actual output:   {:?}", dir1);
    println!("Expected output: {:?}", dir2);

    for file in files1.difference(&files2) {
        println!("  + {:?} (only in actual)", file);
    }
    for file in files2.difference(&files1) {
        println!("  - {:?} (only in expected)", file);
    }
    for file in files1.intersection(&files2) {
        let actual = fs::read_to_string(dir1.join(file)).unwrap_or_default();
        let expected = fs::read_to_string(dir2.join(file)).unwrap_or_default();
        if actual != expected {
            println!("\n  File: {:?}", file);
            println!("  --- Actual content:\n{actual}");
            println!("  --- Expected content:\n{expected}");
        }
    }
    println!("=== End of Comparison ===\n");
}

fn relative_files(dir: &Path) -> std::collections::BTreeSet<PathBuf> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().is_file())
        .map(|e| e.path().strip_prefix(dir).unwrap().to_path_buf())
        .collect()
}

/// Asserts that `actual` holds exactly the files of `expected`, printing the
/// differences first when it does not.
pub fn assert_same_tree(actual: &Path, expected: &Path) {
    match dir_diff::is_different(actual, expected) {
        Ok(true) => {
            print_dir_diff(actual, expected);
            panic!("Directories differ. See above for details.");
        }
        Ok(false) => {}
        Err(e) => {
            debug!("Error comparing directories: {e:?}");
            panic!("Cannot compare '{}' with '{}'", actual.display(), expected.display());
        }
    }
}
