//! Directory traversal planning.
//!
//! The factory turns a directory tree into an ordered path list:
//! preorder for uploads (parents exist before children), reversed -
//! postorder - for deletions (children vanish before parents).
//!
//! Traversal is deterministic: entries are visited in name order.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Depth-first preorder of a tree: the root first, then each child
/// subtree in name order.
///
/// A non-directory root yields just itself.
///
/// # Errors
///
/// Propagates directory read failures.
pub fn preorder(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    walk(root, &mut paths)?;
    Ok(paths)
}

/// [`preorder`] reversed: children before parents. This is the
/// deletion order.
///
/// # Errors
///
/// Propagates directory read failures.
pub fn postorder(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut paths = preorder(root)?;
    paths.reverse();
    Ok(paths)
}

fn walk(path: &Path, paths: &mut Vec<PathBuf>) -> io::Result<()> {
    paths.push(path.to_path_buf());
    if !path.is_dir() {
        return Ok(());
    }

    let mut entries: Vec<PathBuf> = fs::read_dir(path)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<_>>()?;
    entries.sort();

    for entry in entries {
        walk(&entry, paths)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        let a = dir.path().join("a");
        fs::create_dir_all(a.join("b")).expect("dirs");
        fs::write(a.join("b").join("file.txt"), b"content").expect("file");
        dir
    }

    #[test]
    fn preorder_parents_first() {
        let dir = build_tree();
        let a = dir.path().join("a");

        let paths = preorder(&a).expect("walk");
        assert_eq!(
            paths,
            vec![a.clone(), a.join("b"), a.join("b").join("file.txt")]
        );
    }

    #[test]
    fn postorder_children_first() {
        let dir = build_tree();
        let a = dir.path().join("a");

        let paths = postorder(&a).expect("walk");
        assert_eq!(
            paths,
            vec![a.join("b").join("file.txt"), a.join("b"), a.clone()]
        );
    }

    #[test]
    fn single_file_yields_itself() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("only.txt");
        fs::write(&file, b"x").expect("file");

        assert_eq!(preorder(&file).expect("walk"), vec![file]);
    }

    #[test]
    fn siblings_visit_in_name_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("root");
        fs::create_dir(&root).expect("dir");
        for name in ["zeta.txt", "alpha.txt", "mid.txt"] {
            fs::write(root.join(name), b"x").expect("file");
        }

        let paths = preorder(&root).expect("walk");
        assert_eq!(
            paths,
            vec![
                root.clone(),
                root.join("alpha.txt"),
                root.join("mid.txt"),
                root.join("zeta.txt"),
            ]
        );
    }
}
