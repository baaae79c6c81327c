//! Workspace export - archive the project directory to a single zip
//!
//! Invoked independently of orchestration; returns the archive path so the
//! caller can hand it to the user.

use crate::workspace::{FileNode, NodeKind, Workspace};
use anyhow::Result;
use chrono::Utc;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::ZipWriter;

/// Archive the workspace into `out_dir`, returning the archive path
pub fn export_workspace(workspace: &Workspace, out_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(out_dir)?;
    let stamp = Utc::now().format("%Y%m%d-%H%M%S");
    let archive_path = out_dir.join(format!("workspace-{}.zip", stamp));

    let tree = workspace.file_tree()?;
    let mut paths = Vec::new();
    collect_file_paths(&tree, &mut paths);

    let file = File::create(&archive_path)?;
    let mut writer = ZipWriter::new(file);
    let options = FileOptions::default();

    for rel in &paths {
        writer.start_file(rel.as_str(), options)?;
        let abs = workspace.resolve(rel)?;
        writer.write_all(&std::fs::read(abs)?)?;
    }
    writer.finish()?;

    log::info!(
        "exported {} files to {}",
        paths.len(),
        archive_path.display()
    );
    Ok(archive_path)
}

fn collect_file_paths(node: &FileNode, out: &mut Vec<String>) {
    match node.kind {
        NodeKind::File => out.push(node.path.clone()),
        NodeKind::Folder => {
            for child in &node.children {
                collect_file_paths(child, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;
    use zip::read::ZipArchive;

    #[test]
    fn test_export_round_trips() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::open(&dir.path().join("project"), "app.py").unwrap();
        workspace.write_file("lib/util.py", "x = 1\n").unwrap();

        let out_dir = dir.path().join("exports");
        let archive_path = export_workspace(&workspace, &out_dir).unwrap();
        assert!(archive_path.exists());

        let mut archive = ZipArchive::new(File::open(&archive_path).unwrap()).unwrap();
        let mut names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["app.py", "lib/util.py"]);

        let mut contents = String::new();
        archive
            .by_name("lib/util.py")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "x = 1\n");
    }
}
