//! Workspace management - the directory tree of user-authored files
//!
//! Created (and seeded with a starter entry file) at session start,
//! destroyed at session end. Every relative path coming from outside is
//! validated to stay inside the root before it touches the filesystem.

use anyhow::{bail, Result};
use serde::Serialize;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Starter program seeded into a fresh workspace
pub const STARTER: &str = "\
# Starter app - edit me and watch the preview update.
from service import app


@app('/demo')
async def main(q):
    q.page['hello'] = 'Hello from the sandbox!'
    await q.page.save()
";

/// Node kind in the file tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Folder,
}

/// One entry of the serializable file tree
#[derive(Debug, Clone, Serialize)]
pub struct FileNode {
    pub name: String,
    /// Path relative to the workspace root
    pub path: String,
    pub kind: NodeKind,
    pub children: Vec<FileNode>,
}

/// A session's workspace directory
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Open (creating and seeding if needed) a workspace at `root`
    pub fn open(root: &Path, entry_file: &str) -> Result<Self> {
        fs::create_dir_all(root)?;
        let root = root.canonicalize()?;
        let workspace = Self { root };

        let entry = workspace.resolve(entry_file)?;
        if !entry.exists() {
            log::info!("seeding starter entry file {}", entry.display());
            fs::write(&entry, STARTER)?;
        }
        Ok(workspace)
    }

    /// Workspace root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative path, rejecting anything escaping the root
    pub fn resolve(&self, rel: &str) -> Result<PathBuf> {
        let rel_path = Path::new(rel);
        if rel_path.is_absolute() {
            bail!("unsafe path: {} (absolute)", rel);
        }
        for component in rel_path.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => bail!("unsafe path: {} (escapes workspace)", rel),
            }
        }
        Ok(self.root.join(rel_path))
    }

    pub fn read_file(&self, rel: &str) -> Result<String> {
        let path = self.resolve(rel)?;
        Ok(fs::read_to_string(path)?)
    }

    pub fn write_file(&self, rel: &str, text: &str) -> Result<()> {
        let path = self.resolve(rel)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, text)?;
        Ok(())
    }

    pub fn create_file(&self, rel: &str) -> Result<()> {
        self.write_file(rel, "")
    }

    pub fn create_dir(&self, rel: &str) -> Result<()> {
        let path = self.resolve(rel)?;
        fs::create_dir_all(path)?;
        Ok(())
    }

    /// Remove a file or a directory tree
    pub fn remove(&self, rel: &str) -> Result<()> {
        let path = self.resolve(rel)?;
        if path.is_dir() {
            fs::remove_dir_all(path)?;
        } else {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn rename(&self, from: &str, to: &str) -> Result<()> {
        let from = self.resolve(from)?;
        let to = self.resolve(to)?;
        fs::rename(from, to)?;
        Ok(())
    }

    /// Build the serializable file tree rooted at the workspace
    pub fn file_tree(&self) -> Result<FileNode> {
        self.tree_node(&self.root, "")
    }

    fn tree_node(&self, dir: &Path, rel: &str) -> Result<FileNode> {
        let mut children = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            let child_rel = if rel.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", rel, name)
            };
            let path = entry.path();
            if path.is_dir() {
                children.push(self.tree_node(&path, &child_rel)?);
            } else {
                children.push(FileNode {
                    name,
                    path: child_rel,
                    kind: NodeKind::File,
                    children: Vec::new(),
                });
            }
        }
        // Folders first, then files, alphabetical within each
        children.sort_by(|a, b| {
            (a.kind != NodeKind::Folder, &a.name).cmp(&(b.kind != NodeKind::Folder, &b.name))
        });

        let name = if rel.is_empty() {
            self.root
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "workspace".to_string())
        } else {
            rel.rsplit('/').next().unwrap_or(rel).to_string()
        };

        Ok(FileNode {
            name,
            path: rel.to_string(),
            kind: NodeKind::Folder,
            children,
        })
    }

    /// Delete the whole workspace directory (session teardown)
    pub fn destroy(&self) -> Result<()> {
        log::info!("removing workspace {}", self.root.display());
        fs::remove_dir_all(&self.root)?;
        Ok(())
    }
}
