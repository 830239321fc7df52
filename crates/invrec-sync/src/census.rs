//! Report counts per folder, split by the type marker in each file name.

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use tracing::warn;

pub const DEFAULT_PARENTS: [&str; 3] = ["draft", "done", "notes"];

static TYPE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ty\.([A-Za-z0-9-]+)").expect("type marker pattern compiles"));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TypeCounts {
    pub vm: usize,
    pub svr: usize,
    pub none: usize,
}

impl TypeCounts {
    pub fn total(&self) -> usize {
        self.vm + self.svr + self.none
    }

    fn add(&mut self, other: TypeCounts) {
        self.vm += other.vm;
        self.svr += other.svr;
        self.none += other.none;
    }

    fn count_name(&mut self, name: &str) {
        let marker = TYPE_MARKER
            .captures(name)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_ascii_lowercase());
        match marker {
            Some(ty) if ty.contains("vm") => self.vm += 1,
            Some(ty) if ty.contains("svr") => self.svr += 1,
            _ => self.none += 1,
        }
    }
}

impl fmt::Display for TypeCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files (vm: {}, svr: {}, none: {})",
            self.total(),
            self.vm,
            self.svr,
            self.none
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderCount {
    pub name: String,
    pub counts: TypeCounts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParentCount {
    pub name: String,
    pub folders: Vec<FolderCount>,
    pub totals: TypeCounts,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Census {
    pub parents: Vec<ParentCount>,
    pub missing: Vec<String>,
    pub totals: TypeCounts,
}

impl Census {
    pub fn render(&self) -> String {
        let mut out = String::new();
        for parent in &self.parents {
            out.push_str(&format!("{}/\n", parent.name));
            for folder in &parent.folders {
                out.push_str(&format!("  {}: {}\n", folder.name, folder.counts));
            }
            out.push_str(&format!("  Total {}: {}\n\n", parent.name, parent.totals));
        }
        for name in &self.missing {
            out.push_str(&format!("folder '{name}' not found, skipped\n"));
        }
        out.push_str(&format!("Grand total: {}\n", self.totals));
        out
    }
}

fn count_tree(dir: &Path) -> Result<TypeCounts> {
    let mut counts = TypeCounts::default();
    for entry in fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let entry = entry.with_context(|| format!("listing {}", dir.display()))?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            counts.add(count_tree(&entry.path())?);
        } else if file_type.is_file() {
            counts.count_name(&entry.file_name().to_string_lossy());
        }
    }
    Ok(counts)
}

/// Counts every file below each sub-folder of `root/<parent>`.
pub fn census(root: &Path, parents: &[&str]) -> Result<Census> {
    let mut census = Census::default();
    for parent in parents {
        let parent_dir = root.join(parent);
        if !parent_dir.is_dir() {
            warn!(folder = %parent, "census folder missing");
            census.missing.push(parent.to_string());
            continue;
        }
        let mut subs: Vec<_> = fs::read_dir(&parent_dir)
            .with_context(|| format!("reading {}", parent_dir.display()))?
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .collect();
        subs.sort_by_key(|e| e.file_name());

        let mut entry = ParentCount {
            name: parent.to_string(),
            folders: Vec::new(),
            totals: TypeCounts::default(),
        };
        for sub in subs {
            let counts = count_tree(&sub.path())?;
            entry.totals.add(counts);
            entry.folders.push(FolderCount {
                name: sub.file_name().to_string_lossy().into_owned(),
                counts,
            });
        }
        census.totals.add(entry.totals);
        census.parents.push(entry);
    }
    Ok(census)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, "").expect("write");
    }

    #[test]
    fn counts_nested_files_by_type_marker() {
        let root = tempfile::tempdir().expect("tempdir");
        let base = root.path();
        touch(&base.join("done/rack5/sn.A_r5_u1_ty.svr.txt"));
        touch(&base.join("done/rack5/deep/sn.NONE_r5_u1_ty.vm_s_10.0.0.1.txt"));
        touch(&base.join("done/rack5/notes.txt"));
        touch(&base.join("done/rack9/sn.B_r9_u2_ty.svr.txt"));
        touch(&base.join("done/stray_ty.vm.txt"));
        touch(&base.join("draft/new/x_ty.other.txt"));

        let result = census(base, &DEFAULT_PARENTS).expect("census");
        assert_eq!(result.missing, vec!["notes".to_string()]);

        let done = &result.parents[1];
        assert_eq!(done.name, "done");
        assert_eq!(done.folders[0].name, "rack5");
        assert_eq!(done.folders[0].counts, TypeCounts { vm: 1, svr: 1, none: 1 });
        assert_eq!(done.totals.total(), 4);
        assert_eq!(result.parents[0].totals, TypeCounts { vm: 0, svr: 0, none: 1 });
        assert_eq!(result.totals.total(), 5);

        let text = result.render();
        assert!(text.contains("  rack5: 3 files (vm: 1, svr: 1, none: 1)"));
        assert!(text.contains("Grand total: 5 files (vm: 1, svr: 2, none: 2)"));
    }
}
