use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;

use super::filename::{floor_char_boundary, truncate_filename, MAX_FILENAME_BYTES};

pub const INDEX_FILE: &str = "folders.json";
const UNTITLED: &str = "untitled";

/// Turn a task name into a single safe path component.
pub fn sanitize_folder_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = replaced.trim().trim_end_matches(['.', ' ']);

    if trimmed.is_empty() || trimmed.chars().all(|c| c == '.') {
        return UNTITLED.to_string();
    }
    truncate_filename(trimmed, MAX_FILENAME_BYTES)
}

#[derive(Debug, Clone, Serialize)]
struct FolderEntry {
    folder: String,
    task_id: String,
    task_name: String,
}

#[derive(Serialize)]
struct IndexFile<'a> {
    generated_at: String,
    folders: &'a [FolderEntry],
}

/// Maps tasks to their attachment folders and remembers the original names.
pub struct FolderIndex {
    root: PathBuf,
    entries: Vec<FolderEntry>,
    owners: HashMap<String, String>,
    by_name: HashMap<String, String>,
}

impl FolderIndex {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            entries: Vec::new(),
            owners: HashMap::new(),
            by_name: HashMap::new(),
        }
    }

    /// Folder for this task. Tasks sharing a name share a folder; a different
    /// name that sanitizes to a taken folder gets the task id appended.
    pub fn folder_for(&mut self, task_id: &str, task_name: &str) -> PathBuf {
        let folder = match self.by_name.get(task_name) {
            Some(folder) => folder.clone(),
            None => {
                let folder = self.claim_folder(task_id, task_name);
                self.by_name.insert(task_name.to_string(), folder.clone());
                folder
            }
        };

        if !self.entries.iter().any(|e| e.task_id == task_id) {
            self.entries.push(FolderEntry {
                folder: folder.clone(),
                task_id: task_id.to_string(),
                task_name: task_name.to_string(),
            });
        }

        self.root.join(folder)
    }

    fn claim_folder(&mut self, task_id: &str, task_name: &str) -> String {
        let base = sanitize_folder_name(task_name);
        let mut folder = base.clone();
        let mut attempt = 0u32;
        while folder == INDEX_FILE
            || self.owners.get(&folder).is_some_and(|owner| owner != task_name)
        {
            let suffix = match attempt {
                0 => format!("_{task_id}"),
                n => format!("_{task_id}_{n}"),
            };
            let keep = floor_char_boundary(&base, MAX_FILENAME_BYTES.saturating_sub(suffix.len()));
            folder = format!("{}{suffix}", &base[..keep]);
            attempt += 1;
        }
        self.owners.insert(folder.clone(), task_name.to_string());
        folder
    }

    /// Write the sidecar index. Nothing is written when no folder was used.
    pub async fn save(&self) -> Result<Option<PathBuf>> {
        if self.entries.is_empty() {
            return Ok(None);
        }
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("Failed to create {}", self.root.display()))?;

        let index = IndexFile {
            generated_at: chrono::Utc::now().to_rfc3339(),
            folders: &self.entries,
        };
        let json = serde_json::to_string_pretty(&index)?;
        let path = self.root.join(INDEX_FILE);
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn separators_and_reserved_chars_are_replaced() {
        assert_eq!(sanitize_folder_name("Design/Review: v2?"), "Design_Review_ v2_");
        assert_eq!(sanitize_folder_name("a\\b"), "a_b");
    }

    #[test]
    fn dot_names_and_blank_names_become_untitled() {
        assert_eq!(sanitize_folder_name(".."), UNTITLED);
        assert_eq!(sanitize_folder_name("   "), UNTITLED);
        assert_eq!(sanitize_folder_name(""), UNTITLED);
    }

    #[test]
    fn plain_names_pass_through() {
        assert_eq!(sanitize_folder_name("Launch plan"), "Launch plan");
    }

    #[test]
    fn same_name_shares_folder_but_colliding_sanitized_names_do_not() {
        let mut index = FolderIndex::new(PathBuf::from("out/attachments"));
        let a = index.folder_for("1", "a/b");
        let b = index.folder_for("2", "a/b");
        let c = index.folder_for("3", "a_b");

        assert_eq!(a, PathBuf::from("out/attachments/a_b"));
        assert_eq!(a, b);
        assert_eq!(c, PathBuf::from("out/attachments/a_b_3"));

        let d = index.folder_for("4", "a_b");
        assert_eq!(d, c);
    }

    #[test]
    fn suffixed_folder_already_owned_is_suffixed_again() {
        let mut index = FolderIndex::new(PathBuf::from("r"));
        index.folder_for("1", "x/y");
        index.folder_for("9", "x_y_2");
        assert_eq!(index.folder_for("2", "x_y"), PathBuf::from("r/x_y_2_1"));
    }

    #[test]
    fn task_named_like_index_file_is_suffixed() {
        let mut index = FolderIndex::new(PathBuf::from("root"));
        assert_eq!(
            index.folder_for("9", INDEX_FILE),
            PathBuf::from("root/folders.json_9")
        );
    }

    #[tokio::test]
    async fn save_writes_mapping_back_to_original_names() {
        let dir = TempDir::new().unwrap();
        let mut index = FolderIndex::new(dir.path().join("attachments"));
        index.folder_for("1", "Q3: budget");

        let path = index.save().await.unwrap().unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(json["folders"][0]["folder"], "Q3_ budget");
        assert_eq!(json["folders"][0]["task_name"], "Q3: budget");
        assert_eq!(json["folders"][0]["task_id"], "1");
        assert!(json["generated_at"].is_string());
    }

    #[tokio::test]
    async fn save_is_noop_when_unused() {
        let dir = TempDir::new().unwrap();
        let index = FolderIndex::new(dir.path().join("attachments"));
        assert!(index.save().await.unwrap().is_none());
        assert!(!dir.path().join("attachments").exists());
    }
}
