//! Filepath: src/core/tree.rs
//! Project tree view of a scan: files grouped by their classification
//! hierarchy, each leaf shown as `filename [environment]`.
//! - BTreeMap children for deterministic ordering
//! - Colors are optional so output can be captured verbatim

use std::collections::BTreeMap;

use anyhow::Result;
use owo_colors::OwoColorize;
use ptree::TreeBuilder;

use crate::core::classify::ConfigFile;

#[derive(Debug, Default)]
struct TreeNode {
    children: BTreeMap<String, TreeNode>,
    /// (filename, environment) pairs at this level
    files: Vec<(String, String)>,
}

impl TreeNode {
    fn insert(&mut self, file: &ConfigFile) {
        let node = file
            .hierarchy
            .iter()
            .fold(self, |node, segment| node.children.entry(segment.clone()).or_default());
        node.files.push((file.filename.clone(), file.environment.clone()));
    }

    fn count(&self) -> usize {
        self.files.len() + self.children.values().map(TreeNode::count).sum::<usize>()
    }
}

fn group(files: &[ConfigFile]) -> TreeNode {
    let mut root = TreeNode::default();
    for file in files {
        root.insert(file);
    }
    root
}

fn dir_label(name: &str, count: usize, color: bool) -> String {
    if color {
        format!("{}/ ({count})", name.blue())
    } else {
        format!("{name}/ ({count})")
    }
}

fn file_label(name: &str, env: &str, color: bool) -> String {
    if color {
        format!("{} [{}]", name.bright_blue(), env.green())
    } else {
        format!("{name} [{env}]")
    }
}

fn add_children(builder: &mut TreeBuilder, node: &TreeNode, color: bool) {
    for (name, child) in &node.children {
        builder.begin_child(dir_label(name, child.count(), color));
        add_children(builder, child, color);
        builder.end_child();
    }
    for (name, env) in &node.files {
        builder.add_empty_child(file_label(name, env, color));
    }
}

/// Render `files` grouped under `root_label`.
pub fn render(root_label: &str, files: &[ConfigFile], color: bool) -> Result<String> {
    let grouped = group(files);
    let mut builder = TreeBuilder::new(dir_label(root_label, grouped.count(), color));
    add_children(&mut builder, &grouped, color);

    let tree = builder.build();
    let mut out = Vec::new();
    ptree::write_tree(&tree, &mut out)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn file(hierarchy: &[&str], filename: &str, environment: &str) -> ConfigFile {
        ConfigFile {
            path: PathBuf::from(filename),
            filename: filename.to_string(),
            environment: environment.to_string(),
            project: hierarchy.last().map(|s| s.to_string()).unwrap_or_default(),
            hierarchy: hierarchy.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn groups_by_hierarchy() {
        let files = vec![
            file(&["billing", "Billing_API"], "appsettings.json", "default"),
            file(&["billing", "Billing_API"], "appsettings.Dev.json", "Dev"),
            file(&["Orders_API"], "appsettings.Prod.json", "Prod"),
        ];

        let grouped = group(&files);
        assert_eq!(grouped.count(), 3);
        assert_eq!(grouped.children["billing"].children["Billing_API"].files.len(), 2);

        let text = render("repos", &files, false).unwrap();
        assert!(text.starts_with("repos/ (3)"));
        assert!(text.contains("Billing_API/ (2)"));
        assert!(text.contains("appsettings.Prod.json [Prod]"));
        // Sorted: "Orders_API" sorts before "billing".
        assert!(text.find("Orders_API").unwrap() < text.find("billing").unwrap());
    }

    #[test]
    fn empty_scan_renders_root_only() {
        let text = render("empty", &[], false).unwrap();
        assert_eq!(text.trim(), "empty/ (0)");
    }
}
