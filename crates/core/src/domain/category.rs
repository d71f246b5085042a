use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::PipelineError;

/// Codes become directory and file names under the output root.
fn is_path_safe_code(code: &str) -> bool {
    !code.is_empty() && code != "." && code != ".." && !code.contains(['/', '\\', '\0'])
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryNode {
    pub code: String,
    #[serde(rename = "catalog_name")]
    pub name: String,
    #[serde(rename = "catalog_depth", serialize_with = "depth_as_string")]
    pub depth: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<CategoryNode>,
}

fn depth_as_string<S: Serializer>(depth: &u32, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&depth.to_string())
}

impl CategoryNode {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            depth: 1,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<CategoryNode>) -> Self {
        self.children = children;
        self
    }

    pub fn iter(&self) -> Preorder<'_> {
        Preorder { stack: vec![self] }
    }

    /// The node's own code plus every code in its subtree.
    pub fn descendant_codes(&self) -> HashSet<String> {
        self.iter().map(|n| n.code.clone()).collect()
    }
}

impl Drop for CategoryNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

pub struct Preorder<'a> {
    stack: Vec<&'a CategoryNode>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = &'a CategoryNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTree {
    roots: Vec<CategoryNode>,
    len: usize,
    max_depth: u32,
}

impl CategoryTree {
    /// Builds the tree, recomputing depths from structure (roots are depth 1) and rejecting
    /// duplicate codes.
    pub fn new(mut roots: Vec<CategoryNode>) -> Result<Self, PipelineError> {
        let mut stack: Vec<&mut CategoryNode> = Vec::new();
        for root in roots.iter_mut() {
            if root.depth != 1 && root.depth != 0 {
                tracing::warn!(code = %root.code, declared = root.depth, "root category declared at wrong depth; using 1");
            }
            root.depth = 1;
            stack.push(root);
        }
        while let Some(node) = stack.pop() {
            let CategoryNode {
                code,
                depth,
                children,
                ..
            } = node;
            let child_depth = *depth + 1;
            for child in children.iter_mut() {
                if child.depth != child_depth && child.depth != 0 {
                    tracing::warn!(
                        code = %child.code,
                        parent = %code,
                        declared = child.depth,
                        structural = child_depth,
                        "category depth disagrees with tree structure; using structural depth"
                    );
                }
                child.depth = child_depth;
                stack.push(child);
            }
        }

        let mut seen = HashSet::new();
        let mut len = 0;
        let mut max_depth = 0;
        for node in roots.iter().flat_map(CategoryNode::iter) {
            if !is_path_safe_code(&node.code) {
                return Err(PipelineError::InvalidTree(format!(
                    "category code '{}' cannot be used as a directory name",
                    node.code
                )));
            }
            if !seen.insert(node.code.as_str()) {
                return Err(PipelineError::InvalidTree(format!(
                    "duplicate category code '{}'",
                    node.code
                )));
            }
            len += 1;
            max_depth = max_depth.max(node.depth);
        }

        Ok(Self {
            roots,
            len,
            max_depth,
        })
    }

    pub fn roots(&self) -> &[CategoryNode] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn iter(&self) -> impl Iterator<Item = &CategoryNode> {
        self.roots.iter().flat_map(CategoryNode::iter)
    }

    /// First match in depth-first order.
    pub fn find(&self, code: &str) -> Option<&CategoryNode> {
        self.iter().find(|n| n.code == code)
    }

    pub fn find_or_err(&self, code: &str) -> Result<&CategoryNode, PipelineError> {
        self.find(code)
            .ok_or_else(|| PipelineError::CategoryNotFound(code.to_string()))
    }

    pub fn nodes_at_depth(&self, depth: u32) -> Vec<&CategoryNode> {
        self.iter().filter(|n| n.depth == depth).collect()
    }

    pub fn name_of(&self, code: &str) -> Option<&str> {
        self.find(code).map(|n| n.name.as_str())
    }

    pub fn path_to(&self, code: &str) -> Option<Vec<&CategoryNode>> {
        let mut path: Vec<&CategoryNode> = Vec::new();
        for node in self.iter() {
            path.truncate(node.depth.saturating_sub(1) as usize);
            path.push(node);
            if node.code == code {
                return Some(path);
            }
        }
        None
    }

    /// Parses the nested JSON form (`code`, `catalog_name`, `catalog_depth`, `children`).
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self, PipelineError> {
        let raw: Vec<RawCategory> = serde_json::from_reader(reader)?;
        Self::new(raw.into_iter().map(RawCategory::into_node).collect())
    }

    /// Builds the tree from flat taxonomy rows linked by `parent_catalog_code`.
    pub fn from_flat(rows: Vec<FlatCategory>) -> Result<Self, PipelineError> {
        let mut index: HashMap<String, usize> = HashMap::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let code = row.code.trim();
            if code.is_empty() {
                return Err(PipelineError::InvalidTree(format!(
                    "taxonomy row {} has an empty code",
                    i + 1
                )));
            }
            if index.insert(code.to_string(), i).is_some() {
                return Err(PipelineError::InvalidTree(format!(
                    "duplicate category code '{code}'"
                )));
            }
        }

        let mut children: Vec<Vec<usize>> = vec![Vec::new(); rows.len()];
        let mut roots: Vec<usize> = Vec::new();
        for (i, row) in rows.iter().enumerate() {
            let parent = row.parent_catalog_code.as_deref().map(str::trim).unwrap_or("");
            if parent.is_empty() || parent == "0" {
                roots.push(i);
                continue;
            }
            match index.get(parent) {
                Some(&p) => children[p].push(i),
                None => {
                    tracing::warn!(code = %row.code, parent, "unknown parent category; treating as root");
                    roots.push(i);
                }
            }
        }

        let mut nodes: Vec<Option<CategoryNode>> = rows
            .iter()
            .map(|row| {
                Some(CategoryNode {
                    code: row.code.trim().to_string(),
                    name: row.catalog_name.trim().to_string(),
                    depth: row
                        .catalog_depth
                        .as_deref()
                        .and_then(|d| d.trim().parse().ok())
                        .unwrap_or(0),
                    children: Vec::new(),
                })
            })
            .collect();

        // Assemble bottom-up: a post-order over the index graph moves each finished child into
        // its parent. Nodes caught in a parent cycle are never reached from a root.
        let mut assembled: Vec<CategoryNode> = Vec::with_capacity(roots.len());
        for &root in &roots {
            let mut stack: Vec<(usize, bool)> = vec![(root, false)];
            while let Some((i, expanded)) = stack.pop() {
                if !expanded {
                    stack.push((i, true));
                    for &c in children[i].iter().rev() {
                        stack.push((c, false));
                    }
                    continue;
                }
                let kids: Vec<CategoryNode> = children[i]
                    .iter()
                    .filter_map(|&c| nodes[c].take())
                    .collect();
                if let Some(node) = nodes[i].as_mut() {
                    node.children = kids;
                }
            }
            if let Some(node) = nodes[root].take() {
                assembled.push(node);
            }
        }

        let orphaned = nodes.iter().filter(|n| n.is_some()).count();
        if orphaned > 0 {
            tracing::warn!(orphaned, "taxonomy rows unreachable from any root were dropped");
        }

        Self::new(assembled)
    }

    pub fn to_json_writer<W: Write>(&self, writer: W) -> Result<(), PipelineError> {
        serde_json::to_writer_pretty(writer, &self.roots)?;
        Ok(())
    }
}

pub fn load_tree(path: &Path) -> Result<CategoryTree, PipelineError> {
    let file = File::open(path).map_err(|err| {
        PipelineError::missing_input(path, format!("cannot open category tree: {err}"))
    })?;
    let tree = CategoryTree::from_json_reader(BufReader::new(file))?;
    tracing::info!(
        path = %path.display(),
        nodes = tree.len(),
        max_depth = tree.max_depth(),
        "loaded category tree"
    );
    Ok(tree)
}

/// Reads flat taxonomy CSV rows and writes the nested JSON form.
pub fn convert_flat_taxonomy(input: &Path, output: &Path) -> Result<CategoryTree, PipelineError> {
    let mut reader = csv::Reader::from_path(input)?;
    let rows = reader
        .deserialize::<FlatCategory>()
        .collect::<Result<Vec<_>, _>>()?;
    let tree = CategoryTree::from_flat(rows)?;

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(output)?);
    tree.to_json_writer(&mut writer)?;
    writer.flush()?;
    Ok(tree)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlatCategory {
    pub code: String,
    #[serde(default)]
    pub catalog_name: String,
    #[serde(default)]
    pub catalog_depth: Option<String>,
    #[serde(default)]
    pub parent_catalog_code: Option<String>,
    #[serde(default)]
    pub full_catalog_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Int(i64),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Scalar::Text(s) => s.trim().to_string(),
            Scalar::Int(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawCategory {
    code: Scalar,
    #[serde(default, alias = "name")]
    catalog_name: String,
    #[serde(default)]
    catalog_depth: Option<Scalar>,
    #[serde(default)]
    children: Option<Vec<RawCategory>>,
}

impl RawCategory {
    fn into_node(self) -> CategoryNode {
        CategoryNode {
            code: self.code.into_string(),
            name: self.catalog_name,
            depth: self
                .catalog_depth
                .and_then(|d| d.into_string().parse().ok())
                .unwrap_or(0),
            children: self
                .children
                .unwrap_or_default()
                .into_iter()
                .map(RawCategory::into_node)
                .collect(),
        }
    }
}
