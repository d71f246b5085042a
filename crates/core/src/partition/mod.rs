use std::collections::{BTreeMap, HashMap, HashSet};

use crate::domain::category::{CategoryNode, CategoryTree};
use crate::domain::record::{Categorized, RankingRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    code: String,
    codes: HashSet<String>,
}

impl Selector {
    pub fn for_node(node: &CategoryNode) -> Self {
        Self {
            code: node.code.clone(),
            codes: node.descendant_codes(),
        }
    }

    pub fn empty(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            codes: HashSet::new(),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn codes(&self) -> &HashSet<String> {
        &self.codes
    }

    pub fn matches<R: Categorized>(&self, record: &R) -> bool {
        record
            .category_code()
            .map(|c| self.codes.contains(c))
            .unwrap_or(false)
    }

    pub fn filter<'s, I>(&'s self, records: I) -> impl Iterator<Item = I::Item> + 's
    where
        I: IntoIterator,
        I::IntoIter: 's,
        I::Item: Categorized,
    {
        records.into_iter().filter(move |r| self.matches(r))
    }

    pub fn intersects(&self, present: &HashSet<String>) -> bool {
        if present.len() < self.codes.len() {
            present.iter().any(|c| self.codes.contains(c))
        } else {
            self.codes.iter().any(|c| present.contains(c))
        }
    }
}

/// Case-insensitive substring match on `product_title`, independent of category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordSelector {
    keyword: String,
    needle: String,
}

impl KeywordSelector {
    pub fn new(keyword: impl Into<String>) -> Self {
        let keyword = keyword.into();
        let needle = keyword.to_lowercase();
        Self { keyword, needle }
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn matches(&self, record: &RankingRecord) -> bool {
        record
            .product_title
            .as_deref()
            .unwrap_or_default()
            .to_lowercase()
            .contains(&self.needle)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowFilter {
    Category(Selector),
    Keyword(KeywordSelector),
}

impl RowFilter {
    pub fn matches(&self, record: &RankingRecord) -> bool {
        match self {
            RowFilter::Category(selector) => selector.matches(record),
            RowFilter::Keyword(keyword) => keyword.matches(record),
        }
    }

    /// False when none of the `present` category codes can produce a match.
    pub fn may_match(&self, present: &HashSet<String>) -> bool {
        match self {
            RowFilter::Category(selector) => selector.intersects(present),
            RowFilter::Keyword(_) => true,
        }
    }

    /// Rows without a category code are dropped before matching.
    pub fn needs_category(&self) -> bool {
        matches!(self, RowFilter::Category(_))
    }
}

impl From<Selector> for RowFilter {
    fn from(selector: Selector) -> Self {
        RowFilter::Category(selector)
    }
}

impl From<KeywordSelector> for RowFilter {
    fn from(keyword: KeywordSelector) -> Self {
        RowFilter::Keyword(keyword)
    }
}

/// Routes each category code to every partition at one depth that contains it.
#[derive(Debug, Clone)]
pub struct DepthRouter {
    slots: Vec<String>,
    routes: HashMap<String, Vec<usize>>,
}

impl DepthRouter {
    pub fn new(tree: &CategoryTree, depth: u32) -> Self {
        let nodes = tree.nodes_at_depth(depth);
        let mut routes: HashMap<String, Vec<usize>> = HashMap::new();
        for (slot, node) in nodes.iter().enumerate() {
            for descendant in node.iter() {
                routes.entry(descendant.code.clone()).or_default().push(slot);
            }
        }
        Self {
            slots: nodes.into_iter().map(|n| n.code.clone()).collect(),
            routes,
        }
    }

    pub fn slots(&self) -> &[String] {
        &self.slots
    }

    pub fn route<R: Categorized>(&self, record: &R) -> &[usize] {
        record
            .category_code()
            .and_then(|c| self.routes.get(c))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Partitioner<'t> {
    tree: &'t CategoryTree,
}

impl<'t> Partitioner<'t> {
    pub fn new(tree: &'t CategoryTree) -> Self {
        Self { tree }
    }

    pub fn tree(&self) -> &'t CategoryTree {
        self.tree
    }

    /// Selector for `node`, or one matching nothing if the node is not part of this tree.
    pub fn selector(&self, node: &CategoryNode) -> Selector {
        match self.tree.find(&node.code) {
            Some(member) => Selector::for_node(member),
            None => {
                tracing::debug!(code = %node.code, "category not in tree; partition is empty");
                Selector::empty(node.code.clone())
            }
        }
    }

    pub fn partition<I>(&self, records: I, node: &CategoryNode) -> Vec<I::Item>
    where
        I: IntoIterator,
        I::Item: Categorized,
    {
        let selector = self.selector(node);
        selector.filter(records).collect()
    }

    /// Partition of every node at `depth`, keyed by category code. Every node gets an entry,
    /// empty or not, and a record shows up in each partition whose subtree holds its code.
    pub fn partition_all<R>(&self, records: &[R], depth: u32) -> BTreeMap<String, Vec<R>>
    where
        R: Categorized + Clone,
    {
        let router = DepthRouter::new(self.tree, depth);
        let mut buckets: Vec<Vec<R>> = vec![Vec::new(); router.slots().len()];
        for record in records {
            for &slot in router.route(record) {
                buckets[slot].push(record.clone());
            }
        }
        router.slots().iter().cloned().zip(buckets).collect()
    }
}
