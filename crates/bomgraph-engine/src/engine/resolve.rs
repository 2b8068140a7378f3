//! Recursive reference resolution.
//!
//! The resolver walks the reference graph depth first. For every node it
//! checks, in order: the depth limit, the active resolution chain (cycles),
//! the resolution cache, and the base-case rules. Otherwise it re-enters the
//! [`CellInfoSource`] for each child reference and resolves the child one
//! level deeper.
//!
//! One resolver lives for a whole batch run. Its cache is shared by every
//! request of the run, so a sub-assembly used by many products is read and
//! expanded once.

use serde::Deserialize;
use std::collections::{HashMap, HashSet};

use super::cell_info::CellInfoSource;
use super::cell_ref::CellAddress;
use super::cycle::ResolutionChain;
use super::reference::{CIRCULAR_ERROR, MAX_DEPTH_ERROR, Reference};

pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 10;

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverOptions {
    /// Nodes at this depth are truncated with a depth error.
    pub max_recursion_depth: usize,
    /// Treat `*` as a bill-of-materials quantity and stop descending there.
    pub stop_on_multiplication: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        ResolverOptions {
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
            stop_on_multiplication: false,
        }
    }
}

enum ShortCircuit {
    MaxDepth,
    Circular,
    Cached(Reference),
}

#[derive(Debug, Default)]
pub struct Resolver {
    options: ResolverOptions,
    cache: HashMap<String, Reference>,
    /// Products cached as leaves because they were reached below the top level.
    product_stubs: HashSet<String>,
    chain: ResolutionChain,
}

impl Resolver {
    pub fn new(options: ResolverOptions) -> Self {
        Resolver {
            options,
            ..Resolver::default()
        }
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Resolve a top-level request for `address`.
    pub fn resolve_address(
        &mut self,
        address: &CellAddress,
        product_id: Option<&str>,
        source: &mut dyn CellInfoSource,
    ) -> Reference {
        let mut root = self.resolve_child(Reference::new(address.clone()), product_id, source, 0);
        if root.product_id.is_none() {
            if let Some(product_id) = product_id {
                root.product_id = Some(product_id.to_string());
                root.is_product = true;
            }
        }
        root
    }

    /// Resolve a node whose cell info has already been extracted.
    pub fn resolve(
        &mut self,
        node: Reference,
        source: &mut dyn CellInfoSource,
        depth: usize,
    ) -> Reference {
        match self.short_circuit(&node.id, depth) {
            Some(ShortCircuit::MaxDepth) => node.with_error(MAX_DEPTH_ERROR),
            Some(ShortCircuit::Circular) => node.with_error(CIRCULAR_ERROR),
            Some(ShortCircuit::Cached(cached)) => cached,
            None => self.expand(node, source, depth),
        }
    }

    fn short_circuit(&self, id: &str, depth: usize) -> Option<ShortCircuit> {
        if depth >= self.options.max_recursion_depth {
            tracing::warn!(%id, depth, "max recursion depth reached");
            return Some(ShortCircuit::MaxDepth);
        }
        if let Some(path) = self.chain.cycle_path(id) {
            tracing::warn!(%id, path = %path.join(" -> "), "circular reference");
            return Some(ShortCircuit::Circular);
        }

        let cached = self.cache.get(id)?;
        if depth == 0 && self.product_stubs.contains(id) {
            // Requested as a top-level product: expand it this time.
            return None;
        }
        tracing::debug!(%id, depth, "resolution cache hit");
        if depth > 0 && cached.is_product {
            Some(ShortCircuit::Cached(cached.as_leaf()))
        } else {
            Some(ShortCircuit::Cached(cached.clone()))
        }
    }

    fn is_base_case(&self, node: &Reference, depth: usize) -> bool {
        node.is_element
            || node.is_base_material
            || (self.options.stop_on_multiplication && node.is_multiplication)
            || node.is_division
            || node.is_literal()
            || (node.is_product && depth > 0)
    }

    /// Resolve a reference stub produced by the extractor, calling the source
    /// only when the stub is not short-circuited.
    fn resolve_child(
        &mut self,
        stub: Reference,
        product_id: Option<&str>,
        source: &mut dyn CellInfoSource,
        depth: usize,
    ) -> Reference {
        match self.short_circuit(&stub.id, depth) {
            Some(ShortCircuit::MaxDepth) => stub.with_error(MAX_DEPTH_ERROR),
            Some(ShortCircuit::Circular) => stub.with_error(CIRCULAR_ERROR),
            Some(ShortCircuit::Cached(cached)) => cached,
            None => match source.cell_info(&stub.address(), product_id) {
                Ok(node) => self.resolve(node, source, depth),
                Err(err) => {
                    tracing::warn!(id = %stub.id, error = %err, "reference could not be extracted");
                    let failed = stub.with_error(err.to_string());
                    self.cache.insert(failed.id.clone(), failed.clone());
                    failed
                }
            },
        }
    }

    fn expand(
        &mut self,
        mut node: Reference,
        source: &mut dyn CellInfoSource,
        depth: usize,
    ) -> Reference {
        if self.is_base_case(&node, depth) {
            tracing::debug!(id = %node.id, class = %node.classification(), "base case");
            node.references.clear();
            if node.is_product && depth > 0 {
                self.product_stubs.insert(node.id.clone());
            }
            self.cache.insert(node.id.clone(), node.clone());
            return node;
        }

        let _guard = self.chain.enter(&node.id);
        let pending = std::mem::take(&mut node.references);
        let mut resolved = Vec::with_capacity(pending.len());
        for reference in pending {
            if !reference.address().is_complete() {
                tracing::debug!(id = %reference.id, "skipping incomplete reference");
                continue;
            }
            resolved.push(self.resolve_child(reference, None, source, depth + 1));
        }
        node.references = resolved;

        self.product_stubs.remove(&node.id);
        self.cache.insert(node.id.clone(), node.clone());
        node
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::CellValue;
    use crate::error::{LookupError, Result};
    use pretty_assertions::assert_eq;

    /// In-memory source: canonical id -> (formula references, flags).
    #[derive(Default)]
    struct FakeSource {
        nodes: HashMap<String, Reference>,
        calls: HashMap<String, usize>,
        broken: HashSet<String>,
    }

    impl FakeSource {
        fn add(&mut self, cell: &str, children: &[&str]) -> &mut Reference {
            let mut node = Reference::new(addr(cell));
            node.formula = Some(children.join("+"));
            node.value = Some(CellValue::Number(1.0));
            node.references = children.iter().map(|c| Reference::new(addr(c))).collect();
            self.nodes.entry(node.id.clone()).or_insert(node)
        }

        fn calls(&self, cell: &str) -> usize {
            self.calls.get(&addr(cell).id()).copied().unwrap_or(0)
        }
    }

    impl CellInfoSource for FakeSource {
        fn cell_info(&mut self, address: &CellAddress, product_id: Option<&str>) -> Result<Reference> {
            *self.calls.entry(address.id()).or_default() += 1;
            if self.broken.contains(&address.id()) {
                return Err(LookupError::Workbook("boom".into()));
            }
            let mut node = self
                .nodes
                .get(&address.id())
                .cloned()
                .unwrap_or_else(|| Reference::new(address.clone()));
            if let Some(pid) = product_id {
                node.product_id = Some(pid.to_string());
                node.is_product = true;
            }
            Ok(node)
        }
    }

    fn addr(cell: &str) -> CellAddress {
        CellAddress::new("book.xlsx", "S", cell)
    }

    fn ids(node: &Reference) -> Vec<&str> {
        node.references.iter().map(|r| r.cell.as_str()).collect()
    }

    #[test]
    fn test_resolves_tree() {
        let mut source = FakeSource::default();
        source.add("A1", &["B1", "C1"]);
        source.add("B1", &["D1"]);
        source.add("D1", &[]).is_element = true;
        let mut c1 = Reference::new(addr("C1"));
        c1.value = Some(CellValue::Number(4.0));
        source.nodes.insert(c1.id.clone(), c1);

        let mut resolver = Resolver::default();
        let root = resolver.resolve_address(&addr("A1"), None, &mut source);

        assert_eq!(ids(&root), vec!["B1", "C1"]);
        assert_eq!(ids(&root.references[0]), vec!["D1"]);
        assert!(root.references[0].references[0].is_element);
        assert!(root.references[1].references.is_empty());
        assert_eq!(root.error, None);
    }

    #[test]
    fn test_direct_self_reference_is_circular() {
        let mut source = FakeSource::default();
        source.add("A1", &["A1"]);
        let mut resolver = Resolver::default();
        let root = resolver.resolve_address(&addr("A1"), None, &mut source);
        assert_eq!(root.error, None);
        assert_eq!(root.references.len(), 1);
        assert_eq!(root.references[0].error.as_deref(), Some(CIRCULAR_ERROR));
        assert!(root.references[0].references.is_empty());
    }

    #[test]
    fn test_indirect_cycle_terminates() {
        let mut source = FakeSource::default();
        source.add("A1", &["B1"]);
        source.add("B1", &["C1"]);
        source.add("C1", &["A1"]);
        let mut resolver = Resolver::default();
        let root = resolver.resolve_address(&addr("A1"), None, &mut source);
        let c1 = &root.references[0].references[0];
        assert_eq!(c1.cell, "C1");
        assert_eq!(c1.references[0].cell, "A1");
        assert_eq!(c1.references[0].error.as_deref(), Some(CIRCULAR_ERROR));
        assert_eq!(resolver.chain.depth(), 0);
    }

    #[test]
    fn test_depth_limit_truncates_chain() {
        let mut source = FakeSource::default();
        let cells: Vec<String> = (1..=8).map(|n| format!("A{}", n)).collect();
        for pair in cells.windows(2) {
            source.add(&pair[0], &[pair[1].as_str()]);
        }
        let mut resolver = Resolver::new(ResolverOptions {
            max_recursion_depth: 3,
            stop_on_multiplication: false,
        });
        let root = resolver.resolve_address(&addr("A1"), None, &mut source);

        let mut node = &root;
        for _ in 0..3 {
            assert_eq!(node.error, None);
            node = &node.references[0];
        }
        assert_eq!(node.cell, "A4");
        assert_eq!(node.error.as_deref(), Some(MAX_DEPTH_ERROR));
        assert!(node.references.is_empty());
        assert_eq!(source.calls("A4"), 0);
    }

    #[test]
    fn test_shared_subtree_resolved_once() {
        let mut source = FakeSource::default();
        source.add("P1", &["S1"]);
        source.add("P2", &["S1"]);
        source.add("S1", &["E1"]);
        source.add("E1", &[]).is_element = true;

        let mut resolver = Resolver::default();
        let first = resolver.resolve_address(&addr("P1"), Some("prod-1"), &mut source);
        let second = resolver.resolve_address(&addr("P2"), Some("prod-2"), &mut source);

        assert_eq!(first.references[0], second.references[0]);
        assert_eq!(source.calls("S1"), 1);
        assert_eq!(source.calls("E1"), 1);
        assert_eq!(second.product_id.as_deref(), Some("prod-2"));
    }

    #[test]
    fn test_base_cases_clear_references() {
        let mut source = FakeSource::default();
        source.add("A1", &["M1", "D1", "B1"]);
        source.add("M1", &["X1"]).is_multiplication = true;
        source.add("D1", &["X2"]).is_division = true;
        source.add("B1", &["X3"]).is_base_material = true;

        let mut resolver = Resolver::new(ResolverOptions {
            stop_on_multiplication: true,
            ..ResolverOptions::default()
        });
        let root = resolver.resolve_address(&addr("A1"), None, &mut source);
        for child in &root.references {
            assert!(child.references.is_empty(), "{} kept children", child.cell);
        }
        assert_eq!(source.calls("X1"), 0);
    }

    #[test]
    fn test_multiplication_descends_when_not_stopping() {
        let mut source = FakeSource::default();
        source.add("M1", &["X1"]).is_multiplication = true;
        let mut resolver = Resolver::default();
        let root = resolver.resolve_address(&addr("M1"), None, &mut source);
        assert_eq!(ids(&root), vec!["X1"]);
    }

    #[test]
    fn test_nested_product_is_a_leaf_until_requested() {
        let mut source = FakeSource::default();
        source.add("P1", &["P2"]);
        {
            let p2 = source.add("P2", &["E1"]);
            p2.is_product = true;
            p2.product_id = Some("prod-2".into());
        }
        source.add("E1", &[]).is_element = true;

        let mut resolver = Resolver::default();
        let p1 = resolver.resolve_address(&addr("P1"), Some("prod-1"), &mut source);
        assert!(p1.references[0].is_product);
        assert!(p1.references[0].references.is_empty());

        let p2 = resolver.resolve_address(&addr("P2"), Some("prod-2"), &mut source);
        assert_eq!(ids(&p2), vec!["E1"]);

        let again = resolver.resolve_address(&addr("P1"), Some("prod-1"), &mut source);
        assert!(again.references[0].references.is_empty());
    }

    #[test]
    fn test_source_error_is_recorded_per_child() {
        let mut source = FakeSource::default();
        source.add("A1", &["B1", "C1"]);
        source.broken.insert(addr("B1").id());
        let mut resolver = Resolver::default();
        let root = resolver.resolve_address(&addr("A1"), None, &mut source);

        assert_eq!(root.references.len(), 2);
        assert_eq!(
            root.references[0].error.as_deref(),
            Some("Workbook error: boom")
        );
        assert_eq!(root.references[0].cell, "B1");
        assert_eq!(root.references[1].error, None);
    }

    #[test]
    fn test_incomplete_references_are_skipped() {
        let mut source = FakeSource::default();
        source.add("A1", &["B1"]);
        let id = addr("A1").id();
        if let Some(node) = source.nodes.get_mut(&id) {
            node.references.push(Reference::new(CellAddress::new("book.xlsx", "", "C1")));
        }
        let mut resolver = Resolver::default();
        let root = resolver.resolve_address(&addr("A1"), None, &mut source);
        assert_eq!(ids(&root), vec!["B1"]);
    }
}
