//! dependency graph between block instances
//!
//! Vertices are keyed by block address, an edge `a -> b` means `b` reads `a`. Edges that would
//! close a cycle are rejected when they are added.
use crate::block::Block;
use crate::error::{Error, Errors};
use crate::registry::BlockRegistry;
use crate::util::ReferenceCollector;
use crate::visit::VisitTraversals;
use indexmap::{IndexMap, IndexSet};
use std::collections::VecDeque;

#[derive(Debug, Default)]
pub struct Dag {
    vertices: IndexMap<String, Box<dyn Block>>,
    parents: IndexMap<String, IndexSet<String>>,
    children: IndexMap<String, IndexSet<String>>,
}

impl Dag {
    pub fn new() -> Self {
        Self::default()
    }

    /// One vertex per block, edges from every reference to another vertex
    ///
    /// Duplicate addresses and cycles are collected, the graph is only returned if there were none.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn build(registry: &BlockRegistry, blocks: Vec<Box<dyn Block>>) -> Result<Self, Errors> {
        let mut dag = Self::new();
        let mut errors = Errors::new();

        for block in blocks {
            let address = block.base().address();
            if let Err(e) = dag.add_vertex(address, block) {
                errors.log(e);
            }
        }

        let mut edges = vec![];
        for (address, block) in &dag.vertices {
            let mut collector = ReferenceCollector::new(registry);
            block.base().raw().visit_traversals(&mut collector);

            for upstream in collector.addresses {
                if &upstream == address || !dag.vertices.contains_key(&upstream) {
                    continue;
                }
                edges.push((upstream, address.clone()));
            }
        }

        for (from, to) in edges {
            if let Err(e) = dag.add_edge(&from, &to) {
                errors.log(e);
            }
        }

        errors.into_result()?;
        tracing::debug!(vertices = dag.len(), "graph built");
        Ok(dag)
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.vertices.contains_key(address)
    }

    pub fn add_vertex(&mut self, address: String, block: Box<dyn Block>) -> Result<(), Error> {
        if self.vertices.contains_key(&address) {
            return Err(Error::DuplicateAddress {
                range: block.base().raw().range.clone(),
                address,
            });
        }

        self.parents.insert(address.clone(), IndexSet::new());
        self.children.insert(address.clone(), IndexSet::new());
        self.vertices.insert(address, block);
        Ok(())
    }

    /// Remove a vertex together with all its edges
    pub fn delete_vertex(&mut self, address: &str) -> Option<Box<dyn Block>> {
        let block = self.vertices.shift_remove(address)?;

        for parent in self.parents.shift_remove(address).unwrap_or_default() {
            if let Some(children) = self.children.get_mut(&parent) {
                children.shift_remove(address);
            }
        }
        for child in self.children.shift_remove(address).unwrap_or_default() {
            if let Some(parents) = self.parents.get_mut(&child) {
                parents.shift_remove(address);
            }
        }

        Some(block)
    }

    /// Add `from -> to`, adding an existing edge again is a no-op
    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<(), Error> {
        for address in [from, to] {
            if !self.contains(address) {
                return Err(Error::UnknownAddress(address.to_string()));
            }
        }

        if let Some(path) = self.path(to, from) {
            let mut cycle = vec![from.to_string()];
            cycle.extend(path);
            return Err(Error::Cycle { path: cycle });
        }

        if let Some(children) = self.children.get_mut(from) {
            children.insert(to.to_string());
        }
        if let Some(parents) = self.parents.get_mut(to) {
            parents.insert(from.to_string());
        }
        Ok(())
    }

    /// Shortest path `from -> .. -> to` along child edges
    fn path(&self, from: &str, to: &str) -> Option<Vec<String>> {
        let mut previous: IndexMap<&str, &str> = IndexMap::new();
        let mut pending = VecDeque::from([from]);

        while let Some(current) = pending.pop_front() {
            if current == to {
                let mut path = vec![current.to_string()];
                let mut step = current;
                while let Some(&before) = previous.get(step) {
                    path.push(before.to_string());
                    step = before;
                }
                path.reverse();
                return Some(path);
            }

            for child in self.children.get(current).into_iter().flatten() {
                if child != from && !previous.contains_key(child.as_str()) {
                    previous.insert(child.as_str(), current);
                    pending.push_back(child.as_str());
                }
            }
        }

        None
    }

    pub fn vertex(&self, address: &str) -> Option<&dyn Block> {
        self.vertices.get(address).map(|block| block.as_ref())
    }

    pub fn vertex_mut(&mut self, address: &str) -> Option<&mut (dyn Block + 'static)> {
        self.vertices.get_mut(address).map(|block| block.as_mut())
    }

    /// All vertices in insertion order
    pub fn vertices(&self) -> impl Iterator<Item = (&str, &dyn Block)> {
        self.vertices
            .iter()
            .map(|(address, block)| (address.as_str(), block.as_ref()))
    }

    /// Direct upstream vertices
    pub fn parents(&self, address: &str) -> Result<&IndexSet<String>, Error> {
        self.parents
            .get(address)
            .ok_or_else(|| Error::UnknownAddress(address.to_string()))
    }

    /// Direct downstream vertices
    pub fn children(&self, address: &str) -> Result<&IndexSet<String>, Error> {
        self.children
            .get(address)
            .ok_or_else(|| Error::UnknownAddress(address.to_string()))
    }

    /// Every vertex `address` depends on, directly or not
    pub fn ancestors(&self, address: &str) -> Result<IndexSet<String>, Error> {
        self.closure(address, &self.parents)
    }

    /// Every vertex depending on `address`, directly or not
    pub fn descendants(&self, address: &str) -> Result<IndexSet<String>, Error> {
        self.closure(address, &self.children)
    }

    fn closure(
        &self,
        address: &str,
        edges: &IndexMap<String, IndexSet<String>>,
    ) -> Result<IndexSet<String>, Error> {
        let mut found = IndexSet::new();
        let mut pending: VecDeque<&String> = edges
            .get(address)
            .ok_or_else(|| Error::UnknownAddress(address.to_string()))?
            .iter()
            .collect();

        while let Some(next) = pending.pop_front() {
            if found.insert(next.clone()) {
                pending.extend(edges.get(next).into_iter().flatten());
            }
        }
        Ok(found)
    }

    /// Vertices without parents, in insertion order
    pub fn roots(&self) -> Vec<String> {
        self.parents
            .iter()
            .filter(|(_, parents)| parents.is_empty())
            .map(|(address, _)| address.clone())
            .collect()
    }

    /// Call `f` once for every vertex, after it was called for all of the vertex's parents
    ///
    /// Errors are collected, a failing vertex does not stop the walk.
    pub fn traverse(
        &mut self,
        mut f: impl FnMut(&mut dyn Block) -> Result<(), Error>,
    ) -> Result<(), Errors> {
        let mut errors = Errors::new();
        let mut visited: IndexSet<String> = IndexSet::new();
        let mut pending: VecDeque<String> = self.roots().into();

        while let Some(address) = pending.pop_front() {
            if visited.contains(&address) {
                continue;
            }
            let parents = self.parents(&address).map_err(Errors::from)?;
            if !parents.iter().all(|parent| visited.contains(parent)) {
                pending.push_back(address);
                continue;
            }

            visited.insert(address.clone());
            if let Some(block) = self.vertex_mut(&address) {
                if let Err(e) = f(block) {
                    errors.log(e.in_block(&address));
                }
            }
            pending.extend(self.children(&address).map_err(Errors::from)?.iter().cloned());
        }

        errors.into_result()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hcl_documents;
    use crate::registry::BlockRegistry;
    use pretty_assertions::assert_eq;

    fn dag(source: &str) -> Result<Dag, Errors> {
        let registry = BlockRegistry::with_common_kinds();
        let blocks = hcl_documents!(source)
            .raw_blocks()
            .unwrap()
            .into_iter()
            .map(|raw| registry.construct(raw).unwrap())
            .collect();
        Dag::build(&registry, blocks)
    }

    #[test]
    fn edges_from_references() {
        let dag = dag(
            r#"
            variable "name" {}
            locals {
              a = var.name
              b = "${local.a}-${upper(var.name)}"
              c = [for x in [local.b] : x]
            }
            "#,
        )
        .unwrap();

        assert_eq!(dag.roots(), ["var.name"]);
        assert_eq!(
            dag.parents("local.b").unwrap().iter().collect::<Vec<_>>(),
            ["local.a", "var.name"]
        );
        assert_eq!(
            dag.ancestors("local.c").unwrap().into_iter().collect::<Vec<_>>(),
            ["local.b", "local.a", "var.name"]
        );
        assert_eq!(
            dag.descendants("local.a").unwrap().into_iter().collect::<Vec<_>>(),
            ["local.b", "local.c"]
        );
    }

    #[test]
    fn cycle_names_every_address() {
        let errors = dag(
            r#"
            locals {
              a = local.c
              b = local.a
              c = local.b
            }
            "#,
        )
        .unwrap_err();

        assert_eq!(errors.len(), 1);
        let message = errors.to_string();
        assert!(message.starts_with("cycle detected: "), "{message}");
        for address in ["local.a", "local.b", "local.c"] {
            assert!(message.contains(address), "{message}");
        }
    }

    #[test]
    fn duplicate_address() {
        let errors = dag(
            r#"
            variable "x" {}
            variable "x" {}
            "#,
        )
        .unwrap_err();
        assert!(errors.to_string().starts_with("duplicate block address var.x"));
    }

    #[test]
    fn delete_vertex_drops_edges() {
        let mut dag = dag("locals {\n a = 1\n b = local.a\n c = local.b\n }").unwrap();

        assert!(dag.delete_vertex("local.b").is_some());
        assert!(dag.children("local.a").unwrap().is_empty());
        assert!(dag.parents("local.c").unwrap().is_empty());
        assert_eq!(dag.roots(), ["local.a", "local.c"]);
        assert!(dag.delete_vertex("local.b").is_none());
    }

    #[test]
    fn traverse_honors_order() {
        let mut dag = dag("locals {\n c = [local.a, local.b]\n b = local.a\n a = 1\n }").unwrap();

        let mut visited = vec![];
        dag.traverse(|block| {
            visited.push(block.base().address());
            Ok(())
        })
        .unwrap();

        assert_eq!(visited, ["local.a", "local.b", "local.c"]);
    }
}
