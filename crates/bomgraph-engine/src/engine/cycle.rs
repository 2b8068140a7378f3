//! Active resolution chain for cycle detection.
//!
//! The chain holds the identities of the nodes currently being resolved on the
//! call stack, outermost first. A node whose identity is already on the chain
//! is its own ancestor. Entering a node returns a [`ChainGuard`]; dropping the
//! guard pops the identity again, on every exit path.

use std::cell::RefCell;
use std::rc::Rc;

#[derive(Clone, Debug, Default)]
pub struct ResolutionChain {
    stack: Rc<RefCell<Vec<String>>>,
}

impl ResolutionChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.stack.borrow().iter().any(|entry| entry == id)
    }

    pub fn depth(&self) -> usize {
        self.stack.borrow().len()
    }

    /// The chain from the first occurrence of `id` to the innermost node,
    /// followed by `id` again. None if `id` is not on the chain.
    pub fn cycle_path(&self, id: &str) -> Option<Vec<String>> {
        let stack = self.stack.borrow();
        let start = stack.iter().position(|entry| entry == id)?;
        let mut path: Vec<String> = stack[start..].to_vec();
        path.push(id.to_string());
        Some(path)
    }

    /// Push `id`; it stays on the chain until the returned guard is dropped.
    #[must_use = "the identity is popped as soon as the guard is dropped"]
    pub fn enter(&self, id: &str) -> ChainGuard {
        self.stack.borrow_mut().push(id.to_string());
        ChainGuard {
            stack: Rc::clone(&self.stack),
            id: id.to_string(),
        }
    }
}

#[derive(Debug)]
pub struct ChainGuard {
    stack: Rc<RefCell<Vec<String>>>,
    id: String,
}

impl Drop for ChainGuard {
    fn drop(&mut self) {
        let mut stack = self.stack.borrow_mut();
        if let Some(pos) = stack.iter().rposition(|entry| *entry == self.id) {
            stack.remove(pos);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_pops_on_drop() {
        let chain = ResolutionChain::new();
        {
            let _a = chain.enter("a");
            let _b = chain.enter("b");
            assert!(chain.contains("a"));
            assert!(chain.contains("b"));
            assert_eq!(chain.depth(), 2);
        }
        assert_eq!(chain.depth(), 0);
        assert!(!chain.contains("a"));
    }

    #[test]
    fn test_guard_pops_on_early_return() {
        fn visit(chain: &ResolutionChain, id: &str, bail: bool) -> Option<()> {
            let _guard = chain.enter(id);
            if bail {
                return None;
            }
            Some(())
        }

        let chain = ResolutionChain::new();
        assert!(visit(&chain, "x", true).is_none());
        assert!(!chain.contains("x"));
        assert!(visit(&chain, "x", false).is_some());
        assert_eq!(chain.depth(), 0);
    }

    #[test]
    fn test_cycle_path() {
        let chain = ResolutionChain::new();
        let _a = chain.enter("a");
        let _b = chain.enter("b");
        let _c = chain.enter("c");
        assert_eq!(
            chain.cycle_path("b"),
            Some(vec!["b".to_string(), "c".to_string(), "b".to_string()])
        );
        assert_eq!(chain.cycle_path("z"), None);
    }
}
