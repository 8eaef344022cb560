use super::{Flow, Stage};
use crate::Result;
use log::debug;

/// Handle to a stage inside a [`Chain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StageId(usize);

struct Node {
    name: String,
    stage: Box<dyn Stage>,
    branches: Vec<StageId>,
}

/// Arena of stages in creation order.
///
/// Every stage is owned by the chain alone. Links point downstream; a stage
/// with more than one branch acts as a splitter and hands each branch its
/// own copy of the block. Dropping the chain releases the stages in reverse
/// creation order.
#[derive(Default)]
pub struct Chain {
    nodes: Vec<Node>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stage that nothing feeds yet.
    pub fn add(&mut self, name: &str, stage: impl Stage + 'static) -> StageId {
        debug!("Adding stage {}", name);
        let id = StageId(self.nodes.len());
        self.nodes.push(Node {
            name: name.to_string(),
            stage: Box::new(stage),
            branches: Vec::new(),
        });
        id
    }

    /// Add a stage fed by `upstream`.
    pub fn attach(&mut self, upstream: StageId, name: &str, stage: impl Stage + 'static) -> StageId {
        let id = self.add(name, stage);
        self.link(upstream, id);
        id
    }

    /// Feed the output of `from` into `to`.
    pub fn link(&mut self, from: StageId, to: StageId) {
        debug!("Linking {} -> {}", self.nodes[from.0].name, self.nodes[to.0].name);
        self.nodes[from.0].branches.push(to);
    }

    /// Push a block into `id` and on through everything downstream of it.
    pub fn push(&mut self, id: StageId, block: &mut [f32]) -> Result<()> {
        let node = &mut self.nodes[id.0];
        if node.stage.process(block)? == Flow::Drop {
            return Ok(());
        }

        let count = node.branches.len();
        for i in 0..count {
            let next = self.nodes[id.0].branches[i];
            if i + 1 == count {
                self.push(next, block)?;
            } else {
                let mut copy = block.to_vec();
                self.push(next, &mut copy)?;
            }
        }
        Ok(())
    }

    /// Flush every stage in creation order.
    pub fn flush(&mut self) -> Result<()> {
        for node in self.nodes.iter_mut() {
            node.stage.flush()?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Stage names in creation order.
    pub fn names(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.name.as_str()).collect()
    }
}

impl Drop for Chain {
    fn drop(&mut self) {
        while let Some(node) = self.nodes.pop() {
            debug!("Releasing stage {}", node.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Record {
        tag: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        scale: f32,
    }

    impl Stage for Record {
        fn process(&mut self, block: &mut [f32]) -> Result<Flow> {
            for v in block.iter_mut() {
                *v *= self.scale;
            }
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.tag, block[0]));
            Ok(Flow::Forward)
        }
    }

    impl Drop for Record {
        fn drop(&mut self) {
            self.log.lock().unwrap().push(format!("drop {}", self.tag));
        }
    }

    struct Block;

    impl Stage for Block {
        fn process(&mut self, _block: &mut [f32]) -> Result<Flow> {
            Ok(Flow::Drop)
        }
    }

    fn record(tag: &'static str, log: &Arc<Mutex<Vec<String>>>, scale: f32) -> Record {
        Record {
            tag,
            log: log.clone(),
            scale,
        }
    }

    #[test]
    fn test_splitter_branches_get_independent_copies() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = Chain::new();
        let root = chain.add("root", record("root", &log, 1.0));
        chain.attach(root, "double", record("double", &log, 2.0));
        chain.attach(root, "triple", record("triple", &log, 3.0));

        let mut block = vec![1.0; 4];
        chain.push(root, &mut block).unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["root:1", "double:2", "triple:3"]
        );
    }

    #[test]
    fn test_dropped_block_stops_at_stage() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = Chain::new();
        let root = chain.add("gate", Block);
        chain.attach(root, "after", record("after", &log, 1.0));

        chain.push(root, &mut [1.0; 4]).unwrap();
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_teardown_in_reverse_creation_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        {
            let mut chain = Chain::new();
            let a = chain.add("a", record("a", &log, 1.0));
            let b = chain.attach(a, "b", record("b", &log, 1.0));
            chain.attach(b, "c", record("c", &log, 1.0));
            assert_eq!(chain.names(), vec!["a", "b", "c"]);
        }
        assert_eq!(*log.lock().unwrap(), vec!["drop c", "drop b", "drop a"]);
    }

    #[test]
    fn test_empty_chain_drops_cleanly() {
        let chain = Chain::new();
        assert!(chain.is_empty());
    }
}
