//! Lazy, single-pass demultiplexing of one captured output stream.
//!
//! An external tool answers a whole script with one interleaved stream. Each
//! logical command owns a node in an [`OutputChain`]; a node claims a prefix
//! of whatever its predecessor left behind, line by line, until its
//! [`Terminator`] accepts a line. Nothing is split up front: the first read of
//! a node walks back to the last consumed ancestor (or the stream root) and
//! consumes forward, in issue order, exactly once.
//!
//! Nodes live in an arena and are addressed by [`NodeId`], so inserting at the
//! head only rewrites sibling indices and never invalidates ids held elsewhere.

use regex::Regex;
use tracing::{debug, trace};

use crate::error::{Result, RunnerError};

/// Stable identity of one node in an [`OutputChain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Decides which line closes a command's share of the stream.
#[derive(Debug, Clone)]
pub enum Terminator {
    /// The first line matching the pattern is the last one (inclusive).
    Pattern(Regex),
    /// Everything up to the end of the stream.
    EndOfStream,
}

impl Terminator {
    pub fn is_last_line(&self, line: &str) -> bool {
        match self {
            Self::Pattern(re) => re.is_match(line),
            Self::EndOfStream => false,
        }
    }
}

#[derive(Debug)]
struct ChainNode {
    label: &'static str,
    prev: Option<NodeId>,
    next: Option<NodeId>,
    terminator: Terminator,
    consumed: Option<String>,
}

/// Ordered consumers anchored at one shared source.
///
/// The source is the stream root: it stays empty until the owning process has
/// finished and its output is attached with [`OutputChain::attach_source`].
#[derive(Debug, Default)]
pub struct OutputChain {
    nodes: Vec<ChainNode>,
    head: Option<NodeId>,
    tail: Option<NodeId>,
    source: Option<String>,
    cursor: usize,
}

impl OutputChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node after the current tail.
    pub fn push_back(&mut self, label: &'static str, terminator: Terminator) -> NodeId {
        debug_assert!(self.source.is_none(), "chain extended after capture");
        let id = NodeId(self.nodes.len());
        self.nodes.push(ChainNode {
            label,
            prev: self.tail,
            next: None,
            terminator,
            consumed: None,
        });
        match self.tail {
            Some(tail) => self.nodes[tail.0].next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        id
    }

    /// Add a node in front of the current head; the old head now follows it.
    pub fn push_front(&mut self, label: &'static str, terminator: Terminator) -> NodeId {
        debug_assert!(self.source.is_none(), "chain extended after capture");
        let id = NodeId(self.nodes.len());
        self.nodes.push(ChainNode {
            label,
            prev: None,
            next: self.head,
            terminator,
            consumed: None,
        });
        match self.head {
            Some(head) => self.nodes[head.0].prev = Some(id),
            None => self.tail = Some(id),
        }
        self.head = Some(id);
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn predecessor(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|node| node.prev)
    }

    pub fn label(&self, id: NodeId) -> Option<&'static str> {
        self.nodes.get(id.0).map(|node| node.label)
    }

    /// Node ids from head to tail.
    pub fn order(&self) -> Vec<NodeId> {
        let mut ids = Vec::with_capacity(self.nodes.len());
        let mut current = self.head;
        while let Some(id) = current {
            ids.push(id);
            current = self.nodes[id.0].next;
        }
        ids
    }

    /// Point the stream root at the captured output. Consumption starts over.
    pub fn attach_source(&mut self, text: String) {
        debug_assert!(
            self.nodes.iter().all(|node| node.consumed.is_none()),
            "source replaced after consumption"
        );
        self.source = Some(text);
        self.cursor = 0;
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    pub fn is_consumed(&self, id: NodeId) -> bool {
        self.nodes
            .get(id.0)
            .is_some_and(|node| node.consumed.is_some())
    }

    /// Part of the stream no node has claimed yet.
    pub fn unclaimed(&self) -> &str {
        self.source
            .as_deref()
            .map_or("", |source| &source[self.cursor..])
    }

    /// Text claimed by `id`, consuming it and every unconsumed ancestor first.
    ///
    /// Repeated calls are cache hits and never touch the stream again.
    pub fn consume(&mut self, id: NodeId) -> Result<&str> {
        if self.source.is_none() {
            return Err(RunnerError::NoOutputStream);
        }

        let mut pending = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            if self.nodes[node.0].consumed.is_some() {
                break;
            }
            pending.push(node);
            current = self.nodes[node.0].prev;
        }

        for node in pending.into_iter().rev() {
            let segment = self.take_segment(node);
            debug!(
                node = self.nodes[node.0].label,
                bytes = segment.len(),
                "consumed output segment"
            );
            self.nodes[node.0].consumed = Some(segment);
        }

        Ok(self.nodes[id.0].consumed.as_deref().unwrap_or_default())
    }

    fn take_segment(&mut self, id: NodeId) -> String {
        let Some(source) = self.source.as_deref() else {
            return String::new();
        };
        let rest = &source[self.cursor..];
        let terminator = &self.nodes[id.0].terminator;

        let mut taken = 0;
        for (index, line) in rest.split_inclusive('\n').enumerate() {
            taken += line.len();
            trace!(line_no = index + 1, line = line.trim_end(), "output line");
            if terminator.is_last_line(line) {
                trace!("was last line");
                break;
            }
        }

        let segment = rest[..taken].to_string();
        self.cursor += taken;
        segment
    }
}
