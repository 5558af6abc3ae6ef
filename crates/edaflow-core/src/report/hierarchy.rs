//! Hierarchy reconstruction from indented listings.
//!
//! Area reports print one row per instance with only the local label, and
//! encode nesting solely through leading whitespace. There are no closing
//! markers: a row's depth alone says which ancestors are still open.
//! [`HierarchyStack`] keeps the chain of open ancestors and yields the
//! fully-qualified path of every row.

/// One open ancestor: the indentation depth it was seen at and its label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyFrame {
    pub depth: usize,
    pub label: String,
}

/// Ancestors-only stack over a flattened indented tree.
///
/// Depths are strictly increasing from the bottom of the stack to the top.
#[derive(Debug, Default, Clone)]
pub struct HierarchyStack {
    frames: Vec<HierarchyFrame>,
}

impl HierarchyStack {
    pub const fn new() -> Self {
        Self { frames: Vec::new() }
    }

    /// Record a row at `depth`.
    ///
    /// Every frame at the same or a deeper level is closed first, so a row
    /// at a sibling's depth replaces that sibling and its descendants.
    pub fn enter(&mut self, depth: usize, label: impl Into<String>) {
        while self.frames.last().is_some_and(|top| top.depth >= depth) {
            self.frames.pop();
        }
        self.frames.push(HierarchyFrame {
            depth,
            label: label.into(),
        });
    }

    /// `root/label/label/...` for the most recently entered row.
    pub fn path(&self, root: &str) -> String {
        let mut path = String::from(root);
        for frame in &self.frames {
            path.push('/');
            path.push_str(&frame.label);
        }
        path
    }

    pub fn frames(&self) -> &[HierarchyFrame] {
        &self.frames
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

/// Number of leading space characters on a report line.
pub fn indent_depth(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

/// Fully-qualified path for each `(depth, label)` row, in input order.
pub fn reconstruct<'a, I>(root: &str, rows: I) -> Vec<String>
where
    I: IntoIterator<Item = (usize, &'a str)>,
{
    let mut stack = HierarchyStack::new();
    rows.into_iter()
        .map(|(depth, label)| {
            stack.enter(depth, label);
            stack.path(root)
        })
        .collect()
}
