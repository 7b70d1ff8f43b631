//! Part tree storage.
//!
//! Parts live in an arena and refer to each other through index handles, so
//! parent back-references never form ownership cycles. Children are stored in
//! insertion order, which is document order.

use crate::headers::HeaderMap;
use crate::token::NodeId;
use mailsift_mime::TransferEncoding;

/// Index handle of a part in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct PartId(usize);

/// One node of the MIME content tree.
#[derive(Debug)]
pub(crate) struct Part {
    /// Splitter-assigned identity.
    pub node: NodeId,
    /// Parent handle; `None` for the root.
    pub parent: Option<PartId>,
    /// Children in document order.
    pub children: Vec<PartId>,
    /// Normalized headers.
    pub headers: HeaderMap,
    /// Full lowercase `type/subtype`.
    pub content_type: String,
    /// Resolved disposition: "inline" or "attachment".
    pub disposition: String,
    /// Declared charset, when present.
    pub charset: Option<String>,
    /// Transfer encoding of the body.
    pub encoding: TransferEncoding,
    /// Multipart container (no decode pipeline, no body of its own).
    pub is_container: bool,
    /// Embedded `message/rfc822` (structural, children are the inner
    /// message).
    pub is_message: bool,
    /// Surfaced to the consumer as an attachment.
    pub is_attachment: bool,
    /// Render a synthetic header summary before this part's content.
    pub show_meta: bool,
    /// Dotted positional identifier.
    pub part_path: String,
    /// Decoded body of inline text/html leaves, populated when the body is
    /// fully drained. Never populated for attachments or containers.
    pub text_content: Option<String>,
}

/// Arena owning every part of one message.
#[derive(Debug, Default)]
pub(crate) struct PartArena {
    parts: Vec<Part>,
}

impl PartArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a part and links it under its parent (if any). Returns its
    /// handle.
    pub fn alloc(&mut self, part: Part) -> PartId {
        let id = PartId(self.parts.len());
        if let Some(parent) = part.parent {
            self.parts[parent.0].children.push(id);
        }
        self.parts.push(part);
        id
    }

    pub fn get(&self, id: PartId) -> &Part {
        &self.parts[id.0]
    }

    pub fn get_mut(&mut self, id: PartId) -> &mut Part {
        &mut self.parts[id.0]
    }

    /// Iterates ancestor handles, nearest first.
    pub fn ancestors(&self, id: PartId) -> impl Iterator<Item = PartId> + '_ {
        let mut current = self.get(id).parent;
        std::iter::from_fn(move || {
            let next = current?;
            current = self.get(next).parent;
            Some(next)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank(node: NodeId, parent: Option<PartId>) -> Part {
        Part {
            node,
            parent,
            children: Vec::new(),
            headers: HeaderMap::new(),
            content_type: "text/plain".to_string(),
            disposition: "inline".to_string(),
            charset: None,
            encoding: TransferEncoding::Binary,
            is_container: false,
            is_message: false,
            is_attachment: false,
            show_meta: false,
            part_path: "1".to_string(),
            text_content: None,
        }
    }

    #[test]
    fn test_alloc_links_children() {
        let mut arena = PartArena::new();
        let root = arena.alloc(blank(0, None));
        let child = arena.alloc(blank(1, Some(root)));
        assert_eq!(arena.get(root).children, vec![child]);
        assert_eq!(arena.get(child).parent, Some(root));
    }

    #[test]
    fn test_ancestors_nearest_first() {
        let mut arena = PartArena::new();
        let root = arena.alloc(blank(0, None));
        let mid = arena.alloc(blank(1, Some(root)));
        let leaf = arena.alloc(blank(2, Some(mid)));
        let chain: Vec<_> = arena.ancestors(leaf).collect();
        assert_eq!(chain, vec![mid, root]);
    }
}
