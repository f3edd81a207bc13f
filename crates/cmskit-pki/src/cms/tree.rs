//! Mutable message tree.
//!
//! Messages are held as an arena of ASN.1 nodes. A node is either *authored*
//! (built in memory, encoded on demand) or *parsed* (a byte range into one of
//! the tree's buffers whose children are only decoded when first visited).
//! A clean parsed node re-encodes to exactly its input bytes, BER included.
//!
//! Editing a node turns it and every ancestor into authored nodes, so the
//! next [`Tree::encode`] rebuilds only the edited spine. [`Tree::realize`]
//! round-trips the whole tree through its encoding and leaves every node
//! parsed again.
//!
//! The arena only grows between realizations: replaced, removed and
//! re-authored nodes stay allocated, as do grafted buffers. `realize` starts
//! over from one buffer holding the current encoding, so long-lived messages
//! that are edited repeatedly should be compiled now and then.
//!
//! Node ids are only stable until the next `realize`.

use cmskit_types::CmsError;
use cmskit_utils::asn1::{element_len, encode_length, Decoder, Header, Tag};
use cmskit_utils::oid::Oid;
use tracing::trace;

/// Index of a node in its [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
enum Kind {
    Primitive {
        tag: Tag,
        value: Vec<u8>,
    },
    Constructed {
        tag: Tag,
        children: Vec<NodeId>,
    },
    Parsed {
        tag: Tag,
        buf: usize,
        start: usize,
        end: usize,
        /// `None` until first visited.
        children: Option<Vec<NodeId>>,
    },
}

#[derive(Debug, Clone)]
struct Node {
    kind: Kind,
    parent: Option<NodeId>,
}

/// Arena of ASN.1 nodes rooted at a single element.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    bufs: Vec<Vec<u8>>,
    root: NodeId,
}

fn encode_element(tag: &Tag, content: &[u8]) -> Vec<u8> {
    let mut out = tag.to_bytes();
    out.extend_from_slice(&encode_length(content.len()));
    out.extend_from_slice(content);
    out
}

impl Tree {
    /// Wrap one complete DER/BER element. Nothing below the root is decoded.
    pub fn from_der(der: &[u8]) -> Result<Self, CmsError> {
        let mut tree = Tree {
            nodes: Vec::new(),
            bufs: Vec::new(),
            root: NodeId(0),
        };
        tree.root = tree.graft(der)?;
        Ok(tree)
    }

    /// A tree whose root is an empty authored constructed node.
    pub fn new(tag: Tag) -> Self {
        let mut tree = Tree {
            nodes: Vec::new(),
            bufs: Vec::new(),
            root: NodeId(0),
        };
        tree.root = tree.new_constructed(tag);
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Number of ancestors between `id` and the root.
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut cur = id;
        while let Some(p) = self.nodes[cur.0].parent {
            depth += 1;
            cur = p;
        }
        depth
    }

    pub fn tag(&self, id: NodeId) -> Tag {
        match &self.nodes[id.0].kind {
            Kind::Primitive { tag, .. } | Kind::Constructed { tag, .. } | Kind::Parsed { tag, .. } => {
                *tag
            }
        }
    }

    fn alloc(&mut self, kind: Kind, parent: Option<NodeId>) -> NodeId {
        self.nodes.push(Node { kind, parent });
        NodeId(self.nodes.len() - 1)
    }

    // -----------------------------------------------------------------------
    // Node construction (detached until pushed)
    // -----------------------------------------------------------------------

    pub fn new_primitive(&mut self, tag: Tag, value: Vec<u8>) -> NodeId {
        self.alloc(Kind::Primitive { tag, value }, None)
    }

    pub fn new_constructed(&mut self, tag: Tag) -> NodeId {
        self.alloc(
            Kind::Constructed {
                tag,
                children: Vec::new(),
            },
            None,
        )
    }

    pub fn new_oid(&mut self, oid: &Oid) -> NodeId {
        self.new_primitive(Tag::OID, oid.to_der_value())
    }

    pub fn new_uint(&mut self, value: u64) -> NodeId {
        let mut enc = cmskit_utils::asn1::Encoder::new();
        enc.write_uint(value);
        let der = enc.finish();
        // INTEGER header is always two octets for u64 values
        self.new_primitive(Tag::INTEGER, der[2..].to_vec())
    }

    pub fn new_octets(&mut self, value: &[u8]) -> NodeId {
        self.new_primitive(Tag::OCTET_STRING, value.to_vec())
    }

    /// Add a complete encoded element as a detached parsed subtree.
    pub fn graft(&mut self, der: &[u8]) -> Result<NodeId, CmsError> {
        let len = element_len(der, 0).map_err(CmsError::decode)?;
        if len != der.len() {
            return Err(CmsError::decode("trailing data after element"));
        }
        let header = Header::parse(der).map_err(CmsError::decode)?;
        self.bufs.push(der.to_vec());
        Ok(self.alloc(
            Kind::Parsed {
                tag: header.tag,
                buf: self.bufs.len() - 1,
                start: 0,
                end: len,
                children: None,
            },
            None,
        ))
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    fn materialize(&mut self, id: NodeId) -> Result<(), CmsError> {
        let (tag, buf, start, end) = match &self.nodes[id.0].kind {
            Kind::Parsed {
                tag,
                buf,
                start,
                end,
                children: None,
            } => (*tag, *buf, *start, *end),
            _ => return Ok(()),
        };

        let mut spans = Vec::new();
        if tag.constructed {
            let raw = &self.bufs[buf][start..end];
            let header = Header::parse(raw).map_err(CmsError::decode)?;
            let content_start = start + header.header_len;
            let content_end = match header.content_len {
                Some(len) => content_start + len,
                // end-of-contents octets close the value
                None => end - 2,
            };
            let mut dec = Decoder::new(&self.bufs[buf][content_start..content_end]);
            while !dec.is_empty() {
                let from = dec.position();
                let tlv = dec.read_tlv().map_err(CmsError::decode)?;
                spans.push((tlv.tag, content_start + from, content_start + dec.position()));
            }
        }
        trace!(node = id.0, children = spans.len(), "materialized node");

        let children: Vec<NodeId> = spans
            .into_iter()
            .map(|(tag, start, end)| {
                self.alloc(
                    Kind::Parsed {
                        tag,
                        buf,
                        start,
                        end,
                        children: None,
                    },
                    Some(id),
                )
            })
            .collect();
        if let Kind::Parsed { children: slot, .. } = &mut self.nodes[id.0].kind {
            *slot = Some(children);
        }
        Ok(())
    }

    /// Children of `id`, decoding them on first access.
    pub fn children(&mut self, id: NodeId) -> Result<Vec<NodeId>, CmsError> {
        self.materialize(id)?;
        Ok(match &self.nodes[id.0].kind {
            Kind::Primitive { .. } => Vec::new(),
            Kind::Constructed { children, .. } => children.clone(),
            Kind::Parsed { children, .. } => children.clone().unwrap_or_default(),
        })
    }

    pub fn child(&mut self, id: NodeId, index: usize) -> Result<Option<NodeId>, CmsError> {
        Ok(self.children(id)?.get(index).copied())
    }

    /// Child at `index`, or an `UnexpectedStructure` error naming `what`.
    pub fn expect_child(&mut self, id: NodeId, index: usize, what: &str) -> Result<NodeId, CmsError> {
        self.child(id, index)?
            .ok_or_else(|| CmsError::structure(format!("missing {what}")))
    }

    /// First child whose tag satisfies `pred`.
    pub fn find_child(
        &mut self,
        id: NodeId,
        pred: impl Fn(&Tag) -> bool,
    ) -> Result<Option<NodeId>, CmsError> {
        Ok(self
            .children(id)?
            .into_iter()
            .find(|c| pred(&self.tag(*c))))
    }

    /// Position of `id` among its parent's children.
    pub fn index_in_parent(&mut self, id: NodeId) -> Result<Option<usize>, CmsError> {
        match self.parent(id) {
            Some(p) => Ok(self.children(p)?.iter().position(|c| *c == id)),
            None => Ok(None),
        }
    }

    // -----------------------------------------------------------------------
    // Values
    // -----------------------------------------------------------------------

    /// Content octets of `id` as stored (the concatenated child encodings for
    /// constructed nodes).
    pub fn content(&self, id: NodeId) -> Result<Vec<u8>, CmsError> {
        match &self.nodes[id.0].kind {
            Kind::Primitive { value, .. } => Ok(value.clone()),
            Kind::Constructed { children, .. } => {
                Ok(children.iter().flat_map(|c| self.encode(*c)).collect())
            }
            Kind::Parsed {
                buf, start, end, ..
            } => {
                let tlv = Decoder::new(&self.bufs[*buf][*start..*end])
                    .read_tlv()
                    .map_err(CmsError::decode)?;
                Ok(tlv.value.to_vec())
            }
        }
    }

    /// String octets of `id`, joining BER constructed segments whatever the
    /// outer (possibly implicit) tag is.
    pub fn octets(&mut self, id: NodeId) -> Result<Vec<u8>, CmsError> {
        if !self.tag(id).constructed {
            return self.content(id);
        }
        let mut out = Vec::new();
        for seg in self.children(id)? {
            if !self.tag(seg).is_universal(0x04) {
                return Err(CmsError::decode("constructed string segment is not an OCTET STRING"));
            }
            out.extend_from_slice(&self.octets(seg)?);
        }
        Ok(out)
    }

    pub fn oid(&self, id: NodeId) -> Result<Oid, CmsError> {
        if !self.tag(id).is_universal(0x06) {
            return Err(CmsError::structure("expected OBJECT IDENTIFIER"));
        }
        Oid::from_der_value(&self.content(id)?).map_err(CmsError::decode)
    }

    /// Small non-negative INTEGER value.
    pub fn uint(&self, id: NodeId) -> Result<u32, CmsError> {
        if !self.tag(id).is_universal(0x02) {
            return Err(CmsError::structure("expected INTEGER"));
        }
        let value = self.content(id)?;
        let digits = match value.iter().position(|&b| b != 0) {
            Some(i) => &value[i..],
            None => &[][..],
        };
        if value.first().is_some_and(|b| b & 0x80 != 0) || digits.len() > 4 {
            return Err(CmsError::structure("INTEGER out of range"));
        }
        Ok(digits.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b)))
    }

    // -----------------------------------------------------------------------
    // Encoding
    // -----------------------------------------------------------------------

    /// Encoding of the subtree at `id`. Clean parsed nodes reproduce their
    /// input bytes; authored nodes are DER-encoded from their children.
    pub fn encode(&self, id: NodeId) -> Vec<u8> {
        match &self.nodes[id.0].kind {
            Kind::Primitive { tag, value } => encode_element(tag, value),
            Kind::Constructed { tag, children } => {
                let body: Vec<u8> = children.iter().flat_map(|c| self.encode(*c)).collect();
                encode_element(tag, &body)
            }
            Kind::Parsed {
                buf, start, end, ..
            } => self.bufs[*buf][*start..*end].to_vec(),
        }
    }

    pub fn encoded(&self) -> Vec<u8> {
        self.encode(self.root)
    }

    /// True when `id` still holds its original encoding.
    pub fn has_encoded(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0].kind, Kind::Parsed { .. })
    }

    /// Re-parse the whole tree from its current encoding, dropping detached
    /// nodes and stale buffers. Idempotent.
    pub fn realize(&mut self) -> Result<(), CmsError> {
        // edits always reach the root, so a parsed root means nothing changed
        if self.has_encoded(self.root) {
            return Ok(());
        }
        let der = self.encoded();
        *self = Tree::from_der(&der)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Editing
    // -----------------------------------------------------------------------

    /// Turn a parsed node into its authored equivalent.
    fn author(&mut self, id: NodeId) -> Result<(), CmsError> {
        if !self.has_encoded(id) {
            return Ok(());
        }
        let tag = self.tag(id);
        let kind = if tag.constructed {
            Kind::Constructed {
                tag,
                children: self.children(id)?,
            }
        } else {
            Kind::Primitive {
                tag,
                value: self.content(id)?,
            }
        };
        self.nodes[id.0].kind = kind;
        Ok(())
    }

    /// Drop the cached encodings of `id` and all of its ancestors.
    fn invalidate(&mut self, id: NodeId) -> Result<(), CmsError> {
        let mut cur = Some(id);
        while let Some(node) = cur {
            self.author(node)?;
            cur = self.nodes[node.0].parent;
        }
        Ok(())
    }

    fn children_mut(&mut self, id: NodeId) -> Result<&mut Vec<NodeId>, CmsError> {
        match &mut self.nodes[id.0].kind {
            Kind::Constructed { children, .. } => Ok(children),
            _ => Err(CmsError::structure("node is not constructed")),
        }
    }

    fn adopt(&mut self, parent: NodeId, child: NodeId) -> Result<(), CmsError> {
        if self.nodes[child.0].parent.is_some() || child == self.root {
            return Err(CmsError::structure("node is already attached"));
        }
        self.nodes[child.0].parent = Some(parent);
        Ok(())
    }

    pub fn push(&mut self, parent: NodeId, child: NodeId) -> Result<(), CmsError> {
        self.invalidate(parent)?;
        self.children_mut(parent)?;
        self.adopt(parent, child)?;
        self.children_mut(parent)?.push(child);
        Ok(())
    }

    pub fn insert(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<(), CmsError> {
        self.invalidate(parent)?;
        if index > self.children_mut(parent)?.len() {
            return Err(CmsError::structure("insert position out of range"));
        }
        self.adopt(parent, child)?;
        self.children_mut(parent)?.insert(index, child);
        Ok(())
    }

    /// Detach and return the child at `index`.
    pub fn remove(&mut self, parent: NodeId, index: usize) -> Result<NodeId, CmsError> {
        self.invalidate(parent)?;
        let children = self.children_mut(parent)?;
        if index >= children.len() {
            return Err(CmsError::structure("remove position out of range"));
        }
        let child = children.remove(index);
        self.nodes[child.0].parent = None;
        Ok(child)
    }

    /// Put the detached node `new` where `old` is; `old` becomes detached.
    pub fn replace(&mut self, old: NodeId, new: NodeId) -> Result<(), CmsError> {
        match self.parent(old) {
            None => {
                if old != self.root || self.nodes[new.0].parent.is_some() {
                    return Err(CmsError::structure("cannot replace a detached node"));
                }
                self.root = new;
                Ok(())
            }
            Some(parent) => {
                let index = self
                    .index_in_parent(old)?
                    .ok_or_else(|| CmsError::structure("node not found in parent"))?;
                self.remove(parent, index)?;
                self.insert(parent, index, new)
            }
        }
    }

    /// Replace the content of a primitive node.
    pub fn set_content(&mut self, id: NodeId, value: Vec<u8>) -> Result<(), CmsError> {
        self.invalidate(id)?;
        match &mut self.nodes[id.0].kind {
            Kind::Primitive { value: slot, .. } => {
                *slot = value;
                Ok(())
            }
            _ => Err(CmsError::structure("node is not primitive")),
        }
    }

    /// Reorder the children of a SET OF node into DER order. Leaves the
    /// node untouched when already sorted.
    pub fn sort_children(&mut self, id: NodeId) -> Result<(), CmsError> {
        let kids = self.children(id)?;
        let mut keyed: Vec<(Vec<u8>, NodeId)> = kids.iter().map(|k| (self.encode(*k), *k)).collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        if keyed.iter().map(|(_, k)| *k).eq(kids.iter().copied()) {
            return Ok(());
        }
        for _ in 0..kids.len() {
            self.remove(id, 0)?;
        }
        for (_, k) in keyed {
            self.push(id, k)?;
        }
        Ok(())
    }

    /// Change the tag of `id`, keeping its content and form.
    pub fn retag(&mut self, id: NodeId, new_tag: Tag) -> Result<(), CmsError> {
        if new_tag.constructed != self.tag(id).constructed {
            return Err(CmsError::structure("retag cannot change the encoding form"));
        }
        self.invalidate(id)?;
        match &mut self.nodes[id.0].kind {
            Kind::Primitive { tag, .. } | Kind::Constructed { tag, .. } => *tag = new_tag,
            Kind::Parsed { .. } => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmskit_utils::asn1::TagClass;
    use proptest::prelude::*;

    // SEQUENCE { INTEGER 1, SEQUENCE { OID 1.2.3, OCTET STRING "ab" } }
    const SAMPLE: &str = "300d020101300806022a0304026162";

    #[test]
    fn test_lazy_parse_roundtrip() {
        let der = hex::decode(SAMPLE).unwrap();
        let tree = Tree::from_der(&der).unwrap();
        assert_eq!(tree.nodes.len(), 1);
        assert_eq!(tree.encoded(), der);
        assert!(tree.has_encoded(tree.root()));
    }

    #[test]
    fn test_navigation() {
        let der = hex::decode(SAMPLE).unwrap();
        let mut tree = Tree::from_der(&der).unwrap();
        let root = tree.root();
        let kids = tree.children(root).unwrap();
        assert_eq!(kids.len(), 2);
        assert_eq!(tree.uint(kids[0]).unwrap(), 1);

        let inner = tree.children(kids[1]).unwrap();
        assert_eq!(tree.oid(inner[0]).unwrap(), Oid::new(&[1, 2, 3]));
        assert_eq!(tree.octets(inner[1]).unwrap(), b"ab");
        assert_eq!(tree.depth(inner[1]), 2);
        assert_eq!(tree.parent(inner[1]), Some(kids[1]));
        assert!(tree.child(root, 5).unwrap().is_none());
        assert!(tree.expect_child(root, 5, "thing").is_err());
    }

    #[test]
    fn test_mutation_invalidates_ancestors() {
        let der = hex::decode(SAMPLE).unwrap();
        let mut tree = Tree::from_der(&der).unwrap();
        let root = tree.root();
        let seq = tree.child(root, 1).unwrap().unwrap();
        let octets = tree.child(seq, 1).unwrap().unwrap();
        let first = tree.child(root, 0).unwrap().unwrap();

        tree.set_content(octets, b"xyz".to_vec()).unwrap();
        assert!(!tree.has_encoded(octets));
        assert!(!tree.has_encoded(seq));
        assert!(!tree.has_encoded(root));
        // siblings keep their encoding
        assert!(tree.has_encoded(first));
        assert_eq!(
            hex::encode(tree.encoded()),
            "300e020101300906022a03040378797a"
        );
    }

    #[test]
    fn test_push_remove_replace() {
        let mut tree = Tree::new(Tag::SET);
        let root = tree.root();
        let a = tree.new_uint(2);
        let b = tree.new_uint(1);
        tree.push(root, a).unwrap();
        tree.insert(root, 0, b).unwrap();
        assert_eq!(hex::encode(tree.encoded()), "3106020101020102");
        assert!(tree.push(root, a).is_err());

        let c = tree.new_octets(b"z");
        tree.replace(b, c).unwrap();
        assert_eq!(hex::encode(tree.encoded()), "31060401 7a020102".replace(' ', ""));

        let removed = tree.remove(root, 0).unwrap();
        assert_eq!(removed, c);
        assert_eq!(tree.parent(c), None);
        assert_eq!(hex::encode(tree.encoded()), "3103020102");
        assert!(tree.remove(root, 3).is_err());
    }

    #[test]
    fn test_retag() {
        let der = hex::decode(SAMPLE).unwrap();
        let mut tree = Tree::from_der(&der).unwrap();
        let root = tree.root();
        let seq = tree.child(root, 1).unwrap().unwrap();
        tree.retag(seq, Tag::context(0, true)).unwrap();
        assert_eq!(tree.tag(seq).class, TagClass::ContextSpecific);
        assert_eq!(tree.encoded()[5], 0xa0);
        assert!(tree.retag(seq, Tag::OCTET_STRING).is_err());
    }

    #[test]
    fn test_sort_children() {
        // SET { INTEGER 3, OCTET STRING "a", INTEGER 1 }
        let der = hex::decode("310902010304016102 0101".replace(' ', "")).unwrap();
        let mut tree = Tree::from_der(&der).unwrap();
        let root = tree.root();
        tree.sort_children(root).unwrap();
        assert_eq!(hex::encode(tree.encoded()), "3109020101020103040161");

        // already sorted: the cached encoding survives
        let mut sorted = Tree::from_der(&tree.encoded()).unwrap();
        let root = sorted.root();
        sorted.sort_children(root).unwrap();
        assert!(sorted.has_encoded(root));
    }

    #[test]
    fn test_ber_indefinite_kept_until_edited() {
        // SEQUENCE (indefinite) { [0] constructed OCTET STRING segments "ab" "c" }
        let ber = hex::decode("3080a0800402616204016300000000").unwrap();
        let mut tree = Tree::from_der(&ber).unwrap();
        assert_eq!(tree.encoded(), ber);

        let root = tree.root();
        let body = tree.child(root, 0).unwrap().unwrap();
        assert_eq!(tree.octets(body).unwrap(), b"abc");

        let extra = tree.new_uint(7);
        tree.push(root, extra).unwrap();
        // the edited root is re-encoded with a definite length
        let mut expected = vec![0x30, 0x0e];
        expected.extend_from_slice(&ber[2..ber.len() - 2]);
        expected.extend_from_slice(&[0x02, 0x01, 0x07]);
        assert_eq!(tree.encoded(), expected);
    }

    #[test]
    fn test_reject_trailing_data() {
        assert!(Tree::from_der(&[0x05, 0x00, 0x00]).is_err());
        assert!(Tree::from_der(&[0x30, 0x05, 0x02]).is_err());
    }

    #[test]
    fn test_realize_idempotent() {
        let mut tree = Tree::new(Tag::SEQUENCE);
        let root = tree.root();
        let oid = tree.new_oid(&Oid::new(&[1, 2, 840, 113549, 1, 7, 1]));
        tree.push(root, oid).unwrap();
        assert!(!tree.has_encoded(root));

        tree.realize().unwrap();
        let first = tree.encoded();
        assert!(tree.has_encoded(tree.root()));
        tree.realize().unwrap();
        assert_eq!(tree.encoded(), first);
    }

    #[test]
    fn test_realize_reclaims_arena() {
        let mut e = cmskit_utils::asn1::Encoder::new();
        e.write_octet_string(b"seed");
        let mut inner = cmskit_utils::asn1::Encoder::new();
        inner.write_sequence(&e.finish());
        let mut tree = Tree::from_der(&inner.finish()).unwrap();
        let root = tree.root();
        assert!(tree.child(root, 0).unwrap().is_some());
        tree.realize().unwrap();
        let baseline = (tree.nodes.len(), tree.bufs.len());

        for round in 0u8..50 {
            let root = tree.root();
            let leaf = tree.child(root, 0).unwrap().unwrap();
            tree.set_content(leaf, vec![round; 4]).unwrap();
            let extra = tree.graft(&[0x04, 0x01, round]).unwrap();
            tree.push(root, extra).unwrap();
            tree.remove(root, 1).unwrap();
            assert!(tree.nodes.len() > baseline.0);
            tree.realize().unwrap();
            assert_eq!(tree.bufs.len(), 1);
            assert!(tree.nodes.len() <= baseline.0);
        }
        let root = tree.root();
        let leaf_now = tree.child(root, 0).unwrap().unwrap();
        assert_eq!(tree.octets(leaf_now).unwrap(), vec![49u8; 4]);
    }

    fn arb_node() -> impl Strategy<Value = Vec<u8>> {
        let leaf = prop::collection::vec(any::<u8>(), 0..20).prop_map(|v| {
            let mut e = cmskit_utils::asn1::Encoder::new();
            e.write_octet_string(&v);
            e.finish()
        });
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop::collection::vec(inner, 0..4).prop_map(|kids| {
                let mut e = cmskit_utils::asn1::Encoder::new();
                e.write_sequence(&kids.concat());
                e.finish()
            })
        })
    }

    proptest! {
        #[test]
        fn prop_realize_idempotent(der in arb_node(), payload in prop::collection::vec(any::<u8>(), 0..8)) {
            let mut tree = Tree::from_der(&der).unwrap();
            let root = tree.root();
            if tree.tag(root).constructed {
                let leaf = tree.new_octets(&payload);
                tree.push(root, leaf).unwrap();
            }
            tree.realize().unwrap();
            let once = tree.encoded();
            tree.realize().unwrap();
            prop_assert_eq!(tree.encoded(), once);
        }

        #[test]
        fn prop_untouched_tree_reencodes_input(der in arb_node()) {
            let mut tree = Tree::from_der(&der).unwrap();
            let root = tree.root();
            // visiting children must not change the encoding
            for c in tree.children(root).unwrap() {
                let _ = tree.children(c).unwrap();
            }
            prop_assert_eq!(tree.encoded(), der);
        }
    }
}
