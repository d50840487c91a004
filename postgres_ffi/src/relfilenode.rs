use crate::Oid;
use bytes::Buf;

/// Identifies the physical file a block belongs to: tablespace, database and
/// relation OID. Ordered lexicographically on `(spcnode, dbnode, relnode)`
/// so a `RelFileSet` can keep its table list sorted and binary-search it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelFileNode {
    pub spcnode: Oid,
    pub dbnode: Oid,
    pub relnode: Oid,
}

impl RelFileNode {
    /// `relnode == 0` never identifies a real relation; callers use this to
    /// recognize "no relation" placeholders in record bodies that don't
    /// always carry one (e.g. some xlog-rmgr records).
    pub fn is_valid(&self) -> bool {
        self.relnode != 0
    }

    pub fn decode(buf: &mut impl Buf) -> Self {
        RelFileNode {
            spcnode: buf.get_u32_le(),
            dbnode: buf.get_u32_le(),
            relnode: buf.get_u32_le(),
        }
    }

    pub fn encode(&self, buf: &mut impl bytes::BufMut) {
        buf.put_u32_le(self.spcnode);
        buf.put_u32_le(self.dbnode);
        buf.put_u32_le(self.relnode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bytes() {
        let node = RelFileNode { spcnode: 1663, dbnode: 16384, relnode: 16385 };
        let mut buf = Vec::new();
        node.encode(&mut buf);
        assert_eq!(buf.len(), 12);
        let mut slice = &buf[..];
        assert_eq!(RelFileNode::decode(&mut slice), node);
    }

    #[test]
    fn orders_lexicographically_by_field_order() {
        let a = RelFileNode { spcnode: 1, dbnode: 5, relnode: 9 };
        let b = RelFileNode { spcnode: 1, dbnode: 6, relnode: 0 };
        assert!(a < b);
    }

    #[test]
    fn zero_relnode_is_invalid() {
        let node = RelFileNode { spcnode: 1663, dbnode: 0, relnode: 0 };
        assert!(!node.is_valid());
    }
}
