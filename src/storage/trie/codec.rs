//! Canonical node serialization.
//!
//! The node wire format must be deterministic byte-for-byte because node
//! hashes are computed over it and the root hash participates in consensus.
//! The format is a tagged union with big-endian length prefixes; branch
//! children are emitted in ascending slot order.

use array_init::array_init;

use super::node::{Node, RADIX};
use super::TrieError;

const TAG_LEAF: u8 = 1;
const TAG_EXTENSION: u8 = 2;
const TAG_BRANCH: u8 = 3;

/// Serialize a node into its canonical byte representation
pub fn encode_node(node: &Node) -> Vec<u8> {
    match node {
        Node::Leaf { path, value } => {
            let mut out = Vec::with_capacity(1 + 2 + path.len() + 4 + value.len());
            out.push(TAG_LEAF);
            out.extend_from_slice(&(path.len() as u16).to_be_bytes());
            out.extend_from_slice(path);
            out.extend_from_slice(&(value.len() as u32).to_be_bytes());
            out.extend_from_slice(value);
            out
        }
        Node::Extension { path, child } => {
            let mut out = Vec::with_capacity(1 + 2 + path.len() + 1 + child.len());
            out.push(TAG_EXTENSION);
            out.extend_from_slice(&(path.len() as u16).to_be_bytes());
            out.extend_from_slice(path);
            out.push(child.len() as u8);
            out.extend_from_slice(child);
            out
        }
        Node::Branch { children } => {
            let count = children.iter().filter(|c| c.is_some()).count() as u16;
            let mut out = Vec::with_capacity(3 + count as usize * 22);
            out.push(TAG_BRANCH);
            out.extend_from_slice(&count.to_be_bytes());
            for (index, child) in children.iter().enumerate() {
                if let Some(hash) = child {
                    out.push(index as u8);
                    out.push(hash.len() as u8);
                    out.extend_from_slice(hash);
                }
            }
            out
        }
    }
}

/// Deserialize a node from its canonical byte representation
pub fn decode_node(data: &[u8]) -> Result<Node, TrieError> {
    let mut r = Reader::new(data);
    let tag = r.read_u8()?;
    let node = match tag {
        TAG_LEAF => {
            let path_len = r.read_u16()? as usize;
            let path = r.read_bytes(path_len)?;
            let value_len = r.read_u32()? as usize;
            let value = r.read_bytes(value_len)?;
            Node::Leaf { path, value }
        }
        TAG_EXTENSION => {
            let path_len = r.read_u16()? as usize;
            let path = r.read_bytes(path_len)?;
            let hash_len = r.read_u8()? as usize;
            let child = r.read_bytes(hash_len)?;
            Node::Extension { path, child }
        }
        TAG_BRANCH => {
            let count = r.read_u16()? as usize;
            if count > RADIX {
                return Err(TrieError::InvalidNodeEncoding(format!(
                    "branch child count {} exceeds radix",
                    count
                )));
            }
            let mut children: [Option<Vec<u8>>; RADIX] = array_init(|_| None);
            let mut prev: Option<u8> = None;
            for _ in 0..count {
                let index = r.read_u8()?;
                if let Some(p) = prev {
                    if index <= p {
                        return Err(TrieError::InvalidNodeEncoding(
                            "branch children out of order".to_string(),
                        ));
                    }
                }
                prev = Some(index);
                let hash_len = r.read_u8()? as usize;
                children[index as usize] = Some(r.read_bytes(hash_len)?);
            }
            Node::Branch { children }
        }
        other => {
            return Err(TrieError::InvalidNodeEncoding(format!(
                "unknown node tag {}",
                other
            )))
        }
    };
    if !r.is_empty() {
        return Err(TrieError::InvalidNodeEncoding(
            "trailing bytes after node".to_string(),
        ));
    }
    Ok(node)
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos == self.data.len()
    }

    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, TrieError> {
        if self.pos + len > self.data.len() {
            return Err(TrieError::InvalidNodeEncoding(
                "truncated node".to_string(),
            ));
        }
        let out = self.data[self.pos..self.pos + len].to_vec();
        self.pos += len;
        Ok(out)
    }

    fn read_u8(&mut self) -> Result<u8, TrieError> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16, TrieError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn read_u32(&mut self) -> Result<u32, TrieError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}
