//! # UnixFS DAG Builder
//!
//! Recomputes locally the CIDv0 an IPFS node assigns when a single file is
//! added with `cid-version=0` and `wrap-with-directory=true`, so stored
//! content can be verified without trusting the node.
//!
//! ## Layout
//!
//! - Content is cut into fixed 256 KiB chunks. Each chunk becomes a dag-pb
//!   leaf whose UnixFS payload is `File` with the chunk inline.
//! - Leaves are grouped into parents of at most 174 links, level by level,
//!   until one root remains (balanced layout). A file of one chunk is its
//!   own root. Parents carry `filesize` and one `blocksizes` entry per child.
//! - The root is wrapped in a `Directory` node with a single named link.
//!
//! Every link records the child's cumulative size: its encoded block length
//! plus the cumulative sizes of its own links.
//!
//! dag-pb serialises `Links` (field 2) before `Data` (field 1), which is
//! why blocks are assembled by hand instead of through a derived message.

use cid::Cid;
use multihash::Multihash;
use prost::encoding::{encode_key, encode_varint, message, WireType};
use prost::Message;
use sha2::{Digest, Sha256};

use crate::error::StorageError;

/// Chunk size used by the IPFS default chunker.
pub const CHUNK_SIZE: usize = 262_144;

/// Maximum links per node in the balanced layout.
pub const MAX_LINKS: usize = 174;

/// Multicodec code of sha2-256.
const SHA2_256: u64 = 0x12;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
enum NodeKind {
    Raw = 0,
    Directory = 1,
    File = 2,
}

/// UnixFS `Data` message.
#[derive(Clone, PartialEq, Message)]
struct UnixFsData {
    #[prost(enumeration = "NodeKind", required, tag = "1")]
    kind: i32,
    #[prost(bytes = "vec", optional, tag = "2")]
    data: Option<Vec<u8>>,
    #[prost(uint64, optional, tag = "3")]
    filesize: Option<u64>,
    #[prost(uint64, repeated, packed = "false", tag = "4")]
    blocksizes: Vec<u64>,
}

/// dag-pb `PBLink` message.
#[derive(Clone, PartialEq, Message)]
struct PbLink {
    #[prost(bytes = "vec", optional, tag = "1")]
    hash: Option<Vec<u8>>,
    #[prost(string, optional, tag = "2")]
    name: Option<String>,
    #[prost(uint64, optional, tag = "3")]
    tsize: Option<u64>,
}

/// A built node: its multihash and the sizes its parent needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DagNode {
    multihash: Multihash<64>,
    file_size: u64,
    cumulative_size: u64,
}

impl DagNode {
    /// Bytes of file content below this node.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Encoded size of this node and everything it links to.
    pub fn cumulative_size(&self) -> u64 {
        self.cumulative_size
    }

    /// CIDv0 of the node.
    pub fn cid_v0(&self) -> Result<String, StorageError> {
        Cid::new_v0(self.multihash)
            .map(|cid| cid.to_string())
            .map_err(|e| StorageError::ContentIdentifier(e.to_string()))
    }
}

/// CIDv0 of `content` added as `filename` inside a wrapping directory.
pub fn wrapped_cid_v0(content: &[u8], filename: &str) -> Result<String, StorageError> {
    let file = file_root(content)?;
    directory(&[(filename, &file)])?.cid_v0()
}

/// CIDv0 of `content` added as a bare file.
pub fn file_cid_v0(content: &[u8]) -> Result<String, StorageError> {
    file_root(content)?.cid_v0()
}

/// Build the balanced DAG for `content` and return its root.
pub fn file_root(content: &[u8]) -> Result<DagNode, StorageError> {
    let mut level = if content.is_empty() {
        vec![leaf(&[])?]
    } else {
        content
            .chunks(CHUNK_SIZE)
            .map(leaf)
            .collect::<Result<Vec<_>, _>>()?
    };

    while level.len() > 1 {
        level = level
            .chunks(MAX_LINKS)
            .map(parent)
            .collect::<Result<Vec<_>, _>>()?;
    }

    level
        .pop()
        .ok_or_else(|| StorageError::ContentIdentifier("empty DAG level".into()))
}

fn leaf(chunk: &[u8]) -> Result<DagNode, StorageError> {
    let size = chunk.len() as u64;
    let data = UnixFsData {
        kind: NodeKind::File as i32,
        data: (!chunk.is_empty()).then(|| chunk.to_vec()),
        filesize: Some(size),
        blocksizes: Vec::new(),
    };
    build(&[], &data, size, 0)
}

fn parent(children: &[DagNode]) -> Result<DagNode, StorageError> {
    let file_size = children.iter().map(|c| c.file_size).sum();
    let data = UnixFsData {
        kind: NodeKind::File as i32,
        data: None,
        filesize: Some(file_size),
        blocksizes: children.iter().map(|c| c.file_size).collect(),
    };
    let links: Vec<PbLink> = children.iter().map(|c| link("", c)).collect();
    let linked = children.iter().map(|c| c.cumulative_size).sum();
    build(&links, &data, file_size, linked)
}

fn directory(entries: &[(&str, &DagNode)]) -> Result<DagNode, StorageError> {
    let data = UnixFsData {
        kind: NodeKind::Directory as i32,
        data: None,
        filesize: None,
        blocksizes: Vec::new(),
    };
    let links: Vec<PbLink> = entries.iter().map(|(name, node)| link(name, node)).collect();
    let linked = entries.iter().map(|(_, node)| node.cumulative_size).sum();
    build(&links, &data, 0, linked)
}

fn link(name: &str, child: &DagNode) -> PbLink {
    PbLink {
        hash: Some(child.multihash.to_bytes()),
        name: Some(name.to_string()),
        tsize: Some(child.cumulative_size),
    }
}

fn build(
    links: &[PbLink],
    data: &UnixFsData,
    file_size: u64,
    linked_size: u64,
) -> Result<DagNode, StorageError> {
    let block = encode_block(links, &data.encode_to_vec());
    let multihash = Multihash::<64>::wrap(SHA2_256, &Sha256::digest(&block))
        .map_err(|e| StorageError::ContentIdentifier(e.to_string()))?;
    Ok(DagNode {
        multihash,
        file_size,
        cumulative_size: block.len() as u64 + linked_size,
    })
}

fn encode_block(links: &[PbLink], data: &[u8]) -> Vec<u8> {
    let mut block = Vec::with_capacity(data.len() + links.len() * 48 + 8);
    for l in links {
        message::encode(2, l, &mut block);
    }
    encode_key(1, WireType::LengthDelimited, &mut block);
    encode_varint(data.len() as u64, &mut block);
    block.extend_from_slice(data);
    block
}
