//! On-disk filter format: fixed 256-bit header + packed bit data.
//!
//! All header integers are little-endian. The data section is the backing
//! words in index order, each written little-endian, which lays the bits
//! out LSB-first within every byte. Total file length is exactly
//! `32 + bits / 8` bytes.

use byteorder::{LittleEndian as LE, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use crate::bitvec::BitVector;
use crate::directory::{BinningDirectory, FilterError, Layout};
use crate::geometry::Geometry;

/// Size in bits of the metadata header.
pub const FILTER_METADATA_BITS: u64 = 256;

const HEADER_BYTES: u64 = FILTER_METADATA_BITS / 8;

const LAYOUT_TAG_BLOOM: u32 = 0;
const LAYOUT_TAG_DIRECT: u32 = 1;

/// The fixed 256-bit filter header.
#[derive(Clone, Copy, Debug)]
struct FilterHeader {
    layout_tag: u32,
    bins: u32,
    hash_funcs: u16,
    kmer_size: u16,
    bits: u64,
    block_bit_size: u64,
}

impl FilterHeader {
    fn for_directory(bd: &BinningDirectory) -> Self {
        let (layout_tag, hash_funcs) = match bd.layout() {
            Layout::Bloom { hash_funcs } => (LAYOUT_TAG_BLOOM, hash_funcs),
            Layout::Direct => (LAYOUT_TAG_DIRECT, 0),
        };
        FilterHeader {
            layout_tag,
            bins: bd.bins(),
            hash_funcs,
            kmer_size: bd.kmer_size(),
            bits: bd.bits(),
            block_bit_size: bd.geometry().block_bit_size,
        }
    }

    fn write_to<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_u32::<LE>(self.layout_tag)?;
        w.write_u32::<LE>(self.bins)?;
        w.write_u16::<LE>(self.hash_funcs)?;
        w.write_u16::<LE>(self.kmer_size)?;
        w.write_u64::<LE>(self.bits)?;
        w.write_u64::<LE>(self.block_bit_size)?;
        // Pad the header to its fixed 256 bits.
        w.write_u32::<LE>(0)?;
        Ok(())
    }

    fn read_from<R: Read>(r: &mut R) -> std::io::Result<Self> {
        let layout_tag = r.read_u32::<LE>()?;
        let bins = r.read_u32::<LE>()?;
        let hash_funcs = r.read_u16::<LE>()?;
        let kmer_size = r.read_u16::<LE>()?;
        let bits = r.read_u64::<LE>()?;
        let block_bit_size = r.read_u64::<LE>()?;
        let _reserved = r.read_u32::<LE>()?;
        Ok(FilterHeader {
            layout_tag,
            bins,
            hash_funcs,
            kmer_size,
            bits,
            block_bit_size,
        })
    }

    fn layout(&self) -> Result<Layout, FilterError> {
        match self.layout_tag {
            LAYOUT_TAG_BLOOM => {
                if !(1..=5).contains(&self.hash_funcs) {
                    return Err(FilterError::Format(format!(
                        "stored hash_funcs {} is out of the 1..=5 range",
                        self.hash_funcs
                    )));
                }
                Ok(Layout::Bloom {
                    hash_funcs: self.hash_funcs,
                })
            }
            LAYOUT_TAG_DIRECT => Ok(Layout::Direct),
            tag => Err(FilterError::Format(format!("unknown layout tag {tag}"))),
        }
    }
}

impl BinningDirectory {
    /// Write the directory to `path`: the 256-bit header followed by the
    /// raw packed bit data, uncompressed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), FilterError> {
        let file = File::create(path.as_ref())?;
        let mut w = BufWriter::new(file);
        FilterHeader::for_directory(self).write_to(&mut w)?;
        let words = self.bitvector().snapshot();
        w.write_all(bytemuck::cast_slice::<u64, u8>(&words))?;
        w.flush()?;
        Ok(())
    }

    /// Load a directory from `path` via a memory map.
    ///
    /// Fails with [`FilterError::Format`] if the file length does not
    /// match the header or the header is internally inconsistent, and
    /// with [`FilterError::Io`] if the file is unreadable.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FilterError> {
        let file = File::open(path.as_ref())?;
        let map = unsafe { memmap2::MmapOptions::new().map(&file)? };
        if (map.len() as u64) < HEADER_BYTES {
            return Err(FilterError::Format(
                "file shorter than the 256-bit header".into(),
            ));
        }
        let header = FilterHeader::read_from(&mut &map[..HEADER_BYTES as usize])?;
        let layout = header.layout()?;

        let expected = HEADER_BYTES + header.bits.div_ceil(8);
        if map.len() as u64 != expected {
            return Err(FilterError::Format(format!(
                "file length {} does not match the expected {expected} bytes",
                map.len()
            )));
        }
        let derived = Geometry::new(header.bins, header.hash_funcs, header.kmer_size, header.bits);
        if derived.block_bit_size != header.block_bit_size {
            return Err(FilterError::Format(format!(
                "stored block size {} contradicts the {}-bin geometry",
                header.block_bit_size, header.bins
            )));
        }

        let words: &[u64] = bytemuck::try_cast_slice(&map[HEADER_BYTES as usize..])
            .map_err(|e| FilterError::Format(format!("misaligned bit data: {e:?}")))?;
        let bitvector = BitVector::from_words(header.bits, words)?;
        BinningDirectory::from_parts(layout, header.bins, header.kmer_size, header.bits, bitvector)
    }
}
