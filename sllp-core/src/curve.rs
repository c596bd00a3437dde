//! Curves: large datasets transferred in fixed-size blocks.
//!
//! A curve with `nblocks = n` has `n + 1` blocks of [`CURVE_BLOCK_SIZE`]
//! bytes, addressed by a single byte. Block storage belongs to the
//! application and is reached through [`BlockReader`] and [`BlockWriter`].

use crate::error::CoreError;
use crate::variable::UserTag;
use md5::{Digest, Md5};
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::io;
use std::sync::Arc;

/// Size of one curve block in bytes.
pub const CURVE_BLOCK_SIZE: usize = 16384;

/// Size of a curve checksum in bytes.
pub const CURVE_CSUM_SIZE: usize = 16;

/// Protocol id of a curve.
pub type CurveId = u8;

/// MD5 digest over every block of a curve.
pub type Checksum = [u8; CURVE_CSUM_SIZE];

/// Reads curve blocks from application storage.
pub trait BlockReader: Send {
    /// Fills `buf` ([`CURVE_BLOCK_SIZE`] bytes) with block `block`.
    fn read_block(&mut self, block: u8, buf: &mut [u8]) -> io::Result<()>;
}

impl<F> BlockReader for F
where
    F: FnMut(u8, &mut [u8]) -> io::Result<()> + Send,
{
    fn read_block(&mut self, block: u8, buf: &mut [u8]) -> io::Result<()> {
        self(block, buf)
    }
}

/// Writes curve blocks to application storage.
pub trait BlockWriter: Send {
    /// Stores `data` ([`CURVE_BLOCK_SIZE`] bytes) as block `block`.
    fn write_block(&mut self, block: u8, data: &[u8]) -> io::Result<()>;
}

impl<F> BlockWriter for F
where
    F: FnMut(u8, &[u8]) -> io::Result<()> + Send,
{
    fn write_block(&mut self, block: u8, data: &[u8]) -> io::Result<()> {
        self(block, data)
    }
}

/// Description of a curve to register.
#[derive(Default)]
pub struct CurveDef {
    /// Whether clients may write blocks. Requires a writer.
    pub writable: bool,
    /// Highest valid block index.
    pub nblocks: u8,
    /// Initial checksum reported before the first recalculation.
    pub checksum: Checksum,
    pub reader: Option<Box<dyn BlockReader>>,
    /// Must be present exactly when `writable` is set.
    pub writer: Option<Box<dyn BlockWriter>>,
    /// Untouched by the engine.
    pub user: Option<UserTag>,
}

impl CurveDef {
    /// Describes a read-only curve.
    pub fn read_only(nblocks: u8, reader: impl BlockReader + 'static) -> Self {
        Self {
            nblocks,
            reader: Some(Box::new(reader)),
            ..Default::default()
        }
    }

    /// Describes a writable curve.
    pub fn writable(
        nblocks: u8,
        reader: impl BlockReader + 'static,
        writer: impl BlockWriter + 'static,
    ) -> Self {
        Self {
            writable: true,
            nblocks,
            reader: Some(Box::new(reader)),
            writer: Some(Box::new(writer)),
            ..Default::default()
        }
    }

    pub fn with_checksum(mut self, checksum: Checksum) -> Self {
        self.checksum = checksum;
        self
    }

    pub fn with_user(mut self, user: impl Any + Send + Sync) -> Self {
        self.user = Some(Arc::new(user));
        self
    }
}

/// A registered curve.
pub struct Curve {
    id: CurveId,
    writable: bool,
    nblocks: u8,
    checksum: Checksum,
    reader: Box<dyn BlockReader>,
    writer: Option<Box<dyn BlockWriter>>,
    user: Option<UserTag>,
}

impl Curve {
    /// Validates a definition and assigns it `id`.
    pub(crate) fn from_def(id: CurveId, def: CurveDef) -> Result<Self, CoreError> {
        let reader = def
            .reader
            .ok_or_else(|| CoreError::invalid("curve has no block reader"))?;

        match (def.writable, def.writer.is_some()) {
            (true, false) => return Err(CoreError::invalid("writable curve has no block writer")),
            (false, true) => return Err(CoreError::invalid("read-only curve has a block writer")),
            _ => {}
        }

        Ok(Self {
            id,
            writable: def.writable,
            nblocks: def.nblocks,
            checksum: def.checksum,
            reader,
            writer: def.writer,
            user: def.user,
        })
    }

    pub fn id(&self) -> CurveId {
        self.id
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Highest valid block index.
    pub fn nblocks(&self) -> u8 {
        self.nblocks
    }

    /// Number of blocks, `nblocks + 1`.
    pub fn block_count(&self) -> usize {
        self.nblocks as usize + 1
    }

    pub fn has_block(&self, block: u8) -> bool {
        block <= self.nblocks
    }

    /// Checksum as of the last recalculation.
    pub fn checksum(&self) -> &Checksum {
        &self.checksum
    }

    /// Returns the user tag if it is a `T`.
    pub fn user<T: Any>(&self) -> Option<&T> {
        self.user.as_deref()?.downcast_ref()
    }

    pub fn read_block(&mut self, block: u8, buf: &mut [u8]) -> io::Result<()> {
        debug_assert!(self.has_block(block));
        debug_assert_eq!(buf.len(), CURVE_BLOCK_SIZE);
        self.reader.read_block(block, buf)
    }

    /// Fails with `PermissionDenied` on a read-only curve.
    pub fn write_block(&mut self, block: u8, data: &[u8]) -> io::Result<()> {
        debug_assert!(self.has_block(block));
        debug_assert_eq!(data.len(), CURVE_BLOCK_SIZE);
        match self.writer.as_mut() {
            Some(writer) => writer.write_block(block, data),
            None => Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("curve {} is read-only", self.id),
            )),
        }
    }

    /// Reads every block in order, digests them and stores the result.
    ///
    /// On a read failure the previous checksum is kept.
    pub fn recalc_checksum(&mut self) -> io::Result<Checksum> {
        let mut hasher = Md5::new();
        let mut block = vec![0u8; CURVE_BLOCK_SIZE];
        for index in 0..=self.nblocks {
            self.reader.read_block(index, &mut block)?;
            hasher.update(&block);
        }
        self.checksum = hasher.finalize().into();
        Ok(self.checksum)
    }
}

impl fmt::Debug for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Curve")
            .field("id", &self.id)
            .field("writable", &self.writable)
            .field("nblocks", &self.nblocks)
            .field("checksum", &self.checksum)
            .finish_non_exhaustive()
    }
}

/// Curve storage held in memory.
///
/// Clones share the same blocks, so the application can keep one handle
/// while the registry owns the reader and writer halves.
#[derive(Clone)]
pub struct MemoryCurve {
    blocks: Arc<Mutex<Vec<u8>>>,
    nblocks: u8,
}

impl MemoryCurve {
    /// Creates zero-filled storage for `nblocks + 1` blocks.
    pub fn new(nblocks: u8) -> Self {
        let len = (nblocks as usize + 1) * CURVE_BLOCK_SIZE;
        Self {
            blocks: Arc::new(Mutex::new(vec![0u8; len])),
            nblocks,
        }
    }

    pub fn nblocks(&self) -> u8 {
        self.nblocks
    }

    pub fn reader(&self) -> MemoryReader {
        MemoryReader(self.clone())
    }

    pub fn writer(&self) -> MemoryWriter {
        MemoryWriter(self.clone())
    }

    /// Builds a read-only definition backed by this storage.
    pub fn read_only_def(&self) -> CurveDef {
        CurveDef::read_only(self.nblocks, self.reader())
    }

    /// Builds a writable definition backed by this storage.
    pub fn writable_def(&self) -> CurveDef {
        CurveDef::writable(self.nblocks, self.reader(), self.writer())
    }

    /// Returns a copy of one block.
    pub fn block(&self, block: u8) -> Option<Vec<u8>> {
        let range = self.range(block)?;
        Some(self.blocks.lock()[range].to_vec())
    }

    /// Fills one block with `byte`.
    pub fn fill_block(&self, block: u8, byte: u8) -> Option<()> {
        let range = self.range(block)?;
        self.blocks.lock()[range].fill(byte);
        Some(())
    }

    fn range(&self, block: u8) -> Option<std::ops::Range<usize>> {
        if block > self.nblocks {
            return None;
        }
        let start = block as usize * CURVE_BLOCK_SIZE;
        Some(start..start + CURVE_BLOCK_SIZE)
    }

    fn out_of_range(&self, block: u8) -> io::Error {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("block {} beyond last block {}", block, self.nblocks),
        )
    }
}

/// Reading half of a [`MemoryCurve`].
pub struct MemoryReader(MemoryCurve);

impl BlockReader for MemoryReader {
    fn read_block(&mut self, block: u8, buf: &mut [u8]) -> io::Result<()> {
        let range = self.0.range(block).ok_or_else(|| self.0.out_of_range(block))?;
        buf.copy_from_slice(&self.0.blocks.lock()[range]);
        Ok(())
    }
}

/// Writing half of a [`MemoryCurve`].
pub struct MemoryWriter(MemoryCurve);

impl BlockWriter for MemoryWriter {
    fn write_block(&mut self, block: u8, data: &[u8]) -> io::Result<()> {
        let range = self.0.range(block).ok_or_else(|| self.0.out_of_range(block))?;
        self.0.blocks.lock()[range].copy_from_slice(data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_def_read_only() {
        let storage = MemoryCurve::new(3);
        let curve = Curve::from_def(0, storage.read_only_def()).unwrap();

        assert!(!curve.is_writable());
        assert_eq!(curve.nblocks(), 3);
        assert_eq!(curve.block_count(), 4);
        assert!(curve.has_block(3));
        assert!(!curve.has_block(4));
        assert_eq!(curve.checksum(), &[0u8; CURVE_CSUM_SIZE]);
    }

    #[test]
    fn test_from_def_requires_reader() {
        let def = CurveDef {
            nblocks: 1,
            ..Default::default()
        };
        assert!(matches!(
            Curve::from_def(0, def),
            Err(CoreError::InvalidParam { .. })
        ));
    }

    #[test]
    fn test_from_def_writer_pairing() {
        let storage = MemoryCurve::new(0);

        let mut def = storage.read_only_def();
        def.writable = true;
        assert!(Curve::from_def(0, def).is_err());

        let mut def = storage.writable_def();
        def.writable = false;
        assert!(Curve::from_def(0, def).is_err());

        assert!(Curve::from_def(0, storage.writable_def()).is_ok());
    }

    #[test]
    fn test_block_roundtrip_through_storage() {
        let storage = MemoryCurve::new(1);
        let mut curve = Curve::from_def(0, storage.writable_def()).unwrap();

        curve.write_block(1, &vec![0x42; CURVE_BLOCK_SIZE]).unwrap();
        assert_eq!(storage.block(1).unwrap(), vec![0x42; CURVE_BLOCK_SIZE]);
        assert_eq!(storage.block(0).unwrap(), vec![0x00; CURVE_BLOCK_SIZE]);

        let mut buf = vec![0u8; CURVE_BLOCK_SIZE];
        curve.read_block(1, &mut buf).unwrap();
        assert_eq!(buf, vec![0x42; CURVE_BLOCK_SIZE]);
    }

    #[test]
    fn test_write_read_only_curve() {
        let storage = MemoryCurve::new(0);
        let mut curve = Curve::from_def(0, storage.read_only_def()).unwrap();

        let err = curve
            .write_block(0, &vec![0x01; CURVE_BLOCK_SIZE])
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_checksum_is_md5_of_all_blocks() {
        let storage = MemoryCurve::new(1);
        storage.fill_block(0, 0x01).unwrap();
        storage.fill_block(1, 0x02).unwrap();
        let mut curve = Curve::from_def(0, storage.read_only_def()).unwrap();

        let checksum = curve.recalc_checksum().unwrap();

        let mut expected = Md5::new();
        expected.update(vec![0x01; CURVE_BLOCK_SIZE]);
        expected.update(vec![0x02; CURVE_BLOCK_SIZE]);
        let expected: Checksum = expected.finalize().into();
        assert_eq!(checksum, expected);
        assert_eq!(curve.checksum(), &expected);
    }

    #[test]
    fn test_checksum_is_deterministic_and_order_dependent() {
        let storage = MemoryCurve::new(1);
        storage.fill_block(0, 0xAA).unwrap();
        let mut curve = Curve::from_def(0, storage.writable_def()).unwrap();

        let first = curve.recalc_checksum().unwrap();
        let second = curve.recalc_checksum().unwrap();
        assert_eq!(first, second);

        // Swap block contents
        storage.fill_block(0, 0x00).unwrap();
        storage.fill_block(1, 0xAA).unwrap();
        let swapped = curve.recalc_checksum().unwrap();
        assert_ne!(first, swapped);
    }

    #[test]
    fn test_checksum_kept_on_read_failure() {
        let reader = |block: u8, buf: &mut [u8]| -> io::Result<()> {
            if block == 1 {
                return Err(io::Error::other("disk gone"));
            }
            buf.fill(block);
            Ok(())
        };
        let def = CurveDef::read_only(1, reader).with_checksum([0x5A; CURVE_CSUM_SIZE]);
        let mut curve = Curve::from_def(0, def).unwrap();

        assert!(curve.recalc_checksum().is_err());
        assert_eq!(curve.checksum(), &[0x5A; CURVE_CSUM_SIZE]);
    }

    #[test]
    fn test_memory_curve_bounds() {
        let storage = MemoryCurve::new(0);
        assert!(storage.block(1).is_none());
        assert!(storage.fill_block(1, 0xFF).is_none());

        let mut reader = storage.reader();
        let mut buf = vec![0u8; CURVE_BLOCK_SIZE];
        let err = reader.read_block(1, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_user_tag() {
        let storage = MemoryCurve::new(0);
        let def = storage.read_only_def().with_user(String::from("WFM"));
        let curve = Curve::from_def(0, def).unwrap();
        assert_eq!(curve.user::<String>().map(String::as_str), Some("WFM"));
    }
}
