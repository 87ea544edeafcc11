//! `BasicHeap`: a bump-or-freelist allocator over a fixed-size byte region.
//! This is the raw layer `ManagedObjectHeap` types on top of.

use fxhash::FxHashMap;

use crate::bitvector::BitVectorSpanMut;
use crate::error::HeapError;
use crate::indices::{Address, AddressRange};

struct Chunk {
	bits: Box<[u8]>,
	mask: Box<[u8]>,
}

#[derive(Debug, Copy, Clone)]
pub struct HeapConfig {
	pub max_size: u64,
	/// Address the heap reports as its first byte. See [`BasicHeap::rebase`].
	pub base: Address,
}

/// First-fit bump-or-freelist allocator. Chunks are keyed by their offset
/// from `base` internally so [`BasicHeap::rebase`] is a pure metadata
/// update: no stored byte is ever copied.
pub struct BasicHeap {
	config: HeapConfig,
	chunks: FxHashMap<u64, Chunk>,
	/// Free regions, as `(offset, len)`, sorted by offset and merged where
	/// adjacent.
	free_list: Vec<(u64, u64)>,
	/// Bump cursor: bytes at `[bump..]` have never been allocated.
	bump: u64,
}

impl std::fmt::Debug for BasicHeap {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("BasicHeap")
			.field("base", &self.config.base)
			.field("max_size", &self.config.max_size)
			.field("live_chunks", &self.chunks.len())
			.finish()
	}
}

impl BasicHeap {
	pub fn new(config: HeapConfig) -> Self {
		Self { config, chunks: FxHashMap::default(), free_list: Vec::new(), bump: 0 }
	}

	#[inline]
	fn to_offset(&self, address: Address) -> Option<u64> {
		address.0.checked_sub(self.config.base.0)
	}

	#[inline]
	fn to_address(&self, offset: u64) -> Address {
		Address(self.config.base.0 + offset)
	}

	fn find_free_region(&mut self, n: u64) -> Option<u64> {
		if let Some(idx) = self.free_list.iter().position(|(_, len)| *len >= n) {
			let (offset, len) = self.free_list.remove(idx);
			if len > n {
				self.free_list.push((offset + n, len - n));
			}
			return Some(offset);
		}
		if self.config.max_size - self.bump >= n {
			let offset = self.bump;
			self.bump += n;
			return Some(offset);
		}
		None
	}

	#[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
	pub fn allocate(&mut self, size: u32, initialize: bool) -> Result<Address, HeapError> {
		let size = size as u64;
		let offset = self.find_free_region(size).ok_or(HeapError::OutOfMemory)?;
		let len = size as usize;
		let (bits, mask) = if initialize {
			(vec![0u8; len].into_boxed_slice(), vec![0xFFu8; len].into_boxed_slice())
		} else {
			(vec![0u8; len].into_boxed_slice(), vec![0u8; len].into_boxed_slice())
		};
		self.chunks.insert(offset, Chunk { bits, mask });
		#[cfg(feature = "tracing")]
		tracing::trace!(offset, size, initialize, "allocated chunk");
		Ok(self.to_address(offset))
	}

	#[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
	pub fn free(&mut self, address: Address) -> Result<(), HeapError> {
		let offset = self.to_offset(address).ok_or(HeapError::InvalidArgument)?;
		let chunk = self.chunks.remove(&offset).ok_or(HeapError::InvalidArgument)?;
		let len = chunk.bits.len() as u64;
		self.free_list.push((offset, len));
		self.merge_free_list();
		Ok(())
	}

	fn merge_free_list(&mut self) {
		self.free_list.sort_unstable_by_key(|(offset, _)| *offset);
		let mut merged: Vec<(u64, u64)> = Vec::with_capacity(self.free_list.len());
		for (offset, len) in self.free_list.drain(..) {
			if let Some(last) = merged.last_mut() {
				if last.0 + last.1 == offset {
					last.1 += len;
					continue;
				}
			}
			merged.push((offset, len));
		}
		self.free_list = merged;
	}

	pub fn is_valid_address(&self, address: Address) -> bool {
		self.to_offset(address).is_some_and(|offset| self.chunks.contains_key(&offset))
	}

	pub fn chunk_size(&self, address: Address) -> Result<u32, HeapError> {
		let offset = self.to_offset(address).ok_or(HeapError::InvalidArgument)?;
		self.chunks.get(&offset).map(|c| c.bits.len() as u32).ok_or(HeapError::InvalidArgument)
	}

	pub fn chunk_span_mut(&mut self, address: Address) -> Result<BitVectorSpanMut<'_>, HeapError> {
		let offset = self.to_offset(address).ok_or(HeapError::InvalidArgument)?;
		let chunk = self.chunks.get_mut(&offset).ok_or(HeapError::InvalidArgument)?;
		let bit_len = chunk.bits.len() * 8;
		Ok(BitVectorSpanMut::new(bit_len, &mut chunk.bits, &mut chunk.mask))
	}

	/// Finds the chunk whose address range contains `address`, returning its
	/// key offset and the local byte offset within the chunk. Addresses
	/// passed to `Read`/`Write` may point anywhere inside a chunk, not just
	/// its base, since callers read and write individual fields (length
	/// slots, array elements, unboxed payloads) at `base + offset`.
	fn find_containing(&self, address: Address) -> Option<(u64, usize)> {
		let target = self.to_offset(address)?;
		self.chunks.iter().find_map(|(&offset, chunk)| {
			let len = chunk.bits.len() as u64;
			(target >= offset && target < offset + len).then(|| (offset, (target - offset) as usize))
		})
	}

	pub fn read(&self, address: Address, buf: &mut [u8]) -> Result<(), HeapError> {
		let (offset, local) = self.find_containing(address).ok_or(HeapError::AccessViolation)?;
		let chunk = self.chunks.get(&offset).ok_or(HeapError::AccessViolation)?;
		if local + buf.len() > chunk.bits.len() {
			return Err(HeapError::AccessViolation);
		}
		buf.copy_from_slice(&chunk.bits[local..local + buf.len()]);
		Ok(())
	}

	pub fn write(&mut self, address: Address, buf: &[u8]) -> Result<(), HeapError> {
		let (offset, local) = self.find_containing(address).ok_or(HeapError::AccessViolation)?;
		let chunk = self.chunks.get_mut(&offset).ok_or(HeapError::AccessViolation)?;
		if local + buf.len() > chunk.bits.len() {
			return Err(HeapError::AccessViolation);
		}
		chunk.bits[local..local + buf.len()].copy_from_slice(buf);
		chunk.mask[local..local + buf.len()].fill(0xFF);
		Ok(())
	}

	/// Snapshot of every live chunk's address range. Collected eagerly so
	/// later `Allocate`/`Free` calls cannot be observed mid-iteration.
	pub fn allocated_chunks(&self) -> Vec<AddressRange> {
		self
			.chunks
			.iter()
			.map(|(offset, chunk)| AddressRange { start: self.to_address(*offset), end: self.to_address(*offset + chunk.bits.len() as u64) })
			.collect()
	}

	/// Shifts the heap's reported base to `new_base`. Every existing
	/// address changes value but keeps its logical identity: a chunk's
	/// stored bytes are never touched.
	pub fn rebase(&mut self, new_base: Address) {
		self.config.base = new_base;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn heap() -> BasicHeap {
		BasicHeap::new(HeapConfig { max_size: 1024, base: Address(0) })
	}

	#[test]
	fn allocate_then_free_reuses_the_region() {
		let mut heap = heap();
		let a = heap.allocate(16, true).unwrap();
		heap.free(a).unwrap();
		let b = heap.allocate(16, true).unwrap();
		assert_eq!(a, b);
	}

	#[test]
	fn live_chunks_never_overlap() {
		let mut heap = heap();
		let a = heap.allocate(16, true).unwrap();
		let b = heap.allocate(32, true).unwrap();
		let ranges = heap.allocated_chunks();
		assert_eq!(ranges.len(), 2);
		assert!(!ranges[0].overlaps(&ranges[1]));
		assert!(heap.is_valid_address(a));
		assert!(heap.is_valid_address(b));
	}

	#[test]
	fn out_of_memory_when_exhausted() {
		let mut heap = BasicHeap::new(HeapConfig { max_size: 16, base: Address(0) });
		heap.allocate(16, true).unwrap();
		assert_eq!(heap.allocate(1, true), Err(HeapError::OutOfMemory));
	}

	#[test]
	fn freeing_unknown_address_is_invalid_argument() {
		let mut heap = heap();
		assert_eq!(heap.free(Address(4)), Err(HeapError::InvalidArgument));
	}

	#[test]
	fn out_of_range_read_is_access_violation() {
		let mut heap = heap();
		let a = heap.allocate(4, true).unwrap();
		let mut buf = [0u8; 8];
		assert_eq!(heap.read(a, &mut buf), Err(HeapError::AccessViolation));
	}

	#[test]
	fn rebase_preserves_chunk_contents() {
		let mut heap = heap();
		let a = heap.allocate(4, true).unwrap();
		heap.write(a, &[1, 2, 3, 4]).unwrap();
		heap.rebase(Address(0x1000));
		let rebased = Address(0x1000 + a.0);
		let mut buf = [0u8; 4];
		heap.read(rebased, &mut buf).unwrap();
		assert_eq!(buf, [1, 2, 3, 4]);
	}

	#[test]
	fn non_initialized_allocation_is_unknown() {
		let mut heap = heap();
		let a = heap.allocate(4, false).unwrap();
		let span = heap.chunk_span_mut(a).unwrap();
		assert!(!span.is_fully_known());
	}
}
