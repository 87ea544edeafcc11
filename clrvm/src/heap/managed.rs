//! `ManagedObjectHeap`: the typed façade over [`BasicHeap`].
//!
//! Allocates objects, szarrays and strings and writes their header fields
//! through [`ValueFactory`]'s layout, instead of handing callers raw byte
//! counts.

use crate::error::{HeapError, ValueFactoryError};
use crate::heap::basic::{BasicHeap, HeapConfig};
use crate::indices::Address;
use crate::value_factory::{ElementType, SizedType, ValueFactory};

#[derive(Debug)]
pub enum ManagedHeapError {
	Heap(HeapError),
	Layout(ValueFactoryError),
}

impl From<HeapError> for ManagedHeapError {
	fn from(value: HeapError) -> Self {
		Self::Heap(value)
	}
}

impl From<ValueFactoryError> for ManagedHeapError {
	fn from(value: ValueFactoryError) -> Self {
		Self::Layout(value)
	}
}

pub struct ManagedObjectHeap {
	heap: BasicHeap,
	factory: ValueFactory,
}

impl ManagedObjectHeap {
	pub fn new(config: HeapConfig, factory: ValueFactory) -> Self {
		Self { heap: BasicHeap::new(config), factory }
	}

	pub fn factory(&self) -> &ValueFactory {
		&self.factory
	}

	pub fn basic_heap(&self) -> &BasicHeap {
		&self.heap
	}

	pub fn basic_heap_mut(&mut self) -> &mut BasicHeap {
		&mut self.heap
	}

	/// Rejects array/string/szarray types: their size requires instance
	/// data, so callers must go through [`Self::allocate_sz_array`] /
	/// [`Self::allocate_string`] instead.
	#[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
	pub fn allocate_object(&mut self, field_sizes: u32, initialize: bool) -> Result<Address, ManagedHeapError> {
		let size = self.factory.object_size(SizedType::Object { field_sizes })?;
		Ok(self.heap.allocate(size, initialize)?)
	}

	#[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
	pub fn allocate_sz_array(&mut self, elem: ElementType, count: i64, initialize: bool) -> Result<Address, ManagedHeapError> {
		let size = self.factory.array_object_size(elem, count)?;
		let address = self.heap.allocate(size as u32, initialize)?;

		let mut span = self.heap.chunk_span_mut(address)?;
		let offset = self.factory.array_length_offset() as usize;
		let width = self.factory.pointer_size() as usize;
		let mut length_span = crate::bitvector::BitVectorSpanMut::new(width * 8, &mut span.bits_mut()[offset..offset + width], &mut span.mask_mut()[offset..offset + width]);
		length_span.set_u64(count as u64);
		Ok(address)
	}

	#[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
	pub fn allocate_string(&mut self, length: i64, initialize: bool) -> Result<Address, ManagedHeapError> {
		let size = self.factory.string_object_size(length)?;
		let address = self.heap.allocate(size as u32, initialize)?;

		let mut span = self.heap.chunk_span_mut(address)?;
		let offset = self.factory.string_length_offset() as usize;
		let mut length_span = crate::bitvector::BitVectorSpanMut::new(32, &mut span.bits_mut()[offset..offset + 4], &mut span.mask_mut()[offset..offset + 4]);
		length_span.set_u64(length as u64);
		Ok(address)
	}

	/// Allocates a string object sized for `value` and writes its UTF-16LE
	/// code units into the data slice.
	#[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
	pub fn allocate_string_value(&mut self, value: &str) -> Result<Address, ManagedHeapError> {
		let units: Vec<u16> = value.encode_utf16().collect();
		let address = self.allocate_string(units.len() as i64, true)?;

		let mut span = self.heap.chunk_span_mut(address)?;
		let offset = self.factory.string_data_offset() as usize;
		let bits = span.bits_mut();
		for (i, unit) in units.iter().enumerate() {
			let byte_offset = offset + i * 2;
			bits[byte_offset..byte_offset + 2].copy_from_slice(&unit.to_le_bytes());
		}
		span.mask_mut()[offset..offset + units.len() * 2].fill(0xFF);
		Ok(address)
	}

	/// Reads back a previously-allocated string's contents. Used by tests
	/// and by `ldstr`-style handlers.
	pub fn read_string(&self, address: Address) -> Result<String, ManagedHeapError> {
		let length_offset = self.factory.string_length_offset() as usize;
		let mut length_bytes = [0u8; 4];
		self.heap.read(Address(address.0 + length_offset as u64), &mut length_bytes)?;
		let length = u32::from_le_bytes(length_bytes) as usize;

		let data_offset = self.factory.string_data_offset();
		let mut units = Vec::with_capacity(length);
		for i in 0..length {
			let mut unit_bytes = [0u8; 2];
			self.heap.read(Address(address.0 + data_offset + (i * 2) as u64), &mut unit_bytes)?;
			units.push(u16::from_le_bytes(unit_bytes));
		}
		Ok(String::from_utf16_lossy(&units))
	}

	pub fn array_length(&self, address: Address) -> Result<u64, ManagedHeapError> {
		let offset = self.factory.array_length_offset();
		let width = self.factory.pointer_size() as usize;
		let mut buf = [0u8; 8];
		self.heap.read(Address(address.0 + offset), &mut buf[..width])?;
		Ok(u64::from_le_bytes(buf))
	}
}
