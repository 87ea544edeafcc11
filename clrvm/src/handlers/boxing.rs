//! Box/Unbox handlers. `UnboxHandlerBase` is re-expressed as composition,
//! same as [`crate::handlers::cast`]: the
//! common `dataAddress = objectAddress + ObjectHeaderSize` computation lives
//! in [`UnboxHandler`], and a subclass-equivalent [`UnboxStrategy`] decides
//! what gets pushed from that address: `unbox` pushes a managed pointer to
//! the payload in place, `unbox_any` copies it out onto the stack.

use crate::bitvector::BitVector;
use crate::dispatch::{DispatchResult, OpCodeHandler};
use crate::error::{DispatchError, EmulationError};
use crate::indices::Address;
use crate::machine::ExecutionContext;
use crate::opcode::{Instruction, OpCodeId};
use crate::stack::{StackSlot, TypeHint};

/// `box`: copies a value-type slot's payload into a freshly allocated
/// object and pushes a reference to it.
pub struct BoxHandler {
	opcodes: Vec<OpCodeId>,
}

impl BoxHandler {
	pub fn new(opcodes: Vec<OpCodeId>) -> Self {
		Self { opcodes }
	}
}

impl OpCodeHandler for BoxHandler {
	fn opcodes(&self) -> &[OpCodeId] {
		&self.opcodes
	}

	fn dispatch(&self, ctx: &mut ExecutionContext, _instruction: &Instruction) -> Result<DispatchResult, EmulationError> {
		let value = ctx.frame_mut().pop()?;
		let payload_size = value.byte_size() as u32;
		let header = ctx.heap().factory().object_header_size() as usize;
		let pointer_size = ctx.heap().factory().pointer_size();

		let address = ctx.heap_mut().allocate_object(payload_size, true)?;
		let mut span = ctx.heap_mut().basic_heap_mut().chunk_span_mut(address)?;
		span.bits_mut()[header..].copy_from_slice(value.contents().bits());
		span.mask_mut()[header..].copy_from_slice(value.contents().mask());

		ctx.frame_mut().push(StackSlot::reference(address, pointer_size));
		Ok(DispatchResult::Success)
	}
}

/// Subclass-equivalent hook for [`UnboxHandler`]: given the boxed payload's
/// address, decide what to push.
pub trait UnboxStrategy {
	fn on_data_address(&self, ctx: &mut ExecutionContext, data_address: Address) -> Result<DispatchResult, EmulationError>;
}

/// `unbox`: pushes a managed pointer to the payload without copying it.
pub struct ManagedPointerStrategy;

impl UnboxStrategy for ManagedPointerStrategy {
	fn on_data_address(&self, ctx: &mut ExecutionContext, data_address: Address) -> Result<DispatchResult, EmulationError> {
		let pointer_size = ctx.heap().factory().pointer_size();
		ctx.frame_mut().push(StackSlot::reference(data_address, pointer_size));
		Ok(DispatchResult::Success)
	}
}

/// `unbox_any`: copies `size` bytes out of the payload and pushes them as a
/// slot tagged with `type_hint`.
pub struct CopyValueStrategy {
	size: u32,
	type_hint: TypeHint,
}

impl CopyValueStrategy {
	pub fn new(size: u32, type_hint: TypeHint) -> Self {
		Self { size, type_hint }
	}
}

impl UnboxStrategy for CopyValueStrategy {
	fn on_data_address(&self, ctx: &mut ExecutionContext, data_address: Address) -> Result<DispatchResult, EmulationError> {
		let mut buf = vec![0u8; self.size as usize];
		ctx.heap().basic_heap().read(data_address, &mut buf)?;
		let slot = StackSlot::new(BitVector::from_le_bytes(&buf), self.type_hint);
		ctx.frame_mut().push(slot);
		Ok(DispatchResult::Success)
	}
}

pub struct UnboxHandler<S> {
	strategy: S,
	opcodes: Vec<OpCodeId>,
}

impl<S: UnboxStrategy> UnboxHandler<S> {
	pub fn new(strategy: S, opcodes: Vec<OpCodeId>) -> Self {
		Self { strategy, opcodes }
	}
}

impl<S: UnboxStrategy> OpCodeHandler for UnboxHandler<S> {
	fn opcodes(&self) -> &[OpCodeId] {
		&self.opcodes
	}

	fn dispatch(&self, ctx: &mut ExecutionContext, _instruction: &Instruction) -> Result<DispatchResult, EmulationError> {
		let object = ctx.frame_mut().pop()?;
		if object.type_hint() != TypeHint::Ref {
			return Err(EmulationError::Dispatch(DispatchError::InvalidProgram));
		}
		if !object.contents().is_fully_known() {
			// An unboxable address we cannot observe: surface as a host
			// error rather than guessing at a data address to read from.
			return Err(EmulationError::Dispatch(DispatchError::InvalidProgram));
		}
		let object_address = Address(object.contents().to_u64());
		let header = ctx.heap().factory().object_header_size() as u64;
		self.strategy.on_data_address(ctx, object_address.offset(header))
	}
}
