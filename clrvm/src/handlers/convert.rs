//! `Convert*` handlers. Most `conv_*` opcodes are an ordinary width
//! truncation/extension on an `Integer`/`Float` slot; the one rule called
//! out explicitly here is what happens when the source is a `Ref`:
//! native-integer targets succeed via [`StackSlot::reinterpret_ref_as_integer`],
//! every narrower target is `InvalidCast`.

use crate::dispatch::{DispatchResult, OpCodeHandler};
use crate::error::{DispatchError, EmulationError};
use crate::machine::ExecutionContext;
use crate::opcode::{Instruction, OpCodeId};
use crate::stack::{StackSlot, TypeHint};

/// The conversion a `conv_*` opcode performs.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ConvertTarget {
	/// `conv_i`/`conv_u`: native pointer-width integer. The only target a
	/// `Ref` source may convert to without throwing.
	NativeInt,
	/// `conv_i1`/`conv_u1`/.../`conv_i8`/`conv_u8`: a fixed-width integer
	/// narrower than native width.
	NarrowInt { bits: u32 },
}

pub struct ConvertHandler {
	target: ConvertTarget,
	pointer_size: u32,
	opcodes: Vec<OpCodeId>,
}

impl ConvertHandler {
	pub fn new(target: ConvertTarget, pointer_size: u32, opcodes: Vec<OpCodeId>) -> Self {
		Self { target, pointer_size, opcodes }
	}

	fn target_bits(&self) -> usize {
		match self.target {
			ConvertTarget::NativeInt => self.pointer_size as usize * 8,
			ConvertTarget::NarrowInt { bits } => bits as usize,
		}
	}
}

impl OpCodeHandler for ConvertHandler {
	fn opcodes(&self) -> &[OpCodeId] {
		&self.opcodes
	}

	fn dispatch(&self, ctx: &mut ExecutionContext, _instruction: &Instruction) -> Result<DispatchResult, EmulationError> {
		let slot = ctx.frame_mut().pop()?;
		let bits = self.target_bits();

		if slot.type_hint() == TypeHint::Ref {
			if self.target != ConvertTarget::NativeInt {
				let exception = ctx.allocate_exception()?;
				return Ok(DispatchResult::Throw(exception));
			}
			let converted = slot.reinterpret_ref_as_integer(bits);
			ctx.frame_mut().push(StackSlot::new(converted, TypeHint::Integer));
			return Ok(DispatchResult::Success);
		}

		if slot.type_hint() != TypeHint::Integer {
			return Err(EmulationError::Dispatch(DispatchError::InvalidProgram));
		}

		let converted = if slot.contents().is_fully_known() {
			let mut bv = crate::bitvector::BitVector::zeroed(bits)?;
			bv.as_span_mut().set_u64(slot.contents().to_u64());
			bv
		} else {
			crate::bitvector::BitVector::unknown(bits)?
		};
		ctx.frame_mut().push(StackSlot::new(converted, TypeHint::Integer));
		Ok(DispatchResult::Success)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::dispatch::DispatchTableBuilder;
	use crate::frame::Frame;
	use crate::heap::{HeapConfig, ManagedObjectHeap};
	use crate::indices::{Address, PointerWidth};
	use crate::machine::Machine;
	use crate::opcode::{OpCode, Operand};
	use crate::signature::GenericContext;
	use crate::value_factory::{PrimitiveSizes, ValueFactory, ValueFactoryConfig};

	fn ctx_with(slot: StackSlot) -> (Machine, Frame) {
		let factory = ValueFactory::new(ValueFactoryConfig { object_header_size: 16, pointer_width: PointerWidth::Bits64, primitive_sizes: PrimitiveSizes::default() });
		let heap = ManagedObjectHeap::new(HeapConfig { max_size: 4096, base: Address(0) }, factory);
		let machine = Machine::new(heap, DispatchTableBuilder::new().build());
		let mut frame = Frame::new(Vec::new(), GenericContext::empty());
		frame.push(slot);
		(machine, frame)
	}

	#[test]
	fn known_null_ref_converts_to_known_zero() {
		let (mut m, frame) = ctx_with(StackSlot::null_ref(8));
		let mut ctx = ExecutionContext::new(&mut m, frame);
		let handler = ConvertHandler::new(ConvertTarget::NativeInt, 8, vec![OpCodeId::Plain(OpCode::conv_i)]);
		handler.dispatch(&mut ctx, &Instruction::new(OpCode::conv_i, Operand::None)).unwrap();
		let slot = ctx.frame_mut().pop().unwrap();
		assert_eq!(slot.type_hint(), TypeHint::Integer);
		assert!(slot.contents().is_fully_known());
		assert_eq!(slot.contents().to_u64(), 0);
	}

	#[test]
	fn narrowing_a_reference_is_invalid_cast_throw() {
		let (mut m, frame) = ctx_with(StackSlot::reference(Address(0x100), 8));
		let mut ctx = ExecutionContext::new(&mut m, frame);
		let handler = ConvertHandler::new(ConvertTarget::NarrowInt { bits: 32 }, 8, vec![OpCodeId::Plain(OpCode::conv_i4)]);
		let result = handler.dispatch(&mut ctx, &Instruction::new(OpCode::conv_i4, Operand::None)).unwrap();
		assert!(matches!(result, DispatchResult::Throw(_)));
	}

	#[test]
	fn truncates_a_known_integer() {
		let (mut m, frame) = ctx_with(StackSlot::integer(0x1FF, 32));
		let mut ctx = ExecutionContext::new(&mut m, frame);
		let handler = ConvertHandler::new(ConvertTarget::NarrowInt { bits: 8 }, 8, vec![OpCodeId::Plain(OpCode::conv_i1)]);
		handler.dispatch(&mut ctx, &Instruction::new(OpCode::conv_i1, Operand::None)).unwrap();
		let slot = ctx.frame_mut().pop().unwrap();
		assert_eq!(slot.contents().to_u64(), 0xFF);
	}
}
