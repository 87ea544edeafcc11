//! Pointer-prefix handlers: `unaligned.`, `volatile.` and `readonly.` are
//! no-ops over the current virtual memory model. This is provisional —
//! a future memory model should revisit it — so it stays a single handler
//! type rather than three near-identical ones.

use crate::dispatch::{DispatchResult, OpCodeHandler};
use crate::error::EmulationError;
use crate::machine::ExecutionContext;
use crate::opcode::{Instruction, OpCodeId};

pub struct PrefixHandler {
	opcodes: Vec<OpCodeId>,
}

impl PrefixHandler {
	pub fn new(opcodes: Vec<OpCodeId>) -> Self {
		Self { opcodes }
	}
}

impl OpCodeHandler for PrefixHandler {
	fn opcodes(&self) -> &[OpCodeId] {
		&self.opcodes
	}

	fn dispatch(&self, _ctx: &mut ExecutionContext, _instruction: &Instruction) -> Result<DispatchResult, EmulationError> {
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
	use crate::opcode::{ExtendedOpCode, Operand};
	use crate::signature::GenericContext;
	use crate::value_factory::{PrimitiveSizes, ValueFactory, ValueFactoryConfig};

	#[test]
	fn prefix_is_a_no_op() {
		let factory = ValueFactory::new(ValueFactoryConfig { object_header_size: 16, pointer_width: PointerWidth::Bits64, primitive_sizes: PrimitiveSizes::default() });
		let heap = ManagedObjectHeap::new(HeapConfig { max_size: 4096, base: Address(0) }, factory);
		let mut m = Machine::new(heap, DispatchTableBuilder::new().build());
		let frame = Frame::new(Vec::new(), GenericContext::empty());
		let mut ctx = ExecutionContext::new(&mut m, frame);

		let handler = PrefixHandler::new(vec![OpCodeId::Extended(ExtendedOpCode::unaligned_prefix)]);
		let instr = Instruction::new(ExtendedOpCode::unaligned_prefix, Operand::ImmediateI32(1));
		assert_eq!(handler.dispatch(&mut ctx, &instr).unwrap(), DispatchResult::Success);
		assert_eq!(ctx.frame().stack_depth(), 0);
	}
}
