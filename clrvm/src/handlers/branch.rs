//! Branch handlers. The unknown-condition policy is the documented default:
//! fork to the taken arm (`DispatchResult::BranchUnknown`), leaving the
//! caller free to treat it as a fall-through instead.

use crate::dispatch::{DispatchResult, OpCodeHandler};
use crate::error::{DispatchError, EmulationError};
use crate::machine::ExecutionContext;
use crate::opcode::{Instruction, OpCodeId, Operand};
use crate::stack::Three;

fn branch_target(instruction: &Instruction) -> Result<u32, EmulationError> {
	match instruction.operand {
		Operand::BranchTarget(target) => Ok(target),
		_ => Err(EmulationError::Dispatch(DispatchError::InvalidProgram)),
	}
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Condition {
	/// `brtrue`/`brtrue_s`: branch when the popped slot is non-zero.
	True,
	/// `brfalse`/`brfalse_s`: branch when the popped slot is zero (also
	/// serves `brzero`-style opcodes, which share the same truth test).
	False,
}

pub struct ConditionalBranchHandler {
	condition: Condition,
	opcodes: Vec<OpCodeId>,
}

impl ConditionalBranchHandler {
	pub fn new(condition: Condition, opcodes: Vec<OpCodeId>) -> Self {
		Self { condition, opcodes }
	}
}

impl OpCodeHandler for ConditionalBranchHandler {
	fn opcodes(&self) -> &[OpCodeId] {
		&self.opcodes
	}

	fn dispatch(&self, ctx: &mut ExecutionContext, instruction: &Instruction) -> Result<DispatchResult, EmulationError> {
		let target = branch_target(instruction)?;
		let slot = ctx.frame_mut().pop()?;
		let truth = match self.condition {
			Condition::True => slot.is_non_zero(),
			Condition::False => slot.is_zero(),
		};
		Ok(match truth {
			Three::True => DispatchResult::Branch(target),
			Three::False => DispatchResult::Success,
			Three::Unknown => {
				#[cfg(feature = "tracing")]
				tracing::debug!(target, "branch condition unknown");
				DispatchResult::BranchUnknown(target)
			}
		})
	}
}

/// `br`/`br_s`: unconditional, always taken.
pub struct UnconditionalBranchHandler {
	opcodes: Vec<OpCodeId>,
}

impl UnconditionalBranchHandler {
	pub fn new(opcodes: Vec<OpCodeId>) -> Self {
		Self { opcodes }
	}
}

impl OpCodeHandler for UnconditionalBranchHandler {
	fn opcodes(&self) -> &[OpCodeId] {
		&self.opcodes
	}

	fn dispatch(&self, _ctx: &mut ExecutionContext, instruction: &Instruction) -> Result<DispatchResult, EmulationError> {
		Ok(DispatchResult::Branch(branch_target(instruction)?))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::bitvector::BitVector;
	use crate::dispatch::DispatchTableBuilder;
	use crate::frame::Frame;
	use crate::heap::{HeapConfig, ManagedObjectHeap};
	use crate::indices::{Address, PointerWidth};
	use crate::machine::Machine;
	use crate::opcode::OpCode;
	use crate::signature::GenericContext;
	use crate::stack::{StackSlot, TypeHint};
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
	fn brtrue_on_known_nonzero_branches() {
		let (mut m, frame) = ctx_with(StackSlot::integer(5, 32));
		let mut ctx = ExecutionContext::new(&mut m, frame);
		let handler = ConditionalBranchHandler::new(Condition::True, vec![OpCodeId::Plain(OpCode::brtrue)]);
		let instr = Instruction::new(OpCode::brtrue, Operand::BranchTarget(9));
		assert_eq!(handler.dispatch(&mut ctx, &instr).unwrap(), DispatchResult::Branch(9));
	}

	#[test]
	fn brfalse_on_known_nonzero_falls_through() {
		let (mut m, frame) = ctx_with(StackSlot::integer(5, 32));
		let mut ctx = ExecutionContext::new(&mut m, frame);
		let handler = ConditionalBranchHandler::new(Condition::False, vec![OpCodeId::Plain(OpCode::brfalse)]);
		let instr = Instruction::new(OpCode::brfalse, Operand::BranchTarget(9));
		assert_eq!(handler.dispatch(&mut ctx, &instr).unwrap(), DispatchResult::Success);
	}

	#[test]
	fn unknown_condition_forks_to_target() {
		let (mut m, frame) = ctx_with(StackSlot::new(BitVector::unknown(32).unwrap(), TypeHint::Integer));
		let mut ctx = ExecutionContext::new(&mut m, frame);
		let handler = ConditionalBranchHandler::new(Condition::True, vec![OpCodeId::Plain(OpCode::brtrue)]);
		let instr = Instruction::new(OpCode::brtrue, Operand::BranchTarget(3));
		assert_eq!(handler.dispatch(&mut ctx, &instr).unwrap(), DispatchResult::BranchUnknown(3));
	}

	#[test]
	fn missing_branch_target_operand_is_invalid_program() {
		let (mut m, frame) = ctx_with(StackSlot::integer(0, 32));
		let mut ctx = ExecutionContext::new(&mut m, frame);
		let handler = ConditionalBranchHandler::new(Condition::True, vec![OpCodeId::Plain(OpCode::brtrue)]);
		let instr = Instruction::new(OpCode::brtrue, Operand::None);
		let err = handler.dispatch(&mut ctx, &instr).unwrap_err();
		assert_eq!(err, EmulationError::Dispatch(DispatchError::InvalidProgram));
	}
}
