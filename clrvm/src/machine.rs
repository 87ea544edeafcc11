//! The machine (heap + dispatch table) and the per-step execution context
//! handed to handlers.
//!
//! `Machine` owns the resources a frame needs but does not itself own:
//! the heap and the dispatch table are shared across every frame in a
//! call stack, while each [`Frame`] is private to its invocation.

use crate::dispatch::{DispatchResult, DispatchTable};
use crate::error::EmulationError;
use crate::frame::Frame;
use crate::heap::ManagedObjectHeap;
use crate::indices::Address;
use crate::opcode::Instruction;

pub struct Machine {
	heap: ManagedObjectHeap,
	dispatch_table: DispatchTable,
}

impl Machine {
	pub fn new(heap: ManagedObjectHeap, dispatch_table: DispatchTable) -> Self {
		Self { heap, dispatch_table }
	}

	#[inline]
	pub fn heap(&self) -> &ManagedObjectHeap {
		&self.heap
	}

	#[inline]
	pub fn heap_mut(&mut self) -> &mut ManagedObjectHeap {
		&mut self.heap
	}

	#[inline]
	pub fn dispatch_table(&self) -> &DispatchTable {
		&self.dispatch_table
	}
}

/// What a handler sees while processing one instruction: its frame plus a
/// borrow of the shared machine. A step is atomic: the handler observes the
/// frame and heap, mutates them, and returns a result.
pub struct ExecutionContext<'m> {
	machine: &'m mut Machine,
	frame: Frame,
}

impl<'m> ExecutionContext<'m> {
	pub fn new(machine: &'m mut Machine, frame: Frame) -> Self {
		Self { machine, frame }
	}

	#[inline]
	pub fn frame(&self) -> &Frame {
		&self.frame
	}

	#[inline]
	pub fn frame_mut(&mut self) -> &mut Frame {
		&mut self.frame
	}

	#[inline]
	pub fn heap(&self) -> &ManagedObjectHeap {
		self.machine.heap()
	}

	#[inline]
	pub fn heap_mut(&mut self) -> &mut ManagedObjectHeap {
		self.machine.heap_mut()
	}

	/// Allocates a minimal exception object to carry in a
	/// `DispatchResult::Throw`. Field layout of "real" exception types
	/// (message, inner exception, stack trace) is an on-disk-metadata
	/// concern and out of scope; handlers that throw only need a stable
	/// reference.
	pub fn allocate_exception(&mut self) -> Result<Address, EmulationError> {
		Ok(self.heap_mut().allocate_object(0, true)?)
	}

	pub fn into_frame(self) -> Frame {
		self.frame
	}

	/// Dispatches the instruction at the frame's current `ip`, then
	/// advances control flow per the returned [`DispatchResult`]:
	/// `Success` advances `ip` by one, `Branch`/`BranchUnknown` set `ip` to
	/// the target (the unknown case picks the branch arm as the documented
	/// default, leaving the fork-vs-fall-through policy to the caller),
	/// `Throw` leaves `ip` untouched for the exception path to take over.
	#[cfg_attr(feature = "tracing", tracing::instrument(skip(self, instruction)))]
	pub fn step(&mut self, instruction: &Instruction) -> Result<DispatchResult, EmulationError> {
		let handler = self
			.machine
			.dispatch_table
			.handler(instruction.opcode)
			.ok_or(EmulationError::Dispatch(crate::error::DispatchError::InvalidProgram))?;

		let result = handler.dispatch(self, instruction)?;
		match result {
			DispatchResult::Success => self.frame.advance(),
			DispatchResult::Branch(target) => self.frame.set_ip(target),
			DispatchResult::BranchUnknown(target) => {
				#[cfg(feature = "tracing")]
				tracing::debug!(ip = self.frame.ip(), target, "branch condition unknown, forking to taken arm");
				self.frame.set_ip(target);
			}
			DispatchResult::Throw(_) => {}
		}
		Ok(result)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::dispatch::{DispatchTableBuilder, OpCodeHandler};
	use crate::heap::HeapConfig;
	use crate::indices::{Address, PointerWidth};
	use crate::opcode::{OpCode, OpCodeId, Operand};
	use crate::signature::GenericContext;
	use crate::value_factory::{PrimitiveSizes, ValueFactory, ValueFactoryConfig};

	struct AlwaysSuccess;
	impl OpCodeHandler for AlwaysSuccess {
		fn opcodes(&self) -> &[OpCodeId] {
			static OPS: [OpCodeId; 1] = [OpCodeId::Plain(OpCode::nop)];
			&OPS
		}
		fn dispatch(&self, _ctx: &mut ExecutionContext, _instruction: &Instruction) -> Result<DispatchResult, EmulationError> {
			Ok(DispatchResult::Success)
		}
	}

	fn machine() -> Machine {
		let factory = ValueFactory::new(ValueFactoryConfig { object_header_size: 16, pointer_width: PointerWidth::Bits64, primitive_sizes: PrimitiveSizes::default() });
		let heap = ManagedObjectHeap::new(HeapConfig { max_size: 4096, base: Address(0) }, factory);
		let mut builder = DispatchTableBuilder::new();
		builder.register(AlwaysSuccess).unwrap();
		Machine::new(heap, builder.build())
	}

	#[test]
	fn step_advances_ip_on_success() {
		let mut m = machine();
		let frame = Frame::new(Vec::new(), GenericContext::empty());
		let mut ctx = ExecutionContext::new(&mut m, frame);
		let instr = Instruction::new(OpCode::nop, Operand::None);
		ctx.step(&instr).unwrap();
		assert_eq!(ctx.frame().ip(), 1);
	}

	#[test]
	fn step_on_unregistered_opcode_is_invalid_program() {
		let mut m = machine();
		let frame = Frame::new(Vec::new(), GenericContext::empty());
		let mut ctx = ExecutionContext::new(&mut m, frame);
		let instr = Instruction::new(OpCode::add, Operand::None);
		let err = ctx.step(&instr).unwrap_err();
		assert_eq!(err, EmulationError::Dispatch(crate::error::DispatchError::InvalidProgram));
	}
}
