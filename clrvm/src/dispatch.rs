//! Dispatch table and handler registration.
//!
//! The teacher's compile-time `define_opcodes!`/`define_metadata_token!`
//! declarative macros close the opcode *set*; this is the runtime analogue
//! for opcode *behavior*: handlers are registered into a map at
//! `DispatchTable::build` time rather than resolved by a `match` arm, so a
//! `ConfigurationError` on a duplicate registration is a normal runtime
//! outcome instead of a compile error.

use std::fmt::Formatter;
use std::rc::Rc;

use derivative::Derivative;
use nohash_hasher::IntMap;

use crate::error::{DispatchError, EmulationError};
use crate::indices::Address;
use crate::machine::ExecutionContext;
use crate::opcode::{Instruction, OpCodeId};

/// Outcome of dispatching one instruction.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DispatchResult {
	/// Fall through; advance past the instruction.
	Success,
	/// Set `ip` to the given instruction index.
	Branch(u32),
	/// A branch whose condition depended on unknown bits. The handler
	/// surfaces this instead of picking a side, so the caller can implement
	/// either fork-on-unknown or treat-as-fall-through. `target` is the
	/// not-taken-for-certain branch destination; the caller decides
	/// whether to explore it, fall through, or both.
	BranchUnknown(u32),
	/// Enter the exception-dispatch path with a reference to a newly
	/// allocated exception object. Out of scope beyond this contract.
	Throw(Address),
}

pub trait OpCodeHandler {
	/// The opcodes this handler advertises. Borrowed from `&self` rather
	/// than required to be `'static`, since handler instances are
	/// parameterized (e.g. `add` vs `add_ovf` vs `add_ovf_un` share one
	/// generic binary-op handler type with different construction
	/// arguments, not different types).
	fn opcodes(&self) -> &[OpCodeId];

	fn dispatch(&self, ctx: &mut ExecutionContext, instruction: &Instruction) -> Result<DispatchResult, EmulationError>;
}

#[derive(Derivative)]
#[derivative(Debug)]
pub struct DispatchTable {
	#[derivative(Debug(format_with = "fmt_handlers"))]
	handlers: IntMap<u16, Rc<dyn OpCodeHandler>>,
}

fn fmt_handlers(handlers: &IntMap<u16, Rc<dyn OpCodeHandler>>, f: &mut Formatter) -> std::fmt::Result {
	let mut keys: Vec<_> = handlers.keys().collect();
	keys.sort_unstable();
	f.debug_list().entries(keys).finish()
}

impl DispatchTable {
	pub fn handler(&self, opcode: OpCodeId) -> Option<Rc<dyn OpCodeHandler>> {
		self.handlers.get(&opcode.key()).cloned()
	}

	pub fn len(&self) -> usize {
		self.handlers.len()
	}

	pub fn is_empty(&self) -> bool {
		self.handlers.is_empty()
	}
}

/// Builds a [`DispatchTable`] by registering handlers one at a time.
/// Mirrors the teacher's "declarative registration, fail at build time"
/// discipline from `define_opcodes!`/`define_metadata_token!`, just moved
/// to runtime since handlers are trait objects, not enum variants.
#[derive(Default)]
pub struct DispatchTableBuilder {
	handlers: IntMap<u16, Rc<dyn OpCodeHandler>>,
}

impl DispatchTableBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&mut self, handler: impl OpCodeHandler + 'static) -> Result<&mut Self, DispatchError> {
		let handler: Rc<dyn OpCodeHandler> = Rc::new(handler);
		if handler.opcodes().iter().any(|opcode| self.handlers.contains_key(&opcode.key())) {
			return Err(DispatchError::ConfigurationError);
		}
		for &opcode in handler.opcodes() {
			self.handlers.insert(opcode.key(), handler.clone());
		}
		Ok(self)
	}

	#[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
	pub fn build(self) -> DispatchTable {
		DispatchTable { handlers: self.handlers }
	}
}
