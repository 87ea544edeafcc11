//! Error taxonomy for the emulation core.
//!
//! Each subsystem gets its own plain enum, following the
//! `schema::errors::ReadError` convention of the teacher crate this was
//! grown from: no `thiserror`, no dynamic `Box<dyn Error>`, just
//! `#[derive(Debug)]` enums and manual `From` impls for the cases that
//! genuinely wrap another subsystem's error.

use crate::indices::Address;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BitVectorError {
	/// A float operation was attempted on a width other than 32 or 64 bits.
	InvalidOperation,
	/// Construction was requested with a zero bit-length, or two spans of
	/// mismatched width were paired in an operation.
	InvalidArgument,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ValueFactoryError {
	/// `GetObjectSize` was called for a type whose size depends on instance
	/// data (array / string).
	InvalidOperation,
	/// A negative array length was requested.
	InvalidArgument,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum HeapError {
	/// No contiguous free region of the requested size exists.
	OutOfMemory,
	/// `Free`/`GetChunkSpan`/`GetChunkSize` was called with an address that
	/// is not the base of a live chunk.
	InvalidArgument,
	/// A `Read`/`Write` range fell outside the addressed chunk.
	AccessViolation,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DispatchError {
	/// A handler observed stack type-hints it cannot operate on (e.g. an
	/// `Add` between an `Integer` and a `Struct` slot).
	InvalidProgram,
	/// Two handlers advertised the same opcode at table-build time.
	ConfigurationError,
}

/// Unifies the subsystem errors the way `schema::errors::ReadError` unifies
/// the teacher's read path. `InvalidCast` is not a host error: cast/unbox
/// handlers convert it into `DispatchResult::Throw` themselves and it never
/// reaches this enum in practice, but it is kept here for callers that want
/// to short-circuit before reaching the handler (e.g. a verifier pass).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum EmulationError {
	BitVector(BitVectorError),
	ValueFactory(ValueFactoryError),
	Heap(HeapError),
	Dispatch(DispatchError),
	InvalidCast { from: Address },
}

impl From<BitVectorError> for EmulationError {
	fn from(value: BitVectorError) -> Self {
		Self::BitVector(value)
	}
}

impl From<ValueFactoryError> for EmulationError {
	fn from(value: ValueFactoryError) -> Self {
		Self::ValueFactory(value)
	}
}

impl From<HeapError> for EmulationError {
	fn from(value: HeapError) -> Self {
		Self::Heap(value)
	}
}

impl From<DispatchError> for EmulationError {
	fn from(value: DispatchError) -> Self {
		Self::Dispatch(value)
	}
}

impl From<crate::heap::ManagedHeapError> for EmulationError {
	fn from(value: crate::heap::ManagedHeapError) -> Self {
		match value {
			crate::heap::ManagedHeapError::Heap(e) => Self::Heap(e),
			crate::heap::ManagedHeapError::Layout(e) => Self::ValueFactory(e),
		}
	}
}

impl std::fmt::Display for EmulationError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{self:?}")
	}
}

impl std::error::Error for EmulationError {}
