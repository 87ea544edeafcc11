//! Arithmetic handlers. One generic handler type parameterized by operation
//! and mode, replacing the teacher's `BinaryOpCodeHandlerBase` →
//! `AddHandler`/`SubHandler`/... inheritance chain with composition.

use crate::dispatch::{DispatchResult, OpCodeHandler};
use crate::error::{DispatchError, EmulationError};
use crate::machine::ExecutionContext;
use crate::opcode::{Instruction, OpCodeId};
use crate::stack::TypeHint;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Arith {
	Add,
	Sub,
	Mul,
	Div,
	Rem,
}

/// How the operands' type hint selects behavior and whether overflow is
/// checked. `Plain` routes to integer or float arithmetic depending on the
/// operand's hint (`Add`/`Sub`/`Mul` apply to both; `Rem` is integer-only,
/// matching the closed opcode set having no `rem_r4`/`rem_r8` variant).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Mode {
	Plain { signed: bool },
	/// Integer-only, used by the `_un` division/remainder opcodes.
	Unsigned,
	/// Integer-only, overflow-checked (`add_ovf`, `sub_ovf_un`, ...).
	Checked { signed: bool },
}

pub struct BinaryOpHandler {
	arith: Arith,
	mode: Mode,
	opcodes: Vec<OpCodeId>,
}

impl BinaryOpHandler {
	pub fn new(arith: Arith, mode: Mode, opcodes: Vec<OpCodeId>) -> Self {
		Self { arith, mode, opcodes }
	}
}

impl OpCodeHandler for BinaryOpHandler {
	fn opcodes(&self) -> &[OpCodeId] {
		&self.opcodes
	}

	fn dispatch(&self, ctx: &mut ExecutionContext, _instruction: &Instruction) -> Result<DispatchResult, EmulationError> {
		let rhs = ctx.frame_mut().pop()?;
		let mut lhs = ctx.frame_mut().pop()?;

		if lhs.type_hint() != rhs.type_hint() {
			return Err(EmulationError::Dispatch(DispatchError::InvalidProgram));
		}

		match (self.mode, lhs.type_hint()) {
			(Mode::Plain { signed }, TypeHint::Integer) => {
				self.apply_integer(lhs.contents_mut().as_span_mut(), rhs.contents().as_span(), signed)?;
				ctx.frame_mut().push(lhs);
				Ok(DispatchResult::Success)
			}
			(Mode::Plain { .. }, TypeHint::Float) => {
				if self.arith == Arith::Rem {
					return Err(EmulationError::Dispatch(DispatchError::InvalidProgram));
				}
				self.apply_float(lhs.contents_mut().as_span_mut(), rhs.contents().as_span())?;
				ctx.frame_mut().push(lhs);
				Ok(DispatchResult::Success)
			}
			(Mode::Unsigned, TypeHint::Integer) => {
				self.apply_integer(lhs.contents_mut().as_span_mut(), rhs.contents().as_span(), false)?;
				ctx.frame_mut().push(lhs);
				Ok(DispatchResult::Success)
			}
			(Mode::Checked { signed }, TypeHint::Integer) => {
				let overflow = self.apply_checked(lhs.contents_mut().as_span_mut(), rhs.contents().as_span(), signed)?;
				match overflow {
					Some(true) => {
						let exception = ctx.allocate_exception()?;
						Ok(DispatchResult::Throw(exception))
					}
					_ => {
						ctx.frame_mut().push(lhs);
						Ok(DispatchResult::Success)
					}
				}
			}
			_ => Err(EmulationError::Dispatch(DispatchError::InvalidProgram)),
		}
	}
}

impl BinaryOpHandler {
	fn apply_integer(&self, mut lhs: crate::bitvector::BitVectorSpanMut<'_>, rhs: crate::bitvector::BitVectorSpan<'_>, signed: bool) -> Result<(), EmulationError> {
		match self.arith {
			Arith::Add => lhs.integer_add(rhs)?,
			Arith::Sub => lhs.integer_sub(rhs)?,
			Arith::Mul => lhs.integer_mul(rhs)?,
			Arith::Div => lhs.integer_div(rhs, signed)?,
			Arith::Rem => lhs.integer_rem(rhs, signed)?,
		}
		Ok(())
	}

	fn apply_float(&self, mut lhs: crate::bitvector::BitVectorSpanMut<'_>, rhs: crate::bitvector::BitVectorSpan<'_>) -> Result<(), EmulationError> {
		match self.arith {
			Arith::Add => lhs.float_add(rhs)?,
			Arith::Sub => lhs.float_sub(rhs)?,
			Arith::Mul => lhs.float_mul(rhs)?,
			Arith::Div => lhs.float_div(rhs)?,
			Arith::Rem => unreachable!("Rem is integer-only, rejected before reaching apply_float"),
		}
		Ok(())
	}

	fn apply_checked(&self, mut lhs: crate::bitvector::BitVectorSpanMut<'_>, rhs: crate::bitvector::BitVectorSpan<'_>, signed: bool) -> Result<Option<bool>, EmulationError> {
		Ok(match self.arith {
			Arith::Add => lhs.integer_add_ovf(rhs, signed)?,
			Arith::Sub => lhs.integer_sub_ovf(rhs, signed)?,
			Arith::Mul => lhs.integer_mul_ovf(rhs, signed)?,
			Arith::Div | Arith::Rem => unreachable!("no overflow-checked div/rem opcode exists"),
		})
	}
}
