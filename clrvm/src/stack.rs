//! Evaluation-stack entries: a bitvector payload tagged with a type hint.
//! The type hint is a dispatch aid, not a semantic type — it tells
//! `Add`/`Sub`/`Mul`/`Div` whether to route to integer or IEEE-754
//! arithmetic.

use clrvm_derive::FromRepr;

use crate::bitvector::BitVector;
use crate::indices::Address;

/// Three-valued truth: `Known-true`, `Known-false`, or `Unknown`.
/// `!Unknown == Unknown`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Three {
	False,
	True,
	Unknown,
}

impl std::ops::Not for Three {
	type Output = Three;
	fn not(self) -> Three {
		match self {
			Three::False => Three::True,
			Three::True => Three::False,
			Three::Unknown => Three::Unknown,
		}
	}
}

#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, FromRepr)]
pub enum TypeHint {
	Integer = 0,
	Float = 1,
	Ref = 2,
	Struct = 3,
}

/// `(contents, typeHint, size)`. `size` is implicit in
/// `contents.byte_len()`, so it is not stored separately.
#[derive(Debug, Clone)]
pub struct StackSlot {
	contents: BitVector,
	type_hint: TypeHint,
}

impl StackSlot {
	pub fn new(contents: BitVector, type_hint: TypeHint) -> Self {
		Self { contents, type_hint }
	}

	pub fn integer(value: i64, bit_len: usize) -> Self {
		let mut bv = BitVector::zeroed(bit_len).expect("non-zero bit_len");
		bv.as_span_mut().set_u64(value as u64);
		Self::new(bv, TypeHint::Integer)
	}

	pub fn float32(value: f32) -> Self {
		Self::new(BitVector::from_le_bytes(&value.to_le_bytes()), TypeHint::Float)
	}

	pub fn float64(value: f64) -> Self {
		Self::new(BitVector::from_le_bytes(&value.to_le_bytes()), TypeHint::Float)
	}

	/// A known-null reference, pointer-width wide.
	pub fn null_ref(pointer_size: u32) -> Self {
		Self::new(BitVector::zeroed(pointer_size as usize * 8).expect("non-zero pointer size"), TypeHint::Ref)
	}

	/// A known-non-null reference to `address`.
	pub fn reference(address: Address, pointer_size: u32) -> Self {
		let mut bv = BitVector::zeroed(pointer_size as usize * 8).expect("non-zero pointer size");
		bv.as_span_mut().set_u64(address.0);
		Self::new(bv, TypeHint::Ref)
	}

	/// A reference whose nullness is not known.
	pub fn unknown_ref(pointer_size: u32) -> Self {
		Self::new(BitVector::unknown(pointer_size as usize * 8).expect("non-zero pointer size"), TypeHint::Ref)
	}

	pub fn struct_value(contents: BitVector) -> Self {
		Self::new(contents, TypeHint::Struct)
	}

	#[inline]
	pub fn type_hint(&self) -> TypeHint {
		self.type_hint
	}

	#[inline]
	pub fn contents(&self) -> &BitVector {
		&self.contents
	}

	#[inline]
	pub fn contents_mut(&mut self) -> &mut BitVector {
		&mut self.contents
	}

	#[inline]
	pub fn byte_size(&self) -> usize {
		self.contents.byte_len()
	}

	/// Three-valued "every bit is zero". Works for any type hint: a null
	/// reference, a zero integer, and a `+0.0`/`-0.0` float all share the
	/// all-zero bit pattern.
	pub fn is_zero(&self) -> Three {
		let span = self.contents.as_span();
		let any_known_one = span.known_bit_indices().any(|bit| {
			let byte = span.bits()[bit / 8];
			(byte >> (bit % 8)) & 1 != 0
		});
		if any_known_one {
			return Three::False;
		}
		if span.is_fully_known() { Three::True } else { Three::Unknown }
	}

	pub fn is_non_zero(&self) -> Three {
		!self.is_zero()
	}

	/// "Is this reference null." Alias of [`Self::is_zero`] for `Ref`
	/// slots, spelled out separately since that's the more natural name
	/// for a reference-typed slot.
	pub fn is_null(&self) -> Three {
		debug_assert_eq!(self.type_hint, TypeHint::Ref);
		self.is_zero()
	}

	/// For `Ref` slots, `IsPositive` is `false` when `isNull` is known and
	/// `Unknown` otherwise. For `Integer`/`Float` slots this is an ordinary
	/// sign test used by signed branch comparisons.
	pub fn is_positive(&self) -> Three {
		match self.type_hint {
			TypeHint::Ref => match self.is_null() {
				Three::Unknown => Three::Unknown,
				_ => Three::False,
			},
			TypeHint::Integer => match (self.is_zero(), self.sign_bit()) {
				(Three::True, _) => Three::False,
				(_, Some(true)) => Three::False,
				(Three::False, Some(false)) => Three::True,
				_ => Three::Unknown,
			},
			TypeHint::Float => match self.float_sign_bit() {
				Some(negative) => if negative { Three::False } else { Three::True },
				None => Three::Unknown,
			},
			TypeHint::Struct => Three::Unknown,
		}
	}

	/// `IsNegative` is always `false` for `Ref` slots.
	pub fn is_negative(&self) -> Three {
		match self.type_hint {
			TypeHint::Ref => Three::False,
			TypeHint::Integer => match self.sign_bit() {
				Some(true) => Three::True,
				Some(false) => Three::False,
				None => Three::Unknown,
			},
			TypeHint::Float => match self.float_sign_bit() {
				Some(negative) => if negative { Three::True } else { Three::False },
				None => Three::Unknown,
			},
			TypeHint::Struct => Three::Unknown,
		}
	}

	fn sign_bit(&self) -> Option<bool> {
		if !self.contents.is_fully_known() {
			return None;
		}
		let bit_len = self.contents.bit_len();
		let top = bit_len - 1;
		let byte = self.contents.bits()[top / 8];
		Some((byte >> (top % 8)) & 1 != 0)
	}

	fn float_sign_bit(&self) -> Option<bool> {
		if !self.contents.is_fully_known() {
			return None;
		}
		self.contents.bits().last().map(|b| b & 0x80 != 0)
	}

	/// Reinterprets a reference as a native-width integer: known-zero bits
	/// iff the reference is known null, fully unknown otherwise.
	pub fn reinterpret_ref_as_integer(&self, bit_len: usize) -> BitVector {
		debug_assert_eq!(self.type_hint, TypeHint::Ref);
		match self.is_null() {
			Three::True => BitVector::zeroed(bit_len).expect("non-zero bit_len"),
			_ => BitVector::unknown(bit_len).expect("non-zero bit_len"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn known_zero_integer_is_known_zero() {
		let slot = StackSlot::integer(0, 32);
		assert_eq!(slot.is_zero(), Three::True);
	}

	#[test]
	fn known_nonzero_integer_is_known_nonzero() {
		let slot = StackSlot::integer(5, 32);
		assert_eq!(slot.is_zero(), Three::False);
		assert_eq!(slot.is_non_zero(), Three::True);
	}

	#[test]
	fn unknown_bits_yield_unknown_truth() {
		let slot = StackSlot::new(BitVector::unknown(32).unwrap(), TypeHint::Integer);
		assert_eq!(slot.is_zero(), Three::Unknown);
	}

	#[test]
	fn null_ref_is_known_null() {
		let slot = StackSlot::null_ref(8);
		assert_eq!(slot.is_null(), Three::True);
		assert_eq!(slot.is_positive(), Three::False);
		assert_eq!(slot.is_negative(), Three::False);
	}

	#[test]
	fn nonnull_ref_is_not_positive_or_negative() {
		let slot = StackSlot::reference(Address(0x1000), 8);
		assert_eq!(slot.is_null(), Three::False);
		assert_eq!(slot.is_positive(), Three::False);
		assert_eq!(slot.is_negative(), Three::False);
	}

	#[test]
	fn negative_integer_sign_bit() {
		let slot = StackSlot::integer(-1, 32);
		assert_eq!(slot.is_negative(), Three::True);
		assert_eq!(slot.is_positive(), Three::False);
	}

	#[test]
	fn reinterpret_known_null_ref_is_known_zero() {
		let slot = StackSlot::null_ref(4);
		let bv = slot.reinterpret_ref_as_integer(32);
		assert!(bv.is_fully_known());
		assert_eq!(bv.to_u64(), 0);
	}

	#[test]
	fn reinterpret_nonnull_ref_is_unknown() {
		let slot = StackSlot::reference(Address(0x40), 4);
		let bv = slot.reinterpret_ref_as_integer(32);
		assert!(!bv.is_fully_known());
	}
}
