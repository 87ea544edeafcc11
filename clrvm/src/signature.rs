//! Generic-context signature resolution.
//!
//! A small external collaborator: given an ambient [`GenericContext`], it
//! substitutes formal type/method parameters in a [`TypeSignature`] with
//! concrete arguments. Grounded in `raw::il::TypeSignatureTag` and the
//! `TypeData::{TypeGeneric, MethodGeneric}` placeholders the teacher never
//! finished (`get_generic_instantiation` is left as a `// TODO` there); this
//! module is the completed version, working over an owned signature tree
//! rather than the teacher's byte-slice view, since bytecode/metadata
//! parsing is out of scope here: resolution runs after a field or method
//! signature has already been decoded by the caller.

use std::rc::Rc;

/// Stable identity of a `TypeDef`/`TypeRef` row, standing in for the
/// teacher's `TypeDefOrRef` coded index now that metadata resolution is an
/// external collaborator.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TypeToken(pub u32);

/// Mirrors `raw::il::TypeSignatureTag`, minus the two tags (`CModReq`,
/// `Sentinel`, custom-attribute encodings) that only matter while parsing a
/// signature blob.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeSignature {
	Void,
	Bool,
	Char,
	Int1,
	UInt1,
	Int2,
	UInt2,
	Int4,
	UInt4,
	Int8,
	UInt8,
	Float,
	Double,
	String,
	Object,
	IntPtr,
	UIntPtr,
	Pointer(Rc<TypeSignature>),
	Reference(Rc<TypeSignature>),
	SzArray(Rc<TypeSignature>),
	Array(Rc<TypeSignature>),
	ValueType(TypeToken),
	ClassType(TypeToken),
	/// Formal parameter of the declaring *type*'s generic definition.
	GenericParam(u32),
	/// Formal parameter of the declaring *method*'s generic definition.
	MethodGenericParam(u32),
	/// A generic type instantiated with concrete (or still-formal) arguments.
	GenericInst(Rc<TypeSignature>, Vec<TypeSignature>),
}

/// Ambient substitution context: the declaring type's and method's generic
/// arguments, `(typeArgs, methodArgs)`.
#[derive(Debug, Clone, Default)]
pub struct GenericContext {
	type_args: Vec<TypeSignature>,
	method_args: Vec<TypeSignature>,
}

impl GenericContext {
	pub fn new(type_args: Vec<TypeSignature>, method_args: Vec<TypeSignature>) -> Self {
		Self { type_args, method_args }
	}

	pub const fn empty() -> Self {
		Self { type_args: Vec::new(), method_args: Vec::new() }
	}

	pub fn is_empty(&self) -> bool {
		self.type_args.is_empty() && self.method_args.is_empty()
	}

	pub fn type_args(&self) -> &[TypeSignature] {
		&self.type_args
	}

	pub fn method_args(&self) -> &[TypeSignature] {
		&self.method_args
	}

	/// `ResolveGenericType(t)`: recursively substitutes formal parameters.
	/// Indices outside the bound arguments are left unresolved (the formal
	/// parameter is returned unchanged) rather than panicking, since an
	/// under-populated context is a caller bug the emulator shouldn't crash
	/// on mid-step.
	#[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
	pub fn resolve_generic_type(&self, ty: &TypeSignature) -> TypeSignature {
		use TypeSignature::*;
		match ty {
			GenericParam(i) => self.type_args.get(*i as usize).cloned().unwrap_or_else(|| ty.clone()),
			MethodGenericParam(i) => self.method_args.get(*i as usize).cloned().unwrap_or_else(|| ty.clone()),
			Pointer(inner) => Pointer(Rc::new(self.resolve_generic_type(inner))),
			Reference(inner) => Reference(Rc::new(self.resolve_generic_type(inner))),
			SzArray(inner) => SzArray(Rc::new(self.resolve_generic_type(inner))),
			Array(inner) => Array(Rc::new(self.resolve_generic_type(inner))),
			GenericInst(base, args) => {
				let base = Rc::new(self.resolve_generic_type(base));
				let args = args.iter().map(|a| self.resolve_generic_type(a)).collect();
				GenericInst(base, args)
			}
			other => other.clone(),
		}
	}
}

/// `ResolveFieldType(field)`: resolves `field_type` under `ctx`, first
/// populating `ctx` from `declaring_type_args` if `ctx` is empty — a field
/// reference typically carries no method-generic context of its own, so it
/// falls back to its declaring type's arguments.
#[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
pub fn resolve_field_type(ctx: &GenericContext, declaring_type_args: &[TypeSignature], field_type: &TypeSignature) -> TypeSignature {
	if ctx.is_empty() && !declaring_type_args.is_empty() {
		let populated = GenericContext::new(declaring_type_args.to_vec(), Vec::new());
		return populated.resolve_generic_type(field_type);
	}
	ctx.resolve_generic_type(field_type)
}
