//! Type mappings
//!
//! A `TypeMapping` pairs one host value kind with one native type. Every
//! converter owns two of them, one per direction; the registry matches
//! requested mappings against declared ones structurally, not by identity.

use gridcall_sdk::{ClassTable, NativeType, ValueKind};

/// Immutable `(value kind, native type)` pair.
///
/// Direction is positional: a converter's native→host mapping describes what
/// it emits, its host→native mapping describes what it accepts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeMapping {
    /// Host side of the pair
    pub kind: ValueKind,
    /// Native side of the pair
    pub native: NativeType,
}

impl TypeMapping {
    /// Create a mapping.
    pub fn new(kind: ValueKind, native: NativeType) -> Self {
        TypeMapping { kind, native }
    }

    /// Whether a value described by `other` is acceptable where `self` is
    /// declared: both the kind side and the native side must be assignable.
    pub fn is_assignable_from(&self, other: &TypeMapping, classes: &ClassTable) -> bool {
        self.kind.is_assignable_from(other.kind)
            && self.native.is_assignable_from(&other.native, classes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_sides_must_be_assignable() {
        let classes = ClassTable::new();
        let declared = TypeMapping::new(ValueKind::Num, NativeType::F64);

        assert!(declared
            .is_assignable_from(&TypeMapping::new(ValueKind::Num, NativeType::F64), &classes));
        assert!(!declared
            .is_assignable_from(&TypeMapping::new(ValueKind::Str, NativeType::F64), &classes));
        assert!(!declared
            .is_assignable_from(&TypeMapping::new(ValueKind::Num, NativeType::I32), &classes));
    }

    #[test]
    fn catch_all_mapping_accepts_anything() {
        let classes = ClassTable::new();
        let declared = TypeMapping::new(ValueKind::Any, NativeType::Any);
        assert!(declared
            .is_assignable_from(&TypeMapping::new(ValueKind::Object, NativeType::Str), &classes));
        assert!(declared.is_assignable_from(
            &TypeMapping::new(
                ValueKind::Array,
                NativeType::Array(Box::new(NativeType::I64))
            ),
            &classes
        ));
    }
}
