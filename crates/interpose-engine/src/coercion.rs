//! Zero values and runtime coercion rules.
//!
//! [`default_value`] produces the value an operation without an original
//! implementation resolves to. [`coerce`] converts an interceptor's result
//! (or a captured argument) to a declared type:
//!
//! - Exact matches always succeed
//! - Integer to integer when the value fits the target (checked narrowing)
//! - F64 -> F32 when the value stays finite, and F32 -> F64 (widening)
//! - Null -> any reference type (String, Object, Any)
//! - Enum -> its own enum when the discriminant is declared (or zero)
//! - Struct -> its own struct, field by field under these same rules
//! - Object -> `Object(t)` only if the runtime class is `t` or derives from /
//!   implements it (checked downcast)
//! - Anything -> Any; anything -> Unit (the value is discarded)
//! - NO implicit int <-> float, bool <-> int, or char <-> int

use interpose_core::type_id::TypeRegistry;
use interpose_core::types::{ScalarType, ValueType};

use crate::value::Value;

/// A value that could not be coerced to the requested type.
#[derive(Debug, Clone, PartialEq)]
pub struct CoercionMismatch {
    pub expected: String,
    pub actual: String,
}

/// Returns the zero-initialized value of `ty`.
///
/// Integrals and Bool -> 0 / false, Char -> `'\0'`, floating point -> 0.0,
/// references -> `Null`, enums -> discriminant 0, structs -> every field
/// zero-initialized, Unit -> `Unit`. Open generic types have no zero value
/// and resolve to `Null`; they never reach here because synthesis rejects
/// generic operations.
pub fn default_value(ty: &ValueType) -> Value {
    match ty {
        ValueType::Unit => Value::Unit,
        ValueType::Scalar(scalar) => scalar_zero(*scalar),
        ValueType::String | ValueType::Object(_) | ValueType::Any | ValueType::Generic(_) => {
            Value::Null
        }
        ValueType::Enum(def) => Value::Enum {
            name: def.name.clone(),
            variant: 0,
        },
        ValueType::Struct(def) => Value::Struct {
            name: def.name.clone(),
            fields: def.fields.values().map(default_value).collect(),
        },
    }
}

fn scalar_zero(scalar: ScalarType) -> Value {
    match scalar {
        ScalarType::Bool => Value::Bool(false),
        ScalarType::I8 => Value::I8(0),
        ScalarType::I16 => Value::I16(0),
        ScalarType::I32 => Value::I32(0),
        ScalarType::I64 => Value::I64(0),
        ScalarType::U8 => Value::U8(0),
        ScalarType::U16 => Value::U16(0),
        ScalarType::U32 => Value::U32(0),
        ScalarType::U64 => Value::U64(0),
        ScalarType::Char => Value::Char('\0'),
        ScalarType::F32 => Value::F32(0.0),
        ScalarType::F64 => Value::F64(0.0),
    }
}

/// Converts `value` to type `to`, or reports why it cannot.
///
/// The registry resolves object assignability and type names for messages.
pub fn coerce(value: Value, to: &ValueType, registry: &TypeRegistry) -> Result<Value, CoercionMismatch> {
    let mismatch = |value: &Value| CoercionMismatch {
        expected: describe_type(to, registry),
        actual: value.type_name(),
    };

    let accepted = match to {
        ValueType::Unit => return Ok(Value::Unit),
        ValueType::Any => true,
        ValueType::Generic(_) => false,
        ValueType::String => matches!(value, Value::Str(_) | Value::Null),
        ValueType::Object(target) => match &value {
            Value::Null => true,
            Value::Object(obj) => registry.is_assignable(obj.class(), *target),
            _ => false,
        },
        ValueType::Enum(def) => match &value {
            Value::Enum { name, variant } => {
                *name == def.name && (*variant == 0 || def.variants.values().any(|d| d == variant))
            }
            _ => false,
        },
        ValueType::Struct(def) => {
            return match value {
                Value::Struct { name, fields }
                    if name == def.name && fields.len() == def.fields.len() =>
                {
                    let fields = fields
                        .into_iter()
                        .zip(&def.fields)
                        .map(|(field, (field_name, ty))| {
                            coerce(field, ty, registry).map_err(|inner| CoercionMismatch {
                                expected: describe_type(to, registry),
                                actual: format!(
                                    "struct {} with field '{}' of {}",
                                    name, field_name, inner.actual
                                ),
                            })
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(Value::Struct { name, fields })
                }
                other => Err(mismatch(&other)),
            };
        }
        ValueType::Scalar(scalar) => {
            return coerce_scalar(&value, *scalar).ok_or_else(|| mismatch(&value));
        }
    };

    if accepted {
        Ok(value)
    } else {
        Err(mismatch(&value))
    }
}

fn coerce_scalar(value: &Value, to: ScalarType) -> Option<Value> {
    if to.is_integer() {
        let v = value.as_integer()?;
        return narrow_integer(v, to);
    }
    match (to, value) {
        (ScalarType::Bool, Value::Bool(b)) => Some(Value::Bool(*b)),
        (ScalarType::Char, Value::Char(c)) => Some(Value::Char(*c)),
        (ScalarType::F32, Value::F32(v)) => Some(Value::F32(*v)),
        (ScalarType::F32, Value::F64(v)) => {
            let narrowed = *v as f32;
            (narrowed.is_finite() || !v.is_finite()).then_some(Value::F32(narrowed))
        }
        (ScalarType::F64, Value::F64(v)) => Some(Value::F64(*v)),
        (ScalarType::F64, Value::F32(v)) => Some(Value::F64(f64::from(*v))),
        _ => None,
    }
}

/// Converts a widened integer to the target integer type if it fits.
fn narrow_integer(v: i128, to: ScalarType) -> Option<Value> {
    match to {
        ScalarType::I8 => i8::try_from(v).ok().map(Value::I8),
        ScalarType::I16 => i16::try_from(v).ok().map(Value::I16),
        ScalarType::I32 => i32::try_from(v).ok().map(Value::I32),
        ScalarType::I64 => i64::try_from(v).ok().map(Value::I64),
        ScalarType::U8 => u8::try_from(v).ok().map(Value::U8),
        ScalarType::U16 => u16::try_from(v).ok().map(Value::U16),
        ScalarType::U32 => u32::try_from(v).ok().map(Value::U32),
        ScalarType::U64 => u64::try_from(v).ok().map(Value::U64),
        _ => None,
    }
}

/// Renders a type for diagnostics, resolving object types to their names.
pub fn describe_type(ty: &ValueType, registry: &TypeRegistry) -> String {
    match ty {
        ValueType::Object(id) => format!("object {}", registry.name_of(*id)),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use interpose_core::contract::TypeDef;
    use interpose_core::types::{EnumDef, StructDef};
    use proptest::prelude::*;

    use crate::value::ObjectRef;

    fn registry() -> TypeRegistry {
        TypeRegistry::new()
    }

    // -----------------------------------------------------------------------
    // default_value
    // -----------------------------------------------------------------------

    #[test]
    fn integral_defaults_are_zero() {
        assert_eq!(default_value(&ValueType::I32), Value::I32(0));
        assert_eq!(default_value(&ValueType::Scalar(ScalarType::U8)), Value::U8(0));
        assert_eq!(default_value(&ValueType::BOOL), Value::Bool(false));
        assert_eq!(default_value(&ValueType::Scalar(ScalarType::Char)), Value::Char('\0'));
    }

    #[test]
    fn float_defaults_are_zero() {
        assert_eq!(default_value(&ValueType::F64), Value::F64(0.0));
        assert_eq!(default_value(&ValueType::Scalar(ScalarType::F32)), Value::F32(0.0));
    }

    #[test]
    fn reference_defaults_are_null() {
        assert_eq!(default_value(&ValueType::String), Value::Null);
        assert_eq!(default_value(&ValueType::Any), Value::Null);
        assert_eq!(
            default_value(&ValueType::Object(interpose_core::TypeId(0))),
            Value::Null
        );
    }

    #[test]
    fn enum_default_is_discriminant_zero() {
        let ty = ValueType::Enum(EnumDef::new("Level", &["Low", "High"]));
        assert_eq!(
            default_value(&ty),
            Value::Enum {
                name: "Level".into(),
                variant: 0
            }
        );
    }

    #[test]
    fn struct_default_zeroes_every_field() {
        let inner = ValueType::Struct(StructDef {
            name: "Inner".into(),
            fields: IndexMap::from([("flag".to_string(), ValueType::BOOL)]),
        });
        let ty = ValueType::Struct(StructDef {
            name: "Outer".into(),
            fields: IndexMap::from([
                ("count".to_string(), ValueType::I64),
                ("label".to_string(), ValueType::String),
                ("inner".to_string(), inner),
            ]),
        });

        assert_eq!(
            default_value(&ty),
            Value::Struct {
                name: "Outer".into(),
                fields: vec![
                    Value::I64(0),
                    Value::Null,
                    Value::Struct {
                        name: "Inner".into(),
                        fields: vec![Value::Bool(false)],
                    },
                ],
            }
        );
    }

    // -----------------------------------------------------------------------
    // coerce
    // -----------------------------------------------------------------------

    #[test]
    fn exact_match_coerces() {
        let reg = registry();
        assert_eq!(coerce(Value::I32(5), &ValueType::I32, &reg), Ok(Value::I32(5)));
        assert_eq!(
            coerce(Value::from("x"), &ValueType::String, &reg),
            Ok(Value::from("x"))
        );
    }

    #[test]
    fn integers_narrow_when_they_fit() {
        let reg = registry();
        assert_eq!(coerce(Value::I64(42), &ValueType::I32, &reg), Ok(Value::I32(42)));
        assert_eq!(
            coerce(Value::I32(200), &ValueType::Scalar(ScalarType::U8), &reg),
            Ok(Value::U8(200))
        );
        assert!(coerce(Value::I64(i64::MAX), &ValueType::I32, &reg).is_err());
        assert!(coerce(Value::I32(-1), &ValueType::Scalar(ScalarType::U32), &reg).is_err());
    }

    #[test]
    fn floats_convert_between_widths_only() {
        let reg = registry();
        assert_eq!(
            coerce(Value::F64(1.5), &ValueType::Scalar(ScalarType::F32), &reg),
            Ok(Value::F32(1.5))
        );
        assert_eq!(coerce(Value::F32(2.0), &ValueType::F64, &reg), Ok(Value::F64(2.0)));
        assert!(coerce(Value::I32(1), &ValueType::F64, &reg).is_err());
        assert!(coerce(Value::F64(1.0), &ValueType::I64, &reg).is_err());
    }

    #[test]
    fn bool_and_char_do_not_convert() {
        let reg = registry();
        assert!(coerce(Value::Bool(true), &ValueType::I32, &reg).is_err());
        assert!(coerce(Value::I32(1), &ValueType::BOOL, &reg).is_err());
        assert!(coerce(Value::Char('a'), &ValueType::I32, &reg).is_err());
    }

    #[test]
    fn null_coerces_to_references_only() {
        let reg = registry();
        assert_eq!(coerce(Value::Null, &ValueType::String, &reg), Ok(Value::Null));
        assert_eq!(coerce(Value::Null, &ValueType::Any, &reg), Ok(Value::Null));
        let err = coerce(Value::Null, &ValueType::I32, &reg).unwrap_err();
        assert_eq!(err.expected, "I32");
        assert_eq!(err.actual, "null");
    }

    #[test]
    fn objects_require_assignable_class() {
        let mut reg = registry();
        let shape = reg.register_named(TypeDef::interface("Shape")).unwrap();
        let circle = reg
            .register_named(TypeDef::class("Circle").implements(shape))
            .unwrap();
        let other = reg.register_named(TypeDef::class("Other")).unwrap();

        let obj = Value::Object(ObjectRef::new(circle, ()));
        assert!(coerce(obj.clone(), &ValueType::Object(shape), &reg).is_ok());
        assert!(coerce(obj.clone(), &ValueType::Object(circle), &reg).is_ok());

        let err = coerce(obj, &ValueType::Object(other), &reg).unwrap_err();
        assert_eq!(err.expected, "object Other");
    }

    #[test]
    fn enums_match_by_name() {
        let reg = registry();
        let level = ValueType::Enum(EnumDef::new("Level", &["Low"]));
        let ok = Value::Enum {
            name: "Level".into(),
            variant: 0,
        };
        let wrong = Value::Enum {
            name: "Mode".into(),
            variant: 0,
        };
        assert!(coerce(ok, &level, &reg).is_ok());
        assert!(coerce(wrong, &level, &reg).is_err());
        assert!(coerce(Value::I32(0), &level, &reg).is_err());
    }

    #[test]
    fn enum_discriminant_must_be_declared() {
        let reg = registry();
        let level = ValueType::Enum(EnumDef::new("Level", &["Low", "High"]));
        let high = Value::Enum {
            name: "Level".into(),
            variant: 1,
        };
        assert_eq!(coerce(high.clone(), &level, &reg), Ok(high));

        let err = coerce(
            Value::Enum {
                name: "Level".into(),
                variant: 99,
            },
            &level,
            &reg,
        )
        .unwrap_err();
        assert_eq!(err.actual, "enum Level");
    }

    fn point() -> ValueType {
        ValueType::Struct(StructDef {
            name: "Point".into(),
            fields: IndexMap::from([
                ("x".to_string(), ValueType::I64),
                ("y".to_string(), ValueType::I64),
            ]),
        })
    }

    #[test]
    fn struct_fields_are_coerced_one_by_one() {
        let reg = registry();
        let narrow = Value::Struct {
            name: "Point".into(),
            fields: vec![Value::I32(1), Value::U8(2)],
        };
        assert_eq!(
            coerce(narrow, &point(), &reg),
            Ok(Value::Struct {
                name: "Point".into(),
                fields: vec![Value::I64(1), Value::I64(2)],
            })
        );
    }

    #[test]
    fn struct_with_mistyped_field_is_rejected() {
        let reg = registry();
        let bad = Value::Struct {
            name: "Point".into(),
            fields: vec![Value::I64(1), Value::from("not a number")],
        };
        let err = coerce(bad, &point(), &reg).unwrap_err();
        assert!(err.actual.contains("field 'y' of String"), "{}", err.actual);

        let short = Value::Struct {
            name: "Point".into(),
            fields: vec![Value::I64(1)],
        };
        assert!(coerce(short, &point(), &reg).is_err());
    }

    #[test]
    fn f64_to_f32_must_stay_finite() {
        let reg = registry();
        let f32_ty = ValueType::Scalar(ScalarType::F32);
        assert!(coerce(Value::F64(1e300), &f32_ty, &reg).is_err());
        assert_eq!(
            coerce(Value::F64(f64::INFINITY), &f32_ty, &reg),
            Ok(Value::F32(f32::INFINITY))
        );
        assert!(matches!(
            coerce(Value::F64(f64::NAN), &f32_ty, &reg),
            Ok(Value::F32(v)) if v.is_nan()
        ));
    }

    #[test]
    fn anything_goes_to_any_and_unit() {
        let reg = registry();
        assert_eq!(coerce(Value::I8(3), &ValueType::Any, &reg), Ok(Value::I8(3)));
        assert_eq!(coerce(Value::from("dropped"), &ValueType::Unit, &reg), Ok(Value::Unit));
    }

    proptest! {
        #[test]
        fn every_default_coerces_to_its_own_type(pick in 0usize..12) {
            let scalars = [
                ScalarType::Bool, ScalarType::I8, ScalarType::I16, ScalarType::I32,
                ScalarType::I64, ScalarType::U8, ScalarType::U16, ScalarType::U32,
                ScalarType::U64, ScalarType::Char, ScalarType::F32, ScalarType::F64,
            ];
            let ty = ValueType::Scalar(scalars[pick]);
            let zero = default_value(&ty);
            prop_assert_eq!(coerce(zero.clone(), &ty, &registry()), Ok(zero));
        }

        #[test]
        fn i64_to_i32_succeeds_exactly_when_in_range(v in any::<i64>()) {
            let result = coerce(Value::I64(v), &ValueType::I32, &registry());
            let fits = i32::try_from(v).is_ok();
            prop_assert_eq!(result.is_ok(), fits);
            if let Ok(Value::I32(narrowed)) = result {
                prop_assert_eq!(i64::from(narrowed), v);
            }
        }
    }
}
