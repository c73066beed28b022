use nova_remote::{InvokeTarget, MethodBehavior, PrimitiveValue, RemoteValue};
use pretty_assertions::assert_eq;

use super::fixtures::Session;

#[test]
fn casts_follow_inheritance_and_widening() {
    let s = Session::new();
    let long = s.core("System.Int64");
    let int = s.core("System.Int32");
    let object = s.core("System.Object");
    let shape = s.mock.add_class("App.Shape", None);
    let circle = s.mock.add_class("App.Circle", Some(&shape));
    let square = s.mock.add_class("App.Square", Some(&shape));
    let c = s.mock.new_object(&circle, Vec::new());

    assert_eq!(
        s.eval.try_cast(&PrimitiveValue::I32(7).into(), &long).unwrap(),
        Some(PrimitiveValue::I64(7).into())
    );
    assert_eq!(
        s.eval.try_cast(&PrimitiveValue::I64(7).into(), &int).unwrap(),
        None
    );
    assert_eq!(s.eval.try_cast(&c, &shape).unwrap(), Some(c.clone()));
    assert_eq!(s.eval.try_cast(&c, &object).unwrap(), Some(c.clone()));
    assert_eq!(s.eval.try_cast(&c, &square).unwrap(), None);
    assert_eq!(
        s.eval.try_cast(&RemoteValue::Null, &shape).unwrap(),
        Some(RemoteValue::Null)
    );
    assert_eq!(s.eval.try_cast(&RemoteValue::Null, &int).unwrap(), None);
}

#[test]
fn conversions_add_explicit_numeric_narrowing() {
    let s = Session::new();
    let int = s.core("System.Int32");
    let byte = s.core("System.Byte");
    let ctx = s.ctx();

    assert_eq!(
        s.eval
            .try_convert(&ctx, &PrimitiveValue::F64(3.9).into(), &int)
            .unwrap(),
        Some(PrimitiveValue::I32(3).into())
    );
    assert_eq!(
        s.eval
            .try_convert(&ctx, &PrimitiveValue::I32(258).into(), &byte)
            .unwrap(),
        Some(PrimitiveValue::U8(2).into())
    );
    assert_eq!(
        s.eval
            .try_convert(&ctx, &PrimitiveValue::Bool(true).into(), &int)
            .unwrap(),
        None
    );
}

#[test]
fn enums_convert_to_and_from_integers() {
    let s = Session::new();
    let int = s.core("System.Int32");
    let long = s.core("System.Int64");
    let color = s.mock.add_enum("App.Color", &[("Red", 1), ("Green", 2)]);

    let green = s
        .eval
        .try_cast(&PrimitiveValue::I32(2).into(), &color)
        .unwrap()
        .unwrap();
    assert_eq!(
        green,
        RemoteValue::Enum {
            ty: color.clone(),
            value: PrimitiveValue::I32(2),
        }
    );
    assert_eq!(
        s.eval.try_cast(&green, &long).unwrap(),
        Some(PrimitiveValue::I64(2).into())
    );
    assert_eq!(
        s.eval.try_cast(&green, &int).unwrap(),
        Some(PrimitiveValue::I32(2).into())
    );
}

#[test]
fn user_defined_operator_is_invoked_statically() {
    let s = Session::new();
    let celsius = s.mock.add_class("App.Celsius", None);
    let fahrenheit = s.mock.add_class("App.Fahrenheit", None);
    let op = s
        .mock
        .add_method_with(&celsius, "op_Implicit", &[&celsius], Some(&fahrenheit), |m| {
            m.is_static = true
        });
    let converted = s.mock.new_object(&fahrenheit, Vec::new());
    s.mock
        .set_behavior(&op, MethodBehavior::Return(converted.clone()));
    let boiling = s.mock.new_object(&celsius, Vec::new());
    let ctx = s.ctx();

    assert_eq!(s.eval.try_cast(&boiling, &fahrenheit).unwrap(), None);
    assert_eq!(
        s.eval.try_convert(&ctx, &boiling, &fahrenheit).unwrap(),
        Some(converted)
    );
    let recorded = s.mock.calls().begin_invoke;
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].method, op.id);
    assert_eq!(recorded[0].target, InvokeTarget::Type(celsius.id()));
    assert_eq!(recorded[0].args, [boiling]);
}
