use nova_eval::{BindingFlags, EvalError, EvaluationContext, ReferenceKind};
use nova_remote::{
    FrameId, LocalInfo, MethodBehavior, MockFrame, ParameterInfo, PrimitiveValue, PropertyInfo,
    RemoteValue, Visibility,
};
use pretty_assertions::assert_eq;

use super::fixtures::{local, names, Session, THREAD};

#[test]
fn base_typed_reference_reports_runtime_override() {
    let s = Session::new();
    let string = s.core("System.String");
    let animal = s.mock.add_class("App.Animal", None);
    let dog = s.mock.add_class("App.Dog", Some(&animal));
    s.mock.add_property_with(
        &animal,
        "Sound",
        &string,
        MethodBehavior::Return(s.mock.new_string("...")),
        |g| g.is_virtual = true,
    );
    s.mock.add_property_with(
        &dog,
        "Sound",
        &string,
        MethodBehavior::Return(s.mock.new_string("Woof")),
        |g| g.is_virtual = true,
    );
    let rex = s.mock.new_object(&dog, Vec::new());
    let ctx = s.ctx();

    let members = s
        .eval
        .members(&animal, Some(&rex), BindingFlags::PUBLIC_INSTANCE)
        .unwrap();
    assert_eq!(names(&members), ["Sound"]);
    assert_eq!(members[0].declaring_type(), Some(dog.id()));
    let sound = members[0].read(&s.eval, &ctx).unwrap();
    assert_eq!(s.eval.value_to_string(&ctx, &sound).unwrap(), "Woof");
}

#[test]
fn member_lookup_honours_case_sensitivity() {
    let s = Session::new();
    let int = s.core("System.Int32");
    let account = s.mock.add_class("App.Account", None);
    let balance = s.mock.add_field(&account, "Balance", &int, false);
    let instance = s
        .mock
        .new_object(&account, vec![(balance.id, PrimitiveValue::I32(12).into())]);

    let strict = s.ctx();
    assert_eq!(
        s.eval.member(&strict, &account, Some(&instance), "balance").unwrap(),
        None
    );

    let mut relaxed = s.ctx();
    relaxed.options.case_sensitive = false;
    let found = s
        .eval
        .member(&relaxed, &account, Some(&instance), "balance")
        .unwrap()
        .unwrap();
    assert_eq!(found.name(), "Balance");
    assert_eq!(
        found.read(&s.eval, &relaxed).unwrap(),
        PrimitiveValue::I32(12).into()
    );
}

#[test]
fn just_my_code_skips_external_bases() {
    let s = Session::new();
    let int = s.core("System.Int32");
    let framework = s.mock.add_class("Framework.Component", None);
    s.mock.set_external(&framework, true);
    s.mock.add_field(&framework, "site", &int, false);
    let widget = s.mock.add_class("App.Widget", Some(&framework));
    s.mock.add_field(&widget, "width", &int, false);
    let instance = s.mock.new_object(&widget, Vec::new());

    let all = s.eval.members(&widget, Some(&instance), BindingFlags::ALL).unwrap();
    assert_eq!(names(&all), ["width", "site"]);

    let mine = BindingFlags {
        just_my_code: true,
        ..BindingFlags::ALL
    };
    let filtered = s.eval.members(&widget, Some(&instance), mine).unwrap();
    assert_eq!(names(&filtered), ["width"]);
}

#[test]
fn fields_and_locals_are_writable_but_struct_snapshots_are_not() {
    let s = Session::new();
    let int = s.core("System.Int32");
    let counter = s.mock.add_class("App.Counter", None);
    let hits = s.mock.add_field(&counter, "hits", &int, false);
    let instance = s.mock.new_object(&counter, Vec::new());
    let point = s.mock.add_struct("App.Point");
    let x = s.mock.add_field(&point, "X", &int, false);
    let origin = s
        .mock
        .struct_value(&point, vec![(x.id, PrimitiveValue::I32(0).into())]);
    let run = s.mock.add_method(&counter, "Run", &[], None);
    let frame = s.mock.add_frame(MockFrame {
        method: run,
        this: instance.clone(),
        locals: vec![(local(0, "step", &int), PrimitiveValue::I32(1).into())],
        absent_information: false,
    });
    let ctx = s.eval.context(THREAD, frame);

    let field = s.eval.member(&ctx, &counter, Some(&instance), "hits").unwrap().unwrap();
    field
        .write(&s.eval, &ctx, PrimitiveValue::I32(5).into())
        .unwrap();
    assert_eq!(
        s.mock.field_value(instance.object_id().unwrap(), hits.id),
        Some(PrimitiveValue::I32(5).into())
    );

    let step = s.eval.local_variable(&ctx, "step").unwrap().unwrap();
    step.write(&s.eval, &ctx, PrimitiveValue::I32(2).into()).unwrap();
    assert_eq!(step.read(&s.eval, &ctx).unwrap(), PrimitiveValue::I32(2).into());

    let snapshot_x = s.eval.member(&ctx, &point, Some(&origin), "X").unwrap().unwrap();
    assert!(snapshot_x.is_read_only());
    assert_eq!(
        snapshot_x.write(&s.eval, &ctx, PrimitiveValue::I32(9).into()),
        Err(EvalError::ReadOnly("X".to_string()))
    );

    let this = s.eval.this_reference(&ctx).unwrap().unwrap();
    assert!(matches!(this.kind(), ReferenceKind::This(v) if *v == instance));
}

#[test]
fn current_exception_is_exposed_as_a_reference() {
    let s = Session::new();
    let exception = s.core("System.Exception");
    let ctx = s.ctx();
    assert_eq!(s.eval.current_exception(&ctx).unwrap(), None);

    let thrown = s.mock.new_exception(&exception, "disk full");
    s.mock.set_current_exception(THREAD, thrown.clone());
    let reference = s.eval.current_exception(&ctx).unwrap().unwrap();
    assert_eq!(reference.declared_type(), Some(exception.id()));
    assert!(reference.is_read_only());
    assert_eq!(reference.read(&s.eval, &ctx).unwrap(), thrown);

    let message = s
        .eval
        .member(&ctx, &exception, Some(&thrown), "Message")
        .unwrap()
        .unwrap();
    let text = message.read(&s.eval, &ctx).unwrap();
    assert_eq!(s.eval.value_to_string(&ctx, &text).unwrap(), "disk full");
}

#[test]
fn parameters_are_listed_separately_from_locals() {
    let s = Session::new();
    let int = s.core("System.Int32");
    let ty = s.mock.add_class("App.Math", None);
    let square = s.mock.add_method_with(&ty, "Square", &[&int], Some(&int), |m| {
        m.is_static = true
    });
    let frame = s.mock.add_frame(MockFrame {
        method: square,
        this: RemoteValue::Null,
        locals: vec![
            (
                LocalInfo {
                    index: 0,
                    name: Some("n".to_string()),
                    ty: int.id(),
                    is_argument: true,
                },
                PrimitiveValue::I32(7).into(),
            ),
            (local(0, "result", &int), PrimitiveValue::I32(49).into()),
        ],
        absent_information: false,
    });
    let ctx = s.eval.context(THREAD, frame);

    assert_eq!(names(&s.eval.parameters(&ctx).unwrap()), ["n"]);
    assert_eq!(names(&s.eval.local_variables(&ctx).unwrap()), ["result"]);
    assert!(s.eval.local_variable(&ctx, "n").unwrap().is_none());
    let n = s.eval.parameter(&ctx, "n").unwrap().unwrap();
    assert_eq!(n.read(&s.eval, &ctx).unwrap(), PrimitiveValue::I32(7).into());
    assert_eq!(s.eval.this_reference(&ctx).unwrap(), None);

    let other = s.eval.context(THREAD, FrameId(9_999));
    assert!(s.eval.local_variables(&other).is_err());
}

#[test]
fn private_members_need_non_public_flag() {
    let s = Session::new();
    let int = s.core("System.Int32");
    let vault = s.mock.add_class("App.Vault", None);
    s.mock.add_field_with(&vault, "secret", &int, |f| f.visibility = Visibility::Private);
    s.mock.add_field(&vault, "label", &int, false);
    let instance = s.mock.new_object(&vault, Vec::new());

    let public = s
        .eval
        .members(&vault, Some(&instance), BindingFlags::PUBLIC_INSTANCE)
        .unwrap();
    assert_eq!(names(&public), ["label"]);
    let all = s.eval.members(&vault, Some(&instance), BindingFlags::ALL).unwrap();
    assert_eq!(names(&all), ["secret", "label"]);
}

#[test]
fn indexer_elements_go_through_the_item_accessors() {
    let s = Session::new();
    let int = s.core("System.Int32");
    let string = s.core("System.String");
    let inventory = s.mock.add_class("App.Inventory", None);
    let by_name = s.mock.add_property_with(
        &inventory,
        "Item",
        &int,
        MethodBehavior::Return(PrimitiveValue::I32(7).into()),
        |g| {
            g.parameters = vec![ParameterInfo {
                name: "name".to_string(),
                ty: string.id(),
            }]
        },
    );
    let setter = s.mock.add_method(&inventory, "set_Item", &[&string, &int], None);
    s.mock.update_property(&PropertyInfo {
        setter: Some(setter.clone()),
        ..by_name.clone()
    });
    s.mock.add_property_with(
        &inventory,
        "Item",
        &int,
        MethodBehavior::Return(PrimitiveValue::I32(1).into()),
        |g| {
            g.parameters = vec![ParameterInfo {
                name: "slot".to_string(),
                ty: int.id(),
            }]
        },
    );
    let stock = s.mock.new_object(&inventory, Vec::new());
    let apples = s.mock.new_string("apples");
    let ctx = s.ctx();

    let slot = s
        .eval
        .indexer_element(&ctx, &stock, &[string.clone()], vec![apples.clone()])
        .unwrap();
    assert_eq!(slot.name(), "[apples]");
    assert_eq!(slot.declared_type(), Some(int.id()));
    assert_eq!(slot.declaring_type(), Some(inventory.id()));
    assert!(!slot.is_read_only());

    assert_eq!(slot.read(&s.eval, &ctx).unwrap(), PrimitiveValue::I32(7).into());
    let read = s.mock.calls().begin_invoke.pop().unwrap();
    assert_eq!(read.method, by_name.getter.as_ref().unwrap().id);
    assert_eq!(read.args, [apples.clone()]);

    slot.write(&s.eval, &ctx, PrimitiveValue::I32(9).into()).unwrap();
    let written = s.mock.calls().begin_invoke.pop().unwrap();
    assert_eq!(written.method, setter.id);
    assert_eq!(written.args, [apples, PrimitiveValue::I32(9).into()]);

    let quiet = EvaluationContext {
        options: ctx.options.side_effect_free(),
        ..ctx.clone()
    };
    assert_eq!(
        slot.read(&s.eval, &quiet),
        Err(EvalError::InvocationDisabled)
    );

    let numbered = s
        .eval
        .indexer_element(&ctx, &stock, &[int.clone()], vec![PrimitiveValue::I32(3).into()])
        .unwrap();
    assert_eq!(numbered.name(), "[3]");
    assert!(matches!(numbered.kind(), ReferenceKind::IndexerElement { .. }));
    assert_eq!(numbered.read(&s.eval, &ctx).unwrap(), PrimitiveValue::I32(1).into());
    assert_eq!(
        numbered.write(&s.eval, &ctx, PrimitiveValue::I32(0).into()),
        Err(EvalError::ReadOnly("[3]".to_string()))
    );

    let plain = s.mock.add_class("App.Plain", None);
    let thing = s.mock.new_object(&plain, Vec::new());
    assert!(matches!(
        s.eval.indexer_element(&ctx, &thing, &[int], vec![PrimitiveValue::I32(0).into()]),
        Err(EvalError::MethodNotFound { .. })
    ));
}
