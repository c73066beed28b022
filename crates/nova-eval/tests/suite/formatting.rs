use nova_eval::{ellipsize, EvalConfig};
use nova_remote::{DebuggeeClient, MethodBehavior, PrimitiveValue, RemoteValue};
use pretty_assertions::assert_eq;

use super::fixtures::Session;

#[test]
fn objects_use_their_own_to_string_when_calls_are_allowed() {
    let s = Session::new();
    let string = s.core("System.String");
    let person = s.mock.add_class("App.Person", None);
    let to_string = s
        .mock
        .add_method_with(&person, "ToString", &[], Some(&string), |m| m.is_virtual = true);
    s.mock.set_behavior(
        &to_string,
        MethodBehavior::Return(s.mock.new_string("Ada Lovelace")),
    );
    let plain = s.mock.add_class("App.Plain", None);
    let ada = s.mock.new_object(&person, Vec::new());
    let thing = s.mock.new_object(&plain, Vec::new());

    let ctx = s.ctx();
    assert_eq!(s.eval.value_to_string(&ctx, &ada).unwrap(), "Ada Lovelace");
    assert_eq!(s.eval.value_to_string(&ctx, &thing).unwrap(), "{Plain}");
    // `Object.ToString` is never called.
    assert_eq!(s.mock.calls().begin_invoke.len(), 1);

    let mut quiet = s.ctx();
    quiet.options = quiet.options.side_effect_free();
    assert_eq!(s.eval.value_to_string(&quiet, &ada).unwrap(), "{Person}");
    assert_eq!(s.mock.calls().begin_invoke.len(), 1);
}

#[test]
fn long_strings_are_ellipsized_per_config() {
    let s = Session::with_config(EvalConfig {
        ellipsis_length: 5,
        ellipsis_marker: "…".to_string(),
        ..EvalConfig::default()
    });
    let greeting = s.mock.new_string("Hello, world");
    let short = s.mock.new_string("Hi");

    let mut ctx = s.ctx();
    assert_eq!(s.eval.value_to_string(&ctx, &greeting).unwrap(), "Hello…");
    assert_eq!(s.eval.value_to_string(&ctx, &short).unwrap(), "Hi");

    ctx.options.ellipsize_strings = false;
    assert_eq!(
        s.eval.value_to_string(&ctx, &greeting).unwrap(),
        "Hello, world"
    );
    assert_eq!(ellipsize("Hello, world", 5, "..."), "Hello...");
}

#[test]
fn enums_render_names_and_flag_combinations() {
    let s = Session::new();
    let access = s
        .mock
        .add_enum("App.Access", &[("None", 0), ("Read", 1), ("Write", 2)]);
    let ctx = s.ctx();
    let show = |raw: i32| {
        s.eval
            .value_to_string(
                &ctx,
                &RemoteValue::Enum {
                    ty: access.clone(),
                    value: PrimitiveValue::I32(raw),
                },
            )
            .unwrap()
    };

    assert_eq!(show(0), "None");
    assert_eq!(show(2), "Write");
    assert_eq!(show(3), "Read | Write");
    assert_eq!(show(8), "8");
}

#[test]
fn scalars_arrays_and_boxes() {
    let s = Session::new();
    let int = s.core("System.Int32");
    let ctx = s.ctx();

    assert_eq!(s.eval.value_to_string(&ctx, &RemoteValue::Null).unwrap(), "null");
    assert_eq!(
        s.eval
            .value_to_string(&ctx, &PrimitiveValue::Bool(true).into())
            .unwrap(),
        "true"
    );
    assert_eq!(
        s.eval
            .value_to_string(&ctx, &PrimitiveValue::F64(2.5).into())
            .unwrap(),
        "2.5"
    );

    let numbers = s.mock.new_array(
        &int,
        vec![
            PrimitiveValue::I32(1).into(),
            PrimitiveValue::I32(2).into(),
            PrimitiveValue::I32(3).into(),
        ],
    );
    assert_eq!(s.eval.value_to_string(&ctx, &numbers).unwrap(), "{int[3]}");

    let m_value = s
        .mock
        .fields(int.id())
        .unwrap()
        .into_iter()
        .find(|f| f.name == "m_value")
        .unwrap();
    let boxed = s
        .mock
        .new_object(&int, vec![(m_value.id, PrimitiveValue::I32(5).into())]);
    assert_eq!(s.eval.value_to_string(&ctx, &boxed).unwrap(), "5");
}

#[test]
fn predicates_agree_with_value_shapes() {
    let s = Session::new();
    let access = s.mock.add_enum("App.Access", &[("Read", 1)]);
    let flag = RemoteValue::Enum {
        ty: access,
        value: PrimitiveValue::I32(1),
    };
    let text = s.eval.create_string("hello").unwrap();

    assert!(s.eval.is_enum(&flag));
    assert!(!s.eval.is_primitive(&flag));
    assert!(s.eval.is_string(&text));
    assert!(!s.eval.is_class(&text));
    assert_eq!(s.eval.value_to_string(&s.ctx(), &text).unwrap(), "hello");
}
