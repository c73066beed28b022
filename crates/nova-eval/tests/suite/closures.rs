use nova_remote::{DebuggeeClient, MockFrame, PrimitiveValue, RemoteType, RemoteValue};
use pretty_assertions::assert_eq;

use super::fixtures::{local, names, Session, THREAD};

struct Lambdas {
    program: RemoteType,
    program_obj: RemoteValue,
    outer: RemoteType,
    outer_obj: RemoteValue,
    inner: RemoteType,
    inner_obj: RemoteValue,
}

/// `Main` captures `count` and `this`; a nested lambda captures `item` and
/// references the outer closure.
fn lambdas(s: &Session) -> Lambdas {
    let int = s.core("System.Int32");
    let string = s.core("System.String");
    let program = s.mock.add_class("App.Program", None);
    let outer = s.mock.add_class("App.Program+<>c__DisplayClass0_0", None);
    let inner = s.mock.add_class("App.Program+<>c__DisplayClass0_1", None);

    let hoisted_this = s.mock.add_field(&outer, "<>4__this", &program, false);
    let count = s.mock.add_field(&outer, "count", &int, false);
    let locals_ref = s.mock.add_field(&inner, "CS$<>8__locals1", &outer, false);
    let item = s.mock.add_field(&inner, "item", &string, false);

    let program_obj = s.mock.new_object(&program, Vec::new());
    let outer_obj = s.mock.new_object(
        &outer,
        vec![
            (hoisted_this.id, program_obj.clone()),
            (count.id, PrimitiveValue::I32(3).into()),
        ],
    );
    let inner_obj = s.mock.new_object(
        &inner,
        vec![
            (locals_ref.id, outer_obj.clone()),
            (item.id, s.mock.new_string("pear")),
        ],
    );
    Lambdas {
        program,
        program_obj,
        outer,
        outer_obj,
        inner,
        inner_obj,
    }
}

#[test]
fn nested_lambda_frame_sees_every_captured_local() {
    let s = Session::new();
    let int = s.core("System.Int32");
    let l = lambdas(&s);
    let body = s.mock.add_method(&l.inner, "<Main>b__1", &[], None);
    let frame = s.mock.add_frame(MockFrame {
        method: body,
        this: l.inner_obj.clone(),
        locals: vec![(local(0, "total", &int), PrimitiveValue::I32(10).into())],
        absent_information: false,
    });
    let ctx = s.eval.context(THREAD, frame);

    let locals = s.eval.local_variables(&ctx).unwrap();
    assert_eq!(names(&locals), ["total", "item", "count"]);
    let count = locals.iter().find(|l| l.name() == "count").unwrap();
    assert_eq!(count.read(&s.eval, &ctx).unwrap(), PrimitiveValue::I32(3).into());

    let this = s.eval.this_reference(&ctx).unwrap().unwrap();
    assert_eq!(this.name(), "this");
    assert_eq!(this.declared_type(), Some(l.program.id()));
    assert_eq!(this.read(&s.eval, &ctx).unwrap(), l.program_obj);
}

#[test]
fn closure_local_of_ordinary_frame_is_expanded() {
    let s = Session::new();
    let l = lambdas(&s);
    let main = s
        .mock
        .add_method_with(&l.program, "Main", &[], None, |m| m.is_static = true);
    let frame = s.mock.add_frame(MockFrame {
        method: main,
        this: RemoteValue::Null,
        locals: vec![(local(0, "CS$<>8__locals0", &l.outer), l.outer_obj.clone())],
        absent_information: false,
    });
    let ctx = s.eval.context(THREAD, frame);

    assert_eq!(names(&s.eval.local_variables(&ctx).unwrap()), ["count"]);
    assert_eq!(s.eval.this_reference(&ctx).unwrap(), None);
    assert!(s.eval.local_variable(&ctx, "count").unwrap().is_some());
}

#[test]
fn iterator_frame_shows_hoisted_locals_and_hides_state() {
    let s = Session::new();
    let int = s.core("System.Int32");
    let program = s.mock.add_class("App.Program", None);
    let iterator = s.mock.add_class("App.Program+<Numbers>d__1", None);
    let state = s.mock.add_field(&iterator, "<>1__state", &int, false);
    let current = s.mock.add_field(&iterator, "<>2__current", &int, false);
    let hoisted_this = s.mock.add_field(&iterator, "<>4__this", &program, false);
    let i = s.mock.add_field(&iterator, "<i>5__1", &int, false);
    let limit = s.mock.add_field(&iterator, "limit", &int, false);

    let program_obj = s.mock.new_object(&program, Vec::new());
    let iterator_obj = s.mock.new_object(
        &iterator,
        vec![
            (state.id, PrimitiveValue::I32(1).into()),
            (current.id, PrimitiveValue::I32(3).into()),
            (hoisted_this.id, program_obj.clone()),
            (i.id, PrimitiveValue::I32(4).into()),
            (limit.id, PrimitiveValue::I32(10).into()),
        ],
    );
    let move_next = s.mock.add_method(&iterator, "MoveNext", &[], None);
    let frame = s.mock.add_frame(MockFrame {
        method: move_next,
        this: iterator_obj,
        locals: Vec::new(),
        absent_information: false,
    });
    let ctx = s.eval.context(THREAD, frame);

    let locals = s.eval.local_variables(&ctx).unwrap();
    assert_eq!(names(&locals), ["i", "limit"]);
    assert_eq!(
        locals[0].read(&s.eval, &ctx).unwrap(),
        PrimitiveValue::I32(4).into()
    );
    let this = s.eval.this_reference(&ctx).unwrap().unwrap();
    assert_eq!(this.read(&s.eval, &ctx).unwrap(), program_obj);
}

#[test]
fn cyclic_closure_graph_terminates() {
    let s = Session::new();
    let l = lambdas(&s);
    let back_ref = s.mock.add_field(&l.outer, "<>8__locals2", &l.inner, false);
    s.mock
        .set_instance_field(
            l.outer_obj.object_id().unwrap(),
            back_ref.id,
            l.inner_obj.clone(),
        )
        .unwrap();

    let body = s.mock.add_method(&l.inner, "<Main>b__1", &[], None);
    let frame = s.mock.add_frame(MockFrame {
        method: body,
        this: l.inner_obj.clone(),
        locals: Vec::new(),
        absent_information: false,
    });
    let ctx = s.eval.context(THREAD, frame);
    assert_eq!(names(&s.eval.local_variables(&ctx).unwrap()), ["item", "count"]);
}

#[test]
fn inner_scope_shadows_outer_capture() {
    let s = Session::new();
    let int = s.core("System.Int32");
    let l = lambdas(&s);
    let shadow = s.mock.add_field(&l.inner, "count", &int, false);
    s.mock
        .set_instance_field(
            l.inner_obj.object_id().unwrap(),
            shadow.id,
            PrimitiveValue::I32(99).into(),
        )
        .unwrap();

    let body = s.mock.add_method(&l.inner, "<Main>b__1", &[], None);
    let frame = s.mock.add_frame(MockFrame {
        method: body,
        this: l.inner_obj.clone(),
        locals: Vec::new(),
        absent_information: false,
    });
    let ctx = s.eval.context(THREAD, frame);
    let locals = s.eval.local_variables(&ctx).unwrap();
    assert_eq!(names(&locals), ["item", "count"]);
    assert_eq!(
        locals[1].read(&s.eval, &ctx).unwrap(),
        PrimitiveValue::I32(99).into()
    );
}
