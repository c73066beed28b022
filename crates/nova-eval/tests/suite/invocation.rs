use std::time::Duration;

use nova_eval::{EvalConfig, EvalError, InvocationState};
use nova_remote::{InvokeTarget, MethodBehavior, PrimitiveValue, RemoteType, RemoteValue};
use pretty_assertions::assert_eq;

use super::fixtures::Session;

struct Worker {
    ty: RemoteType,
    instance: RemoteValue,
}

/// `Spin` never returns on its own; `Answer` returns 42.
fn worker(s: &Session) -> Worker {
    let int = s.core("System.Int32");
    let ty = s.mock.add_class("App.Worker", None);
    let spin = s.mock.add_method(&ty, "Spin", &[], Some(&int));
    s.mock
        .set_behavior(&spin, MethodBehavior::Hang(PrimitiveValue::I32(0).into()));
    let answer = s.mock.add_method(&ty, "Answer", &[], Some(&int));
    s.mock
        .set_behavior(&answer, MethodBehavior::Return(PrimitiveValue::I32(42).into()));
    let instance = s.mock.new_object(&ty, Vec::new());
    Worker { ty, instance }
}

#[test]
fn overrunning_call_is_aborted_and_engine_stays_usable() {
    let s = Session::with_config(EvalConfig {
        evaluation_timeout_ms: 50,
        abort_grace_ms: 2_000,
        ..EvalConfig::default()
    });
    let w = worker(&s);
    let ctx = s.ctx();

    assert_eq!(
        s.eval.invoke(&ctx, &w.ty, Some(&w.instance), "Spin", &[], Vec::new()),
        Err(EvalError::Timeout)
    );
    assert_eq!(s.mock.calls().abort_invoke.len(), 1);
    assert!(s.mock.unfinished_invokes().is_empty());

    assert_eq!(
        s.eval
            .invoke(&ctx, &w.ty, Some(&w.instance), "Answer", &[], Vec::new())
            .unwrap(),
        PrimitiveValue::I32(42).into()
    );
    // One bump for the aborted call, one for the completed one.
    assert_eq!(ctx.stack_version.current(), 2);
}

#[test]
fn shutdown_releases_a_blocked_evaluation() {
    let s = Session::with_config(EvalConfig {
        evaluation_timeout_ms: 30_000,
        ..EvalConfig::default()
    });
    let w = worker(&s);
    let ctx = s.ctx();

    let result = std::thread::scope(|scope| {
        scope.spawn(|| {
            std::thread::sleep(Duration::from_millis(50));
            s.eval.shutdown();
        });
        s.eval
            .invoke(&ctx, &w.ty, Some(&w.instance), "Spin", &[], Vec::new())
    });

    assert_eq!(result, Err(EvalError::Cancelled));
    assert!(s.mock.calls().end_invoke.is_empty());
    assert_eq!(s.mock.unfinished_invokes().len(), 1);
    assert_eq!(ctx.stack_version.current(), 0);
}

#[test]
fn call_left_pending_by_shutdown_is_reconciled_later() {
    let s = Session::new();
    let w = worker(&s);
    let ctx = s.ctx();
    let spin = s.eval.methods_named(&w.ty, "Spin").unwrap()[0].clone();
    let target = InvokeTarget::Object(w.instance.object_id().unwrap());

    let call = s.eval.start_call(&ctx, target, &spin, Vec::new()).unwrap();
    s.eval.shutdown();
    assert!(s.eval.shutdown_signal().is_triggered());
    assert!(call.wait_for_completed(Duration::from_secs(5)));
    assert_eq!(call.state(), InvocationState::Invoking);
    assert!(!call.poll_completed());

    let id = call.pending_id().unwrap();
    s.mock.complete_invoke(id);
    assert!(call.poll_completed());
    assert_eq!(call.state(), InvocationState::Completed);
    assert_eq!(call.take_result(), Some(Ok(PrimitiveValue::I32(0).into())));
    assert_eq!(s.mock.calls().end_invoke, [id]);
    assert_eq!(ctx.stack_version.current(), 1);
}

#[test]
fn a_call_from_one_evaluation_marks_every_other_stale() {
    let s = Session::new();
    let w = worker(&s);
    let locals_ctx = s.ctx();
    let watch_ctx = s.ctx();
    let observed = locals_ctx.stack_version.current();

    s.eval
        .invoke(&watch_ctx, &w.ty, Some(&w.instance), "Answer", &[], Vec::new())
        .unwrap();

    assert!(locals_ctx.stack_version.is_stale(observed));
    assert_eq!(locals_ctx.stack_version.current(), 1);
    assert_eq!(s.eval.stack_version().current(), 1);

    // Later contexts continue from the session's count.
    let next = s.ctx();
    assert_eq!(next.stack_version.current(), 1);
    s.eval
        .invoke(&next, &w.ty, Some(&w.instance), "Answer", &[], Vec::new())
        .unwrap();
    assert_eq!(watch_ctx.stack_version.current(), 2);
}

#[test]
fn thrown_exception_surfaces_type_and_message() {
    let s = Session::new();
    let exception = s.core("System.Exception");
    let oops = s.mock.add_class("App.OopsException", Some(&exception));
    let ty = s.mock.add_class("App.Parser", None);
    let parse = s.mock.add_method_with(&ty, "Parse", &[], None, |m| m.is_static = true);
    s.mock.set_behavior(
        &parse,
        MethodBehavior::Throw(s.mock.new_exception(&oops, "unexpected token")),
    );
    let ctx = s.ctx();

    let err = s
        .eval
        .invoke(&ctx, &ty, None, "Parse", &[], Vec::new())
        .unwrap_err();
    assert!(err.is_target_exception());
    assert_eq!(
        err,
        EvalError::TargetException {
            type_name: "App.OopsException".to_string(),
            message: "unexpected token".to_string(),
        }
    );
    assert_eq!(err.to_string(), "App.OopsException: unexpected token");
}

#[test]
fn calls_are_refused_when_invocation_is_disabled() {
    let s = Session::new();
    let w = worker(&s);
    let mut ctx = s.ctx();
    ctx.options = ctx.options.side_effect_free();

    assert_eq!(
        s.eval
            .invoke(&ctx, &w.ty, Some(&w.instance), "Answer", &[], Vec::new()),
        Err(EvalError::InvocationDisabled)
    );
    assert!(s.mock.calls().begin_invoke.is_empty());
}

#[test]
fn overloads_are_chosen_by_argument_types() {
    let s = Session::new();
    let int = s.core("System.Int32");
    let double = s.core("System.Double");
    let calc = s.mock.add_class("App.Calculator", None);
    let add_int = s.mock.add_method(&calc, "Add", &[&int, &int], Some(&int));
    s.mock
        .set_behavior(&add_int, MethodBehavior::Return(PrimitiveValue::I32(3).into()));
    let add_double = s.mock.add_method(&calc, "Add", &[&double, &double], Some(&double));
    s.mock.set_behavior(
        &add_double,
        MethodBehavior::Return(PrimitiveValue::F64(4.5).into()),
    );
    s.mock.add_method(&calc, ".ctor", &[], None);
    let ctx = s.ctx();

    let instance = s.eval.create_instance(&ctx, &calc, &[], Vec::new()).unwrap();
    assert!(matches!(&instance, RemoteValue::Object { ty, .. } if *ty == calc));

    let ints = [int.clone(), int.clone()];
    let sum = s
        .eval
        .invoke(
            &ctx,
            &calc,
            Some(&instance),
            "Add",
            &ints,
            vec![PrimitiveValue::I32(1).into(), PrimitiveValue::I32(2).into()],
        )
        .unwrap();
    assert_eq!(sum, PrimitiveValue::I32(3).into());
    assert_eq!(s.mock.calls().begin_invoke.last().unwrap().method, add_int.id);

    let doubles = [double.clone(), double.clone()];
    let sum = s
        .eval
        .invoke(
            &ctx,
            &calc,
            Some(&instance),
            "Add",
            &doubles,
            vec![PrimitiveValue::F64(1.5).into(), PrimitiveValue::F64(3.0).into()],
        )
        .unwrap();
    assert_eq!(sum, PrimitiveValue::F64(4.5).into());
    assert_eq!(
        s.mock.calls().begin_invoke.last().unwrap().method,
        add_double.id
    );

    assert_eq!(
        s.eval
            .invoke(&ctx, &calc, Some(&instance), "Subtract", &ints, Vec::new()),
        Err(EvalError::MethodNotFound {
            type_name: "App.Calculator".to_string(),
            method: "Subtract".to_string(),
        })
    );
}

#[test]
fn interface_typed_parameters_take_implementing_instances() {
    let s = Session::new();
    let runnable = s.mock.add_interface("App.IRunnable");
    let runner = s.mock.add_class("App.Runner", None);
    s.mock.implement(&runner, &runnable);
    let host = s.mock.add_class("App.Host", None);
    let take = s
        .mock
        .add_method_with(&host, "Take", &[&runnable], None, |m| m.is_static = true);
    s.mock
        .set_behavior(&take, MethodBehavior::Return(PrimitiveValue::Bool(true).into()));
    let job = s.mock.new_object(&runner, Vec::new());
    let ctx = s.ctx();

    let taken = s
        .eval
        .invoke(&ctx, &host, None, "Take", &[runner.clone()], vec![job.clone()])
        .unwrap();
    assert_eq!(taken, PrimitiveValue::Bool(true).into());
    let recorded = s.mock.calls().begin_invoke;
    assert_eq!(recorded[0].method, take.id);
    assert_eq!(recorded[0].args, [job]);

    let stranger = s.mock.add_class("App.Stranger", None);
    assert!(matches!(
        s.eval.invoke(&ctx, &host, None, "Take", &[stranger], Vec::new()),
        Err(EvalError::NoApplicableOverload { .. })
    ));
}

#[test]
fn every_call_disables_breakpoints_and_other_threads() {
    let s = Session::new();
    let w = worker(&s);
    let ctx = s.ctx();
    s.eval
        .invoke(&ctx, &w.ty, Some(&w.instance), "Answer", &[], Vec::new())
        .unwrap();

    let recorded = s.mock.calls().begin_invoke;
    assert_eq!(recorded.len(), 1);
    assert!(recorded[0].options.disable_breakpoints);
    assert!(recorded[0].options.single_threaded);
}
