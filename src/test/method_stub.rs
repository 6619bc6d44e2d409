use crate::proxy::{Directive, Invoked, MethodStub};
use crate::test::scenario::{RecordingCaller, Scenario};
use crate::value::{Keywords, Value};
use crate::Error;

#[test]
fn dotted_segments() {
    let mut caller = RecordingCaller::default();

    let out = MethodStub::new(&mut caller, "a")
        .with_segment("b")
        .call(vec![Value::Int(1), Value::Int(2)], Keywords::new())
        .unwrap();

    assert_eq!(out.value, Value::from("a.b"));
    assert_eq!(caller.calls.len(), 1);
    assert_eq!(caller.calls[0].method.as_deref(), Some("a.b"));
    assert_eq!(caller.calls[0].args, vec![Value::Int(1), Value::Int(2)]);
    assert_eq!(caller.calls[0].namespace, None);
}

#[test]
fn namespace_directive() {
    let mut caller = RecordingCaller::default();

    let stub = MethodStub::new(&mut caller, "_ns")
        .invoke(vec![Value::from("urn:x")], Keywords::new())
        .unwrap()
        .into_stub()
        .unwrap();

    assert_eq!(stub.namespace(), Some("urn:x"));

    let out = stub
        .with_segment("method")
        .invoke(vec![Value::Int(5)], Keywords::new())
        .unwrap()
        .into_output()
        .unwrap();

    assert_eq!(out.value, Value::from("method"));
    assert_eq!(caller.calls.len(), 1);
    assert_eq!(caller.calls[0].method.as_deref(), Some("method"));
    assert_eq!(caller.calls[0].namespace.as_deref(), Some("urn:x"));
    assert_eq!(caller.calls[0].args, vec![Value::Int(5)]);
}

#[test]
fn directive_does_not_call() {
    let mut caller = RecordingCaller::default();

    let invoked = MethodStub::new(&mut caller, "_sa")
        .invoke(vec![Value::from("urn:x#a")], Keywords::new())
        .unwrap();

    assert!(matches!(invoked, Invoked::Configured(_)));
    drop(invoked);
    assert!(caller.calls.is_empty());
}

#[test]
fn chained_directives() {
    let mut caller = RecordingCaller::default();

    let header = Value::from("auth");
    let attrs = Value::from("attrs");

    let stub = MethodStub::new(&mut caller, "_sa")
        .invoke(vec![Value::from("urn:x#op")], Keywords::new())
        .unwrap()
        .into_stub()
        .unwrap()
        .with_segment("_hd")
        .invoke(vec![header.clone()], Keywords::new())
        .unwrap()
        .into_stub()
        .unwrap()
        .with_segment("_ma")
        .invoke(vec![attrs.clone()], Keywords::new())
        .unwrap()
        .into_stub()
        .unwrap()
        .with_segment("svc")
        .with_segment("op");

    assert_eq!(stub.name(), "svc.op");
    assert_eq!(stub.directive(), None);

    let mut stub = stub;
    stub.call(vec![], Keywords::new()).unwrap();

    let ctx = &caller.calls[0];
    assert_eq!(ctx.method.as_deref(), Some("svc.op"));
    assert_eq!(ctx.soap_action.as_deref(), Some("urn:x#op"));
    assert_eq!(ctx.header, Some(header));
    assert_eq!(ctx.method_attrs, Some(attrs));
}

#[test]
fn directive_without_argument_clears() {
    let mut caller = RecordingCaller::default();

    let stub = MethodStub::new(&mut caller, "_ns")
        .with_directive(Directive::Namespace, Some(Value::from("urn:x")))
        .unwrap()
        .invoke(vec![], Keywords::new())
        .unwrap()
        .into_stub()
        .unwrap();

    assert_eq!(stub.namespace(), None);
}

#[test]
fn namespace_must_be_string() {
    let mut caller = RecordingCaller::default();

    let err = MethodStub::new(&mut caller, "_ns")
        .invoke(vec![Value::Int(1)], Keywords::new())
        .err()
        .unwrap();

    assert!(matches!(err, Error::BadDirective(ref m) if m == "_ns"));
}

#[test]
fn calling_a_marker_fails() {
    let mut caller = RecordingCaller::default();

    let mut stub = MethodStub::new(&mut caller, "_hd");
    let err = stub.call(vec![], Keywords::new()).unwrap_err();

    assert!(matches!(err, Error::BadDirective(_)));
    drop(stub);
    assert!(caller.calls.is_empty());
}

#[test]
fn underscore_names_are_methods() {
    let mut caller = RecordingCaller::default();

    let stub = MethodStub::new(&mut caller, "_private").with_segment("x");
    assert_eq!(stub.name(), "_private.x");
    assert_eq!(stub.directive(), None);
}

#[test]
fn markers() {
    for d in [
        Directive::Namespace,
        Directive::SoapAction,
        Directive::Header,
        Directive::MethodAttrs,
    ] {
        assert_eq!(Directive::from_marker(d.marker()), Some(d));
    }
    assert_eq!(Directive::from_marker("_nsx"), None);
}

#[test]
fn stub_through_proxy() {
    let mut scenario = Scenario::builder()
        .namespace("urn:default")
        .respond("<r/>")
        .build();

    let out = scenario
        .proxy
        .method("_ns")
        .invoke(vec![Value::from("urn:x")], Keywords::new())
        .unwrap()
        .into_stub()
        .unwrap()
        .with_segment("examples")
        .with_segment("getStateName")
        .call(vec![Value::Int(41)], Keywords::new())
        .unwrap();

    assert_eq!(out.value, Value::from("<r/>"));

    let encoded = scenario.codec.encoded();
    assert_eq!(encoded[0].method.as_deref(), Some("examples.getStateName"));
    assert_eq!(encoded[0].namespace.as_deref(), Some("urn:x"));
    assert_eq!(encoded[0].args, vec![Value::Int(41)]);
}
