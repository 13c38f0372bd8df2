// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Proxies bound to JDK classes in an in-process JVM.

use std::sync::Arc;

use aid_jni::{
    errors::{self, try_unwrap_or_throw},
    interfaces::aidtest::{JTestObjects, TestObjects},
    jvm_bridge::{check_exception, JVMClasses},
    BridgeError, BridgeResult, InterfaceSpec, MethodSpec, ProxyConfig, ProxyHandle, Rgba,
    UnsupportedPolicy, Value,
};
use assertables::{assert_starts_with, assert_starts_with_as_result};
use jni::{
    objects::{JObject, JValue},
    InitArgsBuilder, JNIEnv, JNIVersion, JavaVM,
};
use once_cell::sync::OnceCell;

static JVM: OnceCell<JavaVM> = OnceCell::new();

fn jvm() -> &'static JavaVM {
    JVM.get_or_init(|| {
        let args = InitArgsBuilder::new()
            .version(JNIVersion::V8)
            .option("-Xcheck:jni")
            .option("-Djava.awt.headless=true")
            .build()
            .unwrap();
        JavaVM::new(args).unwrap()
    })
}

fn attach() -> JNIEnv<'static> {
    jvm().attach_current_thread_permanently().unwrap()
}

fn spec(name: &str, methods: Vec<MethodSpec>) -> Arc<InterfaceSpec> {
    let spec = methods
        .into_iter()
        .try_fold(InterfaceSpec::new(name), InterfaceSpec::with_method)
        .unwrap();
    Arc::new(spec)
}

fn string_builder(env: &mut JNIEnv<'static>) -> JObject<'static> {
    env.new_object("java/lang/StringBuilder", "()V", &[]).unwrap()
}

fn builder_spec() -> Arc<InterfaceSpec> {
    spec(
        "Builder",
        vec![
            MethodSpec::parse("append", "(Ljava/lang/String;)Ljava/lang/StringBuilder;").unwrap(),
            MethodSpec::parse("toString", "()Ljava/lang/String;")
                .unwrap()
                .cached(),
            MethodSpec::parse("length", "()I").unwrap(),
            MethodSpec::parse("charAt", "(I)C").unwrap(),
            MethodSpec::parse("setLength", "(I)V").unwrap().throws(),
            MethodSpec::parse("substring", "(I)Ljava/lang/String;")
                .unwrap()
                .cached(),
        ],
    )
}

#[test]
fn calls_reach_the_target() {
    let mut env = attach();
    let target = string_builder(&mut env);
    let mut proxy =
        ProxyHandle::new(attach(), &target, builder_spec(), ProxyConfig::default()).unwrap();
    assert_eq!(proxy.unresolved().count(), 0);

    let appended = proxy.invoke(0, &[Value::from("abc")]).unwrap();
    let appended = appended.as_object().unwrap();
    assert!(env
        .is_same_object(appended.as_obj(), proxy.target().as_obj())
        .unwrap());

    assert_eq!(proxy.call("length", "()I", &[]).unwrap().as_int(), Some(3));
    assert_eq!(
        proxy.invoke(3, &[Value::from(1)]).unwrap().as_char(),
        Some(u16::from(b'b'))
    );
    assert_eq!(
        proxy.invoke_cached(1, &[]).unwrap().as_str(),
        Some("abc")
    );
    assert_eq!(proxy.cached(1).and_then(Value::as_str), Some("abc"));

    proxy.invoke(0, &[Value::from("def")]).unwrap();
    assert_eq!(
        proxy.invoke_cached(1, &[]).unwrap().as_str(),
        Some("abcdef")
    );
}

#[test]
fn java_exceptions_are_converted_and_cleared() {
    let mut env = attach();
    let target = string_builder(&mut env);
    let mut proxy =
        ProxyHandle::new(attach(), &target, builder_spec(), ProxyConfig::default()).unwrap();

    let err = proxy.invoke(3, &[Value::from(10)]).unwrap_err();
    assert!(err.is_java_exception());
    match &err {
        BridgeError::JavaException { class, .. } => {
            assert_starts_with!(class.as_str(), "java.lang.");
            assert!(class.ends_with("IndexOutOfBoundsException"), "{class}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!env.exception_check().unwrap());

    assert!(!proxy.invoke_flag(4, &[Value::from(-1)]));
    assert!(!env.exception_check().unwrap());
    assert!(proxy.invoke_flag(4, &[Value::from(0)]));

    // a failed cached call leaves no stale result behind
    proxy.invoke(0, &[Value::from("abc")]).unwrap();
    assert_eq!(
        proxy.invoke_cached(5, &[Value::from(1)]).unwrap().as_str(),
        Some("bc")
    );
    assert!(proxy.invoke_cached(5, &[Value::from(9)]).unwrap_err().is_java_exception());
    assert!(proxy.cached(5).is_none());
    assert!(!env.exception_check().unwrap());
}

#[test]
fn calls_follow_the_declared_mode() {
    let mut env = attach();
    let target = string_builder(&mut env);
    let mut proxy =
        ProxyHandle::new(attach(), &target, builder_spec(), ProxyConfig::default()).unwrap();
    proxy.invoke(0, &[Value::from("mode")]).unwrap();

    // charAt returns by value, length does not report failures as a flag
    assert!(matches!(
        proxy.invoke_cached(3, &[Value::from(0)]),
        Err(BridgeError::CallMode { .. })
    ));
    assert!(proxy.cached(3).is_none());
    assert!(!proxy.invoke_flag(2, &[]));
    assert_eq!(proxy.invoke(2, &[]).unwrap().as_int(), Some(4));

    // a cached method called by value still stores its result
    assert_eq!(
        proxy.invoke(1, &[]).unwrap().into_text().as_deref(),
        Some("mode")
    );
    assert_eq!(proxy.cached(1).and_then(Value::as_str), Some("mode"));
    assert!(proxy.invoke(2, &[]).is_ok());
    assert!(proxy.cached(2).is_none());
}

#[test]
fn arguments_are_checked_before_the_call() {
    let mut env = attach();
    let target = string_builder(&mut env);
    let mut proxy =
        ProxyHandle::new(attach(), &target, builder_spec(), ProxyConfig::default()).unwrap();

    assert!(matches!(
        proxy.invoke(3, &[Value::from("x")]),
        Err(BridgeError::ArgumentType { index: 0, .. })
    ));
    assert!(matches!(
        proxy.invoke(2, &[Value::from(1)]),
        Err(BridgeError::ArgumentCount {
            expected: 0,
            found: 1,
            ..
        })
    ));
    assert!(matches!(
        proxy.invoke(42, &[]),
        Err(BridgeError::UnknownMethod { .. })
    ));
    assert!(matches!(
        proxy.call("length", "()J", &[]),
        Err(BridgeError::UnknownMethod { .. })
    ));
    assert_eq!(proxy.invoke(2, &[]).unwrap().as_int(), Some(0));
}

#[test]
fn text_survives_the_round_trip() {
    let env = attach();
    let target = JObject::from(env.new_string("a\u{0}b").unwrap());
    let interface = spec(
        "Text",
        vec![MethodSpec::parse("concat", "(Ljava/lang/String;)Ljava/lang/String;").unwrap()],
    );
    let mut proxy = ProxyHandle::new(attach(), &target, interface, ProxyConfig::default()).unwrap();

    let result = proxy.invoke(0, &[Value::from("\u{1F600}é")]).unwrap();
    assert_eq!(result.into_text().as_deref(), Some("a\u{0}b\u{1F600}é"));
}

#[test]
fn null_results_and_arguments() {
    let mut env = attach();
    let target = env.new_object("java/util/HashMap", "()V", &[]).unwrap();
    let interface = spec(
        "Map",
        vec![
            MethodSpec::parse(
                "put",
                "(Ljava/lang/Object;Ljava/lang/Object;)Ljava/lang/Object;",
            )
            .unwrap(),
            MethodSpec::parse("get", "(Ljava/lang/Object;)Ljava/lang/Object;").unwrap(),
            MethodSpec::parse("size", "()I").unwrap(),
        ],
    );
    let mut proxy = ProxyHandle::new(attach(), &target, interface, ProxyConfig::default()).unwrap();

    assert!(proxy.invoke(1, &[Value::Null]).unwrap().is_null());
    assert!(proxy
        .invoke(0, &[Value::Null, Value::Null])
        .unwrap()
        .is_null());
    assert_eq!(proxy.invoke(2, &[]).unwrap().as_int(), Some(1));
}

#[test]
fn colors_keep_their_components() {
    let mut env = attach();
    if env.find_class("java/awt/Color").is_err() {
        env.exception_clear().unwrap();
        return;
    }

    let target = env.new_object("java/util/ArrayList", "()V", &[]).unwrap();
    let interface = spec(
        "Colors",
        vec![
            MethodSpec::parse("add", "(Ljava/lang/Object;)Z")
                .unwrap()
                .color_param(0)
                .unwrap(),
            MethodSpec::parse("get", "(I)Ljava/lang/Object;")
                .unwrap()
                .color_result()
                .unwrap(),
        ],
    );
    let mut proxy = ProxyHandle::new(attach(), &target, interface, ProxyConfig::default()).unwrap();

    let rgba = Rgba::new(0.1, 0.2, 0.3, 0.4);
    assert_eq!(
        proxy.invoke(0, &[Value::from(rgba)]).unwrap().as_bool(),
        Some(true)
    );
    assert!(proxy.invoke(0, &[Value::Null]).unwrap().as_bool().unwrap());

    assert_eq!(
        proxy.invoke(1, &[Value::from(0)]).unwrap().as_color(),
        Some(rgba)
    );
    assert!(proxy.invoke(1, &[Value::from(1)]).unwrap().is_null());
}

#[test]
fn every_invocation_calls_java_exactly_once() {
    let mut env = attach();
    let target = env
        .new_object("java/util/concurrent/atomic/AtomicInteger", "()V", &[])
        .unwrap();
    let interface = spec(
        "Counter",
        vec![
            MethodSpec::parse("incrementAndGet", "()I").unwrap(),
            MethodSpec::parse("get", "()I").unwrap(),
        ],
    );
    let mut proxy = ProxyHandle::new(attach(), &target, interface, ProxyConfig::default()).unwrap();

    assert_eq!(proxy.invoke(0, &[]).unwrap().as_int(), Some(1));
    assert_eq!(proxy.invoke(1, &[]).unwrap().as_int(), Some(1));
    assert_eq!(proxy.invoke(0, &[]).unwrap().as_int(), Some(2));

    // a flag call on a method that does not throw is refused before reaching Java
    assert!(!proxy.invoke_flag(0, &[]));
    assert_eq!(proxy.invoke(1, &[]).unwrap().as_int(), Some(2));
}

#[test]
fn unsupported_arguments_follow_the_policy() {
    let mut env = attach();
    let target = env.new_object("java/util/ArrayList", "()V", &[]).unwrap();
    let interface = spec(
        "Sink",
        vec![
            MethodSpec::parse("add", "(Ljava/lang/Object;)Z")
                .unwrap()
                .unsupported_param(0, "std::ostream&")
                .unwrap(),
            MethodSpec::parse("size", "()I").unwrap(),
        ],
    );

    let reject = ProxyConfig::new(UnsupportedPolicy::Reject, 8);
    let mut proxy = ProxyHandle::new(attach(), &target, Arc::clone(&interface), reject).unwrap();
    assert!(matches!(
        proxy.invoke(0, &[Value::Null]),
        Err(BridgeError::UnsupportedConversion { index: 0, .. })
    ));
    assert_eq!(proxy.invoke(1, &[]).unwrap().as_int(), Some(0));

    let mut proxy = ProxyHandle::new(attach(), &target, interface, ProxyConfig::default()).unwrap();
    assert!(proxy.invoke(0, &[Value::from(7)]).unwrap().as_bool().unwrap());
    assert_eq!(proxy.invoke(1, &[]).unwrap().as_int(), Some(1));
}

#[test]
fn missing_methods_leave_the_rest_callable() {
    let mut env = attach();
    let target = string_builder(&mut env);
    let interface = spec(
        "Partial",
        vec![
            MethodSpec::parse("length", "()I").unwrap(),
            MethodSpec::parse("frobnicate", "()V").unwrap(),
            MethodSpec::parse("length", "()J").unwrap(),
        ],
    );
    let mut proxy = ProxyHandle::new(attach(), &target, interface, ProxyConfig::default()).unwrap();
    assert!(!env.exception_check().unwrap());

    let unresolved: Vec<String> = proxy.unresolved().map(ToString::to_string).collect();
    assert_eq!(unresolved, vec!["frobnicate()V", "length()J"]);
    assert!(proxy.is_resolved(0));
    assert!(!proxy.is_resolved(1));
    assert!(proxy.binding(1).unwrap().method_id().is_none());

    let err = proxy.invoke(1, &[]).unwrap_err();
    assert_eq!(err.to_string(), "Partial: method frobnicate()V is not bound");
    assert!(!proxy.invoke_flag(2, &[]));
    assert_eq!(proxy.invoke(0, &[]).unwrap().as_int(), Some(0));
}

#[test]
fn null_target_is_rejected() {
    let result = ProxyHandle::new(
        attach(),
        &JObject::null(),
        builder_spec(),
        ProxyConfig::default(),
    );
    assert!(matches!(result, Err(BridgeError::NullPointer(_))));
}

#[test]
fn test_objects_over_an_unrelated_class() {
    let mut env = attach();
    let target = env.new_object("java/lang/Object", "()V", &[]).unwrap();
    let mut objects = JTestObjects::new(attach(), &target).unwrap();

    assert_eq!(objects.proxy().unresolved().count(), 14);
    assert!(!objects.mkdir("/tmp"));
    assert!(matches!(
        objects.cd("/"),
        Err(BridgeError::UnresolvedMethod { .. })
    ));
    assert!(objects.find("x").is_err());
    assert!(objects.return_color().is_err());
    assert!(objects.ls("/", true, &mut std::io::sink()).is_err());
    assert!(!env.exception_check().unwrap());
}

#[test]
fn proxies_work_on_attached_threads() {
    let mut env = attach();
    aid_jni::register_java_vm(&env).unwrap();
    assert!(JVMClasses::init(&mut env).is_ok());

    std::thread::spawn(|| {
        let mut guard = JVMClasses::get_env().unwrap();
        let env = unsafe { guard.unsafe_clone() };

        let text = JObject::from(guard.new_string("xyz").unwrap());
        let target = guard
            .new_object(
                "java/lang/StringBuilder",
                "(Ljava/lang/String;)V",
                &[JValue::Object(&text)],
            )
            .unwrap();
        let mut proxy =
            ProxyHandle::new(env, &target, builder_spec(), ProxyConfig::default()).unwrap();
        assert_eq!(proxy.invoke(2, &[]).unwrap().as_int(), Some(3));
    })
    .join()
    .unwrap();
}

fn pending_exception(env: &mut JNIEnv) -> (String, String) {
    match check_exception(env).unwrap() {
        Some(BridgeError::JavaException { class, msg, .. }) => (class, msg),
        other => panic!("expected a pending Java exception, got {other:?}"),
    }
}

#[test]
fn panics_are_thrown_as_runtime_exceptions() {
    errors::init();
    let mut env = attach();

    try_unwrap_or_throw(&env, |_| -> BridgeResult<()> {
        panic!("oops!");
    });

    let (class, msg) = pending_exception(&mut env);
    assert_eq!(class, "java.lang.RuntimeException");
    assert_starts_with!(msg.as_str(), "oops!");
    assert!(!env.exception_check().unwrap());
}

#[test]
fn errors_are_thrown_with_a_matching_class() {
    let mut env = attach();

    let value = try_unwrap_or_throw(&env, |_| -> BridgeResult<jni::sys::jint> {
        Err(BridgeError::NullPointer("no target".to_string()))
    });
    assert_eq!(value, 0);
    let (class, msg) = pending_exception(&mut env);
    assert_eq!(class, "java.lang.NullPointerException");
    assert_eq!(msg, "no target");

    try_unwrap_or_throw(&env, |_| -> BridgeResult<()> {
        Err(BridgeError::UnsupportedConversion {
            method: "ls".to_string(),
            index: 2,
            native: "std::ostream&".to_string(),
        })
    });
    let (class, _) = pending_exception(&mut env);
    assert_eq!(class, "java.lang.UnsupportedOperationException");
}

#[test]
fn java_exceptions_are_rethrown_unchanged() {
    let mut env = attach();
    let target = string_builder(&mut env);
    let mut proxy =
        ProxyHandle::new(attach(), &target, builder_spec(), ProxyConfig::default()).unwrap();
    let err = proxy.invoke(3, &[Value::from(99)]).unwrap_err();
    let expected = match &err {
        BridgeError::JavaException { class, .. } => class.clone(),
        other => panic!("unexpected error: {other}"),
    };

    try_unwrap_or_throw(&env, move |_| -> BridgeResult<()> { Err(err) });
    let (class, _) = pending_exception(&mut env);
    assert_eq!(class, expected);
}

/// Built from `java/TestObjectsImpl.java`.
const TEST_OBJECTS_CLASS: &[u8] = include_bytes!("java/TestObjectsImpl.class");

fn test_objects_impl(env: &mut JNIEnv<'static>) -> JObject<'static> {
    let loader = env
        .call_static_method(
            "java/lang/ClassLoader",
            "getSystemClassLoader",
            "()Ljava/lang/ClassLoader;",
            &[],
        )
        .unwrap()
        .l()
        .unwrap();
    let class = env
        .define_class("TestObjectsImpl", &loader, TEST_OBJECTS_CLASS)
        .unwrap();
    env.new_object(&class, "()V", &[]).unwrap()
}

#[test]
fn test_objects_over_an_implementation() {
    let mut env = attach();
    let target = test_objects_impl(&mut env);
    let mut objects = JTestObjects::new(attach(), &target).unwrap();
    assert_eq!(objects.proxy().unresolved().count(), 0);

    let recorder = spec(
        "Recorder",
        vec![MethodSpec::parse("lastCall", "()Ljava/lang/String;").unwrap()],
    );
    let mut recorder = ProxyHandle::new(attach(), &target, recorder, ProxyConfig::default()).unwrap();
    let mut last_call = || recorder.invoke(0, &[]).unwrap().into_text().unwrap();

    assert_eq!(objects.return_object().unwrap(), "object");
    assert_eq!(objects.return_reference().unwrap(), "ref0");
    assert_eq!(objects.return_reference().unwrap(), "ref1");
    assert_eq!(objects.return_pointer().unwrap(), "pointer");
    assert_eq!(objects.return_const_reference().unwrap(), "const");
    assert_eq!(objects.return_const_reference_const().unwrap(), "const const");
    assert_eq!(
        objects.return_const_reference_const_throws().unwrap(),
        "const const throws"
    );

    let err = objects.return_const_reference_throws().unwrap_err();
    assert_eq!(err.to_string(), "java.lang.IllegalStateException: nope");
    assert!(!env.exception_check().unwrap());

    assert_eq!(objects.find("/tmp").unwrap(), "found:/tmp");
    assert!(objects.cd("/home").unwrap());
    assert!(!objects.cd("home").unwrap());

    objects.ls("/", true, &mut std::io::sink()).unwrap();
    assert_eq!(last_call(), "ls / true null");

    assert!(objects.mkdir("/tmp/a"));
    assert_eq!(last_call(), "mkdir /tmp/a");
    assert!(!objects.mkdir(""));
    assert!(!env.exception_check().unwrap());
    assert_eq!(last_call(), "mkdir /tmp/a");

    objects.mv("/tmp/a", "/tmp/b").unwrap();
    assert_eq!(last_call(), "mv /tmp/a /tmp/b");

    if env.find_class("java/awt/Color").is_err() {
        env.exception_clear().unwrap();
        return;
    }
    let rgba = Rgba::new(0.1, 0.2, 0.3, 0.4);
    assert_eq!(objects.return_color().unwrap(), rgba);
    assert_eq!(objects.find_color(rgba).unwrap(), "0.1,0.2,0.3,0.4");
    assert_eq!(
        objects.find_color(Rgba::new(1.0, 0.0, 0.5, 1.0)).unwrap(),
        "1.0,0.0,0.5,1.0"
    );
    assert!(!env.exception_check().unwrap());
}
