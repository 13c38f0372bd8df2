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

//! The JNI proxy: one Java object seen through a native interface.
//!
//! Method IDs are resolved once, when the proxy is built. Every call afterwards runs inside
//! its own local reference frame, converts the arguments, makes exactly one JVM call,
//! clears and converts any Java exception, and converts the result back.
//!
//! A proxy borrows the `JNIEnv` of the thread that built it and is therefore neither
//! `Send` nor `Sync`. Calls block until the Java method returns.

use std::sync::Arc;

use jni::{
    errors::Error,
    objects::{GlobalRef, JClass, JMethodID, JObject},
    JNIEnv,
};
use log::{debug, error, warn};

use crate::{
    config::ProxyConfig,
    descriptor::{InterfaceSpec, MethodSpec, ResultMode},
    errors::{BridgeError, BridgeResult},
    jvm_bridge::{check_exception, jni_new_global_ref, JVMClasses},
    marshal::{check_arguments, from_jvalue, to_jvalues, Value},
    signature::Selector,
};

/// The resolved JVM method behind one interface method. `None` when the target class
/// does not have it.
#[derive(Clone)]
pub struct MethodBinding {
    selector: Selector,
    method_id: Option<JMethodID>,
}

impl MethodBinding {
    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn method_id(&self) -> Option<JMethodID> {
        self.method_id
    }

    pub fn is_resolved(&self) -> bool {
        self.method_id.is_some()
    }
}

pub struct ProxyHandle<'local> {
    env: JNIEnv<'local>,
    target: GlobalRef,
    /// Keeps the class, and with it the method IDs, alive.
    #[allow(dead_code)]
    class: GlobalRef,
    interface: Arc<InterfaceSpec>,
    bindings: Vec<MethodBinding>,
    /// Last result of every method, for methods returning by reference.
    results: Vec<Option<Value>>,
    config: ProxyConfig,
}

impl<'local> ProxyHandle<'local> {
    /// Binds `target` to `interface`.
    ///
    /// A method missing on the target's class is logged and left unbound; the proxy is
    /// still built and the remaining methods stay callable.
    pub fn new(
        mut env: JNIEnv<'local>,
        target: &JObject,
        interface: Arc<InterfaceSpec>,
        config: ProxyConfig,
    ) -> BridgeResult<Self> {
        if target.is_null() {
            return Err(BridgeError::NullPointer(format!(
                "{}: cannot bind a null object",
                interface.name
            )));
        }
        if config.local_frame_capacity <= 0 {
            return Err(BridgeError::Config(format!(
                "Local frame capacity must be positive: {}",
                config.local_frame_capacity
            )));
        }

        let (target, class, bindings) =
            env.with_local_frame(config.local_frame_capacity, |env| -> BridgeResult<_> {
                JVMClasses::init(env)?;

                let class = env.get_object_class(target)?;
                let bindings = interface
                    .methods
                    .iter()
                    .map(|method| resolve(env, &class, &interface, method))
                    .collect::<BridgeResult<Vec<_>>>()?;

                Ok((
                    jni_new_global_ref!(env, target)?,
                    jni_new_global_ref!(env, &class)?,
                    bindings,
                ))
            })?;

        for method in interface.methods.iter().filter(|m| m.has_unsupported()) {
            warn!(
                "{}: {} has arguments without a native conversion",
                interface.name, method.selector
            );
        }
        debug!(
            "{}: bound {} of {} methods",
            interface.qualified_name(),
            bindings.iter().filter(|b| b.is_resolved()).count(),
            bindings.len()
        );

        let results = vec![None; interface.methods.len()];
        Ok(Self {
            env,
            target,
            class,
            interface,
            bindings,
            results,
            config,
        })
    }

    pub fn interface(&self) -> &InterfaceSpec {
        &self.interface
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// The Java object calls are made on.
    pub fn target(&self) -> &GlobalRef {
        &self.target
    }

    pub fn binding(&self, index: usize) -> Option<&MethodBinding> {
        self.bindings.get(index)
    }

    pub fn is_resolved(&self, index: usize) -> bool {
        self.binding(index).is_some_and(MethodBinding::is_resolved)
    }

    /// Selectors the target's class does not provide.
    pub fn unresolved(&self) -> impl Iterator<Item = &Selector> {
        self.bindings
            .iter()
            .filter(|b| !b.is_resolved())
            .map(MethodBinding::selector)
    }

    pub fn index_of(&self, name: &str, signature: &str) -> BridgeResult<usize> {
        self.interface.index_of(name, signature)
    }

    /// Calls method `index` and returns its result by value. The result of a method
    /// declared [`ResultMode::Cached`] is also kept in the proxy.
    pub fn invoke(&mut self, index: usize, args: &[Value]) -> BridgeResult<Value> {
        let value = self.dispatch(index, args)?;
        if self.interface.methods[index].mode == ResultMode::Cached {
            self.results[index] = Some(value.clone());
        }
        Ok(value)
    }

    /// Looks up the overload `name` with `signature` and calls it.
    pub fn call(&mut self, name: &str, signature: &str, args: &[Value]) -> BridgeResult<Value> {
        let index = self.index_of(name, signature)?;
        self.invoke(index, args)
    }

    /// Calls method `index`, which must be declared [`ResultMode::Cached`], and keeps the
    /// result in the proxy.
    ///
    /// The returned reference aliases the proxy's storage for this method; the next call
    /// of the same method replaces it.
    pub fn invoke_cached(&mut self, index: usize, args: &[Value]) -> BridgeResult<&Value> {
        if let Some(method) = self.interface.method(index) {
            expect_cached(method)?;
        }
        let value = self.dispatch(index, args)?;
        Ok(&*self.results[index].insert(value))
    }

    /// The value stored by the last successful call of the cached method `index`.
    pub fn cached(&self, index: usize) -> Option<&Value> {
        self.results.get(index).and_then(Option::as_ref)
    }

    /// Calls method `index`, which must be declared as throwing, and reports only whether
    /// it succeeded. A Java exception is cleared and turns into `false`.
    pub fn invoke_flag(&mut self, index: usize, args: &[Value]) -> bool {
        let checked = self.interface.method(index).map_or(Ok(()), expect_flag);
        let result = checked.and_then(|_| self.dispatch(index, args));

        match result {
            Ok(_) => true,
            Err(e @ BridgeError::CallMode { .. }) => {
                error!("{}: {}", self.interface.name, e);
                false
            }
            Err(e) => {
                debug!("{}: call #{} failed: {}", self.interface.name, index, e);
                false
            }
        }
    }

    /// Runs one call of method `index`. A failure drops the method's stored result.
    fn dispatch(&mut self, index: usize, args: &[Value]) -> BridgeResult<Value> {
        let result = self.call_jvm(index, args);
        if result.is_err() {
            if let Some(slot) = self.results.get_mut(index) {
                *slot = None;
            }
        }
        result
    }

    fn call_jvm(&mut self, index: usize, args: &[Value]) -> BridgeResult<Value> {
        let interface = Arc::clone(&self.interface);
        let method = interface
            .method(index)
            .ok_or_else(|| BridgeError::UnknownMethod {
                interface: interface.name.clone(),
                selector: format!("#{index}"),
            })?;
        let method_id = self.bindings[index]
            .method_id
            .ok_or_else(|| BridgeError::UnresolvedMethod {
                interface: interface.name.clone(),
                selector: method.selector.to_string(),
            })?;
        check_arguments(method, args, self.config.unsupported)?;

        let target = self.target.as_obj();
        self.env
            .with_local_frame(self.config.local_frame_capacity, |env| {
                let result = call(env, target, method, method_id, args);
                settle(env, result)
            })
    }
}

fn expect_cached(method: &MethodSpec) -> BridgeResult<()> {
    if method.mode == ResultMode::Cached {
        Ok(())
    } else {
        Err(BridgeError::CallMode {
            method: method.selector.to_string(),
            reason: "result is returned by value, not cached".to_string(),
        })
    }
}

fn expect_flag(method: &MethodSpec) -> BridgeResult<()> {
    if method.throws {
        Ok(())
    } else {
        Err(BridgeError::CallMode {
            method: method.selector.to_string(),
            reason: "failures are reported as errors, not as a flag".to_string(),
        })
    }
}

fn resolve(
    env: &mut JNIEnv,
    class: &JClass,
    interface: &InterfaceSpec,
    method: &MethodSpec,
) -> BridgeResult<MethodBinding> {
    let signature = method.selector.signature.to_string();
    let method_id = match env.get_method_id(class, method.name(), &signature) {
        Ok(method_id) => Some(method_id),
        Err(Error::MethodNotFound { .. }) | Err(Error::JavaException) => {
            // GetMethodID leaves a NoSuchMethodError behind.
            if env.exception_check()? {
                env.exception_clear()?;
            }
            error!(
                "{}: Could not find method: {}{}",
                interface.name,
                method.name(),
                signature
            );
            None
        }
        Err(e) => return Err(e.into()),
    };

    Ok(MethodBinding {
        selector: method.selector.clone(),
        method_id,
    })
}

fn call<'local>(
    env: &mut JNIEnv<'local>,
    target: &JObject,
    method: &MethodSpec,
    method_id: JMethodID,
    args: &[Value],
) -> BridgeResult<Value> {
    let arguments = to_jvalues(env, method, args)?;

    // Call the JVM method and obtain the returned value
    let ret = unsafe {
        env.call_method_unchecked(target, method_id, method.return_type(), arguments.as_jni())
    };

    // Check if JVM has thrown any exception, and handle it if so.
    if let Some(exception) = check_exception(env)? {
        return Err(exception);
    }

    from_jvalue(env, method, ret?)
}

/// Makes sure no exception is left pending, whatever step failed. A Java exception takes
/// precedence over the error that surfaced it.
fn settle(env: &mut JNIEnv, result: BridgeResult<Value>) -> BridgeResult<Value> {
    match result {
        Ok(value) => Ok(value),
        Err(e) => match check_exception(env)? {
            Some(exception) => Err(exception),
            None => Err(e),
        },
    }
}
