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

//! Bridge errors and the helpers used by exported JNI functions.

use jni::errors::{Exception, ToException};
use regex::Regex;

use std::{
    any::Any,
    convert,
    fmt::Write,
    panic::{catch_unwind, UnwindSafe},
    result,
    sync::{Arc, Mutex},
};

use jni::objects::{GlobalRef, JThrowable};
use jni::sys::jint;
use jni::JNIEnv;
use lazy_static::lazy_static;
use thiserror::Error;

lazy_static! {
    static ref PANIC_BACKTRACE: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
}

#[derive(thiserror::Error, Debug)]
pub enum BridgeError {
    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("{0}")]
    NullPointer(String),

    #[error("AID Internal Error: {0}")]
    Internal(String),

    #[error("Malformed JVM signature '{signature}': {reason}")]
    Signature { signature: String, reason: String },

    /// The interface declares no method with this name and signature.
    #[error("{interface}: no method {selector}")]
    UnknownMethod { interface: String, selector: String },

    /// The method is declared but could not be found on the target class.
    #[error("{interface}: method {selector} is not bound")]
    UnresolvedMethod { interface: String, selector: String },

    #[error("{method}: expected {expected} arguments, got {found}")]
    ArgumentCount {
        method: String,
        expected: usize,
        found: usize,
    },

    #[error("{method}: argument {index} expects {expected}, got {found}")]
    ArgumentType {
        method: String,
        index: usize,
        expected: String,
        found: String,
    },

    #[error("{method}: no conversion for argument {index} of native type {native}")]
    UnsupportedConversion {
        method: String,
        index: usize,
        native: String,
    },

    /// The method was called in a way its description does not allow.
    #[error("{method}: {reason}")]
    CallMode { method: String, reason: String },

    #[error("{method}: unexpected result, expected {expected}")]
    ResultType { method: String, expected: String },

    #[error(transparent)]
    JNI {
        #[from]
        source: jni::errors::Error,
    },

    #[error("{msg}")]
    Panic { msg: String },

    #[error("{class}: {msg}")]
    JavaException {
        class: String,
        msg: String,
        throwable: GlobalRef,
    },
}

impl BridgeError {
    /// Whether the error originates from an exception thrown on the Java side.
    pub fn is_java_exception(&self) -> bool {
        matches!(self, BridgeError::JavaException { .. })
    }
}

pub fn init() {
    std::panic::set_hook(Box::new(|_panic_info| {
        // Capture the backtrace for a panic
        if let Ok(mut backtrace) = PANIC_BACKTRACE.lock() {
            *backtrace = Some(std::backtrace::Backtrace::force_capture().to_string());
        }
    }));
}

/// Converts the results from `panic::catch_unwind` (e.g. a panic) to a `BridgeError`
impl convert::From<Box<dyn Any + Send>> for BridgeError {
    fn from(e: Box<dyn Any + Send>) -> Self {
        BridgeError::Panic {
            msg: match e.downcast_ref::<&str>() {
                Some(s) => s.to_string(),
                None => match e.downcast_ref::<String>() {
                    Some(msg) => msg.to_string(),
                    None => "unknown panic".to_string(),
                },
            },
        }
    }
}

impl jni::errors::ToException for BridgeError {
    fn to_exception(&self) -> Exception {
        match self {
            BridgeError::NullPointer(..) => Exception {
                class: "java/lang/NullPointerException".to_string(),
                msg: self.to_string(),
            },
            BridgeError::Config(..)
            | BridgeError::ArgumentCount { .. }
            | BridgeError::ArgumentType { .. }
            | BridgeError::CallMode { .. } => Exception {
                class: "java/lang/IllegalArgumentException".to_string(),
                msg: self.to_string(),
            },
            BridgeError::UnknownMethod { .. } | BridgeError::UnresolvedMethod { .. } => {
                Exception {
                    class: "java/lang/NoSuchMethodError".to_string(),
                    msg: self.to_string(),
                }
            }
            BridgeError::UnsupportedConversion { .. } => Exception {
                class: "java/lang/UnsupportedOperationException".to_string(),
                msg: self.to_string(),
            },
            _other => Exception {
                class: "java/lang/RuntimeException".to_string(),
                msg: self.to_string(),
            },
        }
    }
}

/// A specialized `Result` for bridge errors.
pub type BridgeResult<T> = result::Result<T, BridgeError>;

/// Returns the "default value" for a type.  This is used for JNI code in order to facilitate
/// returning a value in cases where an exception is thrown.  This value will never be used, as the
/// JVM will note the pending exception.
///
/// NOTE: We can't just use [Default] since both the trait and the object are defined in other
/// crates.
/// See [Rust Compiler Error Index - E0117](https://doc.rust-lang.org/error-index.html#E0117)
pub trait JNIDefault {
    fn default() -> Self;
}

impl JNIDefault for jint {
    fn default() -> jint {
        0
    }
}

impl JNIDefault for () {
    fn default() {}
}

// Unwrap the result returned from `panic::catch_unwind` when `Ok`, otherwise throw a
// `RuntimeException` back to the calling Java.  Since a return result is required, use `JNIDefault`
// to create a reasonable result.  This returned default value will be ignored due to the exception.
pub fn unwrap_or_throw_default<T: JNIDefault>(
    env: &mut JNIEnv,
    result: std::result::Result<T, BridgeError>,
) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            let backtrace = match err {
                BridgeError::Panic { msg: _ } => {
                    PANIC_BACKTRACE.lock().ok().and_then(|mut b| b.take())
                }
                _ => None,
            };
            throw_exception(env, &err, backtrace);
            T::default()
        }
    }
}

fn throw_exception(env: &mut JNIEnv, error: &BridgeError, backtrace: Option<String>) {
    // Leave an exception that is already pending alone.
    if let Ok(false) = env.exception_check() {
        let thrown = match error {
            BridgeError::JavaException {
                class: _,
                msg: _,
                throwable,
            } => env.throw(<&JThrowable>::from(throwable.as_obj())),
            _ => {
                let exception = error.to_exception();
                match backtrace {
                    Some(backtrace_string) => {
                        let msg = to_stacktrace_string(exception.msg.clone(), backtrace_string)
                            .unwrap_or(exception.msg);
                        env.throw_new(exception.class, msg)
                    }
                    _ => env.throw_new(exception.class, exception.msg),
                }
            }
        };
        if let Err(e) = thrown {
            log::error!("Unable to throw {} into the JVM: {}", error, e);
        }
    }
}

#[derive(Debug, Error)]
enum StacktraceError {
    #[error("Unable to initialize message: {0}")]
    Message(String),
    #[error("Unable to initialize backtrace regex: {0}")]
    Regex(#[from] regex::Error),
    #[error("Required field missing: {0}")]
    RequiredField(String),
    #[error("Unable to format stacktrace element: {0}")]
    Element(#[from] std::fmt::Error),
}

fn to_stacktrace_string(msg: String, backtrace_string: String) -> Result<String, StacktraceError> {
    let mut res = String::new();
    write!(&mut res, "{}", msg).map_err(|error| StacktraceError::Message(error.to_string()))?;

    // Use multi-line mode and named capture groups to identify the following stacktrace fields:
    // - dc = declaredClass
    // - mn = methodName
    // - fn = fileName (optional)
    // - line = file line number (optional)
    // - col = file col number within the line (optional)
    let re = Regex::new(
        r"(?m)^\s*\d+: (?<dc>.*?)(?<mn>[^:]+)\n(\s*at\s+(?<fn>[^:]+):(?<line>\d+):(?<col>\d+)$)?",
    )?;
    for c in re.captures_iter(backtrace_string.as_str()) {
        write!(
            &mut res,
            "\n        at {}{}({}:{})",
            c.name("dc")
                .ok_or_else(|| StacktraceError::RequiredField("declared class".to_string()))?
                .as_str(),
            c.name("mn")
                .ok_or_else(|| StacktraceError::RequiredField("method name".to_string()))?
                .as_str(),
            // There are internal calls within the backtrace that don't provide file information
            c.name("fn").map(|m| m.as_str()).unwrap_or("__internal__"),
            c.name("line")
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .unwrap_or(0)
        )?;
    }

    Ok(res)
}

fn flatten<T, E>(result: Result<Result<T, E>, E>) -> Result<T, E> {
    result.and_then(convert::identity)
}

// Implements "currying" from `FnOnce(T) -> R` to `FnOnce() -> R`, given
// an instance of T. Curring is not supported in Rust so we have to use this
// custom function to achieve something similar here.
fn curry<'a, T: 'a, F, R>(f: F, t: T) -> impl FnOnce() -> R + 'a
where
    F: FnOnce(T) -> R + 'a,
{
    || f(t)
}

// It is currently undefined behavior to unwind from Rust code into foreign code, so we can wrap
// our JNI functions and turn these panics into a `RuntimeException`.
pub fn try_unwrap_or_throw<T, F>(env: &JNIEnv, f: F) -> T
where
    T: JNIDefault,
    F: FnOnce(JNIEnv) -> Result<T, BridgeError> + UnwindSafe,
{
    let mut env1 = unsafe { env.unsafe_clone() };
    let env2 = unsafe { env.unsafe_clone() };
    unwrap_or_throw_default(
        &mut env1,
        flatten(catch_unwind(curry(f, env2)).map_err(BridgeError::from)),
    )
}
