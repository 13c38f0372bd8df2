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

//! JNI JVM related functions

use crate::errors::{BridgeError, BridgeResult};

use jni::{
    errors::Error,
    objects::{GlobalRef, JMethodID, JObject, JString, JThrowable, JValueGen, JValueOwned},
    signature::ReturnType,
    AttachGuard, JNIEnv,
};
use once_cell::sync::OnceCell;

/// Macro for converting JNI Error to bridge Error.
#[macro_export]
macro_rules! jni_map_error {
    ($env:expr, $result:expr) => {{
        match $result {
            Ok(result) => $crate::errors::BridgeResult::Ok(result),
            Err(jni_error) => Err($crate::errors::BridgeError::JNI { source: jni_error }),
        }
    }};
}

/// Macro for converting Rust types to JNI types.
macro_rules! jvalues {
    ($($args:expr,)* $(,)?) => {{
        &[$(jni::objects::JValue::from($args).as_jni()),*] as &[jni::sys::jvalue]
    }}
}

/// Macro for calling a JNI method whose ID is cached on a class holder.
/// The syntax is:
/// jni_call!(env, classes.throwable(exception).get_message() -> StringWrapper)?;
/// `classes` is the holder (e.g. [[JVMClasses]] or [[AwtColor]]).
/// throwable is the prefix of the cached `method_*` fields.
/// exception is the Java object on which the method is called.
/// get_message is the method name, followed by its arguments.
macro_rules! jni_call {
    ($env:expr, $holder:ident.$prefix:ident($obj:expr).$method:ident($($args:expr),* $(,)?) -> $ret:ty) => {{
        let method_id = paste::paste! {
            $holder.[<method_ $prefix _ $method>]
        };
        let ret_type = paste::paste! {
            $holder.[<method_ $prefix _ $method _ret>]
        }.clone();
        let args = $crate::jvm_bridge::jvalues!($($args,)*);

        // Call the JVM method and obtain the returned value
        let ret = $env.call_method_unchecked($obj, method_id, ret_type, args);

        // Check if JVM has thrown any exception, and handle it if so.
        let result = if let Some(exception) = $crate::jvm_bridge::check_exception($env)? {
            Err(exception)
        } else {
            $crate::jvm_bridge::jni_map_error!($env, ret)
        };

        result.and_then(|result| $crate::jvm_bridge::jni_map_error!($env, <$ret>::try_from(result)))
    }}
}

/// Wrapper for JString. Because we cannot implement `TryFrom` trait for `JString` as they
/// are defined in different crates.
pub struct StringWrapper<'a> {
    value: JString<'a>,
}

impl<'a> StringWrapper<'a> {
    pub fn new(value: JString<'a>) -> StringWrapper<'a> {
        Self { value }
    }

    pub fn get(&self) -> &JString<'a> {
        &self.value
    }
}

pub struct ObjectWrapper<'a> {
    value: JObject<'a>,
}

impl<'a> ObjectWrapper<'a> {
    pub fn new(value: JObject<'a>) -> ObjectWrapper<'a> {
        Self { value }
    }

    pub fn get(&self) -> &JObject<'a> {
        &self.value
    }

    pub fn into_inner(self) -> JObject<'a> {
        self.value
    }
}

impl<'a> TryFrom<JValueOwned<'a>> for StringWrapper<'a> {
    type Error = Error;

    fn try_from(value: JValueOwned<'a>) -> Result<StringWrapper<'a>, Error> {
        match value {
            JValueGen::Object(b) => Ok(StringWrapper::new(JString::from(b))),
            _ => Err(Error::WrongJValueType("object", value.type_name())),
        }
    }
}

impl<'a> TryFrom<JValueOwned<'a>> for ObjectWrapper<'a> {
    type Error = Error;

    fn try_from(value: JValueOwned<'a>) -> Result<ObjectWrapper<'a>, Error> {
        match value {
            JValueGen::Object(b) => Ok(ObjectWrapper::new(b)),
            _ => Err(Error::WrongJValueType("object", value.type_name())),
        }
    }
}

/// Macro for creating a new global reference.
macro_rules! jni_new_global_ref {
    ($env:expr, $obj:expr) => {{
        $crate::jni_map_error!($env, $env.new_global_ref($obj))
    }};
}

pub(crate) use jni_call;
pub(crate) use jni_map_error;
pub(crate) use jni_new_global_ref;
pub(crate) use jvalues;

mod awt_color;

pub use awt_color::*;

use crate::JAVA_VM;

/// The JVM classes that every proxy relies on, independent of the interface it binds.
#[allow(dead_code)] // we need to keep references to Java items to prevent GC
pub struct JVMClasses {
    /// Cached JClass for "java.lang.Object"
    java_lang_object: GlobalRef,
    /// Cached JClass for "java.lang.Class"
    java_lang_class: GlobalRef,
    /// Cached JClass for "java.lang.Throwable"
    java_lang_throwable: GlobalRef,

    pub method_object_get_class: JMethodID,
    pub method_object_get_class_ret: ReturnType,
    pub method_class_get_name: JMethodID,
    pub method_class_get_name_ret: ReturnType,
    pub method_throwable_get_message: JMethodID,
    pub method_throwable_get_message_ret: ReturnType,
    pub method_throwable_get_cause: JMethodID,
    pub method_throwable_get_cause_ret: ReturnType,
}

unsafe impl Send for JVMClasses {}

unsafe impl Sync for JVMClasses {}

/// Keeps global references to JVM classes. Used for JNI calls to JVM.
static JVM_CLASSES: OnceCell<JVMClasses> = OnceCell::new();

impl JVMClasses {
    /// Resolves the classes on first use. Later calls return the cached instance.
    pub fn init(env: &mut JNIEnv) -> BridgeResult<&'static JVMClasses> {
        JVM_CLASSES.get_or_try_init(|| {
            let java_lang_object = env.find_class("java/lang/Object")?;
            let method_object_get_class =
                env.get_method_id(&java_lang_object, "getClass", "()Ljava/lang/Class;")?;

            let java_lang_class = env.find_class("java/lang/Class")?;
            let method_class_get_name =
                env.get_method_id(&java_lang_class, "getName", "()Ljava/lang/String;")?;

            let java_lang_throwable = env.find_class("java/lang/Throwable")?;
            let method_throwable_get_message =
                env.get_method_id(&java_lang_throwable, "getMessage", "()Ljava/lang/String;")?;
            let method_throwable_get_cause = env.get_method_id(
                &java_lang_throwable,
                "getCause",
                "()Ljava/lang/Throwable;",
            )?;

            // SAFETY: According to the documentation for `JMethodID`, it is our
            // responsibility to maintain a reference to the `JClass` instances where the
            // methods were accessed from to prevent the methods from being garbage-collected
            Ok(JVMClasses {
                java_lang_object: jni_new_global_ref!(env, java_lang_object)?,
                java_lang_class: jni_new_global_ref!(env, java_lang_class)?,
                java_lang_throwable: jni_new_global_ref!(env, java_lang_throwable)?,
                method_object_get_class,
                method_object_get_class_ret: ReturnType::Object,
                method_class_get_name,
                method_class_get_name_ret: ReturnType::Object,
                method_throwable_get_message,
                method_throwable_get_message_ret: ReturnType::Object,
                method_throwable_get_cause,
                method_throwable_get_cause_ret: ReturnType::Object,
            })
        })
    }

    /// Returns the cached classes, or an error when no proxy has initialised them yet.
    pub fn get() -> BridgeResult<&'static JVMClasses> {
        JVM_CLASSES
            .get()
            .ok_or_else(|| BridgeError::Internal("JVMClasses used before init".to_string()))
    }

    /// Gets the JNIEnv for the current thread.
    pub fn get_env() -> BridgeResult<AttachGuard<'static>> {
        let java_vm = JAVA_VM.get().ok_or_else(|| {
            BridgeError::Internal("JVMClasses::get_env() called before NativeBase.init".to_string())
        })?;
        java_vm.attach_current_thread().map_err(|e| {
            BridgeError::Internal(format!(
                "JVMClasses::get_env() failed to attach current thread: {}",
                e
            ))
        })
    }
}

/// Clears a pending Java exception and converts it to a `BridgeError::JavaException`.
/// Returns `None` when nothing is pending.
pub fn check_exception(env: &mut JNIEnv) -> BridgeResult<Option<BridgeError>> {
    let result = if env.exception_check()? {
        let exception = env.exception_occurred()?;
        env.exception_clear()?;
        let exception_err = convert_exception(env, &exception)?;
        Some(exception_err)
    } else {
        None
    };

    Ok(result)
}

/// get the class name of the exception by:
///  1. get the `Class` object of the input `throwable` via `Object#getClass` method
///  2. get the exception class name via calling `Class#getName` on the above object
fn get_throwable_class_name(
    env: &mut JNIEnv,
    classes: &JVMClasses,
    throwable: &JThrowable,
) -> BridgeResult<String> {
    unsafe {
        let class_obj = jni_call!(env, classes.object(throwable).get_class() -> ObjectWrapper)?;
        let class_name =
            jni_call!(env, classes.class(class_obj.get()).get_name() -> StringWrapper)?;
        let class_name_str = env.get_string(class_name.get())?.into();

        Ok(class_name_str)
    }
}

/// Get the exception message via calling `Throwable#getMessage` on the throwable object
fn get_throwable_message(
    env: &mut JNIEnv,
    classes: &JVMClasses,
    throwable: &JThrowable,
) -> BridgeResult<String> {
    unsafe {
        let message = jni_call!(env, classes.throwable(throwable).get_message() -> StringWrapper)?;
        let message_str = if !message.get().is_null() {
            env.get_string(message.get())?.into()
        } else {
            String::from("null")
        };

        let cause = jni_call!(env, classes.throwable(throwable).get_cause() -> ObjectWrapper)?;
        let cause = JThrowable::from(cause.into_inner());

        if !cause.is_null() {
            let cause_class_name = get_throwable_class_name(env, classes, &cause)?;
            let cause_message = get_throwable_message(env, classes, &cause)?;
            Ok(format!(
                "{}\nCaused by: {}: {}",
                message_str, cause_class_name, cause_message
            ))
        } else {
            Ok(message_str)
        }
    }
}

/// Given a `JThrowable` which is thrown from calling a Java method on the native side,
/// this converts it into a `BridgeError::JavaException` with the exception class name
/// and exception message.
pub(crate) fn convert_exception(
    env: &mut JNIEnv,
    throwable: &JThrowable,
) -> BridgeResult<BridgeError> {
    let classes = JVMClasses::init(env)?;
    let exception_class_name_str = get_throwable_class_name(env, classes, throwable)?;
    let message_str = get_throwable_message(env, classes, throwable)?;

    Ok(BridgeError::JavaException {
        class: exception_class_name_str,
        msg: message_str,
        throwable: jni_new_global_ref!(env, throwable)?,
    })
}
