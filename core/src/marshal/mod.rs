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

//! Conversion of native values to and from their JVM counterparts.

mod color;
mod value;

pub use color::Rgba;
pub use value::Value;

use jni::{
    objects::{JObject, JString, JValue, JValueOwned},
    signature::Primitive,
    sys::{jboolean, jvalue},
    JNIEnv,
};
use log::warn;

use crate::{
    config::UnsupportedPolicy,
    descriptor::{Marshal, MethodSpec},
    errors::{BridgeError, BridgeResult},
};

/// Arguments converted for one call. The local references are kept alive until the call
/// returns; the enclosing local frame releases them.
pub(crate) struct Arguments<'local> {
    #[allow(dead_code)] // only held so the objects outlive the call
    locals: Vec<JObject<'local>>,
    raw: Vec<jvalue>,
}

impl<'local> Arguments<'local> {
    pub(crate) fn as_jni(&self) -> &[jvalue] {
        &self.raw
    }
}

/// Checks `args` against the plan of `method` without touching the JVM.
pub fn check_arguments(
    method: &MethodSpec,
    args: &[Value],
    policy: UnsupportedPolicy,
) -> BridgeResult<()> {
    if method.params.len() != args.len() {
        return Err(BridgeError::ArgumentCount {
            method: method.selector.to_string(),
            expected: method.params.len(),
            found: args.len(),
        });
    }

    for (index, (plan, value)) in method.params.iter().zip(args).enumerate() {
        if let Marshal::Unsupported { native } = plan {
            if policy == UnsupportedPolicy::Reject {
                return Err(BridgeError::UnsupportedConversion {
                    method: method.selector.to_string(),
                    index,
                    native: native.clone(),
                });
            }
            continue;
        }
        if !value.fits(plan) {
            return Err(BridgeError::ArgumentType {
                method: method.selector.to_string(),
                index,
                expected: plan.to_string(),
                found: value.kind().to_string(),
            });
        }
    }
    Ok(())
}

/// Converts already checked arguments into JNI values.
pub(crate) fn to_jvalues<'local>(
    env: &mut JNIEnv<'local>,
    method: &MethodSpec,
    args: &[Value],
) -> BridgeResult<Arguments<'local>> {
    let mut converted = Arguments {
        locals: Vec::new(),
        raw: Vec::with_capacity(args.len()),
    };

    for (index, (plan, value)) in method.params.iter().zip(args).enumerate() {
        let raw = match (plan, value) {
            (Marshal::Unsupported { native }, _) => {
                warn!(
                    "{}: passing null for argument {} of native type {}",
                    method.selector, index, native
                );
                JValue::Object(&JObject::null()).as_jni()
            }
            (Marshal::Text | Marshal::Color | Marshal::Object, Value::Null) => {
                JValue::Object(&JObject::null()).as_jni()
            }
            (Marshal::Primitive(_), value) => primitive_jvalue(value)?,
            (Marshal::Text, Value::Text(text)) => {
                let local = JObject::from(env.new_string(text)?);
                let raw = JValue::Object(&local).as_jni();
                converted.locals.push(local);
                raw
            }
            (Marshal::Color, Value::Color(rgba)) => {
                let local = color::to_java(env, rgba)?;
                let raw = JValue::Object(&local).as_jni();
                converted.locals.push(local);
                raw
            }
            (Marshal::Object, Value::Object(global)) => JValue::Object(global.as_obj()).as_jni(),
            (plan, value) => {
                return Err(BridgeError::ArgumentType {
                    method: method.selector.to_string(),
                    index,
                    expected: plan.to_string(),
                    found: value.kind().to_string(),
                })
            }
        };
        converted.raw.push(raw);
    }

    Ok(converted)
}

fn primitive_jvalue(value: &Value) -> BridgeResult<jvalue> {
    let raw = match *value {
        Value::Boolean(b) => JValue::Bool(b as jboolean).as_jni(),
        Value::Byte(b) => JValue::Byte(b).as_jni(),
        Value::Char(c) => JValue::Char(c).as_jni(),
        Value::Short(s) => JValue::Short(s).as_jni(),
        Value::Int(i) => JValue::Int(i).as_jni(),
        Value::Long(l) => JValue::Long(l).as_jni(),
        Value::Float(f) => JValue::Float(f).as_jni(),
        Value::Double(d) => JValue::Double(d).as_jni(),
        ref other => {
            return Err(BridgeError::Internal(format!(
                "{} is not a primitive value",
                other.kind()
            )))
        }
    };
    Ok(raw)
}

/// Converts the value returned by the JVM according to the result plan of `method`.
pub(crate) fn from_jvalue<'local>(
    env: &mut JNIEnv<'local>,
    method: &MethodSpec,
    ret: JValueOwned<'local>,
) -> BridgeResult<Value> {
    let value = match &method.ret {
        Marshal::Primitive(primitive) => match primitive {
            Primitive::Void => Value::Void,
            Primitive::Boolean => Value::Boolean(ret.z()?),
            Primitive::Byte => Value::Byte(ret.b()?),
            Primitive::Char => Value::Char(ret.c()?),
            Primitive::Short => Value::Short(ret.s()?),
            Primitive::Int => Value::Int(ret.i()?),
            Primitive::Long => Value::Long(ret.j()?),
            Primitive::Float => Value::Float(ret.f()?),
            Primitive::Double => Value::Double(ret.d()?),
        },
        Marshal::Text => {
            let obj = ret.l()?;
            if obj.is_null() {
                Value::Null
            } else {
                let text = JString::from(obj);
                let text: String = env.get_string(&text)?.into();
                Value::Text(text)
            }
        }
        Marshal::Color => {
            let obj = ret.l()?;
            if obj.is_null() {
                Value::Null
            } else {
                Value::Color(color::from_java(env, &obj)?)
            }
        }
        Marshal::Object => {
            let obj = ret.l()?;
            if obj.is_null() {
                Value::Null
            } else {
                Value::Object(env.new_global_ref(&obj)?)
            }
        }
        Marshal::Unsupported { native } => {
            warn!(
                "{}: discarding result without conversion to native type {}",
                method.selector, native
            );
            Value::Null
        }
    };
    Ok(value)
}
