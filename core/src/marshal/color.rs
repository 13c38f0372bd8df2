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

use jni::{
    objects::{JFloatArray, JObject},
    JNIEnv,
};

use crate::{
    errors::{BridgeError, BridgeResult},
    jvm_bridge::{check_exception, jni_call, AwtColor, ObjectWrapper},
};

/// A colour as four float components in `0.0..=1.0`.
///
/// The component order is fixed: red, green, blue, alpha, on both the native side and
/// in the `float[]` of `Color#getRGBComponents`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rgba {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
    pub alpha: f32,
}

impl Rgba {
    pub const fn new(red: f32, green: f32, blue: f32, alpha: f32) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    pub const fn from_components(components: [f32; 4]) -> Self {
        Self::new(components[0], components[1], components[2], components[3])
    }

    pub const fn components(&self) -> [f32; 4] {
        [self.red, self.green, self.blue, self.alpha]
    }
}

/// `new java.awt.Color(red, green, blue, alpha)`
pub(crate) fn to_java<'local>(env: &mut JNIEnv<'local>, rgba: &Rgba) -> BridgeResult<JObject<'local>> {
    let color = AwtColor::get_or_init(env)?;
    let [red, green, blue, alpha] = rgba.components();
    let args = crate::jvm_bridge::jvalues!(red, green, blue, alpha,);

    let obj = unsafe { env.new_object_unchecked(color.class(), color.method_color_init, args) };
    if let Some(exception) = check_exception(env)? {
        return Err(exception);
    }
    Ok(obj?)
}

/// `color.getRGBComponents(null)`, always four floats in red, green, blue, alpha order.
pub(crate) fn from_java(env: &mut JNIEnv, obj: &JObject) -> BridgeResult<Rgba> {
    let color = AwtColor::get_or_init(env)?;
    let components = unsafe {
        jni_call!(env, color.color(obj).get_rgb_components(&JObject::null()) -> ObjectWrapper)
    }?;
    let components = JFloatArray::from(components.into_inner());

    let len = env.get_array_length(&components)?;
    if len != 4 {
        return Err(BridgeError::Internal(format!(
            "Color#getRGBComponents returned {len} components"
        )));
    }
    let mut buf = [0.0_f32; 4];
    env.get_float_array_region(&components, 0, &mut buf)?;
    Ok(Rgba::from_components(buf))
}
