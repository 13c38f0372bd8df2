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
    objects::{GlobalRef, JClass, JMethodID},
    signature::ReturnType,
    JNIEnv,
};
use once_cell::sync::OnceCell;

use crate::{errors::BridgeResult, signature::JAVA_AWT_COLOR};

/// A struct that holds the constructor and accessor of the JVM `java.awt.Color` class.
///
/// Resolved on first use only, so that interfaces without colours keep working on a
/// runtime that ships without the `java.desktop` module.
pub struct AwtColor {
    pub class: GlobalRef,
    pub method_color_init: JMethodID,
    pub method_color_get_rgb_components: JMethodID,
    pub method_color_get_rgb_components_ret: ReturnType,
}

unsafe impl Send for AwtColor {}

unsafe impl Sync for AwtColor {}

static AWT_COLOR: OnceCell<AwtColor> = OnceCell::new();

impl AwtColor {
    pub const JVM_CLASS: &'static str = JAVA_AWT_COLOR;

    pub fn get_or_init(env: &mut JNIEnv) -> BridgeResult<&'static AwtColor> {
        AWT_COLOR.get_or_try_init(|| {
            let class = env.find_class(Self::JVM_CLASS)?;

            Ok(AwtColor {
                method_color_init: env.get_method_id(&class, "<init>", "(FFFF)V")?,
                method_color_get_rgb_components: env.get_method_id(
                    &class,
                    "getRGBComponents",
                    "([F)[F",
                )?,
                method_color_get_rgb_components_ret: ReturnType::Array,
                class: jni_new_global_ref!(env, class)?,
            })
        })
    }

    pub fn class(&self) -> &JClass<'static> {
        <&JClass>::from(self.class.as_obj())
    }
}
