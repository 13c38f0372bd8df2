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

//! `AIDTEST::ITestObjects`: object, string, reference and pointer returns, an overloaded
//! method, a colour, a stream parameter and a method that throws.

use std::{io::Write, sync::Arc};

use jni::{objects::JObject, JNIEnv};
use once_cell::sync::OnceCell;

use crate::{
    config::ProxyConfig,
    descriptor::{InterfaceSpec, MethodSpec},
    errors::{BridgeError, BridgeResult},
    marshal::{Rgba, Value},
    proxy::ProxyHandle,
};

/// The native view of `ITestObjects`.
///
/// Methods returning `&str` hand out a reference into the implementation's storage. It
/// stays valid until the same method is called again, which the borrow on `self`
/// enforces.
pub trait TestObjects {
    fn return_object(&mut self) -> BridgeResult<String>;
    fn return_reference(&mut self) -> BridgeResult<&str>;
    fn return_pointer(&mut self) -> BridgeResult<&str>;
    fn return_color(&mut self) -> BridgeResult<Rgba>;
    fn return_const_reference(&mut self) -> BridgeResult<&str>;
    fn return_const_reference_const(&mut self) -> BridgeResult<&str>;
    fn return_const_reference_throws(&mut self) -> BridgeResult<&str>;
    fn return_const_reference_const_throws(&mut self) -> BridgeResult<&str>;
    fn find(&mut self, path: &str) -> BridgeResult<&str>;
    fn find_color(&mut self, color: Rgba) -> BridgeResult<&str>;
    fn cd(&mut self, path: &str) -> BridgeResult<bool>;
    /// `os` has no Java counterpart; what reaches Java depends on the proxy's
    /// [`crate::config::UnsupportedPolicy`].
    fn ls(&mut self, path: &str, recursive: bool, os: &mut dyn Write) -> BridgeResult<()>;
    /// `false` if the Java side threw.
    fn mkdir(&mut self, path: &str) -> bool;
    fn mv(&mut self, old_path: &str, new_path: &str) -> BridgeResult<()>;
}

const RETURN_OBJECT: usize = 0;
const RETURN_REFERENCE: usize = 1;
const RETURN_POINTER: usize = 2;
const RETURN_COLOR: usize = 3;
const RETURN_CONST_REFERENCE: usize = 4;
const RETURN_CONST_REFERENCE_CONST: usize = 5;
const RETURN_CONST_REFERENCE_THROWS: usize = 6;
const RETURN_CONST_REFERENCE_CONST_THROWS: usize = 7;
const FIND_STRING: usize = 8;
const FIND_COLOR: usize = 9;
const CD: usize = 10;
const LS: usize = 11;
const MKDIR: usize = 12;
const MV: usize = 13;

static INTERFACE: OnceCell<Arc<InterfaceSpec>> = OnceCell::new();

fn describe() -> BridgeResult<InterfaceSpec> {
    const STRING_RESULT: &str = "()Ljava/lang/String;";

    InterfaceSpec::new("ITestObjects")
        .with_namespace("AIDTEST")
        .with_method(MethodSpec::parse("returnObject", STRING_RESULT)?)?
        .with_method(MethodSpec::parse("returnReference", STRING_RESULT)?.cached())?
        .with_method(MethodSpec::parse("returnPointer", STRING_RESULT)?.cached())?
        .with_method(MethodSpec::parse("returnColor", "()Ljava/awt/Color;")?)?
        .with_method(MethodSpec::parse("returnConstReference", STRING_RESULT)?.cached())?
        .with_method(MethodSpec::parse("returnConstReferenceConst", STRING_RESULT)?.cached())?
        .with_method(MethodSpec::parse("returnConstReferenceThrows", STRING_RESULT)?.cached())?
        .with_method(
            MethodSpec::parse("returnConstReferenceConstThrows", STRING_RESULT)?.cached(),
        )?
        .with_method(
            MethodSpec::parse("find", "(Ljava/lang/String;)Ljava/lang/String;")?.cached(),
        )?
        .with_method(MethodSpec::parse("find", "(Ljava/awt/Color;)Ljava/lang/String;")?.cached())?
        .with_method(MethodSpec::parse("cd", "(Ljava/lang/String;)Z")?)?
        .with_method(
            MethodSpec::parse("ls", "(Ljava/lang/String;ZLjava/io/OutputStream;)V")?
                .unsupported_param(2, "std::ostream&")?,
        )?
        .with_method(MethodSpec::parse("mkdir", "(Ljava/lang/String;)V")?.throws())?
        .with_method(MethodSpec::parse(
            "mv",
            "(Ljava/lang/String;Ljava/lang/String;)V",
        )?)
}

/// JNI proxy for a Java object implementing `ITestObjects`.
pub struct JTestObjects<'local> {
    proxy: ProxyHandle<'local>,
}

impl<'local> JTestObjects<'local> {
    /// The shared description of `ITestObjects`, built on first use.
    pub fn interface() -> BridgeResult<Arc<InterfaceSpec>> {
        INTERFACE
            .get_or_try_init(|| describe().map(Arc::new))
            .map(Arc::clone)
    }

    pub fn new(env: JNIEnv<'local>, object: &JObject) -> BridgeResult<Self> {
        Self::with_config(env, object, ProxyConfig::default())
    }

    pub fn with_config(
        env: JNIEnv<'local>,
        object: &JObject,
        config: ProxyConfig,
    ) -> BridgeResult<Self> {
        Ok(Self {
            proxy: ProxyHandle::new(env, object, Self::interface()?, config)?,
        })
    }

    pub fn proxy(&self) -> &ProxyHandle<'local> {
        &self.proxy
    }

    fn cached_text(&mut self, index: usize, args: &[Value]) -> BridgeResult<&str> {
        let value = self.proxy.invoke_cached(index, args)?;
        match value {
            Value::Text(text) => Ok(text.as_str()),
            Value::Null => Err(BridgeError::NullPointer(format!(
                "ITestObjects: method #{index} returned null"
            ))),
            other => Err(BridgeError::Internal(format!(
                "ITestObjects: method #{index} returned {}",
                other.kind()
            ))),
        }
    }

    fn void(&mut self, index: usize, args: &[Value]) -> BridgeResult<()> {
        self.proxy.invoke(index, args).map(|_| ())
    }
}

impl TestObjects for JTestObjects<'_> {
    fn return_object(&mut self) -> BridgeResult<String> {
        match self.proxy.invoke(RETURN_OBJECT, &[])? {
            Value::Text(text) => Ok(text),
            other => Err(BridgeError::NullPointer(format!(
                "ITestObjects: returnObject returned {}",
                other.kind()
            ))),
        }
    }

    fn return_reference(&mut self) -> BridgeResult<&str> {
        self.cached_text(RETURN_REFERENCE, &[])
    }

    fn return_pointer(&mut self) -> BridgeResult<&str> {
        self.cached_text(RETURN_POINTER, &[])
    }

    fn return_color(&mut self) -> BridgeResult<Rgba> {
        match self.proxy.invoke(RETURN_COLOR, &[])? {
            Value::Color(rgba) => Ok(rgba),
            other => Err(BridgeError::NullPointer(format!(
                "ITestObjects: returnColor returned {}",
                other.kind()
            ))),
        }
    }

    fn return_const_reference(&mut self) -> BridgeResult<&str> {
        self.cached_text(RETURN_CONST_REFERENCE, &[])
    }

    fn return_const_reference_const(&mut self) -> BridgeResult<&str> {
        self.cached_text(RETURN_CONST_REFERENCE_CONST, &[])
    }

    fn return_const_reference_throws(&mut self) -> BridgeResult<&str> {
        self.cached_text(RETURN_CONST_REFERENCE_THROWS, &[])
    }

    fn return_const_reference_const_throws(&mut self) -> BridgeResult<&str> {
        self.cached_text(RETURN_CONST_REFERENCE_CONST_THROWS, &[])
    }

    fn find(&mut self, path: &str) -> BridgeResult<&str> {
        self.cached_text(FIND_STRING, &[Value::from(path)])
    }

    fn find_color(&mut self, color: Rgba) -> BridgeResult<&str> {
        self.cached_text(FIND_COLOR, &[Value::from(color)])
    }

    fn cd(&mut self, path: &str) -> BridgeResult<bool> {
        let value = self.proxy.invoke(CD, &[Value::from(path)])?;
        value.as_bool().ok_or_else(|| BridgeError::ResultType {
            method: "cd".to_string(),
            expected: "boolean".to_string(),
        })
    }

    fn ls(&mut self, path: &str, recursive: bool, _os: &mut dyn Write) -> BridgeResult<()> {
        self.void(LS, &[Value::from(path), Value::from(recursive), Value::Null])
    }

    fn mkdir(&mut self, path: &str) -> bool {
        self.proxy.invoke_flag(MKDIR, &[Value::from(path)])
    }

    fn mv(&mut self, old_path: &str, new_path: &str) -> BridgeResult<()> {
        self.void(MV, &[Value::from(old_path), Value::from(new_path)])
    }
}
