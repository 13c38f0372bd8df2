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

//! Declarative descriptions of the interfaces a proxy binds.
//!
//! A [`MethodSpec`] carries everything the marshaling engine needs for one method: its
//! selector, how every parameter and the result convert, and how the result is handed
//! back. An [`InterfaceSpec`] is an ordered list of them.

use std::fmt::{self, Display, Formatter};

use jni::signature::{Primitive, ReturnType};

use crate::{
    errors::{BridgeError, BridgeResult},
    signature::{JavaType, MethodSignature, Selector, JAVA_AWT_COLOR, JAVA_LANG_STRING},
};

/// How a single parameter or result crosses the native/JVM boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Marshal {
    /// Copied as is.
    Primitive(Primitive),
    /// `java.lang.String`, copied through modified UTF-8.
    Text,
    /// `java.awt.Color`, decomposed into four float components.
    Color,
    /// Any other reference, passed through without conversion.
    Object,
    /// A native type with no defined mapping, e.g. `std::ostream&`.
    Unsupported { native: String },
}

impl Marshal {
    /// The plan used when a descriptor does not override it.
    pub fn for_type(java_type: &JavaType) -> Marshal {
        if java_type.is_class(JAVA_LANG_STRING) {
            Marshal::Text
        } else if java_type.is_class(JAVA_AWT_COLOR) {
            Marshal::Color
        } else {
            match java_type.primitive() {
                Some(primitive) => Marshal::Primitive(primitive),
                None => Marshal::Object,
            }
        }
    }

    fn is_reference(&self) -> bool {
        !matches!(self, Marshal::Primitive(_))
    }
}

impl Display for Marshal {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Marshal::Primitive(primitive) => f.write_str(match primitive {
                Primitive::Boolean => "boolean",
                Primitive::Byte => "byte",
                Primitive::Char => "char",
                Primitive::Short => "short",
                Primitive::Int => "int",
                Primitive::Long => "long",
                Primitive::Float => "float",
                Primitive::Double => "double",
                Primitive::Void => "void",
            }),
            Marshal::Text => f.write_str("String"),
            Marshal::Color => f.write_str("Color"),
            Marshal::Object => f.write_str("Object"),
            Marshal::Unsupported { native } => write!(f, "unsupported {native}"),
        }
    }
}

/// How a result is handed back to the native caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResultMode {
    /// Returned by value.
    #[default]
    Value,
    /// Stored in the proxy and returned by reference; valid until the next call of
    /// the same method.
    Cached,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MethodSpec {
    pub selector: Selector,
    pub params: Vec<Marshal>,
    pub ret: Marshal,
    pub mode: ResultMode,
    /// The native form reports a Java exception as `false` instead of an error.
    pub throws: bool,
}

impl MethodSpec {
    pub fn new(selector: Selector) -> Self {
        let params = selector.signature.params.iter().map(Marshal::for_type).collect();
        let ret = Marshal::for_type(&selector.signature.ret);
        Self {
            selector,
            params,
            ret,
            mode: ResultMode::Value,
            throws: false,
        }
    }

    pub fn parse(name: &str, signature: &str) -> BridgeResult<Self> {
        Ok(Self::new(Selector::parse(name, signature)?))
    }

    pub fn name(&self) -> &str {
        &self.selector.name
    }

    pub fn signature(&self) -> &MethodSignature {
        &self.selector.signature
    }

    pub fn return_type(&self) -> ReturnType {
        self.selector.signature.ret.return_type()
    }

    pub fn cached(mut self) -> Self {
        self.mode = ResultMode::Cached;
        self
    }

    pub fn throws(mut self) -> Self {
        self.throws = true;
        self
    }

    /// Marks parameter `index` as having no conversion for its native type.
    pub fn unsupported_param(mut self, index: usize, native: &str) -> BridgeResult<Self> {
        self.set_param(
            index,
            Marshal::Unsupported {
                native: native.to_string(),
            },
        )?;
        Ok(self)
    }

    /// Converts parameter `index` as a colour even though the JVM type is a supertype
    /// such as `java/lang/Object`.
    pub fn color_param(mut self, index: usize) -> BridgeResult<Self> {
        self.set_param(index, Marshal::Color)?;
        Ok(self)
    }

    /// Converts the result as a colour.
    pub fn color_result(mut self) -> BridgeResult<Self> {
        if !self.selector.signature.ret.is_reference() {
            return Err(self.plan_error("the result", &Marshal::Color));
        }
        self.ret = Marshal::Color;
        Ok(self)
    }

    /// Whether any parameter or the result lacks a conversion.
    pub fn has_unsupported(&self) -> bool {
        self.params
            .iter()
            .chain(std::iter::once(&self.ret))
            .any(|plan| matches!(plan, Marshal::Unsupported { .. }))
    }

    fn set_param(&mut self, index: usize, plan: Marshal) -> BridgeResult<()> {
        let java_type = self.selector.signature.params.get(index).ok_or_else(|| {
            BridgeError::Config(format!(
                "{}: no parameter {} to override",
                self.selector, index
            ))
        })?;
        if plan.is_reference() && !java_type.is_reference() {
            return Err(self.plan_error(&format!("parameter {index}"), &plan));
        }
        self.params[index] = plan;
        Ok(())
    }

    fn plan_error(&self, target: &str, plan: &Marshal) -> BridgeError {
        BridgeError::Config(format!(
            "{}: {} is not a reference, cannot convert it as {}",
            self.selector, target, plan
        ))
    }
}

/// The methods of one Java interface, in declaration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InterfaceSpec {
    /// Name used in diagnostics, e.g. `ITestObjects`.
    pub name: String,
    /// Native namespace the interface is declared in, e.g. `AIDTEST`.
    pub namespace: Option<String>,
    pub methods: Vec<MethodSpec>,
}

impl InterfaceSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            methods: Vec::new(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Appends `method`. Two methods may share a name but not a signature.
    pub fn with_method(mut self, method: MethodSpec) -> BridgeResult<Self> {
        if self.index_of_selector(&method.selector).is_some() {
            return Err(BridgeError::Config(format!(
                "{}: duplicate method {}",
                self.name, method.selector
            )));
        }
        self.methods.push(method);
        Ok(self)
    }

    /// `namespace::name`, or just the name.
    pub fn qualified_name(&self) -> String {
        match &self.namespace {
            Some(namespace) => format!("{}::{}", namespace, self.name),
            None => self.name.clone(),
        }
    }

    pub fn method(&self, index: usize) -> Option<&MethodSpec> {
        self.methods.get(index)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Finds the overload `name` with the exact `signature`.
    pub fn index_of(&self, name: &str, signature: &str) -> BridgeResult<usize> {
        self.methods
            .iter()
            .position(|m| m.selector.name == name && m.selector.signature.to_string() == signature)
            .ok_or_else(|| BridgeError::UnknownMethod {
                interface: self.name.clone(),
                selector: format!("{name}{signature}"),
            })
    }

    fn index_of_selector(&self, selector: &Selector) -> Option<usize> {
        self.methods.iter().position(|m| &m.selector == selector)
    }
}
