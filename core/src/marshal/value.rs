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

use jni::{objects::GlobalRef, signature::Primitive};

use super::Rgba;
use crate::descriptor::Marshal;

/// A native argument or result of a proxied call.
#[derive(Clone, Debug)]
pub enum Value {
    Void,
    Boolean(bool),
    Byte(i8),
    /// A UTF-16 code unit, as Java `char`.
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Text(String),
    Color(Rgba),
    /// An opaque Java object, passed through unchanged.
    Object(GlobalRef),
    /// Java `null`, for any reference type.
    Null,
}

impl Value {
    /// Short type name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Void => "void",
            Value::Boolean(_) => "boolean",
            Value::Byte(_) => "byte",
            Value::Char(_) => "char",
            Value::Short(_) => "short",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Text(_) => "String",
            Value::Color(_) => "Color",
            Value::Object(_) => "Object",
            Value::Null => "null",
        }
    }

    /// Whether this value can be passed where `plan` is expected.
    pub fn fits(&self, plan: &Marshal) -> bool {
        match (plan, self) {
            (Marshal::Unsupported { .. }, _) => true,
            (Marshal::Primitive(primitive), value) => matches!(
                (primitive, value),
                (Primitive::Boolean, Value::Boolean(_))
                    | (Primitive::Byte, Value::Byte(_))
                    | (Primitive::Char, Value::Char(_))
                    | (Primitive::Short, Value::Short(_))
                    | (Primitive::Int, Value::Int(_))
                    | (Primitive::Long, Value::Long(_))
                    | (Primitive::Float, Value::Float(_))
                    | (Primitive::Double, Value::Double(_))
            ),
            (_, Value::Null) => true,
            (Marshal::Text, Value::Text(_)) => true,
            (Marshal::Color, Value::Color(_)) => true,
            (Marshal::Object, Value::Object(_)) => true,
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(l) => Some(*l),
            _ => None,
        }
    }

    pub fn as_char(&self) -> Option<u16> {
        match self {
            Value::Char(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<Rgba> {
        match self {
            Value::Color(rgba) => Some(*rgba),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&GlobalRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i8> for Value {
    fn from(value: i8) -> Self {
        Value::Byte(value)
    }
}

impl From<u16> for Value {
    fn from(value: u16) -> Self {
        Value::Char(value)
    }
}

impl From<i16> for Value {
    fn from(value: i16) -> Self {
        Value::Short(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Long(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Rgba> for Value {
    fn from(value: Rgba) -> Self {
        Value::Color(value)
    }
}

impl From<GlobalRef> for Value {
    fn from(value: GlobalRef) -> Self {
        Value::Object(value)
    }
}
