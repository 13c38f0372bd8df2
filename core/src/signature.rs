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

//! JVM type signatures, as passed to `GetMethodID`.
//!
//! The textual form must match what the JVM reports for the target class byte
//! for byte, so parsing is strict and `Display` reproduces the input exactly.

use std::fmt::{self, Display, Formatter};

use jni::signature::{Primitive, ReturnType};

use crate::errors::{BridgeError, BridgeResult};

pub const JAVA_LANG_STRING: &str = "java/lang/String";
pub const JAVA_AWT_COLOR: &str = "java/awt/Color";

/// A single JVM field type, or `void` in return position.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum JavaType {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Void,
    /// Binary class name with `/` separators, e.g. `java/lang/String`.
    Object(String),
    Array(Box<JavaType>),
}

impl JavaType {
    pub fn object(class_name: impl Into<String>) -> Self {
        JavaType::Object(class_name.into())
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, JavaType::Object(_) | JavaType::Array(_))
    }

    /// Whether this is `Lclass_name;`.
    pub fn is_class(&self, class_name: &str) -> bool {
        matches!(self, JavaType::Object(name) if name == class_name)
    }

    /// The JNI primitive for scalar types, `None` for references.
    pub fn primitive(&self) -> Option<Primitive> {
        let primitive = match self {
            JavaType::Boolean => Primitive::Boolean,
            JavaType::Byte => Primitive::Byte,
            JavaType::Char => Primitive::Char,
            JavaType::Short => Primitive::Short,
            JavaType::Int => Primitive::Int,
            JavaType::Long => Primitive::Long,
            JavaType::Float => Primitive::Float,
            JavaType::Double => Primitive::Double,
            JavaType::Void => Primitive::Void,
            JavaType::Object(_) | JavaType::Array(_) => return None,
        };
        Some(primitive)
    }

    /// The return type category used by `call_method_unchecked`.
    pub fn return_type(&self) -> ReturnType {
        match self {
            JavaType::Object(_) => ReturnType::Object,
            JavaType::Array(_) => ReturnType::Array,
            other => match other.primitive() {
                Some(primitive) => ReturnType::Primitive(primitive),
                None => ReturnType::Object,
            },
        }
    }
}

impl Display for JavaType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            JavaType::Boolean => f.write_str("Z"),
            JavaType::Byte => f.write_str("B"),
            JavaType::Char => f.write_str("C"),
            JavaType::Short => f.write_str("S"),
            JavaType::Int => f.write_str("I"),
            JavaType::Long => f.write_str("J"),
            JavaType::Float => f.write_str("F"),
            JavaType::Double => f.write_str("D"),
            JavaType::Void => f.write_str("V"),
            JavaType::Object(name) => write!(f, "L{name};"),
            JavaType::Array(component) => write!(f, "[{component}"),
        }
    }
}

/// A parsed method signature such as `(Ljava/lang/String;Z)V`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    pub params: Vec<JavaType>,
    pub ret: JavaType,
}

impl MethodSignature {
    pub fn new(params: Vec<JavaType>, ret: JavaType) -> Self {
        Self { params, ret }
    }

    pub fn parse(signature: &str) -> BridgeResult<Self> {
        let err = |reason: &str| BridgeError::Signature {
            signature: signature.to_string(),
            reason: reason.to_string(),
        };

        let mut rest = signature
            .strip_prefix('(')
            .ok_or_else(|| err("expected '('"))?;

        let mut params = Vec::new();
        loop {
            match rest.as_bytes().first() {
                Some(b')') => {
                    rest = &rest[1..];
                    break;
                }
                Some(_) => {
                    let (remaining, param) = parse_field_type(rest).map_err(|r| err(r))?;
                    params.push(param);
                    rest = remaining;
                }
                None => return Err(err("unterminated parameter list")),
            }
        }

        let (remaining, ret) = match rest.strip_prefix('V') {
            Some(remaining) => (remaining, JavaType::Void),
            None => parse_field_type(rest).map_err(|r| err(r))?,
        };
        if !remaining.is_empty() {
            return Err(err("trailing characters after return type"));
        }

        Ok(MethodSignature { params, ret })
    }
}

impl Display for MethodSignature {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for param in &self.params {
            write!(f, "{param}")?;
        }
        write!(f, "){}", self.ret)
    }
}

fn parse_field_type(input: &str) -> Result<(&str, JavaType), &'static str> {
    let mut chars = input.chars();
    let first = chars.next().ok_or("unexpected end of signature")?;
    let rest = chars.as_str();
    let java_type = match first {
        'Z' => JavaType::Boolean,
        'B' => JavaType::Byte,
        'C' => JavaType::Char,
        'S' => JavaType::Short,
        'I' => JavaType::Int,
        'J' => JavaType::Long,
        'F' => JavaType::Float,
        'D' => JavaType::Double,
        'L' => {
            let end = rest.find(';').ok_or("unterminated class name")?;
            let class_name = &rest[..end];
            if class_name.is_empty() {
                return Err("empty class name");
            }
            if class_name.contains(['.', '(', ')', '[']) {
                return Err("illegal character in class name");
            }
            return Ok((&rest[end + 1..], JavaType::Object(class_name.to_string())));
        }
        '[' => {
            let (remaining, component) = parse_field_type(rest)?;
            return Ok((remaining, JavaType::Array(Box::new(component))));
        }
        'V' => return Err("void is only valid as a return type"),
        _ => return Err("unknown type descriptor"),
    };
    Ok((rest, java_type))
}

/// Identifies one overload of an interface method.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Selector {
    pub name: String,
    pub signature: MethodSignature,
}

impl Selector {
    pub fn new(name: impl Into<String>, signature: MethodSignature) -> Self {
        Self {
            name: name.into(),
            signature,
        }
    }

    pub fn parse(name: impl Into<String>, signature: &str) -> BridgeResult<Self> {
        Ok(Self::new(name, MethodSignature::parse(signature)?))
    }

    /// An identifier-safe key that keeps overloads apart, e.g.
    /// `cd(Ljava/lang/String;)Z` becomes `cdOLjava_lang_StringECZ`.
    pub fn mangle(&self) -> String {
        let signature = self.signature.to_string();
        let mut mangled = String::with_capacity(self.name.len() + signature.len());
        mangled.push_str(&self.name);
        for c in signature.chars() {
            mangled.push(match c {
                '(' => 'O',
                ')' => 'C',
                ';' => 'E',
                '/' => '_',
                '[' => 'A',
                other => other,
            });
        }
        mangled
    }
}

impl Display for Selector {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.signature)
    }
}
