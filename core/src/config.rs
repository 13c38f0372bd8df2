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

use crate::errors::{BridgeError, BridgeResult};

/// What a proxy does with an argument whose native type has no JVM conversion.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum UnsupportedPolicy {
    /// Pass Java `null` and log a warning.
    #[default]
    PassNull,
    /// Fail the call before it reaches the JVM.
    Reject,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ProxyConfig {
    pub unsupported: UnsupportedPolicy,
    /// Capacity of the local reference frame pushed around every JVM interaction.
    pub local_frame_capacity: i32,
}

impl ProxyConfig {
    pub const DEFAULT_LOCAL_FRAME_CAPACITY: i32 = 16;

    pub fn new(unsupported: UnsupportedPolicy, local_frame_capacity: i32) -> Self {
        Self {
            unsupported,
            local_frame_capacity,
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self::new(
            UnsupportedPolicy::default(),
            Self::DEFAULT_LOCAL_FRAME_CAPACITY,
        )
    }
}

pub fn parse_proxy_config(
    unsupported_policy: &str,
    local_frame_capacity: i64,
) -> BridgeResult<ProxyConfig> {
    let unsupported = match unsupported_policy {
        "default" | "pass_null" => UnsupportedPolicy::PassNull,
        "reject" => UnsupportedPolicy::Reject,
        _ => {
            return Err(BridgeError::Config(format!(
                "Unsupported conversion policy: {unsupported_policy}"
            )))
        }
    };

    let local_frame_capacity = match i32::try_from(local_frame_capacity) {
        Ok(capacity) if capacity > 0 => capacity,
        _ => {
            return Err(BridgeError::Config(format!(
                "Local frame capacity must be a positive 32-bit integer: {local_frame_capacity}"
            )))
        }
    };

    Ok(ProxyConfig::new(unsupported, local_frame_capacity))
}
