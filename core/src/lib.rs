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

//! Native proxies for Java objects implementing AID interfaces.
//!
//! An interface is described once as an [`InterfaceSpec`]; a [`ProxyHandle`] binds a Java
//! object to it and marshals every call through JNI. Typed wrappers such as
//! [`interfaces::aidtest::JTestObjects`] put a native trait on top.

// The clippy throws an error if the reference clone not wrapped into `Arc::clone`
// The lint makes easier for code reader/reviewer separate references clones from more heavyweight ones
#![deny(clippy::clone_on_ref_ptr)]

use jni::{
    objects::{JClass, JString},
    JNIEnv, JavaVM,
};
use log::{info, LevelFilter};
use log4rs::{
    append::console::{ConsoleAppender, Target},
    config::{load_config_file, Appender, Deserializers, Root},
    encode::pattern::PatternEncoder,
    Config,
};
use once_cell::sync::OnceCell;

use errors::try_unwrap_or_throw;

pub mod config;
pub mod descriptor;
pub mod errors;
pub mod interfaces;
pub mod jvm_bridge;
pub mod marshal;
pub mod proxy;
pub mod signature;

pub use config::{parse_proxy_config, ProxyConfig, UnsupportedPolicy};
pub use descriptor::{InterfaceSpec, Marshal, MethodSpec, ResultMode};
pub use errors::{BridgeError, BridgeResult};
pub use marshal::{Rgba, Value};
pub use proxy::{MethodBinding, ProxyHandle};
pub use signature::{JavaType, MethodSignature, Selector};

static JAVA_VM: OnceCell<JavaVM> = OnceCell::new();

#[no_mangle]
pub extern "system" fn Java_org_freehep_aid_jni_NativeBase_init(
    e: JNIEnv,
    _: JClass,
    log_conf_path: JString,
) {
    // Initialize the error handling to capture panic backtraces
    errors::init();

    try_unwrap_or_throw(&e, |mut env| {
        let path: String = env.get_string(&log_conf_path)?.into();
        init_logging(&path)?;
        register_java_vm(&env)?;

        info!(
            "AID JNI native library version {} initialized",
            env!("CARGO_PKG_VERSION")
        );
        Ok(())
    })
}

/// Records the JavaVM behind `env` so that other threads can attach to it through
/// [`jvm_bridge::JVMClasses::get_env`]. Only the first call has an effect.
pub fn register_java_vm(env: &JNIEnv) -> BridgeResult<()> {
    JAVA_VM.get_or_try_init(|| env.get_java_vm())?;
    Ok(())
}

/// Installs the log4rs configuration found at `path`, or the default console logger when
/// `path` is empty. Ignored when a logger is already installed.
pub fn init_logging(path: &str) -> BridgeResult<()> {
    let log_config = if path.is_empty() {
        default_logger_config()
    } else {
        load_config_file(path, Deserializers::default())
            .map_err(|err| BridgeError::Config(err.to_string()))
    };

    let _ = log4rs::init_config(log_config?).map_err(|err| BridgeError::Config(err.to_string()));
    Ok(())
}

const LOG_PATTERN: &str = "{d(%y/%m/%d %H:%M:%S)} {l} {f}: {m}{n}";

// Creates a default log4rs config, which logs to console with `INFO` level.
fn default_logger_config() -> BridgeResult<Config> {
    let console_append = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build();
    let appender = Appender::builder().build("console", Box::new(console_append));
    let root = Root::builder().appender("console").build(LevelFilter::Info);
    Config::builder()
        .appender(appender)
        .build(root)
        .map_err(|err| BridgeError::Config(err.to_string()))
}
