// Copyright (c) 2020-present, UMD Database Group.
//
// This program is free software: you can use, redistribute, and/or modify
// it under the terms of the GNU Affero General Public License, version 3
// or later ("AGPL"), as published by the Free Software Foundation.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <http://www.gnu.org/licenses/>.

//! Logger set up for the Lambda binaries.

use crate::configs::*;
use std::io::Write;

/// Builds the logger of a Lambda binary.
///
/// The level comes from the environment variable named by
/// `ECS_TASKS_LOG_LEVEL_ENV` (`LOG_LEVEL` by default). CloudWatch already
/// stamps every line, so records carry the level only.
pub fn get_logging() -> env_logger::Builder {
    let mut builder = env_logger::Builder::new();

    let level = match std::env::var(&*ECS_TASKS_LOG_LEVEL_ENV)
        .unwrap_or_else(|_| ECS_TASKS_DEFAULT_LOG_LEVEL.clone())
        .to_lowercase()
        .as_str()
    {
        "error" => log::LevelFilter::Error,
        "warn" | "warning" => log::LevelFilter::Warn,
        "debug" => log::LevelFilter::Debug,
        "trace" => log::LevelFilter::Trace,
        "off" => log::LevelFilter::Off,
        _ => log::LevelFilter::Info,
    };
    builder.filter(None, level);
    builder.filter_module("rusoto_core", log::LevelFilter::Warn);
    builder.filter_module("hyper", log::LevelFilter::Warn);

    builder.format(|f, record| {
        writeln!(
            f,
            "[{}] {}",
            record.level().to_string().to_lowercase(),
            record.args()
        )
    });

    builder
}

/// Initializes the global logger once per execution environment.
pub fn init() {
    let _ = get_logging().try_init();
}
