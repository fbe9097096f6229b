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

#![warn(missing_docs, clippy::needless_borrow)]
// Clippy lints, some should be disabled incrementally
#![allow(
    clippy::module_inception,
    clippy::new_without_default,
    clippy::type_complexity,
    clippy::upper_case_acronyms,
    clippy::comparison_to_empty
)]

//! ecs-tasks launches Amazon ECS tasks from AWS Lambda and follows them to
//! completion, either through direct invocations or as a CloudFormation
//! custom resource.

pub mod aws;
pub mod config;
pub mod configs;
pub mod error;
pub mod handler;
pub mod logger;
pub mod prelude;
pub mod runtime;
pub mod validation;

#[cfg(test)]
pub mod test_util;
