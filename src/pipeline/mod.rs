// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 drover contributors

//! Pipeline definitions
//!
//! The declarative pipeline resource as written in `.drone.yml`, its
//! trigger conditions and the lint pass run before compilation.

mod conditions;
mod definition;
mod validation;

pub use conditions::{Condition, Conditions, MatchContext};
pub use definition::*;
pub use validation::{PipelineValidator, ValidationResult};
