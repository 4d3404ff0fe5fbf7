// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod joinable;
pub mod task;

pub use joinable::Joinable;
pub use task::{FnTask, Task};
