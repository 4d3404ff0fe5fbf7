// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::chain::node::Step;
use crate::chain::Chain;

/// What a value-producing continuation returns.
///
/// * `Value` - pass the value to the next continuation
/// * `Chained` - run the nested chain in place; its nodes are walked before the
///   remaining nodes of the outer chain, and its result flows on from there
pub enum Outcome<T> {
    Value(T),
    Chained(Chain<T>),
}

impl<T: Send + 'static> Outcome<T> {
    pub(crate) fn into_step(self) -> Step {
        match self {
            Outcome::Value(value) => Step::Value(Box::new(value)),
            Outcome::Chained(chain) => Step::Chained(chain.into_parts()),
        }
    }
}

impl<T> From<Chain<T>> for Outcome<T> {
    fn from(chain: Chain<T>) -> Self {
        Outcome::Chained(chain)
    }
}
