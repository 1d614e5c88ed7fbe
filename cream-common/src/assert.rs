// Copyright 2025 foyer Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


//! Invariant checks that are compiled into debug builds, and into release builds of crates that enable their
//! `strict_assertions` feature.
//!
//! The feature is looked up in the crate that expands the macro, so every crate using them forwards the feature.

/// Assert `cond` in debug builds, or always with feature "strict_assertions".
#[macro_export]
macro_rules! strict_assert {
    ($($arg:tt)*) => {
        if cfg!(any(debug_assertions, feature = "strict_assertions")) {
            assert!($($arg)*);
        }
    };
}

/// Assert equality in debug builds, or always with feature "strict_assertions".
#[macro_export]
macro_rules! strict_assert_eq {
    ($($arg:tt)*) => {
        if cfg!(any(debug_assertions, feature = "strict_assertions")) {
            assert_eq!($($arg)*);
        }
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_holds() {
        strict_assert!(1 + 1 == 2);
        strict_assert_eq!(2 * 2, 4, "arithmetic");
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "size mismatch")]
    fn test_violated() {
        let size = 3;
        strict_assert_eq!(size, 2, "size mismatch");
    }
}
