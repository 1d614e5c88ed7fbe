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

//! Shared components for cream.

/// Invariant checks kept in release builds with feature "strict_assertions".
pub mod assert;
/// The error type of the shared components.
pub mod error;
/// Event definitions for entries leaving the map.
pub mod event;
/// Hash functions used to place keys in the table.
pub mod hasher;
/// A blocking multi-producer multi-consumer queue.
pub mod queue;
/// A counting semaphore.
pub mod semaphore;
