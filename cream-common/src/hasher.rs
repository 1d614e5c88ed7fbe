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

use std::hash::{BuildHasher, Hasher};

/// Bob Jenkins' one-at-a-time hash.
///
/// Every byte is mixed into a 32-bit state as it is written. The final avalanche is applied in [`Hasher::finish`],
/// so the hasher can keep accepting bytes after a result was taken.
#[derive(Debug, Default, Clone, Copy)]
pub struct JenkinsHasher {
    state: u32,
}

impl Hasher for JenkinsHasher {
    fn finish(&self) -> u64 {
        let mut hash = self.state;
        hash = hash.wrapping_add(hash << 3);
        hash ^= hash >> 11;
        hash = hash.wrapping_add(hash << 15);
        hash as u64
    }

    fn write(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.state = self.state.wrapping_add(*byte as u32);
            self.state = self.state.wrapping_add(self.state << 10);
            self.state ^= self.state >> 6;
        }
    }
}

impl BuildHasher for JenkinsHasher {
    type Hasher = Self;

    fn build_hasher(&self) -> Self::Hasher {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(bytes: &[u8]) -> u32 {
        let mut hasher = JenkinsHasher::default();
        hasher.write(bytes);
        hasher.finish() as u32
    }

    #[test]
    fn test_jenkins_hasher_empty() {
        assert_eq!(hash(&[]), 0);
    }

    #[test]
    fn test_jenkins_hasher_known_values() {
        // Reference values of the one-at-a-time hash.
        assert_eq!(hash(b"a"), 0xca2e9442);
        assert_eq!(
            hash(b"The quick brown fox jumps over the lazy dog"),
            0x519e91f5
        );
    }

    #[test]
    fn test_jenkins_hasher_incremental() {
        let mut hasher = JenkinsHasher::default().build_hasher();
        hasher.write(b"The quick brown ");
        hasher.write(b"fox jumps over the lazy dog");
        assert_eq!(
            hasher.finish() as u32,
            hash(b"The quick brown fox jumps over the lazy dog")
        );
    }
}
