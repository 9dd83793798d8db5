// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

const POSITIVE: &[&str] = &[
    "love", "happy", "great", "good", "amazing", "wonderful", "joy", "grateful",
    "thankful", "proud", "excited", "awesome", "best", "beautiful", "fun",
    "kind", "hope", "glad", "lucky", "smile", "laugh", "gm", "win",
];

const NEGATIVE: &[&str] = &[
    "hate", "sad", "bad", "terrible", "awful", "angry", "regret", "sorry",
    "lonely", "afraid", "scared", "worst", "cry", "hurt", "pain", "guilty",
    "ashamed", "lost", "fail", "failed", "broke", "rekt", "lie", "lied",
];

/// Scores `text` from 0 (negative) to 100 (positive); 50 when neutral.
pub fn score(text: &str) -> u8 {
    let (pos, neg) = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .fold((0i32, 0i32), |(p, n), word| {
            if POSITIVE.contains(&word.as_str()) {
                (p + 1, n)
            } else if NEGATIVE.contains(&word.as_str()) {
                (p, n + 1)
            } else {
                (p, n)
            }
        });
    (50 + (pos - neg) * 10).clamp(0, 100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_text_scores_fifty() {
        assert_eq!(score("the cat sat on the mat"), 50);
        assert_eq!(score(""), 50);
    }

    #[test]
    fn polarity_moves_the_score() {
        assert!(score("I love this, so happy!") > 50);
        assert!(score("I regret it and feel guilty") < 50);
        assert_eq!(score(&"hate ".repeat(20)), 0);
    }
}
