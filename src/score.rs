//! Post-song score shown while the finished song is on screen.
//!
//! The score is decorative: a uniform draw in `[0, 100]`, a cheer picked by
//! threshold, and an accuracy figure in `[80, 100]`. The random source sits
//! behind [`Scorer`] so callers can fix the outcome.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MAX_SCORE: u8 = 100;
pub const MIN_ACCURACY: u8 = 80;
pub const MAX_ACCURACY: u8 = 100;

/// Congratulatory message bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cheer {
    /// 90 and above
    Star,
    /// 80 to 89
    Fantastic,
    /// 70 to 79
    VeryGood,
    /// 60 to 69
    Good,
    /// below 60
    KeepPracticing,
}

impl Cheer {
    #[must_use]
    pub const fn for_score(score: u8) -> Self {
        match score {
            s if s >= 90 => Cheer::Star,
            s if s >= 80 => Cheer::Fantastic,
            s if s >= 70 => Cheer::VeryGood,
            s if s >= 60 => Cheer::Good,
            _ => Cheer::KeepPracticing,
        }
    }

    pub const fn message(self) -> &'static str {
        match self {
            Cheer::Star => "Incrível! Você é uma estrela! 🌟",
            Cheer::Fantastic => "Fantástico! Você arrasou! 🎉",
            Cheer::VeryGood => "Muito bom! Continue assim! 🎵",
            Cheer::Good => "Boa performance! 👏",
            Cheer::KeepPracticing => "Continue praticando! 💪",
        }
    }
}

impl fmt::Display for Cheer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Score of one finished song.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub score: u8,
    pub accuracy: u8,
    pub cheer: Cheer,
}

impl ScoreRecord {
    /// Clamps both figures into range and derives the cheer.
    #[must_use]
    pub fn new(score: u8, accuracy: u8) -> Self {
        let score = score.min(MAX_SCORE);
        Self {
            score,
            accuracy: accuracy.clamp(MIN_ACCURACY, MAX_ACCURACY),
            cheer: Cheer::for_score(score),
        }
    }
}

/// Produces the score for a song that just ended.
pub trait Scorer: Send {
    fn score(&mut self) -> ScoreRecord;
}

/// Uniform random scores.
#[derive(Debug)]
pub struct RandomScorer<R = StdRng> {
    rng: R,
}

impl RandomScorer<StdRng> {
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> RandomScorer<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng + Send> Scorer for RandomScorer<R> {
    fn score(&mut self) -> ScoreRecord {
        let score = self.rng.gen_range(0..=MAX_SCORE);
        let accuracy = self.rng.gen_range(MIN_ACCURACY..=MAX_ACCURACY);
        log::trace!("Drew score {score}, accuracy {accuracy}");
        ScoreRecord::new(score, accuracy)
    }
}

/// Always returns the same record.
#[derive(Debug, Clone, Copy)]
pub struct FixedScorer(pub ScoreRecord);

impl Scorer for FixedScorer {
    fn score(&mut self) -> ScoreRecord {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cheer_thresholds() {
        let cases = [
            (100, Cheer::Star),
            (90, Cheer::Star),
            (89, Cheer::Fantastic),
            (80, Cheer::Fantastic),
            (79, Cheer::VeryGood),
            (70, Cheer::VeryGood),
            (69, Cheer::Good),
            (60, Cheer::Good),
            (59, Cheer::KeepPracticing),
            (0, Cheer::KeepPracticing),
        ];

        for (score, expected) in cases {
            assert_eq!(Cheer::for_score(score), expected, "score {score}");
        }
    }

    #[test]
    fn test_record_clamps() {
        let record = ScoreRecord::new(250, 10);
        assert_eq!(record.score, 100);
        assert_eq!(record.accuracy, 80);
        assert_eq!(record.cheer, Cheer::Star);
    }

    #[test]
    fn test_random_scores_stay_in_range() {
        let mut scorer = RandomScorer::seeded(7);
        for _ in 0..1000 {
            let record = scorer.score();
            assert!(record.score <= MAX_SCORE);
            assert!((MIN_ACCURACY..=MAX_ACCURACY).contains(&record.accuracy));
            assert_eq!(record.cheer, Cheer::for_score(record.score));
        }
    }

    #[test]
    fn test_seeded_scorer_is_deterministic() {
        let a: Vec<_> = (0..10).map({
            let mut s = RandomScorer::seeded(42);
            move |_| s.score()
        }).collect();
        let b: Vec<_> = (0..10).map({
            let mut s = RandomScorer::seeded(42);
            move |_| s.score()
        }).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_fixed_scorer() {
        let mut scorer = FixedScorer(ScoreRecord::new(65, 90));
        assert_eq!(scorer.score().cheer, Cheer::Good);
        assert_eq!(scorer.score().cheer.message(), "Boa performance! 👏");
    }
}
