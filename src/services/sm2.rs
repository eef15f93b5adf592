use crate::models::{
    MasteryLevel, MASTERED_REPETITIONS, MIN_EASINESS, PASSING_QUALITY, PROFICIENT_REPETITIONS,
    STRONG_RECALL_QUALITY,
};

const FIRST_INTERVAL_DAYS: u32 = 1;
const SECOND_INTERVAL_DAYS: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sm2Step {
    pub interval: u32,
    pub easiness: f64,
    pub repetitions: u32,
}

/// One SM-2 transition. `quality` must already be within 0..=5.
pub fn sm2_step(quality: u8, repetitions: u32, easiness: f64, interval: u32) -> Sm2Step {
    let miss = 5.0 - f64::from(quality);
    let easiness = (easiness + (0.1 - miss * (0.08 + miss * 0.02))).max(MIN_EASINESS);

    if quality < PASSING_QUALITY {
        return Sm2Step {
            interval: FIRST_INTERVAL_DAYS,
            easiness,
            repetitions: 0,
        };
    }

    let repetitions = repetitions.saturating_add(1);
    let interval = match repetitions {
        1 => FIRST_INTERVAL_DAYS,
        2 => SECOND_INTERVAL_DAYS,
        _ => grow_interval(interval, easiness),
    };

    Sm2Step {
        interval,
        easiness,
        repetitions,
    }
}

fn grow_interval(interval: u32, easiness: f64) -> u32 {
    let grown = (f64::from(interval.max(1)) * easiness).floor();
    if grown >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        (grown as u32).max(1)
    }
}

/// Mastery depends only on the latest quality and the success streak.
pub fn classify_mastery(quality: u8, repetitions: u32) -> MasteryLevel {
    if quality >= STRONG_RECALL_QUALITY {
        if repetitions >= MASTERED_REPETITIONS {
            MasteryLevel::Mastered
        } else if repetitions >= PROFICIENT_REPETITIONS {
            MasteryLevel::Proficient
        } else {
            MasteryLevel::Familiar
        }
    } else if quality >= PASSING_QUALITY {
        MasteryLevel::Familiar
    } else {
        MasteryLevel::Learning
    }
}
