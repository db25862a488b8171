use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::camera::Frame;

use super::{BoundingBox, DetectionState, Detector, IssueCategory};

/// Stand-in classifier: a uniformly random category with a confidence in
/// [0.6, 1.0]. It ignores the frame entirely.
pub struct MockDetector {
    rng: StdRng,
}

impl MockDetector {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn tick(&mut self) -> DetectionState {
        let category = IssueCategory::ALL[self.rng.gen_range(0..IssueCategory::ALL.len())];
        let confidence = self.rng.gen_range(0.6f32..=1.0);
        DetectionState::new(category.as_str(), confidence)
    }
}

impl Default for MockDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for MockDetector {
    fn detect(&mut self, _frame: &Frame) -> DetectionState {
        self.tick()
    }
}

/// Mock with a fixed score per category and a random region of interest.
pub struct CatalogDetector {
    rng: StdRng,
}

impl CatalogDetector {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn score(category: IssueCategory) -> f32 {
        match category {
            IssueCategory::Pothole => 0.85,
            IssueCategory::BrokenStreetlight => 0.78,
            IssueCategory::Graffiti => 0.72,
            IssueCategory::Trash => 0.81,
            IssueCategory::DamagedSign => 0.69,
        }
    }
}

impl Default for CatalogDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for CatalogDetector {
    fn detect(&mut self, _frame: &Frame) -> DetectionState {
        let category = IssueCategory::ALL[self.rng.gen_range(0..IssueCategory::ALL.len())];
        let mut state = DetectionState::new(category.as_str(), Self::score(category));
        state.bounding_box = Some(BoundingBox {
            x: self.rng.gen_range(100.0..300.0),
            y: self.rng.gen_range(100.0..300.0),
            width: self.rng.gen_range(50.0..150.0),
            height: self.rng.gen_range(50.0..150.0),
        });
        state
    }
}
